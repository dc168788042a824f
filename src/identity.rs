//! Users, groups and the directory used to look groups up by name.
//!
//! Authentication and persistence live with the host application; this
//! module only models the answers the `ifusergroup` tag needs.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    authenticated: bool,
    groups: BTreeSet<GroupId>,
}

impl User {
    /// An authenticated user with no group memberships.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            authenticated: true,
            groups: BTreeSet::new(),
        }
    }

    pub fn anonymous() -> Self {
        Self {
            username: String::new(),
            authenticated: false,
            groups: BTreeSet::new(),
        }
    }

    pub fn with_group(mut self, group: &Group) -> Self {
        self.groups.insert(group.id);
        self
    }

    pub fn join(&mut self, group: &Group) {
        self.groups.insert(group.id);
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn groups(&self) -> &BTreeSet<GroupId> {
        &self.groups
    }

    /// Membership is by group identity, not by name.
    pub fn is_member_of(&self, group: &Group) -> bool {
        self.groups.contains(&group.id)
    }
}

/// Name-based group lookup. Implementations must be cheap, side-effect-free
/// reads; a miss is `None`, never an error.
pub trait GroupDirectory: Send + Sync {
    fn group_by_name(&self, name: &str) -> Option<Group>;
}

impl<D: GroupDirectory + ?Sized> GroupDirectory for Arc<D> {
    fn group_by_name(&self, name: &str) -> Option<Group> {
        (**self).group_by_name(name)
    }
}

impl<D: GroupDirectory + ?Sized> GroupDirectory for &D {
    fn group_by_name(&self, name: &str) -> Option<Group> {
        (**self).group_by_name(name)
    }
}

/// Directory backed by a map, with ids assigned in insertion order.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    groups: HashMap<String, Group>,
    next_id: u64,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, name: impl Into<String>) -> Self {
        self.add_group(name);
        self
    }

    /// Adds a group, returning the existing one if the name is taken.
    pub fn add_group(&mut self, name: impl Into<String>) -> Group {
        let name = name.into();
        if let Some(existing) = self.groups.get(&name) {
            return existing.clone();
        }
        self.next_id += 1;
        let group = Group {
            id: GroupId(self.next_id),
            name: name.clone(),
        };
        self.groups.insert(name, group.clone());
        group
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

impl GroupDirectory for InMemoryDirectory {
    fn group_by_name(&self, name: &str) -> Option<Group> {
        self.groups.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_group_is_idempotent_by_name() {
        let mut dir = InMemoryDirectory::new();
        let a = dir.add_group("Admins");
        let again = dir.add_group("Admins");
        let b = dir.add_group("Editors");
        assert_eq!(a, again);
        assert_ne!(a.id, b.id);
        assert_eq!(dir.len(), 2);
    }

    #[test]
    fn membership_is_by_id() {
        let dir = InMemoryDirectory::new().with_group("Admins");
        let admins = dir.group_by_name("Admins").unwrap();
        let impostor = Group {
            id: GroupId(999),
            name: "Admins".into(),
        };
        let user = User::new("ada").with_group(&admins);
        assert!(user.is_member_of(&admins));
        assert!(!user.is_member_of(&impostor));
    }

    #[test]
    fn anonymous_user_is_not_authenticated() {
        assert!(!User::anonymous().is_authenticated());
        assert!(User::new("ada").is_authenticated());
    }
}
