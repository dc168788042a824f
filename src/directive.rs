//! The `ifusergroup` tag.
//!
//! ```text
//! {% ifusergroup Admins 'Store Keeper' team_group %}
//!   shown to members of any listed group
//! {% else %}
//!   shown to everyone else
//! {% endifusergroup %}
//! ```
//!
//! A quoted argument names a group literally (quotes let names contain
//! spaces). A bare argument is first tried as a group name and then as a
//! variable whose value is a group name. Anonymous users always get the
//! `else` branch, and a reference that cannot be resolved counts as "not a
//! member": the tag fails closed and never errors at render time.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::ast::{Node, Program};
use crate::config::DirectiveConfig;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::eval::{CustomNode, Evaluator};
use crate::identity::{Group, GroupDirectory};
use crate::lexer::Token;
use crate::parser::{Parser, TagParser};

/// A group argument exactly as written, quotes included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupReference(String);

impl GroupReference {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn raw(&self) -> &str {
        &self.0
    }

    /// The reference with one layer of double quotes and then one layer of
    /// single quotes removed, when present.
    pub fn literal_name(&self) -> &str {
        let name = strip_quotes(&self.0, '"');
        strip_quotes(name, '\'')
    }
}

/// A lone quote character strips to the empty name.
fn strip_quotes(s: &str, quote: char) -> &str {
    if s.starts_with(quote) && s.ends_with(quote) {
        s.get(1..s.len() - 1).unwrap_or("")
    } else {
        s
    }
}

/// How a single reference turned into a group, if it did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The quote-stripped reference is a group name.
    Literal(Group),
    /// The reference is a variable whose value is a group name.
    Variable(Group),
    Unresolved,
}

impl Resolution {
    pub fn group(&self) -> Option<&Group> {
        match self {
            Resolution::Literal(group) | Resolution::Variable(group) => Some(group),
            Resolution::Unresolved => None,
        }
    }
}

/// A parsed `ifusergroup` block. Built once at compile time and only read
/// afterwards.
pub struct ConditionalNode {
    groups: Vec<GroupReference>,
    true_program: Program,
    false_program: Program,
    directory: Arc<dyn GroupDirectory>,
    stop_on_first_unresolved: bool,
}

impl fmt::Debug for ConditionalNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalNode")
            .field("groups", &self.groups)
            .field("true_program", &self.true_program)
            .field("false_program", &self.false_program)
            .field("stop_on_first_unresolved", &self.stop_on_first_unresolved)
            .finish()
    }
}

impl ConditionalNode {
    pub fn groups(&self) -> &[GroupReference] {
        &self.groups
    }

    pub fn true_program(&self) -> &Program {
        &self.true_program
    }

    /// Empty when the block has no `else`.
    pub fn false_program(&self) -> &Program {
        &self.false_program
    }

    /// Literal name first, then the raw token as a variable.
    pub fn resolve(&self, reference: &GroupReference, evaluator: &Evaluator<'_>) -> Resolution {
        if let Some(group) = self.directory.group_by_name(reference.literal_name()) {
            return Resolution::Literal(group);
        }

        let by_variable = evaluator
            .resolve_variable(reference.raw())
            .and_then(|value| value.as_str().and_then(|name| self.directory.group_by_name(name)));

        match by_variable {
            Some(group) => Resolution::Variable(group),
            None => Resolution::Unresolved,
        }
    }

    /// Whether the current user may see the true branch.
    pub fn is_allowed(&self, evaluator: &Evaluator<'_>) -> bool {
        let Some(user) = evaluator.current_user().filter(|u| u.is_authenticated()) else {
            debug!("no authenticated user, rendering false branch");
            return false;
        };

        for reference in &self.groups {
            let resolution = self.resolve(reference, evaluator);
            let Some(group) = resolution.group() else {
                debug!(reference = reference.raw(), "group reference did not resolve");
                if self.stop_on_first_unresolved {
                    return false;
                }
                continue;
            };

            if user.is_member_of(group) {
                trace!(user = %user.username, group = %group.name, ?resolution, "membership matched");
                return true;
            }
        }

        false
    }
}

impl CustomNode for ConditionalNode {
    fn render(&self, evaluator: &mut Evaluator<'_>) -> Result<String> {
        if self.is_allowed(evaluator) {
            evaluator.render(&self.true_program)
        } else {
            evaluator.render(&self.false_program)
        }
    }
}

/// Tag parser for `ifusergroup`. Holds the directory its nodes resolve
/// groups against.
#[derive(Clone)]
pub struct IfUserGroup {
    directory: Arc<dyn GroupDirectory>,
    config: DirectiveConfig,
}

impl IfUserGroup {
    pub fn new(directory: impl GroupDirectory + 'static) -> Self {
        Self {
            directory: Arc::new(directory),
            config: DirectiveConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DirectiveConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &DirectiveConfig {
        &self.config
    }

    /// Parse the block opened by `token`. `bits` are the opening tag's split
    /// contents, tag name first. The argument check happens before any markup
    /// is read from `parser`.
    pub fn parse_node(
        &self,
        bits: Vec<String>,
        token: &Token,
        parser: &mut Parser<'_>,
    ) -> Result<ConditionalNode> {
        let groups: Vec<GroupReference> = bits.into_iter().skip(1).map(GroupReference::new).collect();
        if groups.is_empty() {
            return Err(Error::syntax(
                format!("tag '{}' requires at least 1 argument", self.config.tag_name),
                token.span.start,
            ));
        }

        let else_tag = self.config.else_tag.as_str();
        let end_tag = self.config.end_tag.as_str();

        let true_program = parser.parse_until(&[else_tag, end_tag])?;
        let at_else = parser.peek()?.and_then(Token::block_name) == Some(else_tag);
        let false_program = if at_else {
            parser.expect_block(else_tag)?;
            let program = parser.parse_until(&[end_tag])?;
            parser.expect_block(end_tag)?;
            program
        } else {
            let close = parser.expect_block(end_tag)?;
            Program::empty(close.span.start)
        };

        Ok(ConditionalNode {
            groups,
            true_program,
            false_program,
            directory: Arc::clone(&self.directory),
            stop_on_first_unresolved: self.config.stop_on_first_unresolved,
        })
    }
}

impl TagParser for IfUserGroup {
    fn name(&self) -> &str {
        &self.config.tag_name
    }

    fn parse(&self, bits: Vec<String>, token: &Token, parser: &mut Parser<'_>) -> Result<Node> {
        let node = self.parse_node(bits, token, parser)?;
        Ok(Node::Custom(Arc::new(node)))
    }
}

/// Register `ifusergroup` on `engine`, resolving groups through `directory`.
pub fn register(
    engine: &mut Engine,
    directory: impl GroupDirectory + 'static,
    config: DirectiveConfig,
) -> &mut Engine {
    engine.register_tag(IfUserGroup::new(directory).with_config(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::identity::InMemoryDirectory;
    use crate::lexer::split_contents;
    use crate::parser::TagRegistry;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("'Store Keeper'", "Store Keeper")]
    #[case("\"Store Keeper\"", "Store Keeper")]
    #[case("Admins", "Admins")]
    #[case("\"\"Admins\"\"", "\"Admins\"")]
    #[case("''Admins''", "'Admins'")]
    #[case("\"'Admins'\"", "Admins")]
    #[case("'Admins\"", "'Admins\"")]
    #[case("\"", "")]
    #[case("'", "")]
    fn literal_name_strips_one_layer(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(GroupReference::new(raw).literal_name(), expected);
    }

    fn tag() -> IfUserGroup {
        IfUserGroup::new(InMemoryDirectory::new().with_group("Admins"))
    }

    #[test]
    fn zero_arguments_fails_before_reading_markup() {
        let src = "{% ifusergroup %}body{% endifusergroup %}";
        let tags = TagRegistry::new();
        let mut parser = Parser::new(src, &tags);
        let open = parser.next_token().unwrap().unwrap();

        let err = tag()
            .parse_node(vec!["ifusergroup".into()], &open, &mut parser)
            .unwrap_err();

        assert_eq!(err, Error::syntax("tag 'ifusergroup' requires at least 1 argument", 0));
        assert_eq!(parser.position().unwrap(), open.span.end);
    }

    #[rstest]
    #[case::with_else(
        "{% ifusergroup Admins 'Store Keeper' %}A{{ x }}{% if y %}Y{% endif %}{% else %}B{% endifusergroup %}tail",
        false,
        "{% else %}"
    )]
    #[case::empty_true_branch("{% ifusergroup Admins %}{% else %}B{% endifusergroup %}", false, "{% else %}")]
    #[case::empty_false_branch("{% ifusergroup Admins %}A{% else %}{% endifusergroup %}", false, "{% else %}")]
    #[case::without_else("{% ifusergroup Admins %}A{% endifusergroup %}", false, "")]
    #[case::nested_in_true_branch(
        "{% ifusergroup Admins %}x{% ifusergroup Editors %}i{% else %}j{% endifusergroup %}y{% else %}B{% endifusergroup %}",
        false,
        "{% else %}"
    )]
    #[case::nested_in_false_branch(
        "{% ifusergroup Admins %}A{% else %}x{% ifusergroup Editors %}i{% else %}j{% endifusergroup %}y{% endifusergroup %}",
        false,
        "{% else %}"
    )]
    #[case::trim_blocks(
        "{% ifusergroup Admins %}\nA\n{% else %}\nB\n{% endifusergroup %}\ntail",
        true,
        "{% else %}\n"
    )]
    fn branches_partition_enclosed_markup(
        #[case] src: &str,
        #[case] trim_blocks: bool,
        #[case] else_markup: &str,
    ) {
        let mut engine = Engine::from_config(&EngineConfig {
            trim_blocks,
            ..EngineConfig::default()
        });
        engine.register_tag(tag());
        let mut parser = engine.parser(src);
        let open = parser.next_token().unwrap().unwrap();
        let bits = split_contents(open.contents());

        let node = tag().parse_node(bits, &open, &mut parser).unwrap();
        let close_end = parser.position().unwrap();

        let t = node.true_program().span.clone();
        let f = node.false_program().span.clone();
        let close_markup = if trim_blocks {
            "{% endifusergroup %}\n"
        } else {
            "{% endifusergroup %}"
        };

        assert_eq!(t.start, open.span.end);
        assert_eq!(&src[t.end..f.start], else_markup);
        assert_eq!(
            format!("{}{}{}{}", &src[t], else_markup, &src[f], close_markup),
            &src[open.span.end..close_end]
        );
    }

    #[test]
    fn opening_tag_keeps_raw_references() {
        let src = "{% ifusergroup Admins 'Store Keeper' %}A{% endifusergroup %}";
        let tags = TagRegistry::new();
        let mut parser = Parser::new(src, &tags);
        let open = parser.next_token().unwrap().unwrap();
        let bits = split_contents(open.contents());

        let node = tag().parse_node(bits, &open, &mut parser).unwrap();
        assert_eq!(
            node.groups(),
            &[GroupReference::new("Admins"), GroupReference::new("'Store Keeper'")]
        );
    }

    #[test]
    fn without_else_false_program_is_empty() {
        let src = "{% ifusergroup Admins %}A{% endifusergroup %}";
        let tags = TagRegistry::new();
        let mut parser = Parser::new(src, &tags);
        let open = parser.next_token().unwrap().unwrap();
        let bits = split_contents(open.contents());

        let node = tag().parse_node(bits, &open, &mut parser).unwrap();
        assert!(node.false_program().is_empty());
        assert_eq!(&src[node.true_program().span.clone()], "A");
        assert_eq!(node.false_program().span.start, node.true_program().span.end);
    }

    #[test]
    fn else_with_arguments_is_rejected() {
        let src = "{% ifusergroup Admins %}A{% else nope %}B{% endifusergroup %}";
        let mut engine = Engine::new();
        engine.register_tag(tag());
        assert!(engine.compile(src).is_err());
    }

    #[test]
    fn unclosed_block_is_rejected() {
        let src = "{% ifusergroup Admins %}A{% else %}B";
        let mut engine = Engine::new();
        engine.register_tag(tag());
        let err = engine.compile(src).unwrap_err();
        assert_eq!(err, Error::syntax("unclosed tag, expected one of: endifusergroup", src.len()));
    }
}
