//! ifusergroup: a small Jinja-like template engine with a group-gated
//! conditional tag.
//!
//! The crate exists to do one job well: render a block of markup only for
//! users who belong to at least one of a list of groups, and render the
//! alternative (or nothing) for everyone else.
//!
//! ```text
//! {% ifusergroup Admins 'Store Keeper' %}
//!   staff tools
//! {% else %}
//!   nothing to see here
//! {% endifusergroup %}
//! ```
//!
//! Supported engine subset:
//! - Literal text.
//! - `{{ expr }}` with variables, `.attr`, `['key']`, string literals.
//! - `{% if %}` / `{% elif %}` / `{% else %}` / `{% endif %}` with `==`,
//!   `!=`, `and`, `or`, `not`.
//! - `{% for x in xs %} ... {% endfor %}` with `loop.first`, `loop.last`,
//!   `loop.index0`.
//! - Custom block tags registered on an [`Engine`].
//!
//! Group membership semantics:
//! - No user, or an unauthenticated one, always gets the false branch.
//! - Groups are checked in order; the first membership match wins.
//! - A reference naming neither a group nor a variable holding a group name
//!   ends the check with "not allowed" (see
//!   [`DirectiveConfig::stop_on_first_unresolved`]).
//! - Nothing at render time turns into an error; a missing `else` renders as
//!   an empty string.
//!
//! ```
//! use ifusergroup::{directive, DirectiveConfig, Engine, InMemoryDirectory, RenderContext, User};
//!
//! let mut directory = InMemoryDirectory::new();
//! let admins = directory.add_group("Admins");
//!
//! let mut engine = Engine::new();
//! directive::register(&mut engine, directory, DirectiveConfig::default());
//!
//! let template = engine
//!     .compile("{% ifusergroup Admins %}A{% else %}B{% endifusergroup %}")
//!     .unwrap();
//!
//! let admin = RenderContext::new().with_user(User::new("ada").with_group(&admins));
//! assert_eq!(template.render(&admin).unwrap(), "A");
//! assert_eq!(template.render(&RenderContext::new()).unwrap(), "B");
//! ```

pub mod ast;
pub mod config;
pub mod directive;
pub mod engine;
pub mod error;
pub mod eval;
pub mod expr;
pub mod identity;
pub mod lexer;
pub mod parser;

pub use config::{DirectiveConfig, EngineConfig};
pub use directive::{ConditionalNode, GroupReference, IfUserGroup, Resolution};
pub use engine::{Engine, Template};
pub use error::{Error, Result};
pub use eval::{CustomNode, Evaluator, RenderContext, Value};
pub use identity::{Group, GroupDirectory, GroupId, InMemoryDirectory, User};
pub use parser::{Parser, TagParser};

/// Build an engine from `config` with `ifusergroup` registered against
/// `directory`.
pub fn engine_with_directory(
    config: &EngineConfig,
    directory: impl GroupDirectory + 'static,
) -> Engine {
    let mut engine = Engine::from_config(config);
    directive::register(&mut engine, directory, config.directive.clone());
    engine
}
