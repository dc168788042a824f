use std::sync::Arc;

use tracing::{debug, warn};

use crate::ast::Program;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::eval::{Evaluator, RenderContext};
use crate::parser::{Parser, TagParser, TagRegistry};

const BUILTIN_TAGS: &[&str] = &["if", "elif", "else", "endif", "for", "endfor"];

/// Compiles templates. Custom tags are registered once, up front, on the
/// engine value; there is no process-wide registry.
#[derive(Default)]
pub struct Engine {
    tags: TagRegistry,
    trim_blocks: bool,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            tags: TagRegistry::new(),
            trim_blocks: config.trim_blocks,
        }
    }

    /// Register a block tag under `tag.name()`, replacing any earlier tag of
    /// the same name. A tag named like a built-in (`if`, `else`, ...) is
    /// ignored.
    pub fn register_tag(&mut self, tag: impl TagParser + 'static) -> &mut Self {
        let name = tag.name().to_string();
        if BUILTIN_TAGS.contains(&name.as_str()) {
            warn!(tag = %name, "ignoring custom tag named like a built-in tag");
            return self;
        }
        if self.tags.insert(name.clone(), Arc::new(tag)).is_some() {
            debug!(tag = %name, "replaced previously registered tag");
        }
        self
    }

    pub fn has_tag(&self, name: &str) -> bool {
        self.tags.contains_key(name)
    }

    /// A parser over `src` that knows this engine's tags.
    pub fn parser<'a>(&'a self, src: &'a str) -> Parser<'a> {
        Parser::new(src, &self.tags).with_trim_blocks(self.trim_blocks)
    }

    pub fn compile(&self, src: &str) -> Result<Template> {
        let root = self.parser(src).parse()?;
        Ok(Template { root })
    }

    /// Compile and render in one step.
    pub fn render_str(&self, src: &str, context: &RenderContext) -> Result<String> {
        self.compile(src)?.render(context)
    }
}

/// A compiled template. Immutable, so it can be shared across threads and
/// rendered against any number of contexts.
#[derive(Debug, Clone)]
pub struct Template {
    root: Program,
}

impl Template {
    pub fn root(&self) -> &Program {
        &self.root
    }

    pub fn render(&self, context: &RenderContext) -> Result<String> {
        Evaluator::new(context).render(&self.root)
    }
}
