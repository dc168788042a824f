use thiserror::Error;

/// Errors surfaced by template compilation, rendering and configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The template source is malformed. `offset` is the byte offset of the
    /// offending token in the source.
    #[error("syntax error at byte {offset}: {message}")]
    Syntax { message: String, offset: usize },

    #[error("render error: {0}")]
    Render(String),

    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub fn syntax(message: impl Into<String>, offset: usize) -> Self {
        Error::Syntax {
            message: message.into(),
            offset,
        }
    }

    pub fn render(message: impl Into<String>) -> Self {
        Error::Render(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
