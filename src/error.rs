//! Crate-level errors.
//!
//! Graph failures stay typed as [`GraphError`] inside the engine. At the
//! crate boundary they fold into [`ChromaError`] next to config and file
//! failures, so callers touching both layers get one `Result`.

use crate::pipeline::error::GraphError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChromaError {
    #[error("graph: {0}")]
    Graph(#[from] GraphError),

    /// Rejected or unreadable engine configuration
    #[error("engine config: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("toml decode: {0}")]
    TomlDecode(#[from] toml::de::Error),

    #[error("toml encode: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ChromaError>,
    },
}

impl ChromaError {
    /// Wrap with a description of what was being attempted.
    pub fn while_doing(self, context: impl Into<String>) -> Self {
        ChromaError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, past any context wrappers.
    pub fn root(&self) -> &ChromaError {
        match self {
            ChromaError::Context { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChromaError>;

/// Attach context while lifting any convertible error into [`ChromaError`].
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<ChromaError>,
{
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().while_doing(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.into().while_doing(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_message() {
        let err = ChromaError::Config("subpixel_tolerance must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "engine config: subpixel_tolerance must be positive"
        );
    }

    #[test]
    fn test_context_nests() {
        let res: std::result::Result<(), GraphError> = Err(GraphError::ResolveFailure {
            node: "//imaging/root".to_string(),
        });
        let err = res
            .context("pulling output")
            .context("running conversion")
            .unwrap_err();
        assert!(err.to_string().starts_with("running conversion: pulling output"));
        assert!(matches!(
            err.root(),
            ChromaError::Graph(GraphError::ResolveFailure { .. })
        ));
    }

    #[test]
    fn test_io_lifts_with_context() {
        let res: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = res.with_context(|| format!("reading {}", "engine.toml")).unwrap_err();
        assert!(matches!(err.root(), ChromaError::Io(_)));
        assert!(err.to_string().contains("reading engine.toml"));
    }
}
