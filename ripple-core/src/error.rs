//! Error types for the Ripple runtime.
//!
//! Most runtime operations cannot fail given well-formed virtual nodes.
//! The errors here cover the few places where a caller can get something
//! wrong: writing through a read-only wrapper (when the configured policy
//! says so) and mounting a component that has nothing to render.

use thiserror::Error;

/// Errors surfaced by the reactive core and the renderer.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A write was attempted through a read-only reactive wrapper while the
    /// runtime is configured with [`ReadonlyWritePolicy::Error`].
    ///
    /// [`ReadonlyWritePolicy::Error`]: crate::config::ReadonlyWritePolicy::Error
    #[error("cannot set key `{key}`: target is read-only")]
    ReadonlyWrite { key: String },

    /// A component has neither a render function (direct or returned from
    /// setup) nor a template that could be compiled into one.
    #[error("component `{component}` has no render function or template")]
    MissingRender { component: String },

    /// The injected template compiler rejected a component's template.
    #[error("failed to compile template of component `{component}`")]
    Compile {
        component: String,
        #[source]
        source: CompileError,
    },
}

/// Error reported by a [`TemplateCompiler`](crate::component::TemplateCompiler).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CompileError {
    pub message: String,
}

impl CompileError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_error_is_reported_as_source() {
        use std::error::Error as _;

        let err = RuntimeError::Compile {
            component: "Card".into(),
            source: CompileError::new("missing closing tag </div>"),
        };

        assert_eq!(err.to_string(), "failed to compile template of component `Card`");
        assert_eq!(
            err.source().map(|s| s.to_string()),
            Some("missing closing tag </div>".to_string())
        );
    }
}
