//! Runtime Configuration
//!
//! A small set of knobs that change how the runtime reacts to misuse.
//! The configuration is per thread, matching the single-threaded execution
//! model of the reactive core: install it once before mounting an app.
//!
//! ```rust,ignore
//! let config = RuntimeConfig::from_json_str(r#"{ "readonly_writes": "error" }"#)?;
//! config.install();
//! ```

use std::cell::RefCell;

use serde::{Deserialize, Serialize};

/// What happens when code writes through a read-only reactive wrapper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadonlyWritePolicy {
    /// Emit a warning, leave the target untouched and report success.
    #[default]
    Warn,

    /// Leave the target untouched and return `RuntimeError::ReadonlyWrite`.
    Error,
}

/// Per-thread runtime settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Policy for writes through read-only wrappers.
    pub readonly_writes: ReadonlyWritePolicy,

    /// How many times a single job may be re-queued within one flush
    /// before the scheduler drops it.
    pub recursion_limit: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            readonly_writes: ReadonlyWritePolicy::Warn,
            recursion_limit: 100,
        }
    }
}

thread_local! {
    static CONFIG: RefCell<RuntimeConfig> = RefCell::new(RuntimeConfig::default());
}

impl RuntimeConfig {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Make this the active configuration for the current thread.
    pub fn install(self) {
        CONFIG.with(|config| *config.borrow_mut() = self);
    }

    /// The configuration active on the current thread.
    pub fn current() -> Self {
        CONFIG.with(|config| config.borrow().clone())
    }
}
