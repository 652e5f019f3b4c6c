//! Runtime errors.
//!
//! Reactive reads/writes and patching are infallible. The fallible surface is
//! the configuration layer and the application boundary (template
//! compilation, component resolution, mounting).

use thiserror::Error;

/// Errors surfaced by the Ripple runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime configuration could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),

    /// A component has neither a render function nor a template.
    #[error("component `{component}` has no render function or template")]
    MissingRender { component: String },

    /// The template compiler rejected a component template.
    #[error("failed to compile template for `{component}`: {message}")]
    Compile { component: String, message: String },

    /// A component name did not resolve in the registry.
    #[error("unknown component `{0}`")]
    UnknownComponent(String),

    /// A recorded patch stream could not be encoded.
    #[error("failed to encode host operations: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// A recorded patch stream could not be decoded.
    #[error("failed to decode host operations: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    /// The flush a `NextTick` was waiting on panicked before completing.
    #[error("scheduler flush aborted before the tick resolved")]
    FlushAborted,
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RuntimeError>;
