//! Error types surfaced by the builder and by the async data manager.
//!
//! Per the crate's error-handling design: configuration errors are fatal
//! and thrown synchronously from `build`; adapter errors are recoverable
//! and only ever travel through [`crate::event_bus::EventBus`] or
//! `state.error`, never back across the public API as a `Result`.

use thiserror::Error;

/// Fatal, build-time configuration problems.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    /// No `container` option was supplied.
    #[error("no container element or selector was supplied")]
    MissingContainer,
    /// Neither `item.height` nor `item.width` (depending on orientation) was supplied.
    #[error("item size (height/width) was not supplied")]
    MissingItemSize,
    /// `item.template` was not supplied.
    #[error("item template was not supplied")]
    MissingTemplate,
    /// A declared item size evaluated to a non-positive or non-finite number.
    #[error("item size at index {index} evaluated to an invalid value: {value}")]
    InvalidSize {
        /// Index the size function was evaluated at.
        index: usize,
        /// The offending value.
        value: f64,
    },
    /// `orientation: horizontal` was combined with `reverse: true`.
    #[error("horizontal orientation is incompatible with reverse mode")]
    HorizontalReverseConflict,
    /// The grid feature was combined with horizontal orientation or reverse mode.
    #[error("grid layout is incompatible with horizontal orientation or reverse mode")]
    GridLayoutConflict,
    /// Two registered features attempted to publish the same method name.
    #[error("features {first} and {second} both declare the method {method:?}")]
    MethodCollision {
        /// Name of the first feature that registered the method.
        first: &'static str,
        /// Name of the second feature that registered the method.
        second: &'static str,
        /// The colliding method name.
        method: &'static str,
    },
}

/// The configured `container` selector did not resolve to an element.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
#[error("container selector {0:?} did not match any element")]
pub struct ContainerNotFoundError(pub String);

/// Everything [`crate::builder::Builder::build`] can fail with: either a
/// config problem caught before any DOM work (`ConfigError`), or a
/// `container` selector that didn't resolve (`ContainerNotFoundError`) —
/// kept distinct from `ConfigError::MissingContainer` because one means
/// "no container was configured at all" and the other means "one was
/// configured but the selector found nothing".
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum BuildError {
    /// See [`ConfigError`].
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// See [`ContainerNotFoundError`].
    #[error(transparent)]
    ContainerNotFound(#[from] ContainerNotFoundError),
}

/// A recoverable failure from an async data adapter.
///
/// Captured in [`crate::data_manager::AsyncState::error`] and emitted via
/// `adapter:error`; never thrown to the caller.
#[derive(Debug, Error, Clone)]
#[error("adapter call for range {offset}..{}: {message}", offset + limit)]
pub struct AdapterError {
    /// Start offset of the failed request.
    pub offset: usize,
    /// Requested length of the failed request.
    pub limit: usize,
    /// Human-readable failure description.
    pub message: String,
}
