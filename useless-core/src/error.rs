//! Error Types
//!
//! Every fallible operation in the crate returns [`Result`]. The variants are
//! grouped by the phase in which they are raised:
//!
//! - compile time (`prototype`, `extends`, `define_trait`, `component`)
//! - construction and lifecycle (`$requires`, init, destroy)
//! - member access (properties, calls)
//! - asynchronous work (pools, timeouts)
//!
//! Compile-time and lifecycle errors describe programmer mistakes and are not
//! meant to be retried. `Error` is `Clone` because a shared [`Promise`] hands
//! the same outcome to every waiter.
//!
//! [`Promise`]: crate::task::Promise

use std::sync::Arc;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, Error)]
pub enum Error {
    // ------------------------------------------------------------------
    // Property layer
    // ------------------------------------------------------------------
    #[error("cannot write to constant property `{name}`")]
    ImmutableWrite { name: String },

    #[error("cannot overwrite accessor property `{name}`")]
    AccessorOverwrite { name: String },

    #[error("property `{name}` is already defined")]
    DuplicateProperty { name: String },

    // ------------------------------------------------------------------
    // Compiler
    // ------------------------------------------------------------------
    #[error("`{name}` overrides final members: {}", members.join(", "))]
    FinalOverride { name: String, members: Vec<String> },

    #[error("`{name}` cannot derive from final type `{base}`")]
    DeriveFromFinal { name: String, base: String },

    #[error("`{name}`: trait #{index} is not a compiled trait")]
    InvalidTraitValue { name: String, index: usize },

    #[error("crazy input, unable to match `{name}`")]
    UnmatchedExtension { name: String },

    #[error("traits are not instantiable (`{name}`)")]
    TraitNotInstantiable { name: String },

    #[error("alias cycle through `{}`", chain.join(" -> "))]
    AliasCycle { chain: Vec<String> },

    #[error("alias `{alias}` points to unknown member `{target}`")]
    UnknownAliasTarget { alias: String, target: String },

    #[error("`{member}` is a built-in member and cannot be overridden")]
    BuiltinOverride { member: String },

    #[error("`{member}` expects argument #{index} to be {expected}, got {actual}")]
    ArgumentContract {
        member: String,
        index: usize,
        expected: String,
        actual: String,
    },

    // ------------------------------------------------------------------
    // Construction and lifecycle
    // ------------------------------------------------------------------
    #[error("`{name}.{member}` requirement failed: expected {expected}")]
    RequirementFailed {
        name: String,
        member: String,
        expected: String,
    },

    #[error("`{name}` is already initialized")]
    AlreadyInitialized { name: String },

    #[error("`{name}` is already destroyed")]
    AlreadyDestroyed { name: String },

    #[error("`{name}` destroy() called recursively")]
    RecursiveDestroy { name: String },

    #[error("`{name}` is not a component instance")]
    NotAComponent { name: String },

    // ------------------------------------------------------------------
    // Member access
    // ------------------------------------------------------------------
    #[error("`{name}` is not callable")]
    NotCallable { name: String },

    #[error("bound instance has been dropped")]
    InstanceDropped,

    // ------------------------------------------------------------------
    // Asynchronous work
    // ------------------------------------------------------------------
    #[error("task timed out after {ms} ms")]
    Timeout { ms: u64 },

    #[error("task failed: {0}")]
    TaskFailed(Arc<str>),

    #[error("task pool is closed")]
    PoolClosed,

    // ------------------------------------------------------------------
    // Misc
    // ------------------------------------------------------------------
    #[error("json: {0}")]
    Json(Arc<str>),

    #[error("{0}")]
    Custom(Arc<str>),
}

impl Error {
    /// Build an ad-hoc error from a message.
    pub fn custom(message: impl Into<String>) -> Self {
        Error::Custom(Arc::from(message.into()))
    }

    /// True for errors raised while compiling a definition.
    pub fn is_compile_time(&self) -> bool {
        matches!(
            self,
            Error::FinalOverride { .. }
                | Error::DeriveFromFinal { .. }
                | Error::InvalidTraitValue { .. }
                | Error::UnmatchedExtension { .. }
                | Error::AliasCycle { .. }
                | Error::UnknownAliasTarget { .. }
                | Error::BuiltinOverride { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(Arc::from(err.to_string()))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::TaskFailed(Arc::from(err.to_string()))
    }
}
