//! Error types for the configuration engine.

use thiserror::Error;

/// Errors that can occur while building, querying, or persisting a
/// configuration.
///
/// Programming errors — a non-bijective schema, an invalid or duplicate
/// provider name at registration — are not represented here: they panic,
/// since they cannot be meaningfully recovered at runtime.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An associative-tree access found a value of an incompatible type.
    #[error("key has wrong type")]
    WrongType,

    /// A provider name appears in the configuration keys but is not
    /// registered.
    #[error("{key}: no provider named {name} (is the crate providing {package} linked into the binary?)")]
    UnknownProvider {
        /// Schema key whose value named the provider.
        key: String,
        /// The unresolved provider name.
        name: String,
        /// Package prefix of the provider name (everything before the last `.`).
        package: String,
    },

    /// A configured provider's type does not satisfy its schema slot.
    #[error("provider implements type {provider}, which is incompatible to the bound type {slot}")]
    TypeMismatch {
        /// Concrete type of the configured provider.
        provider: &'static str,
        /// Type bound to the schema slot.
        slot: &'static str,
    },

    /// A typed lookup resolved to a slot with no configured instance.
    #[error("no provider for type {ty}")]
    NoProvider {
        /// Requested type.
        ty: &'static str,
    },

    /// A requested type matches no slot at all.
    #[error("no providers for type {ty}")]
    NoProviders {
        /// Requested type.
        ty: &'static str,
    },

    /// A requested type matches more than one slot.
    #[error("multiple providers for type {ty}: {matches}")]
    MultipleProviders {
        /// Requested type.
        ty: &'static str,
        /// Slot types that matched.
        matches: String,
    },

    /// The instance dependency graph contains a cycle.
    #[error("dependency cycle: {cycle}")]
    DependencyCycle {
        /// Provider names along the cycle, joined with `<-`.
        cycle: String,
    },

    /// A configuration argument failed flag parsing.
    #[error("provider {provider} flag {flag}: {message}")]
    Flag {
        /// Name of the provider whose flag set rejected the argument.
        provider: String,
        /// The offending flag name.
        flag: String,
        /// Parser-supplied description of the failure.
        message: String,
    },

    /// A provider's initialization capability failed.
    ///
    /// Initialization is memoized: the rendered message is cached on the
    /// instance and repeated lookups return it unchanged.
    #[error("{message}")]
    Init {
        /// Full rendered failure, `init <provider>: <cause>` at the origin.
        message: String,
    },

    /// A provider's setup capability failed.
    #[error("setup {provider}: {cause}")]
    Setup {
        /// Name of the provider whose setup failed.
        provider: String,
        /// Underlying failure.
        cause: anyhow::Error,
    },

    /// A provider's persisted state could not be serialized or restored.
    #[error("provider {provider}: persisted state: {source}")]
    State {
        /// Name of the provider whose state round-trip failed.
        provider: String,
        /// Underlying codec failure.
        #[source]
        source: serde_yaml::Error,
    },

    /// A provider descriptor failed validation.
    #[error("provider {name}: {message}")]
    InvalidProvider {
        /// Registered name of the provider.
        name: String,
        /// Description of the inconsistency.
        message: String,
    },

    /// The serialization codec rejected the input or output.
    #[error(transparent)]
    Codec(#[from] serde_yaml::Error),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
