//! Schema definition and configuration entry points.

use crate::config::Config;
use crate::error::ConfigResult;
use crate::keys::Keys;
use crate::registry::Registry;
use crate::token::Ty;

/// A bijective mapping from configuration keys to slot types.
///
/// A slot type is either a concrete provider type or a capability set
/// (a trait-object type). No two keys may map to the same slot type;
/// violating this is a programming error and panics at
/// [`make`](Self::make) time.
///
/// # Example
///
/// ```rust,ignore
/// let schema = Schema::new()
///     .slot::<dyn Credentials>("creds")
///     .slot::<Ec2Cluster>("cluster");
/// let config = schema.make(keys)?;
/// ```
#[derive(Default)]
pub struct Schema {
    slots: Vec<(String, Ty)>,
}

impl Schema {
    /// Creates an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `key` to the slot type `T`.
    pub fn slot<T: ?Sized + 'static>(mut self, key: impl Into<String>) -> Self {
        self.slots.push((key.into(), Ty::of::<T>()));
        self
    }

    /// Produces the inverse slot-type → key mapping.
    ///
    /// # Panics
    ///
    /// Panics when two keys map to the same slot type or a key is bound
    /// twice.
    fn types(&self) -> Vec<(Ty, String)> {
        let mut inverse: Vec<(Ty, String)> = Vec::with_capacity(self.slots.len());
        for (key, ty) in &self.slots {
            if inverse.iter().any(|(t, k)| t == ty || k == key) {
                panic!("Schema: bindings not bijective");
            }
            inverse.push((*ty, key.clone()));
        }
        inverse
    }

    /// Builds a configuration from `keys` against the global registry.
    ///
    /// Resolves each configured key's provider, checks it against the slot
    /// type, constructs the dependency graph, and verifies it is acyclic.
    pub fn make(&self, keys: Keys) -> ConfigResult<Config> {
        self.make_with(Registry::global(), keys)
    }

    /// Builds a configuration from `keys` against an explicit registry.
    pub fn make_with(&self, registry: &Registry, keys: Keys) -> ConfigResult<Config> {
        Config::build(registry, self.types(), keys)
    }

    /// Decodes a marshaled configuration and builds it with
    /// [`make`](Self::make).
    pub fn unmarshal(&self, text: &str) -> ConfigResult<Config> {
        self.unmarshal_with(Registry::global(), text)
    }

    /// Decodes a marshaled configuration against an explicit registry.
    pub fn unmarshal_with(&self, registry: &Registry, text: &str) -> ConfigResult<Config> {
        let keys: Keys = serde_yaml::from_str(text)?;
        self.make_with(registry, keys)
    }
}
