//! Configured provider graphs.
//!
//! A [`Config`] is the assembled runtime object produced by
//! [`Schema::make`](crate::Schema::make). It owns one [`Instance`] per
//! configured schema slot, the topologically sorted initialization order,
//! and the per-provider setup version map. Consumers pull typed values
//! straight out of the graph:
//!
//! ```rust,ignore
//! let cluster: Handle<Ec2Cluster> = config.instance()?;
//! ```
//!
//! Lookups are lazy: the owning instance and its transitive dependencies
//! are initialized on first request, and both success and failure are
//! memoized per instance.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::error::{ConfigError, ConfigResult};
use crate::flags::FlagSet;
use crate::keys::Keys;
use crate::provider::Handle;
use crate::registry::{package_of, ProviderCell, ProviderType, Registry};
use crate::token::Ty;
use crate::toposort::TopoSorter;

// ─── Instance ────────────────────────────────────────────────────────────────

/// Memoized initialization state of one instance.
#[derive(Debug)]
enum InitState {
    Pristine,
    Initializing,
    Done,
    Failed(String),
}

/// A configured occurrence of a provider within one [`Config`].
struct Instance {
    /// Registered provider name.
    name: String,
    ptype: Arc<ProviderType>,
    cell: ProviderCell,
    /// Name of the embedded field the slot match went through; empty for a
    /// direct match.
    promoted: &'static str,
    state: Mutex<InitState>,
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("name", &self.name)
            .field("ptype", &self.ptype)
            .field("promoted", &self.promoted)
            .field("state", &self.state)
            .finish()
    }
}

impl Instance {
    fn new(ptype: Arc<ProviderType>, name: String, promoted: &'static str) -> Self {
        let cell = ptype.new_cell();
        Instance {
            name,
            ptype,
            cell,
            promoted,
            state: Mutex::new(InitState::Pristine),
        }
    }

    /// Initializes this instance: dependencies first, then the provider's
    /// own capability. Runs at most once; repeated calls return the cached
    /// outcome.
    fn init(&self, config: &Config) -> ConfigResult<()> {
        {
            let mut state = self.state.lock();
            match &*state {
                InitState::Done => return Ok(()),
                InitState::Failed(message) => {
                    return Err(ConfigError::Init {
                        message: message.clone(),
                    })
                }
                InitState::Initializing => panic!(
                    "provider {}: initialization cycle escaped the dependency graph",
                    self.name
                ),
                InitState::Pristine => *state = InitState::Initializing,
            }
        }
        debug!(provider = %self.name, promoted = self.promoted, "initializing");
        let result = self.run_init(config);
        let mut state = self.state.lock();
        match result {
            Ok(()) => {
                *state = InitState::Done;
                Ok(())
            }
            Err(err) => {
                *state = InitState::Failed(err.to_string());
                Err(err)
            }
        }
    }

    fn run_init(&self, config: &Config) -> ConfigResult<()> {
        let requires = self.cell.erased.read().init_requires();
        for ty in requires {
            let slot = config.assign_unique(ty)?;
            let Some(dep) = config.slots[slot].instance else {
                return Err(ConfigError::NoProvider { ty: ty.name() });
            };
            config.instances[dep].init(config)?;
        }
        let deps = Deps { config };
        self.cell
            .erased
            .write()
            .init(&deps)
            .map_err(|err| ConfigError::Init {
                message: format!("init {}: {err:#}", self.name),
            })
    }

    /// Invokes the provider's setup capability with its declared
    /// dependencies initialized and resolved.
    fn setup(&self, config: &Config) -> anyhow::Result<()> {
        let requires = self.cell.erased.read().setup_requires();
        for ty in requires {
            let slot = config.assign_unique(ty)?;
            let Some(dep) = config.slots[slot].instance else {
                return Err(ConfigError::NoProvider { ty: ty.name() }.into());
            };
            config.instances[dep].init(config)?;
        }
        let deps = Deps { config };
        self.cell.erased.write().setup(&deps)
    }

    fn version(&self) -> u32 {
        self.cell.erased.read().version()
    }

    fn has_instance_config(&self) -> bool {
        self.cell.erased.write().instance_config().is_some()
    }
}

// ─── Deps ────────────────────────────────────────────────────────────────────

/// Dependency resolver handed to provider `init` and `setup` capabilities.
///
/// [`get`](Self::get) behaves like [`Config::instance`]: it resolves the
/// requested type to a unique slot and forces that instance's (memoized)
/// initialization.
pub struct Deps<'a> {
    config: &'a Config,
}

impl Deps<'_> {
    /// Resolves a declared dependency to its configured value.
    pub fn get<T: ?Sized + 'static>(&self) -> ConfigResult<Handle<T>> {
        self.config.instance::<T>()
    }
}

// ─── Config ──────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Slot {
    ty: Ty,
    key: String,
    instance: Option<usize>,
}

/// A concrete configuration of infrastructure providers.
///
/// Built by [`Schema::make`](crate::Schema::make); structurally immutable
/// afterwards. The only mutating operation is [`setup`](Self::setup), which
/// advances the per-provider version map.
#[derive(Debug)]
pub struct Config {
    keys: Keys,
    slots: Vec<Slot>,
    instances: Vec<Instance>,
    /// Instance indices, dependencies before dependents.
    order: Vec<usize>,
    versions: BTreeMap<String, u32>,
}

impl Config {
    pub(crate) fn build(
        registry: &Registry,
        slot_types: Vec<(Ty, String)>,
        keys: Keys,
    ) -> ConfigResult<Config> {
        let mut versions = BTreeMap::new();
        if let Some(v) = keys.value("versions") {
            versions = serde_yaml::from_value(v.clone())?;
        }
        let slots = slot_types
            .into_iter()
            .map(|(ty, key)| Slot {
                ty,
                key,
                instance: None,
            })
            .collect();
        let mut config = Config {
            keys,
            slots,
            instances: Vec::new(),
            order: Vec::new(),
            versions,
        };
        config.build_instances(registry)?;
        config.build_graph()?;
        Ok(config)
    }

    /// Instantiates a provider for every configured slot, absorbing flag
    /// arguments and restoring persisted state.
    fn build_instances(&mut self, registry: &Registry) -> ConfigResult<()> {
        let mut instance_keys = self.keys.keys("instances")?.unwrap_or_default();
        for si in 0..self.slots.len() {
            let key = self.slots[si].key.clone();
            let Some(raw) = self.keys.string(&key)? else {
                continue;
            };
            let (name, args) = split_spec(&raw);
            if name.is_empty() {
                // Missing providers only matter if the slot is requested later.
                continue;
            }
            let Some(ptype) = registry.lookup(name) else {
                return Err(ConfigError::UnknownProvider {
                    key,
                    name: name.to_string(),
                    package: package_of(name).to_string(),
                });
            };
            let slot_ty = self.slots[si].ty;
            let Some(promoted) = ptype.matches(slot_ty) else {
                return Err(ConfigError::TypeMismatch {
                    provider: ptype.ty().name(),
                    slot: slot_ty.name(),
                });
            };
            if promoted.is_empty() {
                debug!(key = %key, provider = %name, "provider bound");
            } else {
                debug!(key = %key, provider = %name, field = %promoted, "provider bound via embedded field");
            }
            let inst = Instance::new(ptype, name.to_string(), promoted);

            let mut flags = FlagSet::from_args(&args);
            inst.cell.erased.write().flags(&mut flags);
            if let Some((flag, message)) = flags.finish() {
                return Err(ConfigError::Flag {
                    provider: name.to_string(),
                    flag,
                    message,
                });
            }

            {
                let mut guard = inst.cell.erased.write();
                if let Some(state) = guard.config() {
                    if let Some(payload) = self.keys.value(name) {
                        state
                            .load(payload.clone())
                            .map_err(|source| ConfigError::State {
                                provider: name.to_string(),
                                source,
                            })?;
                    }
                    let saved = state.save().map_err(|source| ConfigError::State {
                        provider: name.to_string(),
                        source,
                    })?;
                    self.keys.set(name, saved);
                }
                if let Some(state) = guard.instance_config() {
                    if let Some(payload) = instance_keys.value(name) {
                        state
                            .load(payload.clone())
                            .map_err(|source| ConfigError::State {
                                provider: name.to_string(),
                                source,
                            })?;
                    }
                    let saved = state.save().map_err(|source| ConfigError::State {
                        provider: name.to_string(),
                        source,
                    })?;
                    instance_keys.set(name, saved);
                }
            }

            let idx = self.instances.len();
            self.instances.push(inst);
            self.slots[si].instance = Some(idx);
        }
        self.keys.set_keys("instances", instance_keys);
        Ok(())
    }

    /// Builds the dependency graph over the configured instances and stores
    /// the topological order.
    fn build_graph(&mut self) -> ConfigResult<()> {
        let mut graph = TopoSorter::new();
        for i in 0..self.instances.len() {
            graph.add(i, None);
            let (init_deps, setup_deps) = {
                let provider = self.instances[i].cell.erased.read();
                (provider.init_requires(), provider.setup_requires())
            };
            for ty in init_deps.into_iter().chain(setup_deps) {
                let slot = self.assign_unique(ty)?;
                if let Some(dep) = self.slots[slot].instance {
                    graph.add(i, Some(dep));
                }
            }
        }
        if let Some(cycle) = graph.cycle() {
            let names: Vec<&str> = cycle
                .iter()
                .map(|&i| self.instances[i].name.as_str())
                .collect();
            return Err(ConfigError::DependencyCycle {
                cycle: names.join("<-"),
            });
        }
        self.order = graph.sort();
        Ok(())
    }

    /// Resolves `ty` to the single matching slot.
    ///
    /// A slot matches when its declared type is `ty`, or when its configured
    /// instance exposes `ty` (concretely, as a capability set, or through a
    /// promoted field).
    fn assign_unique(&self, ty: Ty) -> ConfigResult<usize> {
        let mut matches = Vec::new();
        for (i, slot) in self.slots.iter().enumerate() {
            let hit = slot.ty == ty
                || slot
                    .instance
                    .is_some_and(|idx| self.instances[idx].ptype.matches(ty).is_some());
            if hit {
                matches.push(i);
            }
        }
        match matches.len() {
            0 => Err(ConfigError::NoProviders { ty: ty.name() }),
            1 => Ok(matches[0]),
            _ => Err(ConfigError::MultipleProviders {
                ty: ty.name(),
                matches: matches
                    .iter()
                    .map(|&i| self.slots[i].ty.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    /// Returns the configured value for type `T`, initializing the owning
    /// instance (and its dependencies) on first request.
    ///
    /// `T` may be the provider's concrete type, a capability set it exposes,
    /// or the type of one of its promoted fields.
    pub fn instance<T: ?Sized + 'static>(&self) -> ConfigResult<Handle<T>> {
        let ty = Ty::of::<T>();
        let slot = self.assign_unique(ty)?;
        let Some(idx) = self.slots[slot].instance else {
            return Err(ConfigError::NoProvider { ty: ty.name() });
        };
        let inst = &self.instances[idx];
        inst.init(self)?;
        let bound = inst
            .ptype
            .bind(ty, &inst.cell)
            .expect("matched slot exposes the requested type");
        let handle = bound
            .downcast::<Handle<T>>()
            .expect("exposure binds the requested handle type");
        Ok(*handle)
    }

    /// Like [`instance`](Self::instance), but terminates on error.
    pub fn must<T: ?Sized + 'static>(&self) -> Handle<T> {
        match self.instance::<T>() {
            Ok(handle) => handle,
            Err(err) => {
                error!(error = %err, "cannot provide instance");
                panic!("{err}");
            }
        }
    }

    /// Runs outstanding provider setup actions in dependency order.
    ///
    /// An instance is visited when its recorded version is absent or below
    /// its declared version; after a successful visit the version map is
    /// advanced. Already-advanced versions are retained on failure, so a
    /// re-run resumes where the pass stopped.
    pub fn setup(&mut self) -> ConfigResult<()> {
        for pos in 0..self.order.len() {
            let i = self.order[pos];
            let (name, version) = {
                let inst = &self.instances[i];
                (inst.name.clone(), inst.version())
            };
            if self.versions.get(&name).is_some_and(|&v| v >= version) {
                continue;
            }
            {
                let inst = &self.instances[i];
                inst.setup(self).map_err(|cause| ConfigError::Setup {
                    provider: name.clone(),
                    cause,
                })?;
            }
            info!(provider = %name, version, "setup complete");
            self.versions.insert(name, version);
        }
        Ok(())
    }

    /// Serializes the configuration through the codec.
    ///
    /// The emitted tree carries the configured keys, each provider's current
    /// persisted config, and the version map. With `include_instances`,
    /// instances holding instance state are initialized first so that state
    /// is populated, and the `instances` subtree is emitted as well.
    pub fn marshal(&self, include_instances: bool) -> ConfigResult<String> {
        let mut keys = self.keys.clone();
        keys.set("versions", serde_yaml::to_value(&self.versions)?);
        if include_instances {
            for &i in &self.order {
                let inst = &self.instances[i];
                if inst.has_instance_config() {
                    inst.init(self)?;
                }
            }
            let mut instance_keys = keys.keys("instances")?.unwrap_or_default();
            for inst in &self.instances {
                let mut guard = inst.cell.erased.write();
                if let Some(state) = guard.instance_config() {
                    let saved = state.save().map_err(|source| ConfigError::State {
                        provider: inst.name.clone(),
                        source,
                    })?;
                    instance_keys.set(inst.name.clone(), saved);
                }
            }
            keys.set_keys("instances", instance_keys);
        } else {
            keys.remove("instances");
        }
        for inst in &self.instances {
            let mut guard = inst.cell.erased.write();
            if let Some(state) = guard.config() {
                let saved = state.save().map_err(|source| ConfigError::State {
                    provider: inst.name.clone(),
                    source,
                })?;
                keys.set(inst.name.clone(), saved);
            }
        }
        Ok(serde_yaml::to_string(&keys)?)
    }

    /// The configuration's key tree.
    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    /// Last successfully set-up version of the named provider.
    pub fn version_of(&self, provider: &str) -> Option<u32> {
        self.versions.get(provider).copied()
    }
}

/// Splits a configuration value into the provider name and its argument
/// list. The head runs to the first comma.
fn split_spec(raw: &str) -> (&str, Vec<&str>) {
    match raw.split_once(',') {
        Some((name, tail)) => (name, tail.split(',').collect()),
        None => (raw, Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_spec() {
        assert_eq!(split_spec("testcreds"), ("testcreds", vec![]));
        assert_eq!(
            split_spec("testcreds,user=alice,verbose"),
            ("testcreds", vec!["user=alice", "verbose"])
        );
        assert_eq!(split_spec(""), ("", vec![]));
    }
}
