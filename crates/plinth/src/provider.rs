//! The provider capability surface.
//!
//! A provider is a named, registered construct that exposes a typed value to
//! the configuration graph. All capabilities are optional: the default
//! implementations declare no dependencies, no flags, no persisted state,
//! and version 0.
//!
//! # Example
//!
//! ```rust,ignore
//! #[derive(Default, Serialize, Deserialize)]
//! #[serde(default)]
//! struct Ec2Cluster {
//!     instance_type: String,
//!     #[serde(skip)]
//!     session: Option<Handle<AwsSession>>,
//! }
//!
//! impl Provider for Ec2Cluster {
//!     fn init_requires(&self) -> Vec<Ty> {
//!         vec![Ty::of::<AwsSession>()]
//!     }
//!
//!     fn init(&mut self, deps: &Deps<'_>) -> anyhow::Result<()> {
//!         self.session = Some(deps.get::<AwsSession>()?);
//!         Ok(())
//!     }
//!
//!     fn config(&mut self) -> Option<&mut dyn Persist> {
//!         Some(self)
//!     }
//! }
//! ```

use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_yaml::Value;

use crate::config::Deps;
use crate::flags::FlagSet;
use crate::token::Ty;

/// Shared handle to a configured value.
///
/// Every lookup of the same instance observes the same underlying value, so
/// mutations made by a later `setup` pass are visible through handles issued
/// earlier.
pub type Handle<T> = Arc<RwLock<T>>;

/// Wraps `value` in a fresh [`Handle`].
pub fn shared<T>(value: T) -> Handle<T> {
    Arc::new(RwLock::new(value))
}

/// Opaque persisted state, round-tripped through the serialization codec.
///
/// The engine never inspects the shape of persisted state; it saves the
/// value into the configuration tree and loads it back on restore. The
/// blanket implementation covers any serde-capable type, so providers
/// usually return `Some(self)` or `Some(&mut self.field)` from
/// [`Provider::config`] / [`Provider::instance_config`].
pub trait Persist {
    /// Serializes the current state.
    fn save(&self) -> Result<Value, serde_yaml::Error>;

    /// Replaces the current state with the deserialized `value`.
    fn load(&mut self, value: Value) -> Result<(), serde_yaml::Error>;
}

impl<T: Serialize + DeserializeOwned> Persist for T {
    fn save(&self) -> Result<Value, serde_yaml::Error> {
        serde_yaml::to_value(self)
    }

    fn load(&mut self, value: Value) -> Result<(), serde_yaml::Error> {
        *self = serde_yaml::from_value(value)?;
        Ok(())
    }
}

/// A configurable infrastructure provider.
///
/// Providers are registered once at program start under a name (see
/// [`Registry::register`](crate::Registry::register)) and instantiated from
/// their [`Default`] value when a configuration selects them.
///
/// # Dependencies
///
/// Dependency discovery is explicit: [`init_requires`](Self::init_requires)
/// and [`setup_requires`](Self::setup_requires) list the slot types this
/// provider needs, and the corresponding capability resolves them through
/// [`Deps::get`]. Every declared dependency is initialized to completion
/// before this provider's `init` body runs.
pub trait Provider: Any + Send + Sync {
    /// Slot types that must be initialized before [`init`](Self::init).
    fn init_requires(&self) -> Vec<Ty> {
        Vec::new()
    }

    /// Initialization capability. Runs at most once per instance; both the
    /// success and the failure are memoized.
    fn init(&mut self, deps: &Deps<'_>) -> anyhow::Result<()> {
        let _ = deps;
        Ok(())
    }

    /// Slot types passed to [`setup`](Self::setup).
    fn setup_requires(&self) -> Vec<Ty> {
        Vec::new()
    }

    /// Setup capability: idempotent one-shot side-effects, gated by
    /// [`version`](Self::version). May mutate persisted state to record
    /// identifiers produced by the side-effects.
    fn setup(&mut self, deps: &Deps<'_>) -> anyhow::Result<()> {
        let _ = deps;
        Ok(())
    }

    /// Declared setup version. Setup runs again whenever the recorded
    /// version for this provider is below this value.
    fn version(&self) -> u32 {
        0
    }

    /// User-editable persisted state, stored in the configuration tree
    /// under the provider's registered name.
    fn config(&mut self) -> Option<&mut dyn Persist> {
        None
    }

    /// Engine-written persisted state, stored under
    /// `instances/<provider-name>`.
    fn instance_config(&mut self) -> Option<&mut dyn Persist> {
        None
    }

    /// Declares the flags that absorb this provider's configuration
    /// arguments.
    fn flags(&mut self, flags: &mut FlagSet) {
        let _ = flags;
    }

    /// One-line description for help output.
    fn help(&self) -> Option<&'static str> {
        None
    }
}
