//! # Plinth
//!
//! **Plinth** is an infrastructure configuration and dependency-injection
//! engine for cloud-management programs. A [`Schema`] declares which slot
//! types a program needs under which keys; a configuration ([`Keys`])
//! selects a registered provider for each key; the resulting [`Config`]
//! wires the providers together by their declared dependencies and serves
//! typed values straight from the graph.
//!
//! ## Overview
//!
//! - Providers implement [`Provider`] and are registered once at program
//!   start under a name ([`register`] / [`Registry`]).
//! - [`Schema::make`] resolves each configured key, checks provider types
//!   against their slots (including capability sets and embedded-field
//!   promotion), builds the dependency graph, and rejects cycles.
//! - [`Config::instance`] initializes the owning instance lazily — each
//!   instance at most once, dependencies strictly first — and returns a
//!   shared [`Handle`] to the value.
//! - [`Config::setup`] applies versioned one-shot side-effects per
//!   provider; a provider's setup runs again only when its recorded version
//!   falls behind its declared one.
//! - [`Config::marshal`] emits the whole configured state (including
//!   optional per-provider instance state) as YAML, and
//!   [`Schema::unmarshal`] restores it.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use plinth::{Keys, ProviderType, Schema};
//!
//! plinth::register(ProviderType::new::<AwsSession>("awssession").build());
//! plinth::register(
//!     ProviderType::new::<Ec2Cluster>("ec2cluster")
//!         .exposes::<dyn Cluster>(|cell| cell)
//!         .build(),
//! );
//!
//! let schema = Schema::new()
//!     .slot::<AwsSession>("session")
//!     .slot::<dyn Cluster>("cluster");
//! let config = schema.make(
//!     Keys::new()
//!         .with("session", "awssession")
//!         .with("cluster", "ec2cluster,disksize=200"),
//! )?;
//!
//! let cluster = config.instance::<dyn Cluster>()?;
//! config.setup()?;
//! let persisted = config.marshal(true)?;
//! ```
//!
//! ## Concurrency
//!
//! The engine is single-threaded cooperative: it performs no internal
//! parallelism and takes no timeouts. The registry is the only process-wide
//! state and must be populated before the first schema is made. A `Config`
//! is owned by one caller at a time; concurrent lookups require external
//! synchronization.

mod config;
mod error;
mod flags;
mod keys;
mod provider;
mod registry;
mod schema;
mod token;
mod toposort;

pub use config::{Config, Deps};
pub use error::{ConfigError, ConfigResult};
pub use flags::{FlagSet, FlagSpec};
pub use keys::Keys;
pub use provider::{shared, Handle, Persist, Provider};
pub use registry::{register, ProviderType, ProviderTypeBuilder, Registry};
pub use schema::Schema;
pub use token::Ty;
