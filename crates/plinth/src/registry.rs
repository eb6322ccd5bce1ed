//! The process-wide provider registry and provider descriptors.
//!
//! Provider libraries register an implementation name together with a
//! descriptor describing the provider's concrete type and the slot types it
//! can satisfy. Registration happens during program initialization, before
//! any schema is made; the registry is read-only afterwards.
//!
//! # Registering a provider
//!
//! ```rust,ignore
//! plinth::register(
//!     ProviderType::new::<AwsSession>("awssession")
//!         .exposes::<dyn CloudSession>(|cell| cell)
//!         .build(),
//! );
//! ```
//!
//! The `exposes` declaration is the capability-set adapter: the closure is
//! the unsizing coercion from the concrete handle to the capability handle.
//! `promotes` declares an embedded field that can satisfy a slot the whole
//! provider does not satisfy directly; the first matching declaration wins.

use std::any::Any;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;
use regex_lite::Regex;
use tracing::info;

use crate::error::{ConfigError, ConfigResult};
use crate::flags::{FlagSet, FlagSpec};
use crate::provider::{shared, Handle, Provider};
use crate::token::Ty;

// ─── Name validation ─────────────────────────────────────────────────────────

/// Provider names are lowercase paths (`[a-z][a-z0-9._/-]*`), optionally
/// package-qualified with a final `.Segment` that may be capitalized, as in
/// `github.com/x/y.Foo`.
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z][a-z0-9._/-]*(\.[A-Za-z][A-Za-z0-9_]*)?$").expect("name pattern")
});

fn valid_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

/// Returns the package prefix of a provider name: everything before the last
/// `.`, or the whole name when it has none.
pub(crate) fn package_of(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

// ─── ProviderCell ────────────────────────────────────────────────────────────

/// One live provider value, viewed two ways: erased for the engine's
/// lifecycle calls, typed (behind `Any`) for exposure bindings. Both views
/// share the same lock.
pub(crate) struct ProviderCell {
    pub(crate) erased: Arc<RwLock<dyn Provider>>,
    typed: Box<dyn Any + Send + Sync>,
}

impl std::fmt::Debug for ProviderCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCell").finish_non_exhaustive()
    }
}

// ─── Exposures ───────────────────────────────────────────────────────────────

type BindFn = Box<dyn Fn(&(dyn Any + Send + Sync)) -> Box<dyn Any> + Send + Sync>;

/// A declared way for a provider to satisfy a slot type: directly (its own
/// concrete type or a capability set, `field == ""`) or through a promoted
/// field (`field` names it).
struct Exposure {
    ty: Ty,
    field: &'static str,
    bind: BindFn,
}

// ─── ProviderType ────────────────────────────────────────────────────────────

/// Descriptor for a registered provider: a name paired with the provider's
/// concrete type token, a factory for fresh instances, and the exposure
/// table used for slot matching.
pub struct ProviderType {
    name: &'static str,
    ty: Ty,
    make: Box<dyn Fn() -> ProviderCell + Send + Sync>,
    exposures: Vec<Exposure>,
}

impl std::fmt::Debug for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderType")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}

impl ProviderType {
    /// Starts a descriptor for provider type `P`, instantiated from its
    /// [`Default`] value.
    pub fn new<P: Provider + Default>(name: &'static str) -> ProviderTypeBuilder<P> {
        ProviderTypeBuilder {
            name,
            exposures: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// The registered implementation name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The provider's concrete type token.
    pub fn ty(&self) -> Ty {
        self.ty
    }

    /// One-line description from the provider's `help` capability.
    pub fn help(&self) -> Option<&'static str> {
        (self.make)().erased.read().help()
    }

    /// Flags accepted in this provider's configuration arguments, for help
    /// output.
    pub fn flag_specs(&self) -> Vec<FlagSpec> {
        let cell = (self.make)();
        let mut flags = FlagSet::from_args::<&str>(&[]);
        cell.erased.write().flags(&mut flags);
        flags.specs().to_vec()
    }

    /// Allocates a fresh zero-valued provider cell.
    pub(crate) fn new_cell(&self) -> ProviderCell {
        (self.make)()
    }

    /// Verifies that the descriptor is internally consistent: the factory's
    /// value must satisfy the descriptor's own concrete type directly.
    pub fn typecheck(&self) -> ConfigResult<()> {
        let cell = (self.make)();
        match self.exposure(self.ty) {
            Some(e) if e.field.is_empty() => {
                let _ = (e.bind)(cell.typed.as_ref());
                Ok(())
            }
            _ => Err(ConfigError::InvalidProvider {
                name: self.name.to_string(),
                message: format!("factory does not produce a {}", self.ty),
            }),
        }
    }

    fn exposure(&self, ty: Ty) -> Option<&Exposure> {
        self.exposures
            .iter()
            .find(|e| e.ty == ty && e.field.is_empty())
            .or_else(|| self.exposures.iter().find(|e| e.ty == ty))
    }

    /// Decides whether this provider satisfies the slot type `ty`.
    ///
    /// Returns the promoted field name the match goes through, or `""` for a
    /// direct match.
    pub(crate) fn matches(&self, ty: Ty) -> Option<&'static str> {
        self.exposure(ty).map(|e| e.field)
    }

    /// Produces the bound value for slot type `ty` from a live cell.
    pub(crate) fn bind(&self, ty: Ty, cell: &ProviderCell) -> Option<Box<dyn Any>> {
        self.exposure(ty).map(|e| (e.bind)(cell.typed.as_ref()))
    }
}

/// Builder collecting the exposure declarations for a provider type.
pub struct ProviderTypeBuilder<P> {
    name: &'static str,
    exposures: Vec<Exposure>,
    _marker: PhantomData<fn() -> P>,
}

impl<P: Provider + Default> ProviderTypeBuilder<P> {
    /// Declares that the provider satisfies the capability set `D`.
    ///
    /// The closure performs the coercion from the concrete handle; for a
    /// trait the provider implements, `|cell| cell` suffices.
    pub fn exposes<D: ?Sized + 'static>(mut self, cast: fn(Handle<P>) -> Handle<D>) -> Self {
        self.exposures.push(Exposure {
            ty: Ty::of::<D>(),
            field: "",
            bind: Box::new(move |typed| {
                let cell = typed
                    .downcast_ref::<Handle<P>>()
                    .expect("provider cell holds its declared type");
                Box::new(cast(Arc::clone(cell)))
            }),
        });
        self
    }

    /// Declares an embedded field that satisfies the slot type `F`.
    ///
    /// The closure extracts the bound value from the (initialized) provider;
    /// value-typed fields are cloned into a fresh handle with
    /// [`shared`](crate::shared), handle-typed fields are returned as-is.
    pub fn promotes<F: ?Sized + 'static>(
        mut self,
        field: &'static str,
        get: fn(&P) -> Handle<F>,
    ) -> Self {
        self.exposures.push(Exposure {
            ty: Ty::of::<F>(),
            field,
            bind: Box::new(move |typed| {
                let cell = typed
                    .downcast_ref::<Handle<P>>()
                    .expect("provider cell holds its declared type");
                Box::new(get(&cell.read()))
            }),
        });
        self
    }

    /// Finishes the descriptor.
    pub fn build(self) -> ProviderType {
        let mut exposures = vec![Exposure {
            ty: Ty::of::<P>(),
            field: "",
            bind: Box::new(|typed| {
                let cell = typed
                    .downcast_ref::<Handle<P>>()
                    .expect("provider cell holds its declared type");
                Box::new(Arc::clone(cell))
            }),
        }];
        exposures.extend(self.exposures);
        ProviderType {
            name: self.name,
            ty: Ty::of::<P>(),
            make: Box::new(|| {
                let cell: Handle<P> = shared(P::default());
                let erased: Arc<RwLock<dyn Provider>> = cell.clone();
                ProviderCell {
                    erased,
                    typed: Box::new(cell),
                }
            }),
            exposures,
        }
    }
}

// ─── Registry ────────────────────────────────────────────────────────────────

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::new);

/// A mapping from implementation names to provider descriptors.
///
/// The process-wide default is [`Registry::global`]; an explicit instance
/// can be used instead (e.g. in tests) via
/// [`Schema::make_with`](crate::Schema::make_with).
///
/// Registration problems — an invalid name, a duplicate name, a descriptor
/// failing its typecheck — are programming errors and panic.
#[derive(Default)]
pub struct Registry {
    providers: RwLock<HashMap<String, Arc<ProviderType>>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by [`Schema::make`](crate::Schema::make).
    pub fn global() -> &'static Registry {
        &GLOBAL
    }

    /// Registers a provider descriptor under its name.
    ///
    /// # Panics
    ///
    /// Panics when the name is invalid, the name is already registered, or
    /// the descriptor fails its typecheck.
    pub fn register(&self, ptype: ProviderType) {
        let name = ptype.name();
        if !valid_name(name) {
            panic!("Registry: invalid provider name {name:?}");
        }
        if let Err(err) = ptype.typecheck() {
            panic!("Registry: {err}");
        }
        let mut providers = self.providers.write();
        if providers.contains_key(name) {
            panic!("Registry: provider {name} already registered");
        }
        info!(provider = %name, ty = %ptype.ty(), "provider registered");
        providers.insert(name.to_string(), Arc::new(ptype));
    }

    /// Looks up a descriptor by name.
    pub fn lookup(&self, name: &str) -> Option<Arc<ProviderType>> {
        self.providers.read().get(name).cloned()
    }

    /// Names of all registered providers, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.read().keys().cloned().collect();
        names.sort();
        names
    }
}

/// Registers a provider descriptor in the global registry.
pub fn register(ptype: ProviderType) {
    Registry::global().register(ptype);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct NullProvider;

    impl Provider for NullProvider {
        fn help(&self) -> Option<&'static str> {
            Some("does nothing")
        }
    }

    trait Named {
        fn name(&self) -> &str;
    }

    #[derive(Default)]
    struct NamedProvider {
        label: String,
    }

    impl Named for NamedProvider {
        fn name(&self) -> &str {
            &self.label
        }
    }

    impl Provider for NamedProvider {}

    #[test]
    fn test_valid_names() {
        for name in ["test", "ec2cluster", "a.b-c_d/e", "github.com/x/y.Foo"] {
            assert!(valid_name(name), "rejected {name:?}");
        }
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "CAPS", "232*772", "9lives", "Caps.tail", "a b"] {
            assert!(!valid_name(name), "accepted {name:?}");
        }
    }

    #[test]
    fn test_package_prefix() {
        assert_eq!(package_of("xyz/pkg.Missing"), "xyz/pkg");
        assert_eq!(package_of("plain"), "plain");
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = Registry::new();
        registry.register(ProviderType::new::<NullProvider>("null").build());
        let ptype = registry.lookup("null").expect("registered");
        assert_eq!(ptype.name(), "null");
        assert_eq!(ptype.ty(), Ty::of::<NullProvider>());
        assert_eq!(ptype.help(), Some("does nothing"));
        assert!(registry.lookup("absent").is_none());
        assert_eq!(registry.names(), vec!["null".to_string()]);
    }

    #[test]
    #[should_panic(expected = "invalid provider name")]
    fn test_register_rejects_caps() {
        Registry::new().register(ProviderType::new::<NullProvider>("CAPS").build());
    }

    #[test]
    #[should_panic(expected = "invalid provider name")]
    fn test_register_rejects_special_characters() {
        Registry::new().register(ProviderType::new::<NullProvider>("232*772").build());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_register_rejects_duplicates() {
        let registry = Registry::new();
        registry.register(ProviderType::new::<NullProvider>("dup").build());
        registry.register(ProviderType::new::<NullProvider>("dup").build());
    }

    #[test]
    fn test_matches_concrete_and_capability() {
        let ptype = ProviderType::new::<NamedProvider>("named")
            .exposes::<dyn Named>(|cell| cell)
            .build();
        assert_eq!(ptype.matches(Ty::of::<NamedProvider>()), Some(""));
        assert_eq!(ptype.matches(Ty::of::<dyn Named>()), Some(""));
        assert_eq!(ptype.matches(Ty::of::<NullProvider>()), None);
    }

    #[test]
    fn test_promoted_field_name_is_recorded() {
        let ptype = ProviderType::new::<NamedProvider>("named")
            .promotes::<String>("label", |p| shared(p.label.clone()))
            .build();
        assert_eq!(ptype.matches(Ty::of::<String>()), Some("label"));
    }

    #[test]
    fn test_typecheck() {
        let ptype = ProviderType::new::<NullProvider>("null").build();
        ptype.typecheck().expect("consistent descriptor");
    }
}
