//! Type tokens for schema slots.

use std::any::TypeId;
use std::fmt;

/// A token identifying a slot type: either a concrete provider type or a
/// capability set (a trait-object type such as `dyn Credentials`).
///
/// Two tokens are equal exactly when they identify the same Rust type; the
/// captured type name is carried for diagnostics only.
///
/// # Example
///
/// ```rust,ignore
/// let concrete = Ty::of::<Ec2Cluster>();
/// let capability = Ty::of::<dyn Credentials>();
/// assert_ne!(concrete, capability);
/// ```
#[derive(Clone, Copy, Debug)]
pub struct Ty {
    id: TypeId,
    name: &'static str,
}

impl Ty {
    /// Returns the token for `T`.
    pub fn of<T: ?Sized + 'static>() -> Self {
        Ty {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying `TypeId`.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Human-readable name of the identified type.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for Ty {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Ty {}

impl std::hash::Hash for Ty {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Capability {}

    struct Concrete;

    #[test]
    fn test_identity() {
        assert_eq!(Ty::of::<Concrete>(), Ty::of::<Concrete>());
        assert_ne!(Ty::of::<Concrete>(), Ty::of::<dyn Capability>());
        assert_eq!(Ty::of::<dyn Capability>(), Ty::of::<dyn Capability>());
    }

    #[test]
    fn test_name_is_displayed() {
        let ty = Ty::of::<Concrete>();
        assert!(ty.to_string().ends_with("Concrete"));
        assert!(Ty::of::<dyn Capability>().to_string().contains("Capability"));
    }
}
