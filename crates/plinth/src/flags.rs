//! Flag parsing for provider arguments.
//!
//! The configuration string for a schema key has the form
//! `"<provider-name>[,arg[,arg…]]"`. Each argument is `key=value`, or a bare
//! `key` for booleans. A provider absorbs the arguments by declaring its
//! flags in [`Provider::flags`](crate::Provider::flags):
//!
//! ```rust,ignore
//! fn flags(&mut self, flags: &mut FlagSet) {
//!     flags.string_var(&mut self.profile, "profile", "credential profile to use");
//!     flags.bool_var(&mut self.readonly, "readonly", "open the store read-only");
//! }
//! ```
//!
//! Declared flags also carry a usage string, so a registered provider's
//! accepted arguments can be rendered for help output.

/// Declaration record for a single flag.
#[derive(Clone, Copy, Debug)]
pub struct FlagSpec {
    /// Flag name as written in the configuration string.
    pub name: &'static str,
    /// One-line usage description.
    pub usage: &'static str,
}

struct PendingArg {
    name: String,
    value: Option<String>,
    consumed: bool,
}

/// A set of flags populated from one provider's configuration arguments.
///
/// The engine parses the comma-separated argument list, hands the set to the
/// provider's `flags` capability, and then reports the first argument that no
/// declared flag consumed, or the first value that failed to parse.
pub struct FlagSet {
    pending: Vec<PendingArg>,
    specs: Vec<FlagSpec>,
    errors: Vec<(String, String)>,
}

impl FlagSet {
    /// Builds a set from raw `key=value` / `key` argument tokens, splitting
    /// each on the first `=`.
    pub(crate) fn from_args<S: AsRef<str>>(args: &[S]) -> Self {
        let pending = args
            .iter()
            .map(|arg| {
                let arg = arg.as_ref();
                let (name, value) = match arg.split_once('=') {
                    Some((name, value)) => (name.to_string(), Some(value.to_string())),
                    None => (arg.to_string(), None),
                };
                PendingArg {
                    name,
                    value,
                    consumed: false,
                }
            })
            .collect();
        FlagSet {
            pending,
            specs: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Declares a string flag bound to `target`.
    ///
    /// A bare occurrence sets the empty string.
    pub fn string_var(&mut self, target: &mut String, name: &'static str, usage: &'static str) {
        self.specs.push(FlagSpec { name, usage });
        for arg in self.pending.iter_mut().filter(|a| a.name == name) {
            arg.consumed = true;
            *target = arg.value.clone().unwrap_or_default();
        }
    }

    /// Declares a boolean flag bound to `target`.
    ///
    /// A bare occurrence sets `true`; otherwise the value must be one of
    /// `true`, `false`, `1`, `0`.
    pub fn bool_var(&mut self, target: &mut bool, name: &'static str, usage: &'static str) {
        self.specs.push(FlagSpec { name, usage });
        let mut errors = Vec::new();
        for arg in self.pending.iter_mut().filter(|a| a.name == name) {
            arg.consumed = true;
            match arg.value.as_deref() {
                None | Some("true") | Some("1") => *target = true,
                Some("false") | Some("0") => *target = false,
                Some(other) => errors.push((
                    name.to_string(),
                    format!("invalid boolean value {other:?}"),
                )),
            }
        }
        self.errors.extend(errors);
    }

    /// Declares an integer flag bound to `target`.
    pub fn int_var(&mut self, target: &mut i64, name: &'static str, usage: &'static str) {
        self.specs.push(FlagSpec { name, usage });
        let mut errors = Vec::new();
        for arg in self.pending.iter_mut().filter(|a| a.name == name) {
            arg.consumed = true;
            match arg.value.as_deref().unwrap_or("").parse::<i64>() {
                Ok(v) => *target = v,
                Err(err) => errors.push((name.to_string(), err.to_string())),
            }
        }
        self.errors.extend(errors);
    }

    /// Flags declared so far, in declaration order.
    pub fn specs(&self) -> &[FlagSpec] {
        &self.specs
    }

    /// Returns the first parse failure or unconsumed argument as
    /// `(flag, message)`, if any.
    pub(crate) fn finish(self) -> Option<(String, String)> {
        if let Some((flag, message)) = self.errors.into_iter().next() {
            return Some((flag, message));
        }
        self.pending
            .into_iter()
            .find(|arg| !arg.consumed)
            .map(|arg| (arg.name, "no such flag".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_flag() {
        let mut flags = FlagSet::from_args(&["user=alice"]);
        let mut user = String::new();
        flags.string_var(&mut user, "user", "the user name");
        assert_eq!(user, "alice");
        assert!(flags.finish().is_none());
    }

    #[test]
    fn test_value_splits_on_first_equals() {
        let mut flags = FlagSet::from_args(&["token=a=b=c"]);
        let mut token = String::new();
        flags.string_var(&mut token, "token", "");
        assert_eq!(token, "a=b=c");
        assert!(flags.finish().is_none());
    }

    #[test]
    fn test_bare_boolean() {
        let mut flags = FlagSet::from_args(&["readonly"]);
        let mut readonly = false;
        flags.bool_var(&mut readonly, "readonly", "");
        assert!(readonly);
        assert!(flags.finish().is_none());
    }

    #[test]
    fn test_boolean_values() {
        let mut flags = FlagSet::from_args(&["a=false", "b=1"]);
        let (mut a, mut b) = (true, false);
        flags.bool_var(&mut a, "a", "");
        flags.bool_var(&mut b, "b", "");
        assert!(!a);
        assert!(b);
        assert!(flags.finish().is_none());
    }

    #[test]
    fn test_bad_boolean_reports_flag() {
        let mut flags = FlagSet::from_args(&["a=maybe"]);
        let mut a = false;
        flags.bool_var(&mut a, "a", "");
        let (flag, message) = flags.finish().expect("parse failure expected");
        assert_eq!(flag, "a");
        assert!(message.contains("maybe"));
    }

    #[test]
    fn test_int_flag() {
        let mut flags = FlagSet::from_args(&["replicas=12"]);
        let mut replicas = 0i64;
        flags.int_var(&mut replicas, "replicas", "");
        assert_eq!(replicas, 12);
        assert!(flags.finish().is_none());
    }

    #[test]
    fn test_unknown_flag() {
        let mut flags = FlagSet::from_args(&["bogus=1"]);
        let mut user = String::new();
        flags.string_var(&mut user, "user", "");
        let (flag, message) = flags.finish().expect("unknown flag expected");
        assert_eq!(flag, "bogus");
        assert_eq!(message, "no such flag");
    }

    #[test]
    fn test_usage_collection() {
        let mut flags = FlagSet::from_args::<&str>(&[]);
        let mut user = String::new();
        flags.string_var(&mut user, "user", "the user name");
        assert_eq!(flags.specs().len(), 1);
        assert_eq!(flags.specs()[0].name, "user");
        assert_eq!(flags.specs()[0].usage, "the user name");
    }
}
