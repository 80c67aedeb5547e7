use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::env as stdenv;

/// A single shell variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Current value, possibly empty.
    pub value: String,
    /// Whether the variable is passed to child processes.
    pub exported: bool,
}

/// Table of shell variables keyed by name.
///
/// Plain storage: lookups of special parameters (`$?`, `$$`, ...) live in
/// [`crate::env::Environment`], not here.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    table: BTreeMap<String, Variable>,
}

impl Variables {
    /// Import the process environment; every imported variable is exported.
    pub fn from_process() -> Self {
        let table = stdenv::vars()
            .map(|(name, value)| {
                (
                    name,
                    Variable {
                        value,
                        exported: true,
                    },
                )
            })
            .collect();
        Self { table }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.table.get(name).map(|var| var.value.as_str())
    }

    /// Set `name` to `value`, keeping its exported flag. Returns the previous value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        let value = value.into();
        match self.table.entry(name.into()) {
            Entry::Occupied(mut slot) => {
                Some(std::mem::replace(&mut slot.get_mut().value, value))
            }
            Entry::Vacant(slot) => {
                slot.insert(Variable {
                    value,
                    exported: false,
                });
                None
            }
        }
    }

    /// Set `name` to `value` and mark it exported. Returns the previous value.
    pub fn set_exported(
        &mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Option<String> {
        let name = name.into();
        let previous = self.set(name.clone(), value);
        self.export(&name);
        previous
    }

    /// Mark an existing variable as exported. Returns `false` when it is not set.
    pub fn export(&mut self, name: &str) -> bool {
        match self.table.get_mut(name) {
            Some(var) => {
                var.exported = true;
                true
            }
            None => false,
        }
    }

    /// Remove `name`, reporting whether it was present.
    pub fn unset(&mut self, name: &str) -> bool {
        self.table.remove(name).is_some()
    }

    /// All variables, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Variable)> {
        self.table.iter().map(|(name, var)| (name.as_str(), var))
    }

    /// Exported variables, sorted by name.
    pub fn exported(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter()
            .filter(|(_, var)| var.exported)
            .map(|(name, var)| (name, var.value.as_str()))
    }
}

/// `[A-Za-z_][A-Za-z0-9_]*`
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_and_overwrite() {
        let mut vars = Variables::default();
        assert_eq!(vars.get("FOO"), None);

        assert_eq!(vars.set("FOO", "one"), None);
        assert_eq!(vars.get("FOO"), Some("one"));

        assert_eq!(vars.set("FOO", "two"), Some("one".to_string()));
        assert_eq!(vars.get("FOO"), Some("two"));
        assert_eq!(vars.iter().count(), 1);
    }

    #[test]
    fn test_unset_reports_presence() {
        let mut vars = Variables::default();
        vars.set("FOO", "");
        assert!(vars.unset("FOO"));
        assert!(!vars.unset("FOO"));
        assert_eq!(vars.get("FOO"), None);
    }

    #[test]
    fn test_export_flag_survives_reassignment() {
        let mut vars = Variables::default();
        vars.set("LOCAL", "1");
        vars.set_exported("SHARED", "a");
        vars.set("SHARED", "b");

        let exported: Vec<_> = vars.exported().collect();
        assert_eq!(exported, vec![("SHARED", "b")]);

        assert!(vars.export("LOCAL"));
        assert!(!vars.export("MISSING"));
        assert_eq!(vars.exported().count(), 2);
    }

    #[test]
    fn test_process_environment_is_exported() {
        let vars = Variables::from_process();
        assert!(vars.get("PATH").is_some());
        assert!(vars.exported().any(|(name, _)| name == "PATH"));
    }

    #[test]
    fn test_valid_names() {
        assert!(is_valid_name("_foo9"));
        assert!(is_valid_name("PATH"));
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("9lives"));
        assert!(!is_valid_name("a-b"));
    }
}
