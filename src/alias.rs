use std::collections::BTreeMap;

/// Alias table: name → replacement text for the command word.
#[derive(Debug, Clone, Default)]
pub struct Aliases {
    table: BTreeMap<String, String>,
}

impl Aliases {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.table.get(name).map(String::as_str)
    }

    /// Define or replace an alias. Returns the previous expansion.
    pub fn set(&mut self, name: impl Into<String>, expansion: impl Into<String>) -> Option<String> {
        self.table.insert(name.into(), expansion.into())
    }

    pub fn unset(&mut self, name: &str) -> bool {
        self.table.remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Aliases sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.table.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
