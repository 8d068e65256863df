//! Parameters, settings and configurations.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named tuning parameter and its candidate values, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub values: Vec<usize>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, values: Vec<usize>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// One parameter bound to one value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Setting {
    pub name: String,
    pub value: usize,
}

impl Setting {
    pub fn new(name: impl Into<String>, value: usize) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Preprocessor line injected in front of the kernel source.
    pub fn define(&self) -> String {
        format!("#define {} {}\n", self.name, self.value)
    }

    /// `{"NAME",VALUE}` as used by device databases.
    pub fn database_entry(&self) -> String {
        format!("{{\"{}\",{}}}", self.name, self.value)
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.value)
    }
}

/// One complete assignment of values to all declared parameters.
///
/// Settings appear in parameter declaration order. A configuration is never
/// modified after enumeration; searchers address configurations by their index
/// in the enumerated list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Configuration {
    settings: Vec<Setting>,
}

impl Configuration {
    pub fn new(settings: Vec<Setting>) -> Self {
        Self { settings }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn settings(&self) -> &[Setting] {
        &self.settings
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Setting> {
        self.settings.iter()
    }

    /// Values in declaration order.
    pub fn values(&self) -> Vec<usize> {
        self.settings.iter().map(|s| s.value).collect()
    }

    pub fn value_of(&self, name: &str) -> Option<usize> {
        self.settings
            .iter()
            .find(|setting| setting.name == name)
            .map(|setting| setting.value)
    }

    /// Values of the named parameters, in the order the names are given.
    /// Names that do not resolve are skipped; callers compare lengths.
    pub fn lookup(&self, names: &[String]) -> Vec<usize> {
        names.iter().filter_map(|name| self.value_of(name)).collect()
    }

    /// Number of positions whose values differ from `other`.
    pub fn differences(&self, other: &Configuration) -> usize {
        self.settings
            .iter()
            .zip(other.settings.iter())
            .filter(|(a, b)| a.value != b.value)
            .count()
    }

    /// All settings rendered as `#define` lines.
    pub fn defines(&self) -> String {
        self.settings.iter().map(Setting::define).collect()
    }

    /// Prepends the settings as `#define` lines to a kernel source.
    pub fn inject_into(&self, source: &str) -> String {
        let mut out = self.defines();
        out.push_str(source);
        out
    }

    pub fn database_entry(&self) -> String {
        let entries: Vec<String> = self.settings.iter().map(Setting::database_entry).collect();
        format!("{{ {} }}", entries.join(", "))
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.settings.iter().map(|s| s.to_string()).collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl<'a> IntoIterator for &'a Configuration {
    type Item = &'a Setting;
    type IntoIter = std::slice::Iter<'a, Setting>;

    fn into_iter(self) -> Self::IntoIter {
        self.settings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, usize)]) -> Configuration {
        Configuration::new(pairs.iter().map(|(n, v)| Setting::new(*n, *v)).collect())
    }

    #[test]
    fn setting_renderings() {
        let setting = Setting::new("TS", 32);
        assert_eq!(setting.define(), "#define TS 32\n");
        assert_eq!(setting.to_string(), "TS 32");
        assert_eq!(setting.database_entry(), "{\"TS\",32}");
    }

    #[test]
    fn lookup_follows_requested_order() {
        let c = config(&[("A", 1), ("B", 2), ("C", 3)]);
        let names = vec!["C".to_string(), "A".to_string()];
        assert_eq!(c.lookup(&names), vec![3, 1]);

        let missing = vec!["A".to_string(), "Z".to_string()];
        assert_eq!(c.lookup(&missing), vec![1]);
    }

    #[test]
    fn injects_defines_before_source() {
        let c = config(&[("TS", 16), ("VW", 4)]);
        let source = c.inject_into("__kernel void k() {}");
        assert_eq!(source, "#define TS 16\n#define VW 4\n__kernel void k() {}");
    }

    #[test]
    fn counts_differences_by_position() {
        let a = config(&[("A", 1), ("B", 2)]);
        let b = config(&[("A", 1), ("B", 4)]);
        assert_eq!(a.differences(&b), 1);
        assert_eq!(a.differences(&a), 0);
    }

    #[test]
    fn serializes_as_plain_list() {
        let c = config(&[("TS", 8)]);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, r#"[{"name":"TS","value":8}]"#);
    }
}
