//! `#define` lines recovered from an injected kernel source.

use anyhow::{anyhow, Result};
use std::collections::HashMap;

/// Integer macros a host kernel is compiled with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Defines {
    values: HashMap<String, usize>,
}

impl Defines {
    /// Collects every `#define NAME VALUE` line with an unsigned integer
    /// value. Later definitions of a name override earlier ones.
    pub fn parse(source: &str) -> Self {
        let mut values = HashMap::new();
        for line in source.lines() {
            let Some(rest) = line.trim_start().strip_prefix("#define") else {
                continue;
            };
            let mut parts = rest.split_whitespace();
            let (Some(name), Some(value)) = (parts.next(), parts.next()) else {
                continue;
            };
            if let Ok(value) = value.parse() {
                values.insert(name.to_string(), value);
            }
        }
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.values.get(name).copied()
    }

    pub fn get_or(&self, name: &str, default: usize) -> usize {
        self.get(name).unwrap_or(default)
    }

    /// Like [`get`](Self::get), failing the launch when the macro is missing.
    pub fn require(&self, name: &str) -> Result<usize> {
        self.get(name)
            .ok_or_else(|| anyhow!("kernel requires `#define {name}`"))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_integer_defines() {
        let defines = Defines::parse(
            "#define TILE_M 32\n#define VW 4\n  #define  NAME  7\n#define PI 3.14\n#define FLAG\nvoid k() {}",
        );
        assert_eq!(defines.get("TILE_M"), Some(32));
        assert_eq!(defines.get("VW"), Some(4));
        assert_eq!(defines.get("NAME"), Some(7));
        assert_eq!(defines.get("PI"), None);
        assert_eq!(defines.get("FLAG"), None);
        assert_eq!(defines.len(), 3);
    }

    #[test]
    fn later_definition_wins() {
        let defines = Defines::parse("#define TS 8\n#define TS 16\n");
        assert_eq!(defines.get("TS"), Some(16));
    }

    #[test]
    fn missing_define_is_an_error() {
        let defines = Defines::parse("");
        assert!(defines.is_empty());
        assert_eq!(defines.get_or("VW", 1), 1);
        assert!(defines.require("VW").is_err());
    }
}
