//! Credentials read from environment variables.

use std::collections::HashMap;

use super::CredentialProvider;

type Lookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Reads credentials from environment variables.
///
/// Each service maps to an ordered list of variable names; the first
/// non-blank value wins.
pub struct EnvCredentialProvider {
    vars: HashMap<String, Vec<String>>,
    lookup: Lookup,
}

impl EnvCredentialProvider {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
            lookup: Box::new(|name| std::env::var(name).ok()),
        }
    }

    pub fn with_vars(mut self, service: impl Into<String>, vars: Vec<String>) -> Self {
        self.vars.insert(service.into(), vars);
        self
    }

    /// Replace the environment lookup (useful for testing).
    pub fn with_lookup(
        mut self,
        lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        self.lookup = Box::new(lookup);
        self
    }
}

impl Default for EnvCredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialProvider for EnvCredentialProvider {
    fn credential(&self, service: &str) -> Option<String> {
        self.vars.get(service)?.iter().find_map(|var| {
            (self.lookup)(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
    }

    fn source_name(&self) -> &'static str {
        "env"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> EnvCredentialProvider {
        EnvCredentialProvider::new()
            .with_vars("gemini", vec!["PRIMARY".to_string(), "SECONDARY".to_string()])
            .with_lookup(|name| match name {
                "PRIMARY" => Some("  ".to_string()),
                "SECONDARY" => Some(" key-2 ".to_string()),
                _ => None,
            })
    }

    #[test]
    fn test_first_non_blank_var_wins() {
        assert_eq!(provider().credential("gemini").as_deref(), Some("key-2"));
    }

    #[test]
    fn test_unknown_service() {
        assert!(provider().credential("other").is_none());
        assert!(provider().require("other").is_err());
    }
}
