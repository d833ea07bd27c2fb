//! Credentials supplied directly, e.g. from the config file.

use std::collections::HashMap;

use super::CredentialProvider;

/// Fixed credentials keyed by service.
#[derive(Default)]
pub struct StaticCredentialProvider {
    keys: HashMap<String, String>,
}

impl StaticCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, service: impl Into<String>, key: impl Into<String>) -> Self {
        self.keys.insert(service.into(), key.into());
        self
    }
}

impl CredentialProvider for StaticCredentialProvider {
    fn credential(&self, service: &str) -> Option<String> {
        self.keys.get(service).cloned()
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}
