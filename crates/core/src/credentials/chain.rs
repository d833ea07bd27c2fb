//! Priority chain over several credential sources.

use tracing::debug;

use super::CredentialProvider;

/// Asks each source in order and returns the first credential found.
#[derive(Default)]
pub struct ChainCredentialProvider {
    sources: Vec<Box<dyn CredentialProvider>>,
}

impl ChainCredentialProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl CredentialProvider + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }
}

impl CredentialProvider for ChainCredentialProvider {
    fn credential(&self, service: &str) -> Option<String> {
        self.sources.iter().find_map(|source| {
            let found = source.credential(service);
            if found.is_some() {
                debug!(service, source = source.source_name(), "Resolved credential");
            }
            found
        })
    }

    fn source_name(&self) -> &'static str {
        "chain"
    }
}
