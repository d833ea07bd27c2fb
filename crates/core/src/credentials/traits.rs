use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("No credential available for {0}")]
    Missing(String),
}

/// Source of API credentials, keyed by service name.
pub trait CredentialProvider: Send + Sync {
    /// Credential for `service`, or `None` when this source has none.
    fn credential(&self, service: &str) -> Option<String>;

    /// Name of this source for logging.
    fn source_name(&self) -> &'static str;

    /// Like [`credential`](Self::credential) but treats absence as an error.
    fn require(&self, service: &str) -> Result<String, CredentialError> {
        self.credential(service)
            .ok_or_else(|| CredentialError::Missing(service.to_string()))
    }
}
