//! Credential sources for provider clients.
//!
//! Clients receive a [`CredentialProvider`] at construction time instead of
//! reading a process-wide key, so tests and embedders can inject their own.

mod chain;
mod env;
mod fixed;
mod traits;

pub use chain::*;
pub use env::*;
pub use fixed::*;
pub use traits::*;

use crate::config::CredentialsConfig;
use crate::provider::GEMINI_CREDENTIAL;

/// Build the credential source described by the config.
///
/// Priority: environment variables first, then the key from the config file.
pub fn create_credential_provider(config: &CredentialsConfig) -> Box<dyn CredentialProvider> {
    let mut chain = ChainCredentialProvider::new()
        .with(EnvCredentialProvider::new().with_vars(GEMINI_CREDENTIAL, config.api_key_env.clone()));

    if let Some(key) = config.gemini_api_key.as_deref().filter(|k| !k.trim().is_empty()) {
        chain = chain.with(StaticCredentialProvider::new().with_key(GEMINI_CREDENTIAL, key));
    }

    Box::new(chain)
}
