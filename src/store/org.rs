//! The key/org store and credential store contracts: `ValidateKey`,
//! `GetOrganization`, `LoadOrCreateKey`. These are read-only (or
//! create-on-miss, for credentials) collaborators managed by an external
//! provisioning tool; the core only consumes them.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("invalid API key")]
    InvalidKey,
    #[error("key store backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Organization {
    pub name: String,
    /// Multiplier applied to a caller-supplied registration probability.
    /// Defaults to `1.0` and is intentionally applied even when the lookup
    /// that would populate it fails: callers always get a well-defined
    /// probability, never a propagated lookup error.
    pub probability_multiplier: f64,
}

impl Default for Organization {
    fn default() -> Self {
        Organization {
            name: String::new(),
            probability_multiplier: 1.0,
        }
    }
}

#[async_trait]
pub trait KeyStore: Send + Sync {
    async fn validate_key(&self, key: &str) -> Result<String, KeyStoreError>;
    async fn get_organization(&self, name: &str) -> Result<Organization, KeyStoreError>;
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load_or_create_key(&self, org: &str) -> Result<String, KeyStoreError>;
}

#[derive(Default)]
pub struct InMemoryKeyStore {
    keys: HashMap<String, String>,
    orgs: HashMap<String, Organization>,
}

impl InMemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, key: impl Into<String>, org: impl Into<String>) -> Self {
        self.keys.insert(key.into(), org.into());
        self
    }

    pub fn with_organization(mut self, org: Organization) -> Self {
        self.orgs.insert(org.name.clone(), org);
        self
    }
}

#[async_trait]
impl KeyStore for InMemoryKeyStore {
    async fn validate_key(&self, key: &str) -> Result<String, KeyStoreError> {
        self.keys.get(key).cloned().ok_or(KeyStoreError::InvalidKey)
    }

    async fn get_organization(&self, name: &str) -> Result<Organization, KeyStoreError> {
        self.orgs
            .get(name)
            .cloned()
            .ok_or_else(|| KeyStoreError::Backend(format!("no organization record for {name:?}")))
    }
}

#[derive(Default)]
pub struct InMemoryCredentialStore {
    keys: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn load_or_create_key(&self, org: &str) -> Result<String, KeyStoreError> {
        let mut keys = self.keys.lock().unwrap();
        if let Some(existing) = keys.get(org) {
            return Ok(existing.clone());
        }
        use base64::{engine::general_purpose::STANDARD, Engine as _};
        let minted = STANDARD.encode(format!("service-account:{org}"));
        keys.insert(org.to_string(), minted.clone());
        Ok(minted)
    }
}
