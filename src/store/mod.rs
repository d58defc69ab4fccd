pub mod liveness;
pub mod org;

pub use liveness::{InMemoryLivenessStore, LivenessEntry, LivenessStore, RedisLivenessStore, StoreError};
pub use org::{CredentialStore, InMemoryCredentialStore, InMemoryKeyStore, KeyStore, KeyStoreError, Organization};
