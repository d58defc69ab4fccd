pub mod google;
pub mod manager;
pub mod provider;
pub mod types;

pub use manager::DnsManager;
pub use provider::{DnsError, DnsProvider};
pub use types::{Change, ChangeSet, RecordSet, RecordType};
