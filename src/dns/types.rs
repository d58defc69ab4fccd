//! Wire-level shapes for the external authoritative DNS provider. The
//! provider models record *sets*, not individual records: a set is keyed by
//! `(zone, name, type)` and carries a list of values plus a TTL.

use serde::{Deserialize, Serialize};

pub const RECORD_TTL_SECONDS: i64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordType {
    A,
    Aaaa,
    Ns,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Ns => "NS",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    pub name: String,
    pub record_type: RecordType,
    pub ttl: i64,
    pub rrdata: Vec<String>,
}

impl RecordSet {
    pub fn new(name: impl Into<String>, record_type: RecordType, rrdata: Vec<String>) -> Self {
        Self {
            name: name.into(),
            record_type,
            ttl: RECORD_TTL_SECONDS,
            rrdata,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub additions: Vec<RecordSet>,
    pub deletions: Vec<RecordSet>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty()
    }
}

/// The provider's confirmation of an applied (or no-op) change.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Applied(ChangeSet),
    NoChange,
}
