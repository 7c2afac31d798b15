//! DNS providers that host the zones of our custom domains.
//!
//! A [`Provider`] can look up hosted zones, read record sets and upsert them.
//! Currently the only implementation is [`Route53Provider`], connecting to AWS Route53.
mod route53;

// Re-exports for convenience
pub use self::route53::{Route53Provider, Route53ProviderConfig};

use std::fmt::Display;

use itertools::Itertools;
#[cfg(test)]
use mockall::automock;

use crate::config::TTL;

/// A provider is any DNS service provider hosting our zones.
/// It implements a few basic methods to read and modify record sets
#[cfg_attr(test, automock)]
pub trait Provider {
    /// Returns whether this provider only pretends to apply changes
    fn dry_run(&self) -> bool;

    /// Find the id of the hosted zone whose name is exactly `domain`.
    /// Returns `Ok(None)` if no such zone exists
    fn zone_id(&self, domain: &str) -> Result<Option<String>, ProviderError>;

    /// Read a single record set by name and type
    fn record(
        &self,
        zone_id: &str,
        name: &str,
        kind: RecordType,
    ) -> Result<Option<RecordSet>, ProviderError>;

    /// List all supported record sets in a zone
    fn records(&self, zone_id: &str) -> Result<Vec<RecordSet>, ProviderError>;

    /// Create or replace all given record sets with a single change request
    fn upsert(&self, zone_id: &str, records: Vec<RecordSet>) -> Result<(), ProviderError>;
}

// Generic error returned by a provider action
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderError {
    msg: String,
}
impl Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.msg.as_str())
    }
}
impl std::error::Error for ProviderError {}

impl From<String> for ProviderError {
    fn from(s: String) -> Self {
        ProviderError { msg: s }
    }
}

/// Record types we manage. Everything else in a zone is ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RecordType {
    Mx,
    Txt,
    Cname,
}
impl Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                RecordType::Mx => "MX",
                RecordType::Txt => "TXT",
                RecordType::Cname => "CNAME",
            }
        )
    }
}

/// A set of records sharing name and type.
///
/// Names never carry a trailing dot. Values are kept in their wire form,
/// meaning TXT values include their surrounding double quotes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordSet {
    pub name: String,
    pub kind: RecordType,
    pub ttl: TTL,
    pub values: Vec<String>,
}

impl RecordSet {
    pub fn new(name: impl Into<String>, kind: RecordType, ttl: TTL, values: Vec<String>) -> Self {
        RecordSet {
            name: name.into(),
            kind,
            ttl,
            values,
        }
    }

    /// Whether `other` holds the same values (in any order) with the same TTL
    pub fn matches(&self, other: &RecordSet) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.ttl == other.ttl
            && self.values.iter().sorted().eq(other.values.iter().sorted())
    }
}

impl Display for RecordSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} [{}]",
            self.name,
            self.ttl,
            self.kind,
            self.values.join(", ")
        )
    }
}
