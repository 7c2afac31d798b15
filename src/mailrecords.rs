//! The DNS records SimpleLogin expects for a custom domain, and how they are put into the domain's zone.
//!
//! Every upsert reads the current record set first and only issues a change request if the stored
//! values or TTL differ from what we want, so running the same upsert twice costs one read the second time.
//!
//! The apex TXT record set is shared between the ownership verification value, the SPF policy and
//! whatever else the zone owner keeps there. Upserts to it only replace values of their own kind.

use std::fmt::Display;

use itertools::Itertools;
use log::{debug, info};
use thiserror::Error;

use crate::{
    config::TTL,
    provider::{Provider, ProviderError, RecordSet, RecordType},
};

pub const MX_RECORDS: [&str; 2] = ["10 mx1.simplelogin.co.", "20 mx2.simplelogin.co."];
pub const SPF_RECORD: &str = "v=spf1 include:simplelogin.co ~all";
pub const DKIM_SELECTORS: [&str; 3] = ["dkim", "dkim02", "dkim03"];
pub const DKIM_TARGET_DOMAIN: &str = "simplelogin.co";
pub const DMARC_RECORD: &str = "v=DMARC1; p=quarantine; pct=100; adkim=s; aspf=s";
pub const VERIFICATION_PREFIX: &str = "sl-verification=";

const SPF_PREFIX: &str = "v=spf1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpsertOutcome {
    /// All record sets already had the desired values, no change request was made
    Unchanged,
    /// A single change request replaced this many record sets
    Applied(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordError {
    #[error("no hosted zone found for domain {0}")]
    ZoneNotFound(String),
    #[error("{0}")]
    Provider(#[from] ProviderError),
}

/// State of a single desired record set in the live zone
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordStatus {
    Ok,
    Missing,
    Differs(RecordSet),
}

impl Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordStatus::Ok => write!(f, "ok"),
            RecordStatus::Missing => write!(f, "missing"),
            RecordStatus::Differs(current) => write!(f, "differs (currently {})", current),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordCheck {
    pub desired: RecordSet,
    pub status: RecordStatus,
}

/// Upserts the SimpleLogin mail records of a domain through a [`Provider`]
pub struct MailRecords<'a> {
    provider: &'a dyn Provider,
    ttl: TTL,
}

impl<'a> MailRecords<'a> {
    pub fn new(provider: &'a dyn Provider, ttl: TTL) -> Self {
        MailRecords { provider, ttl }
    }

    /// Whether upserts are only logged by the underlying provider
    pub fn dry_run(&self) -> bool {
        self.provider.dry_run()
    }

    /// Id of the hosted zone for `domain`
    pub fn zone_id(&self, domain: &str) -> Result<String, RecordError> {
        self.provider
            .zone_id(domain)?
            .ok_or_else(|| RecordError::ZoneNotFound(domain.to_owned()))
    }

    /// Publish the ownership verification code as an apex TXT value
    pub fn upsert_verification_txt(
        &self,
        domain: &str,
        code: &str,
    ) -> Result<UpsertOutcome, RecordError> {
        self.upsert_apex_txt(domain, verification_value(code), |v| {
            unquote(v).starts_with(VERIFICATION_PREFIX)
        })
    }

    pub fn upsert_mx_records(&self, domain: &str) -> Result<UpsertOutcome, RecordError> {
        self.upsert_sets(domain, vec![mx_record(domain, self.ttl)])
    }

    pub fn upsert_spf_record(&self, domain: &str) -> Result<UpsertOutcome, RecordError> {
        self.upsert_apex_txt(domain, quote(SPF_RECORD), |v| {
            unquote(v).starts_with(SPF_PREFIX)
        })
    }

    /// All DKIM CNAMEs that need changing are sent in one change request
    pub fn upsert_dkim_records(&self, domain: &str) -> Result<UpsertOutcome, RecordError> {
        self.upsert_sets(domain, dkim_records(domain, self.ttl))
    }

    pub fn upsert_dmarc_record(&self, domain: &str) -> Result<UpsertOutcome, RecordError> {
        self.upsert_sets(domain, vec![dmarc_record(domain, self.ttl)])
    }

    /// Compare the live zone against the record sets SimpleLogin needs.
    ///
    /// The ownership verification value is not part of the check, it is only known during setup.
    pub fn check(&self, domain: &str) -> Result<Vec<RecordCheck>, RecordError> {
        let zone_id = self.zone_id(domain)?;
        // One full listing instead of a lookup per desired set
        let live = self.provider.records(&zone_id)?;
        debug!("Zone {} holds {} supported record sets", zone_id, live.len());

        Ok(desired_records(domain, self.ttl)
            .into_iter()
            .map(|desired| {
                let current = live
                    .iter()
                    .find(|r| r.name == desired.name && r.kind == desired.kind)
                    .cloned();
                let status = match current {
                    None => RecordStatus::Missing,
                    Some(current) if is_apex_txt(domain, &desired) => {
                        if current.ttl == desired.ttl
                            && desired.values.iter().all(|v| current.values.contains(v))
                        {
                            RecordStatus::Ok
                        } else {
                            RecordStatus::Differs(current)
                        }
                    }
                    Some(current) if current.matches(&desired) => RecordStatus::Ok,
                    Some(current) => RecordStatus::Differs(current),
                };
                RecordCheck { desired, status }
            })
            .collect())
    }

    // Read every desired set and upsert the ones that differ, all in one change request
    fn upsert_sets(
        &self,
        domain: &str,
        desired: Vec<RecordSet>,
    ) -> Result<UpsertOutcome, RecordError> {
        let zone_id = self.zone_id(domain)?;

        let mut changes = Vec::new();
        for want in desired {
            match self.provider.record(&zone_id, &want.name, want.kind)? {
                Some(current) if current.matches(&want) => {
                    debug!("{} record {} is already up to date", want.kind, want.name);
                }
                current => {
                    debug!("Replacing {:?} with {}", current, want);
                    changes.push(want);
                }
            }
        }
        self.apply(&zone_id, changes)
    }

    // Replace our own kind of value in the apex TXT set, keeping everyone else's
    fn upsert_apex_txt(
        &self,
        domain: &str,
        value: String,
        owned: impl Fn(&str) -> bool,
    ) -> Result<UpsertOutcome, RecordError> {
        let zone_id = self.zone_id(domain)?;
        let current = self.provider.record(&zone_id, domain, RecordType::Txt)?;

        let mut values = current
            .iter()
            .flat_map(|c| c.values.iter())
            .filter(|v| !owned(v.as_str()))
            .cloned()
            .collect_vec();
        values.push(value);
        let desired = RecordSet::new(domain, RecordType::Txt, self.ttl, values);

        match current {
            Some(c) if c.matches(&desired) => {
                debug!("TXT record {} is already up to date", domain);
                Ok(UpsertOutcome::Unchanged)
            }
            _ => self.apply(&zone_id, vec![desired]),
        }
    }

    fn apply(&self, zone_id: &str, changes: Vec<RecordSet>) -> Result<UpsertOutcome, RecordError> {
        if changes.is_empty() {
            return Ok(UpsertOutcome::Unchanged);
        }
        let count = changes.len();
        info!(
            "Upserting {} record set(s): {}",
            count,
            changes.iter().map(|c| format!("{} {}", c.kind, c.name)).join(", ")
        );
        self.provider.upsert(zone_id, changes)?;
        Ok(UpsertOutcome::Applied(count))
    }
}

/// All record sets SimpleLogin needs for `domain`, excluding the ownership verification value
pub fn desired_records(domain: &str, ttl: TTL) -> Vec<RecordSet> {
    let mut records = vec![
        mx_record(domain, ttl),
        RecordSet::new(domain, RecordType::Txt, ttl, vec![quote(SPF_RECORD)]),
    ];
    records.extend(dkim_records(domain, ttl));
    records.push(dmarc_record(domain, ttl));
    records
}

fn mx_record(domain: &str, ttl: TTL) -> RecordSet {
    RecordSet::new(
        domain,
        RecordType::Mx,
        ttl,
        MX_RECORDS.iter().map(|v| v.to_string()).collect(),
    )
}

fn dkim_records(domain: &str, ttl: TTL) -> Vec<RecordSet> {
    DKIM_SELECTORS
        .iter()
        .map(|selector| {
            RecordSet::new(
                format!("{}._domainkey.{}", selector, domain),
                RecordType::Cname,
                ttl,
                vec![format!("{}._domainkey.{}.", selector, DKIM_TARGET_DOMAIN)],
            )
        })
        .collect()
}

fn dmarc_record(domain: &str, ttl: TTL) -> RecordSet {
    RecordSet::new(
        format!("_dmarc.{}", domain),
        RecordType::Txt,
        ttl,
        vec![quote(DMARC_RECORD)],
    )
}

fn verification_value(code: &str) -> String {
    let code = code.trim();
    if code.starts_with(VERIFICATION_PREFIX) {
        quote(code)
    } else {
        quote(&format!("{}{}", VERIFICATION_PREFIX, code))
    }
}

fn is_apex_txt(domain: &str, record: &RecordSet) -> bool {
    record.kind == RecordType::Txt && record.name == domain
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value)
}

fn unquote(value: &str) -> &str {
    value.trim_matches('"')
}
