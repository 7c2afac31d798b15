//! Bulk alias provisioning: one alias per (domain, prefix) pair.
//!
//! In dry-run mode existing aliases are still looked up, missing ones are only reported as planned.

use log::{info, warn};

use crate::aliasservice::{Alias, AliasManager, AliasOutcome, ServiceError};

/// A (domain, prefix) pair whose alias could not be provisioned
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProvisionFailure {
    pub domain: String,
    pub prefix: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ProvisionReport {
    pub created: Vec<Alias>,
    pub existing: Vec<Alias>,
    /// Addresses a dry run would have created
    pub planned: Vec<String>,
    pub failures: Vec<ProvisionFailure>,
}

impl ProvisionReport {
    /// True if every pair ended up with an alias
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct AliasProvisioner<'a> {
    aliases: &'a AliasManager<'a>,
    dry_run: bool,
}

impl<'a> AliasProvisioner<'a> {
    pub fn new(aliases: &'a AliasManager<'a>, dry_run: bool) -> Self {
        AliasProvisioner { aliases, dry_run }
    }

    fn provision(&self, domain: &str, prefix: &str) -> Result<Option<AliasOutcome>, ServiceError> {
        if !self.dry_run {
            return self.aliases.create_alias(domain, prefix).map(Some);
        }
        Ok(self
            .aliases
            .find_alias(domain, prefix)?
            .map(AliasOutcome::Existing))
    }

    /// Make sure `prefix@domain` exists for every domain and prefix, in list order.
    /// A failing pair is recorded and does not stop the others
    pub fn run(&self, domains: &[String], prefixes: &[String]) -> ProvisionReport {
        let mut report = ProvisionReport::default();
        for domain in domains {
            for prefix in prefixes {
                match self.provision(domain, prefix) {
                    Ok(Some(AliasOutcome::Created(alias))) => report.created.push(alias),
                    Ok(Some(AliasOutcome::Existing(alias))) => {
                        info!("Alias {} already exists, leaving it as is", alias);
                        report.existing.push(alias)
                    }
                    Ok(None) => {
                        let email = format!("{}@{}", prefix, domain);
                        info!("[dry-run] Would create alias {}", email);
                        report.planned.push(email);
                    }
                    Err(e) => {
                        warn!("Could not provision alias {}@{}: {}", prefix, domain, e);
                        report.failures.push(ProvisionFailure {
                            domain: domain.clone(),
                            prefix: prefix.clone(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }
        info!(
            "Aliases: {} created, {} already present, {} planned, {} failed",
            report.created.len(),
            report.existing.len(),
            report.planned.len(),
            report.failures.len()
        );
        report
    }
}
