use log::{info, warn};
use simplelogin_route53_helper::{
    aliasservice::{AliasManager, ServiceError},
    config::ConfigError,
    mailrecords::{MailRecords, RecordCheck, RecordStatus},
    provider::ProviderError,
    provision::{AliasProvisioner, ProvisionReport},
    setup::{DomainSetup, SetupReport, Verifier},
};
use thiserror::Error;

/// Errors that stop the whole run before any domain is processed
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("Unable to create SimpleLogin client: {0}")]
    Service(#[from] ServiceError),
    #[error("Unable to create DNS provider: {0}")]
    Provider(#[from] ProviderError),
}

#[derive(Debug, Clone, Eq, PartialEq, Default)]
pub struct RunResult {
    pub setups: Vec<SetupReport>,
    pub aliases: ProvisionReport,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.setups.iter().all(SetupReport::success) && self.aliases.success()
    }
}

/// An executor runs the domain setup and alias provisioning workflows over a list of domains
pub struct Executor<'a> {
    aliases: &'a AliasManager<'a>,
    records: &'a MailRecords<'a>,
    verifier: &'a dyn Verifier,
}

impl<'a> Executor<'a> {
    pub fn new(
        aliases: &'a AliasManager<'a>,
        records: &'a MailRecords<'a>,
        verifier: &'a dyn Verifier,
    ) -> Self {
        Self {
            aliases,
            records,
            verifier,
        }
    }

    /// Set up every domain in turn. Aliases are only created for domains that completed setup
    pub fn setup(&self, domains: &[String], prefixes: Option<&[String]>) -> RunResult {
        let setup = DomainSetup::new(self.aliases, self.records, self.verifier);
        let setups: Vec<SetupReport> = domains.iter().map(|d| setup.run(d)).collect();

        let ready: Vec<String> = setups
            .iter()
            .filter(|r| r.success())
            .map(|r| r.domain.clone())
            .collect();
        let aliases = match prefixes {
            Some(prefixes) if !ready.is_empty() => self.provision(&ready, prefixes),
            Some(_) => {
                warn!("No domain finished setup, not creating any aliases");
                ProvisionReport::default()
            }
            None => ProvisionReport::default(),
        };
        RunResult { setups, aliases }
    }

    /// Aliases are only planned when the DNS provider runs in dry-run mode
    pub fn provision(&self, domains: &[String], prefixes: &[String]) -> ProvisionReport {
        AliasProvisioner::new(self.aliases, self.records.dry_run()).run(domains, prefixes)
    }
}

/// Read-only comparison of the live records of each domain with the ones SimpleLogin needs.
/// Returns false if any domain could not be checked or has records missing or differing
pub fn report_status(records: &MailRecords, domains: &[String]) -> bool {
    let mut all_ok = true;
    for domain in domains {
        match records.check(domain) {
            Ok(checks) => {
                all_ok &= log_checks(domain, &checks);
            }
            Err(e) => {
                all_ok = false;
                warn!("{}: unable to check records: {}", domain, e);
            }
        }
    }
    all_ok
}

fn log_checks(domain: &str, checks: &[RecordCheck]) -> bool {
    let mut ok = true;
    for check in checks {
        match check.status {
            RecordStatus::Ok => info!("{}: {} {} ok", domain, check.desired.kind, check.desired.name),
            _ => {
                ok = false;
                warn!(
                    "{}: {} {} {}, expected {}",
                    domain, check.desired.kind, check.desired.name, check.status, check.desired
                );
            }
        }
    }
    ok
}
