//! Provisioning a custom domain: publish each DNS record SimpleLogin asks for, then wait for SimpleLogin to see it.
//!
//! The steps run strictly in order and each one must succeed before the next starts:
//!
//! | state                | work done to leave the state                          |
//! |----------------------|-------------------------------------------------------|
//! | `Start`              | request verification code, upsert verification TXT    |
//! | `VerifyingOwnership` | verify `ownership`, upsert MX                         |
//! | `VerifyingMx`        | verify `mx`, upsert SPF                               |
//! | `VerifyingSpf`       | verify `spf`, upsert DKIM                             |
//! | `VerifyingDkim`      | verify `dkim`, upsert DMARC                           |
//! | `DmarcSet`           | terminal                                              |
//!
//! Any error moves the domain to `Failed`, which is terminal as well.
//!
//! When the DNS provider runs in dry-run mode no verification code is requested and no step is
//! verified: SimpleLogin is not contacted at all and the upserts are only logged by the provider.

use std::fmt::Display;

use log::{debug, info, warn};
#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use crate::{
    aliasservice::{AliasManager, ServiceError, VerificationStep},
    mailrecords::{MailRecords, RecordError},
    poll::{poll_until, PollPolicy, Sleeper},
};

const DASHBOARD_URL: &str = "https://app.simplelogin.io/dashboard/domains";

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("SimpleLogin: {0}")]
    Service(#[from] ServiceError),
    #[error("DNS: {0}")]
    Records(#[from] RecordError),
    #[error("{step} verification did not succeed after {attempts} attempt(s)")]
    VerificationTimeout { step: VerificationStep, attempts: u32 },
    #[error("{0} verification was declined by the operator")]
    VerificationDeclined(VerificationStep),
    #[error("interactive prompt failed: {0}")]
    Prompt(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SetupState {
    Start,
    VerifyingOwnership,
    VerifyingMx,
    VerifyingSpf,
    VerifyingDkim,
    DmarcSet,
    /// `step` is the state the domain was in when the error occurred
    Failed { step: Box<SetupState>, reason: String },
}

impl SetupState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SetupState::DmarcSet | SetupState::Failed { .. })
    }
}

impl Display for SetupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupState::Start => write!(f, "start"),
            SetupState::VerifyingOwnership => write!(f, "verifying ownership"),
            SetupState::VerifyingMx => write!(f, "verifying mx"),
            SetupState::VerifyingSpf => write!(f, "verifying spf"),
            SetupState::VerifyingDkim => write!(f, "verifying dkim"),
            SetupState::DmarcSet => write!(f, "dmarc set"),
            SetupState::Failed { step, reason } => write!(f, "failed while {}: {}", step, reason),
        }
    }
}

/// Outcome of [`DomainSetup::run()`] for one domain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SetupReport {
    pub domain: String,
    /// Final state, always terminal
    pub state: SetupState,
    /// Every state the domain went through, starting with [`SetupState::Start`]
    pub history: Vec<SetupState>,
}

impl SetupReport {
    pub fn success(&self) -> bool {
        self.state == SetupState::DmarcSet
    }
}

/// Waits until SimpleLogin confirms one verification step
#[cfg_attr(test, automock)]
pub trait Verifier {
    fn verify(&self, domain: &str, step: VerificationStep) -> Result<(), SetupError>;
}

/// Asks SimpleLogin repeatedly, following a [`PollPolicy`]
pub struct PollingVerifier<'a> {
    aliases: &'a AliasManager<'a>,
    policy: PollPolicy,
    sleeper: &'a dyn Sleeper,
}

impl<'a> PollingVerifier<'a> {
    pub fn new(aliases: &'a AliasManager<'a>, policy: PollPolicy, sleeper: &'a dyn Sleeper) -> Self {
        PollingVerifier {
            aliases,
            policy,
            sleeper,
        }
    }
}

impl Verifier for PollingVerifier<'_> {
    fn verify(&self, domain: &str, step: VerificationStep) -> Result<(), SetupError> {
        info!("Waiting for SimpleLogin to verify {} of {}", step, domain);
        // A failed request counts as a failed attempt, the last error is reported if nothing succeeds
        let mut last_error = None;
        let outcome = poll_until(&self.policy, self.sleeper, |attempt| {
            match self.aliases.is_verified(domain, step) {
                Ok(verified) => {
                    last_error = None;
                    verified
                }
                Err(e) => {
                    warn!("{} check of {} failed on attempt {}: {}", step, domain, attempt, e);
                    last_error = Some(e);
                    false
                }
            }
        });

        if outcome.is_satisfied() {
            debug!("{} of {} verified after {} attempt(s)", step, domain, outcome.attempts());
            return Ok(());
        }
        match last_error {
            Some(e) => Err(e.into()),
            None => Err(SetupError::VerificationTimeout {
                step,
                attempts: outcome.attempts(),
            }),
        }
    }
}

/// Someone who can answer yes/no questions
#[cfg_attr(test, automock)]
pub trait Operator {
    fn confirm(&self, question: &str) -> Result<bool, SetupError>;
}

/// Asks on the terminal
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalOperator;

impl Operator for TerminalOperator {
    fn confirm(&self, question: &str) -> Result<bool, SetupError> {
        dialoguer::Confirm::new()
            .with_prompt(question)
            .default(true)
            .interact()
            .map_err(|e| SetupError::Prompt(e.to_string()))
    }
}

/// Lets an operator trigger the checks from the SimpleLogin dashboard and confirm the result
pub struct ManualVerifier<'a> {
    aliases: &'a AliasManager<'a>,
    operator: &'a dyn Operator,
}

impl<'a> ManualVerifier<'a> {
    pub fn new(aliases: &'a AliasManager<'a>, operator: &'a dyn Operator) -> Self {
        ManualVerifier { aliases, operator }
    }
}

/// Page of the SimpleLogin dashboard showing the DNS checks of a domain
pub fn dashboard_url(domain_id: i64) -> String {
    format!("{}/{}/dns#dns-setup", DASHBOARD_URL, domain_id)
}

impl Verifier for ManualVerifier<'_> {
    fn verify(&self, domain: &str, step: VerificationStep) -> Result<(), SetupError> {
        let url = dashboard_url(self.aliases.get_domain_id(domain)?);
        let question = format!(
            "Run the {} check for {} at {} - has it passed?",
            step, domain, url
        );
        loop {
            if !self.operator.confirm(&question)? {
                return Err(SetupError::VerificationDeclined(step));
            }
            if self.aliases.is_verified(domain, step)? {
                return Ok(());
            }
            warn!("SimpleLogin does not report {} of {} as verified yet", step, domain);
        }
    }
}

/// Runs the provisioning steps for single domains
pub struct DomainSetup<'a> {
    aliases: &'a AliasManager<'a>,
    records: &'a MailRecords<'a>,
    verifier: &'a dyn Verifier,
}

impl<'a> DomainSetup<'a> {
    pub fn new(
        aliases: &'a AliasManager<'a>,
        records: &'a MailRecords<'a>,
        verifier: &'a dyn Verifier,
    ) -> Self {
        DomainSetup {
            aliases,
            records,
            verifier,
        }
    }

    /// Drive `domain` from [`SetupState::Start`] into a terminal state
    pub fn run(&self, domain: &str) -> SetupReport {
        info!("Setting up domain {}", domain);
        let mut state = SetupState::Start;
        let mut history = vec![state.clone()];

        while !state.is_terminal() {
            state = match self.advance(domain, &state) {
                Ok(next) => {
                    debug!("{}: {} -> {}", domain, state, next);
                    next
                }
                Err(e) => {
                    warn!("Setup of {} failed while {}: {}", domain, state, e);
                    SetupState::Failed {
                        step: Box::new(state),
                        reason: e.to_string(),
                    }
                }
            };
            history.push(state.clone());
        }

        if state == SetupState::DmarcSet {
            info!("Domain {} is fully set up", domain);
        }
        SetupReport {
            domain: domain.to_owned(),
            state,
            history,
        }
    }

    fn advance(&self, domain: &str, state: &SetupState) -> Result<SetupState, SetupError> {
        match state {
            SetupState::Start => {
                // Fail before touching SimpleLogin if we cannot write the zone anyway
                self.records.zone_id(domain)?;
                if self.records.dry_run() {
                    info!(
                        "[dry-run] Would request a verification code for {} and publish it as TXT record",
                        domain
                    );
                } else {
                    let code = self.aliases.verification_code(domain)?;
                    self.records.upsert_verification_txt(domain, &code)?;
                }
                Ok(SetupState::VerifyingOwnership)
            }
            SetupState::VerifyingOwnership => {
                self.verify(domain, VerificationStep::Ownership)?;
                self.records.upsert_mx_records(domain)?;
                Ok(SetupState::VerifyingMx)
            }
            SetupState::VerifyingMx => {
                self.verify(domain, VerificationStep::Mx)?;
                self.records.upsert_spf_record(domain)?;
                Ok(SetupState::VerifyingSpf)
            }
            SetupState::VerifyingSpf => {
                self.verify(domain, VerificationStep::Spf)?;
                self.records.upsert_dkim_records(domain)?;
                Ok(SetupState::VerifyingDkim)
            }
            SetupState::VerifyingDkim => {
                self.verify(domain, VerificationStep::Dkim)?;
                self.records.upsert_dmarc_record(domain)?;
                Ok(SetupState::DmarcSet)
            }
            SetupState::DmarcSet | SetupState::Failed { .. } => Ok(state.clone()),
        }
    }

    fn verify(&self, domain: &str, step: VerificationStep) -> Result<(), SetupError> {
        if self.records.dry_run() {
            info!("[dry-run] Would wait for SimpleLogin to verify {} of {}", step, domain);
            return Ok(());
        }
        self.verifier.verify(domain, step)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use mockall::predicate::{always, eq};

    use super::*;
    use crate::{
        aliasservice::{CustomDomain, MockAliasApi},
        poll::MockSleeper,
        provider::{MockProvider, RecordSet},
    };

    type ChangeLog = Arc<Mutex<Vec<Vec<RecordSet>>>>;

    // Empty zone that accepts every upsert and remembers it
    fn provider(zone: Option<&'static str>) -> (MockProvider, ChangeLog) {
        provider_with_mode(zone, false)
    }

    fn provider_with_mode(zone: Option<&'static str>, dry_run: bool) -> (MockProvider, ChangeLog) {
        let log: ChangeLog = Arc::new(Mutex::new(Vec::new()));
        let mut provider = MockProvider::new();
        provider.expect_dry_run().return_const(dry_run);
        provider
            .expect_zone_id()
            .returning(move |_| Ok(zone.map(str::to_owned)));
        provider.expect_record().returning(|_, _, _| Ok(None));
        let changes = Arc::clone(&log);
        provider.expect_upsert().returning(move |_, sets| {
            changes.lock().unwrap().push(sets);
            Ok(())
        });
        (provider, log)
    }

    fn code_api() -> MockAliasApi {
        let mut api = MockAliasApi::new();
        api.expect_verification_code()
            .with(eq("example.com"))
            .returning(|_| Ok("abc123".to_owned()));
        api
    }

    #[test]
    fn should_walk_through_all_states() {
        let api = code_api();
        let aliases = AliasManager::new(&api, None, "note");
        let (provider, log) = provider(Some("Z0123"));
        let records = MailRecords::new(&provider, 3600);
        let mut verifier = MockVerifier::new();
        verifier.expect_verify().times(4).returning(|_, _| Ok(()));

        let report = DomainSetup::new(&aliases, &records, &verifier).run("example.com");

        assert!(report.success());
        assert_eq!(
            report.history,
            vec![
                SetupState::Start,
                SetupState::VerifyingOwnership,
                SetupState::VerifyingMx,
                SetupState::VerifyingSpf,
                SetupState::VerifyingDkim,
                SetupState::DmarcSet,
            ]
        );
        // verification TXT, MX, SPF, DKIM (batched), DMARC
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 5);
        assert_eq!(log[3].len(), 3);
    }

    #[test]
    fn should_not_contact_simplelogin_in_dry_run() {
        let mut api = MockAliasApi::new();
        api.expect_verification_code().never();
        api.expect_verification_status().never();
        let aliases = AliasManager::new(&api, None, "note");
        let (provider, log) = provider_with_mode(Some("Z0123"), true);
        let records = MailRecords::new(&provider, 3600);
        let mut verifier = MockVerifier::new();
        verifier.expect_verify().never();

        let report = DomainSetup::new(&aliases, &records, &verifier).run("example.com");

        assert!(report.success());
        assert_eq!(report.history.len(), 6);
        // MX, SPF, DKIM (batched), DMARC. No verification TXT without a code
        let log = log.lock().unwrap();
        assert_eq!(log.len(), 4);
        assert!(log
            .iter()
            .flatten()
            .all(|r| r.values.iter().all(|v| !v.contains("sl-verification"))));
    }

    #[test]
    fn should_abort_at_failing_step() {
        let api = code_api();
        let aliases = AliasManager::new(&api, None, "note");
        let (provider, log) = provider(Some("Z0123"));
        let records = MailRecords::new(&provider, 3600);
        let mut verifier = MockVerifier::new();
        verifier
            .expect_verify()
            .with(always(), eq(VerificationStep::Ownership))
            .times(1)
            .returning(|_, _| Ok(()));
        verifier
            .expect_verify()
            .with(always(), eq(VerificationStep::Mx))
            .times(1)
            .returning(|_, step| Err(SetupError::VerificationTimeout { step, attempts: 10 }));
        verifier
            .expect_verify()
            .with(always(), eq(VerificationStep::Spf))
            .never();

        let report = DomainSetup::new(&aliases, &records, &verifier).run("example.com");

        assert!(!report.success());
        assert_eq!(
            report.state,
            SetupState::Failed {
                step: Box::new(SetupState::VerifyingMx),
                reason: "mx verification did not succeed after 10 attempt(s)".to_owned(),
            }
        );
        assert_eq!(report.history.len(), 4);
        // verification TXT and MX only
        assert_eq!(log.lock().unwrap().len(), 2);
    }

    #[test]
    fn should_fail_without_hosted_zone() {
        let mut api = MockAliasApi::new();
        api.expect_verification_code().never();
        let aliases = AliasManager::new(&api, None, "note");
        let (provider, _) = provider(None);
        let records = MailRecords::new(&provider, 3600);
        let mut verifier = MockVerifier::new();
        verifier.expect_verify().never();

        let report = DomainSetup::new(&aliases, &records, &verifier).run("example.com");

        assert!(matches!(
            report.state,
            SetupState::Failed { ref step, .. } if **step == SetupState::Start
        ));
        assert_eq!(
            report.state.to_string(),
            "failed while start: DNS: no hosted zone found for domain example.com"
        );
    }

    #[test]
    fn should_poll_until_verified() {
        let calls = Arc::new(Mutex::new(0));
        let mut api = MockAliasApi::new();
        let counter = Arc::clone(&calls);
        api.expect_verification_status()
            .with(eq("example.com"), eq(VerificationStep::Spf))
            .times(3)
            .returning(move |_, _| {
                let mut calls = counter.lock().unwrap();
                *calls += 1;
                Ok(*calls == 3)
            });
        let aliases = AliasManager::new(&api, None, "note");
        let mut sleeper = MockSleeper::new();
        sleeper.expect_sleep().times(2).return_const(());

        let verifier = PollingVerifier::new(&aliases, PollPolicy::default(), &sleeper);
        assert!(verifier.verify("example.com", VerificationStep::Spf).is_ok());
    }

    #[test]
    fn should_time_out_after_policy_attempts() {
        let mut api = MockAliasApi::new();
        api.expect_verification_status()
            .times(10)
            .returning(|_, _| Ok(false));
        let aliases = AliasManager::new(&api, None, "note");
        let mut sleeper = MockSleeper::new();
        sleeper.expect_sleep().times(9).return_const(());

        let verifier = PollingVerifier::new(&aliases, PollPolicy::default(), &sleeper);
        assert!(matches!(
            verifier.verify("example.com", VerificationStep::Dkim),
            Err(SetupError::VerificationTimeout {
                step: VerificationStep::Dkim,
                attempts: 10
            })
        ));
    }

    #[test]
    fn should_report_last_request_error() {
        let mut api = MockAliasApi::new();
        api.expect_verification_status().times(2).returning(|_, _| {
            Err(ServiceError::Http {
                status: 401,
                body: "Wrong api key".to_owned(),
            })
        });
        let aliases = AliasManager::new(&api, None, "note");
        let mut sleeper = MockSleeper::new();
        sleeper.expect_sleep().times(1).return_const(());
        let policy = PollPolicy {
            max_attempts: 2,
            ..PollPolicy::default()
        };

        let verifier = PollingVerifier::new(&aliases, policy, &sleeper);
        assert!(matches!(
            verifier.verify("example.com", VerificationStep::Mx),
            Err(SetupError::Service(ServiceError::Http { status: 401, .. }))
        ));
    }

    fn dashboard_api(verified: bool) -> MockAliasApi {
        let mut api = MockAliasApi::new();
        api.expect_custom_domains().returning(|| {
            Ok(vec![CustomDomain {
                id: 42,
                domain_name: "example.com".to_owned(),
                is_verified: false,
            }])
        });
        api.expect_verification_status()
            .returning(move |_, _| Ok(verified));
        api
    }

    #[test]
    fn should_confirm_manually() {
        let api = dashboard_api(true);
        let aliases = AliasManager::new(&api, None, "note");
        let mut operator = MockOperator::new();
        operator
            .expect_confirm()
            .withf(|q| q.contains("https://app.simplelogin.io/dashboard/domains/42/dns#dns-setup"))
            .times(1)
            .returning(|_| Ok(true));

        let verifier = ManualVerifier::new(&aliases, &operator);
        assert!(verifier.verify("example.com", VerificationStep::Mx).is_ok());
    }

    #[test]
    fn should_stop_when_operator_declines() {
        let api = dashboard_api(false);
        let aliases = AliasManager::new(&api, None, "note");
        let answers = Arc::new(Mutex::new(vec![false, true]));
        let mut operator = MockOperator::new();
        operator
            .expect_confirm()
            .times(2)
            .returning(move |_| Ok(answers.lock().unwrap().pop().unwrap_or(false)));

        let verifier = ManualVerifier::new(&aliases, &operator);
        assert!(matches!(
            verifier.verify("example.com", VerificationStep::Dkim),
            Err(SetupError::VerificationDeclined(VerificationStep::Dkim))
        ));
    }
}
