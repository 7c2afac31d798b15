#![allow(clippy::uninlined_format_args)]

mod cli;
mod executor;

use std::{io::IsTerminal, process::ExitCode, time::Duration};

use clap::Parser;
use env_logger::Builder;
use log::{debug, error, info, warn};

use simplelogin_route53_helper::{
    aliasservice::{AliasManager, SimpleLoginClient},
    config::{self, ConfigError, ServiceConfig, SetupConfig},
    mailrecords::MailRecords,
    poll::{PollPolicy, ThreadSleeper},
    provider::{Provider, Route53Provider, Route53ProviderConfig},
    provision::AliasProvisioner,
    setup::{ManualVerifier, PollingVerifier, TerminalOperator, Verifier},
};

use cli::{AliasTargetArgs, Cli, Command};
use executor::{report_status, Executor, ExecutorError};

fn main() -> ExitCode {
    // Values from a .env file only fill in what is not already set in the environment
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();

    Builder::new().filter_level(cli.loglevel.into()).init();
    match dotenv {
        Ok(path) => debug!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring unreadable .env file: {}", e),
    }

    if cli.dry_run {
        info!("Running in dry-run mode, no changes will be made to Route53 or SimpleLogin");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), ExecutorError> {
    match &cli.command {
        Command::Setup(args) => {
            let domains = resolve_domains(&args.domains, "DOMAINS", "CUSTOM_DOMAINS", args.pick)?;
            let prefixes = if args.skip_aliases {
                None
            } else {
                Some(prefixes(&args.aliases)?)
            };
            let service = service_config(&cli, &args.aliases)?;
            let client = SimpleLoginClient::try_new(&service)?;
            let aliases = AliasManager::new(&client, service.default_mailbox.clone(), service.note.clone());
            let settings = SetupConfig {
                record_ttl: args.record_ttl,
                poll: PollPolicy {
                    interval: Duration::from_secs(args.poll_interval),
                    max_attempts: args.poll_attempts,
                },
            };
            let provider = provider(&cli)?;
            let records = MailRecords::new(provider.as_ref(), settings.record_ttl);
            let polling;
            let manual;
            let verifier: &dyn Verifier = if args.manual_verification {
                manual = ManualVerifier::new(&aliases, &TerminalOperator);
                &manual
            } else {
                polling = PollingVerifier::new(&aliases, settings.poll, &ThreadSleeper);
                &polling
            };

            let result = Executor::new(&aliases, &records, verifier).setup(&domains, prefixes.as_deref());
            for report in result.setups.iter().filter(|r| !r.success()) {
                warn!("{}: {}", report.domain, report.state);
            }
            if result.success() {
                info!("Completed");
            } else {
                warn!("Completed with errors");
            }
        }
        Command::Aliases(args) => {
            let domains = resolve_domains(&args.domains, "ALIAS_DOMAINS", "DOMAINS", false)?;
            let prefixes = prefixes(&args.aliases)?;
            let service = service_config(&cli, &args.aliases)?;
            let client = SimpleLoginClient::try_new(&service)?;
            let aliases = AliasManager::new(&client, service.default_mailbox.clone(), service.note.clone());

            let report = AliasProvisioner::new(&aliases, cli.dry_run).run(&domains, &prefixes);
            for failure in &report.failures {
                warn!("{}@{}: {}", failure.prefix, failure.domain, failure.reason);
            }
        }
        Command::Status(args) => {
            let domains = resolve_domains(&args.domains, "DOMAINS", "CUSTOM_DOMAINS", false)?;
            let provider = provider(&cli)?;
            let records = MailRecords::new(provider.as_ref(), args.record_ttl);
            if report_status(&records, &domains) {
                info!("All records are in place");
            } else {
                warn!("Some records are missing or differ");
            }
        }
    }
    Ok(())
}

fn service_config(cli: &Cli, targets: &AliasTargetArgs) -> Result<ServiceConfig, ConfigError> {
    ServiceConfig::try_new(
        cli.api_key.clone(),
        cli.api_url.clone(),
        targets.default_mailbox.clone(),
        targets.note.clone(),
    )
}

fn provider(cli: &Cli) -> Result<Box<dyn Provider>, ExecutorError> {
    let provider = Route53Provider::from_config(&Route53ProviderConfig {
        region: cli.aws_region.clone(),
        profile: cli.aws_profile.clone(),
        dry_run: cli.dry_run,
    })?;
    info!("Connected to Route53");
    Ok(provider)
}

fn prefixes(targets: &AliasTargetArgs) -> Result<Vec<String>, ConfigError> {
    let prefixes = config::prefix_list(&targets.prefixes)?;
    if prefixes.is_empty() {
        return Err(ConfigError::MissingPrefixes);
    }
    Ok(prefixes)
}

/// Domains from the command line or `primary_env`, else from `fallback_env`, else asked for on a terminal
fn resolve_domains(
    given: &[String],
    primary_env: &'static str,
    fallback_env: &str,
    pick: bool,
) -> Result<Vec<String>, ConfigError> {
    let mut domains = config::domain_list(given)?;
    if domains.is_empty() {
        if let Ok(raw) = std::env::var(fallback_env) {
            let raw: Vec<String> = raw.split(',').map(str::to_owned).collect();
            domains = config::domain_list(&raw)?;
        }
    }
    if domains.is_empty() && std::io::stdin().is_terminal() {
        let domain = dialoguer::Input::<String>::new()
            .with_prompt("Domain to use")
            .interact_text()
            .map_err(|e| ConfigError::Prompt(e.to_string()))?;
        domains = config::domain_list(&[domain])?;
    }
    if domains.is_empty() {
        return Err(ConfigError::MissingDomains(primary_env));
    }

    if pick && domains.len() > 1 {
        let choice = dialoguer::Select::new()
            .with_prompt("Domain to set up")
            .items(&domains)
            .default(0)
            .interact()
            .map_err(|e| ConfigError::Prompt(e.to_string()))?;
        domains = vec![domains.swap_remove(choice)];
    }
    Ok(domains)
}
