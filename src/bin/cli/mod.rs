use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use simplelogin_route53_helper::{
    config::{DEFAULT_RECORD_TTL, TTL},
    poll::DEFAULT_POLL_ATTEMPTS,
};

macro_rules! env_prefix {
    () => {
        "SL_HELPER_"
    };
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// SimpleLogin API key, found under "API Keys" in the SimpleLogin dashboard
    #[arg(
        long,
        global = true,
        value_name = "API_KEY",
        env = "SIMPLE_LOGIN_API_KEY",
        hide_env_values = true
    )]
    pub api_key: Option<String>,

    /// Base URL of the SimpleLogin API
    #[arg(long, global = true, value_name = "URL", env = "SIMPLE_LOGIN_API_URL")]
    pub api_url: Option<String>,

    /// Set the loglevel of the application
    #[arg(
        value_enum,
        short = 'l',
        long,
        global = true,
        default_value_t = Loglevel::Info,
        value_name = "LEVEL",
        env = concat!(env_prefix!(), "LOGLEVEL")
    )]
    pub loglevel: Loglevel,

    /// Only show what would happen: no Route53 changes, no SimpleLogin verification requests or new aliases
    #[arg(long, short = 'd', global = true, action, default_value_t = false)]
    pub dry_run: bool,

    /// AWS region to use for Route53 requests. Defaults to the AWS configuration chain
    #[arg(long, global = true, value_name = "REGION")]
    pub aws_region: Option<String>,

    /// Named AWS profile to take credentials from
    #[arg(long, global = true, value_name = "PROFILE")]
    pub aws_profile: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Subcommand)]
pub enum Command {
    /// Publish and verify the SimpleLogin DNS records of each domain, then create its aliases
    Setup(SetupArgs),
    /// Create the aliases of each domain, without touching DNS
    Aliases(AliasesArgs),
    /// Compare the Route53 records of each domain with the records SimpleLogin needs
    Status(StatusArgs),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Args)]
pub struct SetupArgs {
    /// Domains to set up, as a comma-separated list. Falls back to CUSTOM_DOMAINS
    #[arg(
        long,
        value_name = "DOMAIN",
        value_delimiter = ',',
        env = "DOMAINS"
    )]
    pub domains: Vec<String>,

    #[command(flatten)]
    pub aliases: AliasTargetArgs,

    /// TTL of the records we create, in seconds
    #[arg(
        long,
        value_name = "TTL",
        default_value_t = DEFAULT_RECORD_TTL,
        env = "RECORD_TTL"
    )]
    pub record_ttl: TTL,

    /// Time to wait between two verification checks, in seconds
    #[arg(
        long,
        value_name = "SECONDS",
        default_value_t = 30,
        env = "POLL_INTERVAL"
    )]
    pub poll_interval: u64,

    /// How many times to check each verification step before giving up
    #[arg(
        long,
        value_name = "COUNT",
        default_value_t = DEFAULT_POLL_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..),
        env = "POLL_ATTEMPTS"
    )]
    pub poll_attempts: u32,

    /// Confirm each verification step yourself from the SimpleLogin dashboard instead of polling
    #[arg(long, action, default_value_t = false)]
    pub manual_verification: bool,

    /// Choose one of the configured domains interactively
    #[arg(long, action, default_value_t = false)]
    pub pick: bool,

    /// Only set up DNS, do not create any aliases
    #[arg(long, action, default_value_t = false)]
    pub skip_aliases: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Args)]
pub struct AliasesArgs {
    /// Domains to create aliases for, as a comma-separated list. Falls back to DOMAINS
    #[arg(
        long,
        value_name = "DOMAIN",
        value_delimiter = ',',
        env = "ALIAS_DOMAINS"
    )]
    pub domains: Vec<String>,

    #[command(flatten)]
    pub aliases: AliasTargetArgs,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Args)]
pub struct StatusArgs {
    /// Domains to check, as a comma-separated list. Falls back to CUSTOM_DOMAINS
    #[arg(
        long,
        value_name = "DOMAIN",
        value_delimiter = ',',
        env = "DOMAINS"
    )]
    pub domains: Vec<String>,

    /// TTL the records are expected to have, in seconds
    #[arg(
        long,
        value_name = "TTL",
        default_value_t = DEFAULT_RECORD_TTL,
        env = "RECORD_TTL"
    )]
    pub record_ttl: TTL,
}

/// What aliases to create and where they forward to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Args)]
pub struct AliasTargetArgs {
    /// Local parts of the aliases to create on every domain, as a comma-separated list
    #[arg(
        long,
        value_name = "PREFIX",
        value_delimiter = ',',
        env = "MAILBOX_PREFIX"
    )]
    pub prefixes: Vec<String>,

    /// Mailbox the aliases forward to. Created if missing. Defaults to the account's default mailbox
    #[arg(long, value_name = "EMAIL", env = "DEFAULT_MAILBOX")]
    pub default_mailbox: Option<String>,

    /// Note attached to every alias we create
    #[arg(long, value_name = "NOTE", env = concat!(env_prefix!(), "ALIAS_NOTE"))]
    pub note: Option<String>,
}

/// Used to set the applications loglevel
// This is essentially a re-creation of log:Level. However, that enum doesn't derive ValueEnum, so we have to do it manually here
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, ValueEnum)]
pub enum Loglevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}
impl From<Loglevel> for LevelFilter {
    fn from(ll: Loglevel) -> Self {
        match ll {
            Loglevel::Error => LevelFilter::Error,
            Loglevel::Warn => LevelFilter::Warn,
            Loglevel::Info => LevelFilter::Info,
            Loglevel::Debug => LevelFilter::Debug,
            Loglevel::Trace => LevelFilter::Trace,
        }
    }
}
