//! Access to the alias provider (SimpleLogin).
//!
//! [`AliasApi`] is the raw transport, one method per REST endpoint. [`SimpleLoginClient`] implements it over HTTP.
//! [`AliasManager`] builds the operations the workflows actually need on top of it: paginated alias listing,
//! signed suffix resolution, mailbox resolution and at-most-once alias creation.

mod manager;
mod simplelogin;

pub use manager::{AliasManager, AliasOutcome, ALIAS_PAGE_SIZE};
pub use simplelogin::SimpleLoginClient;

use std::fmt::Display;

#[cfg(test)]
use mockall::automock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The raw SimpleLogin REST API
#[cfg_attr(test, automock)]
pub trait AliasApi {
    /// `GET custom_domains`
    fn custom_domains(&self) -> Result<Vec<CustomDomain>, ServiceError>;
    /// `GET v2/mailboxes`
    fn mailboxes(&self) -> Result<Vec<Mailbox>, ServiceError>;
    /// `POST mailboxes`
    fn create_mailbox(&self, email: &str) -> Result<Mailbox, ServiceError>;
    /// `GET v2/aliases?page_id=N`, [`ALIAS_PAGE_SIZE`] aliases per page
    fn aliases_page(&self, page_id: u32) -> Result<Vec<Alias>, ServiceError>;
    /// `GET v5/alias/options?hostname=...`
    fn alias_options(&self, hostname: &str) -> Result<AliasOptions, ServiceError>;
    /// `POST v3/alias/custom/new`
    fn create_custom_alias(&self, request: &NewCustomAlias) -> Result<Alias, ServiceError>;
    /// `POST domains/verification-code`
    fn verification_code(&self, domain: &str) -> Result<String, ServiceError>;
    /// `GET domains/{domain}/verify/{step}`
    fn verification_status(&self, domain: &str, step: VerificationStep) -> Result<bool, ServiceError>;
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("request failed with HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed response from {endpoint}: {message}")]
    MalformedResponse { endpoint: String, message: String },
    #[error("domain {0} is not registered as a custom domain")]
    DomainNotFound(String),
    #[error("no alias suffix available for domain {0}")]
    NoMatchingSuffix(String),
    #[error("SimpleLogin does not allow creating aliases on {0}")]
    AliasCreationNotAllowed(String),
    #[error("no mailbox available: configure a default mailbox or mark one as default in SimpleLogin")]
    NoMailbox,
    #[error("the API key contains characters that cannot be sent in a header")]
    InvalidApiKey,
}

/// A custom domain registered with SimpleLogin
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct CustomDomain {
    pub id: i64,
    pub domain_name: String,
    #[serde(default)]
    pub is_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct Mailbox {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub verified: bool,
}

/// Mailbox reference embedded in an alias
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct AliasMailbox {
    pub id: i64,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct Alias {
    pub id: i64,
    pub email: String,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub mailbox: Option<AliasMailbox>,
    #[serde(default)]
    pub mailboxes: Vec<AliasMailbox>,
}

impl Alias {
    pub fn prefix(&self) -> &str {
        self.email
            .rsplit_once('@')
            .map_or(self.email.as_str(), |(prefix, _)| prefix)
    }

    pub fn domain(&self) -> &str {
        self.email.rsplit_once('@').map_or("", |(_, domain)| domain)
    }

    /// Id of the mailbox this alias forwards to (the first one, if there are several)
    pub fn mailbox_id(&self) -> Option<i64> {
        self.mailboxes
            .first()
            .or(self.mailbox.as_ref())
            .map(|m| m.id)
    }
}

impl Display for Alias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (id {})", self.email, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct AliasSuffix {
    pub suffix: String,
    pub signed_suffix: String,
    #[serde(default)]
    pub is_custom: bool,
    #[serde(default)]
    pub is_premium: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct AliasOptions {
    /// False once the account hit its alias quota. Assumed true when the field is missing
    #[serde(default = "can_create_by_default")]
    pub can_create: bool,
    #[serde(default)]
    pub prefix_suggestion: String,
    pub suffixes: Vec<AliasSuffix>,
}

fn can_create_by_default() -> bool {
    true
}

/// Body of a custom alias creation request
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct NewCustomAlias {
    pub alias_prefix: String,
    pub signed_suffix: String,
    pub mailbox_ids: Vec<i64>,
    pub note: String,
}

/// Checks SimpleLogin runs against the DNS records of a custom domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerificationStep {
    Ownership,
    Mx,
    Spf,
    Dkim,
}

impl VerificationStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStep::Ownership => "ownership",
            VerificationStep::Mx => "mx",
            VerificationStep::Spf => "spf",
            VerificationStep::Dkim => "dkim",
        }
    }
}

impl Display for VerificationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
