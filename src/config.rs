//! Configuration values shared between the clients and the workflows.
//!
//! Nothing in this crate reads the environment on its own: the binary collects flags, environment variables
//! and the optional `.env` file, then hands explicit values to the constructors found here and in the other modules.

use thiserror::Error;

use crate::poll::PollPolicy;

/// TTL for DNS record sets, in seconds
pub type TTL = u32;

pub const DEFAULT_RECORD_TTL: TTL = 3600;
pub const DEFAULT_API_URL: &str = "https://app.simplelogin.io/api/";
pub const DEFAULT_ALIAS_NOTE: &str = "Created by simplelogin-route53-helper";

/// Settings for talking to the SimpleLogin API
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ServiceConfig {
    pub api_key: String,
    pub api_url: String,
    /// Mailbox that new aliases forward to. If unset, the account's default mailbox is used
    pub default_mailbox: Option<String>,
    /// Note attached to every alias created by us
    pub note: String,
}

// The api key must never end up in logs
impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("api_key", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("default_mailbox", &self.default_mailbox)
            .field("note", &self.note)
            .finish()
    }
}

impl ServiceConfig {
    pub fn try_new(
        api_key: Option<String>,
        api_url: Option<String>,
        default_mailbox: Option<String>,
        note: Option<String>,
    ) -> Result<ServiceConfig, ConfigError> {
        let api_key = api_key
            .map(|k| k.trim().to_owned())
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;

        let default_mailbox = default_mailbox
            .map(|m| m.trim().to_owned())
            .filter(|m| !m.is_empty());
        if let Some(mailbox) = &default_mailbox {
            if !mailbox.contains('@') {
                return Err(ConfigError::Invalid {
                    field: "default mailbox",
                    reason: format!("{} is not an email address", mailbox),
                });
            }
        }

        Ok(ServiceConfig {
            api_key,
            api_url: api_url
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_API_URL.to_owned()),
            default_mailbox,
            note: note.unwrap_or_else(|| DEFAULT_ALIAS_NOTE.to_owned()),
        })
    }
}

/// Settings for the domain provisioning workflow
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SetupConfig {
    pub record_ttl: TTL,
    pub poll: PollPolicy,
}

impl Default for SetupConfig {
    fn default() -> Self {
        SetupConfig {
            record_ttl: DEFAULT_RECORD_TTL,
            poll: PollPolicy::default(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConfigError {
    #[error("a SimpleLogin API key is required (--api-key or SIMPLE_LOGIN_API_KEY)")]
    MissingApiKey,
    #[error("no domains specified (--domains or {0})")]
    MissingDomains(&'static str),
    #[error("no mailbox prefixes specified (--prefixes or MAILBOX_PREFIX)")]
    MissingPrefixes,
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("interactive prompt failed: {0}")]
    Prompt(String),
}

/// Clean up a list of domain names as given on the command line or in the environment.
///
/// Entries are trimmed, lowercased and stripped of a trailing dot. Empty entries and duplicates are dropped.
pub fn domain_list(raw: &[String]) -> Result<Vec<String>, ConfigError> {
    let mut domains: Vec<String> = Vec::new();
    for entry in raw {
        let domain = entry.trim().trim_end_matches('.').to_lowercase();
        if domain.is_empty() || domains.contains(&domain) {
            continue;
        }
        if !domain.contains('.') || domain.contains('@') || domain.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "domain",
                reason: format!("'{}' is not a domain name", entry.trim()),
            });
        }
        domains.push(domain);
    }
    Ok(domains)
}

/// Clean up a list of mailbox prefixes (the local part of an alias).
pub fn prefix_list(raw: &[String]) -> Result<Vec<String>, ConfigError> {
    let mut prefixes: Vec<String> = Vec::new();
    for entry in raw {
        let prefix = entry.trim().to_owned();
        if prefix.is_empty() || prefixes.contains(&prefix) {
            continue;
        }
        if prefix.contains('@') || prefix.contains(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "mailbox prefix",
                reason: format!("'{}' may not contain '@' or whitespace", prefix),
            });
        }
        prefixes.push(prefix);
    }
    Ok(prefixes)
}
