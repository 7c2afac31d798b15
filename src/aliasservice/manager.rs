use log::{debug, info, trace};

use super::{Alias, AliasApi, AliasOptions, Mailbox, NewCustomAlias, ServiceError, VerificationStep};

/// Number of aliases the API returns per page. A shorter page is the last one
pub const ALIAS_PAGE_SIZE: usize = 20;

/// Result of [`AliasManager::create_alias()`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AliasOutcome {
    /// The alias did not exist and was created
    Created(Alias),
    /// The alias already existed and was left untouched
    Existing(Alias),
}

impl AliasOutcome {
    pub fn alias(&self) -> &Alias {
        match self {
            AliasOutcome::Created(a) | AliasOutcome::Existing(a) => a,
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, AliasOutcome::Created(_))
    }
}

/// The alias operations the workflows need, built on top of an [`AliasApi`].
pub struct AliasManager<'a> {
    api: &'a dyn AliasApi,
    default_mailbox: Option<String>,
    note: String,
}

impl<'a> AliasManager<'a> {
    pub fn new(api: &'a dyn AliasApi, default_mailbox: Option<String>, note: impl Into<String>) -> Self {
        AliasManager {
            api,
            default_mailbox,
            note: note.into(),
        }
    }

    /// SimpleLogin id of a custom domain
    pub fn get_domain_id(&self, domain: &str) -> Result<i64, ServiceError> {
        self.api
            .custom_domains()?
            .into_iter()
            .find(|d| d.domain_name.eq_ignore_ascii_case(domain))
            .map(|d| d.id)
            .ok_or_else(|| ServiceError::DomainNotFound(domain.to_owned()))
    }

    pub fn list_mailboxes(&self) -> Result<Vec<Mailbox>, ServiceError> {
        self.api.mailboxes()
    }

    pub fn list_aliases_page(&self, page_id: u32) -> Result<Vec<Alias>, ServiceError> {
        self.api.aliases_page(page_id)
    }

    /// Every alias of the account, reading pages until one comes back short
    pub fn list_aliases(&self) -> Result<Vec<Alias>, ServiceError> {
        let mut aliases = Vec::new();
        let mut page_id = 0;
        loop {
            let page = self.list_aliases_page(page_id)?;
            trace!("Alias page {} holds {} aliases", page_id, page.len());
            let last = page.len() < ALIAS_PAGE_SIZE;
            aliases.extend(page);
            if last {
                break;
            }
            page_id += 1;
        }
        debug!("Found {} aliases on {} page(s)", aliases.len(), page_id + 1);
        Ok(aliases)
    }

    pub fn get_alias_options(&self, domain: &str) -> Result<AliasOptions, ServiceError> {
        self.api.alias_options(domain)
    }

    /// The signed suffix authorizing aliases of the form `prefix@domain`
    pub fn signed_suffix(&self, domain: &str) -> Result<String, ServiceError> {
        suffix_for(domain, self.get_alias_options(domain)?)
    }

    pub fn get_or_create_mailbox(&self, email: &str) -> Result<Mailbox, ServiceError> {
        if let Some(existing) = self
            .list_mailboxes()?
            .into_iter()
            .find(|m| m.email.eq_ignore_ascii_case(email))
        {
            debug!("Using existing mailbox {} (id {})", existing.email, existing.id);
            return Ok(existing);
        }
        info!("Creating mailbox {}", email);
        self.api.create_mailbox(email)
    }

    /// Mailbox new aliases forward to: the configured one, else the account default
    pub fn resolve_mailbox(&self) -> Result<Mailbox, ServiceError> {
        match &self.default_mailbox {
            Some(email) => self.get_or_create_mailbox(email),
            None => self
                .list_mailboxes()?
                .into_iter()
                .find(|m| m.default)
                .ok_or(ServiceError::NoMailbox),
        }
    }

    /// The alias `prefix@domain`, if the account has it
    pub fn find_alias(&self, domain: &str, prefix: &str) -> Result<Option<Alias>, ServiceError> {
        let email = format!("{}@{}", prefix, domain);
        Ok(self
            .list_aliases()?
            .into_iter()
            .find(|a| a.email.eq_ignore_ascii_case(&email)))
    }

    /// Create `prefix@domain` unless it already exists.
    pub fn create_alias(&self, domain: &str, prefix: &str) -> Result<AliasOutcome, ServiceError> {
        if let Some(existing) = self.find_alias(domain, prefix)? {
            debug!("Alias {} already exists", existing);
            return Ok(AliasOutcome::Existing(existing));
        }

        let options = self.get_alias_options(domain)?;
        if !options.can_create {
            return Err(ServiceError::AliasCreationNotAllowed(domain.to_owned()));
        }
        let signed_suffix = suffix_for(domain, options)?;
        let mailbox = self.resolve_mailbox()?;
        let request = NewCustomAlias {
            alias_prefix: prefix.to_owned(),
            signed_suffix,
            mailbox_ids: vec![mailbox.id],
            note: self.note.clone(),
        };
        let alias = self.api.create_custom_alias(&request)?;
        info!("Created alias {} forwarding to {}", alias, mailbox.email);
        Ok(AliasOutcome::Created(alias))
    }

    pub fn verification_code(&self, domain: &str) -> Result<String, ServiceError> {
        self.api.verification_code(domain)
    }

    pub fn is_verified(&self, domain: &str, step: VerificationStep) -> Result<bool, ServiceError> {
        let verified = self.api.verification_status(domain, step)?;
        debug!("{} verification of {}: {}", step, domain, verified);
        Ok(verified)
    }
}

fn suffix_for(domain: &str, options: AliasOptions) -> Result<String, ServiceError> {
    let wanted = format!("@{}", domain);
    options
        .suffixes
        .into_iter()
        .find(|s| s.suffix.eq_ignore_ascii_case(&wanted))
        .map(|s| s.signed_suffix)
        .ok_or_else(|| ServiceError::NoMatchingSuffix(domain.to_owned()))
}
