use std::time::Duration;

use log::{debug, trace};
use reqwest::{
    blocking::{Client, RequestBuilder},
    header::{HeaderMap, HeaderValue},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{
    Alias, AliasApi, AliasOptions, CustomDomain, Mailbox, NewCustomAlias, ServiceError,
    VerificationStep,
};
use crate::config::ServiceConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const AUTH_HEADER: &str = "Authentication";
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Blocking HTTP client for the SimpleLogin REST API.
///
/// The API key is sent with every request in the `Authentication` header and is never logged.
pub struct SimpleLoginClient {
    client: Client,
    base_url: String,
}

impl std::fmt::Debug for SimpleLoginClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleLoginClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

// The endpoint has answered with both shapes over time
#[derive(Deserialize)]
#[serde(untagged)]
enum CustomDomainsResponse {
    Wrapped { custom_domains: Vec<CustomDomain> },
    Bare(Vec<CustomDomain>),
}

#[derive(Deserialize)]
struct MailboxesResponse {
    mailboxes: Vec<Mailbox>,
}

#[derive(Deserialize)]
struct AliasesResponse {
    aliases: Vec<Alias>,
}

#[derive(Deserialize)]
struct VerificationCodeResponse {
    verification_code: String,
}

#[derive(Deserialize)]
struct VerificationResponse {
    verified: bool,
}

#[derive(Serialize)]
struct EmailBody<'a> {
    email: &'a str,
}

#[derive(Serialize)]
struct DomainBody<'a> {
    domain: &'a str,
}

impl SimpleLoginClient {
    pub fn try_new(config: &ServiceConfig) -> Result<SimpleLoginClient, ServiceError> {
        let mut key =
            HeaderValue::from_str(&config.api_key).map_err(|_| ServiceError::InvalidApiKey)?;
        key.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTH_HEADER, key);

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()?;

        Ok(SimpleLoginClient {
            client,
            base_url: config.api_url.trim_end_matches('/').to_owned(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    // Send a request and decode its body. Non-2xx answers keep their body for the error message
    fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<T, ServiceError> {
        debug!("Calling SimpleLogin endpoint {}", endpoint);
        let response = request.send()?;
        let status = response.status();
        let body = response.text()?;
        trace!("{} answered {}: {}", endpoint, status, body);

        if !status.is_success() {
            return Err(ServiceError::Http {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| ServiceError::MalformedResponse {
            endpoint: endpoint.to_owned(),
            message: e.to_string(),
        })
    }
}

impl AliasApi for SimpleLoginClient {
    fn custom_domains(&self) -> Result<Vec<CustomDomain>, ServiceError> {
        let response: CustomDomainsResponse = self.send(
            "custom_domains",
            self.client.get(self.url("custom_domains")),
        )?;
        Ok(match response {
            CustomDomainsResponse::Wrapped { custom_domains } => custom_domains,
            CustomDomainsResponse::Bare(domains) => domains,
        })
    }

    fn mailboxes(&self) -> Result<Vec<Mailbox>, ServiceError> {
        let response: MailboxesResponse =
            self.send("v2/mailboxes", self.client.get(self.url("v2/mailboxes")))?;
        Ok(response.mailboxes)
    }

    fn create_mailbox(&self, email: &str) -> Result<Mailbox, ServiceError> {
        self.send(
            "mailboxes",
            self.client
                .post(self.url("mailboxes"))
                .json(&EmailBody { email }),
        )
    }

    fn aliases_page(&self, page_id: u32) -> Result<Vec<Alias>, ServiceError> {
        let response: AliasesResponse = self.send(
            "v2/aliases",
            self.client
                .get(self.url("v2/aliases"))
                .query(&[("page_id", page_id)]),
        )?;
        Ok(response.aliases)
    }

    fn alias_options(&self, hostname: &str) -> Result<AliasOptions, ServiceError> {
        self.send(
            "v5/alias/options",
            self.client
                .get(self.url("v5/alias/options"))
                .query(&[("hostname", hostname)]),
        )
    }

    fn create_custom_alias(&self, request: &NewCustomAlias) -> Result<Alias, ServiceError> {
        self.send(
            "v3/alias/custom/new",
            self.client
                .post(self.url("v3/alias/custom/new"))
                .json(request),
        )
    }

    fn verification_code(&self, domain: &str) -> Result<String, ServiceError> {
        let response: VerificationCodeResponse = self.send(
            "domains/verification-code",
            self.client
                .post(self.url("domains/verification-code"))
                .json(&DomainBody { domain }),
        )?;
        Ok(response.verification_code)
    }

    fn verification_status(
        &self,
        domain: &str,
        step: VerificationStep,
    ) -> Result<bool, ServiceError> {
        let path = format!("domains/{}/verify/{}", domain, step);
        let response: VerificationResponse = self.send(&path, self.client.get(self.url(&path)))?;
        Ok(response.verified)
    }
}
