#![allow(clippy::unwrap_used)]
// Integration tests for `SimpleLoginClient` against a wiremock server.
//
// The client is blocking, so requests are made outside of the runtime that owns the mock server.

use serde_json::json;
use tokio::runtime::Runtime;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use simplelogin_route53_helper::aliasservice::{
    AliasApi, NewCustomAlias, ServiceError, SimpleLoginClient, VerificationStep,
};
use simplelogin_route53_helper::config::ServiceConfig;

const API_KEY: &str = "test-api-key";

// Field order is drop order: the runtime has to outlive the server
struct Harness {
    client: SimpleLoginClient,
    server: MockServer,
    runtime: Runtime,
}

impl Harness {
    fn new() -> Harness {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let server = runtime.block_on(MockServer::start());
        let config = ServiceConfig::try_new(
            Some(API_KEY.to_owned()),
            Some(format!("{}/api/", server.uri())),
            None,
            None,
        )
        .unwrap();
        let client = SimpleLoginClient::try_new(&config).unwrap();
        Harness {
            client,
            server,
            runtime,
        }
    }

    fn mount(&self, mock: Mock) {
        self.runtime.block_on(mock.mount(&self.server));
    }
}

#[test]
fn test_list_aliases_page() {
    let h = Harness::new();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v2/aliases"))
            .and(query_param("page_id", "2"))
            .and(header("Authentication", API_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "aliases": [{
                    "id": 5,
                    "email": "sales@example.com",
                    "note": null,
                    "enabled": true,
                    "mailboxes": [{"id": 1, "email": "default@example.com"}],
                    "nb_forward": 3
                }]
            }))),
    );

    let aliases = h.client.aliases_page(2).unwrap();
    assert_eq!(aliases.len(), 1);
    assert_eq!(aliases[0].email, "sales@example.com");
    assert_eq!(aliases[0].mailbox_id(), Some(1));
}

#[test]
fn test_custom_domains_accepts_both_shapes() {
    let h = Harness::new();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/custom_domains"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 9, "domain_name": "example.com", "is_verified": true}
            ]))),
    );

    let domains = h.client.custom_domains().unwrap();
    assert_eq!(domains[0].id, 9);
    assert!(domains[0].is_verified);
}

#[test]
fn test_create_custom_alias() {
    let h = Harness::new();
    h.mount(
        Mock::given(method("POST"))
            .and(path("/api/v3/alias/custom/new"))
            .and(body_json(json!({
                "alias_prefix": "support",
                "signed_suffix": "@example.com.X6_7OQ",
                "mailbox_ids": [1],
                "note": "managed"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": 11,
                "email": "support@example.com",
                "enabled": true,
                "mailbox": {"id": 1, "email": "default@example.com"}
            })))
            .expect(1),
    );

    let alias = h
        .client
        .create_custom_alias(&NewCustomAlias {
            alias_prefix: "support".to_owned(),
            signed_suffix: "@example.com.X6_7OQ".to_owned(),
            mailbox_ids: vec![1],
            note: "managed".to_owned(),
        })
        .unwrap();
    assert_eq!(alias.id, 11);
    assert_eq!(alias.mailbox_id(), Some(1));
}

#[test]
fn test_verification_code_and_status() {
    let h = Harness::new();
    h.mount(
        Mock::given(method("POST"))
            .and(path("/api/domains/verification-code"))
            .and(body_json(json!({"domain": "example.com"})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"verification_code": "abc123"})),
            ),
    );
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/domains/example.com/verify/dkim"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"verified": false}))),
    );

    assert_eq!(h.client.verification_code("example.com").unwrap(), "abc123");
    assert!(!h
        .client
        .verification_status("example.com", VerificationStep::Dkim)
        .unwrap());
}

#[test]
fn test_http_error_keeps_body() {
    let h = Harness::new();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v2/mailboxes"))
            .respond_with(ResponseTemplate::new(401).set_body_string("{\"error\": \"Wrong api key\"}")),
    );

    let result = h.client.mailboxes();
    match result {
        Err(ServiceError::Http { status, body }) => {
            assert_eq!(status, 401);
            assert!(body.contains("Wrong api key"));
        }
        other => panic!("expected Http error, got: {other:?}"),
    }
}

#[test]
fn test_malformed_body_is_an_error() {
    let h = Harness::new();
    h.mount(
        Mock::given(method("GET"))
            .and(path("/api/v5/alias/options"))
            .and(query_param("hostname", "example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true}))),
    );

    let result = h.client.alias_options("example.com");
    assert!(
        matches!(&result, Err(ServiceError::MalformedResponse { endpoint, .. }) if endpoint == "v5/alias/options"),
        "expected MalformedResponse, got: {result:?}"
    );
}
