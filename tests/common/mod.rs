#![allow(dead_code)]

use std::time::Duration;

use nexus_host::{HostConfig, PageLocation, Shell};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const STATUS_PATH: &str = "/api/cloud-api/auth/status";
pub const AUTH_MANIFEST_PATH: &str = "/auth-microfrontend/mf-manifest.json";
pub const AUTH_ROUTES_PATH: &str = "/auth-microfrontend/routes.json";

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A mock backend serving both the auth API and the remotes
pub struct TestContext {
    pub server: MockServer,
    pub config: HostConfig,
}

impl TestContext {
    pub async fn new() -> Self {
        init_logging();
        let server = MockServer::start().await;
        let page = PageLocation::parse(&server.uri()).expect("mock server uri parses");

        let mut config = HostConfig::for_page(page);
        config.mf_base_url = Some(server.uri());
        config.api_base_url = format!("{}/api/", server.uri())
            .parse()
            .expect("api base parses");
        config.remote_min_display = Duration::ZERO;
        config.csrf_enabled = false;
        config.http_timeout = Duration::from_secs(5);

        Self { server, config }
    }

    pub fn shell(&self) -> Shell {
        Shell::new(self.config.clone()).expect("shell builds")
    }

    pub async fn mock_status(&self, body: Value) {
        Mock::given(method("GET"))
            .and(path(STATUS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    pub async fn mock_authenticated(&self) {
        self.mock_status(json!({
            "isAuthenticated": true,
            "user": user_json(),
            "accessToken": "abc",
            "expiresIn": 900
        }))
        .await;
    }

    pub async fn mock_unauthenticated(&self) {
        self.mock_status(json!({ "isAuthenticated": false })).await;
    }

    /// Auth remote manifest plus its `routes` module
    pub async fn mock_auth_remote(&self, routes_module: Value) {
        Mock::given(method("GET"))
            .and(path(AUTH_MANIFEST_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(manifest_json("VrittiAuth")))
            .expect(1)
            .mount(&self.server)
            .await;
        Mock::given(method("GET"))
            .and(path(AUTH_ROUTES_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(routes_module))
            .expect(1)
            .mount(&self.server)
            .await;
    }

    /// Requests received for `path`, oldest first
    pub async fn requests_to(&self, request_path: &str) -> Vec<wiremock::Request> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.url.path() == request_path)
            .collect()
    }
}

pub fn bearer_of(request: &wiremock::Request) -> Option<String> {
    request
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub fn manifest_json(name: &str) -> Value {
    json!({
        "id": name,
        "name": name,
        "metaData": { "publicPath": "auto" },
        "exposes": [{ "id": format!("{name}:routes"), "name": "routes", "path": "./routes" }]
    })
}

pub fn user_json() -> Value {
    json!({
        "id": "usr_1",
        "email": "a@b.com",
        "firstName": "Ada",
        "lastName": "Lovelace",
        "emailVerified": true,
        "phoneVerified": false,
        "accountStatus": "ACTIVE",
        "onboardingStep": "COMPLETE",
        "hasPassword": true,
        "locale": "en",
        "timezone": "UTC",
        "createdAt": "2024-01-01T00:00:00.000Z",
        "updatedAt": "2024-06-01T12:00:00.000Z",
        "lastLoginAt": null
    })
}
