//! The `cloud.` host variant, with remotes bundled in-process.

mod common;

use std::sync::Arc;

use common::*;
use nexus_host::auth::{HttpAuthClient, TokenStore};
use nexus_host::remotes::StaticFetcher;
use nexus_host::routes::View;
use nexus_host::{HostConfig, HostVariant, PageLocation, Shell};
use serde_json::json;

fn cloud_shell(ctx: &TestContext) -> Shell {
    let mut config = HostConfig {
        page: PageLocation::parse("https://cloud.vrittiai.com").unwrap(),
        ..ctx.config.clone()
    };
    config.mf_base_url = None;

    let fetcher = Arc::new(StaticFetcher::new());
    fetcher.insert(
        "VrittiAuth",
        "routes",
        json!({
            "authRoutes": [
                { "path": "login", "element": "RemoteLogin" },
                { "path": "signup", "element": "RemoteSignup", "metadata": { "title": "Create account" } }
            ],
            "accountRoutes": []
        }),
    );
    fetcher.insert(
        "VrittiCloud",
        "routes",
        json!({
            "default": {
                "cloudRoutes": [
                    { "path": "companies/:companyId", "element": "CompanyPage" },
                    { "path": "settings", "element": "SettingsPage" }
                ]
            }
        }),
    );

    let tokens = TokenStore::new();
    let api = Arc::new(HttpAuthClient::new(&config, tokens.clone()).unwrap());
    Shell::with_parts(config, fetcher, api, tokens)
}

#[tokio::test]
async fn test_cloud_public_routes_come_from_auth_remote() {
    let ctx = TestContext::new().await;
    ctx.mock_unauthenticated().await;
    let shell = cloud_shell(&ctx);
    assert_eq!(shell.variant(), HostVariant::Cloud);
    assert_eq!(
        shell.registry().resolve("VrittiCloud").unwrap().entry_url,
        "https://cloud.vrittiai.com/cloud-microfrontend/mf-manifest.json"
    );

    shell.start().await;

    let page = shell.navigate("/").await.unwrap();
    assert_eq!(page.path, "/login");
    assert_eq!(
        page.view,
        View::RemotePage {
            remote: "VrittiAuth".to_string(),
            element: Some("RemoteLogin".to_string()),
        }
    );
    // host metadata applies when the remote route carries none
    assert_eq!(page.title(), Some("Login"));

    let page = shell.navigate("/signup").await.unwrap();
    assert_eq!(page.title(), Some("Create account"));

    let page = shell.navigate("/no/such/page").await.unwrap();
    assert_eq!(page.path, "/login");
}

#[tokio::test]
async fn test_cloud_authenticated_routes() {
    let ctx = TestContext::new().await;
    ctx.mock_authenticated().await;
    let shell = cloud_shell(&ctx);
    shell.start().await;

    let page = shell.navigate("/").await.unwrap();
    assert_eq!(page.path, "/dashboard");
    assert_eq!(page.view, View::Page("DemoPage".to_string()));

    let page = shell.navigate("/companies/acme").await.unwrap();
    assert_eq!(
        page.view,
        View::RemotePage {
            remote: "VrittiCloud".to_string(),
            element: Some("CompanyPage".to_string()),
        }
    );
    assert_eq!(page.params.get("companyId").map(String::as_str), Some("acme"));
    assert!(page.layouts.is_empty());

    // unmatched by the cloud remote and no host route left
    let page = shell.navigate("/missing").await.unwrap();
    assert_eq!(page.view, View::NotFound);
}
