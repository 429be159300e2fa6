//! Static route tables for each host variant.

use super::types::{RemoteTarget, RouteEntry, RouteMetadata};
use crate::config::HostVariant;
use crate::remotes::{AUTH_REMOTE, CLOUD_REMOTE};

const ROUTES_MODULE: &str = "routes";

fn auth_remote(path: &str, title: &str, requires_auth: bool) -> RouteEntry {
    RouteEntry::remote(
        path,
        RemoteTarget::new(AUTH_REMOTE, ROUTES_MODULE, Some("authRoutes")),
        Some(RouteMetadata::titled(title, requires_auth)),
    )
}

/// Auth micro-frontend: login, signup, forgot-password, mfa, onboarding
pub fn auth_routes() -> Vec<RouteEntry> {
    vec![
        auth_remote("/login", "Login", false),
        auth_remote("/signup", "Sign Up", false),
        auth_remote("/signup-success", "Sign Up Success", false),
        auth_remote("/forgot-password", "Forgot Password", false),
        auth_remote("/mfa-verify", "Verify MFA", false),
        auth_remote("/onboarding/*", "Onboarding", true),
    ]
}

/// Cloud micro-frontend catch-all: dashboard, companies, settings
pub fn cloud_routes() -> Vec<RouteEntry> {
    vec![RouteEntry::remote(
        "/*",
        RemoteTarget::new(CLOUD_REMOTE, ROUTES_MODULE, Some("cloudRoutes")),
        Some(RouteMetadata::titled("Dashboard", true)),
    )]
}

fn app_layout() -> RouteEntry {
    RouteEntry::layout(
        "/",
        "AppLayout",
        vec![
            RouteEntry::index_redirect("/dashboard"),
            RouteEntry::page("dashboard", "DemoPage")
                .with_metadata(RouteMetadata::titled("Dashboard", true)),
            RouteEntry::remote(
                "account/*",
                RemoteTarget::new(AUTH_REMOTE, ROUTES_MODULE, Some("accountRoutes")),
                Some(RouteMetadata::titled("Account", true)),
            ),
        ],
    )
}

/// Routes mounted while the user is authenticated
pub fn authenticated_routes(variant: HostVariant) -> Vec<RouteEntry> {
    let mut routes = vec![app_layout()];
    match variant {
        HostVariant::Standalone => routes.push(RouteEntry::redirect("*", "/dashboard")),
        HostVariant::Cloud => routes.extend(cloud_routes()),
    }
    routes
}

/// Routes mounted while the user is not authenticated
pub fn public_routes(variant: HostVariant) -> Vec<RouteEntry> {
    let mut routes = match variant {
        HostVariant::Standalone => vec![RouteEntry::layout(
            "/",
            "AuthLayout",
            vec![
                RouteEntry::index_redirect("/login"),
                RouteEntry::page("login", "LoginPage")
                    .with_metadata(RouteMetadata::titled("Login", false)),
                RouteEntry::page("forgot-password", "ForgotPasswordPage")
                    .with_metadata(RouteMetadata::titled("Forgot Password", false)),
            ],
        )],
        HostVariant::Cloud => {
            let mut routes = vec![RouteEntry::redirect("/", "/login")];
            routes.extend(auth_routes());
            routes
        }
    };
    routes.push(RouteEntry::redirect("*", "/login"));
    routes
}
