//! Nexus host command line driver
//!
//! Runs the shell bootstrap outside a browser: resolves remotes, checks the
//! session and resolves locations against the active route set.
//!
//! # Usage
//!
//! ```bash
//! # Where each remote's manifest lives
//! nexus_host remotes
//!
//! # Both composed route sets
//! nexus_host routes
//!
//! # Check the session, load remotes and resolve a location
//! NEXUS_PAGE_URL=https://cloud.vrittiai.com nexus_host resolve /account/profile
//!
//! # Sign in, or walk the password reset flow
//! nexus_host login a@b.com --password 'Secret#123'
//! nexus_host forgot-password a@b.com --otp 123456 --new-password 'Secret#123'
//! ```

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nexus_host::routes::View;
use nexus_host::{HostConfig, Shell};

#[derive(Parser)]
#[command(name = "nexus_host")]
#[command(version = "0.1.0")]
#[command(about = "Micro-frontend host shell driver")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Page location the shell is served from (overrides NEXUS_PAGE_URL)
    #[arg(long, global = true)]
    page_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered remotes and their manifest URLs
    Remotes,

    /// Print the authenticated and public route sets
    Routes,

    /// Check the session and resolve a location
    Resolve {
        /// Location path, e.g. /account/profile
        path: String,
    },

    /// Sign in with email and password
    Login {
        email: String,

        #[arg(long, env = "NEXUS_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Request a reset code, verify it and set a new password
    ForgotPassword {
        email: String,

        /// Six-digit code (prompted for when omitted)
        #[arg(long)]
        otp: Option<String>,

        #[arg(long, env = "NEXUS_NEW_PASSWORD", hide_env_values = true)]
        new_password: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nexus_host=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = HostConfig::from_env().context("Failed to load configuration")?;
    if let Some(raw) = &cli.page_url {
        let page = nexus_host::PageLocation::parse(raw)
            .with_context(|| format!("Invalid --page-url '{raw}'"))?;
        config = HostConfig {
            page: page.clone(),
            api_base_url: HostConfig::for_page(page).api_base_url,
            ..config
        };
    }

    let shell = Shell::new(config).context("Failed to build shell")?;

    match cli.command {
        Commands::Remotes => {
            for remote in shell.registry().iter() {
                println!("{:<12} {} ({})", remote.name, remote.entry_url, remote.exposed_module);
            }
        }
        Commands::Routes => {
            println!("variant: {:?}", shell.variant());
            println!("authenticated:");
            for line in shell.authenticated_routes().describe() {
                println!("  {line}");
            }
            println!("public:");
            for line in shell.public_routes().describe() {
                println!("  {line}");
            }
        }
        Commands::Resolve { path } => {
            let state = shell.start().await;
            if let Some(error) = &state.error {
                eprintln!("session check failed: {error}");
            }
            println!("session: {}", shell.active_routes().name());

            let page = shell.navigate(&path).await?;
            println!("location: {}", page.path);
            if let Some(title) = page.title() {
                println!("title: {title}");
            }
            if !page.layouts.is_empty() {
                println!("layouts: {}", page.layouts.join(" > "));
            }
            for (name, value) in &page.params {
                println!("param {name}={value}");
            }
            match page.view {
                View::Placeholder => println!("view: loading"),
                View::Page(name) => println!("view: {name}"),
                View::RemotePage { remote, element } => {
                    println!("view: {remote}/{}", element.unwrap_or_default())
                }
                View::RemoteError(message) => println!("view: error: {message}"),
                View::NotFound => println!("view: not found"),
            }
        }
        Commands::Login { email, password } => {
            let nav = shell.session().login(&email, &password).await?;
            println!("signed in, reload to {}", nav.target());
        }
        Commands::ForgotPassword {
            email,
            otp,
            new_password,
        } => {
            let mut flow = shell.session().password_reset();
            flow.submit_email(&email).await?;
            if let Some(notice) = flow.notice() {
                println!("{notice}");
            }

            let code = match otp {
                Some(code) => code,
                None => prompt("Code: ")?,
            };
            flow.verify_otp(&code).await?;
            let nav = flow.reset_password(&new_password, &new_password).await?;
            println!("password reset, reload to {}", nav.target());
        }
    }

    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
