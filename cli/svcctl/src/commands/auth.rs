//! Session commands.

use std::sync::Arc;

use anyhow::Result;
use autoserv_id::Username;
use autoserv_sync::{ApiClient, SnapshotFetcher};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;

use crate::config::Credentials;
use crate::error::CliError;
use crate::output::{print_single, print_success, print_warning, OutputFormat};

use super::CommandContext;

/// Session commands.
#[derive(Debug, Args)]
pub struct AuthCommand {
    #[command(subcommand)]
    command: AuthSubcommand,
}

#[derive(Debug, Subcommand)]
enum AuthSubcommand {
    /// Save a portal session cookie.
    Login(LoginArgs),

    /// Forget the saved session.
    Logout,

    /// Show the saved session.
    Status,
}

#[derive(Debug, Args)]
struct LoginArgs {
    /// Portal username (also the dashboard channel key).
    #[arg(long, env = "SVC_USERNAME")]
    username: Username,

    /// Session cookie, e.g. `SESSION=...`, copied from a browser session.
    #[arg(long, env = "SVC_SESSION_COOKIE", hide_env_values = true)]
    cookie: String,

    /// Save without checking the session against the portal.
    #[arg(long)]
    no_verify: bool,
}

#[derive(Debug, Serialize)]
struct StatusView {
    authenticated: bool,
    username: Option<String>,
    saved_at: Option<String>,
    api_url: String,
}

impl AuthCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            AuthSubcommand::Login(args) => login(ctx, args).await,
            AuthSubcommand::Logout => logout(ctx).await,
            AuthSubcommand::Status => status(ctx).await,
        }
    }
}

async fn login(ctx: CommandContext, args: LoginArgs) -> Result<()> {
    let creds = Credentials::new(args.username, args.cookie.trim().to_string());

    if args.no_verify {
        print_warning("Session not verified.");
    } else {
        let client = ApiClient::new(&ctx.config.api_url, Arc::new(creds.clone()))
            .map_err(CliError::from)?;
        if SnapshotFetcher::new(client).fetch().await.is_none() {
            return Err(CliError::NotAuthenticated.into());
        }
    }

    creds.save()?;
    print_success(&format!("Logged in as {}.", creds.username));
    Ok(())
}

async fn logout(_ctx: CommandContext) -> Result<()> {
    Credentials::delete()?;
    print_success("Logged out successfully.");
    Ok(())
}

async fn status(ctx: CommandContext) -> Result<()> {
    if ctx.format == OutputFormat::Json {
        let view = StatusView {
            authenticated: ctx.credentials.is_some(),
            username: ctx.credentials.as_ref().map(|c| c.username.to_string()),
            saved_at: ctx.credentials.as_ref().map(|c| c.saved_at.to_rfc3339()),
            api_url: ctx.config.api_url.clone(),
        };
        print_single(&view);
        return Ok(());
    }

    match &ctx.credentials {
        Some(creds) => {
            println!("{} Authenticated", "Status:".green().bold());
            println!("  Username: {}", creds.username);
            println!("  Saved: {}", creds.saved_at.format("%Y-%m-%d %H:%M UTC"));
            println!("  Portal: {}", ctx.config.api_url);
        }
        None => {
            println!("{} Not authenticated", "Status:".red().bold());
            println!("\nRun {} to log in.", "svc auth login".cyan());
        }
    }

    Ok(())
}
