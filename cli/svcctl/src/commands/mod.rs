//! CLI commands.

mod auth;
mod config;
mod dashboard;
mod schedule;

use std::sync::Arc;

use anyhow::Result;
use autoserv_sync::{ApiClient, CredentialProvider, SyncConfig};
use clap::{Parser, Subcommand};

use crate::config::{Config, Credentials};
use crate::error::CliError;
use crate::output::OutputFormat;

/// autoserv CLI - live dashboard and schedule board for the service portal.
#[derive(Debug, Parser)]
#[command(name = "svc")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, global = true, value_enum, default_value = "table")]
    format: OutputFormat,

    /// REST base URL (overrides the saved config).
    #[arg(long, global = true, env = "SVC_API_URL")]
    api_url: Option<String>,

    /// STOMP WebSocket endpoint (overrides the saved config).
    #[arg(long, global = true, env = "SVC_WS_URL")]
    ws_url: Option<String>,

    /// Emit logs as JSON on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Manage the portal session.
    Auth(auth::AuthCommand),

    /// Show or change CLI configuration.
    Config(config::ConfigCommand),

    /// Show or follow the customer dashboard.
    Dashboard(dashboard::DashboardCommand),

    /// Inspect and rearrange the schedule board.
    Schedule(schedule::ScheduleCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    pub fn log_json(&self) -> bool {
        self.log_json
    }

    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        let mut config = Config::load()?;
        let credentials = Credentials::load()?;

        // Flags apply to this run only; `config set` persists.
        let saved_config = config.clone();
        if let Some(url) = self.api_url {
            config.api_url = url;
        }
        if let Some(url) = self.ws_url {
            config.ws_url = url;
        }

        let ctx = CommandContext {
            config,
            saved_config,
            credentials,
            format: self.format,
        };

        match self.command {
            Commands::Auth(cmd) => cmd.run(ctx).await,
            Commands::Config(cmd) => cmd.run(ctx).await,
            Commands::Dashboard(cmd) => cmd.run(ctx).await,
            Commands::Schedule(cmd) => cmd.run(ctx).await,
            Commands::Version => {
                println!("svc {}", env!("CARGO_PKG_VERSION"));
                Ok(())
            }
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    /// Effective config, flags applied.
    pub config: Config,
    /// Config as stored on disk.
    pub saved_config: Config,
    pub credentials: Option<Credentials>,
    pub format: OutputFormat,
}

impl CommandContext {
    /// The saved session, or a not-authenticated error.
    pub fn require_credentials(&self) -> Result<Arc<dyn CredentialProvider>> {
        let creds = self
            .credentials
            .clone()
            .ok_or(CliError::NotAuthenticated)?;
        Ok(Arc::new(creds))
    }

    /// An authenticated API client.
    pub fn client(&self) -> Result<ApiClient> {
        let creds = self.require_credentials()?;
        Ok(ApiClient::new(&self.config.api_url, creds).map_err(CliError::from)?)
    }

    pub fn sync_config(&self) -> SyncConfig {
        self.config.sync_config()
    }
}
