//! Error handling and display for the CLI.

use autoserv_sync::SyncError;
use colored::Colorize;
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Not authenticated. Run `svc auth login` to authenticate.")]
    NotAuthenticated,

    #[error("Dashboard unavailable: the portal did not return a snapshot")]
    DashboardUnavailable,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    let hint = match err.downcast_ref::<CliError>() {
        Some(CliError::NotAuthenticated) => Some("Run `svc auth login` to authenticate."),
        Some(CliError::DashboardUnavailable) => {
            Some("The value is unknown, not zero. Check `svc auth status` and the API URL.")
        }
        Some(CliError::Sync(e)) => sync_hint(e),
        _ => err.downcast_ref::<SyncError>().and_then(sync_hint),
    };

    if let Some(hint) = hint {
        eprintln!("\n{}", format!("Hint: {hint}").yellow());
    }
}

fn sync_hint(err: &SyncError) -> Option<&'static str> {
    match err {
        SyncError::NotAuthenticated | SyncError::Api { status: 401, .. } => {
            Some("Your session may have expired. Run `svc auth login`.")
        }
        SyncError::Api { status: 403, .. } => {
            Some("You may not have permission for this operation.")
        }
        SyncError::Api { status: 409, .. } => {
            Some("The portal rejected the change. Refresh with `svc schedule list`.")
        }
        SyncError::Network(_) => Some("Check your network connection and API endpoint."),
        SyncError::Timeout { .. } => {
            Some("The portal did not answer in time. Raise `mutation-timeout-secs` if this persists.")
        }
        _ => None,
    }
}
