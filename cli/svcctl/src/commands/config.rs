//! Config commands.

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::output::{print_single, print_success, OutputFormat};

use super::CommandContext;

/// Show or change CLI configuration.
#[derive(Debug, Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Debug, Subcommand)]
enum ConfigSubcommand {
    /// Show the effective configuration.
    Show,

    /// Persist a configuration value.
    Set(SetArgs),
}

#[derive(Debug, Args)]
struct SetArgs {
    /// One of: api-url, ws-url, reconnect-delay-ms, mutation-timeout-secs.
    key: String,

    value: String,
}

impl ConfigCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        match self.command {
            ConfigSubcommand::Show => show(ctx),
            ConfigSubcommand::Set(args) => set(ctx, args),
        }
    }
}

fn show(ctx: CommandContext) -> Result<()> {
    let effective = ctx.sync_config();
    match ctx.format {
        OutputFormat::Json => print_single(&ctx.config),
        OutputFormat::Table => {
            println!("api_url: {}", effective.api_url);
            println!("ws_url: {}", effective.ws_url);
            println!("reconnect_delay: {:?}", effective.reconnect_delay);
            println!("mutation_timeout: {:?}", effective.mutation_timeout);
            println!("heart_beat: {}", effective.heart_beat);
        }
    }
    Ok(())
}

fn set(ctx: CommandContext, args: SetArgs) -> Result<()> {
    let mut config = ctx.saved_config;
    config.set(&args.key, &args.value)?;
    config.save()?;
    print_success(&format!("Set {} = {}", args.key, args.value));
    Ok(())
}
