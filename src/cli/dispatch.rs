use anyhow::Result;

use super::commands::Commands;
use super::context::CliContext;
use super::css::cmd_css;
use super::env::CliArgs;
use super::info::cmd_info;
use super::scan::cmd_scan;
use super::serve::cmd_serve;
use super::settings::cmd_settings;

pub async fn dispatch(cli: &CliArgs, ctx: &CliContext) -> Result<()> {
    match cli.command.clone() {
        Commands::Serve(args) => cmd_serve(args, ctx).await,
        Commands::Scan(args) => cmd_scan(args, ctx).await,
        Commands::Css(args) => cmd_css(args, ctx).await,
        Commands::Settings(args) => cmd_settings(args, ctx).await,
        Commands::Info => cmd_info(ctx),
    }
}
