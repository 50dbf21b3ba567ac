use clap::Subcommand;

use super::css::CssArgs;
use super::scan::ScanArgs;
use super::serve::ServeArgs;
use super::settings::SettingsArgs;

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Run the engine on a document fixture and accept JSON-line commands on stdin
    Serve(ServeArgs),

    /// Enable once on a document fixture and report what got dimmed
    Scan(ScanArgs),

    /// Print the generated stylesheet
    Css(CssArgs),

    /// Inspect or change the persisted settings
    Settings(SettingsArgs),

    /// Show build metadata and the effective configuration
    Info,
}
