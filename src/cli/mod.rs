pub mod app;
pub mod commands;
pub mod context;
pub mod css;
pub mod dispatch;
pub mod env;
pub mod info;
pub mod output;
pub mod runtime;
pub mod scan;
pub mod serve;
pub mod settings;

pub use context::CliContext;
pub use output::OutputFormat;
