use std::time::Duration;

use overlay_dimmer_cli::cli;

fn main() -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(cli::app::run());
    // a pending stdin read cannot be cancelled and must not hold the process open
    runtime.shutdown_timeout(Duration::from_millis(200));
    result
}
