use anyhow::Result;
use clap::Parser;
use cli::Cli;
use mps_common::observability::{LogConfig, LogFormat, init_logging};
use mps_config::{LogSettings, PanelConfig, PanelConfigLoader};
use mps_social::online::OnlineMonitor;
use std::path::PathBuf;
use std::time::Duration;
use tether::{Tether, build_from_config};

mod cli;
mod tether;

fn log_config(settings: &LogSettings, interactive: bool) -> LogConfig {
    LogConfig {
        app_name: "mps-panel",
        log_dir: settings.dir.as_ref().map(PathBuf::from),
        // stderr would draw over the terminal UI
        emit_stderr: settings.stderr && !interactive,
        format: LogFormat::from_name(&settings.format),
        default_filter: settings.filter.clone(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1) Load config (env wins)
    let cfg: PanelConfig = PanelConfigLoader::new()
        .with_optional_file(&cli.config)
        .load()?;

    let log_path = init_logging(log_config(&cfg.log, !cli.dump))?;
    tracing::info!(config = %cli.config.display(), log = %log_path.display(), "app.start");

    let monitor = OnlineMonitor::global();
    monitor.set_online(cfg.panel.start_online && !cli.offline);

    let mut tether = Tether::new();
    if cli.dump {
        let panel = build_from_config(&mut tether, &cfg, monitor, false)?;
        panel.start().await?;
        tokio::time::sleep(Duration::from_millis(cli.settle_ms)).await;
        let snapshot = panel.snapshot().await?;
        println!("{}", snapshot.to_json()?);
        return tether.shutdown().await;
    }

    build_from_config(&mut tether, &cfg, monitor, true)?
        .start()
        .await?;
    tether.run().await
}
