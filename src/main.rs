use std::path::PathBuf;
use std::process::Command;

use anyhow::Context;
use clap::Parser;
use devwatch::{Settings, WatchEngine, logging};

#[derive(Parser)]
#[command(name = "devwatch")]
#[command(about = "Watch source trees and reload a supervised dev server on change")]
#[command(version)]
struct Cli {
    /// Root directories to watch
    #[arg(required = true)]
    roots: Vec<PathBuf>,

    /// Pid of the supervised server process
    #[arg(short, long, env = "DEVWATCH_PID")]
    pid: u32,

    /// Shell command to run when a reload fires (e.g. "kill -USR1 <pid>").
    /// Without it, reloads are only logged.
    #[arg(short, long)]
    exec: Option<String>,

    /// Override the quiescence window in milliseconds
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Watch files with this extension (repeatable, overrides config)
    #[arg(long = "ext")]
    extensions: Vec<String>,

    /// Path to a config file (default: ./devwatch.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path),
        None => Settings::load(),
    }
    .context("failed to load configuration")?;

    logging::init_with_config(&settings.logging);

    let extensions = if cli.extensions.is_empty() {
        settings.watch.extensions.clone()
    } else {
        cli.extensions.clone()
    };
    let debounce_ms = cli.debounce_ms.unwrap_or(settings.watch.debounce_ms);

    let exec = cli.exec.clone();
    let mut engine = WatchEngine::builder()
        .roots(cli.roots)
        .pid(cli.pid)
        .extensions(extensions)
        .debounce_ms(debounce_ms)
        .rearm(settings.watch.rearm)
        .callback(move |_engine| {
            if let Some(cmd) = exec.as_deref() {
                run_reload_command(cmd);
            }
        })
        .build()
        .context("failed to initialize watch engine")?;

    engine.run().await.context("watch engine stopped")?;
    Ok(())
}

/// Run the reload command through the shell, detached from the watch loop.
///
/// The command is the external restart mechanism; its failure is its own
/// concern and never takes the watcher down.
fn run_reload_command(cmd: &str) {
    match Command::new("sh").arg("-c").arg(cmd).status() {
        Ok(status) if status.success() => {
            tracing::info!("[reload] command succeeded");
        }
        Ok(status) => {
            tracing::warn!("[reload] command exited with {status}");
        }
        Err(e) => {
            tracing::error!("[reload] failed to run command: {e}");
        }
    }
}
