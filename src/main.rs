//! ViDubb Launcher
//!
//! Usage:
//! - Normal mode: `vidubb-launcher`
//! - With custom port: `vidubb-launcher --port 8080`
//! - Point at an app checkout: `vidubb-launcher --app-dir /opt/vidubb`

use std::path::PathBuf;

use clap::Parser;
use vidubb_launcher::RuntimeConfig;

/// 命令行参数，优先级高于环境变量
#[derive(Debug, Parser)]
#[command(name = "vidubb-launcher", version, about = "Set up and launch the ViDubb Gradio app")]
struct Cli {
    /// Override the listening port (default: $PORT or 3000)
    #[arg(long)]
    port: Option<u16>,

    /// Override the listening address (default: $LAUNCHER_HOST or 0.0.0.0)
    #[arg(long)]
    host: Option<String>,

    /// Directory containing app.py and requirements.txt
    #[arg(long)]
    app_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = RuntimeConfig {
        port_override: cli.port,
        host_override: cli.host,
        app_dir_override: cli.app_dir,
    };

    if let Err(e) = vidubb_launcher::init_and_run_launcher_with_config(config).await {
        tracing::error!(error = %format!("{:#}", e), "Launcher exited with error");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
