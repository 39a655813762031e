//! Scanner CLI: argument parsing, tracing and the `scan`/`serve` commands.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use lookout_scanner::{
    DISCLAIMER, Mode, build_classifier, load_image_path, prepare, render_cli, render_export,
    render_quiet,
};
use tracing::info;

use crate::web;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Brain MRI tumor classification (educational demo).
#[derive(Parser)]
#[command(name = "mri-scanner", version, about, long_about = None)]
pub(crate) struct Cli {
    /// Emit logs as JSON.
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Classify one MRI image.
    Scan {
        /// Path to the MRI scan image (PNG, JPEG, BMP or TIFF).
        image: PathBuf,

        /// Show detailed tumor information.
        #[arg(short, long)]
        detailed: bool,

        /// Save results to this file.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Minimal output (result and confidence only).
        #[arg(short, long)]
        quiet: bool,

        /// Classifier: demo (simulated) or cnn.
        #[arg(long, default_value = "demo")]
        mode: Mode,

        /// Safetensors weights for the CNN.
        #[arg(long)]
        weights: Option<PathBuf>,
    },

    /// Serve the upload-and-analyze web UI.
    Serve {
        /// Address to bind (host:port).
        #[arg(long, env = "MRI_SCANNER_ADDR", default_value = "127.0.0.1:8501")]
        addr: SocketAddr,

        /// Classifier: demo (simulated) or cnn.
        #[arg(long, default_value = "demo")]
        mode: Mode,

        /// Safetensors weights for the CNN.
        #[arg(long)]
        weights: Option<PathBuf>,
    },
}

/// Logs go to stderr so `scan --quiet` output stays clean.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::EnvFilter;

    let filter = match cli.verbose {
        0 => "mri_scanner=info,lookout_scanner=info,tower_http=info",
        1 => "mri_scanner=debug,lookout_scanner=debug,tower_http=debug",
        _ => "mri_scanner=trace,lookout_scanner=trace,tower_http=trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Scan {
            image,
            detailed,
            output,
            quiet,
            mode,
            weights,
        } => cmd_scan(&image, detailed, output.as_deref(), quiet, mode, weights.as_deref()),
        Command::Serve {
            addr,
            mode,
            weights,
        } => cmd_serve(addr, mode, weights.as_deref()).await,
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_scan(
    image: &Path,
    detailed: bool,
    output: Option<&Path>,
    quiet: bool,
    mode: Mode,
    weights: Option<&Path>,
) -> Result<()> {
    if !image.exists() {
        return Err(eyre!("image file '{}' not found", image.display()));
    }

    if !quiet {
        println!("Loading brain tumor detection model...");
    }
    let classifier = build_classifier(mode, weights)?;
    if !quiet {
        println!("Model loaded ({}).", classifier.name());
        println!("Analyzing image: {}", image.display());
    }

    let prepared = prepare(&load_image_path(image)?);
    let prediction = classifier.predict(&prepared)?;
    info!(class = %prediction.class, confidence = prediction.confidence, "scan complete");

    if quiet {
        println!("{}", render_quiet(&prediction));
    } else {
        println!("{}", render_cli(&prediction, detailed));
    }

    if let Some(path) = output {
        let label = image.display().to_string();
        std::fs::write(path, render_export(&prediction, &label))
            .map_err(|e| eyre!("cannot write {}: {e}", path.display()))?;
        println!("Results saved to: {}", path.display());
    }
    Ok(())
}

async fn cmd_serve(addr: SocketAddr, mode: Mode, weights: Option<&Path>) -> Result<()> {
    let classifier = build_classifier(mode, weights)?;
    let app = web::router(classifier);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| eyre!("failed to bind {addr}: {e}"))?;
    info!(%addr, ?mode, "mri scanner listening");
    println!("Serving on http://{addr}");
    for line in DISCLAIMER {
        println!("  {line}");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .map_err(|e| eyre!("server error: {e}"))?;
    Ok(())
}
