use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;
use wave_grid_core::{
    default_output_factory, AnimationController, AppConfig, ConnectionManager, MirrorGrid,
    Notification, OscGridConnector, SerialOscClient, WaveGridError,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> wave_grid_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            mute,
            serialosc_port,
        } => {
            let mut config = load_config(config.as_ref())?;
            if mute {
                config.tone.enabled = false;
            }
            if let Some(port) = serialosc_port {
                config.serialosc.daemon_port = port;
            }
            run(config).await
        }
        Commands::Preview { config, frames } => {
            let config = load_config(config.as_ref())?;
            preview(&config, frames);
            Ok(())
        }
        Commands::Config => {
            println!("{}", AppConfig::default().to_json_pretty()?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> wave_grid_core::Result<AppConfig> {
    match path {
        Some(path) => {
            tracing::info!(?path, "loading configuration");
            AppConfig::load(path)
        }
        None => Ok(AppConfig::default()),
    }
}

async fn run(config: AppConfig) -> wave_grid_core::Result<()> {
    tracing::info!(
        daemon = %config.serialosc.daemon_addr(),
        prefix = %config.serialosc.prefix,
        tones = config.tone.enabled,
        "starting"
    );

    let (tx, rx) = mpsc::channel(16);
    let client = SerialOscClient::bind(&config.serialosc).await?;
    let connector = OscGridConnector::new(&config.serialosc, tx.clone());
    let audio = default_output_factory(config.tone.sample_rate);
    let manager = ConnectionManager::new(config, connector).with_audio(audio);

    let mut discovery = tokio::spawn(client.run(tx.clone()));
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = tx.send(Notification::Shutdown).await;
            }
            Err(err) => tracing::error!(%err, "cannot listen for Ctrl-C"),
        }
    });

    let result = tokio::select! {
        result = manager.run(rx) => result,
        joined = &mut discovery => match joined {
            Ok(result) => result,
            Err(err) => Err(WaveGridError::connection(format!("discovery task failed: {err}"))),
        },
    };
    discovery.abort();

    match &result {
        Ok(()) => tracing::info!("stopped"),
        Err(err) => tracing::error!(%err, "stopped with an error"),
    }
    result
}

fn preview(config: &AppConfig, frames: u64) {
    let grid = MirrorGrid::new(config.wave.grid_size);
    let mut controller: AnimationController<MirrorGrid> = AnimationController::new(config, grid);

    for _ in 0..frames {
        let report = controller.step();
        println!(
            "frame {} phase {:.4} indicator {}",
            report.frame,
            report.phase.radians(),
            report
                .indicator
                .map_or_else(|| "-".to_string(), |level| level.to_string())
        );
        match report.bitmap {
            Some(bitmap) => println!("{bitmap}"),
            None => println!("(skipped)\n"),
        }
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Animated waveform for monome grids", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Discover a grid through serialosc and animate it until Ctrl-C.
    Run {
        /// JSON configuration file. Missing fields use the defaults.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Disable tone playback.
        #[arg(long)]
        mute: bool,
        /// Port the serialosc daemon listens on.
        #[arg(long)]
        serialosc_port: Option<u16>,
    },
    /// Print frames to the terminal without any hardware.
    Preview {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of frames to render.
        #[arg(short, long, default_value_t = 10)]
        frames: u64,
    },
    /// Print the default configuration as JSON.
    Config,
}
