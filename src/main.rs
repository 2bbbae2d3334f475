use std::{
    path::PathBuf,
    process::ExitCode,
    sync::mpsc::{self, Receiver},
    time::Duration,
};

use clap::{Parser, Subcommand};
use log::info;
use velometer::{
    AppConfig, FileBasedStore, TelemetrySession, TelemetryStore, VelometerError,
    telemetry::{
        ConsoleRenderer, SnapshotConsumer, collect_telemetry, collector::render_line,
        producer::JsonLinesFixProducer,
    },
    writer::SnapshotWriter,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Args {
    /// Directory holding the persisted accumulators
    #[arg(short, long, global = true)]
    storage: Option<PathBuf>,

    /// Keep all state in memory for this run only
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Session clock refresh interval in milliseconds
    #[arg(long, global = true)]
    tick_ms: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Track fixes streamed to stdin as JSON Lines
    Live {
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Replay a recorded JSON Lines file of fixes
    Replay {
        #[arg(short, long)]
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the telemetry rebuilt from stored accumulators
    Show,
    /// Zero every stored accumulator
    Reset,
    /// Write the effective settings to the config file
    SaveConfig,
}

fn open_store(args: &Args, config: &AppConfig) -> Result<TelemetryStore, VelometerError> {
    if args.ephemeral {
        return Ok(TelemetryStore::in_memory());
    }
    let storage_path = match config.storage_path.clone() {
        Some(path) => path,
        None => FileBasedStore::default_storage_path()?,
    };
    let store = FileBasedStore::new(storage_path, &config.storage_namespace)?;
    info!("Using telemetry storage at {:?}", store.storage_path());
    Ok(TelemetryStore::new(Box::new(store)))
}

fn consumers(
    output: &Option<PathBuf>,
) -> Result<Vec<Box<dyn SnapshotConsumer + Send>>, VelometerError> {
    let mut consumers: Vec<Box<dyn SnapshotConsumer + Send>> =
        vec![Box::new(ConsoleRenderer::new(std::io::stdout()))];
    if let Some(output_file) = output {
        consumers.push(Box::new(SnapshotWriter::create(output_file)?));
    }
    Ok(consumers)
}

fn run(args: &Args, shutdown: Receiver<()>) -> Result<(), VelometerError> {
    let mut config = AppConfig::from_local_file().unwrap_or_default();
    if let Some(tick_ms) = args.tick_ms {
        config.session_tick_ms = tick_ms;
    }
    if let Some(storage) = &args.storage {
        config.storage_path = Some(storage.clone());
    }
    let tick_interval = Duration::from_millis(config.session_tick_ms);
    let load_session = || open_store(args, &config).map(TelemetrySession::load);

    match &args.command {
        Commands::Live { output } => {
            let mut consumers = consumers(output)?;
            collect_telemetry(
                JsonLinesFixProducer::from_stdin(),
                load_session()?,
                &mut consumers,
                tick_interval,
                shutdown,
            )?;
        }
        Commands::Replay { input, output } => {
            let producer = JsonLinesFixProducer::from_file(input)?;
            let mut consumers = consumers(output)?;
            let session = collect_telemetry(
                producer,
                load_session()?,
                &mut consumers,
                tick_interval,
                shutdown,
            )?;
            println!("{}", render_line(&session.snapshot()));
        }
        Commands::Show => {
            println!("{}", render_line(&load_session()?.snapshot()));
        }
        Commands::Reset => {
            let snapshot = load_session()?.reset();
            println!("{}", render_line(&snapshot));
        }
        Commands::SaveConfig => {
            config.save()?;
            println!("Saved settings to {:?}", AppConfig::config_path());
        }
    };
    Ok(())
}

fn main() -> ExitCode {
    colog::init();

    let cli = Args::parse();
    let (shutdown_tx, shutdown_rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        println!("Exiting...");
        // No tracking loop is listening
        if shutdown_tx.send(()).is_err() {
            std::process::exit(0);
        }
    })
    .expect("Could not set Ctrl-C handler");

    match run(&cli, shutdown_rx) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
