use std::{path::PathBuf, sync::Arc, thread, time::Duration};

use clap::{Args, Parser, Subcommand};
use gesture_looper_core::{
    AppConfig, EventLog, GestureMapping, GestureSource, LandmarkSource, LoggingSink,
    ScriptedSource, Session,
};
use tracing_subscriber::EnvFilter;

fn main() -> gesture_looper_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            script,
            landmarks,
            setup,
            bpm,
            hold_ms,
        } => run_script(&script, landmarks, &setup, bpm, hold_ms),
        Commands::CheckMapping { setup } => check_mapping(&setup),
        Commands::ShowLoop { file } => show_loop(&file),
    }
}

fn run_script(
    script: &PathBuf,
    landmarks: bool,
    setup: &Setup,
    bpm: Option<f64>,
    hold_ms: u64,
) -> gesture_looper_core::Result<()> {
    let mut config = setup.config()?;
    if let Some(bpm) = bpm {
        config.looper.bpm = bpm;
    }
    tracing::info!(?script, bpm = config.looper.bpm, "starting session");

    let mapping = GestureMapping::load(&config.paths.mapping_file, &config.paths.sounds_dir)?;
    let sink = Arc::new(LoggingSink::new(&mapping));
    let mut session = Session::new(&config, &mapping, sink.clone())?;
    let mut source: Box<dyn GestureSource> = if landmarks {
        Box::new(LandmarkSource::from_file(script)?)
    } else {
        Box::new(ScriptedSource::from_file(script)?)
    };

    let frames = session.run(source.as_mut(), config.live.frame_interval());
    if hold_ms > 0 && session.status().is_playing_loop {
        tracing::info!(hold_ms, "holding loop playback");
        thread::sleep(Duration::from_millis(hold_ms));
    }
    session.shutdown();

    tracing::info!(frames, triggered = sink.triggered(), "session finished");
    Ok(())
}

fn check_mapping(setup: &Setup) -> gesture_looper_core::Result<()> {
    let config = setup.config()?;
    let mapping = GestureMapping::load(&config.paths.mapping_file, &config.paths.sounds_dir)?;

    tracing::info!(gestures = mapping.len(), "loaded gesture mapping");
    for (label, path) in mapping.iter() {
        println!("  {label} -> {}", path.display());
    }
    Ok(())
}

fn show_loop(file: &PathBuf) -> gesture_looper_core::Result<()> {
    let text = std::fs::read_to_string(file)?;
    let log = EventLog::parse(&text)?;

    match log.loop_length() {
        Some(length) => tracing::info!(events = log.len(), length, "loop"),
        None => tracing::warn!(?file, "loop file holds no events"),
    }
    for event in log.sorted() {
        println!("{event}");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Gesture-triggered sound looper", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive a live session from a gesture script.
    Run {
        /// Script with one frame of gesture labels per line and `!command` lines.
        #[arg(long)]
        script: PathBuf,
        /// Treat the script as JSON lines of recorded hand landmarks.
        #[arg(long)]
        landmarks: bool,
        #[command(flatten)]
        setup: Setup,
        /// Recording tempo in beats per minute.
        #[arg(long)]
        bpm: Option<f64>,
        /// Keep a running loop going this long after the script ends.
        #[arg(long, default_value_t = 0)]
        hold_ms: u64,
    },
    /// Load the gesture mapping and list every configured sound.
    CheckMapping {
        #[command(flatten)]
        setup: Setup,
    },
    /// Print a saved loop in playback order.
    ShowLoop {
        /// Loop file written by `!save`.
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
struct Setup {
    /// Optional JSON configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Gesture-to-sound mapping file.
    #[arg(short, long)]
    mapping: Option<PathBuf>,
    /// Directory the mapped sound files live in.
    #[arg(short, long)]
    sounds: Option<PathBuf>,
}

impl Setup {
    fn config(&self) -> gesture_looper_core::Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::load(path)?,
            None => AppConfig::default(),
        };
        if let Some(mapping) = &self.mapping {
            config.paths.mapping_file = mapping.clone();
        }
        if let Some(sounds) = &self.sounds {
            config.paths.sounds_dir = sounds.clone();
        }
        Ok(config)
    }
}
