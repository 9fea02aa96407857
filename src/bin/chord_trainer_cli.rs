use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{ensure, Context, Result};
use chord_trainer::chords::RandomChordGenerator;
use chord_trainer::config::TrainerConfig;
use chord_trainer::engine::backend::{ClickOutput, StubClickOutput};
use chord_trainer::scheduler::{DisplayUpdate, ScheduledSession, SessionContext};
use chord_trainer::sequence::ChordSequence;
use chord_trainer::TrainerHandle;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast;

#[derive(Parser, Debug)]
#[command(
    name = "chord_trainer_cli",
    about = "Metronome-driven random chord practice trainer"
)]
struct Cli {
    /// Override the settings file location (defaults to assets/trainer_settings.json)
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start playback and render the chord grid until Ctrl-C
    Play {
        /// Tempo in beats per minute (defaults to the saved setting)
        #[arg(long)]
        bpm: Option<u32>,
        /// Number of chord slots (defaults to the saved setting)
        #[arg(long)]
        slots: Option<usize>,
    },
    /// Run a deterministic session on the stub output and print one JSON event per line
    Simulate {
        #[arg(long, default_value_t = 120)]
        bpm: u32,
        #[arg(long, default_value_t = 4)]
        slots: usize,
        /// Number of clicks to emit before exiting
        #[arg(long, default_value_t = 16)]
        beats: u64,
        /// Chord generator seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Print the effective settings as JSON
    Settings,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let settings_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(TrainerConfig::default_path()));
    let config = TrainerConfig::load_from_file(&settings_path);

    match cli.command {
        Commands::Play { bpm, slots } => run_play(config, settings_path, bpm, slots),
        Commands::Simulate {
            bpm,
            slots,
            beats,
            seed,
        } => run_simulate(config, bpm, slots, beats, seed),
        Commands::Settings => run_settings(&config),
    }
}

fn run_play(
    config: TrainerConfig,
    settings_path: PathBuf,
    bpm: Option<u32>,
    slots: Option<usize>,
) -> Result<ExitCode> {
    let bpm = bpm.unwrap_or(config.session.bpm);
    let slots = slots.unwrap_or(config.session.slots);

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building Tokio runtime")?;

    rt.block_on(async move {
        let handle = TrainerHandle::with_config(config, Some(settings_path));
        let mut display = handle
            .subscribe_display()
            .context("display channel missing")?;

        handle.start(bpm, slots).context("starting session")?;
        println!("Playing at {} BPM with {} slots. Ctrl-C to stop.", bpm, slots);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                update = display.recv() => match update {
                    Ok(update) => render_grid(&update),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }

        handle.stop().context("stopping session")?;
        Ok(ExitCode::SUCCESS)
    })
}

/// One line per update: the active slot bracketed, flagged slots starred.
fn render_grid(update: &DisplayUpdate) {
    let cells: Vec<String> = update
        .labels
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let marker = if update.flags[i] { "*" } else { "" };
            if i == update.active_index {
                format!("[{}{}]", label, marker)
            } else {
                format!(" {}{} ", label, marker)
            }
        })
        .collect();
    println!("{}", cells.join(" "));
}

fn run_simulate(
    config: TrainerConfig,
    bpm: u32,
    slots: usize,
    beats: u64,
    seed: u64,
) -> Result<ExitCode> {
    ensure!(bpm > 0, "bpm must be greater than 0");
    ensure!(slots > 0, "slots must be at least 1");

    let selection = config.selection.clone();
    let mut generator = Box::new(RandomChordGenerator::from_seed(seed));
    let sequence = ChordSequence::generate(slots, generator.as_mut(), &selection);

    let output = Arc::new(StubClickOutput::new());
    output.start()?;

    let (display_tx, mut display_rx) = broadcast::channel(100);
    let mut session = ScheduledSession::new(SessionContext {
        bpm,
        lookahead: config.lookahead_seconds(),
        sequence,
        generator,
        selection,
        output: Arc::clone(&output) as Arc<dyn ClickOutput>,
        display_tx,
    });

    let tick_seconds = config.tick_interval().as_secs_f64();
    let mut emitted = 0u64;

    while emitted < beats {
        session.tick(output.current_time());

        while let Ok(update) = display_rx.try_recv() {
            println!(
                "{}",
                serde_json::json!({
                    "event": "display",
                    "active": update.active_index,
                    "labels": update.labels,
                    "flags": update.flags,
                })
            );
        }

        for click in output.take_recorded() {
            if emitted == beats {
                break;
            }
            println!(
                "{}",
                serde_json::json!({ "event": "click", "kind": click.kind, "at": click.at })
            );
            emitted += 1;
        }

        output.advance(tick_seconds);
    }

    Ok(ExitCode::SUCCESS)
}

fn run_settings(config: &TrainerConfig) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(ExitCode::SUCCESS)
}
