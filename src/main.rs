use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use midikeys::extractor::track_infos;
use midikeys::formatter::{key_sequence, NoteFormatter, TimingFormatter};
use midikeys::inject::InjectError;
use midikeys::keymap::{note_name, KeyMap};
use midikeys::loader::load_song;
use midikeys::midi_event::MidiSong;
use midikeys::scheduler::{play_tracks, CancelToken, PlaybackOptions, PlaybackState, TrackQueue};
use midikeys::script::{load_scripts, save_scripts, TrackScript};
use midikeys::timing::Tempo;
use midikeys::{KeyPlan, MergeMode, MidiKeysError, Pipeline, Settings};

#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[arg(short, long, global = true, help = "Show debug logging")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a MIDI file to key taps and play them
    Play(PlayArgs),
    /// Print the track table of a MIDI file
    Info { midi_file: PathBuf },
    /// Play a previously exported track script
    PlayScript {
        script: PathBuf,

        #[arg(short = 'n', long, help = "Compute everything but never tap keys")]
        dry_run: bool,

        #[arg(long, help = "Seconds to wait before the first tap")]
        lead_in: Option<f64>,
    },
}

#[derive(Args, Debug)]
struct PlayArgs {
    midi_file: PathBuf,

    #[arg(short, long, help = "Only read notes from this track")]
    track: Option<usize>,

    #[arg(
        short,
        long = "channel",
        value_delimiter = ',',
        value_parser = clap::value_parser!(u8).range(0..16),
        help = "Only read notes on these channels (0-15)"
    )]
    channels: Vec<u8>,

    #[arg(short, long, value_enum, help = "How simultaneous notes are merged")]
    merge_mode: Option<MergeMode>,

    #[arg(long, help = "Print a timing line for every note")]
    timing: bool,

    #[arg(short = 'n', long, help = "Compute everything but never tap keys")]
    dry_run: bool,

    #[arg(long, help = "Seconds to wait before the first tap")]
    lead_in: Option<f64>,

    #[arg(long, help = "Play every track on its own scheduler")]
    per_track: bool,

    #[arg(long, help = "Write the computed key queue(s) as JSON")]
    export: Option<PathBuf>,

    #[arg(long, help = "JSON settings file; command line flags win")]
    config: Option<PathBuf>,
}

impl PlayArgs {
    fn settings(&self) -> Settings {
        Settings {
            track_index: self.track,
            channel_filter: (!self.channels.is_empty()).then(|| self.channels.clone()),
            merge_mode: self.merge_mode,
            show_timing: self.timing.then_some(true),
            dry_run: self.dry_run.then_some(true),
            lead_in: self.lead_in,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Play(args) => play(args),
        Command::Info { midi_file } => {
            let song = load_song(&midi_file).context("load midi file")?;
            print_song(&midi_file, &song);
            Ok(())
        }
        Command::PlayScript {
            script,
            dry_run,
            lead_in,
        } => play_script(&script, dry_run, lead_in),
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("midikeys=debug,warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("midikeys=info,warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn play(args: PlayArgs) -> Result<()> {
    let file_settings = match &args.config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("load settings {}", path.display()))?,
        None => Settings::default(),
    };
    let config = file_settings
        .merge(args.settings())
        .into_config()
        .context("configuration")?;

    let song = load_song(&args.midi_file).context("load midi file")?;
    print_song(&args.midi_file, &song);

    let show_timing = config.show_timing;
    let playback = config.playback();
    let pipeline = Pipeline::new(config);
    let plans = if args.per_track {
        pipeline.plan_per_track(&song)?
    } else {
        vec![pipeline.plan(&song)?]
    };

    for plan in &plans {
        print_plan(plan, show_timing);
    }

    let scripts: Vec<TrackScript> = plans.iter().map(TrackScript::from).collect();
    if let Some(path) = &args.export {
        save_scripts(path, &scripts).context("export key queue")?;
        info!("wrote {} track script(s) to {}", scripts.len(), path.display());
    }

    let scripts: Vec<TrackScript> = scripts
        .into_iter()
        .zip(&plans)
        .filter(|(_, plan)| plan.ensure_playable().is_ok())
        .map(|(script, _)| script)
        .collect();
    if scripts.is_empty() {
        warn!("{}", MidiKeysError::NoPlayableNotes);
        return Ok(());
    }

    run_scripts(&scripts, playback)
}

fn play_script(path: &Path, dry_run: bool, lead_in: Option<f64>) -> Result<()> {
    let scripts = load_scripts(path).context("load track script")?;
    let config = Settings {
        dry_run: Some(dry_run),
        lead_in,
        ..Default::default()
    }
    .into_config()
    .context("configuration")?;

    for script in &scripts {
        info!(
            track = ?script.track,
            "{} actions at {:.2} BPM",
            script.actions.len(),
            script.tempo.bpm()
        );
    }
    run_scripts(&scripts, config.playback())
}

fn run_scripts(scripts: &[TrackScript], playback: PlaybackOptions) -> Result<()> {
    if playback.dry_run {
        println!("Dry run: no keys will be pressed.");
    } else if !playback.lead_in.is_zero() {
        println!("Playing in {} seconds...", fmt_secs(playback.lead_in));
    }

    let queues: Vec<TrackQueue<'_>> = scripts
        .iter()
        .map(|s| TrackQueue {
            track: s.track.unwrap_or(0),
            tempo: s.tempo,
            actions: &s.actions,
        })
        .collect();

    let cancel = CancelToken::new();
    install_interrupt_handler(&cancel)?;
    let results = play_tracks(&queues, playback, &cancel, host_injector);

    let mut failed = 0;
    let mut cancelled = false;
    for (track, result) in results {
        match result {
            Ok(report) => {
                cancelled |= report.state == PlaybackState::Cancelled;
                info!(
                    track,
                    "{:?}: {} taps, {} skipped",
                    report.state,
                    report.taps,
                    report.skipped
                )
            }
            Err(e) => {
                failed += 1;
                error!(track, "{:#}", anyhow::Error::from(e));
            }
        }
    }
    if failed > 0 {
        bail!("playback failed on {} track(s)", failed);
    }

    if cancelled {
        println!("Cancelled.");
    } else {
        println!("Done!");
    }
    Ok(())
}

/// First Ctrl-C stops playback at the next wait, after any tap in flight.
/// A second one exits immediately.
fn install_interrupt_handler(cancel: &CancelToken) -> Result<()> {
    let cancel = cancel.clone();
    ctrlc::set_handler(move || {
        if cancel.is_cancelled() {
            std::process::exit(130);
        }
        warn!("interrupted, stopping playback");
        cancel.cancel();
    })
    .context("install Ctrl-C handler")
}

#[cfg(feature = "inject")]
fn host_injector(_track: usize) -> Result<midikeys::inject::EnigoInjector, InjectError> {
    midikeys::inject::EnigoInjector::new()
}

#[cfg(not(feature = "inject"))]
fn host_injector(track: usize) -> Result<midikeys::inject::PrintInjector, InjectError> {
    warn!(track, "built without the `inject` feature, taps are printed instead");
    Ok(midikeys::inject::PrintInjector { track: Some(track) })
}

fn print_song(path: &Path, song: &MidiSong) {
    let tempo = Tempo::resolve(song);
    println!("MIDI File: {}", path.display());
    println!(
        "Format: {}, Tracks: {}, Ticks per beat: {}",
        song.format,
        song.tracks.len(),
        song.ticks_per_quarter
    );
    println!("Tempo: {:.2} BPM", tempo.bpm());
    println!();
    for info in track_infos(song) {
        println!("{}", info);
    }
    println!();
}

fn print_plan(plan: &KeyPlan, show_timing: bool) {
    if let Some(track) = plan.track {
        println!("Track {}:", track);
    }
    println!("{}", plan.stats);
    println!();
    println!("{}", "=".repeat(60));
    println!("KEY SEQUENCE:");
    println!("{}", "=".repeat(60));

    if show_timing {
        let formatter = TimingFormatter::new(plan.tempo);
        for event in &plan.playable {
            println!("{}", formatter.format(event));
        }
    }

    println!();
    println!("KEYS TO PRESS:");
    println!("{}", key_sequence(&plan.playable));
    println!();
    println!(
        "Total notes: {}, Playable: {}, Out of range: {}",
        plan.reduced.len(),
        plan.playable.len(),
        plan.unmapped_count
    );

    if !plan.out_of_range.is_empty() {
        match KeyMap::default().range() {
            Some((low, high)) => println!(
                "\nOut of range notes (keys cover {}-{}):",
                note_name(low),
                note_name(high)
            ),
            None => println!("\nOut of range notes (not mapped):"),
        }
        for &note in &plan.out_of_range {
            println!("  {} (MIDI {})", note_name(note), note);
        }
    }
    println!();
}

fn fmt_secs(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs.fract() == 0.0 {
        format!("{}", secs as u64)
    } else {
        format!("{:.1}", secs)
    }
}
