//! Livetune CLI: play a WAV file and tune it live from the console.

mod control;
mod decode;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use cpal::traits::DeviceTrait;
use crossbeam_channel::{unbounded, Receiver};
use livetune_engine::output::{default_config, output_device_names, pick_device, CpalHost};
use livetune_engine::{Engine, EngineConfig, EngineEvent, Tick};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::control::{format_time, Command, HELP};

/// Position readout refresh interval.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "livetune")]
#[command(author, version, about = "Live-tuning audio player", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a WAV file
    Play(PlayArgs),

    /// List output devices
    Devices,
}

#[derive(Args)]
struct PlayArgs {
    /// WAV file to play
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Engine settings (TOML); flags below override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output volume, 0..1
    #[arg(long)]
    volume: Option<f32>,

    /// Playback speed, 0.5..2
    #[arg(long)]
    speed: Option<f32>,

    /// Pitch in semitones, -12..12
    #[arg(long, allow_hyphen_values = true)]
    pitch: Option<f32>,

    /// Reverb mix, 0 (dry) .. 1 (wet)
    #[arg(long)]
    reverb: Option<f32>,

    /// Low shelf gain in dB
    #[arg(long, allow_hyphen_values = true)]
    eq_low: Option<f32>,

    /// Mid peak gain in dB
    #[arg(long, allow_hyphen_values = true)]
    eq_mid: Option<f32>,

    /// High shelf gain in dB
    #[arg(long, allow_hyphen_values = true)]
    eq_high: Option<f32>,

    /// Start position in seconds
    #[arg(long, default_value_t = 0.0)]
    start: f64,

    /// Stop after this many seconds
    #[arg(long)]
    duration: Option<f64>,

    /// Output device name (default device if omitted)
    #[arg(long)]
    device: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Play(args) => play(args),
        Commands::Devices => devices(),
    }
}

fn devices() -> anyhow::Result<()> {
    println!("Available output devices:");
    for name in output_device_names()? {
        println!("- {name}");
    }
    Ok(())
}

fn load_config(args: &PlayArgs) -> anyhow::Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    let p = &mut config.parameters;
    if let Some(v) = args.volume { p.set_volume(v); }
    if let Some(v) = args.speed { p.set_speed(v); }
    if let Some(v) = args.pitch { p.set_pitch_semitones(v); }
    if let Some(v) = args.reverb { p.set_reverb_mix(v); }
    if let Some(v) = args.eq_low { p.set_eq_low_db(v); }
    if let Some(v) = args.eq_mid { p.set_eq_mid_db(v); }
    if let Some(v) = args.eq_high { p.set_eq_high_db(v); }
    Ok(config)
}

/// Console lines, parsed on a reader thread.
fn spawn_console() -> Receiver<Command> {
    let (tx, rx) = unbounded();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            match control::parse(&line) {
                Some(cmd) => {
                    if tx.send(cmd).is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => eprintln!("{HELP}"),
            }
        }
    });
    rx
}

fn apply(engine: &mut Engine, cmd: Command) -> livetune_engine::Result<()> {
    match cmd {
        Command::Toggle => engine.toggle_playback(),
        Command::Stop => engine.stop(),
        Command::Seek(s) => engine.seek(s),
        Command::Volume(v) => engine.set_volume(v),
        Command::Speed(v) => engine.set_speed(v),
        Command::Pitch(v) => engine.set_pitch(v),
        Command::Reverb(v) => engine.set_reverb_mix(v),
        Command::EqLow(v) => engine.set_eq_low(v),
        Command::EqMid(v) => engine.set_eq_mid(v),
        Command::EqHigh(v) => engine.set_eq_high(v),
        Command::Quit => Ok(()),
    }
}

fn play(args: PlayArgs) -> anyhow::Result<()> {
    let device = pick_device(args.device.as_deref())?;
    let stream_config = default_config(&device)?;
    let config = load_config(&args)?.with_sample_rate(stream_config.sample_rate().0 as f32);

    let (mut engine, renderer) = Engine::new(config);
    engine.set_output_host(Box::new(CpalHost::open(&device, &stream_config, renderer)?));
    let events = engine.events();

    println!("Loading {}...", args.file.display());
    engine.load_with(|| decode::read_wav(&args.file))?;
    if let Some(asset) = engine.asset() {
        println!(
            "  {} frames, {} Hz, {} ch, {}",
            asset.frames(),
            asset.sample_rate(),
            asset.channel_count(),
            format_time(asset.duration())
        );
    }
    println!("Output: {} @ {} Hz", device.name().unwrap_or_else(|_| "?".into()), stream_config.sample_rate().0);
    let p = engine.parameters();
    println!(
        "Tuning: vol {:.2} | speed {:.2} | pitch {:+} st (rate {:.3}) | reverb {:.2} | eq {:+.1}/{:+.1}/{:+.1} dB",
        p.volume(),
        p.speed(),
        p.pitch_semitones(),
        p.effective_rate(),
        p.reverb_mix(),
        p.eq_low_db(),
        p.eq_mid_db(),
        p.eq_high_db()
    );
    println!("{HELP}");

    if args.start > 0.0 {
        engine.seek(args.start)?;
    }
    engine.toggle_playback()?;

    let console = spawn_console();
    let deadline = args.duration.map(|d| Instant::now() + Duration::from_secs_f64(d.max(0.0)));
    let mut stdout = std::io::stdout();
    loop {
        while let Ok(cmd) = console.try_recv() {
            if cmd == Command::Quit {
                println!();
                return Ok(());
            }
            if let Err(e) = apply(&mut engine, cmd) {
                warn!(error = %e, ?cmd, "command rejected");
            }
        }

        if let Tick::Ended = engine.poll() {
            println!();
        }
        for event in events.try_iter() {
            if event == EngineEvent::TrackEnded {
                info!("end of track");
                return Ok(());
            }
        }

        let _ = write!(
            stdout,
            "\r{} / {}  [{}]   ",
            format_time(engine.current_position()),
            format_time(engine.duration()),
            engine.state()
        );
        let _ = stdout.flush();

        if deadline.is_some_and(|d| Instant::now() >= d) {
            println!();
            return Ok(());
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
