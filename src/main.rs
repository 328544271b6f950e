mod audio;
mod chord;
mod cli;
mod config;
mod grid;
mod session;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use audio::beats::FluxBeatTracker;
use audio::key::ProfileKeyDetector;
use chord::pipeline::{PipelineError, PipelineObserver};
use cli::Cli;
use session::Session;

/// Feeds checkpoints into a progress bar and reads the shared cancel flag.
struct CliObserver {
    bar: Option<ProgressBar>,
    cancelled: Arc<AtomicBool>,
}

impl PipelineObserver for CliObserver {
    fn progress(&mut self, percent: f32, message: &str) {
        if let Some(ref bar) = self.bar {
            bar.set_position(percent.clamp(0.0, 100.0) as u64);
            bar.set_message(message.to_string());
        } else {
            log::debug!("{:>3.0}% {}", percent, message);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    // Explicit --config path, or ./chordgrid.toml, or the platform config dir
    let config_path = cli.config.clone().or_else(|| {
        let local = PathBuf::from("chordgrid.toml");
        if local.exists() {
            return Some(local);
        }
        if let Some(config_dir) = dirs::config_dir() {
            let platform = config_dir.join("chordgrid").join("config.toml");
            if platform.exists() {
                return Some(platform);
            }
        }
        None
    });
    let cfg = match config_path {
        Some(ref path) => match config::load_config(path) {
            Some(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            None => {
                log::warn!("Failed to load config from {}, using defaults", path.display());
                config::Config::default()
            }
        },
        None => config::Config::default(),
    };
    let settings = cfg.analysis.pipeline_settings();

    if !cli.input.exists() {
        anyhow::bail!("Input file not found: {}", cli.input.display());
    }
    let time_limit = cli.time_limit()?;
    let follow_step = cli.follow_step()?;

    let cancelled = Arc::new(AtomicBool::new(false));
    if let Some(limit) = time_limit {
        let flag = Arc::clone(&cancelled);
        std::thread::spawn(move || {
            std::thread::sleep(limit);
            flag.store(true, Ordering::Relaxed);
        });
    }

    let bar = if cli.no_progress {
        None
    } else {
        let pb = ProgressBar::new(100);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos:>3}% {msg}")
                .context("Invalid progress bar template")?
                .progress_chars("=>-"),
        );
        Some(pb)
    };
    let mut observer = CliObserver { bar, cancelled };

    log::info!("chordgrid - beat-synchronous chord estimation");
    log::info!("Input: {}", cli.input.display());

    // 1. Decode
    observer.progress(10.0, "Decoding Audio...");
    let audio_data = audio::decode::decode_audio(&cli.input)
        .with_context(|| format!("Failed to decode {}", cli.input.display()))?;

    // 2. Beats, key and chords
    let key_detector = ProfileKeyDetector {
        window_secs: cfg.analysis.key_window_secs,
    };
    let result = Session::analyze(
        &audio_data,
        &FluxBeatTracker,
        &key_detector,
        &settings,
        &mut observer,
    );

    if let Some(ref bar) = observer.bar {
        bar.finish_and_clear();
    }

    let mut session = match result {
        Ok(session) => session,
        Err(PipelineError::Cancelled) => {
            log::info!("Cancelled");
            return Ok(());
        }
        Err(e) => return Err(e).context("Pipeline crash"),
    };

    // 3. Present
    if cli.offset != 0 && !session.shift(cli.offset) {
        log::warn!("No beats to shift, ignoring --offset");
    }

    println!("BPM:    {}", session.tempo);
    println!(
        "Key:    {}",
        session.key.map_or_else(|| "-".to_string(), |k| k.to_string())
    );
    println!("Offset: {}", session.offset);
    println!();

    let measures = grid::layout(&session.chords, session.offset, cfg.grid.beats_per_measure);
    let active = cli.at.and_then(|t| grid::active_beat(&session.beats, t));
    print!("{}", grid::render_text(&measures, active, cfg.grid.measures_per_row));

    if let Some(beat) = active {
        let span = measures
            .iter()
            .flat_map(|m| m.spans.iter())
            .find(|s| s.covers(beat));
        let label = session
            .chords
            .get(beat)
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        match span.and_then(|s| grid::seek_time(&session.beats, s)) {
            Some(t) => println!("\nBeat {} ({}), span starts at {:.2}s", beat, label, t),
            None => println!("\nBeat {} ({}) is outside the displayed grid", beat, label),
        }
    }

    if let Some(step) = follow_step {
        println!();
        for (t, beat) in grid::highlight_changes(&session.beats, audio_data.duration(), step) {
            let label = beat
                .and_then(|b| session.chords.get(b))
                .map_or_else(|| "-".to_string(), |c| c.to_string());
            match beat {
                Some(b) => println!("{:>8.2}s  beat {:<4} {}", t, b, label),
                None => println!("{:>8.2}s  -", t),
            }
        }
    }

    if let Some(ref path) = cli.json {
        let json = serde_json::to_string_pretty(&session.export())?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Wrote session to {}", path.display());
    }

    log::info!("Ready");
    Ok(())
}
