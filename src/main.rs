use std::{
    io::BufRead,
    path::Path,
    process::ExitCode,
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use clap::Parser;
use crossbeam_channel::{Receiver, bounded, select, unbounded};
use env_logger::Env;

use gesture_control::{
    cli::{Cli, Commands, RunArgs},
    collect::{NextGesture, collect_samples},
    config::{Config, DEFAULT_CONFIG_FILE},
    diagnose::diagnose,
    dispatch::{ActionSink, LogSink},
    pipeline::{
        DEFAULT_REPLAY_FPS, GesturePipeline, LandmarkSource, ReplaySource, StopFlag, run_frame_loop,
        spawn_quit_listener,
    },
    sample_store::{self, SampleStore},
    types::GestureLabel,
};

/// Below this many samples a label is matched unreliably.
const MIN_SAMPLES: usize = 10;
const RECOMMENDED_SAMPLES: usize = 20;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Run(args) => run_recognition(config_path, &args),
        Commands::Collect {
            label,
            samples,
            interval_ms,
            replay,
            append,
        } => {
            let config = Config::load_or_default(config_path)?;
            let mut source = open_source(replay.as_deref(), DEFAULT_REPLAY_FPS, &config)?;
            let interval = Duration::from_millis(interval_ms);
            match label {
                Some(label) => {
                    let stop = StopFlag::new();
                    spawn_quit_listener(stop.clone());
                    collect(&config, source.as_mut(), label, samples, interval, append, &stop)
                }
                None => collect_all(&config, source.as_mut(), samples, interval, append),
            }
        }
        Commands::Check => check(&Config::load_or_default(config_path)?),
        Commands::Diagnose { frames, replay } => {
            let config = Config::load_or_default(config_path)?;
            let mut source = open_source(replay.as_deref(), DEFAULT_REPLAY_FPS, &config)?;
            run_diagnose(source.as_mut(), frames)
        }
        Commands::Reformat => reformat(&Config::load_or_default(config_path)?),
        Commands::InitConfig { output, force } => {
            let path = output.unwrap_or_else(|| DEFAULT_CONFIG_FILE.into());
            if path.exists() && !force {
                bail!("{} already exists, pass --force to overwrite", path.display());
            }
            Config::default().save(&path)?;
            log::info!("wrote default configuration to {}", path.display());
            Ok(())
        }
        #[cfg(feature = "camera-nokhwa")]
        Commands::Cameras => {
            let cameras = gesture_control::pipeline::camera::available_cameras()?;
            if cameras.is_empty() {
                println!("no cameras found");
            }
            for (index, name) in cameras {
                println!("{index}: {name}");
            }
            Ok(())
        }
    }
}

fn run_recognition(config_path: Option<&Path>, args: &RunArgs) -> Result<()> {
    let mut config = Config::load_or_default(config_path)?;
    args.apply(&mut config);
    config.validate()?;

    let (store, _) = SampleStore::load(&config.data.dir)?;
    let counts = store.label_counts();
    log::info!(
        "{} samples loaded ({})",
        store.len(),
        counts
            .iter()
            .map(|(label, n)| format!("{label}: {n}"))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let mut source = open_source(args.replay.as_deref(), args.fps, &config)?;
    let sink = build_sink(args.dry_run, &config)?;
    let mut pipeline = GesturePipeline::from_config(store, &config, sink);

    let stop = StopFlag::new();
    spawn_quit_listener(stop.clone());
    println!("recognizing gestures, enter `q` to quit");
    for label in GestureLabel::ALL {
        println!(
            "  {} {:<10} {}",
            label.emoji(),
            label.display_name(),
            config.dispatch.actions.kind(label)
        );
    }

    let summary = run_frame_loop(source.as_mut(), &mut pipeline, &stop)?;
    log::info!(
        "stopped ({:?}) after {} frames: {} with a hand, {} matched, {} actions, {} suppressed, {} failed",
        summary.stop_reason,
        summary.frames,
        summary.hands,
        summary.matches,
        summary.dispatched,
        summary.suppressed,
        summary.failed
    );
    Ok(())
}

fn open_source(
    replay: Option<&Path>,
    fps: u32,
    config: &Config,
) -> Result<Box<dyn LandmarkSource>> {
    if let Some(path) = replay {
        log::info!("replaying landmarks from {}", path.display());
        return Ok(Box::new(ReplaySource::open(path, fps)?));
    }
    open_camera(config)
}

#[cfg(all(feature = "camera-nokhwa", feature = "handpose-ort"))]
fn open_camera(config: &Config) -> Result<Box<dyn LandmarkSource>> {
    let source = gesture_control::pipeline::CameraLandmarkSource::open(&config.capture)?;
    Ok(Box::new(source))
}

#[cfg(not(all(feature = "camera-nokhwa", feature = "handpose-ort")))]
fn open_camera(_config: &Config) -> Result<Box<dyn LandmarkSource>> {
    bail!("built without camera support; rebuild with `--features live` or pass --replay FILE")
}

fn build_sink(dry_run: bool, config: &Config) -> Result<Box<dyn ActionSink>> {
    if dry_run {
        return Ok(Box::new(LogSink));
    }
    input_sink(config)
}

#[cfg(feature = "input-enigo")]
fn input_sink(config: &Config) -> Result<Box<dyn ActionSink>> {
    let sink = gesture_control::input::EnigoSink::new(config.dispatch.failsafe_margin_px)?;
    Ok(Box::new(sink))
}

#[cfg(not(feature = "input-enigo"))]
fn input_sink(_config: &Config) -> Result<Box<dyn ActionSink>> {
    log::warn!("built without input support, actions are only logged");
    Ok(Box::new(LogSink))
}

fn collect(
    config: &Config,
    source: &mut dyn LandmarkSource,
    label: GestureLabel,
    target: usize,
    interval: Duration,
    append: bool,
    stop: &StopFlag,
) -> Result<()> {
    println!(
        "show the {} {} gesture ({}); enter `q` to stop early",
        label.emoji(),
        label.display_name(),
        label.description()
    );

    let summary = collect_samples(source, target, interval, stop)?;
    if summary.samples.is_empty() {
        bail!(
            "no samples captured for {label} ({} frames, {} unusable)",
            summary.frames,
            summary.rejected
        );
    }
    if summary.samples.len() < target {
        log::warn!("captured {} of {target} samples", summary.samples.len());
    }

    let path = sample_store::write_label_file(&config.data.dir, label, &summary.samples, append)
        .with_context(|| format!("failed to write samples for {label}"))?;
    log::info!(
        "{} {} samples to {}",
        if append { "appended" } else { "wrote" },
        summary.samples.len(),
        path.display()
    );
    Ok(())
}

/// Guided session over every gesture, with a prompt before each one.
fn collect_all(
    config: &Config,
    source: &mut dyn LandmarkSource,
    target: usize,
    interval: Duration,
    append: bool,
) -> Result<()> {
    println!("recording {target} samples for each gesture:");
    for label in GestureLabel::ALL {
        println!(
            "  {} {:<10} {}",
            label.emoji(),
            label.display_name(),
            label.description()
        );
    }
    println!(
        "keep the hand centred and evenly lit at a steady distance, and vary its rotation slightly between samples"
    );

    let lines = spawn_line_reader();
    for label in GestureLabel::ALL {
        println!(
            "\nnext: {} {}; press Enter when ready, `s` to skip, `q` to finish",
            label.emoji(),
            label.display_name()
        );
        // A closed stdin (piped input) records every gesture without asking.
        let reply = lines
            .recv()
            .map(|line| NextGesture::from_reply(&line))
            .unwrap_or(NextGesture::Record);
        match reply {
            NextGesture::Quit => break,
            NextGesture::Skip => {
                log::info!("skipped {label}");
                continue;
            }
            NextGesture::Record => {}
        }

        let stop = StopFlag::new();
        let (done_tx, done_rx) = bounded::<()>(0);
        let relay = relay_quit(&lines, &stop, done_rx);
        let result = collect(config, source, label, target, interval, append, &stop);
        drop(done_tx);
        if relay.join().is_err() {
            log::warn!("stdin relay panicked");
        }
        if let Err(err) = result {
            log::warn!("skipped {label}: {err:#}");
        }
    }
    Ok(())
}

/// Forwards stdin lines so prompts and quit requests share one reader.
fn spawn_line_reader() -> Receiver<String> {
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Sets `stop` on `q` until `done` disconnects.
fn relay_quit(lines: &Receiver<String>, stop: &StopFlag, done: Receiver<()>) -> JoinHandle<()> {
    let (lines, stop) = (lines.clone(), stop.clone());
    thread::spawn(move || {
        loop {
            select! {
                recv(lines) -> line => match line {
                    Ok(line) if NextGesture::from_reply(&line) == NextGesture::Quit => {
                        stop.stop();
                        break;
                    }
                    Ok(_) => {}
                    Err(_) => break,
                },
                recv(done) -> _ => break,
            }
        }
    })
}

fn run_diagnose(source: &mut dyn LandmarkSource, frames: usize) -> Result<()> {
    println!("show a hand to the camera; enter `q` to finish early");
    let stop = StopFlag::new();
    spawn_quit_listener(stop.clone());

    let summary = diagnose(source, frames, &stop)?;
    let detection = summary.detection();
    println!("frames examined: {}", summary.frames);
    println!("hand detected:   {}", summary.hands);
    println!("usable hands:    {}", summary.usable);
    println!("detection rate:  {:.1}% ({detection})", summary.detection_rate());
    println!("{}", detection.advice());
    Ok(())
}

fn check(config: &Config) -> Result<()> {
    let (_, report) = SampleStore::scan(&config.data.dir)?;
    println!("gesture data in {}", report.dir.display());

    for label in &report.labels {
        if !label.present {
            println!("  {:<10} missing ({})", label.label, label.path.display());
            continue;
        }
        let note = match label.samples {
            0 => " (no usable samples)",
            n if n < MIN_SAMPLES => " (too few, record more)",
            n if n < RECOMMENDED_SAMPLES => " (20+ recommended)",
            _ => "",
        };
        println!("  {:<10} {:>4} samples{note}", label.label, label.samples);
        for bad in &label.malformed {
            println!("      line {}: {}", bad.line, bad.reason);
        }
    }

    for path in &report.unrecognized {
        println!("  unrecognized file {}", path.display());
    }
    if report.malformed_total() > 0 {
        println!(
            "{} malformed lines; `gesture-control reformat` can repair values split across lines",
            report.malformed_total()
        );
    }
    if report.total_samples() == 0 {
        println!("no usable samples, record some with `gesture-control collect`");
    }
    Ok(())
}

fn reformat(config: &Config) -> Result<()> {
    let dir = &config.data.dir;
    for label in GestureLabel::ALL {
        if !sample_store::label_path(dir, label).is_file() {
            continue;
        }
        let repaired = sample_store::repair_label_file(dir, label)
            .with_context(|| format!("failed to reformat {label}"))?;
        log::info!(
            "{label}: {} samples, backup at {}",
            repaired.samples,
            repaired.backup.display()
        );
        if repaired.dropped_values > 0 {
            log::warn!(
                "{label}: dropped {} trailing values that did not form a full sample",
                repaired.dropped_values
            );
        }
    }
    Ok(())
}
