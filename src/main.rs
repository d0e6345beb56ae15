use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

use linuxpad::capabilities::Capabilities;
use linuxpad::config::Config;
use linuxpad::devices::label::short_label;
use linuxpad::devices::{CommandQuery, DeviceCatalog};
use linuxpad::engine::{Engine, EngineEvent};
use linuxpad::library;
use linuxpad::playback::PlaybackStatus;
use linuxpad::telemetry;
use linuxpad::watch::ConfigWatcher;

/// How often finished playback is reaped
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Grace period before checking whether the listener backend failed
const LISTENER_SETTLE: Duration = Duration::from_millis(100);

/// Target label width in status lines
const TARGET_LABEL_LEN: usize = 25;

#[derive(Parser)]
#[command(name = "linuxpad")]
#[command(about = "Hotkey soundboard for PipeWire", long_about = None)]
struct Cli {
    /// Config file (default: ~/.linuxpad.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for hotkeys until Ctrl+C (default)
    Run,
    /// List audio devices usable as target
    Devices,
    /// Set the target device by raw ID
    Target {
        /// Raw device name, as printed by `devices`
        id: String,
    },
    /// Add audio files to the sound list
    Add {
        /// Files to add (mp3, wav, ogg, flac, m4a, opus, aac)
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Show the sound list
    List,
    /// Set a sound's hotkey (e.g. F1, A, 1); empty clears it
    Bind {
        /// Sound number from `list`
        index: usize,
        /// Hotkey
        hotkey: String,
    },
    /// Rename a sound
    Rename {
        /// Sound number from `list`
        index: usize,
        /// New display name
        name: String,
    },
    /// Remove a sound
    Remove {
        /// Sound number from `list`
        index: usize,
    },
    /// Play one sound and wait for it to finish
    Play {
        /// Sound number from `list`, or a file path
        sound: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let path = match cli.config {
        Some(path) => path,
        None => Config::config_path()?,
    };
    let mut config = Config::load_from(&path)?;

    let default_filter = if cli.verbose { "debug" } else { "info" };
    telemetry::init(config.telemetry.enabled, &config.telemetry.log_path, default_filter)?;
    tracing::info!("linuxpad starting");

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&path, &config).await,
        Command::Devices => {
            list_devices(&config);
            Ok(())
        }
        Command::Target { id } => {
            let id = id.trim();
            if id.is_empty() {
                bail!("device ID must not be empty");
            }
            let catalog = DeviceCatalog::new(CommandQuery::new(&config.devices));
            let label = match catalog.find(id) {
                Some(device) => device.to_string(),
                None => {
                    println!("⚠ {id} is not in the current device list, saving anyway");
                    short_label(id, TARGET_LABEL_LEN)
                }
            };
            config.playback.target = id.to_owned();
            config.save_to(&path)?;
            println!("✓ Target set: {label}");
            Ok(())
        }
        Command::Add { files } => {
            let report = library::add(&mut config.sounds, &files)?;
            for file in &report.skipped {
                println!("⚠ Skipped (not audio): {}", file.display());
            }
            config.save_to(&path)?;
            println!("✓ Added {} sound(s)", report.added.len());
            Ok(())
        }
        Command::List => {
            if config.sounds.is_empty() {
                println!("No sounds. Add some with `linuxpad add <files>`.");
            }
            for row in library::rows(&config.sounds) {
                println!("{row}");
            }
            println!("Total sounds: {}", config.sounds.len());
            Ok(())
        }
        Command::Bind { index, hotkey } => {
            library::bind(&mut config.sounds, index, &hotkey)?;
            config.save_to(&path)?;
            println!("✓ Hotkey updated");
            Ok(())
        }
        Command::Rename { index, name } => {
            library::rename(&mut config.sounds, index, &name)?;
            config.save_to(&path)?;
            println!("✓ Renamed");
            Ok(())
        }
        Command::Remove { index } => {
            let removed = library::remove(&mut config.sounds, index)?;
            config.save_to(&path)?;
            println!("✓ Removed {}", removed.name);
            Ok(())
        }
        Command::Play { sound } => {
            let file = library::resolve(&config.sounds, &sound)?;
            play_once(&config, &file).await
        }
    }
}

async fn run(path: &Path, config: &Config) -> Result<()> {
    println!("✓ Config loaded from {}", path.display());

    let capabilities = Capabilities::probe(config);
    capabilities.report(config);
    println!("✓ Capabilities checked");

    match config.playback.target() {
        Some(target) => println!("✓ Target: {}", short_label(target, TARGET_LABEL_LEN)),
        None => println!("⚠ No target device selected (see `linuxpad devices`)"),
    }

    let mut engine = Engine::from_config(config);
    tokio::spawn(print_events(engine.subscribe()));
    println!("✓ {} hotkey(s) bound", engine.registry().len());

    if config.hotkeys.enabled {
        engine.start_listener();
        // Backend failures surface on the listener thread right away
        tokio::time::sleep(LISTENER_SETTLE).await;
        if engine.listener().is_unavailable() {
            println!("⚠ Global hotkeys unavailable (is an X11/Wayland session running?)");
        } else {
            println!("✓ Key listener started");
        }
    }

    let (_watcher, mut reloads) = match ConfigWatcher::new(path) {
        Ok((watcher, rx)) => (Some(watcher), rx),
        Err(e) => {
            tracing::warn!(error = %e, "config hot reload unavailable");
            let (_tx, rx) = mpsc::channel(1);
            (None, rx)
        }
    };

    tracing::info!("event loop starting (press Ctrl+C to exit)");
    println!("\nLinuxpad is running. Press a bound hotkey to play.");
    println!("Press Ctrl+C to exit.\n");

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            Some(trigger) = engine.next_trigger() => {
                engine.handle_trigger(&trigger);
            }
            Some(()) = reloads.recv() => reload(&mut engine, path),
            _ = ticker.tick() => {
                engine.poll();
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutdown signal received");
                println!("\nShutting down...");
                break;
            }
        }
    }

    engine.shutdown();
    Ok(())
}

fn reload<B: linuxpad::playback::PlaybackBackend>(engine: &mut Engine<B>, path: &Path) {
    match engine.reload_from(path) {
        Ok(true) => println!("✓ Config reloaded"),
        Ok(false) => {}
        Err(e) => tracing::warn!(error = %e, "config reload failed, keeping previous settings"),
    }
}

async fn play_once(config: &Config, file: &Path) -> Result<()> {
    let mut engine = Engine::from_config(config);
    let status = engine.play(file);
    println!("{status}");
    if status.is_error() {
        bail!("{status}");
    }

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(status) = engine.poll() {
                    println!("{status}");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("{}", engine.stop());
                break;
            }
        }
    }
    Ok(())
}

fn list_devices(config: &Config) {
    let catalog = DeviceCatalog::new(CommandQuery::new(&config.devices));
    let devices = catalog.list_targets();
    if devices.is_empty() {
        println!("No audio devices found. Is PipeWire running?");
        return;
    }

    let target = config.playback.target();
    for device in devices {
        let marker = if target == Some(device.name.as_str()) {
            "*"
        } else if device.is_likely_virtual() {
            "+"
        } else {
            " "
        };
        println!("{marker} {device}");
        println!("    ID: {}", device.name);
    }
    println!("\n* current target, + likely virtual device");
}

async fn print_events(mut events: broadcast::Receiver<EngineEvent>) {
    loop {
        match events.recv().await {
            Ok(EngineEvent::Status(status)) => print_status(&status),
            Ok(EngineEvent::Triggered(_)) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "status printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn print_status(status: &PlaybackStatus) {
    if status.is_error() {
        eprintln!("⚠ {status}");
    } else {
        println!("{status}");
    }
}
