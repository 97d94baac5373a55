//! chatscript CLI - Command-line host for event-driven scripts

mod repl;

use anyhow::{Context, Result, anyhow};
use chatscript_core::config::{PreludeConfig, load_config, load_default_config};
use chatscript_core::easing::EaseOut;
use chatscript_script::{DispatchReport, HostCapabilities, ScriptEngine, ScriptWatcher, WatchEvent};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "chatscript")]
#[command(about = "Event-driven scripting for chat clients", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load scripts and fire events at them
    Run {
        /// Script files, loaded in order
        #[arg(required = true)]
        scripts: Vec<PathBuf>,

        /// Event to fire, as TRIGGER or TRIGGER:JSON (repeatable)
        #[arg(short, long)]
        fire: Vec<String>,
    },

    /// Load scripts and reload them when they change
    Watch {
        /// Script files to watch
        #[arg(required = true)]
        scripts: Vec<PathBuf>,

        /// Event to fire after every reload, as TRIGGER or TRIGGER:JSON
        #[arg(short, long)]
        fire: Vec<String>,

        /// Debounce interval in milliseconds
        #[arg(long, default_value = "100")]
        debounce: u64,
    },

    /// Interactive script session
    Repl {
        /// Script files to load before the first prompt
        scripts: Vec<PathBuf>,
    },

    /// List the trigger types scripts can register for
    Triggers,

    /// Print an easeOut animation curve
    Ease {
        /// Starting value
        #[arg(long, allow_hyphen_values = true)]
        start: f64,

        /// Target value
        #[arg(long, allow_hyphen_values = true)]
        finish: f64,

        /// Divisor applied to the remaining distance each frame
        #[arg(long, allow_hyphen_values = true)]
        speed: f64,

        /// Snap distance (defaults to the configured default jump)
        #[arg(long)]
        jump: Option<f64>,

        /// Stop after this many frames
        #[arg(long, default_value = "100")]
        max_frames: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_default_config(),
    };

    match cli.command {
        Commands::Run { scripts, fire } => {
            run_scripts(&config, &scripts, &fire)?;
        }
        Commands::Watch {
            scripts,
            fire,
            debounce,
        } => {
            run_watch(&config, &scripts, &fire, debounce)?;
        }
        Commands::Repl { scripts } => {
            repl::run_repl(build_engine(&config)?, &scripts)?;
        }
        Commands::Triggers => {
            list_triggers(&config)?;
        }
        Commands::Ease {
            start,
            finish,
            speed,
            jump,
            max_frames,
        } => {
            let jump = jump.unwrap_or(config.default_jump);
            print_curve(start, finish, speed, jump, max_frames)?;
        }
    }

    Ok(())
}

fn build_engine(config: &PreludeConfig) -> Result<ScriptEngine> {
    let caps = HostCapabilities::from_config(config)?;
    ScriptEngine::new(caps)
}

fn run_scripts(config: &PreludeConfig, scripts: &[PathBuf], fire: &[String]) -> Result<()> {
    let events = fire
        .iter()
        .map(|spec| parse_fire(spec))
        .collect::<Result<Vec<_>>>()?;

    let mut engine = build_engine(config)?;
    engine.load_files(scripts)?;
    println!(
        "Loaded {} script(s), {} trigger(s) registered",
        engine.loaded().len(),
        engine.capabilities().triggers().len()
    );

    for (trigger, payload) in events {
        let report = engine.fire_json(&trigger, payload)?;
        print_report(&report);
    }

    Ok(())
}

fn run_watch(
    config: &PreludeConfig,
    scripts: &[PathBuf],
    fire: &[String],
    debounce: u64,
) -> Result<()> {
    let events = fire
        .iter()
        .map(|spec| parse_fire(spec))
        .collect::<Result<Vec<_>>>()?;

    let mut watcher = ScriptWatcher::new(Some(debounce))?;
    for script in scripts {
        watcher.watch(script)?;
    }

    let mut engine = build_engine(config)?;

    println!("Watching {} script(s)", scripts.len());
    println!("Press Ctrl+C to stop\n");

    // Initial load
    load_and_report(&mut engine, scripts, &events);

    loop {
        match watcher.recv_timeout(Duration::from_millis(100)) {
            Some(WatchEvent::Changed(path)) => {
                // Collapse the rest of the burst into one reload
                let mut changed = watcher.drain_changes();
                changed.push(path);
                for path in &changed {
                    tracing::info!("Changed: {}", path.display());
                }
                load_and_report(&mut engine, scripts, &events);
            }
            Some(WatchEvent::Error(message)) => {
                tracing::warn!("{}", message);
            }
            None => {
                // Continue watching
            }
        }
    }
}

fn load_and_report(engine: &mut ScriptEngine, scripts: &[PathBuf], events: &[(String, Value)]) {
    println!("\n--- Loading {} script(s) ---", scripts.len());

    engine.unload();
    if let Err(e) = engine.load_files(scripts) {
        eprintln!("ERROR:\n{:#}", e);
        return;
    }
    println!(
        "OK - {} trigger(s) registered",
        engine.capabilities().triggers().len()
    );

    for (trigger, payload) in events {
        match engine.fire_json(trigger, payload.clone()) {
            Ok(report) => print_report(&report),
            Err(e) => eprintln!("ERROR firing {}: {:#}", trigger, e),
        }
    }
}

fn list_triggers(config: &PreludeConfig) -> Result<()> {
    let catalog = config.catalog()?;

    println!("{} trigger type(s):", catalog.len());
    for spec in catalog.iter() {
        let mut line = format!("  {}", spec.name);
        if spec.cancelable {
            line.push_str(" [cancelable]");
        }
        if !spec.payload.is_empty() {
            line.push_str(&format!(" payload: {}", spec.payload.join(", ")));
        }
        if let Some(subject) = &spec.subject {
            line.push_str(&format!(" criteria on: {}", subject));
        }
        if !spec.aliases.is_empty() {
            line.push_str(&format!(" aliases: {}", spec.aliases.join(", ")));
        }
        println!("{}", line);
    }

    Ok(())
}

fn print_curve(start: f64, finish: f64, speed: f64, jump: f64, max_frames: usize) -> Result<()> {
    let frames = EaseOut::new(speed).with_jump(jump).frames(start, finish, max_frames)?;

    println!("{:>5}  {}", 0, start);
    let mut last = start;
    let mut count = 0;
    for (i, value) in frames.enumerate() {
        println!("{:>5}  {}", i + 1, value);
        last = value;
        count = i + 1;
    }

    if last == finish {
        println!("Reached {} after {} frame(s)", finish, count);
    } else {
        println!("Stopped after {} frame(s) at {}", count, last);
    }
    Ok(())
}

/// Parse a `TRIGGER` or `TRIGGER:JSON` event spec
fn parse_fire(spec: &str) -> Result<(String, Value)> {
    let (trigger, payload) = match spec.split_once(':') {
        Some((trigger, payload)) => (trigger, Some(payload)),
        None => (spec, None),
    };

    let trigger = trigger.trim();
    if trigger.is_empty() {
        return Err(anyhow!("Missing trigger name in '{}'", spec));
    }
    Ok((trigger.to_string(), parse_payload(payload)?))
}

/// Parse an optional JSON object payload
fn parse_payload(text: Option<&str>) -> Result<Value> {
    match text.map(str::trim) {
        None | Some("") => Ok(Value::Object(serde_json::Map::new())),
        Some(text) => {
            let value: Value =
                serde_json::from_str(text).with_context(|| format!("Invalid payload: {}", text))?;
            if !value.is_object() {
                return Err(anyhow!("Payload must be a JSON object, got {}", value));
            }
            Ok(value)
        }
    }
}

fn print_report(report: &DispatchReport) {
    let mut line = format!(
        "{}: {} handler(s) invoked",
        report.trigger, report.invoked
    );
    if report.skipped > 0 {
        line.push_str(&format!(", {} skipped", report.skipped));
    }
    if report.canceled {
        line.push_str(", canceled");
    }
    if !report.is_clean() {
        line.push_str(&format!(", {} failed", report.failures.len()));
    }
    println!("{}", line);
}

/// Display name of a script path
fn script_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
