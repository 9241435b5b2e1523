use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use shellwm::app::{AppCapabilities, AppDescriptor, ContentTarget, HostedApplication};
use shellwm::capsule::SyntheticCaptureBackend;
use shellwm::common::config::{Config, config_file};
use shellwm::common::log;
use shellwm::engine::replay::{self, Record};
use shellwm::engine::{EngineHandle, WindowManagerContext};
use shellwm::model::{WindowConfig, WindowId};
use shellwm::persistence::{FileStore, MemoryStore, StateStore};
use shellwm::sys::clock::{Clock, ManualClock, SystemClock};
use tracing::{debug, trace};

#[derive(Parser)]
struct Cli {
    /// Path to configuration file to use (overrides default).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the configuration file and report any problems.
    Validate,

    /// Run an event script against a fresh engine and print the final windows
    /// as JSON.
    Replay {
        script: PathBuf,

        /// Record handled events to the specified file path. Overwrites the
        /// file if it exists.
        #[arg(long)]
        record: Option<PathBuf>,

        /// Print the drawable frame instead of every window.
        #[arg(long)]
        frame: bool,
    },

    /// Inspect or clean up saved window states.
    Saved {
        #[command(subcommand)]
        command: SavedCommands,
    },
}

#[derive(Subcommand)]
enum SavedCommands {
    List,
    Clear,
    /// Remove states older than the given age.
    Cleanup {
        /// Defaults to `persistence.max_age_days`.
        #[arg(long)]
        max_age_days: Option<u64>,
    },
}

fn main() {
    sigpipe::reset();
    let opt = Cli::parse();
    log::init_logging();

    if let Err(e) = run(opt) {
        eprintln!("{e:#}");
        process::exit(1);
    }
}

fn run(opt: Cli) -> anyhow::Result<()> {
    let config_path = opt.config.unwrap_or_else(config_file);
    let config = Config::read_or_default(&config_path)?;

    match opt.command {
        Commands::Validate => {
            let issues = config.validate();
            if issues.is_empty() {
                println!("Config validation passed");
                return Ok(());
            }
            for issue in &issues {
                eprintln!("{issue}");
            }
            anyhow::bail!("{} problem(s) in {}", issues.len(), config_path.display());
        }
        Commands::Replay { script, record, frame } => {
            let steps = replay::read_script(&script)?;
            let clock = ManualClock::default();
            let mut engine = WindowManagerContext::new(
                config,
                Arc::new(MemoryStore::new()),
                Arc::new(clock.clone()),
                Arc::new(SyntheticCaptureBackend),
            );
            if let Some(path) = record {
                engine.set_recorder(Record::create(&path)?);
            }
            register_demo_apps(&mut engine)?;

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .context("starting runtime")?;
            runtime.block_on(replay::replay(&mut engine, &clock, steps));

            let out = if frame {
                serde_json::to_string_pretty(&engine.render_frame())?
            } else {
                serde_json::to_string_pretty(&engine.window_views())?
            };
            println!("{out}");
        }
        Commands::Saved { command } => {
            let path = config.persistence.state_path();
            let states = StateStore::new(
                Arc::new(FileStore::new(path.clone())),
                config.persistence.namespace.clone(),
            );
            debug!(path = %path.display(), "opened state store");
            match command {
                SavedCommands::List => {
                    for state in states.list() {
                        println!("{}", serde_json::to_string(&state)?);
                    }
                }
                SavedCommands::Clear => println!("removed {} saved state(s)", states.clear()),
                SavedCommands::Cleanup { max_age_days } => {
                    let days = max_age_days.unwrap_or(config.persistence.max_age_days);
                    let max_age = Duration::from_secs(days.saturating_mul(24 * 60 * 60));
                    let removed = states.purge(SystemClock.unix_millis(), max_age);
                    println!("removed {removed} saved state(s)");
                }
            }
        }
    }
    Ok(())
}

/// Minimal app used by scripts: it counts its renders and persists the count.
struct DemoApp {
    title: String,
    renders: u64,
}

impl DemoApp {
    fn boxed(title: &str) -> Box<dyn HostedApplication> {
        Box::new(DemoApp { title: title.to_string(), renders: 0 })
    }
}

impl HostedApplication for DemoApp {
    fn render_into(&mut self, target: &ContentTarget) {
        self.renders += 1;
        trace!(title = %self.title, bounds = ?target.bounds, "render");
    }

    fn title(&self) -> String { self.title.clone() }

    fn bind(&mut self, _handle: EngineHandle, window: WindowId) {
        debug!(title = %self.title, ?window, "bound");
    }

    fn serialize_state(&self) -> Option<Value> { Some(json!({ "renders": self.renders })) }

    fn deserialize_state(&mut self, state: Value) -> anyhow::Result<()> {
        self.renders = state
            .get("renders")
            .and_then(Value::as_u64)
            .context("missing render count")?;
        Ok(())
    }
}

fn register_demo_apps(engine: &mut WindowManagerContext) -> anyhow::Result<()> {
    engine.register_app(
        "notes",
        AppDescriptor::new(|_| Ok(DemoApp::boxed("Notes")))
            .persistent()
            .auto_restore()
            .with_capabilities(AppCapabilities::SERIALIZE_STATE | AppCapabilities::RESTORE_STATE)
            .with_config(WindowConfig::titled("Notes")),
    )?;
    engine.register_app(
        "terminal",
        AppDescriptor::new(|_| Ok(DemoApp::boxed("Terminal")))
            .with_config(WindowConfig { has_tab_strip: true, ..WindowConfig::titled("Terminal") }),
    )?;
    engine.register_app(
        "settings",
        AppDescriptor::new(|_| Ok(DemoApp::boxed("Settings"))).singleton(),
    )?;
    Ok(())
}
