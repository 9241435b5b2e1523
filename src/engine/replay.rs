//! Recording and replaying engine event streams.
//!
//! A script is one RON-encoded [`Event`] per line. Blank lines and lines
//! starting with `#` are skipped, and `sleep <ms>` advances the replay clock,
//! ticking the engine at the configured interval along the way.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use tracing::warn;

use super::{Event, WindowManagerContext};
use crate::common::config::Config;
use crate::sys::clock::ManualClock;

pub struct Record {
    file: Option<File>,
}

impl Record {
    pub fn new(file: Option<File>) -> Self { Self { file } }

    pub fn create(path: &Path) -> anyhow::Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("creating recording {}", path.display()))?;
        Ok(Self::new(Some(file)))
    }

    pub(super) fn start(&mut self, config: &Config) {
        let Some(file) = self.file.as_mut() else { return };
        let line = match ron::ser::to_string(config) {
            Ok(line) => line,
            Err(e) => {
                warn!(%e, "could not encode config for recording");
                return;
            }
        };
        if let Err(e) = writeln!(file, "# config: {line}") {
            warn!(%e, "recording disabled");
            self.file = None;
        }
    }

    pub(super) fn on_event(&mut self, event: &Event) {
        let Some(file) = self.file.as_mut() else { return };
        let written = ron::ser::to_string(event)
            .map_err(anyhow::Error::from)
            .and_then(|line| writeln!(file, "{line}").map_err(anyhow::Error::from));
        if let Err(e) = written {
            warn!(%e, "recording disabled");
            self.file = None;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    Event(Event),
    Sleep(Duration),
}

pub fn parse_script(src: &str) -> anyhow::Result<Vec<ScriptStep>> {
    let mut steps = Vec::new();
    for (lineno, line) in src.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(ms) = line.strip_prefix("sleep ") {
            let Ok(ms) = ms.trim().parse::<u64>() else {
                bail!("line {}: invalid sleep duration {ms:?}", lineno + 1);
            };
            steps.push(ScriptStep::Sleep(Duration::from_millis(ms)));
            continue;
        }
        let event = ron::de::from_str::<Event>(line)
            .with_context(|| format!("line {}: invalid event", lineno + 1))?;
        steps.push(ScriptStep::Event(event));
    }
    Ok(steps)
}

pub fn read_script(path: &Path) -> anyhow::Result<Vec<ScriptStep>> {
    let src = std::fs::read_to_string(path)
        .with_context(|| format!("reading script {}", path.display()))?;
    parse_script(&src)
}

/// Feeds `steps` to `engine`. Captures are settled after every event so the
/// outcome does not depend on task scheduling.
pub async fn replay(engine: &mut WindowManagerContext, clock: &ManualClock, steps: Vec<ScriptStep>) {
    let tick = Duration::from_millis(engine.config().settings.tick_interval_ms.max(1));
    for step in steps {
        match step {
            ScriptStep::Event(event) => {
                let shutdown = event == Event::Shutdown;
                engine.handle_event(event);
                engine.drain_events();
                engine.settle().await;
                if shutdown {
                    break;
                }
            }
            ScriptStep::Sleep(mut remaining) => {
                while !remaining.is_zero() {
                    let step = remaining.min(tick);
                    clock.advance(step);
                    remaining -= step;
                    engine.tick();
                }
            }
        }
    }
}
