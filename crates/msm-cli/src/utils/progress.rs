use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use msmpipe::engine::progress::{Progress, ProgressCallback};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

const SPINNER_TICK_MS: u64 = 100;

/// Terminal state of a pipeline run: one bar reused by every phase, plus the
/// phases and artifacts seen so far.
struct RunDisplay {
    bar: ProgressBar,
    phase: Option<&'static str>,
    completed: Vec<&'static str>,
    artifacts: Vec<PathBuf>,
}

impl RunDisplay {
    fn begin_phase(&mut self, name: &'static str) {
        self.phase = Some(name);
        self.bar.reset();
        self.bar.set_length(0);
        self.bar.set_style(phase_style());
        self.bar.set_prefix(format!("[{}]", self.completed.len() + 1));
        self.bar.set_message(format!("{name}..."));
        self.bar.enable_steady_tick(Duration::from_millis(SPINNER_TICK_MS));
    }

    fn end_phase(&mut self) {
        self.bar.disable_steady_tick();
        let Some(name) = self.phase.take() else {
            return;
        };
        self.completed.push(name);
        self.bar.finish_with_message(format!("✓ {name}"));
    }

    fn begin_task(&mut self, total_steps: u64) {
        self.bar.disable_steady_tick();
        self.bar.set_style(task_style());
        self.bar.set_length(total_steps);
        self.bar.set_position(0);
        if let Some(name) = self.phase {
            self.bar.set_message(name);
        }
    }

    fn end_task(&mut self) {
        if let Some(total) = self.bar.length() {
            self.bar.set_position(total);
        }
    }

    fn record_artifact(&mut self, path: PathBuf) {
        self.bar.println(format!("    wrote {}", path.display()));
        self.artifacts.push(path);
    }
}

fn phase_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:.bold.dim} {spinner:.green} {msg}")
        .expect("phase template is valid")
}

fn task_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:.bold.dim} {msg:<16} {wide_bar:.cyan/blue} {pos}/{len}")
        .expect("task template is valid")
        .progress_chars("=> ")
}

/// Turns engine progress events into an `indicatif` display on stderr.
#[derive(Clone)]
pub struct CliProgressHandler {
    display: Arc<Mutex<RunDisplay>>,
}

impl CliProgressHandler {
    pub fn new() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
        bar.finish_and_clear();
        Self {
            display: Arc::new(Mutex::new(RunDisplay {
                bar,
                phase: None,
                completed: Vec::new(),
                artifacts: Vec::new(),
            })),
        }
    }

    pub fn get_callback(&self) -> ProgressCallback<'static> {
        let display = Arc::clone(&self.display);
        Box::new(move |event: Progress| {
            let Ok(mut state) = display.lock() else {
                warn!("Progress display lock is poisoned; dropping {:?}", event);
                return;
            };
            match event {
                Progress::PhaseStart { name } => state.begin_phase(name),
                Progress::PhaseFinish => state.end_phase(),
                Progress::TaskStart { total_steps } => state.begin_task(total_steps),
                Progress::TaskIncrement => state.bar.inc(1),
                Progress::TaskFinish => state.end_task(),
                Progress::ArtifactWritten(path) => state.record_artifact(path),
            }
        })
    }
}

impl Default for CliProgressHandler {
    fn default() -> Self {
        Self::new()
    }
}
