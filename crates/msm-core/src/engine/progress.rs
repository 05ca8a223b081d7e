use std::path::PathBuf;

/// Events emitted while a pipeline runs.
///
/// A run is a sequence of phases. Phases that loop over trajectories or splits
/// announce their step count with `TaskStart` and tick with `TaskIncrement`.
#[derive(Debug, Clone, PartialEq)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    TaskStart { total_steps: u64 },
    TaskIncrement,
    TaskFinish,

    ArtifactWritten(PathBuf),
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    /// Runs `body` as a task of `total_steps` steps, closing the task even when
    /// `body` fails.
    pub fn task<T, E>(
        &self,
        total_steps: usize,
        body: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        self.report(Progress::TaskStart {
            total_steps: total_steps as u64,
        });
        let result = body();
        self.report(Progress::TaskFinish);
        result
    }
}
