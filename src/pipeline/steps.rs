use std::fmt;
use std::path::{Path, PathBuf};

/// One external script invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStep {
    pub name: &'static str,
    pub script: PathBuf,
    pub args: Vec<String>,
}

impl PipelineStep {
    fn new(name: &'static str, scripts_dir: &Path, file: &str) -> Self {
        PipelineStep {
            name,
            script: scripts_dir.join(file),
            args: Vec::new(),
        }
    }

    fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// `<script> <args...>` for logs.
    pub fn command_line(&self) -> String {
        std::iter::once(self.script.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// The three scheduled jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    /// Refresh data, retrain, fetch weather, predict
    Full,
    /// Feature engineering and model training only
    Retrain,
    /// Fresh schedule/weather and predictions with the existing model
    Predict,
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineKind::Full => write!(f, "full"),
            PipelineKind::Retrain => write!(f, "retrain"),
            PipelineKind::Predict => write!(f, "predict"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub scripts_dir: PathBuf,
    /// Season being predicted
    pub year: i32,
    /// Past seasons pulled into the training set
    pub historic_seasons: Vec<i32>,
}

impl PipelineSettings {
    /// Default history is the two seasons before `year`.
    pub fn new(scripts_dir: PathBuf, year: i32, historic_seasons: Option<Vec<i32>>) -> Self {
        PipelineSettings {
            scripts_dir,
            year,
            historic_seasons: historic_seasons
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| vec![year - 2, year - 1]),
        }
    }
}

/// Ordered steps for a job. Order matters: later steps read earlier outputs.
pub fn plan(kind: PipelineKind, settings: &PipelineSettings) -> Vec<PipelineStep> {
    let dir = settings.scripts_dir.as_path();
    let year = settings.year.to_string();

    let refresh_history = PipelineStep::new("fetch-history", dir, "fetch_all_data.py")
        .with_args(["--year", year.as_str(), "--historic_seasons"])
        .with_args(settings.historic_seasons.iter().map(|y| y.to_string()))
        .with_args(["--skip_weather"]);
    let fetch_weather = PipelineStep::new("fetch-weather", dir, "fetch_all_data.py")
        .with_args(["--year", year.as_str(), "--skip_weather", "False"]);
    let prep = PipelineStep::new("data-prep", dir, "data_prep.py");
    let features = PipelineStep::new("feature-engineering", dir, "feature_engineering_advanced.py");
    let train = PipelineStep::new("train-model", dir, "train_xgb_model.py");
    let predict = PipelineStep::new("predict", dir, "predict_upcoming.py");

    match kind {
        PipelineKind::Full => vec![refresh_history, prep, features, train, fetch_weather, predict],
        PipelineKind::Retrain => vec![features, train],
        PipelineKind::Predict => vec![fetch_weather, prep, predict],
    }
}
