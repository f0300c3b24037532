use chrono::Datelike;
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::data::DataPaths;
use crate::pipeline::{PipelineKind, PipelineSettings};

/// MLB game predictions dashboard and nightly model pipeline
#[derive(Parser, Debug, Clone)]
#[command(name = "betskies", version, about)]
pub struct Config {
    /// Directory holding the prediction and statistics CSV files
    #[arg(long, env = "BETSKIES_DATA_DIR", default_value = "data", global = true)]
    pub data_dir: PathBuf,

    /// Upcoming game predictions file, relative to the data directory
    #[arg(long, env = "PREDICTIONS_FILE", default_value = "upcoming_games_predictions.csv", global = true)]
    pub predictions_file: String,

    /// Batter home-run rates file
    #[arg(long, env = "PLAYER_STATS_FILE", default_value = "player_hr_rates_2024.csv", global = true)]
    pub player_stats_file: String,

    /// Pitcher season stats file
    #[arg(long, env = "PITCHER_STATS_FILE", default_value = "pitcher_stats_2024.csv", global = true)]
    pub pitcher_stats_file: String,

    /// Team season stats file
    #[arg(long, env = "TEAM_STATS_FILE", default_value = "team_stats_2024.csv", global = true)]
    pub team_stats_file: String,

    /// Live bookmaker odds file
    #[arg(long, env = "LIVE_ODDS_FILE", default_value = "live_odds.csv", global = true)]
    pub live_odds_file: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the predictions dashboard
    Serve(ServeArgs),
    /// Run a batch pipeline
    Pipeline {
        #[command(subcommand)]
        action: PipelineCommand,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Dashboard listen address
    #[arg(long, env = "DASHBOARD_ADDR", default_value = "0.0.0.0:8050")]
    pub addr: String,

    /// Reuse loaded tables until their file's modification time changes
    #[arg(long, env = "CACHE_TABLES", default_value = "false")]
    pub cache_tables: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum PipelineCommand {
    /// Refresh all data, retrain the model, then generate predictions
    Run(PipelineArgs),
    /// Rebuild features and retrain the model
    Retrain(PipelineArgs),
    /// Refresh schedule and weather, then generate predictions
    Predict(PipelineArgs),
}

impl PipelineCommand {
    pub fn kind(&self) -> PipelineKind {
        match self {
            PipelineCommand::Run(_) => PipelineKind::Full,
            PipelineCommand::Retrain(_) => PipelineKind::Retrain,
            PipelineCommand::Predict(_) => PipelineKind::Predict,
        }
    }

    pub fn args(&self) -> &PipelineArgs {
        match self {
            PipelineCommand::Run(a) | PipelineCommand::Retrain(a) | PipelineCommand::Predict(a) => a,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PipelineArgs {
    /// Interpreter used to launch each step
    #[arg(long, env = "PIPELINE_PYTHON", default_value = "python")]
    pub python: String,

    /// Directory containing the step scripts
    #[arg(long, env = "PIPELINE_SCRIPTS_DIR", default_value = "scripts")]
    pub scripts_dir: PathBuf,

    /// Working directory for every step
    #[arg(long, env = "PIPELINE_WORKDIR", default_value = ".")]
    pub workdir: PathBuf,

    /// Season to fetch and predict (defaults to the current year)
    #[arg(long)]
    pub year: Option<i32>,

    /// Past seasons used for training (defaults to the two before --year)
    #[arg(long, num_args = 1..)]
    pub historic_seasons: Vec<i32>,
}

impl PipelineArgs {
    pub fn settings(&self, current_year: i32) -> PipelineSettings {
        let historic = (!self.historic_seasons.is_empty()).then(|| self.historic_seasons.clone());
        PipelineSettings::new(
            self.scripts_dir.clone(),
            self.year.unwrap_or(current_year),
            historic,
        )
    }
}

impl Config {
    pub fn data_paths(&self) -> DataPaths {
        DataPaths {
            predictions: self.data_dir.join(&self.predictions_file),
            player_stats: self.data_dir.join(&self.player_stats_file),
            pitcher_stats: self.data_dir.join(&self.pitcher_stats_file),
            team_stats: self.data_dir.join(&self.team_stats_file),
            live_odds: self.data_dir.join(&self.live_odds_file),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_for_year(chrono::Local::now().year())
    }

    /// Validate, resolving an omitted `--year` to `current_year`.
    fn validate_for_year(&self, current_year: i32) -> anyhow::Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            anyhow::bail!("data_dir must not be empty");
        }
        match &self.command {
            Command::Serve(args) => {
                if args.addr.parse::<SocketAddr>().is_err() {
                    anyhow::bail!("dashboard address {:?} is not a valid socket address", args.addr);
                }
            }
            Command::Pipeline { action } => {
                let args = action.args();
                let year = args.year.unwrap_or(current_year);
                if !(1871..=2200).contains(&year) {
                    anyhow::bail!("year must be between 1871 and 2200");
                }
                if let Some(late) = args.historic_seasons.iter().find(|&&s| s > year) {
                    anyhow::bail!("historic season {} is after the target year {}", late, year);
                }
                if args.python.trim().is_empty() {
                    anyhow::bail!("python interpreter must not be empty");
                }
            }
        }
        Ok(())
    }
}
