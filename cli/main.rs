#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use rayon::prelude::*;
use std::fs;
use std::io::{BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process;

use lifescreen::config::EngineConfig;
use lifescreen::input::RawInput;
use lifescreen::pipeline::ScoringPipeline;
use lifescreen::record::{AnalysisRecord, RecordLog};
use lifescreen::status::classify;
use lifescreen::types::Reading;

#[derive(Parser)]
#[command(
    name = "lifescreen",
    about = "Lifestyle-disease risk screening from routine vitals",
    long_about = "Scores screening forms against pre-trained disease classifiers, classifies \
                 BMI, blood pressure, blood sugar and cholesterol, and recommends precautions."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a single screening form
    #[command(about = "Score one screening form (JSON object of form fields)")]
    Predict {
        /// Path to a JSON file holding the form fields
        #[arg(value_name = "INPUT_JSON")]
        input: PathBuf,

        /// Engine configuration file (TOML); built-in defaults when omitted
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Store the analysis in the record log under this user id
        #[arg(long, value_name = "USER_ID")]
        user: Option<String>,
    },

    /// Score every row of a CSV file in parallel
    #[command(about = "Score a CSV of screening forms (outputs: predictions.jsonl)")]
    Batch {
        /// CSV file whose header row names the form fields
        #[arg(value_name = "INPUT_CSV")]
        input: PathBuf,

        /// Engine configuration file (TOML); built-in defaults when omitted
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,

        /// Where to write one JSON result per input row
        #[arg(long, default_value = "predictions.jsonl")]
        output: PathBuf,
    },

    /// Show stored analyses for a user
    #[command(about = "Show a user's stored analyses, newest first")]
    History {
        #[arg(long, value_name = "USER_ID")]
        user: String,

        /// Only show the most recent analysis
        #[arg(long)]
        latest: bool,

        /// Engine configuration file (TOML); built-in defaults when omitted
        #[arg(long, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Classify a single metric reading
    #[command(about = "Classify one metric reading, e.g. `classify BloodPressure 135 95`")]
    Classify {
        /// Metric name: BMI, BloodPressure, BloodSugar or Cholesterol
        metric: String,

        /// The reading (systolic, for blood pressure)
        value: f64,

        /// Diastolic pressure, for blood pressure readings
        diastolic: Option<f64>,
    },

    /// Display version information
    #[command(about = "Display version information")]
    Version,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Predict {
            input,
            config,
            user,
        }) => run_predict(&input, config.as_deref(), user),
        Some(Commands::Batch {
            input,
            config,
            output,
        }) => run_batch(&input, config.as_deref(), &output),
        Some(Commands::History {
            user,
            latest,
            config,
        }) => run_history(&user, latest, config.as_deref()),
        Some(Commands::Classify {
            metric,
            value,
            diastolic,
        }) => {
            run_classify(&metric, value, diastolic);
            Ok(())
        }
        Some(Commands::Version) => {
            println!("lifescreen {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => {
            Cli::command().print_help().expect("print help");
            println!();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => {
            log::info!("Loading configuration from: {}", path.display());
            Ok(EngineConfig::load(path)?)
        }
        None => Ok(EngineConfig::default()),
    }
}

fn run_predict(
    input: &Path,
    config: Option<&Path>,
    user: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config)?;
    let pipeline = config.build_pipeline()?;

    let text = fs::read_to_string(input)?;
    let raw: RawInput = serde_json::from_str(&text)?;
    let report = pipeline.score(&raw)?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Some(user_id) = user {
        let log = RecordLog::new(&config.records.path);
        log.append(&AnalysisRecord::new(user_id, report))?;
        log::info!("Analysis saved to: {}", log.path().display());
    }
    Ok(())
}

fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    if let Ok(style) = ProgressStyle::with_template(
        "\n> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    ) {
        pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
    }
    pb.set_message(message.to_string());
    pb
}

/// One entry per CSV data row. Rows the CSV reader cannot decode stay in place as errors.
fn read_forms(
    path: &Path,
) -> Result<Vec<Result<RawInput, csv::Error>>, Box<dyn std::error::Error>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    Ok(reader
        .records()
        .map(|row| {
            row.map(|row| {
                headers
                    .iter()
                    .zip(row.iter())
                    .map(|(field, value)| (field.to_string(), value.to_string()))
                    .collect()
            })
        })
        .collect())
}

fn run_batch(
    input: &Path,
    config: Option<&Path>,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config)?;
    let pipeline: ScoringPipeline = config.build_pipeline()?;

    log::info!("Loading screening forms from: {}", input.display());
    let forms = read_forms(input)?;
    log::info!("Loaded {} forms", forms.len());

    let pb = create_progress_bar(forms.len() as u64, "Scoring");
    let results: Vec<_> = forms
        .par_iter()
        .map(|form| {
            let result = match form {
                Ok(raw) => pipeline.score(raw).map_err(|e| e.to_string()),
                Err(e) => Err(format!("Unreadable CSV row: {e}")),
            };
            pb.inc(1);
            result
        })
        .collect();
    pb.finish_and_clear();

    let mut writer = BufWriter::new(fs::File::create(output)?);
    let mut failures = 0usize;
    for (idx, result) in results.iter().enumerate() {
        let row = idx + 1;
        let line = match result {
            Ok(report) => serde_json::json!({ "row": row, "report": report }),
            Err(e) => {
                failures += 1;
                log::warn!("Row {row}: {e}");
                serde_json::json!({ "row": row, "error": e })
            }
        };
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;

    println!(
        "Scored {} of {} forms. Results saved to: {}",
        results.len() - failures,
        results.len(),
        output.display()
    );
    Ok(())
}

fn run_history(
    user: &str,
    latest: bool,
    config: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config)?;
    let log = RecordLog::new(&config.records.path);

    if latest {
        match log.latest(user)? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => println!("No analyses stored for user {user}."),
        }
        return Ok(());
    }

    let history = log.history(user)?;
    if history.is_empty() {
        println!("No analyses stored for user {user}.");
    } else {
        println!("{}", serde_json::to_string_pretty(&history)?);
    }
    Ok(())
}

fn run_classify(metric: &str, value: f64, diastolic: Option<f64>) {
    let reading = match diastolic {
        Some(diastolic) => Reading::Pair(value, diastolic),
        None => Reading::Scalar(value),
    };
    println!("{metric}: {}", classify(metric, reading));
}
