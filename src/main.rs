use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use visit_review::config::{self, ConfigLayer};
use visit_review::{output, pipeline, rules, telemetry};

/// Settings for `run`. Every flag overrides the config file and environment.
#[derive(clap::Args, Clone)]
struct RunArgs {
    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Folder holding the YYYYMMDD_restaurant visit folders (path or folder id)
    #[arg(long)]
    input_root: Option<String>,

    /// Where per-folder artifacts are written (path or folder id)
    #[arg(long)]
    output_root: Option<String>,

    /// Number of newest visit folders to process
    #[arg(long)]
    latest: Option<i64>,

    /// Last stage to run (1-4)
    #[arg(long)]
    stage: Option<i64>,

    /// Also write the artifacts of earlier stages
    #[arg(long, overrides_with = "no_write_intermediates")]
    write_intermediates: bool,

    /// Only write the last stage's artifacts
    #[arg(long, overrides_with = "write_intermediates")]
    no_write_intermediates: bool,

    /// Restaurant fixture JSON, used when no places API key is set
    #[arg(long)]
    places_data: Option<PathBuf>,

    /// Image-analysis fixture JSON, used when no vision API key is set
    #[arg(long)]
    vision_data: Option<PathBuf>,

    #[arg(long)]
    places_api_key: Option<String>,

    #[arg(long)]
    vision_api_key: Option<String>,

    #[arg(long)]
    vision_model: Option<String>,

    /// TOML file overriding prompt and template strings
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Storage backend: local or drive
    #[arg(long)]
    storage: Option<String>,

    #[arg(long)]
    drive_access_token: Option<String>,

    /// Ignore reviews older than this many days
    #[arg(long)]
    recent_review_days: Option<i64>,

    /// Debug-level logging (RUST_LOG still wins)
    #[arg(long, short)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,
}

impl RunArgs {
    fn layer(&self) -> ConfigLayer {
        let write_intermediates = if self.write_intermediates {
            Some(true)
        } else if self.no_write_intermediates {
            Some(false)
        } else {
            None
        };
        ConfigLayer {
            input_root: self.input_root.clone(),
            output_root: self.output_root.clone(),
            latest: self.latest,
            stage: self.stage,
            write_intermediates,
            places_data: self.places_data.clone(),
            vision_data: self.vision_data.clone(),
            places_api_key: self.places_api_key.clone(),
            vision_api_key: self.vision_api_key.clone(),
            vision_model: self.vision_model.clone(),
            prompt_file: self.prompt_file.clone(),
            storage: self.storage.clone(),
            drive_access_token: self.drive_access_token.clone(),
            recent_review_days: self.recent_review_days,
            request_timeout_secs: None,
        }
    }
}

#[derive(Parser)]
#[command(name = "visit-review")]
#[command(version)]
#[command(about = "Rule-checked review documents from restaurant visit photo folders")]
#[command(long_about = "\
Rule-checked review documents from restaurant visit photo folders

Each folder named YYYYMMDD_restaurant is one visit. The newest folders are
looked up, their photos analyzed, and a short HTML review is written and
checked against the content rules.

Input structure:

  photos/
  ├── 20260214_스시로쿠/            # Visit (date + restaurant name)
  │   ├── 001.jpg                  # Images, processed in name order
  │   ├── 002.png
  │   └── notes.txt                # Ignored
  └── misc/                        # Not YYYYMMDD_name → ignored

Output per visit (reviews/20260214_스시로쿠/):
  manifest.json, restaurant.json, vision.json   (stage artifacts)
  review.html, rules_report.json                (final document + checks)

Exit codes: 0 success, 1 a document failed the content rules, 2 error.

Run 'visit-review gen-config' to generate a documented config file.")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline: discover → restaurant → vision → compose
    Run(RunArgs),
    /// Check an existing review document against the content rules
    Validate {
        /// HTML document to check
        html_file: PathBuf,
        /// Number of recent reviews the document may refer to
        #[arg(long, default_value_t = 0)]
        recent_reviews: usize,
    },
    /// Print a stock config file with all options documented
    GenConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli.command) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}

fn execute(command: Command) -> Result<u8, Box<dyn std::error::Error>> {
    match command {
        Command::Run(args) => {
            let level = if args.verbose { Level::DEBUG } else { Level::INFO };
            telemetry::init_tracing(args.log_json, level);

            let env = ConfigLayer::from_env(|key| std::env::var(key).ok())?;
            let config = config::load_config(args.layer(), args.config.as_deref(), env)?;
            let report = pipeline::run_with_config(&config)?;
            output::print_run_report(&report);
            Ok(report.exit_code())
        }
        Command::Validate {
            html_file,
            recent_reviews,
        } => {
            let html = std::fs::read_to_string(&html_file)?;
            let report = rules::validate_html_document(&html, recent_reviews);
            output::print_rules_report(&report);
            Ok(if report.passed { 0 } else { 1 })
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            Ok(0)
        }
    }
}
