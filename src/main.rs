use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use loanlake::config::LakeConfig;
use loanlake::landing::upload_to_landing;
use loanlake::logger::{init_tracing, RunLogger};
use loanlake::pipeline::{PipelineResult, Sequencer, StageId};
use loanlake::quality::QualityKind;
use loanlake::snapshot::SqliteSnapshot;
use loanlake::store::{codec, PartitionStore};
use loanlake::{ArrivalKey, LakeResult};

#[derive(Debug, Parser)]
#[command(name = "loanlake")]
#[command(about = "Move loan and customer records through the lake and train the campaign model")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Copy a source file into the landing layer
    Upload { file: PathBuf },
    /// Replace the customer snapshot table with the rows of a CSV file
    SeedSnapshot { csv: PathBuf },
    /// Landing files and the customer snapshot into raw
    Ingest { arrival_key: String },
    /// Check the raw datasets and write validation reports
    Validate { arrival_key: String },
    /// Validate, then clean raw into cleaned
    Prepare { arrival_key: String },
    /// Derive aggregated features from cleaned
    Derive { arrival_key: String },
    /// Register the feature view and sample retrieval
    Features { arrival_key: String },
    /// Train and save the campaign classifier
    Train { arrival_key: String },
    /// Run every stage; the arrival key defaults to today
    Run { arrival_key: Option<String> },
}

impl Command {
    fn job(&self) -> &'static str {
        match self {
            Command::Upload { .. } => "upload",
            Command::SeedSnapshot { .. } => "seed-snapshot",
            Command::Ingest { .. } => "ingest",
            Command::Validate { .. } => "validate",
            Command::Prepare { .. } => "prepare",
            Command::Derive { .. } => "derive",
            Command::Features { .. } => "features",
            Command::Train { .. } => "train",
            Command::Run { .. } => "run",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> LakeResult<bool> {
    let config = LakeConfig::from_env()?;
    config.validate()?;
    let job = cli.command.job();
    let _guard = init_tracing(&config.log_dir, job)?;
    tracing::info!(job, lake_root = %config.lake_root.display(), "Starting command");

    let (stages, key): (Vec<StageId>, String) = match cli.command {
        Command::Upload { file } => {
            let landing = PartitionStore::new(&config.lake_root).landing_dir();
            let target = upload_to_landing(&file, &landing)?;
            println!("Uploaded {} to {}", file.display(), target.display());
            return Ok(true);
        }
        Command::SeedSnapshot { csv } => {
            let table = codec::read_csv(&csv)?;
            let rows = SqliteSnapshot::new(&config.snapshot_db)
                .replace_table(&config.snapshot_table, &table)?;
            println!(
                "Loaded {} row(s) into {} ({})",
                rows,
                config.snapshot_table,
                config.snapshot_db.display()
            );
            return Ok(true);
        }
        Command::Ingest { arrival_key } => (vec![StageId::Ingest], arrival_key),
        Command::Validate { arrival_key } => (vec![StageId::Validate], arrival_key),
        Command::Prepare { arrival_key } => (vec![StageId::Validate, StageId::Clean], arrival_key),
        Command::Derive { arrival_key } => (vec![StageId::Derive], arrival_key),
        Command::Features { arrival_key } => (vec![StageId::RegisterFeatures], arrival_key),
        Command::Train { arrival_key } => (vec![StageId::Train], arrival_key),
        Command::Run { arrival_key } => (
            StageId::ALL.to_vec(),
            arrival_key.unwrap_or_else(|| ArrivalKey::today().to_string()),
        ),
    };

    let key = ArrivalKey::parse(&key)?;
    let sequencer = Sequencer::local(config);
    let result = sequencer.run(job, &stages, key.clone(), RunLogger::new(job))?;
    print_summary(&result, &key);
    Ok(result.success)
}

fn print_summary(result: &PipelineResult, key: &ArrivalKey) {
    let status = if result.success { "succeeded" } else { "FAILED" };
    println!(
        "{} {} for arrival key {} in {:.2}s",
        result.pipeline_name,
        status,
        key,
        result.total_duration.as_secs_f64()
    );
    for stage in &result.stage_results {
        let outcome = if stage.skipped {
            "skipped"
        } else if stage.success {
            "ok"
        } else {
            "failed"
        };
        println!(
            "  {:<18} {:<8} {:.2}s",
            stage.stage_name,
            outcome,
            stage.duration.as_secs_f64()
        );
    }
    if let Some(error) = &result.error {
        println!("  error: {}", error);
    }

    let quality = &result.quality;
    println!(
        "  data quality warnings: {} ({} row(s) removed)",
        quality.count(QualityKind::DataQualityWarning),
        quality.rows_affected(QualityKind::DataQualityWarning)
    );
    println!(
        "  encoding gaps: {} ({} value(s) nulled)",
        quality.count(QualityKind::EncodingGapWarning),
        quality.rows_affected(QualityKind::EncodingGapWarning)
    );
    for event in quality.events() {
        println!(
            "    [{}] {} {} {}{}: {}",
            event.stage,
            event.dataset,
            event.kind,
            event.rule,
            event
                .column
                .as_deref()
                .map(|c| format!(" ({})", c))
                .unwrap_or_default(),
            event.rows_affected
        );
    }
}
