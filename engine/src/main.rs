//! Integrator CLI - Run execution plans against file-backed integrations
//!
//! # Commands
//!
//! ```bash
//! integrator run plan.json --source grades.csv --target transcript.json
//! integrator validate plan.json
//! integrator convert --value '"1 200,5"' --schema '{"type": "number"}' \
//!     --from '{"type": "string"}'
//! ```
//!
//! Integrations are fixtures of the in-memory integration: JSON documents
//! (`recordTypes` with `properties` and `rows`) or CSV files imported into a
//! single table.

use clap::{Parser, Subcommand};
use integrator::integration::csv::import_file;
use integrator::types::infer_type;
use integrator::{DataType, EngineConfig, Execution, Graph, MemoryIntegration, TypedValue, Value};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "integrator")]
#[command(about = "Run data integration plans between record stores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an execution plan
    Run {
        /// Execution plan (JSON)
        plan: PathBuf,

        /// Source fixture (JSON or CSV)
        #[arg(short, long)]
        source: PathBuf,

        /// Target fixture (JSON or CSV)
        #[arg(short, long)]
        target: PathBuf,

        /// Table name for a CSV source (default: file stem)
        #[arg(long)]
        source_record_type: Option<String>,

        /// Table name for a CSV target (default: file stem)
        #[arg(long)]
        target_record_type: Option<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check an execution plan without running it
    Validate {
        /// Execution plan (JSON)
        plan: PathBuf,
    },

    /// Convert a JSON value to the type described by a JSON schema
    Convert {
        /// Value to convert (JSON)
        #[arg(long)]
        value: String,

        /// Target type (JSON schema)
        #[arg(long)]
        schema: String,

        /// Source type (JSON schema, inferred from the value if omitted)
        #[arg(long)]
        from: Option<String>,
    },
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            plan,
            source,
            target,
            source_record_type,
            target_record_type,
            output,
        } => cmd_run(
            &config,
            &plan,
            &source,
            &target,
            source_record_type.as_deref(),
            target_record_type.as_deref(),
            output.as_deref(),
        ),

        Commands::Validate { plan } => cmd_validate(&plan),

        Commands::Convert { value, schema, from } => {
            cmd_convert(&config, &value, &schema, from.as_deref())
        }
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn load_integration(
    config: &EngineConfig,
    path: &Path,
    record_type: Option<&str>,
) -> Result<MemoryIntegration, Box<dyn std::error::Error>> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    if !is_csv {
        return Ok(MemoryIntegration::from_fixture_str(&fs::read_to_string(path)?)?);
    }

    let record_type = match record_type {
        Some(name) => name.to_string(),
        None => path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("records")
            .to_string(),
    };

    let mut integration =
        MemoryIntegration::new(config.default_locale.clone(), config.default_time_zone.clone());
    let import = import_file(&mut integration, &record_type, path)?;
    eprintln!("📄 Imported {}: {} rows into '{}'", path.display(), import.rows, record_type);
    eprintln!("   Encoding: {}", import.encoding);
    eprintln!("   Delimiter: '{}'", format_delimiter(import.delimiter));
    eprintln!("   Columns: {}", import.headers.join(", "));
    Ok(integration)
}

fn cmd_run(
    config: &EngineConfig,
    plan: &Path,
    source_path: &Path,
    target_path: &Path,
    source_record_type: Option<&str>,
    target_record_type: Option<&str>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("⚙️  Running plan: {}", plan.display());

    let plan = fs::read_to_string(plan)?;
    let mut source = load_integration(config, source_path, source_record_type)?;
    let mut target = load_integration(config, target_path, target_record_type)?;

    let mut execution =
        Execution::from_plan(Some(&plan), &mut source, &mut target)?.with_config(config);
    let result = execution.run(None);
    let log = execution.log().clone();
    let nodes = execution.graph().len();
    drop(execution);

    for entry in log.problems() {
        eprintln!("   ⚠️  {}", entry.message);
    }
    result?;
    eprintln!("   Nodes: {}", nodes);

    let report = json!({
        "source": source.to_fixture(),
        "target": target.to_fixture(),
        "log": log,
    });
    write_output(&serde_json::to_string_pretty(&report)?, output)?;

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_validate(plan: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Validating: {}", plan.display());

    let content = fs::read_to_string(plan)?;
    let graph = Graph::parse(Some(&content))?;

    eprintln!("   ✅ Valid plan with {} operations", graph.len().saturating_sub(1));
    Ok(())
}

fn cmd_convert(
    config: &EngineConfig,
    value: &str,
    schema: &str,
    from: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let value: Value = serde_json::from_str(value)?;
    let target = DataType::from_schema(
        &serde_json::from_str(schema)?,
        &config.default_locale,
        &config.default_time_zone,
    )?;
    let source = match from {
        Some(doc) => DataType::from_schema(
            &serde_json::from_str(doc)?,
            &config.default_locale,
            &config.default_time_zone,
        )?,
        None => infer_type(&value),
    };

    let converted = TypedValue::converted(value, source, &target)?;
    println!("{}", serde_json::to_string(converted.value())?);
    Ok(())
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
