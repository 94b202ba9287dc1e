use anyhow::{Context, Result};
use band_migrate::{
    open_database, write_model, CsvRecordSource, DataModel, MigrationConfig,
    MigrationReport,
};
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Migrate the legacy band database into the relational store
#[derive(Debug, Parser)]
#[command(name = "band-migrate", version, about)]
struct Cli {
    /// Data formats file (gazetteer, column mappings, report settings)
    #[arg(long, default_value = "data_formats.json")]
    config: PathBuf,

    /// Directory holding bands.csv, pending_bands.csv and connections.csv
    #[arg(long, default_value = ".")]
    input_dir: PathBuf,

    /// SQLite database to write
    #[arg(long, default_value = "bands.db")]
    output: PathBuf,

    /// Where to write the JSON report
    #[arg(long, default_value = "migration_report.json")]
    report: PathBuf,

    /// Write the report without truncating long lists
    #[arg(long)]
    full_report: bool,

    /// -v for debug, -vv for trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "band_migrate=info",
        1 => "band_migrate=debug",
        _ => "band_migrate=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    println!("🎸 Band Migrate - legacy CSV → SQLite");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load configuration
    println!("\n⚙️  Loading data formats...");
    let raw = fs::read(&cli.config)
        .with_context(|| format!("Failed to read data formats file: {:?}", cli.config))?;
    let config = MigrationConfig::from_slice(&raw)?;
    println!(
        "✓ Gazetteer: {} countries, {} states, {} cities",
        config.gazetteer.countries().len(),
        config.gazetteer.states().len(),
        config.gazetteer.cities().len()
    );

    let report = MigrationReport::new(config.report).with_config_digest(&raw);
    let mut model = DataModel::with_report(config, report);

    // 2. Read every legacy table, then ingest in order
    println!("\n📂 Reading legacy tables...");
    let tables = CsvRecordSource::new(&cli.input_dir).read_all(model.config())?;
    for (table, records) in tables {
        println!("✓ {}: {} records", table.name(), records.len());
        model.add_from_table(table, records);
    }

    // 3. Write the destination store
    println!("\n💾 Writing {:?}...", cli.output);
    let mut conn = open_database(&cli.output)?;
    let summary = write_model(&mut conn, &mut model)?;
    println!("✓ Bands: {}", summary.bands);
    println!("✓ People: {}", summary.people);
    println!(
        "✓ Locations: {} countries, {} states, {} cities",
        summary.countries, summary.states, summary.cities
    );
    println!("✓ Websites: {}", summary.info_sources);
    println!("✓ Connections: {}", summary.connections);

    // 4. Report
    println!("\n📊 Writing report...");
    let finalized = model
        .finalize_report()
        .context("Failed to build migration report")?;
    let settings = model.report.settings();
    let view = if cli.full_report {
        finalized.value().clone()
    } else {
        finalized.truncated(settings.max_entries, settings.truncate_depth)
    };
    let json = serde_json::to_string_pretty(&view).context("Failed to serialize report")?;
    fs::write(&cli.report, json)
        .with_context(|| format!("Failed to write report: {:?}", cli.report))?;
    println!("✓ Report written to {:?}", cli.report);

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Migration complete (run {})", model.report.run.id);

    Ok(())
}
