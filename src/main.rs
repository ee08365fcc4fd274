use clap::Parser;
use iso20022_gateway::application::gateway::{MessageGateway, PipelineOutcome};
use iso20022_gateway::config::GatewayConfig;
use iso20022_gateway::domain::ports::{AuditRepositoryRef, PublisherRef};
use iso20022_gateway::infrastructure::in_memory::InMemoryAuditRepository;
use iso20022_gateway::infrastructure::log_publisher::LogPublisher;
use iso20022_gateway::infrastructure::outbox_file::OutboxFilePublisher;
use iso20022_gateway::interfaces::csv::audit_writer::AuditWriter;
use iso20022_gateway::interfaces::json::request_reader::RequestReader;
use iso20022_gateway::telemetry;
use miette::{IntoDiagnostic, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input file with one `{"data_base64": ...}` request per line
    input: PathBuf,

    /// Gateway configuration (YAML). Built-in defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Append published messages as JSON lines to this file instead of logging them.
    #[arg(long)]
    outbox: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing(cli.json_logs)?;

    let config = match &cli.config {
        Some(path) => GatewayConfig::load_from_file(path)?,
        None => GatewayConfig::default(),
    };
    let config = Arc::new(config);

    let repository = open_repository(cli.db_path.as_ref())?;
    let publisher: PublisherRef = match &cli.outbox {
        Some(path) => Arc::new(OutboxFilePublisher::new(path)),
        None => Arc::new(LogPublisher),
    };

    let gateway = MessageGateway::new(config, repository.clone(), publisher)?;

    // Process requests
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = RequestReader::new(file);
    for request in reader.requests() {
        match request {
            Ok((line, raw)) => match gateway.process_request(&raw).await {
                Ok(PipelineOutcome::Dropped { reason }) => {
                    eprintln!("Line {line}: message dropped: {reason}");
                }
                Ok(_) => {}
                Err(e) => eprintln!("Error processing message on line {line}: {e}"),
            },
            Err(e) => eprintln!("Error reading request: {e}"),
        }
    }

    let report = gateway.drain_publishes().await;
    tracing::info!(
        delivered = report.delivered,
        failed = report.failed,
        "pending publishes drained"
    );

    // Output the audit trail
    let records = repository.all_records().await?;
    let mut versions = HashMap::new();
    for record in records.iter().filter(|r| !r.entry().invalid) {
        if let Some(latest) = repository.find_latest_by_message_id(record.message_id()).await? {
            versions.insert(record.entry().id, latest.version);
        }
    }

    let stdout = io::stdout();
    let mut writer = AuditWriter::new(stdout.lock());
    writer.write_records(&records, |record| {
        versions
            .get(&record.entry().id)
            .copied()
            .unwrap_or(record.entry().version)
    })?;

    Ok(())
}

#[cfg(feature = "storage-rocksdb")]
fn open_repository(db_path: Option<&PathBuf>) -> Result<AuditRepositoryRef> {
    use iso20022_gateway::infrastructure::rocksdb::RocksDbAuditRepository;

    let repository: AuditRepositoryRef = match db_path {
        Some(path) => Arc::new(RocksDbAuditRepository::open(path)?),
        None => Arc::new(InMemoryAuditRepository::new()),
    };
    Ok(repository)
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_repository(db_path: Option<&PathBuf>) -> Result<AuditRepositoryRef> {
    if db_path.is_some() {
        tracing::warn!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(Arc::new(InMemoryAuditRepository::new()))
}
