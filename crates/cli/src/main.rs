mod http;
mod logging;

use anyhow::{Result, anyhow, bail};
use civic_core::agency::AgencyRegistry;
use civic_core::db::DbSink;
use civic_core::fetch::{EmittedMeeting, MeetingSink};
use civic_core::pagination::Paginator;
use civic_core::runner::{ingest_all, utc_now};
use civic_core::schema::Meeting;
use clap::{Parser, Subcommand};
use schemars::schema_for;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "ompnet")]
#[command(about = "Meeting ingestion for OmpNetwork-hosted agencies", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured agencies
    Agencies {
        /// Agency table (.toml/.yaml); defaults to the built-in table
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Fetch every page for the selected agencies
    Crawl {
        #[arg(long)]
        config: Option<PathBuf>,
        /// Agency name; repeat to select several (default: all)
        #[arg(long = "agency")]
        agencies: Vec<String>,
        /// SQLite database to upsert meetings into
        #[arg(long)]
        db: Option<PathBuf>,
        /// JSON lines output file (stdout when neither --db nor --out is given)
        #[arg(long)]
        out: Option<PathBuf>,
        /// Per-request timeout in seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,
    },
    /// Map a saved API page without touching the network
    Parse {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        agency: String,
        #[arg(long)]
        file: PathBuf,
    },
    /// Export canonical JSON Schemas
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },
    /// Obsidian vault generation
    Vault {
        #[command(subcommand)]
        command: VaultCommands,
    },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Export JSON Schema files for canonical types
    Export {
        /// Output directory (default: ./schemas)
        #[arg(long, default_value = "schemas")]
        out_dir: PathBuf,
    },
}

#[derive(Subcommand)]
enum VaultCommands {
    /// Write meeting notes and indexes from the database
    Build {
        #[arg(long)]
        db: PathBuf,
        #[arg(long)]
        vault: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_json)?;

    match cli.command {
        Commands::Agencies { config } => list_agencies(config.as_deref()),
        Commands::Crawl {
            config,
            agencies,
            db,
            out,
            timeout_secs,
        } => {
            let registry = load_registry(config.as_deref())?;
            crawl(
                &registry,
                &agencies,
                db.as_deref(),
                out.as_deref(),
                Duration::from_secs(timeout_secs),
            )
            .await
        }
        Commands::Parse {
            config,
            agency,
            file,
        } => parse_file(config.as_deref(), &agency, &file),
        Commands::Schema { command } => match command {
            SchemaCommands::Export { out_dir } => schema_export(out_dir),
        },
        Commands::Vault { command } => match command {
            VaultCommands::Build { db, vault } => vault_build(&db, &vault),
        },
    }
}

fn load_registry(config: Option<&Path>) -> Result<AgencyRegistry> {
    match config {
        Some(path) => AgencyRegistry::load(path),
        None => Ok(AgencyRegistry::builtin()),
    }
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow!("path is not valid UTF-8: {}", path.display()))
}

fn list_agencies(config: Option<&Path>) -> Result<()> {
    let registry = load_registry(config)?;
    for agency in registry.iter() {
        println!(
            "{}\t{}\tsite={} category={}\t{}\tpage_size={}",
            agency.name,
            agency.agency,
            agency.site_id,
            agency.category_id,
            agency.classification,
            agency.page_size
        );
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonLine<'a> {
    agency: &'a str,
    #[serde(flatten)]
    meeting: &'a Meeting,
}

async fn crawl(
    registry: &AgencyRegistry,
    names: &[String],
    db: Option<&Path>,
    out: Option<&Path>,
    timeout: Duration,
) -> Result<()> {
    let agencies = registry.select(names)?;
    info!(agencies = agencies.len(), "starting crawl");

    let conn = db.map(|path| civic_core::db::open(path_str(path)?)).transpose()?;
    let mut writer: Box<dyn Write> = match out {
        Some(path) => Box::new(BufWriter::new(File::create(path)?)),
        None => Box::new(BufWriter::new(io::stdout())),
    };
    let write_lines = out.is_some() || conn.is_none();

    let fetcher = Arc::new(http::HttpFetcher::new(timeout)?);
    let (tx, mut rx) = mpsc::unbounded_channel::<EmittedMeeting>();
    let workers = tokio::spawn(ingest_all(fetcher, agencies, utc_now(), tx));

    let mut sink = conn.as_ref().map(DbSink::new);
    let lines: Option<&mut dyn Write> = if write_lines {
        Some(&mut writer)
    } else {
        None
    };
    let drained = drain_emitted(
        &mut rx,
        sink.as_mut().map(|sink| sink as &mut dyn MeetingSink),
        lines,
    )
    .await;
    writer.flush()?;

    let results = workers.await?;
    let mut failed = 0usize;
    for (name, result) in &results {
        let store_failures = drained.store_failures.get(name).copied().unwrap_or(0);
        match result {
            Ok(report) if store_failures == 0 => info!(
                agency = %name,
                pages = report.pages,
                meetings = report.meetings,
                completed = report.completed(),
                "agency done"
            ),
            Ok(report) => {
                failed += 1;
                error!(
                    agency = %name,
                    meetings = report.meetings,
                    store_failures,
                    "agency failed: meetings not stored"
                );
            }
            Err(err) => {
                failed += 1;
                error!(agency = %name, error = %error_chain(err), "agency failed");
            }
        }
    }
    info!(meetings = drained.stored, failed, "crawl finished");

    if failed > 0 {
        bail!("{failed} of {} agencies failed", results.len());
    }
    Ok(())
}

#[derive(Debug, Default)]
struct Drained {
    stored: usize,
    store_failures: BTreeMap<String, usize>,
}

/// Consumes emitted meetings until every worker has hung up. A storage
/// failure is charged to its agency and never stops the drain.
async fn drain_emitted(
    rx: &mut mpsc::UnboundedReceiver<EmittedMeeting>,
    mut sink: Option<&mut dyn MeetingSink>,
    mut lines: Option<&mut dyn Write>,
) -> Drained {
    let mut drained = Drained::default();
    while let Some(EmittedMeeting { agency, meeting }) = rx.recv().await {
        let id = meeting.id.clone();
        let mut ok = true;
        if let Some(out) = lines.as_deref_mut() {
            if let Err(err) = write_line(out, &agency, &meeting) {
                error!(agency = %agency, meeting_id = %id, error = %err, "writing meeting failed");
                ok = false;
            }
        }
        if let Some(sink) = sink.as_deref_mut() {
            if let Err(err) = sink.emit(&agency, meeting) {
                error!(
                    agency = %agency,
                    meeting_id = %id,
                    error = %error_chain(&*err),
                    "storing meeting failed"
                );
                ok = false;
            }
        }
        if ok {
            drained.stored += 1;
        } else {
            *drained.store_failures.entry(agency).or_insert(0) += 1;
        }
    }
    drained
}

fn write_line(out: &mut dyn Write, agency: &str, meeting: &Meeting) -> Result<()> {
    serde_json::to_writer(&mut *out, &JsonLine { agency, meeting })?;
    writeln!(out)?;
    Ok(())
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[derive(Serialize)]
struct ParsedPage<'a> {
    meetings: &'a [Meeting],
    skipped: usize,
    cursor: &'a civic_core::pagination::Cursor,
}

fn parse_file(config: Option<&Path>, name: &str, file: &Path) -> Result<()> {
    let registry = load_registry(config)?;
    let agency = registry
        .get(name)
        .ok_or_else(|| anyhow!("unknown agency: {name}"))?;
    let body = fs::read_to_string(file)?;

    let page = Paginator::new(agency).parse_page(&file.display().to_string(), &body, utc_now())?;
    let out = ParsedPage {
        meetings: &page.meetings,
        skipped: page.skipped,
        cursor: &page.cursor,
    };
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn schema_export(out_dir: PathBuf) -> Result<()> {
    fs::create_dir_all(&out_dir)?;

    // Export Meeting schema
    let meeting_schema = schema_for!(civic_core::schema::Meeting);
    let meeting_json = serde_json::to_string_pretty(&meeting_schema)?;
    fs::write(out_dir.join("Meeting.schema.json"), meeting_json)?;

    // Export Link schema
    let link_schema = schema_for!(civic_core::schema::Link);
    let link_json = serde_json::to_string_pretty(&link_schema)?;
    fs::write(out_dir.join("Link.schema.json"), link_json)?;

    // Export Location schema
    let location_schema = schema_for!(civic_core::schema::Location);
    let location_json = serde_json::to_string_pretty(&location_schema)?;
    fs::write(out_dir.join("Location.schema.json"), location_json)?;

    println!("Exported schemas to {}", out_dir.display());
    Ok(())
}

fn vault_build(db: &Path, vault: &Path) -> Result<()> {
    let conn = civic_core::db::open(path_str(db)?)?;
    let summary = obsidian::build_vault(&conn, vault)?;
    println!(
        "Wrote {} meetings across {} agencies to {}",
        summary.meetings,
        summary.agencies,
        vault.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn crawl_accepts_repeated_agencies() {
        let cli = Cli::parse_from([
            "ompnet",
            "crawl",
            "--agency",
            "colgo_dalles_city_council",
            "--agency",
            "colgo_dalles_urban_renewal",
            "--db",
            "meetings.db",
        ]);
        match cli.command {
            Commands::Crawl { agencies, db, out, .. } => {
                assert_eq!(agencies.len(), 2);
                assert_eq!(db, Some(PathBuf::from("meetings.db")));
                assert!(out.is_none());
            }
            _ => panic!("expected crawl"),
        }
    }

    #[test]
    fn error_chain_joins_sources() {
        let err = civic_core::IngestError::Fetch {
            url: "https://example.org/page".to_string(),
            source: "connection reset".into(),
        };
        assert_eq!(
            error_chain(&err),
            "fetch failed for https://example.org/page: connection reset"
        );
    }

    fn council_meeting(agency: &civic_core::agency::AgencyConfig, title: &str) -> Meeting {
        let record = civic_core::ompnetwork::RawRecord {
            title: Some(title.to_string()),
            date: Some(1768239000),
            ..Default::default()
        };
        Paginator::new(agency).map_record(&record, utc_now())
    }

    #[tokio::test]
    async fn storage_failures_are_charged_per_agency_and_drain_continues() {
        let registry = AgencyRegistry::builtin();
        let council = registry.get("colgo_dalles_city_council").unwrap();
        let renewal = registry.get("colgo_dalles_urban_renewal").unwrap();

        let conn = civic_core::db::open_in_memory().unwrap();
        conn.execute_batch("DROP TABLE meetings").unwrap();
        let mut sink = DbSink::new(&conn);

        let (tx, mut rx) = mpsc::unbounded_channel();
        for (agency, title) in [
            (council, "City Council Meeting"),
            (renewal, "Urban Renewal Board"),
            (council, "Work Session"),
        ] {
            tx.send(EmittedMeeting {
                agency: agency.name.clone(),
                meeting: council_meeting(agency, title),
            })
            .unwrap();
        }
        drop(tx);

        let mut out = Vec::new();
        let drained = drain_emitted(&mut rx, Some(&mut sink), Some(&mut out)).await;

        assert_eq!(drained.stored, 0);
        assert_eq!(drained.store_failures.get("colgo_dalles_city_council"), Some(&2));
        assert_eq!(drained.store_failures.get("colgo_dalles_urban_renewal"), Some(&1));
        // JSON lines are still written for every meeting.
        assert_eq!(String::from_utf8(out).unwrap().lines().count(), 3);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn drain_stores_through_the_database_sink() {
        let registry = AgencyRegistry::builtin();
        let council = registry.get("colgo_dalles_city_council").unwrap();
        let conn = civic_core::db::open_in_memory().unwrap();
        let mut sink = DbSink::new(&conn);

        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.send(EmittedMeeting {
            agency: council.name.clone(),
            meeting: council_meeting(council, "City Council Meeting"),
        })
        .unwrap();
        drop(tx);

        let drained = drain_emitted(&mut rx, Some(&mut sink), None).await;
        assert_eq!(drained.stored, 1);
        assert!(drained.store_failures.is_empty());
        let rows = civic_core::db::list_meetings(&conn).unwrap();
        assert_eq!(rows[0].agency, "colgo_dalles_city_council");
    }

    #[test]
    fn json_line_flattens_meeting() {
        let agency = AgencyRegistry::builtin()
            .get("colgo_dalles_city_council")
            .cloned()
            .unwrap();
        let meeting = Paginator::new(&agency).map_record(&Default::default(), utc_now());
        let line = serde_json::to_value(JsonLine {
            agency: &agency.name,
            meeting: &meeting,
        })
        .unwrap();
        assert_eq!(line["agency"], "colgo_dalles_city_council");
        assert_eq!(line["title"], "The Dalles City Council");
        assert_eq!(line["classification"], "City Council");
    }
}
