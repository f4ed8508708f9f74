use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::Level;

use request_contexts::errors::Result;
use request_contexts::factory::ContextFactory;
use request_contexts::registry::ContextRegistry;
use request_contexts::signals::Request;
use request_contexts::{EngineOptions, MemorySession, MemoryStore, Record, RequestSignals, VisibilityIndex};

/// Resolve the active contexts for a request fixture and, optionally, the
/// visibility of a table's records.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON fixture with `contexts`, `settings`, `request`, `session`, `options`, `records`.
    fixture: PathBuf,
    /// Report `isEnabled` for each record against this table
    #[arg(long)]
    table: Option<String>,
    /// More log output on stderr (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Fixture {
    #[serde(flatten)]
    store: MemoryStore,
    request: RequestSignals,
    session: MemorySession,
    options: EngineOptions,
    records: Vec<Record>,
}

fn run(args: &Args) -> Result<Value> {
    let raw = std::fs::read_to_string(&args.fixture)?;
    let mut fixture: Fixture = serde_json::from_str(&raw)?;

    let mut registry = ContextRegistry::load(&fixture.store, &ContextFactory::default())?;
    let mut request = Request::new(&fixture.request, &mut fixture.session);
    let active = registry.activate(&mut request)?.clone();

    let mut report = json!({
        "active": active
            .iter()
            .map(|c| json!({ "uid": c.uid(), "alias": c.alias(), "title": c.title() }))
            .collect::<Vec<_>>(),
    });

    if let Some(table) = &args.table {
        let index = VisibilityIndex::new(&active, &fixture.options, &fixture.store);
        let identity = fixture.options.identity_field(table);
        report["records"] = fixture
            .records
            .iter()
            .map(|r| {
                json!({
                    "id": r.get(identity).cloned().unwrap_or(Value::Null),
                    "enabled": index.is_enabled(table, r),
                })
            })
            .collect();
    }
    Ok(report)
}

fn main() {
    let args = Args::parse();

    let level = match args.verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(&args).and_then(|report| Ok(serde_json::to_string_pretty(&report)?)) {
        Ok(out) => println!("{out}"),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
