mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::AppConfig;
use folio::{
    group_by_company, CollectionKind, Dashboard, Fields, OrderedEntity, RowId, Value,
};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "folio-admin")]
#[command(about = "Manage the ordered portfolio collections (skills, experiences, education, certificates)")]
struct Cli {
    /// YAML settings file
    #[arg(long, global = true, env = "FOLIO_CONFIG")]
    config: Option<PathBuf>,
    /// Work against an empty in-memory store instead of Supabase
    #[arg(long, global = true, default_value_t = false)]
    memory: bool,
    /// Supabase project URL (overrides file and environment)
    #[arg(long, global = true)]
    url: Option<String>,
    /// Supabase API key (overrides file and environment)
    #[arg(long, global = true)]
    api_key: Option<String>,
    /// Per-request timeout in seconds, 0 to wait indefinitely
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    /// Print rows as JSON
    #[arg(long, global = true, default_value_t = false)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Row counts of every collection
    Overview,
    /// Rows of one collection in display order
    List {
        collection: CollectionKind,
        /// Group certificates by issuing company
        #[arg(long, default_value_t = false)]
        grouped: bool,
    },
    /// Append a row
    Add {
        collection: CollectionKind,
        /// `name=value`; values that parse as JSON are sent typed
        #[arg(short, long = "field", value_parser = parse_field, required = true)]
        fields: Vec<(String, Value)>,
    },
    /// Change fields of a row
    Edit {
        collection: CollectionKind,
        id: RowId,
        #[arg(short, long = "field", value_parser = parse_field, required = true)]
        fields: Vec<(String, Value)>,
    },
    /// Delete a row
    Remove { collection: CollectionKind, id: RowId },
    /// Move the row at index FROM to index TO
    Move {
        collection: CollectionKind,
        from: usize,
        to: usize,
    },
    /// Move row ACTIVE into the slot held by row OVER
    Drag {
        collection: CollectionKind,
        active: RowId,
        over: RowId,
    },
}

fn parse_field(raw: &str) -> std::result::Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing field name in '{}'", raw));
    }

    let value = match serde_json::from_str::<serde_json::Value>(value) {
        Ok(json) if !json.is_string() => Value::from(json),
        _ => Value::from(value),
    };
    Ok((name.to_string(), value))
}

/// Run `$body` with `$store` bound to the store of `$kind`.
macro_rules! with_store {
    ($dashboard:expr, $kind:expr, |$store:ident| $body:expr) => {
        match $kind {
            CollectionKind::Skills => {
                let $store = &$dashboard.skills;
                $body
            }
            CollectionKind::Experiences => {
                let $store = &$dashboard.experiences;
                $body
            }
            CollectionKind::Education => {
                let $store = &$dashboard.education;
                $body
            }
            CollectionKind::Certificates => {
                let $store = &$dashboard.certificates;
                $body
            }
        }
    };
}

#[tokio::main]
async fn main() -> Result<()> {
    // Default to INFO level, can be overridden with RUST_LOG env var
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    run(cli).await
}

fn build_dashboard(cli: &Cli) -> Result<Dashboard> {
    let mut config = AppConfig::load(cli.config.as_deref())?;

    if let Some(url) = &cli.url {
        config.supabase.url = url.clone();
    }
    if let Some(key) = &cli.api_key {
        config.supabase.api_key = key.clone();
    }
    if let Some(secs) = cli.timeout_secs {
        config.store.request_timeout_secs = (secs > 0).then_some(secs);
    }

    if cli.memory {
        info!("using in-memory store");
        return Ok(Dashboard::in_memory(config.store));
    }
    folio_supabase::dashboard(&config.supabase, config.store)
        .context("Failed to set up the Supabase gateway")
}

async fn run(cli: Cli) -> Result<()> {
    let dashboard = build_dashboard(&cli)?;
    let json = cli.json;

    match cli.command {
        Command::Overview => {
            for (kind, err) in dashboard.load_all().await {
                warn!(collection = %kind, error = %err, "could not load collection");
            }
            let overview = dashboard.overview();
            if json {
                println!("{}", serde_json::to_string_pretty(&overview)?);
            } else {
                for kind in CollectionKind::ALL {
                    println!("{:<13}{}", kind, overview.count(kind));
                }
            }
        }
        Command::List {
            collection: CollectionKind::Certificates,
            grouped: true,
        } => {
            dashboard.certificates.load().await?;
            let groups = group_by_company(&dashboard.certificates.items());
            if json {
                println!("{}", serde_json::to_string_pretty(&groups)?);
            } else {
                for (company, certificates) in groups {
                    println!("{}", company);
                    print_rows(&certificates, false, "  ")?;
                }
            }
        }
        Command::List { collection, .. } => with_store!(dashboard, collection, |store| {
            store.load().await?;
            print_rows(&store.items(), json, "")?;
        }),
        Command::Add { collection, fields } => with_store!(dashboard, collection, |store| {
            store.load().await?;
            let row = store.create(to_fields(fields)).await?;
            println!("created {} row {} at position {}", collection, row.id(), row.position());
        }),
        Command::Edit {
            collection,
            id,
            fields,
        } => with_store!(dashboard, collection, |store| {
            store.load().await?;
            store.edit(id, to_fields(fields)).await?;
            println!("updated {} row {}", collection, id);
        }),
        Command::Remove { collection, id } => with_store!(dashboard, collection, |store| {
            store.load().await?;
            store.remove(id).await?;
            println!("removed {} row {}", collection, id);
        }),
        Command::Move {
            collection,
            from,
            to,
        } => with_store!(dashboard, collection, |store| {
            store.load().await?;
            store.reorder(from, to).await?;
            print_rows(&store.items(), json, "")?;
        }),
        Command::Drag {
            collection,
            active,
            over,
        } => with_store!(dashboard, collection, |store| {
            store.load().await?;
            store.reorder_by_id(active, over).await?;
            print_rows(&store.items(), json, "")?;
        }),
    }

    Ok(())
}

fn to_fields(pairs: Vec<(String, Value)>) -> Fields {
    pairs.into_iter().collect()
}

fn print_rows<T: OrderedEntity + Serialize>(rows: &[T], json: bool, indent: &str) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
        return Ok(());
    }

    for row in rows {
        let label = match Value::from(serde_json::to_value(row)?) {
            Value::Object(columns) => ["name", "title"]
                .iter()
                .find_map(|key| columns.get(*key).and_then(Value::as_string))
                .map(str::to_string)
                .unwrap_or_default(),
            _ => String::new(),
        };
        println!("{}{:>3}  #{:<5} {}", indent, row.position(), row.id(), label);
    }
    Ok(())
}
