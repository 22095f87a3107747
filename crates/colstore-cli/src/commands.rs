use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use colstore::{
    ClientConfig, CollectionStore, Direction, DocumentClient, DocumentId, Emission, Fields,
    FilterOp, InMemoryDocumentService, Query, Record, StoreOptions,
};
use serde_json::Value;
use tracing::debug;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref())?;
    match cli.command {
        Command::Config => cmd_config(&config),
        Command::Watch(args) => {
            let client = build_client(config, cli.seed.as_deref())?;
            cmd_watch(&client, args, cli.format)
        }
        Command::Send(args) => {
            let client = build_client(config, cli.seed.as_deref())?;
            cmd_send(&client, args, cli.format).await
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ClientConfig> {
    match path {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(ClientConfig::default()),
    }
}

fn load_service(seed: Option<&Path>) -> anyhow::Result<InMemoryDocumentService> {
    let Some(path) = seed else {
        return Ok(InMemoryDocumentService::new());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading seed {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("parsing seed {}", path.display()))?;
    Ok(InMemoryDocumentService::from_seed(&value)?)
}

fn build_client(config: ClientConfig, seed: Option<&Path>) -> anyhow::Result<DocumentClient> {
    let service = load_service(seed)?;
    Ok(DocumentClient::new(config, Arc::new(service))?)
}

/// Parse `FIELD=VALUE`. VALUE is read as JSON when it parses, otherwise as a
/// plain string.
fn parse_filter(raw: &str) -> anyhow::Result<(String, Value)> {
    let Some((field, value)) = raw.split_once('=') else {
        bail!("filter {raw:?} must look like FIELD=VALUE");
    };
    if field.is_empty() {
        bail!("filter {raw:?} has an empty field name");
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((field.to_string(), value))
}

fn shaper(args: &ShapeArgs) -> anyhow::Result<impl FnOnce(Query) -> Query> {
    let filters = args
        .filters
        .iter()
        .map(|raw| parse_filter(raw))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let order_by = args.order_by.clone();
    let direction = if args.desc {
        Direction::Descending
    } else {
        Direction::Ascending
    };
    let limit = args.limit;

    Ok(move |mut query: Query| {
        for (field, value) in filters {
            query = query.filter(field, FilterOp::Equal, value);
        }
        if let Some(field) = order_by {
            query = query.order_by(field, direction);
        }
        if let Some(n) = limit {
            query = query.limit(n);
        }
        query
    })
}

fn render(records: &[Record], format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => {
            let values: Vec<Value> = records.iter().cloned().map(Record::into_value).collect();
            Value::Array(values).to_string()
        }
        OutputFormat::Text => {
            if records.is_empty() {
                return format!("  {}", "(empty)".dimmed());
            }
            records
                .iter()
                .map(|r| {
                    let mut fields = r.fields().clone();
                    fields.remove(colstore::ID_FIELD);
                    format!(
                        "  {} {}",
                        r.id().unwrap_or("<no id>").yellow().bold(),
                        Value::Object(fields)
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
    }
}

fn open_watch(client: &DocumentClient, args: &WatchArgs) -> anyhow::Result<CollectionStore> {
    let options = StoreOptions {
        emission: if args.incremental {
            Emission::Incremental
        } else {
            Emission::Batched
        },
    };
    let store =
        CollectionStore::with_options(client, &args.collection, shaper(&args.shape)?, options)?;
    debug!(collection = %args.collection, query = ?store.query(), "watching");
    Ok(store)
}

fn cmd_watch(client: &DocumentClient, args: WatchArgs, format: OutputFormat) -> anyhow::Result<()> {
    let store = open_watch(client, &args)?;
    if format == OutputFormat::Text {
        println!("Watching {}", args.collection.bold());
    }

    let published = Arc::new(AtomicUsize::new(0));
    let unsubscribe = store.subscribe(move |list| {
        let n = published.fetch_add(1, Ordering::Relaxed);
        match format {
            OutputFormat::Json => println!("{}", render(list, format)),
            OutputFormat::Text => {
                println!("{} {} document(s)", format!("#{n}").cyan(), list.len());
                println!("{}", render(list, format));
            }
        }
    });

    if let Some(err) = store.state().get().error() {
        eprintln!("{} {err}", "error:".red().bold());
    }
    unsubscribe.unsubscribe();
    store.dispose();
    Ok(())
}

/// Write one document through a store and return the id and the list the
/// store holds afterwards.
async fn send(client: &DocumentClient, args: &SendArgs) -> anyhow::Result<(DocumentId, Vec<Record>)> {
    let fields: Fields = match serde_json::from_str(&args.data).context("parsing document data")? {
        Value::Object(map) => map,
        other => bail!("document data must be a JSON object, got {other}"),
    };
    let store = CollectionStore::with_query(client, &args.collection, shaper(&args.shape)?)?;
    let id = store.send(fields, args.id.as_deref()).await?;
    let list = store.get();
    debug!(collection = %args.collection, id = %id, documents = list.len(), "sent");
    store.dispose();
    Ok((id, list))
}

async fn cmd_send(client: &DocumentClient, args: SendArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (id, list) = send(client, &args).await?;
    match format {
        OutputFormat::Json => println!("{}", render(&list, format)),
        OutputFormat::Text => {
            println!(
                "{} Wrote {}/{}",
                "✓".green().bold(),
                args.collection.bold(),
                id.as_str().yellow()
            );
            println!("{}", render(&list, format));
        }
    }
    Ok(())
}

fn cmd_config(config: &ClientConfig) -> anyhow::Result<()> {
    let mut shown = config.clone();
    if shown.api_key.is_some() {
        shown.api_key = Some("<redacted>".into());
    }
    print!("{}", shown.to_toml_string()?);
    Ok(())
}
