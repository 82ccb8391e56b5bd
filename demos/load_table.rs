/// Example: load generated records into a DynamoDB table
///
/// Reads the loader settings from `DYNAMO_BULK_*` variables and an optional
/// TOML file, creates the table when asked to, then writes (or deletes) the
/// records. Ctrl-C cancels the run, cutting any backoff wait short.
///
/// ```sh
/// AWS_PROFILE=localstack cargo run --example load_table -- loader.toml 500 --create
/// ```
use std::path::PathBuf;

use dynamo_bulk::config::load_config;
use dynamo_bulk::setup::TableDefinition;
use dynamo_bulk::{
    ColumnKind, DynamoStore, Engine, Error, Record, RecordSource, Schema, TracingProgress, Value,
    VecSource,
};
use tracing::{error, info};

/// Records `0..count` keyed by `key_column`, with a numeric and a text column
fn generated_source(key_column: &str, count: usize) -> VecSource {
    let schema = Schema::default()
        .with_column(key_column, ColumnKind::Text)
        .with_column("sequence", ColumnKind::Number)
        .with_column("note", ColumnKind::Text);

    let records = (0..count)
        .map(|i| {
            Record::new(vec![
                Some(Value::text(format!("item-{i:06}"))),
                Some(Value::number(i)),
                (i % 2 == 0).then(|| Value::text(format!("generated row {i}"))),
            ])
        })
        .collect();

    VecSource::new(schema, records)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dynamo_bulk=debug".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from);
    let count = args.next().and_then(|n| n.parse().ok()).unwrap_or(100);
    let create = args.any(|a| a == "--create");

    let config = load_config(config_path.as_deref())?;
    let key_spec = config.key_spec();
    let source = generated_source(&key_spec.hash.column, count);

    let store = DynamoStore::connect(&config.store).await;
    let engine = Engine::new(store, config.table.clone()).with_options(config.engine_options());

    let progress = TracingProgress::new();
    let token = progress.token().clone();
    let _ = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Cancellation requested");
            token.cancel();
        }
    });

    if create {
        let definition = TableDefinition::for_key_spec(&config.table, &key_spec, source.schema())?;
        let _ = engine.create_table(&definition, &progress).await?;
    }

    match engine
        .run(source, &key_spec, config.batch_size, config.operation, &progress)
        .await
    {
        Ok(summary) => info!("{summary}"),
        Err(e) if e.is_cancelled() => info!("Run cancelled"),
        Err(e) => {
            error!(error = %e, "Run failed");
            engine.close().await?;
            return Err(e);
        }
    }

    engine.close().await
}
