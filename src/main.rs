use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use bsatn_client::{
    create_identity, ClientError, Compression, ConnectionConfig, ConnectionDelegate,
    ConnectionId, DbConnectionBuilder, Identity, QueryId, ReducerEvent, TableRow,
};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "bsatn-watch")]
#[command(about = "Watch a BSATN database: subscribe, call reducers and run one-off queries", long_about = None)]
struct Args {
    /// Server address (defaults to BSATN_URI or http://localhost:3000)
    #[arg(long)]
    uri: Option<String>,

    /// Database name or address (defaults to BSATN_DATABASE)
    #[arg(short, long)]
    database: Option<String>,

    /// Bearer token (defaults to BSATN_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Request a fresh identity from the server before connecting
    #[arg(long)]
    new_identity: bool,

    /// Frame compression: none or brotli
    #[arg(long)]
    compression: Option<Compression>,

    /// Receive light transaction updates
    #[arg(long)]
    light: bool,

    /// Do not reconnect when the socket drops
    #[arg(long)]
    no_reconnect: bool,

    /// SQL subscription, may be repeated (e.g. -s "SELECT * FROM message")
    #[arg(short, long = "subscribe")]
    subscriptions: Vec<String>,

    /// Reducer to call once connected
    #[arg(long)]
    call: Option<String>,

    /// Hex-encoded BSATN arguments for --call
    #[arg(long, default_value = "")]
    args: String,

    /// One-off query to run once connected
    #[arg(short, long)]
    query: Option<String>,

    /// Timeout for --query, in seconds
    #[arg(long, default_value_t = 30)]
    query_timeout: u64,
}

/// Logs every connection event.
struct Watcher;

fn describe_rows(rows: &[TableRow]) -> String {
    rows.iter()
        .map(|row| match row.raw() {
            Some(bytes) => hex::encode(bytes),
            None => "<decoded>".to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

impl ConnectionDelegate for Watcher {
    fn on_connect(&self) {
        tracing::info!("Connected");
    }

    fn on_disconnect(&self, error: Option<&ClientError>) {
        match error {
            Some(e) => tracing::warn!("Disconnected: {}", e),
            None => tracing::info!("Disconnected"),
        }
    }

    fn on_reconnect_attempt(&self, attempt: u32, max_attempts: u32, delay: Duration) {
        tracing::info!("Reconnecting ({}/{}) in {:?}", attempt, max_attempts, delay);
    }

    fn on_reconnect_failed(&self, error: &ClientError) {
        tracing::error!("{}", error);
    }

    fn on_identity_received(&self, identity: Identity, _token: &str, connection_id: ConnectionId) {
        tracing::info!("Identity {} on connection {}", identity, connection_id);
    }

    fn on_insert(&self, table: &str, rows: &[TableRow]) {
        tracing::info!("+{} {}: [{}]", rows.len(), table, describe_rows(rows));
    }

    fn on_delete(&self, table: &str, rows: &[TableRow]) {
        tracing::info!("-{} {}: [{}]", rows.len(), table, describe_rows(rows));
    }

    fn on_reducer_event(&self, event: &ReducerEvent) {
        tracing::info!(
            "Reducer {} (request {}) -> {:?}, {} in {}us",
            event.reducer_name,
            event.request_id,
            event.status,
            event.energy_used,
            event.host_execution_micros
        );
    }

    fn on_subscription_applied(&self, request_id: u32, query_id: Option<QueryId>) {
        tracing::info!("Subscription applied (request {}, query {:?})", request_id, query_id);
    }

    fn on_unsubscribe_applied(&self, request_id: u32, query_id: QueryId) {
        tracing::info!("Unsubscribed (request {}, query {})", request_id, query_id);
    }

    fn on_subscription_error(&self, error: &bsatn_client::protocol::SubscriptionError) {
        tracing::error!("Subscription error: {}", error.error);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bsatn_client=info,bsatn_watch=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ConnectionConfig::from_env()?;
    if let Some(uri) = args.uri {
        config.uri = uri;
    }
    if let Some(database) = args.database {
        config.database = database;
    }
    if args.token.is_some() {
        config.token = args.token;
    }
    if let Some(compression) = args.compression {
        config.compression = compression;
    }
    config.light_mode = args.light;
    config.auto_reconnect = !args.no_reconnect;
    config.validate()?;

    if args.new_identity {
        let credentials = create_identity(&config)
            .await
            .context("Failed to create identity")?;
        tracing::info!("New identity {}", credentials.identity);
        config.token = Some(credentials.token);
    }

    let watcher = Arc::new(Watcher);
    let conn = DbConnectionBuilder::from_config(config)
        .with_delegate(&watcher)
        .connect()
        .await
        .context("Failed to connect")?;

    if !args.subscriptions.is_empty() {
        let queries: Vec<&str> = args.subscriptions.iter().map(String::as_str).collect();
        let query_id = conn.subscribe_multi(&queries)?;
        tracing::info!("Subscribing {} queries as query {}", queries.len(), query_id);
    }

    if let Some(reducer) = args.call {
        let reducer_args = hex::decode(&args.args).context("--args must be hex")?;
        let request_id = conn.call_reducer(&reducer, reducer_args)?;
        tracing::info!("Called {} (request {})", reducer, request_id);
    }

    if let Some(query) = args.query {
        let result = conn
            .one_off_query_with_timeout(&query, Duration::from_secs(args.query_timeout))
            .await;
        match result {
            Ok(result) => {
                for table in &result.tables {
                    tracing::info!(
                        "{}: {} rows [{}]",
                        table.table_name,
                        table.rows.len(),
                        describe_rows(&table.rows)
                    );
                }
            }
            Err(e) => tracing::error!("Query failed: {}", e),
        }

        if args.subscriptions.is_empty() {
            conn.disconnect().await?;
            return Ok(());
        }
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    conn.disconnect().await?;

    Ok(())
}
