//! Serve command implementation.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tailfeed_protocol::{Document, VerbSet};
use tailfeed_server::{
    ChangeFeedServer, MemoryOplog, ResourceRegistry, ServerConfig, StaticRegistry,
};
use tokio_util::sync::CancellationToken;

/// Database name of the in-memory oplog.
const DATABASE: &str = "tailfeed";

/// Options for `serve`.
#[derive(Debug)]
pub struct ServeOptions {
    /// Listen address.
    pub bind: SocketAddr,
    /// Comma-separated resource names.
    pub resources: String,
    /// Comma-separated verbs.
    pub verbs: String,
    /// Keepalive period in seconds.
    pub ticker_secs: u64,
    /// Demo writer period in seconds.
    pub demo_interval: Option<u64>,
    /// Maximum number of retained oplog entries.
    pub retain: usize,
}

/// Runs the serve command until Ctrl-C.
pub async fn run(options: ServeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let registry = StaticRegistry::from_list(&options.resources);
    if registry.is_empty() {
        return Err("at least one resource is required".into());
    }
    let verbs = VerbSet::parse_list(&options.verbs)?;
    if options.ticker_secs == 0 {
        return Err("ticker period must be at least one second".into());
    }

    let config = ServerConfig::new(options.bind)
        .with_ticker_interval(Duration::from_secs(options.ticker_secs))
        .with_verbs(verbs);

    let oplog = MemoryOplog::with_retention(DATABASE, options.retain);
    let names = registry.names();
    tracing::info!(resources = %names.join(","), verbs = %config.verbs, "starting change feed");

    let writer_token = CancellationToken::new();
    let writer = options.demo_interval.filter(|secs| *secs > 0).map(|secs| {
        tokio::spawn(demo_writer(
            oplog.clone(),
            names.clone(),
            Duration::from_secs(secs),
            writer_token.clone(),
        ))
    });

    let server = ChangeFeedServer::new(config, Arc::new(oplog), Arc::new(registry));
    let listener = server.bind().await?;
    server
        .serve(listener, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "failed to listen for Ctrl-C");
            }
        })
        .await?;

    writer_token.cancel();
    if let Some(writer) = writer {
        let written = writer.await?;
        tracing::info!(written, "demo writer stopped");
    }
    Ok(())
}

/// Inserts one document per resource every `period` until cancelled.
async fn demo_writer(
    oplog: MemoryOplog,
    resources: Vec<String>,
    period: Duration,
    token: CancellationToken,
) -> u64 {
    let mut interval = tokio::time::interval(period);
    let mut seq: u64 = 0;

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = interval.tick() => {
                for resource in &resources {
                    match oplog.insert(resource, demo_document(resource, seq)) {
                        Ok(ts) => tracing::debug!(%resource, cursor = %ts, "demo insert"),
                        Err(err) => {
                            tracing::warn!(error = %err, "demo writer stopped");
                            return seq;
                        }
                    }
                }
                seq += 1;
            }
        }
    }
    seq
}

fn demo_document(resource: &str, seq: u64) -> Document {
    let mut document = Document::new();
    document.insert("_id".into(), format!("{resource}-{seq}").into());
    document.insert("seq".into(), seq.into());
    document.insert("__v".into(), 0.into());
    document
}
