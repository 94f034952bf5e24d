use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use common::telemetry::{init_telemetry, TelemetryConfig};
use common::{AppConfig, CacheBackend};
use ingest::{IngestPipeline, KafkaSource, SchemaValidator, ValidationPolicy};
use order_store::{MemoryCache, OrderCache, OrderStore, PgOrderRepository, RedisCache};
use signal_hook::consts::signal::*;
use signal_hook_tokio::Signals;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, warn};

mod handlers;
mod routes;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let json_logs = std::env::var("LOG_JSON")
        .unwrap_or_else(|_| "false".to_string())
        .parse()
        .unwrap_or(false);

    init_telemetry(TelemetryConfig {
        service_name: "order-service".to_string(),
        log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        json_output: json_logs,
    });

    info!("Starting Order Service...");

    let config = AppConfig::from_env();
    info!("Configuration:");
    info!("  Database URL: {}", config.database_url);
    info!("  Cache backend: {:?}", config.cache_backend);
    info!("  Kafka Brokers: {}", config.kafka_brokers);
    info!("  Kafka Topic: {}", config.kafka_topic);
    info!("  Consumer Group: {}", config.kafka_group_id);
    info!("  HTTP Port: {}", config.http_port);

    // Connect to database and make sure the order tables exist
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await?;
    info!("Database connected successfully");

    let repo = PgOrderRepository::new(pool.clone());
    repo.ensure_schema().await?;

    // Cache backend is injected; the store never knows which one it got
    let cache: Arc<dyn OrderCache> = match config.cache_backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::Redis => {
            info!("Connecting to Redis...");
            Arc::new(RedisCache::new(&config.redis_url, config.cache_ttl_seconds).await?)
        }
    };

    let store = Arc::new(OrderStore::new(Arc::new(repo), cache));

    // Prime the cache; readiness does not depend on every order loading
    match store.warm_up(config.warmup_limit).await {
        Ok(warmed) => info!("Cache warm-up complete: {} orders", warmed),
        Err(e) => warn!("Cache warm-up failed: {}", e),
    }

    // Single consumer per configured topic partition group
    let shutdown = Arc::new(AtomicBool::new(false));
    let source = KafkaSource::new(
        &config.kafka_brokers,
        &config.kafka_group_id,
        &config.kafka_topic,
    )?;

    let policy = config
        .validation_policy
        .parse::<ValidationPolicy>()
        .unwrap_or_else(|e| {
            warn!("{}, falling back to fail-closed", e);
            ValidationPolicy::default()
        });

    let pipeline = IngestPipeline::new(
        Box::new(source),
        store.clone(),
        Arc::new(SchemaValidator),
        policy,
        shutdown.clone(),
    );
    let pipeline_task = tokio::spawn(pipeline.run());

    // Flip the shared flag on SIGTERM/SIGINT; both the HTTP server and the
    // pipeline watch it
    let signals = Signals::new([SIGTERM, SIGINT])?;
    let signals_handle = signals.handle();
    let signal_flag = shutdown.clone();
    let signal_task = tokio::spawn(async move {
        use futures_util::stream::StreamExt;
        let mut signals = signals;
        while let Some(signal) = signals.next().await {
            match signal {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping...");
                    signal_flag.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    // Serve the read API until shutdown is requested
    let app = routes::create_router(AppState {
        store: store.clone(),
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Order service listening on {}", addr);

    let server_flag = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            while !server_flag.load(Ordering::Relaxed) {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        })
        .await?;

    // The pipeline observes the same flag between records
    match pipeline_task.await {
        Ok(Ok(())) => info!("Ingest pipeline stopped"),
        Ok(Err(e)) => error!("Ingest pipeline failed: {}", e),
        Err(e) => error!("Ingest pipeline task panicked: {}", e),
    }

    signals_handle.close();
    let _ = signal_task.await;

    pool.close().await;
    info!("Order service stopped");

    Ok(())
}
