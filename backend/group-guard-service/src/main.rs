use group_guard_service::{
    config::{AttemptBackend, Config},
    consumer::{ConsumerConfig, EventConsumer},
    db::{ModerationStore, PgModerationStore},
    gateway::HttpGateway,
    guard::{AttemptTracker, GuardSettings, RedisAttemptStore},
    logging,
    policy::StaticPolicy,
    services::RemediationExecutor,
    ModerationEngine,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_tracing();

    tracing::info!("Starting Group Guard Service...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        service = %config.service_name,
        environment = %config.environment,
        bot_id = %config.bot_id,
        attempt_backend = ?config.attempt_backend,
        "Configuration loaded"
    );

    // Initialize database pool
    let db = Arc::new(
        PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .connect(&config.database_url)
            .await?,
    );
    tracing::info!("Database pool initialized");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&*db)
        .await
        .map_err(|e| {
            tracing::error!("Migration failed: {}", e);
            e
        })?;
    tracing::info!("Migrations completed successfully");

    let store: Arc<dyn ModerationStore> = Arc::new(PgModerationStore::new(db.clone()));

    // Redis carries the event stream and, optionally, the attempt counters
    let redis_client = redis::Client::open(config.redis_url.as_str())?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client.clone()).await?;
    tracing::info!("Redis connection established");

    let attempts = match config.attempt_backend {
        AttemptBackend::Memory => AttemptTracker::in_memory(),
        AttemptBackend::Redis => AttemptTracker::new(Arc::new(RedisAttemptStore::new(
            redis_conn,
            format!("{}:attempts", config.service_name),
            config.attempt_ttl_secs,
        ))),
    };
    if config.attempt_backend == AttemptBackend::Memory {
        tracing::warn!("Attempt counters are process-local and reset on restart");
    }

    let gateway = Arc::new(HttpGateway::new(
        config.gateway_base_url.clone(),
        config.gateway_token.clone(),
        config.gateway_timeout,
    )?);
    let executor = Arc::new(RemediationExecutor::new(
        gateway,
        config.gateway_timeout,
        config.remediation_delay,
    ));

    let policy = Arc::new(StaticPolicy::new(
        config.enabled_violations.iter().copied(),
        config.default_warning_threshold,
        config.max_mentions,
    )
    .with_kind_thresholds(config.kind_warning_thresholds.iter().copied()));

    let engine = Arc::new(ModerationEngine::new(
        GuardSettings {
            bot_id: config.bot_id.clone(),
            bot_owner_id: config.bot_owner_id.clone(),
        },
        store,
        policy,
        executor,
        Arc::new(attempts),
    ));
    tracing::info!("Moderation engine initialized");

    // Start health check server (HTTP)
    let health_addr = format!("0.0.0.0:{}", config.health_port);
    let health_server = {
        use actix_web::{web, App, HttpResponse, HttpServer};

        HttpServer::new(|| {
            App::new()
                .route(
                    "/health",
                    web::get().to(|| async { HttpResponse::Ok().body("OK") }),
                )
                .route(
                    "/ready",
                    web::get().to(|| async { HttpResponse::Ok().body("READY") }),
                )
        })
        .bind(&health_addr)?
        .run()
    };
    let health_server = tokio::spawn(health_server);
    tracing::info!("Health check server started on {}", health_addr);

    let consumer = EventConsumer::connect(
        redis_client,
        engine,
        ConsumerConfig {
            stream_key: config.event_stream_key.clone(),
            ..ConsumerConfig::default()
        },
    )
    .await?;

    tracing::info!("Group Guard Service is running");
    tracing::info!("   Events: {}", config.event_stream_key);
    tracing::info!("   Health: http://0.0.0.0:{}", config.health_port);

    // Run the consumer and the health server concurrently
    tokio::select! {
        result = consumer.run() => {
            if let Err(e) = result {
                tracing::error!("Event consumer error: {}", e);
            }
        }
        result = health_server => match result {
            Ok(Ok(())) => tracing::info!("Health server stopped"),
            Ok(Err(e)) => tracing::error!("Health server error: {}", e),
            Err(e) => tracing::error!("Health server task failed: {}", e),
        },
    }

    Ok(())
}
