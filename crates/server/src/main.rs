//! Toggo server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, middleware};
use tokio::signal;
use toggo_api::{
    AppState, JwtVerifier, health_router, middleware::auth_middleware, router as api_router,
};
use toggo_common::{ClockService, Config, SystemClock};
use toggo_core::{
    EventPublisherService, NoOpEventPublisher, RankPollService, TripAccessService,
    VotePollService,
};
use toggo_db::repositories::{MembershipRepository, PollRankingRepository, PollRepository};
use toggo_realtime::RedisPubSub;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// `LOG_FORMAT=json` switches to structured JSON lines.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "toggo=debug,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting toggo server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = Arc::new(toggo_db::init(&config).await?);
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    toggo_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let poll_repo = PollRepository::new(Arc::clone(&db));
    let ranking_repo = PollRankingRepository::new(Arc::clone(&db));
    let access: TripAccessService = Arc::new(MembershipRepository::new(Arc::clone(&db)));
    let clock: ClockService = Arc::new(SystemClock);

    // Initialize services
    let mut vote_poll_service =
        VotePollService::new(poll_repo.clone(), Arc::clone(&access), Arc::clone(&clock))
            .with_page_sizes(config.polls.default_page_size, config.polls.max_page_size);
    let mut rank_poll_service = RankPollService::new(poll_repo, ranking_repo, access, clock);

    // Real-time events
    let pubsub = if config.redis.enabled {
        info!("Connecting to Redis Pub/Sub...");
        Some(Arc::new(
            RedisPubSub::new(&config.redis.url, config.redis.prefix.clone()).await?,
        ))
    } else {
        info!("Real-time events disabled");
        None
    };
    let event_publisher: EventPublisherService = match &pubsub {
        Some(pubsub) => Arc::clone(pubsub) as EventPublisherService,
        None => Arc::new(NoOpEventPublisher),
    };
    vote_poll_service.set_event_publisher(Arc::clone(&event_publisher));
    rank_poll_service.set_event_publisher(event_publisher);

    let state = AppState {
        vote_poll_service,
        rank_poll_service,
        jwt: JwtVerifier::new(&config.auth.jwt_secret, config.auth.issuer.as_deref()),
        db,
    };

    // Build router
    let app = Router::new()
        .merge(health_router())
        .nest("/api/v1", api_router())
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pubsub) = pubsub
        && let Err(e) = pubsub.shutdown().await
    {
        warn!(error = %e, "Failed to close Redis connection");
    }

    info!("Server shutdown complete");
    Ok(())
}
