use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use clap::Parser;
use seismic_stream_server::cli::{Cli, Commands};
use seismic_stream_server::edge::{day_index_handler, request_stream_handler};
use seismic_stream_server::handlers::health_check;
use seismic_stream_server::{ServerConfig, ServerState};
use tokio::time;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seismic_stream_server=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = ServerConfig::from_env()?;

    match cli.command {
        Some(Commands::ShowDayIndex {
            network,
            station,
            location,
            channel,
            date,
            grouping,
        }) => {
            let state = ServerState::new(config).await;
            let sid = seismic_stream_server::model::StationId::new(network, station, location, channel);
            let day = seismic_stream_server::model::Day::parse(&date)?;
            match state.day_index.load(&sid, &day, grouping.as_deref()).await? {
                Some(index) => println!("{}", serde_json::to_string_pretty(&index)?),
                None => println!("no day index found for {sid} on {day}"),
            }
            return Ok(());
        }
        Some(Commands::Serve) | None => {}
    }

    info!("starting seismic stream server v{}", VERSION);
    info!("  port: {}", config.port);
    info!("  bind address: {}", config.bind_addr);
    info!("  archive base url: {}", config.archive_base_url);
    info!("  max request duration (s): {}", config.max_request_duration_seconds);
    info!("  max concurrent archive fetches: {}", config.max_concurrent_archive_fetches);

    let sweep_interval = config.origin_sweep_interval_seconds;
    let state = Arc::new(ServerState::new(config.clone()).await);

    {
        let origin = Arc::clone(&state.origin);
        tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(sweep_interval.max(1)));
            loop {
                interval.tick().await;
                origin.sweep().await;
            }
        });
    }

    let cors_origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(cors_origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/request-stream", post(request_stream_handler))
        .route("/day-index", get(day_index_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = config.bind_address().parse()?;
    info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;

    Ok(())
}
