use std::{sync::Arc, time::Duration};

use axum::http::HeaderValue;
use tokio::{net::TcpListener, signal, sync::mpsc};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use oakline_api as api;
use oakline_api::services::payments::{PaymentGateway, StripeCheckoutGateway};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cfg = api::config::load_config()?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    let db_pool = api::db::establish_connection(&cfg).await?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await?;
    }
    let db_arc = Arc::new(db_pool);

    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = api::events::EventSender::new(event_tx);
    tokio::spawn(api::events::process_events(event_rx));

    // The gateway is optional: without a key the store is COD-only.
    let gateway: Option<Arc<dyn PaymentGateway>> = match cfg.payment_gateway_secret.clone() {
        Some(secret) => Some(Arc::new(StripeCheckoutGateway::new(
            secret,
            Duration::from_secs(cfg.payment_gateway_timeout_secs),
        )?)),
        None => {
            warn!("payment gateway key not configured; online checkout disabled");
            None
        }
    };

    let services = api::services::AppServices::new(
        db_arc.clone(),
        Arc::new(event_sender.clone()),
        gateway,
        &cfg,
    );

    if cfg.seed_coupons {
        services.coupons.seed_defaults().await?;
    }

    let app_state = api::AppState {
        db: db_arc.clone(),
        config: cfg.clone(),
        event_sender,
        services,
    };

    let cors = match cfg.cors_allowed_origins.as_deref() {
        Some(origins) => {
            let origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
        None => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    let app = axum::Router::new()
        .nest("/api/v1", api::api_v1_routes())
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", api::openapi::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(cors)
        .with_state(app_state);

    let addr = cfg.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!(%addr, "oakline-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
