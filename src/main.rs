//! Edura Settlement Backend Service
//!
//! Main entry point for the instructor earnings settlement service.
//! This service provides:
//! - REST API for payout batches, refunds, wallets, and commission policy
//! - Gateway webhook intake turning paid sales into earning ledger entries
//! - Background availability sweep promoting earnings past their grace period

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use edura_backend::config::AppConfig;
use edura_backend::database::{create_pool, run_migrations};
use edura_backend::error::{AppError, AppResult};
use edura_backend::routes;
use edura_backend::services::{
    AvailabilitySweep, DisabledCouponGateway, FiscalAuditService, HttpCouponGateway,
    NoopEnrollmentGateway,
};
use edura_backend::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    // Load configuration
    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        AppError::Config(e)
    })?;

    // Initialize tracing/logging with config
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("edura_backend={},sqlx=warn,tower_http=info", config.log_level).into()
            }),
        )
        .init();

    info!("Edura settlement backend starting");
    info!("Environment: {}", config.environment);
    info!("Log level: {}", config.log_level);
    info!("HTTP port: {}", config.http_port);

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    info!("Connecting to database...");

    let pool = create_pool(&config.database).await.map_err(|e| {
        error!("Failed to create database pool: {}", e);
        AppError::Database(e)
    })?;

    info!("Database connection pool created successfully");
    info!("Max connections: {}", config.database.max_connections);

    info!("Running database migrations...");
    run_migrations(&pool, None).await.map_err(|e| {
        error!("Database migration failed: {}", e);
        AppError::Database(e)
    })?;

    info!("Database migrations completed successfully");

    // =========================================================================
    // CORE SERVICES INITIALIZATION
    // =========================================================================
    info!("Initializing core services...");

    let coupon_gateway: Arc<dyn edura_backend::services::CouponGateway> =
        match &config.coupon_service_url {
            Some(url) => {
                info!("Coupon service: {}", url);
                Arc::new(HttpCouponGateway::new(url.clone()))
            }
            None => {
                warn!("COUPON_SERVICE_URL not set; referral coupons will not be validated");
                Arc::new(DisabledCouponGateway)
            }
        };

    // Fiscal audit is a reporting side channel; the service runs without it
    let fiscal_audit = match FiscalAuditService::new(config.fiscal_log_dir.clone().into()) {
        Ok(service) => Some(Arc::new(service)),
        Err(e) => {
            warn!("Fiscal audit trail disabled: {}", e);
            None
        }
    };

    let app_state = Arc::new(AppState::new(
        pool,
        coupon_gateway,
        Arc::new(NoopEnrollmentGateway),
        fiscal_audit,
    ));
    info!("Application state initialized with repositories");

    // =========================================================================
    // BACKGROUND TASKS
    // =========================================================================
    info!("Starting background tasks...");

    let sweep = AvailabilitySweep::new(app_state.earning_repo.clone())
        .with_interval(config.sweep_interval());

    let sweep_handle = tokio::spawn(async move {
        sweep.start().await;
    });
    info!(
        "Availability sweep task started ({}s interval)",
        config.sweep_interval_secs
    );

    // =========================================================================
    // START SERVER
    // =========================================================================
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(routes::webhook_routes())
        .merge(routes::payment_routes())
        .merge(routes::earning_routes())
        .merge(routes::refund_routes())
        .merge(routes::settings_routes())
        .merge(routes::wallet_routes())
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer())
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    info!("Starting HTTP server on {}...", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Message(format!("Failed to bind HTTP server: {}", e)))?;

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("HTTP server error: {}", e);
        }
    });

    info!("Edura settlement backend ready on {}", addr);
    info!("Press Ctrl+C to shutdown gracefully");

    // =========================================================================
    // SHUTDOWN HANDLING
    // =========================================================================
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, shutting down gracefully...");
        }
        _ = server_handle => {
            error!("HTTP server exited unexpectedly");
        }
        _ = sweep_handle => {
            error!("Availability sweep task exited unexpectedly");
        }
    }

    info!("Edura settlement backend shutdown complete");
    Ok(())
}

async fn root() -> &'static str {
    "Edura Settlement API"
}

async fn health_check() -> &'static str {
    "OK"
}

fn build_cors_layer() -> CorsLayer {
    let allowed_origins = std::env::var("CORS_ALLOWED_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000".to_string())
        .split(',')
        .filter_map(|origin| origin.trim().parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();

    CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(false)
}
