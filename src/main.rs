//! Campus Resource Management Service
//!
//! A web service for booking campus resources and tracking their upkeep.
//!
//! ## Features
//!
//! - **Resource catalog**: Rooms, labs and equipment with facilities and
//!   storage layout
//! - **Bookings**: Request/approve workflow with a derived live status per
//!   resource
//! - **Maintenance**: Scheduled records whose lifecycle feeds back into
//!   resource availability

mod config;
mod db;
mod handlers;
mod models;
mod status;
mod validation;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use handlers::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus_rms=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::from_env()?;
    tracing::info!("Starting Campus Resource Management Service");
    tracing::info!("Environment: {:?}", config.environment);

    // Create database pool
    tracing::info!("Connecting to database...");
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    // Create application state
    let state = AppState {
        pool: pool.clone(),
        is_production: config.is_production(),
        session_expiry_hours: config.session_expiry_hours,
        trusted_proxies: config.trusted_proxies.clone(),
    };

    // Build CORS layer
    let cors = if config.is_production() {
        CorsLayer::new()
            .allow_origin(
                config
                    .cors_origins
                    .iter()
                    .filter_map(|o| o.parse().ok())
                    .collect::<Vec<_>>(),
            )
            .allow_methods(Any)
            .allow_headers(Any)
            .allow_credentials(true)
    } else {
        CorsLayer::permissive()
    };

    // Public authentication endpoints
    let auth_routes = Router::new()
        .route("/auth/login", post(handlers::login))
        .route("/auth/register", post(handlers::register))
        .route("/auth/logout", post(handlers::logout))
        .route("/auth/me", get(handlers::get_current_user));

    // Admin-only management endpoints
    let admin_routes = Router::new()
        .route("/resources", post(handlers::create_resource))
        .route("/resources/:id", put(handlers::update_resource))
        .route("/resources/:id", delete(handlers::delete_resource))
        .route(
            "/resources/:id/status",
            put(handlers::update_resource_status),
        )
        .route("/bookings/:id/status", put(handlers::update_booking_status))
        .route("/users", get(handlers::list_users))
        .route("/users", post(handlers::create_user))
        .route("/users/:id", put(handlers::update_user))
        .route("/users/:id", delete(handlers::delete_user))
        .route("/users/:id/role", put(handlers::update_user_role))
        .route_layer(middleware::from_fn(handlers::middleware::require_admin));

    // Maintenance lifecycle transitions: admins and maintenance staff
    let maintenance_routes = Router::new()
        .route(
            "/maintenance/:id/status",
            put(handlers::update_maintenance_status),
        )
        .route_layer(middleware::from_fn(
            handlers::middleware::require_maintenance_staff,
        ));

    // Endpoints for any signed-in user. The auth middleware is applied last
    // so it runs before the role gates merged in above.
    let protected_routes = Router::new()
        .route("/resources", get(handlers::list_resources))
        .route("/resources/:id", get(handlers::get_resource))
        .route("/resource-types", get(handlers::list_resource_types))
        .route("/buildings", get(handlers::list_buildings))
        .route("/bookings", get(handlers::list_bookings))
        .route("/bookings", post(handlers::create_booking))
        .route("/maintenance", get(handlers::list_maintenance))
        .route("/dashboard", get(handlers::get_dashboard_stats))
        .route("/dashboard/activity", get(handlers::get_recent_activity))
        .route("/reports", get(handlers::get_report_data))
        .merge(admin_routes)
        .merge(maintenance_routes)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::middleware::require_auth,
        ));

    let api_routes = auth_routes.merge(protected_routes);

    // Build main router
    let app = Router::new()
        .nest("/api", api_routes)
        .nest_service("/", ServeDir::new(&config.frontend_dir))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::middleware::security_headers,
        ))
        .with_state(state);

    // Start server
    let addr = config.server_addr();
    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("Frontend served from: {}", config.frontend_dir);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
