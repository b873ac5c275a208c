use anyhow::{Context, Result};
use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, Level};

use launchboard::{
    api::{
        body_size_middleware, create_coupons_router, create_payments_router,
        create_products_router, create_users_router, identity_middleware,
        security_headers_middleware, CouponsApiState, PaymentsApiState, ProductsApiState,
        RequestGuardState, UsersApiState,
    },
    billing::{CardGateway, GatewayKind, PaymentGateway, RegionalGateway},
    AppConfig, AuthorizationGate, CouponBook, DatabasePool, HttpIdentityProvider,
    ProductCatalog, UserDirectory, VerificationPricing, VerificationWorkflow,
};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        eprintln!("Please check LAUNCHBOARD_* environment variables.");
        e
    })?);

    init_logging(&config)?;

    info!("Starting launchboard directory server");
    info!(
        "Auth enabled: {}, gateway: {:?}, postgres: {}",
        config.security.enable_auth, config.billing.gateway, config.database.postgres_enabled
    );

    // Optional persistence
    let db = if config.database.postgres_enabled {
        let pool = DatabasePool::new(&config.database.postgres_url)
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
        pool.init_schema().await.map_err(|e| anyhow::anyhow!(e))?;
        Some(Arc::new(pool))
    } else {
        info!("PostgreSQL disabled - running with in-memory state only");
        None
    };

    // Identity resolution + user directory
    let identity = Arc::new(
        HttpIdentityProvider::new(&config.identity)
            .context("Failed to initialize identity provider")?,
    );
    let mut directory = UserDirectory::new();
    if let Some(ref db) = db {
        directory = directory.with_database(db.clone());
    }
    let directory = Arc::new(directory);
    let gate = Arc::new(AuthorizationGate::new(identity, directory.clone()));

    // Product catalog
    let mut catalog = ProductCatalog::new(config.moderation.report_review_threshold);
    if let Some(ref db) = db {
        catalog = catalog.with_database(db.clone());
    }
    let catalog = Arc::new(catalog);
    catalog
        .hydrate()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to hydrate products: {}", e))?;

    // Coupons
    let mut coupons = CouponBook::new();
    if let Some(ref db) = db {
        coupons = coupons.with_database(db.clone());
    }
    let coupons = Arc::new(coupons);
    coupons
        .hydrate()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to hydrate coupons: {}", e))?;

    // Payment gateway selected by configuration
    let gateway: Arc<dyn PaymentGateway> = match config.billing.gateway {
        GatewayKind::Card => Arc::new(
            CardGateway::new(config.selected_gateway())
                .context("Failed to initialize card gateway")?,
        ),
        GatewayKind::Regional => Arc::new(
            RegionalGateway::new(config.selected_gateway())
                .context("Failed to initialize regional gateway")?,
        ),
    };

    let pricing = VerificationPricing {
        base_price: config.billing.verification_price,
        currency: config.billing.currency.clone(),
    };
    let mut workflow =
        VerificationWorkflow::new(directory.clone(), coupons.clone(), gateway, pricing.clone());
    if let Some(ref db) = db {
        workflow = workflow.with_database(db.clone());
    }
    let workflow = Arc::new(workflow);
    workflow
        .hydrate()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to hydrate payments: {}", e))?;

    // Request middleware state
    let guard_state = RequestGuardState {
        gate: gate.clone(),
        enable_auth: config.security.enable_auth,
        max_request_size: config.security.max_request_size,
    };

    // Build the application with routes and middleware layers
    let mut app = Router::new()
        .nest(
            "/products",
            create_products_router(ProductsApiState {
                catalog: catalog.clone(),
                gate: gate.clone(),
            }),
        )
        .nest(
            "/coupons",
            create_coupons_router(CouponsApiState {
                coupons: coupons.clone(),
                gate: gate.clone(),
                pricing,
            }),
        )
        .nest(
            "/payments",
            create_payments_router(PaymentsApiState {
                workflow: workflow.clone(),
                gate: gate.clone(),
            }),
        )
        .nest(
            "/users",
            create_users_router(UsersApiState {
                directory: directory.clone(),
                gate: gate.clone(),
            }),
        )
        .route("/health", get(|| async { "OK" }))
        .layer(middleware::from_fn_with_state(
            guard_state.clone(),
            body_size_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            guard_state.clone(),
            identity_middleware,
        ))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(TraceLayer::new_for_http());

    if config.security.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", bind_addr, e))?;

    info!("Directory server listening on {}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "error" => Level::ERROR,
        "warn" => Level::WARN,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set logging subscriber: {}", e))?;

    Ok(())
}
