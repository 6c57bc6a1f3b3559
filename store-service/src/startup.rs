use crate::auth::permissions::PermissionCode;
use crate::config::StoreConfig;
use crate::handlers::{self, access, auth, catalog, discounts, health, orders, site, users};
use crate::middleware::{guard_middleware, require_all, require_permission, Access, Guard};
use crate::services::email::provider_from_config;
use crate::services::{
    AccessRepository, DiscountEngine, EmailProvider, Geocoder, Inventory, JwtService, MongoDb,
    OrderRepository, PaymentEvents, ProductRepository, Scheduler, SiteRepository, StripeClient,
    UploadStore, UserRepository,
};
use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, patch, post, put, MethodRouter},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    create_ip_rate_limiter, ip_rate_limit_middleware, metrics_middleware, request_id_middleware,
    security_headers_middleware, IpRateLimiter,
};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Upper bound for multipart bodies (ten product images).
pub const UPLOAD_BODY_LIMIT: usize = 50 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub config: StoreConfig,
    pub db: MongoDb,
    pub jwt: JwtService,
    pub users: UserRepository,
    pub access: AccessRepository,
    pub products: ProductRepository,
    pub orders: OrderRepository,
    pub site: SiteRepository,
    pub inventory: Inventory,
    pub discounts: DiscountEngine,
    pub stripe: StripeClient,
    pub payments: PaymentEvents,
    pub email: Arc<dyn EmailProvider>,
    pub geocoder: Geocoder,
    pub uploads: UploadStore,
    pub auth_limiter: IpRateLimiter,
}

impl AppState {
    pub fn new(config: StoreConfig, db: MongoDb, email: Arc<dyn EmailProvider>) -> Self {
        let orders = OrderRepository::new(db.clone());
        let inventory = Inventory::new(db.clone());
        let stripe = StripeClient::new(config.stripe.clone());
        let payments = PaymentEvents::new(orders.clone(), inventory.clone(), stripe.clone());
        let auth_limiter = create_ip_rate_limiter(
            config.rate_limit.auth_attempts,
            config.rate_limit.auth_window_seconds,
        );

        Self {
            jwt: JwtService::new(&config.jwt),
            users: UserRepository::new(db.clone()),
            access: AccessRepository::new(db.clone()),
            products: ProductRepository::new(db.clone()),
            site: SiteRepository::new(db.clone()),
            discounts: DiscountEngine::new(db.clone(), Scheduler::new()),
            geocoder: Geocoder::new(config.geocoder.clone()),
            uploads: UploadStore::new(&config.uploads.dir),
            orders,
            inventory,
            stripe,
            payments,
            email,
            auth_limiter,
            config,
            db,
        }
    }
}

/// Attaches the authentication guard for `access` to a single method router.
fn guarded(state: &AppState, access: Access, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(
        Guard::new(state.clone(), access),
        guard_middleware,
    ))
}

fn auth_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/login", post(auth::login))
        .route("/register", post(auth::register))
        .route("/send_verification", post(auth::send_verification))
        .route("/verify_code", patch(auth::verify_code))
        .layer(from_fn_with_state(
            state.auth_limiter.clone(),
            ip_rate_limit_middleware,
        ))
}

fn user_routes(state: &AppState) -> Router<AppState> {
    use PermissionCode::*;

    Router::new()
        .route(
            "/",
            guarded(state, require_permission(CreateUser), post(users::create_user)),
        )
        .route(
            "/change_password",
            guarded(state, require_permission(UpdateUser), put(users::change_password)),
        )
        .route(
            "/remove/:user_id",
            guarded(state, require_permission(DeleteUser), patch(users::remove_user)),
        )
        .route(
            "/all",
            guarded(state, require_permission(ViewUsers), get(users::list_users)),
        )
        .route(
            "/:user_id",
            guarded(state, require_all(&[ViewUsers, UpdateUser]), put(users::update_user)),
        )
        .route(
            "/:user_id/roles",
            guarded(state, require_permission(ViewUsers), get(users::get_user_roles)),
        )
        .route(
            "/:user_id/roles",
            guarded(
                state,
                require_permission(AssignRoles),
                post(users::assign_user_roles).delete(users::remove_user_roles),
            ),
        )
}

fn role_routes(state: &AppState) -> Router<AppState> {
    use PermissionCode::*;

    Router::new()
        .route("/", get(access::list_roles))
        .route(
            "/",
            guarded(state, require_permission(CreateUser), post(access::create_role)),
        )
        .route(
            "/:role_id",
            guarded(state, require_permission(ViewUsers), get(access::get_role)),
        )
        .route(
            "/:role_id",
            guarded(state, require_permission(UpdateUser), put(access::update_role)),
        )
        .route(
            "/:role_id",
            guarded(state, require_permission(DeleteUser), delete(access::delete_role)),
        )
        .route(
            "/:role_id/permissions",
            guarded(
                state,
                require_permission(UpdateUser),
                post(access::add_role_permissions).delete(access::remove_role_permissions),
            ),
        )
}

fn permission_routes(state: &AppState) -> Router<AppState> {
    use PermissionCode::*;

    Router::new()
        .route(
            "/",
            guarded(state, require_permission(ViewUsers), get(access::list_permissions)),
        )
        .route(
            "/",
            guarded(state, require_permission(CreateUser), post(access::create_permission)),
        )
        .route(
            "/category/:category",
            guarded(
                state,
                require_permission(ViewUsers),
                get(access::permissions_by_category),
            ),
        )
        .route(
            "/:permission_id",
            guarded(state, require_permission(ViewUsers), get(access::get_permission)),
        )
        .route(
            "/:permission_id",
            guarded(state, require_permission(UpdateUser), put(access::update_permission)),
        )
        .route(
            "/:permission_id",
            guarded(state, require_permission(DeleteUser), delete(access::delete_permission)),
        )
}

fn product_routes(state: &AppState) -> Router<AppState> {
    use PermissionCode::*;

    Router::new()
        .route("/all", get(catalog::list_products))
        .route("/top-deals", get(catalog::top_deals))
        .route("/:product_id", get(catalog::get_product))
        .route(
            "/",
            guarded(state, require_permission(CreateProduct), post(catalog::create_product)),
        )
        .route(
            "/:product_id",
            guarded(state, require_permission(EditProduct), put(catalog::update_product)),
        )
        .route(
            "/:product_id",
            guarded(state, require_permission(DeleteProduct), delete(catalog::delete_product)),
        )
        .route(
            "/:product_id/discount",
            guarded(
                state,
                require_permission(ManageDiscounts),
                post(catalog::apply_product_discount).delete(catalog::remove_product_discount),
            ),
        )
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

fn discount_routes(state: &AppState) -> Router<AppState> {
    use PermissionCode::*;

    Router::new()
        .route("/", get(discounts::list_global_discounts))
        .route(
            "/",
            guarded(
                state,
                require_permission(CreateDiscount),
                put(discounts::create_global_discount),
            ),
        )
        .route("/:discount_id", get(discounts::get_global_discount))
        .route(
            "/:discount_id",
            guarded(
                state,
                require_permission(EditDiscount),
                put(discounts::update_global_discount),
            ),
        )
        .route(
            "/:discount_id",
            guarded(
                state,
                require_permission(DeleteDiscount),
                delete(discounts::delete_global_discount),
            ),
        )
        .route(
            "/product/:product_id",
            guarded(
                state,
                require_permission(CreateDiscount),
                post(discounts::set_product_discount),
            ),
        )
        .route(
            "/product/:product_id",
            guarded(
                state,
                require_permission(DeleteDiscount),
                delete(catalog::remove_product_discount),
            ),
        )
}

fn order_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(orders::create_order))
        .route("/guest", post(orders::create_guest_order))
        .route("/webhook", post(orders::stripe_webhook))
        .route("/", guarded(state, Access::Admin, get(orders::list_orders)))
        .route("/user", guarded(state, Access::Authenticated, get(orders::my_orders)))
        .route(
            "/user/:user_id",
            guarded(state, Access::Admin, get(orders::user_orders)),
        )
        .route(
            "/:order_id",
            guarded(state, Access::Authenticated, get(orders::get_order)),
        )
        .route(
            "/:order_id",
            guarded(state, Access::Admin, patch(orders::update_order_status)),
        )
        .route(
            "/:order_id/payment-intent",
            guarded(state, Access::Authenticated, post(orders::create_payment_intent)),
        )
        .route(
            "/:order_id/checkout",
            guarded(state, Access::Authenticated, post(orders::create_checkout_session)),
        )
}

fn site_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/content", guarded(state, Access::Admin, put(site::save_content)))
        .route("/content/:name", get(site::get_content))
        .route(
            "/content/text/:name",
            guarded(state, Access::Admin, put(site::save_text_content)),
        )
        .route(
            "/content/image/:name",
            guarded(state, Access::Admin, put(site::save_image_content)),
        )
        .route(
            "/images/:size/:name",
            guarded(state, Access::Admin, put(site::upload_image)),
        )
        .route("/images/get/:name", get(site::get_image))
        .route("/address", get(site::search_address))
        .route(
            "/aboutus",
            get(site::list_about).merge(guarded(state, Access::Admin, put(site::save_about))),
        )
        .route(
            "/contact",
            get(site::get_contact).merge(guarded(state, Access::Admin, put(site::save_contact))),
        )
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(auth_routes(&state))
        .merge(site_routes(&state))
        .nest("/users", user_routes(&state))
        .nest("/roles", role_routes(&state))
        .nest("/permissions", permission_routes(&state))
        .nest("/products", product_routes(&state))
        .nest("/discounts", discount_routes(&state))
        .nest("/orders", order_routes(&state));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/metrics", get(health::metrics_endpoint))
        .nest("/api/v1", api)
        .nest_service("/static", ServeDir::new(state.uploads.dir()))
        .fallback(handlers::not_found_fallback)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(CorsLayer::permissive())
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    pub async fn build(config: StoreConfig) -> Result<Self, AppError> {
        let db = MongoDb::connect(&config.mongodb.uri, &config.mongodb.database)
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to MongoDB: {}", e);
                e
            })?;
        db.initialize_indexes().await.map_err(|e| {
            tracing::error!("Failed to initialize database indexes: {}", e);
            e
        })?;

        let email = provider_from_config(&config.smtp)?;
        let state = AppState::new(config.clone(), db, email);
        state.uploads.ensure_dir().await?;

        if let Err(e) = state.discounts.initialize_discount_jobs().await {
            tracing::error!(error = %e, "Failed to initialize discount jobs");
        }

        let app = build_router(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn db(&self) -> &MongoDb {
        &self.state.db
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
