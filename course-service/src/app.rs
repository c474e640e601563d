use std::sync::Arc;

use anyhow::Result;
use axum::extract::{FromRef, State};
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use common_auth::{JwtConfig, JwtVerifier, RoleResolver, TokenIssuer};
use common_http_errors::ApiError;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use crate::class_handlers::{create_class, list_all_classes, list_my_classes, set_class_status, update_class};
use crate::config::CorsOrigins;
use crate::gateway::PaymentGateway;
use crate::identity_roles::StoreRoleResolver;
use crate::metrics::{http_error_metrics, ServiceMetrics};
use crate::payment_handlers::{
    confirm_payment, create_payment_intent, list_enrolled_classes, list_payments,
};
use crate::selection_handlers::{delete_selection, list_selections, select_class};
use crate::store::Stores;
use crate::token_handlers::issue_token;
use crate::user_handlers::{delete_user, get_user_role, list_users, update_user_role, upsert_user};

#[derive(Clone)]
pub struct AppState {
    pub stores: Stores,
    pub jwt_verifier: Arc<JwtVerifier>,
    pub token_issuer: Arc<TokenIssuer>,
    pub role_resolver: Arc<dyn RoleResolver>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub metrics: Arc<ServiceMetrics>,
    pub payment_currency: String,
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_verifier.clone()
    }
}

impl FromRef<AppState> for Arc<dyn RoleResolver> {
    fn from_ref(state: &AppState) -> Self {
        state.role_resolver.clone()
    }
}

impl AppState {
    /// Fails only when the signing secret is unusable.
    pub fn new(
        stores: Stores,
        jwt: JwtConfig,
        gateway: Arc<dyn PaymentGateway>,
        payment_currency: impl Into<String>,
    ) -> Result<Self> {
        let token_issuer = TokenIssuer::new(&jwt)?;
        let role_resolver = Arc::new(StoreRoleResolver::new(stores.identities.clone()));
        Ok(Self {
            jwt_verifier: Arc::new(JwtVerifier::new(jwt)),
            token_issuer: Arc::new(token_issuer),
            role_resolver,
            gateway,
            metrics: Arc::new(ServiceMetrics::new()?),
            payment_currency: payment_currency.into(),
            stores,
        })
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match state.metrics.render() {
        Ok(response) => response,
        Err(err) => ApiError::internal(err).into_response(),
    }
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let allow_origin = match origins {
        CorsOrigins::Any => AllowOrigin::from(Any),
        CorsOrigins::List(list) => {
            let values: Vec<HeaderValue> = list
                .iter()
                .filter_map(|origin| match HeaderValue::from_str(origin) {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(%origin, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            AllowOrigin::list(values)
        }
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ACCEPT, CONTENT_TYPE, AUTHORIZATION])
}

pub fn build_router(state: AppState, cors: &CorsOrigins) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/jwt", post(issue_token))
        .route("/users", get(list_users))
        .route("/users/role/:email", get(get_user_role))
        .route("/users/:user", put(upsert_user).delete(delete_user))
        .route("/users/:user/role", patch(update_user_role))
        .route("/classes", post(create_class))
        .route("/classes/manage", get(list_all_classes))
        .route("/classes/:id", put(update_class))
        .route("/classes/:id/status", patch(set_class_status))
        .route("/myclasses", get(list_my_classes))
        .route("/selectedclasses", post(select_class).get(list_selections))
        .route("/selectedclasses/:id", delete(delete_selection))
        .route("/create-payment-intent", post(create_payment_intent))
        .route("/payments", post(confirm_payment).get(list_payments))
        .route("/enrolled", get(list_enrolled_classes))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            http_error_metrics,
        ))
        .with_state(state)
        .layer(cors_layer(cors))
}
