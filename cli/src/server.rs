use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{FromRequestParts, Request, State},
    http::{HeaderValue, StatusCode, header, request::Parts},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::post,
};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;

use nutrilog_core::models::{
    DailyConsumption, Food, FoodConsumptionEntry, LoggedMeal, MealItem, NewFood, Profile,
    ProfileUpdate, TopFood,
};
use nutrilog_core::{Dashboard, ErrorKind, NutritionService};

const BODY_LIMIT: usize = 1024 * 1024; // 1 MB

/// Header carrying the caller identity resolved by the upstream gateway.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
struct AppState {
    service: Arc<Mutex<NutritionService>>,
    api_key: Option<String>,
}

// --- Request / Response types ---

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeRequest {
    start_date: String,
    end_date: String,
}

#[derive(Deserialize)]
struct UpsertConsumptionRequest {
    date: String,
    consumed: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TopConsumedRequest {
    start_date: String,
    end_date: String,
    limit: Option<i64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddFoodConsumptionRequest {
    food_id: i64,
    date: String,
    quantity: Option<f64>,
    calories: i64,
}

#[derive(Deserialize)]
struct DeleteFoodConsumptionRequest {
    id: i64,
}

#[derive(Serialize)]
struct DeleteResponse {
    deleted: bool,
}

#[derive(Deserialize)]
struct LogMealRequest {
    date: String,
    items: Vec<MealItem>,
}

#[derive(Serialize)]
struct ErrorBody {
    kind: &'static str,
    message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

// --- Error handling ---

enum ApiError {
    Unauthorized(String),
    Core(nutrilog_core::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            Self::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            Self::Core(err) => {
                let kind = err.kind();
                let status = match kind {
                    ErrorKind::ValidationFailed | ErrorKind::InvalidRange => StatusCode::BAD_REQUEST,
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Conflict => StatusCode::CONFLICT,
                    ErrorKind::BackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
                    ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let message = match kind {
                    ErrorKind::Internal => {
                        tracing::error!(error = %err, "internal server error");
                        "Internal server error".to_string()
                    }
                    ErrorKind::BackendUnavailable => {
                        tracing::warn!(error = %err, "store unavailable");
                        "Persistence backend unavailable".to_string()
                    }
                    _ => err.to_string(),
                };
                (status, kind.as_str(), message)
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: ErrorBody { kind, message },
            }),
        )
            .into_response()
    }
}

impl From<nutrilog_core::Error> for ApiError {
    fn from(err: nutrilog_core::Error) -> Self {
        Self::Core(err)
    }
}

/// The authenticated caller, as injected by the gateway.
struct Caller(i64);

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(Caller)
            .ok_or_else(|| ApiError::Unauthorized("Missing or invalid caller identity".to_string()))
    }
}

fn with_service<T>(
    state: &AppState,
    f: impl FnOnce(&NutritionService) -> nutrilog_core::Result<T>,
) -> Result<T, ApiError> {
    let service = state
        .service
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    Ok(f(&service)?)
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return ApiError::Unauthorized("Invalid or missing API key".to_string()).into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn profile_get(
    State(state): State<AppState>,
    Caller(user_id): Caller,
) -> Result<Json<Option<Profile>>, ApiError> {
    with_service(&state, |svc| svc.get_profile(user_id)).map(Json)
}

async fn profile_upsert(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(req): Json<ProfileUpdate>,
) -> Result<Json<Profile>, ApiError> {
    with_service(&state, |svc| svc.upsert_profile(user_id, &req)).map(Json)
}

async fn consumption_get_range(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(req): Json<RangeRequest>,
) -> Result<Json<Vec<DailyConsumption>>, ApiError> {
    with_service(&state, |svc| {
        svc.get_consumption_range(user_id, &req.start_date, &req.end_date)
    })
    .map(Json)
}

async fn consumption_upsert(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(req): Json<UpsertConsumptionRequest>,
) -> Result<Json<DailyConsumption>, ApiError> {
    with_service(&state, |svc| {
        svc.upsert_consumption(user_id, &req.date, req.consumed)
    })
    .map(Json)
}

async fn foods_list(
    State(state): State<AppState>,
    _caller: Caller,
) -> Result<Json<Vec<Food>>, ApiError> {
    with_service(&state, NutritionService::list_foods).map(Json)
}

async fn foods_create(
    State(state): State<AppState>,
    _caller: Caller,
    Json(req): Json<NewFood>,
) -> Result<(StatusCode, Json<Food>), ApiError> {
    let food = with_service(&state, |svc| svc.create_food(&req))?;
    Ok((StatusCode::CREATED, Json(food)))
}

async fn foods_top_consumed(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(req): Json<TopConsumedRequest>,
) -> Result<Json<Vec<TopFood>>, ApiError> {
    with_service(&state, |svc| {
        svc.top_consumed_foods(user_id, &req.start_date, &req.end_date, req.limit)
    })
    .map(Json)
}

async fn food_consumption_list(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(req): Json<RangeRequest>,
) -> Result<Json<Vec<FoodConsumptionEntry>>, ApiError> {
    with_service(&state, |svc| {
        svc.list_food_consumption(user_id, &req.start_date, &req.end_date)
    })
    .map(Json)
}

async fn food_consumption_add(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(req): Json<AddFoodConsumptionRequest>,
) -> Result<(StatusCode, Json<FoodConsumptionEntry>), ApiError> {
    let entry = with_service(&state, |svc| {
        svc.add_food_consumption(user_id, req.food_id, &req.date, req.quantity, req.calories)
    })?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn food_consumption_delete(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(req): Json<DeleteFoodConsumptionRequest>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = with_service(&state, |svc| svc.delete_food_consumption(user_id, req.id))?;
    Ok(Json(DeleteResponse { deleted }))
}

async fn food_consumption_log_meal(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(req): Json<LogMealRequest>,
) -> Result<(StatusCode, Json<LoggedMeal>), ApiError> {
    let meal = with_service(&state, |svc| svc.log_meal(user_id, &req.date, &req.items))?;
    Ok((StatusCode::CREATED, Json(meal)))
}

async fn progress_dashboard(
    State(state): State<AppState>,
    Caller(user_id): Caller,
    Json(req): Json<RangeRequest>,
) -> Result<Json<Dashboard>, ApiError> {
    with_service(&state, |svc| {
        svc.dashboard(user_id, &req.start_date, &req.end_date)
    })
    .map(Json)
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/profile.get", post(profile_get))
        .route("/api/profile.upsert", post(profile_upsert))
        .route("/api/consumption.getRange", post(consumption_get_range))
        .route("/api/consumption.upsert", post(consumption_upsert))
        .route("/api/foods.list", post(foods_list))
        .route("/api/foods.create", post(foods_create))
        .route("/api/foods.topConsumed", post(foods_top_consumed))
        .route("/api/foodConsumption.list", post(food_consumption_list))
        .route("/api/foodConsumption.add", post(food_consumption_add))
        .route("/api/foodConsumption.delete", post(food_consumption_delete))
        .route("/api/foodConsumption.logMeal", post(food_consumption_log_meal))
        .route("/api/progress.dashboard", post(progress_dashboard))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

/// First and last four characters of a key, or just its length when the key
/// is too short to abbreviate without revealing it.
fn key_preview(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() < 12 {
        return format!("<{} characters>", chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{head}...{tail}")
}

pub async fn start_server(
    service: NutritionService,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    let state = AppState {
        service: Arc::new(Mutex::new(service)),
        api_key: api_key.clone(),
    };

    let app = build_router(state);

    if let Some(ref key) = api_key {
        eprintln!(
            "API key: {} (see api_key file in data directory)",
            key_preview(key)
        );
    } else {
        tracing::warn!("authentication disabled (--no-auth), the API is open to anyone");
    }

    if bind != "127.0.0.1" && bind != "localhost" && api_key.is_none() {
        tracing::warn!(
            bind,
            "listening with no authentication, any device on the network can call this API"
        );
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    tracing::info!("listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
