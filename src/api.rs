//! HTTP API handlers for GeoPlan.
//!
//! Every response uses the same envelope:
//!
//! ```json
//! { "success": true, "data": ... }
//! { "success": false, "message": "...", "error": "..." }
//! ```
//!
//! Input is validated here, before any core function runs; the core
//! assumes valid input.

use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{FromRequest, FromRequestParts, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use chrono::Utc;
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::alerts::{CurrentAlerts, derive_alerts};
use crate::data_sources::{
    ClimateReport, DEFAULT_CLIMATE_DAYS, DEFAULT_FIRE_DAYS, EnvironmentService, FireReport,
    MAX_CLIMATE_DAYS, MAX_FIRE_DAYS,
};
use crate::error::ApiError;
use crate::gamification::{self, Activity, LeaderboardEntry, Ledger, Level, PointsAwarded, UserProgress};
use crate::model::{
    AddPointsRequest, CheckRewardsRequest, CleanupQuery, DaysQuery, LeaderboardQuery, NewUser,
    NotificationsQuery, SimulateRequest, UnlockRequest, User,
};
use crate::notifications::{
    NewNotification, Notification, NotificationBroker, NotificationStats, Priority,
};
use crate::random::RandomSource;
use crate::rewards::{self, EligibleReward, Reward, RewardProgress, RewardsService, UnlockOutcome};
use crate::simulation::catalog::{self, CityProfile, SANTA_CRUZ, Strategy};
use crate::simulation::{self, SimulationResult};
use crate::storage::Storage;
use crate::users;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub storage: Storage,
    pub ledger: Ledger,
    pub rewards: RewardsService,
    pub broker: NotificationBroker,
    pub environment: EnvironmentService,
    /// Feeds the simulation calculators.
    pub rng: Arc<Mutex<Box<dyn RandomSource>>>,
}

impl AppState {
    pub fn new(
        storage: Storage,
        broker: NotificationBroker,
        environment: EnvironmentService,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        let ledger = Ledger::new(storage.clone());
        let rewards = RewardsService::new(storage.clone(), ledger.clone());
        Self {
            storage,
            ledger,
            rewards,
            broker,
            environment,
            rng: Arc::new(Mutex::new(rng)),
        }
    }
}

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: None,
        data,
    })
}

fn ok_with<T: Serialize>(message: impl Into<String>, data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        message: Some(message.into()),
        data,
    })
}

type ApiResult<T> = Result<Json<Envelope<T>>, ApiError>;

/// JSON body extractor whose rejection is rendered as the error envelope.
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Query string extractor whose rejection is rendered as the error envelope.
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// Build the full router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Simulations
        .route("/api/simulations/strategies", get(list_strategies))
        .route("/api/simulations/strategies/:id", get(get_strategy))
        .route("/api/simulations/city-profile", get(get_city_profile))
        .route("/api/simulations/simulate", post(simulate))
        .route("/api/simulations/save", post(save_simulation))
        // Users
        .route("/api/users", post(create_user))
        .route("/api/users/:user_id", get(get_user))
        // Gamification
        .route("/api/gamification/levels", get(list_levels))
        .route("/api/gamification/activities", get(list_activities))
        .route("/api/gamification/leaderboard", get(get_leaderboard))
        .route("/api/gamification/progress/:user_id", get(get_progress))
        .route("/api/gamification/add-points", post(add_points))
        // Rewards
        .route("/api/rewards", get(list_rewards))
        .route("/api/rewards/user/:user_id/progress", get(get_reward_progress))
        .route("/api/rewards/check", post(check_rewards))
        .route("/api/rewards/unlock", post(unlock_reward))
        // NASA data and alerts
        .route("/api/nasa/climate", get(get_climate))
        .route("/api/nasa/fires", get(get_fires))
        .route("/api/alerts/current", get(get_current_alerts))
        // Notifications
        .route(
            "/api/alerts/notifications",
            get(list_notifications).post(create_notification),
        )
        .route("/api/alerts/notifications/stats", get(notification_stats))
        .route("/api/alerts/notifications/read-all", put(mark_all_read))
        .route("/api/alerts/notifications/cleanup", delete(cleanup_notifications))
        .route("/api/alerts/notifications/:id/read", put(mark_read))
        .route("/api/alerts/notifications/:id", delete(delete_notification))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

/// GET /health - Simple health check endpoint.
pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

// ============================================================================
// Simulations
// ============================================================================

/// GET /api/simulations/strategies - The strategy catalog.
pub async fn list_strategies() -> Json<Envelope<&'static [Strategy]>> {
    ok(catalog::strategies())
}

/// GET /api/simulations/strategies/:id
pub async fn get_strategy(Path(id): Path<String>) -> ApiResult<&'static Strategy> {
    catalog::find_strategy(&id)
        .map(ok)
        .ok_or_else(|| simulation::SimulationError::StrategyNotFound(id).into())
}

/// GET /api/simulations/city-profile
pub async fn get_city_profile() -> Json<Envelope<&'static CityProfile>> {
    ok(&*SANTA_CRUZ)
}

/// POST /api/simulations/simulate - Run a simulation.
///
/// # Request Body
///
/// ```json
/// { "strategyId": "renewable_energy", "intensity": 70, "duration": 36 }
/// ```
///
/// `duration` is optional and defaults to the strategy's nominal months.
///
/// # Errors
///
/// - 400 when `strategyId` or `intensity` is missing, or a value is out of range
/// - 404 when the strategy does not exist
#[instrument(skip(state))]
pub async fn simulate(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SimulateRequest>,
) -> ApiResult<SimulationResult> {
    let strategy_id = request
        .strategy_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ApiError::Validation("strategyId es obligatorio".to_string()))?;
    let intensity = request
        .intensity
        .ok_or_else(|| ApiError::Validation("intensity es obligatorio".to_string()))?;
    let intensity = simulation::parse_intensity(intensity)?;

    let result = {
        let mut rng = state
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        simulation::run_simulation(
            &strategy_id,
            intensity,
            request.duration,
            &SANTA_CRUZ,
            &mut **rng,
            Utc::now(),
        )?
    };

    info!(
        simulation_id = %result.id,
        strategy = %strategy_id,
        intensity,
        duration = result.parameters.duration,
        total_cost = result.costs.total,
        feasibility = result.feasibility.score,
        "Simulation completed"
    );

    Ok(ok(result))
}

#[derive(Debug, Serialize)]
pub struct SaveAck {
    pub saved: bool,
}

/// POST /api/simulations/save - Acknowledges without persisting.
#[instrument(skip(body))]
pub async fn save_simulation(ApiJson(body): ApiJson<serde_json::Value>) -> ApiResult<SaveAck> {
    if !body.is_object() {
        return Err(ApiError::Validation(
            "Se requiere el resultado de la simulación".to_string(),
        ));
    }
    Ok(ok_with(
        "Las simulaciones todavía no se guardan",
        SaveAck { saved: false },
    ))
}

// ============================================================================
// Users
// ============================================================================

/// POST /api/users - Register a user.
///
/// Returns `201 Created`; 400 for an empty name or malformed email, 409
/// when the email is taken.
#[instrument(skip(state))]
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewUser>,
) -> Result<(StatusCode, Json<Envelope<User>>), ApiError> {
    let user = users::register(&state.storage, &request, Utc::now()).await?;
    Ok((StatusCode::CREATED, ok_with("Usuario creado", user)))
}

/// GET /api/users/:user_id
#[instrument(skip(state))]
pub async fn get_user(State(state): State<AppState>, Path(user_id): Path<String>) -> ApiResult<User> {
    Ok(ok(users::find(&state.storage, &user_id).await?))
}

// ============================================================================
// Gamification
// ============================================================================

pub async fn list_levels() -> Json<Envelope<&'static [Level]>> {
    ok(gamification::levels())
}

pub async fn list_activities() -> Json<Envelope<&'static [Activity]>> {
    ok(gamification::activities())
}

/// GET /api/gamification/leaderboard?limit=10
///
/// `limit` is clamped to `1..=100`.
#[instrument(skip(state))]
pub async fn get_leaderboard(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LeaderboardQuery>,
) -> ApiResult<Vec<LeaderboardEntry>> {
    Ok(ok(state.ledger.leaderboard(query.limit).await?))
}

/// GET /api/gamification/progress/:user_id
#[instrument(skip(state))]
pub async fn get_progress(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<UserProgress> {
    Ok(ok(state.ledger.progress(&user_id).await?))
}

/// POST /api/gamification/add-points - Credit an activity to a user.
///
/// # Request Body
///
/// ```json
/// { "userId": "...", "activityId": "complete_simulation", "metadata": {} }
/// ```
///
/// A level-up also raises a notification.
#[instrument(skip(state))]
pub async fn add_points(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AddPointsRequest>,
) -> ApiResult<PointsAwarded> {
    let awarded = state
        .ledger
        .add_points(&request.user_id, &request.activity_id, &request.metadata)
        .await?;

    if let Some(level) = &awarded.new_level {
        state.broker.add(NewNotification {
            kind: "level_up".to_string(),
            title: "¡Subiste de nivel!".to_string(),
            message: format!("Alcanzaste el nivel {}: {}", level.level, level.name),
            priority: Priority::Medium,
            icon: level.badge.clone(),
        });
    }

    let message = format!("+{} puntos", awarded.points_added);
    Ok(ok_with(message, awarded))
}

// ============================================================================
// Rewards
// ============================================================================

pub async fn list_rewards() -> Json<Envelope<&'static [Reward]>> {
    ok(rewards::catalog())
}

/// GET /api/rewards/user/:user_id/progress
#[instrument(skip(state))]
pub async fn get_reward_progress(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Vec<RewardProgress>> {
    Ok(ok(state.rewards.progress(&user_id).await?))
}

/// POST /api/rewards/check - Rewards the user could unlock right now.
#[instrument(skip(state))]
pub async fn check_rewards(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<CheckRewardsRequest>,
) -> ApiResult<Vec<EligibleReward>> {
    let eligible = state.rewards.check(&request.user_id, Utc::now()).await?;
    info!(user_id = %request.user_id, eligible = eligible.len(), "Rewards checked");
    Ok(ok(eligible))
}

/// POST /api/rewards/unlock
///
/// 404 unknown user or reward, 400 not eligible, 409 already unlocked.
#[instrument(skip(state))]
pub async fn unlock_reward(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<UnlockRequest>,
) -> ApiResult<UnlockOutcome> {
    let outcome = state
        .rewards
        .unlock(&request.user_id, &request.reward_id, Utc::now())
        .await?;

    state.broker.add(NewNotification {
        kind: "reward".to_string(),
        title: "Recompensa desbloqueada".to_string(),
        message: format!(
            "Obtuviste \"{}\" y {} puntos extra",
            outcome.reward.name, outcome.reward.points
        ),
        priority: Priority::Medium,
        icon: outcome.reward.icon.clone(),
    });

    Ok(ok_with("Recompensa desbloqueada", outcome))
}

// ============================================================================
// NASA data and alerts
// ============================================================================

fn days_in_range(days: Option<u32>, default: u32, max: u32) -> Result<u32, ApiError> {
    let days = days.unwrap_or(default);
    if (1..=max).contains(&days) {
        Ok(days)
    } else {
        Err(ApiError::Validation(format!(
            "days debe estar entre 1 y {max}"
        )))
    }
}

/// GET /api/nasa/climate?days=7
///
/// Falls back to simulated data when NASA POWER is unavailable; `origin`
/// tells which one was served.
#[instrument(skip(state))]
pub async fn get_climate(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DaysQuery>,
) -> ApiResult<ClimateReport> {
    let days = days_in_range(query.days, DEFAULT_CLIMATE_DAYS, MAX_CLIMATE_DAYS)?;
    let report = state.environment.climate(days, Utc::now().date_naive()).await;
    info!(days, origin = ?report.origin, "Climate data served");
    Ok(ok(report))
}

/// GET /api/nasa/fires?days=2
#[instrument(skip(state))]
pub async fn get_fires(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<DaysQuery>,
) -> ApiResult<FireReport> {
    let days = days_in_range(query.days, DEFAULT_FIRE_DAYS, MAX_FIRE_DAYS)?;
    let report = state.environment.fires(days, Utc::now().date_naive()).await;
    info!(days, count = report.count, origin = ?report.origin, "Fire data served");
    Ok(ok(report))
}

/// GET /api/alerts/current - Alerts derived from the latest NASA data.
#[instrument(skip(state))]
pub async fn get_current_alerts(State(state): State<AppState>) -> Json<Envelope<CurrentAlerts>> {
    let now = Utc::now();
    let today = now.date_naive();
    let (climate, fires) = tokio::join!(
        state.environment.climate(DEFAULT_CLIMATE_DAYS, today),
        state.environment.fires(DEFAULT_FIRE_DAYS, today),
    );

    let current = derive_alerts(&climate, &fires, now);
    info!(
        total = current.summary.total,
        critical = current.summary.critical,
        "Current alerts computed"
    );
    ok(current)
}

// ============================================================================
// Notifications
// ============================================================================

/// GET /api/alerts/notifications?limit=20&unread=true&priority=high&type=fire
///
/// Newest first; filters combine.
#[instrument(skip(state))]
pub async fn list_notifications(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<NotificationsQuery>,
) -> ApiResult<Vec<Notification>> {
    let priority = query
        .priority
        .as_deref()
        .map(str::parse::<Priority>)
        .transpose()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let mut items = if query.unread {
        state.broker.get_unread()
    } else {
        state.broker.list(usize::MAX)
    };
    if let Some(priority) = priority {
        items.retain(|n| n.priority == priority);
    }
    if let Some(kind) = &query.kind {
        items.retain(|n| &n.kind == kind);
    }
    items.truncate(query.limit);

    Ok(ok(items))
}

/// POST /api/alerts/notifications
#[instrument(skip(state))]
pub async fn create_notification(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<NewNotification>,
) -> Result<(StatusCode, Json<Envelope<Notification>>), ApiError> {
    if request.title.trim().is_empty() || request.message.trim().is_empty() {
        return Err(ApiError::Validation(
            "title y message son obligatorios".to_string(),
        ));
    }
    let notification = state.broker.add(request);
    Ok((StatusCode::CREATED, ok(notification)))
}

#[derive(Debug, Serialize)]
pub struct Affected {
    pub count: usize,
}

/// PUT /api/alerts/notifications/:id/read
#[instrument(skip(state))]
pub async fn mark_read(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Affected> {
    if !state.broker.mark_as_read(&id) {
        return Err(notification_not_found(&id));
    }
    Ok(ok_with("Notificación marcada como leída", Affected { count: 1 }))
}

/// PUT /api/alerts/notifications/read-all
#[instrument(skip(state))]
pub async fn mark_all_read(State(state): State<AppState>) -> ApiResult<Affected> {
    let count = state.broker.mark_all_as_read();
    Ok(ok_with("Notificaciones marcadas como leídas", Affected { count }))
}

/// DELETE /api/alerts/notifications/:id
#[instrument(skip(state))]
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Affected> {
    if !state.broker.delete(&id) {
        return Err(notification_not_found(&id));
    }
    Ok(ok_with("Notificación eliminada", Affected { count: 1 }))
}

/// DELETE /api/alerts/notifications/cleanup?days=7
#[instrument(skip(state))]
pub async fn cleanup_notifications(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CleanupQuery>,
) -> ApiResult<Affected> {
    let count = state.broker.clean_older_than(query.days);
    Ok(ok_with("Notificaciones antiguas eliminadas", Affected { count }))
}

/// GET /api/alerts/notifications/stats
pub async fn notification_stats(State(state): State<AppState>) -> Json<Envelope<NotificationStats>> {
    ok(state.broker.stats())
}

fn notification_not_found(id: &str) -> ApiError {
    warn!(id = %id, "Notification not found");
    ApiError::NotFound(format!("Notificación no encontrada: {id}"))
}
