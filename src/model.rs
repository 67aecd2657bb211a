//! Shared records and HTTP request/query types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered participant.
///
/// `points` only ever grows; it is written exclusively by the
/// gamification ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub points: i64,
    pub level: u32,
    pub created_at: DateTime<Utc>,
}

/// Request body for POST /api/users.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
}

/// Request body for POST /api/simulations/simulate.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulateRequest {
    #[serde(default)]
    pub strategy_id: Option<String>,
    /// Whole percent; fractional or negative values are rejected by the handler.
    pub intensity: Option<f64>,
    #[serde(default)]
    pub duration: Option<u32>,
}

/// Request body for POST /api/gamification/add-points.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddPointsRequest {
    pub user_id: String,
    pub activity_id: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Request body for POST /api/rewards/unlock.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockRequest {
    pub user_id: String,
    pub reward_id: String,
}

/// Request body for POST /api/rewards/check.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRewardsRequest {
    pub user_id: String,
}

/// Query parameters for GET /api/gamification/leaderboard.
#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    #[serde(default = "default_leaderboard_limit")]
    pub limit: u32,
}

fn default_leaderboard_limit() -> u32 {
    10
}

/// Query parameters for the NASA data endpoints.
#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    pub days: Option<u32>,
}

/// Query parameters for GET /api/alerts/notifications.
#[derive(Debug, Deserialize)]
pub struct NotificationsQuery {
    #[serde(default = "default_notifications_limit")]
    pub limit: usize,
    #[serde(default)]
    pub unread: bool,
    pub priority: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

fn default_notifications_limit() -> usize {
    20
}

/// Query parameters for DELETE /api/alerts/notifications/cleanup.
#[derive(Debug, Deserialize)]
pub struct CleanupQuery {
    #[serde(default = "default_cleanup_days")]
    pub days: u32,
}

fn default_cleanup_days() -> u32 {
    7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulate_request_optional_fields() {
        let req: SimulateRequest =
            serde_json::from_str(r#"{"strategyId":"reforestation","intensity":50}"#).unwrap();
        assert_eq!(req.strategy_id.as_deref(), Some("reforestation"));
        assert_eq!(req.intensity, Some(50.0));
        assert!(req.duration.is_none());

        let empty: SimulateRequest = serde_json::from_str("{}").unwrap();
        assert!(empty.strategy_id.is_none());
        assert!(empty.intensity.is_none());
    }

    #[test]
    fn test_add_points_metadata_defaults_to_null() {
        let req: AddPointsRequest =
            serde_json::from_str(r#"{"userId":"u1","activityId":"daily_login"}"#).unwrap();
        assert!(req.metadata.is_null());
    }

    #[test]
    fn test_query_defaults() {
        let q: LeaderboardQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.limit, 10);
        let q: CleanupQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q.days, 7);
    }
}
