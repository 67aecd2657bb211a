//! Points, levels, certificates and achievements.
//!
//! The ledger is the only writer of a user's `points`. Points grow
//! monotonically; certificates and achievements are recomputed from the
//! current totals on every read and are never stored.

use std::collections::HashMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::model::User;
use crate::storage::Storage;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    pub level: u32,
    pub name: String,
    pub points_required: i64,
    pub badge: String,
    pub certificate: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    pub name: String,
    pub points: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub level: u32,
    pub name: String,
    pub points_required: i64,
    pub obtained: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub unlocked: bool,
}

/// Outcome of crediting points to a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsAwarded {
    pub points_added: i64,
    pub new_total_points: i64,
    pub level_up: bool,
    pub new_level: Option<Level>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub user_id: String,
    pub name: String,
    pub current_level: Level,
    pub next_level: Option<Level>,
    pub total_points: i64,
    pub points_to_next: i64,
    pub progress_to_next: f64,
    pub certificates: Vec<Certificate>,
    pub achievements: Vec<Achievement>,
    pub activity_counts: HashMap<String, i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub user_id: String,
    pub name: String,
    pub points: i64,
    pub level: u32,
    pub level_name: String,
}

/// Upper bound for a leaderboard page.
pub const MAX_LEADERBOARD: u32 = 100;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Actividad no válida: {0}")]
    InvalidActivity(String),

    #[error("Usuario no encontrado: {0}")]
    UserNotFound(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<LedgerError> for ApiError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::InvalidActivity(_) => ApiError::Validation(e.to_string()),
            LedgerError::UserNotFound(_) => ApiError::NotFound(e.to_string()),
            LedgerError::Storage(inner) => ApiError::Internal(inner),
        }
    }
}

fn level(level: u32, name: &str, points_required: i64, badge: &str, certificate: Option<&str>) -> Level {
    Level {
        level,
        name: name.to_string(),
        points_required,
        badge: badge.to_string(),
        certificate: certificate.map(str::to_string),
    }
}

/// Ordered by `points_required`, strictly increasing.
static LEVELS: LazyLock<Vec<Level>> = LazyLock::new(|| {
    vec![
        level(1, "Ciudadano Curioso", 0, "🌱", None),
        level(2, "Explorador Urbano", 100, "🔍", Some("Certificado de Explorador Urbano")),
        level(3, "Guardián Verde", 300, "🌳", Some("Certificado de Guardián Verde")),
        level(4, "Agente de Cambio", 600, "⚡", Some("Certificado de Agente de Cambio")),
        level(5, "Líder Climático", 1000, "🏆", Some("Certificado de Líder Climático")),
    ]
});

pub mod activity {
    pub const COMPLETE_SIMULATION: &str = "complete_simulation";
    pub const VIEW_NASA_DATA: &str = "view_nasa_data";
    pub const SUBMIT_IDEA: &str = "submit_idea";
    pub const SUPPORT_PROJECT: &str = "support_project";
    pub const SHARE_RESULT: &str = "share_result";
    pub const DAILY_LOGIN: &str = "daily_login";
    pub const COMPLETE_PROFILE: &str = "complete_profile";
    pub const REPORT_ISSUE: &str = "report_environmental_issue";
}

static ACTIVITIES: LazyLock<Vec<Activity>> = LazyLock::new(|| {
    [
        (activity::COMPLETE_SIMULATION, "Completar una simulación", 10),
        (activity::VIEW_NASA_DATA, "Consultar datos de la NASA", 5),
        (activity::SUBMIT_IDEA, "Proponer una idea", 20),
        (activity::SUPPORT_PROJECT, "Apoyar un proyecto comunitario", 15),
        (activity::SHARE_RESULT, "Compartir un resultado", 10),
        (activity::DAILY_LOGIN, "Ingreso diario", 2),
        (activity::COMPLETE_PROFILE, "Completar el perfil", 25),
        (activity::REPORT_ISSUE, "Reportar un problema ambiental", 15),
    ]
    .into_iter()
    .map(|(id, name, points)| Activity {
        id: id.to_string(),
        name: name.to_string(),
        points,
    })
    .collect()
});

pub fn levels() -> &'static [Level] {
    &LEVELS
}

pub fn activities() -> &'static [Activity] {
    &ACTIVITIES
}

pub fn find_activity(id: &str) -> Option<&'static Activity> {
    ACTIVITIES.iter().find(|a| a.id == id)
}

/// Highest level whose requirement is met.
pub fn current_level(points: i64) -> &'static Level {
    LEVELS
        .iter()
        .rev()
        .find(|l| l.points_required <= points)
        .unwrap_or(&LEVELS[0])
}

/// First level not yet reached, `None` at the top.
pub fn next_level(points: i64) -> Option<&'static Level> {
    LEVELS.iter().find(|l| l.points_required > points)
}

/// Percent progress from `current` towards `next`, in `[0, 100]`.
pub fn progress_to_next(points: i64, current: &Level, next: Option<&Level>) -> f64 {
    let Some(next) = next else {
        return 100.0;
    };
    let span = (next.points_required - current.points_required) as f64;
    if span <= 0.0 {
        return 100.0;
    }
    let ratio = (points - current.points_required) as f64 / span;
    ratio.clamp(0.0, 1.0) * 100.0
}

/// Certificates derived from the current total.
///
/// A certificate counts as obtained while `points >= level * 100`; it is
/// not a permanent record.
pub fn certificates(points: i64) -> Vec<Certificate> {
    LEVELS
        .iter()
        .filter_map(|l| {
            l.certificate.as_ref().map(|name| {
                let points_required = i64::from(l.level) * 100;
                Certificate {
                    level: l.level,
                    name: name.clone(),
                    points_required,
                    obtained: points >= points_required,
                }
            })
        })
        .collect()
}

/// Achievements derived from points and activity counters.
pub fn achievements(points: i64, counts: &HashMap<String, i64>) -> Vec<Achievement> {
    let count = |id: &str| counts.get(id).copied().unwrap_or(0);

    let table: [(&str, &str, &str, &str, bool); 6] = [
        (
            "first_simulation",
            "Primera Simulación",
            "Completaste tu primera simulación",
            "🧪",
            count(activity::COMPLETE_SIMULATION) >= 1,
        ),
        (
            "urban_planner",
            "Planificador Urbano",
            "Completaste 10 simulaciones",
            "🏙️",
            count(activity::COMPLETE_SIMULATION) >= 10,
        ),
        (
            "idea_generator",
            "Generador de Ideas",
            "Propusiste tu primera idea",
            "💡",
            count(activity::SUBMIT_IDEA) >= 1,
        ),
        (
            "community_champion",
            "Campeón Comunitario",
            "Apoyaste 5 proyectos comunitarios",
            "🤝",
            count(activity::SUPPORT_PROJECT) >= 5,
        ),
        (
            "data_explorer",
            "Explorador de Datos",
            "Consultaste datos de la NASA 10 veces",
            "🛰️",
            count(activity::VIEW_NASA_DATA) >= 10,
        ),
        (
            "centurion",
            "Centurión",
            "Alcanzaste 100 puntos",
            "💯",
            points >= 100,
        ),
    ];

    table
        .into_iter()
        .map(|(id, name, description, icon, unlocked)| Achievement {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
            unlocked,
        })
        .collect()
}

/// Persisted points ledger.
#[derive(Clone)]
pub struct Ledger {
    storage: Storage,
}

impl Ledger {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    async fn load_user(&self, user_id: &str) -> Result<User, LedgerError> {
        self.storage
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| LedgerError::UserNotFound(user_id.to_string()))
    }

    /// Level, progress, certificates and achievements for a user.
    pub async fn progress(&self, user_id: &str) -> Result<UserProgress, LedgerError> {
        let user = self.load_user(user_id).await?;
        let counts = self.storage.activity_counts(user_id).await?;

        let current = current_level(user.points);
        let next = next_level(user.points);

        Ok(UserProgress {
            user_id: user.id,
            name: user.name,
            current_level: current.clone(),
            next_level: next.cloned(),
            total_points: user.points,
            points_to_next: next.map(|n| n.points_required - user.points).unwrap_or(0),
            progress_to_next: progress_to_next(user.points, current, next),
            certificates: certificates(user.points),
            achievements: achievements(user.points, &counts),
            activity_counts: counts,
        })
    }

    /// Top `limit` users (clamped to `1..=100`), best first.
    pub async fn leaderboard(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, LedgerError> {
        let users = self.storage.leaderboard(limit.clamp(1, MAX_LEADERBOARD)).await?;
        Ok(users
            .into_iter()
            .zip(1..)
            .map(|(user, rank)| {
                let level = current_level(user.points);
                LeaderboardEntry {
                    rank,
                    user_id: user.id,
                    name: user.name,
                    points: user.points,
                    level: level.level,
                    level_name: level.name.clone(),
                }
            })
            .collect())
    }

    /// Credit the points of `activity_id` to a user and count the activity.
    ///
    /// The read-modify-write is not guarded: two concurrent calls for the
    /// same user may lose one increment.
    pub async fn add_points(
        &self,
        user_id: &str,
        activity_id: &str,
        metadata: &serde_json::Value,
    ) -> Result<PointsAwarded, LedgerError> {
        let activity = find_activity(activity_id)
            .ok_or_else(|| LedgerError::InvalidActivity(activity_id.to_string()))?;

        let user = self.load_user(user_id).await?;
        let (awarded, level) = tally(&user, activity.points);
        if !self
            .storage
            .record_activity_points(user_id, activity_id, awarded.new_total_points, level)
            .await?
        {
            return Err(LedgerError::UserNotFound(user_id.to_string()));
        }

        info!(
            user_id = %user_id,
            activity = %activity_id,
            points = activity.points,
            total = awarded.new_total_points,
            level_up = awarded.level_up,
            metadata = %metadata,
            "Points added"
        );

        Ok(awarded)
    }

    /// Add `points` to `user` and persist the new total and level.
    pub(crate) async fn credit(&self, user: &User, points: i64) -> Result<PointsAwarded, LedgerError> {
        let (awarded, level) = tally(user, points);
        if !self
            .storage
            .update_user_points(&user.id, awarded.new_total_points, level)
            .await?
        {
            return Err(LedgerError::UserNotFound(user.id.clone()));
        }
        Ok(awarded)
    }
}

/// The award for adding `points` to `user`, plus the level to store.
fn tally(user: &User, points: i64) -> (PointsAwarded, u32) {
    let before = current_level(user.points);
    let new_total = user.points + points.max(0);
    let after = current_level(new_total);

    let level_up = after.level > before.level;
    let awarded = PointsAwarded {
        points_added: points.max(0),
        new_total_points: new_total,
        level_up,
        new_level: level_up.then(|| after.clone()),
    };
    (awarded, after.level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewUser;
    use chrono::Utc;

    #[test]
    fn test_levels_strictly_increasing() {
        for pair in levels().windows(2) {
            assert!(pair[0].points_required < pair[1].points_required);
            assert_eq!(pair[0].level + 1, pair[1].level);
        }
        assert_eq!(levels().len(), 5);
    }

    #[test]
    fn test_current_and_next_level() {
        assert_eq!(current_level(0).level, 1);
        assert_eq!(current_level(99).level, 1);
        assert_eq!(current_level(100).level, 2);
        assert_eq!(current_level(999).level, 4);
        assert_eq!(current_level(5000).level, 5);

        assert_eq!(next_level(0).unwrap().level, 2);
        assert_eq!(next_level(600).unwrap().level, 5);
        assert!(next_level(1000).is_none());
    }

    #[test]
    fn test_level_monotonicity() {
        let mut previous = 0;
        for points in 0..1500 {
            let level = current_level(points).level;
            assert!(level >= previous);
            previous = level;
        }
    }

    #[test]
    fn test_progress_bounds() {
        for points in 0..1500 {
            let current = current_level(points);
            let next = next_level(points);
            let p = progress_to_next(points, current, next);
            assert!((0.0..=100.0).contains(&p), "{points} -> {p}");
        }
        assert_eq!(progress_to_next(2000, current_level(2000), None), 100.0);
        assert_eq!(progress_to_next(200, current_level(200), next_level(200)), 50.0);
    }

    #[test]
    fn test_certificates_follow_points() {
        let certs = certificates(250);
        assert_eq!(certs.len(), 4);
        assert!(certs.iter().find(|c| c.level == 2).unwrap().obtained);
        assert!(!certs.iter().find(|c| c.level == 3).unwrap().obtained);
        assert_eq!(certs.iter().find(|c| c.level == 5).unwrap().points_required, 500);
    }

    #[test]
    fn test_achievements() {
        let mut counts = HashMap::new();
        counts.insert(activity::COMPLETE_SIMULATION.to_string(), 1);
        let list = achievements(40, &counts);
        let unlocked: Vec<_> = list.iter().filter(|a| a.unlocked).map(|a| a.id.as_str()).collect();
        assert_eq!(unlocked, vec!["first_simulation"]);

        counts.insert(activity::COMPLETE_SIMULATION.to_string(), 10);
        let list = achievements(120, &counts);
        assert!(list.iter().find(|a| a.id == "urban_planner").unwrap().unlocked);
        assert!(list.iter().find(|a| a.id == "centurion").unwrap().unlocked);
    }

    async fn ledger_with_user() -> (Ledger, User) {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let user = storage
            .create_user(
                &NewUser {
                    name: "María".to_string(),
                    email: "maria@example.com".to_string(),
                },
                Utc::now(),
            )
            .await
            .unwrap();
        (Ledger::new(storage), user)
    }

    #[tokio::test]
    async fn test_add_points_accumulates_and_levels_up() {
        let (ledger, user) = ledger_with_user().await;
        let meta = serde_json::Value::Null;

        let first = ledger
            .add_points(&user.id, activity::COMPLETE_PROFILE, &meta)
            .await
            .unwrap();
        assert_eq!(first.points_added, 25);
        assert_eq!(first.new_total_points, 25);
        assert!(!first.level_up);
        assert!(first.new_level.is_none());

        let mut last = first;
        for _ in 0..4 {
            last = ledger
                .add_points(&user.id, activity::SUBMIT_IDEA, &meta)
                .await
                .unwrap();
        }
        assert_eq!(last.new_total_points, 105);
        assert!(last.level_up);
        assert_eq!(last.new_level.unwrap().level, 2);

        let progress = ledger.progress(&user.id).await.unwrap();
        assert_eq!(progress.total_points, 105);
        assert_eq!(progress.current_level.level, 2);
        assert_eq!(progress.next_level.unwrap().level, 3);
        assert_eq!(progress.points_to_next, 195);
        assert_eq!(progress.activity_counts.get(activity::SUBMIT_IDEA), Some(&4));
        assert!(progress.achievements.iter().any(|a| a.id == "idea_generator" && a.unlocked));
    }

    #[tokio::test]
    async fn test_leaderboard_ranks() {
        let (ledger, first) = ledger_with_user().await;
        let second = ledger
            .storage
            .create_user(
                &NewUser {
                    name: "Jorge".to_string(),
                    email: "jorge@example.com".to_string(),
                },
                Utc::now(),
            )
            .await
            .unwrap();
        let meta = serde_json::Value::Null;
        ledger.add_points(&second.id, activity::SUBMIT_IDEA, &meta).await.unwrap();
        ledger.add_points(&first.id, activity::DAILY_LOGIN, &meta).await.unwrap();

        let board = ledger.leaderboard(10).await.unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].user_id, second.id);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[0].points, 20);
        assert_eq!(board[1].rank, 2);
        assert_eq!(board[1].level_name, "Ciudadano Curioso");

        assert_eq!(ledger.leaderboard(0).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_activity() {
        let (ledger, user) = ledger_with_user().await;
        let err = ledger
            .add_points(&user.id, "hack_the_planet", &serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidActivity(_)));
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (ledger, _) = ledger_with_user().await;
        let err = ledger
            .add_points("ghost", activity::DAILY_LOGIN, &serde_json::Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::UserNotFound(_)));

        assert!(matches!(
            ledger.progress("ghost").await.unwrap_err(),
            LedgerError::UserNotFound(_)
        ));
    }
}
