//! Reward catalog and per-user eligibility.
//!
//! The catalog is static and never mutated; which rewards a user has
//! unlocked lives in storage, keyed by `(user_id, reward_id)`.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;
use crate::gamification::{Ledger, LedgerError, PointsAwarded, activity};
use crate::storage::Storage;

/// Unlock condition. `type` selects the comparator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Requirement {
    Simulations { count: i64 },
    Ideas { count: i64 },
    Projects { count: i64 },
    DataViews { count: i64 },
    Points { count: i64 },
    /// Leaderboard position at or above `count`.
    LeaderboardRank { count: u32 },
    ProfileCompleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub requirement: Requirement,
    /// Bonus credited when unlocked.
    pub points: i64,
}

/// Snapshot of what a user has done so far.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub simulations: i64,
    pub ideas: i64,
    pub projects: i64,
    pub data_views: i64,
    pub total_points: i64,
    pub leaderboard_rank: Option<u32>,
    pub profile_completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibleReward {
    pub reward: Reward,
    pub unlocked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardProgress {
    pub reward: Reward,
    pub current: f64,
    pub target: f64,
    pub progress_percent: f64,
    pub eligible: bool,
    pub unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnlockOutcome {
    pub reward: Reward,
    pub unlocked_at: DateTime<Utc>,
    pub points: PointsAwarded,
}

#[derive(Debug, thiserror::Error)]
pub enum RewardError {
    #[error("Recompensa no encontrada: {0}")]
    RewardNotFound(String),

    #[error("Usuario no encontrado: {0}")]
    UserNotFound(String),

    #[error("Aún no cumples los requisitos de la recompensa {0}")]
    NotEligible(String),

    #[error("La recompensa {0} ya fue desbloqueada")]
    AlreadyUnlocked(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<LedgerError> for RewardError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::UserNotFound(id) => RewardError::UserNotFound(id),
            LedgerError::InvalidActivity(id) => {
                RewardError::Storage(anyhow::anyhow!("invalid activity {id}"))
            }
            LedgerError::Storage(inner) => RewardError::Storage(inner),
        }
    }
}

impl From<RewardError> for ApiError {
    fn from(e: RewardError) -> Self {
        match e {
            RewardError::RewardNotFound(_) | RewardError::UserNotFound(_) => {
                ApiError::NotFound(e.to_string())
            }
            RewardError::NotEligible(_) => ApiError::Validation(e.to_string()),
            RewardError::AlreadyUnlocked(_) => ApiError::Conflict(e.to_string()),
            RewardError::Storage(inner) => ApiError::Internal(inner),
        }
    }
}

static CATALOG: LazyLock<Vec<Reward>> = LazyLock::new(|| {
    use Requirement::*;

    [
        ("eco_starter", "Eco Iniciado", "Completa tu primera simulación", "🌱", Simulations { count: 1 }, 10),
        ("climate_strategist", "Estratega Climático", "Completa 5 simulaciones", "🧭", Simulations { count: 5 }, 30),
        ("idea_seed", "Semilla de Ideas", "Propón 3 ideas para la ciudad", "💡", Ideas { count: 3 }, 25),
        ("community_ally", "Aliado Comunitario", "Apoya 3 proyectos comunitarios", "🤝", Projects { count: 3 }, 25),
        ("satellite_watcher", "Vigía Satelital", "Consulta datos de la NASA 5 veces", "🛰️", DataViews { count: 5 }, 15),
        ("green_ambassador", "Embajador Verde", "Acumula 500 puntos", "🌎", Points { count: 500 }, 50),
        ("top_ten", "Top 10 Ciudadano", "Ubícate entre los 10 primeros del ranking", "🏅", LeaderboardRank { count: 10 }, 40),
        ("profile_complete", "Perfil Completo", "Completa tu perfil", "🪪", ProfileCompleted, 5),
    ]
    .into_iter()
    .map(|(id, name, description, icon, requirement, points)| Reward {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        icon: icon.to_string(),
        requirement,
        points,
    })
    .collect()
});

pub fn catalog() -> &'static [Reward] {
    &CATALOG
}

pub fn find_reward(id: &str) -> Option<&'static Reward> {
    CATALOG.iter().find(|r| r.id == id)
}

/// `(current, target, satisfied)` for one requirement.
fn evaluate(requirement: Requirement, stats: &UserStats) -> (f64, f64, bool) {
    let at_least = |current: i64, target: i64| (current as f64, target as f64, current >= target);

    match requirement {
        Requirement::Simulations { count } => at_least(stats.simulations, count),
        Requirement::Ideas { count } => at_least(stats.ideas, count),
        Requirement::Projects { count } => at_least(stats.projects, count),
        Requirement::DataViews { count } => at_least(stats.data_views, count),
        Requirement::Points { count } => at_least(stats.total_points, count),
        Requirement::LeaderboardRank { count } => match stats.leaderboard_rank {
            Some(rank) => (f64::from(rank), f64::from(count), rank <= count),
            None => (0.0, f64::from(count), false),
        },
        Requirement::ProfileCompleted => {
            let done = stats.profile_completed;
            (if done { 1.0 } else { 0.0 }, 1.0, done)
        }
    }
}

fn progress_percent(requirement: Requirement, current: f64, target: f64, satisfied: bool) -> f64 {
    if satisfied {
        return 100.0;
    }
    match requirement {
        // Lower is better; no partial credit outside the threshold.
        Requirement::LeaderboardRank { .. } => 0.0,
        _ if target > 0.0 => ((current / target) * 100.0).clamp(0.0, 100.0).round(),
        _ => 0.0,
    }
}

/// Rewards satisfied by `stats` that are not in `unlocked`, stamped with
/// `now`.
pub fn check_eligibility<T>(
    stats: &UserStats,
    unlocked: &HashMap<String, T>,
    now: DateTime<Utc>,
) -> Vec<EligibleReward> {
    catalog()
        .iter()
        .filter(|r| !unlocked.contains_key(&r.id))
        .filter(|r| evaluate(r.requirement, stats).2)
        .map(|r| EligibleReward {
            reward: r.clone(),
            unlocked_at: now,
        })
        .collect()
}

/// Rewards backed by storage and the points ledger.
#[derive(Clone)]
pub struct RewardsService {
    storage: Storage,
    ledger: Ledger,
}

impl RewardsService {
    pub fn new(storage: Storage, ledger: Ledger) -> Self {
        Self { storage, ledger }
    }

    /// Build the stats snapshot for a user from counters and ranking.
    pub async fn stats_for(&self, user_id: &str) -> Result<UserStats, RewardError> {
        let user = self
            .storage
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| RewardError::UserNotFound(user_id.to_string()))?;
        let counts = self.storage.activity_counts(user_id).await?;
        let rank = self.storage.user_rank(user_id).await?;

        let count = |id: &str| counts.get(id).copied().unwrap_or(0);

        Ok(UserStats {
            simulations: count(activity::COMPLETE_SIMULATION),
            ideas: count(activity::SUBMIT_IDEA),
            projects: count(activity::SUPPORT_PROJECT),
            data_views: count(activity::VIEW_NASA_DATA),
            total_points: user.points,
            leaderboard_rank: rank,
            profile_completed: count(activity::COMPLETE_PROFILE) > 0,
        })
    }

    /// Newly eligible rewards for a user. Does not unlock anything.
    pub async fn check(&self, user_id: &str, now: DateTime<Utc>) -> Result<Vec<EligibleReward>, RewardError> {
        let stats = self.stats_for(user_id).await?;
        let unlocked = self.storage.user_rewards(user_id).await?;
        Ok(check_eligibility(&stats, &unlocked, now))
    }

    /// Progress towards every reward in the catalog.
    pub async fn progress(&self, user_id: &str) -> Result<Vec<RewardProgress>, RewardError> {
        let stats = self.stats_for(user_id).await?;
        let unlocked = self.storage.user_rewards(user_id).await?;

        Ok(catalog()
            .iter()
            .map(|reward| {
                let (current, target, satisfied) = evaluate(reward.requirement, &stats);
                let unlocked_at = unlocked.get(&reward.id).copied();
                RewardProgress {
                    reward: reward.clone(),
                    current,
                    target,
                    progress_percent: progress_percent(reward.requirement, current, target, satisfied),
                    eligible: satisfied && unlocked_at.is_none(),
                    unlocked: unlocked_at.is_some(),
                    unlocked_at,
                }
            })
            .collect())
    }

    /// Unlock a reward for one user and credit its bonus points.
    pub async fn unlock(
        &self,
        user_id: &str,
        reward_id: &str,
        now: DateTime<Utc>,
    ) -> Result<UnlockOutcome, RewardError> {
        let reward =
            find_reward(reward_id).ok_or_else(|| RewardError::RewardNotFound(reward_id.to_string()))?;

        let stats = self.stats_for(user_id).await?;
        let unlocked = self.storage.user_rewards(user_id).await?;
        if unlocked.contains_key(reward_id) {
            return Err(RewardError::AlreadyUnlocked(reward_id.to_string()));
        }
        if !evaluate(reward.requirement, &stats).2 {
            return Err(RewardError::NotEligible(reward_id.to_string()));
        }

        if !self.storage.insert_user_reward(user_id, reward_id, now).await? {
            return Err(RewardError::AlreadyUnlocked(reward_id.to_string()));
        }

        // Re-read so the credit starts from the latest total.
        let user = self
            .storage
            .get_user_by_id(user_id)
            .await?
            .ok_or_else(|| RewardError::UserNotFound(user_id.to_string()))?;
        let points = self.ledger.credit(&user, reward.points).await?;

        info!(
            user_id = %user_id,
            reward = %reward_id,
            bonus = reward.points,
            total = points.new_total_points,
            "Reward unlocked"
        );

        Ok(UnlockOutcome {
            reward: reward.clone(),
            unlocked_at: now,
            points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewUser;

    fn stats() -> UserStats {
        UserStats::default()
    }

    #[test]
    fn test_catalog_ids_unique() {
        let mut ids: Vec<_> = catalog().iter().map(|r| r.id.as_str()).collect();
        let before = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[test]
    fn test_requirement_serialization() {
        let json = serde_json::to_value(Requirement::Simulations { count: 5 }).unwrap();
        assert_eq!(json["type"], "simulations");
        assert_eq!(json["count"], 5);
        let json = serde_json::to_value(Requirement::ProfileCompleted).unwrap();
        assert_eq!(json["type"], "profile_completed");
    }

    #[test]
    fn test_comparators() {
        let mut s = stats();
        assert!(!evaluate(Requirement::Simulations { count: 1 }, &s).2);
        s.simulations = 1;
        assert!(evaluate(Requirement::Simulations { count: 1 }, &s).2);

        assert!(!evaluate(Requirement::LeaderboardRank { count: 10 }, &s).2);
        s.leaderboard_rank = Some(11);
        assert!(!evaluate(Requirement::LeaderboardRank { count: 10 }, &s).2);
        s.leaderboard_rank = Some(10);
        assert!(evaluate(Requirement::LeaderboardRank { count: 10 }, &s).2);

        assert!(!evaluate(Requirement::ProfileCompleted, &s).2);
        s.profile_completed = true;
        assert!(evaluate(Requirement::ProfileCompleted, &s).2);
    }

    #[test]
    fn test_check_eligibility_skips_unlocked() {
        let now = Utc::now();
        let s = UserStats {
            simulations: 5,
            leaderboard_rank: Some(3),
            ..stats()
        };

        let none: HashMap<String, DateTime<Utc>> = HashMap::new();
        let ids: Vec<_> = check_eligibility(&s, &none, now)
            .into_iter()
            .map(|e| e.reward.id)
            .collect();
        assert_eq!(ids, vec!["eco_starter", "climate_strategist", "top_ten"]);

        let mut unlocked = HashMap::new();
        unlocked.insert("eco_starter".to_string(), now);
        let eligible = check_eligibility(&s, &unlocked, now);
        assert_eq!(eligible.len(), 2);
        assert!(eligible.iter().all(|e| e.unlocked_at == now));
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(Requirement::Ideas { count: 3 }, 1.0, 3.0, false), 33.0);
        assert_eq!(progress_percent(Requirement::Ideas { count: 3 }, 4.0, 3.0, true), 100.0);
        assert_eq!(
            progress_percent(Requirement::LeaderboardRank { count: 10 }, 12.0, 10.0, false),
            0.0
        );
    }

    async fn service_with_user() -> (RewardsService, Ledger, String) {
        let storage = Storage::new("sqlite::memory:").await.unwrap();
        let user = storage
            .create_user(
                &NewUser {
                    name: "Carlos".to_string(),
                    email: "carlos@example.com".to_string(),
                },
                Utc::now(),
            )
            .await
            .unwrap();
        let ledger = Ledger::new(storage.clone());
        (RewardsService::new(storage, ledger.clone()), ledger, user.id)
    }

    #[tokio::test]
    async fn test_unlock_flow() {
        let (service, ledger, user_id) = service_with_user().await;
        let now = Utc::now();
        let meta = serde_json::Value::Null;

        let err = service.unlock(&user_id, "eco_starter", now).await.unwrap_err();
        assert!(matches!(err, RewardError::NotEligible(_)));

        ledger
            .add_points(&user_id, activity::COMPLETE_SIMULATION, &meta)
            .await
            .unwrap();

        let eligible = service.check(&user_id, now).await.unwrap();
        assert!(eligible.iter().any(|e| e.reward.id == "eco_starter"));

        let outcome = service.unlock(&user_id, "eco_starter", now).await.unwrap();
        assert_eq!(outcome.points.points_added, 10);
        assert_eq!(outcome.points.new_total_points, 20);

        let err = service.unlock(&user_id, "eco_starter", now).await.unwrap_err();
        assert!(matches!(err, RewardError::AlreadyUnlocked(_)));

        let eligible = service.check(&user_id, now).await.unwrap();
        assert!(!eligible.iter().any(|e| e.reward.id == "eco_starter"));

        let progress = service.progress(&user_id).await.unwrap();
        let eco = progress.iter().find(|p| p.reward.id == "eco_starter").unwrap();
        assert!(eco.unlocked);
        assert!(!eco.eligible);
    }

    #[tokio::test]
    async fn test_unlock_is_per_user() {
        let (service, ledger, first) = service_with_user().await;
        let now = Utc::now();
        let meta = serde_json::Value::Null;

        let second = service
            .storage
            .create_user(
                &NewUser {
                    name: "Rosa".to_string(),
                    email: "rosa@example.com".to_string(),
                },
                now,
            )
            .await
            .unwrap()
            .id;

        for id in [&first, &second] {
            ledger
                .add_points(id, activity::COMPLETE_SIMULATION, &meta)
                .await
                .unwrap();
        }

        service.unlock(&first, "eco_starter", now).await.unwrap();
        let eligible = service.check(&second, now).await.unwrap();
        assert!(eligible.iter().any(|e| e.reward.id == "eco_starter"));
        service.unlock(&second, "eco_starter", now).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_reward_and_user() {
        let (service, _, user_id) = service_with_user().await;
        let now = Utc::now();
        assert!(matches!(
            service.unlock(&user_id, "nope", now).await.unwrap_err(),
            RewardError::RewardNotFound(_)
        ));
        assert!(matches!(
            service.unlock("ghost", "eco_starter", now).await.unwrap_err(),
            RewardError::UserNotFound(_)
        ));
    }
}
