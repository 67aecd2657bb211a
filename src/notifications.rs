//! Process-local notification broker.
//!
//! Notifications live in a [`NotificationStore`] (the bundled
//! [`MemoryStore`] keeps the 50 most recent, newest first). Every insert is
//! published on a broadcast channel so subscribers see new notifications as
//! they arrive. A [`NotificationScheduler`] drives the two background
//! producers and can be stopped.
//!
//! A notification is either unread, read, or gone.

use std::collections::VecDeque;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::random::RandomSource;

/// Ring buffer capacity of [`MemoryStore`].
pub const MAX_NOTIFICATIONS: usize = 50;

/// Probability that a critical tick actually emits.
pub const CRITICAL_PROBABILITY: f64 = 0.3;

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Info,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Info => "info",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("Prioridad no válida: {0}")]
pub struct UnknownPriority(String);

impl FromStr for Priority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Priority::Info),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            _ => Err(UnknownPriority(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub priority: Priority,
    pub icon: String,
    pub read: bool,
}

/// Fields supplied by a producer; the broker assigns id, timestamp and `read`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewNotification {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    #[serde(default = "default_icon")]
    pub icon: String,
}

fn default_icon() -> String {
    "🔔".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityCounts {
    pub info: usize,
    pub medium: usize,
    pub high: usize,
    pub critical: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStats {
    pub total: usize,
    pub unread: usize,
    pub by_priority: PriorityCounts,
}

// ============================================================================
// Clock and store seams
// ============================================================================

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Backing storage for notifications.
///
/// Implementations return notifications newest first.
pub trait NotificationStore: Send {
    fn insert(&mut self, notification: Notification);

    fn snapshot(&self) -> Vec<Notification>;

    /// `false` if `id` is unknown.
    fn mark_read(&mut self, id: &str) -> bool;

    /// Number of notifications that changed state.
    fn mark_all_read(&mut self) -> usize;

    /// `false` if `id` is unknown.
    fn remove(&mut self, id: &str) -> bool;

    /// Drop everything stamped before `cutoff`; returns how many went.
    fn remove_before(&mut self, cutoff: DateTime<Utc>) -> usize;
}

/// Bounded in-memory store; inserting past capacity evicts the oldest.
pub struct MemoryStore {
    buffer: VecDeque<Notification>,
    capacity: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_NOTIFICATIONS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationStore for MemoryStore {
    fn insert(&mut self, notification: Notification) {
        self.buffer.push_front(notification);
        self.buffer.truncate(self.capacity);
    }

    fn snapshot(&self) -> Vec<Notification> {
        self.buffer.iter().cloned().collect()
    }

    fn mark_read(&mut self, id: &str) -> bool {
        match self.buffer.iter_mut().find(|n| n.id == id) {
            Some(n) => {
                n.read = true;
                true
            }
            None => false,
        }
    }

    fn mark_all_read(&mut self) -> usize {
        let mut changed = 0;
        for n in self.buffer.iter_mut().filter(|n| !n.read) {
            n.read = true;
            changed += 1;
        }
        changed
    }

    fn remove(&mut self, id: &str) -> bool {
        let before = self.buffer.len();
        self.buffer.retain(|n| n.id != id);
        self.buffer.len() < before
    }

    fn remove_before(&mut self, cutoff: DateTime<Utc>) -> usize {
        let before = self.buffer.len();
        self.buffer.retain(|n| n.timestamp >= cutoff);
        before - self.buffer.len()
    }
}

// ============================================================================
// Broker
// ============================================================================

struct Inner {
    store: Mutex<Box<dyn NotificationStore>>,
    rng: Mutex<Box<dyn RandomSource>>,
    clock: Arc<dyn Clock>,
    events: broadcast::Sender<Notification>,
    seq: AtomicU64,
}

/// Shared handle to the notification broker.
#[derive(Clone)]
pub struct NotificationBroker {
    inner: Arc<Inner>,
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

type Canned = (&'static str, &'static str, &'static str, Priority, &'static str);

const INFORMATIONAL: [Canned; 5] = [
    (
        "tip",
        "Consejo verde",
        "Plantar árboles nativos como el toborochi ayuda a bajar la temperatura de tu barrio.",
        Priority::Info,
        "🌳",
    ),
    (
        "air_quality",
        "Calidad del aire",
        "La calidad del aire en Santa Cruz es moderada hoy. Considera usar transporte público.",
        Priority::Info,
        "🌬️",
    ),
    (
        "community",
        "Nueva idea comunitaria",
        "Vecinos del Plan 3000 propusieron un huerto urbano. ¡Súmate con tu apoyo!",
        Priority::Info,
        "💡",
    ),
    (
        "nasa_data",
        "Datos NASA actualizados",
        "Ya están disponibles los datos climáticos más recientes de NASA POWER para la ciudad.",
        Priority::Info,
        "🛰️",
    ),
    (
        "challenge",
        "Reto semanal",
        "Completa 3 simulaciones esta semana y gana puntos extra.",
        Priority::Medium,
        "🏅",
    ),
];

const CRITICAL: [Canned; 3] = [
    (
        "fire",
        "Alerta de incendio",
        "Se detectaron focos de calor activos a menos de 50 km de la ciudad.",
        Priority::Critical,
        "🔥",
    ),
    (
        "heat",
        "Ola de calor",
        "Se esperan temperaturas superiores a 38 °C. Mantente hidratado y evita el sol del mediodía.",
        Priority::Critical,
        "🌡️",
    ),
    (
        "flood",
        "Riesgo de inundación",
        "Lluvias intensas pueden provocar anegamientos en zonas bajas de la ciudad.",
        Priority::High,
        "🌊",
    ),
];

fn canned(entry: &Canned) -> NewNotification {
    let (kind, title, message, priority, icon) = *entry;
    NewNotification {
        kind: kind.to_string(),
        title: title.to_string(),
        message: message.to_string(),
        priority,
        icon: icon.to_string(),
    }
}

impl NotificationBroker {
    pub fn new(
        store: Box<dyn NotificationStore>,
        clock: Arc<dyn Clock>,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                store: Mutex::new(store),
                rng: Mutex::new(rng),
                clock,
                events,
                seq: AtomicU64::new(0),
            }),
        }
    }

    /// In-memory store and the system clock.
    pub fn in_memory(rng: Box<dyn RandomSource>) -> Self {
        Self::new(Box::new(MemoryStore::new()), Arc::new(SystemClock), rng)
    }

    /// Receive every notification added from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.inner.events.subscribe()
    }

    /// Stamp, store and publish a notification.
    pub fn add(&self, new: NewNotification) -> Notification {
        let timestamp = self.inner.clock.now();
        let seq = self.inner.seq.fetch_add(1, Ordering::Relaxed);
        let notification = Notification {
            id: format!("{}-{}", timestamp.timestamp_millis(), seq),
            kind: new.kind,
            title: new.title,
            message: new.message,
            timestamp,
            priority: new.priority,
            icon: new.icon,
            read: false,
        };

        lock(&self.inner.store).insert(notification.clone());

        // No receivers is fine.
        let _ = self.inner.events.send(notification.clone());

        debug!(id = %notification.id, kind = %notification.kind, "Notification added");
        notification
    }

    /// Up to `limit` notifications, newest first.
    pub fn list(&self, limit: usize) -> Vec<Notification> {
        let mut all = lock(&self.inner.store).snapshot();
        all.truncate(limit);
        all
    }

    pub fn get_unread(&self) -> Vec<Notification> {
        self.filtered(|n| !n.read)
    }

    pub fn get_by_priority(&self, priority: Priority) -> Vec<Notification> {
        self.filtered(|n| n.priority == priority)
    }

    pub fn get_by_type(&self, kind: &str) -> Vec<Notification> {
        self.filtered(|n| n.kind == kind)
    }

    fn filtered(&self, keep: impl Fn(&Notification) -> bool) -> Vec<Notification> {
        lock(&self.inner.store)
            .snapshot()
            .into_iter()
            .filter(|n| keep(n))
            .collect()
    }

    pub fn mark_as_read(&self, id: &str) -> bool {
        lock(&self.inner.store).mark_read(id)
    }

    pub fn mark_all_as_read(&self) -> usize {
        lock(&self.inner.store).mark_all_read()
    }

    pub fn delete(&self, id: &str) -> bool {
        lock(&self.inner.store).remove(id)
    }

    /// Remove notifications older than `days` days.
    ///
    /// A window reaching past the representable date range removes nothing.
    pub fn clean_older_than(&self, days: u32) -> usize {
        let Some(cutoff) = chrono::Duration::try_days(i64::from(days))
            .and_then(|window| self.inner.clock.now().checked_sub_signed(window))
        else {
            return 0;
        };
        let removed = lock(&self.inner.store).remove_before(cutoff);
        if removed > 0 {
            info!(removed, days, "Old notifications cleaned");
        }
        removed
    }

    pub fn stats(&self) -> NotificationStats {
        let all = lock(&self.inner.store).snapshot();
        let mut stats = NotificationStats {
            total: all.len(),
            ..Default::default()
        };
        for n in &all {
            if !n.read {
                stats.unread += 1;
            }
            match n.priority {
                Priority::Info => stats.by_priority.info += 1,
                Priority::Medium => stats.by_priority.medium += 1,
                Priority::High => stats.by_priority.high += 1,
                Priority::Critical => stats.by_priority.critical += 1,
            }
        }
        stats
    }

    /// Add one of the canned informational notifications at random.
    pub fn emit_informational(&self) -> Notification {
        let idx = lock(&self.inner.rng).pick(INFORMATIONAL.len());
        self.add(canned(&INFORMATIONAL[idx]))
    }

    /// With [`CRITICAL_PROBABILITY`], add one of the canned critical
    /// notifications.
    pub fn maybe_emit_critical(&self) -> Option<Notification> {
        let idx = {
            let mut rng = lock(&self.inner.rng);
            if !rng.chance(CRITICAL_PROBABILITY) {
                return None;
            }
            rng.pick(CRITICAL.len())
        };
        Some(self.add(canned(&CRITICAL[idx])))
    }
}

// ============================================================================
// Scheduler
// ============================================================================

/// Spawns the periodic producers.
pub struct NotificationScheduler;

/// Running producers; dropping the handle leaves them running.
pub struct SchedulerHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl NotificationScheduler {
    /// Start both producers on the current tokio runtime.
    ///
    /// The first informational notification fires after `info_every`, the
    /// first critical roll after `critical_every`.
    pub fn start(
        broker: NotificationBroker,
        info_every: Duration,
        critical_every: Duration,
    ) -> SchedulerHandle {
        info!(
            info_secs = info_every.as_secs(),
            critical_secs = critical_every.as_secs(),
            "Notification scheduler started"
        );

        let informational = tokio::spawn(produce(broker.clone(), info_every, |b| {
            b.emit_informational();
        }));
        let critical = tokio::spawn(produce(broker, critical_every, |b| {
            b.maybe_emit_critical();
        }));

        SchedulerHandle {
            tasks: vec![informational, critical],
        }
    }
}

impl SchedulerHandle {
    pub fn stop(self) {
        for task in &self.tasks {
            task.abort();
        }
        info!("Notification scheduler stopped");
    }
}

async fn produce(broker: NotificationBroker, every: Duration, tick: fn(&NotificationBroker)) {
    let mut interval = tokio::time::interval_at(Instant::now() + every, every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        tick(&broker);
    }
}
