//! Appointment aggregation
//!
//! Listens to the appointment feed and keeps a live projection of it:
//! - `all`, `today` and `pending` are rebuilt from every full snapshot and
//!   published together in one step
//! - `doctors_by_id` / `patients_by_id` are cleared with each snapshot and
//!   refilled by independent point lookups as they complete
//!
//! Side-table upserts are last-write-wins in completion order. A missing
//! entry means "not resolved yet", never "does not exist".

pub mod classify;
pub mod resolve;

pub use classify::{appointments_on, is_same_day, month_label, week_days};
pub use resolve::{LookupOutcome, LookupTarget, ResolutionSummary};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, oneshot, watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{AggregatorConfig, CollectionNames, Config};
use crate::records::conversion::FromDocument;
use crate::records::{AppointmentRecord, Document, DoctorSummary, PatientSummary};
use crate::store::{DocumentStore, StoreError, Subscription};

/// Everything the aggregator publishes, replaced as a unit per snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AppointmentViews {
    /// Number of the snapshot pass that produced `all`/`today`/`pending`; 0 before the first.
    pub sequence: u64,
    pub all: Vec<AppointmentRecord>,
    pub today: Vec<AppointmentRecord>,
    pub pending: Vec<AppointmentRecord>,
    pub doctors_by_id: HashMap<String, DoctorSummary>,
    pub patients_by_id: HashMap<String, PatientSummary>,
    /// Records in `all` whose date did not parse.
    pub dates_defaulted: usize,
}

impl AppointmentViews {
    pub fn doctor_for(&self, record: &AppointmentRecord) -> Option<&DoctorSummary> {
        self.doctors_by_id.get(&record.doctor_id)
    }

    pub fn patient_for(&self, record: &AppointmentRecord) -> Option<&PatientSummary> {
        self.patients_by_id.get(&record.patient_id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotStats {
    pub sequence: u64,
    pub total: usize,
    pub today: usize,
    pub pending: usize,
    pub dates_defaulted: usize,
    pub lookups_issued: usize,
}

/// Side channel for observers of the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregatorEvent {
    SnapshotApplied(SnapshotStats),
    FeedError(StoreError),
    LookupFailed {
        target: LookupTarget,
        id: String,
        error: StoreError,
    },
    ResolutionsSettled {
        sequence: u64,
        summary: ResolutionSummary,
    },
}

/// Result of one snapshot pass. Lookups keep running whether or not it is awaited.
#[derive(Debug)]
pub struct SnapshotPass {
    pub stats: SnapshotStats,
    settled: Option<JoinHandle<ResolutionSummary>>,
}

impl SnapshotPass {
    /// Waits until every lookup issued by this pass has finished.
    pub async fn settled(self) -> ResolutionSummary {
        match self.settled {
            Some(handle) => handle.await.unwrap_or_default(),
            None => ResolutionSummary::default(),
        }
    }
}

pub struct AppointmentAggregator {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    collections: CollectionNames,
    settings: AggregatorConfig,
    views: watch::Sender<AppointmentViews>,
    events: broadcast::Sender<AggregatorEvent>,
    lookup_permits: Semaphore,
    active: AtomicBool,
    next_sequence: AtomicU64,
}

impl AppointmentAggregator {
    pub fn new(store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>, config: &Config) -> Self {
        let settings = config.aggregator.clone();
        let (views, _) = watch::channel(AppointmentViews::default());
        let (events, _) = broadcast::channel(settings.event_buffer.max(1));

        AppointmentAggregator {
            store,
            clock,
            collections: config.collections.clone(),
            lookup_permits: Semaphore::new(settings.max_concurrent_lookups.max(1)),
            settings,
            views,
            events,
            active: AtomicBool::new(true),
            next_sequence: AtomicU64::new(0),
        }
    }

    /// Subscribes to the appointment collection and processes its snapshots
    /// in delivery order on a background task.
    pub async fn start(
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        config: &Config,
    ) -> Result<AggregatorHandle, StoreError> {
        let aggregator = Arc::new(Self::new(Arc::clone(&store), clock, config));
        let subscription = store.subscribe(&aggregator.collections.appointments).await?;
        info!(collection = %aggregator.collections.appointments, "Subscribed to appointment feed");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(Arc::clone(&aggregator).run(subscription, shutdown_rx));

        Ok(AggregatorHandle {
            aggregator,
            shutdown: shutdown_tx,
            task,
        })
    }

    async fn run(self: Arc<Self>, mut subscription: Subscription, mut shutdown: oneshot::Receiver<()>) {
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                update = subscription.next() => match update {
                    Some(Ok(snapshot)) => {
                        self.apply_snapshot(snapshot.documents);
                    }
                    Some(Err(error)) => self.report_feed_error(&error),
                    None => {
                        self.report_feed_error(&StoreError::Closed);
                        break;
                    }
                },
            }
        }

        subscription.unsubscribe();
        info!("Appointment feed detached");
    }

    /// Rebuilds every view from a full snapshot and fans out the lookups.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn apply_snapshot(self: &Arc<Self>, documents: Vec<Document>) -> SnapshotPass {
        let today = self.clock.today();
        let all: Vec<AppointmentRecord> = documents.iter()
            .map(|doc| AppointmentRecord::from_document(doc, today))
            .collect();
        let (todays, pending) = classify::partition(&all, today);
        let dates_defaulted = all.iter().filter(|r| r.date_defaulted).count();

        let lookups: Vec<(LookupTarget, String)> = all.iter()
            .flat_map(|r| [
                (LookupTarget::Doctor, r.doctor_id.clone()),
                (LookupTarget::Patient, r.patient_id.clone()),
            ])
            .collect();

        let sequence = self.next_sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let mut stats = SnapshotStats {
            sequence,
            total: all.len(),
            today: todays.len(),
            pending: pending.len(),
            dates_defaulted,
            lookups_issued: 0,
        };

        let published = self.views.send_if_modified(|views| {
            if !self.active.load(Ordering::Acquire) {
                return false;
            }
            *views = AppointmentViews {
                sequence,
                all,
                today: todays,
                pending,
                doctors_by_id: HashMap::new(),
                patients_by_id: HashMap::new(),
                dates_defaulted,
            };
            true
        });

        if !published {
            debug!(sequence, "Aggregator inactive, snapshot ignored");
            return SnapshotPass { stats, settled: None };
        }

        stats.lookups_issued = lookups.len();
        info!(
            sequence,
            total = stats.total,
            today = stats.today,
            pending = stats.pending,
            dates_defaulted,
            "Applied appointment snapshot"
        );
        self.emit(AggregatorEvent::SnapshotApplied(stats));

        let mut tasks = JoinSet::new();
        for (target, id) in lookups {
            tasks.spawn(Arc::clone(self).resolve(target, id, sequence));
        }

        let aggregator = Arc::clone(self);
        let settled = tokio::spawn(async move {
            let mut summary = ResolutionSummary::default();
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(outcome) => summary.record(outcome),
                    Err(error) => {
                        warn!(sequence, %error, "Lookup task did not complete");
                        summary.record(LookupOutcome::Failed);
                    }
                }
            }
            debug!(sequence, ?summary, "Lookups settled");
            aggregator.emit(AggregatorEvent::ResolutionsSettled { sequence, summary });
            summary
        });

        SnapshotPass { stats, settled: Some(settled) }
    }

    /// Reports a feed failure; published views stay as they were.
    pub fn report_feed_error(&self, error: &StoreError) {
        warn!(collection = %self.collections.appointments, %error, "Appointment feed error");
        self.emit(AggregatorEvent::FeedError(error.clone()));
    }

    /// Stops all further mutation. Once this returns no lookup still in
    /// flight can touch the views.
    pub fn deactivate(&self) {
        // runs under the views lock, so it orders against every upsert
        self.views.send_if_modified(|_| {
            self.active.store(false, Ordering::Release);
            false
        });
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Copy of the current views.
    pub fn views(&self) -> AppointmentViews {
        self.views.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<AppointmentViews> {
        self.views.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<AggregatorEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: AggregatorEvent) {
        // no listeners is fine
        let _ = self.events.send(event);
    }

    fn upsert(&self, sequence: u64, apply: impl FnOnce(&mut AppointmentViews)) -> bool {
        let discard_stale = self.settings.discard_stale_resolutions;
        self.views.send_if_modified(|views| {
            if !self.active.load(Ordering::Acquire) {
                return false;
            }
            if discard_stale && sequence < views.sequence {
                return false;
            }
            apply(views);
            true
        })
    }
}

/// Owner of a running aggregator started with [`AppointmentAggregator::start`].
#[derive(Debug)]
pub struct AggregatorHandle {
    aggregator: Arc<AppointmentAggregator>,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl AggregatorHandle {
    pub fn aggregator(&self) -> &Arc<AppointmentAggregator> {
        &self.aggregator
    }

    pub fn views(&self) -> AppointmentViews {
        self.aggregator.views()
    }

    pub fn watch(&self) -> watch::Receiver<AppointmentViews> {
        self.aggregator.watch()
    }

    pub fn events(&self) -> broadcast::Receiver<AggregatorEvent> {
        self.aggregator.events()
    }

    /// Deactivates the aggregator, detaches the feed and waits for the feed task.
    pub async fn shutdown(self) {
        self.aggregator.deactivate();
        let _ = self.shutdown.send(());
        if let Err(error) = self.task.await {
            warn!(%error, "Appointment feed task ended abnormally");
        }
    }
}

impl std::fmt::Debug for AppointmentAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppointmentAggregator")
            .field("collections", &self.collections)
            .field("settings", &self.settings)
            .field("active", &self.is_active())
            .field("sequence", &self.views.borrow().sequence)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::store::InMemoryStore;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn appointment(id: &str, date: &str) -> Document {
        Document::from_json(id, json!({
            "id": id,
            "doctorId": "d1",
            "patientId": "p1",
            "date": date,
            "timeSlot": "10:00",
            "isPremium": false,
        }))
    }

    async fn seeded_store() -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        store.put_document("Doctors", Document::from_json("d1", json!({
            "id": "d1", "name": "Dr. Rao", "visitingFees": 500,
        }))).await;
        store.put_document("Patient", Document::from_json("p1", json!({
            "firstname": "Ravi", "lastname": "Prasad",
        }))).await;
        store
    }

    fn aggregator(store: Arc<InMemoryStore>, today: NaiveDate) -> Arc<AppointmentAggregator> {
        Arc::new(AppointmentAggregator::new(
            store,
            Arc::new(FixedClock::new(today)),
            &Config::default(),
        ))
    }

    #[tokio::test]
    async fn snapshot_publishes_views_then_resolves() {
        let aggregator = aggregator(seeded_store().await, day(2024, 7, 4));

        let pass = aggregator.apply_snapshot(vec![
            appointment("a1", "04 July 2024"),
            appointment("a2", "05 July 2024"),
        ]);
        assert_eq!(pass.stats, SnapshotStats {
            sequence: 1,
            total: 2,
            today: 1,
            pending: 1,
            dates_defaulted: 0,
            lookups_issued: 4,
        });

        let views = aggregator.views();
        assert_eq!(views.sequence, 1);
        assert_eq!(views.today[0].id, "a1");
        assert_eq!(views.pending[0].id, "a2");

        let summary = pass.settled().await;
        assert_eq!(summary.resolved, 4);

        let views = aggregator.views();
        assert_eq!(views.doctor_for(&views.all[0]).map(|d| d.name.as_str()), Some("Dr. Rao"));
        assert_eq!(views.patient_for(&views.all[1]).map(|p| p.name.as_str()), Some("Ravi Prasad"));
    }

    #[tokio::test]
    async fn each_snapshot_clears_side_tables() {
        let aggregator = aggregator(seeded_store().await, day(2024, 7, 4));
        aggregator.apply_snapshot(vec![appointment("a1", "04 July 2024")]).settled().await;
        assert_eq!(aggregator.views().doctors_by_id.len(), 1);

        aggregator.apply_snapshot(vec![]).settled().await;
        let views = aggregator.views();
        assert_eq!(views.sequence, 2);
        assert!(views.all.is_empty());
        assert!(views.doctors_by_id.is_empty());
        assert!(views.patients_by_id.is_empty());
    }

    #[tokio::test]
    async fn deactivated_aggregator_ignores_snapshots() {
        let aggregator = aggregator(seeded_store().await, day(2024, 7, 4));
        aggregator.apply_snapshot(vec![appointment("a1", "04 July 2024")]).settled().await;

        aggregator.deactivate();
        assert!(!aggregator.is_active());

        let pass = aggregator.apply_snapshot(vec![]);
        assert_eq!(pass.stats.lookups_issued, 0);
        assert_eq!(pass.settled().await, ResolutionSummary::default());
        assert_eq!(aggregator.views().all.len(), 1);
    }

    #[tokio::test]
    async fn feed_error_leaves_views_and_emits_event() {
        let aggregator = aggregator(seeded_store().await, day(2024, 7, 4));
        aggregator.apply_snapshot(vec![appointment("a1", "04 July 2024")]).settled().await;
        let before = aggregator.views();
        let mut events = aggregator.events();

        aggregator.report_feed_error(&StoreError::PermissionDenied("rules".to_string()));

        assert_eq!(aggregator.views(), before);
        assert_eq!(
            events.recv().await.unwrap(),
            AggregatorEvent::FeedError(StoreError::PermissionDenied("rules".to_string()))
        );
    }
}
