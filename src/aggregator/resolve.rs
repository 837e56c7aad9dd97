//! Point lookups that enrich appointments with doctor and patient summaries.
//!
//! Each lookup runs as its own task. Completion upserts into the matching
//! side table; nothing here gates publication of the appointment views.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::{AggregatorEvent, AppointmentAggregator};
use crate::records::conversion::FromDocument;
use crate::records::{DoctorSummary, PatientSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupTarget {
    Doctor,
    Patient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupOutcome {
    Resolved,
    Missing,   // no such document; any cached entry is kept
    Failed,    // store error; any cached entry is kept
    Skipped,   // aggregator torn down or result discarded as stale
}

/// Tally of one pass's lookups, available once they have all finished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolutionSummary {
    pub resolved: usize,
    pub missing: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl ResolutionSummary {
    pub fn record(&mut self, outcome: LookupOutcome) {
        match outcome {
            LookupOutcome::Resolved => self.resolved += 1,
            LookupOutcome::Missing => self.missing += 1,
            LookupOutcome::Failed => self.failed += 1,
            LookupOutcome::Skipped => self.skipped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.resolved + self.missing + self.failed + self.skipped
    }
}

impl AppointmentAggregator {
    pub(super) async fn resolve(self: Arc<Self>, target: LookupTarget, id: String, sequence: u64) -> LookupOutcome {
        let Ok(_permit) = self.lookup_permits.acquire().await else {
            return LookupOutcome::Skipped;
        };
        if !self.is_active() {
            return LookupOutcome::Skipped;
        }

        let collection = match target {
            LookupTarget::Doctor => self.collections.doctors.as_str(),
            LookupTarget::Patient => self.collections.patients.as_str(),
        };

        let document = match self.store.get_document(collection, &id).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                debug!(?target, id = %id, sequence, "Lookup found no document");
                return LookupOutcome::Missing;
            }
            Err(error) => {
                warn!(?target, id = %id, sequence, %error, "Lookup failed");
                self.emit(AggregatorEvent::LookupFailed { target, id, error });
                return LookupOutcome::Failed;
            }
        };

        let today = self.clock.today();
        let applied = match target {
            LookupTarget::Doctor => {
                let summary = DoctorSummary::from_document(&document, today);
                self.upsert(sequence, move |views| {
                    views.doctors_by_id.insert(id, summary);
                })
            }
            LookupTarget::Patient => {
                let summary = PatientSummary::from_document(&document, today);
                self.upsert(sequence, move |views| {
                    views.patients_by_id.insert(id, summary);
                })
            }
        };

        if applied {
            LookupOutcome::Resolved
        } else {
            LookupOutcome::Skipped
        }
    }
}
