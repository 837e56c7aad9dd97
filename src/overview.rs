//! Dashboard figures
//!
//! Combines the aggregator's views with one-shot listings of the doctor,
//! patient and leave-request collections.

use serde::Serialize;

use crate::aggregator::AppointmentViews;
use crate::clock::Clock;
use crate::config::CollectionNames;
use crate::records::conversion::FromDocument;
use crate::records::LeaveRequestStatus;
use crate::store::{DocumentStore, StoreError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub sequence: u64,
    pub today_appointments: usize,
    pub pending_appointments: usize,
    pub today_revenue: i64,
    /// Today's appointments whose doctor has not been resolved; they add nothing to revenue.
    pub unresolved_today_doctors: usize,
    pub doctors: usize,
    pub patients: usize,
    pub leave_requests: usize,
    pub pending_leave_requests: usize,
}

/// Sum of resolved doctors' visiting fees over today's appointments.
pub fn today_revenue(views: &AppointmentViews) -> (i64, usize) {
    views.today.iter().fold((0, 0), |(revenue, unresolved), record| {
        match views.doctor_for(record) {
            Some(doctor) => (revenue.saturating_add(doctor.visiting_fees), unresolved),
            None => (revenue, unresolved + 1),
        }
    })
}

pub async fn build_overview(
    store: &dyn DocumentStore,
    clock: &dyn Clock,
    collections: &CollectionNames,
    views: &AppointmentViews,
) -> Result<Overview, StoreError> {
    let doctors = store.list_documents(&collections.doctors).await?;
    let patients = store.list_documents(&collections.patients).await?;
    let requests = store.list_documents(&collections.requests).await?;

    let today = clock.today();
    let pending_leave_requests = requests.iter()
        .filter(|doc| LeaveRequestStatus::from_document(doc, today) == LeaveRequestStatus::Pending)
        .count();
    let (today_revenue, unresolved_today_doctors) = today_revenue(views);

    Ok(Overview {
        sequence: views.sequence,
        today_appointments: views.today.len(),
        pending_appointments: views.pending.len(),
        today_revenue,
        unresolved_today_doctors,
        doctors: doctors.len(),
        patients: patients.len(),
        leave_requests: requests.len(),
        pending_leave_requests,
    })
}
