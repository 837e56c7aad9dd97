//! hmsfeed: live appointment aggregation for a hospital back-office
//!
//! hmsfeed listens to the appointment collection of a hosted document store,
//! enriches each appointment with its doctor and patient, and keeps
//! "today" and "pending" partitions that dashboards can read at any time.

pub mod aggregator;
pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod overview;
pub mod records;
pub mod store;

pub use aggregator::{AggregatorEvent, AggregatorHandle, AppointmentAggregator, AppointmentViews};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{load_config, Config};
pub use error::HmsError;
pub use records::{AppointmentRecord, Document, DoctorSummary, PatientSummary};
pub use store::{DocumentStore, InMemoryStore, StoreError};
