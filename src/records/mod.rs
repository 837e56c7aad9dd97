//! Typed hospital records
//!
//! Documents arrive from the store as untyped field maps. This module holds
//! the strongly-typed entities the aggregator publishes; the mapping from
//! field maps lives in [`conversion`] and never fails.

pub mod conversion;

use chrono::NaiveDate;
use serde::{Serialize, Deserialize};
use serde_json::{Map, Value};

/// Status every appointment and patient summary carries at construction.
pub const PENDING_STATUS: &str = "Pending";

/// A schemaless document as delivered by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Document {
            id: id.into(),
            fields,
        }
    }

    /// Builds a document from a JSON object; anything else yields no fields.
    pub fn from_json(id: impl Into<String>, value: Value) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Document::new(id, fields)
    }
}

/// One appointment from the live feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentRecord {
    pub id: String,
    pub doctor_id: String,
    pub patient_id: String,
    pub date: NaiveDate,
    pub time_slot: String,
    pub is_premium: bool,
    pub status: String,
    /// Set when `date` could not be parsed and was replaced by the current day.
    #[serde(default)]
    pub date_defaulted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorSummary {
    pub id: String,
    pub id_number: i64,
    pub name: String,
    pub contact_no: String,
    pub email: String,
    pub department: String,
    #[serde(rename = "imageURL")]
    pub image_url: String,
    pub visiting_fees: i64,  // smallest display unit
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientSummary {
    pub id: String,
    pub name: String,
    pub contact_number: String,
    pub dob: NaiveDate,
    pub profile_image: String,
    pub status: String,
}

/// Review state of a staff leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveRequestStatus {
    /// Case-insensitive parse; unknown or missing values read as pending.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("approved") => LeaveRequestStatus::Approved,
            Some("rejected") => LeaveRequestStatus::Rejected,
            _ => LeaveRequestStatus::Pending,
        }
    }
}
