use chrono::NaiveDate;
use serde_json::{Map, Value};

use super::{AppointmentRecord, Document, DoctorSummary, LeaveRequestStatus, PatientSummary, PENDING_STATUS};

/// Upstream textual date layout, e.g. "04 July 2024". Month names are English.
pub const DISPLAY_DATE_FORMAT: &str = "%d %B %Y";

/// Total mapping from an untyped document into a typed record.
///
/// Missing or mistyped fields fall back to defaults; `today` stands in for
/// dates that do not parse.
pub trait FromDocument: Sized {
    fn from_document(doc: &Document, today: NaiveDate) -> Self;
}

pub fn parse_display_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DISPLAY_DATE_FORMAT).ok()
}

pub fn format_display_date(date: NaiveDate) -> String {
    date.format(DISPLAY_DATE_FORMAT).to_string()
}

pub(crate) fn str_field(fields: &Map<String, Value>, key: &str) -> String {
    fields.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

pub(crate) fn bool_field(fields: &Map<String, Value>, key: &str) -> bool {
    fields.get(key).and_then(Value::as_bool).unwrap_or(false)
}

pub(crate) fn int_field(fields: &Map<String, Value>, key: &str) -> i64 {
    match fields.get(key) {
        Some(Value::Number(n)) => n.as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        _ => 0,
    }
}

impl FromDocument for AppointmentRecord {
    fn from_document(doc: &Document, today: NaiveDate) -> Self {
        let fields = &doc.fields;
        let parsed = fields.get("date")
            .and_then(Value::as_str)
            .and_then(parse_display_date);

        AppointmentRecord {
            // the id field, not the document key; an empty id is kept as-is
            id: str_field(fields, "id"),
            doctor_id: str_field(fields, "doctorId"),
            patient_id: str_field(fields, "patientId"),
            date: parsed.unwrap_or(today),
            time_slot: str_field(fields, "timeSlot"),
            is_premium: bool_field(fields, "isPremium"),
            status: PENDING_STATUS.to_string(),
            date_defaulted: parsed.is_none(),
        }
    }
}

impl FromDocument for DoctorSummary {
    fn from_document(doc: &Document, _today: NaiveDate) -> Self {
        let fields = &doc.fields;
        let id = match fields.get("id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => doc.id.clone(),
        };

        DoctorSummary {
            id,
            id_number: int_field(fields, "idNumber"),
            name: str_field(fields, "name"),
            contact_no: str_field(fields, "contactNo"),
            email: str_field(fields, "email"),
            department: str_field(fields, "department"),
            image_url: str_field(fields, "imageURL"),
            visiting_fees: int_field(fields, "visitingFees"),
        }
    }
}

impl FromDocument for PatientSummary {
    fn from_document(doc: &Document, today: NaiveDate) -> Self {
        let fields = &doc.fields;
        let dob = fields.get("dob")
            .and_then(Value::as_str)
            .and_then(parse_display_date)
            .unwrap_or(today);

        PatientSummary {
            id: doc.id.clone(),
            name: format!("{} {}", str_field(fields, "firstname"), str_field(fields, "lastname")),
            contact_number: str_field(fields, "contactNumber"),
            dob,
            profile_image: str_field(fields, "imageURL"),
            status: PENDING_STATUS.to_string(),
        }
    }
}

impl FromDocument for LeaveRequestStatus {
    fn from_document(doc: &Document, _today: NaiveDate) -> Self {
        LeaveRequestStatus::parse(doc.fields.get("status").and_then(Value::as_str))
    }
}
