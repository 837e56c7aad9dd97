//! Calendar-day helpers for bucketing appointments.

use chrono::{Datelike, Duration, NaiveDate};

use crate::records::AppointmentRecord;

/// Calendar-day equality; times of day never enter into it.
pub fn is_same_day(date: NaiveDate, day: NaiveDate) -> bool {
    date == day
}

/// Splits records into (today, pending), preserving feed order in both.
pub fn partition(records: &[AppointmentRecord], today: NaiveDate) -> (Vec<AppointmentRecord>, Vec<AppointmentRecord>) {
    records.iter()
        .cloned()
        .partition(|record| is_same_day(record.date, today))
}

/// Appointments booked on `day`, in feed order.
pub fn appointments_on(records: &[AppointmentRecord], day: NaiveDate) -> Vec<AppointmentRecord> {
    records.iter()
        .filter(|record| is_same_day(record.date, day))
        .cloned()
        .collect()
}

/// Sunday that opens the week containing `day`.
pub fn start_of_week(day: NaiveDate) -> NaiveDate {
    let back = day.weekday().num_days_from_sunday() as i64;
    day.checked_sub_signed(Duration::days(back)).unwrap_or(day)
}

/// The seven days of the week `week_offset` weeks away from the one holding `today`.
///
/// Days that fall outside the representable calendar are left out.
pub fn week_days(today: NaiveDate, week_offset: i64) -> Vec<NaiveDate> {
    let Some(first) = week_offset.checked_mul(7)
        .and_then(|days| start_of_week(today).checked_add_signed(Duration::try_days(days)?))
    else {
        return Vec::new();
    };

    (0..7)
        .filter_map(|i| first.checked_add_signed(Duration::days(i)))
        .collect()
}

/// Header label for a calendar page, e.g. "July 2024".
pub fn month_label(day: NaiveDate) -> String {
    day.format("%B %Y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::PENDING_STATUS;
    use pretty_assertions::assert_eq;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn appointment(id: &str, date: NaiveDate) -> AppointmentRecord {
        AppointmentRecord {
            id: id.to_string(),
            doctor_id: "d1".to_string(),
            patient_id: "p1".to_string(),
            date,
            time_slot: "10:00".to_string(),
            is_premium: false,
            status: PENDING_STATUS.to_string(),
            date_defaulted: false,
        }
    }

    #[test]
    fn partition_is_exhaustive_and_disjoint() {
        let today = day(2024, 7, 4);
        let records = vec![
            appointment("a1", today),
            appointment("a2", day(2024, 7, 5)),
            appointment("a3", day(2024, 7, 3)),
            appointment("a4", today),
        ];
        let (todays, pending) = partition(&records, today);

        let ids = |list: &[AppointmentRecord]| list.iter().map(|r| r.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(&todays), vec!["a1", "a4"]);
        assert_eq!(ids(&pending), vec!["a2", "a3"]);
        assert_eq!(todays.len() + pending.len(), records.len());
    }

    #[test]
    fn day_filter_selects_only_that_day() {
        let records = vec![
            appointment("a1", day(2024, 7, 4)),
            appointment("a2", day(2024, 7, 5)),
        ];
        let selected = appointments_on(&records, day(2024, 7, 5));
        assert_eq!(selected, vec![records[1].clone()]);
        assert!(appointments_on(&records, day(2025, 7, 5)).is_empty());
    }

    #[test]
    fn weeks_start_on_sunday() {
        // 4 July 2024 was a Thursday
        assert_eq!(start_of_week(day(2024, 7, 4)), day(2024, 6, 30));
        assert_eq!(start_of_week(day(2024, 6, 30)), day(2024, 6, 30));

        let current = week_days(day(2024, 7, 4), 0);
        assert_eq!(current.first(), Some(&day(2024, 6, 30)));
        assert_eq!(current.last(), Some(&day(2024, 7, 6)));
        assert_eq!(current.len(), 7);

        let next = week_days(day(2024, 7, 4), 1);
        assert_eq!(next[0], day(2024, 7, 7));
        let previous = week_days(day(2024, 7, 4), -1);
        assert_eq!(previous[0], day(2024, 6, 23));
    }

    #[test]
    fn absurd_week_offsets_yield_nothing() {
        assert!(week_days(day(2024, 7, 4), i64::MAX).is_empty());
    }

    #[test]
    fn month_label_uses_full_month_name() {
        assert_eq!(month_label(day(2024, 7, 4)), "July 2024");
    }
}
