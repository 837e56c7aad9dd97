use std::convert::Infallible;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use warp::reply::Json;
use warp::Filter;

use crate::aggregator::{appointments_on, AppointmentAggregator};
use crate::clock::Clock;
use crate::config::CollectionNames;
use crate::overview::build_overview;
use crate::store::DocumentStore;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: String,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

fn success<T: Serialize>(message: &str, data: &T) -> Json {
    match serde_json::to_value(data) {
        Ok(value) => warp::reply::json(&ApiResponse {
            status: "success".to_string(),
            message: message.to_string(),
            data: Some(value),
        }),
        Err(e) => failure(&format!("Failed to serialize response: {}", e)),
    }
}

fn failure(message: &str) -> Json {
    warp::reply::json(&ApiResponse {
        status: "error".to_string(),
        message: message.to_string(),
        data: None,
    })
}

/// Read-only HTTP view over the aggregator's published collections.
#[derive(Clone)]
pub struct RestApi {
    aggregator: Arc<AppointmentAggregator>,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    collections: CollectionNames,
}

impl RestApi {
    pub fn new(
        aggregator: Arc<AppointmentAggregator>,
        store: Arc<dyn DocumentStore>,
        clock: Arc<dyn Clock>,
        collections: CollectionNames,
    ) -> Self {
        RestApi { aggregator, store, clock, collections }
    }

    pub fn routes(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        self.get_appointments()
            .or(self.get_today())
            .or(self.get_pending())
            .or(self.get_day())
            .or(self.get_doctor())
            .or(self.get_patient())
            .or(self.get_overview())
    }

    fn get_appointments(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let aggregator = Arc::clone(&self.aggregator);

        warp::path!("appointments")
            .and(warp::get())
            .map(move || {
                let views = aggregator.views();
                success("All appointments", &views.all)
            })
    }

    fn get_today(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let aggregator = Arc::clone(&self.aggregator);

        warp::path!("appointments" / "today")
            .and(warp::get())
            .map(move || {
                let views = aggregator.views();
                success("Today's appointments", &views.today)
            })
    }

    fn get_pending(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let aggregator = Arc::clone(&self.aggregator);

        warp::path!("appointments" / "pending")
            .and(warp::get())
            .map(move || {
                let views = aggregator.views();
                success("Pending appointments", &views.pending)
            })
    }

    fn get_day(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let aggregator = Arc::clone(&self.aggregator);

        warp::path!("appointments" / "day" / String)
            .and(warp::get())
            .map(move |day: String| {
                let Ok(day) = NaiveDate::parse_from_str(&day, "%Y-%m-%d") else {
                    return failure("Invalid date, expected YYYY-MM-DD");
                };
                debug!(%day, "Filtering appointments by day");
                let views = aggregator.views();
                success("Appointments for day", &appointments_on(&views.all, day))
            })
    }

    fn get_doctor(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let aggregator = Arc::clone(&self.aggregator);

        warp::path!("doctors" / String)
            .and(warp::get())
            .map(move |id: String| {
                let views = aggregator.views();
                match views.doctors_by_id.get(&id) {
                    Some(doctor) => success("Doctor found", doctor),
                    None => failure("Doctor not resolved"),
                }
            })
    }

    fn get_patient(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let aggregator = Arc::clone(&self.aggregator);

        warp::path!("patients" / String)
            .and(warp::get())
            .map(move |id: String| {
                let views = aggregator.views();
                match views.patients_by_id.get(&id) {
                    Some(patient) => success("Patient found", patient),
                    None => failure("Patient not resolved"),
                }
            })
    }

    fn get_overview(&self) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
        let api = self.clone();

        warp::path!("overview")
            .and(warp::get())
            .and_then(move || {
                let api = api.clone();
                async move {
                    let views = api.aggregator.views();
                    let overview = build_overview(
                        api.store.as_ref(),
                        api.clock.as_ref(),
                        &api.collections,
                        &views,
                    ).await;

                    match overview {
                        Ok(overview) => Ok::<Json, Infallible>(success("Overview", &overview)),
                        Err(err) => {
                            warn!(error = %err, "Failed to build overview");
                            Ok::<Json, Infallible>(failure(&format!("Failed to build overview: {}", err)))
                        }
                    }
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::config::Config;
    use crate::records::Document;
    use crate::store::InMemoryStore;
    use serde_json::json;

    async fn api() -> RestApi {
        let day = NaiveDate::from_ymd_opt(2024, 7, 4).unwrap();
        let store = Arc::new(InMemoryStore::new());
        store.put_document("Doctors", Document::from_json("d1", json!({ "name": "Dr. Rao", "visitingFees": 700 }))).await;

        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(day));
        let config = Config::default();
        let aggregator = Arc::new(AppointmentAggregator::new(store.clone(), Arc::clone(&clock), &config));
        aggregator.apply_snapshot(vec![
            Document::from_json("a1", json!({ "id": "a1", "doctorId": "d1", "date": "04 July 2024" })),
            Document::from_json("a2", json!({ "id": "a2", "doctorId": "d1", "date": "09 July 2024" })),
        ]).settled().await;

        RestApi::new(aggregator, store, clock, config.collections)
    }

    async fn get(api: &RestApi, path: &str) -> ApiResponse {
        let response = warp::test::request()
            .method("GET")
            .path(path)
            .reply(&api.routes())
            .await;
        serde_json::from_slice(response.body()).unwrap()
    }

    #[tokio::test]
    async fn serves_partitions() {
        let api = api().await;

        let all = get(&api, "/appointments").await;
        assert_eq!(all.status, "success");
        assert_eq!(all.data.unwrap().as_array().unwrap().len(), 2);

        let today = get(&api, "/appointments/today").await;
        assert_eq!(today.data.unwrap()[0]["id"], "a1");

        let pending = get(&api, "/appointments/pending").await;
        assert_eq!(pending.data.unwrap()[0]["id"], "a2");
    }

    #[tokio::test]
    async fn day_filter_validates_date() {
        let api = api().await;

        let day = get(&api, "/appointments/day/2024-07-09").await;
        assert_eq!(day.data.unwrap()[0]["id"], "a2");

        let bad = get(&api, "/appointments/day/July-9").await;
        assert_eq!(bad.status, "error");
    }

    #[tokio::test]
    async fn side_tables_and_overview() {
        let api = api().await;

        let doctor = get(&api, "/doctors/d1").await;
        assert_eq!(doctor.data.unwrap()["visitingFees"], 700);

        let missing = get(&api, "/patients/p404").await;
        assert_eq!(missing.status, "error");

        let overview = get(&api, "/overview").await;
        let data = overview.data.unwrap();
        assert_eq!(data["todayRevenue"], 700);
        assert_eq!(data["unresolvedTodayDoctors"], 0);
        assert_eq!(data["doctors"], 1);
        assert!(data.get("today_revenue").is_none());
    }
}
