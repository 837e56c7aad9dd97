use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

use hmsfeed::aggregator::classify::partition;
use hmsfeed::records::conversion::FromDocument;
use hmsfeed::{AppointmentRecord, Document};

const MONTHS: [&str; 4] = ["July", "August", "garbage", "September"];

fn snapshot(size: usize) -> Vec<Document> {
    (0..size)
        .map(|i| {
            Document::from_json(format!("doc-{}", i), json!({
                "id": format!("a{}", i),
                "doctorId": format!("d{}", i % 40),
                "patientId": format!("p{}", i % 300),
                "date": format!("{:02} {} 2024", i % 28 + 1, MONTHS[i % MONTHS.len()]),
                "timeSlot": "10:00 - 10:30",
                "isPremium": i % 7 == 0,
            }))
        })
        .collect()
}

fn parse_and_partition(c: &mut Criterion) {
    let today = NaiveDate::from_ymd_opt(2024, 7, 4).unwrap();
    let documents = snapshot(5_000);

    c.bench_function("parse_and_partition_5000", |b| {
        b.iter(|| {
            let records: Vec<AppointmentRecord> = documents.iter()
                .map(|doc| AppointmentRecord::from_document(doc, today))
                .collect();
            black_box(partition(&records, today))
        })
    });
}

criterion_group!(benches, parse_and_partition);
criterion_main!(benches);
