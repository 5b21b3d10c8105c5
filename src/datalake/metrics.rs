//! Sample metric rows written to the data lake
//!
//! Text columns are double-quoted and numbers are written bare, which is the
//! layout the metric provider plugin reads back.

use uuid::Uuid;

/// CSV header of a metrics file
pub const METRICS_HEADER: &str = "MetricId,Name,Value";

/// One metric row
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub id: Uuid,
    pub name: String,
    pub value: f64,
}

impl MetricRecord {
    pub fn new(id: Uuid, name: impl Into<String>, value: f64) -> Self {
        Self {
            id,
            name: name.into(),
            value,
        }
    }

    fn to_csv_line(&self) -> String {
        format!("\"{}\",\"{}\",{}", self.id, self.name, self.value)
    }
}

/// The fixed sample rows seeded by `datalake sampledata`
pub fn sample_metrics() -> Vec<MetricRecord> {
    vec![
        MetricRecord::new(
            Uuid::from_u128(0xbbb9792d_9fbf_45d5_88e5_dce2acd4924c),
            "AverageTripDuration",
            26.1,
        ),
        MetricRecord::new(
            Uuid::from_u128(0x1cb4e68d_6ee3_4b1b_b90b_a1e49daeef03),
            "LongestTrip",
            180.5,
        ),
        MetricRecord::new(
            Uuid::from_u128(0x262bd819_8eaa_44c8_96f8_eced6874cba1),
            "WeekendWeekdayRatio",
            0.45,
        ),
    ]
}

/// Render records as a CSV document with a trailing newline.
pub fn render_csv(records: &[MetricRecord]) -> String {
    let mut content = String::from(METRICS_HEADER);
    content.push('\n');
    for record in records {
        content.push_str(&record.to_csv_line());
        content.push('\n');
    }
    content
}
