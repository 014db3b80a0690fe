use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricCategory {
    Api,
    Gps,
    Upload,
    Custom,
}

impl MetricCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricCategory::Api => "api",
            MetricCategory::Gps => "gps",
            MetricCategory::Upload => "upload",
            MetricCategory::Custom => "custom",
        }
    }
}

impl fmt::Display for MetricCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSample {
    pub endpoint: String,
    pub method: String,
    pub duration_ms: u64,
    pub success: bool,
    pub error_message: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpsSample {
    pub duration_ms: u64,
    pub accuracy: Option<f64>,
    pub success: bool,
    pub error_type: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadSample {
    pub file_size: u64,
    pub duration_ms: u64,
    pub success: bool,
    pub compression_ratio: Option<f64>,
    pub error_message: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// 汎用バッファに積まれる名前付きサンプル。CSVエクスポートの行単位。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub category: MetricCategory,
    pub recorded_at: DateTime<Utc>,
}

/// 直近1時間のローリング集計。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub time_range_secs: i64,
    pub api: ApiSummary,
    pub gps: GpsSummary,
    pub uploads: UploadSummary,
    pub warnings: WarningSummary,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiSummary {
    pub total_calls: usize,
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub slow_calls: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GpsSummary {
    pub total_acquisitions: usize,
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub average_accuracy_m: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UploadSummary {
    pub total_uploads: usize,
    pub success_rate: f64,
    pub average_duration_ms: f64,
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WarningSummary {
    pub slow_api_calls: usize,
    pub slow_gps_acquisitions: usize,
    pub poor_accuracy_fixes: usize,
    pub slow_uploads: usize,
}
