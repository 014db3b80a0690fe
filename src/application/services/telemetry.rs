use crate::application::ports::KeyValueStore;
use crate::domain::entities::{
    ApiSample, ApiSummary, GpsSample, GpsSummary, MetricCategory, MetricSample,
    PerformanceSummary, UploadSample, UploadSummary, WarningSummary,
};
use crate::shared::config::TelemetryConfig;
use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

const METRICS_KEY: &str = "telemetry:metrics";

#[derive(Debug, Default)]
struct TelemetryBuffers {
    api: VecDeque<ApiSample>,
    gps: VecDeque<GpsSample>,
    uploads: VecDeque<UploadSample>,
    general: VecDeque<MetricSample>,
}

/// API呼び出し・GPS取得・アップロードの実測値を有界リングバッファに
/// 集約するコレクタ。閾値超過は warn ログで通知するのみで処理は
/// 止めない。
pub struct PerformanceTelemetry {
    config: TelemetryConfig,
    store: Arc<dyn KeyValueStore>,
    buffers: RwLock<TelemetryBuffers>,
}

impl PerformanceTelemetry {
    pub fn new(store: Arc<dyn KeyValueStore>, config: TelemetryConfig) -> Self {
        Self {
            config,
            store,
            buffers: RwLock::new(TelemetryBuffers::default()),
        }
    }

    /// 永続化済みの汎用メトリクスを復元する。壊れたスナップショットは
    /// 読み捨てる。
    pub async fn load(&self) {
        let snapshot = match self.store.get(METRICS_KEY).await {
            Ok(Some(value)) => value,
            Ok(None) => return,
            Err(err) => {
                tracing::warn!(target: "telemetry", error = %err, "failed to read persisted metrics");
                return;
            }
        };

        match serde_json::from_value::<Vec<MetricSample>>(snapshot) {
            Ok(samples) => {
                let mut buffers = self.buffers.write().await;
                for sample in samples {
                    push_capped(&mut buffers.general, sample, self.config.buffer_capacity);
                }
            }
            Err(err) => {
                tracing::warn!(target: "telemetry", error = %err, "discarding corrupted metrics snapshot");
            }
        }
    }

    pub async fn track_api_call(
        &self,
        endpoint: &str,
        method: &str,
        started_at: DateTime<Utc>,
        success: bool,
        error_message: Option<String>,
    ) {
        if !self.config.enabled {
            return;
        }
        let now = Utc::now();
        let duration_ms = duration_ms_since(started_at, now);

        if duration_ms > self.config.slow_api_ms {
            tracing::warn!(
                target: "telemetry",
                endpoint,
                method,
                duration_ms,
                "slow API call"
            );
        }

        self.ingest_api_sample(ApiSample {
            endpoint: endpoint.to_string(),
            method: method.to_string(),
            duration_ms,
            success,
            error_message,
            recorded_at: now,
        })
        .await;
    }

    pub async fn track_gps_acquisition(
        &self,
        started_at: DateTime<Utc>,
        accuracy: Option<f64>,
        success: bool,
        error_type: Option<String>,
    ) {
        if !self.config.enabled {
            return;
        }
        let now = Utc::now();
        let duration_ms = duration_ms_since(started_at, now);

        if duration_ms > self.config.slow_gps_ms {
            tracing::warn!(target: "telemetry", duration_ms, "slow GPS acquisition");
        }
        if let Some(accuracy) = accuracy {
            if accuracy > self.config.poor_accuracy_m {
                tracing::warn!(target: "telemetry", accuracy, "poor GPS accuracy");
            }
        }

        self.ingest_gps_sample(GpsSample {
            duration_ms,
            accuracy,
            success,
            error_type,
            recorded_at: now,
        })
        .await;
    }

    pub async fn track_file_upload(
        &self,
        file_size: u64,
        started_at: DateTime<Utc>,
        success: bool,
        compression_ratio: Option<f64>,
        error_message: Option<String>,
    ) {
        if !self.config.enabled {
            return;
        }
        let now = Utc::now();
        let duration_ms = duration_ms_since(started_at, now);

        if duration_ms > self.config.slow_upload_ms {
            tracing::warn!(target: "telemetry", file_size, duration_ms, "slow upload");
        }

        self.ingest_upload_sample(UploadSample {
            file_size,
            duration_ms,
            success,
            compression_ratio,
            error_message,
            recorded_at: now,
        })
        .await;
    }

    pub async fn track_custom_metric(
        &self,
        name: &str,
        value: f64,
        unit: &str,
        category: MetricCategory,
    ) {
        if !self.config.enabled {
            return;
        }
        let sample = MetricSample {
            name: name.to_string(),
            value,
            unit: unit.to_string(),
            category,
            recorded_at: Utc::now(),
        };
        {
            let mut buffers = self.buffers.write().await;
            push_capped(&mut buffers.general, sample, self.config.buffer_capacity);
        }
        self.persist_best_effort().await;
    }

    async fn ingest_api_sample(&self, sample: ApiSample) {
        let general = MetricSample {
            name: format!("{} {}", sample.method, sample.endpoint),
            value: sample.duration_ms as f64,
            unit: "ms".to_string(),
            category: MetricCategory::Api,
            recorded_at: sample.recorded_at,
        };
        {
            let mut buffers = self.buffers.write().await;
            push_capped(&mut buffers.api, sample, self.config.buffer_capacity);
            push_capped(&mut buffers.general, general, self.config.buffer_capacity);
        }
        self.persist_best_effort().await;
    }

    async fn ingest_gps_sample(&self, sample: GpsSample) {
        let general = MetricSample {
            name: "gps_acquisition".to_string(),
            value: sample.duration_ms as f64,
            unit: "ms".to_string(),
            category: MetricCategory::Gps,
            recorded_at: sample.recorded_at,
        };
        {
            let mut buffers = self.buffers.write().await;
            push_capped(&mut buffers.gps, sample, self.config.buffer_capacity);
            push_capped(&mut buffers.general, general, self.config.buffer_capacity);
        }
        self.persist_best_effort().await;
    }

    async fn ingest_upload_sample(&self, sample: UploadSample) {
        let general = MetricSample {
            name: "file_upload".to_string(),
            value: sample.duration_ms as f64,
            unit: "ms".to_string(),
            category: MetricCategory::Upload,
            recorded_at: sample.recorded_at,
        };
        {
            let mut buffers = self.buffers.write().await;
            push_capped(&mut buffers.uploads, sample, self.config.buffer_capacity);
            push_capped(&mut buffers.general, general, self.config.buffer_capacity);
        }
        self.persist_best_effort().await;
    }

    /// 直近の集計ウィンドウ（既定1時間）のローリングサマリ。
    pub async fn performance_summary(&self) -> PerformanceSummary {
        let cutoff = Utc::now() - Duration::seconds(self.config.summary_window_secs);
        let buffers = self.buffers.read().await;

        let api: Vec<&ApiSample> = buffers
            .api
            .iter()
            .filter(|s| s.recorded_at >= cutoff)
            .collect();
        let gps: Vec<&GpsSample> = buffers
            .gps
            .iter()
            .filter(|s| s.recorded_at >= cutoff)
            .collect();
        let uploads: Vec<&UploadSample> = buffers
            .uploads
            .iter()
            .filter(|s| s.recorded_at >= cutoff)
            .collect();

        let slow_api_calls = api
            .iter()
            .filter(|s| s.duration_ms > self.config.slow_api_ms)
            .count();
        let slow_gps = gps
            .iter()
            .filter(|s| s.duration_ms > self.config.slow_gps_ms)
            .count();
        let poor_accuracy = gps
            .iter()
            .filter(|s| s.accuracy.is_some_and(|a| a > self.config.poor_accuracy_m))
            .count();
        let slow_uploads = uploads
            .iter()
            .filter(|s| s.duration_ms > self.config.slow_upload_ms)
            .count();

        let accuracies: Vec<f64> = gps.iter().filter_map(|s| s.accuracy).collect();

        PerformanceSummary {
            time_range_secs: self.config.summary_window_secs,
            api: ApiSummary {
                total_calls: api.len(),
                success_rate: success_rate(api.iter().filter(|s| s.success).count(), api.len()),
                average_duration_ms: average(api.iter().map(|s| s.duration_ms as f64)),
                slow_calls: slow_api_calls,
            },
            gps: GpsSummary {
                total_acquisitions: gps.len(),
                success_rate: success_rate(gps.iter().filter(|s| s.success).count(), gps.len()),
                average_duration_ms: average(gps.iter().map(|s| s.duration_ms as f64)),
                average_accuracy_m: if accuracies.is_empty() {
                    None
                } else {
                    Some(average(accuracies.iter().copied()))
                },
            },
            uploads: UploadSummary {
                total_uploads: uploads.len(),
                success_rate: success_rate(
                    uploads.iter().filter(|s| s.success).count(),
                    uploads.len(),
                ),
                average_duration_ms: average(uploads.iter().map(|s| s.duration_ms as f64)),
                total_bytes: uploads.iter().map(|s| s.file_size).sum(),
            },
            warnings: WarningSummary {
                slow_api_calls,
                slow_gps_acquisitions: slow_gps,
                poor_accuracy_fixes: poor_accuracy,
                slow_uploads,
            },
        }
    }

    /// 汎用バッファの全サンプル（保持期間内のもの）。
    pub async fn all_metrics(&self) -> Vec<MetricSample> {
        let buffers = self.buffers.read().await;
        buffers.general.iter().cloned().collect()
    }

    pub async fn clear_metrics(&self) {
        {
            let mut buffers = self.buffers.write().await;
            buffers.api.clear();
            buffers.gps.clear();
            buffers.uploads.clear();
            buffers.general.clear();
        }
        if let Err(err) = self.store.remove(METRICS_KEY).await {
            tracing::warn!(target: "telemetry", error = %err, "failed to clear persisted metrics");
        }
    }

    /// ヘッダ行 + 汎用サンプル1件につき1行のCSV。
    pub async fn export_csv(&self) -> String {
        let buffers = self.buffers.read().await;
        let mut out = String::from("timestamp,category,name,value,unit\n");
        for sample in &buffers.general {
            out.push_str(&format!(
                "{},{},{},{},{}\n",
                sample.recorded_at.to_rfc3339(),
                sample.category,
                csv_field(&sample.name),
                sample.value,
                csv_field(&sample.unit),
            ));
        }
        out
    }

    /// 保持期間（既定7日）を超えたサンプルを破棄し、破棄件数を返す。
    pub async fn purge_old(&self) -> usize {
        let cutoff = Utc::now() - Duration::days(self.config.retention_days);
        let mut buffers = self.buffers.write().await;
        let before = buffers.api.len()
            + buffers.gps.len()
            + buffers.uploads.len()
            + buffers.general.len();

        buffers.api.retain(|s| s.recorded_at >= cutoff);
        buffers.gps.retain(|s| s.recorded_at >= cutoff);
        buffers.uploads.retain(|s| s.recorded_at >= cutoff);
        buffers.general.retain(|s| s.recorded_at >= cutoff);

        before
            - (buffers.api.len()
                + buffers.gps.len()
                + buffers.uploads.len()
                + buffers.general.len())
    }

    /// 定期パージタスクを起動する（既定1時間間隔）。
    pub fn schedule_purge(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let telemetry = Arc::clone(self);
        let interval_secs = self.config.purge_interval_secs;
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs.max(1)));
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = telemetry.purge_old().await;
                if removed > 0 {
                    tracing::debug!(target: "telemetry", removed, "purged aged samples");
                }
                telemetry.persist_best_effort().await;
            }
        })
    }

    async fn persist_best_effort(&self) {
        let snapshot: Vec<MetricSample> = {
            let buffers = self.buffers.read().await;
            let skip = buffers
                .general
                .len()
                .saturating_sub(self.config.persisted_window);
            buffers.general.iter().skip(skip).cloned().collect()
        };
        let value = match serde_json::to_value(&snapshot) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(target: "telemetry", error = %err, "failed to serialize metrics");
                return;
            }
        };
        if let Err(err) = self.store.set(METRICS_KEY, &value).await {
            tracing::warn!(target: "telemetry", error = %err, "failed to persist metrics");
        }
    }
}

fn push_capped<T>(buffer: &mut VecDeque<T>, item: T, capacity: usize) {
    while buffer.len() >= capacity.max(1) {
        buffer.pop_front();
    }
    buffer.push_back(item);
}

fn duration_ms_since(started_at: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    (now - started_at).num_milliseconds().max(0) as u64
}

fn success_rate(successes: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        successes as f64 / total as f64 * 100.0
    }
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let collected: Vec<f64> = values.collect();
    if collected.is_empty() {
        0.0
    } else {
        collected.iter().sum::<f64>() / collected.len() as f64
    }
}

fn csv_field(raw: &str) -> String {
    if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}
