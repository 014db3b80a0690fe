use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub sync: SyncConfig,
    pub location: LocationConfig,
    pub upload: UploadConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub database_url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub auto_sync: bool,
    pub sync_interval_secs: u64,
    pub debounce_ms: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    pub cache_ttl_secs: u64,
    pub default_timeout_ms: u64,
    pub watch_interval_ms: u64,
    pub accuracy_threshold_m: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    pub max_size_bytes: u64,
    pub allowed_types: Vec<String>,
    pub compression_enabled: bool,
    pub max_width: u32,
    pub max_height: u32,
    pub quality: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub buffer_capacity: usize,
    pub persisted_window: usize,
    pub retention_days: i64,
    pub purge_interval_secs: u64,
    pub summary_window_secs: i64,
    pub slow_api_ms: u64,
    pub slow_gps_ms: u64,
    pub poor_accuracy_m: f64,
    pub slow_upload_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig {
                database_url: "sqlite:data/fieldsync.db".to_string(),
                max_connections: 5,
            },
            sync: SyncConfig {
                auto_sync: true,
                sync_interval_secs: 30,
                debounce_ms: 1000,
                max_retries: 3,
            },
            location: LocationConfig {
                cache_ttl_secs: 300, // 5 minutes
                default_timeout_ms: 10_000,
                watch_interval_ms: 5_000,
                accuracy_threshold_m: 50.0,
            },
            upload: UploadConfig {
                max_size_bytes: 10 * 1024 * 1024, // 10MB
                allowed_types: default_allowed_types(),
                compression_enabled: true,
                max_width: 1920,
                max_height: 1080,
                quality: 0.8,
            },
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_capacity: 1000,
            persisted_window: 200,
            retention_days: 7,
            purge_interval_secs: 3600,
            summary_window_secs: 3600,
            slow_api_ms: 2000,
            slow_gps_ms: 10_000,
            poor_accuracy_m: 100.0,
            slow_upload_ms: 30_000,
        }
    }
}

fn default_allowed_types() -> Vec<String> {
    [
        "image/jpeg",
        "image/jpg",
        "image/png",
        "image/gif",
        "image/webp",
        "application/pdf",
        "text/plain",
        "application/msword",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl AppConfig {
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(v) = std::env::var("FIELDSYNC_DATABASE_URL") {
            if !v.trim().is_empty() {
                cfg.storage.database_url = v;
            }
        }
        if let Ok(v) = std::env::var("FIELDSYNC_AUTO_SYNC") {
            cfg.sync.auto_sync = parse_bool(&v, cfg.sync.auto_sync);
        }
        if let Ok(v) = std::env::var("FIELDSYNC_SYNC_INTERVAL_SECS") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync.sync_interval_secs = value.max(1);
            }
        }
        if let Ok(v) = std::env::var("FIELDSYNC_SYNC_MAX_RETRIES") {
            if let Some(value) = parse_u64(&v) {
                cfg.sync.max_retries = value.min(u32::MAX as u64) as u32;
            }
        }
        if let Ok(v) = std::env::var("FIELDSYNC_LOCATION_CACHE_TTL_SECS") {
            if let Some(value) = parse_u64(&v) {
                cfg.location.cache_ttl_secs = value;
            }
        }
        if let Ok(v) = std::env::var("FIELDSYNC_UPLOAD_MAX_BYTES") {
            if let Some(value) = parse_u64(&v) {
                cfg.upload.max_size_bytes = value;
            }
        }
        if let Ok(v) = std::env::var("FIELDSYNC_UPLOAD_COMPRESSION") {
            cfg.upload.compression_enabled = parse_bool(&v, cfg.upload.compression_enabled);
        }
        if let Ok(v) = std::env::var("FIELDSYNC_TELEMETRY_ENABLED") {
            cfg.telemetry.enabled = parse_bool(&v, cfg.telemetry.enabled);
        }

        cfg
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.storage.max_connections == 0 {
            return Err("Storage max_connections must be greater than 0".to_string());
        }
        if self.sync.max_retries == 0 {
            return Err("Sync max_retries must be greater than 0".to_string());
        }
        if self.upload.max_size_bytes == 0 {
            return Err("Upload max_size_bytes must be greater than 0".to_string());
        }
        if !(0.0..=1.0).contains(&self.upload.quality) {
            return Err("Upload quality must be within 0.0..=1.0".to_string());
        }
        if self.telemetry.enabled {
            if self.telemetry.buffer_capacity == 0 {
                return Err("Telemetry buffer_capacity must be greater than 0".to_string());
            }
            if self.telemetry.retention_days <= 0 {
                return Err("Telemetry retention_days must be greater than 0".to_string());
            }
        }
        Ok(())
    }
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

fn parse_u64(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.location.cache_ttl_secs, 300);
        assert_eq!(cfg.sync.max_retries, 3);
        assert_eq!(cfg.upload.max_size_bytes, 10 * 1024 * 1024);
    }

    #[test]
    fn test_validate_rejects_zero_retries() {
        let mut cfg = AppConfig::default();
        cfg.sync.max_retries = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_quality_out_of_range() {
        let mut cfg = AppConfig::default();
        cfg.upload.quality = 1.5;
        assert!(cfg.validate().is_err());
    }
}
