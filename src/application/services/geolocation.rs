use crate::application::ports::{KeyValueStore, LocationSource};
use crate::application::services::telemetry::PerformanceTelemetry;
use crate::domain::value_objects::{Coordinates, LocationError, PermissionState};
use crate::shared::config::LocationConfig;
use crate::shared::error::{AppError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

const LOCATION_CACHE_KEY: &str = "geo:last_fix";

/// 単発取得のオプション。未指定の項目は設定値で補完される。
#[derive(Debug, Clone, Copy, Default)]
pub struct LocationOptions {
    pub high_accuracy: bool,
    pub timeout: Option<Duration>,
    pub max_cache_age: Option<Duration>,
}

/// 取得結果。想定内の失敗は `error` に分類されて返り、例外にはならない。
#[derive(Debug, Clone, PartialEq)]
pub struct LocationResult {
    pub coordinates: Option<Coordinates>,
    pub error: Option<LocationError>,
    pub permission: PermissionState,
}

pub type WatchId = u64;
pub type WatchCallback = Arc<dyn Fn(LocationResult) + Send + Sync>;

/// プラットフォームの位置情報APIをラップし、キャッシュ・権限状態・
/// 継続監視を管理するサービス。
pub struct GeoLocationService {
    source: Arc<dyn LocationSource>,
    store: Arc<dyn KeyValueStore>,
    config: LocationConfig,
    telemetry: Option<Arc<PerformanceTelemetry>>,
    cached: RwLock<Option<Coordinates>>,
    permission: RwLock<PermissionState>,
    watches: Mutex<HashMap<WatchId, JoinHandle<()>>>,
    next_watch_id: AtomicU64,
}

impl GeoLocationService {
    pub fn new(
        source: Arc<dyn LocationSource>,
        store: Arc<dyn KeyValueStore>,
        config: LocationConfig,
    ) -> Self {
        Self {
            source,
            store,
            config,
            telemetry: None,
            cached: RwLock::new(None),
            permission: RwLock::new(PermissionState::Prompt),
            watches: Mutex::new(HashMap::new()),
            next_watch_id: AtomicU64::new(1),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<PerformanceTelemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn is_available(&self) -> bool {
        self.source.is_available()
    }

    /// 単発の位置取得。
    ///
    /// `max_cache_age` より新しいキャッシュがあればデバイスに触らず
    /// それを返す。位置情報機能そのものが無い環境でだけ `Err` になる。
    pub async fn get_current_location(&self, options: LocationOptions) -> Result<LocationResult> {
        if !self.source.is_available() {
            return Err(AppError::InvalidInput(
                "Location capability is not available on this host".to_string(),
            ));
        }

        if let Some(max_age) = options.max_cache_age {
            if let Some(cached) = self.cached_fix_within(max_age).await {
                return Ok(LocationResult {
                    coordinates: Some(cached),
                    error: None,
                    permission: *self.permission.read().await,
                });
            }
        }

        let timeout = options
            .timeout
            .unwrap_or(Duration::from_millis(self.config.default_timeout_ms));
        let started_at = Utc::now();

        let outcome =
            match tokio::time::timeout(timeout, self.source.current_fix(options.high_accuracy))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(LocationError::Timeout),
            };

        match outcome {
            Ok(fix) => {
                let fix = if fix.captured_at.is_some() {
                    fix
                } else {
                    fix.with_captured_at(Utc::now())
                };
                *self.cached.write().await = Some(fix);
                *self.permission.write().await = PermissionState::Granted;
                self.persist_cache(&fix).await;

                if let Some(telemetry) = &self.telemetry {
                    telemetry
                        .track_gps_acquisition(started_at, fix.accuracy, true, None)
                        .await;
                }

                Ok(LocationResult {
                    coordinates: Some(fix),
                    error: None,
                    permission: PermissionState::Granted,
                })
            }
            Err(error) => {
                if error == LocationError::PermissionDenied {
                    *self.permission.write().await = PermissionState::Denied;
                }
                if let Some(telemetry) = &self.telemetry {
                    telemetry
                        .track_gps_acquisition(
                            started_at,
                            None,
                            false,
                            Some(error.to_string()),
                        )
                        .await;
                }
                Ok(LocationResult {
                    coordinates: None,
                    error: Some(error),
                    permission: *self.permission.read().await,
                })
            }
        }
    }

    /// 鮮度ウィンドウ（既定5分）内の最終フィックス。壊れた永続キャッシュは
    /// 「無し」として扱う。
    pub async fn get_cached_location(&self) -> Option<Coordinates> {
        self.cached_fix_within(Duration::from_secs(self.config.cache_ttl_secs))
            .await
    }

    async fn cached_fix_within(&self, max_age: Duration) -> Option<Coordinates> {
        let fix = match *self.cached.read().await {
            Some(fix) => Some(fix),
            None => self.load_persisted_cache().await,
        }?;

        let captured_at = fix.captured_at?;
        let age = Utc::now() - captured_at;
        if age >= chrono::Duration::zero()
            && age <= chrono::Duration::from_std(max_age).unwrap_or_else(|_| chrono::Duration::zero())
        {
            Some(fix)
        } else {
            None
        }
    }

    async fn load_persisted_cache(&self) -> Option<Coordinates> {
        let value = match self.store.get(LOCATION_CACHE_KEY).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(err) => {
                tracing::debug!(target: "geo", error = %err, "failed to read cached location");
                return None;
            }
        };
        match serde_json::from_value::<Coordinates>(value) {
            Ok(fix) => {
                *self.cached.write().await = Some(fix);
                Some(fix)
            }
            Err(err) => {
                tracing::debug!(target: "geo", error = %err, "discarding corrupted location cache");
                None
            }
        }
    }

    async fn persist_cache(&self, fix: &Coordinates) {
        match serde_json::to_value(fix) {
            Ok(value) => {
                if let Err(err) = self.store.set(LOCATION_CACHE_KEY, &value).await {
                    tracing::warn!(target: "geo", error = %err, "failed to persist location cache");
                }
            }
            Err(err) => {
                tracing::warn!(target: "geo", error = %err, "failed to serialize location cache");
            }
        }
    }

    /// 継続監視を登録する。各更新は `get_current_location` と同じ形の
    /// 結果でコールバックされる。
    pub async fn watch_position(
        self: &Arc<Self>,
        callback: WatchCallback,
        options: LocationOptions,
    ) -> WatchId {
        let watch_id = self.next_watch_id.fetch_add(1, Ordering::Relaxed);
        let service = Arc::clone(self);
        let interval_ms = self.config.watch_interval_ms;

        // 登録前にタスクが終了して remove が先行しないよう、
        // ロックを保持したまま spawn する
        let mut watches = self.watches.lock().await;
        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_millis(interval_ms.max(100)));
            loop {
                interval.tick().await;
                match service.get_current_location(options).await {
                    Ok(result) => callback(result),
                    Err(err) => {
                        tracing::warn!(target: "geo", error = %err, "watch aborted");
                        break;
                    }
                }
            }
            // 自前で終了した場合もレジストリから消えること
            service.watches.lock().await.remove(&watch_id);
        });

        watches.insert(watch_id, handle);
        watch_id
    }

    /// 冪等。未知のIDには何もしない。
    pub async fn clear_watch(&self, watch_id: WatchId) {
        if let Some(handle) = self.watches.lock().await.remove(&watch_id) {
            handle.abort();
        }
    }

    pub async fn clear_all_watches(&self) {
        let mut watches = self.watches.lock().await;
        for (_, handle) in watches.drain() {
            handle.abort();
        }
    }

    pub async fn check_permission(&self) -> PermissionState {
        if self.source.is_available() {
            let state = self.source.permission().await;
            *self.permission.write().await = state;
            state
        } else {
            *self.permission.read().await
        }
    }

    pub fn calculate_distance(&self, a: &Coordinates, b: &Coordinates) -> f64 {
        a.distance_to(b)
    }

    pub fn is_location_accurate(&self, coords: &Coordinates, max_accuracy_m: Option<f64>) -> bool {
        let threshold = max_accuracy_m.unwrap_or(self.config.accuracy_threshold_m);
        coords.accuracy.is_some_and(|accuracy| accuracy <= threshold)
    }

    pub fn format_coordinates(&self, coords: &Coordinates, precision: Option<usize>) -> String {
        coords.format(precision.unwrap_or(6))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::MemoryKeyValueStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;

    /// 台本通りに応答するテスト用ソース。
    struct ScriptedSource {
        available: bool,
        fix: std::result::Result<Coordinates, LocationError>,
        delay: Option<Duration>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn returning(fix: std::result::Result<Coordinates, LocationError>) -> Self {
            Self {
                available: true,
                fix,
                delay: None,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl LocationSource for ScriptedSource {
        fn is_available(&self) -> bool {
            self.available
        }

        async fn current_fix(
            &self,
            _high_accuracy: bool,
        ) -> std::result::Result<Coordinates, LocationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.fix.clone()
        }

        async fn permission(&self) -> PermissionState {
            PermissionState::Prompt
        }
    }

    fn service_with(source: ScriptedSource) -> GeoLocationService {
        GeoLocationService::new(
            Arc::new(source),
            Arc::new(MemoryKeyValueStore::new()),
            LocationConfig {
                cache_ttl_secs: 300,
                default_timeout_ms: 1000,
                watch_interval_ms: 100,
                accuracy_threshold_m: 50.0,
            },
        )
    }

    #[tokio::test]
    async fn test_successful_fix_updates_cache_and_permission() {
        let fix = Coordinates::new(35.0, 139.0).unwrap().with_accuracy(10.0);
        let service = service_with(ScriptedSource::returning(Ok(fix)));

        let result = service
            .get_current_location(LocationOptions::default())
            .await
            .unwrap();

        assert!(result.error.is_none());
        assert_eq!(result.permission, PermissionState::Granted);
        let coords = result.coordinates.unwrap();
        assert_eq!(coords.latitude, 35.0);
        assert!(coords.captured_at.is_some());

        assert!(service.get_cached_location().await.is_some());
    }

    #[tokio::test]
    async fn test_permission_denied_is_classified_not_thrown() {
        let service =
            service_with(ScriptedSource::returning(Err(LocationError::PermissionDenied)));

        let result = service
            .get_current_location(LocationOptions::default())
            .await
            .unwrap();

        assert!(result.coordinates.is_none());
        assert_eq!(result.error, Some(LocationError::PermissionDenied));
        assert_eq!(result.permission, PermissionState::Denied);
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let mut source =
            ScriptedSource::returning(Ok(Coordinates::new(0.0, 0.0).unwrap()));
        source.delay = Some(Duration::from_millis(500));
        let service = service_with(source);

        let result = service
            .get_current_location(LocationOptions {
                timeout: Some(Duration::from_millis(20)),
                ..LocationOptions::default()
            })
            .await
            .unwrap();

        assert_eq!(result.error, Some(LocationError::Timeout));
    }

    #[tokio::test]
    async fn test_unavailable_capability_is_an_error() {
        let mut source =
            ScriptedSource::returning(Ok(Coordinates::new(1.0, 1.0).unwrap()));
        source.available = false;
        let service = service_with(source);

        assert!(!service.is_available());
        assert!(service
            .get_current_location(LocationOptions::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_cache_ttl_window() {
        let service =
            service_with(ScriptedSource::returning(Ok(Coordinates::new(1.0, 1.0).unwrap())));

        // 30秒前のフィックスは5分ウィンドウ内
        let fresh = Coordinates::new(35.0, 139.0)
            .unwrap()
            .with_captured_at(Utc::now() - chrono::Duration::seconds(30));
        *service.cached.write().await = Some(fresh);
        assert!(service.get_cached_location().await.is_some());

        // 10分前のフィックスは期限切れ
        let stale = Coordinates::new(35.0, 139.0)
            .unwrap()
            .with_captured_at(Utc::now() - chrono::Duration::minutes(10));
        *service.cached.write().await = Some(stale);
        assert!(service.get_cached_location().await.is_none());
    }

    #[tokio::test]
    async fn test_corrupted_persisted_cache_is_treated_as_absent() {
        let store = Arc::new(MemoryKeyValueStore::new());
        store
            .set(LOCATION_CACHE_KEY, &json!({"latitude": "not-a-number"}))
            .await
            .unwrap();

        let service = GeoLocationService::new(
            Arc::new(ScriptedSource::returning(Ok(
                Coordinates::new(1.0, 1.0).unwrap()
            ))),
            store,
            LocationConfig {
                cache_ttl_secs: 300,
                default_timeout_ms: 1000,
                watch_interval_ms: 100,
                accuracy_threshold_m: 50.0,
            },
        );

        assert!(service.get_cached_location().await.is_none());
    }

    #[tokio::test]
    async fn test_max_cache_age_short_circuits_device_access() {
        let fix = Coordinates::new(35.0, 139.0).unwrap();
        let source = ScriptedSource::returning(Ok(fix));
        let calls = Arc::clone(&source.calls);
        let service = Arc::new(service_with(source));

        service
            .get_current_location(LocationOptions::default())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let result = service
            .get_current_location(LocationOptions {
                max_cache_age: Some(Duration::from_secs(60)),
                ..LocationOptions::default()
            })
            .await
            .unwrap();
        assert!(result.coordinates.is_some());

        // 2回目はキャッシュ応答なのでソースは呼ばれない
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_watch_position_delivers_updates_and_clear_is_idempotent() {
        let fix = Coordinates::new(35.0, 139.0).unwrap();
        let service = Arc::new(service_with(ScriptedSource::returning(Ok(fix))));

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_cb = Arc::clone(&seen);
        let watch_id = service
            .watch_position(
                Arc::new(move |result| {
                    assert!(result.coordinates.is_some());
                    seen_in_cb.fetch_add(1, Ordering::SeqCst);
                }),
                LocationOptions::default(),
            )
            .await;

        tokio::time::sleep(Duration::from_millis(350)).await;
        assert!(seen.load(Ordering::SeqCst) >= 2);

        service.clear_watch(watch_id).await;
        let after_clear = seen.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(seen.load(Ordering::SeqCst), after_clear);

        // 既知でないIDも冪等
        service.clear_watch(9999).await;
        service.clear_all_watches().await;
    }

    #[tokio::test]
    async fn test_dead_watch_removes_itself_from_registry() {
        let mut source =
            ScriptedSource::returning(Ok(Coordinates::new(1.0, 1.0).unwrap()));
        source.available = false;
        let service = Arc::new(service_with(source));

        let watch_id = service
            .watch_position(Arc::new(|_result| {}), LocationOptions::default())
            .await;

        // 最初のティックで機能喪失により終了し、登録も消える
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(service.watches.lock().await.is_empty());

        // 消えた後の clear_watch も冪等のまま
        service.clear_watch(watch_id).await;
    }

    #[tokio::test]
    async fn test_accuracy_classification() {
        let service =
            service_with(ScriptedSource::returning(Ok(Coordinates::new(1.0, 1.0).unwrap())));

        let sharp = Coordinates::new(35.0, 139.0).unwrap().with_accuracy(12.0);
        let blurry = Coordinates::new(35.0, 139.0).unwrap().with_accuracy(80.0);
        let unknown = Coordinates::new(35.0, 139.0).unwrap();

        assert!(service.is_location_accurate(&sharp, None));
        assert!(!service.is_location_accurate(&blurry, None));
        assert!(service.is_location_accurate(&blurry, Some(100.0)));
        assert!(!service.is_location_accurate(&unknown, None));
    }
}
