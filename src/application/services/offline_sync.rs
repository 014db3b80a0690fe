use crate::application::ports::{KeyValueStore, RecordStore};
use crate::domain::entities::{EngineStatus, PendingAction, SyncReport};
use crate::domain::value_objects::ActionKind;
use crate::shared::config::SyncConfig;
use crate::shared::error::AppError;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

const QUEUE_KEY: &str = "offline:queue";
const MIRROR_KEY: &str = "offline:mirror";
const LAST_SYNC_KEY: &str = "offline:last_sync";

pub type SubscriptionId = u64;
pub type StatusCallback = Arc<dyn Fn(EngineStatus) + Send + Sync>;

/// オフライン同期エンジン。切断中のミューテーションをキューに積み、
/// 再接続時に追加順でリモートへ反映する。
///
/// キューとミラーはKVストアへベストエフォートで永続化される。
/// 書き込み失敗は警告ログに留め、メモリ上の状態で継続する。
pub struct OfflineSyncEngine {
    records: Arc<dyn RecordStore>,
    store: Arc<dyn KeyValueStore>,
    config: SyncConfig,
    queue: RwLock<Vec<PendingAction>>,
    mirror: RwLock<HashMap<String, Value>>,
    last_sync: RwLock<Option<DateTime<Utc>>>,
    is_online: AtomicBool,
    sync_in_progress: AtomicBool,
    debounce_armed: AtomicBool,
    observers: RwLock<Vec<(SubscriptionId, StatusCallback)>>,
    next_subscription_id: AtomicU64,
}

/// 同期パスの排他フラグを必ず解放するためのガード。
struct SyncPassGuard<'a>(&'a AtomicBool);

impl Drop for SyncPassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl OfflineSyncEngine {
    pub fn new(
        records: Arc<dyn RecordStore>,
        store: Arc<dyn KeyValueStore>,
        config: SyncConfig,
    ) -> Self {
        Self {
            records,
            store,
            config,
            queue: RwLock::new(Vec::new()),
            mirror: RwLock::new(HashMap::new()),
            last_sync: RwLock::new(None),
            is_online: AtomicBool::new(true),
            sync_in_progress: AtomicBool::new(false),
            debounce_armed: AtomicBool::new(false),
            observers: RwLock::new(Vec::new()),
            next_subscription_id: AtomicU64::new(1),
        }
    }

    /// 永続化済みのキュー・ミラー・最終同期時刻を復元する。
    /// 壊れたデータは警告して空として扱う。
    pub async fn load(&self) {
        match self.store.get(QUEUE_KEY).await {
            Ok(Some(value)) => match serde_json::from_value::<Vec<PendingAction>>(value) {
                Ok(actions) => {
                    *self.queue.write().await = actions;
                }
                Err(e) => {
                    tracing::warn!(
                        target: "fieldsync::sync",
                        "Discarding corrupted offline queue: {}",
                        e
                    );
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(target: "fieldsync::sync", "Failed to load offline queue: {}", e);
            }
        }

        match self.store.get(MIRROR_KEY).await {
            Ok(Some(value)) => match serde_json::from_value::<HashMap<String, Value>>(value) {
                Ok(mirror) => {
                    *self.mirror.write().await = mirror;
                }
                Err(e) => {
                    tracing::warn!(
                        target: "fieldsync::sync",
                        "Discarding corrupted offline mirror: {}",
                        e
                    );
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(target: "fieldsync::sync", "Failed to load offline mirror: {}", e);
            }
        }

        if let Ok(Some(value)) = self.store.get(LAST_SYNC_KEY).await {
            if let Ok(stamp) = serde_json::from_value::<DateTime<Utc>>(value) {
                *self.last_sync.write().await = Some(stamp);
            }
        }
    }

    pub async fn get_status(&self) -> EngineStatus {
        EngineStatus {
            is_online: self.is_online.load(Ordering::SeqCst),
            pending_actions: self.queue.read().await.len(),
            last_sync: *self.last_sync.read().await,
            sync_in_progress: self.sync_in_progress.load(Ordering::SeqCst),
        }
    }

    pub async fn on_status_change(&self, callback: StatusCallback) -> SubscriptionId {
        let id = self.next_subscription_id.fetch_add(1, Ordering::SeqCst);
        self.observers.write().await.push((id, callback));
        id
    }

    pub async fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.observers.write().await;
        let before = observers.len();
        observers.retain(|(sub_id, _)| *sub_id != id);
        observers.len() != before
    }

    /// ミューテーションをキューへ積む。create/update はミラーにも
    /// `_pendingSync` 付きで反映され、オンラインなら即時同期を試みる。
    pub async fn queue_interaction(
        self: &Arc<Self>,
        kind: ActionKind,
        resource: &str,
        payload: Value,
        id: Option<String>,
    ) -> String {
        let action = PendingAction::new(kind, resource, payload, id, self.config.max_retries);
        let action_id = action.id.clone();

        match kind {
            ActionKind::Create | ActionKind::Update => {
                let mut mirrored = action.payload.clone();
                if let Value::Object(map) = &mut mirrored {
                    map.insert("id".to_string(), Value::String(action_id.clone()));
                    map.insert("_pendingSync".to_string(), Value::Bool(true));
                }
                self.mirror.write().await.insert(action_id.clone(), mirrored);
            }
            ActionKind::Delete => {
                self.mirror.write().await.remove(&action_id);
            }
        }

        self.queue.write().await.push(action);
        self.persist_queue().await;
        self.persist_mirror().await;
        self.notify_observers().await;

        if self.is_online.load(Ordering::SeqCst) {
            let engine = Arc::clone(self);
            tokio::spawn(async move {
                let _ = engine.sync_pending_actions().await;
            });
        }

        action_id
    }

    /// 同期待ちデータのローカル可視ビュー。
    pub async fn get_offline_interactions(&self) -> Vec<Value> {
        self.mirror.read().await.values().cloned().collect()
    }

    /// キューを追加順に処理する同期パス。オフライン時・多重起動時は
    /// 即座に no-op の結果を返す。
    pub async fn sync_pending_actions(&self) -> SyncReport {
        if !self.is_online.load(Ordering::SeqCst) {
            return SyncReport::skipped("Device is offline");
        }
        if self
            .sync_in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return SyncReport::skipped("Sync already in progress");
        }
        let _guard = SyncPassGuard(&self.sync_in_progress);
        self.notify_observers().await;

        let snapshot = self.queue.read().await.clone();
        tracing::info!(
            target: "fieldsync::sync",
            "Starting sync pass with {} pending action(s)",
            snapshot.len()
        );

        let mut processed = 0u32;
        let mut failed = 0u32;
        let mut errors = Vec::new();

        for action in snapshot {
            match self.dispatch(&action).await {
                Ok(()) => {
                    processed += 1;
                    self.queue.write().await.retain(|a| a.id != action.id);
                    self.mirror.write().await.remove(&action.id);
                }
                Err(e) => {
                    failed += 1;
                    let mut abandoned = false;
                    {
                        let mut queue = self.queue.write().await;
                        if let Some(entry) = queue.iter_mut().find(|a| a.id == action.id) {
                            entry.retry_count += 1;
                            if entry.retries_exhausted() {
                                abandoned = true;
                            }
                        }
                        if abandoned {
                            queue.retain(|a| a.id != action.id);
                        }
                    }
                    if abandoned {
                        self.mirror.write().await.remove(&action.id);
                        tracing::warn!(
                            target: "fieldsync::sync",
                            "Abandoning action {} after {} attempts: {}",
                            action.id,
                            action.max_retries,
                            e
                        );
                        errors.push(format!("{} abandoned: {e}", action.id));
                    } else {
                        tracing::warn!(
                            target: "fieldsync::sync",
                            "Action {} failed, will retry: {}",
                            action.id,
                            e
                        );
                        errors.push(format!("{}: {e}", action.id));
                    }
                }
            }
        }

        // 部分失敗でも同期を試みた事実は記録する
        *self.last_sync.write().await = Some(Utc::now());
        self.persist_queue().await;
        self.persist_mirror().await;
        self.persist_last_sync().await;
        self.notify_observers().await;

        tracing::info!(
            target: "fieldsync::sync",
            "Sync pass finished: {} processed, {} failed",
            processed,
            failed
        );

        SyncReport {
            success: failed == 0,
            processed,
            failed,
            errors,
        }
    }

    pub async fn clear_offline_data(&self) {
        self.queue.write().await.clear();
        self.mirror.write().await.clear();
        *self.last_sync.write().await = None;
        if let Err(e) = self.store.remove(QUEUE_KEY).await {
            tracing::warn!(target: "fieldsync::sync", "Failed to clear offline queue: {}", e);
        }
        if let Err(e) = self.store.remove(MIRROR_KEY).await {
            tracing::warn!(target: "fieldsync::sync", "Failed to clear offline mirror: {}", e);
        }
        if let Err(e) = self.store.remove(LAST_SYNC_KEY).await {
            tracing::warn!(target: "fieldsync::sync", "Failed to clear last sync marker: {}", e);
        }
        self.notify_observers().await;
    }

    pub async fn get_pending_count(&self) -> usize {
        self.queue.read().await.len()
    }

    /// 一度でも同期に失敗したアクションはコンフリクト候補として扱う。
    pub async fn has_conflicts(&self, id: &str) -> bool {
        self.queue
            .read()
            .await
            .iter()
            .any(|a| a.id == id && a.retry_count > 0)
    }

    /// 接続状態の通知。オンライン復帰時はデバウンスして同期を仕掛ける。
    pub async fn set_online(self: &Arc<Self>, online: bool) {
        let was_online = self.is_online.swap(online, Ordering::SeqCst);
        if was_online == online {
            return;
        }
        tracing::info!(
            target: "fieldsync::sync",
            "Connectivity changed: {}",
            if online { "online" } else { "offline" }
        );
        self.notify_observers().await;
        if online {
            self.schedule_debounced_sync().await;
        }
    }

    /// フォアグラウンド復帰の通知。接続中かつキューが残っていれば
    /// 再接続時と同じデバウンス同期を行う。
    pub async fn notify_visible(self: &Arc<Self>) {
        if self.is_online.load(Ordering::SeqCst) {
            self.schedule_debounced_sync().await;
        }
    }

    /// 定期同期タスクを起動する。停止はハンドルの abort で行う。
    pub fn schedule_auto_sync(self: &Arc<Self>) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        let interval_secs = self.config.sync_interval_secs.max(1);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if !engine.config.auto_sync {
                    continue;
                }
                if !engine.is_online.load(Ordering::SeqCst) {
                    continue;
                }
                if engine.get_pending_count().await == 0 {
                    continue;
                }
                let _ = engine.sync_pending_actions().await;
            }
        })
    }

    async fn schedule_debounced_sync(self: &Arc<Self>) {
        if self.get_pending_count().await == 0 {
            return;
        }
        if self.sync_in_progress.load(Ordering::SeqCst) {
            return;
        }
        if self
            .debounce_armed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let engine = Arc::clone(self);
        let debounce = Duration::from_millis(self.config.debounce_ms);
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            engine.debounce_armed.store(false, Ordering::SeqCst);
            let _ = engine.sync_pending_actions().await;
        });
    }

    async fn dispatch(&self, action: &PendingAction) -> Result<(), AppError> {
        match action.kind {
            ActionKind::Create => {
                self.records.create(&action.resource, &action.payload).await?;
            }
            ActionKind::Update => {
                let previous = self.mirror.read().await.get(&action.id).cloned();
                self.records
                    .update(&action.resource, &action.id, &action.payload, previous.as_ref())
                    .await?;
            }
            ActionKind::Delete => {
                self.records.delete(&action.resource, &action.id).await?;
            }
        }
        Ok(())
    }

    async fn notify_observers(&self) {
        let status = self.get_status().await;
        let observers: Vec<(SubscriptionId, StatusCallback)> =
            self.observers.read().await.clone();
        for (id, callback) in observers {
            let status = status.clone();
            if catch_unwind(AssertUnwindSafe(|| callback(status))).is_err() {
                tracing::warn!(
                    target: "fieldsync::sync",
                    "Status observer {} panicked",
                    id
                );
            }
        }
    }

    async fn persist_queue(&self) {
        let queue = self.queue.read().await;
        match serde_json::to_value(&*queue) {
            Ok(value) => {
                if let Err(e) = self.store.set(QUEUE_KEY, &value).await {
                    tracing::warn!(
                        target: "fieldsync::sync",
                        "Failed to persist offline queue: {}",
                        e
                    );
                }
            }
            Err(e) => {
                tracing::warn!(target: "fieldsync::sync", "Failed to encode offline queue: {}", e);
            }
        }
    }

    async fn persist_mirror(&self) {
        let mirror = self.mirror.read().await;
        match serde_json::to_value(&*mirror) {
            Ok(value) => {
                if let Err(e) = self.store.set(MIRROR_KEY, &value).await {
                    tracing::warn!(
                        target: "fieldsync::sync",
                        "Failed to persist offline mirror: {}",
                        e
                    );
                }
            }
            Err(e) => {
                tracing::warn!(target: "fieldsync::sync", "Failed to encode offline mirror: {}", e);
            }
        }
    }

    async fn persist_last_sync(&self) {
        let stamp = *self.last_sync.read().await;
        if let Ok(value) = serde_json::to_value(stamp) {
            if let Err(e) = self.store.set(LAST_SYNC_KEY, &value).await {
                tracing::warn!(target: "fieldsync::sync", "Failed to persist last sync: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{RecordPage, RecordQuery};
    use crate::domain::entities::OFFLINE_ID_PREFIX;
    use crate::infrastructure::storage::MemoryKeyValueStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Mutex;

    /// 呼び出しを記録するリモートストアのテストダブル。
    struct ScriptedRecordStore {
        ops: Mutex<Vec<String>>,
        calls: AtomicUsize,
        fail: bool,
        delay: Option<Duration>,
    }

    impl ScriptedRecordStore {
        fn succeeding() -> Self {
            Self {
                ops: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
                fail: false,
                delay: None,
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::succeeding()
            }
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::succeeding()
            }
        }

        async fn record(&self, op: String) -> Result<(), AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(AppError::Network("connection reset".to_string()));
            }
            self.ops.lock().await.push(op);
            Ok(())
        }
    }

    #[async_trait]
    impl RecordStore for ScriptedRecordStore {
        async fn create(&self, resource: &str, data: &Value) -> Result<Value, AppError> {
            let subject = data
                .get("subject")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            self.record(format!("create:{resource}:{subject}")).await?;
            Ok(json!({"id": 1}))
        }

        async fn update(
            &self,
            resource: &str,
            id: &str,
            _data: &Value,
            _previous: Option<&Value>,
        ) -> Result<Value, AppError> {
            self.record(format!("update:{resource}:{id}")).await?;
            Ok(json!({"id": id}))
        }

        async fn delete(&self, resource: &str, id: &str) -> Result<(), AppError> {
            self.record(format!("delete:{resource}:{id}")).await
        }

        async fn query(&self, _resource: &str, _query: &RecordQuery) -> Result<RecordPage, AppError> {
            Ok(RecordPage::default())
        }
    }

    fn sync_config() -> SyncConfig {
        SyncConfig {
            auto_sync: false,
            sync_interval_secs: 30,
            debounce_ms: 50,
            max_retries: 3,
        }
    }

    fn engine_with(records: Arc<ScriptedRecordStore>) -> Arc<OfflineSyncEngine> {
        Arc::new(OfflineSyncEngine::new(
            records,
            Arc::new(MemoryKeyValueStore::new()),
            sync_config(),
        ))
    }

    #[tokio::test]
    async fn test_actions_sync_in_enqueue_order() {
        let records = Arc::new(ScriptedRecordStore::succeeding());
        let engine = engine_with(records.clone());
        engine.set_online(false).await;

        for subject in ["first", "second", "third"] {
            engine
                .queue_interaction(
                    ActionKind::Create,
                    "interactions",
                    json!({"subject": subject}),
                    None,
                )
                .await;
        }
        engine.is_online.store(true, Ordering::SeqCst);

        let report = engine.sync_pending_actions().await;
        assert!(report.success);
        assert_eq!(report.processed, 3);

        let ops = records.ops.lock().await.clone();
        assert_eq!(
            ops,
            vec![
                "create:interactions:first",
                "create:interactions:second",
                "create:interactions:third"
            ]
        );
        assert_eq!(engine.get_pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_failed_action_retries_then_abandons() {
        let records = Arc::new(ScriptedRecordStore::failing());
        let engine = engine_with(records.clone());
        engine.set_online(false).await;

        let id = engine
            .queue_interaction(
                ActionKind::Create,
                "interactions",
                json!({"subject": "doomed"}),
                None,
            )
            .await;
        engine.is_online.store(true, Ordering::SeqCst);

        let report = engine.sync_pending_actions().await;
        assert!(!report.success);
        assert_eq!(report.failed, 1);
        assert_eq!(engine.get_pending_count().await, 1);
        assert!(engine.has_conflicts(&id).await);

        engine.sync_pending_actions().await;
        assert_eq!(engine.get_pending_count().await, 1);

        // 3回目の失敗で放棄される
        let report = engine.sync_pending_actions().await;
        assert_eq!(report.failed, 1);
        assert!(report.errors[0].contains("abandoned"));
        assert_eq!(engine.get_pending_count().await, 0);
        assert_eq!(records.calls.load(Ordering::SeqCst), 3);
        assert!(engine.get_offline_interactions().await.is_empty());
    }

    #[tokio::test]
    async fn test_sync_passes_are_mutually_exclusive() {
        let records = Arc::new(ScriptedRecordStore::slow(Duration::from_millis(200)));
        let engine = engine_with(records.clone());
        engine.set_online(false).await;
        engine
            .queue_interaction(ActionKind::Create, "interactions", json!({"subject": "a"}), None)
            .await;
        engine.is_online.store(true, Ordering::SeqCst);

        let background = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.sync_pending_actions().await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let second = engine.sync_pending_actions().await;
        assert!(!second.success);
        assert_eq!(second.errors, vec!["Sync already in progress".to_string()]);

        let first = background.await.unwrap();
        assert!(first.success);
        assert_eq!(records.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sync_skipped_while_offline() {
        let records = Arc::new(ScriptedRecordStore::succeeding());
        let engine = engine_with(records.clone());
        engine.set_online(false).await;
        engine
            .queue_interaction(ActionKind::Create, "interactions", json!({"subject": "a"}), None)
            .await;

        let report = engine.sync_pending_actions().await;
        assert!(!report.success);
        assert_eq!(report.errors, vec!["Device is offline".to_string()]);
        assert_eq!(records.calls.load(Ordering::SeqCst), 0);
        assert_eq!(engine.get_pending_count().await, 1);
    }

    #[tokio::test]
    async fn test_offline_create_then_reconnect_drains_queue() {
        let records = Arc::new(ScriptedRecordStore::succeeding());
        let engine = engine_with(records.clone());
        engine.set_online(false).await;

        let id = engine
            .queue_interaction(
                ActionKind::Create,
                "interactions",
                json!({"subject": "site visit"}),
                None,
            )
            .await;
        assert!(id.starts_with(OFFLINE_ID_PREFIX));

        let local = engine.get_offline_interactions().await;
        assert_eq!(local.len(), 1);
        assert_eq!(local[0]["_pendingSync"], json!(true));
        assert_eq!(local[0]["id"], json!(id.clone()));

        // デバウンス同期が走るまで待つ
        engine.set_online(true).await;
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(engine.get_pending_count().await, 0);
        assert!(engine.get_offline_interactions().await.is_empty());
        let status = engine.get_status().await;
        assert!(status.last_sync.is_some());
        assert!(!status.sync_in_progress);
    }

    #[tokio::test]
    async fn test_queue_survives_restart_via_storage() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let records = Arc::new(ScriptedRecordStore::succeeding());
        let engine = Arc::new(OfflineSyncEngine::new(
            records.clone(),
            store.clone(),
            sync_config(),
        ));
        engine.set_online(false).await;
        engine
            .queue_interaction(ActionKind::Create, "interactions", json!({"subject": "a"}), None)
            .await;

        let restarted = Arc::new(OfflineSyncEngine::new(records, store, sync_config()));
        restarted.load().await;
        assert_eq!(restarted.get_pending_count().await, 1);
        assert_eq!(restarted.get_offline_interactions().await.len(), 1);
    }

    #[tokio::test]
    async fn test_corrupted_queue_loads_as_empty() {
        let store = Arc::new(MemoryKeyValueStore::new());
        store
            .set(QUEUE_KEY, &json!("definitely not a queue"))
            .await
            .unwrap();

        let engine = Arc::new(OfflineSyncEngine::new(
            Arc::new(ScriptedRecordStore::succeeding()),
            store,
            sync_config(),
        ));
        engine.load().await;
        assert_eq!(engine.get_pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_observers_notified_and_unsubscribed() {
        let engine = engine_with(Arc::new(ScriptedRecordStore::succeeding()));
        engine.set_online(false).await;

        let seen = Arc::new(Mutex::new(Vec::<EngineStatus>::new()));
        let sink = seen.clone();
        let id = engine
            .on_status_change(Arc::new(move |status| {
                if let Ok(mut guard) = sink.try_lock() {
                    guard.push(status);
                }
            }))
            .await;

        engine
            .queue_interaction(ActionKind::Create, "interactions", json!({"subject": "a"}), None)
            .await;
        assert_eq!(seen.lock().await.last().unwrap().pending_actions, 1);

        assert!(engine.unsubscribe(id).await);
        assert!(!engine.unsubscribe(id).await);
    }

    #[tokio::test]
    async fn test_panicking_observer_does_not_poison_others() {
        let engine = engine_with(Arc::new(ScriptedRecordStore::succeeding()));
        engine.set_online(false).await;

        engine
            .on_status_change(Arc::new(|_status| panic!("observer bug")))
            .await;
        let called = Arc::new(AtomicBool::new(false));
        let flag = called.clone();
        engine
            .on_status_change(Arc::new(move |_status| {
                flag.store(true, Ordering::SeqCst);
            }))
            .await;

        engine
            .queue_interaction(ActionKind::Create, "interactions", json!({"subject": "a"}), None)
            .await;
        assert!(called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_clear_offline_data() {
        let engine = engine_with(Arc::new(ScriptedRecordStore::succeeding()));
        engine.set_online(false).await;
        engine
            .queue_interaction(ActionKind::Create, "interactions", json!({"subject": "a"}), None)
            .await;
        engine.is_online.store(true, Ordering::SeqCst);
        engine.sync_pending_actions().await;
        assert!(engine.get_status().await.last_sync.is_some());

        engine.clear_offline_data().await;
        assert_eq!(engine.get_pending_count().await, 0);
        assert!(engine.get_offline_interactions().await.is_empty());
        assert!(engine.get_status().await.last_sync.is_none());
    }

    #[tokio::test]
    async fn test_cleared_last_sync_does_not_survive_restart() {
        let store = Arc::new(MemoryKeyValueStore::new());
        let records = Arc::new(ScriptedRecordStore::succeeding());
        let engine = Arc::new(OfflineSyncEngine::new(
            records.clone(),
            store.clone(),
            sync_config(),
        ));
        engine.set_online(false).await;
        engine
            .queue_interaction(ActionKind::Create, "interactions", json!({"subject": "a"}), None)
            .await;
        engine.is_online.store(true, Ordering::SeqCst);
        engine.sync_pending_actions().await;
        engine.clear_offline_data().await;

        let restarted = Arc::new(OfflineSyncEngine::new(records, store, sync_config()));
        restarted.load().await;
        assert!(restarted.get_status().await.last_sync.is_none());
    }

    #[tokio::test]
    async fn test_delete_action_uses_queued_id() {
        let records = Arc::new(ScriptedRecordStore::succeeding());
        let engine = engine_with(records.clone());
        engine.set_online(false).await;

        engine
            .queue_interaction(
                ActionKind::Delete,
                "interactions",
                Value::Null,
                Some("42".to_string()),
            )
            .await;
        engine.is_online.store(true, Ordering::SeqCst);
        engine.sync_pending_actions().await;

        let ops = records.ops.lock().await.clone();
        assert_eq!(ops, vec!["delete:interactions:42"]);
    }
}
