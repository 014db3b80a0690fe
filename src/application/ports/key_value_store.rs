use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::Value;

/// ローカル永続ストレージの抽象。値はJSONシリアライズ可能であること。
///
/// キュー・ミラー・GPSキャッシュ・テレメトリのスナップショットが
/// この口を通じて保存される。書き込み失敗はベストエフォート扱いで、
/// 呼び出し側はログに残してメモリ内状態で継続する。
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, AppError>;
    async fn set(&self, key: &str, value: &Value) -> Result<(), AppError>;
    async fn remove(&self, key: &str) -> Result<(), AppError>;
}
