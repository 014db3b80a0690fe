use crate::domain::value_objects::{Coordinates, LocationError, PermissionState};
use async_trait::async_trait;

/// プラットフォームの位置情報機能の抽象。
///
/// タイムアウトは `GeoLocationService` 側で適用するため、実装は
/// 単発の取得だけを提供すればよい。想定内の失敗（権限拒否・測位
/// 不能）は `LocationError` で分類して返す。
#[async_trait]
pub trait LocationSource: Send + Sync {
    fn is_available(&self) -> bool;
    async fn current_fix(&self, high_accuracy: bool) -> Result<Coordinates, LocationError>;
    async fn permission(&self) -> PermissionState;
}
