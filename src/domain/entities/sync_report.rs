use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 1回の同期パスの集計結果。個別アクションの失敗はパス全体を
/// 中断させない（部分失敗許容）。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub success: bool,
    pub processed: u32,
    pub failed: u32,
    pub errors: Vec<String>,
}

impl SyncReport {
    /// 同期が開始できなかった場合（オフライン・実行中など）の結果。
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            processed: 0,
            failed: 0,
            errors: vec![reason.into()],
        }
    }
}

/// エンジンの観測可能な状態スナップショット。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStatus {
    pub is_online: bool,
    pub pending_actions: usize,
    pub last_sync: Option<DateTime<Utc>>,
    pub sync_in_progress: bool,
}
