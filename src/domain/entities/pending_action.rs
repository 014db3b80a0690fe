use crate::domain::value_objects::ActionKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// オフライン生成IDの識別用プレフィックス。
pub const OFFLINE_ID_PREFIX: &str = "offline_";

/// 同期待ちミューテーション。キューは追加順（古い順）で処理される。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: String,
    pub kind: ActionKind,
    pub resource: String,
    pub payload: Value,
    pub enqueued_at: DateTime<Utc>,
    pub retry_count: u32,
    pub max_retries: u32,
}

impl PendingAction {
    pub fn new(
        kind: ActionKind,
        resource: impl Into<String>,
        payload: Value,
        id: Option<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            id: id.unwrap_or_else(generate_offline_id),
            kind,
            resource: resource.into(),
            payload,
            enqueued_at: Utc::now(),
            retry_count: 0,
            max_retries,
        }
    }

    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

pub fn generate_offline_id() -> String {
    format!("{}{}", OFFLINE_ID_PREFIX, Uuid::new_v4())
}
