use serde::{Deserialize, Serialize};

/// 添付ファイルのメタデータ。転送サービスとは独立に検証される。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMeta {
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: u64,
}

/// UI層から届くインタラクション記録のドラフト。
///
/// 日付フィールドは RFC 3339 文字列のまま保持する。入力は信頼できない
/// ため、バリデータ側でパースして不正値をエラーとして報告する。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InteractionDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub organization_id: Option<i64>,
    pub contact_id: Option<i64>,
    pub type_id: Option<i64>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub outcome: Option<String>,
    pub follow_up_notes: Option<String>,
    pub location_notes: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub duration_minutes: Option<f64>,
    pub is_completed: Option<bool>,
    pub follow_up_required: Option<bool>,
    pub scheduled_date: Option<String>,
    pub completed_date: Option<String>,
    pub follow_up_date: Option<String>,
    pub attachments: Option<Vec<AttachmentMeta>>,
}
