use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// アップロード対象のファイル実体。
#[derive(Debug, Clone, PartialEq)]
pub struct FileAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl FileAttachment {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// 事前バリデーションの結果。失敗は例外ではなく値で返る。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileValidation {
    pub valid: bool,
    pub error: Option<String>,
}

impl FileValidation {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(message.into()),
        }
    }
}

/// 転送中の進捗通知。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UploadProgress {
    pub loaded: u64,
    pub total: u64,
    pub percentage: f64,
}

impl UploadProgress {
    pub fn new(loaded: u64, total: u64) -> Self {
        let percentage = if total == 0 {
            0.0
        } else {
            (loaded as f64 / total as f64 * 100.0).min(100.0)
        };
        Self {
            loaded,
            total,
            percentage,
        }
    }
}

/// トランスポートが2xx応答からパースするボディ。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub file_name: String,
    pub url: String,
}

/// アップロード全体の結果。キャンセルは固有のメッセージで区別される。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub success: bool,
    pub file_name: Option<String>,
    pub url: Option<String>,
    pub error: Option<String>,
}

impl UploadOutcome {
    pub fn succeeded(receipt: UploadReceipt) -> Self {
        Self {
            success: true,
            file_name: Some(receipt.file_name),
            url: Some(receipt.url),
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            file_name: None,
            url: None,
            error: Some(message.into()),
        }
    }
}

/// サムネイル生成の結果。非画像には生成されない。
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub bytes: Bytes,
    pub content_type: String,
    pub preview_data_uri: String,
}
