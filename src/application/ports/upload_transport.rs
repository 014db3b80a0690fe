use crate::domain::entities::{FileAttachment, UploadProgress, UploadReceipt};
use crate::shared::error::AppError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// ファイル転送のトランスポート抽象。HTTP multipart 実装が
/// `infrastructure::http` にある。
///
/// キャンセルはトークン経由で伝搬し、`AppError::UploadCancelled`
/// として解決する（一般的な転送失敗と区別される）。
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn send(
        &self,
        endpoint: &str,
        file: &FileAttachment,
        upload_id: &str,
        progress: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> Result<UploadReceipt, AppError>;
}
