use crate::application::ports::{ProgressCallback, UploadTransport};
use crate::application::services::telemetry::PerformanceTelemetry;
use crate::domain::entities::{FileAttachment, FileValidation, Thumbnail, UploadOutcome};
use crate::infrastructure::media;
use crate::shared::config::UploadConfig;
use crate::shared::error::AppError;
use base64::Engine;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const DEFAULT_THUMBNAIL_SIZE: u32 = 150;

/// ファイル転送サービス。検証・圧縮・進捗通知・キャンセルを担当する。
///
/// アップロードの失敗は `UploadOutcome` の値として返り、呼び出し側に
/// 例外経路を強いない。進行中の転送は upload_id ごとのトークンで
/// 個別にキャンセルできる。
pub struct FileTransferService {
    transport: Arc<dyn UploadTransport>,
    config: UploadConfig,
    telemetry: Option<Arc<PerformanceTelemetry>>,
    active: Mutex<HashMap<String, CancellationToken>>,
}

impl FileTransferService {
    pub fn new(transport: Arc<dyn UploadTransport>, config: UploadConfig) -> Self {
        Self {
            transport,
            config,
            telemetry: None,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_telemetry(mut self, telemetry: Arc<PerformanceTelemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    /// ファイル名・サイズ上限・許可タイプの事前検査。
    pub fn validate_file(&self, file: &FileAttachment) -> FileValidation {
        let name = file.file_name.trim();
        if name.is_empty() || name.chars().count() > 255 {
            return FileValidation::rejected("File name must be between 1 and 255 characters");
        }
        if file.size() > self.config.max_size_bytes {
            return FileValidation::rejected(format!(
                "File size exceeds {} limit",
                format_file_size(self.config.max_size_bytes)
            ));
        }
        if !self
            .config
            .allowed_types
            .iter()
            .any(|t| t == &file.content_type)
        {
            return FileValidation::rejected(format!(
                "File type {} is not allowed",
                file.content_type
            ));
        }
        FileValidation::ok()
    }

    /// 検証 → 任意の圧縮 → 転送。検証で落ちた場合トランスポートには
    /// 到達しない。
    pub async fn upload_file(
        &self,
        endpoint: &str,
        file: FileAttachment,
        upload_id: Option<String>,
        progress: Option<ProgressCallback>,
    ) -> UploadOutcome {
        let started_at = Utc::now();
        let original_size = file.size();

        let validation = self.validate_file(&file);
        if !validation.valid {
            let message = validation
                .error
                .unwrap_or_else(|| "File validation failed".to_string());
            self.record_upload(original_size, started_at, false, None, Some(message.clone()))
                .await;
            return UploadOutcome::failed(message);
        }

        let file = match self.compress_image(file).await {
            Ok(file) => file,
            Err(e) => {
                let message = format!("Image compression failed: {e}");
                self.record_upload(original_size, started_at, false, None, Some(message.clone()))
                    .await;
                return UploadOutcome::failed(message);
            }
        };
        let compression_ratio = if original_size > 0 && file.size() < original_size {
            Some(file.size() as f64 / original_size as f64)
        } else {
            None
        };

        let upload_id = upload_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let cancel = CancellationToken::new();
        {
            let mut active = self.active.lock().await;
            active.insert(upload_id.clone(), cancel.clone());
        }

        let sent = self
            .transport
            .send(endpoint, &file, &upload_id, progress, cancel)
            .await;

        {
            let mut active = self.active.lock().await;
            active.remove(&upload_id);
        }

        match sent {
            Ok(receipt) => {
                tracing::info!(
                    target: "fieldsync::upload",
                    "Upload completed: {} -> {}",
                    receipt.file_name,
                    receipt.url
                );
                self.record_upload(file.size(), started_at, true, compression_ratio, None)
                    .await;
                UploadOutcome::succeeded(receipt)
            }
            Err(AppError::UploadCancelled) => {
                tracing::info!(target: "fieldsync::upload", "Upload cancelled: {}", upload_id);
                self.record_upload(
                    file.size(),
                    started_at,
                    false,
                    compression_ratio,
                    Some("cancelled".to_string()),
                )
                .await;
                UploadOutcome::failed("Upload was cancelled")
            }
            Err(e) => {
                tracing::warn!(target: "fieldsync::upload", "Upload failed: {}", e);
                self.record_upload(
                    file.size(),
                    started_at,
                    false,
                    compression_ratio,
                    Some(e.to_string()),
                )
                .await;
                UploadOutcome::failed(e.to_string())
            }
        }
    }

    /// 進行中アップロードのキャンセル。該当がなければ false。
    pub async fn cancel_upload(&self, upload_id: &str) -> bool {
        let active = self.active.lock().await;
        match active.get(upload_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn cancel_all_uploads(&self) -> usize {
        let active = self.active.lock().await;
        for token in active.values() {
            token.cancel();
        }
        active.len()
    }

    pub async fn active_upload_count(&self) -> usize {
        self.active.lock().await.len()
    }

    /// 画像はJPEG再エンコードで縮小。非画像・圧縮無効時はそのまま返す。
    pub async fn compress_image(&self, file: FileAttachment) -> Result<FileAttachment, AppError> {
        if !self.config.compression_enabled || !file.is_image() {
            return Ok(file);
        }
        if file.content_type == "image/gif" {
            // アニメーションが壊れるため再エンコードしない
            return Ok(file);
        }

        let max_width = self.config.max_width;
        let max_height = self.config.max_height;
        let quality = self.config.quality;
        let bytes = file.bytes.clone();
        let compressed = tokio::task::spawn_blocking(move || {
            media::compress_to_jpeg(&bytes, max_width, max_height, quality)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Compression task failed: {e}")))??;

        // 縮まらないなら元を使う
        if compressed.len() as u64 >= file.size() {
            return Ok(file);
        }

        let file_name = media::with_jpeg_extension(&file.file_name);
        Ok(FileAttachment::new(file_name, "image/jpeg", compressed))
    }

    /// 正方形サムネイルとプレビュー用 data URI の生成。非画像は None。
    pub async fn create_thumbnail(
        &self,
        file: &FileAttachment,
        size: Option<u32>,
    ) -> Result<Option<Thumbnail>, AppError> {
        if !file.is_image() {
            return Ok(None);
        }

        let size = size.unwrap_or(DEFAULT_THUMBNAIL_SIZE);
        let quality = self.config.quality;
        let bytes = file.bytes.clone();
        let thumb = tokio::task::spawn_blocking(move || {
            media::square_thumbnail_jpeg(&bytes, size, quality)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Thumbnail task failed: {e}")))??;

        let encoded = base64::engine::general_purpose::STANDARD.encode(&thumb);
        let preview_data_uri = format!("data:image/jpeg;base64,{encoded}");

        Ok(Some(Thumbnail {
            bytes: thumb.into(),
            content_type: "image/jpeg".to_string(),
            preview_data_uri,
        }))
    }

    async fn record_upload(
        &self,
        file_size: u64,
        started_at: chrono::DateTime<Utc>,
        success: bool,
        compression_ratio: Option<f64>,
        error_message: Option<String>,
    ) {
        if let Some(telemetry) = &self.telemetry {
            telemetry
                .track_file_upload(file_size, started_at, success, compression_ratio, error_message)
                .await;
        }
    }
}

/// バイト数を人間向けに整形する。1024進で小数2桁。
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::UploadReceipt;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubTransport {
        calls: AtomicUsize,
        result: std::sync::Mutex<Option<Result<UploadReceipt, AppError>>>,
    }

    impl StubTransport {
        fn ok(file_name: &str, url: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: std::sync::Mutex::new(Some(Ok(UploadReceipt {
                    file_name: file_name.to_string(),
                    url: url.to_string(),
                }))),
            }
        }

        fn failing(error: AppError) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                result: std::sync::Mutex::new(Some(Err(error))),
            }
        }
    }

    #[async_trait]
    impl UploadTransport for StubTransport {
        async fn send(
            &self,
            _endpoint: &str,
            _file: &FileAttachment,
            _upload_id: &str,
            _progress: Option<ProgressCallback>,
            _cancel: CancellationToken,
        ) -> Result<UploadReceipt, AppError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(AppError::Internal("stub exhausted".to_string())))
        }
    }

    fn config() -> UploadConfig {
        let mut cfg = crate::shared::config::AppConfig::default().upload;
        cfg.compression_enabled = false;
        cfg
    }

    #[tokio::test]
    async fn test_oversized_file_never_reaches_transport() {
        let transport = Arc::new(StubTransport::ok("big.pdf", "https://files/big.pdf"));
        let service = FileTransferService::new(transport.clone(), config());

        let file = FileAttachment::new(
            "big.pdf",
            "application/pdf",
            vec![0u8; 11 * 1024 * 1024],
        );
        let outcome = service.upload_file("/upload", file, None, None).await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("File size exceeds"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disallowed_type_never_reaches_transport() {
        let transport = Arc::new(StubTransport::ok("tool.exe", "https://files/tool.exe"));
        let service = FileTransferService::new(transport.clone(), config());

        let file = FileAttachment::new("tool.exe", "application/x-msdownload", vec![1u8; 16]);
        let outcome = service.upload_file("/upload", file, None, None).await;

        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("not allowed"));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_successful_upload_returns_receipt_fields() {
        let transport = Arc::new(StubTransport::ok("note.txt", "https://files/note.txt"));
        let service = FileTransferService::new(transport, config());

        let file = FileAttachment::new("note.txt", "text/plain", b"hello".to_vec());
        let outcome = service.upload_file("/upload", file, None, None).await;

        assert!(outcome.success);
        assert_eq!(outcome.file_name.as_deref(), Some("note.txt"));
        assert_eq!(outcome.url.as_deref(), Some("https://files/note.txt"));
        assert_eq!(service.active_upload_count().await, 0);
    }

    #[tokio::test]
    async fn test_cancelled_upload_has_distinct_message() {
        let transport = Arc::new(StubTransport::failing(AppError::UploadCancelled));
        let service = FileTransferService::new(transport, config());

        let file = FileAttachment::new("note.txt", "text/plain", b"hello".to_vec());
        let outcome = service.upload_file("/upload", file, None, None).await;

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("Upload was cancelled"));
    }

    #[tokio::test]
    async fn test_cancel_unknown_upload_returns_false() {
        let transport = Arc::new(StubTransport::ok("a", "b"));
        let service = FileTransferService::new(transport, config());
        assert!(!service.cancel_upload("no-such-upload").await);
    }

    #[tokio::test]
    async fn test_non_image_passes_compression_untouched() {
        let transport = Arc::new(StubTransport::ok("a", "b"));
        let mut cfg = config();
        cfg.compression_enabled = true;
        let service = FileTransferService::new(transport, cfg);

        let file = FileAttachment::new("doc.pdf", "application/pdf", vec![9u8; 128]);
        let passed = service.compress_image(file.clone()).await.unwrap();
        assert_eq!(passed, file);
    }

    #[tokio::test]
    async fn test_thumbnail_skipped_for_non_images() {
        let transport = Arc::new(StubTransport::ok("a", "b"));
        let service = FileTransferService::new(transport, config());

        let file = FileAttachment::new("doc.pdf", "application/pdf", vec![9u8; 128]);
        assert!(service.create_thumbnail(&file, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_file_name_is_rejected() {
        let transport = Arc::new(StubTransport::ok("a", "b"));
        let service = FileTransferService::new(transport, config());

        let file = FileAttachment::new("  ", "text/plain", b"hello".to_vec());
        let validation = service.validate_file(&file);
        assert!(!validation.valid);
        assert!(validation.error.unwrap().contains("File name"));
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 B");
        assert_eq!(format_file_size(512), "512 B");
        assert_eq!(format_file_size(1024), "1.00 KB");
        assert_eq!(format_file_size(1536), "1.50 KB");
        assert_eq!(format_file_size(10 * 1024 * 1024), "10.00 MB");
    }
}
