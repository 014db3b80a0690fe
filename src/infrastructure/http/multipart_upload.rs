use crate::application::ports::{ProgressCallback, UploadTransport};
use crate::domain::entities::{FileAttachment, UploadProgress, UploadReceipt};
use crate::shared::error::AppError;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use reqwest::multipart;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const CHUNK_SIZE: usize = 64 * 1024;

/// HTTP multipart によるアップロードトランスポート。
///
/// ボディをチャンクのストリームとして送り、送信済みバイト数を
/// 進捗コールバックへ通知する。キャンセルトークンが発火したら
/// リクエストを打ち切り `AppError::UploadCancelled` を返す。
pub struct MultipartUploadTransport {
    client: reqwest::Client,
    base_url: String,
}

impl MultipartUploadTransport {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn url_for(&self, endpoint: &str) -> String {
        join_url(&self.base_url, endpoint)
    }
}

#[async_trait]
impl UploadTransport for MultipartUploadTransport {
    async fn send(
        &self,
        endpoint: &str,
        file: &FileAttachment,
        upload_id: &str,
        progress: Option<ProgressCallback>,
        cancel: CancellationToken,
    ) -> Result<UploadReceipt, AppError> {
        let url = self.url_for(endpoint);
        let total = file.size();

        let chunks: Vec<Bytes> = file
            .bytes
            .chunks(CHUNK_SIZE)
            .map(Bytes::copy_from_slice)
            .collect();
        let sent = Arc::new(AtomicU64::new(0));
        let stream = futures::stream::iter(chunks).map(move |chunk| {
            let loaded =
                sent.fetch_add(chunk.len() as u64, Ordering::SeqCst) + chunk.len() as u64;
            if let Some(callback) = &progress {
                callback(UploadProgress::new(loaded, total));
            }
            Ok::<Bytes, std::io::Error>(chunk)
        });

        let part = multipart::Part::stream_with_length(reqwest::Body::wrap_stream(stream), total)
            .file_name(file.file_name.clone())
            .mime_str(&file.content_type)?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("uploadId", upload_id.to_string());

        let request = self.client.post(&url).multipart(form).send();

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(AppError::UploadCancelled);
            }
            response = request => response?,
        };

        if !response.status().is_success() {
            return Err(AppError::Network(format!(
                "Upload failed with HTTP {} for {}",
                response.status(),
                url
            )));
        }

        let receipt = response.json::<UploadReceipt>().await?;
        Ok(receipt)
    }
}

pub(crate) fn join_url(base: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}
