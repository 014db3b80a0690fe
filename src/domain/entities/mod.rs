pub mod interaction;
pub mod pending_action;
pub mod sync_report;
pub mod telemetry;
pub mod upload;

pub use interaction::{AttachmentMeta, InteractionDraft};
pub use pending_action::{generate_offline_id, PendingAction, OFFLINE_ID_PREFIX};
pub use sync_report::{EngineStatus, SyncReport};
pub use telemetry::{
    ApiSample, ApiSummary, GpsSample, GpsSummary, MetricCategory, MetricSample,
    PerformanceSummary, UploadSample, UploadSummary, WarningSummary,
};
pub use upload::{
    FileAttachment, FileValidation, Thumbnail, UploadOutcome, UploadProgress, UploadReceipt,
};
