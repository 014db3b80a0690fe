//! fieldsync — モバイル現場記録のためのオフラインファースト同期コア。
//!
//! GPS取得、オフラインキューの同期、ファイルアップロード、
//! インタラクション検証、パフォーマンス計測の5つのサービスを提供する。
//! プラットフォーム依存の入出力（位置情報・HTTP・永続化）はポートとして
//! 抽象化され、`infrastructure` のアダプタが差し込まれる。

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod shared;

pub use application::services::{
    FileTransferService, GeoLocationService, InteractionValidator, OfflineSyncEngine,
    PerformanceTelemetry,
};
pub use shared::config::AppConfig;
pub use shared::error::AppError;

use tracing_subscriber::{fmt, EnvFilter};

/// ロガーの初期化。`RUST_LOG` が無ければ info で起動する。
/// 二重初期化は無視される。
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
