pub mod file_transfer;
pub mod geolocation;
pub mod interaction_validator;
pub mod offline_sync;
pub mod telemetry;

pub use file_transfer::{format_file_size, FileTransferService};
pub use geolocation::{GeoLocationService, LocationOptions, LocationResult, WatchId};
pub use interaction_validator::{InteractionTypeMeta, InteractionValidator};
pub use offline_sync::{OfflineSyncEngine, StatusCallback, SubscriptionId};
pub use telemetry::PerformanceTelemetry;
