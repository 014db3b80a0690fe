pub mod key_value_store;
pub mod location_source;
pub mod record_store;
pub mod upload_transport;

pub use key_value_store::KeyValueStore;
pub use location_source::LocationSource;
pub use record_store::{Pagination, RecordPage, RecordQuery, RecordStore, SortOrder};
pub use upload_transport::{ProgressCallback, UploadTransport};
