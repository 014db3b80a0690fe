pub mod multipart_upload;
pub mod rest_record_store;

pub use multipart_upload::MultipartUploadTransport;
pub use rest_record_store::RestRecordStore;
