use crate::shared::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortOrder {
    pub field: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordQuery {
    pub filter: Option<Value>,
    pub sort: Option<SortOrder>,
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    pub data: Vec<Value>,
    pub total: u64,
}

/// リモートレコードストア。同期エンジンが同期パス中に呼び出す
/// 外部コラボレータで、RESTクライアント等で実装される。
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn create(&self, resource: &str, data: &Value) -> Result<Value, AppError>;
    async fn update(
        &self,
        resource: &str,
        id: &str,
        data: &Value,
        previous: Option<&Value>,
    ) -> Result<Value, AppError>;
    async fn delete(&self, resource: &str, id: &str) -> Result<(), AppError>;
    async fn query(&self, resource: &str, query: &RecordQuery) -> Result<RecordPage, AppError>;
}
