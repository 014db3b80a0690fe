use crate::application::ports::{RecordPage, RecordQuery, RecordStore};
use crate::infrastructure::http::multipart_upload::join_url;
use crate::shared::error::AppError;
use async_trait::async_trait;
use serde_json::Value;

/// JSON REST API へのレコードストア実装。同期エンジンの
/// create/update/delete がここを通ってリモートへ届く。
pub struct RestRecordStore {
    client: reqwest::Client,
    base_url: String,
}

impl RestRecordStore {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    fn resource_url(&self, resource: &str) -> String {
        join_url(&self.base_url, resource)
    }

    fn record_url(&self, resource: &str, id: &str) -> String {
        format!("{}/{}", self.resource_url(resource), id)
    }

    async fn parse_json(response: reqwest::Response, url: &str) -> Result<Value, AppError> {
        if !response.status().is_success() {
            return Err(AppError::Network(format!(
                "HTTP {} for {}",
                response.status(),
                url
            )));
        }
        Ok(response.json::<Value>().await?)
    }
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn create(&self, resource: &str, data: &Value) -> Result<Value, AppError> {
        let url = self.resource_url(resource);
        let response = self.client.post(&url).json(data).send().await?;
        Self::parse_json(response, &url).await
    }

    async fn update(
        &self,
        resource: &str,
        id: &str,
        data: &Value,
        _previous: Option<&Value>,
    ) -> Result<Value, AppError> {
        let url = self.record_url(resource, id);
        let response = self.client.put(&url).json(data).send().await?;
        Self::parse_json(response, &url).await
    }

    async fn delete(&self, resource: &str, id: &str) -> Result<(), AppError> {
        let url = self.record_url(resource, id);
        let response = self.client.delete(&url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Network(format!(
                "HTTP {} for {}",
                response.status(),
                url
            )));
        }
        Ok(())
    }

    async fn query(&self, resource: &str, query: &RecordQuery) -> Result<RecordPage, AppError> {
        let url = self.resource_url(resource);
        let mut request = self.client.get(&url);

        if let Some(filter) = &query.filter {
            request = request.query(&[("filter", filter.to_string())]);
        }
        if let Some(sort) = &query.sort {
            let order = if sort.ascending { "ASC" } else { "DESC" };
            request = request.query(&[("sort", sort.field.as_str()), ("order", order)]);
        }
        if let Some(pagination) = &query.pagination {
            request = request.query(&[
                ("page", pagination.page.to_string()),
                ("perPage", pagination.per_page.to_string()),
            ]);
        }

        let response = request.send().await?;
        let body = Self::parse_json(response, &url).await?;
        let page = serde_json::from_value::<RecordPage>(body)?;
        Ok(page)
    }
}
