//! DynamoDB implementation of the state store
//!
//! All transitions use the single-table layout described in the data model:
//! URL records keyed by `url_hash`, domain rate-limit records keyed
//! `domain#<scheme>://<host>`, allowlist records keyed
//! `allowed_domain#<host>`. Conditional-check failures are the signalling
//! mechanism, not errors: they map to `Ok(false)`.

use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};

use crate::models::{DomainStatus, FetchResult, UrlStatus};
use crate::storage::{
    StateStore, StoreError, ALLOWED_DOMAIN_KEY_PREFIX, DOMAIN_KEY_PREFIX, ITEM_TTL,
};

/// State store adapter backed by a DynamoDB table
#[derive(Debug, Clone)]
pub struct DynamoStateStore {
    client: Client,
    table_name: String,
}

impl DynamoStateStore {
    pub fn new(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    fn key(url_hash: &str) -> AttributeValue {
        AttributeValue::S(url_hash.to_string())
    }

    fn now_iso() -> String {
        Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn expires_at() -> String {
        let ttl = Utc::now().timestamp() + ITEM_TTL.as_secs() as i64;
        ttl.to_string()
    }
}

/// Map an SDK error outcome: conditional-check failures become `Ok(false)`,
/// everything else a backend error.
fn condition_outcome(conditional_failed: bool, message: String) -> Result<bool, StoreError> {
    if conditional_failed {
        Ok(false)
    } else {
        Err(StoreError::Backend(message))
    }
}

#[async_trait]
impl StateStore for DynamoStateStore {
    async fn claim(&self, url_hash: &str) -> Result<bool, StoreError> {
        let result = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key("url_hash", Self::key(url_hash))
            .update_expression("SET #s = :processing, processing_at = :now ADD attempts :one")
            .condition_expression("#s = :queued")
            .expression_attribute_names("#s", "status")
            .expression_attribute_values(
                ":queued",
                AttributeValue::S(UrlStatus::Queued.as_str().to_string()),
            )
            .expression_attribute_values(
                ":processing",
                AttributeValue::S(UrlStatus::Processing.as_str().to_string()),
            )
            .expression_attribute_values(":now", AttributeValue::S(Self::now_iso()))
            .expression_attribute_values(":one", AttributeValue::N("1".to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                let conditional_failed = err
                    .as_service_error()
                    .map(|e| e.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                condition_outcome(conditional_failed, err.to_string())
            }
        }
    }

    async fn mark_status(&self, url_hash: &str, status: UrlStatus) -> Result<(), StoreError> {
        self.client
            .update_item()
            .table_name(&self.table_name)
            .key("url_hash", Self::key(url_hash))
            .update_expression("SET #s = :status, finished_at = :now")
            .expression_attribute_names("#s", "status")
            .expression_attribute_values(":status", AttributeValue::S(status.as_str().to_string()))
            .expression_attribute_values(":now", AttributeValue::S(Self::now_iso()))
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn reset_to_queued(&self, url_hash: &str) -> Result<(), StoreError> {
        self.client
            .update_item()
            .table_name(&self.table_name)
            .key("url_hash", Self::key(url_hash))
            .update_expression("SET #s = :queued")
            .expression_attribute_names("#s", "status")
            .expression_attribute_values(
                ":queued",
                AttributeValue::S(UrlStatus::Queued.as_str().to_string()),
            )
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn save_fetch_result(
        &self,
        url_hash: &str,
        result: &FetchResult,
        depth: u32,
    ) -> Result<(), StoreError> {
        let status = if result.success {
            UrlStatus::Done
        } else {
            UrlStatus::Failed
        };

        self.client
            .update_item()
            .table_name(&self.table_name)
            .key("url_hash", Self::key(url_hash))
            .update_expression(
                "SET #s = :status, finished_at = :now, expires_at = :ttl, \
                 http_status = :http_status, content_length = :content_length, \
                 content_type = :content_type, fetch_duration_ms = :duration, \
                 fetch_error = :error, crawl_depth = :depth",
            )
            .expression_attribute_names("#s", "status")
            .expression_attribute_values(":status", AttributeValue::S(status.as_str().to_string()))
            .expression_attribute_values(":now", AttributeValue::S(Self::now_iso()))
            .expression_attribute_values(":ttl", AttributeValue::N(Self::expires_at()))
            .expression_attribute_values(
                ":http_status",
                AttributeValue::N(result.status_code.to_string()),
            )
            .expression_attribute_values(
                ":content_length",
                AttributeValue::N(result.content_length.to_string()),
            )
            .expression_attribute_values(
                ":content_type",
                AttributeValue::S(result.content_type.clone()),
            )
            .expression_attribute_values(
                ":duration",
                AttributeValue::N(result.duration_ms.to_string()),
            )
            .expression_attribute_values(":error", AttributeValue::S(result.error.clone()))
            .expression_attribute_values(":depth", AttributeValue::N(depth.to_string()))
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn save_archive_keys(
        &self,
        url_hash: &str,
        bucket: &str,
        raw_key: &str,
        text_key: &str,
    ) -> Result<(), StoreError> {
        self.client
            .update_item()
            .table_name(&self.table_name)
            .key("url_hash", Self::key(url_hash))
            .update_expression(
                "SET blob_bucket = :bucket, raw_key = :raw_key, text_key = :text_key",
            )
            .expression_attribute_values(":bucket", AttributeValue::S(bucket.to_string()))
            .expression_attribute_values(":raw_key", AttributeValue::S(raw_key.to_string()))
            .expression_attribute_values(":text_key", AttributeValue::S(text_key.to_string()))
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(())
    }

    async fn try_reserve_domain(
        &self,
        domain: &str,
        now_ms: i64,
        min_ts_ms: i64,
    ) -> Result<bool, StoreError> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .item(
                "url_hash",
                AttributeValue::S(format!("{DOMAIN_KEY_PREFIX}{domain}")),
            )
            .item("last_crawled_at", AttributeValue::N(now_ms.to_string()))
            .item("domain", AttributeValue::S(domain.to_string()))
            .condition_expression("attribute_not_exists(url_hash) OR last_crawled_at < :min_time")
            .expression_attribute_values(":min_time", AttributeValue::N(min_ts_ms.to_string()))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                let conditional_failed = err
                    .as_service_error()
                    .map(|e| e.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                condition_outcome(conditional_failed, err.to_string())
            }
        }
    }

    async fn is_domain_allowed(&self, host: &str) -> Result<bool, StoreError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(
                "url_hash",
                AttributeValue::S(format!("{ALLOWED_DOMAIN_KEY_PREFIX}{host}")),
            )
            .send()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let Some(item) = result.item else {
            return Ok(false);
        };
        Ok(item
            .get("status")
            .and_then(|v| v.as_s().ok())
            .map(|s| s == DomainStatus::Active.as_str())
            .unwrap_or(false))
    }

    async fn try_add_domain(
        &self,
        host: &str,
        discovered_from: &str,
    ) -> Result<bool, StoreError> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .item(
                "url_hash",
                AttributeValue::S(format!("{ALLOWED_DOMAIN_KEY_PREFIX}{host}")),
            )
            .item("host", AttributeValue::S(host.to_string()))
            .item(
                "status",
                AttributeValue::S(DomainStatus::Active.as_str().to_string()),
            )
            .item(
                "discovered_from",
                AttributeValue::S(discovered_from.to_string()),
            )
            .item("created_at", AttributeValue::S(Self::now_iso()))
            .condition_expression("attribute_not_exists(url_hash)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                let conditional_failed = err
                    .as_service_error()
                    .map(|e| e.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                condition_outcome(conditional_failed, err.to_string())
            }
        }
    }

    async fn try_claim_url(&self, url_hash: &str, url: &str) -> Result<bool, StoreError> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .item("url_hash", Self::key(url_hash))
            .item("url", AttributeValue::S(url.to_string()))
            .item(
                "status",
                AttributeValue::S(UrlStatus::Queued.as_str().to_string()),
            )
            .condition_expression("attribute_not_exists(url_hash)")
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                let conditional_failed = err
                    .as_service_error()
                    .map(|e| e.is_conditional_check_failed_exception())
                    .unwrap_or(false);
                condition_outcome(conditional_failed, err.to_string())
            }
        }
    }
}
