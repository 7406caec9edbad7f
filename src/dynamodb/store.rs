//! The boundary to DynamoDB itself.
//!
//! [`Store`] is the small set of requests the access layer needs. It is implemented for
//! the SDK [`Client`]; tests provide an in-memory implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::{
    types::{
        AttributeValue, DeleteRequest, KeysAndAttributes, PutRequest,
        WriteRequest as SdkWriteRequest,
    },
    Client,
};

use crate::dynamodb::{Error, Item, Result};
use crate::expression::CompiledExpression;

/// One entry of a batch write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteRequest {
    /// Create or replace an item.
    Put(Item),
    /// Delete the item with this key. Deleting an absent key is a no-op.
    Delete(Item),
}

impl WriteRequest {
    /// A put of `item`.
    pub fn put(item: Item) -> Self {
        Self::Put(item)
    }

    /// A delete of the item identified by `key`.
    pub fn delete(key: Item) -> Self {
        Self::Delete(key)
    }
}

/// Placeholder maps shared by all expressions of one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpressionAttributes {
    /// `#name` placeholders.
    pub names: HashMap<String, String>,
    /// `:n` placeholders.
    pub values: HashMap<String, AttributeValue>,
}

impl ExpressionAttributes {
    fn into_parts(
        self,
    ) -> (
        Option<HashMap<String, String>>,
        Option<HashMap<String, AttributeValue>>,
    ) {
        // DynamoDB rejects empty placeholder maps.
        (
            Some(self.names).filter(|m| !m.is_empty()),
            Some(self.values).filter(|m| !m.is_empty()),
        )
    }
}

impl From<&CompiledExpression> for ExpressionAttributes {
    fn from(expression: &CompiledExpression) -> Self {
        Self {
            names: expression.attribute_names.clone(),
            values: expression.attribute_values.clone(),
        }
    }
}

/// A PutItem request.
#[derive(Debug, Clone, PartialEq)]
pub struct PutItemRequest {
    /// Target table.
    pub table_name: String,
    /// Item to write.
    pub item: Item,
    /// Optional condition expression.
    pub condition: Option<String>,
    /// Placeholders used by `condition`.
    pub attributes: ExpressionAttributes,
}

/// A Query request for one page.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    /// Target table.
    pub table_name: String,
    /// Index to query instead of the base table.
    pub index_name: Option<String>,
    /// Key condition expression.
    pub key_condition: String,
    /// Optional filter expression.
    pub filter: Option<String>,
    /// Placeholders used by both expressions.
    pub attributes: ExpressionAttributes,
    /// Ascending (`true`) or descending sort key order.
    pub scan_forward: bool,
    /// Resume after this key.
    pub exclusive_start_key: Option<Item>,
    /// Maximum items to evaluate.
    pub limit: Option<usize>,
}

/// A Scan request for one page of one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    /// Target table.
    pub table_name: String,
    /// Index to scan instead of the base table.
    pub index_name: Option<String>,
    /// Segment this request reads.
    pub segment: usize,
    /// Number of segments the table is split into.
    pub total_segments: usize,
    /// Optional filter expression.
    pub filter: Option<String>,
    /// Placeholders used by `filter`.
    pub attributes: ExpressionAttributes,
    /// Resume after this key.
    pub exclusive_start_key: Option<Item>,
    /// Maximum items to evaluate.
    pub limit: Option<usize>,
}

/// One page of query or scan results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Items on this page.
    pub items: Vec<Item>,
    /// Where the next page starts; `None` when the read is complete.
    pub last_evaluated_key: Option<Item>,
}

/// Result of one BatchGetItem call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchGetOutput {
    /// Items found.
    pub items: Vec<Item>,
    /// Keys DynamoDB did not get to and that must be resubmitted.
    pub unprocessed_keys: Vec<Item>,
}

/// Requests the access layer issues against DynamoDB.
///
/// Implementations report throttling as [`Error::Throttled`] and failed conditions as
/// [`Error::ConditionalCheckFailed`]; the engine relies on that to decide what to retry.
#[async_trait]
pub trait Store: Send + Sync {
    /// GetItem.
    async fn get_item(&self, table_name: &str, key: &Item) -> Result<Option<Item>>;

    /// PutItem.
    async fn put_item(&self, request: &PutItemRequest) -> Result<()>;

    /// BatchWriteItem; returns the unprocessed entries.
    async fn batch_write_item(
        &self,
        table_name: &str,
        requests: &[WriteRequest],
    ) -> Result<Vec<WriteRequest>>;

    /// BatchGetItem.
    async fn batch_get_item(&self, table_name: &str, keys: &[Item]) -> Result<BatchGetOutput>;

    /// Query, one page.
    async fn query(&self, request: &QueryRequest) -> Result<Page>;

    /// Scan, one page of one segment.
    async fn scan(&self, request: &ScanRequest) -> Result<Page>;
}

fn to_i32(value: usize, what: &str) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::InvalidArgument(format!("{what} out of range")))
}

fn non_empty(item: Option<HashMap<String, AttributeValue>>) -> Option<Item> {
    item.filter(|attrs| !attrs.is_empty()).map(Item::from)
}

fn to_sdk_write_request(request: &WriteRequest) -> Result<SdkWriteRequest> {
    let builder = SdkWriteRequest::builder();
    Ok(match request {
        WriteRequest::Put(item) => builder
            .put_request(
                PutRequest::builder()
                    .set_item(Some(item.attributes().clone()))
                    .build()?,
            )
            .build(),
        WriteRequest::Delete(key) => builder
            .delete_request(
                DeleteRequest::builder()
                    .set_key(Some(key.attributes().clone()))
                    .build()?,
            )
            .build(),
    })
}

fn from_sdk_write_request(request: SdkWriteRequest) -> Option<WriteRequest> {
    if let Some(put) = request.put_request() {
        return Some(WriteRequest::Put(put.item().clone().into()));
    }
    request
        .delete_request()
        .map(|delete| WriteRequest::Delete(delete.key().clone().into()))
}

#[async_trait]
impl Store for Client {
    async fn get_item(&self, table_name: &str, key: &Item) -> Result<Option<Item>> {
        let response = self
            .get_item()
            .table_name(table_name)
            .set_key(Some(key.attributes().clone()))
            .send()
            .await
            .map_err(Error::from_sdk)?;

        Ok(non_empty(response.item))
    }

    async fn put_item(&self, request: &PutItemRequest) -> Result<()> {
        let (names, values) = request.attributes.clone().into_parts();
        self.put_item()
            .table_name(&request.table_name)
            .set_item(Some(request.item.attributes().clone()))
            .set_condition_expression(request.condition.clone())
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .send()
            .await
            .map_err(Error::from_sdk)?;
        Ok(())
    }

    async fn batch_write_item(
        &self,
        table_name: &str,
        requests: &[WriteRequest],
    ) -> Result<Vec<WriteRequest>> {
        let requests = requests
            .iter()
            .map(to_sdk_write_request)
            .collect::<Result<Vec<_>>>()?;

        let response = self
            .batch_write_item()
            .request_items(table_name, requests)
            .send()
            .await
            .map_err(Error::from_sdk)?;

        Ok(response
            .unprocessed_items
            .and_then(|mut tables| tables.remove(table_name))
            .unwrap_or_default()
            .into_iter()
            .filter_map(from_sdk_write_request)
            .collect())
    }

    async fn batch_get_item(&self, table_name: &str, keys: &[Item]) -> Result<BatchGetOutput> {
        let keys_and_attributes = KeysAndAttributes::builder()
            .set_keys(Some(keys.iter().map(|k| k.attributes().clone()).collect()))
            .build()?;

        let response = self
            .batch_get_item()
            .request_items(table_name, keys_and_attributes)
            .send()
            .await
            .map_err(Error::from_sdk)?;

        let items = response
            .responses
            .and_then(|mut tables| tables.remove(table_name))
            .unwrap_or_default()
            .into_iter()
            .map(Item::from)
            .collect();

        let unprocessed_keys = response
            .unprocessed_keys
            .and_then(|mut tables| tables.remove(table_name))
            .map(|pending| pending.keys().iter().cloned().map(Item::from).collect())
            .unwrap_or_default();

        Ok(BatchGetOutput {
            items,
            unprocessed_keys,
        })
    }

    async fn query(&self, request: &QueryRequest) -> Result<Page> {
        let (names, values) = request.attributes.clone().into_parts();
        let limit = request.limit.map(|l| to_i32(l, "limit")).transpose()?;

        let response = self
            .query()
            .table_name(&request.table_name)
            .set_index_name(request.index_name.clone())
            .key_condition_expression(&request.key_condition)
            .set_filter_expression(request.filter.clone())
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .scan_index_forward(request.scan_forward)
            .set_exclusive_start_key(
                request
                    .exclusive_start_key
                    .as_ref()
                    .map(|k| k.attributes().clone()),
            )
            .set_limit(limit)
            .send()
            .await
            .map_err(Error::from_sdk)?;

        Ok(Page {
            items: response
                .items
                .unwrap_or_default()
                .into_iter()
                .map(Item::from)
                .collect(),
            last_evaluated_key: non_empty(response.last_evaluated_key),
        })
    }

    async fn scan(&self, request: &ScanRequest) -> Result<Page> {
        let (names, values) = request.attributes.clone().into_parts();
        let limit = request.limit.map(|l| to_i32(l, "limit")).transpose()?;

        let response = self
            .scan()
            .table_name(&request.table_name)
            .set_index_name(request.index_name.clone())
            .segment(to_i32(request.segment, "segment")?)
            .total_segments(to_i32(request.total_segments, "total segments")?)
            .set_filter_expression(request.filter.clone())
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .set_exclusive_start_key(
                request
                    .exclusive_start_key
                    .as_ref()
                    .map(|k| k.attributes().clone()),
            )
            .set_limit(limit)
            .send()
            .await
            .map_err(Error::from_sdk)?;

        Ok(Page {
            items: response
                .items
                .unwrap_or_default()
                .into_iter()
                .map(Item::from)
                .collect(),
            last_evaluated_key: non_empty(response.last_evaluated_key),
        })
    }
}
