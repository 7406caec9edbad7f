use std::env;
use tokio::time::Duration;

use crate::dynamodb::{Error, KeySchema, Result, Table};
use crate::utils::{RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY};

const DEFAULT_TABLE_NAME: &str = "testing-products";
const DEFAULT_PARTITION_KEY: &str = "category";
const DEFAULT_SORT_KEY: &str = "product_name";

/// Table and retry settings read from the environment.
///
/// | Variable                  | Default            |
/// |---------------------------|--------------------|
/// | `DYNAMODB_TABLE`          | `testing-products` |
/// | `DYNAMODB_PARTITION_KEY`  | `category`         |
/// | `DYNAMODB_SORT_KEY`       | `product_name`     |
/// | `DYNAMODB_INDEXES`        | none               |
/// | `DYNAMODB_MAX_RETRIES`    | `10`               |
/// | `DYNAMODB_RETRY_DELAY_MS` | `500`              |
///
/// An empty `DYNAMODB_SORT_KEY` means the table has no sort key. `DYNAMODB_INDEXES` lists
/// secondary indexes as `name:partition[:sort]`, separated by commas.
#[derive(Debug, Clone)]
pub struct TableConfig {
    /// Table name and key schemas.
    pub table: Table,
    /// Throttling retry settings.
    pub retry: RetryPolicy,
}

impl TableConfig {
    /// Create configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let name = lookup("DYNAMODB_TABLE").unwrap_or_else(|| DEFAULT_TABLE_NAME.to_string());
        let partition_key = lookup("DYNAMODB_PARTITION_KEY")
            .unwrap_or_else(|| DEFAULT_PARTITION_KEY.to_string());
        let sort_key = lookup("DYNAMODB_SORT_KEY").unwrap_or_else(|| DEFAULT_SORT_KEY.to_string());
        let sort_key = Some(sort_key.trim().to_string()).filter(|s| !s.is_empty());

        let table = Self::parse_indexes(&lookup("DYNAMODB_INDEXES").unwrap_or_default())?
            .into_iter()
            .fold(
                Table::new(name, KeySchema::new(partition_key, sort_key)),
                |table, (index, key)| table.with_index(index, key),
            );

        let max_retries = match lookup("DYNAMODB_MAX_RETRIES") {
            Some(value) => parse_number("DYNAMODB_MAX_RETRIES", &value)?,
            None => DEFAULT_MAX_RETRIES,
        };
        let delay = match lookup("DYNAMODB_RETRY_DELAY_MS") {
            Some(value) => Duration::from_millis(parse_number("DYNAMODB_RETRY_DELAY_MS", &value)?),
            None => DEFAULT_RETRY_DELAY,
        };

        Ok(Self {
            table,
            retry: RetryPolicy::new(max_retries, delay),
        })
    }

    /// Parses `name:partition[:sort]` index entries separated by commas.
    pub fn parse_indexes(entries: &str) -> Result<Vec<(String, KeySchema)>> {
        entries
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                let parts: Vec<&str> = entry.split(':').map(str::trim).collect();
                match parts.as_slice() {
                    [name, pk] if !name.is_empty() && !pk.is_empty() => {
                        Ok((name.to_string(), KeySchema::new(*pk, None::<&str>)))
                    }
                    [name, pk, sk] if !name.is_empty() && !pk.is_empty() && !sk.is_empty() => {
                        Ok((name.to_string(), KeySchema::new(*pk, Some(*sk))))
                    }
                    _ => Err(Error::InvalidArgument(format!(
                        "invalid index entry '{entry}', expected name:partition[:sort]"
                    ))),
                }
            })
            .collect()
    }
}

fn parse_number<T: std::str::FromStr>(variable: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidArgument(format!("{variable} must be a number, got '{value}'")))
}
