//! Typed, paginated and throttling-aware access to a DynamoDB table.
//!
//! Conditions, key conditions and filters are written in a small readable language and
//! compiled to DynamoDB placeholder expressions (see [`expression`]). The [`DynamoDb`]
//! engine runs them against a [`Table`], taking care of batch limits, pagination cursors
//! and retries.

pub mod config;
pub mod dynamodb;
pub mod expression;
pub mod utils;

pub use dynamodb::{
    DynamoDb, Error, Item, KeySchema, QueryOptions, Result, ScanOptions, Store, Table,
    WriteRequest,
};
pub use utils::RetryPolicy;

#[cfg(test)]
mod tests;
