//! # DynamoDB Module
//!
//! High-level access to one DynamoDB table.
//!
//! ## Components
//!
//! - `DynamoDb`: paginated queries and scans, chunked batch reads and writes, conditional
//!   puts, all retried on throttling.
//! - `Item`: a DynamoDB item with typed accessors.
//! - `KeySchema`: the partition and optional sort key of a table or index.
//! - `Table`: table name plus the key schemas of the table and its indexes.
//! - `Store`: the requests sent to DynamoDB, implemented for the SDK client.
//!
//! ## Usage
//!
//! The SDK configuration is loaded from the environment:
//!
//! - `AWS_ACCESS_KEY_ID`: Your AWS access key ID.
//! - `AWS_SECRET_ACCESS_KEY`: Your AWS secret access key.
//! - `AWS_REGION`: The AWS region where your DynamoDB tables are located.
//!
//! Optionally, you can also set:
//! - `AWS_SESSION_TOKEN`: If you're using temporary credentials.
//! - `AWS_ENDPOINT_URL`: For using a custom endpoint (e.g., for local development).
//!
//! ## Example
//!
//! ```rust,no_run
//! use dynamodb_access::{DynamoDb, Item, KeySchema, Table, WriteRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = aws_config::load_from_env().await;
//!     let table = Table::new("products", KeySchema::new("category", Some("product_name")));
//!     let ddb = DynamoDb::new(&config, table);
//!
//!     let item = Item::new()
//!         .set_string("category", "Books")
//!         .set_string("product_name", "The Rust Programming Language")
//!         .set_number("price", 39.99);
//!
//!     // Only create the item if it does not exist yet
//!     ddb.put_item(item.clone(), Some("attribute_not_exists(category)")).await?;
//!
//!     // Remove it again
//!     ddb.batch_write(vec![WriteRequest::delete(item)]).await?;
//!
//!     Ok(())
//! }
//! ```

mod client;
mod error;
mod item;
mod schema;
pub mod store;
mod table;

pub use client::{
    DynamoDb, QueryOptions, ScanOptions, BATCH_GET_SIZE_LIMIT, BATCH_WRITE_SIZE_LIMIT,
};
pub use error::{Error, Result};
pub use item::Item;
pub use schema::KeySchema;
pub use store::{Store, WriteRequest};
pub use table::Table;
