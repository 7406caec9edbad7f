use std::collections::HashMap;

use crate::dynamodb::{Item, KeySchema};

/// DynamoDB table configuration.
///
/// Holds the table name, its primary key schema and the key schemas of its named
/// secondary indexes. This is the only place that knows which attributes are key
/// attributes, which matters for pagination: a cursor must carry exactly the attributes
/// DynamoDB needs to resume. When paging through an index that is the base table key
/// plus the index key.
///
/// A `Table` is built once and never changes afterwards.
///
/// # Example
///
/// ```
/// use dynamodb_access::{Item, KeySchema, Table};
///
/// let table = Table::new("orders", KeySchema::new("PK", Some("SK")))
///     .with_index("GSI1", KeySchema::new("GSI1PK", Some("GSI1SK")));
///
/// let item = Item::new()
///     .set_string("PK", "USER#1")
///     .set_string("SK", "ORDER#1")
///     .set_string("GSI1PK", "STATUS#open")
///     .set_string("GSI1SK", "2024-01-01")
///     .set_number("total", 42);
///
/// assert_eq!(table.extract_primary_key(&item).len(), 2);
/// assert_eq!(table.extract_all_keys(&item).len(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    primary_key: KeySchema,
    indexes: HashMap<String, KeySchema>,
}

impl Table {
    /// Creates a new `Table` with no secondary indexes.
    pub fn new(name: impl Into<String>, primary_key: KeySchema) -> Self {
        Self {
            name: name.into(),
            primary_key,
            indexes: HashMap::new(),
        }
    }

    /// Registers a secondary index and returns the modified `Table`.
    pub fn with_index(mut self, name: impl Into<String>, key: KeySchema) -> Self {
        self.indexes.insert(name.into(), key);
        self
    }

    /// Returns the name of the table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the primary key schema.
    pub fn primary_key(&self) -> &KeySchema {
        &self.primary_key
    }

    /// Returns the registered secondary indexes.
    pub fn indexes(&self) -> &HashMap<String, KeySchema> {
        &self.indexes
    }

    /// Keeps only the primary key attributes of `item`.
    ///
    /// Missing key attributes are simply absent from the result.
    pub fn extract_primary_key(&self, item: &Item) -> Item {
        item.retain_names(|name| self.primary_key.contains(name))
    }

    /// Keeps the primary key attributes and every attribute used by any index key.
    pub fn extract_all_keys(&self, item: &Item) -> Item {
        item.retain_names(|name| {
            self.primary_key.contains(name) || self.indexes.values().any(|k| k.contains(name))
        })
    }

    /// Cursor projection for a read through `index_name` (or the base table).
    pub fn extract_keys(&self, item: &Item, index_name: Option<&str>) -> Item {
        match index_name {
            Some(_) => self.extract_all_keys(item),
            None => self.extract_primary_key(item),
        }
    }
}
