/// The key schema of a table or of one of its secondary indexes.
///
/// In DynamoDB every item is identified by its primary key, which can be:
/// - **Simple**: just a partition key.
/// - **Composite**: a partition key plus a sort key.
///
/// Secondary indexes have a key schema of their own:
/// - **Global Secondary Index (GSI)**: partition and sort key can differ from the table's.
/// - **Local Secondary Index (LSI)**: same partition key as the table, different sort key.
///
/// # Example
///
/// ```
/// use dynamodb_access::KeySchema;
///
/// let primary = KeySchema::new("PK", Some("SK"));
/// let by_email = KeySchema::new("email", None::<String>);
/// assert_eq!(primary.attribute_names(), vec!["PK", "SK"]);
/// assert_eq!(by_email.sort_key(), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySchema {
    partition_key: String,
    sort_key: Option<String>,
}

impl KeySchema {
    /// Creates a new `KeySchema`.
    pub fn new(partition_key: impl Into<String>, sort_key: Option<impl Into<String>>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_key: sort_key.map(Into::into),
        }
    }

    /// Returns the partition key attribute name.
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Returns the sort key attribute name, if any.
    pub fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }

    /// Names of every attribute in the key, partition key first.
    pub fn attribute_names(&self) -> Vec<&str> {
        std::iter::once(self.partition_key())
            .chain(self.sort_key())
            .collect()
    }

    /// Whether `name` is part of this key.
    pub fn contains(&self, name: &str) -> bool {
        self.partition_key == name || self.sort_key() == Some(name)
    }
}
