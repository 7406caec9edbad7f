use aws_sdk_dynamodb::types::AttributeValue;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fmt::Display;

use crate::dynamodb::{Error, Result};

/// A DynamoDB item: attribute names mapped to values.
///
/// Items travel in both directions. Callers build them to put or to use as keys, and the
/// access layer hands them back as query/scan results and as pagination cursors. A cursor
/// is simply an item holding nothing but key attributes.
///
/// # Numbers
///
/// DynamoDB numbers are decimals of up to 38 digits. `set_number` stores the value's
/// textual form as-is, so `"0.10000000000000000001"` is never rounded through `f64`.
///
/// # Example
///
/// ```
/// use dynamodb_access::Item;
///
/// let item = Item::new()
///     .set_string("category", "Books")
///     .set_string("product_name", "The Rust Programming Language")
///     .set_number("price", "39.99")
///     .set_bool("in_stock", true);
/// assert_eq!(item.get_number("price"), Some(39.99));
/// ```
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Item {
    pub(crate) attributes: HashMap<String, AttributeValue>,
}

impl Item {
    /// Creates a new empty `Item`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a string attribute.
    pub fn set_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .insert(key.into(), AttributeValue::S(value.into()));
        self
    }

    /// Sets a number attribute from anything that prints as a decimal.
    pub fn set_number(mut self, key: impl Into<String>, value: impl Display) -> Self {
        self.attributes
            .insert(key.into(), AttributeValue::N(value.to_string()));
        self
    }

    /// Sets a boolean attribute.
    pub fn set_bool(mut self, key: impl Into<String>, value: bool) -> Self {
        self.attributes.insert(key.into(), AttributeValue::Bool(value));
        self
    }

    /// Sets an arbitrary attribute value.
    pub fn set(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Gets the value of an attribute as a string.
    ///
    /// Returns `None` if the attribute doesn't exist or is not a string.
    pub fn get_string(&self, key: &str) -> Option<&String> {
        self.attributes.get(key).and_then(|av| av.as_s().ok())
    }

    /// Gets the value of an attribute as a number (f64).
    ///
    /// Returns `None` if the attribute doesn't exist, is not a number, or can't be parsed as f64.
    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.attributes
            .get(key)
            .and_then(|av| av.as_n().ok())
            .and_then(|n| n.parse().ok())
    }

    /// Gets the value of a boolean attribute.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.attributes
            .get(key)
            .and_then(|av| av.as_bool().ok())
            .copied()
    }

    /// Gets the raw value of an attribute.
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Returns a reference to all attributes.
    pub fn attributes(&self) -> &HashMap<String, AttributeValue> {
        &self.attributes
    }

    /// Consumes the item, returning its attribute map.
    pub fn into_attributes(self) -> HashMap<String, AttributeValue> {
        self.attributes
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the item has no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Copies of the attributes whose names satisfy `keep`.
    pub(crate) fn retain_names(&self, keep: impl Fn(&str) -> bool) -> Item {
        self.attributes
            .iter()
            .filter(|(name, _)| keep(name))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Builds an item from any serializable value via `serde_dynamo`.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        serde_dynamo::to_item(value)
            .map(|attributes| Self { attributes })
            .map_err(|e| Error::InvalidArgument(e.to_string()))
    }

    /// Deserializes the item into `T` via `serde_dynamo`.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        serde_dynamo::from_item(self.attributes.clone())
            .map_err(|e| Error::InvalidArgument(e.to_string()))
    }
}

impl From<HashMap<String, AttributeValue>> for Item {
    fn from(attributes: HashMap<String, AttributeValue>) -> Self {
        Self { attributes }
    }
}

impl From<Item> for HashMap<String, AttributeValue> {
    fn from(item: Item) -> Self {
        item.attributes
    }
}

impl FromIterator<(String, AttributeValue)> for Item {
    fn from_iter<I: IntoIterator<Item = (String, AttributeValue)>>(iter: I) -> Self {
        Self {
            attributes: iter.into_iter().collect(),
        }
    }
}
