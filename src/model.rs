//! Item records and the payloads that create, patch and filter them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{MAX_DESCRIPTION_LEN, MAX_NAME_LEN};
use crate::error::{StoreError, StoreResult};

/// A stored item.
///
/// `id`, `created_at` and `updated_at` are assigned by the store; callers never
/// choose them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    pub in_stock: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller payload for creating an item.
///
/// Unknown fields (a client-sent `id` or timestamps) are ignored on
/// deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default = "default_in_stock")]
    pub in_stock: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewItem {
    pub fn new(name: impl Into<String>, price: f64) -> Self {
        Self {
            name: name.into(),
            description: None,
            price,
            in_stock: true,
            tags: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn out_of_stock(mut self) -> Self {
        self.in_stock = false;
        self
    }

    pub fn validate(&self) -> StoreResult<()> {
        validate_name(&self.name)?;
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        validate_price(self.price)
    }

    pub(crate) fn into_item(self, id: String, now: DateTime<Utc>) -> Item {
        Item {
            id,
            name: self.name,
            description: self.description,
            price: self.price,
            in_stock: self.in_stock,
            tags: self.tags,
            created_at: now,
            updated_at: now,
        }
    }
}

fn default_in_stock() -> bool {
    true
}

/// Partial update. Only the fields that are `Some` are merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub in_stock: Option<bool>,
    pub tags: Option<Vec<String>>,
}

impl ItemPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.price.is_none()
            && self.in_stock.is_none()
            && self.tags.is_none()
    }

    pub fn validate(&self) -> StoreResult<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        Ok(())
    }

    /// Merge into `item` and stamp `updated_at`. Never moves `updated_at`
    /// before `created_at`.
    pub(crate) fn apply(&self, item: &mut Item, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            item.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            item.description = Some(description.clone());
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(in_stock) = self.in_stock {
            item.in_stock = in_stock;
        }
        if let Some(tags) = &self.tags {
            item.tags.clone_from(tags);
        }
        item.updated_at = now.max(item.created_at);
    }
}

/// Search predicates, combined with logical AND. An empty filter matches
/// every item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilter {
    /// Case-insensitive substring matched against name or description
    pub query: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub in_stock: Option<bool>,
    /// Matches items carrying at least one of these tags
    pub tags: Vec<String>,
}

impl SearchFilter {
    pub fn validate(&self) -> StoreResult<()> {
        for (label, bound) in [("min_price", self.min_price), ("max_price", self.max_price)] {
            if let Some(value) = bound {
                if !value.is_finite() || value < 0.0 {
                    return Err(StoreError::validation(format!(
                        "{label} must be a non-negative number"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn matches(&self, item: &Item) -> bool {
        if let Some(query) = self.query.as_deref().filter(|q| !q.is_empty()) {
            let needle = query.to_lowercase();
            let in_name = item.name.to_lowercase().contains(&needle);
            let in_description = item
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(&needle));
            if !in_name && !in_description {
                return false;
            }
        }
        if self.min_price.is_some_and(|min| item.price < min) {
            return false;
        }
        if self.max_price.is_some_and(|max| item.price > max) {
            return false;
        }
        if self.in_stock.is_some_and(|wanted| item.in_stock != wanted) {
            return false;
        }
        if !self.tags.is_empty() && !self.tags.iter().any(|tag| item.tags.contains(tag)) {
            return false;
        }
        true
    }
}

/// Per-id failure inside a best-effort batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkFailure {
    pub id: String,
    pub reason: String,
}

/// Result of a partial-success batch: succeeded items and failed ids are
/// reported separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkOutcome<T> {
    pub succeeded: Vec<T>,
    pub failed: Vec<BulkFailure>,
}

impl<T> BulkOutcome<T> {
    pub fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }

    pub fn failed_ids(&self) -> impl Iterator<Item = &str> {
        self.failed.iter().map(|f| f.id.as_str())
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

impl<T> Default for BulkOutcome<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_name(name: &str) -> StoreResult<()> {
    if name.trim().is_empty() {
        return Err(StoreError::validation("name must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(StoreError::validation(format!(
            "name must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_description(description: &str) -> StoreResult<()> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(StoreError::validation(format!(
            "description must be at most {MAX_DESCRIPTION_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_price(price: f64) -> StoreResult<()> {
    if !price.is_finite() || price < 0.0 {
        return Err(StoreError::validation("price must be a non-negative number"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Item {
        NewItem::new("Widget", 9.5)
            .with_description("A small blue widget")
            .with_tags(["tools", "blue"])
            .into_item("id-1".into(), Utc::now())
    }

    #[test]
    fn new_item_validation() {
        assert!(NewItem::new("ok", 0.0).validate().is_ok());
        assert!(matches!(
            NewItem::new("   ", 1.0).validate(),
            Err(StoreError::Validation(_))
        ));
        assert!(NewItem::new("neg", -0.01).validate().is_err());
        assert!(NewItem::new("nan", f64::NAN).validate().is_err());
        assert!(NewItem::new("x".repeat(101), 1.0).validate().is_err());
        assert!(NewItem::new("d", 1.0)
            .with_description("y".repeat(501))
            .validate()
            .is_err());
    }

    #[test]
    fn new_item_ignores_client_assigned_fields() {
        let item: NewItem = serde_json::from_str(
            r#"{"id":"mine","name":"Lamp","price":3.0,"created_at":"2020-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(item.name, "Lamp");
        assert!(item.in_stock);
        assert!(item.tags.is_empty());
    }

    #[test]
    fn patch_merges_only_provided_fields() {
        let mut item = sample();
        let before = item.clone();
        let patch = ItemPatch {
            price: Some(12.0),
            ..ItemPatch::default()
        };
        patch.apply(&mut item, Utc::now());

        assert_eq!(item.price, 12.0);
        assert_eq!(item.name, before.name);
        assert_eq!(item.description, before.description);
        assert_eq!(item.tags, before.tags);
        assert_eq!(item.created_at, before.created_at);
        assert!(item.updated_at >= item.created_at);
    }

    #[test]
    fn patch_never_moves_updated_at_before_created_at() {
        let mut item = sample();
        let earlier = item.created_at - chrono::Duration::seconds(10);
        ItemPatch::default().apply(&mut item, earlier);
        assert_eq!(item.updated_at, item.created_at);
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(ItemPatch::default().is_empty());
        let patch: ItemPatch = serde_json::from_str(r#"{"in_stock":false}"#).unwrap();
        assert!(!patch.is_empty());
    }

    #[test]
    fn filter_query_is_case_insensitive_over_name_and_description() {
        let item = sample();
        let by_name = SearchFilter {
            query: Some("WIDG".into()),
            ..SearchFilter::default()
        };
        let by_description = SearchFilter {
            query: Some("blue".into()),
            ..SearchFilter::default()
        };
        let miss = SearchFilter {
            query: Some("gadget".into()),
            ..SearchFilter::default()
        };
        assert!(by_name.matches(&item));
        assert!(by_description.matches(&item));
        assert!(!miss.matches(&item));
    }

    #[test]
    fn filter_predicates_are_anded() {
        let item = sample();
        let filter = SearchFilter {
            min_price: Some(5.0),
            max_price: Some(10.0),
            in_stock: Some(true),
            tags: vec!["blue".into(), "red".into()],
            ..SearchFilter::default()
        };
        assert!(filter.matches(&item));

        let out_of_range = SearchFilter {
            max_price: Some(9.0),
            ..filter.clone()
        };
        assert!(!out_of_range.matches(&item));

        let wrong_tags = SearchFilter {
            tags: vec!["red".into()],
            ..filter
        };
        assert!(!wrong_tags.matches(&item));
    }

    #[test]
    fn negative_price_bounds_are_rejected() {
        let filter = SearchFilter {
            min_price: Some(-1.0),
            ..SearchFilter::default()
        };
        assert!(matches!(filter.validate(), Err(StoreError::Validation(_))));
    }
}
