//! Workshop catalog entity.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use common::ItemId;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::validation;
use crate::value_objects::Money;

/// A bookable catalog item.
///
/// Created, updated, and deleted only by admin-role actors. Price and
/// description updates never retroactively change the `total_amount` of
/// bookings that already reference the workshop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workshop {
    id: ItemId,
    title: String,
    description: String,
    price: Money,
    capacity: u32,
    tags: BTreeSet<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Workshop {
    /// Creates a new workshop after running the field validators.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        price: Money,
        capacity: u32,
        tags: BTreeSet<String>,
    ) -> Result<Self, ValidationError> {
        let title = title.into();
        let description = description.into();

        validation::validate_title(&title)?;
        validation::validate_description(&description)?;
        validation::validate_price(price)?;
        validation::validate_capacity(capacity)?;

        let now = Utc::now();
        Ok(Self {
            id: ItemId::new(),
            title,
            description,
            price,
            capacity,
            tags,
            created_at: now,
            updated_at: now,
        })
    }

    /// Returns the workshop ID.
    pub fn id(&self) -> ItemId {
        self.id
    }

    /// Returns the title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Returns the description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the price.
    pub fn price(&self) -> Money {
        self.price
    }

    /// Returns the capacity.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns the tag set.
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Returns when the workshop was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the workshop was last updated.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Updates the price. Existing bookings keep their original amounts.
    pub fn update_price(&mut self, price: Money) -> Result<(), ValidationError> {
        validation::validate_price(price)?;
        self.price = price;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Updates the description.
    pub fn update_description(
        &mut self,
        description: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let description = description.into();
        validation::validate_description(&description)?;
        self.description = description;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Replaces the tag set.
    pub fn update_tags(&mut self, tags: BTreeSet<String>) {
        self.tags = tags;
        self.updated_at = Utc::now();
    }
}
