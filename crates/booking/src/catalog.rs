//! Admin catalog management for workshops.

use std::collections::BTreeSet;

use common::ItemId;
use domain::{ActorRole, Money, Workshop};
use store::BookingStore;

use crate::availability::require_admin;
use crate::error::BookingError;

/// Partial update for a workshop's admin-editable fields.
///
/// Price and description updates never retroactively change the amounts of
/// bookings that already reference the workshop.
#[derive(Debug, Clone, Default)]
pub struct WorkshopUpdate {
    pub price: Option<Money>,
    pub description: Option<String>,
    pub tags: Option<BTreeSet<String>>,
}

/// Admin-only CRUD for the workshop catalog.
pub struct CatalogService<S> {
    store: S,
}

impl<S: BookingStore> CatalogService<S> {
    /// Creates a new catalog service.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a workshop. Admin only.
    pub async fn create_workshop(
        &self,
        actor: ActorRole,
        title: impl Into<String>,
        description: impl Into<String>,
        price: Money,
        capacity: u32,
        tags: BTreeSet<String>,
    ) -> Result<Workshop, BookingError> {
        require_admin(actor, "create workshops")?;
        let workshop = Workshop::new(title, description, price, capacity, tags)?;
        self.store.insert_workshop(&workshop).await?;
        tracing::info!(workshop_id = %workshop.id(), "workshop created");
        Ok(workshop)
    }

    /// Retrieves a workshop.
    pub async fn get_workshop(&self, id: ItemId) -> Result<Workshop, BookingError> {
        self.store
            .get_workshop(id)
            .await?
            .ok_or_else(|| BookingError::NotFound {
                entity: "workshop",
                id: id.to_string(),
            })
    }

    /// Lists all workshops.
    pub async fn list_workshops(&self) -> Result<Vec<Workshop>, BookingError> {
        Ok(self.store.list_workshops().await?)
    }

    /// Applies a partial update. Admin only.
    pub async fn update_workshop(
        &self,
        actor: ActorRole,
        id: ItemId,
        update: WorkshopUpdate,
    ) -> Result<Workshop, BookingError> {
        require_admin(actor, "update workshops")?;
        let mut workshop = self.get_workshop(id).await?;

        if let Some(price) = update.price {
            workshop.update_price(price)?;
        }
        if let Some(description) = update.description {
            workshop.update_description(description)?;
        }
        if let Some(tags) = update.tags {
            workshop.update_tags(tags);
        }

        self.store.update_workshop(&workshop).await?;
        Ok(workshop)
    }

    /// Deletes a workshop. Admin only.
    pub async fn delete_workshop(&self, actor: ActorRole, id: ItemId) -> Result<(), BookingError> {
        require_admin(actor, "delete workshops")?;
        self.store.delete_workshop(id).await?;
        tracing::info!(workshop_id = %id, "workshop deleted");
        Ok(())
    }
}
