//! Availability service: the only component that moves a slot's capacity.

use chrono::Utc;
use common::{ItemId, SlotId};
use domain::{ActorRole, DateRange, Money, SlotDraft, TimeSlot};
use store::{BookingStore, SlotFilter};

use crate::error::BookingError;

/// Acknowledgment that capacity was successfully held.
///
/// Consumed by value on release, so a given reservation can be released at
/// most once through the token.
#[derive(Debug)]
pub struct ReservationToken {
    slot_id: SlotId,
    count: u32,
}

impl ReservationToken {
    /// Returns the slot the reservation was taken on.
    pub fn slot_id(&self) -> SlotId {
        self.slot_id
    }

    /// Returns the number of seats held.
    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Partial update for a slot's admin-editable fields.
#[derive(Debug, Clone, Default)]
pub struct SlotUpdate {
    /// Open or close the slot for new bookings.
    pub is_available: Option<bool>,

    /// New maximum capacity; may not drop below bookings already placed.
    pub max_capacity: Option<u32>,

    /// Set (`Some(Some(..))`) or clear (`Some(None)`) the price override.
    pub price_override: Option<Option<Money>>,
}

/// Tracks and mutates per-slot capacity.
///
/// The check-and-increment delegates to the store's atomic conditional
/// update, so two concurrent reservations near full capacity can never both
/// succeed when only one seat remains.
pub struct AvailabilityService<S> {
    store: S,
}

impl<S: BookingStore> AvailabilityService<S> {
    /// Creates a new availability service.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Atomically reserves `count` seats on a slot.
    ///
    /// Fails with the precise reason: `NotFound` for an unknown slot,
    /// `SlotClosed` when the slot is unavailable or inside the booking
    /// cutoff, `CapacityExceeded` when no seats remain.
    #[tracing::instrument(skip(self))]
    pub async fn reserve_capacity(
        &self,
        slot_id: SlotId,
        count: u32,
    ) -> Result<ReservationToken, BookingError> {
        let slot = self
            .store
            .get_slot(slot_id)
            .await?
            .ok_or_else(|| BookingError::NotFound {
                entity: "slot",
                id: slot_id.to_string(),
            })?;

        if !slot.is_available() || !slot.is_booking_allowed(Utc::now()) {
            return Err(BookingError::SlotClosed { slot_id });
        }

        if self.store.try_reserve_capacity(slot_id, count).await? {
            metrics::counter!("capacity_reservations").increment(1);
            Ok(ReservationToken { slot_id, count })
        } else {
            metrics::counter!("capacity_rejections").increment(1);
            tracing::info!(%slot_id, "reservation rejected, slot full");
            Err(BookingError::CapacityExceeded { slot_id })
        }
    }

    /// Releases a held reservation, consuming its token.
    pub async fn release(&self, token: ReservationToken) -> Result<(), BookingError> {
        self.release_capacity(token.slot_id, token.count).await
    }

    /// Releases `count` seats on a slot, floor-clamped at zero.
    ///
    /// Callers must track which reservations they already released; the
    /// counter cannot detect a double release.
    pub async fn release_capacity(&self, slot_id: SlotId, count: u32) -> Result<(), BookingError> {
        self.store.release_capacity(slot_id, count).await?;
        metrics::counter!("capacity_releases").increment(1);
        Ok(())
    }

    /// Lists bookable slots in the window, ordered by start time ascending.
    ///
    /// A slot is bookable when it has available capacity and the booking
    /// cutoff has not passed.
    pub async fn list_available_slots(
        &self,
        item_id: Option<ItemId>,
        window: DateRange,
    ) -> Result<Vec<TimeSlot>, BookingError> {
        let mut filter = SlotFilter::new().between(window.from, window.to);
        if let Some(item_id) = item_id {
            filter = filter.for_item(item_id);
        }

        let now = Utc::now();
        Ok(self
            .store
            .list_slots(filter)
            .await?
            .into_iter()
            .filter(|s| s.has_available_capacity() && s.is_booking_allowed(now))
            .collect())
    }

    /// Creates a slot. Admin only.
    pub async fn create_slot(
        &self,
        actor: ActorRole,
        draft: SlotDraft,
    ) -> Result<TimeSlot, BookingError> {
        require_admin(actor, "create slots")?;
        let slot = draft.build()?;
        self.store.insert_slot(&slot).await?;
        tracing::info!(slot_id = %slot.id(), "slot created");
        Ok(slot)
    }

    /// Creates a batch of slots; nothing is inserted if any draft is invalid.
    /// Admin only.
    pub async fn create_slots(
        &self,
        actor: ActorRole,
        drafts: Vec<SlotDraft>,
    ) -> Result<Vec<TimeSlot>, BookingError> {
        require_admin(actor, "create slots")?;
        let slots = drafts
            .into_iter()
            .map(SlotDraft::build)
            .collect::<Result<Vec<_>, _>>()?;
        self.store.insert_slots(&slots).await?;
        tracing::info!(count = slots.len(), "slots created in bulk");
        Ok(slots)
    }

    /// Applies a partial update to a slot. Admin only.
    pub async fn update_slot(
        &self,
        actor: ActorRole,
        slot_id: SlotId,
        update: SlotUpdate,
    ) -> Result<TimeSlot, BookingError> {
        require_admin(actor, "update slots")?;
        let mut slot = self
            .store
            .get_slot(slot_id)
            .await?
            .ok_or_else(|| BookingError::NotFound {
                entity: "slot",
                id: slot_id.to_string(),
            })?;

        if let Some(available) = update.is_available {
            slot.set_available(available);
        }
        if let Some(capacity) = update.max_capacity {
            slot.set_max_capacity(capacity)?;
        }
        if let Some(price) = update.price_override {
            slot.set_price_override(price)?;
        }

        self.store.update_slot(&slot).await?;
        Ok(slot)
    }

    /// Deletes a slot with no active bookings. Admin only.
    pub async fn delete_slot(&self, actor: ActorRole, slot_id: SlotId) -> Result<(), BookingError> {
        require_admin(actor, "delete slots")?;
        let slot = self
            .store
            .get_slot(slot_id)
            .await?
            .ok_or_else(|| BookingError::NotFound {
                entity: "slot",
                id: slot_id.to_string(),
            })?;

        if slot.current_bookings() > 0 {
            return Err(BookingError::SlotHasActiveBookings {
                slot_id,
                active: slot.current_bookings(),
            });
        }

        self.store.delete_slot(slot_id).await?;
        tracing::info!(%slot_id, "slot deleted");
        Ok(())
    }
}

pub(crate) fn require_admin(actor: ActorRole, action: &'static str) -> Result<(), BookingError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(BookingError::Unauthorized { action })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use domain::SlotKind;
    use store::InMemoryStore;

    fn service() -> (AvailabilityService<InMemoryStore>, InMemoryStore) {
        let store = InMemoryStore::new();
        (AvailabilityService::new(store.clone()), store)
    }

    fn draft_starting_in(hours: i64, capacity: u32) -> SlotDraft {
        let start = Utc::now() + Duration::hours(hours);
        SlotDraft::new(start, start + Duration::hours(2), SlotKind::Workshop, capacity)
    }

    #[tokio::test]
    async fn test_reserve_and_release_moves_the_counter() {
        let (service, store) = service();
        let slot = service
            .create_slot(ActorRole::Admin, draft_starting_in(48, 2))
            .await
            .unwrap();

        let token = service.reserve_capacity(slot.id(), 1).await.unwrap();
        assert_eq!(
            store.get_slot(slot.id()).await.unwrap().unwrap().current_bookings(),
            1
        );

        service.release(token).await.unwrap();
        assert_eq!(
            store.get_slot(slot.id()).await.unwrap().unwrap().current_bookings(),
            0
        );
    }

    #[tokio::test]
    async fn test_full_slot_rejects_with_capacity_exceeded() {
        let (service, _) = service();
        let slot = service
            .create_slot(ActorRole::Admin, draft_starting_in(48, 1))
            .await
            .unwrap();

        service.reserve_capacity(slot.id(), 1).await.unwrap();
        let err = service.reserve_capacity(slot.id(), 1).await.unwrap_err();
        assert!(matches!(err, BookingError::CapacityExceeded { .. }));
    }

    #[tokio::test]
    async fn test_cutoff_rejects_with_slot_closed() {
        let (service, _) = service();
        // Starts in 30 minutes: inside the one-hour cutoff
        let start = Utc::now() + Duration::minutes(30);
        let slot = service
            .create_slot(
                ActorRole::Admin,
                SlotDraft::new(start, start + Duration::hours(1), SlotKind::Space, 5),
            )
            .await
            .unwrap();

        let err = service.reserve_capacity(slot.id(), 1).await.unwrap_err();
        assert!(matches!(err, BookingError::SlotClosed { .. }));
    }

    #[tokio::test]
    async fn test_unavailable_slot_rejects_with_slot_closed() {
        let (service, _) = service();
        let slot = service
            .create_slot(ActorRole::Admin, draft_starting_in(48, 5))
            .await
            .unwrap();
        service
            .update_slot(
                ActorRole::Admin,
                slot.id(),
                SlotUpdate {
                    is_available: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let err = service.reserve_capacity(slot.id(), 1).await.unwrap_err();
        assert!(matches!(err, BookingError::SlotClosed { .. }));
    }

    #[tokio::test]
    async fn test_unknown_slot_rejects_with_not_found() {
        let (service, _) = service();
        let err = service.reserve_capacity(SlotId::new(), 1).await.unwrap_err();
        assert!(matches!(err, BookingError::NotFound { entity: "slot", .. }));
    }

    #[tokio::test]
    async fn test_admin_required_for_slot_crud() {
        let (service, _) = service();
        let err = service
            .create_slot(ActorRole::User, draft_starting_in(48, 5))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Unauthorized { .. }));

        let err = service
            .delete_slot(ActorRole::User, SlotId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn test_delete_slot_with_active_bookings_fails() {
        let (service, _) = service();
        let slot = service
            .create_slot(ActorRole::Admin, draft_starting_in(48, 2))
            .await
            .unwrap();
        service.reserve_capacity(slot.id(), 1).await.unwrap();

        let err = service
            .delete_slot(ActorRole::Admin, slot.id())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BookingError::SlotHasActiveBookings { active: 1, .. }
        ));

        service.release_capacity(slot.id(), 1).await.unwrap();
        service.delete_slot(ActorRole::Admin, slot.id()).await.unwrap();
    }

    #[tokio::test]
    async fn test_bulk_create_rejects_all_on_one_invalid_draft() {
        let (service, store) = service();
        let good = draft_starting_in(48, 5);
        let start = Utc::now() + Duration::hours(24);
        let bad = SlotDraft::new(start, start + Duration::minutes(5), SlotKind::Workshop, 5);

        let result = service
            .create_slots(ActorRole::Admin, vec![good, bad])
            .await;
        assert!(result.is_err());
        assert!(
            store
                .list_slots(SlotFilter::new())
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_list_available_slots_filters_and_orders() {
        let (service, _) = service();
        let later = service
            .create_slot(ActorRole::Admin, draft_starting_in(72, 1))
            .await
            .unwrap();
        let earlier = service
            .create_slot(ActorRole::Admin, draft_starting_in(48, 1))
            .await
            .unwrap();
        let full = service
            .create_slot(ActorRole::Admin, draft_starting_in(60, 1))
            .await
            .unwrap();
        service.reserve_capacity(full.id(), 1).await.unwrap();

        let now = Utc::now();
        let listed = service
            .list_available_slots(None, DateRange::new(now, now + Duration::days(7)))
            .await
            .unwrap();

        let ids: Vec<_> = listed.iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![earlier.id(), later.id()]);
    }
}
