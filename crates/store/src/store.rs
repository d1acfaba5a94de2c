use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{BookingId, ItemId, PaymentId, SlotId, UserId, Version};
use domain::{Booking, DateRange, PaymentInfo, TimeSlot, Workshop};

use crate::Result;

/// Filter for slot queries.
#[derive(Debug, Clone, Default)]
pub struct SlotFilter {
    /// Restrict to slots referencing this workshop or space.
    pub item_id: Option<ItemId>,

    /// Restrict to slots starting at or after this instant.
    pub from: Option<DateTime<Utc>>,

    /// Restrict to slots starting at or before this instant.
    pub to: Option<DateTime<Utc>>,
}

impl SlotFilter {
    /// Creates an empty filter matching all slots.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts the filter to one item.
    pub fn for_item(mut self, item_id: ItemId) -> Self {
        self.item_id = Some(item_id);
        self
    }

    /// Restricts the filter to a start-time window.
    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Returns true if the slot matches this filter.
    pub fn matches(&self, slot: &TimeSlot) -> bool {
        if let Some(item_id) = self.item_id
            && slot.item_id() != Some(item_id)
        {
            return false;
        }
        if let Some(from) = self.from
            && slot.start_time() < from
        {
            return false;
        }
        if let Some(to) = self.to
            && slot.start_time() > to
        {
            return false;
        }
        true
    }
}

/// Core trait for booking-system persistence.
///
/// All implementations must be thread-safe (Send + Sync). Reads return
/// `Ok(None)` for missing records; updates and deletes of missing records
/// fail with `NotFound`.
#[async_trait]
pub trait BookingStore: Send + Sync {
    // -- workshops -----------------------------------------------------

    /// Persists a new workshop.
    async fn insert_workshop(&self, workshop: &Workshop) -> Result<()>;

    /// Retrieves a workshop by ID.
    async fn get_workshop(&self, id: ItemId) -> Result<Option<Workshop>>;

    /// Replaces an existing workshop record.
    async fn update_workshop(&self, workshop: &Workshop) -> Result<()>;

    /// Deletes a workshop.
    async fn delete_workshop(&self, id: ItemId) -> Result<()>;

    /// Lists all workshops.
    async fn list_workshops(&self) -> Result<Vec<Workshop>>;

    // -- slots ---------------------------------------------------------

    /// Persists a new slot.
    async fn insert_slot(&self, slot: &TimeSlot) -> Result<()>;

    /// Persists a batch of slots; either all succeed or none do.
    async fn insert_slots(&self, slots: &[TimeSlot]) -> Result<()>;

    /// Retrieves a slot by ID.
    async fn get_slot(&self, id: SlotId) -> Result<Option<TimeSlot>>;

    /// Replaces an existing slot record.
    ///
    /// Not for capacity changes; `current_bookings` moves only through
    /// [`try_reserve_capacity`](Self::try_reserve_capacity) and
    /// [`release_capacity`](Self::release_capacity).
    async fn update_slot(&self, slot: &TimeSlot) -> Result<()>;

    /// Deletes a slot.
    async fn delete_slot(&self, id: SlotId) -> Result<()>;

    /// Lists slots matching the filter, ordered by start time ascending.
    async fn list_slots(&self, filter: SlotFilter) -> Result<Vec<TimeSlot>>;

    /// Atomic check-and-increment of a slot's booking counter.
    ///
    /// Succeeds with `Ok(true)` and increments `current_bookings` by
    /// `count` only if the slot is available and the result stays within
    /// `max_capacity`; returns `Ok(false)` otherwise. The check and the
    /// increment are atomic with respect to concurrent callers on the same
    /// slot; nothing else in the system guards the capacity invariant.
    async fn try_reserve_capacity(&self, id: SlotId, count: u32) -> Result<bool>;

    /// Decrements a slot's booking counter, floor-clamped at zero.
    ///
    /// Callers must track which reservations they already released; a
    /// second release of the same reservation is a caller error this
    /// primitive cannot detect.
    async fn release_capacity(&self, id: SlotId, count: u32) -> Result<()>;

    // -- bookings ------------------------------------------------------

    /// Persists a new booking.
    async fn insert_booking(&self, booking: &Booking) -> Result<()>;

    /// Retrieves a booking by ID.
    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>>;

    /// Replaces a booking record if the stored version matches `expected`.
    ///
    /// Returns the new version on success. Fails with
    /// `ConcurrencyConflict` when the stored version differs, in which
    /// case the caller should reload and retry from its original intent.
    async fn update_booking(&self, booking: &Booking, expected: Version) -> Result<Version>;

    /// Lists all bookings placed by a user, newest first.
    async fn list_bookings_for_user(&self, user_id: UserId) -> Result<Vec<Booking>>;

    /// Lists all bookings referencing a slot.
    async fn list_bookings_for_slot(&self, slot_id: SlotId) -> Result<Vec<Booking>>;

    // -- payments ------------------------------------------------------

    /// Persists a new payment record.
    async fn insert_payment(&self, payment: &PaymentInfo) -> Result<()>;

    /// Retrieves a payment by ID.
    async fn get_payment(&self, id: PaymentId) -> Result<Option<PaymentInfo>>;

    /// Replaces an existing payment record.
    async fn update_payment(&self, payment: &PaymentInfo) -> Result<()>;

    /// Looks up the payment recorded for an idempotency key, if any.
    async fn find_payment_by_idempotency_key(&self, key: &str) -> Result<Option<PaymentInfo>>;

    /// Lists payments whose effective instant falls inside the range.
    async fn payments_in_range(&self, range: DateRange) -> Result<Vec<PaymentInfo>>;
}
