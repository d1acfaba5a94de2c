//! Time slot entity: the capacity-bearing resource.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use common::{ItemId, SlotId};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::validation;
use crate::value_objects::{Money, SlotKind};

/// Bookings close this many hours before a slot starts.
pub const BOOKING_CUTOFF_HOURS: i64 = 1;

/// A capacity-bearing resource for a date/time window.
///
/// `current_bookings` is mutated exclusively by the store's capacity
/// primitives, driven by the availability service in lockstep with booking
/// creation and cancellation. The invariant
/// `0 <= current_bookings <= max_capacity` holds at all times, including
/// under concurrent reservation attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    id: SlotId,
    date: NaiveDate,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    kind: SlotKind,
    item_id: Option<ItemId>,
    is_available: bool,
    max_capacity: u32,
    current_bookings: u32,
    price_override: Option<Money>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameters for creating a slot, individually or in bulk.
#[derive(Debug, Clone)]
pub struct SlotDraft {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub kind: SlotKind,
    pub item_id: Option<ItemId>,
    pub max_capacity: u32,
    pub price_override: Option<Money>,
    pub is_available: bool,
}

impl SlotDraft {
    /// Creates a draft for an available slot with no item reference.
    pub fn new(
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        kind: SlotKind,
        max_capacity: u32,
    ) -> Self {
        Self {
            start_time,
            end_time,
            kind,
            item_id: None,
            max_capacity,
            price_override: None,
            is_available: true,
        }
    }

    /// Sets the referenced workshop or space.
    pub fn with_item(mut self, item_id: ItemId) -> Self {
        self.item_id = Some(item_id);
        self
    }

    /// Sets a price override for this slot.
    pub fn with_price_override(mut self, price: Money) -> Self {
        self.price_override = Some(price);
        self
    }

    /// Validates the draft and builds the slot.
    pub fn build(self) -> Result<TimeSlot, ValidationError> {
        validation::validate_slot_window(self.start_time, self.end_time)?;
        validation::validate_capacity(self.max_capacity)?;
        if let Some(price) = self.price_override {
            validation::validate_price(price)?;
        }

        let now = Utc::now();
        Ok(TimeSlot {
            id: SlotId::new(),
            date: self.start_time.date_naive(),
            start_time: self.start_time,
            end_time: self.end_time,
            kind: self.kind,
            item_id: self.item_id,
            is_available: self.is_available,
            max_capacity: self.max_capacity,
            current_bookings: 0,
            price_override: self.price_override,
            created_at: now,
            updated_at: now,
        })
    }
}

impl TimeSlot {
    /// Returns the slot ID.
    pub fn id(&self) -> SlotId {
        self.id
    }

    /// Returns the calendar date the slot falls on.
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    /// Returns the start time.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Returns the end time.
    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// Returns the slot kind.
    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    /// Returns the referenced workshop or space, if any.
    pub fn item_id(&self) -> Option<ItemId> {
        self.item_id
    }

    /// Returns whether the slot is open for booking at all.
    pub fn is_available(&self) -> bool {
        self.is_available
    }

    /// Returns the maximum number of concurrent bookings.
    pub fn max_capacity(&self) -> u32 {
        self.max_capacity
    }

    /// Returns the number of bookings currently placed.
    pub fn current_bookings(&self) -> u32 {
        self.current_bookings
    }

    /// Returns the slot-specific price, if one overrides the item price.
    pub fn price_override(&self) -> Option<Money> {
        self.price_override
    }

    /// Returns when the slot was last updated.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the slot duration in minutes.
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    /// Returns the price in effect for this slot given the item's base price.
    pub fn effective_price(&self, base: Money) -> Money {
        self.price_override.unwrap_or(base)
    }

    /// Returns true if the slot is available and not fully booked.
    pub fn has_available_capacity(&self) -> bool {
        self.is_available && self.current_bookings < self.max_capacity
    }

    /// Returns the number of seats still open.
    pub fn remaining_capacity(&self) -> u32 {
        self.max_capacity.saturating_sub(self.current_bookings)
    }

    /// Returns true if booking is still permitted at `now`: the slot starts
    /// in the future and more than the cutoff window away.
    pub fn is_booking_allowed(&self, now: DateTime<Utc>) -> bool {
        self.start_time - now > Duration::hours(BOOKING_CUTOFF_HOURS)
    }

    /// Returns true if the slot has ended at `now`.
    pub fn has_ended(&self, now: DateTime<Utc>) -> bool {
        now > self.end_time
    }

    /// Check-and-increment for the capacity counter.
    ///
    /// Called only by store adapters, which are responsible for making the
    /// call atomic with respect to concurrent reservations on the same slot.
    pub fn reserve(&mut self, count: u32) -> bool {
        if self.is_available && self.current_bookings + count <= self.max_capacity {
            self.current_bookings += count;
            self.updated_at = Utc::now();
            true
        } else {
            false
        }
    }

    /// Decrements the capacity counter, floor-clamped at zero.
    ///
    /// Called only by store adapters. Callers of the availability service
    /// must track which reservations they already released.
    pub fn release(&mut self, count: u32) {
        self.current_bookings = self.current_bookings.saturating_sub(count);
        self.updated_at = Utc::now();
    }

    /// Opens or closes the slot for new bookings.
    pub fn set_available(&mut self, available: bool) {
        self.is_available = available;
        self.updated_at = Utc::now();
    }

    /// Changes the capacity, which may not drop below bookings already placed.
    pub fn set_max_capacity(&mut self, capacity: u32) -> Result<(), ValidationError> {
        validation::validate_capacity(capacity)?;
        if capacity < self.current_bookings {
            return Err(ValidationError::CapacityBelowBooked {
                capacity,
                booked: self.current_bookings,
            });
        }
        self.max_capacity = capacity;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Sets or clears the slot price override.
    pub fn set_price_override(&mut self, price: Option<Money>) -> Result<(), ValidationError> {
        if let Some(p) = price {
            validation::validate_price(p)?;
        }
        self.price_override = price;
        self.updated_at = Utc::now();
        Ok(())
    }
}
