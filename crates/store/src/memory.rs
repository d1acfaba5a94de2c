use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{BookingId, ItemId, PaymentId, SlotId, UserId, Version};
use domain::{Booking, DateRange, PaymentInfo, TimeSlot, Workshop};
use tokio::sync::RwLock;

use crate::{
    Result, StoreError,
    store::{BookingStore, SlotFilter},
};

#[derive(Default)]
struct Inner {
    workshops: HashMap<ItemId, Workshop>,
    slots: HashMap<SlotId, TimeSlot>,
    bookings: HashMap<BookingId, Booking>,
    payments: HashMap<PaymentId, PaymentInfo>,
}

/// In-memory store implementation for testing.
///
/// Provides the same interface as the PostgreSQL implementation. The
/// capacity check-and-increment runs under the store's write lock, which
/// makes it atomic with respect to concurrent reservations.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of bookings stored.
    pub async fn booking_count(&self) -> usize {
        self.inner.read().await.bookings.len()
    }

    /// Returns the number of payment records stored.
    pub async fn payment_count(&self) -> usize {
        self.inner.read().await.payments.len()
    }

    /// Clears all records.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.workshops.clear();
        inner.slots.clear();
        inner.bookings.clear();
        inner.payments.clear();
    }
}

#[async_trait]
impl BookingStore for InMemoryStore {
    async fn insert_workshop(&self, workshop: &Workshop) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.workshops.insert(workshop.id(), workshop.clone());
        Ok(())
    }

    async fn get_workshop(&self, id: ItemId) -> Result<Option<Workshop>> {
        Ok(self.inner.read().await.workshops.get(&id).cloned())
    }

    async fn update_workshop(&self, workshop: &Workshop) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.workshops.contains_key(&workshop.id()) {
            return Err(StoreError::not_found("workshop", workshop.id()));
        }
        inner.workshops.insert(workshop.id(), workshop.clone());
        Ok(())
    }

    async fn delete_workshop(&self, id: ItemId) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .workshops
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("workshop", id))
    }

    async fn list_workshops(&self) -> Result<Vec<Workshop>> {
        Ok(self.inner.read().await.workshops.values().cloned().collect())
    }

    async fn insert_slot(&self, slot: &TimeSlot) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.slots.insert(slot.id(), slot.clone());
        Ok(())
    }

    async fn insert_slots(&self, slots: &[TimeSlot]) -> Result<()> {
        let mut inner = self.inner.write().await;
        for slot in slots {
            inner.slots.insert(slot.id(), slot.clone());
        }
        Ok(())
    }

    async fn get_slot(&self, id: SlotId) -> Result<Option<TimeSlot>> {
        Ok(self.inner.read().await.slots.get(&id).cloned())
    }

    async fn update_slot(&self, slot: &TimeSlot) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.slots.contains_key(&slot.id()) {
            return Err(StoreError::not_found("slot", slot.id()));
        }
        inner.slots.insert(slot.id(), slot.clone());
        Ok(())
    }

    async fn delete_slot(&self, id: SlotId) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner
            .slots
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("slot", id))
    }

    async fn list_slots(&self, filter: SlotFilter) -> Result<Vec<TimeSlot>> {
        let inner = self.inner.read().await;
        let mut slots: Vec<_> = inner
            .slots
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        slots.sort_by_key(|s| s.start_time());
        Ok(slots)
    }

    async fn try_reserve_capacity(&self, id: SlotId, count: u32) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let slot = inner
            .slots
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("slot", id))?;
        Ok(slot.reserve(count))
    }

    async fn release_capacity(&self, id: SlotId, count: u32) -> Result<()> {
        let mut inner = self.inner.write().await;
        let slot = inner
            .slots
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("slot", id))?;
        slot.release(count);
        Ok(())
    }

    async fn insert_booking(&self, booking: &Booking) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.bookings.insert(booking.id(), booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: BookingId) -> Result<Option<Booking>> {
        Ok(self.inner.read().await.bookings.get(&id).cloned())
    }

    async fn update_booking(&self, booking: &Booking, expected: Version) -> Result<Version> {
        let mut inner = self.inner.write().await;
        let current = inner
            .bookings
            .get(&booking.id())
            .ok_or_else(|| StoreError::not_found("booking", booking.id()))?;

        if current.version() != expected {
            return Err(StoreError::ConcurrencyConflict {
                booking_id: booking.id(),
                expected,
                actual: current.version(),
            });
        }

        let next = expected.next();
        let mut updated = booking.clone();
        updated.set_version(next);
        inner.bookings.insert(updated.id(), updated);
        Ok(next)
    }

    async fn list_bookings_for_user(&self, user_id: UserId) -> Result<Vec<Booking>> {
        let inner = self.inner.read().await;
        let mut bookings: Vec<_> = inner
            .bookings
            .values()
            .filter(|b| b.user_id() == user_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| std::cmp::Reverse(b.created_at()));
        Ok(bookings)
    }

    async fn list_bookings_for_slot(&self, slot_id: SlotId) -> Result<Vec<Booking>> {
        let inner = self.inner.read().await;
        Ok(inner
            .bookings
            .values()
            .filter(|b| b.slot_id() == slot_id)
            .cloned()
            .collect())
    }

    async fn insert_payment(&self, payment: &PaymentInfo) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.payments.insert(payment.id(), payment.clone());
        Ok(())
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<PaymentInfo>> {
        Ok(self.inner.read().await.payments.get(&id).cloned())
    }

    async fn update_payment(&self, payment: &PaymentInfo) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.payments.contains_key(&payment.id()) {
            return Err(StoreError::not_found("payment", payment.id()));
        }
        inner.payments.insert(payment.id(), payment.clone());
        Ok(())
    }

    async fn find_payment_by_idempotency_key(&self, key: &str) -> Result<Option<PaymentInfo>> {
        let inner = self.inner.read().await;
        Ok(inner
            .payments
            .values()
            .find(|p| p.idempotency_key() == key)
            .cloned())
    }

    async fn payments_in_range(&self, range: DateRange) -> Result<Vec<PaymentInfo>> {
        let inner = self.inner.read().await;
        Ok(inner
            .payments
            .values()
            .filter(|p| range.contains(p.effective_at()))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use domain::{Money, SlotDraft, SlotKind};

    fn slot(capacity: u32) -> TimeSlot {
        let start = Utc::now() + Duration::hours(48);
        SlotDraft::new(start, start + Duration::hours(2), SlotKind::Workshop, capacity)
            .build()
            .unwrap()
    }

    fn booking(slot_id: SlotId) -> Booking {
        Booking::new(
            BookingId::new(),
            UserId::new(),
            slot_id,
            SlotKind::Workshop,
            None,
            Money::from_cents(50_000),
            None,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_reserve_up_to_capacity() {
        let store = InMemoryStore::new();
        let s = slot(2);
        store.insert_slot(&s).await.unwrap();

        assert!(store.try_reserve_capacity(s.id(), 1).await.unwrap());
        assert!(store.try_reserve_capacity(s.id(), 1).await.unwrap());
        assert!(!store.try_reserve_capacity(s.id(), 1).await.unwrap());

        let loaded = store.get_slot(s.id()).await.unwrap().unwrap();
        assert_eq!(loaded.current_bookings(), 2);
    }

    #[tokio::test]
    async fn test_reserve_unknown_slot_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .try_reserve_capacity(SlotId::new(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "slot", .. }));
    }

    #[tokio::test]
    async fn test_release_clamps_at_zero() {
        let store = InMemoryStore::new();
        let s = slot(2);
        store.insert_slot(&s).await.unwrap();

        store.release_capacity(s.id(), 3).await.unwrap();
        let loaded = store.get_slot(s.id()).await.unwrap().unwrap();
        assert_eq!(loaded.current_bookings(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_reservations_never_exceed_capacity() {
        let store = InMemoryStore::new();
        let s = slot(5);
        store.insert_slot(&s).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let store = store.clone();
            let id = s.id();
            handles.push(tokio::spawn(async move {
                store.try_reserve_capacity(id, 1).await.unwrap()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }

        assert_eq!(successes, 5);
        let loaded = store.get_slot(s.id()).await.unwrap().unwrap();
        assert_eq!(loaded.current_bookings(), 5);
    }

    #[tokio::test]
    async fn test_versioned_update_detects_conflict() {
        let store = InMemoryStore::new();
        let s = slot(2);
        store.insert_slot(&s).await.unwrap();
        let mut b = booking(s.id());
        store.insert_booking(&b).await.unwrap();

        let v2 = store.update_booking(&b, Version::first()).await.unwrap();
        assert_eq!(v2, Version::first().next());
        b.set_version(v2);

        // A second writer still holding version 1 must conflict
        let err = store.update_booking(&b, Version::first()).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::ConcurrencyConflict { expected, actual, .. }
                if expected == Version::first() && actual == v2
        ));
    }

    #[tokio::test]
    async fn test_list_slots_filters_and_orders() {
        let store = InMemoryStore::new();
        let item = ItemId::new();

        let start = Utc::now() + Duration::hours(24);
        let later = SlotDraft::new(
            start + Duration::hours(4),
            start + Duration::hours(6),
            SlotKind::Workshop,
            5,
        )
        .with_item(item)
        .build()
        .unwrap();
        let earlier = SlotDraft::new(start, start + Duration::hours(2), SlotKind::Workshop, 5)
            .with_item(item)
            .build()
            .unwrap();
        let other = slot(5);

        store.insert_slots(&[later.clone(), earlier.clone(), other]).await.unwrap();

        let filtered = store
            .list_slots(SlotFilter::new().for_item(item))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].id(), earlier.id());
        assert_eq!(filtered[1].id(), later.id());
    }

    #[tokio::test]
    async fn test_find_payment_by_idempotency_key() {
        let store = InMemoryStore::new();
        let p = PaymentInfo::new(
            BookingId::new(),
            Money::from_cents(1000),
            domain::PaymentMethod::Card,
            "EUR",
            "key-42",
        );
        store.insert_payment(&p).await.unwrap();

        let found = store
            .find_payment_by_idempotency_key("key-42")
            .await
            .unwrap();
        assert_eq!(found.map(|p| p.id()), Some(p.id()));

        assert!(
            store
                .find_payment_by_idempotency_key("other")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_delete_missing_slot_is_not_found() {
        let store = InMemoryStore::new();
        assert!(store.delete_slot(SlotId::new()).await.is_err());
    }
}
