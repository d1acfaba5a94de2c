//! Notification dispatcher hooks.
//!
//! The engine reports lifecycle events through this trait but never awaits
//! or depends on their outcome; delivery is the surrounding application's
//! concern. Implementations must not block.

use std::sync::{Arc, RwLock};

use common::BookingId;
use domain::{Booking, BookingStatus, Money};

/// Fire-and-forget lifecycle hooks.
pub trait NotificationDispatcher: Send + Sync {
    /// Called after a booking's status changed.
    fn booking_status_changed(&self, booking: &Booking, previous: BookingStatus);

    /// Called after a booking's payment was captured.
    fn payment_completed(&self, booking: &Booking);

    /// Called after a refund was processed for a booking.
    fn refund_processed(&self, booking: &Booking, amount: Money);
}

/// Dispatcher that drops every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDispatcher;

impl NotificationDispatcher for NullDispatcher {
    fn booking_status_changed(&self, _booking: &Booking, _previous: BookingStatus) {}

    fn payment_completed(&self, _booking: &Booking) {}

    fn refund_processed(&self, _booking: &Booking, _amount: Money) {}
}

/// A notification captured by [`RecordingDispatcher`].
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    /// A booking moved between statuses.
    StatusChanged {
        booking_id: BookingId,
        previous: BookingStatus,
        current: BookingStatus,
    },

    /// A booking's payment completed.
    PaymentCompleted { booking_id: BookingId },

    /// A refund was processed.
    RefundProcessed { booking_id: BookingId, amount: Money },
}

/// Dispatcher that records every notification, for tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    events: Arc<RwLock<Vec<NotificationEvent>>>,
}

impl RecordingDispatcher {
    /// Creates a new empty recording dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the recorded events.
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.read().unwrap().clone()
    }

    /// Returns the number of recorded events.
    pub fn event_count(&self) -> usize {
        self.events.read().unwrap().len()
    }
}

impl NotificationDispatcher for RecordingDispatcher {
    fn booking_status_changed(&self, booking: &Booking, previous: BookingStatus) {
        self.events.write().unwrap().push(NotificationEvent::StatusChanged {
            booking_id: booking.id(),
            previous,
            current: booking.status(),
        });
    }

    fn payment_completed(&self, booking: &Booking) {
        self.events
            .write()
            .unwrap()
            .push(NotificationEvent::PaymentCompleted {
                booking_id: booking.id(),
            });
    }

    fn refund_processed(&self, booking: &Booking, amount: Money) {
        self.events
            .write()
            .unwrap()
            .push(NotificationEvent::RefundProcessed {
                booking_id: booking.id(),
                amount,
            });
    }
}
