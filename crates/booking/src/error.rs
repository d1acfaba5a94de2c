//! Engine error taxonomy.
//!
//! Every expected business outcome is a typed error matched exhaustively at
//! the call site; panics are reserved for programmer errors. Validation and
//! authorization failures are returned before any mutation; capacity,
//! cutoff, and cancellation-window failures after the relevant check with
//! no partial mutation left behind.

use common::{BookingId, PaymentId, SlotId};
use domain::{PaymentStatus, TransitionError, ValidationError};
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during payment orchestration.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The gateway rejected the charge.
    #[error("payment declined: {reason}")]
    Declined { reason: String },

    /// The gateway did not answer within the bounded timeout. Safe to
    /// retry with the same idempotency key.
    #[error("payment gateway timed out")]
    Timeout,

    /// The gateway reported a transport-level failure.
    #[error("payment gateway error: {0}")]
    Gateway(String),

    /// No payment record exists for this ID.
    #[error("payment not found: {0}")]
    NotFound(PaymentId),

    /// Retry is only valid for failed payments.
    #[error("retry not allowed: payment is {status}")]
    RetryNotAllowed { status: PaymentStatus },

    /// Cancel is only valid for payments still pending.
    #[error("cancel not allowed: payment is {status}")]
    CancelNotAllowed { status: PaymentStatus },

    /// Refund is only valid for completed payments with no refund attached.
    #[error("refund not allowed: payment is {status}")]
    RefundNotAllowed { status: PaymentStatus },

    /// A store error occurred.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors that can occur during booking operations.
#[derive(Debug, Error)]
pub enum BookingError {
    /// Input rejected by a field validator before any mutation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The slot has no remaining capacity.
    #[error("slot {slot_id} is fully booked")]
    CapacityExceeded { slot_id: SlotId },

    /// The slot is unavailable or the booking cutoff has passed.
    #[error("slot {slot_id} is closed for booking")]
    SlotClosed { slot_id: SlotId },

    /// The cancellation window for this booking has closed.
    #[error("cancellation window closed for booking {booking_id}")]
    CancellationWindowClosed { booking_id: BookingId },

    /// The requested record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The actor lacks the required role.
    #[error("actor lacks the required role to {action}")]
    Unauthorized { action: &'static str },

    /// The booking was updated concurrently; reload and retry.
    #[error("concurrent update on booking {booking_id}; reload and retry")]
    ConcurrencyConflict { booking_id: BookingId },

    /// A state-machine transition not in the lifecycle table.
    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// A payment operation failed.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// The slot still has active bookings and cannot be deleted.
    #[error("slot {slot_id} has {active} active bookings")]
    SlotHasActiveBookings { slot_id: SlotId, active: u32 },

    /// An infrastructure-level store error.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => BookingError::NotFound { entity, id },
            StoreError::ConcurrencyConflict { booking_id, .. } => {
                BookingError::ConcurrencyConflict { booking_id }
            }
            other => BookingError::Store(other),
        }
    }
}
