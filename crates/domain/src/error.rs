//! Domain error types.

use thiserror::Error;

use crate::booking::BookingStatus;
use crate::payment::PaymentStatus;
use crate::value_objects::{Money, SlotKind};

/// A field-level validation failure.
///
/// Returned by the validators in [`crate::validation`] before any mutation
/// takes place. Every variant renders a human-readable violation reason.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Title length is outside 3-100 characters.
    #[error("title must be 3-100 characters, got {len}")]
    TitleLength { len: usize },

    /// Description length is outside 10-1000 characters.
    #[error("description must be 10-1000 characters, got {len}")]
    DescriptionLength { len: usize },

    /// Price is negative or above the 1,000,000 currency-unit ceiling.
    #[error("price must be between 0 and 1000000 currency units, got {price}")]
    PriceOutOfRange { price: Money },

    /// Capacity is outside 1-100.
    #[error("capacity must be between 1 and 100, got {capacity}")]
    CapacityOutOfRange { capacity: u32 },

    /// Capacity cannot drop below the bookings already placed.
    #[error("capacity {capacity} is below the {booked} bookings already placed")]
    CapacityBelowBooked { capacity: u32, booked: u32 },

    /// Rating is outside 1-5.
    #[error("rating must be between 1 and 5, got {rating}")]
    RatingOutOfRange { rating: u8 },

    /// Comment length is outside 10-500 characters.
    #[error("comment must be 10-500 characters, got {len}")]
    CommentLength { len: usize },

    /// Notes exceed 500 characters.
    #[error("notes must be at most 500 characters, got {len}")]
    NotesTooLong { len: usize },

    /// Slot end time does not come after its start time.
    #[error("slot end time must be after its start time")]
    SlotWindowReversed,

    /// Slot duration is outside 30-480 minutes.
    #[error("slot duration must be 30-480 minutes, got {minutes}")]
    SlotDurationOutOfRange { minutes: i64 },

    /// A monetary amount is negative.
    #[error("amount must not be negative, got {amount}")]
    AmountNegative { amount: Money },

    /// The booking kind does not match the slot kind.
    #[error("booking kind {requested} does not match slot kind {actual}")]
    KindMismatch { requested: SlotKind, actual: SlotKind },
}

/// A rejected state-machine transition.
///
/// Transitions not listed in the booking lifecycle table are always
/// rejected with this error and leave the record untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// The booking is not in a state that permits the requested action.
    #[error("invalid transition: cannot {action} a {current} booking")]
    InvalidTransition {
        current: BookingStatus,
        action: &'static str,
    },

    /// Confirmation requires a completed payment.
    #[error("cannot confirm: payment is {status}")]
    PaymentNotCompleted { status: PaymentStatus },

    /// Confirmation requires a payment to be attached at all.
    #[error("cannot confirm: booking has no payment")]
    PaymentMissing,

    /// Completion and no-show require the slot to have ended.
    #[error("slot has not ended yet")]
    SlotNotEnded,

    /// The payment is not eligible for a refund.
    #[error("payment is not refundable: status is {status}")]
    RefundNotAllowed { status: PaymentStatus },

    /// A refund cannot exceed the amount originally paid.
    #[error("refund {requested} exceeds paid amount {paid}")]
    RefundExceedsPayment { requested: Money, paid: Money },

    /// Cancellation of a payment is only possible while it is pending.
    #[error("cannot cancel payment: status is {status}")]
    PaymentCancelNotAllowed { status: PaymentStatus },
}
