//! Shared types for the booking system.
//!
//! Provides the typed identifiers used across all layers and the
//! [`Version`] type used for optimistic concurrency control on bookings.

pub mod types;
pub mod version;

pub use types::{BookingId, ItemId, PaymentId, RefundId, SlotId, UserId};
pub use version::Version;
