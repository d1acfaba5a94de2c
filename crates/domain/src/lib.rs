//! Domain layer for the booking system.
//!
//! This crate provides the entity model and everything pure:
//! - Value objects (Money, slot kinds, actor roles, date ranges)
//! - Field-level validation rules used before every mutation
//! - Workshop, TimeSlot, Booking, PaymentInfo, and RefundInfo entities
//! - The booking and payment status state machines with their guards
//! - The time-tiered refund policy calculator
//!
//! Nothing in this crate performs I/O; services in the `booking` crate
//! drive these types against the persistent store.

pub mod booking;
pub mod error;
pub mod payment;
pub mod refund_policy;
pub mod slot;
pub mod validation;
pub mod value_objects;
pub mod workshop;

pub use booking::{Booking, BookingStatus};
pub use error::{TransitionError, ValidationError};
pub use payment::{PaymentInfo, PaymentMethod, PaymentStatus, RefundInfo};
pub use refund_policy::{hours_until, refund_amount, refund_percent};
pub use slot::{SlotDraft, TimeSlot, BOOKING_CUTOFF_HOURS};
pub use value_objects::{ActorRole, DateRange, Money, SlotKind};
pub use workshop::Workshop;
