//! Booking lifecycle engine.
//!
//! This crate coordinates the booking state machine against the persistent
//! store and the external collaborators:
//!
//! 1. A booking request reserves slot capacity through the
//!    [`AvailabilityService`], charges through the [`PaymentOrchestrator`],
//!    and persists the booking. Never half-paid: a failed charge releases
//!    the reservation before the error is returned.
//! 2. A cancellation computes the entitled refund from the time-tiered
//!    policy, refunds through the orchestrator, releases capacity, and
//!    transitions the booking with a versioned update.
//!
//! Collaborators (store, payment gateway, notification dispatcher) are
//! injected explicitly so each can be substituted with a test double.

pub mod availability;
pub mod catalog;
pub mod error;
pub mod gateway;
pub mod notify;
pub mod orchestrator;
pub mod service;
pub mod stats;

pub use availability::{AvailabilityService, ReservationToken, SlotUpdate};
pub use catalog::{CatalogService, WorkshopUpdate};
pub use error::{BookingError, PaymentError};
pub use gateway::{
    GatewayChargeRequest, GatewayError, GatewayOutcome, GatewayStatus, InMemoryGateway,
    PaymentGateway,
};
pub use notify::{NotificationDispatcher, NotificationEvent, NullDispatcher, RecordingDispatcher};
pub use orchestrator::{ChargeRequest, PaymentConfig, PaymentOrchestrator};
pub use service::{BookingService, CreateBooking, CANCELLATION_CUTOFF_HOURS};
pub use stats::PaymentStatistics;
