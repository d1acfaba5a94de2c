//! Persistent store for the booking system.
//!
//! This crate defines the [`BookingStore`] contract the engine is written
//! against: CRUD and filtered queries for workshops, slots, bookings, and
//! payments, plus the two primitives the core invariants rest on:
//!
//! - an atomic conditional update for slot capacity
//!   ([`BookingStore::try_reserve_capacity`]), and
//! - a versioned update for booking records
//!   ([`BookingStore::update_booking`]).
//!
//! Two adapters are provided: [`InMemoryStore`] for tests and as the
//! reference implementation, and [`PostgresStore`] for production.

pub mod config;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use store::{BookingStore, SlotFilter};
