//! Booking service: owns the booking state machine and its transitions.

use std::sync::Arc;

use chrono::{Duration, Utc};
use common::{BookingId, ItemId, SlotId, UserId};
use domain::{
    ActorRole, Booking, BookingStatus, Money, PaymentMethod, PaymentStatus, SlotKind,
    TransitionError, ValidationError, refund_amount,
};
use store::BookingStore;

use crate::availability::AvailabilityService;
use crate::error::BookingError;
use crate::gateway::PaymentGateway;
use crate::notify::NotificationDispatcher;
use crate::orchestrator::{ChargeRequest, PaymentConfig, PaymentOrchestrator};

/// Users may cancel a confirmed booking up to this many hours before the
/// slot starts; admins bypass the cutoff.
pub const CANCELLATION_CUTOFF_HOURS: i64 = 24;

/// Command to create a booking.
#[derive(Debug, Clone)]
pub struct CreateBooking {
    /// The booking ID to create.
    pub booking_id: BookingId,

    /// The user placing the booking.
    pub user_id: UserId,

    /// The slot to reserve.
    pub slot_id: SlotId,

    /// The booking kind, which must match the slot kind.
    pub kind: SlotKind,

    /// The referenced workshop or space, if any.
    pub item_id: Option<ItemId>,

    /// The amount to charge.
    pub total_amount: Money,

    /// Payment method.
    pub method: PaymentMethod,

    /// Currency code.
    pub currency: String,

    /// Optional user notes, at most 500 characters.
    pub notes: Option<String>,

    /// Idempotency key for the charge; defaults to one derived from the
    /// booking ID so an application-level retry of the same booking cannot
    /// charge twice.
    pub idempotency_key: String,
}

impl CreateBooking {
    /// Creates a command with a generated booking ID.
    pub fn new(
        user_id: UserId,
        slot_id: SlotId,
        kind: SlotKind,
        total_amount: Money,
        method: PaymentMethod,
    ) -> Self {
        let booking_id = BookingId::new();
        Self {
            booking_id,
            user_id,
            slot_id,
            kind,
            item_id: None,
            total_amount,
            method,
            currency: "EUR".to_string(),
            notes: None,
            idempotency_key: format!("booking-{booking_id}"),
        }
    }

    /// Sets the referenced workshop or space.
    pub fn with_item(mut self, item_id: ItemId) -> Self {
        self.item_id = Some(item_id);
        self
    }

    /// Sets the user notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Sets an explicit idempotency key.
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = key.into();
        self
    }

    /// Sets the currency code.
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }
}

/// Drives bookings through their lifecycle.
///
/// Each request runs as one logical transaction against the availability
/// service, the payment orchestrator, and the booking record: a failed
/// charge releases the reservation it took, and every status transition is
/// persisted with a versioned update so a concurrent transition on the
/// same booking fails with `ConcurrencyConflict` instead of silently
/// overwriting.
pub struct BookingService<S, G> {
    store: S,
    availability: AvailabilityService<S>,
    payments: PaymentOrchestrator<S, G>,
    dispatcher: Arc<dyn NotificationDispatcher>,
}

impl<S, G> BookingService<S, G>
where
    S: BookingStore + Clone,
    G: PaymentGateway,
{
    /// Creates a new booking service with default payment settings.
    pub fn new(store: S, gateway: G, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self::with_payment_config(store, gateway, dispatcher, PaymentConfig::default())
    }

    /// Creates a new booking service with explicit payment settings.
    pub fn with_payment_config(
        store: S,
        gateway: G,
        dispatcher: Arc<dyn NotificationDispatcher>,
        config: PaymentConfig,
    ) -> Self {
        let availability = AvailabilityService::new(store.clone());
        let payments = PaymentOrchestrator::with_config(store.clone(), gateway, config);
        Self {
            store,
            availability,
            payments,
            dispatcher,
        }
    }

    /// Returns the availability service.
    pub fn availability(&self) -> &AvailabilityService<S> {
        &self.availability
    }

    /// Returns the payment orchestrator.
    pub fn payments(&self) -> &PaymentOrchestrator<S, G> {
        &self.payments
    }

    /// Creates a booking: validate, reserve capacity, charge, persist.
    ///
    /// The booking is never created half-paid: when the charge fails, the
    /// reservation taken in step two is released before the error is
    /// returned. The booking lands `Confirmed` when the payment completed
    /// synchronously and `Pending` while an asynchronous capture is still
    /// in flight.
    #[tracing::instrument(
        skip(self, cmd),
        fields(booking_id = %cmd.booking_id, slot_id = %cmd.slot_id)
    )]
    pub async fn create_booking(&self, cmd: CreateBooking) -> Result<Booking, BookingError> {
        let started = std::time::Instant::now();

        // 1. Validation, before any mutation
        let mut booking = Booking::new(
            cmd.booking_id,
            cmd.user_id,
            cmd.slot_id,
            cmd.kind,
            cmd.item_id,
            cmd.total_amount,
            cmd.notes,
        )?;

        let slot = self
            .store
            .get_slot(cmd.slot_id)
            .await?
            .ok_or_else(|| BookingError::NotFound {
                entity: "slot",
                id: cmd.slot_id.to_string(),
            })?;
        if slot.kind() != cmd.kind {
            return Err(ValidationError::KindMismatch {
                requested: cmd.kind,
                actual: slot.kind(),
            }
            .into());
        }

        // 2. Reserve capacity
        let token = self.availability.reserve_capacity(cmd.slot_id, 1).await?;

        // 3. Charge; on failure, give the seat back before surfacing
        let charge = ChargeRequest {
            booking_id: cmd.booking_id,
            amount: cmd.total_amount,
            method: cmd.method,
            currency: cmd.currency,
            idempotency_key: cmd.idempotency_key,
        };
        let payment = match self.payments.charge(charge).await {
            Ok(payment) => payment,
            Err(e) => {
                if let Err(release_err) = self.availability.release(token).await {
                    tracing::error!(
                        error = %release_err,
                        "failed to release reservation after charge failure"
                    );
                }
                return Err(BookingError::Payment(e));
            }
        };

        // 4. Persist: Confirmed on synchronous capture, Pending otherwise
        let captured = payment.status() == PaymentStatus::Completed;
        booking.set_payment(payment);
        if captured {
            booking.confirm()?;
        }

        if let Err(e) = self.store.insert_booking(&booking).await {
            if let Err(release_err) = self.availability.release(token).await {
                tracing::error!(
                    error = %release_err,
                    "failed to release reservation after persist failure"
                );
            }
            return Err(e.into());
        }

        if captured {
            self.dispatcher
                .booking_status_changed(&booking, BookingStatus::Pending);
            self.dispatcher.payment_completed(&booking);
        }

        metrics::counter!("bookings_created").increment(1);
        metrics::histogram!("booking_create_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(status = %booking.status(), "booking created");
        Ok(booking)
    }

    /// Cancels a booking: cutoff guard, refund, release capacity, transition.
    ///
    /// Users may cancel a confirmed booking only before the cutoff; admins
    /// bypass it. Pending bookings are not cutoff-bound. The entitled
    /// refund comes from the time-tiered policy; a pending payment is
    /// voided instead of refunded.
    #[tracing::instrument(skip(self, reason))]
    pub async fn cancel_booking(
        &self,
        booking_id: BookingId,
        reason: &str,
        actor: ActorRole,
    ) -> Result<Booking, BookingError> {
        let mut booking =
            self.store
                .get_booking(booking_id)
                .await?
                .ok_or_else(|| BookingError::NotFound {
                    entity: "booking",
                    id: booking_id.to_string(),
                })?;

        if !booking.status().can_cancel() {
            return Err(TransitionError::InvalidTransition {
                current: booking.status(),
                action: "cancel",
            }
            .into());
        }

        let slot = self
            .store
            .get_slot(booking.slot_id())
            .await?
            .ok_or_else(|| BookingError::NotFound {
                entity: "slot",
                id: booking.slot_id().to_string(),
            })?;

        let now = Utc::now();
        let cutoff = slot.start_time() - Duration::hours(CANCELLATION_CUTOFF_HOURS);
        if !actor.is_admin() && booking.status() == BookingStatus::Confirmed && now >= cutoff {
            return Err(BookingError::CancellationWindowClosed { booking_id });
        }

        // Refund per the time-tiered policy, or void a payment still pending
        let entitled = refund_amount(booking.total_amount(), slot.start_time(), now);
        let mut refunded = None;
        if let Some(payment_id) = booking.payment().map(|p| p.id())
            && let Some(record) = self.store.get_payment(payment_id).await?
        {
            if entitled.is_positive() && record.can_refund() {
                refunded = Some(self.payments.refund(payment_id, entitled, reason).await?);
            } else if record.status().can_cancel() {
                self.payments.cancel(payment_id).await?;
            }
            // Refresh the embedded copy with the settled record
            if let Some(settled) = self.store.get_payment(payment_id).await? {
                booking.set_payment(settled);
            }
        }

        self.availability
            .release_capacity(booking.slot_id(), 1)
            .await?;

        let previous = booking.cancel(reason)?;
        let version = self
            .store
            .update_booking(&booking, booking.version())
            .await?;
        booking.set_version(version);

        self.dispatcher.booking_status_changed(&booking, previous);
        if let Some(refund) = &refunded {
            self.dispatcher.refund_processed(&booking, refund.amount);
        }

        metrics::counter!("bookings_cancelled").increment(1);
        tracing::info!(refund = %refunded.map(|r| r.amount).unwrap_or_default(), "booking cancelled");
        Ok(booking)
    }

    /// Confirms a pending booking whose asynchronous payment has completed.
    ///
    /// Reloads the authoritative payment record first, so a capture
    /// reported after the initial charge is picked up.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_booking(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        let mut booking =
            self.store
                .get_booking(booking_id)
                .await?
                .ok_or_else(|| BookingError::NotFound {
                    entity: "booking",
                    id: booking_id.to_string(),
                })?;

        let payment_id = booking
            .payment()
            .map(|p| p.id())
            .ok_or(BookingError::Transition(TransitionError::PaymentMissing))?;
        let record = self
            .store
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| BookingError::NotFound {
                entity: "payment",
                id: payment_id.to_string(),
            })?;
        booking.set_payment(record);

        let previous = booking.confirm()?;
        let version = self
            .store
            .update_booking(&booking, booking.version())
            .await?;
        booking.set_version(version);

        self.dispatcher.booking_status_changed(&booking, previous);
        self.dispatcher.payment_completed(&booking);
        Ok(booking)
    }

    /// Completes a confirmed booking once its slot has ended.
    #[tracing::instrument(skip(self))]
    pub async fn complete_booking(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        let (mut booking, slot_end) = self.load_with_slot_end(booking_id).await?;

        let previous = booking.complete(slot_end, Utc::now())?;
        let version = self
            .store
            .update_booking(&booking, booking.version())
            .await?;
        booking.set_version(version);

        self.dispatcher.booking_status_changed(&booking, previous);
        Ok(booking)
    }

    /// Marks a confirmed booking as a no-show once its slot has ended.
    ///
    /// Admin only. Capacity is not released: the no-show consumed the seat.
    #[tracing::instrument(skip(self))]
    pub async fn mark_no_show(
        &self,
        booking_id: BookingId,
        actor: ActorRole,
    ) -> Result<Booking, BookingError> {
        if !actor.is_admin() {
            return Err(BookingError::Unauthorized {
                action: "mark a no-show",
            });
        }

        let (mut booking, slot_end) = self.load_with_slot_end(booking_id).await?;

        let previous = booking.mark_no_show(slot_end, Utc::now())?;
        let version = self
            .store
            .update_booking(&booking, booking.version())
            .await?;
        booking.set_version(version);

        self.dispatcher.booking_status_changed(&booking, previous);
        metrics::counter!("bookings_no_show").increment(1);
        Ok(booking)
    }

    /// Retrieves a booking.
    pub async fn get_booking(&self, booking_id: BookingId) -> Result<Booking, BookingError> {
        self.store
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::NotFound {
                entity: "booking",
                id: booking_id.to_string(),
            })
    }

    /// Lists all bookings placed by a user, newest first.
    pub async fn list_bookings_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Booking>, BookingError> {
        Ok(self.store.list_bookings_for_user(user_id).await?)
    }

    async fn load_with_slot_end(
        &self,
        booking_id: BookingId,
    ) -> Result<(Booking, chrono::DateTime<Utc>), BookingError> {
        let booking =
            self.store
                .get_booking(booking_id)
                .await?
                .ok_or_else(|| BookingError::NotFound {
                    entity: "booking",
                    id: booking_id.to_string(),
                })?;
        let slot = self
            .store
            .get_slot(booking.slot_id())
            .await?
            .ok_or_else(|| BookingError::NotFound {
                entity: "slot",
                id: booking.slot_id().to_string(),
            })?;
        Ok((booking, slot.end_time()))
    }
}
