//! Booking entity and its status state machine.

use chrono::{DateTime, Utc};
use common::{BookingId, ItemId, SlotId, UserId, Version};
use serde::{Deserialize, Serialize};

use crate::error::{TransitionError, ValidationError};
use crate::payment::{PaymentInfo, PaymentStatus};
use crate::validation;
use crate::value_objects::{Money, SlotKind};

/// The state of a booking in its lifecycle.
///
/// State transitions:
/// ```text
/// Pending ──► Confirmed ──┬──► Completed
///    │            │       └──► NoShow
///    └────────────┴──► Cancelled
/// ```
///
/// The `cancelled → refunded` sub-transition is visible only through the
/// booking's payment sub-object, not as a top-level status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    /// Created, payment capture not confirmed yet.
    #[default]
    Pending,

    /// Payment captured, seat held.
    Confirmed,

    /// The slot took place and the booking was honored (terminal state).
    Completed,

    /// The booking was cancelled (terminal state).
    Cancelled,

    /// The user did not show up; the seat stays consumed (terminal state).
    NoShow,
}

impl BookingStatus {
    /// Returns true if the booking can be confirmed in this state.
    pub fn can_confirm(&self) -> bool {
        matches!(self, BookingStatus::Pending)
    }

    /// Returns true if the booking can be cancelled in this state.
    pub fn can_cancel(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    /// Returns true if the booking can be completed in this state.
    pub fn can_complete(&self) -> bool {
        matches!(self, BookingStatus::Confirmed)
    }

    /// Returns true if the booking can be marked a no-show in this state.
    pub fn can_mark_no_show(&self) -> bool {
        matches!(self, BookingStatus::Confirmed)
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A reservation of one seat in a time slot.
///
/// Bookings are never deleted; they only move to a terminal status. Status
/// and payment are mutated exclusively through the booking service, which
/// persists every transition with a versioned update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    id: BookingId,
    user_id: UserId,
    slot_id: SlotId,
    kind: SlotKind,
    item_id: Option<ItemId>,
    status: BookingStatus,
    total_amount: Money,
    notes: Option<String>,
    payment: Option<PaymentInfo>,
    version: Version,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    cancelled_at: Option<DateTime<Utc>>,
    cancellation_reason: Option<String>,
}

impl Booking {
    /// Creates a new pending booking after validating amount and notes.
    pub fn new(
        id: BookingId,
        user_id: UserId,
        slot_id: SlotId,
        kind: SlotKind,
        item_id: Option<ItemId>,
        total_amount: Money,
        notes: Option<String>,
    ) -> Result<Self, ValidationError> {
        validation::validate_amount(total_amount)?;
        if let Some(ref n) = notes {
            validation::validate_notes(n)?;
        }

        let now = Utc::now();
        Ok(Self {
            id,
            user_id,
            slot_id,
            kind,
            item_id,
            status: BookingStatus::Pending,
            total_amount,
            notes,
            payment: None,
            version: Version::first(),
            created_at: now,
            updated_at: now,
            cancelled_at: None,
            cancellation_reason: None,
        })
    }

    /// Returns the booking ID.
    pub fn id(&self) -> BookingId {
        self.id
    }

    /// Returns the booking user.
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    /// Returns the reserved slot.
    pub fn slot_id(&self) -> SlotId {
        self.slot_id
    }

    /// Returns the booking kind.
    pub fn kind(&self) -> SlotKind {
        self.kind
    }

    /// Returns the referenced workshop or space, if any.
    pub fn item_id(&self) -> Option<ItemId> {
        self.item_id
    }

    /// Returns the current status.
    pub fn status(&self) -> BookingStatus {
        self.status
    }

    /// Returns the amount charged for this booking.
    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    /// Returns the user-supplied notes, if any.
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// Returns the payment attached to this booking, if any.
    pub fn payment(&self) -> Option<&PaymentInfo> {
        self.payment.as_ref()
    }

    /// Returns the version for optimistic concurrency control.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Returns when the booking was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the booking was last updated.
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns when the booking was cancelled, if it was.
    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.cancelled_at
    }

    /// Returns the cancellation reason, if the booking was cancelled.
    pub fn cancellation_reason(&self) -> Option<&str> {
        self.cancellation_reason.as_deref()
    }

    /// Returns true if the booking is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Sets the version after a successful store update.
    pub fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    /// Attaches or replaces the payment sub-object.
    pub fn set_payment(&mut self, payment: PaymentInfo) {
        self.payment = Some(payment);
        self.updated_at = Utc::now();
    }

    /// Confirms the booking once its payment has been captured.
    ///
    /// Returns the previous status on success.
    pub fn confirm(&mut self) -> Result<BookingStatus, TransitionError> {
        if !self.status.can_confirm() {
            return Err(TransitionError::InvalidTransition {
                current: self.status,
                action: "confirm",
            });
        }
        match self.payment.as_ref().map(PaymentInfo::status) {
            Some(PaymentStatus::Completed) => {}
            Some(status) => return Err(TransitionError::PaymentNotCompleted { status }),
            None => return Err(TransitionError::PaymentMissing),
        }
        let previous = self.status;
        self.status = BookingStatus::Confirmed;
        self.updated_at = Utc::now();
        Ok(previous)
    }

    /// Cancels the booking.
    ///
    /// Cutoff enforcement lives in the booking service; this transition only
    /// guards state legality. Returns the previous status on success.
    pub fn cancel(&mut self, reason: impl Into<String>) -> Result<BookingStatus, TransitionError> {
        if !self.status.can_cancel() {
            return Err(TransitionError::InvalidTransition {
                current: self.status,
                action: "cancel",
            });
        }
        let previous = self.status;
        let now = Utc::now();
        self.status = BookingStatus::Cancelled;
        self.cancelled_at = Some(now);
        self.cancellation_reason = Some(reason.into());
        self.updated_at = now;
        Ok(previous)
    }

    /// Completes a confirmed booking after the slot has ended.
    ///
    /// Returns the previous status on success.
    pub fn complete(
        &mut self,
        slot_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<BookingStatus, TransitionError> {
        if !self.status.can_complete() {
            return Err(TransitionError::InvalidTransition {
                current: self.status,
                action: "complete",
            });
        }
        if now <= slot_end {
            return Err(TransitionError::SlotNotEnded);
        }
        let previous = self.status;
        self.status = BookingStatus::Completed;
        self.updated_at = Utc::now();
        Ok(previous)
    }

    /// Marks a confirmed booking as a no-show after the slot has ended.
    ///
    /// The seat stays consumed; capacity is never released for a no-show.
    /// Returns the previous status on success.
    pub fn mark_no_show(
        &mut self,
        slot_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<BookingStatus, TransitionError> {
        if !self.status.can_mark_no_show() {
            return Err(TransitionError::InvalidTransition {
                current: self.status,
                action: "mark no-show",
            });
        }
        if now <= slot_end {
            return Err(TransitionError::SlotNotEnded);
        }
        let previous = self.status;
        self.status = BookingStatus::NoShow;
        self.updated_at = Utc::now();
        Ok(previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::PaymentMethod;
    use chrono::Duration;

    fn sample() -> Booking {
        Booking::new(
            BookingId::new(),
            UserId::new(),
            SlotId::new(),
            SlotKind::Workshop,
            None,
            Money::from_cents(50_000),
            None,
        )
        .unwrap()
    }

    fn completed_payment(booking_id: BookingId) -> PaymentInfo {
        let mut p = PaymentInfo::new(
            booking_id,
            Money::from_cents(50_000),
            PaymentMethod::Card,
            "EUR",
            "key-1",
        );
        p.mark_completed(None, None);
        p
    }

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(BookingStatus::default(), BookingStatus::Pending);
        assert_eq!(sample().status(), BookingStatus::Pending);
    }

    #[test]
    fn test_new_booking_validates_inputs() {
        assert!(matches!(
            Booking::new(
                BookingId::new(),
                UserId::new(),
                SlotId::new(),
                SlotKind::Workshop,
                None,
                Money::from_cents(-1),
                None,
            ),
            Err(ValidationError::AmountNegative { .. })
        ));
        assert!(matches!(
            Booking::new(
                BookingId::new(),
                UserId::new(),
                SlotId::new(),
                SlotKind::Workshop,
                None,
                Money::zero(),
                Some("x".repeat(501)),
            ),
            Err(ValidationError::NotesTooLong { .. })
        ));
    }

    #[test]
    fn test_can_confirm() {
        assert!(BookingStatus::Pending.can_confirm());
        assert!(!BookingStatus::Confirmed.can_confirm());
        assert!(!BookingStatus::Completed.can_confirm());
        assert!(!BookingStatus::Cancelled.can_confirm());
        assert!(!BookingStatus::NoShow.can_confirm());
    }

    #[test]
    fn test_can_cancel() {
        assert!(BookingStatus::Pending.can_cancel());
        assert!(BookingStatus::Confirmed.can_cancel());
        assert!(!BookingStatus::Completed.can_cancel());
        assert!(!BookingStatus::Cancelled.can_cancel());
        assert!(!BookingStatus::NoShow.can_cancel());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!BookingStatus::Pending.is_terminal());
        assert!(!BookingStatus::Confirmed.is_terminal());
        assert!(BookingStatus::Completed.is_terminal());
        assert!(BookingStatus::Cancelled.is_terminal());
        assert!(BookingStatus::NoShow.is_terminal());
    }

    #[test]
    fn test_confirm_requires_completed_payment() {
        let mut b = sample();
        assert!(matches!(b.confirm(), Err(TransitionError::PaymentMissing)));

        let p = PaymentInfo::new(
            b.id(),
            Money::from_cents(50_000),
            PaymentMethod::Card,
            "EUR",
            "key-1",
        );
        b.set_payment(p);
        assert!(matches!(
            b.confirm(),
            Err(TransitionError::PaymentNotCompleted {
                status: PaymentStatus::Pending
            })
        ));

        b.set_payment(completed_payment(b.id()));
        let previous = b.confirm().unwrap();
        assert_eq!(previous, BookingStatus::Pending);
        assert_eq!(b.status(), BookingStatus::Confirmed);
    }

    #[test]
    fn test_cancel_records_reason_and_time() {
        let mut b = sample();
        b.cancel("plans changed").unwrap();
        assert_eq!(b.status(), BookingStatus::Cancelled);
        assert_eq!(b.cancellation_reason(), Some("plans changed"));
        assert!(b.cancelled_at().is_some());
    }

    #[test]
    fn test_cancelled_booking_rejects_further_transitions() {
        let mut b = sample();
        b.cancel("plans changed").unwrap();

        assert!(b.cancel("again").is_err());
        assert!(b.confirm().is_err());
        let now = Utc::now();
        assert!(b.complete(now - Duration::hours(1), now).is_err());
    }

    #[test]
    fn test_complete_requires_slot_ended() {
        let mut b = sample();
        b.set_payment(completed_payment(b.id()));
        b.confirm().unwrap();

        let now = Utc::now();
        assert!(matches!(
            b.complete(now + Duration::hours(1), now),
            Err(TransitionError::SlotNotEnded)
        ));
        b.complete(now - Duration::hours(1), now).unwrap();
        assert_eq!(b.status(), BookingStatus::Completed);
    }

    #[test]
    fn test_completed_cannot_be_confirmed() {
        let mut b = sample();
        b.set_payment(completed_payment(b.id()));
        b.confirm().unwrap();
        let now = Utc::now();
        b.complete(now - Duration::hours(1), now).unwrap();

        assert!(matches!(
            b.confirm(),
            Err(TransitionError::InvalidTransition {
                current: BookingStatus::Completed,
                action: "confirm",
            })
        ));
    }

    #[test]
    fn test_no_show_requires_confirmed_and_ended() {
        let mut b = sample();
        let now = Utc::now();
        assert!(b.mark_no_show(now - Duration::hours(1), now).is_err());

        b.set_payment(completed_payment(b.id()));
        b.confirm().unwrap();
        assert!(matches!(
            b.mark_no_show(now + Duration::hours(1), now),
            Err(TransitionError::SlotNotEnded)
        ));

        b.mark_no_show(now - Duration::hours(1), now).unwrap();
        assert_eq!(b.status(), BookingStatus::NoShow);
    }

    #[test]
    fn test_new_booking_starts_at_version_one() {
        assert_eq!(sample().version(), Version::first());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&BookingStatus::NoShow).unwrap(),
            "\"no_show\""
        );
        let back: BookingStatus = serde_json::from_str("\"confirmed\"").unwrap();
        assert_eq!(back, BookingStatus::Confirmed);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let b = sample();
        let json = serde_json::to_string(&b).unwrap();
        let back: Booking = serde_json::from_str(&json).unwrap();
        assert_eq!(b, back);
    }
}
