//! Payment and refund records.

use chrono::{DateTime, Utc};
use common::{BookingId, PaymentId, RefundId};
use serde::{Deserialize, Serialize};

use crate::error::TransitionError;
use crate::value_objects::Money;

/// The method used to pay for a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Credit or debit card.
    Card,

    /// Bank transfer.
    BankTransfer,

    /// Digital wallet.
    Wallet,
}

impl PaymentMethod {
    /// Returns the method name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "card",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Wallet => "wallet",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The state of a payment in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Created locally, not yet sent to the gateway.
    Pending,

    /// Accepted by the gateway, capture still in flight.
    Processing,

    /// Captured by the gateway.
    Completed,

    /// Rejected by the gateway or timed out.
    Failed,

    /// Cancelled before gateway confirmation.
    Cancelled,

    /// Fully refunded.
    Refunded,

    /// Partially refunded.
    PartiallyRefunded,
}

impl PaymentStatus {
    /// Returns true if a failed payment can be re-attempted.
    pub fn can_retry(&self) -> bool {
        matches!(self, PaymentStatus::Failed)
    }

    /// Returns true if the payment can still be cancelled.
    pub fn can_cancel(&self) -> bool {
        matches!(self, PaymentStatus::Pending)
    }

    /// Returns true once money has been captured (and possibly returned).
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Refunded | PaymentStatus::PartiallyRefunded
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::PartiallyRefunded => "partially_refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A refund issued against a payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundInfo {
    /// Unique refund identifier.
    pub id: RefundId,

    /// Amount returned, never more than the original payment.
    pub amount: Money,

    /// Why the refund was issued.
    pub reason: String,

    /// When the refund was processed.
    pub refunded_at: DateTime<Utc>,

    /// Gateway transaction reference, if one was reported.
    pub transaction_id: Option<String>,
}

impl RefundInfo {
    /// Creates a new refund record stamped with the current time.
    pub fn new(amount: Money, reason: impl Into<String>, transaction_id: Option<String>) -> Self {
        Self {
            id: RefundId::new(),
            amount,
            reason: reason.into(),
            refunded_at: Utc::now(),
            transaction_id,
        }
    }
}

/// A payment belonging to exactly one booking.
///
/// Status moves through the gateway-reported lifecycle; the orchestrator in
/// the `booking` crate is the only component that drives these mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentInfo {
    id: PaymentId,
    booking_id: BookingId,
    method: PaymentMethod,
    status: PaymentStatus,
    amount: Money,
    currency: String,
    idempotency_key: String,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    transaction_id: Option<String>,
    receipt_id: Option<String>,
    failure_reason: Option<String>,
    refund: Option<RefundInfo>,
}

impl PaymentInfo {
    /// Creates a new pending payment for a booking.
    pub fn new(
        booking_id: BookingId,
        amount: Money,
        method: PaymentMethod,
        currency: impl Into<String>,
        idempotency_key: impl Into<String>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            booking_id,
            method,
            status: PaymentStatus::Pending,
            amount,
            currency: currency.into(),
            idempotency_key: idempotency_key.into(),
            created_at: Utc::now(),
            paid_at: None,
            transaction_id: None,
            receipt_id: None,
            failure_reason: None,
            refund: None,
        }
    }

    /// Returns the payment ID.
    pub fn id(&self) -> PaymentId {
        self.id
    }

    /// Returns the booking this payment belongs to.
    pub fn booking_id(&self) -> BookingId {
        self.booking_id
    }

    /// Returns the payment method.
    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    /// Returns the current status.
    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    /// Returns the charged amount.
    pub fn amount(&self) -> Money {
        self.amount
    }

    /// Returns the currency code.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Returns the caller-supplied idempotency key.
    pub fn idempotency_key(&self) -> &str {
        &self.idempotency_key
    }

    /// Returns when the payment record was created.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns when the payment was captured, if it was.
    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    /// Returns the instant this payment counts toward: capture time when
    /// paid, creation time otherwise.
    pub fn effective_at(&self) -> DateTime<Utc> {
        self.paid_at.unwrap_or(self.created_at)
    }

    /// Returns the gateway transaction reference, if any.
    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    /// Returns the gateway receipt reference, if any.
    pub fn receipt_id(&self) -> Option<&str> {
        self.receipt_id.as_deref()
    }

    /// Returns the gateway-reported failure reason, if the payment failed.
    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Returns the refund issued against this payment, if any.
    pub fn refund(&self) -> Option<&RefundInfo> {
        self.refund.as_ref()
    }

    /// Returns true if a refund may be issued: the payment is completed and
    /// no refund is attached yet.
    pub fn can_refund(&self) -> bool {
        self.status == PaymentStatus::Completed && self.refund.is_none()
    }

    /// Marks the payment as accepted by the gateway with capture in flight.
    pub fn mark_processing(&mut self) {
        self.status = PaymentStatus::Processing;
    }

    /// Marks the payment as captured.
    pub fn mark_completed(
        &mut self,
        transaction_id: Option<String>,
        receipt_id: Option<String>,
    ) {
        self.status = PaymentStatus::Completed;
        self.paid_at = Some(Utc::now());
        self.transaction_id = transaction_id;
        self.receipt_id = receipt_id;
        self.failure_reason = None;
    }

    /// Marks the payment as failed with the gateway-reported reason.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.status = PaymentStatus::Failed;
        self.failure_reason = Some(reason.into());
    }

    /// Cancels a payment still pending before gateway confirmation.
    pub fn mark_cancelled(&mut self) -> Result<(), TransitionError> {
        if !self.status.can_cancel() {
            return Err(TransitionError::PaymentCancelNotAllowed {
                status: self.status,
            });
        }
        self.status = PaymentStatus::Cancelled;
        Ok(())
    }

    /// Attaches a refund and settles the status.
    ///
    /// Full refunds (amount >= paid amount) move the payment to `Refunded`,
    /// anything less to `PartiallyRefunded`. Fails without altering the
    /// record when the payment is not refundable or the refund exceeds the
    /// paid amount.
    pub fn attach_refund(&mut self, refund: RefundInfo) -> Result<(), TransitionError> {
        if !self.can_refund() {
            return Err(TransitionError::RefundNotAllowed {
                status: self.status,
            });
        }
        if refund.amount > self.amount {
            return Err(TransitionError::RefundExceedsPayment {
                requested: refund.amount,
                paid: self.amount,
            });
        }
        self.status = if refund.amount >= self.amount {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartiallyRefunded
        };
        self.refund = Some(refund);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PaymentInfo {
        PaymentInfo::new(
            BookingId::new(),
            Money::from_cents(50_000),
            PaymentMethod::Card,
            "EUR",
            "key-1",
        )
    }

    #[test]
    fn test_new_payment_is_pending() {
        let p = sample();
        assert_eq!(p.status(), PaymentStatus::Pending);
        assert!(p.paid_at().is_none());
        assert!(!p.can_refund());
    }

    #[test]
    fn test_completed_payment_can_refund() {
        let mut p = sample();
        p.mark_completed(Some("TXN-1".to_string()), None);
        assert_eq!(p.status(), PaymentStatus::Completed);
        assert!(p.paid_at().is_some());
        assert!(p.can_refund());
    }

    #[test]
    fn test_full_refund_settles_as_refunded() {
        let mut p = sample();
        p.mark_completed(None, None);
        p.attach_refund(RefundInfo::new(Money::from_cents(50_000), "cancelled", None))
            .unwrap();
        assert_eq!(p.status(), PaymentStatus::Refunded);
        assert!(!p.can_refund());
    }

    #[test]
    fn test_partial_refund_settles_as_partially_refunded() {
        let mut p = sample();
        p.mark_completed(None, None);
        p.attach_refund(RefundInfo::new(Money::from_cents(25_000), "cancelled", None))
            .unwrap();
        assert_eq!(p.status(), PaymentStatus::PartiallyRefunded);
    }

    #[test]
    fn test_double_refund_rejected_without_mutation() {
        let mut p = sample();
        p.mark_completed(None, None);
        p.attach_refund(RefundInfo::new(Money::from_cents(50_000), "cancelled", None))
            .unwrap();

        let before = p.clone();
        let err = p
            .attach_refund(RefundInfo::new(Money::from_cents(1), "again", None))
            .unwrap_err();
        assert!(matches!(err, TransitionError::RefundNotAllowed { .. }));
        assert_eq!(p, before);
    }

    #[test]
    fn test_refund_cannot_exceed_paid_amount() {
        let mut p = sample();
        p.mark_completed(None, None);
        let err = p
            .attach_refund(RefundInfo::new(Money::from_cents(50_001), "too much", None))
            .unwrap_err();
        assert!(matches!(err, TransitionError::RefundExceedsPayment { .. }));
        assert!(p.can_refund());
    }

    #[test]
    fn test_cancel_only_while_pending() {
        let mut p = sample();
        p.mark_cancelled().unwrap();
        assert_eq!(p.status(), PaymentStatus::Cancelled);

        let mut p = sample();
        p.mark_completed(None, None);
        assert!(p.mark_cancelled().is_err());
        assert_eq!(p.status(), PaymentStatus::Completed);
    }

    #[test]
    fn test_retry_guard() {
        assert!(PaymentStatus::Failed.can_retry());
        assert!(!PaymentStatus::Pending.can_retry());
        assert!(!PaymentStatus::Completed.can_retry());
        assert!(!PaymentStatus::Refunded.can_retry());
    }

    #[test]
    fn test_failed_payment_records_reason() {
        let mut p = sample();
        p.mark_failed("card declined");
        assert_eq!(p.status(), PaymentStatus::Failed);
        assert_eq!(p.failure_reason(), Some("card declined"));

        // A later successful retry clears the failure
        p.mark_completed(Some("TXN-2".to_string()), None);
        assert!(p.failure_reason().is_none());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&PaymentStatus::PartiallyRefunded).unwrap(),
            "\"partially_refunded\""
        );
        let back: PaymentStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(back, PaymentStatus::Completed);
    }
}
