//! Payment orchestrator.
//!
//! Coordinates attempts against the external gateway and keeps the local
//! payment record consistent with gateway-reported outcomes. Charges are
//! idempotent per caller-supplied key: a key already recorded in the store
//! returns the recorded outcome without touching the gateway, and internal
//! timeout retries reuse the same key so a lost response can never charge
//! twice.

use common::{BookingId, PaymentId};
use domain::{DateRange, Money, PaymentInfo, PaymentMethod, RefundInfo};
use store::BookingStore;

use crate::error::PaymentError;
use crate::gateway::{GatewayChargeRequest, GatewayOutcome, GatewayStatus, PaymentGateway};
use crate::stats::{self, PaymentStatistics};

/// Orchestrator settings with sensible defaults.
///
/// Reads from environment variables:
/// - `PAYMENT_GATEWAY_TIMEOUT_MS` — per-call gateway timeout (default: `5000`)
/// - `PAYMENT_GATEWAY_MAX_ATTEMPTS` — timeout retries per charge (default: `3`)
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub gateway_timeout: std::time::Duration,
    pub max_attempts: u32,
}

impl PaymentConfig {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            gateway_timeout: std::env::var("PAYMENT_GATEWAY_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(std::time::Duration::from_millis)
                .unwrap_or(defaults.gateway_timeout),
            max_attempts: std::env::var("PAYMENT_GATEWAY_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_attempts),
        }
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            gateway_timeout: std::time::Duration::from_secs(5),
            max_attempts: 3,
        }
    }
}

/// A charge request for a booking.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub booking_id: BookingId,
    pub amount: Money,
    pub method: PaymentMethod,
    pub currency: String,
    pub idempotency_key: String,
}

/// Coordinates payment attempts against the external gateway.
pub struct PaymentOrchestrator<S, G> {
    store: S,
    gateway: G,
    config: PaymentConfig,
}

impl<S, G> PaymentOrchestrator<S, G>
where
    S: BookingStore,
    G: PaymentGateway,
{
    /// Creates a new orchestrator with default settings.
    pub fn new(store: S, gateway: G) -> Self {
        Self::with_config(store, gateway, PaymentConfig::default())
    }

    /// Creates a new orchestrator with explicit settings.
    pub fn with_config(store: S, gateway: G, config: PaymentConfig) -> Self {
        Self {
            store,
            gateway,
            config,
        }
    }

    /// Charges for a booking, exactly once per distinct idempotency key.
    ///
    /// A repeated call with a recorded key returns the recorded outcome
    /// without a second gateway charge. Gateway timeouts are retried
    /// internally up to `max_attempts`, always under the same key; once
    /// exhausted a failed payment is recorded and `PaymentError::Timeout`
    /// surfaces, itself safe to retry.
    #[tracing::instrument(skip(self, request), fields(booking_id = %request.booking_id))]
    pub async fn charge(&self, request: ChargeRequest) -> Result<PaymentInfo, PaymentError> {
        if let Some(existing) = self
            .store
            .find_payment_by_idempotency_key(&request.idempotency_key)
            .await?
        {
            metrics::counter!("payment_idempotent_replays").increment(1);
            tracing::info!(payment_id = %existing.id(), "charge replayed from recorded outcome");
            return if existing.status() == domain::PaymentStatus::Failed {
                Err(PaymentError::Declined {
                    reason: existing
                        .failure_reason()
                        .unwrap_or("payment failed")
                        .to_string(),
                })
            } else {
                Ok(existing)
            };
        }

        let mut payment = PaymentInfo::new(
            request.booking_id,
            request.amount,
            request.method,
            request.currency.clone(),
            request.idempotency_key.clone(),
        );
        let gateway_request = GatewayChargeRequest {
            amount: request.amount,
            method: request.method,
            currency: request.currency,
            idempotency_key: request.idempotency_key,
        };

        let started = std::time::Instant::now();
        for attempt in 1..=self.config.max_attempts {
            match tokio::time::timeout(
                self.config.gateway_timeout,
                self.gateway.charge(&gateway_request),
            )
            .await
            {
                Err(_elapsed) => {
                    tracing::warn!(attempt, "gateway charge timed out, retrying with same key");
                    metrics::counter!("payment_gateway_timeouts").increment(1);
                }
                Ok(Err(e)) => {
                    payment.mark_failed(e.to_string());
                    self.store.insert_payment(&payment).await?;
                    metrics::counter!("payment_charges_failed").increment(1);
                    return Err(PaymentError::Gateway(e.to_string()));
                }
                Ok(Ok(outcome)) => {
                    let declined = self.apply_outcome(&mut payment, outcome);
                    self.store.insert_payment(&payment).await?;
                    metrics::histogram!("payment_gateway_duration_seconds")
                        .record(started.elapsed().as_secs_f64());
                    return match declined {
                        Some(reason) => {
                            metrics::counter!("payment_charges_declined").increment(1);
                            Err(PaymentError::Declined { reason })
                        }
                        None => {
                            metrics::counter!("payment_charges_completed").increment(1);
                            Ok(payment)
                        }
                    };
                }
            }
        }

        payment.mark_failed("gateway timed out");
        self.store.insert_payment(&payment).await?;
        Err(PaymentError::Timeout)
    }

    /// Re-attempts a failed payment through the gateway.
    #[tracing::instrument(skip(self))]
    pub async fn retry(&self, payment_id: PaymentId) -> Result<PaymentInfo, PaymentError> {
        let mut payment = self
            .store
            .get_payment(payment_id)
            .await?
            .ok_or(PaymentError::NotFound(payment_id))?;

        if !payment.status().can_retry() {
            return Err(PaymentError::RetryNotAllowed {
                status: payment.status(),
            });
        }

        let key = payment.idempotency_key().to_string();
        for attempt in 1..=self.config.max_attempts {
            match tokio::time::timeout(self.config.gateway_timeout, self.gateway.retry(&key))
                .await
            {
                Err(_elapsed) => {
                    tracing::warn!(attempt, "gateway retry timed out");
                    metrics::counter!("payment_gateway_timeouts").increment(1);
                }
                Ok(Err(e)) => {
                    payment.mark_failed(e.to_string());
                    self.store.update_payment(&payment).await?;
                    return Err(PaymentError::Gateway(e.to_string()));
                }
                Ok(Ok(outcome)) => {
                    let declined = self.apply_outcome(&mut payment, outcome);
                    self.store.update_payment(&payment).await?;
                    return match declined {
                        Some(reason) => Err(PaymentError::Declined { reason }),
                        None => Ok(payment),
                    };
                }
            }
        }

        Err(PaymentError::Timeout)
    }

    /// Cancels a payment still pending before gateway confirmation.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, payment_id: PaymentId) -> Result<(), PaymentError> {
        let mut payment = self
            .store
            .get_payment(payment_id)
            .await?
            .ok_or(PaymentError::NotFound(payment_id))?;

        if !payment.status().can_cancel() {
            return Err(PaymentError::CancelNotAllowed {
                status: payment.status(),
            });
        }

        let key = payment.idempotency_key().to_string();
        match tokio::time::timeout(self.config.gateway_timeout, self.gateway.cancel(&key)).await
        {
            Err(_elapsed) => return Err(PaymentError::Timeout),
            Ok(Err(e)) => return Err(PaymentError::Gateway(e.to_string())),
            Ok(Ok(())) => {}
        }

        payment
            .mark_cancelled()
            .map_err(|_| PaymentError::CancelNotAllowed {
                status: payment.status(),
            })?;
        self.store.update_payment(&payment).await?;
        metrics::counter!("payment_cancellations").increment(1);
        Ok(())
    }

    /// Issues a refund against a completed payment.
    ///
    /// The refund is capped at the paid amount; a refund equal to it moves
    /// the payment to `Refunded`, anything less to `PartiallyRefunded`. A
    /// payment already refunded fails with `RefundNotAllowed` and the
    /// record stays untouched.
    #[tracing::instrument(skip(self))]
    pub async fn refund(
        &self,
        payment_id: PaymentId,
        amount: Money,
        reason: &str,
    ) -> Result<RefundInfo, PaymentError> {
        let mut payment = self
            .store
            .get_payment(payment_id)
            .await?
            .ok_or(PaymentError::NotFound(payment_id))?;

        if !payment.can_refund() {
            return Err(PaymentError::RefundNotAllowed {
                status: payment.status(),
            });
        }

        let capped = amount.min(payment.amount());
        let key = payment.idempotency_key().to_string();
        let outcome = match tokio::time::timeout(
            self.config.gateway_timeout,
            self.gateway.refund(&key, capped),
        )
        .await
        {
            Err(_elapsed) => return Err(PaymentError::Timeout),
            Ok(Err(e)) => return Err(PaymentError::Gateway(e.to_string())),
            Ok(Ok(outcome)) => outcome,
        };

        let refund = RefundInfo::new(capped, reason, outcome.transaction_id);
        payment
            .attach_refund(refund.clone())
            .map_err(|_| PaymentError::RefundNotAllowed {
                status: payment.status(),
            })?;
        self.store.update_payment(&payment).await?;

        metrics::counter!("payment_refunds").increment(1);
        tracing::info!(%payment_id, amount = %refund.amount, "refund processed");
        Ok(refund)
    }

    /// Aggregates payment statistics over the given range.
    pub async fn statistics(&self, range: DateRange) -> Result<PaymentStatistics, PaymentError> {
        let payments = self.store.payments_in_range(range).await?;
        Ok(stats::compute(&payments))
    }

    /// Applies a gateway outcome to the local record.
    ///
    /// Returns the decline reason when the gateway rejected the request.
    fn apply_outcome(&self, payment: &mut PaymentInfo, outcome: GatewayOutcome) -> Option<String> {
        match outcome.status {
            GatewayStatus::Approved => {
                payment.mark_completed(outcome.transaction_id, outcome.receipt_id);
                None
            }
            GatewayStatus::Processing => {
                payment.mark_processing();
                None
            }
            GatewayStatus::Declined { reason } => {
                payment.mark_failed(reason.clone());
                Some(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::BookingId;
    use domain::PaymentStatus;
    use store::InMemoryStore;

    use crate::gateway::InMemoryGateway;

    fn orchestrator() -> (
        PaymentOrchestrator<InMemoryStore, InMemoryGateway>,
        InMemoryStore,
        InMemoryGateway,
    ) {
        let store = InMemoryStore::new();
        let gateway = InMemoryGateway::new();
        let config = PaymentConfig {
            gateway_timeout: std::time::Duration::from_millis(50),
            max_attempts: 2,
        };
        (
            PaymentOrchestrator::with_config(store.clone(), gateway.clone(), config),
            store,
            gateway,
        )
    }

    fn request(key: &str) -> ChargeRequest {
        ChargeRequest {
            booking_id: BookingId::new(),
            amount: Money::from_cents(50_000),
            method: PaymentMethod::Card,
            currency: "EUR".to_string(),
            idempotency_key: key.to_string(),
        }
    }

    #[tokio::test]
    async fn test_successful_charge_records_completed_payment() {
        let (orchestrator, store, _) = orchestrator();
        let payment = orchestrator.charge(request("key-1")).await.unwrap();

        assert_eq!(payment.status(), PaymentStatus::Completed);
        assert!(payment.transaction_id().is_some());
        assert_eq!(store.payment_count().await, 1);
    }

    #[tokio::test]
    async fn test_charge_is_idempotent_per_key() {
        let (orchestrator, store, gateway) = orchestrator();

        let first = orchestrator.charge(request("key-1")).await.unwrap();
        let second = orchestrator.charge(request("key-1")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(gateway.charge_count(), 1);
        assert_eq!(store.payment_count().await, 1);
    }

    #[tokio::test]
    async fn test_declined_charge_records_failed_payment() {
        let (orchestrator, store, gateway) = orchestrator();
        gateway.set_decline_next("insufficient funds");

        let err = orchestrator.charge(request("key-1")).await.unwrap_err();
        assert!(matches!(err, PaymentError::Declined { .. }));

        let recorded = store
            .find_payment_by_idempotency_key("key-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recorded.status(), PaymentStatus::Failed);
        assert_eq!(recorded.failure_reason(), Some("insufficient funds"));
    }

    #[tokio::test]
    async fn test_replayed_declined_charge_does_not_recharge() {
        let (orchestrator, _, gateway) = orchestrator();
        gateway.set_decline_next("insufficient funds");

        orchestrator.charge(request("key-1")).await.unwrap_err();
        let calls_after_first = gateway.charge_count();

        let err = orchestrator.charge(request("key-1")).await.unwrap_err();
        assert!(matches!(err, PaymentError::Declined { .. }));
        assert_eq!(gateway.charge_count(), calls_after_first);
    }

    #[tokio::test]
    async fn test_timeout_exhausts_attempts_and_records_failure() {
        let (orchestrator, store, gateway) = orchestrator();
        gateway.set_delay(Some(std::time::Duration::from_millis(200)));

        let err = orchestrator.charge(request("key-1")).await.unwrap_err();
        assert!(matches!(err, PaymentError::Timeout));

        let recorded = store
            .find_payment_by_idempotency_key("key-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recorded.status(), PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_retry_after_failure_completes_payment() {
        let (orchestrator, store, gateway) = orchestrator();
        gateway.set_decline_next("insufficient funds");

        orchestrator.charge(request("key-1")).await.unwrap_err();
        let failed = store
            .find_payment_by_idempotency_key("key-1")
            .await
            .unwrap()
            .unwrap();

        let retried = orchestrator.retry(failed.id()).await.unwrap();
        assert_eq!(retried.status(), PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn test_retry_requires_failed_status() {
        let (orchestrator, _, _) = orchestrator();
        let payment = orchestrator.charge(request("key-1")).await.unwrap();

        let err = orchestrator.retry(payment.id()).await.unwrap_err();
        assert!(matches!(
            err,
            PaymentError::RetryNotAllowed {
                status: PaymentStatus::Completed
            }
        ));
    }

    #[tokio::test]
    async fn test_cancel_requires_pending_status() {
        let (orchestrator, _, _) = orchestrator();
        let payment = orchestrator.charge(request("key-1")).await.unwrap();

        let err = orchestrator.cancel(payment.id()).await.unwrap_err();
        assert!(matches!(err, PaymentError::CancelNotAllowed { .. }));
    }

    #[tokio::test]
    async fn test_refund_full_and_partial() {
        let (orchestrator, _, _) = orchestrator();

        let payment = orchestrator.charge(request("key-1")).await.unwrap();
        let refund = orchestrator
            .refund(payment.id(), Money::from_cents(50_000), "cancelled")
            .await
            .unwrap();
        assert_eq!(refund.amount, Money::from_cents(50_000));

        let payment = orchestrator.charge(request("key-2")).await.unwrap();
        orchestrator
            .refund(payment.id(), Money::from_cents(10_000), "partial goodwill")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_no_double_refund() {
        let (orchestrator, store, gateway) = orchestrator();
        let payment = orchestrator.charge(request("key-1")).await.unwrap();

        orchestrator
            .refund(payment.id(), Money::from_cents(50_000), "cancelled")
            .await
            .unwrap();
        let before = store.get_payment(payment.id()).await.unwrap().unwrap();
        let refunds_before = gateway.refund_count();

        let err = orchestrator
            .refund(payment.id(), Money::from_cents(50_000), "again")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PaymentError::RefundNotAllowed {
                status: PaymentStatus::Refunded
            }
        ));

        // The record and the gateway are untouched
        let after = store.get_payment(payment.id()).await.unwrap().unwrap();
        assert_eq!(before, after);
        assert_eq!(gateway.refund_count(), refunds_before);
    }

    #[tokio::test]
    async fn test_refund_is_capped_at_paid_amount() {
        let (orchestrator, store, _) = orchestrator();
        let payment = orchestrator.charge(request("key-1")).await.unwrap();

        let refund = orchestrator
            .refund(payment.id(), Money::from_cents(99_999_999), "cancelled")
            .await
            .unwrap();
        assert_eq!(refund.amount, Money::from_cents(50_000));

        let recorded = store.get_payment(payment.id()).await.unwrap().unwrap();
        assert_eq!(recorded.status(), PaymentStatus::Refunded);
    }

    #[tokio::test]
    async fn test_unknown_payment_is_not_found() {
        let (orchestrator, _, _) = orchestrator();
        let id = PaymentId::new();
        assert!(matches!(
            orchestrator.retry(id).await.unwrap_err(),
            PaymentError::NotFound(_)
        ));
        assert!(matches!(
            orchestrator.cancel(id).await.unwrap_err(),
            PaymentError::NotFound(_)
        ));
    }
}
