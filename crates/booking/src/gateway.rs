//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::{Money, PaymentMethod};
use thiserror::Error;

/// A charge request as sent to the external gateway.
#[derive(Debug, Clone)]
pub struct GatewayChargeRequest {
    /// Amount to capture.
    pub amount: Money,

    /// Payment method.
    pub method: PaymentMethod,

    /// Currency code.
    pub currency: String,

    /// Caller-supplied token the gateway deduplicates on. All follow-up
    /// operations (retry, cancel, refund) reference the charge by this key.
    pub idempotency_key: String,
}

/// The gateway's answer to a charge, retry, or refund.
#[derive(Debug, Clone)]
pub struct GatewayOutcome {
    /// How the gateway settled the request.
    pub status: GatewayStatus,

    /// Gateway transaction reference, if one was assigned.
    pub transaction_id: Option<String>,

    /// Gateway receipt reference, if one was issued.
    pub receipt_id: Option<String>,
}

/// Gateway-reported settlement status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayStatus {
    /// Funds captured.
    Approved,

    /// Accepted; capture completes asynchronously.
    Processing,

    /// Rejected.
    Declined { reason: String },
}

/// Transport-level gateway failures.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The gateway could not be reached.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),

    /// No charge is known under the given reference.
    #[error("unknown gateway reference: {0}")]
    UnknownReference(String),
}

/// Trait for the external payment gateway collaborator.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Submits a charge.
    async fn charge(
        &self,
        request: &GatewayChargeRequest,
    ) -> Result<GatewayOutcome, GatewayError>;

    /// Re-attempts a previously failed charge under the same key.
    async fn retry(&self, idempotency_key: &str) -> Result<GatewayOutcome, GatewayError>;

    /// Voids a charge that has not been captured yet.
    async fn cancel(&self, idempotency_key: &str) -> Result<(), GatewayError>;

    /// Returns funds for a captured charge.
    async fn refund(
        &self,
        idempotency_key: &str,
        amount: Money,
    ) -> Result<GatewayOutcome, GatewayError>;
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    charges: HashMap<String, GatewayOutcome>,
    next_id: u32,
    charge_calls: u32,
    refund_calls: u32,
    decline_next: Option<String>,
    respond_processing: bool,
    unavailable: bool,
    delay: Option<std::time::Duration>,
}

/// In-memory payment gateway for testing.
///
/// Knobs steer the next calls: decline with a reason, answer with an
/// asynchronous `Processing` status, simulate an outage, or delay long
/// enough to trip the orchestrator's timeout. Call counters let tests
/// assert that an idempotent replay reached the gateway exactly once.
#[derive(Debug, Clone, Default)]
pub struct InMemoryGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declines the next charge or retry with the given reason.
    pub fn set_decline_next(&self, reason: impl Into<String>) {
        self.state.write().unwrap().decline_next = Some(reason.into());
    }

    /// Makes charges settle asynchronously (`Processing`) until disabled.
    pub fn set_respond_processing(&self, processing: bool) {
        self.state.write().unwrap().respond_processing = processing;
    }

    /// Simulates an outage: all calls fail with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.write().unwrap().unavailable = unavailable;
    }

    /// Delays every call by the given duration.
    pub fn set_delay(&self, delay: Option<std::time::Duration>) {
        self.state.write().unwrap().delay = delay;
    }

    /// Returns how many charge calls reached the gateway.
    pub fn charge_count(&self) -> u32 {
        self.state.read().unwrap().charge_calls
    }

    /// Returns how many refund calls reached the gateway.
    pub fn refund_count(&self) -> u32 {
        self.state.read().unwrap().refund_calls
    }

    /// Returns true if a charge is recorded under the given key.
    pub fn has_charge(&self, idempotency_key: &str) -> bool {
        self.state
            .read()
            .unwrap()
            .charges
            .contains_key(idempotency_key)
    }

    async fn simulate_latency(&self) {
        let delay = self.state.read().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn settle(state: &mut InMemoryGatewayState, idempotency_key: &str) -> GatewayOutcome {
        if let Some(reason) = state.decline_next.take() {
            return GatewayOutcome {
                status: GatewayStatus::Declined { reason },
                transaction_id: None,
                receipt_id: None,
            };
        }

        state.next_id += 1;
        let outcome = if state.respond_processing {
            GatewayOutcome {
                status: GatewayStatus::Processing,
                transaction_id: Some(format!("TXN-{:04}", state.next_id)),
                receipt_id: None,
            }
        } else {
            GatewayOutcome {
                status: GatewayStatus::Approved,
                transaction_id: Some(format!("TXN-{:04}", state.next_id)),
                receipt_id: Some(format!("RCPT-{:04}", state.next_id)),
            }
        };
        state
            .charges
            .insert(idempotency_key.to_string(), outcome.clone());
        outcome
    }
}

#[async_trait]
impl PaymentGateway for InMemoryGateway {
    async fn charge(
        &self,
        request: &GatewayChargeRequest,
    ) -> Result<GatewayOutcome, GatewayError> {
        self.simulate_latency().await;
        let mut state = self.state.write().unwrap();
        state.charge_calls += 1;

        if state.unavailable {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }

        // A real gateway deduplicates on the key as well
        if let Some(existing) = state.charges.get(&request.idempotency_key) {
            return Ok(existing.clone());
        }

        Ok(Self::settle(&mut state, &request.idempotency_key))
    }

    async fn retry(&self, idempotency_key: &str) -> Result<GatewayOutcome, GatewayError> {
        self.simulate_latency().await;
        let mut state = self.state.write().unwrap();
        state.charge_calls += 1;

        if state.unavailable {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }

        Ok(Self::settle(&mut state, idempotency_key))
    }

    async fn cancel(&self, idempotency_key: &str) -> Result<(), GatewayError> {
        self.simulate_latency().await;
        let mut state = self.state.write().unwrap();

        if state.unavailable {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }

        state.charges.remove(idempotency_key);
        Ok(())
    }

    async fn refund(
        &self,
        idempotency_key: &str,
        _amount: Money,
    ) -> Result<GatewayOutcome, GatewayError> {
        self.simulate_latency().await;
        let mut state = self.state.write().unwrap();
        state.refund_calls += 1;

        if state.unavailable {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }

        if !state.charges.contains_key(idempotency_key) {
            return Err(GatewayError::UnknownReference(idempotency_key.to_string()));
        }

        state.next_id += 1;
        Ok(GatewayOutcome {
            status: GatewayStatus::Approved,
            transaction_id: Some(format!("REF-{:04}", state.next_id)),
            receipt_id: None,
        })
    }
}
