//! Approve-then-transfer orchestration for a single payment intent.
//!
//! ```text
//! Idle --request_approval--> Approving --ack--> Idle --request_payment--> Sending --> Completed
//!                                |                                           |
//!                                +----------------> Failed <-----------------+
//! ```
//!
//! `AwaitingApproval` is what [`PaymentMachine::phase`] reports for a stored
//! `Idle` while the last known allowance is below the ceiling; it is never
//! stored. `Completed` and `Failed` are terminal.

use std::fmt;
use std::sync::Arc;

use alloy::primitives::{TxHash, U256};
use serde::{Deserialize, Serialize};

use crate::allowance::{AllowanceInspector, AllowanceState};
use crate::calldata::{encode_approve, encode_transfer};
use crate::gateway::RpcGateway;
use crate::units::units_to_u256;
use crate::{PayError, PaymentConfig, PaymentIntent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentPhase {
    Idle,
    AwaitingApproval,
    Approving,
    Sending,
    Completed,
    Failed,
}

/// Which submission a failed machine died on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureReason {
    Approval,
    Payment,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Approval => f.write_str("approval failed"),
            FailureReason::Payment => f.write_str("payment failed"),
        }
    }
}

/// Why the machine is in `Failed`, with the provider's cause for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Failure {
    pub reason: FailureReason,
    pub cause: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionKind {
    Approve,
    Transfer,
}

/// A transaction the gateway accepted. Only `error`, `completed_phase` and
/// `allowance_confirmed` are filled in after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub id: TxHash,
    pub kind: TransactionKind,
    pub phase_at_submission: PaymentPhase,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Phase the machine moved to once this submission resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_phase: Option<PaymentPhase>,
    /// Approvals only: whether the allowance re-read afterwards reached the
    /// ceiling. `None` when the re-read itself failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowance_confirmed: Option<bool>,
}

/// Caller-facing result callbacks. Each fires at most once per intent.
pub trait PaymentObserver: Send + Sync {
    /// The transfer is about to be submitted.
    fn on_processing_started(&self) {}

    fn on_completed(&self, _tx: TxHash) {}

    fn on_failed(&self) {}
}

struct NoopObserver;

impl PaymentObserver for NoopObserver {}

/// Drives one [`PaymentIntent`] from allowance check to transfer.
///
/// Submitting methods take `&mut self` and refuse to run unless the phase
/// permits them, so at most one transaction is ever in flight. A machine whose
/// pending submission future was dropped stays in `Approving`/`Sending` and
/// rejects further requests.
pub struct PaymentMachine<G> {
    gateway: G,
    intent: PaymentIntent,
    config: PaymentConfig,
    inspector: AllowanceInspector,
    phase: PaymentPhase,
    allowance: Option<AllowanceState>,
    transactions: Vec<TransactionRecord>,
    failure: Option<Failure>,
    observer: Arc<dyn PaymentObserver>,
}

impl<G> PaymentMachine<G> {
    /// Create an idle machine. No allowance is known yet, so the machine
    /// reports `AwaitingApproval` until [`PaymentMachine::refresh_allowance`]
    /// says otherwise.
    ///
    /// The approval spender must be set in [`PaymentConfig::spender`]. It is
    /// never derived from the intent: the transfer is a plain `transfer`, so
    /// approving the recipient would hand the payee a ceiling-sized pull right
    /// it never uses.
    pub fn new(gateway: G, intent: PaymentIntent, config: PaymentConfig) -> Result<Self, PayError> {
        let spender = config.spender.ok_or_else(|| {
            PayError::Config("no approval spender configured (TOKENPAY_SPENDER)".to_string())
        })?;
        let inspector =
            AllowanceInspector::new(intent.token, intent.payer, spender, config.approval_ceiling);
        Ok(Self {
            gateway,
            intent,
            config,
            inspector,
            phase: PaymentPhase::Idle,
            allowance: None,
            transactions: Vec::new(),
            failure: None,
            observer: Arc::new(NoopObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn PaymentObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn phase(&self) -> PaymentPhase {
        match self.phase {
            PaymentPhase::Idle if !self.sufficient() => PaymentPhase::AwaitingApproval,
            phase => phase,
        }
    }

    /// Last known `allowance >= ceiling`. `false` until a read succeeds.
    pub fn sufficient(&self) -> bool {
        self.allowance.is_some_and(|a| a.sufficient)
    }

    pub fn allowance(&self) -> Option<AllowanceState> {
        self.allowance
    }

    pub fn intent(&self) -> &PaymentIntent {
        &self.intent
    }

    pub fn config(&self) -> &PaymentConfig {
        &self.config
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn transactions(&self) -> &[TransactionRecord] {
        &self.transactions
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    /// Transfer id once the machine reached `Completed`.
    pub fn completed_transaction(&self) -> Option<TxHash> {
        if self.phase != PaymentPhase::Completed {
            return None;
        }
        self.transactions
            .iter()
            .rev()
            .find(|t| t.kind == TransactionKind::Transfer)
            .map(|t| t.id)
    }

    pub fn explorer_url(&self) -> Option<String> {
        self.completed_transaction()
            .map(|tx| self.config.chain.explorer_tx_url(&tx))
    }

    /// Transfer amount in payload units, as it will be encoded.
    pub fn transfer_amount(&self) -> Result<U256, PayError> {
        let units = self
            .config
            .converter
            .to_token_units(self.intent.amount_usd, self.intent.currency)?;
        if units == 0 {
            return Err(PayError::Encoding(format!(
                "{} USD converts to zero token units",
                self.intent.amount_usd
            )));
        }
        units_to_u256(units)
    }

    fn fail(&mut self, reason: FailureReason, err: PayError) -> PayError {
        let cause = match err {
            PayError::Rpc(msg) => msg,
            other => other.to_string(),
        };
        tracing::error!(
            order = %self.intent.order_reference,
            payer = %self.intent.payer,
            error = %cause,
            "{reason}"
        );
        self.phase = PaymentPhase::Failed;
        self.failure = Some(Failure {
            reason,
            cause: cause.clone(),
        });
        self.observer.on_failed();
        PayError::Submission { reason, cause }
    }
}

impl<G: RpcGateway> PaymentMachine<G> {
    /// Build a machine and read the payer's allowance straight away.
    /// A failed read is logged and leaves the machine awaiting approval.
    pub async fn connect(
        gateway: G,
        intent: PaymentIntent,
        config: PaymentConfig,
    ) -> Result<Self, PayError> {
        let mut machine = Self::new(gateway, intent, config)?;
        let _ = machine.refresh_allowance().await;
        Ok(machine)
    }

    /// Re-read the allowance. Allowed in any phase and never changes it. On
    /// failure the previous value is kept (initially: insufficient).
    pub async fn refresh_allowance(&mut self) -> Result<AllowanceState, PayError> {
        match self.inspector.query(&self.gateway).await {
            Ok(state) => {
                self.allowance = Some(state);
                Ok(state)
            }
            Err(e) => {
                tracing::warn!(
                    order = %self.intent.order_reference,
                    payer = %self.intent.payer,
                    token = %self.intent.token,
                    error = %e,
                    sufficient = self.sufficient(),
                    "allowance query failed, keeping last known value"
                );
                Err(e)
            }
        }
    }

    /// Approve the spender for the full ceiling, then re-read the allowance.
    ///
    /// Only valid while awaiting approval. A gateway failure moves the machine
    /// to `Failed` ("approval failed"); it is not retried.
    ///
    /// An accepted approval does not by itself make the allowance sufficient:
    /// the re-read decides. If the re-read still comes back below the ceiling,
    /// or fails, the machine returns to `AwaitingApproval` and a second
    /// approval may be requested. The record's `allowance_confirmed` tells
    /// those cases apart from a confirmed approval.
    pub async fn request_approval(&mut self) -> Result<TxHash, PayError> {
        match self.phase() {
            PaymentPhase::AwaitingApproval => {}
            PaymentPhase::Idle => {
                return Err(self.reject("approval", "allowance already covers the ceiling"));
            }
            phase => return Err(self.reject("approval", &format!("machine is {phase:?}"))),
        }

        let spender = self.inspector.spender();
        let ceiling = self.inspector.ceiling();
        let data = encode_approve(spender, ceiling);

        self.phase = PaymentPhase::Approving;
        tracing::info!(
            order = %self.intent.order_reference,
            payer = %self.intent.payer,
            token = %self.intent.token,
            spender = %spender,
            ceiling = %ceiling,
            "submitting approval"
        );

        let sent = self
            .gateway
            .send_transaction(self.intent.payer, self.intent.token, data, U256::ZERO)
            .await;
        let tx = match sent {
            Ok(tx) => tx,
            Err(e) => return Err(self.fail(FailureReason::Approval, e)),
        };

        self.transactions.push(TransactionRecord {
            id: tx,
            kind: TransactionKind::Approve,
            phase_at_submission: PaymentPhase::Approving,
            error: None,
            completed_phase: None,
            allowance_confirmed: None,
        });

        let recheck = self.refresh_allowance().await;
        self.phase = PaymentPhase::Idle;
        let phase_now = self.phase();
        if let Some(record) = self.transactions.last_mut() {
            record.error = recheck.as_ref().err().map(|e| e.to_string());
            record.completed_phase = Some(phase_now);
            record.allowance_confirmed = recheck.as_ref().ok().map(|state| state.sufficient);
        }

        tracing::info!(
            order = %self.intent.order_reference,
            tx = %tx,
            sufficient = self.sufficient(),
            "approval submitted"
        );
        Ok(tx)
    }

    /// Transfer the intent's amount to the recipient.
    ///
    /// Rejected with [`PayError::Precondition`] (and no gateway call) unless
    /// the machine is idle with a sufficient allowance. A gateway failure moves
    /// the machine to `Failed` ("payment failed").
    pub async fn request_payment(&mut self) -> Result<TxHash, PayError> {
        match self.phase() {
            PaymentPhase::Idle => {}
            PaymentPhase::AwaitingApproval => {
                return Err(self.reject("payment", "allowance is below the approval ceiling"));
            }
            phase => return Err(self.reject("payment", &format!("machine is {phase:?}"))),
        }

        let amount = self.transfer_amount()?;
        let data = encode_transfer(self.intent.recipient, amount);

        self.phase = PaymentPhase::Sending;
        self.observer.on_processing_started();
        tracing::info!(
            order = %self.intent.order_reference,
            payer = %self.intent.payer,
            recipient = %self.intent.recipient,
            token = %self.intent.token,
            amount = %amount,
            "submitting transfer"
        );

        let sent = self
            .gateway
            .send_transaction(self.intent.payer, self.intent.token, data, U256::ZERO)
            .await;
        let tx = match sent {
            Ok(tx) => tx,
            Err(e) => return Err(self.fail(FailureReason::Payment, e)),
        };

        self.phase = PaymentPhase::Completed;
        self.transactions.push(TransactionRecord {
            id: tx,
            kind: TransactionKind::Transfer,
            phase_at_submission: PaymentPhase::Sending,
            error: None,
            completed_phase: Some(PaymentPhase::Completed),
            allowance_confirmed: None,
        });
        tracing::info!(
            order = %self.intent.order_reference,
            tx = %tx,
            amount = %amount,
            "payment completed"
        );
        self.observer.on_completed(tx);
        Ok(tx)
    }

    fn reject(&self, request: &str, why: &str) -> PayError {
        tracing::warn!(
            order = %self.intent.order_reference,
            phase = ?self.phase(),
            "{request} request rejected: {why}"
        );
        PayError::Precondition(format!("{request} not allowed: {why}"))
    }
}
