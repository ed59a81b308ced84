use std::sync::Arc;

use super::domain::{ApplicationId, FeeKind};

/// Read side of the external payment ledger.
pub trait PaymentLedger: Send + Sync {
    fn is_fee_paid(&self, application_id: &ApplicationId, kind: FeeKind)
        -> Result<bool, LedgerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("payment ledger unavailable: {0}")]
    Unavailable(String),
}

/// Gate asking the ledger whether the application fee has cleared.
///
/// Holds no cache: payment may land between two submission attempts.
pub struct FeePaymentGate<L> {
    ledger: Arc<L>,
}

impl<L> FeePaymentGate<L>
where
    L: PaymentLedger,
{
    pub fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    pub fn application_fee_paid(&self, application_id: &ApplicationId) -> Result<bool, LedgerError> {
        self.ledger.is_fee_paid(application_id, FeeKind::Application)
    }
}
