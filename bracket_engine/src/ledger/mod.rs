//! Ledger seam used for prize payouts.
//!
//! Every unit of work implements [`Ledger`], so wallet credits commit or roll
//! back together with the result that completed the tournament.

use async_trait::async_trait;
use rust_decimal::Decimal;

pub mod errors;
pub mod models;

pub use errors::{LedgerError, LedgerResult};
pub use models::{Transaction, TransactionType, place_label};

/// Wallet operations needed at tournament completion
#[async_trait]
pub trait Ledger: Send {
    /// Add `amount` to the user's wallet balance
    async fn credit_wallet(&mut self, user_id: i64, amount: Decimal) -> LedgerResult<()>;

    /// Record a completed transaction in the user's history
    async fn record_transaction(
        &mut self,
        user_id: i64,
        transaction_type: TransactionType,
        amount: Decimal,
        description: &str,
    ) -> LedgerResult<()>;
}
