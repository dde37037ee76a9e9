use std::fmt;

use rust_decimal::Decimal;

use super::{Amount, Transaction, TransactionKind};

/// The balance, or a total, left the range an [`Amount`] can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceOverflow;

impl fmt::Display for BalanceOverflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "balance out of range")
    }
}

impl std::error::Error for BalanceOverflow {}

/// Compute the balance from scratch.
/// Balance = sum of incomes - sum of expenses
pub fn recompute(transactions: &[Transaction]) -> Result<Amount, BalanceOverflow> {
    transactions
        .iter()
        .try_fold(Decimal::ZERO, |balance, t| apply_signed(balance, t.kind, t.amount))
}

/// Balance after adding `amount` with the sign of `kind`.
pub fn apply_signed(
    balance: Amount,
    kind: TransactionKind,
    amount: Amount,
) -> Result<Amount, BalanceOverflow> {
    balance
        .checked_add(kind.signed(amount))
        .ok_or(BalanceOverflow)
}

/// Balance after appending `added`.
pub fn apply_add(balance: Amount, added: &Transaction) -> Result<Amount, BalanceOverflow> {
    apply_signed(balance, added.kind, added.amount)
}

/// Balance after changing the amount of `old` to `new_amount`.
///
/// The old contribution is reversed with the old kind before the new amount is
/// applied, so the result holds whatever the kind is.
pub fn apply_edit(
    balance: Amount,
    old: &Transaction,
    new_amount: Amount,
) -> Result<Amount, BalanceOverflow> {
    let reversed = apply_delete(balance, old)?;
    apply_signed(reversed, old.kind, new_amount)
}

/// Balance after removing `removed`.
pub fn apply_delete(balance: Amount, removed: &Transaction) -> Result<Amount, BalanceOverflow> {
    balance
        .checked_sub(removed.signed_amount())
        .ok_or(BalanceOverflow)
}

pub fn apply_reset() -> Amount {
    Decimal::ZERO
}

/// Totals of one slice of a ledger, split by kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Totals {
    pub income: Amount,
    pub expense: Amount,
}

impl Totals {
    pub fn of<'a>(
        transactions: impl IntoIterator<Item = &'a Transaction>,
    ) -> Result<Self, BalanceOverflow> {
        transactions
            .into_iter()
            .try_fold(Totals::default(), |mut totals, t| -> Result<Self, BalanceOverflow> {
                let total = match t.kind {
                    TransactionKind::Income => &mut totals.income,
                    TransactionKind::Expense => &mut totals.expense,
                };
                *total = total.checked_add(t.amount).ok_or(BalanceOverflow)?;
                Ok(totals)
            })
    }

    /// Both totals are non-negative, so the difference always fits.
    pub fn net(&self) -> Amount {
        self.income - self.expense
    }
}
