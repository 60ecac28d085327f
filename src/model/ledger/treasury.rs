use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

use super::Amount;

/// Funds held by a ledger. `balance == total_deposited - total_withdrawn`
/// holds after every operation, and failed operations change nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Treasury {
    balance: Amount,
    total_deposited: Amount,
    total_withdrawn: Amount,
}

impl Treasury {
    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn total_deposited(&self) -> Amount {
        self.total_deposited
    }

    pub fn total_withdrawn(&self) -> Amount {
        self.total_withdrawn
    }

    pub(super) fn credit(&mut self, amount: Amount) -> Result<()> {
        let balance = self
            .balance
            .checked_add(amount)
            .ok_or(Error::Overflow("treasury balance"))?;
        let total_deposited = self
            .total_deposited
            .checked_add(amount)
            .ok_or(Error::Overflow("treasury deposit total"))?;

        self.balance = balance;
        self.total_deposited = total_deposited;
        Ok(())
    }

    pub(super) fn debit(&mut self, amount: Amount) -> Result<()> {
        let balance = self
            .balance
            .checked_sub(amount)
            .ok_or(Error::InsufficientFunds {
                requested: amount,
                available: self.balance,
            })?;
        let total_withdrawn = self
            .total_withdrawn
            .checked_add(amount)
            .ok_or(Error::Overflow("treasury withdrawal total"))?;

        self.balance = balance;
        self.total_withdrawn = total_withdrawn;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_never_goes_negative() {
        let mut treasury = Treasury::default();
        treasury.credit(100).unwrap();
        treasury.debit(40).unwrap();

        let before = treasury.clone();
        assert_eq!(
            treasury.debit(61),
            Err(Error::InsufficientFunds {
                requested: 61,
                available: 60
            })
        );
        assert_eq!(treasury, before);

        treasury.debit(60).unwrap();
        assert_eq!(treasury.balance(), 0);
        assert_eq!(treasury.total_deposited(), 100);
        assert_eq!(treasury.total_withdrawn(), 100);
    }

    #[test]
    fn overflowing_credit_changes_nothing() {
        let mut treasury = Treasury::default();
        treasury.credit(Amount::MAX).unwrap();

        let before = treasury.clone();
        assert_eq!(treasury.credit(1), Err(Error::Overflow("treasury balance")));
        assert_eq!(treasury, before);
    }

    #[test]
    fn zero_amounts_are_no_ops() {
        let mut treasury = Treasury::default();
        treasury.credit(0).unwrap();
        treasury.debit(0).unwrap();
        assert_eq!(treasury, Treasury::default());
    }
}
