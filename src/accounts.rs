//! Account store: identities, credentials and balances.
//!
//! Credentials are compared for plain equality. Anything facing real users
//! needs a salted one-way hash in front of this store.

use std::collections::BTreeMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::LedgerError;

#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    id: String,
    credential: String,
    balance: Decimal,
}

impl Account {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("credential", &"<redacted>")
            .field("balance", &self.balance)
            .finish()
    }
}

/// Read-only projection of an account for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountView {
    pub id: String,
    pub balance: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountCreation {
    Created,
    AlreadyExists,
}

#[derive(Debug, Default, Clone)]
pub struct AccountStore {
    accounts: BTreeMap<String, Account>,
}

impl AccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a zero-balance account. An existing id is left untouched.
    pub fn create_account(
        &mut self,
        id: &str,
        credential: &str,
    ) -> Result<AccountCreation, LedgerError> {
        if id.trim().is_empty() {
            return Err(LedgerError::InvalidAccountId);
        }
        if self.accounts.contains_key(id) {
            return Ok(AccountCreation::AlreadyExists);
        }
        self.accounts.insert(
            id.to_string(),
            Account {
                id: id.to_string(),
                credential: credential.to_string(),
                balance: Decimal::ZERO,
            },
        );
        Ok(AccountCreation::Created)
    }

    pub fn authenticate(&self, id: &str, credential: &str) -> bool {
        self.accounts
            .get(id)
            .is_some_and(|account| account.credential == credential)
    }

    /// Credit `amount` to `id` and return the new balance.
    pub fn deposit(&mut self, id: &str, amount: Decimal) -> Result<Decimal, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let account = self
            .accounts
            .get_mut(id)
            .ok_or_else(|| LedgerError::UnknownAccount(id.to_string()))?;
        account.balance = credit(id, account.balance, amount)?;
        Ok(account.balance)
    }

    pub fn balance(&self, id: &str) -> Option<Decimal> {
        self.accounts.get(id).map(Account::balance)
    }

    pub fn get(&self, id: &str) -> Option<&Account> {
        self.accounts.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.accounts.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Accounts ordered by id.
    pub fn accounts(&self) -> impl Iterator<Item = AccountView> + '_ {
        self.accounts.values().map(|a| AccountView {
            id: a.id.clone(),
            balance: a.balance,
        })
    }

    /// Sum of all balances, `None` on overflow.
    pub fn total_balance(&self) -> Option<Decimal> {
        self.accounts
            .values()
            .try_fold(Decimal::ZERO, |acc, a| acc.checked_add(a.balance))
    }

    /// Overwrite balances of existing accounts. Callers validate first; the
    /// whole batch is written or, if any id is unknown, nothing is.
    pub(crate) fn set_balances(&mut self, updates: &[(&str, Decimal)]) -> Result<(), LedgerError> {
        if let Some((id, _)) = updates.iter().find(|(id, _)| !self.contains(id)) {
            return Err(LedgerError::UnknownAccount(id.to_string()));
        }
        for (id, balance) in updates {
            if let Some(account) = self.accounts.get_mut(*id) {
                account.balance = *balance;
            }
        }
        Ok(())
    }
}

/// `balance + amount`, refused unless the sum grew by exactly `amount`.
/// Decimal addition rounds once a result needs more than 28 significant
/// digits.
pub(crate) fn credit(id: &str, balance: Decimal, amount: Decimal) -> Result<Decimal, LedgerError> {
    let credited = balance
        .checked_add(amount)
        .ok_or_else(|| LedgerError::Overflow(id.to_string()))?;
    if credited.checked_sub(balance) != Some(amount) {
        return Err(LedgerError::PrecisionLoss {
            account: id.to_string(),
            amount,
        });
    }
    Ok(credited)
}

/// `balance - amount`, refused unless the balance shrank by exactly `amount`.
pub(crate) fn debit(id: &str, balance: Decimal, amount: Decimal) -> Result<Decimal, LedgerError> {
    let debited = balance
        .checked_sub(amount)
        .ok_or_else(|| LedgerError::Overflow(id.to_string()))?;
    if balance.checked_sub(debited) != Some(amount) {
        return Err(LedgerError::PrecisionLoss {
            account: id.to_string(),
            amount,
        });
    }
    Ok(debited)
}
