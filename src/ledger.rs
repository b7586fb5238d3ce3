//! The ledger: owns the record chain and the account store and settles
//! transfers across both as a single step.

use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::accounts::{credit, debit, AccountCreation, AccountStore, AccountView};
use crate::error::{ChainError, LedgerError};
use crate::model::{Chain, Payload, Record, Transfer};

#[derive(Debug, Default, Clone)]
pub struct Ledger {
    chain: Chain,
    accounts: AccountStore,
}

impl Ledger {
    /// Fresh ledger: genesis record only, no accounts.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_account(
        &mut self,
        id: &str,
        credential: &str,
    ) -> Result<AccountCreation, LedgerError> {
        let outcome = self.accounts.create_account(id, credential)?;
        match outcome {
            AccountCreation::Created => tracing::info!(account = id, "account created"),
            AccountCreation::AlreadyExists => {
                tracing::debug!(account = id, "account exists, creation skipped")
            }
        }
        Ok(outcome)
    }

    pub fn authenticate(&self, id: &str, credential: &str) -> bool {
        let ok = self.accounts.authenticate(id, credential);
        if !ok {
            tracing::warn!(account = id, "authentication failed");
        }
        ok
    }

    /// Deposits are not recorded on the chain.
    pub fn deposit(&mut self, id: &str, amount: Decimal) -> Result<Decimal, LedgerError> {
        match self.accounts.deposit(id, amount) {
            Ok(balance) => {
                tracing::info!(account = id, %amount, %balance, "deposit applied");
                Ok(balance)
            }
            Err(e) => {
                tracing::warn!(account = id, %amount, error = %e, "deposit rejected");
                Err(e)
            }
        }
    }

    pub fn balance(&self, id: &str) -> Option<Decimal> {
        self.accounts.balance(id)
    }

    /// Move `amount` from `sender` to `receiver` and record it on the chain.
    ///
    /// Every check runs before anything is written, so a rejected transfer
    /// leaves balances and chain untouched. Non-positive amounts are refused
    /// like deposits are.
    pub fn authorize_transfer(
        &mut self,
        sender: &str,
        receiver: &str,
        amount: Decimal,
    ) -> Result<&Record, LedgerError> {
        let updates = match self.plan_transfer(sender, receiver, amount) {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!(sender, receiver, %amount, error = %e, "transfer rejected");
                return Err(e);
            }
        };

        // The chain append cannot fail, so no compensation is needed after
        // the balances are written. A fallible append (persistence, network)
        // must restore the previous balances on error.
        self.accounts.set_balances(&updates)?;

        let timestamp = OffsetDateTime::now_utc();
        let payload = Payload::Transfer(Transfer {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            amount,
            timestamp,
        });
        let record = self.chain.append_at(payload, timestamp);
        tracing::info!(
            sender,
            receiver,
            %amount,
            index = record.index,
            link = %record.link,
            "transfer settled"
        );
        Ok(record)
    }

    /// Validate a transfer and compute the resulting balances.
    fn plan_transfer<'a>(
        &self,
        sender: &'a str,
        receiver: &'a str,
        amount: Decimal,
    ) -> Result<Vec<(&'a str, Decimal)>, LedgerError> {
        if amount <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(amount));
        }
        let available = self
            .accounts
            .balance(sender)
            .ok_or_else(|| LedgerError::UnknownAccount(sender.to_string()))?;
        let receiver_balance = self
            .accounts
            .balance(receiver)
            .ok_or_else(|| LedgerError::UnknownAccount(receiver.to_string()))?;

        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                available,
                requested: amount,
            });
        }

        // Debit and credit cancel out for a self transfer.
        if sender == receiver {
            return Ok(vec![(sender, available)]);
        }

        let debited = debit(sender, available, amount)?;
        let credited = credit(receiver, receiver_balance, amount)?;
        Ok(vec![(sender, debited), (receiver, credited)])
    }

    pub fn verify_chain(&self) -> Result<(), ChainError> {
        let result = self.chain.verify();
        if let Err(e) = &result {
            tracing::warn!(error = %e, "chain verification failed");
        }
        result
    }

    pub fn is_valid(&self) -> bool {
        self.verify_chain().is_ok()
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn records(&self) -> &[Record] {
        self.chain.records()
    }

    pub fn accounts(&self) -> impl Iterator<Item = AccountView> + '_ {
        self.accounts.accounts()
    }

    pub fn account_store(&self) -> &AccountStore {
        &self.accounts
    }

    #[cfg(test)]
    pub(crate) fn chain_mut(&mut self) -> &mut Chain {
        &mut self.chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn funded() -> Ledger {
        let mut ledger = Ledger::new();
        ledger.create_account("alice", "pw").unwrap();
        ledger.create_account("bob", "pw2").unwrap();
        ledger.deposit("alice", dec!(100)).unwrap();
        ledger
    }

    #[test]
    fn fresh_ledger_is_valid() {
        let ledger = Ledger::new();
        assert_eq!(ledger.records().len(), 1);
        assert!(ledger.is_valid());
    }

    #[test]
    fn transfer_scenario() {
        let mut ledger = funded();

        let record = ledger.authorize_transfer("alice", "bob", dec!(40)).unwrap();
        let transfer = record.payload.as_transfer().unwrap();
        assert_eq!(record.index, 1);
        assert_eq!(transfer.amount, dec!(40));
        assert_eq!(transfer.timestamp, record.timestamp);

        assert_eq!(ledger.balance("alice"), Some(dec!(60)));
        assert_eq!(ledger.balance("bob"), Some(dec!(40)));
        assert_eq!(ledger.records().len(), 2);
        assert!(ledger.is_valid());

        let err = ledger.authorize_transfer("alice", "bob", dec!(1000)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                available: dec!(60),
                requested: dec!(1000)
            }
        );
        assert_eq!(ledger.balance("alice"), Some(dec!(60)));
        assert_eq!(ledger.balance("bob"), Some(dec!(40)));
        assert_eq!(ledger.records().len(), 2);
    }

    #[test]
    fn whole_balance_can_be_sent() {
        let mut ledger = funded();
        ledger.authorize_transfer("alice", "bob", dec!(100)).unwrap();
        assert_eq!(ledger.balance("alice"), Some(dec!(0)));
        assert_eq!(ledger.balance("bob"), Some(dec!(100)));
    }

    #[test]
    fn unknown_accounts_are_rejected() {
        let mut ledger = funded();
        assert_eq!(
            ledger.authorize_transfer("alice", "carol", dec!(1)).unwrap_err(),
            LedgerError::UnknownAccount("carol".into())
        );
        assert_eq!(
            ledger.authorize_transfer("carol", "bob", dec!(1)).unwrap_err(),
            LedgerError::UnknownAccount("carol".into())
        );
        assert_eq!(ledger.records().len(), 1);
        assert_eq!(ledger.balance("alice"), Some(dec!(100)));
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let mut ledger = funded();
        for amount in [dec!(0), dec!(-5)] {
            assert_eq!(
                ledger.authorize_transfer("alice", "bob", amount).unwrap_err(),
                LedgerError::InvalidAmount(amount)
            );
        }
        assert_eq!(ledger.balance("alice"), Some(dec!(100)));
        assert_eq!(ledger.balance("bob"), Some(dec!(0)));
        assert_eq!(ledger.records().len(), 1);
    }

    #[test]
    fn self_transfer_records_without_moving_funds() {
        let mut ledger = funded();
        ledger.authorize_transfer("alice", "alice", dec!(30)).unwrap();
        assert_eq!(ledger.balance("alice"), Some(dec!(100)));
        assert_eq!(ledger.records().len(), 2);

        assert!(matches!(
            ledger.authorize_transfer("alice", "alice", dec!(101)),
            Err(LedgerError::InsufficientFunds { .. })
        ));
    }

    #[test]
    fn receiver_overflow_leaves_state_untouched() {
        let mut ledger = funded();
        ledger.deposit("bob", Decimal::MAX).unwrap();
        assert_eq!(
            ledger.authorize_transfer("alice", "bob", dec!(1)).unwrap_err(),
            LedgerError::Overflow("bob".into())
        );
        assert_eq!(ledger.balance("alice"), Some(dec!(100)));
        assert_eq!(ledger.records().len(), 1);
    }

    #[test]
    fn amount_below_sender_precision_moves_nothing() {
        let mut ledger = funded();
        ledger.deposit("alice", dec!(99999999999999999900)).unwrap();
        let tiny = dec!(0.00000000000000000001);

        for _ in 0..5 {
            assert_eq!(
                ledger.authorize_transfer("alice", "bob", tiny).unwrap_err(),
                LedgerError::PrecisionLoss {
                    account: "alice".into(),
                    amount: tiny,
                }
            );
        }
        assert_eq!(ledger.balance("alice"), Some(dec!(100000000000000000000)));
        assert_eq!(ledger.balance("bob"), Some(dec!(0)));
        assert_eq!(ledger.records().len(), 1);
    }

    #[test]
    fn amount_below_receiver_precision_moves_nothing() {
        let mut ledger = funded();
        ledger.deposit("bob", dec!(100000000000000000000)).unwrap();

        assert!(matches!(
            ledger.authorize_transfer("alice", "bob", dec!(0.00000000000000000001)),
            Err(LedgerError::PrecisionLoss { ref account, .. }) if account == "bob"
        ));
        assert_eq!(ledger.balance("alice"), Some(dec!(100)));
        assert_eq!(ledger.balance("bob"), Some(dec!(100000000000000000000)));
        assert_eq!(ledger.records().len(), 1);
    }

    #[test]
    fn tampering_with_a_settled_transfer_is_detected() {
        let mut ledger = funded();
        ledger.authorize_transfer("alice", "bob", dec!(40)).unwrap();

        if let Payload::Transfer(t) = &mut ledger.chain_mut().records_mut()[1].payload {
            t.receiver = "mallory".into();
        }
        assert!(matches!(
            ledger.verify_chain(),
            Err(ChainError::InvalidLink { index: 1, .. })
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Transfers never change the total and never drive a balance negative.
        #[test]
        fn transfers_conserve_total(
            deposits in prop::collection::vec(1u32..10_000, 3),
            transfers in prop::collection::vec((0usize..3, 0usize..3, 1u32..20_000), 0..40)
        ) {
            let ids = ["alice", "bob", "carol"];
            let mut ledger = Ledger::new();
            for (id, amount) in ids.iter().zip(&deposits) {
                ledger.create_account(id, "pw").unwrap();
                ledger.deposit(id, Decimal::from(*amount)).unwrap();
            }
            let total = ledger.account_store().total_balance().unwrap();
            let mut settled = 0;

            for (from, to, amount) in transfers {
                let amount = Decimal::from(amount);
                let before = ledger.balance(ids[from]).unwrap();
                match ledger.authorize_transfer(ids[from], ids[to], amount) {
                    Ok(_) => settled += 1,
                    Err(e) => {
                        let refused = matches!(e, LedgerError::InsufficientFunds { .. });
                        prop_assert!(refused);
                        prop_assert!(before < amount);
                    }
                }
                prop_assert_eq!(ledger.account_store().total_balance(), Some(total));
                prop_assert!(ledger.accounts().all(|a| a.balance >= Decimal::ZERO));
            }

            prop_assert_eq!(ledger.records().len(), 1 + settled);
            prop_assert!(ledger.is_valid());
        }

        /// At any scale, a settled transfer debits and credits exactly the
        /// recorded amount; anything else is refused without effect.
        #[test]
        fn settled_amount_matches_both_deltas(
            sender_units in 1u64..1_000_000_000,
            receiver_units in 0u64..1_000_000_000,
            magnitude in 0u32..13,
            mantissa in 1i64..1_000_000_000,
            scale in 0u32..=28,
        ) {
            let boost = Decimal::from(10u64.pow(magnitude));
            let mut ledger = Ledger::new();
            ledger.create_account("alice", "pw").unwrap();
            ledger.create_account("bob", "pw").unwrap();
            ledger.deposit("alice", Decimal::from(sender_units) * boost).unwrap();
            if receiver_units > 0 {
                ledger.deposit("bob", Decimal::from(receiver_units) * boost).unwrap();
            }
            let amount = Decimal::new(mantissa, scale);
            let alice = ledger.balance("alice").unwrap();
            let bob = ledger.balance("bob").unwrap();

            match ledger.authorize_transfer("alice", "bob", amount) {
                Ok(record) => {
                    prop_assert_eq!(record.payload.as_transfer().map(|t| t.amount), Some(amount));
                    prop_assert_eq!(alice - ledger.balance("alice").unwrap(), amount);
                    prop_assert_eq!(ledger.balance("bob").unwrap() - bob, amount);
                    prop_assert_eq!(ledger.records().len(), 2);
                }
                Err(e) => {
                    let refused = matches!(
                        e,
                        LedgerError::InsufficientFunds { .. } | LedgerError::PrecisionLoss { .. }
                    );
                    prop_assert!(refused);
                    prop_assert_eq!(ledger.balance("alice"), Some(alice));
                    prop_assert_eq!(ledger.balance("bob"), Some(bob));
                    prop_assert_eq!(ledger.records().len(), 1);
                }
            }
        }
    }
}
