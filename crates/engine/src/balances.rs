//! Net balances of trip members.
//!
//! For every outstanding item the payer is credited the item amount and each
//! assignee is debited their share. `net = paid - owed`: positive means the
//! member is owed money, negative means they owe.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{Currency, EngineError, Ledger, MemberId, Money, ResultEngine, SettlementTransfer};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct MemberBalance {
    pub paid: Money,
    pub owed: Money,
    pub net: Money,
}

impl MemberBalance {
    fn zero(currency: Currency) -> Self {
        Self {
            paid: Money::zero(currency),
            owed: Money::zero(currency),
            net: Money::zero(currency),
        }
    }

    fn credit(&mut self, amount: Money) -> ResultEngine<()> {
        self.paid = self.paid.checked_add(amount)?;
        self.net = self.net.checked_add(amount)?;
        Ok(())
    }

    fn debit(&mut self, amount: Money) -> ResultEngine<()> {
        self.owed = self.owed.checked_add(amount)?;
        self.net = self.net.checked_sub(amount)?;
        Ok(())
    }
}

/// Balance report for every member of a trip, including members with no
/// activity (reported at zero).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Balances {
    currency: Currency,
    members: BTreeMap<MemberId, MemberBalance>,
}

impl Balances {
    /// Balance report from bare net positions, e.g. to plan transfers for
    /// balances computed elsewhere. `paid`/`owed` mirror the sign of the net.
    pub fn from_nets<I>(currency: Currency, nets: I) -> ResultEngine<Self>
    where
        I: IntoIterator<Item = (MemberId, Money)>,
    {
        let mut members = BTreeMap::new();
        for (member, net) in nets {
            let mut balance = MemberBalance::zero(currency);
            if net.is_negative() {
                balance.debit(net.checked_neg()?)?;
            } else {
                balance.credit(net)?;
            }
            if members.insert(member, balance).is_some() {
                return Err(EngineError::ExistingKey(format!("member {member}")));
            }
        }
        Ok(Self { currency, members })
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    pub fn get(&self, member: MemberId) -> Option<&MemberBalance> {
        self.members.get(&member)
    }

    /// Net balance of `member`; zero for unknown members.
    pub fn net(&self, member: MemberId) -> Money {
        self.members
            .get(&member)
            .map_or(Money::zero(self.currency), |balance| balance.net)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MemberId, &MemberBalance)> {
        self.members.iter().map(|(id, balance)| (*id, balance))
    }

    /// Member id to net balance.
    pub fn nets(&self) -> BTreeMap<MemberId, Money> {
        self.iter().map(|(id, balance)| (id, balance.net)).collect()
    }

    /// Members who are owed money, ordered by member id.
    pub fn creditors(&self) -> impl Iterator<Item = (MemberId, Money)> {
        self.iter()
            .filter(|(_, balance)| balance.net.is_positive())
            .map(|(id, balance)| (id, balance.net))
    }

    /// Members who owe money, ordered by member id.
    pub fn debtors(&self) -> impl Iterator<Item = (MemberId, Money)> {
        self.iter()
            .filter(|(_, balance)| balance.net.is_negative())
            .map(|(id, balance)| (id, balance.net))
    }

    /// Sum of all nets. Zero for any balance report built by
    /// [`compute_balances`].
    pub fn total(&self) -> ResultEngine<Money> {
        Money::try_sum(self.currency, self.members.values().map(|b| b.net))
    }

    /// `true` when nobody owes anything.
    pub fn is_settled(&self) -> bool {
        self.members.values().all(|balance| balance.net.is_zero())
    }

    /// Replays one transfer: the payer is credited, the receiver debited.
    pub fn apply(&mut self, transfer: &SettlementTransfer) -> ResultEngine<()> {
        let currency = self.currency;
        self.members
            .entry(transfer.from)
            .or_insert_with(|| MemberBalance::zero(currency))
            .credit(transfer.amount)?;
        self.members
            .entry(transfer.to)
            .or_insert_with(|| MemberBalance::zero(currency))
            .debit(transfer.amount)?;
        Ok(())
    }
}

/// Computes every member's net position over the outstanding (not settled)
/// expenses and items of `ledger`.
///
/// Fails with [`EngineError::UnbalancedLedger`] if the nets do not sum to
/// exactly zero.
pub fn compute_balances(ledger: &Ledger) -> ResultEngine<Balances> {
    let currency = ledger.currency();
    let mut members: BTreeMap<MemberId, MemberBalance> = ledger
        .members()
        .map(|member| (member.id, MemberBalance::zero(currency)))
        .collect();

    for expense in ledger.expenses(false) {
        for item in expense.outstanding_items() {
            members
                .entry(expense.payer)
                .or_insert_with(|| MemberBalance::zero(currency))
                .credit(item.amount)?;
            for (member, share) in item.shares()? {
                members
                    .entry(member)
                    .or_insert_with(|| MemberBalance::zero(currency))
                    .debit(share)?;
            }
        }
    }

    let balances = Balances { currency, members };
    let total = balances.total()?;
    if !total.is_zero() {
        tracing::error!(
            trip = %ledger.trip().code,
            %total,
            "balances do not sum to zero"
        );
        return Err(EngineError::UnbalancedLedger(format!(
            "balances of trip {} sum to {total}",
            ledger.trip().code
        )));
    }

    Ok(balances)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{
        Expense, ExpenseItem, ItemAssignment,
        ledger::tests::{eur, member, trip},
    };

    #[test]
    fn two_members_one_shared_expense() {
        let alice = MemberId::new(1);
        let bob = MemberId::new(2);
        let ledger = Ledger::new(
            trip(),
            vec![member(1, "alice"), member(2, "bob")],
            vec![Expense::unitemized(alice, "Hotel", eur(3000), Utc::now(), &[alice, bob]).unwrap()],
        )
        .unwrap();

        let balances = compute_balances(&ledger).unwrap();
        assert_eq!(balances.net(alice), eur(1500));
        assert_eq!(balances.net(bob), eur(-1500));
        assert_eq!(balances.get(alice).unwrap().paid, eur(3000));
        assert_eq!(balances.get(alice).unwrap().owed, eur(1500));
    }

    #[test]
    fn partial_assignment_across_three_members() {
        let (a, b, c) = (MemberId::new(1), MemberId::new(2), MemberId::new(3));
        let ledger = Ledger::new(
            trip(),
            vec![member(1, "a"), member(2, "b"), member(3, "c")],
            vec![
                Expense::unitemized(a, "Lunch", eur(100), Utc::now(), &[a, b]).unwrap(),
                Expense::unitemized(b, "Snacks", eur(100), Utc::now(), &[b, c]).unwrap(),
            ],
        )
        .unwrap();

        let nets = compute_balances(&ledger).unwrap().nets();
        assert_eq!(nets[&a], eur(50));
        assert_eq!(nets[&b], eur(0));
        assert_eq!(nets[&c], eur(-50));
    }

    #[test]
    fn idle_members_are_reported_at_zero_but_not_as_creditors_or_debtors() {
        let (a, b) = (MemberId::new(1), MemberId::new(2));
        let ledger = Ledger::new(
            trip(),
            vec![member(1, "a"), member(2, "b"), member(3, "idle")],
            vec![Expense::unitemized(a, "Fuel", eur(1000), Utc::now(), &[a, b]).unwrap()],
        )
        .unwrap();

        let balances = compute_balances(&ledger).unwrap();
        assert_eq!(balances.iter().count(), 3);
        assert_eq!(balances.net(MemberId::new(3)), eur(0));
        assert_eq!(balances.creditors().collect::<Vec<_>>(), vec![(a, eur(500))]);
        assert_eq!(balances.debtors().collect::<Vec<_>>(), vec![(b, eur(-500))]);
    }

    #[test]
    fn odd_amounts_stay_zero_sum() {
        let (a, b, c) = (MemberId::new(1), MemberId::new(2), MemberId::new(3));
        let ledger = Ledger::new(
            trip(),
            vec![member(1, "a"), member(2, "b"), member(3, "c")],
            vec![
                Expense::unitemized(a, "Museum", eur(301), Utc::now(), &[a, b, c]).unwrap(),
                Expense::unitemized(b, "Boat", eur(1001), Utc::now(), &[a, b, c]).unwrap(),
                Expense::unitemized(c, "Ice cream", eur(7), Utc::now(), &[a, b]).unwrap(),
            ],
        )
        .unwrap();

        let balances = compute_balances(&ledger).unwrap();
        assert_eq!(balances.total().unwrap(), eur(0));
        // a: paid 301, owes 101 + 334 + 4
        assert_eq!(balances.net(a), eur(301 - 101 - 334 - 4));
    }

    #[test]
    fn settled_item_is_excluded_on_both_sides() {
        let (a, b) = (MemberId::new(1), MemberId::new(2));
        let expense = Expense::new(
            a,
            "Market",
            eur(900),
            Utc::now(),
            vec![
                ExpenseItem::new("Bread", eur(300), vec![ItemAssignment::equal(b)]),
                ExpenseItem::new("Wine", eur(600), vec![ItemAssignment::equal(b)]),
            ],
        )
        .unwrap();
        let wine = expense.items[1].id;
        let mut ledger =
            Ledger::new(trip(), vec![member(1, "a"), member(2, "b")], vec![expense]).unwrap();

        ledger.settle_item(wine, "b", Utc::now()).unwrap();
        let balances = compute_balances(&ledger).unwrap();
        assert_eq!(balances.net(a), eur(300));
        assert_eq!(balances.net(b), eur(-300));
    }

    #[test]
    fn from_nets_rejects_unrepresentable_debt() {
        let err = Balances::from_nets(
            Currency::Eur,
            [(MemberId::new(1), Money::new(i64::MIN, Currency::Eur))],
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::InvalidAmount(_)));
    }

    #[test]
    fn from_nets_rejects_duplicate_members_as_caller_error() {
        let err = Balances::from_nets(
            Currency::Eur,
            [(MemberId::new(1), eur(100)), (MemberId::new(1), eur(-100))],
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::ExistingKey(_)));
        assert!(!err.is_integrity_fault());
    }
}
