//! Settlement planning: turns net balances into a short list of transfers.
//!
//! Greedy matching: the largest outstanding creditor is paid by the largest
//! outstanding debtor, for the smaller of the two amounts, until everyone is
//! at zero. Each step zeroes at least one side, so a plan never has more
//! than `creditors + debtors - 1` transfers. Ties on amount go to the lower
//! member id, which makes plans reproducible.

use std::{cmp::Reverse, collections::BinaryHeap};

use serde::Serialize;

use crate::{Balances, EngineError, Ledger, MemberId, Money, ResultEngine, compute_balances};

/// One suggested payment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SettlementTransfer {
    pub from: MemberId,
    pub to: MemberId,
    pub amount: Money,
}

/// Outstanding amount (in minor units, always positive) keyed for a max-heap:
/// larger amounts first, then lower member ids.
type Outstanding = (i64, Reverse<MemberId>);

/// Plans the transfers that bring every balance in `balances` to zero.
///
/// Fails with [`EngineError::UnbalancedLedger`] if credits and debts do not
/// cancel out.
pub fn plan_settlement(balances: &Balances) -> ResultEngine<Vec<SettlementTransfer>> {
    let currency = balances.currency();

    let mut creditors: BinaryHeap<Outstanding> = balances
        .creditors()
        .map(|(member, net)| (net.minor(), Reverse(member)))
        .collect();
    let mut debtors = BinaryHeap::<Outstanding>::new();
    for (member, net) in balances.debtors() {
        debtors.push((net.checked_abs()?.minor(), Reverse(member)));
    }

    let credit: i128 = creditors.iter().map(|(amount, _)| i128::from(*amount)).sum();
    let debt: i128 = debtors.iter().map(|(amount, _)| i128::from(*amount)).sum();
    if credit != debt {
        return Err(EngineError::UnbalancedLedger(format!(
            "credits of {credit} against debts of {debt} minor units"
        )));
    }

    let mut transfers = Vec::with_capacity((creditors.len() + debtors.len()).saturating_sub(1));
    while let (Some(creditor), Some(debtor)) = (creditors.pop(), debtors.pop()) {
        let (credit_left, Reverse(to)) = creditor;
        let (debt_left, Reverse(from)) = debtor;
        let amount = credit_left.min(debt_left);

        transfers.push(SettlementTransfer {
            from,
            to,
            amount: Money::new(amount, currency),
        });

        if credit_left > amount {
            creditors.push((credit_left - amount, Reverse(to)));
        }
        if debt_left > amount {
            debtors.push((debt_left - amount, Reverse(from)));
        }
    }

    if !creditors.is_empty() || !debtors.is_empty() {
        return Err(EngineError::UnbalancedLedger(
            "balances left over after settlement".to_string(),
        ));
    }

    Ok(transfers)
}

/// Balances of `ledger` followed by [`plan_settlement`].
pub fn compute_settlement_plan(ledger: &Ledger) -> ResultEngine<Vec<SettlementTransfer>> {
    plan_settlement(&compute_balances(ledger)?)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::{
        Currency, Expense, Ledger,
        ledger::tests::{eur, member, trip},
    };

    fn transfer(from: i64, to: i64, minor: i64) -> SettlementTransfer {
        SettlementTransfer {
            from: MemberId::new(from),
            to: MemberId::new(to),
            amount: eur(minor),
        }
    }

    fn ledger(members: usize, expenses: Vec<Expense>) -> Ledger {
        let members = (1..=members as i64)
            .map(|id| member(id, &format!("m{id}")))
            .collect();
        Ledger::new(trip(), members, expenses).unwrap()
    }

    fn assert_plan_settles(ledger: &Ledger) -> Vec<SettlementTransfer> {
        let mut balances = compute_balances(ledger).unwrap();
        let creditors = balances.creditors().count();
        let debtors = balances.debtors().count();
        let plan = plan_settlement(&balances).unwrap();

        if creditors == 0 || debtors == 0 {
            assert!(plan.is_empty());
        } else {
            assert!(plan.len() <= creditors + debtors - 1);
        }
        for step in &plan {
            assert!(step.amount.is_positive());
            balances.apply(step).unwrap();
        }
        assert!(balances.is_settled());
        plan
    }

    #[test]
    fn debtor_pays_creditor() {
        let (a, b) = (MemberId::new(1), MemberId::new(2));
        let ledger = ledger(
            2,
            vec![Expense::unitemized(a, "Hotel", eur(3000), Utc::now(), &[a, b]).unwrap()],
        );
        assert_eq!(assert_plan_settles(&ledger), vec![transfer(2, 1, 1500)]);
    }

    #[test]
    fn member_at_zero_is_skipped() {
        let (a, b, c) = (MemberId::new(1), MemberId::new(2), MemberId::new(3));
        let ledger = ledger(
            3,
            vec![
                Expense::unitemized(a, "Lunch", eur(100), Utc::now(), &[a, b]).unwrap(),
                Expense::unitemized(b, "Snacks", eur(100), Utc::now(), &[b, c]).unwrap(),
            ],
        );
        assert_eq!(assert_plan_settles(&ledger), vec![transfer(3, 1, 50)]);
    }

    #[test]
    fn largest_creditor_is_matched_with_largest_debtor() {
        let (a, b, c, d) = (
            MemberId::new(1),
            MemberId::new(2),
            MemberId::new(3),
            MemberId::new(4),
        );
        let ledger = ledger(
            4,
            vec![
                Expense::unitemized(a, "Flat", eur(800), Utc::now(), &[a, c, d]).unwrap(),
                Expense::unitemized(b, "Car", eur(400), Utc::now(), &[b, c, d]).unwrap(),
            ],
        );
        // a +533, b +266, c -400, d -399
        let nets = compute_balances(&ledger).unwrap().nets();
        assert_eq!(
            nets.values().map(|m| m.minor()).collect::<Vec<_>>(),
            vec![533, 266, -400, -399]
        );
        assert_eq!(
            assert_plan_settles(&ledger),
            vec![transfer(3, 1, 400), transfer(4, 2, 266), transfer(4, 1, 133)]
        );
    }

    #[test]
    fn ties_break_on_lower_member_id() {
        let (a, b, c) = (MemberId::new(1), MemberId::new(2), MemberId::new(3));
        // a +100, b -50, c -50
        let ledger = ledger(
            3,
            vec![Expense::unitemized(a, "Tickets", eur(150), Utc::now(), &[a, b, c]).unwrap()],
        );
        assert_eq!(
            assert_plan_settles(&ledger),
            vec![transfer(2, 1, 50), transfer(3, 1, 50)]
        );
    }

    #[test]
    fn settled_ledger_needs_no_transfers() {
        let ledger = ledger(3, vec![]);
        assert!(compute_settlement_plan(&ledger).unwrap().is_empty());
    }

    #[test]
    fn many_members_settle_fully() {
        let ids: Vec<MemberId> = (1..=7).map(MemberId::new).collect();
        let expenses = vec![
            Expense::unitemized(ids[0], "Villa", eur(123_457), Utc::now(), &ids).unwrap(),
            Expense::unitemized(ids[3], "Boat", eur(9_999), Utc::now(), &ids[1..5]).unwrap(),
            Expense::unitemized(ids[6], "Dinner", eur(40_001), Utc::now(), &ids[2..]).unwrap(),
            Expense::unitemized(ids[1], "Fuel", eur(3_333), Utc::now(), &ids[..2]).unwrap(),
        ];
        assert_plan_settles(&ledger(7, expenses));
    }

    #[test]
    fn unbalanced_input_is_rejected() {
        let balances = Balances::from_nets(
            Currency::Eur,
            [
                (MemberId::new(1), eur(100)),
                (MemberId::new(2), eur(-99)),
            ],
        )
        .unwrap();
        assert!(matches!(
            plan_settlement(&balances),
            Err(EngineError::UnbalancedLedger(_))
        ));
    }
}
