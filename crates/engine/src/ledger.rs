//! The `Ledger` is the in-memory snapshot of one trip that every balance
//! computation runs on.
//!
//! It can only be built through [`Ledger::new`], which checks the whole
//! snapshot up front: duplicated members, expenses whose items do not add up
//! and items whose assignments do not partition their amount all fail with
//! [`EngineError::InconsistentLedger`] before any balance math runs.

use std::collections::{BTreeMap, HashSet};

use uuid::Uuid;

use crate::{
    Currency, EngineError, Expense, ExpenseItem, ItemAssignment, Member, MemberId, ResultEngine,
    Trip,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ledger {
    trip: Trip,
    members: BTreeMap<MemberId, Member>,
    expenses: Vec<Expense>,
}

impl Ledger {
    pub fn new(trip: Trip, members: Vec<Member>, expenses: Vec<Expense>) -> ResultEngine<Self> {
        let mut by_id: BTreeMap<MemberId, Member> = BTreeMap::new();
        let mut usernames: HashSet<String> = HashSet::new();
        for member in members {
            if !usernames.insert(member.username.clone()) {
                return Err(EngineError::InconsistentLedger(format!(
                    "user {} is a member of trip {} twice",
                    member.username, trip.code
                )));
            }
            if let Some(previous) = by_id.insert(member.id, member) {
                return Err(EngineError::InconsistentLedger(format!(
                    "member id {} used twice",
                    previous.id
                )));
            }
        }

        let mut expense_ids: HashSet<Uuid> = HashSet::new();
        let mut item_ids: HashSet<Uuid> = HashSet::new();
        for expense in &expenses {
            if !expense_ids.insert(expense.id) {
                return Err(EngineError::InconsistentLedger(format!(
                    "expense {} appears twice",
                    expense.id
                )));
            }
            for item in &expense.items {
                if !item_ids.insert(item.id) {
                    return Err(EngineError::InconsistentLedger(format!(
                        "expense item {} appears twice",
                        item.id
                    )));
                }
            }
            expense.validate(trip.currency, |member| by_id.contains_key(&member))?;
        }

        Ok(Self {
            trip,
            members: by_id,
            expenses,
        })
    }

    pub fn trip(&self) -> &Trip {
        &self.trip
    }

    pub fn currency(&self) -> Currency {
        self.trip.currency
    }

    /// Trip members ordered by member id.
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    pub fn member(&self, id: MemberId) -> Option<&Member> {
        self.members.get(&id)
    }

    pub fn member_by_username(&self, username: &str) -> Option<&Member> {
        self.members.values().find(|m| m.username == username)
    }

    /// Expenses in ledger order. Settled expenses are only included when
    /// `include_settled` is set, so the full history stays queryable.
    pub fn expenses(&self, include_settled: bool) -> impl Iterator<Item = &Expense> {
        self.expenses
            .iter()
            .filter(move |expense| include_settled || !expense.is_settled())
    }

    pub fn expense(&self, expense_id: Uuid) -> ResultEngine<&Expense> {
        self.expenses
            .iter()
            .find(|expense| expense.id == expense_id)
            .ok_or_else(|| EngineError::KeyNotFound(format!("expense {expense_id}")))
    }

    pub(crate) fn expense_mut(&mut self, expense_id: Uuid) -> ResultEngine<&mut Expense> {
        self.expenses
            .iter_mut()
            .find(|expense| expense.id == expense_id)
            .ok_or_else(|| EngineError::KeyNotFound(format!("expense {expense_id}")))
    }

    pub fn items_of(&self, expense_id: Uuid) -> ResultEngine<&[ExpenseItem]> {
        self.expense(expense_id).map(|expense| expense.items.as_slice())
    }

    pub fn item(&self, item_id: Uuid) -> ResultEngine<(&Expense, &ExpenseItem)> {
        self.expenses
            .iter()
            .find_map(|expense| {
                expense
                    .items
                    .iter()
                    .find(|item| item.id == item_id)
                    .map(|item| (expense, item))
            })
            .ok_or_else(|| EngineError::KeyNotFound(format!("expense item {item_id}")))
    }

    pub(crate) fn item_mut(&mut self, item_id: Uuid) -> ResultEngine<(bool, &mut ExpenseItem)> {
        self.expenses
            .iter_mut()
            .find_map(|expense| {
                let expense_settled = expense.is_settled();
                expense
                    .items
                    .iter_mut()
                    .find(|item| item.id == item_id)
                    .map(|item| (expense_settled, item))
            })
            .ok_or_else(|| EngineError::KeyNotFound(format!("expense item {item_id}")))
    }

    pub fn assignments_of(&self, item_id: Uuid) -> ResultEngine<&[ItemAssignment]> {
        self.item(item_id)
            .map(|(_, item)| item.assignments.as_slice())
    }
}
