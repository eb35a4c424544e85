//! Balance and settlement engine for shared trip expenses.
//!
//! The pure part works on an in-memory [`Ledger`]:
//! [`compute_balances`] gives every member's net position and
//! [`compute_settlement_plan`] the transfers that zero them. [`Engine`] is the
//! SQLite-backed store that loads ledgers and records settlements.

pub use balances::{Balances, MemberBalance, compute_balances};
pub use currency::Currency;
pub use error::EngineError;
pub use expense_items::ExpenseItem;
pub use expenses::{Expense, SettlementMark};
pub use item_assignments::ItemAssignment;
pub use ledger::Ledger;
pub use members::{Member, MemberId};
pub use money::Money;
pub use ops::{Engine, EngineBuilder};
pub use settlement::{SettlementTransfer, compute_settlement_plan, plan_settlement};
pub use trips::{Trip, TripCode};
pub use users::User;
pub use util::normalize_username;

mod balances;
mod currency;
mod error;
mod expense_items;
mod expenses;
mod item_assignments;
mod ledger;
mod members;
mod money;
mod ops;
mod recorder;
mod settlement;
mod trips;
mod users;
mod util;

pub type ResultEngine<T> = Result<T, EngineError>;
