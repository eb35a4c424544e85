//! Execution of the parsed command line against the [`Engine`].
//!
//! Every command prints either a short human-readable report or, with
//! `--json`, the same data as JSON on stdout.

use std::{collections::BTreeMap, str::FromStr};

use chrono::Utc;
use engine::{
    Currency, Engine, Expense, ExpenseItem, ItemAssignment, Ledger, Member, MemberId, Money,
    TripCode,
};
use serde::Serialize;

use crate::{
    Command, ExpenseAddArgs, ExpenseArgs, ExpenseCommand, MemberArgs, MemberCommand, TripArgs,
    TripCommand, UserArgs, UserCommand,
    error::{AppError, Result},
    settings::Settings,
};

pub async fn run(engine: &Engine, settings: &Settings, json: bool, command: Command) -> Result<()> {
    match command {
        Command::User(UserArgs {
            command: UserCommand::Create(args),
        }) => {
            let user = engine
                .create_user(
                    &args.username,
                    args.display_name.as_deref(),
                    args.avatar_url.as_deref(),
                )
                .await?;
            emit(json, &user, || format!("created user: {}", user.username))
        }
        Command::Trip(TripArgs {
            command: TripCommand::Create(args),
        }) => {
            let currency = match args.currency {
                Some(currency) => currency,
                None => Currency::from_str(&settings.currency)
                    .map_err(|err| AppError::Usage(err.to_string()))?,
            };
            let trip = engine
                .create_trip(&args.name, args.place.as_deref(), currency)
                .await?;
            emit(json, &trip, || {
                format!("created trip: {} ({}, {})", trip.name, trip.code, trip.currency)
            })
        }
        Command::Trip(TripArgs {
            command: TripCommand::Show { code },
        }) => {
            let ledger = engine.load_ledger(code).await?;
            let report = TripReport::new(&ledger);
            emit(json, &report, || report.to_text())
        }
        Command::Member(MemberArgs {
            command: MemberCommand::Add { code, username },
        }) => {
            let member = engine.add_member(code, &username).await?;
            emit(json, &member, || {
                format!("added {} to trip {code} as {}", member.username, member.id)
            })
        }
        Command::Expense(ExpenseArgs {
            command: ExpenseCommand::Add(args),
        }) => add_expense(engine, json, args).await,
        Command::Balances { code } => {
            let ledger = engine.load_ledger(code).await?;
            let balances = engine::compute_balances(&ledger)?;
            let names = usernames(&ledger);
            let lines: Vec<BalanceLine<'_>> = balances
                .iter()
                .map(|(member, balance)| BalanceLine {
                    member,
                    username: names.get(&member).copied().unwrap_or_default(),
                    paid: balance.paid,
                    owed: balance.owed,
                    net: balance.net,
                })
                .collect();
            emit(json, &lines, || {
                lines
                    .iter()
                    .map(|line| {
                        format!(
                            "{:<16} paid {:>14}  owed {:>14}  net {:>14}",
                            line.username,
                            line.paid.to_string(),
                            line.owed.to_string(),
                            line.net.to_string()
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Command::Plan { code } => {
            let ledger = engine.load_ledger(code).await?;
            let plan = engine::compute_settlement_plan(&ledger)?;
            let names = usernames(&ledger);
            let lines: Vec<TransferLine<'_>> = plan
                .iter()
                .map(|transfer| TransferLine {
                    from: names.get(&transfer.from).copied().unwrap_or_default(),
                    to: names.get(&transfer.to).copied().unwrap_or_default(),
                    amount: transfer.amount,
                })
                .collect();
            emit(json, &lines, || {
                if lines.is_empty() {
                    return "nothing to settle".to_string();
                }
                lines
                    .iter()
                    .map(|line| format!("{} pays {} {}", line.from, line.to, line.amount))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Command::Settle { expense_id, by } => {
            engine.record_settlement(expense_id, &by, Utc::now()).await?;
            emit(json, &expense_id, || format!("settled expense {expense_id}"))
        }
        Command::SettleItem { item_id, by } => {
            engine
                .record_item_settlement(item_id, &by, Utc::now())
                .await?;
            emit(json, &item_id, || format!("settled expense item {item_id}"))
        }
    }
}

async fn add_expense(engine: &Engine, json: bool, args: ExpenseAddArgs) -> Result<()> {
    let trip = engine.trip(args.code).await?;
    let members = engine.members(args.code).await?;
    let amount = Money::parse(&args.amount, trip.currency)
        .map_err(|err| AppError::Usage(err.to_string()))?;

    let payer = member_id(&members, &args.payer, args.code)?;
    let assignments = if !args.share.is_empty() {
        args.share
            .iter()
            .map(|raw| {
                let (username, share) = parse_share(raw, trip.currency)?;
                let member = member_id(&members, username, args.code)?;
                Ok(match share {
                    Some(share) => ItemAssignment::fixed(member, share),
                    None => ItemAssignment::equal(member),
                })
            })
            .collect::<Result<Vec<_>>>()?
    } else if !args.among.is_empty() {
        args.among
            .iter()
            .map(|username| member_id(&members, username, args.code).map(ItemAssignment::equal))
            .collect::<Result<Vec<_>>>()?
    } else {
        members
            .iter()
            .map(|member| ItemAssignment::equal(member.id))
            .collect()
    };

    let item = ExpenseItem::new(args.description.clone(), amount, assignments);
    let expense = Expense::new(
        payer,
        args.description,
        amount,
        args.at.unwrap_or_else(Utc::now),
        vec![item],
    )?;
    let expense_id = engine.add_expense(args.code, expense).await?;
    emit(json, &expense_id, || {
        format!("recorded expense {expense_id}: {amount} paid by {}", args.payer)
    })
}

fn member_id(members: &[Member], username: &str, code: TripCode) -> Result<MemberId> {
    let wanted =
        engine::normalize_username(username).map_err(|err| AppError::Usage(err.to_string()))?;
    members
        .iter()
        .find(|member| member.username == wanted)
        .map(|member| member.id)
        .ok_or_else(|| AppError::Usage(format!("{username} is not a member of trip {code}")))
}

/// `alice=12.50` is a fixed share, bare `alice` an equal part of the rest.
fn parse_share(raw: &str, currency: Currency) -> Result<(&str, Option<Money>)> {
    match raw.split_once('=') {
        Some((username, amount)) => {
            let share =
                Money::parse(amount, currency).map_err(|err| AppError::Usage(err.to_string()))?;
            Ok((username.trim(), Some(share)))
        }
        None => Ok((raw.trim(), None)),
    }
}

fn usernames(ledger: &Ledger) -> BTreeMap<MemberId, &str> {
    ledger
        .members()
        .map(|member| (member.id, member.username.as_str()))
        .collect()
}

fn emit<T, F>(json: bool, value: &T, text: F) -> Result<()>
where
    T: Serialize + ?Sized,
    F: FnOnce() -> String,
{
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

#[derive(Serialize)]
struct BalanceLine<'a> {
    member: MemberId,
    username: &'a str,
    paid: Money,
    owed: Money,
    net: Money,
}

#[derive(Serialize)]
struct TransferLine<'a> {
    from: &'a str,
    to: &'a str,
    amount: Money,
}

#[derive(Serialize)]
struct TripReport<'a> {
    trip: &'a engine::Trip,
    members: Vec<&'a Member>,
    expenses: Vec<&'a Expense>,
}

impl<'a> TripReport<'a> {
    fn new(ledger: &'a Ledger) -> Self {
        Self {
            trip: ledger.trip(),
            members: ledger.members().collect(),
            expenses: ledger.expenses(true).collect(),
        }
    }

    fn to_text(&self) -> String {
        let names: BTreeMap<MemberId, &str> = self
            .members
            .iter()
            .map(|member| (member.id, member.username.as_str()))
            .collect();
        let name = |id: MemberId| names.get(&id).copied().unwrap_or("?");

        let mut lines = vec![format!(
            "trip {}: {}{} ({})",
            self.trip.code,
            self.trip.name,
            self.trip
                .place
                .as_deref()
                .map(|place| format!(", {place}"))
                .unwrap_or_default(),
            self.trip.currency
        )];
        lines.push(format!(
            "members: {}",
            self.members
                .iter()
                .map(|member| member.label())
                .collect::<Vec<_>>()
                .join(", ")
        ));
        for expense in &self.expenses {
            let state = match &expense.settlement {
                Some(mark) => format!(" [settled by {}]", mark.settled_by),
                None => String::new(),
            };
            lines.push(format!(
                "{} {} {} paid by {}{state} ({})",
                expense.occurred_at.format("%Y-%m-%d"),
                expense.description,
                expense.amount,
                name(expense.payer),
                expense.id
            ));
            for item in &expense.items {
                let assignees = item
                    .assignments
                    .iter()
                    .map(|assignment| match assignment.share {
                        Some(share) => format!("{}={share}", name(assignment.member)),
                        None => name(assignment.member).to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                let settled = if item.is_settled() { " [settled]" } else { "" };
                lines.push(format!(
                    "  - {} {} for {assignees}{settled} ({})",
                    item.name, item.amount, item.id
                ));
            }
        }
        lines.join("\n")
    }
}
