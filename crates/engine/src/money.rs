use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

use crate::{Currency, EngineError, ResultEngine};

/// Signed money amount represented as an **integer count of minor units**
/// tagged with its [`Currency`].
///
/// Use this type for **all** monetary values in the engine (expense totals,
/// item amounts, shares, balances, transfers) to avoid floating-point drift.
///
/// Arithmetic is checked: mixing currencies fails with
/// [`EngineError::CurrencyMismatch`] and overflow fails with
/// [`EngineError::InvalidAmount`].
///
/// # Examples
///
/// ```rust
/// use engine::{Currency, Money};
///
/// let amount = Money::new(12_34, Currency::Eur);
/// assert_eq!(amount.minor(), 1234);
/// assert_eq!(amount.to_string(), "12.34 EUR");
/// ```
///
/// Splitting never loses a cent; the residual goes to the first parts:
///
/// ```rust
/// use engine::{Currency, Money};
///
/// let shares = Money::new(301, Currency::Eur).split(3).unwrap();
/// let minors: Vec<i64> = shares.iter().map(|m| m.minor()).collect();
/// assert_eq!(minors, vec![101, 100, 100]);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    minor: i64,
    currency: Currency,
}

impl Money {
    /// Creates a new amount from integer minor units.
    #[must_use]
    pub const fn new(minor: i64, currency: Currency) -> Self {
        Self { minor, currency }
    }

    #[must_use]
    pub const fn zero(currency: Currency) -> Self {
        Self::new(0, currency)
    }

    /// Returns the raw value in minor units.
    #[must_use]
    pub const fn minor(self) -> i64 {
        self.minor
    }

    #[must_use]
    pub const fn currency(self) -> Currency {
        self.currency
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.minor == 0
    }

    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.minor > 0
    }

    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.minor < 0
    }

    /// Checked negation. Fails for `i64::MIN` minor units.
    pub fn checked_neg(self) -> ResultEngine<Money> {
        self.minor
            .checked_neg()
            .map(|minor| Money::new(minor, self.currency))
            .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))
    }

    /// Checked absolute value, keeping the currency.
    pub fn checked_abs(self) -> ResultEngine<Money> {
        if self.is_negative() {
            self.checked_neg()
        } else {
            Ok(self)
        }
    }

    fn ensure_same_currency(self, rhs: Money) -> ResultEngine<()> {
        if self.currency != rhs.currency {
            return Err(EngineError::CurrencyMismatch(format!(
                "cannot combine {} with {}",
                self.currency.code(),
                rhs.currency.code()
            )));
        }
        Ok(())
    }

    /// Checked addition.
    pub fn checked_add(self, rhs: Money) -> ResultEngine<Money> {
        self.ensure_same_currency(rhs)?;
        self.minor
            .checked_add(rhs.minor)
            .map(|minor| Money::new(minor, self.currency))
            .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))
    }

    /// Checked subtraction.
    pub fn checked_sub(self, rhs: Money) -> ResultEngine<Money> {
        self.ensure_same_currency(rhs)?;
        self.minor
            .checked_sub(rhs.minor)
            .map(|minor| Money::new(minor, self.currency))
            .ok_or_else(|| EngineError::InvalidAmount("amount too large".to_string()))
    }

    /// Sums amounts of one currency. An empty iterator yields zero.
    pub fn try_sum<I>(currency: Currency, amounts: I) -> ResultEngine<Money>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(currency), Money::checked_add)
    }

    /// Splits the amount into `parts` near-equal shares.
    ///
    /// Every share is `minor / parts` (truncated towards zero); the residual
    /// `minor % parts` is handed out one minor unit at a time to the first
    /// shares, so the shares always sum to exactly `self`.
    pub fn split(self, parts: usize) -> ResultEngine<Vec<Money>> {
        if parts == 0 {
            return Err(EngineError::InvalidSplit(
                "cannot split an amount into zero parts".to_string(),
            ));
        }
        let divisor = i64::try_from(parts)
            .map_err(|_| EngineError::InvalidSplit(format!("too many parts: {parts}")))?;

        let base = self.minor / divisor;
        let residual = self.minor % divisor;
        let step = residual.signum();
        let bumped = residual.unsigned_abs() as usize;

        Ok((0..parts)
            .map(|index| {
                let extra = if index < bumped { step } else { 0 };
                Money::new(base + extra, self.currency)
            })
            .collect())
    }

    /// Parses a decimal string into minor units of `currency`.
    ///
    /// Accepts `.` or `,` as decimal separator and an optional leading `+`/`-`.
    ///
    /// Validation rules:
    /// - at most `currency.minor_units()` fractional digits (rejects `12.345` for EUR)
    /// - rejects empty/invalid strings
    pub fn parse(input: &str, currency: Currency) -> ResultEngine<Money> {
        let empty = || EngineError::InvalidAmount("empty amount".to_string());
        let invalid = || EngineError::InvalidAmount(format!("invalid amount: {input}"));
        let overflow = || EngineError::InvalidAmount("amount too large".to_string());

        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(empty());
        }

        let (negative, rest) = if let Some(stripped) = trimmed.strip_prefix('-') {
            (true, stripped)
        } else if let Some(stripped) = trimmed.strip_prefix('+') {
            (false, stripped)
        } else {
            (false, trimmed)
        };

        let rest = rest.trim();
        if rest.is_empty() {
            return Err(empty());
        }

        let rest = rest.replace(',', ".");
        let mut parts = rest.split('.');
        let major_str = parts.next().ok_or_else(invalid)?;
        let fraction_str = parts.next();

        if parts.next().is_some() {
            return Err(invalid());
        }

        if major_str.is_empty() || !major_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let major: i64 = major_str.parse().map_err(|_| invalid())?;

        let digits = usize::from(currency.minor_units());
        let fraction: i64 = match fraction_str {
            None | Some("") => 0,
            Some(frac) => {
                if !frac.chars().all(|c| c.is_ascii_digit()) {
                    return Err(invalid());
                }
                if frac.len() > digits {
                    return Err(EngineError::InvalidAmount(format!(
                        "too many decimals for {}",
                        currency.code()
                    )));
                }
                let padded = format!("{frac:0<digits$}");
                padded.parse::<i64>().map_err(|_| invalid())?
            }
        };

        let total = major
            .checked_mul(currency.minor_per_major())
            .and_then(|v| v.checked_add(fraction))
            .ok_or_else(overflow)?;

        let signed = if negative {
            total.checked_neg().ok_or_else(overflow)?
        } else {
            total
        };

        Ok(Money::new(signed, currency))
    }
}

impl PartialOrd for Money {
    /// Amounts in different currencies are not comparable.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        (self.currency == other.currency).then(|| self.minor.cmp(&other.minor))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.minor < 0 { "-" } else { "" };
        let abs = self.minor.unsigned_abs();
        let code = self.currency.code();
        let digits = usize::from(self.currency.minor_units());
        if digits == 0 {
            return write!(f, "{sign}{abs} {code}");
        }
        let per_major = self.currency.minor_per_major().unsigned_abs();
        let major = abs / per_major;
        let fraction = abs % per_major;
        write!(f, "{sign}{major}.{fraction:0digits$} {code}")
    }
}
