use std::{
    fmt,
    iter::Sum,
    ops::Add,
    sync::LazyLock,
};

use num_format::{Locale, ToFormattedString};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

macro_rules! string_id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id_newtype!(OptionId);
string_id_newtype!(CartId);

impl CartId {
    /// Element id of the container that scopes this cart's inputs and total.
    pub fn container_element_id(&self) -> String {
        format!("cart-{}", self.0)
    }
}

pub type Quantity = u32;

const MINOR_PER_MAJOR: u64 = 100;

static PRICE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9.,]+").expect("static price pattern"));

/// Non-negative monetary amount kept in hundredths so that sums are exact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    pub const fn from_major(major: u64) -> Self {
        Self(major.saturating_mul(MINOR_PER_MAJOR))
    }

    pub const fn minor_units(self) -> u64 {
        self.0
    }

    /// Parses a plain decimal such as `1234.567`, rounding half-up to hundredths.
    ///
    /// Anything after the numeric prefix is ignored, so `"12.5.1"` reads as `12.5`.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (whole, fraction) = match text.split_once('.') {
            Some((whole, rest)) => (whole, rest),
            None => (text, ""),
        };

        let whole_digits: &str = &whole[..leading_digits(whole)];
        let fraction_digits: &str = &fraction[..leading_digits(fraction)];
        if whole_digits.is_empty() && fraction_digits.is_empty() {
            return None;
        }
        if whole_digits.len() < whole.len() && !fraction_digits.is_empty() {
            // `12x.50` stops at the `x`; the fraction belongs to nothing.
            return Self::parse(whole_digits);
        }

        let whole_value: u64 = if whole_digits.is_empty() {
            0
        } else {
            whole_digits.parse().ok()?
        };

        let mut digits = fraction_digits.bytes().map(|b| u64::from(b - b'0'));
        let tenths = digits.next().unwrap_or(0);
        let hundredths = digits.next().unwrap_or(0);
        let round_up = digits.next().is_some_and(|d| d >= 5);

        let minor = whole_value
            .checked_mul(MINOR_PER_MAJOR)?
            .checked_add(tenths * 10 + hundredths + u64::from(round_up))?;
        Some(Self(minor))
    }

    /// Reads a price out of free-form cell text like `"1,234.50 (1.20)"`.
    ///
    /// The first run of digits, dots and commas wins; commas are thousands
    /// separators and are dropped.
    pub fn parse_loose(text: &str) -> Option<Self> {
        let run = PRICE_RUN.find(text)?;
        let cleaned: String = run.as_str().chars().filter(|c| *c != ',').collect();
        Self::parse(&cleaned)
    }

    pub fn times(self, quantity: Quantity) -> Self {
        Self(self.0.saturating_mul(u64::from(quantity)))
    }

    /// Grouped rendering used by total displays: `1,234` or `1,234.5`.
    pub fn display_grouped(self) -> String {
        let whole = (self.0 / MINOR_PER_MAJOR).to_formatted_string(&Locale::en);
        let minor = self.0 % MINOR_PER_MAJOR;
        if minor == 0 {
            return whole;
        }
        let fraction = format!("{minor:02}");
        format!("{whole}.{}", fraction.trim_end_matches('0'))
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / MINOR_PER_MAJOR, self.0 % MINOR_PER_MAJOR)
    }
}

fn leading_digits(text: &str) -> usize {
    text.bytes().take_while(u8::is_ascii_digit).count()
}

/// Reads the integer prefix of `text` the way form inputs are read:
/// surrounding whitespace is ignored, an optional sign is honoured, and
/// anything after the digits is dropped. Out-of-range values saturate.
pub fn parse_integer_prefix(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let digits = &rest[..leading_digits(rest)];
    if digits.is_empty() {
        return None;
    }
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// Reads a declared stock bound. `None` when the attribute is missing or has
/// no digits; negative bounds read as 0.
pub fn parse_stock(text: Option<&str>) -> Option<Quantity> {
    let value = parse_integer_prefix(text?)?;
    Some(Quantity::try_from(value.max(0)).unwrap_or(Quantity::MAX))
}

/// One quantity input as read from the page, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLineItem {
    pub option_id: OptionId,
    pub raw_quantity: String,
    pub max_stock: Quantity,
    pub unit_price: Money,
}

impl RawLineItem {
    /// Quantity as counted by the running total: unparseable or negative
    /// input contributes nothing, and stock is not enforced.
    pub fn displayed_quantity(&self) -> Quantity {
        parse_integer_prefix(&self.raw_quantity)
            .map(|q| Quantity::try_from(q.max(0)).unwrap_or(Quantity::MAX))
            .unwrap_or(0)
    }

    pub fn as_displayed(&self) -> CartLineItem {
        CartLineItem {
            option_id: self.option_id.clone(),
            quantity: self.displayed_quantity(),
            max_stock: self.max_stock,
            unit_price: self.unit_price,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLineItem {
    pub option_id: OptionId,
    pub quantity: Quantity,
    pub max_stock: Quantity,
    pub unit_price: Money,
}

impl CartLineItem {
    pub fn line_total(&self) -> Money {
        self.unit_price.times(self.quantity)
    }
}

/// Checks a raw input against `[0, max_stock]`.
pub fn validate(item: &RawLineItem) -> Result<CartLineItem, ValidationError> {
    let Some(quantity) = parse_integer_prefix(&item.raw_quantity) else {
        return Err(ValidationError::NotANumber {
            option_id: item.option_id.clone(),
            raw: item.raw_quantity.clone(),
        });
    };

    if quantity < 0 {
        return Err(ValidationError::BelowMinimum {
            option_id: item.option_id.clone(),
            quantity,
        });
    }

    if quantity > i64::from(item.max_stock) {
        return Err(ValidationError::ExceedsStock {
            option_id: item.option_id.clone(),
            quantity,
            max_stock: item.max_stock,
        });
    }

    Ok(CartLineItem {
        option_id: item.option_id.clone(),
        quantity: quantity as Quantity,
        max_stock: item.max_stock,
        unit_price: item.unit_price,
    })
}

pub fn compute_total<'a>(items: impl IntoIterator<Item = &'a CartLineItem>) -> Money {
    items.into_iter().map(CartLineItem::line_total).sum()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClampAdjustment {
    /// Value was above stock and has been lowered to it.
    LoweredToStock,
    /// Value was negative and has been raised to zero.
    RaisedToZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clamped {
    pub quantity: Quantity,
    pub adjustment: Option<ClampAdjustment>,
}

/// Pulls a raw input back into `[0, max_stock]`. Non-numeric input reads as 0.
pub fn clamp(raw_quantity: &str, max_stock: Quantity) -> Clamped {
    let value = parse_integer_prefix(raw_quantity).unwrap_or(0);
    if value > i64::from(max_stock) {
        Clamped {
            quantity: max_stock,
            adjustment: Some(ClampAdjustment::LoweredToStock),
        }
    } else if value < 0 {
        Clamped {
            quantity: 0,
            adjustment: Some(ClampAdjustment::RaisedToZero),
        }
    } else {
        Clamped {
            quantity: value as Quantity,
            adjustment: None,
        }
    }
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
