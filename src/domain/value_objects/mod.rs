//! Value Objects for the back office

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Authenticated subject id resolved from a bearer credential.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallerId(String);

impl CallerId {
    pub fn new(value: impl Into<String>) -> Result<Self, CallerIdError> {
        let value = value.into().trim().to_string();
        if value.is_empty() { return Err(CallerIdError::Empty); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CallerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone)] pub enum CallerIdError { Empty }
impl std::error::Error for CallerIdError {}
impl fmt::Display for CallerIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Caller id empty") }
}

/// Period-over-period change, both as a number and as the label shown on the dashboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PercentChange { pub raw: Decimal, pub formatted: String }

impl PercentChange {
    /// `(current - previous) / previous * 100`, with a previous value of zero
    /// counting as a full +100% when anything happened this period.
    pub fn between(current: Decimal, previous: Decimal) -> Self {
        if previous.is_zero() {
            return if current > Decimal::ZERO {
                Self { raw: Decimal::ONE_HUNDRED, formatted: "+100%".to_string() }
            } else {
                Self { raw: Decimal::ZERO, formatted: "0%".to_string() }
            };
        }
        let raw = (current - previous) / previous * Decimal::ONE_HUNDRED;
        let mut shown = raw.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        shown.rescale(2);
        let sign = if raw > Decimal::ZERO { "+" } else { "" };
        Self { raw, formatted: format!("{sign}{shown}%") }
    }
}
