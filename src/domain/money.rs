use {
    super::error::PipelineError,
    serde::{Serialize, Serializer},
    std::fmt,
};

/// Non-negative amount in minor units (cents).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct MoneyAmount(i64);

impl MoneyAmount {
    pub const ZERO: MoneyAmount = MoneyAmount(0);

    pub fn new(cents: i64) -> Result<Self, PipelineError> {
        if cents < 0 {
            return Err(PipelineError::Validation(format!(
                "MoneyAmount cannot be negative, got: {cents}"
            )));
        }
        Ok(Self(cents))
    }

    /// Parses a provider decimal string (`"49.99"`, `"5"`, `"0.5"`) exactly.
    pub fn parse_decimal(raw: &str) -> Result<Self, PipelineError> {
        let raw = raw.trim();
        let invalid = || PipelineError::Validation(format!("invalid decimal amount: {raw:?}"));

        let (whole, frac) = match raw.split_once('.') {
            Some((w, f)) => (w, f),
            None => (raw, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid());
        }
        if frac.len() > 2 && frac[2..].chars().any(|c| c != '0') {
            return Err(PipelineError::Validation(format!(
                "amount has sub-cent precision: {raw}"
            )));
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut frac_digits: String = frac.chars().take(2).collect();
        while frac_digits.len() < 2 {
            frac_digits.push('0');
        }
        let frac: i64 = frac_digits.parse().map_err(|_| invalid())?;

        whole
            .checked_mul(100)
            .and_then(|w| w.checked_add(frac))
            .map(MoneyAmount)
            .ok_or_else(|| PipelineError::Validation(format!("amount overflows: {raw}")))
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn checked_add(self, other: MoneyAmount) -> Option<MoneyAmount> {
        self.0.checked_add(other.0).map(MoneyAmount)
    }

    pub fn saturating_add(self, other: MoneyAmount) -> MoneyAmount {
        MoneyAmount(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for MoneyAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for MoneyAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// ISO-4217 style currency code, upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<&str> for Currency {
    type Error = PipelineError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let code = s.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(PipelineError::Validation(format!(
                "unknown currency: {code}"
            )));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }
}
