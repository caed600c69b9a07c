use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Calendar month. Ordering follows the calendar.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Month {
    Jan,
    Fev,
    Mar,
    Abr,
    Mai,
    Jun,
    Jul,
    Ago,
    Set,
    Out,
    Nov,
    Dez,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Self::Jan,
        Self::Fev,
        Self::Mar,
        Self::Abr,
        Self::Mai,
        Self::Jun,
        Self::Jul,
        Self::Ago,
        Self::Set,
        Self::Out,
        Self::Nov,
        Self::Dez,
    ];

    /// 1-based calendar number.
    pub fn number(self) -> u8 {
        self.index() as u8 + 1
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1..=12 => Some(Self::ALL[usize::from(number) - 1]),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Jan => "jan",
            Self::Fev => "fev",
            Self::Mar => "mar",
            Self::Abr => "abr",
            Self::Mai => "mai",
            Self::Jun => "jun",
            Self::Jul => "jul",
            Self::Ago => "ago",
            Self::Set => "set",
            Self::Out => "out",
            Self::Nov => "nov",
            Self::Dez => "dez",
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accepts the short key (`jan`, `fev`, ...) or the calendar number (`1`..`12`).
impl FromStr for Month {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        if let Ok(number) = normalized.parse::<u8>() {
            return Self::from_number(number)
                .ok_or_else(|| DomainError::UnknownMonth(value.to_string()));
        }

        Self::ALL
            .into_iter()
            .find(|month| month.as_str() == normalized)
            .ok_or_else(|| DomainError::UnknownMonth(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::Month;

    #[test]
    fn numbers_cover_the_calendar() {
        assert_eq!(Month::Jan.number(), 1);
        assert_eq!(Month::Dez.number(), 12);
        assert_eq!(Month::from_number(3), Some(Month::Mar));
        assert_eq!(Month::from_number(0), None);
        assert_eq!(Month::from_number(13), None);
    }

    #[test]
    fn parses_keys_and_numbers() {
        assert_eq!("abr".parse::<Month>(), Ok(Month::Abr));
        assert_eq!("AGO".parse::<Month>(), Ok(Month::Ago));
        assert_eq!("12".parse::<Month>(), Ok(Month::Dez));
        assert!("13".parse::<Month>().is_err());
        assert!("january".parse::<Month>().is_err());
    }

    #[test]
    fn all_is_in_calendar_order() {
        for (position, month) in Month::ALL.into_iter().enumerate() {
            assert_eq!(month.index(), position);
        }
    }
}
