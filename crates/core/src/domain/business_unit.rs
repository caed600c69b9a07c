use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// Closed set of business units tracked by the dashboard.
///
/// Declaration order is the canonical display and folding order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusinessUnit {
    ModeloAtual,
    O2Tax,
    OxyHacker,
    Franquia,
}

impl BusinessUnit {
    pub const ALL: [BusinessUnit; 4] =
        [Self::ModeloAtual, Self::O2Tax, Self::OxyHacker, Self::Franquia];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ModeloAtual => "modelo_atual",
            Self::O2Tax => "o2_tax",
            Self::OxyHacker => "oxy_hacker",
            Self::Franquia => "franquia",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::ModeloAtual => "Modelo Atual",
            Self::O2Tax => "O2 TAX",
            Self::OxyHacker => "Oxy Hacker",
            Self::Franquia => "Franquia",
        }
    }

    pub fn index(self) -> usize {
        match self {
            Self::ModeloAtual => 0,
            Self::O2Tax => 1,
            Self::OxyHacker => 2,
            Self::Franquia => 3,
        }
    }
}

impl fmt::Display for BusinessUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BusinessUnit {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|bu| bu.as_str() == normalized)
            .ok_or_else(|| DomainError::UnknownBusinessUnit(value.to_string()))
    }
}
