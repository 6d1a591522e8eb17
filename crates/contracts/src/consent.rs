//! Consent purposes and per-call consent snapshot

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ContractError;

/// Consent purpose a user may grant or withhold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsentPurpose {
    Necessary,
    Measurement,
    Marketing,
    Functionality,
    Experience,
}

impl ConsentPurpose {
    /// All purposes, in declaration order
    pub const ALL: [ConsentPurpose; 5] = [
        Self::Necessary,
        Self::Measurement,
        Self::Marketing,
        Self::Functionality,
        Self::Experience,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Necessary => "necessary",
            Self::Measurement => "measurement",
            Self::Marketing => "marketing",
            Self::Functionality => "functionality",
            Self::Experience => "experience",
        }
    }
}

impl fmt::Display for ConsentPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsentPurpose {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ContractError::config_parse(format!("unknown consent purpose '{s}'")))
    }
}

/// Consent snapshot supplied once per processing call
///
/// Missing purposes deserialize as withheld.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsentState {
    pub necessary: bool,
    pub measurement: bool,
    pub marketing: bool,
    pub functionality: bool,
    pub experience: bool,
}

impl ConsentState {
    /// Every purpose granted
    pub fn all_granted() -> Self {
        Self {
            necessary: true,
            measurement: true,
            marketing: true,
            functionality: true,
            experience: true,
        }
    }

    /// Only the `necessary` purpose granted
    pub fn necessary_only() -> Self {
        Self {
            necessary: true,
            ..Self::default()
        }
    }

    pub fn is_granted(&self, purpose: ConsentPurpose) -> bool {
        match purpose {
            ConsentPurpose::Necessary => self.necessary,
            ConsentPurpose::Measurement => self.measurement,
            ConsentPurpose::Marketing => self.marketing,
            ConsentPurpose::Functionality => self.functionality,
            ConsentPurpose::Experience => self.experience,
        }
    }

    /// True when every purpose in `required` is granted (vacuously true for an empty list)
    pub fn satisfies(&self, required: &[ConsentPurpose]) -> bool {
        required.iter().all(|p| self.is_granted(*p))
    }

    /// Builder-style toggle for a single purpose
    pub fn with(mut self, purpose: ConsentPurpose, granted: bool) -> Self {
        match purpose {
            ConsentPurpose::Necessary => self.necessary = granted,
            ConsentPurpose::Measurement => self.measurement = granted,
            ConsentPurpose::Marketing => self.marketing = granted,
            ConsentPurpose::Functionality => self.functionality = granted,
            ConsentPurpose::Experience => self.experience = granted,
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satisfies_empty_requirements() {
        assert!(ConsentState::default().satisfies(&[]));
    }

    #[test]
    fn test_satisfies_requires_all_purposes() {
        let state = ConsentState::necessary_only().with(ConsentPurpose::Measurement, true);
        assert!(state.satisfies(&[ConsentPurpose::Necessary, ConsentPurpose::Measurement]));
        assert!(!state.satisfies(&[ConsentPurpose::Measurement, ConsentPurpose::Marketing]));
    }

    #[test]
    fn test_purpose_from_str() {
        assert_eq!(
            "Marketing".parse::<ConsentPurpose>().unwrap(),
            ConsentPurpose::Marketing
        );
        assert!("analytics".parse::<ConsentPurpose>().is_err());
    }

    #[test]
    fn test_partial_state_deserializes_as_withheld() {
        let state: ConsentState = serde_json::from_str(r#"{"measurement": true}"#).unwrap();
        assert!(state.measurement);
        assert!(!state.necessary);
        assert!(!state.marketing);
    }
}
