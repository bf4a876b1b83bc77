use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A rate-limited category of clinic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Login,
    Registration,
    Messaging,
    Booking,
    Payment,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Login,
        Action::Registration,
        Action::Messaging,
        Action::Booking,
        Action::Payment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Login => "login",
            Action::Registration => "registration",
            Action::Messaging => "messaging",
            Action::Booking => "booking",
            Action::Payment => "payment",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::UnknownAction(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Booking".parse::<Action>().unwrap(), Action::Booking);
        assert_eq!("payment".parse::<Action>().unwrap(), Action::Payment);
    }

    #[test]
    fn test_parse_unknown_action() {
        let err = "invoice".parse::<Action>().unwrap_err();
        assert!(matches!(err, DomainError::UnknownAction(ref a) if a == "invoice"));
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Action::Registration).unwrap();
        assert_eq!(json, "\"registration\"");

        let action: Action = serde_json::from_str("\"messaging\"").unwrap();
        assert_eq!(action, Action::Messaging);
    }
}
