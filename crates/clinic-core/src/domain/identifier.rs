use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// The subject a rate limit is counted against.
///
/// Authenticated requests are counted per user so that a patient moving
/// between networks keeps one budget; anonymous requests fall back to the
/// client IP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Identifier {
    User(Uuid),
    Ip(IpAddr),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::User(id) => write!(f, "user:{}", id),
            Identifier::Ip(addr) => write!(f, "ip:{}", addr),
        }
    }
}

impl FromStr for Identifier {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::InvalidIdentifier(s.to_string());

        match s.split_once(':') {
            Some(("user", id)) => Uuid::parse_str(id)
                .map(Identifier::User)
                .map_err(|_| invalid()),
            Some(("ip", addr)) => addr
                .parse::<IpAddr>()
                .map(Identifier::Ip)
                .map_err(|_| invalid()),
            _ => Err(invalid()),
        }
    }
}

impl TryFrom<String> for Identifier {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Identifier> for String {
    fn from(value: Identifier) -> Self {
        value.to_string()
    }
}

impl From<Uuid> for Identifier {
    fn from(id: Uuid) -> Self {
        Identifier::User(id)
    }
}

impl From<IpAddr> for Identifier {
    fn from(addr: IpAddr) -> Self {
        Identifier::Ip(addr)
    }
}
