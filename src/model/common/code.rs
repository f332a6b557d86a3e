use std::fmt::{Display, Formatter};
use std::str::FromStr;

use rand::distributions::{Distribution, Uniform};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of decimal digits in a one-time code.
pub const CODE_LENGTH: usize = 6;

const MIN_CODE: u32 = 100_000;
const MAX_CODE: u32 = 999_999;

/// A voter's one-time code: the redemption secret that grants access to
/// exactly one ballot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OneTimeCode(String);

impl OneTimeCode {
    /// Generate a random code with no leading zero.
    pub fn random() -> Self {
        let dist = Uniform::from(MIN_CODE..=MAX_CODE);
        Self(dist.sample(&mut rand::thread_rng()).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for OneTimeCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for OneTimeCode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() != CODE_LENGTH {
            return Err(ParseError::InvalidLength(trimmed.len()));
        }
        if let Some(c) = trimmed.chars().find(|c| !c.is_ascii_digit()) {
            return Err(ParseError::InvalidChar(c));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for OneTimeCode {
    type Error = ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OneTimeCode> for String {
    fn from(code: OneTimeCode) -> Self {
        code.0
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("code must contain exactly 6 characters, found {0}")]
    InvalidLength(usize),
    #[error("code must contain only digits, found '{0}'")]
    InvalidChar(char),
}
