//! Validated three-digit codes used as secrets and guesses.

use derive_more::{Display, Error};
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::instrument;

/// Number of digits in every secret and guess.
pub const CODE_LENGTH: usize = 3;

/// A three-digit decimal code.
///
/// Holds digit values (0-9), not ASCII bytes. Construct with [`Code::parse`]
/// when repeated digits are acceptable, or [`Code::parse_distinct`] when all
/// three digits must differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code([u8; CODE_LENGTH]);

impl Code {
    /// Parses a string of exactly three decimal digits. Repeats are allowed.
    ///
    /// # Errors
    ///
    /// Returns [`CodeError`] if the input is not exactly three ASCII digits.
    #[instrument(level = "trace")]
    pub fn parse(raw: &str) -> Result<Self, CodeError> {
        let bytes = raw.as_bytes();
        if bytes.len() != CODE_LENGTH || !bytes.iter().all(u8::is_ascii_digit) {
            return Err(CodeError::new(format!(
                "'{}' must be exactly {} digits",
                raw, CODE_LENGTH
            )));
        }

        let mut digits = [0u8; CODE_LENGTH];
        for (slot, byte) in digits.iter_mut().zip(bytes) {
            *slot = byte - b'0';
        }
        Ok(Self(digits))
    }

    /// Parses a string of exactly three pairwise-distinct decimal digits.
    ///
    /// # Errors
    ///
    /// Returns [`CodeError`] if the shape is wrong or any digit repeats.
    #[instrument(level = "trace")]
    pub fn parse_distinct(raw: &str) -> Result<Self, CodeError> {
        let code = Self::parse(raw)?;
        if !code.has_distinct_digits() {
            return Err(CodeError::new(format!("'{}' must not repeat digits", raw)));
        }
        Ok(code)
    }

    /// Returns the digit values.
    pub fn digits(&self) -> &[u8; CODE_LENGTH] {
        &self.0
    }

    /// Whether all three digits differ.
    pub fn has_distinct_digits(&self) -> bool {
        let [a, b, c] = self.0;
        a != b && b != c && a != c
    }
}

impl std::fmt::Display for Code {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for digit in self.0 {
            write!(f, "{}", digit)?;
        }
        Ok(())
    }
}

impl std::str::FromStr for Code {
    type Err = CodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Code {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Code {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Generates a random secret with distinct digits and a non-zero first digit.
#[instrument]
pub fn generate_secret() -> Code {
    let mut rng = rand::thread_rng();
    let mut pool: Vec<u8> = (0..10).collect();
    pool.shuffle(&mut rng);

    if pool[0] == 0 {
        let swap_with = rng.gen_range(1..pool.len());
        pool.swap(0, swap_with);
    }

    Code([pool[0], pool[1], pool[2]])
}

/// Malformed code input.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
#[display("Invalid code: {}", message)]
pub struct CodeError {
    /// What was wrong with the input.
    pub message: String,
}

impl CodeError {
    /// Creates a new code error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
