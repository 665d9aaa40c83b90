//! Scoring a guess against a secret.

use super::code::{CODE_LENGTH, Code};
use serde::{Deserialize, Serialize};
use tracing::instrument;

/// Result of comparing a guess with a secret.
///
/// Serialized with the `plus`/`minus` names the browser client expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Score {
    /// Digits in the right position (bulls).
    #[serde(rename = "plus")]
    pub exact_matches: u8,
    /// Digits present elsewhere in the secret (cows).
    #[serde(rename = "minus")]
    pub value_matches: u8,
}

impl Score {
    /// Whether the guess reproduced the secret.
    pub fn is_win(&self) -> bool {
        usize::from(self.exact_matches) == CODE_LENGTH
    }
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "+{} / -{}", self.exact_matches, self.value_matches)
    }
}

/// Scores raw strings, returning `None` when either is not three digits.
#[instrument(level = "debug")]
pub fn evaluate(secret: &str, guess: &str) -> Option<Score> {
    let secret = Code::parse(secret).ok()?;
    let guess = Code::parse(guess).ok()?;
    Some(score(&secret, &guess))
}

/// Scores a guess against a secret.
///
/// Exact matches consume their secret position first. Each remaining guess
/// digit then claims the leftmost unconsumed secret position holding the same
/// digit, so a single secret occurrence is never counted twice.
pub fn score(secret: &Code, guess: &Code) -> Score {
    let secret = secret.digits();
    let guess = guess.digits();
    let mut consumed = [false; CODE_LENGTH];

    let mut exact_matches = 0;
    for i in 0..CODE_LENGTH {
        if guess[i] == secret[i] {
            exact_matches += 1;
            consumed[i] = true;
        }
    }

    let mut value_matches = 0;
    for i in 0..CODE_LENGTH {
        if guess[i] == secret[i] {
            continue;
        }
        let hit = (0..CODE_LENGTH).find(|&j| !consumed[j] && secret[j] == guess[i]);
        if let Some(j) = hit {
            consumed[j] = true;
            value_matches += 1;
        }
    }

    Score {
        exact_matches,
        value_matches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code(raw: &str) -> Code {
        Code::parse(raw).unwrap()
    }

    #[test]
    fn test_no_overlap() {
        let s = score(&code("135"), &code("246"));
        assert_eq!((s.exact_matches, s.value_matches), (0, 0));
    }

    #[test]
    fn test_all_digits_shuffled() {
        let s = score(&code("135"), &code("351"));
        assert_eq!((s.exact_matches, s.value_matches), (0, 3));
    }

    #[test]
    fn test_exact_win() {
        let s = score(&code("135"), &code("135"));
        assert!(s.is_win());
        assert_eq!(s.value_matches, 0);
    }

    #[test]
    fn test_repeated_digit_counted_once() {
        let s = score(&code("112"), &code("121"));
        assert_eq!((s.exact_matches, s.value_matches), (1, 2));

        // Only one '1' in the secret: the two extra '1's in the guess can't both match.
        let s = score(&code("123"), &code("111"));
        assert_eq!((s.exact_matches, s.value_matches), (1, 0));

        let s = score(&code("100"), &code("011"));
        assert_eq!((s.exact_matches, s.value_matches), (0, 2));
    }

    #[test]
    fn test_evaluate_signals_invalid_input() {
        assert_eq!(evaluate("12", "123"), None);
        assert_eq!(evaluate("123", "12x"), None);
        assert!(evaluate("123", "321").is_some());
    }
}
