//! Structural bloat of repeated sub-elements.

use super::Tokenizer;
use serde_json::Value;
use tracing::debug;

/// Default number of doubling rounds.
pub const DEFAULT_BLOAT_ROUNDS: u32 = 8;

/// Most doubling rounds accepted. Twenty rounds already multiply the array
/// by about a million.
pub const MAX_BLOAT_ROUNDS: u32 = 20;

/// Duplicates the first non-empty JSON array of a seed geometrically.
///
/// The array is doubled `rounds` times, so an array of length `n` ends up
/// with `n * 2^rounds` elements. Everything else in the document is left
/// untouched. Seeds that are not JSON or contain no non-empty array produce
/// no candidate.
///
/// # Examples
///
/// ```rust
/// use wsfuzz::generator::{StructuralBloatTokenizer, Tokenizer};
///
/// let bloated = StructuralBloatTokenizer::new(2).tokenize(r#"{"ops":[1],"id":7}"#, &[]);
/// assert_eq!(bloated, vec![r#"{"ops":[1,1,1,1],"id":7}"#.to_string()]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct StructuralBloatTokenizer {
    rounds: u32,
}

impl StructuralBloatTokenizer {
    /// Create a tokenizer doubling the array `rounds` times, at most
    /// [`MAX_BLOAT_ROUNDS`].
    pub fn new(rounds: u32) -> Self {
        Self {
            rounds: rounds.min(MAX_BLOAT_ROUNDS),
        }
    }

    /// Number of doubling rounds.
    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    /// Return a bloated copy of `seed`, or `None` when nothing is repeatable.
    pub fn bloat(&self, seed: &Value) -> Option<Value> {
        let mut path = Vec::new();
        if !find_array(seed, &mut path) {
            return None;
        }

        let mut bloated = seed.clone();
        let mut cursor = &mut bloated;
        for key in &path {
            cursor = cursor.get_mut(key.as_str())?;
        }

        let Value::Array(items) = cursor else {
            return None;
        };
        for _ in 0..self.rounds {
            let copy = items.clone();
            items.extend(copy);
        }
        Some(bloated)
    }
}

impl Default for StructuralBloatTokenizer {
    fn default() -> Self {
        Self::new(DEFAULT_BLOAT_ROUNDS)
    }
}

impl Tokenizer for StructuralBloatTokenizer {
    fn name(&self) -> &'static str {
        "bloat"
    }

    fn tokenize(&self, seed: &str, _ignore: &[String]) -> Vec<String> {
        let Ok(parsed) = serde_json::from_str::<Value>(seed) else {
            debug!("Seed is not JSON, nothing to bloat");
            return Vec::new();
        };

        self.bloat(&parsed)
            .and_then(|value| serde_json::to_string(&value).ok())
            .into_iter()
            .collect()
    }
}

/// Depth-first search for the first non-empty array in document order.
/// Arrays are not searched inside: the outermost one wins.
fn find_array(value: &Value, path: &mut Vec<String>) -> bool {
    match value {
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => {
            for (key, child) in map {
                path.push(key.clone());
                if find_array(child, path) {
                    return true;
                }
                path.pop();
            }
            false
        },
        _ => false,
    }
}
