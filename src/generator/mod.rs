//! Candidate message generation.
//!
//! Generation happens in two steps. A [`Tokenizer`] turns a seed message
//! into templates: either a copy of the seed with one span replaced by
//! [`PAYLOAD_MARKER`], or an already complete mutation. A
//! [`CandidateGenerator`] then lazily expands each template into concrete
//! fuzz messages. Both steps are pure.

mod bloat;
mod corpus;
mod quoted;

pub use bloat::{StructuralBloatTokenizer, DEFAULT_BLOAT_ROUNDS, MAX_BLOAT_ROUNDS};
pub use corpus::PayloadCorpus;
pub use quoted::QuotedStringTokenizer;

use std::fmt::Debug;
use std::sync::Arc;

/// Placeholder marking the substitution point inside a template.
///
/// NUL bytes cannot appear unescaped inside JSON text, so the marker never
/// collides with seed content.
pub const PAYLOAD_MARKER: &str = "\u{0}WSFUZZ\u{0}";

/// Turns a seed message into templates.
pub trait Tokenizer: Send + Sync + Debug {
    /// Short name used for transcript batch directories.
    fn name(&self) -> &'static str;

    /// Produce templates for `seed`. Values listed in `ignore` are never
    /// marked for substitution.
    fn tokenize(&self, seed: &str, ignore: &[String]) -> Vec<String>;
}

/// Expands a template into concrete candidate messages.
pub trait CandidateGenerator: Send + Sync + Debug {
    /// Lazily yield candidates for `template`.
    fn candidates<'a>(&'a self, template: &'a str) -> Box<dyn Iterator<Item = String> + Send + 'a>;
}

/// Substitutes every corpus payload into the marker of a template.
///
/// Double quotes inside a payload are escaped so the substituted text stays
/// inside its quoted region. Templates without a marker are already complete
/// and are yielded once, unchanged.
#[derive(Debug, Clone)]
pub struct PayloadSubstitution {
    corpus: Arc<PayloadCorpus>,
}

impl PayloadSubstitution {
    /// Create a generator over `corpus`.
    pub fn new(corpus: Arc<PayloadCorpus>) -> Self {
        Self { corpus }
    }

    /// The corpus this generator draws from.
    pub fn corpus(&self) -> &PayloadCorpus {
        &self.corpus
    }
}

impl CandidateGenerator for PayloadSubstitution {
    fn candidates<'a>(&'a self, template: &'a str) -> Box<dyn Iterator<Item = String> + Send + 'a> {
        if !template.contains(PAYLOAD_MARKER) {
            return Box::new(std::iter::once(template.to_string()));
        }

        Box::new(
            self.corpus
                .iter()
                .map(move |payload| template.replacen(PAYLOAD_MARKER, &escape_quotes(payload), 1)),
        )
    }
}

/// Escape double quotes so a payload can sit between two quote characters.
pub fn escape_quotes(payload: &str) -> String {
    payload.replace('"', "\\\"")
}

/// Quoted-substring tokenization followed by payload substitution.
///
/// Yields `located spans x corpus size` candidates; each differs from `seed`
/// only inside one located span.
///
/// # Examples
///
/// ```rust
/// use wsfuzz::generator::{substitution_candidates, PayloadCorpus};
///
/// let corpus = PayloadCorpus::new(["<script>", "' OR 1=1"]);
/// let seed = r#"{"foo": "bar", "baz": "bar"}"#;
///
/// assert_eq!(substitution_candidates(seed, &[], &corpus).count(), 4);
/// assert_eq!(substitution_candidates(seed, &["bar".to_string()], &corpus).count(), 0);
/// ```
pub fn substitution_candidates<'a>(
    seed: &str,
    ignore: &[String],
    corpus: &'a PayloadCorpus,
) -> impl Iterator<Item = String> + 'a {
    let templates = QuotedStringTokenizer.tokenize(seed, ignore);
    templates.into_iter().flat_map(move |template| {
        corpus
            .iter()
            .map(move |payload| template.replacen(PAYLOAD_MARKER, &escape_quotes(payload), 1))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn corpus() -> Arc<PayloadCorpus> {
        Arc::new(PayloadCorpus::new(["<script>", "say \"hi\""]))
    }

    #[test]
    fn substitution_escapes_quotes() {
        let generator = PayloadSubstitution::new(corpus());
        let template = format!(r#"{{"q": "{}"}}"#, PAYLOAD_MARKER);
        let out: Vec<_> = generator.candidates(&template).collect();
        assert_eq!(
            out,
            vec![
                r#"{"q": "<script>"}"#.to_string(),
                r#"{"q": "say \"hi\""}"#.to_string(),
            ]
        );
        for candidate in &out {
            assert!(serde_json::from_str::<serde_json::Value>(candidate).is_ok());
        }
    }

    #[test]
    fn complete_templates_pass_through_once() {
        let generator = PayloadSubstitution::new(corpus());
        let out: Vec<_> = generator.candidates(r#"{"xs":[1,1]}"#).collect();
        assert_eq!(out, vec![r#"{"xs":[1,1]}"#.to_string()]);
    }

    #[test]
    fn empty_corpus_yields_nothing_for_marked_templates() {
        let generator = PayloadSubstitution::new(Arc::new(PayloadCorpus::default()));
        assert_eq!(generator.candidates(PAYLOAD_MARKER).count(), 0);
    }

    #[test]
    fn candidates_differ_from_seed_in_one_span_only() {
        let corpus = PayloadCorpus::new(["PAYLOAD"]);
        let seed = r#"{"foo": "bar", "baz": "qux"}"#;
        let out: Vec<_> = substitution_candidates(seed, &[], &corpus).collect();
        assert_eq!(
            out,
            vec![
                r#"{"foo": "PAYLOAD", "baz": "qux"}"#.to_string(),
                r#"{"foo": "bar", "baz": "PAYLOAD"}"#.to_string(),
            ]
        );
    }
}
