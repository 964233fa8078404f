#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use serde_json::{json, Value};
use std::sync::Arc;
use wsfuzz::generator::{
    CandidateGenerator, PayloadCorpus, PayloadSubstitution, QuotedStringTokenizer,
    StructuralBloatTokenizer, Tokenizer, PAYLOAD_MARKER,
};

#[derive(Debug, Arbitrary)]
struct TokenizerInput {
    seed: FuzzSeed,
    ignore: Vec<String>,
    payload: String,
    rounds: u8,
}

#[derive(Debug, Arbitrary)]
enum FuzzSeed {
    Text(String),
    Json(FuzzValue),
}

#[derive(Debug, Arbitrary)]
enum FuzzValue {
    Null,
    Bool(bool),
    Number(i64),
    String(String),
    Array(Vec<FuzzValue>),
    Object(Vec<(String, FuzzValue)>),
}

impl FuzzValue {
    fn to_json(&self) -> Value {
        match self {
            FuzzValue::Null => Value::Null,
            FuzzValue::Bool(b) => Value::Bool(*b),
            FuzzValue::Number(n) => json!(n),
            FuzzValue::String(s) => Value::String(s.clone()),
            FuzzValue::Array(items) => Value::Array(items.iter().map(FuzzValue::to_json).collect()),
            FuzzValue::Object(members) => Value::Object(
                members
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

fuzz_target!(|input: TokenizerInput| {
    let seed = match &input.seed {
        FuzzSeed::Text(text) => text.clone(),
        FuzzSeed::Json(value) => value.to_json().to_string(),
    };

    let templates = QuotedStringTokenizer.tokenize(&seed, &input.ignore);
    let generator = PayloadSubstitution::new(Arc::new(PayloadCorpus::new([input.payload])));
    for template in &templates {
        assert!(template.contains(PAYLOAD_MARKER));
        for candidate in generator.candidates(template) {
            let _ = candidate.len();
        }
    }

    // Few rounds keep the bloated value small enough for the fuzzer.
    let bloat = StructuralBloatTokenizer::new(u32::from(input.rounds % 4));
    for bloated in bloat.tokenize(&seed, &input.ignore) {
        assert!(serde_json::from_str::<Value>(&bloated).is_ok());
    }
});
