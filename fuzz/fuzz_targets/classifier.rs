#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use wsfuzz::classifier::{classify, is_relevant};

#[derive(Debug, Arbitrary)]
struct ClassifierInput {
    response: String,
    ignored: Vec<String>,
    case_sensitive: bool,
}

fuzz_target!(|input: ClassifierInput| {
    let ClassifierInput {
        response,
        ignored,
        case_sensitive,
    } = input;

    let relevant = is_relevant(&response, &ignored, case_sensitive);
    let hit = classify(&response, &ignored, case_sensitive);
    assert_eq!(relevant, hit.is_some());

    // A non-empty ignore entry taken from the response always suppresses it.
    if let Some(fragment) = response.get(..response.len().min(8)) {
        if !fragment.is_empty() && (case_sensitive || fragment.is_ascii()) {
            assert!(!is_relevant(&response, &[fragment], case_sensitive));
        }
    }
});
