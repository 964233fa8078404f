//! Property-based tests for the response classifier.

use proptest::prelude::*;
use wsfuzz::classifier::{classify, is_relevant, Category};

fn arb_keyword() -> impl Strategy<Value = &'static str> {
    let all: Vec<&'static str> = Category::ALL
        .iter()
        .flat_map(|category| category.keywords().iter().copied())
        .collect();
    prop::sample::select(all)
}

fn flip_case(text: &str, mask: u64) -> String {
    text.chars()
        .enumerate()
        .map(|(i, c)| {
            if mask >> (i % 64) & 1 == 1 {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect()
}

proptest! {
    #[test]
    fn property_ignore_always_wins(
        keyword in arb_keyword(),
        ignore in "[a-z]{3,12}",
        prefix in "[ -~]{0,30}",
        case_sensitive in any::<bool>(),
    ) {
        let response = format!("{}{} {}", prefix, keyword, ignore);
        prop_assert!(!is_relevant(&response, &[ignore], case_sensitive));
    }

    #[test]
    fn property_keyword_in_any_case_is_relevant(
        keyword in arb_keyword(),
        mask in any::<u64>(),
        prefix in "[0-9 ]{0,20}",
        suffix in "[0-9 ]{0,20}",
    ) {
        let response = format!("{}{}{}", prefix, flip_case(keyword, mask), suffix);
        prop_assert!(is_relevant::<&str>(&response, &[], false));
    }

    #[test]
    fn property_reported_needle_is_in_response(response in "[ -~]{0,200}") {
        if let Some(hit) = classify::<&str>(&response, &[], false) {
            prop_assert!(response.to_lowercase().contains(&hit.needle.to_lowercase()));
        }
    }

    #[test]
    fn property_never_panics(response in ".*", ignore in prop::collection::vec(".*", 0..4)) {
        let _ = is_relevant(&response, &ignore, false);
        let _ = is_relevant(&response, &ignore, true);
    }
}
