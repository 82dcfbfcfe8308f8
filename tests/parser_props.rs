//! Property-based tests for page-selection parsing.
//!
//! Valid selections are generated as lists of terms that stay inside the
//! document, so every generated input must parse; the result is then checked
//! against a naive reference expansion.

use edgequake_pdf2img::{PageSet, PageSpecError};
use proptest::prelude::*;
use std::collections::BTreeSet;

/// One term and the pages it denotes, for a document of `total` pages.
fn term_strategy(total: usize) -> impl Strategy<Value = (String, Vec<usize>)> {
    prop_oneof![
        (1..=total).prop_map(|n| (n.to_string(), vec![n])),
        (1..=total, 1..=total).prop_map(move |(a, b)| {
            let (a, b) = (a.min(b), a.max(b));
            (format!("{a}-{b}"), (a..=b).collect())
        }),
        (1..=total).prop_map(move |a| (format!("{a}-"), (a..=total).collect())),
        (1..=total).prop_map(|b| (format!("-{b}"), (1..=b).collect())),
        Just(("-".to_string(), (1..=total).collect())),
    ]
}

fn selection_strategy() -> impl Strategy<Value = (usize, String, BTreeSet<usize>)> {
    (1usize..60).prop_flat_map(|total| {
        (
            Just(total),
            prop::collection::vec(term_strategy(total), 1..8),
            prop::collection::vec(" {0,2}", 8),
        )
            .prop_map(|(total, terms, pads)| {
                let spec = terms
                    .iter()
                    .zip(pads.iter().cycle())
                    .map(|((t, _), pad)| format!("{pad}{t}{pad}"))
                    .collect::<Vec<_>>()
                    .join(",");
                let expected = terms.into_iter().flat_map(|(_, p)| p).collect();
                (total, spec, expected)
            })
    })
}

proptest! {
    #[test]
    fn valid_selections_match_reference((total, spec, expected) in selection_strategy()) {
        let set = PageSet::parse(&spec, total).unwrap();
        let pages: Vec<usize> = set.iter().collect();
        let expected: Vec<usize> = expected.into_iter().collect();
        prop_assert_eq!(pages, expected);
    }

    #[test]
    fn output_is_strictly_ascending_and_in_range(spec in "[0-9, -]{0,24}", total in 0usize..40) {
        if let Ok(set) = PageSet::parse(&spec, total) {
            let pages = set.as_slice();
            prop_assert!(!pages.is_empty());
            prop_assert!(pages.windows(2).all(|w| w[0] < w[1]));
            prop_assert!(pages.iter().all(|&p| p >= 1 && p <= total));
        }
    }

    #[test]
    fn parsing_is_deterministic(spec in "[0-9a-z, -]{0,24}", total in 0usize..40) {
        prop_assert_eq!(PageSet::parse(&spec, total), PageSet::parse(&spec, total));
    }

    #[test]
    fn term_order_is_irrelevant((total, spec, _) in selection_strategy()) {
        let mut terms: Vec<&str> = spec.split(',').collect();
        terms.reverse();
        let reversed = terms.join(",");
        prop_assert_eq!(PageSet::parse(&spec, total), PageSet::parse(&reversed, total));
    }

    #[test]
    fn pages_past_the_end_are_rejected(total in 1usize..100, extra in 1usize..50) {
        let spec = (total + extra).to_string();
        let is_out_of_range = matches!(
            PageSet::parse(&spec, total),
            Err(PageSpecError::OutOfRange { .. })
        );
        prop_assert!(is_out_of_range);
    }
}
