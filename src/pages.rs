//! Page-selection parsing: `"1-3,5,7-"` → `[1, 2, 3, 5, 7, 8, 9, 10]`.
//!
//! A selection is a comma-separated list of terms. Each term is either a
//! single 1-based page number or a range:
//!
//! | Term  | Meaning                          |
//! |-------|----------------------------------|
//! | `N`   | page `N`                         |
//! | `A-B` | pages `A` through `B` inclusive  |
//! | `A-`  | page `A` through the last page   |
//! | `-B`  | page 1 through page `B`          |
//! | `-`   | every page                       |
//!
//! Terms are validated in input order against the document's page count and
//! the first invalid term aborts the parse. Valid terms are unioned, so
//! overlaps are harmless and the result is always ascending regardless of
//! the order the terms were written in.

use crate::error::{PageSpecError, RangeBound};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

static RE_SINGLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());
static RE_RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d*)\s*-\s*(\d*)$").unwrap());

/// An ascending, duplicate-free set of 1-based page numbers.
///
/// Only [`PageSet::parse`] (and [`PageSet::all`]) construct one, so every
/// page in the set is known to exist in the document it was parsed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageSet(Vec<usize>);

impl PageSet {
    /// Parse a page-selection expression against a document of `total_pages`.
    pub fn parse(spec: &str, total_pages: usize) -> Result<Self, PageSpecError> {
        if spec.trim().is_empty() {
            return Err(PageSpecError::Empty);
        }

        let mut pages = BTreeSet::new();
        for raw in spec.split(',') {
            let term = raw.trim();
            let (start, end) = parse_term(term, spec, total_pages)?;
            pages.extend(start..=end);
        }

        Ok(Self(pages.into_iter().collect()))
    }

    /// Every page of a `total_pages` document. Empty when the document is.
    pub fn all(total_pages: usize) -> Self {
        Self((1..=total_pages).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate pages in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    pub fn contains(&self, page: usize) -> bool {
        self.position(page).is_some()
    }

    /// Offset of `page` within the set, used to address per-page result slots.
    pub fn position(&self, page: usize) -> Option<usize> {
        self.0.binary_search(&page).ok()
    }
}

impl fmt::Display for PageSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|p| p.to_string()).collect();
        write!(f, "[{}]", parts.join(","))
    }
}

impl IntoIterator for PageSet {
    type Item = usize;
    type IntoIter = std::vec::IntoIter<usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Free-function form of [`PageSet::parse`].
pub fn parse_page_spec(spec: &str, total_pages: usize) -> Result<PageSet, PageSpecError> {
    PageSet::parse(spec, total_pages)
}

/// Resolve one trimmed term to an inclusive `(start, end)` pair.
fn parse_term(term: &str, spec: &str, total: usize) -> Result<(usize, usize), PageSpecError> {
    if RE_SINGLE.is_match(term) {
        let page: usize = term.parse().map_err(|_| PageSpecError::MalformedTerm {
            term: term.to_string(),
        })?;
        if page < 1 || page > total {
            return Err(PageSpecError::OutOfRange {
                page,
                spec: spec.to_string(),
                total,
            });
        }
        return Ok((page, page));
    }

    let caps = RE_RANGE
        .captures(term)
        .ok_or_else(|| PageSpecError::MalformedTerm {
            term: term.to_string(),
        })?;

    let start = match &caps[1] {
        "" => 1,
        digits => parse_bound(digits, total, RangeBound::Start, term)?,
    };
    let end = match &caps[2] {
        "" => total,
        digits => parse_bound(digits, total, RangeBound::End, term)?,
    };

    if start > end {
        return Err(PageSpecError::ReversedRange {
            term: term.to_string(),
        });
    }

    Ok((start, end))
}

fn parse_bound(
    digits: &str,
    total: usize,
    bound: RangeBound,
    term: &str,
) -> Result<usize, PageSpecError> {
    match digits.parse::<usize>() {
        Ok(page) if page >= 1 && page <= total => Ok(page),
        _ => Err(PageSpecError::InvalidRangeBound {
            bound,
            term: term.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(spec: &str, total: usize) -> Vec<usize> {
        PageSet::parse(spec, total)
            .unwrap_or_else(|e| panic!("'{spec}' should parse: {e}"))
            .as_slice()
            .to_vec()
    }

    fn err(spec: &str, total: usize) -> PageSpecError {
        PageSet::parse(spec, total).expect_err("parse should fail")
    }

    #[test]
    fn single_page() {
        assert_eq!(pages("8", 10), vec![8]);
    }

    #[test]
    fn zero_is_out_of_range() {
        let e = err("0", 10);
        assert_eq!(
            e,
            PageSpecError::OutOfRange {
                page: 0,
                spec: "0".into(),
                total: 10
            }
        );
        assert_eq!(
            e.to_string(),
            "invalid page index: 0, from input: 0, max supported page: 10"
        );
    }

    #[test]
    fn page_past_end_is_out_of_range() {
        let e = err("3,11", 10);
        assert!(matches!(e, PageSpecError::OutOfRange { page: 11, .. }));
        assert!(e.to_string().contains("from input: 3,11"));
    }

    #[test]
    fn lists_and_ranges() {
        assert_eq!(pages("1,2", 10), vec![1, 2]);
        assert_eq!(pages("1,2,5", 10), vec![1, 2, 5]);
        assert_eq!(pages("1-3,6-8", 10), vec![1, 2, 3, 6, 7, 8]);
    }

    #[test]
    fn open_ended_ranges() {
        assert_eq!(pages("4,6-", 10), vec![4, 6, 7, 8, 9, 10]);
        assert_eq!(pages("-3", 10), vec![1, 2, 3]);
        assert_eq!(pages("-", 4), vec![1, 2, 3, 4]);
        assert_eq!(pages("10-", 10), vec![10]);
    }

    #[test]
    fn overlapping_terms_are_unioned() {
        assert_eq!(pages("4,1-6", 10), vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(pages("2-5,3-7,5", 10), vec![2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn term_order_does_not_matter() {
        assert_eq!(pages("9,1,5-6", 10), pages("5-6,9,1", 10));
        assert_eq!(pages("9,1,5-6", 10), vec![1, 5, 6, 9]);
    }

    #[test]
    fn whitespace_is_tolerated() {
        assert_eq!(pages(" 1 , 3 - 4 ,  7- ", 8), vec![1, 3, 4, 7, 8]);
    }

    #[test]
    fn reversed_range() {
        let e = err("1,2,5-3", 10);
        assert_eq!(e, PageSpecError::ReversedRange { term: "5-3".into() });
        assert_eq!(
            e.to_string(),
            "invalid page range: 5-3, start index is after ending index"
        );
    }

    #[test]
    fn malformed_term_names_first_offender() {
        let e = err("a,b,c", 10);
        assert_eq!(e.to_string(), "invalid page index or range: a");
        assert!(matches!(err("1-2-3", 10), PageSpecError::MalformedTerm { .. }));
        assert!(matches!(err("1,,2", 10), PageSpecError::MalformedTerm { .. }));
        assert!(matches!(err("+3", 10), PageSpecError::MalformedTerm { .. }));
    }

    #[test]
    fn invalid_range_bounds() {
        assert_eq!(
            err("0-3", 10),
            PageSpecError::InvalidRangeBound {
                bound: RangeBound::Start,
                term: "0-3".into()
            }
        );
        assert_eq!(
            err("3-11", 10),
            PageSpecError::InvalidRangeBound {
                bound: RangeBound::End,
                term: "3-11".into()
            }
        );
        assert_eq!(
            err("12-", 10).to_string(),
            "invalid start page range: 12-"
        );
    }

    #[test]
    fn first_invalid_term_wins() {
        // The bounds error on the first term is reported, not the later syntax error.
        assert!(matches!(
            err("0-2,zzz", 10),
            PageSpecError::InvalidRangeBound { .. }
        ));
    }

    #[test]
    fn empty_spec_is_an_error() {
        assert_eq!(err("", 10), PageSpecError::Empty);
        assert_eq!(err("   ", 10), PageSpecError::Empty);
    }

    #[test]
    fn empty_document_rejects_everything() {
        assert!(matches!(err("1", 0), PageSpecError::OutOfRange { .. }));
        assert!(matches!(err("-", 0), PageSpecError::ReversedRange { .. }));
    }

    #[test]
    fn position_addresses_slots() {
        let set = PageSet::parse("2,4,9", 10).unwrap();
        assert_eq!(set.position(2), Some(0));
        assert_eq!(set.position(9), Some(2));
        assert_eq!(set.position(3), None);
        assert!(set.contains(4));
        assert_eq!(set.to_string(), "[2,4,9]");
    }

    #[test]
    fn all_pages() {
        assert_eq!(PageSet::all(3).as_slice(), &[1, 2, 3]);
        assert!(PageSet::all(0).is_empty());
    }
}
