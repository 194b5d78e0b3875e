//! At-most-once notification tracking for postings.

use std::collections::HashSet;

use common::Posting;
use tracing::debug;

/// Posting identifiers that already produced a notification.
///
/// Insert-only and process-lifetime: a restart forgets everything, so
/// postings still inside the lookback window are announced again.
#[derive(Debug, Default)]
pub struct SeenPostings {
    ids: HashSet<String>,
}

impl SeenPostings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.ids.contains(identifier)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Keep postings never seen before, marking them seen as they pass.
///
/// Postings without an identifier are dropped. Order is preserved.
pub fn filter_new<I>(postings: I, seen: &mut SeenPostings) -> Vec<Posting>
where
    I: IntoIterator<Item = Posting>,
{
    postings
        .into_iter()
        .filter(|posting| match posting.id() {
            Some(id) => seen.ids.insert(id.to_string()),
            None => {
                debug!("dropping posting without identifier");
                false
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posting(id: Option<&str>) -> Posting {
        Posting {
            identifier: id.map(str::to_string),
            order_number: None,
            status: Some("awaiting_packaging".into()),
            lines: Vec::new(),
        }
    }

    fn ids(postings: &[Posting]) -> Vec<&str> {
        postings.iter().filter_map(|p| p.id()).collect()
    }

    #[test]
    fn test_at_most_once_across_cycles() {
        let mut seen = SeenPostings::new();

        let first = filter_new(vec![posting(Some("P1")), posting(Some("P2"))], &mut seen);
        assert_eq!(ids(&first), vec!["P1", "P2"]);

        let second = filter_new(
            vec![posting(Some("P2")), posting(Some("P3")), posting(Some("P1"))],
            &mut seen,
        );
        assert_eq!(ids(&second), vec!["P3"]);
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_duplicates_within_one_batch() {
        let mut seen = SeenPostings::new();
        let out = filter_new(
            vec![posting(Some("P1")), posting(Some("P1")), posting(Some("P4"))],
            &mut seen,
        );
        assert_eq!(ids(&out), vec!["P1", "P4"]);
    }

    #[test]
    fn test_missing_identifier_dropped() {
        let mut seen = SeenPostings::new();
        let out = filter_new(vec![posting(None), posting(Some("  "))], &mut seen);
        assert!(out.is_empty());
        assert!(seen.is_empty());
    }

    #[test]
    fn test_empty_batch() {
        let mut seen = SeenPostings::new();
        assert!(filter_new(Vec::new(), &mut seen).is_empty());
    }
}
