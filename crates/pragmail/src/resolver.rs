//! Latest-message resolution.
//!
//! IMAP SEARCH can filter by sender and by date, but it cannot rank the
//! results by recency or return only the newest match. The resolver takes
//! the identifiers of two independent searches (one by sender, one by
//! "sent since" date) and picks the largest identifier present in both.
//!
//! This relies on sequence numbers growing with arrival order: the largest
//! identifier is the most recently received message. Servers keep that
//! ordering within a session, but nothing here verifies it.

use std::collections::HashSet;

use crate::error::{Error, Result};

/// Below every valid identifier; IMAP identifiers start at 1.
const SENTINEL: u32 = 0;

/// Identifiers returned by one search, as the server sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentifierSet {
    tokens: Vec<String>,
}

impl IdentifierSet {
    /// Splits a space-delimited search result line into tokens.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        Self::from_tokens(line.split_whitespace())
    }

    /// Builds a set from already split tokens.
    #[must_use]
    pub fn from_tokens<I>(tokens: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the tokens in server order.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Returns the number of tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true if the search matched nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for IdentifierSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::from_tokens(iter)
    }
}

/// Returns the largest identifier present in both sets.
///
/// Every token of `date_ids` must be a number; membership in `sender_ids`
/// is tested on the token text. Returns `None` when the sets share no
/// identifier, which includes either set being empty.
///
/// # Errors
///
/// Returns [`Error::Command`] if a token of `date_ids` is not a valid
/// identifier.
pub fn resolve_latest(sender_ids: &IdentifierSet, date_ids: &IdentifierSet) -> Result<Option<u32>> {
    let senders: HashSet<&str> = sender_ids.tokens.iter().map(String::as_str).collect();
    let mut latest = SENTINEL;

    for token in &date_ids.tokens {
        let id: u32 = token
            .parse()
            .map_err(|_| Error::Command(format!("Invalid message identifier: {token:?}")))?;
        if id > latest && senders.contains(token.as_str()) {
            latest = id;
        }
    }

    Ok((latest > SENTINEL).then_some(latest))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_resolve_latest() {
        let sender = IdentifierSet::from_tokens(["245", "248", "257", "259"]);
        let date = IdentifierSet::from_tokens(["257", "259", "300"]);
        assert_eq!(resolve_latest(&sender, &date).unwrap(), Some(259));
    }

    #[test]
    fn test_resolve_from_lines() {
        let sender = IdentifierSet::parse("1 5 9");
        let date = IdentifierSet::parse("9 10 5");
        assert_eq!(resolve_latest(&sender, &date).unwrap(), Some(9));
    }

    #[test]
    fn test_no_overlap() {
        let sender = IdentifierSet::parse("1 2 3");
        let date = IdentifierSet::parse("4 5 6");
        assert_eq!(resolve_latest(&sender, &date).unwrap(), None);
    }

    #[test]
    fn test_empty_inputs() {
        let some = IdentifierSet::parse("1 2 3");
        let none = IdentifierSet::parse("");
        assert!(none.is_empty());
        assert_eq!(resolve_latest(&none, &some).unwrap(), None);
        assert_eq!(resolve_latest(&some, &none).unwrap(), None);
        assert_eq!(resolve_latest(&none, &none).unwrap(), None);
    }

    #[test]
    fn test_malformed_date_token() {
        let sender = IdentifierSet::parse("1 2");
        let date = IdentifierSet::parse("1 two");
        let err = resolve_latest(&sender, &date).unwrap_err();
        assert!(matches!(err, Error::Command(_)));
    }

    #[test]
    fn test_malformed_sender_token_only_fails_membership() {
        let sender = IdentifierSet::parse("x 2");
        let date = IdentifierSet::parse("2 3");
        assert_eq!(resolve_latest(&sender, &date).unwrap(), Some(2));
    }

    #[test]
    fn test_membership_is_textual() {
        let sender = IdentifierSet::parse("007");
        let date = IdentifierSet::parse("7");
        assert_eq!(resolve_latest(&sender, &date).unwrap(), None);
    }

    #[test]
    fn test_collect_into_set() {
        let set: IdentifierSet = vec!["3".to_string(), "4".to_string()].into_iter().collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.tokens(), ["3", "4"]);
    }

    proptest! {
        #[test]
        fn test_resolves_max_of_intersection(
            sender in proptest::collection::vec(1u32..500, 0..40),
            date in proptest::collection::vec(1u32..500, 0..40),
        ) {
            let sender_set: BTreeSet<u32> = sender.iter().copied().collect();
            let expected = date.iter().copied().filter(|id| sender_set.contains(id)).max();

            let resolved = resolve_latest(
                &sender.iter().map(u32::to_string).collect(),
                &date.iter().map(u32::to_string).collect(),
            )
            .unwrap();
            prop_assert_eq!(resolved, expected);
        }
    }
}
