//! Command tags.

/// Hands out `A0000`, `A0001`, ... for one connection.
///
/// The client has a single command in flight, so a plain counter owned by the
/// client is enough. It wraps rather than overflowing; by then the tags of
/// early commands are long settled.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    prefix: char,
    issued: u32,
}

impl TagGenerator {
    /// Creates a generator whose tags start with `prefix`.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { prefix, issued: 0 }
    }

    /// Returns the tag for the next command.
    pub fn next_tag(&mut self) -> String {
        let tag = format!("{}{:04}", self.prefix, self.issued);
        self.issued = self.issued.wrapping_add(1);
        tag
    }

    /// Number of tags handed out since the counter last wrapped.
    #[must_use]
    pub const fn issued(&self) -> u32 {
        self.issued
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
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

    #[test]
    fn test_sequential_tags() {
        let mut tags = TagGenerator::default();
        let issued: Vec<_> = (0..3).map(|_| tags.next_tag()).collect();
        assert_eq!(issued, ["A0000", "A0001", "A0002"]);
        assert_eq!(tags.issued(), 3);
    }

    #[test]
    fn test_padding_stops_at_four_digits() {
        let mut tags = TagGenerator::new('P');
        tags.issued = 9999;
        assert_eq!(tags.next_tag(), "P9999");
        assert_eq!(tags.next_tag(), "P10000");
    }

    #[test]
    fn test_counter_wraps() {
        let mut tags = TagGenerator::default();
        tags.issued = u32::MAX;
        assert_eq!(tags.next_tag(), format!("A{}", u32::MAX));
        assert_eq!(tags.next_tag(), "A0000");
    }
}
