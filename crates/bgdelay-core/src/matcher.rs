//! Rule matching
//!
//! Rules are scanned in store order and the first candidate wins. There is
//! no priority field: authors control precedence through list order alone.

use crate::types::{PageId, Rule};

/// A rule selected for the current page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matched<'a> {
    /// Position of the rule in the store
    pub index: usize,
    pub rule: &'a Rule,
}

/// Return the first rule applicable to `page`, if any
pub fn match_rule<'a, I>(rules: I, page: PageId) -> Option<Matched<'a>>
where
    I: IntoIterator<Item = &'a Rule>,
{
    rules
        .into_iter()
        .enumerate()
        .find(|(_, rule)| rule.applies_to(page))
        .map(|(index, rule)| Matched { index, rule })
}
