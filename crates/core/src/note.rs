//! Justification note precondition.

use serde::{Deserialize, Serialize};

/// Minimum length a justification note must reach once trimmed.
///
/// Length is counted in Unicode scalar values, so accented characters
/// count once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRule {
    pub min_chars: usize,
}

impl NoteRule {
    pub const fn min_chars(min_chars: usize) -> Self {
        NoteRule { min_chars }
    }

    /// Whether `note` satisfies the rule.
    pub fn accepts(&self, note: &str) -> bool {
        note.trim().chars().count() >= self.min_chars
    }

    /// Human-readable requirement, always mentioning the minimum.
    pub fn describe(&self) -> String {
        if self.min_chars <= 1 {
            "la nota è obbligatoria e deve contenere almeno 1 carattere".to_string()
        } else {
            format!(
                "la nota deve contenere almeno {} caratteri",
                self.min_chars
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_before_counting() {
        let rule = NoteRule::min_chars(5);
        assert!(!rule.accepts("  abc   "));
        assert!(rule.accepts("  abcde "));
    }

    #[test]
    fn counts_characters_not_bytes() {
        let rule = NoteRule::min_chars(4);
        assert!(rule.accepts("perché"));
        assert!(!rule.accepts("più"));
    }

    #[test]
    fn non_empty_rule_rejects_whitespace() {
        let rule = NoteRule::min_chars(1);
        assert!(!rule.accepts(""));
        assert!(!rule.accepts(" \t\n"));
        assert!(rule.accepts("x"));
    }

    #[test]
    fn description_mentions_minimum() {
        assert!(NoteRule::min_chars(20).describe().contains("20"));
        assert!(NoteRule::min_chars(1).describe().contains('1'));
    }
}
