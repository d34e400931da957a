//! Infinite interleaved supply of load-test candidates.

use crate::suite::Suite;

/// Cyclic source over the Main tests of several suites. Tests from
/// different suites interleave round-robin by position so a suite with a
/// long Main list cannot monopolize the generated load; disabled tests
/// never appear.
#[derive(Debug, Clone)]
pub struct TestSource {
    entries: Vec<(usize, usize)>,
    cursor: usize,
}

impl TestSource {
    /// Returns `None` when no suite contributes an enabled Main test.
    #[must_use]
    pub fn new(suites: &[Suite]) -> Option<Self> {
        let longest = suites.iter().map(|suite| suite.main.len()).max().unwrap_or(0);
        let mut entries = Vec::new();
        for position in 0..longest {
            for (suite_index, suite) in suites.iter().enumerate() {
                if let Some(candidate) = suite.main.get(position)
                    && !candidate.disabled()
                {
                    entries.push((suite_index, position));
                }
            }
        }
        if entries.is_empty() {
            None
        } else {
            Some(Self { entries, cursor: 0 })
        }
    }

    /// Next `(suite index, main-test index)` pair, cycling forever.
    pub fn next_entry(&mut self) -> (usize, usize) {
        let entry = self.entries.get(self.cursor).copied().unwrap_or((0, 0));
        self.cursor = self.cursor.saturating_add(1);
        if self.cursor >= self.entries.len() {
            self.cursor = 0;
        }
        entry
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
