//! IDE-visible breakpoint table.
//!
//! Maps a source file to the ordered breakpoint descriptors last supplied by
//! the shell. The table is bookkeeping only: no source-line verification is
//! performed here, descriptors are accepted and echoed back as-is.

use indexmap::IndexMap;
use std::path::{Path, PathBuf};

/// Breakpoint descriptor as the IDE shell sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceBreakpoint {
    pub line: u32,
    pub verified: bool,
}

impl SourceBreakpoint {
    pub fn new(line: u32) -> Self {
        // Verification is a pass-through: the server is not consulted.
        Self {
            line,
            verified: true,
        }
    }
}

#[derive(Default)]
pub struct BreakpointTable {
    entries: IndexMap<PathBuf, Vec<SourceBreakpoint>>,
}

impl BreakpointTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole entry for `file`, returning the stored descriptors.
    pub fn set(&mut self, file: &Path, breakpoints: Vec<SourceBreakpoint>) -> &[SourceBreakpoint] {
        self.entries.insert(file.to_path_buf(), breakpoints);
        &self.entries[file]
    }

    pub fn get(&self, file: &Path) -> &[SourceBreakpoint] {
        self.entries.get(file).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_set_replaces_whole_entry() {
        let mut table = BreakpointTable::new();
        let file_a = Path::new("src/handlers.b");
        let file_b = Path::new("src/model.b");

        table.set(
            file_a,
            vec![SourceBreakpoint::new(3), SourceBreakpoint::new(17)],
        );
        table.set(file_b, vec![SourceBreakpoint::new(40)]);
        assert_eq!(table.get(file_a).len(), 2);

        let stored = table.set(file_a, vec![SourceBreakpoint::new(99)]);
        assert_eq!(stored, &[SourceBreakpoint::new(99)]);
        assert_eq!(table.get(file_a), &[SourceBreakpoint::new(99)]);
        // Other files' entries are untouched.
        assert_eq!(table.get(file_b), &[SourceBreakpoint::new(40)]);
    }
}
