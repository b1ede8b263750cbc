// Copyright The Analysis Engine Authors
// SPDX-License-Identifier: Apache-2.0

use std::hash::{Hash, Hasher};

/// Position of a construct inside a rule file.
///
/// Locations produced by code generation use [`SourceLocation::generated`],
/// which compares equal to any other location so that structural equality of
/// two expression trees is not affected by where they were parsed from.
#[derive(Debug, Clone, Eq)]
pub struct SourceLocation {
    start: usize,
    end: usize,
    line_number: usize,
    column_number: usize,
    generated: bool,
}

impl SourceLocation {
    pub fn new(start: usize, end: usize, line_number: usize, column_number: usize) -> SourceLocation {
        debug_assert!(
            line_number >= 1 && column_number >= 1,
            "line and column numbers start at 1"
        );

        Self {
            start,
            end,
            line_number,
            column_number,
            generated: false,
        }
    }

    pub fn generated() -> SourceLocation {
        Self {
            start: 0,
            end: 0,
            line_number: 1,
            column_number: 1,
            generated: true,
        }
    }

    pub fn get_start_and_end_positions(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    pub fn get_line_and_column_numbers(&self) -> (usize, usize) {
        (self.line_number, self.column_number)
    }
}

impl Hash for SourceLocation {
    fn hash<H: Hasher>(&self, _: &mut H) {}
}

impl PartialEq for SourceLocation {
    fn eq(&self, other: &Self) -> bool {
        if self.generated || other.generated {
            return true;
        }

        self.start == other.start
            && self.end == other.end
            && self.line_number == other.line_number
            && self.column_number == other.column_number
    }
}
