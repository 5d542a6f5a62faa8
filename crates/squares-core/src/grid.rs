// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! ASCII grid codec for start and goal configurations.
//!
//! The format is one line per row, top-to-bottom, `0` for empty and `1` for a
//! module. Trailing blank lines are ignored. File row `r` of an `n`-row grid
//! maps to grid `y = n - 1 - r`; columns map to `x` directly.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::cell::{Bounds, Cell};

/// Errors produced while decoding a grid or constructing a configuration
/// from one.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    /// The grid text contained a character other than `0`, `1`, or a line
    /// break.
    #[error("invalid character {ch:?} at line {line}, column {column}")]
    InvalidChar {
        /// 1-based line number in the input text.
        line: usize,
        /// 1-based column number in the input text.
        column: usize,
        /// The offending character.
        ch: char,
    },
    /// The occupied cells do not form a single 4-connected component.
    #[error("configuration is not 4-connected")]
    Disconnected,
}

/// Decodes an ASCII grid into its set of occupied cells.
///
/// The result is only the cell set; connectivity is the caller's concern
/// (the environment constructor enforces it, the codec does not).
pub fn parse(text: &str) -> Result<BTreeSet<Cell>, GridError> {
    let rows: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect();
    let height = rows.len();

    let mut cells = BTreeSet::new();
    for (file_y, row) in rows.iter().enumerate() {
        for (x, ch) in row.chars().enumerate() {
            match ch {
                '0' => {}
                '1' => {
                    let y = (height - 1 - file_y) as i32;
                    let _ = cells.insert(Cell::new(x as i32, y));
                }
                other => {
                    return Err(GridError::InvalidChar {
                        line: file_y + 1,
                        column: x + 1,
                        ch: other,
                    })
                }
            }
        }
    }
    Ok(cells)
}

/// Renders a cell set back into the ASCII grid format.
///
/// The render window is the bounding box of the set, so `render(parse(g))`
/// reproduces `g` up to leading empty rows/columns. An empty set renders as
/// an empty string.
#[must_use]
pub fn render<'a, I>(cells: I) -> String
where
    I: IntoIterator<Item = &'a Cell>,
{
    let set: BTreeSet<Cell> = cells.into_iter().copied().collect();
    let Some(bounds) = Bounds::of(set.iter().copied()) else {
        return String::new();
    };

    let mut out = String::new();
    for y in (bounds.min_y..=bounds.max_y).rev() {
        for x in bounds.min_x..=bounds.max_x {
            out.push(if set.contains(&Cell::new(x, y)) {
                '1'
            } else {
                '0'
            });
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_rows_top_to_bottom() {
        // Top file row is the highest y.
        let cells = parse("10\n11\n").unwrap();
        let expected: BTreeSet<Cell> = [Cell::new(0, 1), Cell::new(0, 0), Cell::new(1, 0)]
            .into_iter()
            .collect();
        assert_eq!(cells, expected);
    }

    #[test]
    fn rejects_foreign_characters() {
        let err = parse("10\n1x").unwrap_err();
        assert_eq!(
            err,
            GridError::InvalidChar {
                line: 2,
                column: 2,
                ch: 'x'
            }
        );
    }

    #[test]
    fn ignores_trailing_blank_lines() {
        assert_eq!(parse("11\n\n\n"), parse("11"));
    }

    #[test]
    fn render_round_trips() {
        let text = "110\n011\n";
        let cells = parse(text).unwrap();
        assert_eq!(render(&cells), text);
    }

    #[test]
    fn empty_grid_renders_empty() {
        let cells = parse("").unwrap();
        assert!(cells.is_empty());
        assert_eq!(render(&cells), "");
    }
}
