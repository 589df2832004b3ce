//! Peg lattice geometry and pocket resolution
//!
//! Pegs are never stored. Row `r` holds `r + 1` pegs spaced one pocket width
//! apart and centered on the board, so the last row lands exactly on the
//! interior pocket boundaries:
//!
//! ```text
//!          o           row 0
//!        o   o         row 1
//!      o   o   o       row 2
//!   |  0|  1|  2|  3|  pockets (N = rows + 1)
//! ```

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::ConfigError;

/// Board layout parameters (units are arbitrary board units)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardLayout {
    /// Horizontal peg spacing, equal to the pocket width
    pub peg_spacing: f32,
    /// Vertical distance between peg rows
    pub row_spacing: f32,
    /// Distance from the top edge to the first peg row
    pub top_margin: f32,
    pub peg_radius: f32,
    pub ball_radius: f32,
}

impl Default for BoardLayout {
    fn default() -> Self {
        Self {
            peg_spacing: PEG_SPACING,
            row_spacing: ROW_SPACING,
            top_margin: TOP_MARGIN,
            peg_radius: PEG_RADIUS,
            ball_radius: BALL_RADIUS,
        }
    }
}

impl BoardLayout {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("peg_spacing", self.peg_spacing),
            ("row_spacing", self.row_spacing),
            ("top_margin", self.top_margin),
            ("peg_radius", self.peg_radius),
            ("ball_radius", self.ball_radius),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("must be positive, got {value}"),
                });
            }
        }
        // A ball must fit between two pegs of the same row
        if self.peg_spacing - 2.0 * self.peg_radius <= 2.0 * self.ball_radius {
            return Err(ConfigError::InvalidValue {
                field: "peg_spacing",
                reason: "ball cannot pass between adjacent pegs".to_string(),
            });
        }
        Ok(())
    }
}

/// Peg position in lattice coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PegId {
    pub row: usize,
    pub col: usize,
}

/// A concrete board: layout plus pocket count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub layout: BoardLayout,
    pub pocket_count: usize,
}

impl Board {
    pub fn new(layout: BoardLayout, pocket_count: usize) -> Result<Self, ConfigError> {
        if !(MIN_POCKETS..=MAX_POCKETS).contains(&pocket_count) {
            return Err(ConfigError::PocketCount {
                count: pocket_count,
                min: MIN_POCKETS,
                max: MAX_POCKETS,
            });
        }
        layout.validate()?;
        Ok(Self {
            layout,
            pocket_count,
        })
    }

    /// Number of peg rows
    #[inline]
    pub fn rows(&self) -> usize {
        self.pocket_count - 1
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.pocket_count as f32 * self.layout.peg_spacing
    }

    #[inline]
    pub fn center_x(&self) -> f32 {
        self.width() / 2.0
    }

    #[inline]
    pub fn pocket_width(&self) -> f32 {
        self.layout.peg_spacing
    }

    /// y of peg row `row`
    #[inline]
    pub fn row_y(&self, row: usize) -> f32 {
        self.layout.top_margin + row as f32 * self.layout.row_spacing
    }

    /// Crossing this y puts a ball in a pocket (one row below the last pegs)
    #[inline]
    pub fn pocket_line(&self) -> f32 {
        self.row_y(self.rows())
    }

    /// Ball spawn height, above the first peg row
    #[inline]
    pub fn drop_y(&self) -> f32 {
        self.layout.top_margin * 0.3
    }

    /// Pocket a fallback ball lands in
    #[inline]
    pub fn center_pocket(&self) -> usize {
        self.pocket_count / 2
    }

    /// Center x of a pocket
    pub fn pocket_center_x(&self, index: usize) -> f32 {
        (index as f32 + 0.5) * self.pocket_width()
    }

    /// Position of peg `(row, col)`; `col` must be `<= row`
    pub fn peg_position(&self, peg: PegId) -> Vec2 {
        let offset = peg.col as f32 - peg.row as f32 / 2.0;
        Vec2::new(
            self.center_x() + offset * self.layout.peg_spacing,
            self.row_y(peg.row),
        )
    }

    /// All pegs, row-major
    pub fn pegs(&self) -> impl Iterator<Item = PegId> + '_ {
        (0..self.rows()).flat_map(|row| (0..=row).map(move |col| PegId { row, col }))
    }

    /// Pegs whose center lies within `reach` of `pos` (row-major order)
    pub fn pegs_near(&self, pos: Vec2, reach: f32) -> Vec<(PegId, Vec2)> {
        let mut found = Vec::new();
        if !pos.is_finite() || self.rows() == 0 {
            return found;
        }

        let rel_y = (pos.y - self.layout.top_margin) / self.layout.row_spacing;
        let span = (reach / self.layout.row_spacing).ceil();
        let first = (rel_y - span).floor().max(0.0) as usize;
        let last = (rel_y + span).ceil();
        if last < 0.0 {
            return found;
        }
        let last = (last as usize).min(self.rows() - 1);

        for row in first..=last {
            // Invert the column formula around the ball x
            let center_col = (pos.x - self.center_x()) / self.layout.peg_spacing + row as f32 / 2.0;
            let col_span = (reach / self.layout.peg_spacing).ceil();
            let lo = (center_col - col_span).floor().max(0.0) as usize;
            let hi = (center_col + col_span).ceil();
            if hi < 0.0 {
                continue;
            }
            let hi = (hi as usize).min(row);
            for col in lo..=hi {
                let peg = PegId { row, col };
                let peg_pos = self.peg_position(peg);
                if peg_pos.distance(pos) <= reach {
                    found.push((peg, peg_pos));
                }
            }
        }
        found
    }

    /// Pocket index for a terminal x on this board
    pub fn pocket_for(&self, x: f32) -> usize {
        resolve_pocket(x, self.width(), self.pocket_count)
    }
}

/// Map a terminal horizontal position to a pocket index.
///
/// `floor(x / (board_width / pocket_count))` clamped to `[0, pocket_count - 1]`,
/// so `x == board_width` lands in the last pocket. NaN lands in the center.
pub fn resolve_pocket(x: f32, board_width: f32, pocket_count: usize) -> usize {
    if pocket_count == 0 {
        return 0;
    }
    let last = pocket_count - 1;
    if x.is_nan() || !board_width.is_finite() || board_width <= 0.0 {
        return pocket_count / 2;
    }
    let index = (x / (board_width / pocket_count as f32)).floor();
    if index <= 0.0 {
        0
    } else if index >= last as f32 {
        last
    } else {
        index as usize
    }
}
