//! Cut order for the pieces on one sheet: top to bottom by row, left to
//! right within a row.
//!
//! The order is positional only. It does not check that the layout can
//! actually be separated by edge-to-edge guillotine cuts.

use crate::types::Placement;

/// Placements whose `y` lies within this many units of a row's first piece
/// share that row.
pub const DEFAULT_ROW_TOLERANCE: u32 = 10;

/// Orders placements into rows and assigns 1-based `cut_sequence` ranks.
pub fn sequence(mut placements: Vec<Placement>, row_tolerance: u32) -> Vec<Placement> {
    placements.sort_by_key(|p| (p.y, p.x));

    let mut rows: Vec<Vec<Placement>> = Vec::new();
    let mut row_start = None;
    for p in placements {
        match row_start {
            Some(y) if p.y - y < row_tolerance => {
                if let Some(row) = rows.last_mut() {
                    row.push(p);
                }
            }
            _ => {
                row_start = Some(p.y);
                rows.push(vec![p]);
            }
        }
    }

    let mut ordered = Vec::new();
    for mut row in rows {
        row.sort_by_key(|p| (p.x, p.y));
        ordered.extend(row);
    }
    for (rank, p) in ordered.iter_mut().enumerate() {
        p.cut_sequence = rank as u32 + 1;
    }
    ordered
}
