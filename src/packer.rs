//! The packing seam: places piece instances onto a single sheet.

use std::collections::HashSet;

use crate::types::{PieceInstance, Placement, SupplySheet};

/// Result of packing one sheet. Every input instance ends up in exactly one
/// of the two lists.
#[derive(Debug, Clone, Default)]
pub struct PackOutcome<'a> {
    pub placed: Vec<Placement>,
    pub unplaced: Vec<PieceInstance<'a>>,
}

impl<'a> PackOutcome<'a> {
    /// Nothing placed; every instance carries forward.
    pub fn nothing_placed(pieces: &[PieceInstance<'a>]) -> Self {
        Self {
            placed: Vec::new(),
            unplaced: pieces.to_vec(),
        }
    }

    pub fn placed_area(&self) -> u64 {
        self.placed.iter().map(Placement::area).sum()
    }
}

/// A 2D rectangle packing heuristic for a single sheet.
///
/// Implementations receive instances that already share the sheet's
/// thickness, in the order they should be considered. They must never
/// report a placement outside the sheet or overlapping another placement.
pub trait Packer {
    fn pack<'a>(
        &self,
        pieces: &[PieceInstance<'a>],
        sheet: &SupplySheet,
        allow_rotation: bool,
    ) -> PackOutcome<'a>;
}

/// Geometry checks an outcome must pass before it is accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inconsistency {
    OutOfBounds { piece_id: String, instance: u32 },
    Overlap { first: (String, u32), second: (String, u32) },
    IllegalDimensions { piece_id: String, instance: u32 },
    IllegalRotation { piece_id: String, instance: u32 },
    UnknownInstance { piece_id: String, instance: u32 },
    CountMismatch { expected: usize, got: usize },
}

impl std::fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Inconsistency::OutOfBounds { piece_id, instance } => {
                write!(f, "{piece_id}#{instance} extends past the sheet")
            }
            Inconsistency::Overlap { first, second } => write!(
                f,
                "{}#{} overlaps {}#{}",
                first.0, first.1, second.0, second.1
            ),
            Inconsistency::IllegalDimensions { piece_id, instance } => {
                write!(f, "{piece_id}#{instance} placed with foreign dimensions")
            }
            Inconsistency::IllegalRotation { piece_id, instance } => {
                write!(f, "{piece_id}#{instance} rotated while rotation is off")
            }
            Inconsistency::UnknownInstance { piece_id, instance } => {
                write!(f, "{piece_id}#{instance} is missing or reported twice")
            }
            Inconsistency::CountMismatch { expected, got } => {
                write!(f, "{got} instances reported for {expected} given")
            }
        }
    }
}

/// Checks bounds, non-overlap, rotation legality and per-call conservation.
pub fn verify(
    pieces: &[PieceInstance<'_>],
    outcome: &PackOutcome<'_>,
    sheet: &SupplySheet,
    allow_rotation: bool,
) -> Result<(), Inconsistency> {
    let got = outcome.placed.len() + outcome.unplaced.len();
    if got != pieces.len() {
        return Err(Inconsistency::CountMismatch {
            expected: pieces.len(),
            got,
        });
    }

    let mut expected: HashSet<(&str, u32)> = pieces
        .iter()
        .map(|p| (p.piece.id.as_str(), p.instance))
        .collect();

    for p in &outcome.placed {
        if !expected.remove(&(p.piece_id.as_str(), p.instance)) {
            return Err(Inconsistency::UnknownInstance {
                piece_id: p.piece_id.clone(),
                instance: p.instance,
            });
        }
        let source = pieces
            .iter()
            .find(|i| i.piece.id == p.piece_id && i.instance == p.instance)
            .map(|i| if p.rotated { i.rect().rotated() } else { i.rect() });
        if source != Some(p.rect()) {
            return Err(Inconsistency::IllegalDimensions {
                piece_id: p.piece_id.clone(),
                instance: p.instance,
            });
        }
        if p.rotated && !allow_rotation {
            return Err(Inconsistency::IllegalRotation {
                piece_id: p.piece_id.clone(),
                instance: p.instance,
            });
        }
        if p.right() > sheet.width as u64 || p.bottom() > sheet.height as u64 {
            return Err(Inconsistency::OutOfBounds {
                piece_id: p.piece_id.clone(),
                instance: p.instance,
            });
        }
    }

    for u in &outcome.unplaced {
        if !expected.remove(&(u.piece.id.as_str(), u.instance)) {
            return Err(Inconsistency::UnknownInstance {
                piece_id: u.piece.id.clone(),
                instance: u.instance,
            });
        }
    }

    for (i, a) in outcome.placed.iter().enumerate() {
        for b in &outcome.placed[i + 1..] {
            if a.overlaps(b) {
                return Err(Inconsistency::Overlap {
                    first: (a.piece_id.clone(), a.instance),
                    second: (b.piece_id.clone(), b.instance),
                });
            }
        }
    }

    Ok(())
}

/// Runs `packer` and falls back to placing nothing if the outcome fails
/// verification.
pub fn pack_checked<'a, P: Packer + ?Sized>(
    packer: &P,
    pieces: &[PieceInstance<'a>],
    sheet: &SupplySheet,
    allow_rotation: bool,
) -> PackOutcome<'a> {
    let outcome = packer.pack(pieces, sheet, allow_rotation);
    match verify(pieces, &outcome, sheet, allow_rotation) {
        Ok(()) => outcome,
        Err(problem) => {
            tracing::warn!(
                sheet = %sheet.id,
                %problem,
                "packing attempt rejected, carrying all pieces forward"
            );
            PackOutcome::nothing_placed(pieces)
        }
    }
}
