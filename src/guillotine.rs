use crate::packer::{PackOutcome, Packer};
use crate::types::{PieceInstance, Placement, Rect, SupplySheet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeRect {
    pub x: u32,
    pub y: u32,
    pub rect: Rect,
}

#[derive(Debug, Clone)]
pub struct GuillotineBin {
    kerf: u32,
    pub free_rects: Vec<FreeRect>,
    pub placements: Vec<Placement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::enum_variant_names)]
pub enum ScoreStrategy {
    BestAreaFit,
    BestShortSideFit,
    BestLongSideFit,
}

impl ScoreStrategy {
    pub const ALL: [ScoreStrategy; 3] = [
        ScoreStrategy::BestAreaFit,
        ScoreStrategy::BestShortSideFit,
        ScoreStrategy::BestLongSideFit,
    ];
}

#[derive(Debug, Clone, Copy)]
pub struct ScoredPlacement {
    pub free_idx: usize,
    pub rotated: bool,
    pub score: (u64, u64),
}

impl GuillotineBin {
    pub fn new(sheet: Rect, kerf: u32) -> Self {
        Self {
            kerf,
            free_rects: vec![FreeRect {
                x: 0,
                y: 0,
                rect: sheet,
            }],
            placements: Vec::new(),
        }
    }

    pub fn find_best(
        &self,
        piece: Rect,
        allow_rotate: bool,
        score_strategy: ScoreStrategy,
    ) -> Option<ScoredPlacement> {
        let mut best: Option<ScoredPlacement> = None;

        let mut consider = |idx: usize, rotated: bool, candidate: Rect, free: Rect| {
            if !candidate.fits_in(&free) {
                return;
            }
            let score = Self::score(candidate, free, score_strategy);
            if best.is_none_or(|b| score < b.score) {
                best = Some(ScoredPlacement {
                    free_idx: idx,
                    rotated,
                    score,
                });
            }
        };

        for (idx, free) in self.free_rects.iter().enumerate() {
            consider(idx, false, piece, free.rect);
            if allow_rotate && piece.w != piece.h {
                consider(idx, true, piece.rotated(), free.rect);
            }
        }

        best
    }

    fn score(piece: Rect, free: Rect, strategy: ScoreStrategy) -> (u64, u64) {
        let dw = (free.w - piece.w) as u64;
        let dh = (free.h - piece.h) as u64;
        match strategy {
            ScoreStrategy::BestAreaFit => (free.area() - piece.area(), dw.min(dh)),
            ScoreStrategy::BestShortSideFit => (dw.min(dh), dw.max(dh)),
            ScoreStrategy::BestLongSideFit => (dw.max(dh), dw.min(dh)),
        }
    }

    pub fn place(&mut self, scored: ScoredPlacement, instance: &PieceInstance<'_>) -> Placement {
        let free = self.free_rects[scored.free_idx];
        let placement = Placement::new(instance, free.x, free.y, scored.rotated);

        // Remove the used free rect and split
        self.free_rects.swap_remove(scored.free_idx);
        self.split(free, placement.rect());
        self.placements.push(placement.clone());
        self.merge_free_rects();

        placement
    }

    fn split(&mut self, free: FreeRect, placed: Rect) {
        let cut_w = placed.w.saturating_add(self.kerf);
        let cut_h = placed.h.saturating_add(self.kerf);
        let right_w = free.rect.w.saturating_sub(cut_w);
        let bottom_h = free.rect.h.saturating_sub(cut_h);
        // Only read when the matching strip is non-empty, so both stay on the sheet
        let right_x = free.x.saturating_add(cut_w);
        let bottom_y = free.y.saturating_add(cut_h);

        if right_w > 0 && bottom_h > 0 {
            // Split along the shorter leftover axis
            if free.rect.w - placed.w < free.rect.h - placed.h {
                // Narrow right strip, bottom strip spans the full width
                self.push_free(right_x, free.y, right_w, placed.h);
                self.push_free(free.x, bottom_y, free.rect.w, bottom_h);
            } else {
                // Right strip spans the full height, narrow bottom strip
                self.push_free(right_x, free.y, right_w, free.rect.h);
                self.push_free(free.x, bottom_y, placed.w, bottom_h);
            }
        } else if right_w > 0 {
            self.push_free(right_x, free.y, right_w, free.rect.h);
        } else if bottom_h > 0 {
            self.push_free(free.x, bottom_y, free.rect.w, bottom_h);
        }
    }

    fn push_free(&mut self, x: u32, y: u32, w: u32, h: u32) {
        self.free_rects.push(FreeRect {
            x,
            y,
            rect: Rect::new(w, h),
        });
    }

    fn merge_free_rects(&mut self) {
        let mut merged = true;
        while merged {
            merged = false;
            'outer: for i in 0..self.free_rects.len() {
                for j in (i + 1)..self.free_rects.len() {
                    if let Some(m) = Self::try_merge(self.free_rects[i], self.free_rects[j]) {
                        self.free_rects[i] = m;
                        self.free_rects.swap_remove(j);
                        merged = true;
                        break 'outer;
                    }
                }
            }
        }
    }

    fn try_merge(a: FreeRect, b: FreeRect) -> Option<FreeRect> {
        // Side by side: same row and height
        if a.y == b.y && a.rect.h == b.rect.h {
            let (left, right) = if a.x <= b.x { (a, b) } else { (b, a) };
            if left.x + left.rect.w == right.x {
                return Some(FreeRect {
                    x: left.x,
                    y: left.y,
                    rect: Rect::new(a.rect.w + b.rect.w, a.rect.h),
                });
            }
        }
        // Stacked: same column and width
        if a.x == b.x && a.rect.w == b.rect.w {
            let (top, bottom) = if a.y <= b.y { (a, b) } else { (b, a) };
            if top.y + top.rect.h == bottom.y {
                return Some(FreeRect {
                    x: top.x,
                    y: top.y,
                    rect: Rect::new(a.rect.w, a.rect.h + b.rect.h),
                });
            }
        }
        None
    }
}

/// Default packer: a free-rectangle guillotine bin, run once per scoring
/// rule, keeping whichever run places the most area.
#[derive(Debug, Clone, Copy, Default)]
pub struct GuillotinePacker {
    kerf: u32,
}

impl GuillotinePacker {
    pub fn new(kerf: u32) -> Self {
        Self { kerf }
    }

    fn pack_with<'a>(
        &self,
        pieces: &[PieceInstance<'a>],
        sheet: Rect,
        allow_rotation: bool,
        strategy: ScoreStrategy,
    ) -> PackOutcome<'a> {
        let mut bin = GuillotineBin::new(sheet, self.kerf);
        let mut unplaced = Vec::new();

        for instance in pieces {
            match bin.find_best(instance.rect(), allow_rotation, strategy) {
                Some(scored) => {
                    bin.place(scored, instance);
                }
                None => unplaced.push(*instance),
            }
        }

        PackOutcome {
            placed: bin.placements,
            unplaced,
        }
    }
}

impl Packer for GuillotinePacker {
    fn pack<'a>(
        &self,
        pieces: &[PieceInstance<'a>],
        sheet: &SupplySheet,
        allow_rotation: bool,
    ) -> PackOutcome<'a> {
        let mut best: Option<PackOutcome<'a>> = None;
        for strategy in ScoreStrategy::ALL {
            let outcome = self.pack_with(pieces, sheet.rect(), allow_rotation, strategy);
            tracing::trace!(
                sheet = %sheet.id,
                ?strategy,
                placed = outcome.placed.len(),
                area = outcome.placed_area(),
                "guillotine attempt"
            );
            if best
                .as_ref()
                .is_none_or(|b| outcome.placed_area() > b.placed_area())
            {
                best = Some(outcome);
            }
        }
        best.unwrap_or_else(|| PackOutcome::nothing_placed(pieces))
    }
}
