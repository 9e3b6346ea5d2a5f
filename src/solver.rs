use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::{EngineError, Result};
use crate::guillotine::GuillotinePacker;
use crate::packer::{Packer, pack_checked};
use crate::policy::PolicyMode;
use crate::sequence::{DEFAULT_ROW_TOLERANCE, sequence};
use crate::stats::{aggregate_waste, waste_percentage};
use crate::types::{DemandPiece, OptimizationResult, PieceInstance, SheetLayout, SupplySheet};

/// Matches demand pieces to stock sheets, one thickness class at a time.
#[derive(Debug, Clone)]
pub struct Optimizer<P = GuillotinePacker> {
    packer: P,
    row_tolerance: u32,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self {
            packer: GuillotinePacker::default(),
            row_tolerance: DEFAULT_ROW_TOLERANCE,
        }
    }
}

impl Optimizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Leaves `kerf` units between a piece and the space split off beside it.
    pub fn with_kerf(mut self, kerf: u32) -> Self {
        self.packer = GuillotinePacker::new(kerf);
        self
    }
}

impl<P: Packer> Optimizer<P> {
    pub fn with_packer<Q: Packer>(self, packer: Q) -> Optimizer<Q> {
        Optimizer {
            packer,
            row_tolerance: self.row_tolerance,
        }
    }

    pub fn with_row_tolerance(mut self, row_tolerance: u32) -> Self {
        self.row_tolerance = row_tolerance;
        self
    }

    /// Validates the input, applies `mode` and matches.
    ///
    /// Rotation is used only when both `allow_rotation` and the mode allow it.
    pub fn optimize(
        &self,
        demand: &[DemandPiece],
        supply: &[SupplySheet],
        mode: PolicyMode,
        allow_rotation: bool,
    ) -> Result<OptimizationResult> {
        validate(demand, supply)?;
        let rotation = allow_rotation && mode.allows_rotation();
        let ordered = mode.order_demand(demand);
        let result = self.match_demand(&ordered, supply, rotation);
        tracing::info!(
            %mode,
            rotation,
            sheets_used = result.sheets_used,
            unmatched = result.unmatched.iter().map(|d| d.quantity as u64).sum::<u64>(),
            waste_percentage = result.waste_percentage,
            "optimization finished"
        );
        Ok(result)
    }

    /// Packs `demand`, in the order given, onto the available sheets.
    ///
    /// Demand and sheets are grouped by thickness. Within a group the sheets
    /// are tried largest first, each one receiving whatever the previous
    /// sheets could not take. Input is assumed to be validated.
    pub fn match_demand(
        &self,
        demand: &[DemandPiece],
        supply: &[SupplySheet],
        allow_rotation: bool,
    ) -> OptimizationResult {
        let mut result = OptimizationResult::empty(allow_rotation);
        if demand.is_empty() {
            return result;
        }

        let mut demand_groups: BTreeMap<u32, Vec<PieceInstance<'_>>> = BTreeMap::new();
        for piece in demand {
            demand_groups
                .entry(piece.thickness)
                .or_default()
                .extend(piece.instances());
        }

        let mut sheet_groups: BTreeMap<u32, Vec<&SupplySheet>> = BTreeMap::new();
        for sheet in supply.iter().filter(|s| s.available) {
            sheet_groups.entry(sheet.thickness).or_default().push(sheet);
        }

        let mut leftover: Vec<PieceInstance<'_>> = Vec::new();
        for (thickness, instances) in demand_groups {
            let Some(sheets) = sheet_groups.get_mut(&thickness) else {
                tracing::warn!(
                    thickness,
                    pieces = instances.len(),
                    "no available sheet of this thickness"
                );
                leftover.extend(instances);
                continue;
            };
            sheets.sort_by(|a, b| b.area().cmp(&a.area()));

            let remaining =
                self.fill_sheets(instances, sheets, allow_rotation, &mut result.layouts);
            leftover.extend(remaining);
        }

        result.unmatched = regroup(demand, &leftover);
        result.sheets_used = result.layouts.len();
        result.waste_percentage = aggregate_waste(&result.layouts);
        result
    }

    fn fill_sheets<'a>(
        &self,
        mut remaining: Vec<PieceInstance<'a>>,
        sheets: &[&SupplySheet],
        allow_rotation: bool,
        layouts: &mut Vec<SheetLayout>,
    ) -> Vec<PieceInstance<'a>> {
        for sheet in sheets {
            if remaining.is_empty() {
                break;
            }
            let outcome = pack_checked(&self.packer, &remaining, sheet, allow_rotation);
            tracing::debug!(
                sheet = %sheet.id,
                thickness = sheet.thickness,
                placed = outcome.placed.len(),
                carried = outcome.unplaced.len(),
                "sheet packed"
            );
            remaining = outcome.unplaced;
            if outcome.placed.is_empty() {
                continue;
            }

            let placements = sequence(outcome.placed, self.row_tolerance);
            layouts.push(SheetLayout {
                sheet_id: sheet.id.clone(),
                sheet_width: sheet.width,
                sheet_height: sheet.height,
                thickness: sheet.thickness,
                waste_percentage: waste_percentage(sheet, &placements),
                placements,
            });
        }
        remaining
    }
}

/// Folds leftover instances back into one entry per demand piece, in
/// demand order.
fn regroup(demand: &[DemandPiece], leftover: &[PieceInstance<'_>]) -> Vec<DemandPiece> {
    let mut counts: HashMap<&str, u32> = HashMap::new();
    for instance in leftover {
        *counts.entry(instance.piece.id.as_str()).or_default() += 1;
    }
    demand
        .iter()
        .filter_map(|piece| {
            let quantity = counts.get(piece.id.as_str()).copied().unwrap_or(0);
            (quantity > 0).then(|| DemandPiece {
                quantity,
                ..piece.clone()
            })
        })
        .collect()
}

fn validate(demand: &[DemandPiece], supply: &[SupplySheet]) -> Result<()> {
    let mut seen = HashSet::new();
    for piece in demand {
        if piece.width == 0 || piece.height == 0 {
            return Err(EngineError::ZeroPieceDimension {
                id: piece.id.clone(),
                width: piece.width,
                height: piece.height,
            });
        }
        if piece.quantity == 0 {
            return Err(EngineError::ZeroQuantity {
                id: piece.id.clone(),
            });
        }
        if !seen.insert(piece.id.as_str()) {
            return Err(EngineError::DuplicatePieceId {
                id: piece.id.clone(),
            });
        }
    }
    for sheet in supply {
        if sheet.width == 0 || sheet.height == 0 {
            return Err(EngineError::ZeroSheetDimension {
                id: sheet.id.clone(),
                width: sheet.width,
                height: sheet.height,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packer::PackOutcome;
    use crate::types::Placement;
    use pretty_assertions::assert_eq;

    /// Validates a complete result:
    /// 1. Every placement fits within its sheet
    /// 2. No two placements on the same sheet overlap
    /// 3. Placed plus unmatched instances equal the demanded quantity
    fn assert_result_valid(result: &OptimizationResult, demand: &[DemandPiece]) {
        for d in demand {
            assert_eq!(
                result.placed_count(&d.id) + result.unmatched_count(&d.id),
                d.quantity,
                "piece {} not conserved",
                d.id
            );
        }

        for (si, layout) in result.layouts.iter().enumerate() {
            for (pi, p) in layout.placements.iter().enumerate() {
                assert!(
                    p.right() <= layout.sheet_width as u64
                        && p.bottom() <= layout.sheet_height as u64,
                    "sheet {si}, piece {pi} ({}) at ({}, {}) exceeds {}",
                    p.rect(),
                    p.x,
                    p.y,
                    layout.sheet_rect()
                );
                let source = demand.iter().find(|d| d.id == p.piece_id).unwrap();
                assert_eq!(source.thickness, layout.thickness);
            }
            assert_no_overlaps(si, &layout.placements);
        }
    }

    fn assert_no_overlaps(sheet_idx: usize, placements: &[Placement]) {
        for i in 0..placements.len() {
            for j in (i + 1)..placements.len() {
                let a = &placements[i];
                let b = &placements[j];
                assert!(
                    !a.overlaps(b),
                    "sheet {sheet_idx}: piece {i} ({} @ ({},{})) overlaps piece {j} ({} @ ({},{}))",
                    a.rect(),
                    a.x,
                    a.y,
                    b.rect(),
                    b.x,
                    b.y
                );
            }
        }
    }

    #[test]
    fn test_single_piece() {
        let demand = vec![DemandPiece::new("top", 800, 500, 1, 18)];
        let supply = vec![SupplySheet::new("s1", 1220, 2440, 18)];
        let result = Optimizer::new().match_demand(&demand, &supply, true);
        assert_result_valid(&result, &demand);
        assert_eq!(result.sheets_used, 1);
        assert_eq!(result.layouts[0].placements[0].cut_sequence, 1);
    }

    #[test]
    fn test_largest_sheet_first() {
        let demand = vec![DemandPiece::new("p", 100, 100, 1, 18)];
        let supply = vec![
            SupplySheet::new("small", 200, 200, 18),
            SupplySheet::new("large", 1220, 2440, 18),
            SupplySheet::new("medium", 600, 600, 18),
        ];
        let result = Optimizer::new().match_demand(&demand, &supply, true);
        assert_eq!(result.layouts[0].sheet_id, "large");
        assert_eq!(result.sheets_used, 1);
    }

    #[test]
    fn test_spills_onto_next_sheet() {
        let demand = vec![DemandPiece::new("p", 60, 60, 3, 18)];
        let supply = vec![
            SupplySheet::new("a", 100, 100, 18),
            SupplySheet::new("b", 100, 100, 18),
        ];
        let result = Optimizer::new().match_demand(&demand, &supply, false);
        assert_result_valid(&result, &demand);
        assert_eq!(result.sheets_used, 2);
        assert_eq!(result.unmatched_count("p"), 1);
        let sheet_ids: Vec<_> = result.layouts.iter().map(|l| l.sheet_id.as_str()).collect();
        assert_eq!(sheet_ids, vec!["a", "b"]);
    }

    #[test]
    fn test_stops_when_demand_exhausted() {
        let demand = vec![DemandPiece::new("p", 50, 50, 2, 18)];
        let supply = vec![
            SupplySheet::new("a", 100, 100, 18),
            SupplySheet::new("b", 100, 100, 18),
        ];
        let result = Optimizer::new().match_demand(&demand, &supply, true);
        assert_eq!(result.sheets_used, 1);
        assert!(result.unmatched.is_empty());
    }

    #[test]
    fn test_unavailable_sheets_ignored() {
        let demand = vec![DemandPiece::new("p", 50, 50, 1, 18)];
        let supply = vec![SupplySheet::new("a", 100, 100, 18).unavailable()];
        let result = Optimizer::new().match_demand(&demand, &supply, true);
        assert_eq!(result.sheets_used, 0);
        assert_eq!(result.unmatched, demand);
        assert_eq!(result.waste_percentage, 0.0);
    }

    #[test]
    fn test_thickness_partition() {
        let demand = vec![
            DemandPiece::new("side", 700, 400, 2, 18),
            DemandPiece::new("back", 900, 600, 1, 6),
            DemandPiece::new("drawer", 400, 300, 2, 12),
        ];
        let supply = vec![
            SupplySheet::new("thick", 1220, 2440, 18),
            SupplySheet::new("thin", 1220, 2440, 6),
        ];
        let result = Optimizer::new().match_demand(&demand, &supply, true);
        assert_result_valid(&result, &demand);
        assert_eq!(result.sheets_used, 2);
        assert_eq!(result.unmatched_count("drawer"), 2);
        assert_eq!(result.unmatched.len(), 1);
        // groups run in ascending thickness
        assert_eq!(result.layouts[0].sheet_id, "thin");
        assert_eq!(result.layouts[1].sheet_id, "thick");
    }

    #[test]
    fn test_regroup_keeps_demand_order() {
        let demand = vec![
            DemandPiece::new("a", 10, 10, 3, 18),
            DemandPiece::new("b", 10, 10, 2, 18),
        ];
        let leftover: Vec<_> = demand[1]
            .instances()
            .chain(demand[0].instances().skip(2))
            .collect();
        let unmatched = regroup(&demand, &leftover);
        let summary: Vec<_> = unmatched.iter().map(|d| (d.id.as_str(), d.quantity)).collect();
        assert_eq!(summary, vec![("a", 1), ("b", 2)]);
    }

    #[test]
    fn test_validation() {
        let supply = vec![SupplySheet::new("s", 100, 100, 18)];
        let opt = Optimizer::new();

        let zero_width = vec![DemandPiece::new("p", 0, 10, 1, 18)];
        assert!(matches!(
            opt.optimize(&zero_width, &supply, PolicyMode::MinimizeWaste, true),
            Err(EngineError::ZeroPieceDimension { .. })
        ));

        let zero_qty = vec![DemandPiece::new("p", 10, 10, 0, 18)];
        assert!(matches!(
            opt.optimize(&zero_qty, &supply, PolicyMode::MinimizeWaste, true),
            Err(EngineError::ZeroQuantity { .. })
        ));

        let dup = vec![
            DemandPiece::new("p", 10, 10, 1, 18),
            DemandPiece::new("p", 20, 20, 1, 18),
        ];
        assert!(matches!(
            opt.optimize(&dup, &supply, PolicyMode::MinimizeWaste, true),
            Err(EngineError::DuplicatePieceId { .. })
        ));

        let ok = vec![DemandPiece::new("p", 10, 10, 1, 18)];
        let flat = vec![SupplySheet::new("s", 100, 0, 18).unavailable()];
        assert!(matches!(
            opt.optimize(&ok, &flat, PolicyMode::MinimizeWaste, true),
            Err(EngineError::ZeroSheetDimension { .. })
        ));
    }

    /// Always claims every piece at the origin, which is only legal for one.
    struct StackingPacker;

    impl Packer for StackingPacker {
        fn pack<'a>(
            &self,
            pieces: &[PieceInstance<'a>],
            _sheet: &SupplySheet,
            _allow_rotation: bool,
        ) -> PackOutcome<'a> {
            PackOutcome {
                placed: pieces.iter().map(|p| Placement::new(p, 0, 0, false)).collect(),
                unplaced: Vec::new(),
            }
        }
    }

    #[test]
    fn test_inconsistent_packer_fails_soft() {
        let demand = vec![DemandPiece::new("p", 50, 50, 2, 18)];
        let supply = vec![
            SupplySheet::new("a", 100, 100, 18),
            SupplySheet::new("b", 100, 100, 18),
        ];
        let result = Optimizer::new()
            .with_packer(StackingPacker)
            .match_demand(&demand, &supply, true);
        assert_eq!(result.sheets_used, 0);
        assert_eq!(result.unmatched_count("p"), 2);
    }

    #[test]
    fn test_kerf_needs_second_sheet() {
        let demand = vec![DemandPiece::new("half", 50, 100, 2, 18)];
        let supply = vec![
            SupplySheet::new("a", 100, 100, 18),
            SupplySheet::new("b", 100, 100, 18),
        ];
        let tight = Optimizer::new().match_demand(&demand, &supply, false);
        assert_eq!(tight.sheets_used, 1);

        let kerfed = Optimizer::new()
            .with_kerf(5)
            .match_demand(&demand, &supply, false);
        assert_result_valid(&kerfed, &demand);
        assert_eq!(kerfed.sheets_used, 2);
    }

    #[test]
    fn test_huge_kerf_places_one_piece_per_sheet() {
        let demand = vec![DemandPiece::new("p", 100, 100, 2, 18)];
        let supply = vec![SupplySheet::new("s1", 1220, 2440, 18)];
        let result = Optimizer::new()
            .with_kerf(u32::MAX)
            .optimize(&demand, &supply, PolicyMode::MinimizeWaste, true)
            .unwrap();
        assert_result_valid(&result, &demand);
        assert_eq!(result.placed_count("p"), 1);
        assert_eq!(result.unmatched_count("p"), 1);
    }

    /// Places the i-th piece at the i-th position, in the order given.
    struct FixedPacker(Vec<(u32, u32)>);

    impl Packer for FixedPacker {
        fn pack<'a>(
            &self,
            pieces: &[PieceInstance<'a>],
            _sheet: &SupplySheet,
            _allow_rotation: bool,
        ) -> PackOutcome<'a> {
            PackOutcome {
                placed: pieces
                    .iter()
                    .zip(&self.0)
                    .map(|(p, &(x, y))| Placement::new(p, x, y, false))
                    .collect(),
                unplaced: pieces.iter().skip(self.0.len()).copied().collect(),
            }
        }
    }

    #[test]
    fn test_row_tolerance_changes_cut_order() {
        let demand = vec![
            DemandPiece::new("a", 40, 10, 1, 18),
            DemandPiece::new("b", 40, 10, 1, 18),
        ];
        let supply = vec![SupplySheet::new("s", 100, 100, 18)];
        let optimizer = Optimizer::new().with_packer(FixedPacker(vec![(50, 0), (0, 15)]));
        let ranks = |result: &OptimizationResult| -> Vec<(String, u32)> {
            result.layouts[0]
                .placements
                .iter()
                .map(|p| (p.piece_id.clone(), p.cut_sequence))
                .collect()
        };

        // 15 is outside the default band of 10, so "b" starts a second row
        let separate = optimizer.match_demand(&demand, &supply, false);
        assert_result_valid(&separate, &demand);
        assert_eq!(
            ranks(&separate),
            vec![("a".to_string(), 1), ("b".to_string(), 2)]
        );

        let shared = optimizer
            .with_row_tolerance(20)
            .match_demand(&demand, &supply, false);
        assert_result_valid(&shared, &demand);
        assert_eq!(
            ranks(&shared),
            vec![("b".to_string(), 1), ("a".to_string(), 2)]
        );
    }

    /// Plywood cabinet: 30 pieces, six 2440x1220 sheets on hand.
    #[test]
    fn test_cabinet_mixed_sizes() {
        let demand = vec![
            DemandPiece::new("side", 800, 600, 5, 18).with_category("side"),
            DemandPiece::new("shelf", 400, 300, 8, 18).with_category("shelf"),
            DemandPiece::new("door", 600, 400, 4, 18).with_category("door"),
            DemandPiece::new("top", 1200, 600, 3, 18).with_category("top"),
            DemandPiece::new("rail", 300, 200, 6, 18).with_category("rail"),
            DemandPiece::new("panel", 500, 500, 4, 18).with_category("panel"),
        ];
        let supply: Vec<_> = (1..=6)
            .map(|i| SupplySheet::new(format!("s{i}"), 2440, 1220, 18))
            .collect();

        for mode in PolicyMode::ALL {
            let result = Optimizer::new()
                .with_kerf(3)
                .optimize(&demand, &supply, mode, true)
                .unwrap();
            assert_result_valid(&result, &demand);
            assert!(result.unmatched.is_empty(), "{mode} left pieces unmatched");
            assert!((0.0..=100.0).contains(&result.waste_percentage));
        }
    }
}
