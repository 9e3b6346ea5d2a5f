//! Area metrics: per-sheet waste, aggregate waste, and the coarse
//! material checks that run without packing anything.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::types::{DemandPiece, Placement, SheetLayout, SupplySheet};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SheetStats {
    pub stock_area: u64,
    pub used_area: u64,
    pub waste_area: u64,
    pub waste_percentage: f64,
    pub efficiency: f64,
}

impl SheetStats {
    fn from_areas(stock_area: u64, used_area: u64) -> Self {
        let waste_area = stock_area.saturating_sub(used_area);
        Self {
            stock_area,
            used_area,
            waste_area,
            waste_percentage: waste_area as f64 / stock_area as f64 * 100.0,
            efficiency: used_area as f64 / stock_area as f64 * 100.0,
        }
    }
}

/// Statistics for `layout` cut from `sheet`. Zero-area sheets are rejected,
/// as is a sheet whose id or dimensions differ from the ones in the layout.
pub fn sheet_stats(layout: &SheetLayout, sheet: &SupplySheet) -> Result<SheetStats> {
    if layout.sheet_id != sheet.id
        || layout.sheet_width != sheet.width
        || layout.sheet_height != sheet.height
    {
        return Err(EngineError::SheetMismatch {
            layout: layout.sheet_id.clone(),
            sheet: sheet.id.clone(),
        });
    }
    let stock_area = sheet.area();
    if stock_area == 0 {
        return Err(EngineError::DegenerateSheet {
            id: sheet.id.clone(),
        });
    }
    Ok(SheetStats::from_areas(stock_area, layout.used_area()))
}

impl SheetLayout {
    /// Statistics against the sheet dimensions recorded in the layout.
    pub fn stats(&self) -> Result<SheetStats> {
        let stock_area = self.sheet_rect().area();
        if stock_area == 0 {
            return Err(EngineError::DegenerateSheet {
                id: self.sheet_id.clone(),
            });
        }
        Ok(SheetStats::from_areas(stock_area, self.used_area()))
    }
}

/// Waste percentage of one sheet holding `placements`.
pub(crate) fn waste_percentage(sheet: &SupplySheet, placements: &[Placement]) -> f64 {
    let stock_area = sheet.area();
    if stock_area == 0 {
        return 0.0;
    }
    let used: u64 = placements.iter().map(Placement::area).sum();
    SheetStats::from_areas(stock_area, used).waste_percentage
}

/// Unused area over total area across every layout, as a percentage.
/// Zero when no sheet was used.
pub fn aggregate_waste(layouts: &[SheetLayout]) -> f64 {
    let total_stock: u64 = layouts.iter().map(|l| l.sheet_rect().area()).sum();
    if total_stock == 0 {
        return 0.0;
    }
    let total_used: u64 = layouts.iter().map(SheetLayout::used_area).sum();
    SheetStats::from_areas(total_stock, total_used).waste_percentage
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SufficiencyReport {
    pub is_sufficient: bool,
    pub available_area: u64,
    pub required_area: u64,
    pub shortfall: u64,
}

/// Compares the total demanded area with the area of available sheets.
///
/// Thickness is ignored and geometry is not considered, so a sufficient
/// report does not promise that everything will pack.
pub fn check_sufficiency(demand: &[DemandPiece], supply: &[SupplySheet]) -> SufficiencyReport {
    let required_area = demand
        .iter()
        .map(DemandPiece::total_area)
        .fold(0, u64::saturating_add);
    let available_area = supply
        .iter()
        .filter(|s| s.available)
        .map(SupplySheet::area)
        .fold(0, u64::saturating_add);
    let shortfall = required_area.saturating_sub(available_area);
    SufficiencyReport {
        is_sufficient: shortfall == 0,
        available_area,
        required_area,
        shortfall,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialEstimate {
    pub total_area: u64,
    pub piece_count: u64,
    pub largest_piece: Option<DemandPiece>,
}

pub fn estimate_material_needed(demand: &[DemandPiece]) -> MaterialEstimate {
    let largest_piece = demand
        .iter()
        .fold(None::<&DemandPiece>, |best, d| match best {
            Some(b) if b.area() >= d.area() => Some(b),
            _ => Some(d),
        })
        .cloned();
    MaterialEstimate {
        total_area: demand
            .iter()
            .map(DemandPiece::total_area)
            .fold(0, u64::saturating_add),
        piece_count: demand.iter().map(|d| d.quantity as u64).sum(),
        largest_piece,
    }
}
