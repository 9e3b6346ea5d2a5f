//! Cutting-stock matcher: assigns rectangular parts to stock sheets of the
//! same thickness, orders the cuts, and reports waste.
//!
//! ```
//! use sheet_matcher::{DemandPiece, PolicyMode, SupplySheet, optimize};
//!
//! let demand = vec![DemandPiece::new("top", 800, 500, 1, 18)];
//! let supply = vec![SupplySheet::new("birch-1", 1220, 2440, 18)];
//! let result = optimize(&demand, &supply, PolicyMode::MinimizeWaste, true).unwrap();
//! assert_eq!(result.sheets_used, 1);
//! assert!(result.unmatched.is_empty());
//! ```

pub mod error;
pub mod guillotine;
pub mod packer;
pub mod policy;
pub mod sequence;
pub mod solver;
pub mod stats;
pub mod types;

pub use error::{EngineError, Result};
pub use guillotine::GuillotinePacker;
pub use packer::{PackOutcome, Packer};
pub use policy::PolicyMode;
pub use solver::Optimizer;
pub use stats::{
    MaterialEstimate, SheetStats, SufficiencyReport, check_sufficiency, estimate_material_needed,
    sheet_stats,
};
pub use types::{DemandPiece, OptimizationResult, Placement, SheetLayout, SupplySheet};

/// Runs one optimization with the default packer and no kerf.
pub fn optimize(
    demand: &[DemandPiece],
    supply: &[SupplySheet],
    mode: PolicyMode,
    allow_rotation: bool,
) -> Result<OptimizationResult> {
    Optimizer::new().optimize(demand, supply, mode, allow_rotation)
}
