//! Error types for the matching engine.

use thiserror::Error;

/// Rejections for input the engine cannot produce meaningful numbers from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("piece '{id}' has zero dimension {width}x{height}")]
    ZeroPieceDimension { id: String, width: u32, height: u32 },

    #[error("piece '{id}' has zero quantity")]
    ZeroQuantity { id: String },

    #[error("piece id '{id}' appears more than once in the demand list")]
    DuplicatePieceId { id: String },

    #[error("sheet '{id}' has zero dimension {width}x{height}")]
    ZeroSheetDimension { id: String, width: u32, height: u32 },

    #[error("layout for sheet '{layout}' does not match sheet '{sheet}'")]
    SheetMismatch { layout: String, sheet: String },

    #[error("statistics requested for zero-area sheet '{id}'")]
    DegenerateSheet { id: String },
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
