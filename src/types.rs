use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub w: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub h: u32,
}

impl Rect {
    pub fn new(w: u32, h: u32) -> Self {
        Self { w, h }
    }

    pub fn area(&self) -> u64 {
        self.w as u64 * self.h as u64
    }

    pub fn perimeter(&self) -> u64 {
        2 * (self.w as u64 + self.h as u64)
    }

    pub fn rotated(&self) -> Self {
        Self {
            w: self.h,
            h: self.w,
        }
    }

    pub fn fits_in(&self, other: &Rect) -> bool {
        self.w <= other.w && self.h <= other.h
    }
}

impl std::fmt::Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.w, self.h)
    }
}

/// Accepts JSON numbers such as `18` or `18.0` for a `u32` field.
/// Negative, fractional or out-of-range values are rejected.
pub fn deserialize_u32_from_number<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if value.fract() != 0.0 || value < 0.0 || value > u32::MAX as f64 {
        return Err(serde::de::Error::custom(format!(
            "expected a non-negative whole number, got {value}"
        )));
    }
    Ok(value as u32)
}

/// One distinct part type to cut, with the number of copies needed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemandPiece {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub width: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub height: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub quantity: u32,
    #[serde(default)]
    pub category: String,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub thickness: u32,
}

impl DemandPiece {
    pub fn new(
        id: impl Into<String>,
        width: u32,
        height: u32,
        quantity: u32,
        thickness: u32,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            width,
            height,
            quantity,
            category: String::new(),
            thickness,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.width, self.height)
    }

    /// Area of a single instance.
    pub fn area(&self) -> u64 {
        self.rect().area()
    }

    pub fn total_area(&self) -> u64 {
        self.area().saturating_mul(self.quantity as u64)
    }

    /// Expands the piece into `quantity` unit instances.
    pub fn instances(&self) -> impl Iterator<Item = PieceInstance<'_>> {
        (0..self.quantity).map(move |instance| PieceInstance {
            piece: self,
            instance,
        })
    }
}

/// One stock sheet the run may cut from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplySheet {
    pub id: String,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub width: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub height: u32,
    #[serde(deserialize_with = "deserialize_u32_from_number")]
    pub thickness: u32,
    #[serde(default = "default_true")]
    pub available: bool,
}

fn default_true() -> bool {
    true
}

impl SupplySheet {
    pub fn new(id: impl Into<String>, width: u32, height: u32, thickness: u32) -> Self {
        Self {
            id: id.into(),
            width,
            height,
            thickness,
            available: true,
        }
    }

    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.width, self.height)
    }

    pub fn area(&self) -> u64 {
        self.rect().area()
    }
}

/// A single copy of a demand piece, borrowed from the run's demand list.
#[derive(Debug, Clone, Copy)]
pub struct PieceInstance<'a> {
    pub piece: &'a DemandPiece,
    pub instance: u32,
}

impl PieceInstance<'_> {
    pub fn rect(&self) -> Rect {
        self.piece.rect()
    }

    pub fn area(&self) -> u64 {
        self.piece.area()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub piece_id: String,
    pub piece_name: String,
    pub category: String,
    pub instance: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub rotated: bool,
    /// 1-based position in the cut order; 0 until sequenced.
    pub cut_sequence: u32,
}

impl Placement {
    pub fn new(instance: &PieceInstance<'_>, x: u32, y: u32, rotated: bool) -> Self {
        let rect = if rotated {
            instance.rect().rotated()
        } else {
            instance.rect()
        };
        Self {
            piece_id: instance.piece.id.clone(),
            piece_name: instance.piece.name.clone(),
            category: instance.piece.category.clone(),
            instance: instance.instance,
            x,
            y,
            width: rect.w,
            height: rect.h,
            rotated,
            cut_sequence: 0,
        }
    }

    pub fn rect(&self) -> Rect {
        Rect::new(self.width, self.height)
    }

    pub fn area(&self) -> u64 {
        self.rect().area()
    }

    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// True when the interiors of the two placements intersect.
    pub fn overlaps(&self, other: &Placement) -> bool {
        (self.x as u64) < other.right()
            && (other.x as u64) < self.right()
            && (self.y as u64) < other.bottom()
            && (other.y as u64) < self.bottom()
    }
}

/// Everything cut from one sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetLayout {
    pub sheet_id: String,
    pub sheet_width: u32,
    pub sheet_height: u32,
    pub thickness: u32,
    pub placements: Vec<Placement>,
    pub waste_percentage: f64,
}

impl SheetLayout {
    pub fn sheet_rect(&self) -> Rect {
        Rect::new(self.sheet_width, self.sheet_height)
    }

    pub fn used_area(&self) -> u64 {
        self.placements.iter().map(Placement::area).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizationResult {
    pub layouts: Vec<SheetLayout>,
    /// Demand that could not be placed, one entry per piece with the missing quantity.
    pub unmatched: Vec<DemandPiece>,
    pub waste_percentage: f64,
    pub sheets_used: usize,
    /// Whether the run let pieces turn 90 degrees.
    pub rotation_allowed: bool,
}

impl OptimizationResult {
    pub fn empty(rotation_allowed: bool) -> Self {
        Self {
            layouts: Vec::new(),
            unmatched: Vec::new(),
            waste_percentage: 0.0,
            sheets_used: 0,
            rotation_allowed,
        }
    }

    pub fn placed_count(&self, piece_id: &str) -> u32 {
        self.layouts
            .iter()
            .flat_map(|l| &l.placements)
            .filter(|p| p.piece_id == piece_id)
            .count() as u32
    }

    pub fn unmatched_count(&self, piece_id: &str) -> u32 {
        self.unmatched
            .iter()
            .filter(|d| d.id == piece_id)
            .map(|d| d.quantity)
            .sum()
    }

    pub fn total_used_area(&self) -> u64 {
        self.layouts
            .iter()
            .map(SheetLayout::used_area)
            .fold(0, u64::saturating_add)
    }

    pub fn total_stock_area(&self) -> u64 {
        self.layouts
            .iter()
            .map(|l| l.sheet_rect().area())
            .fold(0, u64::saturating_add)
    }

    /// True when every demanded piece was placed.
    pub fn is_complete(&self) -> bool {
        self.unmatched.is_empty()
    }
}
