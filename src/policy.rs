use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::types::DemandPiece;

/// Selectable optimization mode. Each mode is a demand ordering plus a
/// rotation switch; all of them run through the same matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum PolicyMode {
    #[default]
    MinimizeWaste,
    SimplifyCuts,
    GrainDirection,
    MinimizeSheets,
    LargestFirst,
    EdgeAlignment,
}

impl PolicyMode {
    pub const ALL: [PolicyMode; 6] = [
        PolicyMode::MinimizeWaste,
        PolicyMode::SimplifyCuts,
        PolicyMode::GrainDirection,
        PolicyMode::MinimizeSheets,
        PolicyMode::LargestFirst,
        PolicyMode::EdgeAlignment,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PolicyMode::MinimizeWaste => "minimize-waste",
            PolicyMode::SimplifyCuts => "simplify-cuts",
            PolicyMode::GrainDirection => "grain-direction",
            PolicyMode::MinimizeSheets => "minimize-sheets",
            PolicyMode::LargestFirst => "largest-first",
            PolicyMode::EdgeAlignment => "edge-alignment",
        }
    }

    /// Lenient lookup: unknown names fall back to `MinimizeWaste`.
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            tracing::warn!(mode = name, "unrecognized mode, using minimize-waste");
            PolicyMode::MinimizeWaste
        })
    }

    pub fn allows_rotation(&self) -> bool {
        match self {
            PolicyMode::MinimizeWaste | PolicyMode::MinimizeSheets | PolicyMode::LargestFirst => {
                true
            }
            PolicyMode::SimplifyCuts | PolicyMode::GrainDirection | PolicyMode::EdgeAlignment => {
                false
            }
        }
    }

    /// Comparator for the demand list, or `None` to keep caller order.
    fn ordering(&self) -> Option<fn(&DemandPiece, &DemandPiece) -> Ordering> {
        match self {
            PolicyMode::MinimizeWaste => None,
            PolicyMode::SimplifyCuts | PolicyMode::MinimizeSheets | PolicyMode::LargestFirst => {
                Some(by_area_desc)
            }
            PolicyMode::GrainDirection => Some(by_category),
            PolicyMode::EdgeAlignment => Some(by_perimeter_desc),
        }
    }

    /// Returns the demand in the order this mode feeds it to the matcher.
    /// The sort is stable, so equal keys keep caller order.
    pub fn order_demand(&self, demand: &[DemandPiece]) -> Vec<DemandPiece> {
        let mut ordered = demand.to_vec();
        if let Some(cmp) = self.ordering() {
            ordered.sort_by(cmp);
        }
        ordered
    }
}

fn by_area_desc(a: &DemandPiece, b: &DemandPiece) -> Ordering {
    b.area().cmp(&a.area())
}

fn by_category(a: &DemandPiece, b: &DemandPiece) -> Ordering {
    a.category.cmp(&b.category)
}

fn by_perimeter_desc(a: &DemandPiece, b: &DemandPiece) -> Ordering {
    b.rect().perimeter().cmp(&a.rect().perimeter())
}

impl std::fmt::Display for PolicyMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PolicyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PolicyMode::ALL
            .into_iter()
            .find(|m| m.name() == s)
            .ok_or_else(|| {
                format!(
                    "invalid mode '{}', expected one of: {}",
                    s,
                    PolicyMode::ALL.map(|m| m.name()).join(", ")
                )
            })
    }
}

impl From<String> for PolicyMode {
    fn from(s: String) -> Self {
        PolicyMode::from_name(&s)
    }
}
