//! Viability evaluation: compare an estimate against declared capacity.

use serde::{Deserialize, Serialize};

use crate::model::{AvailableResources, ResourceEstimate};

/// Utilization above this leaves less than comfortable headroom.
pub const HIGH_UTILIZATION: f64 = 0.7;
/// Utilization above this is a tight fit likely to fail under real-world variance.
pub const RISKY_UTILIZATION: f64 = 0.9;

/// Qualitative bucket derived from utilization.
///
/// Thresholds are exclusive: a ratio of exactly [`HIGH_UTILIZATION`] is still
/// `Optimal`, and exactly [`RISKY_UTILIZATION`] is still `High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceCategory {
    /// Comfortable headroom.
    Optimal,
    /// Fits, with utilization above 70%.
    High,
    /// Fits, with utilization above 90%.
    Risky,
    /// Over budget on at least one resource.
    Nonviable,
}

impl PerformanceCategory {
    pub fn label(&self) -> &'static str {
        match self {
            PerformanceCategory::Optimal => "optimal",
            PerformanceCategory::High => "high",
            PerformanceCategory::Risky => "risky",
            PerformanceCategory::Nonviable => "nonviable",
        }
    }
}

impl std::fmt::Display for PerformanceCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of comparing an estimate against available resources.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViabilityVerdict {
    pub vram_viable: bool,
    pub ram_viable: bool,
    pub viable: bool,
    /// Estimate / capacity, unclamped; infinite when capacity is zero.
    pub vram_utilization: f64,
    pub ram_utilization: f64,
    pub performance_category: PerformanceCategory,
}

impl ViabilityVerdict {
    /// The larger of the two utilization ratios.
    pub fn peak_utilization(&self) -> f64 {
        self.vram_utilization.max(self.ram_utilization)
    }
}

fn utilization(estimate: u64, capacity: u64) -> f64 {
    if capacity == 0 {
        f64::INFINITY
    } else {
        estimate as f64 / capacity as f64
    }
}

/// Classify `estimate` against `available`.
pub fn evaluate_viability(
    estimate: &ResourceEstimate,
    available: &AvailableResources,
) -> ViabilityVerdict {
    let vram_utilization = utilization(estimate.vram_bytes, available.vram_bytes);
    let ram_utilization = utilization(estimate.ram_bytes, available.ram_bytes);

    let vram_viable = available.vram_bytes > 0 && estimate.vram_bytes <= available.vram_bytes;
    let ram_viable = available.ram_bytes > 0 && estimate.ram_bytes <= available.ram_bytes;
    let viable = vram_viable && ram_viable;

    let performance_category = if !viable {
        PerformanceCategory::Nonviable
    } else if vram_utilization > RISKY_UTILIZATION || ram_utilization > RISKY_UTILIZATION {
        PerformanceCategory::Risky
    } else if vram_utilization > HIGH_UTILIZATION || ram_utilization > HIGH_UTILIZATION {
        PerformanceCategory::High
    } else {
        PerformanceCategory::Optimal
    };

    tracing::debug!(
        vram_utilization,
        ram_utilization,
        viable,
        category = %performance_category,
        "Evaluated viability"
    );

    ViabilityVerdict {
        vram_viable,
        ram_viable,
        viable,
        vram_utilization,
        ram_utilization,
        performance_category,
    }
}
