#![deny(warnings)]

//! Regional quota accounting: how many matches a target requires versus how
//! many the schedule inputs can supply.
//!
//! This crate provides:
//! - Total-sum reduction over a [`RegionalQuantity`]
//! - Per-region and whole-quantity satisfaction checks
//! - Region-resolved rendering of a required/supplied pair ([`format`])
//! - A consistency audit over a whole [`sched_core::PreScheduleReport`] ([`report`])

pub mod format;
pub mod report;

pub use format::{
    breakdown, format_pretty, format_with, FormatOptions, QuotaBreakdown, RegionLine, RenderStyle,
};
pub use report::{audit_report, ReportAudit};

use sched_core::{QuantityShape, RegionId, RegionalQuantity, SupplyRequireEntry};
use serde::Serialize;
use std::collections::HashMap;
use thiserror::Error;
use tracing::warn;

/// Errors produced by quota comparison and formatting.
#[derive(Debug, Error)]
pub enum QuotaError {
    /// Required and supplied quantities use different variants.
    #[error("required quantity is {required} but supplied quantity is {supplied}")]
    MismatchedQuantityShape {
        required: QuantityShape,
        supplied: QuantityShape,
    },
    /// The caller's region lookup failed while rendering.
    #[error("could not load region {region_id}: {source}")]
    RegionLookupFailed {
        region_id: RegionId,
        #[source]
        source: anyhow::Error,
    },
}

/// Total number of matches in a quantity.
///
/// Regional counts are added with saturation, so the result is capped at
/// `u64::MAX` instead of wrapping. Saturating addition of unsigned values is
/// order independent, so entry order never changes the total.
pub fn sum_total(quantity: &RegionalQuantity) -> u64 {
    match quantity {
        RegionalQuantity::Interregional(n) => *n,
        RegionalQuantity::Regional(entries) => entries
            .iter()
            .fold(0u64, |acc, &(_, count)| acc.saturating_add(count)),
    }
}

/// Required and supplied count for one required region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct RegionComparison {
    pub region_id: RegionId,
    pub required: u64,
    pub supplied: u64,
}

impl RegionComparison {
    pub fn is_satisfied(&self) -> bool {
        self.supplied >= self.required
    }
}

/// Result of lining up a required quantity against a supplied one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum Comparison {
    Interregional { required: u64, supplied: u64 },
    /// One row per required region, in required order.
    Regional(Vec<RegionComparison>),
}

impl Comparison {
    /// True when every required count is met. An empty regional comparison
    /// is vacuously satisfied.
    pub fn is_satisfied(&self) -> bool {
        match self {
            Comparison::Interregional { required, supplied } => supplied >= required,
            Comparison::Regional(rows) => rows.iter().all(RegionComparison::is_satisfied),
        }
    }
}

/// Line up `required` against `supplied`.
///
/// Regions only present in `supplied` are ignored; surplus in one region
/// never offsets a deficit in another. If `supplied` repeats a region id the
/// last occurrence wins.
pub fn compare(
    required: &RegionalQuantity,
    supplied: &RegionalQuantity,
) -> Result<Comparison, QuotaError> {
    match (required, supplied) {
        (RegionalQuantity::Interregional(r), RegionalQuantity::Interregional(s)) => {
            Ok(Comparison::Interregional {
                required: *r,
                supplied: *s,
            })
        }
        (RegionalQuantity::Regional(req), RegionalQuantity::Regional(sup)) => {
            let supplied_by_region: HashMap<RegionId, u64> = sup.iter().copied().collect();
            let rows = req
                .iter()
                .map(|&(region_id, required)| RegionComparison {
                    region_id,
                    required,
                    supplied: supplied_by_region.get(&region_id).copied().unwrap_or(0),
                })
                .collect();
            Ok(Comparison::Regional(rows))
        }
        _ => {
            let err = QuotaError::MismatchedQuantityShape {
                required: required.shape(),
                supplied: supplied.shape(),
            };
            warn!(%err, "refusing to compare quantities");
            Err(err)
        }
    }
}

/// Whether `supplied` meets `required` in every required region (or in the
/// single interregional count).
pub fn is_satisfied(
    required: &RegionalQuantity,
    supplied: &RegionalQuantity,
) -> Result<bool, QuotaError> {
    Ok(compare(required, supplied)?.is_satisfied())
}

/// [`is_satisfied`] applied to an entry's own required/supplied pair.
pub fn is_entry_satisfied(entry: &SupplyRequireEntry) -> Result<bool, QuotaError> {
    is_satisfied(&entry.required, &entry.supplied)
}
