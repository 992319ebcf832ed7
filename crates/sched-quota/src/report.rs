//! Consistency audit over a whole pre-schedule report.

use crate::{is_entry_satisfied, sum_total, QuotaError};
use sched_core::{PreScheduleReport, TargetId};
use serde::Serialize;
use tracing::info;

/// Totals recomputed from a report's entries.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReportAudit {
    /// Saturating sum of every entry's required quantity.
    pub total_required: u64,
    /// Saturating sum of every entry's supplied quantity.
    pub total_supplied: u64,
    /// Both recomputed totals equal the totals stored in the report.
    pub totals_match: bool,
    /// Targets whose requirement is not met, in entry order.
    pub under_supplied: Vec<TargetId>,
}

impl ReportAudit {
    pub fn all_satisfied(&self) -> bool {
        self.under_supplied.is_empty()
    }
}

/// Recompute totals and find under-supplied targets.
///
/// Fails on the first entry whose required and supplied quantities differ in
/// shape.
pub fn audit_report(report: &PreScheduleReport) -> Result<ReportAudit, QuotaError> {
    let mut total_required = 0u64;
    let mut total_supplied = 0u64;
    let mut under_supplied = Vec::new();

    for entry in &report.target_match_count {
        if !is_entry_satisfied(entry)? {
            under_supplied.push(entry.target.target.id);
        }
        total_required = total_required.saturating_add(sum_total(&entry.required));
        total_supplied = total_supplied.saturating_add(sum_total(&entry.supplied));
    }

    let totals_match = total_required == report.total_matches_required
        && total_supplied == report.total_matches_supplied;

    info!(
        entries = report.target_match_count.len(),
        total_required,
        total_supplied,
        under_supplied = under_supplied.len(),
        totals_match,
        "report audited"
    );

    Ok(ReportAudit {
        total_required,
        total_supplied,
        totals_match,
        under_supplied,
    })
}
