#![deny(warnings)]

//! Core domain records for the league scheduler.
//!
//! This crate defines the serializable report types exchanged with the
//! scheduling backend, the two-shaped [`RegionalQuantity`], and validation
//! helpers that check the invariants the quota accounting relies on.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Maximum length of a region title, in bytes.
pub const MAX_REGION_TITLE_LEN: usize = 64;

/// Identifier of a region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegionId(pub u64);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a scheduling target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetId(pub u64);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An administrative grouping of teams and fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub id: RegionId,
    /// Display name.
    pub title: String,
}

/// A tag shared by a set of teams.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamGroup {
    pub id: u64,
    pub name: String,
}

/// A required set of matches, optionally pinned to a reservation type.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    #[serde(default)]
    pub maybe_reservation_type: Option<u64>,
}

/// A target together with the team groups it selects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetExtension {
    pub target: Target,
    pub groups: Vec<TeamGroup>,
}

/// A match count, either global or broken down per region.
///
/// Serialized in the externally tagged form used on the wire:
/// `{"Interregional": 5}` or `{"Regional": [[1, 2], [2, 3]]}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionalQuantity {
    /// A single count not attributed to any region.
    Interregional(u64),
    /// Per-region counts in insertion order. A region appears at most once.
    Regional(Vec<(RegionId, u64)>),
}

impl RegionalQuantity {
    /// Which of the two variants this value is.
    pub fn shape(&self) -> QuantityShape {
        match self {
            RegionalQuantity::Interregional(_) => QuantityShape::Interregional,
            RegionalQuantity::Regional(_) => QuantityShape::Regional,
        }
    }
}

/// Payload-free discriminant of [`RegionalQuantity`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantityShape {
    Interregional,
    Regional,
}

impl QuantityShape {
    /// The shape a report with the given `interregional` flag operates in.
    pub fn for_report(interregional: bool) -> Self {
        if interregional {
            QuantityShape::Interregional
        } else {
            QuantityShape::Regional
        }
    }
}

impl fmt::Display for QuantityShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuantityShape::Interregional => f.write_str("interregional"),
            QuantityShape::Regional => f.write_str("regional"),
        }
    }
}

/// A target paired with how many matches it needs and how many it got.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplyRequireEntry {
    pub target: TargetExtension,
    pub required: RegionalQuantity,
    pub supplied: RegionalQuantity,
}

/// Targets that select the exact same set of team groups.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateEntry {
    pub team_groups: Vec<TeamGroup>,
    pub used_by: Vec<TargetExtension>,
    /// How many teams carry this group set.
    pub teams_with_group_set: RegionalQuantity,
}

/// Validation snapshot produced before a schedule is generated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreScheduleReport {
    pub target_duplicates: Vec<DuplicateEntry>,
    pub target_has_duplicates: Vec<TargetId>,
    pub target_match_count: Vec<SupplyRequireEntry>,
    pub total_matches_required: u64,
    pub total_matches_supplied: u64,
    pub interregional: bool,
}

impl PreScheduleReport {
    /// The quantity shape every entry of this report is expected to use.
    pub fn shape(&self) -> QuantityShape {
        QuantityShape::for_report(self.interregional)
    }
}

/// Parameters the backend uses to generate a [`PreScheduleReport`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreScheduleReportInput {
    pub matches_to_play: u64,
    pub interregional: bool,
}

/// Errors for region directory construction and lookup.
#[derive(Debug, Error, PartialEq)]
pub enum CoreError {
    /// No region with this id is known.
    #[error("region {0} not found")]
    UnknownRegion(RegionId),
    /// Two region records share an id.
    #[error("region {0} is listed more than once")]
    DuplicateRegionRecord(RegionId),
    /// Input could not be decoded.
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Parse(e.to_string())
    }
}

/// Validation errors for domain invariants.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    /// A region id occurs twice inside one regional quantity.
    #[error("region {0} appears more than once in a regional quantity")]
    DuplicateRegion(RegionId),
    /// An entry uses a different quantity shape than its report.
    #[error("target {target} uses a {found} quantity in a {expected} report")]
    ShapeDisagreesWithReport {
        target: TargetId,
        expected: QuantityShape,
        found: QuantityShape,
    },
    /// A duplicate group's team count uses a different shape than its report.
    #[error("duplicate group {group} uses a {found} quantity in a {expected} report")]
    GroupShapeDisagreesWithReport {
        group: usize,
        expected: QuantityShape,
        found: QuantityShape,
    },
    /// A target is flagged as duplicated but no duplicate group mentions it.
    #[error("target {0} is flagged as duplicated but belongs to no duplicate group")]
    UnknownDuplicateTarget(TargetId),
}

/// Rejections for a new region.
#[derive(Debug, Error, PartialEq, Serialize, Deserialize)]
pub enum RegionValidationError {
    #[error("region name cannot be empty")]
    EmptyName,
    #[error("region name is {len} characters which is larger than the max, 64")]
    NameTooLong { len: usize },
}

/// Request to create a region.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRegionInput {
    pub title: String,
}

impl CreateRegionInput {
    pub fn validate(&self) -> Result<(), RegionValidationError> {
        let len = self.title.len();
        if self.title.is_empty() {
            return Err(RegionValidationError::EmptyName);
        }
        if len > MAX_REGION_TITLE_LEN {
            return Err(RegionValidationError::NameTooLong { len });
        }
        Ok(())
    }
}

/// Check that no region id repeats inside a regional quantity.
pub fn validate_quantity(q: &RegionalQuantity) -> Result<(), ValidationError> {
    if let RegionalQuantity::Regional(entries) = q {
        let mut seen: BTreeSet<RegionId> = BTreeSet::new();
        for (region, _) in entries {
            if !seen.insert(*region) {
                return Err(ValidationError::DuplicateRegion(*region));
            }
        }
    }
    Ok(())
}

fn check_shape(
    target: TargetId,
    expected: QuantityShape,
    q: &RegionalQuantity,
) -> Result<(), ValidationError> {
    let found = q.shape();
    if found != expected {
        return Err(ValidationError::ShapeDisagreesWithReport {
            target,
            expected,
            found,
        });
    }
    validate_quantity(q)
}

/// Validate a report, including cross-references between duplicate groups
/// and flagged targets.
pub fn validate_report(report: &PreScheduleReport) -> Result<(), ValidationError> {
    let expected = report.shape();
    for entry in &report.target_match_count {
        let id = entry.target.target.id;
        check_shape(id, expected, &entry.required)?;
        check_shape(id, expected, &entry.supplied)?;
    }

    let mut duplicated: BTreeSet<TargetId> = BTreeSet::new();
    for (group, dup) in report.target_duplicates.iter().enumerate() {
        let found = dup.teams_with_group_set.shape();
        if found != expected {
            return Err(ValidationError::GroupShapeDisagreesWithReport {
                group,
                expected,
                found,
            });
        }
        validate_quantity(&dup.teams_with_group_set)?;
        duplicated.extend(dup.used_by.iter().map(|t| t.target.id));
    }
    for id in &report.target_has_duplicates {
        if !duplicated.contains(id) {
            return Err(ValidationError::UnknownDuplicateTarget(*id));
        }
    }
    Ok(())
}

/// In-memory region table used to resolve region ids to display titles.
#[derive(Clone, Debug, Default)]
pub struct RegionDirectory {
    regions: BTreeMap<RegionId, Region>,
}

impl RegionDirectory {
    /// Build a directory, rejecting repeated ids.
    pub fn new(regions: impl IntoIterator<Item = Region>) -> Result<Self, CoreError> {
        let mut map = BTreeMap::new();
        for region in regions {
            let id = region.id;
            if map.insert(id, region).is_some() {
                return Err(CoreError::DuplicateRegionRecord(id));
            }
        }
        debug!(regions = map.len(), "region directory built");
        Ok(Self { regions: map })
    }

    /// Parse a JSON array of regions.
    pub fn from_json(text: &str) -> Result<Self, CoreError> {
        let regions: Vec<Region> = serde_json::from_str(text)?;
        Self::new(regions)
    }

    pub fn get(&self, id: RegionId) -> Result<&Region, CoreError> {
        self.regions.get(&id).ok_or(CoreError::UnknownRegion(id))
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}
