//! Region-resolved rendering of a required/supplied pair.
//!
//! Rendering happens in two steps. [`breakdown`] lines up the quantities and
//! resolves every required region's title through the caller's lookup,
//! producing a [`QuotaBreakdown`]. [`QuotaBreakdown::render_html`] and
//! [`QuotaBreakdown::render_plain`] then turn that into text without any
//! further I/O.

use crate::{compare, Comparison, QuotaError};
use futures::stream::{self, StreamExt, TryStreamExt};
use sched_core::{Region, RegionId, RegionalQuantity};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, warn};

/// Shown when a regional requirement lists no regions at all.
pub const NO_REGION_DEPENDENTS: &str = "0 (No region dependents)";

const CONTAINER_OPEN: &str = r#"<div style="display: flex; flex-direction: column;">"#;
const CONTAINER_CLOSE: &str = "</div>";

/// Output flavour for [`format_with`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderStyle {
    /// Block container markup, rendered verbatim by the presentation layer.
    #[default]
    Html,
    /// One line per region, for terminals and logs.
    Plain,
}

/// Rendering options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatOptions {
    pub style: RenderStyle,
    /// Upper bound on region lookups in flight at once. Zero behaves as one.
    pub max_concurrent_lookups: usize,
}

impl Default for FormatOptions {
    fn default() -> Self {
        Self {
            style: RenderStyle::Html,
            max_concurrent_lookups: 8,
        }
    }
}

/// One required region with its resolved title.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegionLine {
    pub region_id: RegionId,
    pub title: String,
    pub supplied: u64,
    pub required: u64,
}

impl RegionLine {
    /// Supplied falls short of required.
    pub fn is_short(&self) -> bool {
        self.supplied < self.required
    }
}

/// Display-ready comparison of a required quantity against a supplied one.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum QuotaBreakdown {
    /// Only the required count is shown for interregional quantities.
    Interregional { required: u64 },
    NoRegionDependents,
    /// Lines in required order.
    Regional(Vec<RegionLine>),
}

impl QuotaBreakdown {
    pub fn render_html(&self) -> String {
        match self {
            QuotaBreakdown::Interregional { required } => required.to_string(),
            QuotaBreakdown::NoRegionDependents => NO_REGION_DEPENDENTS.to_string(),
            QuotaBreakdown::Regional(lines) => {
                let mut out = String::from(CONTAINER_OPEN);
                for line in lines {
                    let color = if line.is_short() { "red" } else { "unset" };
                    out.push_str(&format!(
                        r#"<div>{} &mdash; <span style="color: {}">{}/{}</span></div>"#,
                        html_escape::encode_text(&line.title),
                        color,
                        line.supplied,
                        line.required
                    ));
                }
                out.push_str(CONTAINER_CLOSE);
                out
            }
        }
    }

    /// Newline-separated text; short regions are marked with `[short]`.
    pub fn render_plain(&self) -> String {
        match self {
            QuotaBreakdown::Interregional { required } => required.to_string(),
            QuotaBreakdown::NoRegionDependents => NO_REGION_DEPENDENTS.to_string(),
            QuotaBreakdown::Regional(lines) => lines
                .iter()
                .map(|line| {
                    let marker = if line.is_short() { " [short]" } else { "" };
                    format!(
                        "{} \u{2014} {}/{}{}",
                        line.title, line.supplied, line.required, marker
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    pub fn render(&self, style: RenderStyle) -> String {
        match style {
            RenderStyle::Html => self.render_html(),
            RenderStyle::Plain => self.render_plain(),
        }
    }
}

/// Compare `required` against `supplied` and resolve every required region
/// through `lookup`.
///
/// Up to `max_concurrent_lookups` lookups run at once; lines always come back
/// in required order. The first failing lookup aborts the call and the
/// remaining lookups are dropped.
pub async fn breakdown<F, Fut, E>(
    lookup: F,
    required: &RegionalQuantity,
    supplied: &RegionalQuantity,
    max_concurrent_lookups: usize,
) -> Result<QuotaBreakdown, QuotaError>
where
    F: Fn(RegionId) -> Fut,
    Fut: Future<Output = Result<Region, E>>,
    E: Into<anyhow::Error>,
{
    let rows = match compare(required, supplied)? {
        Comparison::Interregional { required, .. } => {
            return Ok(QuotaBreakdown::Interregional { required })
        }
        Comparison::Regional(rows) if rows.is_empty() => {
            return Ok(QuotaBreakdown::NoRegionDependents)
        }
        Comparison::Regional(rows) => rows,
    };

    debug!(regions = rows.len(), "resolving region titles");
    let lookup = &lookup;
    let lines = stream::iter(rows)
        .map(move |row| async move {
            match lookup(row.region_id).await {
                Ok(region) => Ok(RegionLine {
                    region_id: row.region_id,
                    title: region.title,
                    supplied: row.supplied,
                    required: row.required,
                }),
                Err(e) => {
                    let source: anyhow::Error = e.into();
                    warn!(region = %row.region_id, error = %source, "region lookup failed");
                    Err(QuotaError::RegionLookupFailed {
                        region_id: row.region_id,
                        source,
                    })
                }
            }
        })
        .buffered(max_concurrent_lookups.max(1))
        .try_collect::<Vec<_>>()
        .await?;

    Ok(QuotaBreakdown::Regional(lines))
}

/// Render `required` against `supplied` as block markup using default options.
pub async fn format_pretty<F, Fut, E>(
    lookup: F,
    required: &RegionalQuantity,
    supplied: &RegionalQuantity,
) -> Result<String, QuotaError>
where
    F: Fn(RegionId) -> Fut,
    Fut: Future<Output = Result<Region, E>>,
    E: Into<anyhow::Error>,
{
    format_with(lookup, required, supplied, &FormatOptions::default()).await
}

/// Render `required` against `supplied` in the configured style.
pub async fn format_with<F, Fut, E>(
    lookup: F,
    required: &RegionalQuantity,
    supplied: &RegionalQuantity,
    options: &FormatOptions,
) -> Result<String, QuotaError>
where
    F: Fn(RegionId) -> Fut,
    Fut: Future<Output = Result<Region, E>>,
    E: Into<anyhow::Error>,
{
    let b = breakdown(lookup, required, supplied, options.max_concurrent_lookups).await?;
    Ok(b.render(options.style))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sched_core::{CoreError, QuantityShape, RegionDirectory};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn regional(pairs: &[(u64, u64)]) -> RegionalQuantity {
        RegionalQuantity::Regional(pairs.iter().map(|&(r, n)| (RegionId(r), n)).collect())
    }

    fn directory() -> RegionDirectory {
        RegionDirectory::new(vec![
            Region {
                id: RegionId(1),
                title: "North".to_string(),
            },
            Region {
                id: RegionId(2),
                title: "South".to_string(),
            },
            Region {
                id: RegionId(3),
                title: "East & West".to_string(),
            },
        ])
        .unwrap()
    }

    fn lookup_in(
        dir: &RegionDirectory,
    ) -> impl Fn(RegionId) -> std::future::Ready<Result<Region, CoreError>> + '_ {
        move |id| std::future::ready(dir.get(id).cloned())
    }

    #[tokio::test]
    async fn regional_lines_in_required_order() {
        let dir = directory();
        let out = format_pretty(
            lookup_in(&dir),
            &regional(&[(1, 2), (2, 3)]),
            &regional(&[(1, 2), (2, 1)]),
        )
        .await
        .unwrap();
        assert_eq!(
            out,
            concat!(
                r#"<div style="display: flex; flex-direction: column;">"#,
                r#"<div>North &mdash; <span style="color: unset">2/2</span></div>"#,
                r#"<div>South &mdash; <span style="color: red">1/3</span></div>"#,
                "</div>"
            )
        );
    }

    #[tokio::test]
    async fn empty_requirement_renders_fixed_message() {
        let dir = directory();
        let out = format_pretty(lookup_in(&dir), &regional(&[]), &regional(&[(1, 9)]))
            .await
            .unwrap();
        assert_eq!(out, "0 (No region dependents)");
    }

    #[tokio::test]
    async fn interregional_shows_required_only() {
        let dir = directory();
        let out = format_pretty(
            lookup_in(&dir),
            &RegionalQuantity::Interregional(5),
            &RegionalQuantity::Interregional(7),
        )
        .await
        .unwrap();
        assert_eq!(out, "5");
    }

    #[tokio::test]
    async fn lookup_failure_aborts_without_output() {
        let dir = directory();
        let err = format_pretty(
            lookup_in(&dir),
            &regional(&[(1, 1), (99, 1), (2, 1)]),
            &regional(&[]),
        )
        .await
        .unwrap_err();
        match err {
            QuotaError::RegionLookupFailed { region_id, source } => {
                assert_eq!(region_id, RegionId(99));
                assert_eq!(
                    source.downcast_ref::<CoreError>(),
                    Some(&CoreError::UnknownRegion(RegionId(99)))
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn mismatched_shapes_fail_before_any_lookup() {
        let calls = AtomicUsize::new(0);
        let lookup = |id: RegionId| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok::<_, CoreError>(Region {
                id,
                title: String::new(),
            }))
        };
        let err = format_pretty(
            lookup,
            &regional(&[(1, 1)]),
            &RegionalQuantity::Interregional(1),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            QuotaError::MismatchedQuantityShape {
                required: QuantityShape::Regional,
                supplied: QuantityShape::Interregional,
            }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn interregional_required_against_regional_supplied_fails() {
        let dir = directory();
        let err = format_pretty(
            lookup_in(&dir),
            &RegionalQuantity::Interregional(2),
            &regional(&[(1, 2)]),
        )
        .await
        .unwrap_err();
        assert!(matches!(
            err,
            QuotaError::MismatchedQuantityShape {
                required: QuantityShape::Interregional,
                supplied: QuantityShape::Regional,
            }
        ));
    }

    #[tokio::test]
    async fn concurrent_lookups_keep_required_order() {
        // Earlier regions resolve last.
        let lookup = |id: RegionId| async move {
            tokio::time::sleep(Duration::from_millis(40 - id.0 * 10)).await;
            Ok::<_, anyhow::Error>(Region {
                id,
                title: format!("R{}", id.0),
            })
        };
        let b = breakdown(
            lookup,
            &regional(&[(1, 1), (2, 1), (3, 1)]),
            &regional(&[(3, 1)]),
            3,
        )
        .await
        .unwrap();
        let QuotaBreakdown::Regional(lines) = b else {
            panic!("expected regional breakdown");
        };
        let titles: Vec<_> = lines.iter().map(|l| l.title.as_str()).collect();
        assert_eq!(titles, ["R1", "R2", "R3"]);
        assert!(lines[0].is_short());
        assert!(!lines[2].is_short());
    }

    #[tokio::test]
    async fn plain_style_marks_short_regions() {
        let dir = directory();
        let options = FormatOptions {
            style: RenderStyle::Plain,
            max_concurrent_lookups: 0,
        };
        let out = format_with(
            lookup_in(&dir),
            &regional(&[(3, 2), (1, 1)]),
            &regional(&[(1, 4)]),
            &options,
        )
        .await
        .unwrap();
        assert_eq!(out, "East & West \u{2014} 0/2 [short]\nNorth \u{2014} 4/1");
    }

    #[test]
    fn titles_are_escaped_in_markup() {
        let b = QuotaBreakdown::Regional(vec![RegionLine {
            region_id: RegionId(3),
            title: "East & <West>".to_string(),
            supplied: 1,
            required: 1,
        }]);
        assert!(b
            .render_html()
            .contains("<div>East &amp; &lt;West&gt; &mdash; "));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let o: FormatOptions = serde_json::from_str(r#"{"style": "plain"}"#).unwrap();
        assert_eq!(o.style, RenderStyle::Plain);
        assert_eq!(o.max_concurrent_lookups, 8);
        let d: FormatOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(d, FormatOptions::default());
    }
}
