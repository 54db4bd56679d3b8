use std::fmt;
use std::fmt::Write as _;

use crate::formats::{PageRoute, Report, UxIssue};
use crate::status::PageStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeverityConfig {
    pub label: &'static str,
    pub color: &'static str,
    pub background: &'static str,
    pub weight: u8,
}

pub fn severity_config(severity: i64) -> SeverityConfig {
    match severity {
        1 => SeverityConfig {
            label: "Low",
            color: "#52c41a",
            background: "#f6ffed",
            weight: 1,
        },
        2 => SeverityConfig {
            label: "Medium",
            color: "#faad14",
            background: "#fffbe6",
            weight: 2,
        },
        3 => SeverityConfig {
            label: "High",
            color: "#ff4d4f",
            background: "#fff2f0",
            weight: 3,
        },
        _ => SeverityConfig {
            label: "Unknown",
            color: "#666666",
            background: "#f5f5f5",
            weight: 0,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Good,
    Warning,
    Poor,
}

impl ScoreBand {
    pub fn for_score(score: i64) -> Self {
        match score {
            80.. => Self::Good,
            60..=79 => Self::Warning,
            _ => Self::Poor,
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            Self::Good => "#52c41a",
            Self::Warning => "#faad14",
            Self::Poor => "#ff4d4f",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Warning => "warning",
            Self::Poor => "poor",
        }
    }
}

/// Issues ordered by descending severity; equal severities keep input order.
pub fn sorted_issues(issues: &[UxIssue]) -> Vec<&UxIssue> {
    let mut sorted: Vec<&UxIssue> = issues.iter().collect();
    sorted.sort_by(|a, b| b.severity.cmp(&a.severity));
    sorted
}

/// Counts of Low, Medium and High issues, in that order.
pub fn severity_counts(issues: &[UxIssue]) -> [(i64, usize); 3] {
    [1, 2, 3].map(|level| {
        let count = issues.iter().filter(|i| i.severity == level).count();
        (level, count)
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReportState<'a> {
    Available {
        score: i64,
        band: ScoreBand,
        issues: Vec<&'a UxIssue>,
    },
    Pending,
    InProgress,
    /// Completed without a stored report, failed, or an unrecognized status.
    NotAvailable,
}

impl<'a> ReportState<'a> {
    pub fn for_page(page: &'a PageRoute) -> Self {
        match (&page.status, page.report_json.as_ref()) {
            (PageStatus::Completed, Some(report)) => Self::available(report),
            (PageStatus::Pending, _) => Self::Pending,
            (PageStatus::InProgress, _) => Self::InProgress,
            _ => Self::NotAvailable,
        }
    }

    fn available(report: &'a Report) -> Self {
        Self::Available {
            score: report.ux_score,
            band: ScoreBand::for_score(report.ux_score),
            issues: sorted_issues(&report.issues),
        }
    }

    /// Headline and explanation shown when no report can be displayed.
    pub fn notice(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Available { .. } => None,
            Self::Pending => Some((
                "Analysis Pending",
                "This page is queued for analysis. Results will appear here once the analysis is complete.",
            )),
            Self::InProgress => Some((
                "Analysis In Progress",
                "Analysis is currently running. This page will update automatically when complete.",
            )),
            Self::NotAvailable => Some((
                "Analysis Not Available",
                "No analysis data is available for this page.",
            )),
        }
    }
}

/// Mean of the usable page scores, rounded; never a stand-in zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AverageScore {
    Unavailable,
    Score(i64),
}

impl fmt::Display for AverageScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => f.write_str("-"),
            Self::Score(score) => write!(f, "{score}/100"),
        }
    }
}

pub fn average_score<'a>(routes: impl IntoIterator<Item = &'a PageRoute>) -> AverageScore {
    let (sum, count) = routes
        .into_iter()
        .filter_map(PageRoute::usable_score)
        .fold((0.0_f64, 0_usize), |(sum, count), score| {
            (sum + score, count + 1)
        });
    if count == 0 {
        return AverageScore::Unavailable;
    }
    // Round half up, matching how the dashboard displays scores.
    AverageScore::Score((sum / count as f64 + 0.5).floor() as i64)
}

pub fn render_issue(out: &mut String, issue: &UxIssue) -> fmt::Result {
    let config = severity_config(issue.severity);
    let b = &issue.bounding_box;
    writeln!(out, "[{} Severity] {} ({})", config.label, issue.label, issue.heuristic)?;
    writeln!(out, "  Observation: {}", issue.observation)?;
    writeln!(out, "  Recommended Solution: {}", issue.solution)?;
    writeln!(
        out,
        "  Location: x:{}, y:{}, size:{}\u{d7}{}",
        b.x, b.y, b.width, b.height
    )
}

pub fn render_report(page: &PageRoute) -> Result<String, fmt::Error> {
    let state = ReportState::for_page(page);
    let mut out = String::new();
    writeln!(out, "{} - UX Analysis Report", page.page_name)?;
    writeln!(out, "URL: {}", page.page_url)?;
    writeln!(out, "Status: {}", page.status.label())?;

    match &state {
        ReportState::Available {
            score,
            band,
            issues,
        } => {
            writeln!(out, "UX Score: {score}/100 ({})", band.label())?;
            if let Some(snapshot) = &page.annotated_snapshot_url {
                writeln!(out, "Annotated Screenshot: {snapshot}")?;
            }
            if issues.is_empty() {
                writeln!(out)?;
                writeln!(out, "Great UX!")?;
                writeln!(out, "No significant UX issues were found on this page.")?;
                return Ok(out);
            }
            let all: &[UxIssue] = page.report_json.as_ref().map_or(&[], |r| r.issues.as_slice());
            let counts = severity_counts(all)
                .iter()
                .rev()
                .filter(|(_, count)| *count > 0)
                .map(|(level, count)| format!("{count} {}", severity_config(*level).label))
                .collect::<Vec<_>>()
                .join(", ");
            writeln!(out)?;
            writeln!(out, "UX Issues Found ({}): {counts}", issues.len())?;
            for issue in issues {
                writeln!(out)?;
                render_issue(&mut out, issue)?;
            }
        }
        other => {
            writeln!(out, "UX Score: -")?;
            if let Some(snapshot) = &page.annotated_snapshot_url {
                writeln!(out, "Annotated Screenshot: {snapshot}")?;
            }
            if let Some((headline, detail)) = other.notice() {
                writeln!(out)?;
                writeln!(out, "{headline}")?;
                writeln!(out, "{detail}")?;
            }
        }
    }
    Ok(out)
}
