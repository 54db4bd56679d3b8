use serde::{Deserialize, Deserializer, Serialize};

use crate::status::{PageStatus, humanize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    Website,
    MobileApp,
    WebApp,
    Api,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planning,
    InProgress,
    Completed,
    OnHold,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl ProjectType {
    /// Known types only; `other` must be asked for by name.
    pub fn parse(raw: &str) -> Option<Self> {
        let key = crate::status::normalize(raw);
        match serde_json::from_value(serde_json::Value::String(key.clone())) {
            Ok(Self::Other) if key != "other" => None,
            Ok(project_type) => Some(project_type),
            Err(_) => None,
        }
    }

    pub fn label(self) -> String {
        enum_label(&self)
    }
}

impl ProjectStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_value(serde_json::Value::String(crate::status::normalize(raw))) {
            Ok(Self::Unknown) | Err(_) => None,
            Ok(status) => Some(status),
        }
    }

    pub fn label(self) -> String {
        enum_label(&self)
    }
}

fn enum_label<T: Serialize>(value: &T) -> String {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().and_then(humanize))
        .unwrap_or_else(|| "Unknown".to_owned())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectGoal {
    #[serde(default)]
    pub goal: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: u64,
    pub project_name: String,
    #[serde(default)]
    pub description: String,
    pub project_type: ProjectType,
    pub status: ProjectStatus,
    #[serde(default)]
    pub project_goal: ProjectGoal,
    #[serde(default)]
    pub website_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
}

impl Project {
    /// `January 5, 2024`, or `N/A` when missing or unparseable.
    pub fn created_on_display(&self) -> String {
        self.created_on
            .as_deref()
            .and_then(|raw| chrono::DateTime::parse_from_rfc3339(raw).ok())
            .map(|dt| dt.format("%B %-d, %Y").to_string())
            .unwrap_or_else(|| "N/A".to_owned())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProjectsPage {
    pub count: usize,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<Project>,
}

/// The projects endpoint answers either paginated or as a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ProjectsPayload {
    Paged(ProjectsPage),
    Bare(Vec<Project>),
}

impl From<ProjectsPayload> for ProjectsPage {
    fn from(payload: ProjectsPayload) -> Self {
        match payload {
            ProjectsPayload::Paged(page) => page,
            ProjectsPayload::Bare(results) => Self {
                count: results.len(),
                next: None,
                previous: None,
                results,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateProjectRequest {
    pub project_name: String,
    pub description: String,
    pub project_type: ProjectType,
    pub status: ProjectStatus,
    pub project_goal: ProjectGoal,
    pub website_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PageRoute {
    pub id: u64,
    #[serde(default)]
    pub page_name: String,
    #[serde(default)]
    pub page_url: String,
    #[serde(default)]
    pub status: PageStatus,
    /// Numeric string; empty means not scored yet.
    #[serde(default, deserialize_with = "score_text")]
    pub ux_score: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated_snapshot_url: Option<String>,
    #[serde(default)]
    pub report_json: Option<Report>,
}

impl PageRoute {
    /// The score as a number, when it is a non-empty numeric string.
    pub fn usable_score(&self) -> Option<f64> {
        let raw = self.ux_score.trim();
        if raw.is_empty() {
            return None;
        }
        raw.parse::<f64>().ok().filter(|score| score.is_finite())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Report {
    #[serde(default, deserialize_with = "report_score")]
    pub ux_score: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub issues: Vec<UxIssue>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UxIssue {
    #[serde(default)]
    pub severity: i64,
    #[serde(default)]
    pub heuristic: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub observation: String,
    #[serde(default)]
    pub solution: String,
    #[serde(default)]
    pub bounding_box: BoundingBox,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FindPagesResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub available_routes: Vec<PageRoute>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BulkAnalyzeRequest {
    pub page_analysis_ids: Vec<u64>,
}

/// What the backend accepted from a bulk analyze submission.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct BulkAnalyzeAck {
    pub accepted: usize,
    pub rejected_ids: Vec<u64>,
    pub message: Option<String>,
}

impl BulkAnalyzeAck {
    /// Reads the untyped acknowledgment body; unknown shapes mean "everything accepted".
    pub fn from_body(submitted: &[u64], body: &str) -> Self {
        let value: serde_json::Value = serde_json::from_str(body).unwrap_or_default();
        let Some(object) = value.as_object() else {
            return Self {
                accepted: submitted.len(),
                ..Self::default()
            };
        };

        let rejected_ids: Vec<u64> = ["rejected_ids", "failed_ids"]
            .iter()
            .find_map(|key| object.get(*key).and_then(|v| v.as_array()))
            .map(|ids| ids.iter().filter_map(|id| id.as_u64()).collect())
            .unwrap_or_default();
        let accepted = ["accepted", "accepted_count", "queued", "count"]
            .iter()
            .find_map(|key| object.get(*key).and_then(|v| v.as_u64()))
            .map(|n| n as usize)
            .unwrap_or_else(|| submitted.len().saturating_sub(rejected_ids.len()));
        let message = ["message", "detail", "status"]
            .iter()
            .find_map(|key| object.get(*key).and_then(|v| v.as_str()))
            .map(str::to_owned);

        Self {
            accepted,
            rejected_ids,
            message,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: u64,
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub organisation: String,
    #[serde(default)]
    pub plan: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_remaining: Option<i64>,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
    pub password2: String,
    pub organisation: String,
    pub plan: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthResponse {
    pub access: String,
    pub refresh: String,
    #[serde(default)]
    pub user: Option<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct RefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct RefreshResponse {
    pub access: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts `"85"`, `85`, `85.5` or `null` and keeps the textual form.
fn score_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(text)) => text,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

fn report_score<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let score = match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(score
        .filter(|s| s.is_finite())
        .map(|s| s.round() as i64)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_route_tolerates_nulls_and_numeric_scores() {
        let route: PageRoute = serde_json::from_str(
            r#"{"id": 7, "page_name": "Home", "page_url": "https://example.com/",
                "status": null, "ux_score": 72, "report_json": null}"#,
        )
        .unwrap();
        assert_eq!(route.status, PageStatus::default());
        assert_eq!(route.ux_score, "72");
        assert_eq!(route.usable_score(), Some(72.0));
        assert!(route.report_json.is_none());
    }

    #[test]
    fn unusable_scores() {
        let mut route = PageRoute::default();
        assert_eq!(route.usable_score(), None);
        route.ux_score = "n/a".to_owned();
        assert_eq!(route.usable_score(), None);
        route.ux_score = " 64.5 ".to_owned();
        assert_eq!(route.usable_score(), Some(64.5));
    }

    #[test]
    fn report_parses_issues() {
        let report: Report = serde_json::from_str(
            r#"{"ux_score": "78", "issues": [{"severity": 3, "heuristic": "H4",
                "label": "Inconsistent buttons", "observation": "o", "solution": "s",
                "bounding_box": {"x": 1, "y": 2, "width": 30, "height": 40}}]}"#,
        )
        .unwrap();
        assert_eq!(report.ux_score, 78);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].bounding_box.width, 30.0);
    }

    #[test]
    fn projects_payload_normalizes_bare_array() {
        let raw = r#"[{"id": 1, "project_name": "Shop", "project_type": "web_app",
                       "status": "on_hold", "project_goal": {"goal": "convert"},
                       "website_url": "https://shop.example"}]"#;
        let payload: ProjectsPayload = serde_json::from_str(raw).unwrap();
        let page = ProjectsPage::from(payload);
        assert_eq!(page.count, 1);
        assert_eq!(page.results[0].project_type, ProjectType::WebApp);
        assert_eq!(page.results[0].status, ProjectStatus::OnHold);
    }

    #[test]
    fn project_enum_labels_and_parse() {
        assert_eq!(ProjectType::MobileApp.label(), "Mobile App");
        assert_eq!(ProjectStatus::InProgress.label(), "In Progress");
        assert_eq!(ProjectType::parse("Web App"), Some(ProjectType::WebApp));
        assert_eq!(ProjectType::parse("Other"), Some(ProjectType::Other));
        assert_eq!(ProjectType::parse("websit"), None);
        assert_eq!(ProjectType::parse("spaceship"), None);
        assert_eq!(ProjectStatus::parse("on-hold"), Some(ProjectStatus::OnHold));
        assert_eq!(ProjectStatus::parse("archived"), None);
    }

    #[test]
    fn created_on_display() {
        let mut project: Project = serde_json::from_str(
            r#"{"id": 1, "project_name": "Shop", "project_type": "website",
                "status": "planning", "created_on": "2024-01-05T10:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(project.created_on_display(), "January 5, 2024");
        project.created_on = None;
        assert_eq!(project.created_on_display(), "N/A");
    }

    #[test]
    fn bulk_ack_shapes() {
        let submitted = [1, 2, 3];
        let ack = BulkAnalyzeAck::from_body(&submitted, "");
        assert_eq!(ack.accepted, 3);
        assert!(ack.rejected_ids.is_empty());

        let ack = BulkAnalyzeAck::from_body(
            &submitted,
            r#"{"rejected_ids": [3], "message": "queued 2 pages"}"#,
        );
        assert_eq!(ack.accepted, 2);
        assert_eq!(ack.rejected_ids, vec![3]);
        assert_eq!(ack.message.as_deref(), Some("queued 2 pages"));

        let ack = BulkAnalyzeAck::from_body(&submitted, r#"{"queued": 1}"#);
        assert_eq!(ack.accepted, 1);
    }
}
