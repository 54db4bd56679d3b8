use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::status;

/// Field name -> messages, as returned by the backend on HTTP 400.
pub type ErrorDetails = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    NetworkError,
    ServerError,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    UnknownError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    Warning,
    Error,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "VALIDATION_ERROR",
            Self::NetworkError => "NETWORK_ERROR",
            Self::ServerError => "SERVER_ERROR",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Conflict => "CONFLICT",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            Self::ValidationError => "Please check your input and try again.",
            Self::NetworkError => "Network error. Please check your connection.",
            Self::ServerError => "Server error. Please try again later.",
            Self::Unauthorized => "You are not authorized to perform this action.",
            Self::Forbidden => "Access denied.",
            Self::NotFound => "The requested resource was not found.",
            Self::Conflict => "A conflict occurred. Please try again.",
            Self::UnknownError => "An unexpected error occurred.",
        }
    }

    pub fn alert_kind(self) -> AlertKind {
        match self {
            Self::ValidationError | Self::Unauthorized | Self::Forbidden => AlertKind::Warning,
            _ => AlertKind::Error,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub details: Option<ErrorDetails>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let message = if message.trim().is_empty() {
            code.default_message().to_owned()
        } else {
            message
        };
        Self {
            code,
            message,
            details: None,
        }
    }

    pub fn with_details(mut self, details: ErrorDetails) -> Self {
        self.details = Some(details);
        self
    }

    pub fn network() -> Self {
        Self::new(ErrorCode::NetworkError, ErrorCode::NetworkError.default_message())
    }

    pub fn not_signed_in() -> Self {
        Self::new(ErrorCode::Unauthorized, "You are not signed in")
    }

    /// Field-level errors for form display; empty unless this is a validation error.
    pub fn field_errors(&self) -> Vec<FieldError> {
        match &self.details {
            Some(details) if self.code == ErrorCode::ValidationError => field_errors(details),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Register,
    Login,
    RefreshToken,
    CurrentUser,
    ListProjects,
    CreateProject,
    AvailableRoutes,
    FindPages,
    BulkAnalyze,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Login => "login",
            Self::RefreshToken => "refresh token",
            Self::CurrentUser => "current user",
            Self::ListProjects => "list projects",
            Self::CreateProject => "create project",
            Self::AvailableRoutes => "available routes",
            Self::FindPages => "find pages",
            Self::BulkAnalyze => "bulk analyze",
        }
    }

    fn failure_message(self) -> &'static str {
        match self {
            Self::Register => "Registration failed",
            Self::Login => "Login failed",
            Self::RefreshToken => "Session expired",
            Self::CurrentUser => "Failed to fetch user data",
            Self::ListProjects => "Failed to fetch projects",
            Self::CreateProject => "Failed to create project",
            Self::AvailableRoutes => "Failed to fetch available pages",
            Self::FindPages => "Failed to find pages",
            Self::BulkAnalyze => "Failed to start page analysis",
        }
    }

    /// Maps a non-success HTTP status (plus its body, for 400 details) to the taxonomy.
    pub fn error_for_status(self, status: u16, body: &str) -> ApiError {
        let code = match (self, status) {
            (_, 500..=599) => ErrorCode::ServerError,
            (Self::Login, 400 | 401) => ErrorCode::Unauthorized,
            (Self::Register | Self::CreateProject | Self::BulkAnalyze, 400) => {
                ErrorCode::ValidationError
            }
            (Self::Register, 409) => ErrorCode::Conflict,
            (Self::Register | Self::Login, _) => ErrorCode::UnknownError,
            (_, 401) => ErrorCode::Unauthorized,
            (_, 403) => ErrorCode::Forbidden,
            (Self::AvailableRoutes | Self::FindPages | Self::BulkAnalyze, 404) => {
                ErrorCode::NotFound
            }
            _ => ErrorCode::UnknownError,
        };

        let message = match (self, code) {
            (_, ErrorCode::UnknownError) => self.failure_message(),
            (_, ErrorCode::ServerError) => "Server error occurred",
            (_, ErrorCode::Forbidden) => "Access denied",
            (Self::Register, ErrorCode::ValidationError) => "Invalid registration data",
            (Self::Register, ErrorCode::Conflict) => "User already exists",
            (Self::Login, ErrorCode::Unauthorized) => "Invalid email or password",
            (Self::ListProjects, ErrorCode::Unauthorized) => {
                "You are not authorized to view projects"
            }
            (Self::CreateProject, ErrorCode::ValidationError) => "Invalid project data",
            (Self::CreateProject, ErrorCode::Unauthorized) => {
                "You are not authorized to create projects"
            }
            (Self::BulkAnalyze, ErrorCode::ValidationError) => "Invalid page selection",
            (_, ErrorCode::NotFound) => "Project not found",
            (_, ErrorCode::Unauthorized) => "You are not authorized",
            (_, code) => code.default_message(),
        };

        let error = ApiError::new(code, message);
        if code == ErrorCode::ValidationError
            && let Some(details) = parse_details(body)
        {
            return error.with_details(details);
        }
        error
    }
}

/// Reads a DRF-style validation body: `{"field": ["msg", ...], "other": "msg"}`.
fn parse_details(body: &str) -> Option<ErrorDetails> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let object = value.as_object()?;
    let mut details = ErrorDetails::new();
    for (field, messages) in object {
        let messages = match messages {
            serde_json::Value::String(message) => vec![message.clone()],
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_owned))
                .collect(),
            _ => continue,
        };
        if !messages.is_empty() {
            details.insert(field.clone(), messages);
        }
    }
    (!details.is_empty()).then_some(details)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Normalized key (`lower_case_with_underscores`) for matching form fields.
    pub field: String,
    pub label: String,
    pub message: String,
}

pub fn field_errors(details: &ErrorDetails) -> Vec<FieldError> {
    details
        .iter()
        .flat_map(|(field, messages)| {
            let key = normalize_field_key(field);
            let label = field_label(&key);
            messages.iter().map(move |message| FieldError {
                field: key.clone(),
                label: label.clone(),
                message: message.clone(),
            })
        })
        .collect()
}

pub fn normalize_field_key(field: &str) -> String {
    status::normalize(field)
}

pub fn field_label(field: &str) -> String {
    status::humanize(field).unwrap_or_default()
}

/// First message for a form field; `None` routes the error to the summary list.
pub fn field_error<'a>(errors: &'a [FieldError], field: &str) -> Option<&'a str> {
    let key = normalize_field_key(field);
    errors
        .iter()
        .find(|error| error.field == key)
        .map(|error| error.message.as_str())
}
