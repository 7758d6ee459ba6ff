use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

pub const STATUS_TO_DO: &str = "TO_DO";
pub const STATUS_IN_PROGRESS: &str = "IN_PROGRESS";
pub const STATUS_BLOCKED: &str = "BLOCKED";
pub const STATUS_COMPLETED: &str = "COMPLETED";
pub const STATUS_CANCELLED: &str = "CANCELLED";
pub const STATUS_PENDING: &str = "PENDING";

/// Statuses the donut chart always shows, even at zero.
pub const KNOWN_STATUSES: [&str; 5] = [
    STATUS_TO_DO,
    STATUS_IN_PROGRESS,
    STATUS_BLOCKED,
    STATUS_COMPLETED,
    STATUS_CANCELLED,
];

/// Stored user key for tasks nobody is assigned to.
pub const UNASSIGNED_USER: &str = "N/A";
pub const UNASSIGNED_LABEL: &str = "Unassigned";

/// Role recorded for a resource when the upload carries none.
pub const DEFAULT_ROLE: &str = "team_member";

/// Storage and wire format for naive date-times.
pub const DATE_FMT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub project: String,
    pub text: String,
    pub status: String,
    #[serde(serialize_with = "serialize_naive")]
    pub start: NaiveDateTime,
    #[serde(serialize_with = "serialize_naive")]
    pub end: NaiveDateTime,
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, String>,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == STATUS_COMPLETED
    }

    pub fn is_assigned(&self) -> bool {
        is_assigned_user(&self.user)
    }
}

pub fn is_assigned_user(user: &str) -> bool {
    !user.trim().is_empty() && user != UNASSIGNED_USER
}

pub fn display_user(user: &str) -> String {
    if is_assigned_user(user) {
        user.to_string()
    } else {
        UNASSIGNED_LABEL.to_string()
    }
}

pub fn normalize_status(raw: &str) -> String {
    raw.trim().to_uppercase()
}

pub fn format_naive(dt: &NaiveDateTime) -> String {
    dt.format(DATE_FMT).to_string()
}

pub fn parse_stored_naive(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, DATE_FMT).ok()
}

pub fn serialize_naive<S: Serializer>(dt: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_naive(dt))
}
