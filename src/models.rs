//! Data Transfer Types
//!
//! Payloads shared by the real backend and the mock provider. Both produce
//! exactly these types, so callers never know which mode answered.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Farmer,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Farmer => write!(f, "farmer"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

/// The signed-in user as returned by `/auth/login`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farmer_id: Option<String>,
    /// Any further profile fields the backend sends along
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Flood,
    Pest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Minor,
    Moderate,
    Severe,
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "minor" => Ok(Severity::Minor),
            "moderate" => Ok(Severity::Moderate),
            "severe" => Ok(Severity::Severe),
            other => Err(format!("unknown severity: {}", other)),
        }
    }
}

/// Report workflow status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Investigating,
    Resolved,
    Rejected,
    #[serde(other)]
    Unknown,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Pending => "pending",
            ReportStatus::Investigating => "investigating",
            ReportStatus::Resolved => "resolved",
            ReportStatus::Rejected => "rejected",
            ReportStatus::Unknown => "unknown",
        }
    }
}

/// A damage report as the farmer submits it, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NewReport {
    Flood {
        severity: Severity,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        water_level: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        affected_area: Option<String>,
        description: String,
    },
    Pest {
        pest_type: String,
        severity: Severity,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        affected_crop: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        affected_area: Option<String>,
        description: String,
    },
}

impl NewReport {
    pub fn kind(&self) -> ReportKind {
        match self {
            NewReport::Flood { .. } => ReportKind::Flood,
            NewReport::Pest { .. } => ReportKind::Pest,
        }
    }
}

/// Body of `POST /reports`: the tagged report plus its initial status
#[derive(Debug, Serialize)]
pub(crate) struct ReportSubmission<'a> {
    #[serde(flatten)]
    pub report: &'a NewReport,
    pub status: ReportStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatedReport {
    pub report_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A stored report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: ReportKind,
    pub status: ReportStatus,
    #[serde(default)]
    pub severity: Option<Severity>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub farmer_id: Option<u64>,
    #[serde(default)]
    pub farmer_name: Option<String>,
    #[serde(default)]
    pub barangay: Option<String>,
    #[serde(default)]
    pub pest_type: Option<String>,
    #[serde(default)]
    pub affected_crop: Option<String>,
    #[serde(default)]
    pub water_level: Option<String>,
    #[serde(default)]
    pub affected_area: Option<String>,
    #[serde(default)]
    pub admin_notes: Option<String>,
    #[serde(default)]
    pub media: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Editable fields of an existing report
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_notes: Option<String>,
}

/// A photo attached to a report
#[derive(Debug, Clone)]
pub struct MediaUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaReceipt {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    pub temp: i32,
    pub condition: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportCounts {
    #[serde(default)]
    pub total_reports: u32,
    #[serde(default)]
    pub pending_reports: u32,
    #[serde(default)]
    pub resolved_reports: u32,
}

/// Response of `GET /farmer/me`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmerDashboard {
    pub profile: FarmerProfile,
    #[serde(default)]
    pub weather: Option<Weather>,
    #[serde(default)]
    pub stats: ReportCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmerProfile {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub farm_name: Option<String>,
    #[serde(default)]
    pub farm_size: Option<f64>,
    #[serde(default)]
    pub barangay: Option<String>,
    #[serde(default)]
    pub municipality: Option<String>,
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub crops: Vec<String>,
    #[serde(default)]
    pub total_reports: u32,
    #[serde(default)]
    pub pending_reports: u32,
    #[serde(default)]
    pub resolved_reports: u32,
}

/// Editable profile fields; absent fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farm_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farm_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barangay: Option<String>,
}

/// Response of `GET /admin/stats`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdminStats {
    #[serde(default)]
    pub total_farmers: u32,
    #[serde(default)]
    pub total_reports: u32,
    #[serde(default)]
    pub pending_reports: u32,
    #[serde(default)]
    pub resolved_reports: u32,
    #[serde(default)]
    pub flood_reports: u32,
    #[serde(default)]
    pub pest_reports: u32,
    #[serde(default)]
    pub recent_reports: Vec<Report>,
}

/// One row of the admin farmer list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmerSummary {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub barangay: String,
    #[serde(default)]
    pub municipality: String,
    #[serde(default)]
    pub farm_name: Option<String>,
    #[serde(default)]
    pub farm_size: Option<f64>,
    #[serde(default)]
    pub total_reports: u32,
    #[serde(default)]
    pub pending_reports: u32,
}

/// Filters for `GET /admin/farmers`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FarmerQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub barangay: Option<String>,
}

/// Filters for `GET /admin/reports`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ReportStatus>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<ReportKind>,
}

/// Response of `GET /admin/reports/daily-summary`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    #[serde(default)]
    pub total_reports: u32,
    #[serde(default)]
    pub flood_reports: u32,
    #[serde(default)]
    pub pest_reports: u32,
    #[serde(default)]
    pub by_barangay: BTreeMap<String, u32>,
    #[serde(default)]
    pub reports: Vec<Report>,
}

/// Everything the sign-up wizard collects
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrationProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub password: String,
    pub role: Role,
    pub farm_name: String,
    pub farm_size: f64,
    pub address: String,
    pub barangay: String,
    pub municipality: String,
    pub province: String,
    #[serde(serialize_with = "comma_joined")]
    pub crops: Vec<String>,
    #[serde(serialize_with = "comma_joined")]
    pub notifications: Vec<String>,
}

fn comma_joined<S: Serializer>(values: &[String], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&values.join(","))
}

// Auth wire types

#[derive(Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

/// Body of a successful `/auth/login` (and optionally `/auth/register`)
#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct StatusChange {
    pub status: ReportStatus,
}

/// Flat result shape UI layers consume: `{success, error}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthResult {
    pub success: bool,
    pub mock: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
