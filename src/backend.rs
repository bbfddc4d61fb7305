//! Backend Module
//!
//! One interface for every domain request. The real HTTP backend and the mock
//! provider both implement [`Backend`], so the session can swap them freely.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::multipart::{Form, Part};
use reqwest::Method;

use crate::api::{ApiClient, ApiError};
use crate::models::{
    AdminStats, CreatedReport, DailySummary, FarmerDashboard, FarmerProfile, FarmerQuery,
    FarmerSummary, MediaReceipt, MediaUpload, NewReport, ProfileUpdate, Report, ReportQuery,
    ReportStatus, ReportSubmission, ReportUpdate, StatusChange,
};

/// Domain requests the application issues once signed in
#[async_trait]
pub trait Backend: Send + Sync {
    // Farmer
    async fn farmer_dashboard(&self) -> Result<FarmerDashboard, ApiError>;
    async fn farmer_profile(&self) -> Result<FarmerProfile, ApiError>;
    async fn update_farmer_profile(&self, update: ProfileUpdate) -> Result<FarmerProfile, ApiError>;
    async fn farmer_reports(&self) -> Result<Vec<Report>, ApiError>;

    // Reports
    async fn create_report(&self, report: NewReport) -> Result<CreatedReport, ApiError>;
    async fn report_details(&self, report_id: u64) -> Result<Report, ApiError>;
    async fn upload_media(&self, report_id: u64, media: MediaUpload)
        -> Result<MediaReceipt, ApiError>;
    async fn update_report(&self, report_id: u64, update: ReportUpdate)
        -> Result<Report, ApiError>;
    async fn delete_report(&self, report_id: u64) -> Result<(), ApiError>;

    // Admin
    async fn admin_stats(&self) -> Result<AdminStats, ApiError>;
    async fn admin_farmers(&self, query: FarmerQuery) -> Result<Vec<FarmerSummary>, ApiError>;
    async fn farmer_details(&self, farmer_id: u64) -> Result<FarmerProfile, ApiError>;
    async fn admin_reports(&self, query: ReportQuery) -> Result<Vec<Report>, ApiError>;
    async fn update_report_status(
        &self,
        report_id: u64,
        status: ReportStatus,
    ) -> Result<Report, ApiError>;
    async fn daily_summary(&self, date: NaiveDate) -> Result<DailySummary, ApiError>;
}

/// The real backend, reached over HTTP with an optional bearer token
pub struct RemoteBackend {
    api: ApiClient,
    token: Option<String>,
}

impl RemoteBackend {
    pub fn new(api: ApiClient, token: Option<String>) -> Self {
        Self { api, token }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let builder = self.api.request(Method::GET, path, self.token.as_deref());
        self.api.execute(builder).await
    }
}

#[async_trait]
impl Backend for RemoteBackend {
    async fn farmer_dashboard(&self) -> Result<FarmerDashboard, ApiError> {
        self.get("/farmer/me").await
    }

    async fn farmer_profile(&self) -> Result<FarmerProfile, ApiError> {
        self.get("/farmer/profile").await
    }

    async fn update_farmer_profile(&self, update: ProfileUpdate) -> Result<FarmerProfile, ApiError> {
        self.api
            .send_json(Method::PUT, "/farmer/profile", self.token.as_deref(), &update)
            .await
    }

    async fn farmer_reports(&self) -> Result<Vec<Report>, ApiError> {
        self.get("/farmer/reports").await
    }

    async fn create_report(&self, report: NewReport) -> Result<CreatedReport, ApiError> {
        let submission = ReportSubmission {
            report: &report,
            status: ReportStatus::Pending,
        };
        self.api
            .send_json(Method::POST, "/reports", self.token.as_deref(), &submission)
            .await
    }

    async fn report_details(&self, report_id: u64) -> Result<Report, ApiError> {
        self.get(&format!("/reports/{}", report_id)).await
    }

    async fn upload_media(
        &self,
        report_id: u64,
        media: MediaUpload,
    ) -> Result<MediaReceipt, ApiError> {
        let part = Part::bytes(media.bytes)
            .file_name(media.file_name)
            .mime_str(&media.content_type)
            .map_err(|e| ApiError::Client(e.to_string()))?;
        let form = Form::new().part("media", part);

        let builder = self
            .api
            .request(
                Method::POST,
                &format!("/reports/{}/media", report_id),
                self.token.as_deref(),
            )
            .multipart(form);
        self.api.execute(builder).await
    }

    async fn update_report(
        &self,
        report_id: u64,
        update: ReportUpdate,
    ) -> Result<Report, ApiError> {
        self.api
            .send_json(
                Method::PUT,
                &format!("/reports/{}", report_id),
                self.token.as_deref(),
                &update,
            )
            .await
    }

    async fn delete_report(&self, report_id: u64) -> Result<(), ApiError> {
        let builder = self.api.request(
            Method::DELETE,
            &format!("/reports/{}", report_id),
            self.token.as_deref(),
        );
        self.api.execute_empty(builder).await
    }

    async fn admin_stats(&self) -> Result<AdminStats, ApiError> {
        self.get("/admin/stats").await
    }

    async fn admin_farmers(&self, query: FarmerQuery) -> Result<Vec<FarmerSummary>, ApiError> {
        let builder = self
            .api
            .request(Method::GET, "/admin/farmers", self.token.as_deref())
            .query(&query);
        self.api.execute(builder).await
    }

    async fn farmer_details(&self, farmer_id: u64) -> Result<FarmerProfile, ApiError> {
        self.get(&format!("/admin/farmers/{}", farmer_id)).await
    }

    async fn admin_reports(&self, query: ReportQuery) -> Result<Vec<Report>, ApiError> {
        let builder = self
            .api
            .request(Method::GET, "/admin/reports", self.token.as_deref())
            .query(&query);
        self.api.execute(builder).await
    }

    async fn update_report_status(
        &self,
        report_id: u64,
        status: ReportStatus,
    ) -> Result<Report, ApiError> {
        self.api
            .send_json(
                Method::PATCH,
                &format!("/admin/reports/{}/status", report_id),
                self.token.as_deref(),
                &StatusChange { status },
            )
            .await
    }

    async fn daily_summary(&self, date: NaiveDate) -> Result<DailySummary, ApiError> {
        let date = date.format("%Y-%m-%d").to_string();
        let builder = self
            .api
            .request(
                Method::GET,
                "/admin/reports/daily-summary",
                self.token.as_deref(),
            )
            .query(&[("date", date.as_str())]);
        self.api.execute(builder).await
    }
}
