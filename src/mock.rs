//! Mock Data Module
//!
//! Seeded in-memory dataset served when the backend is unreachable. Answers
//! have the same shapes as the real backend's. Reports created or edited
//! while offline stay in the dataset for the rest of the process.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use tracing::{debug, info};

use crate::api::ApiError;
use crate::backend::Backend;
use crate::models::{
    AdminStats, CreatedReport, DailySummary, FarmerDashboard, FarmerProfile, FarmerQuery,
    FarmerSummary, MediaReceipt, MediaUpload, NewReport, ProfileUpdate, Report, ReportCounts,
    ReportKind, ReportQuery, ReportStatus, ReportUpdate, Role, Severity, User, Weather,
};

/// Profile handed out for identifiers the dataset does not know
pub const GENERIC_FARMER_ID: u64 = 999;

const MUNICIPALITY: &str = "Norala";
const PROVINCE: &str = "South Cotabato";

#[derive(Debug, Clone)]
struct MockAccount {
    user: User,
    profile: FarmerProfile,
}

#[derive(Debug, Clone)]
struct MockDataset {
    accounts: Vec<MockAccount>,
    reports: Vec<Report>,
    next_report_id: u64,
}

/// Shared mock dataset; cheap to clone
#[derive(Debug, Clone)]
pub struct MockProvider {
    data: Arc<Mutex<MockDataset>>,
}

impl MockProvider {
    /// A provider holding the deterministic seed dataset
    pub fn seeded() -> Self {
        let reports = seed_reports();
        let next_report_id = reports.iter().map(|r| r.id).max().unwrap_or(0) + 1;

        Self {
            data: Arc::new(Mutex::new(MockDataset {
                accounts: seed_accounts(),
                reports,
                next_report_id,
            })),
        }
    }

    /// Mock user for a login identifier (email or farmer ID, any case), or
    /// the generic mock farmer
    pub fn user_for(&self, identifier: &str) -> User {
        let data = self.lock();
        let needle = identifier.trim().to_ascii_lowercase();

        data.accounts
            .iter()
            .find(|account| {
                let user = &account.user;
                user.email.as_deref().map(str::to_ascii_lowercase) == Some(needle.clone())
                    || user.farmer_id.as_deref().map(str::to_ascii_lowercase)
                        == Some(needle.clone())
            })
            .or_else(|| data.accounts.iter().find(|a| a.user.id == GENERIC_FARMER_ID))
            .map(|account| account.user.clone())
            .unwrap_or_else(generic_farmer)
    }

    /// Mock user matching a previously persisted user
    pub fn user_matching(&self, stored: &User) -> User {
        let key = stored
            .email
            .as_deref()
            .or(stored.farmer_id.as_deref())
            .unwrap_or_default();
        self.user_for(key)
    }

    /// A [`Backend`] answering as `user`
    pub fn backend_for(&self, user: User) -> MockBackend {
        MockBackend {
            provider: self.clone(),
            user,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockDataset> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::seeded()
    }
}

/// The mock dataset seen by one signed-in user
pub struct MockBackend {
    provider: MockProvider,
    user: User,
}

impl MockBackend {
    fn require_admin(&self) -> Result<(), ApiError> {
        if self.user.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden())
        }
    }
}

impl MockDataset {
    fn profile_for(&self, user: &User) -> FarmerProfile {
        let mut profile = self
            .accounts
            .iter()
            .find(|a| a.user.id == user.id)
            .map(|a| a.profile.clone())
            .unwrap_or_else(|| blank_profile(user));

        let counts = self.counts_for(user.id);
        profile.total_reports = counts.total_reports;
        profile.pending_reports = counts.pending_reports;
        profile.resolved_reports = counts.resolved_reports;
        profile
    }

    fn counts_for(&self, farmer_id: u64) -> ReportCounts {
        count(self.reports.iter().filter(|r| r.farmer_id == Some(farmer_id)))
    }

    fn report_mut(&mut self, report_id: u64) -> Result<&mut Report, ApiError> {
        self.reports
            .iter_mut()
            .find(|r| r.id == report_id)
            .ok_or_else(|| ApiError::not_found("Report"))
    }

    /// Newest first, like the backend's listings
    fn sorted(mut reports: Vec<Report>) -> Vec<Report> {
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        reports
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn farmer_dashboard(&self) -> Result<FarmerDashboard, ApiError> {
        let data = self.provider.lock();
        let profile = data.profile_for(&self.user);

        Ok(FarmerDashboard {
            stats: ReportCounts {
                total_reports: profile.total_reports,
                pending_reports: profile.pending_reports,
                resolved_reports: profile.resolved_reports,
            },
            weather: Some(Weather {
                temp: 32,
                condition: "Sunny".into(),
            }),
            profile,
        })
    }

    async fn farmer_profile(&self) -> Result<FarmerProfile, ApiError> {
        Ok(self.provider.lock().profile_for(&self.user))
    }

    async fn update_farmer_profile(&self, update: ProfileUpdate) -> Result<FarmerProfile, ApiError> {
        let mut data = self.provider.lock();

        if !data.accounts.iter().any(|a| a.user.id == self.user.id) {
            data.accounts.push(MockAccount {
                user: self.user.clone(),
                profile: blank_profile(&self.user),
            });
        }

        if let Some(account) = data.accounts.iter_mut().find(|a| a.user.id == self.user.id) {
            let profile = &mut account.profile;
            if let Some(name) = update.name {
                account.user.name = name.clone();
                profile.name = name;
            }
            if update.phone.is_some() {
                profile.phone = update.phone;
            }
            if update.farm_name.is_some() {
                profile.farm_name = update.farm_name;
            }
            if update.farm_size.is_some() {
                profile.farm_size = update.farm_size;
            }
            if update.barangay.is_some() {
                profile.barangay = update.barangay;
            }
        }

        Ok(data.profile_for(&self.user))
    }

    async fn farmer_reports(&self) -> Result<Vec<Report>, ApiError> {
        let data = self.provider.lock();
        let mine = data
            .reports
            .iter()
            .filter(|r| r.farmer_id == Some(self.user.id))
            .cloned()
            .collect();
        Ok(MockDataset::sorted(mine))
    }

    async fn create_report(&self, report: NewReport) -> Result<CreatedReport, ApiError> {
        let mut data = self.provider.lock();
        let id = data.next_report_id;
        data.next_report_id += 1;

        let owner = ReportOwner {
            farmer_id: self.user.id,
            farmer_name: self.user.name.clone(),
            barangay: data.profile_for(&self.user).barangay,
        };
        let stored = materialize(id, report, owner, ReportStatus::Pending, Utc::now());

        data.reports.push(stored);
        info!("Stored mock report {} for user {}", id, self.user.id);

        Ok(CreatedReport {
            report_id: id,
            message: Some("Report submitted (offline mock data)".into()),
        })
    }

    async fn report_details(&self, report_id: u64) -> Result<Report, ApiError> {
        let data = self.provider.lock();
        data.reports
            .iter()
            .find(|r| r.id == report_id)
            .filter(|r| self.user.is_admin() || r.farmer_id == Some(self.user.id))
            .cloned()
            .ok_or_else(|| ApiError::not_found("Report"))
    }

    async fn upload_media(
        &self,
        report_id: u64,
        media: MediaUpload,
    ) -> Result<MediaReceipt, ApiError> {
        let mut data = self.provider.lock();
        let is_admin = self.user.is_admin();
        let user_id = self.user.id;
        let report = data.report_mut(report_id)?;
        if !is_admin && report.farmer_id != Some(user_id) {
            return Err(ApiError::not_found("Report"));
        }

        let url = format!("mock://reports/{}/{}", report_id, media.file_name);
        debug!("Recording {} bytes of mock media at {}", media.bytes.len(), url);
        report.media.push(url.clone());

        Ok(MediaReceipt {
            url: Some(url),
            message: None,
        })
    }

    async fn update_report(
        &self,
        report_id: u64,
        update: ReportUpdate,
    ) -> Result<Report, ApiError> {
        let mut data = self.provider.lock();
        let is_admin = self.user.is_admin();
        let user_id = self.user.id;
        let report = data.report_mut(report_id)?;
        if !is_admin && report.farmer_id != Some(user_id) {
            return Err(ApiError::not_found("Report"));
        }

        if let Some(description) = update.description {
            report.description = description;
        }
        if update.severity.is_some() {
            report.severity = update.severity;
        }
        if update.affected_area.is_some() {
            report.affected_area = update.affected_area;
        }
        if update.admin_notes.is_some() {
            report.admin_notes = update.admin_notes;
        }
        Ok(report.clone())
    }

    async fn delete_report(&self, report_id: u64) -> Result<(), ApiError> {
        let mut data = self.provider.lock();
        let before = data.reports.len();
        let is_admin = self.user.is_admin();
        let user_id = self.user.id;
        data.reports
            .retain(|r| r.id != report_id || !(is_admin || r.farmer_id == Some(user_id)));

        if data.reports.len() == before {
            return Err(ApiError::not_found("Report"));
        }
        Ok(())
    }

    async fn admin_stats(&self) -> Result<AdminStats, ApiError> {
        self.require_admin()?;
        let data = self.provider.lock();
        let counts = count(data.reports.iter());

        Ok(AdminStats {
            total_farmers: data
                .accounts
                .iter()
                .filter(|a| a.user.role == Role::Farmer && a.user.id != GENERIC_FARMER_ID)
                .count() as u32,
            total_reports: counts.total_reports,
            pending_reports: counts.pending_reports,
            resolved_reports: counts.resolved_reports,
            flood_reports: data
                .reports
                .iter()
                .filter(|r| r.kind == ReportKind::Flood)
                .count() as u32,
            pest_reports: data
                .reports
                .iter()
                .filter(|r| r.kind == ReportKind::Pest)
                .count() as u32,
            recent_reports: MockDataset::sorted(data.reports.clone())
                .into_iter()
                .take(5)
                .collect(),
        })
    }

    async fn admin_farmers(&self, query: FarmerQuery) -> Result<Vec<FarmerSummary>, ApiError> {
        self.require_admin()?;
        let data = self.provider.lock();
        let search = query.search.map(|s| s.to_lowercase());
        let barangay = query.barangay.map(|b| b.to_lowercase());

        let farmers = data
            .accounts
            .iter()
            .filter(|a| a.user.role == Role::Farmer && a.user.id != GENERIC_FARMER_ID)
            .map(|a| data.profile_for(&a.user))
            .filter(|p| {
                let place = p.barangay.clone().unwrap_or_default().to_lowercase();
                let name_hit = search
                    .as_ref()
                    .map_or(true, |s| p.name.to_lowercase().contains(s) || place.contains(s));
                let place_hit = barangay.as_ref().map_or(true, |b| &place == b);
                name_hit && place_hit
            })
            .map(|p| FarmerSummary {
                id: p.id,
                name: p.name,
                barangay: p.barangay.unwrap_or_default(),
                municipality: p.municipality.unwrap_or_default(),
                farm_name: p.farm_name,
                farm_size: p.farm_size,
                total_reports: p.total_reports,
                pending_reports: p.pending_reports,
            })
            .collect();
        Ok(farmers)
    }

    async fn farmer_details(&self, farmer_id: u64) -> Result<FarmerProfile, ApiError> {
        self.require_admin()?;
        let data = self.provider.lock();
        let account = data
            .accounts
            .iter()
            .find(|a| a.user.id == farmer_id && a.user.role == Role::Farmer)
            .ok_or_else(|| ApiError::not_found("Farmer"))?;
        Ok(data.profile_for(&account.user))
    }

    async fn admin_reports(&self, query: ReportQuery) -> Result<Vec<Report>, ApiError> {
        self.require_admin()?;
        let data = self.provider.lock();
        let reports = data
            .reports
            .iter()
            .filter(|r| query.status.map_or(true, |s| r.status == s))
            .filter(|r| query.kind.map_or(true, |k| r.kind == k))
            .cloned()
            .collect();
        Ok(MockDataset::sorted(reports))
    }

    async fn update_report_status(
        &self,
        report_id: u64,
        status: ReportStatus,
    ) -> Result<Report, ApiError> {
        self.require_admin()?;
        let mut data = self.provider.lock();
        let report = data.report_mut(report_id)?;
        report.status = status;
        info!("Mock report {} is now {}", report_id, status.as_str());
        Ok(report.clone())
    }

    async fn daily_summary(&self, date: NaiveDate) -> Result<DailySummary, ApiError> {
        self.require_admin()?;
        let data = self.provider.lock();
        let reports: Vec<Report> = data
            .reports
            .iter()
            .filter(|r| r.created_at.date_naive() == date)
            .cloned()
            .collect();

        let mut by_barangay = BTreeMap::new();
        for report in &reports {
            let name = report.barangay.clone().unwrap_or_else(|| "Unknown".into());
            *by_barangay.entry(name).or_insert(0) += 1;
        }

        Ok(DailySummary {
            date,
            total_reports: reports.len() as u32,
            flood_reports: reports
                .iter()
                .filter(|r| r.kind == ReportKind::Flood)
                .count() as u32,
            pest_reports: reports
                .iter()
                .filter(|r| r.kind == ReportKind::Pest)
                .count() as u32,
            by_barangay,
            reports: MockDataset::sorted(reports),
        })
    }
}

fn count<'a>(reports: impl Iterator<Item = &'a Report>) -> ReportCounts {
    let mut counts = ReportCounts::default();
    for report in reports {
        counts.total_reports += 1;
        match report.status {
            ReportStatus::Pending | ReportStatus::Investigating => counts.pending_reports += 1,
            ReportStatus::Resolved => counts.resolved_reports += 1,
            _ => {}
        }
    }
    counts
}

fn generic_farmer() -> User {
    User {
        id: GENERIC_FARMER_ID,
        name: "Mock Farmer".into(),
        role: Role::Farmer,
        email: None,
        farmer_id: None,
        extra: Default::default(),
    }
}

fn blank_profile(user: &User) -> FarmerProfile {
    FarmerProfile {
        id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        phone: None,
        farm_name: None,
        farm_size: None,
        barangay: None,
        municipality: Some(MUNICIPALITY.into()),
        province: Some(PROVINCE.into()),
        crops: Vec::new(),
        total_reports: 0,
        pending_reports: 0,
        resolved_reports: 0,
    }
}

fn farmer_account(
    id: u64,
    name: &str,
    email: &str,
    farmer_id: &str,
    barangay: &str,
    farm_name: &str,
    farm_size: f64,
    crops: &[&str],
) -> MockAccount {
    let user = User {
        id,
        name: name.into(),
        role: Role::Farmer,
        email: Some(email.into()),
        farmer_id: Some(farmer_id.into()),
        extra: Default::default(),
    };
    let mut profile = blank_profile(&user);
    profile.phone = Some(format!("0917555{:04}", id));
    profile.farm_name = Some(farm_name.into());
    profile.farm_size = Some(farm_size);
    profile.barangay = Some(barangay.into());
    profile.crops = crops.iter().map(|c| c.to_string()).collect();
    MockAccount { user, profile }
}

fn seed_accounts() -> Vec<MockAccount> {
    let admin = User {
        id: 100,
        name: "Municipal Agriculture Office".into(),
        role: Role::Admin,
        email: Some("admin@cropaid.ph".into()),
        farmer_id: None,
        extra: Default::default(),
    };
    let generic = generic_farmer();

    vec![
        farmer_account(
            1,
            "Juan Dela Cruz",
            "farmer1@example.com",
            "NRL-0001",
            "San Jose",
            "Dela Cruz Rice Farm",
            2.5,
            &["rice"],
        ),
        farmer_account(
            2,
            "Maria Santos",
            "farmer2@example.com",
            "NRL-0002",
            "Poblacion",
            "Santos Family Farm",
            1.8,
            &["corn", "vegetables"],
        ),
        farmer_account(
            3,
            "Pedro Reyes",
            "farmer3@example.com",
            "NRL-0003",
            "Lapuz",
            "Reyes Farm",
            3.2,
            &["rice", "corn"],
        ),
        MockAccount {
            profile: blank_profile(&admin),
            user: admin,
        },
        MockAccount {
            profile: blank_profile(&generic),
            user: generic,
        },
    ]
}

/// Who a stored report belongs to
struct ReportOwner {
    farmer_id: u64,
    farmer_name: String,
    barangay: Option<String>,
}

/// Turn a submitted report into its stored form
fn materialize(
    id: u64,
    report: NewReport,
    owner: ReportOwner,
    status: ReportStatus,
    created_at: DateTime<Utc>,
) -> Report {
    let mut stored = Report {
        id,
        kind: report.kind(),
        status,
        severity: None,
        description: String::new(),
        farmer_id: Some(owner.farmer_id),
        farmer_name: Some(owner.farmer_name),
        barangay: owner.barangay,
        pest_type: None,
        affected_crop: None,
        water_level: None,
        affected_area: None,
        admin_notes: None,
        media: Vec::new(),
        created_at,
    };

    match report {
        NewReport::Flood {
            severity,
            water_level,
            affected_area,
            description,
        } => {
            stored.severity = Some(severity);
            stored.water_level = water_level;
            stored.affected_area = affected_area;
            stored.description = description;
        }
        NewReport::Pest {
            pest_type,
            severity,
            affected_crop,
            affected_area,
            description,
        } => {
            stored.severity = Some(severity);
            stored.pest_type = Some(pest_type);
            stored.affected_crop = affected_crop;
            stored.affected_area = affected_area;
            stored.description = description;
        }
    }
    stored
}

fn seed_report(
    id: u64,
    farmer: (u64, &str, &str),
    status: ReportStatus,
    day: u32,
    report: NewReport,
) -> Report {
    let (farmer_id, farmer_name, barangay) = farmer;
    let created_at = Utc
        .with_ymd_and_hms(2024, 7, day, 8, 30, 0)
        .single()
        .unwrap_or_else(Utc::now);
    let owner = ReportOwner {
        farmer_id,
        farmer_name: farmer_name.into(),
        barangay: Some(barangay.into()),
    };
    materialize(id, report, owner, status, created_at)
}

fn seed_reports() -> Vec<Report> {
    let juan = (1, "Juan Dela Cruz", "San Jose");
    let maria = (2, "Maria Santos", "Poblacion");
    let pedro = (3, "Pedro Reyes", "Lapuz");

    let mut resolved = seed_report(
        3,
        pedro,
        ReportStatus::Resolved,
        3,
        NewReport::Flood {
            severity: Severity::Severe,
            water_level: Some("waist-deep".into()),
            affected_area: Some("3 hectares".into()),
            description: "River overflow flooded the entire field".into(),
        },
    );
    resolved.admin_notes = Some("Seedlings released through the MAO".into());

    vec![
        seed_report(
            1,
            juan,
            ReportStatus::Pending,
            12,
            NewReport::Flood {
                severity: Severity::Moderate,
                water_level: Some("knee-deep".into()),
                affected_area: Some("1.5 hectares".into()),
                description: "Heavy rain flooded the lower paddies".into(),
            },
        ),
        seed_report(
            2,
            juan,
            ReportStatus::Investigating,
            5,
            NewReport::Pest {
                pest_type: "Rice black bug".into(),
                severity: Severity::Minor,
                affected_crop: Some("rice".into()),
                affected_area: Some("0.5 hectares".into()),
                description: "Black bugs found near the irrigation canal".into(),
            },
        ),
        resolved,
        seed_report(
            4,
            maria,
            ReportStatus::Pending,
            12,
            NewReport::Pest {
                pest_type: "Fall armyworm".into(),
                severity: Severity::Severe,
                affected_crop: Some("corn".into()),
                affected_area: Some("1 hectare".into()),
                description: "Armyworm damage on young corn".into(),
            },
        ),
        seed_report(
            5,
            maria,
            ReportStatus::Rejected,
            1,
            NewReport::Flood {
                severity: Severity::Minor,
                water_level: Some("ankle-deep".into()),
                affected_area: None,
                description: "Standing water after the storm".into(),
            },
        ),
    ]
}
