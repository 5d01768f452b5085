/// Database records for accounts, proposals, and news
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account record in the database
#[derive(Debug, Clone, FromRow)]
pub struct Account {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile: String,
    pub password_hash: String,
    pub role: String,
    pub email_otp: Option<String>,
    pub email_otp_expires_at: Option<DateTime<Utc>>,
    pub email_verified: bool,
    pub phone_otp: Option<String>,
    pub phone_otp_expires_at: Option<DateTime<Utc>>,
    pub phone_verified: bool,
    pub phone_required: bool,
    pub verified: bool,
    pub active: bool,
    pub password_reset_token: Option<String>,
    pub password_reset_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

impl Account {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Questionnaire record; file reference lists are JSON TEXT columns
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Questionnaire {
    pub id: String,
    pub account_id: String,
    pub project_sector: String,
    pub targeted_market: String,
    pub commercialisation_timeline: String,
    pub expected_investment: String,
    pub investment_type: String,
    pub research_title: String,
    pub research_gaps: String,
    pub research_objectives: String,
    pub significance_for_country: String,
    pub novelty: String,
    pub duration_in_months: i64,
    pub market_demand: String,
    pub current_outputs: String,
    pub expected_impact: String,
    pub total_cost: f64,
    pub risks_and_assumptions: String,
    pub application_files: String,
    pub research_plan_files: String,
    pub supporting_files: String,
    pub other_files: String,
    pub approval_status: String,
    pub approval_note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Questionnaire {
    /// All stored file references across every upload field
    pub fn all_file_urls(&self) -> Vec<String> {
        let mut urls = Vec::new();
        for column in [
            &self.application_files,
            &self.research_plan_files,
            &self.supporting_files,
            &self.other_files,
        ] {
            if let Ok(mut parsed) = serde_json::from_str::<Vec<String>>(column) {
                urls.append(&mut parsed);
            }
        }
        urls
    }
}

/// Investment questionnaire record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvestmentQuestionnaire {
    pub id: String,
    pub account_id: String,
    pub project_title: String,
    pub investment_objectives: String,
    pub market_demand: String,
    pub government_assistance: String,
    pub research_gaps: String,
    pub research_objectives: String,
    pub total_project_cost: f64,
    pub country_significance: String,
    pub current_outputs: String,
    pub technology_readiness_level: String,
    pub publications: Option<String>,
    pub resources_collaborations: Option<String>,
    pub risk_assumptions: Option<String>,
    pub project_files: String,
    pub submitted_at: DateTime<Utc>,
}

impl InvestmentQuestionnaire {
    pub fn file_urls(&self) -> Vec<String> {
        serde_json::from_str(&self.project_files).unwrap_or_default()
    }
}

/// News record
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct News {
    pub id: String,
    pub account_id: String,
    pub title: String,
    pub subtitle: String,
    pub image_url: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
