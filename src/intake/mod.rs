/// Proposal intake stores
///
/// Each store owns one table and exposes the queries its API surface needs.
pub mod investment;
pub mod news;
pub mod questionnaires;

pub use investment::InvestmentStore;
pub use news::NewsStore;
pub use questionnaires::QuestionnaireStore;

use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};

/// Review state of a submitted questionnaire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
        }
    }

    pub fn from_str(s: &str) -> ApiResult<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(ApprovalStatus::Pending),
            "APPROVED" => Ok(ApprovalStatus::Approved),
            "REJECTED" => Ok(ApprovalStatus::Rejected),
            _ => Err(ApiError::Validation(format!("Invalid status: {}", s))),
        }
    }
}

/// Normalized page request; pages are 1-based and the page size is clamped
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(default_limit).clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    pub fn total_pages(&self, total_items: i64) -> i64 {
        if total_items == 0 {
            0
        } else {
            (total_items + i64::from(self.limit) - 1) / i64::from(self.limit)
        }
    }
}
