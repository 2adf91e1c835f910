use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{delete_owned, get_owned, insert_owned, list_owned, now_value, to_row, update_owned};
use crate::access::Capability;
use crate::backend::BackendError;
use crate::storage::{RecordStore, Table};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDraft {
    pub title: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl JobDraft {
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        Ok(())
    }
}

/// Status tab of the jobs list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Applied,
    Interview,
    Rejected,
    Offer,
}

impl StatusFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Active => "active",
            StatusFilter::Applied => "applied",
            StatusFilter::Interview => "interview",
            StatusFilter::Rejected => "rejected",
            StatusFilter::Offer => "offer",
        }
    }

    pub fn matches(&self, job: &Job) -> bool {
        match self {
            StatusFilter::All => true,
            other => job
                .status
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(other.as_str())),
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job status filter: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for StatusFilter {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Active),
            "applied" => Ok(StatusFilter::Applied),
            "interview" => Ok(StatusFilter::Interview),
            "rejected" => Ok(StatusFilter::Rejected),
            "offer" => Ok(StatusFilter::Offer),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

pub fn filter_by_status(jobs: Vec<Job>, filter: StatusFilter) -> Vec<Job> {
    jobs.into_iter().filter(|job| filter.matches(job)).collect()
}

/// Newest first, narrowed to `filter`.
pub async fn list(
    store: &dyn RecordStore,
    cap: &Capability,
    filter: StatusFilter,
) -> Result<Vec<Job>, BackendError> {
    let jobs = list_owned(store, cap, Table::Jobs).await?;
    Ok(filter_by_status(jobs, filter))
}

pub async fn get(
    store: &dyn RecordStore,
    cap: &Capability,
    id: &str,
) -> Result<Option<Job>, BackendError> {
    get_owned(store, cap, Table::Jobs, id).await
}

pub async fn create(
    store: &dyn RecordStore,
    cap: &Capability,
    draft: &JobDraft,
) -> Result<Job, BackendError> {
    let job: Job = insert_owned(store, cap, Table::Jobs, draft).await?;
    tracing::debug!(job_id = %job.id, "Created job");
    Ok(job)
}

pub async fn update(
    store: &dyn RecordStore,
    cap: &Capability,
    id: &str,
    draft: &JobDraft,
) -> Result<Job, BackendError> {
    let mut patch = to_row(draft)?;
    patch.insert("updated_at".to_string(), now_value());
    update_owned(store, cap, Table::Jobs, id, patch).await
}

pub async fn delete(
    store: &dyn RecordStore,
    cap: &Capability,
    id: &str,
) -> Result<bool, BackendError> {
    let removed = delete_owned(store, cap, Table::Jobs, id).await?;
    tracing::debug!(job_id = %id, removed, "Deleted job");
    Ok(removed)
}
