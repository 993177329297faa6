use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A resume document: the live LaTeX source plus the job it is being tailored to.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub latex_source: String,
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub job_description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResumeRow {
    pub fn job_context(&self) -> JobContext {
        JobContext {
            job_title: self.job_title.clone(),
            company: self.company.clone(),
            job_description: self.job_description.clone(),
        }
    }
}

/// Optional job fields fed into prompts. Blank fields count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobContext {
    pub job_title: Option<String>,
    pub company: Option<String>,
    pub job_description: Option<String>,
}

impl JobContext {
    pub fn is_empty(&self) -> bool {
        [&self.job_title, &self.company, &self.job_description]
            .iter()
            .all(|field| non_blank(field).is_none())
    }

    pub fn job_title(&self) -> Option<&str> {
        non_blank(&self.job_title)
    }

    pub fn company(&self) -> Option<&str> {
        non_blank(&self.company)
    }

    pub fn job_description(&self) -> Option<&str> {
        non_blank(&self.job_description)
    }
}

fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_fields_count_as_empty() {
        let job = JobContext {
            job_title: Some("  ".to_string()),
            company: None,
            job_description: Some(String::new()),
        };
        assert!(job.is_empty());
        assert_eq!(job.job_title(), None);
    }

    #[test]
    fn test_fields_are_trimmed() {
        let job = JobContext {
            job_title: Some(" Backend Engineer ".to_string()),
            ..Default::default()
        };
        assert!(!job.is_empty());
        assert_eq!(job.job_title(), Some("Backend Engineer"));
    }
}
