// src/types/job_posting.rs
//! Structured job posting as returned by the model

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

pub const NOT_MENTIONED: &str = "Not mentioned";

/// Fixed set of position categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum JobCategory {
    Cybersecurity,
    SoftwareDevelopment,
    ItConsultant,
    ItSupport,
    CustomerService,
    Other,
}

impl JobCategory {
    pub const ALL: [JobCategory; 6] = [
        JobCategory::Cybersecurity,
        JobCategory::SoftwareDevelopment,
        JobCategory::ItConsultant,
        JobCategory::ItSupport,
        JobCategory::CustomerService,
        JobCategory::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            JobCategory::Cybersecurity => "CYBERSECURITY",
            JobCategory::SoftwareDevelopment => "SOFTWARE_DEVELOPMENT",
            JobCategory::ItConsultant => "IT_CONSULTANT",
            JobCategory::ItSupport => "IT_SUPPORT",
            JobCategory::CustomerService => "CUSTOMER_SERVICE",
            JobCategory::Other => "OTHER",
        }
    }

    /// Directory name of the bucket holding this category's records
    pub fn bucket(self) -> &'static str {
        match self {
            JobCategory::Cybersecurity => "cybersecurity",
            JobCategory::SoftwareDevelopment => "software_development",
            JobCategory::ItConsultant => "it_consultant",
            JobCategory::ItSupport => "it_support",
            JobCategory::CustomerService => "customer_service",
            JobCategory::Other => "other",
        }
    }

    /// Case-insensitive lookup. Unknown values are coerced to `Other`.
    pub fn coerce(value: &str) -> Self {
        let normalized = value.trim().to_uppercase().replace([' ', '-'], "_");
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == normalized)
            .unwrap_or(JobCategory::Other)
    }
}

impl From<String> for JobCategory {
    fn from(value: String) -> Self {
        Self::coerce(&value)
    }
}

impl From<JobCategory> for String {
    fn from(category: JobCategory) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for JobCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPosting {
    #[serde(rename = "type")]
    pub category: JobCategory,
    pub published: String,
    pub deadline: String,
    pub contract_type: String,
    pub start: String,
    pub language: String,
    pub job_title: String,
    pub company_name: String,
    pub location: String,
    pub description: String,
    #[serde(deserialize_with = "list_or_comma_separated")]
    pub requirements: Vec<String>,
    #[serde(deserialize_with = "list_or_comma_separated")]
    pub key_skills: Vec<String>,
    pub contacts: String,
    pub cv_photo_required: String,
    pub apply_uri: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrText {
    List(Vec<String>),
    Text(String),
}

// The model sometimes answers with "a, b, c" instead of a JSON list
fn list_or_comma_separated<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match ListOrText::deserialize(deserializer)? {
        ListOrText::List(items) => items,
        ListOrText::Text(text) => text
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(String::from)
            .collect(),
    })
}
