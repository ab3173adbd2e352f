// src/batch/prompt.rs
use crate::types::{JobCategory, Message, NOT_MENTIONED};

/// Extraction and classification contract sent ahead of every batch.
pub const SYSTEM_PROMPT: &str = r#"From now on, a user request will contain job description information. Each job description is composed of a URI and a description in Danish or English. You should reply with a JSON object for each job description, translate everything to English. Add all objects to a JSON array. For each description, a corresponding response should have the following format:

[{"type": "The position type, available values are CYBERSECURITY, SOFTWARE_DEVELOPMENT, IT_CONSULTANT, IT_SUPPORT, CUSTOMER_SERVICE and OTHER","published": "When the job posting was published, format should be Day-Month Numeric code-Year","deadline": "Expected deadline to apply for this job","contractType": "The contract type (full-time, part-time, student job, etc.)","start": "When the candidate is expected to start","language": "Original posting language (Danish/English)","jobTitle": "Position title","companyName": "Hiring organization","location": "Job location","description": "Summarized job description","requirements": "List of described job requirements","keySkills": "List of critical skills/keywords to put on CV","contacts": "Relevant recruiter/manager contacts","cvPhotoRequired": "What is mentioned about having a CV photo","applyUri": "Original job posting URL"}]

If some of the information is missing, please write 'Not mentioned'. You should only reply with the JSON content, without any additional text."#;

pub fn system_message() -> Message {
    Message::system(SYSTEM_PROMPT)
}
