// src/scraping/mod.rs
//! Source of plain-text job descriptions

use async_trait::async_trait;

use crate::types::{Message, Role};

pub mod job_scraper;

pub use job_scraper::PortalScraper;

#[async_trait]
pub trait TextSource: Send + Sync {
    /// Plain text of the posting at `uri`; empty when the page has none
    async fn fetch_text(&self, uri: &str) -> anyhow::Result<String>;
}

/// User message carrying one job description
pub fn to_message(uri: &str, description: &str) -> Message {
    Message::user(format!("{}\n{}\n{}\n", uri, description, "=".repeat(50)))
}

/// Uri of a message built by `to_message`; `None` for system messages
pub fn message_identifier(message: &Message) -> Option<&str> {
    if message.role != Role::User {
        return None;
    }
    message
        .content
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_message() {
        let message = to_message("https://a/1", "Student helper wanted");
        assert_eq!(message.role, Role::User);
        assert!(message.content.starts_with("https://a/1\nStudent helper wanted\n"));
        assert!(message.content.ends_with(&format!("{}\n", "=".repeat(50))));
    }

    #[test]
    fn test_message_identifier() {
        let message = to_message("https://a/1", "Student helper wanted");
        assert_eq!(message_identifier(&message), Some("https://a/1"));
        assert_eq!(message_identifier(&Message::system("https://a/1")), None);
        assert_eq!(message_identifier(&Message::user("")), None);
    }
}
