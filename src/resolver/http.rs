//! Remote text providers
//!
//! Both use a blocking client with a bounded timeout. There is no retry:
//! a failed lookup is picked up again on the next run.

use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;

use super::{ProviderError, Result, TextProvider};

const BIBLE_API_URL: &str = "https://bible-api.com";
const ESV_API_URL: &str = "https://api.esv.org/v3/passage/text/";

fn build_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(concat!("cadence/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// Collapse runs of whitespace inside a paragraph
fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ===== bible-api.com =====

#[derive(Debug, Deserialize)]
struct BibleApiResponse {
    #[serde(default)]
    verses: Vec<BibleApiVerse>,
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct BibleApiVerse {
    text: String,
}

/// Public bible-api.com lookup
pub struct BibleApiProvider {
    client: Client,
    translation: String,
}

impl BibleApiProvider {
    pub fn new(translation: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            translation: translation.trim().to_lowercase(),
        })
    }
}

fn parse_bible_api(body: &str) -> Result<Option<Vec<String>>> {
    let response: BibleApiResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::BadResponse(format!("bible-api: {}", e)))?;

    let joined = if response.verses.is_empty() {
        squash_whitespace(&response.text)
    } else {
        squash_whitespace(
            &response
                .verses
                .iter()
                .map(|v| v.text.as_str())
                .collect::<Vec<_>>()
                .join(" "),
        )
    };

    Ok(if joined.is_empty() { None } else { Some(vec![joined]) })
}

impl TextProvider for BibleApiProvider {
    fn name(&self) -> &str {
        "bible-api"
    }

    fn fetch(&self, reference: &str) -> Result<Option<Vec<String>>> {
        let url = format!(
            "{}/{}?translation={}",
            BIBLE_API_URL,
            urlencoding::encode(reference),
            urlencoding::encode(&self.translation)
        );
        let response = self.client.get(&url).send()?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(ProviderError::BadResponse(format!(
                "bible-api returned {}",
                response.status()
            )));
        }

        parse_bible_api(&response.text()?)
    }
}

// ===== api.esv.org =====

#[derive(Debug, Deserialize)]
struct EsvResponse {
    #[serde(default)]
    passages: Vec<String>,
}

/// ESV API lookup, authenticated with a token
pub struct EsvProvider {
    client: Client,
    api_key: String,
}

impl EsvProvider {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            api_key: api_key.trim().to_string(),
        })
    }
}

/// Passages come back as plain text with blank lines between paragraphs
fn parse_esv(body: &str) -> Result<Option<Vec<String>>> {
    let response: EsvResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::BadResponse(format!("esv: {}", e)))?;

    let mut paragraphs = Vec::new();
    for passage in &response.passages {
        let normalized = passage.replace("\r\n", "\n");
        for block in normalized.split("\n\n") {
            let paragraph = squash_whitespace(block);
            if !paragraph.is_empty() {
                paragraphs.push(paragraph);
            }
        }
    }

    Ok(if paragraphs.is_empty() { None } else { Some(paragraphs) })
}

impl TextProvider for EsvProvider {
    fn name(&self) -> &str {
        "esv"
    }

    fn fetch(&self, reference: &str) -> Result<Option<Vec<String>>> {
        let url = format!(
            "{}?q={}&include-passage-references=false&include-verse-numbers=false\
             &include-first-verse-numbers=false&include-footnotes=false\
             &include-headings=false&include-short-copyright=false",
            ESV_API_URL,
            urlencoding::encode(reference)
        );
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .send()?;

        if !response.status().is_success() {
            return Err(ProviderError::BadResponse(format!(
                "esv returned {}",
                response.status()
            )));
        }

        parse_esv(&response.text()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bible_api_joins_verses() {
        let body = r#"{
            "reference": "John 3:16-17",
            "verses": [
                {"book_name": "John", "chapter": 3, "verse": 16, "text": "For God so loved the world,\n"},
                {"book_name": "John", "chapter": 3, "verse": 17, "text": "For God sent not his Son\n"}
            ],
            "text": "ignored",
            "translation_id": "kjv"
        }"#;
        assert_eq!(
            parse_bible_api(body).unwrap(),
            Some(vec![
                "For God so loved the world, For God sent not his Son".to_string()
            ])
        );
    }

    #[test]
    fn test_parse_bible_api_falls_back_to_text() {
        assert_eq!(
            parse_bible_api(r#"{"text": "  Jesus   wept.\n"}"#).unwrap(),
            Some(vec!["Jesus wept.".to_string()])
        );
        assert_eq!(parse_bible_api(r#"{"verses": []}"#).unwrap(), None);
        assert!(parse_bible_api("<html>").is_err());
    }

    #[test]
    fn test_parse_esv_splits_paragraphs() {
        let body = r#"{"query": "Psalm 1:1-2", "passages": ["  Blessed is the man\n  who walks not\n\n  but his delight\n  is in the law\n"]}"#;
        assert_eq!(
            parse_esv(body).unwrap(),
            Some(vec![
                "Blessed is the man who walks not".to_string(),
                "but his delight is in the law".to_string()
            ])
        );
        assert_eq!(parse_esv(r#"{"passages": []}"#).unwrap(), None);
    }
}
