//! Canonical text lookup
//!
//! A [`TextResolver`] tries its providers in order and returns the first
//! hit. Provider failures are logged and skipped; when every provider
//! fails the lookup is simply absent.

mod http;
mod local;

pub use http::{BibleApiProvider, EsvProvider};
pub use local::LocalVerseFile;

use std::path::Path;
use std::time::Duration;

use thiserror::Error;

use crate::config::{CadenceConfig, ProviderKind};

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unexpected response: {0}")]
    BadResponse(String),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Anything that can turn a reference into paragraphs of text
pub trait TextSource {
    fn resolve(&self, reference: &str) -> Option<Vec<String>>;
}

impl<F> TextSource for F
where
    F: Fn(&str) -> Option<Vec<String>>,
{
    fn resolve(&self, reference: &str) -> Option<Vec<String>> {
        self(reference)
    }
}

/// A single lookup backend
pub trait TextProvider {
    fn name(&self) -> &str;

    /// `Ok(None)` means the provider answered but has no text
    fn fetch(&self, reference: &str) -> Result<Option<Vec<String>>>;
}

/// Ordered provider chain
#[derive(Default)]
pub struct TextResolver {
    providers: Vec<Box<dyn TextProvider>>,
}

impl TextResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_provider(mut self, provider: Box<dyn TextProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Build the chain described by `config.providers`.
    ///
    /// The ESV provider is left out when no API key is configured; an HTTP
    /// provider whose client cannot be built is logged and skipped.
    pub fn from_config(config: &CadenceConfig, data_dir: &Path) -> Self {
        let settings = &config.providers;
        let timeout = Duration::from_secs(settings.timeout_secs.max(1));
        let mut resolver = Self::new();

        for kind in &settings.order {
            match kind {
                ProviderKind::Local => {
                    let path = settings
                        .verse_cache_path
                        .clone()
                        .unwrap_or_else(|| data_dir.join("verses.txt"));
                    resolver = resolver.with_provider(Box::new(LocalVerseFile::new(path)));
                }
                ProviderKind::Esv => match settings.esv_api_key.as_deref() {
                    Some(key) if !key.trim().is_empty() => match EsvProvider::new(key, timeout) {
                        Ok(p) => resolver = resolver.with_provider(Box::new(p)),
                        Err(e) => log::warn!("ESV provider disabled: {}", e),
                    },
                    _ => log::debug!("No ESV API key configured, skipping provider"),
                },
                ProviderKind::BibleApi => {
                    match BibleApiProvider::new(&settings.translation, timeout) {
                        Ok(p) => resolver = resolver.with_provider(Box::new(p)),
                        Err(e) => log::warn!("bible-api provider disabled: {}", e),
                    }
                }
            }
        }

        resolver
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}

impl TextSource for TextResolver {
    fn resolve(&self, reference: &str) -> Option<Vec<String>> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }

        for provider in &self.providers {
            match provider.fetch(reference) {
                Ok(Some(paragraphs)) if paragraphs.iter().any(|p| !p.trim().is_empty()) => {
                    log::debug!("Resolved '{}' via {}", reference, provider.name());
                    return Some(paragraphs);
                }
                Ok(_) => {}
                Err(e) => {
                    log::warn!("{} lookup failed for '{}': {}", provider.name(), reference, e);
                }
            }
        }

        log::info!("No text found for '{}'", reference);
        None
    }
}
