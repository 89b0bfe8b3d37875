use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use super::{Result, TextProvider};
use crate::state::title_key;

/// Local `verses.txt` lookup.
///
/// One entry per line as `<reference>::<text>`; blank lines and lines
/// starting with `#` are ignored. Matching uses the normalized title key.
pub struct LocalVerseFile {
    path: PathBuf,
}

impl LocalVerseFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_entries(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        Ok(parse_entries(&fs::read_to_string(&self.path)?))
    }
}

fn parse_entries(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once("::"))
        .map(|(reference, text)| (title_key(reference), text.trim().to_string()))
        .filter(|(_, text)| !text.is_empty())
        .collect()
}

impl TextProvider for LocalVerseFile {
    fn name(&self) -> &str {
        "local"
    }

    fn fetch(&self, reference: &str) -> Result<Option<Vec<String>>> {
        // A literal "\n" in the file separates paragraphs
        Ok(self.read_entries()?.remove(&title_key(reference)).map(|text| {
            text.split("\\n")
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect()
        }))
    }
}
