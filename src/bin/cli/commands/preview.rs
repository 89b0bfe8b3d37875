use anyhow::{bail, Context, Result};
use uuid::Uuid;

use cadence_lib::content::{canonical_body, join_paragraphs};
use cadence_lib::resolver::TextSource;

use crate::app::App;

pub fn run(app: &App, title: &str) -> Result<()> {
    let Some(mut record) = app.store.get(title).context("Failed to read state")? else {
        bail!("No record for '{}'", title);
    };

    if !record.has_canonical_text() {
        match app.resolver.resolve(&record.title) {
            Some(paragraphs) => record.canonical_text = join_paragraphs(&paragraphs),
            None => bail!("No text cached or found for '{}'", record.title),
        }
    }
    // Unbound records preview with a placeholder id
    if record.stable_id.is_none() {
        record.stable_id = Some(Uuid::nil());
    }

    match canonical_body(&record, &app.config) {
        Some(body) => println!("{}", body),
        None => bail!("Nothing to render for '{}'", record.title),
    }
    Ok(())
}
