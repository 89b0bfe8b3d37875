use anyhow::{Context, Result};

use crate::app::App;
use crate::OutputFormat;

pub fn run(app: &App, format: &OutputFormat) -> Result<()> {
    let stale = app
        .scheduler()
        .stale_records()
        .context("Failed to compute stale records")?;

    match format {
        OutputFormat::Json => {
            let output: Vec<_> = stale
                .iter()
                .map(|r| {
                    serde_json::json!({
                        "title": r.title,
                        "stage": r.stage,
                        "stableId": r.stable_id,
                        "lastReviewedAt": r.last_reviewed_at,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => {
            if stale.is_empty() {
                println!("No stale records.");
            }
            for record in &stale {
                println!("{} ({})", record.title, record.stage);
            }
        }
    }

    Ok(())
}
