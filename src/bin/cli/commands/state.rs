use anyhow::{Context, Result};

use crate::app::App;
use crate::render::terminal::record_line;
use crate::OutputFormat;

pub fn run(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let records = app.store.list().context("Failed to read state")?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&records)?);
        }
        OutputFormat::Plain => {
            if records.is_empty() {
                println!("(no records)");
            }
            for record in &records {
                println!("{}", record_line(record, use_color));
            }

            let quarantined = app.store.quarantined()?;
            if !quarantined.is_empty() {
                println!();
                println!("Quarantined (unreadable) records:");
                for key in quarantined {
                    println!("  {}", key);
                }
            }
        }
    }

    Ok(())
}
