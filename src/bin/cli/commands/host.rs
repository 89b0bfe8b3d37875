use anyhow::{Context, Result};

use crate::app::App;
use crate::OutputFormat;

pub fn add(
    app: &App,
    title: &str,
    stage: &str,
    body: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let collection = app.collection(stage)?;
    let id = app
        .host
        .add_item(&collection, title.trim(), body.unwrap_or(""))
        .context("Failed to add item")?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "id": id,
                "title": title.trim(),
                "collection": collection,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Plain => println!("Added '{}' to {}", title.trim(), collection),
    }
    Ok(())
}

pub fn complete(app: &App, title: &str) -> Result<()> {
    let (collection, item) = app.find_item(title)?;
    app.host
        .set_completed(&item.id, true)
        .context("Failed to complete item")?;
    println!("Marked '{}' in {} as reviewed", item.title, collection);
    Ok(())
}
