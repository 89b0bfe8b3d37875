use anyhow::Result;

use cadence_lib::TickReport;

use crate::app::App;
use crate::render::terminal::report_text;
use crate::OutputFormat;

pub fn tick(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let report = app.scheduler().run_tick(app.now());
    print_report(&report, format, use_color)
}

pub fn advance(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let mut report = TickReport::default();
    app.scheduler().advance(app.now(), &mut report);
    print_report(&report, format, use_color)
}

pub fn reconcile(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let mut report = TickReport::default();
    app.scheduler().reconcile(app.now(), &mut report);
    print_report(&report, format, use_color)
}

pub fn intake(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let mut report = TickReport::default();
    app.scheduler().intake(app.now(), &mut report);
    print_report(&report, format, use_color)
}

pub fn fill_notes(app: &App, format: &OutputFormat, use_color: bool) -> Result<()> {
    let mut report = TickReport::default();
    app.scheduler().fill_notes(app.now(), &mut report);
    print_report(&report, format, use_color)
}

fn print_report(report: &TickReport, format: &OutputFormat, use_color: bool) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
        OutputFormat::Plain => {
            let text = report.to_string();
            if text.is_empty() {
                println!("Nothing to do.");
            } else {
                println!("{}", report_text(text.trim_end(), use_color));
            }
        }
    }
    Ok(())
}
