use cadence_lib::{ItemRecord, Stage};

/// ANSI color codes
#[allow(dead_code)]
pub struct Color;

#[allow(dead_code)]
impl Color {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const DIM: &str = "\x1b[2m";
    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const MAGENTA: &str = "\x1b[35m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";
}

fn paint(text: &str, color: &str, use_color: bool) -> String {
    if use_color {
        format!("{}{}{}", color, text, Color::RESET)
    } else {
        text.to_string()
    }
}

/// Padded stage name, colored by stage
pub fn stage_label(stage: Stage, use_color: bool) -> String {
    let color = match stage {
        Stage::Backlog => Color::GRAY,
        Stage::Daily => Color::YELLOW,
        Stage::Weekly => Color::CYAN,
        Stage::Monthly => Color::BLUE,
        Stage::Mastered => Color::GREEN,
    };
    paint(&format!("{:<8}", stage.as_str()), color, use_color)
}

/// One line per record: stage, progress, next due, title
pub fn record_line(record: &ItemRecord, use_color: bool) -> String {
    let due = record
        .next_due
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string());
    let id_marker = if record.stable_id.is_some() { "" } else { " (unbound)" };
    format!(
        "{} {:>3}  {:<16}  {}{}",
        stage_label(record.stage, use_color),
        record.stage_count(),
        due,
        paint(&record.title, Color::BOLD, use_color),
        paint(id_marker, Color::DIM, use_color)
    )
}

/// Report text with section labels highlighted
pub fn report_text(text: &str, use_color: bool) -> String {
    if !use_color {
        return text.to_string();
    }
    text.lines()
        .map(|line| {
            let (label, rest) = line.split_at(line.find(' ').unwrap_or(line.len()));
            let color = match label {
                "promoted" | "admitted" | "restored" => Color::GREEN,
                "failed" | "conflict" => Color::RED,
                "vanished" | "stale" | "overlap" => Color::YELLOW,
                _ => Color::DIM,
            };
            format!("{}{}", paint(label, color, true), rest)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
