// ./client/src/output.rs
use application::ListNotesResponse;
use chrono::{DateTime, Utc};
use domain::Note;

const TITLE_WIDTH: usize = 30;

pub fn format_time(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub fn note_detail(note: &Note) -> String {
    [
        "=== Note Details ===".to_string(),
        format!("ID:         {}", note.id()),
        format!("Title:      {}", note.title()),
        format!("Content:    {}", note.content()),
        format!("Created:    {}", format_time(note.created_at())),
        format!("Updated:    {}", format_time(note.updated_at())),
        "====================".to_string(),
    ]
    .join("\n")
}

/// One row per note, with a header line carrying the paging position.
pub fn notes_table(list: &ListNotesResponse) -> String {
    if list.notes.is_empty() {
        return if list.total == 0 {
            "No notes found.".to_string()
        } else {
            format!("No notes on this page ({} in total).", list.total)
        };
    }

    let mut lines = vec![
        format!(
            "Total notes: {} (page {} of {})",
            list.total, list.page, list.total_pages
        ),
        String::new(),
        format!(
            "{:<6}| {:<width$} | {:<19} | {:<19}",
            "ID",
            "Title",
            "Created At",
            "Updated At",
            width = TITLE_WIDTH
        ),
        format!(
            "{}|{}|{}|{}",
            "-".repeat(6),
            "-".repeat(TITLE_WIDTH + 2),
            "-".repeat(21),
            "-".repeat(20)
        ),
    ];
    for note in &list.notes {
        lines.push(format!(
            "{:<6}| {:<width$} | {:<19} | {:<19}",
            note.id().as_i64(),
            truncate(note.title(), TITLE_WIDTH),
            format_time(note.created_at()),
            format_time(note.updated_at()),
            width = TITLE_WIDTH
        ));
    }
    lines.join("\n")
}

/// Cuts `text` to at most `width` characters, marking the cut with "...".
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let kept: String = text.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}
