//! Markdown export of the visible conversation.

use crate::app::ChatEntry;
use chrono::{DateTime, Local, TimeZone};
use dvkcli_memory::Role;
use log::info;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Render `entries` as a markdown document. Notes are left out.
pub fn render_markdown<Tz: TimeZone>(entries: &[ChatEntry], exported_at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut out = String::from("# Conversation Export\n\n");
    let _ = write!(
        out,
        "*Exported: {}*\n\n---\n\n",
        exported_at.format("%Y-%m-%d %H:%M:%S")
    );
    for entry in entries.iter().filter(|entry| entry.role != Role::System) {
        let author = match entry.role {
            Role::User => "**You**",
            _ => "**Assistant**",
        };
        let _ = write!(
            out,
            "{author} ({}):\n\n{}\n\n---\n\n",
            entry.created_at.with_timezone(&Local).format("%H:%M"),
            entry.content
        );
    }
    out
}

/// Export file name for a timestamp.
pub fn export_file_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("chat_export_{}.md", at.format("%Y%m%d_%H%M%S"))
}

/// Write the export into `dir` and return its path.
pub fn write_export(dir: &Path, entries: &[ChatEntry]) -> io::Result<PathBuf> {
    let now = Local::now();
    let path = dir.join(export_file_name(&now));
    fs::write(&path, render_markdown(entries, &now))?;
    info!("conversation exported (path={}, entries={})", path.display(), entries.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::{export_file_name, render_markdown, write_export};
    use crate::app::ChatEntry;
    use chrono::{TimeZone, Utc};
    use dvkcli_memory::Role;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn entries() -> Vec<ChatEntry> {
        vec![
            ChatEntry::new(Role::User, "what is rust?"),
            ChatEntry::new(Role::System, "Memory is not enabled."),
            ChatEntry::new(Role::Assistant, "A systems language."),
        ]
    }

    #[test]
    fn markdown_lists_turns_without_notes() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap();
        let markdown = render_markdown(&entries(), &at);

        assert!(markdown.starts_with("# Conversation Export\n\n*Exported: 2024-05-01 09:30:00*"));
        assert!(markdown.contains("**You** ("));
        assert!(markdown.contains("what is rust?\n\n---"));
        assert!(markdown.contains("**Assistant** ("));
        assert!(!markdown.contains("Memory is not enabled."));
    }

    #[test]
    fn file_name_is_timestamped() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 5).unwrap();
        assert_eq!(export_file_name(&at), "chat_export_20240501_093005.md");
    }

    #[test]
    fn writes_into_the_directory() {
        let dir = tempdir().expect("tempdir");
        let path = write_export(dir.path(), &entries()).expect("export");

        assert_eq!(path.parent(), Some(dir.path()));
        let name = path.file_name().and_then(|n| n.to_str()).expect("name");
        assert!(name.starts_with("chat_export_") && name.ends_with(".md"));
        assert!(fs::read_to_string(&path).expect("read").contains("A systems language."));
    }
}
