//! Rendering and command parsing for the `joblist` terminal watcher.

use joblist_types::Direction;
use joblist_watch::PageView;
use std::fmt::Write;

/// Key help printed under every page.
pub const HELP: &str = "[n]ext  [p]rev  [a]pply pending  [l]ive on/off  [s N] page size  [r]efresh  [q]uit";

/// A command typed at the prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Page(Direction),
    ApplyPending,
    ToggleLive,
    PageSize(usize),
    Refresh,
    Quit,
}

/// Parses one input line. Unknown input yields `None`.
pub fn parse_command(line: &str) -> Option<Command> {
    let mut parts = line.split_whitespace();
    let command = match parts.next()? {
        "n" | "next" => Command::Page(Direction::Forward),
        "p" | "prev" => Command::Page(Direction::Backward),
        "a" | "apply" => Command::ApplyPending,
        "l" | "live" => Command::ToggleLive,
        "s" | "size" => Command::PageSize(parts.next()?.parse().ok()?),
        "r" | "refresh" => Command::Refresh,
        "q" | "quit" => Command::Quit,
        _ => return None,
    };
    match parts.next() {
        Some(_) => None,
        None => Some(command),
    }
}

/// Renders the page as a plain-text table.
pub fn render_page(page: &PageView, live: bool) -> String {
    let mut out = String::new();
    let position = page
        .cursor
        .cursor_at
        .as_ref()
        .map_or("first page", |t| t.as_str());
    let _ = writeln!(
        out,
        "── Jobs ({}, {} per page, live updates {}) ──",
        position,
        page.cursor.page_size,
        if live { "on" } else { "off" }
    );

    if page.forbidden {
        let _ = writeln!(out, "  access denied: check the ACL token");
    }
    if page.rows.is_empty() {
        let _ = writeln!(out, "  (no jobs)");
    }

    for row in &page.rows {
        let (status, job_type, priority) = match &row.record {
            Some(record) => (
                record.status.as_deref().unwrap_or("-"),
                record.job_type.as_deref().unwrap_or("-"),
                record.priority.map_or_else(|| "-".to_string(), |p| p.to_string()),
            ),
            None => ("-", "-", "-".to_string()),
        };
        let marker = if row.detailed { ' ' } else { '*' };
        let _ = writeln!(
            out,
            " {}{:<40} {:<10} {:<8} {:>4}",
            marker,
            format!("{}/{}", row.job.namespace, row.job.id),
            status,
            job_type,
            priority
        );
    }

    if let Some(pending) = &page.pending {
        let _ = writeln!(out, "  {} jobs changed, press [a] to show them", pending.len());
    }

    let prev = if page.has_prev { "< prev" } else { "" };
    let next = if page.has_next { "next >" } else { "" };
    let _ = writeln!(out, "  {:<8}{:>8}", prev, next);
    out.push_str(HELP);
    out
}
