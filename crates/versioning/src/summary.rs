use regex::Regex;
use std::collections::HashSet;

use crate::HistoryEntry;

pub const GENERIC_CHANGE: &str = "Updated site content";
pub const GENERIC_TITLE: &str = "Site update";

/// Collapses whitespace and case so "Edited  Heading" and "edited heading"
/// count as the same change.
pub fn normalize_description(description: &str) -> String {
    description
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Bullet list for a version: most recent first, deduplicated by normalized
/// description, at most `limit` lines. `entries` must be oldest first, as
/// returned by `EditHistory::changes_since`.
pub fn summarize_changes(entries: &[&HistoryEntry], limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut bullets: Vec<String> = entries
        .iter()
        .rev()
        .filter_map(|e| {
            let text = e.meta.description.split_whitespace().collect::<Vec<_>>().join(" ");
            let key = text.to_lowercase();
            if key.is_empty() || !seen.insert(key) {
                None
            } else {
                Some(text)
            }
        })
        .take(limit.max(1))
        .collect();
    if bullets.is_empty() {
        bullets.push(GENERIC_CHANGE.to_string());
    }
    bullets
}

#[derive(Debug, Clone)]
pub enum TitlePredicate {
    /// Any keyword appears as a substring of the normalized description.
    Contains(Vec<&'static str>),
    /// Case-insensitive pattern match.
    Matches(Regex),
}

impl TitlePredicate {
    fn test(&self, normalized: &str) -> bool {
        match self {
            Self::Contains(words) => words.iter().any(|w| normalized.contains(w)),
            Self::Matches(re) => re.is_match(normalized),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TitleRule {
    pub predicate: TitlePredicate,
    pub title: &'static str,
    pub short_title: &'static str,
}

impl TitleRule {
    pub fn contains(words: &[&'static str], title: &'static str, short_title: &'static str) -> Self {
        Self {
            predicate: TitlePredicate::Contains(words.to_vec()),
            title,
            short_title,
        }
    }

    /// Rules are compiled once at startup from literals; an invalid pattern
    /// is a programming error.
    fn pattern(pattern: &str, title: &'static str, short_title: &'static str) -> Self {
        let re = Regex::new(pattern).unwrap_or_else(|e| panic!("invalid title rule {pattern}: {e}"));
        Self {
            predicate: TitlePredicate::Matches(re),
            title,
            short_title,
        }
    }
}

/// Ordered title rules; the first matching rule names the version.
pub fn default_title_rules() -> Vec<TitleRule> {
    vec![
        TitleRule::contains(&["restored", "restore"], "Restored earlier version", "Restore"),
        TitleRule::pattern(r"\b(add|added|create|created|new)\b.*\bpage\b", "Added a page", "New page"),
        TitleRule::pattern(r"\b(delete|deleted|remove|removed)\b.*\bpage\b", "Removed a page", "Page removed"),
        TitleRule::contains(&["rename"], "Renamed content", "Rename"),
        TitleRule::contains(&["theme", "color", "colour", "font", "typography", "style"], "Updated styling", "Style"),
        TitleRule::contains(&["image", "photo", "video", "media", "logo", "gallery"], "Updated media", "Media"),
        TitleRule::pattern(
            r"\b(moved|move|reorder|reordered|dragged)\b",
            "Rearranged layout",
            "Layout",
        ),
        TitleRule::pattern(
            r"\b(section|module|block|component)\b",
            "Changed page sections",
            "Sections",
        ),
        TitleRule::contains(&["seo", "meta", "favicon"], "Updated SEO settings", "SEO"),
        TitleRule::contains(&["menu", "navigation", "nav", "link"], "Updated navigation", "Navigation"),
        TitleRule::contains(&["text", "heading", "title", "copy", "paragraph"], "Edited text", "Text"),
    ]
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

/// `(title, short_title)` for a version whose most recent change is
/// `description`.
///
/// Without a matching rule the description itself is used, truncated to
/// `max_chars`, and the short title is its first three words.
pub fn derive_title(description: Option<&str>, rules: &[TitleRule], max_chars: usize) -> (String, String) {
    let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return (GENERIC_TITLE.to_string(), "Update".to_string());
    };

    let normalized = normalize_description(description);
    if let Some(rule) = rules.iter().find(|r| r.predicate.test(&normalized)) {
        return (rule.title.to_string(), rule.short_title.to_string());
    }

    let title = truncate_chars(description, max_chars.max(4));
    let short: Vec<&str> = description.split_whitespace().take(3).collect();
    (title, short.join(" "))
}
