pub mod rust;
pub mod treesitter;

use crate::core::{
    Finding, FindingKind, Language, NormalizedLine, Severity, SourceFile, SourceLocation,
    SourceUnit,
};
use once_cell::sync::Lazy;
use regex::Regex;

/// Builds one file's structural model from raw text. A parse failure is
/// recorded as a `Syntax` finding on the returned unit, never propagated; a
/// single file's failure must not abort a multi-file run.
pub trait SourceParser: Send + Sync {
    fn parse(&self, file: &SourceFile) -> SourceUnit;
    fn language(&self) -> Language;
}

pub fn parser_for(language: Language) -> Box<dyn SourceParser> {
    match language {
        Language::Rust => Box::new(rust::RustParser),
        Language::JavaScript => Box::new(treesitter::TreeSitterParser::javascript()),
        Language::TypeScript => Box::new(treesitter::TreeSitterParser::typescript()),
        Language::Python => Box::new(treesitter::TreeSitterParser::python()),
        Language::Unknown => Box::new(NullParser),
    }
}

/// Parse one source file into its structural model.
pub fn parse_source(file: &SourceFile) -> SourceUnit {
    parser_for(file.language).parse(file)
}

struct NullParser;

impl SourceParser for NullParser {
    fn parse(&self, file: &SourceFile) -> SourceUnit {
        let mut unit = SourceUnit::empty(file.path.clone(), Language::Unknown);
        unit.lines = file.content.lines().count();
        unit
    }

    fn language(&self) -> Language {
        Language::Unknown
    }
}

static MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(TODO|FIXME|HACK|XXX)\b:?\s*(.*)").unwrap());

/// Scan raw text for TODO/FIXME-style markers. Runs inside the parser stage
/// so later stages never touch raw text.
pub(crate) fn scan_markers(content: &str, file: &std::path::Path) -> Vec<Finding> {
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, line)| {
            MARKER_RE.captures(line).map(|caps| {
                let tag = caps.get(1).map(|m| m.as_str()).unwrap_or("TODO");
                let rest = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
                Finding {
                    kind: FindingKind::Marker,
                    severity: Severity::Info,
                    location: SourceLocation::point(file, idx + 1, 0),
                    message: if rest.is_empty() {
                        format!("{tag} marker")
                    } else {
                        format!("{tag}: {rest}")
                    },
                    auto_fixable: false,
                    suggested: vec![],
                    advice: vec![],
                    effort_minutes: 0,
                }
            })
        })
        .collect()
}

/// Trim and strip comment/blank lines, keeping original line numbers, for
/// the clone detector.
pub(crate) fn normalize_lines(
    content: &str,
    comment_prefixes: &[&str],
) -> Vec<NormalizedLine> {
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, raw)| {
            let text = raw.trim();
            if text.is_empty() || comment_prefixes.iter().any(|p| text.starts_with(p)) {
                return None;
            }
            Some(NormalizedLine {
                line: idx + 1,
                text: text.to_string(),
            })
        })
        .collect()
}

pub(crate) fn syntax_finding(file: &std::path::Path, line: usize, message: String) -> Finding {
    Finding {
        kind: FindingKind::Syntax,
        severity: Severity::Error,
        location: SourceLocation::point(file, line, 0),
        message,
        auto_fixable: false,
        suggested: vec![],
        advice: vec![],
        effort_minutes: 0,
    }
}
