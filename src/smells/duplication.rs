use crate::config::DuplicationConfig;
use crate::core::{CloneKind, DuplicateBlock, DuplicateLocation, NormalizedLine, SourceUnit};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use xxhash_rust::xxh64::xxh64;

/// Clone detection over normalized line shingles.
///
/// Two passes share one sliding window: an exact pass hashes the normalized
/// text as-is, a structural pass hashes it with identifiers blanked. Blocks
/// that only match structurally are scored by token overlap and classed
/// structural or semantic; everything below the configured similarity floor
/// is dropped.
pub fn detect_duplication(units: &[SourceUnit], config: &DuplicationConfig) -> Vec<DuplicateBlock> {
    let min_lines = config.min_lines.max(2);

    let mut exact: HashMap<u64, Vec<Window>> = HashMap::new();
    let mut structural: HashMap<u64, Vec<Window>> = HashMap::new();

    for unit in units {
        for window in windows(&unit.path, &unit.normalized_lines, min_lines) {
            exact.entry(window.exact_hash).or_default().push(window.clone());
            structural
                .entry(window.shape_hash)
                .or_default()
                .push(window);
        }
    }

    let mut blocks = Vec::new();

    for (hash, group) in &exact {
        if group.len() > 1 {
            blocks.push(build_block(*hash, group, 100, CloneKind::Exact, min_lines));
        }
    }

    for (hash, group) in &structural {
        if group.len() < 2 {
            continue;
        }
        // Skip groups already reported by the exact pass.
        if group.iter().all(|w| w.exact_hash == group[0].exact_hash) {
            continue;
        }

        let similarity = token_similarity(&group[0].text, &group[1].text);
        if similarity < config.similarity_floor {
            continue;
        }
        let classification = if similarity >= config.structural_similarity {
            CloneKind::Structural
        } else {
            CloneKind::Semantic
        };
        blocks.push(build_block(*hash, group, similarity, classification, min_lines));
    }

    let mut merged = merge_adjacent(blocks);
    merged.sort_by(|a, b| a.locations.cmp(&b.locations));
    merged
}

#[derive(Clone)]
struct Window {
    file: PathBuf,
    start_line: usize,
    end_line: usize,
    text: String,
    exact_hash: u64,
    shape_hash: u64,
}

fn windows(path: &PathBuf, lines: &[NormalizedLine], size: usize) -> Vec<Window> {
    if lines.len() < size {
        return Vec::new();
    }

    (0..=lines.len() - size)
        .map(|i| {
            let chunk = &lines[i..i + size];
            let text = chunk
                .iter()
                .map(|l| l.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            let shape = blank_identifiers(&text);
            Window {
                file: path.clone(),
                start_line: chunk[0].line,
                end_line: chunk[size - 1].line,
                exact_hash: xxh64(text.as_bytes(), 0),
                shape_hash: xxh64(shape.as_bytes(), 0),
                text,
            }
        })
        .collect()
}

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap());

static KEYWORDS: &[&str] = &[
    "if", "else", "elif", "for", "while", "do", "switch", "case", "match", "return", "break",
    "continue", "fn", "def", "function", "class", "struct", "impl", "let", "const", "var", "mut",
    "pub", "use", "import", "from", "export", "try", "catch", "except", "finally", "throw",
    "raise", "async", "await", "new", "this", "self", "super", "true", "false", "null", "None",
];

fn blank_identifiers(text: &str) -> String {
    IDENTIFIER_RE
        .replace_all(text, |caps: &regex::Captures| {
            let word = caps.get(0).map(|m| m.as_str()).unwrap_or("");
            if KEYWORDS.contains(&word) {
                word.to_string()
            } else {
                "_".to_string()
            }
        })
        .into_owned()
}

/// Jaccard overlap of the token sets, scaled to 0-100.
fn token_similarity(left: &str, right: &str) -> u8 {
    let tokens_left: std::collections::HashSet<&str> =
        left.split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| t.len() > 1)
            .collect();
    let tokens_right: std::collections::HashSet<&str> =
        right.split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|t| t.len() > 1)
            .collect();

    let intersection = tokens_left.intersection(&tokens_right).count();
    let union = tokens_left.union(&tokens_right).count();
    if union == 0 {
        return 0;
    }
    ((intersection * 100) / union) as u8
}

fn build_block(
    hash: u64,
    group: &[Window],
    similarity: u8,
    classification: CloneKind,
    min_lines: usize,
) -> DuplicateBlock {
    let mut locations: Vec<DuplicateLocation> = group
        .iter()
        .map(|w| DuplicateLocation {
            file: w.file.clone(),
            start_line: w.start_line,
            end_line: w.end_line,
        })
        .collect();
    locations.sort();
    locations.dedup();

    DuplicateBlock {
        hash: format!("{hash:016x}"),
        lines: min_lines,
        similarity,
        classification,
        // Semantic matches diverge too much for mechanical extraction.
        extractable: classification != CloneKind::Semantic,
        locations,
    }
}

/// Collapse blocks whose locations continue each other into one larger
/// block, so a 12-line clone is not reported as seven 6-line windows.
fn merge_adjacent(blocks: Vec<DuplicateBlock>) -> Vec<DuplicateBlock> {
    let mut sorted = blocks;
    sorted.sort_by(|a, b| {
        a.locations
            .first()
            .map(|l| (l.file.clone(), l.start_line))
            .cmp(&b.locations.first().map(|l| (l.file.clone(), l.start_line)))
    });

    let mut merged: Vec<DuplicateBlock> = Vec::new();
    for block in sorted {
        if let Some(last) = merged.last_mut() {
            if can_merge(last, &block) {
                absorb(last, block);
                continue;
            }
        }
        merged.push(block);
    }
    merged
}

fn can_merge(left: &DuplicateBlock, right: &DuplicateBlock) -> bool {
    left.classification == right.classification
        && left.locations.len() == right.locations.len()
        && left
            .locations
            .iter()
            .zip(right.locations.iter())
            .all(|(a, b)| a.file == b.file && b.start_line <= a.end_line + 1 && b.start_line > a.start_line)
}

fn absorb(target: &mut DuplicateBlock, source: DuplicateBlock) {
    for (loc, src) in target.locations.iter_mut().zip(source.locations) {
        loc.end_line = loc.end_line.max(src.end_line);
    }
    target.lines = target
        .locations
        .first()
        .map(|l| l.end_line - l.start_line + 1)
        .unwrap_or(target.lines);
    target.similarity = target.similarity.min(source.similarity);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::parse_source;
    use crate::core::SourceFile;

    fn unit_of(path: &str, content: &str) -> SourceUnit {
        parse_source(&SourceFile::new(path, content))
    }

    const CLONE_A: &str = r#"
function totalPrice(items) {
    let total = 0;
    for (const item of items) {
        if (item.active) {
            total += item.price * item.quantity;
        }
    }
    return total;
}
"#;

    const CLONE_B: &str = r#"
function totalCost(entries) {
    let total = 0;
    for (const item of entries) {
        if (item.active) {
            total += item.price * item.quantity;
        }
    }
    return total;
}
"#;

    #[test]
    fn identical_blocks_are_exact_clones() {
        let config = DuplicationConfig::default();
        let units = vec![
            unit_of("a.js", CLONE_A),
            unit_of("b.js", CLONE_A),
        ];
        let blocks = detect_duplication(&units, &config);
        assert!(!blocks.is_empty());
        let exact = blocks
            .iter()
            .find(|b| b.classification == CloneKind::Exact)
            .expect("exact clone");
        assert_eq!(exact.similarity, 100);
        assert!(exact.extractable);
        assert_eq!(exact.locations.len(), 2);
    }

    #[test]
    fn renamed_blocks_are_structural_clones() {
        let config = DuplicationConfig::default();
        let units = vec![
            unit_of("a.js", CLONE_A),
            unit_of("b.js", CLONE_B),
        ];
        let blocks = detect_duplication(&units, &config);
        assert!(blocks
            .iter()
            .any(|b| b.classification == CloneKind::Structural));
    }

    #[test]
    fn unrelated_files_have_no_clones() {
        let config = DuplicationConfig::default();
        let units = vec![
            unit_of("a.js", "function one() { return 1; }\n"),
            unit_of("b.js", "function two(x, y) { return x * y + 42; }\n"),
        ];
        assert!(detect_duplication(&units, &config).is_empty());
    }

    #[test]
    fn similarity_is_symmetric_and_bounded() {
        let s = token_similarity("alpha beta gamma", "alpha beta delta");
        assert!(s > 0 && s < 100);
        assert_eq!(s, token_similarity("alpha beta delta", "alpha beta gamma"));
    }
}
