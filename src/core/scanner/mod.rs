//! Text Scanner (C1).
//!
//! Deterministic detection of wiki-links, untagged mentions, and
//! misspellings in a source text. See [`scan`] for the contract.

mod fuzzy;
mod wiki_link;

pub use fuzzy::{EntityCandidate, FuzzyNameIndex};
pub use wiki_link::{find_wiki_link_spans, find_wiki_links, strip_wiki_links};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;

const CONTEXT_RADIUS: usize = 50;
const PASS_C_MAX_ITEMS: usize = 20;
const PASS_C_MAX_WORDS: usize = 5;
const RESOLVED_THRESHOLD: f64 = 0.9;
const SUGGESTION_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionType {
    WikiLinkUnresolved,
    UntaggedMention,
    Misspelling,
    PotentialAlias,
}

/// One finding emitted by a scanner pass. Maps directly onto a row of
/// `content_analysis_items` with `phase = "identification"`.
#[derive(Debug, Clone)]
pub struct ScannedItem {
    pub detection_type: DetectionType,
    pub matched_text: String,
    pub entity_id: Option<String>,
    pub similarity: Option<f64>,
    pub context_snippet: Option<String>,
    pub position_start: Option<i64>,
    pub position_end: Option<i64>,
}

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z][A-Za-z'-]*").unwrap());

fn snippet(text: &str, start: usize, end: usize) -> String {
    let lo = start.saturating_sub(CONTEXT_RADIUS);
    let hi = (end + CONTEXT_RADIUS).min(text.len());
    // byte ranges must land on char boundaries; widen outward if they don't.
    let lo = (lo..=start).find(|&i| text.is_char_boundary(i)).unwrap_or(0);
    let hi = (hi..=text.len())
        .rev()
        .find(|&i| text.is_char_boundary(i))
        .unwrap_or_else(|| text.len());
    text[lo..hi].to_string()
}

/// Runs all three scanner passes over `content` against `index`.
/// Deterministic: identical inputs always yield identical items in
/// identical order.
pub fn scan(content: &str, index: &FuzzyNameIndex) -> Vec<ScannedItem> {
    let mut items = Vec::new();
    let mut matched_names: HashSet<String> = HashSet::new();

    run_pass_a(content, index, &mut items, &mut matched_names);

    let (plain_text, stripped_ranges) = strip_wiki_links(content);
    let orig_spans = find_wiki_link_spans(content);
    run_pass_b(&plain_text, index, &stripped_ranges, &orig_spans, &mut items, &mut matched_names);
    run_pass_c(&plain_text, index, &stripped_ranges, &orig_spans, &matched_names, &mut items);

    items
}

fn run_pass_a(
    content: &str,
    index: &FuzzyNameIndex,
    items: &mut Vec<ScannedItem>,
    matched_names: &mut HashSet<String>,
) {
    for link in find_wiki_links(content) {
        let best = index.best_match(&link.name);
        match best {
            Some(m) if m.similarity >= RESOLVED_THRESHOLD => {
                matched_names.insert(link.name.to_lowercase());
            }
            Some(m) if m.similarity >= SUGGESTION_THRESHOLD => {
                let (start, end) = link.name_range;
                items.push(ScannedItem {
                    detection_type: DetectionType::WikiLinkUnresolved,
                    matched_text: link.name.clone(),
                    entity_id: Some(m.entity.id),
                    similarity: Some(m.similarity),
                    context_snippet: Some(snippet(content, start, end)),
                    position_start: Some(start as i64),
                    position_end: Some(end as i64),
                });
            }
            _ => {
                let (start, end) = link.name_range;
                items.push(ScannedItem {
                    detection_type: DetectionType::WikiLinkUnresolved,
                    matched_text: link.name.clone(),
                    entity_id: None,
                    similarity: None,
                    context_snippet: Some(snippet(content, start, end)),
                    position_start: Some(start as i64),
                    position_end: Some(end as i64),
                });
            }
        }
    }
}

fn overlaps_any(start: usize, end: usize, ranges: &[(usize, usize)]) -> bool {
    ranges.iter().any(|&(rs, re)| start < re && rs < end)
}

/// Maps a byte offset in the post-`strip_wiki_links` plain text back to its
/// offset in the original source. Pass B/C only call this for matches that
/// don't overlap a stripped range, so the offset always falls in a segment
/// copied verbatim from `content`; the running `delta` accounts for the
/// length difference each earlier wiki-link's replacement introduced.
fn to_original_offset(plain_pos: usize, stripped_ranges: &[(usize, usize)], orig_spans: &[(usize, usize)]) -> usize {
    let mut delta: isize = 0;
    for (&(ps, pe), &(os, oe)) in stripped_ranges.iter().zip(orig_spans.iter()) {
        if plain_pos < ps {
            break;
        }
        if plain_pos < pe {
            return os;
        }
        delta += (oe as isize - os as isize) - (pe as isize - ps as isize);
    }
    (plain_pos as isize + delta) as usize
}

fn run_pass_b(
    plain_text: &str,
    index: &FuzzyNameIndex,
    stripped_ranges: &[(usize, usize)],
    orig_spans: &[(usize, usize)],
    items: &mut Vec<ScannedItem>,
    matched_names: &mut HashSet<String>,
) {
    let lower_plain = plain_text.to_lowercase();
    for entity in index.entities() {
        if entity.name.chars().count() < 3 {
            continue;
        }
        let needle = entity.name.to_lowercase();
        let mut search_from = 0usize;
        let mut found_any = false;
        while let Some(rel) = lower_plain[search_from..].find(&needle) {
            let start = search_from + rel;
            let end = start + needle.len();
            search_from = start + 1;
            if overlaps_any(start, end, stripped_ranges) {
                continue;
            }
            found_any = true;
            let orig_start = to_original_offset(start, stripped_ranges, orig_spans);
            let orig_end = to_original_offset(end, stripped_ranges, orig_spans);
            items.push(ScannedItem {
                detection_type: DetectionType::UntaggedMention,
                matched_text: plain_text[start..end].to_string(),
                entity_id: Some(entity.id.clone()),
                similarity: Some(1.0),
                context_snippet: Some(snippet(plain_text, start, end)),
                position_start: Some(orig_start as i64),
                position_end: Some(orig_end as i64),
            });
        }
        if found_any {
            matched_names.insert(entity.name.to_lowercase());
        }
    }
}

struct WordToken {
    start: usize,
    end: usize,
}

fn run_pass_c(
    plain_text: &str,
    index: &FuzzyNameIndex,
    stripped_ranges: &[(usize, usize)],
    orig_spans: &[(usize, usize)],
    matched_names: &HashSet<String>,
    items: &mut Vec<ScannedItem>,
) {
    let words: Vec<WordToken> = WORD_RE
        .find_iter(plain_text)
        .map(|m| WordToken {
            start: m.start(),
            end: m.end(),
        })
        .collect();

    let mut emitted = 0usize;
    let mut seen_phrases: HashSet<String> = HashSet::new();

    'outer: for i in 0..words.len() {
        let starts_upper = plain_text[words[i].start..words[i].end]
            .chars()
            .next()
            .map(|c| c.is_uppercase())
            .unwrap_or(false);
        if !starts_upper {
            continue;
        }
        let max_len = PASS_C_MAX_WORDS.min(words.len() - i);
        for len in 1..=max_len {
            let start = words[i].start;
            let end = words[i + len - 1].end;
            let phrase = &plain_text[start..end];

            if phrase.chars().count() < 2 {
                continue;
            }
            let phrase_lower = phrase.to_lowercase();
            if matched_names.contains(&phrase_lower) {
                continue;
            }
            if overlaps_any(start, end, stripped_ranges) {
                continue;
            }
            if !seen_phrases.insert(format!("{start}:{end}")) {
                continue;
            }

            let Some(best) = index.best_match(phrase) else {
                continue;
            };
            if phrase.chars().count() < best.entity.name.chars().count() / 2 {
                continue;
            }
            if !(SUGGESTION_THRESHOLD..RESOLVED_THRESHOLD).contains(&best.similarity) {
                continue;
            }

            let entity_lower = best.entity.name.to_lowercase();
            let detection_type = if entity_lower.contains(&phrase_lower) || phrase_lower.contains(&entity_lower) {
                DetectionType::PotentialAlias
            } else {
                DetectionType::Misspelling
            };

            let orig_start = to_original_offset(start, stripped_ranges, orig_spans);
            let orig_end = to_original_offset(end, stripped_ranges, orig_spans);
            items.push(ScannedItem {
                detection_type,
                matched_text: phrase.to_string(),
                entity_id: Some(best.entity.id.clone()),
                similarity: Some(best.similarity),
                context_snippet: Some(snippet(plain_text, start, end)),
                position_start: Some(orig_start as i64),
                position_end: Some(orig_end as i64),
            });
            emitted += 1;
            if emitted >= PASS_C_MAX_ITEMS {
                break 'outer;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(names: &[&str]) -> FuzzyNameIndex {
        FuzzyNameIndex::new(
            names
                .iter()
                .enumerate()
                .map(|(i, n)| EntityCandidate {
                    id: (i + 1).to_string(),
                    name: n.to_string(),
                })
                .collect(),
        )
    }

    #[test]
    fn resolved_wiki_link_is_silent() {
        let index = index_with(&["Viktor"]);
        let items = scan("[[Viktor]] met Elara.", &index);
        assert!(items.iter().all(|i| i.detection_type != DetectionType::WikiLinkUnresolved));
    }

    #[test]
    fn unresolved_wiki_link_reports_position() {
        let index = index_with(&[]);
        let items = scan("[[Ymora]] arrived.", &index);
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.detection_type, DetectionType::WikiLinkUnresolved);
        assert_eq!(item.matched_text, "Ymora");
        assert_eq!(item.position_start, Some(2));
        assert_eq!(item.position_end, Some(7));
        assert_eq!(item.entity_id, None);
    }

    #[test]
    fn untagged_mention_detected_case_insensitively() {
        let index = index_with(&["Elara"]);
        let items = scan("Viktor met elara in the market.", &index);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].detection_type, DetectionType::UntaggedMention);
        assert_eq!(items[0].matched_text, "elara");
    }

    #[test]
    fn untagged_mention_does_not_overlap_stripped_link() {
        let index = index_with(&["Elara"]);
        let items = scan("[[Elara]] smiled.", &index);
        assert!(items.is_empty());
    }

    #[test]
    fn pass_c_caps_at_twenty_items() {
        let index = index_with(&["Zorathiel Quendrath"]);
        let mut text = String::new();
        for i in 0..40 {
            text.push_str(&format!("Zorathil Quendra{i} visited. "));
        }
        let items = scan(&text, &index);
        assert!(items.len() <= PASS_C_MAX_ITEMS);
    }

    #[test]
    fn double_scan_is_idempotent_on_plain_text() {
        let content = "[[Viktor]] met [[Elara|her]] twice.";
        let (once, _) = strip_wiki_links(content);
        let (twice, _) = strip_wiki_links(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn untagged_mention_position_is_in_original_source_coordinates() {
        let index = index_with(&["Elara"]);
        let content = "[[Viktor]] met Elara.";
        let items = scan(content, &index);
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item.detection_type, DetectionType::UntaggedMention);
        let start = item.position_start.unwrap() as usize;
        let end = item.position_end.unwrap() as usize;
        assert_eq!(&content[start..end], "Elara");
    }

    #[test]
    fn pass_c_position_survives_a_display_aliased_link_of_different_length() {
        let index = index_with(&["Zorathiel Quendrath"]);
        let content = "[[Viktor|the old man]] recalled Zorathil Quendra once.";
        let items = scan(content, &index);
        let item = items
            .iter()
            .find(|i| i.detection_type != DetectionType::WikiLinkUnresolved)
            .expect("pass C should flag the misspelling");
        let start = item.position_start.unwrap() as usize;
        let end = item.position_end.unwrap() as usize;
        assert_eq!(&content[start..end], item.matched_text);
    }
}
