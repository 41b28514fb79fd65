//! Wiki-link syntax: `[[Name]]` or `[[Name|Display]]`.

use once_cell::sync::Lazy;
use regex::Regex;

/// Matches `[[Name]]` or `[[Name|Display]]`. Group 1 is the canonical
/// name; group 2, if present, is the display alias.
pub static WIKI_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[([^\]|]+)(?:\|([^\]]+))?\]\]").unwrap());

/// One occurrence of a wiki-link in the original content.
#[derive(Debug, Clone)]
pub struct WikiLinkMatch {
    pub name: String,
    pub display: Option<String>,
    /// Byte range of `name` within the original content (excludes the
    /// brackets and any `|Display` suffix).
    pub name_range: (usize, usize),
}

/// Every wiki-link occurrence in `content`, in match order.
pub fn find_wiki_links(content: &str) -> Vec<WikiLinkMatch> {
    WIKI_LINK_RE
        .captures_iter(content)
        .map(|caps| {
            let name_cap = caps.get(1).unwrap();
            WikiLinkMatch {
                name: name_cap.as_str().trim().to_string(),
                display: caps.get(2).map(|m| m.as_str().trim().to_string()),
                name_range: (name_cap.start(), name_cap.end()),
            }
        })
        .collect()
}

/// Byte span of the whole `[[...]]` token (brackets included) for every
/// wiki-link occurrence, used to avoid double-wrapping an already
/// wiki-linked mention during the resolver's global replacement.
pub fn find_wiki_link_spans(content: &str) -> Vec<(usize, usize)> {
    WIKI_LINK_RE
        .find_iter(content)
        .map(|m| (m.start(), m.end()))
        .collect()
}

/// Strips wiki-link syntax, replacing each occurrence with its display
/// text (or the canonical name if there is no display alias). Returns
/// the plain text plus, for each stripped link, the `[start, end)` span
/// its replacement text occupies in the plain text.
pub fn strip_wiki_links(content: &str) -> (String, Vec<(usize, usize)>) {
    let mut plain = String::with_capacity(content.len());
    let mut ranges = Vec::new();
    let mut last_end = 0;

    for caps in WIKI_LINK_RE.captures_iter(content) {
        let whole = caps.get(0).unwrap();
        plain.push_str(&content[last_end..whole.start()]);

        let name = caps.get(1).unwrap().as_str().trim();
        let display = caps.get(2).map(|m| m.as_str().trim()).unwrap_or(name);

        let start = plain.len();
        plain.push_str(display);
        let end = plain.len();
        ranges.push((start, end));

        last_end = whole.end();
    }
    plain.push_str(&content[last_end..]);

    (plain, ranges)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_plain_link() {
        let (plain, ranges) = strip_wiki_links("[[Viktor]] met Elara.");
        assert_eq!(plain, "Viktor met Elara.");
        assert_eq!(ranges, vec![(0, 6)]);
    }

    #[test]
    fn strips_link_with_display() {
        let (plain, ranges) = strip_wiki_links("[[Viktor|the old man]] nodded.");
        assert_eq!(plain, "the old man nodded.");
        assert_eq!(ranges, vec![(0, 11)]);
    }

    #[test]
    fn double_strip_is_idempotent() {
        let (once, _) = strip_wiki_links("[[Viktor]] met [[Elara|her]].");
        let (twice, _) = strip_wiki_links(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn finds_name_offset_excluding_brackets() {
        let links = find_wiki_links("[[Ymora]] arrived.");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].name, "Ymora");
        assert_eq!(links[0].name_range, (2, 7));
    }
}
