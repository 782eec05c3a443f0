use std::iter::FusedIterator;

/// One `[[...]]` link found in wiki markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnchorPair<'a> {
    pub anchor: &'a str,
    pub target: &'a str,
}

impl<'a> From<(&'a str, &'a str)> for AnchorPair<'a> {
    fn from((anchor, target): (&'a str, &'a str)) -> Self {
        Self { anchor, target }
    }
}

/// Scans wiki markup for internal links.
///
/// Only link syntax is understood. Templates, tables and formatting are
/// treated as plain text, and nested brackets are not balanced: the first
/// `]]` after a `[[` closes the span.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkExtractor;

impl LinkExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Lazily extract `(anchor, target)` pairs from `text`, left to right.
    pub fn extract<'a>(&self, text: &'a str) -> Links<'a> {
        Links {
            text,
            pos: 0,
            done: false,
        }
    }
}

/// Iterator returned by [`LinkExtractor::extract`].
pub struct Links<'a> {
    text: &'a str,
    pos: usize,
    done: bool,
}

impl<'a> Iterator for Links<'a> {
    type Item = AnchorPair<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let Some(open) = self.text[self.pos..].find("[[") else {
                self.done = true;
                break;
            };
            let start = self.pos + open + 2;
            let Some(close) = self.text[start..].find("]]") else {
                // Unterminated markup ends extraction; it is not an error.
                self.done = true;
                break;
            };
            let end = start + close;
            self.pos = end + 2;

            if let Some(pair) = parse_span(&self.text[start..end]) {
                return Some(pair);
            }
        }
        None
    }
}

impl FusedIterator for Links<'_> {}

/// Interpret the inside of one `[[...]]` span.
fn parse_span(span: &str) -> Option<AnchorPair<'_>> {
    if span.is_empty() {
        return None;
    }

    let (target, anchor) = match span.split_once('|') {
        Some((target, anchor)) => (target, Some(anchor)),
        None => (span, None),
    };

    // Namespace, category and interwiki links.
    if target.contains(':') {
        return None;
    }

    let target = target.split_once('#').map_or(target, |(page, _)| page);
    if target.is_empty() || target.contains('\t') {
        return None;
    }

    // `[[Page|]]` labels the link with the page title.
    let anchor = anchor.filter(|a| !a.is_empty()).unwrap_or(target);

    // Anchor records are one tab-separated line.
    if anchor.contains(['\n', '\t']) {
        return None;
    }

    Some(AnchorPair { anchor, target })
}

/// Convenience wrapper collecting every pair in `text`.
pub fn extract_links(text: &str) -> Vec<AnchorPair<'_>> {
    LinkExtractor::new().extract(text).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(text: &str) -> Vec<(&str, &str)> {
        extract_links(text)
            .into_iter()
            .map(|p| (p.anchor, p.target))
            .collect()
    }

    #[test]
    fn test_plain_link() {
        assert_eq!(pairs("[[Paris]]"), vec![("Paris", "Paris")]);
    }

    #[test]
    fn test_piped_link() {
        assert_eq!(
            pairs("[[Paris|City of Light]]"),
            vec![("City of Light", "Paris")]
        );
    }

    #[test]
    fn test_category_link_skipped() {
        assert!(pairs("[[Category:Cities]]").is_empty());
        assert!(pairs("[[fr:Paris]] [[File:Eiffel.jpg|thumb]]").is_empty());
    }

    #[test]
    fn test_colon_after_pipe_is_anchor_text() {
        assert_eq!(
            pairs("[[Paris|Paris: the city]]"),
            vec![("Paris: the city", "Paris")]
        );
    }

    #[test]
    fn test_fragment_stripped() {
        assert_eq!(
            pairs("[[Paris#History|Capital]]"),
            vec![("Capital", "Paris")]
        );
        assert_eq!(pairs("[[Paris#History]]"), vec![("Paris", "Paris")]);
    }

    #[test]
    fn test_fragment_only_link_skipped() {
        assert!(pairs("[[#See also]]").is_empty());
        assert!(pairs("[[#Notes|notes]]").is_empty());
    }

    #[test]
    fn test_unterminated() {
        assert!(pairs("[[Unterminated").is_empty());
        assert_eq!(pairs("[[Rome]] then [[Broken"), vec![("Rome", "Rome")]);
        assert!(pairs("no links ]] here").is_empty());
    }

    #[test]
    fn test_empty_spans_skipped() {
        assert_eq!(pairs("[[]][[Rome]]"), vec![("Rome", "Rome")]);
        assert!(pairs("[[|anchor]]").is_empty());
    }

    #[test]
    fn test_empty_pipe_uses_target() {
        assert_eq!(pairs("[[Rome|]]"), vec![("Rome", "Rome")]);
    }

    #[test]
    fn test_newline_anchor_rejected() {
        assert!(pairs("[[Rome|the\ncity]]").is_empty());
        assert_eq!(
            pairs("[[Multi\nline]] [[Rome]]"),
            vec![("Rome", "Rome")]
        );
    }

    #[test]
    fn test_tab_in_link_rejected() {
        assert!(pairs("[[Paris|a\tb]]").is_empty());
        assert_eq!(
            pairs("[[Par\tis]] [[Rome|the city]]"),
            vec![("the city", "Rome")]
        );
    }

    #[test]
    fn test_first_close_wins_over_nesting() {
        // The inner `[[` is part of the span; the outer `]]` is left over.
        assert_eq!(
            pairs("[[Outer [[Inner]] tail]]"),
            vec![("Outer [[Inner", "Outer [[Inner")]
        );
    }

    #[test]
    fn test_multiple_links_in_order() {
        let text = "The [[Seine]] flows through [[Paris|the capital]] to [[Le Havre]].";
        assert_eq!(
            pairs(text),
            vec![
                ("Seine", "Seine"),
                ("the capital", "Paris"),
                ("Le Havre", "Le Havre"),
            ]
        );
    }

    #[test]
    fn test_emitted_pairs_are_well_formed() {
        let text = "[[a|b\nc]] [[:x]] [[#y]] [[]] [[ok|fine]] [[z#w|]] [[trail";
        for pair in extract_links(text) {
            assert!(!pair.target.is_empty());
            assert!(!pair.anchor.contains('\n'));
        }
        assert_eq!(pairs(text), vec![("fine", "ok"), ("z", "z")]);
    }

    #[test]
    fn test_iterator_is_fused() {
        let mut links = LinkExtractor::new().extract("[[A]]");
        assert_eq!(links.next(), Some(AnchorPair::from(("A", "A"))));
        assert_eq!(links.next(), None);
        assert_eq!(links.next(), None);
    }
}
