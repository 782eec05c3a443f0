//! Link extraction from revision text.
pub mod links;

pub use links::{AnchorPair, LinkExtractor, Links, extract_links};

use crate::models::{AnchorRecord, RevisionRecord};

/// All anchor records found in one revision, in text order.
pub fn revision_anchors<'a>(
    extractor: &LinkExtractor,
    revision: &'a RevisionRecord,
) -> impl Iterator<Item = AnchorRecord<'a>> + 'a {
    extractor
        .extract(&revision.text)
        .map(move |pair| AnchorRecord {
            timestamp: revision.timestamp,
            source_id: revision.page_id,
            rev_id: revision.rev_id,
            parent_id: revision.parent_id,
            anchor: pair.anchor,
            target: pair.target,
        })
}
