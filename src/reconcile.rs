//! Diffs the remote pack catalog against local state
//!
//! Produces the contiguous range of not-yet-requested packs plus the set of
//! catalogued packs whose content token is missing from the local partition.

use std::collections::HashSet;

use crate::token::{display_key, strip_release_tags, NameKey};

/// One row of the remote pack listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub pack: u32,
    pub name: String,
}

/// A catalogued pack that should be present locally but is not. `token` is
/// `None` when the name carries no usable dedup key; the pack number is still
/// enough to re-request it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissedPack {
    pub pack: u32,
    pub token: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Highest pack number seen; never below the input watermark.
    pub latest: u32,
    /// Pack numbers past the watermark, in ascending order. Gaps in remote
    /// numbering are enqueued anyway; the transfer layer tolerates not-found.
    pub pending: Vec<u32>,
    /// Catalog-ordered packs absent from the local token set.
    pub missed: Vec<MissedPack>,
}

pub fn reconcile(
    catalog: &[CatalogEntry],
    local_tokens: &HashSet<String>,
    watermark: u32,
) -> Reconciliation {
    let top = catalog.iter().map(|e| e.pack).max();
    let top = match top {
        Some(n) => n,
        // Empty or unreachable listing: nothing new, nothing missed, and the
        // cursor must not move.
        None => {
            return Reconciliation {
                latest: watermark,
                ..Reconciliation::default()
            }
        }
    };

    let start = if watermark == 0 {
        catalog
            .iter()
            .map(|e| e.pack)
            .filter(|&p| p > 0)
            .min()
            .unwrap_or(1)
    } else {
        watermark + 1
    };
    let pending: Vec<u32> = (start..=top).filter(|&p| p > 0).collect();

    let mut missed = Vec::new();
    for entry in catalog {
        let key = display_key(&strip_release_tags(&entry.name));
        match key {
            Some(NameKey::Hash(token)) => {
                if !local_tokens.contains(&token) {
                    missed.push(MissedPack {
                        pack: entry.pack,
                        token: Some(token),
                    });
                }
            }
            // No dedup key (archive volume or unrecognized name): report by
            // pack number so the pack can still be re-requested.
            Some(NameKey::Archive) | None => missed.push(MissedPack {
                pack: entry.pack,
                token: None,
            }),
        }
    }

    Reconciliation {
        latest: top.max(watermark),
        pending,
        missed,
    }
}
