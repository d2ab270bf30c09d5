//! Multi-source fusion and deterministic ordering.
//!
//! A case family may be assembled from a baseline specification plus later
//! updates. The first source establishes the entry set; later sources only
//! merge into it (by [`CaseBuilder::fuse_key`]) or append entries it lacks.

use std::collections::HashMap;

use crate::builder::CaseBuilder;

/// Merges `incoming` into `base`, returning how many entries were appended.
///
/// When several `base` entries share a key, the first one receives merges.
pub fn fuse<B: CaseBuilder>(base: &mut Vec<B::Entry>, incoming: Vec<B::Entry>) -> usize {
    let mut index: HashMap<B::FuseKey, usize> = HashMap::with_capacity(base.len());
    for (i, entry) in base.iter().enumerate() {
        index.entry(B::fuse_key(entry)).or_insert(i);
    }

    let mut appended = 0;
    for entry in incoming {
        let key = B::fuse_key(&entry);
        if let Some(&i) = index.get(&key) {
            B::merge(&mut base[i], &entry);
        } else {
            index.insert(key, base.len());
            base.push(entry);
            appended += 1;
        }
    }
    appended
}

/// Stable sort by [`CaseBuilder::sort_key`].
pub fn sort_entries<B: CaseBuilder>(entries: &mut [B::Entry]) {
    entries.sort_by_key(B::sort_key);
}

/// Combines per-source batches into the final entry list.
///
/// A single batch keeps its row order; several batches are sorted, fused in
/// source order and sorted again.
#[must_use]
pub fn assemble<B: CaseBuilder>(batches: Vec<Vec<B::Entry>>) -> Vec<B::Entry> {
    let mut batches = batches.into_iter();
    let Some(mut base) = batches.next() else {
        return Vec::new();
    };
    let rest: Vec<_> = batches.collect();
    if rest.is_empty() {
        return base;
    }

    sort_entries::<B>(&mut base);
    for batch in rest {
        let appended = fuse::<B>(&mut base, batch);
        log::debug!("fused {} batch: {appended} new entries", B::KIND);
    }
    sort_entries::<B>(&mut base);
    base
}
