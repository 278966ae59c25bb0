//! Coordinate ordering of regions.
//!
//! Merge order must follow the assembly, not file name order: lexically
//! `c1:100-200` sorts before `c1:90-100`. Contigs are ranked by their first
//! appearance in the planner output, regions within a contig by start.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::region::Region;

/// Contig name -> rank in planner order.
pub type ContigRanks = HashMap<String, usize>;

/// Rank contigs by first appearance in `regions`.
pub fn contig_ranks<'a, I>(regions: I) -> ContigRanks
where
    I: IntoIterator<Item = &'a Region>,
{
    let mut ranks = ContigRanks::new();
    for region in regions {
        let next = ranks.len();
        ranks.entry(region.contig().to_string()).or_insert(next);
    }
    ranks
}

fn compare(a: &Region, b: &Region, ranks: &ContigRanks) -> Ordering {
    // Unranked contigs go last, by name.
    let rank = |r: &Region| ranks.get(r.contig()).copied().unwrap_or(usize::MAX);
    rank(a)
        .cmp(&rank(b))
        .then_with(|| a.contig().cmp(b.contig()))
        .then_with(|| a.start().cmp(&b.start()))
        .then_with(|| a.end().cmp(&b.end()))
}

/// Sort items carrying a region into coordinate order.
pub fn sort_by_coordinate<T, F>(items: &mut [T], ranks: &ContigRanks, region_of: F)
where
    F: Fn(&T) -> &Region,
{
    items.sort_by(|a, b| compare(region_of(a), region_of(b), ranks));
}
