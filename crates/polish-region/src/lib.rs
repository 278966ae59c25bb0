//! Region identifiers and placeholder records for split assembly polishing.
//!
//! A region is a `contig:start-end` range produced by the partitioning
//! tool. Every other component keys its files and jobs on the verbatim
//! identifier, and merge order is derived from the parsed coordinates.

mod fasta;
mod order;
mod region;

pub use fasta::{placeholder_record, validate_filler_symbol, write_placeholder, FillerError};
pub use order::{contig_ranks, sort_by_coordinate, ContigRanks};
pub use region::{Region, RegionError, OUTPUT_PREFIX, OUTPUT_SUFFIX};
