//! Region identifier parsing.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// File name prefix for per-region consensus output.
pub const OUTPUT_PREFIX: &str = "polished.";

/// File name suffix for per-region consensus output.
pub const OUTPUT_SUFFIX: &str = ".fa";

/// Errors produced while parsing a region identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegionError {
    #[error("region identifier is empty")]
    Empty,

    #[error("region '{0}' is not of the form contig:start-end")]
    Malformed(String),

    #[error("region {0:?} contains a path separator")]
    PathSeparator(String),

    #[error("region '{id}' has a coordinate that does not fit in 64 bits")]
    Overflow { id: String },

    #[error("region '{id}' ends before it starts ({start} > {end})")]
    Inverted { id: String, start: u64, end: u64 },
}

/// A contiguous coordinate range of one contig.
///
/// The identifier is kept verbatim: it names the job, the output file and
/// the placeholder header, so it must round-trip exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Region {
    id: String,
    contig: String,
    start: u64,
    end: u64,
}

fn region_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // Contig names may themselves contain ':' so anchor on the last one.
    PATTERN.get_or_init(|| Regex::new(r"^(.+):([0-9]+)-([0-9]+)$").expect("valid region regex"))
}

impl Region {
    /// Parse a `contig:start-end` identifier.
    pub fn parse(id: &str) -> Result<Self, RegionError> {
        if id.is_empty() {
            return Err(RegionError::Empty);
        }
        if id.trim() != id {
            return Err(RegionError::Malformed(id.to_string()));
        }
        // The identifier becomes part of a file name in the workspace.
        if id.contains(&['/', '\\', '\0'][..]) {
            return Err(RegionError::PathSeparator(id.to_string()));
        }

        let caps = region_pattern()
            .captures(id)
            .ok_or_else(|| RegionError::Malformed(id.to_string()))?;

        let parse_coord = |s: &str| {
            s.parse::<u64>()
                .map_err(|_| RegionError::Overflow { id: id.to_string() })
        };
        let start = parse_coord(&caps[2])?;
        let end = parse_coord(&caps[3])?;

        if end < start {
            return Err(RegionError::Inverted {
                id: id.to_string(),
                start,
                end,
            });
        }

        Ok(Self {
            id: id.to_string(),
            contig: caps[1].to_string(),
            start,
            end,
        })
    }

    /// The verbatim identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn contig(&self) -> &str {
        &self.contig
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bases covered (`end - start`).
    pub fn span(&self) -> u64 {
        self.end - self.start
    }

    /// Name of the consensus output file for this region, relative to the
    /// run workspace.
    pub fn output_file_name(&self) -> String {
        format!("{}{}{}", OUTPUT_PREFIX, self.id, OUTPUT_SUFFIX)
    }

    /// Recover the region identifier from an output file name, if the name
    /// has the `polished.<region>.fa` shape.
    pub fn id_from_output_file_name(name: &str) -> Option<&str> {
        name.strip_prefix(OUTPUT_PREFIX)?.strip_suffix(OUTPUT_SUFFIX)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

impl FromStr for Region {
    type Err = RegionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::parse(s)
    }
}

impl TryFrom<String> for Region {
    type Error = RegionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Region::parse(&value)
    }
}

impl From<Region> for String {
    fn from(region: Region) -> Self {
        region.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let region = Region::parse("contig5:1000-5000").unwrap();
        assert_eq!(region.contig(), "contig5");
        assert_eq!(region.start(), 1000);
        assert_eq!(region.end(), 5000);
        assert_eq!(region.span(), 4000);
        assert_eq!(region.id(), "contig5:1000-5000");
    }

    #[test]
    fn test_span_matches_example() {
        let region = Region::parse("contig1:100-150").unwrap();
        assert_eq!(region.span(), 50);
    }

    #[test]
    fn test_contig_with_colon() {
        let region = Region::parse("chr1:alt:10-20").unwrap();
        assert_eq!(region.contig(), "chr1:alt");
        assert_eq!(region.start(), 10);
        assert_eq!(region.span(), 10);
    }

    #[test]
    fn test_contig_with_dash() {
        let region = Region::parse("tig-00001:0-250").unwrap();
        assert_eq!(region.contig(), "tig-00001");
        assert_eq!(region.end(), 250);
    }

    #[test]
    fn test_empty_span_allowed() {
        let region = Region::parse("c:7-7").unwrap();
        assert_eq!(region.span(), 0);
    }

    #[test]
    fn test_rejects_malformed() {
        assert_eq!(Region::parse(""), Err(RegionError::Empty));
        assert!(matches!(Region::parse("contig1"), Err(RegionError::Malformed(_))));
        assert!(matches!(Region::parse("contig1:10"), Err(RegionError::Malformed(_))));
        assert!(matches!(Region::parse(":10-20"), Err(RegionError::Malformed(_))));
        assert!(matches!(Region::parse("c:10-20 "), Err(RegionError::Malformed(_))));
        assert!(matches!(Region::parse(" c:10-20"), Err(RegionError::Malformed(_))));
        assert!(matches!(Region::parse("c:-5-20"), Err(RegionError::Malformed(_))));
    }

    #[test]
    fn test_rejects_path_separators() {
        assert!(matches!(Region::parse("scaffold/1:0-10"), Err(RegionError::PathSeparator(_))));
        assert!(matches!(Region::parse("../c:0-10"), Err(RegionError::PathSeparator(_))));
        assert!(matches!(Region::parse("c\\1:0-10"), Err(RegionError::PathSeparator(_))));
        assert!(Region::parse("scaffold|1:0-10").is_ok());
    }

    #[test]
    fn test_rejects_inverted() {
        let err = Region::parse("c:200-100").unwrap_err();
        assert!(matches!(err, RegionError::Inverted { start: 200, end: 100, .. }));
    }

    #[test]
    fn test_rejects_overflow() {
        let err = Region::parse("c:0-99999999999999999999999").unwrap_err();
        assert!(matches!(err, RegionError::Overflow { .. }));
    }

    #[test]
    fn test_output_file_name() {
        let region = Region::parse("c1:0-100").unwrap();
        assert_eq!(region.output_file_name(), "polished.c1:0-100.fa");
        assert_eq!(
            Region::id_from_output_file_name("polished.c1:0-100.fa"),
            Some("c1:0-100")
        );
        assert_eq!(Region::id_from_output_file_name("reads.sorted.bam"), None);
    }

    #[test]
    fn test_serde_as_string() {
        let region = Region::parse("c1:0-100").unwrap();
        let json = serde_json::to_string(&region).unwrap();
        assert_eq!(json, "\"c1:0-100\"");

        let parsed: Region = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, region);
        assert!(serde_json::from_str::<Region>("\"nope\"").is_err());
    }
}
