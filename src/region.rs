//! `name[:start[-end]]` region strings.

use crate::binning::MAX_COORDINATE;
use crate::error::{Result, TabixError};
use crate::index::TabixIndex;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// A named query range, 0-based half-open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub begin: i64,
    pub end: i64,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.begin == 0 && self.end >= MAX_COORDINATE {
            write!(f, "{}", self.name)
        } else if self.end >= MAX_COORDINATE {
            write!(f, "{}:{}", self.name, self.begin + 1)
        } else {
            write!(f, "{}:{}-{}", self.name, self.begin + 1, self.end)
        }
    }
}

static RANGE_SUFFIX: OnceLock<Regex> = OnceLock::new();

fn range_suffix() -> &'static Regex {
    RANGE_SUFFIX.get_or_init(|| {
        Regex::new(r"^(.+):([0-9,]+)(?:-([0-9,]*))?$").expect("region pattern compiles")
    })
}

fn parse_position(text: &str, region: &str) -> Result<i64> {
    let digits: String = text.chars().filter(|&c| c != ',').collect();
    digits
        .parse::<i64>()
        .map_err(|_| TabixError::InvalidRegion(region.to_string()))
}

impl Region {
    /// Whole sequence `name`.
    pub fn whole(name: impl Into<String>) -> Self {
        Region {
            name: name.into(),
            begin: 0,
            end: MAX_COORDINATE,
        }
    }

    /// Parse `name`, `name:start` or `name:start-end`.
    ///
    /// `start` and `end` are 1-based inclusive and may contain thousands
    /// separators. A missing end runs to the end of the sequence.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(TabixError::InvalidRegion(s.to_string()));
        }
        let Some(caps) = range_suffix().captures(s) else {
            return Ok(Region::whole(s));
        };

        let name = caps[1].to_string();
        let start = parse_position(&caps[2], s)?;
        let end = match caps.get(3).map(|m| m.as_str()) {
            Some(text) if !text.is_empty() => parse_position(text, s)?,
            _ => MAX_COORDINATE,
        };
        let begin = (start - 1).max(0);
        if end <= begin {
            return Err(TabixError::InvalidRegion(s.to_string()));
        }
        Ok(Region { name, begin, end })
    }

    /// Parse `s` against an index, preferring an exact sequence name match so
    /// names containing `:` still work.
    pub fn parse_for(s: &str, index: &TabixIndex) -> Result<Self> {
        let trimmed = s.trim();
        if index.sequence_id(trimmed).is_some() {
            return Ok(Region::whole(trimmed));
        }
        Region::parse(trimmed)
    }

    /// Sequence id and range, or `None` if the sequence is not indexed.
    pub fn resolve(&self, index: &TabixIndex) -> Option<(u32, i64, i64)> {
        index
            .sequence_id(&self.name)
            .map(|id| (id, self.begin, self.end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TabixConfig;

    #[test]
    fn test_parse_forms() {
        assert_eq!(Region::parse("chr1").unwrap(), Region::whole("chr1"));
        assert_eq!(
            Region::parse("chr1:150-550").unwrap(),
            Region { name: "chr1".into(), begin: 149, end: 550 }
        );
        assert_eq!(
            Region::parse("chr2:1,000").unwrap(),
            Region { name: "chr2".into(), begin: 999, end: MAX_COORDINATE }
        );
        assert_eq!(Region::parse("chr2:10-").unwrap().end, MAX_COORDINATE);
        assert_eq!(Region::parse("chrX:0-5").unwrap().begin, 0);
    }

    #[test]
    fn test_parse_rejects_bad_ranges() {
        assert!(matches!(Region::parse(""), Err(TabixError::InvalidRegion(_))));
        assert!(matches!(Region::parse("chr1:500-100"), Err(TabixError::InvalidRegion(_))));
    }

    #[test]
    fn test_name_with_colon() {
        let mut index = TabixIndex::new(TabixConfig::bed());
        index.get_or_create_sequence_id("HLA-A*01:01");
        let region = Region::parse_for("HLA-A*01:01", &index).unwrap();
        assert_eq!(region, Region::whole("HLA-A*01:01"));
        assert_eq!(region.resolve(&index), Some((0, 0, MAX_COORDINATE)));
        assert!(Region::parse("chr3:1-10").unwrap().resolve(&index).is_none());
    }

    #[test]
    fn test_huge_start_is_accepted() {
        let region = Region::parse("chr1:70368744161282-70368744161290").unwrap();
        assert_eq!(region.begin, 70_368_744_161_281);
        assert!(matches!(
            Region::parse("chr1:99999999999999999999-1"),
            Err(TabixError::InvalidRegion(_))
        ));
    }

    #[test]
    fn test_display() {
        assert_eq!(Region::parse("chr1:150-550").unwrap().to_string(), "chr1:150-550");
        assert_eq!(Region::whole("chr1").to_string(), "chr1");
    }
}
