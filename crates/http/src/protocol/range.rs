//! `Range` header parsing and resolution (RFC 7233, `bytes` unit only).

use crate::protocol::ParseError;

/// The range unit. Only `bytes` is recognized.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RangeUnit {
    Bytes,
}

/// One byte-range-spec: `first-last`, `first-` or `-suffix`.
///
/// `first: None` encodes a suffix range (`last` is then the suffix length).
/// At least one of the two ends is always present.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ByteRange {
    pub first: Option<u64>,
    pub last: Option<u64>,
}

impl ByteRange {
    /// Resolves this spec against an entity size into `(offset, length)`.
    ///
    /// Returns `None` when the spec selects nothing: a start past the end,
    /// an inverted range, or a zero suffix.
    fn resolve(&self, entity_size: u64) -> Option<(u64, u64)> {
        match (self.first, self.last) {
            (Some(first), Some(last)) => {
                if first >= entity_size || last < first {
                    return None;
                }
                let last = last.min(entity_size - 1);
                Some((first, last - first + 1))
            }
            (Some(first), None) => {
                if first >= entity_size {
                    return None;
                }
                Some((first, entity_size - first))
            }
            (None, Some(suffix)) => {
                if suffix == 0 || entity_size == 0 {
                    return None;
                }
                let length = suffix.min(entity_size);
                Some((entity_size - length, length))
            }
            (None, None) => None,
        }
    }
}

/// A parsed `Range` header: the unit plus one or more byte-range-specs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ranges {
    unit: RangeUnit,
    ranges: Vec<ByteRange>,
}

impl Ranges {
    /// Parses a `Range` header value such as `bytes=0-499, 500-, -200`.
    pub fn parse(value: &str) -> Result<Self, ParseError> {
        let value = value.trim();
        let Some(specs) = value.strip_prefix("bytes=") else {
            let unit = value.split('=').next().unwrap_or(value);
            return Err(ParseError::invalid_header(format!("unsupported range unit '{unit}'")));
        };

        let mut ranges = Vec::new();
        for spec in specs.split(',') {
            let spec = spec.trim();
            let Some((first, last)) = spec.split_once('-') else {
                return Err(ParseError::invalid_header(format!("invalid range spec '{spec}'")));
            };

            let first = parse_end(first)?;
            let last = parse_end(last)?;
            if first.is_none() && last.is_none() {
                return Err(ParseError::invalid_header(format!("invalid range spec '{spec}'")));
            }
            ranges.push(ByteRange { first, last });
        }

        if ranges.is_empty() {
            return Err(ParseError::invalid_header("empty range set"));
        }

        Ok(Self { unit: RangeUnit::Bytes, ranges })
    }

    pub fn unit(&self) -> RangeUnit {
        self.unit
    }

    pub fn ranges(&self) -> &[ByteRange] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// True when at least one spec selects bytes of an entity of this size.
    pub fn is_satisfiable(&self, entity_size: u64) -> bool {
        self.ranges.iter().any(|r| r.resolve(entity_size).is_some())
    }

    /// Resolves all specs against an entity size and merges the result into
    /// disjoint `(offset, length)` spans, sorted by offset. Unsatisfiable
    /// specs are dropped; overlapping and adjacent spans are coalesced.
    pub fn simplify(&self, entity_size: u64) -> Vec<(u64, u64)> {
        let mut spans: Vec<(u64, u64)> = self.ranges.iter().filter_map(|r| r.resolve(entity_size)).collect();
        spans.sort_unstable_by_key(|&(offset, _)| offset);

        let mut merged: Vec<(u64, u64)> = Vec::with_capacity(spans.len());
        for (offset, length) in spans {
            match merged.last_mut() {
                Some((last_offset, last_length)) if offset <= *last_offset + *last_length => {
                    let end = (offset + length).max(*last_offset + *last_length);
                    *last_length = end - *last_offset;
                }
                _ => merged.push((offset, length)),
            }
        }
        merged
    }

    /// Total number of bytes selected after simplification.
    pub fn total_length(&self, entity_size: u64) -> u64 {
        self.simplify(entity_size).iter().map(|&(_, length)| length).sum()
    }
}

fn parse_end(s: &str) -> Result<Option<u64>, ParseError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(None);
    }
    s.parse::<u64>()
        .map(Some)
        .map_err(|_| ParseError::invalid_header(format!("invalid range bound '{s}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_closed_range() {
        let ranges = Ranges::parse("bytes=0-499").unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges.ranges()[0], ByteRange { first: Some(0), last: Some(499) });
        assert_eq!(ranges.simplify(1000), vec![(0, 500)]);
    }

    #[test]
    fn parse_open_and_suffix() {
        let ranges = Ranges::parse("bytes=500-, -200").unwrap();
        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges.simplify(1000), vec![(500, 500)]);
        assert_eq!(ranges.total_length(1000), 500);
    }

    #[test]
    fn merges_overlapping_spans() {
        let ranges = Ranges::parse("bytes=0-99, 50-149, 200-249").unwrap();
        assert_eq!(ranges.simplify(1000), vec![(0, 150), (200, 50)]);
        assert_eq!(ranges.total_length(1000), 200);
    }

    #[test]
    fn clamps_to_entity_size() {
        let ranges = Ranges::parse("bytes=0-9999").unwrap();
        assert_eq!(ranges.simplify(100), vec![(0, 100)]);
    }

    #[test]
    fn unsatisfiable_range() {
        let ranges = Ranges::parse("bytes=500-600").unwrap();
        assert!(!ranges.is_satisfiable(100));
        assert!(ranges.simplify(100).is_empty());
    }

    #[test]
    fn rejects_other_units() {
        assert!(Ranges::parse("lines=1-2").is_err());
    }

    #[test]
    fn rejects_empty_spec() {
        assert!(Ranges::parse("bytes=-").is_err());
        assert!(Ranges::parse("bytes=").is_err());
        assert!(Ranges::parse("bytes=abc-def").is_err());
    }

    #[test]
    fn suffix_longer_than_entity() {
        let ranges = Ranges::parse("bytes=-500").unwrap();
        assert_eq!(ranges.simplify(100), vec![(0, 100)]);
    }
}
