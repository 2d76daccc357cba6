//! Page-selection expression parsing and resolution.
//!
//! The grammar accepts `"1"` (the default, resolvable without opening the
//! document), `"all"`, or a comma-separated list of entries where each
//! entry is a single page number or a range `a-b`; `b` may be the literal
//! `end`, standing for the last page of the document.

use std::str::FromStr;

use crate::error::{Error, Result};

/// A parsed but not yet resolved page-range entry.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PageRange {
    /// A single page number.
    Single(u32),
    /// An inclusive range of page numbers.
    Span(u32, u32),
    /// A range from a page number to the last page.
    ToEnd(u32),
    /// Every page of the document.
    All,
}

impl PageRange {
    fn needs_page_count(&self) -> bool {
        matches!(self, PageRange::ToEnd(_) | PageRange::All)
    }
}

/// A validated page-selection expression.
///
/// Parsing checks the grammar eagerly; resolving against a page count
/// produces the concrete sorted, deduplicated page list. Whether the
/// selected pages actually exist in the document is checked later, at
/// extraction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSpec {
    ranges: Vec<PageRange>,
}

impl PageSpec {
    /// Parse a page-selection expression.
    pub fn parse(expr: &str) -> Result<Self> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidPageSpec(expr.to_string()));
        }

        if trimmed == "all" {
            return Ok(Self {
                ranges: vec![PageRange::All],
            });
        }

        let mut ranges = Vec::new();
        for entry in trimmed.split(',') {
            let entry = entry.trim();
            if let Some((start, end)) = entry.split_once('-') {
                let start = parse_page_number(start, expr)?;
                if end.trim() == "end" {
                    ranges.push(PageRange::ToEnd(start));
                } else {
                    let end = parse_page_number(end, expr)?;
                    ranges.push(PageRange::Span(start, end));
                }
            } else {
                ranges.push(PageRange::Single(parse_page_number(entry, expr)?));
            }
        }

        Ok(Self { ranges })
    }

    /// Whether resolution requires the document's page count.
    ///
    /// `"1"` and other fully numeric selections resolve without touching
    /// the document at all.
    pub fn needs_page_count(&self) -> bool {
        self.ranges.iter().any(PageRange::needs_page_count)
    }

    /// Resolve the expression into a sorted, deduplicated page list.
    ///
    /// `page_count` is only consulted for `all` and `a-end` entries; pass
    /// zero when [`Self::needs_page_count`] is false.
    pub fn resolve(&self, page_count: u32) -> Vec<u32> {
        let mut pages = Vec::new();
        for range in &self.ranges {
            match *range {
                PageRange::Single(p) => pages.push(p),
                PageRange::Span(a, b) => pages.extend(a..=b),
                PageRange::ToEnd(a) => pages.extend(a..=page_count),
                PageRange::All => pages.extend(1..=page_count),
            }
        }
        pages.sort_unstable();
        pages.dedup();
        pages
    }
}

impl Default for PageSpec {
    fn default() -> Self {
        Self {
            ranges: vec![PageRange::Single(1)],
        }
    }
}

impl FromStr for PageSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_page_number(s: &str, expr: &str) -> Result<u32> {
    let n: u32 = s
        .trim()
        .parse()
        .map_err(|_| Error::InvalidPageSpec(expr.to_string()))?;
    if n == 0 {
        return Err(Error::InvalidPageSpec(expr.to_string()));
    }
    Ok(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_page_default() {
        let spec = PageSpec::parse("1").unwrap();
        assert!(!spec.needs_page_count());
        assert_eq!(spec.resolve(0), vec![1]);
    }

    #[test]
    fn test_comma_list() {
        let spec = PageSpec::parse("1,3,4").unwrap();
        assert!(!spec.needs_page_count());
        assert_eq!(spec.resolve(0), vec![1, 3, 4]);
    }

    #[test]
    fn test_range_to_end() {
        let spec = PageSpec::parse("1,4-end").unwrap();
        assert!(spec.needs_page_count());
        assert_eq!(spec.resolve(5), vec![1, 4, 5]);
    }

    #[test]
    fn test_all() {
        let spec = PageSpec::parse("all").unwrap();
        assert!(spec.needs_page_count());
        assert_eq!(spec.resolve(5), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_plain_range() {
        let spec = PageSpec::parse("2-4").unwrap();
        assert!(!spec.needs_page_count());
        assert_eq!(spec.resolve(0), vec![2, 3, 4]);
    }

    #[test]
    fn test_overlapping_ranges_deduplicate() {
        let spec = PageSpec::parse("1-3,2-5,3").unwrap();
        assert_eq!(spec.resolve(0), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let spec = PageSpec::parse("4,1,3").unwrap();
        assert_eq!(spec.resolve(0), vec![1, 3, 4]);
    }

    #[test]
    fn test_invalid_entry() {
        let result = PageSpec::parse("2-a");
        assert!(matches!(result, Err(Error::InvalidPageSpec(_))));
    }

    #[test]
    fn test_garbage_entries() {
        assert!(matches!(
            PageSpec::parse("x"),
            Err(Error::InvalidPageSpec(_))
        ));
        assert!(matches!(
            PageSpec::parse(""),
            Err(Error::InvalidPageSpec(_))
        ));
        assert!(matches!(
            PageSpec::parse("1,,3"),
            Err(Error::InvalidPageSpec(_))
        ));
    }

    #[test]
    fn test_zero_page_rejected() {
        assert!(matches!(
            PageSpec::parse("0"),
            Err(Error::InvalidPageSpec(_))
        ));
        assert!(matches!(
            PageSpec::parse("0-3"),
            Err(Error::InvalidPageSpec(_))
        ));
    }

    #[test]
    fn test_whitespace_tolerated() {
        let spec = PageSpec::parse(" 1 , 3 - 4 ").unwrap();
        assert_eq!(spec.resolve(0), vec![1, 3, 4]);
    }
}
