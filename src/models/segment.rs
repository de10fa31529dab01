use serde::{Deserialize, Serialize};
use std::fmt;

/// Market segment of a snapshot file
///
/// Each archived snapshot belongs to exactly one listing compartment,
/// recognizable from a tag embedded in its filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Segment {
    /// Euronext compartment A (large caps)
    CompA,
    /// Euronext compartment B (mid caps)
    CompB,
    /// Amsterdam listings
    Amsterdam,
    /// PEA-PME eligible listings
    Peapme,
}

impl Segment {
    /// Filename tag identifying this segment
    pub fn tag(&self) -> &'static str {
        match self {
            Segment::CompA => "compA",
            Segment::CompB => "compB",
            Segment::Amsterdam => "amsterdam",
            Segment::Peapme => "peapme",
        }
    }

    /// Stable market identifier stored on company rows
    pub fn mid(&self) -> i64 {
        match self {
            Segment::Amsterdam => 6,
            Segment::CompA => 7,
            Segment::CompB => 8,
            Segment::Peapme => 11,
        }
    }

    /// Whether listings in this segment are PEA (tax-advantaged) eligible
    pub fn is_pea(&self) -> bool {
        matches!(self, Segment::Peapme)
    }

    /// Classify a filename into a segment by tag substring
    ///
    /// First matching tag wins. Returns `None` for filenames carrying no
    /// known tag; callers are expected to count those rather than drop
    /// them silently.
    pub fn classify(filename: &str) -> Option<Segment> {
        Segment::all()
            .into_iter()
            .find(|segment| filename.contains(segment.tag()))
    }

    /// All segments, in classification order
    pub fn all() -> Vec<Segment> {
        vec![
            Segment::CompA,
            Segment::CompB,
            Segment::Amsterdam,
            Segment::Peapme,
        ]
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_tag() {
        assert_eq!(
            Segment::classify("compA 2019-01-02 09:02:02.csv"),
            Some(Segment::CompA)
        );
        assert_eq!(
            Segment::classify("compB 2020-05-11 17:30:00.csv"),
            Some(Segment::CompB)
        );
        assert_eq!(
            Segment::classify("amsterdam 2021-03-01 10:00:00.csv"),
            Some(Segment::Amsterdam)
        );
        assert_eq!(
            Segment::classify("peapme 2021-03-01 10:00:00.csv"),
            Some(Segment::Peapme)
        );
    }

    #[test]
    fn test_classify_unknown_tag() {
        assert_eq!(Segment::classify("nasdaq 2021-03-01 10:00:00.csv"), None);
        assert_eq!(Segment::classify("README.md"), None);
    }

    #[test]
    fn test_classify_first_match_wins() {
        // A pathological name carrying two tags resolves to the first in order
        assert_eq!(
            Segment::classify("compA-compB 2019-01-02.csv"),
            Some(Segment::CompA)
        );
    }

    #[test]
    fn test_pea_flag() {
        assert!(Segment::Peapme.is_pea());
        assert!(!Segment::CompA.is_pea());
        assert!(!Segment::CompB.is_pea());
        assert!(!Segment::Amsterdam.is_pea());
    }

    #[test]
    fn test_mids_are_distinct() {
        let mut mids: Vec<i64> = Segment::all().iter().map(|s| s.mid()).collect();
        mids.sort_unstable();
        mids.dedup();
        assert_eq!(mids.len(), Segment::all().len());
    }
}
