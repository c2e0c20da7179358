// Character sets
// Sorted, disjoint code point ranges plus a bitmap for the ASCII fast path.

use regex_syntax::hir::ClassUnicode;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CharSet {
    ranges: Box<[(char, char)]>,
    ascii: u128,
}

impl CharSet {
    pub fn from_class(cls: &ClassUnicode) -> Self {
        Self::build(cls.ranges().iter().map(|r| (r.start(), r.end())).collect())
    }

    /// Build from ranges read back from a serialized program.
    /// Returns `None` unless the ranges are sorted, disjoint and well-formed.
    pub fn from_ranges(ranges: Vec<(char, char)>) -> Option<Self> {
        let ordered = ranges.iter().all(|&(lo, hi)| lo <= hi)
            && ranges.windows(2).all(|w| w[0].1 < w[1].0);
        ordered.then(|| Self::build(ranges))
    }

    fn build(ranges: Vec<(char, char)>) -> Self {
        let mut ascii = 0u128;
        for &(lo, hi) in &ranges {
            let lo = lo as u32;
            if lo >= 128 {
                break;
            }
            let hi = (hi as u32).min(127);
            for c in lo..=hi {
                ascii |= 1u128 << c;
            }
        }
        Self {
            ranges: ranges.into_boxed_slice(),
            ascii,
        }
    }

    #[inline]
    pub fn contains(&self, c: char) -> bool {
        let cp = c as u32;
        if cp < 128 {
            return (self.ascii >> cp) & 1 == 1;
        }
        self.ranges
            .binary_search_by(|&(lo, hi)| {
                if hi < c {
                    std::cmp::Ordering::Less
                } else if lo > c {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn ranges(&self) -> &[(char, char)] {
        &self.ranges
    }

    /// Bit `n` is set when ASCII code point `n` is in the set.
    pub fn ascii_bits(&self) -> u128 {
        self.ascii
    }

    pub fn has_non_ascii(&self) -> bool {
        self.ranges.last().is_some_and(|&(_, hi)| hi as u32 >= 128)
    }
}

impl fmt::Display for CharSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for &(lo, hi) in self.ranges.iter() {
            if lo == hi {
                write!(f, "{}", lo.escape_debug())?;
            } else {
                write!(f, "{}-{}", lo.escape_debug(), hi.escape_debug())?;
            }
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains() {
        let set = CharSet::from_ranges(vec![('0', '9'), ('a', 'f'), ('λ', 'μ')]).unwrap();
        assert!(set.contains('5'));
        assert!(set.contains('e'));
        assert!(!set.contains('g'));
        assert!(set.contains('μ'));
        assert!(!set.contains('ν'));
        assert!(set.has_non_ascii());
    }

    #[test]
    fn test_rejects_unordered_ranges() {
        assert!(CharSet::from_ranges(vec![('b', 'a')]).is_none());
        assert!(CharSet::from_ranges(vec![('a', 'f'), ('c', 'z')]).is_none());
        assert!(CharSet::from_ranges(Vec::new()).is_some());
    }

    #[test]
    fn test_display() {
        let set = CharSet::from_ranges(vec![('\n', '\n'), ('a', 'c')]).unwrap();
        assert_eq!(set.to_string(), "[\\na-c]");
    }
}
