// Program analysis
// Lower bound on match length and the set of characters a match can start
// with, computed from instructions so deserialized programs can be studied.

use crate::program::{Inst, Item, Program};
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

/// Characters that can begin a non-empty match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FirstSet {
    /// Bit `n` set when ASCII code point `n` may start a match.
    pub ascii: u128,
    /// Whether any non-ASCII character may start a match.
    pub non_ascii: bool,
}

impl FirstSet {
    #[inline]
    pub fn contains(&self, c: char) -> bool {
        let cp = c as u32;
        if cp < 128 {
            (self.ascii >> cp) & 1 == 1
        } else {
            self.non_ascii
        }
    }

    fn add_item(&mut self, prog: &Program, item: Item) -> bool {
        match item {
            Item::Char(c) => self.add_char(c),
            Item::Set(s) => match prog.sets.get(s as usize) {
                Some(set) => {
                    self.ascii |= set.ascii_bits();
                    self.non_ascii |= set.has_non_ascii();
                }
                None => return false,
            },
            Item::Any | Item::AnyNl => return false,
        }
        true
    }

    fn add_char(&mut self, c: char) {
        let cp = c as u32;
        if cp < 128 {
            self.ascii |= 1u128 << cp;
        } else {
            self.non_ascii = true;
        }
    }
}

/// Result of `study`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StudyInfo {
    /// No match is shorter than this many characters.
    pub min_length: usize,
    /// Set when every match must start with a character from a known set.
    pub first_set: Option<FirstSet>,
}

impl fmt::Display for StudyInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "min length {}", self.min_length)?;
        match &self.first_set {
            Some(first) => {
                write!(f, ", first chars [")?;
                for cp in 0u8..128 {
                    if (first.ascii >> cp) & 1 == 1 {
                        write!(f, "{}", (cp as char).escape_default())?;
                    }
                }
                if first.non_ascii {
                    write!(f, "<non-ascii>")?;
                }
                write!(f, "]")
            }
            None => write!(f, ", no first-char set"),
        }
    }
}

/// Analyse `prog`. Using the result never changes what matches.
pub fn study(prog: &Program) -> StudyInfo {
    let min_length = min_length(prog);
    let first_set = if min_length == 0 { None } else { first_set(prog) };
    log::debug!(
        "studied {:?}: min length {}, first set {}",
        prog.source(),
        min_length,
        if first_set.is_some() { "known" } else { "unknown" }
    );
    StudyInfo {
        min_length,
        first_set,
    }
}

fn successors(inst: &Inst, pc: usize, mut visit: impl FnMut(usize, u64)) {
    match *inst {
        Inst::Match | Inst::LookEnd => {}
        Inst::Char(_) | Inst::Set(_) | Inst::Any | Inst::AnyNl => visit(pc + 1, 1),
        Inst::Repeat { min, .. } => visit(pc + 1, min as u64),
        Inst::Split { primary, secondary } => {
            visit(primary as usize, 0);
            visit(secondary as usize, 0);
        }
        Inst::Jmp(target) => visit(target as usize, 0),
        Inst::JmpUnset { target, .. } => {
            visit(pc + 1, 0);
            visit(target as usize, 0);
        }
        Inst::LoopCheck { exit, .. } => {
            visit(pc + 1, 0);
            visit(exit as usize, 0);
        }
        // Lookaround bodies consume nothing from the match itself
        Inst::LookStart { next, .. } => visit(next as usize, 0),
        Inst::Assert(_)
        | Inst::Open(_)
        | Inst::Close(_)
        | Inst::Mark(_)
        | Inst::Backref { .. }
        | Inst::AtomicStart
        | Inst::AtomicEnd => visit(pc + 1, 0),
    }
}

/// Shortest path, in consumed characters, from the entry to any `Match`.
fn min_length(prog: &Program) -> usize {
    let insts = prog.instructions();
    let mut dist = vec![u64::MAX; insts.len()];
    let mut heap = BinaryHeap::new();
    if insts.is_empty() {
        return 0;
    }
    dist[0] = 0;
    heap.push(Reverse((0u64, 0usize)));
    while let Some(Reverse((d, pc))) = heap.pop() {
        if d > dist[pc] {
            continue;
        }
        if matches!(insts[pc], Inst::Match) {
            return usize::try_from(d).unwrap_or(usize::MAX);
        }
        successors(&insts[pc], pc, |next, cost| {
            let nd = d.saturating_add(cost);
            if next < dist.len() && nd < dist[next] {
                dist[next] = nd;
                heap.push(Reverse((nd, next)));
            }
        });
    }
    0
}

/// Union of everything the first consuming instruction on any path can
/// accept, or `None` when some path can start with anything.
fn first_set(prog: &Program) -> Option<FirstSet> {
    let insts = prog.instructions();
    let mut first = FirstSet::default();
    let mut seen = vec![false; insts.len()];
    let mut stack = vec![0usize];
    while let Some(pc) = stack.pop() {
        let Some(inst) = insts.get(pc) else {
            return None;
        };
        if std::mem::replace(&mut seen[pc], true) {
            continue;
        }
        match *inst {
            Inst::Match | Inst::LookEnd | Inst::Backref { .. } | Inst::Any | Inst::AnyNl => return None,
            Inst::Char(c) => first.add_char(c),
            Inst::Set(s) => {
                if !first.add_item(prog, Item::Set(s)) {
                    return None;
                }
            }
            Inst::Repeat { item, min, .. } => {
                if !first.add_item(prog, item) {
                    return None;
                }
                if min == 0 {
                    stack.push(pc + 1);
                }
            }
            _ => successors(inst, pc, |next, _| stack.push(next)),
        }
    }
    Some(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CompileFlags;

    fn studied(pattern: &str) -> StudyInfo {
        study(&Program::compile(pattern, CompileFlags::empty()).unwrap())
    }

    #[test]
    fn test_min_length() {
        assert_eq!(studied("abc").min_length, 3);
        assert_eq!(studied("a{2,5}b").min_length, 3);
        assert_eq!(studied("ab|c").min_length, 1);
        assert_eq!(studied("a*").min_length, 0);
        assert_eq!(studied("(?=abc)a").min_length, 1);
        assert_eq!(studied(r"(a)\1").min_length, 1);
        assert_eq!(studied("(?:ab)+").min_length, 2);
    }

    #[test]
    fn test_first_set() {
        let info = studied("cat|dog");
        let first = info.first_set.unwrap();
        assert!(first.contains('c') && first.contains('d'));
        assert!(!first.contains('a') && !first.contains('é'));

        let first = studied("x?[0-9é]").first_set.unwrap();
        assert!(first.contains('x') && first.contains('5') && first.contains('é'));

        assert!(studied(".a").first_set.is_none());
        assert!(studied("a?").first_set.is_none());
        assert!(studied("(?=a)").first_set.is_none());
    }

    #[test]
    fn test_first_set_caseless() {
        let first = studied("(?i)k").first_set.unwrap();
        assert!(first.contains('k') && first.contains('K'));
        assert!(first.contains('\u{212A}'));
    }
}
