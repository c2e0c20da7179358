// Compiled program representation
pub mod charset;
pub mod inst;
pub mod serializer;

use crate::error::FormatError;
use crate::flags::CompileFlags;
use crate::regex_limits::{MAX_GROUPS, MAX_LOOKBEHIND, MAX_NAME_LEN, MAX_PROGRAM_LEN};
use ahash::RandomState;
use smol_str::SmolStr;
use std::collections::HashMap;

pub use charset::CharSet;
pub use inst::{Inst, Item, Look, RepeatMode, UNBOUNDED};

/// Register value of a slot that has not been set.
pub(crate) const NONE: usize = usize::MAX;

/// Group names in first-definition order.
///
/// One name maps to several groups only when the pattern was compiled with
/// `DUPNAMES`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTable {
    entries: Vec<(SmolStr, u32)>,
    index: HashMap<SmolStr, Vec<u32>, RandomState>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, name: SmolStr, group: u32) {
        self.index.entry(name.clone()).or_default().push(group);
        self.entries.push((name, group));
    }

    /// All groups carrying `name`, lowest index first.
    pub fn indices(&self, name: &str) -> &[u32] {
        self.index.get(name).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn first(&self, name: &str) -> Option<u32> {
        self.indices(name).first().copied()
    }

    /// Name of group `group`, if it has one.
    pub fn name_of(&self, group: u32) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, g)| *g == group)
            .map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.entries.iter().map(|(n, g)| (n.as_str(), *g))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An immutable compiled pattern.
///
/// Register file layout used by the matcher:
/// `[0, 2*(G+1))` committed capture spans, then `G+1` open-group slots,
/// then the loop registers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub(crate) source: String,
    pub(crate) insts: Vec<Inst>,
    pub(crate) sets: Vec<CharSet>,
    pub(crate) group_count: u32,
    pub(crate) names: NameTable,
    pub(crate) requested_flags: CompileFlags,
    pub(crate) effective_flags: CompileFlags,
    pub(crate) loop_regs: u32,
}

impl Program {
    /// Compile `source` with `flags`.
    pub fn compile(source: &str, flags: CompileFlags) -> Result<Program, crate::CompileError> {
        crate::compiler::compile(source, flags)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn instructions(&self) -> &[Inst] {
        &self.insts
    }

    pub fn sets(&self) -> &[CharSet] {
        &self.sets
    }

    /// Number of capturing groups, not counting the whole match.
    pub fn group_count(&self) -> u32 {
        self.group_count
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// Flags passed to `compile`.
    pub fn requested_flags(&self) -> CompileFlags {
        self.requested_flags
    }

    /// Flags in force at the start of matching, including leading inline
    /// modifiers and implicit anchoring.
    pub fn flags(&self) -> CompileFlags {
        self.effective_flags
    }

    pub fn loop_regs(&self) -> u32 {
        self.loop_regs
    }

    pub(crate) fn capture_slots(&self) -> usize {
        2 * (self.group_count as usize + 1)
    }

    pub(crate) fn open_base(&self) -> usize {
        self.capture_slots()
    }

    pub(crate) fn loop_base(&self) -> usize {
        self.open_base() + self.group_count as usize + 1
    }

    pub(crate) fn register_count(&self) -> usize {
        self.loop_base() + self.loop_regs as usize
    }

    /// Structural check run on every deserialized program.
    pub(crate) fn validate(&self) -> Result<(), FormatError> {
        let len = self.insts.len();
        if len == 0 || len > MAX_PROGRAM_LEN {
            return Err(FormatError::Invalid("instruction count out of range"));
        }
        if !self.insts[len - 1].is_terminal() {
            return Err(FormatError::Invalid("program does not end in a terminal instruction"));
        }
        if self.group_count > MAX_GROUPS {
            return Err(FormatError::Invalid("too many groups"));
        }
        let groups = self.group_count;
        let target = |t: u32| -> Result<(), FormatError> {
            if (t as usize) < len {
                Ok(())
            } else {
                Err(FormatError::Invalid("jump target out of range"))
            }
        };
        let group = |g: u32| -> Result<(), FormatError> {
            if g >= 1 && g <= groups {
                Ok(())
            } else {
                Err(FormatError::Invalid("group index out of range"))
            }
        };
        let set = |s: u32| -> Result<(), FormatError> {
            if (s as usize) < self.sets.len() {
                Ok(())
            } else {
                Err(FormatError::Invalid("character set index out of range"))
            }
        };
        let reg = |r: u32| -> Result<(), FormatError> {
            if r < self.loop_regs {
                Ok(())
            } else {
                Err(FormatError::Invalid("loop register out of range"))
            }
        };

        for inst in &self.insts {
            match *inst {
                Inst::Set(s) => set(s)?,
                Inst::Repeat { item, min, max, .. } => {
                    if let Item::Set(s) = item {
                        set(s)?;
                    }
                    if min > max {
                        return Err(FormatError::Invalid("repeat bounds out of order"));
                    }
                }
                Inst::Open(g) | Inst::Close(g) => group(g)?,
                Inst::Backref { group: g, .. } => group(g)?,
                Inst::Split { primary, secondary } => {
                    target(primary)?;
                    target(secondary)?;
                }
                Inst::Jmp(t) => target(t)?,
                Inst::JmpUnset { group: g, target: t } => {
                    group(g)?;
                    target(t)?;
                }
                Inst::Mark(r) => reg(r)?,
                Inst::LoopCheck { reg: r, exit } => {
                    reg(r)?;
                    target(exit)?;
                }
                Inst::LookStart { behind, next, .. } => {
                    target(next)?;
                    if behind.is_some_and(|n| n > MAX_LOOKBEHIND) {
                        return Err(FormatError::Invalid("lookbehind too long"));
                    }
                }
                Inst::Match
                | Inst::Char(_)
                | Inst::Any
                | Inst::AnyNl
                | Inst::Assert(_)
                | Inst::AtomicStart
                | Inst::AtomicEnd
                | Inst::LookEnd => {}
            }
        }

        for (name, g) in self.names.iter() {
            if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
                return Err(FormatError::Invalid("bad group name"));
            }
            group(g)?;
        }
        Ok(())
    }
}
