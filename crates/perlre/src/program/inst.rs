// Instruction set of the backtracking machine
//
// Jump targets are absolute instruction indices, character sets are indices
// into the program's set table and registers are slot numbers, so a program
// holds no pointers and serializes as plain integers.

/// Zero-width assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Look {
    /// `^`
    StartLine { multiline: bool },
    /// `$`
    EndLine { multiline: bool, dollar_endonly: bool },
    /// `\A`
    StartText,
    /// `\z`
    EndText,
    /// `\Z`
    EndTextOptNl,
    /// `\G`
    StartOffset,
    /// `\b`
    WordBoundary { ucp: bool },
    /// `\B`
    NotWordBoundary { ucp: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepeatMode {
    Greedy,
    Lazy,
    Possessive,
}

/// Single-character item of a `Repeat` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Item {
    Char(char),
    Set(u32),
    /// Any character, newline included.
    Any,
    /// Any character except `\n`.
    AnyNl,
}

/// `Repeat::max` value meaning "no upper bound".
pub const UNBOUNDED: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Inst {
    /// Whole pattern matched.
    Match,
    Char(char),
    Set(u32),
    Any,
    AnyNl,
    /// `item{min,max}` on a single-character item, run without a loop.
    Repeat {
        item: Item,
        min: u32,
        max: u32,
        mode: RepeatMode,
    },
    Assert(Look),
    /// Remember the current position as the start of group `n`.
    Open(u32),
    /// Commit group `n` as (start remembered by `Open`, current position).
    Close(u32),
    /// Continue at `primary`; on failure resume at `secondary`.
    Split { primary: u32, secondary: u32 },
    Jmp(u32),
    /// Store the current position in loop register `n`.
    Mark(u32),
    /// Leave the loop at `exit` when the iteration started by the matching
    /// `Mark` consumed nothing.
    LoopCheck { reg: u32, exit: u32 },
    Backref { group: u32, caseless: bool },
    /// Continue at `target` when group `group` has not been set.
    JmpUnset { group: u32, target: u32 },
    AtomicStart,
    /// Discard every backtrack point created since the matching `AtomicStart`.
    AtomicEnd,
    /// Start of a lookaround body. `behind` is the fixed length of a
    /// lookbehind; `next` is the instruction after the matching `LookEnd`.
    LookStart {
        behind: Option<u32>,
        negate: bool,
        next: u32,
    },
    LookEnd,
}

impl Inst {
    /// Instructions after which control never falls through.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Inst::Match | Inst::Jmp(_))
    }
}
