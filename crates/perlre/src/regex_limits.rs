//! Centralized engine limits and configuration constants.
//!
//! Mirrors the limits PCRE documents in `pcre_internal.h` / `config.h`.
//! All magic numbers that bound compilation and matching are collected
//! here for easy tuning.

// ===== Compiler =====

/// Largest value accepted in a `{m,n}` quantifier.
/// Matches PCRE's 16-bit repeat counter.
pub const MAX_REPEAT: u32 = 65535;

/// Maximum number of capturing groups in one pattern.
pub const MAX_GROUPS: u32 = 65535;

/// Maximum parenthesis nesting depth (prevents stack overflow in the parser).
/// Matches PCRE's default PARENS_NEST_LIMIT.
pub const MAX_NESTING: usize = 250;

/// Maximum length of a group name, in characters.
pub const MAX_NAME_LEN: usize = 32;

/// Maximum number of instructions in a compiled program.
/// Counted repeats of groups are expanded, so this bounds `(...){n}` blowup.
pub const MAX_PROGRAM_LEN: usize = 1 << 20;

/// Maximum fixed length of a lookbehind branch, in characters.
pub const MAX_LOOKBEHIND: u32 = 65535;

// ===== Matching =====

/// Default step budget for one exec call (instructions executed plus
/// backtracks). Matches PCRE's MATCH_LIMIT.
pub const DEFAULT_MATCH_LIMIT: u64 = 10_000_000;

/// Default maximum number of live backtrack frames.
pub const DEFAULT_DEPTH_LIMIT: usize = 1_000_000;

/// Default scratch memory budget in bytes (frames plus undo log).
pub const DEFAULT_HEAP_LIMIT: usize = 64 << 20;

/// Runtime budgets for one exec call.
///
/// Exhausting any of them aborts the call with
/// `ExecError::ResourceLimitExceeded`; the engine never truncates a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchLimits {
    /// Steps (instructions plus backtracks) before giving up.
    pub match_limit: u64,
    /// Live backtrack frames before giving up.
    pub depth_limit: usize,
    /// Bytes of frame and undo-log storage before giving up.
    pub heap_limit: usize,
}

impl Default for MatchLimits {
    fn default() -> Self {
        Self {
            match_limit: DEFAULT_MATCH_LIMIT,
            depth_limit: DEFAULT_DEPTH_LIMIT,
            heap_limit: DEFAULT_HEAP_LIMIT,
        }
    }
}

impl MatchLimits {
    /// Same limits with a different step budget.
    pub fn with_match_limit(mut self, steps: u64) -> Self {
        self.match_limit = steps;
        self
    }

    pub fn with_depth_limit(mut self, frames: usize) -> Self {
        self.depth_limit = frames;
        self
    }

    pub fn with_heap_limit(mut self, bytes: usize) -> Self {
        self.heap_limit = bytes;
        self
    }
}
