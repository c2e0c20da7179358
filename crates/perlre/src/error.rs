use thiserror::Error;

/// What went wrong while compiling a pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileErrorKind {
    #[error("\\ at end of pattern")]
    TrailingBackslash,
    #[error("missing )")]
    UnclosedGroup,
    #[error("unmatched parentheses")]
    UnmatchedParen,
    #[error("missing terminating ] for character class")]
    UnclosedClass,
    #[error("nothing to repeat")]
    NothingToRepeat,
    #[error("number too big in {{}} quantifier")]
    QuantifierOverflow,
    #[error("numbers out of order in {{}} quantifier")]
    QuantifierOrder,
    #[error("range out of order in character class")]
    RangeOrder,
    #[error("unknown POSIX class name")]
    UnknownPosixClass,
    #[error("unknown property name after \\P or \\p")]
    UnknownProperty,
    #[error("malformed \\P or \\p sequence")]
    MalformedProperty,
    #[error("invalid escape sequence")]
    InvalidEscape,
    #[error("character value out of range")]
    InvalidCodePoint,
    #[error("unrecognized character after (? or (?-")]
    UnknownGroupSyntax,
    #[error("group name must not be empty")]
    EmptyGroupName,
    #[error("syntax error in subpattern name (missing terminator)")]
    UnterminatedGroupName,
    #[error("group name must start with a letter or underscore and contain only word characters")]
    InvalidGroupName,
    #[error("group name is too long")]
    GroupNameTooLong,
    #[error("two named subpatterns have the same name")]
    DuplicateGroupName,
    #[error("reference to non-existent subpattern")]
    UnknownGroup,
    #[error("lookbehind assertion is not fixed length")]
    VariableLookbehind,
    #[error("parentheses are too deeply nested")]
    NestingTooDeep,
    #[error("too many capturing groups")]
    TooManyGroups,
    #[error("regular expression is too large")]
    PatternTooLarge,
    #[error("unsupported construct: {0}")]
    Unsupported(&'static str),
}

/// Syntax error in a pattern.
///
/// `offset` counts characters of the pattern text, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} at offset {offset}")]
pub struct CompileError {
    pub offset: usize,
    pub kind: CompileErrorKind,
}

impl CompileError {
    pub fn new(offset: usize, kind: CompileErrorKind) -> Self {
        Self { offset, kind }
    }

    /// A repeat bound exceeded the engine's counter width.
    /// Callers may treat this as a resource-policy rejection.
    pub fn is_quantifier_overflow(&self) -> bool {
        self.kind == CompileErrorKind::QuantifierOverflow
    }

    pub fn message(&self) -> String {
        self.kind.to_string()
    }
}

/// Which budget an exec call ran out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    /// The step counter (`MatchLimits::match_limit`).
    Match,
    /// Live backtrack frames (`MatchLimits::depth_limit`).
    Depth,
    /// Scratch memory (`MatchLimits::heap_limit`).
    Heap,
}

impl std::fmt::Display for LimitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LimitKind::Match => write!(f, "match limit"),
            LimitKind::Depth => write!(f, "depth limit"),
            LimitKind::Heap => write!(f, "heap limit"),
        }
    }
}

/// Failure of an exec call. Not matching is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    #[error("{0} exceeded")]
    ResourceLimitExceeded(LimitKind),
    #[error("out of memory while allocating match state")]
    OutOfMemory,
    #[error("invalid UTF-8 in subject at byte {offset}")]
    BadUtf { offset: usize },
    #[error("offset {offset} is not on a character boundary")]
    BadOffset { offset: usize },
    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl ExecError {
    /// True when the caller may retry with a smaller input or larger budget.
    pub fn is_resource_limit(&self) -> bool {
        matches!(self, ExecError::ResourceLimitExceeded(_))
    }
}

/// Malformed serialized program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("not a perlre program")]
    BadMagic,
    #[error("unsupported program format version {0}")]
    UnsupportedVersion(u8),
    #[error("serialized program is truncated")]
    Truncated,
    #[error("trailing bytes after serialized program")]
    TrailingBytes,
    #[error("invalid serialized program: {0}")]
    Invalid(&'static str),
}

/// A group index or name that does not exist in the pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no such group: {group}")]
pub struct IndexError {
    pub group: String,
}

/// Malformed replacement template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("single '{{' or '}}' at template offset {0}")]
    UnbalancedBrace(usize),
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Any error of the convenience API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Template(#[from] TemplateError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_display() {
        let err = CompileError::new(1, CompileErrorKind::UnclosedGroup);
        assert_eq!(err.to_string(), "missing ) at offset 1");
        assert!(!err.is_quantifier_overflow());
        assert!(CompileError::new(2, CompileErrorKind::QuantifierOverflow).is_quantifier_overflow());
    }

    #[test]
    fn test_exec_error_kinds() {
        assert!(ExecError::ResourceLimitExceeded(LimitKind::Match).is_resource_limit());
        assert!(!ExecError::OutOfMemory.is_resource_limit());
        assert_eq!(
            ExecError::ResourceLimitExceeded(LimitKind::Depth).to_string(),
            "depth limit exceeded"
        );
    }
}
