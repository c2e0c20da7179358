// Perl-compatible regular expressions
// A backtracking regex engine with a bytecode compiler and a validated
// binary program format.

#[cfg(test)]
mod test;

pub mod cache;
pub mod compiler;
pub mod error;
pub mod flags;
pub mod program;
pub mod regex;
pub mod regex_limits;
pub mod replace;
pub mod study;
pub mod unicode;
pub mod vm;

#[cfg(feature = "serde")]
pub mod serde;

pub use cache::RegexCache;
pub use error::{
    CompileError, CompileErrorKind, Error, ExecError, FormatError, IndexError, LimitKind, TemplateError,
};
pub use flags::{CompileFlags, ExecFlags};
pub use program::{CharSet, Inst, NameTable, Program};
pub use regex::{FindIter, Regex};
pub use regex_limits::MatchLimits;
pub use replace::Replacer;
pub use study::StudyInfo;
pub use vm::{GroupId, MatchResult, Scratch};

/// Engine version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Capabilities of this build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(::serde::Serialize))]
pub struct Features {
    pub jit: bool,
    pub unicode_properties: bool,
    pub study: bool,
    pub format_version: u8,
}

pub fn version() -> &'static str {
    VERSION
}

pub fn features() -> Features {
    Features {
        jit: false,
        unicode_properties: true,
        study: true,
        format_version: program::serializer::FORMAT_VERSION,
    }
}

/// Compile `pattern` with `flags`.
pub fn compile(pattern: &str, flags: CompileFlags) -> Result<Regex, CompileError> {
    Regex::with_flags(pattern, flags)
}

/// Search `subject[start..end]` with `regex`.
pub fn exec<'s>(
    regex: &Regex,
    subject: &'s str,
    start: usize,
    end: usize,
    flags: ExecFlags,
) -> Result<Option<MatchResult<'s>>, ExecError> {
    regex.exec(subject, start, end, flags)
}

/// Span of `group` in `result`; `None` when the group did not participate.
pub fn group_span<'a>(
    result: &MatchResult<'_>,
    group: impl Into<GroupId<'a>>,
) -> Result<Option<(usize, usize)>, IndexError> {
    result.span(group)
}

pub fn serialize(regex: &Regex) -> Vec<u8> {
    regex.serialize()
}

pub fn deserialize(bytes: &[u8]) -> Result<Regex, FormatError> {
    Regex::deserialize(bytes)
}

pub fn study(regex: &Regex) -> StudyInfo {
    study::study(regex.program())
}

/// Escape every character except ASCII letters and digits so `text`
/// matches literally. NUL becomes `\000`.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c);
        } else if c == '\0' {
            out.push_str("\\000");
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// Convert a backslash template (`\1`, `\g<name>`) into the brace form used
/// by `MatchResult::expand`. Only one digit is taken after a backslash.
/// Literal braces are doubled; other backslashes are kept.
pub fn convert_template(template: &str) -> String {
    let mut out = String::with_capacity(template.len() + 8);
    let push_literal = |out: &mut String, text: &str| {
        for c in text.chars() {
            match c {
                '{' => out.push_str("{{"),
                '}' => out.push_str("}}"),
                _ => out.push(c),
            }
        }
    };
    let mut pieces = template.split('\\');
    if let Some(first) = pieces.next() {
        push_literal(&mut out, first);
    }
    for piece in pieces {
        let mut chars = piece.chars();
        match chars.next() {
            Some(d) if d.is_ascii_digit() => {
                out.push('{');
                out.push(d);
                out.push('}');
                push_literal(&mut out, chars.as_str());
            }
            _ => match piece.strip_prefix("g<").and_then(|rest| rest.split_once('>')) {
                Some((id, rest)) => {
                    out.push('{');
                    out.push_str(id);
                    out.push('}');
                    push_literal(&mut out, rest);
                }
                None => {
                    out.push('\\');
                    push_literal(&mut out, piece);
                }
            },
        }
    }
    out
}
