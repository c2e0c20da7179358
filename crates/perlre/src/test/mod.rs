pub mod test_compile;
pub mod test_exec;
pub mod test_serialize;
pub mod test_study;

use crate::*;

type Spans = Vec<Option<(usize, usize)>>;

/// Spans of the leftmost match of `pattern` in `text`.
pub(crate) fn spans_with(pattern: &str, flags: CompileFlags, text: &str) -> Option<Spans> {
    let re = Regex::with_flags(pattern, flags).unwrap_or_else(|e| panic!("{pattern}: {e}"));
    re.search(text)
        .unwrap_or_else(|e| panic!("{pattern}: {e}"))
        .map(|m| (0..=re.group_count() as usize).map(|g| m.span(g).unwrap()).collect())
}

pub(crate) fn spans(pattern: &str, text: &str) -> Option<Spans> {
    spans_with(pattern, CompileFlags::empty(), text)
}

/// Span of the whole leftmost match.
pub(crate) fn find_with(pattern: &str, flags: CompileFlags, text: &str) -> Option<(usize, usize)> {
    spans_with(pattern, flags, text).and_then(|s| s[0])
}

pub(crate) fn find(pattern: &str, text: &str) -> Option<(usize, usize)> {
    find_with(pattern, CompileFlags::empty(), text)
}
