// Option flags
// Numeric values are PCRE's, so a binding can expose them unchanged.

use bitflags::bitflags;

bitflags! {
    /// Options fixed when a pattern is compiled.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct CompileFlags: u32 {
        /// Letters match both cases (`(?i)`).
        const CASELESS = 0x0000_0001;
        /// `^` and `$` also match at internal line boundaries (`(?m)`).
        const MULTILINE = 0x0000_0002;
        /// `.` also matches newline (`(?s)`).
        const DOTALL = 0x0000_0004;
        /// Ignore unescaped whitespace and `#` comments (`(?x)`).
        const EXTENDED = 0x0000_0008;
        /// Only match at the start offset.
        const ANCHORED = 0x0000_0010;
        /// `$` matches only at the very end, not before a final newline.
        const DOLLAR_ENDONLY = 0x0000_0020;
        /// Quantifiers are lazy by default, `?` makes them greedy (`(?U)`).
        const UNGREEDY = 0x0000_0200;
        /// Byte subjects must be valid UTF-8.
        const UTF = 0x0000_0800;
        /// Plain parentheses do not capture.
        const NO_AUTO_CAPTURE = 0x0000_1000;
        /// Several groups may share a name.
        const DUPNAMES = 0x0008_0000;
        /// `\d`, `\w`, `\s`, `\b` and POSIX classes use Unicode properties.
        const UCP = 0x2000_0000;
    }
}

bitflags! {
    /// Options for a single exec call.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[cfg_attr(feature = "serde", serde(transparent))]
    pub struct ExecFlags: u32 {
        /// Only match at the start offset.
        const ANCHORED = 0x0000_0010;
        /// The subject start is not the beginning of a line.
        const NOTBOL = 0x0000_0080;
        /// The subject end is not the end of a line.
        const NOTEOL = 0x0000_0100;
        /// An empty string is not a valid match.
        const NOTEMPTY = 0x0000_0400;
        /// Skip UTF-8 validation of byte subjects.
        const NO_UTF_CHECK = 0x0000_2000;
        /// An empty string at the start offset is not a valid match.
        const NOTEMPTY_ATSTART = 0x1000_0000;
    }
}

/// Option letters accepted by inline modifiers such as `(?im-sx)`.
pub(crate) fn inline_flag(letter: char) -> Option<CompileFlags> {
    match letter {
        'i' => Some(CompileFlags::CASELESS),
        'm' => Some(CompileFlags::MULTILINE),
        's' => Some(CompileFlags::DOTALL),
        'x' => Some(CompileFlags::EXTENDED),
        'U' => Some(CompileFlags::UNGREEDY),
        'J' => Some(CompileFlags::DUPNAMES),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcre_values() {
        assert_eq!(CompileFlags::CASELESS.bits(), 1);
        assert_eq!(CompileFlags::UCP.bits(), 0x2000_0000);
        assert_eq!(ExecFlags::ANCHORED.bits(), CompileFlags::ANCHORED.bits());
        assert_eq!(ExecFlags::NOTEMPTY_ATSTART.bits(), 0x1000_0000);
    }

    #[test]
    fn test_inline_letters() {
        assert_eq!(inline_flag('i'), Some(CompileFlags::CASELESS));
        assert_eq!(inline_flag('U'), Some(CompileFlags::UNGREEDY));
        assert_eq!(inline_flag('q'), None);
    }
}
