// Unicode property tables, Perl/POSIX classes and simple case folding
//
// All tables come from regex-syntax's Unicode data and are resolved into
// plain code point ranges at compile time, so compiled programs carry no
// references to these tables.

use crate::program::CharSet;
use regex_syntax::ParserBuilder;
use regex_syntax::hir::{Class, ClassUnicode, ClassUnicodeRange, HirKind};
use std::sync::OnceLock;

/// Backslash shorthand classes: `\d \w \s \h \v`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerlClass {
    Digit,
    Word,
    Space,
    HSpace,
    VSpace,
}

impl PerlClass {
    pub fn from_letter(letter: char) -> Option<(PerlClass, bool)> {
        let class = match letter.to_ascii_lowercase() {
            'd' => PerlClass::Digit,
            'w' => PerlClass::Word,
            's' => PerlClass::Space,
            'h' => PerlClass::HSpace,
            'v' => PerlClass::VSpace,
            _ => return None,
        };
        Some((class, letter.is_ascii_uppercase()))
    }
}

fn class_of(ranges: &[(char, char)]) -> ClassUnicode {
    ClassUnicode::new(
        ranges
            .iter()
            .map(|&(lo, hi)| ClassUnicodeRange::new(lo, hi)),
    )
}

/// Parse a regex-syntax class expression into a class.
fn parse_class(expr: &str) -> Option<ClassUnicode> {
    let hir = ParserBuilder::new().build().parse(expr).ok()?;
    match hir.kind() {
        HirKind::Class(Class::Unicode(cls)) => Some(cls.clone()),
        HirKind::Literal(lit) => {
            let text = std::str::from_utf8(&lit.0).ok()?;
            let mut chars = text.chars();
            let c = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            Some(class_of(&[(c, c)]))
        }
        _ => None,
    }
}

const ASCII_DIGIT: &[(char, char)] = &[('0', '9')];
const ASCII_WORD: &[(char, char)] = &[('0', '9'), ('A', 'Z'), ('_', '_'), ('a', 'z')];
const ASCII_SPACE: &[(char, char)] = &[('\t', '\r'), (' ', ' ')];
const HSPACE: &[(char, char)] = &[
    ('\t', '\t'),
    (' ', ' '),
    ('\u{a0}', '\u{a0}'),
    ('\u{1680}', '\u{1680}'),
    ('\u{180e}', '\u{180e}'),
    ('\u{2000}', '\u{200a}'),
    ('\u{202f}', '\u{202f}'),
    ('\u{205f}', '\u{205f}'),
    ('\u{3000}', '\u{3000}'),
];
const VSPACE: &[(char, char)] = &[
    ('\n', '\r'),
    ('\u{85}', '\u{85}'),
    ('\u{2028}', '\u{2029}'),
];

const UCP_DIGIT: &str = r"\p{Nd}";
const UCP_ALNUM: &str = r"[\p{L}\p{N}]";
const UCP_WORD: &str = r"[\p{L}\p{N}_]";
const UCP_SPACE: &str = r"[\p{Z}\t\n\x0B\x0C\r]";

/// Class for a backslash shorthand. `ucp` selects Unicode semantics for
/// `\d \w \s`; `\h` and `\v` are the same in both modes.
pub fn perl_class(class: PerlClass, ucp: bool) -> ClassUnicode {
    let fixed = match class {
        PerlClass::HSpace => return class_of(HSPACE),
        PerlClass::VSpace => return class_of(VSPACE),
        PerlClass::Digit if ucp => parse_class(UCP_DIGIT),
        PerlClass::Word if ucp => parse_class(UCP_WORD),
        PerlClass::Space if ucp => parse_class(UCP_SPACE),
        _ => None,
    };
    match (fixed, class) {
        (Some(cls), _) => cls,
        (None, PerlClass::Digit) => class_of(ASCII_DIGIT),
        (None, PerlClass::Word) => class_of(ASCII_WORD),
        (None, _) => class_of(ASCII_SPACE),
    }
}

/// Class for a POSIX bracket name such as `alpha` in `[[:alpha:]]`.
pub fn posix_class(name: &str, ucp: bool) -> Option<ClassUnicode> {
    if ucp {
        let expr = match name {
            "alpha" => Some(r"\p{L}"),
            "digit" => Some(UCP_DIGIT),
            "alnum" => Some(UCP_ALNUM),
            "space" => Some(UCP_SPACE),
            "word" => Some(UCP_WORD),
            "lower" => Some(r"\p{Ll}"),
            "upper" => Some(r"\p{Lu}"),
            _ => None,
        };
        if let Some(expr) = expr {
            return parse_class(expr);
        }
    }
    let ranges: &[(char, char)] = match name {
        "alpha" => &[('A', 'Z'), ('a', 'z')],
        "digit" => ASCII_DIGIT,
        "alnum" => &[('0', '9'), ('A', 'Z'), ('a', 'z')],
        "space" => ASCII_SPACE,
        "word" => ASCII_WORD,
        "lower" => &[('a', 'z')],
        "upper" => &[('A', 'Z')],
        "xdigit" => &[('0', '9'), ('A', 'F'), ('a', 'f')],
        "punct" => &[('!', '/'), (':', '@'), ('[', '`'), ('{', '~')],
        "blank" => &[('\t', '\t'), (' ', ' ')],
        "cntrl" => &[('\0', '\u{1f}'), ('\u{7f}', '\u{7f}')],
        "graph" => &[('!', '~')],
        "print" => &[(' ', '~')],
        "ascii" => &[('\0', '\u{7f}')],
        _ => return None,
    };
    Some(class_of(ranges))
}

/// Class for a `\p{name}` property. Accepts general categories, scripts and
/// binary properties known to regex-syntax plus PCRE's own `L&`, `Xan`,
/// `Xps`, `Xsp` and `Xwd`.
pub fn property_class(name: &str) -> Option<ClassUnicode> {
    match name {
        "L&" => return parse_class(r"[\p{Lu}\p{Ll}\p{Lt}]"),
        "Xan" => return parse_class(UCP_ALNUM),
        "Xps" | "Xsp" => return parse_class(UCP_SPACE),
        "Xwd" => return parse_class(UCP_WORD),
        _ => {}
    }
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ' || c == '-');
    if !valid {
        return None;
    }
    let mut expr = String::with_capacity(name.len() + 4);
    expr.push_str(r"\p{");
    expr.push_str(name);
    expr.push('}');
    parse_class(&expr)
}

/// All characters that match `c` under simple case folding, `c` included.
pub fn case_variants(c: char) -> ClassUnicode {
    let mut cls = class_of(&[(c, c)]);
    cls.case_fold_simple();
    cls
}

/// Canonical representative of `c`'s case-fold class, used to compare
/// characters caselessly at match time.
pub fn simple_fold(c: char) -> char {
    if c.is_ascii() {
        return c.to_ascii_uppercase();
    }
    case_variants(c)
        .ranges()
        .first()
        .map(|r| r.start())
        .unwrap_or(c)
}

/// Word character test used by `\b` and `\B`. Agrees with `\w` in the
/// same mode.
#[inline]
pub fn is_word_char(c: char, ucp: bool) -> bool {
    if c.is_ascii() || !ucp {
        return c.is_ascii_alphanumeric() || c == '_';
    }
    static UCP_WORD_SET: OnceLock<CharSet> = OnceLock::new();
    UCP_WORD_SET
        .get_or_init(|| CharSet::from_class(&perl_class(PerlClass::Word, true)))
        .contains(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contains(cls: &ClassUnicode, c: char) -> bool {
        cls.ranges().iter().any(|r| r.start() <= c && c <= r.end())
    }

    #[test]
    fn test_perl_classes_ascii() {
        let d = perl_class(PerlClass::Digit, false);
        assert!(contains(&d, '7'));
        assert!(!contains(&d, '\u{0663}'));
        let w = perl_class(PerlClass::Word, false);
        assert!(contains(&w, '_'));
        assert!(!contains(&w, 'é'));
        let s = perl_class(PerlClass::Space, false);
        assert!(contains(&s, '\x0B'));
    }

    #[test]
    fn test_perl_classes_ucp() {
        assert!(contains(&perl_class(PerlClass::Digit, true), '\u{0663}'));
        assert!(contains(&perl_class(PerlClass::Word, true), 'é'));
        assert!(contains(&perl_class(PerlClass::Space, true), '\u{3000}'));
    }

    #[test]
    fn test_word_char_matches_word_class() {
        let w = perl_class(PerlClass::Word, true);
        for c in ['a', '_', '7', 'é', 'λ', '\u{0663}', '\u{345}', '\u{300}', '-', ' '] {
            assert_eq!(is_word_char(c, true), contains(&w, c), "{c:?}");
        }
        assert!(!is_word_char('\u{345}', true));
        assert!(!is_word_char('é', false));
    }

    #[test]
    fn test_properties() {
        let greek = property_class("Greek").unwrap();
        assert!(contains(&greek, 'λ'));
        assert!(!contains(&greek, 'l'));
        let lu = property_class("Lu").unwrap();
        assert!(contains(&lu, 'Q'));
        assert!(!contains(&lu, 'q'));
        assert!(contains(&property_class("L&").unwrap(), 'q'));
        assert!(property_class("NoSuchProperty").is_none());
        assert!(property_class("L}").is_none());
    }

    #[test]
    fn test_posix() {
        assert!(contains(&posix_class("punct", false).unwrap(), '!'));
        assert!(contains(&posix_class("alpha", true).unwrap(), 'ж'));
        assert!(!contains(&posix_class("alpha", false).unwrap(), 'ж'));
        assert!(posix_class("bogus", false).is_none());
    }

    #[test]
    fn test_case_folding() {
        assert_eq!(simple_fold('k'), simple_fold('K'));
        assert_eq!(simple_fold('\u{212A}'), simple_fold('k'));
        assert_eq!(simple_fold('ж'), simple_fold('Ж'));
        let v = case_variants('s');
        assert!(contains(&v, 'S'));
        assert!(contains(&v, '\u{017F}'));
    }
}
