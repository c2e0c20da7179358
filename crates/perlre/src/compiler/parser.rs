// Pattern parser
// Recursive descent over the pattern's characters. Error offsets are
// character indices into the pattern text.

use super::ast::{BackrefTarget, GroupKind, Node};
use crate::error::{CompileError, CompileErrorKind};
use crate::flags::{CompileFlags, inline_flag};
use crate::program::{CharSet, Look, RepeatMode};
use crate::regex_limits::{MAX_GROUPS, MAX_NAME_LEN, MAX_NESTING, MAX_REPEAT};
use crate::unicode::{self, PerlClass};
use ahash::RandomState;
use regex_syntax::hir::{ClassUnicode, ClassUnicodeRange};
use smol_str::SmolStr;
use std::collections::HashSet;

/// Flags that inline modifiers may change.
pub const MODE_FLAGS: CompileFlags = CompileFlags::CASELESS
    .union(CompileFlags::MULTILINE)
    .union(CompileFlags::DOTALL)
    .union(CompileFlags::EXTENDED)
    .union(CompileFlags::UNGREEDY)
    .union(CompileFlags::DUPNAMES);

/// A named group as written in the pattern.
#[derive(Debug, Clone)]
pub struct NameDef {
    pub name: SmolStr,
    pub group: u32,
    pub offset: usize,
    /// `DUPNAMES` was in force where the group was opened.
    pub dup_ok: bool,
}

pub struct ParsedPattern {
    pub node: Node,
    pub group_count: u32,
    pub names: Vec<NameDef>,
    /// Mode after the inline modifiers that precede every other item.
    pub leading_mode: CompileFlags,
}

enum ClassAtom {
    Char(char),
    Set(ClassUnicode),
    Skip,
}

pub struct Parser {
    chars: Vec<char>,
    pos: usize,
    mode: CompileFlags,
    ucp: bool,
    dollar_endonly: bool,
    no_auto_capture: bool,
    group_count: u32,
    names: Vec<NameDef>,
    depth: usize,
    at_start: bool,
    leading_mode: CompileFlags,
    quoting: bool,
}

fn is_pattern_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\x0B' | '\x0C' | '\r')
}

fn single(c: char) -> ClassUnicodeRange {
    ClassUnicodeRange::new(c, c)
}

impl Parser {
    pub fn new(source: &str, flags: CompileFlags) -> Self {
        let mode = flags & MODE_FLAGS;
        Self {
            chars: source.chars().collect(),
            pos: 0,
            mode,
            ucp: flags.contains(CompileFlags::UCP),
            dollar_endonly: flags.contains(CompileFlags::DOLLAR_ENDONLY),
            no_auto_capture: flags.contains(CompileFlags::NO_AUTO_CAPTURE),
            group_count: 0,
            names: Vec::new(),
            depth: 0,
            at_start: true,
            leading_mode: mode,
            quoting: false,
        }
    }

    pub fn parse(mut self) -> Result<ParsedPattern, CompileError> {
        let node = self.parse_alternation()?;
        if self.pos < self.chars.len() {
            // Only an unbalanced ')' stops the top-level alternation early
            return Err(self.error(self.pos, CompileErrorKind::UnmatchedParen));
        }
        self.validate_names()?;
        Ok(ParsedPattern {
            node,
            group_count: self.group_count,
            names: self.names,
            leading_mode: self.leading_mode,
        })
    }

    // ===== Helpers =====

    #[inline]
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    #[inline]
    fn peek_at(&self, n: usize) -> Option<char> {
        self.chars.get(self.pos + n).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn flag(&self, f: CompileFlags) -> bool {
        self.mode.contains(f)
    }

    fn error(&self, offset: usize, kind: CompileErrorKind) -> CompileError {
        CompileError::new(offset, kind)
    }

    fn skip_extended(&mut self) {
        if !self.flag(CompileFlags::EXTENDED) {
            return;
        }
        loop {
            match self.peek() {
                Some(c) if is_pattern_space(c) => self.pos += 1,
                Some('#') => {
                    while let Some(c) = self.next() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    /// Literal character, expanded to its case variants under `(?i)`.
    fn literal(&self, c: char) -> Node {
        if !self.flag(CompileFlags::CASELESS) {
            return Node::Literal(c);
        }
        let variants = unicode::case_variants(c);
        match variants.ranges() {
            [r] if r.start() == r.end() => Node::Literal(c),
            _ => Node::Class(CharSet::from_class(&variants)),
        }
    }

    fn next_group(&mut self, open: usize) -> Result<u32, CompileError> {
        if self.group_count >= MAX_GROUPS {
            return Err(self.error(open, CompileErrorKind::TooManyGroups));
        }
        self.group_count += 1;
        Ok(self.group_count)
    }

    // ===== Structure =====

    fn parse_alternation(&mut self) -> Result<Node, CompileError> {
        let mut branches = vec![self.parse_concat()?];
        while self.eat('|') {
            if self.depth == 0 {
                self.at_start = false;
            }
            branches.push(self.parse_concat()?);
        }
        Ok(Node::alternate(branches))
    }

    fn parse_concat(&mut self) -> Result<Node, CompileError> {
        let mut seq: Vec<Node> = Vec::new();
        let mut repeatable = false;
        loop {
            self.skip_extended();
            let Some(c) = self.peek() else { break };
            let offset = self.pos;
            let node = match c {
                '|' | ')' => break,
                '*' | '+' | '?' => {
                    self.pos += 1;
                    let (min, max) = match c {
                        '*' => (0, None),
                        '+' => (1, None),
                        _ => (0, Some(1)),
                    };
                    self.apply_repeat(&mut seq, &mut repeatable, min, max, offset)?;
                    continue;
                }
                '{' => {
                    if let Some((min, max)) = self.parse_brace()? {
                        self.apply_repeat(&mut seq, &mut repeatable, min, max, offset)?;
                        continue;
                    }
                    self.pos += 1;
                    self.literal('{')
                }
                '(' => match self.parse_group()? {
                    Some(node) => node,
                    None => continue,
                },
                '\\' if self.peek_at(1) == Some('Q') => {
                    self.pos += 2;
                    loop {
                        match self.peek() {
                            None => break,
                            Some('\\') if self.peek_at(1) == Some('E') => {
                                self.pos += 2;
                                break;
                            }
                            Some(ch) => {
                                self.pos += 1;
                                let lit = self.literal(ch);
                                self.push_atom(&mut seq, &mut repeatable, lit);
                            }
                        }
                    }
                    continue;
                }
                '\\' if self.peek_at(1) == Some('E') => {
                    self.pos += 2;
                    continue;
                }
                '\\' => self.parse_escape()?,
                '[' => self.parse_class()?,
                '.' => {
                    self.pos += 1;
                    Node::Any {
                        dotall: self.flag(CompileFlags::DOTALL),
                    }
                }
                '^' => {
                    self.pos += 1;
                    Node::Assert(Look::StartLine {
                        multiline: self.flag(CompileFlags::MULTILINE),
                    })
                }
                '$' => {
                    self.pos += 1;
                    Node::Assert(Look::EndLine {
                        multiline: self.flag(CompileFlags::MULTILINE),
                        dollar_endonly: self.dollar_endonly,
                    })
                }
                _ => {
                    self.pos += 1;
                    self.literal(c)
                }
            };
            self.push_atom(&mut seq, &mut repeatable, node);
        }
        Ok(Node::concat(seq))
    }

    fn push_atom(&mut self, seq: &mut Vec<Node>, repeatable: &mut bool, node: Node) {
        if self.depth == 0 {
            self.at_start = false;
        }
        *repeatable = !matches!(node, Node::Assert(_));
        seq.push(node);
    }

    fn apply_repeat(
        &mut self,
        seq: &mut Vec<Node>,
        repeatable: &mut bool,
        min: u32,
        max: Option<u32>,
        offset: usize,
    ) -> Result<(), CompileError> {
        if !*repeatable {
            return Err(self.error(offset, CompileErrorKind::NothingToRepeat));
        }
        let Some(node) = seq.pop() else {
            return Err(self.error(offset, CompileErrorKind::NothingToRepeat));
        };
        let ungreedy = self.flag(CompileFlags::UNGREEDY);
        let mode = if self.eat('+') {
            RepeatMode::Possessive
        } else if self.eat('?') {
            if ungreedy {
                RepeatMode::Greedy
            } else {
                RepeatMode::Lazy
            }
        } else if ungreedy {
            RepeatMode::Lazy
        } else {
            RepeatMode::Greedy
        };
        seq.push(Node::Repeat {
            node: Box::new(node),
            min,
            max,
            mode,
            offset,
        });
        *repeatable = false;
        Ok(())
    }

    /// `{n}`, `{n,}` or `{n,m}` at the current position. Returns `None`
    /// (consuming nothing) when the brace is an ordinary literal.
    fn parse_brace(&mut self) -> Result<Option<(u32, Option<u32>)>, CompileError> {
        let start = self.pos;
        let digits = |from: usize| {
            self.chars[from.min(self.chars.len())..]
                .iter()
                .take_while(|c| c.is_ascii_digit())
                .count()
        };
        let min_len = digits(start + 1);
        if min_len == 0 {
            return Ok(None);
        }
        let min_at = start + 1;
        let mut i = min_at + min_len;
        let mut max_at = min_at;
        let mut max_len = min_len;
        let exact;
        match self.chars.get(i) {
            Some('}') => exact = true,
            Some(',') => {
                exact = false;
                i += 1;
                max_at = i;
                max_len = digits(i);
                i += max_len;
                if self.chars.get(i) != Some(&'}') {
                    return Ok(None);
                }
            }
            _ => return Ok(None),
        }

        let number = |at: usize, len: usize| -> u64 {
            self.chars[at..at + len].iter().fold(0u64, |acc, c| {
                acc.saturating_mul(10)
                    .saturating_add(c.to_digit(10).unwrap_or(0) as u64)
            })
        };
        let min = number(min_at, min_len);
        if min > MAX_REPEAT as u64 {
            return Err(self.error(min_at, CompileErrorKind::QuantifierOverflow));
        }
        let max = if exact {
            Some(min)
        } else if max_len == 0 {
            None
        } else {
            let max = number(max_at, max_len);
            if max > MAX_REPEAT as u64 {
                return Err(self.error(max_at, CompileErrorKind::QuantifierOverflow));
            }
            if max < min {
                return Err(self.error(max_at, CompileErrorKind::QuantifierOrder));
            }
            Some(max)
        };
        self.pos = i + 1;
        Ok(Some((min as u32, max.map(|m| m as u32))))
    }

    // ===== Groups =====

    /// Parse a parenthesized construct. Returns `None` for comments and
    /// option settings, which produce no node.
    fn parse_group(&mut self) -> Result<Option<Node>, CompileError> {
        let open = self.pos;
        self.pos += 1;
        if self.depth + 1 > MAX_NESTING {
            return Err(self.error(open, CompileErrorKind::NestingTooDeep));
        }

        let kind = if self.eat('?') {
            let Some(c) = self.next() else {
                return Err(self.error(open, CompileErrorKind::UnclosedGroup));
            };
            match c {
                '#' => loop {
                    match self.next() {
                        Some(')') => return Ok(None),
                        Some(_) => {}
                        None => return Err(self.error(open, CompileErrorKind::UnclosedGroup)),
                    }
                },
                ':' => GroupKind::NonCapture,
                '>' => GroupKind::Atomic,
                '=' => GroupKind::LookAhead { negate: false },
                '!' => GroupKind::LookAhead { negate: true },
                '<' if self.eat('=') => GroupKind::LookBehind {
                    negate: false,
                    offset: open,
                },
                '<' if self.eat('!') => GroupKind::LookBehind {
                    negate: true,
                    offset: open,
                },
                '<' => self.named_capture(open, '>')?,
                '\'' => self.named_capture(open, '\'')?,
                'P' => match self.next() {
                    Some('<') => self.named_capture(open, '>')?,
                    Some('=') => {
                        let (name, _) = self.read_name(')')?;
                        return Ok(Some(Node::Backref {
                            target: BackrefTarget::Name(name),
                            caseless: self.flag(CompileFlags::CASELESS),
                            offset: open,
                        }));
                    }
                    Some('>') => {
                        return Err(self.error(open, CompileErrorKind::Unsupported("subroutine call")));
                    }
                    _ => {
                        return Err(self.error(self.pos - 1, CompileErrorKind::UnknownGroupSyntax));
                    }
                },
                '|' => {
                    return Err(self.error(open, CompileErrorKind::Unsupported("branch reset group")));
                }
                '(' => {
                    return Err(self.error(open, CompileErrorKind::Unsupported("conditional group")));
                }
                'C' => return Err(self.error(open, CompileErrorKind::Unsupported("callout"))),
                'R' | '&' | '+' | '0'..='9' => {
                    return Err(self.error(open, CompileErrorKind::Unsupported("recursion")));
                }
                '-' if self.peek().is_some_and(|d| d.is_ascii_digit()) => {
                    return Err(self.error(open, CompileErrorKind::Unsupported("recursion")));
                }
                _ => {
                    self.pos -= 1;
                    return self.parse_option_group(open);
                }
            }
        } else if self.peek() == Some('*') {
            return Err(self.error(
                open,
                CompileErrorKind::Unsupported("backtracking control verb"),
            ));
        } else if self.no_auto_capture {
            GroupKind::NonCapture
        } else {
            GroupKind::Capture(self.next_group(open)?)
        };

        self.parse_group_body(open, kind).map(Some)
    }

    fn parse_group_body(&mut self, open: usize, kind: GroupKind) -> Result<Node, CompileError> {
        let saved = self.mode;
        self.depth += 1;
        let inner = self.parse_alternation()?;
        self.depth -= 1;
        self.mode = saved;
        if !self.eat(')') {
            return Err(self.error(open, CompileErrorKind::UnclosedGroup));
        }
        Ok(Node::group(kind, inner))
    }

    /// `(?imsxUJ-imsxUJ)` or `(?imsxUJ-imsxUJ:...)`.
    fn parse_option_group(&mut self, open: usize) -> Result<Option<Node>, CompileError> {
        let mut on = CompileFlags::empty();
        let mut off = CompileFlags::empty();
        let mut negative = false;
        loop {
            let Some(c) = self.next() else {
                return Err(self.error(open, CompileErrorKind::UnclosedGroup));
            };
            match c {
                '-' if !negative => negative = true,
                ')' => {
                    self.mode = (self.mode | on) - off;
                    if self.depth == 0 && self.at_start {
                        self.leading_mode = self.mode;
                    }
                    return Ok(None);
                }
                ':' => {
                    let saved = self.mode;
                    self.mode = (self.mode | on) - off;
                    let node = self.parse_group_body(open, GroupKind::NonCapture)?;
                    self.mode = saved;
                    return Ok(Some(node));
                }
                _ => match inline_flag(c) {
                    Some(f) if negative => off |= f,
                    Some(f) => on |= f,
                    None => {
                        return Err(self.error(self.pos - 1, CompileErrorKind::UnknownGroupSyntax));
                    }
                },
            }
        }
    }

    fn named_capture(&mut self, open: usize, term: char) -> Result<GroupKind, CompileError> {
        let (name, offset) = self.read_name(term)?;
        let group = self.next_group(open)?;
        self.names.push(NameDef {
            name,
            group,
            offset,
            dup_ok: self.flag(CompileFlags::DUPNAMES),
        });
        Ok(GroupKind::Capture(group))
    }

    /// Read a group name up to `term`. Well-formedness is checked after the
    /// whole pattern has been parsed.
    fn read_name(&mut self, term: char) -> Result<(SmolStr, usize), CompileError> {
        let start = self.pos;
        loop {
            match self.next() {
                Some(c) if c == term => break,
                Some(_) => {}
                None => return Err(self.error(start, CompileErrorKind::UnterminatedGroupName)),
            }
        }
        let name: String = self.chars[start..self.pos - 1].iter().collect();
        Ok((SmolStr::new(name), start))
    }

    fn validate_names(&self) -> Result<(), CompileError> {
        let mut seen: HashSet<&str, RandomState> = HashSet::default();
        for def in &self.names {
            let name = def.name.as_str();
            let Some(first) = name.chars().next() else {
                return Err(self.error(def.offset, CompileErrorKind::EmptyGroupName));
            };
            let well_formed = (first.is_ascii_alphabetic() || first == '_')
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !well_formed {
                return Err(self.error(def.offset, CompileErrorKind::InvalidGroupName));
            }
            if name.len() > MAX_NAME_LEN {
                return Err(self.error(def.offset, CompileErrorKind::GroupNameTooLong));
            }
            if !seen.insert(name) && !def.dup_ok {
                return Err(self.error(def.offset, CompileErrorKind::DuplicateGroupName));
            }
        }
        Ok(())
    }

    // ===== Escapes =====

    fn parse_escape(&mut self) -> Result<Node, CompileError> {
        let start = self.pos;
        self.pos += 1;
        let Some(c) = self.next() else {
            return Err(self.error(start, CompileErrorKind::TrailingBackslash));
        };
        let ucp = self.ucp;
        let node = match c {
            'A' => Node::Assert(Look::StartText),
            'z' => Node::Assert(Look::EndText),
            'Z' => Node::Assert(Look::EndTextOptNl),
            'G' => Node::Assert(Look::StartOffset),
            'b' => Node::Assert(Look::WordBoundary { ucp }),
            'B' => Node::Assert(Look::NotWordBoundary { ucp }),
            'd' | 'D' | 'w' | 'W' | 's' | 'S' | 'h' | 'H' | 'v' | 'V' => {
                Node::Class(CharSet::from_class(&self.perl_class(c)))
            }
            'N' => Node::Any { dotall: false },
            'R' => newline_sequence(),
            'p' | 'P' => Node::Class(CharSet::from_class(&self.parse_property(start, c == 'P')?)),
            'g' => self.parse_g_reference(start)?,
            'k' => self.parse_k_reference(start)?,
            '1'..='9' => self.parse_digit_escape(start, c)?,
            'K' => return Err(self.error(start, CompileErrorKind::Unsupported("\\K"))),
            'X' => return Err(self.error(start, CompileErrorKind::Unsupported("\\X"))),
            'C' => return Err(self.error(start, CompileErrorKind::Unsupported("\\C"))),
            'L' | 'l' | 'U' | 'u' => {
                return Err(self.error(start, CompileErrorKind::Unsupported("case-changing escape")));
            }
            _ => {
                let ch = self.char_escape(start, c)?;
                self.literal(ch)
            }
        };
        Ok(node)
    }

    fn perl_class(&self, letter: char) -> ClassUnicode {
        let (class, negate) = PerlClass::from_letter(letter).unwrap_or((PerlClass::Digit, false));
        let mut cls = unicode::perl_class(class, self.ucp);
        if negate {
            cls.negate();
        }
        cls
    }

    /// Escapes that denote one character. `c` is the letter after `\`.
    fn char_escape(&mut self, start: usize, c: char) -> Result<char, CompileError> {
        let ch = match c {
            't' => '\t',
            'n' => '\n',
            'r' => '\r',
            'f' => '\x0C',
            'e' => '\x1B',
            'a' => '\x07',
            '0' => {
                let value = self.read_radix(8, 2);
                self.code_point(start, value)?
            }
            'o' => {
                if !self.eat('{') {
                    return Err(self.error(start, CompileErrorKind::InvalidEscape));
                }
                let value = self.read_braced_number(start, 8)?;
                self.code_point(start, value)?
            }
            'x' => {
                let value = if self.eat('{') {
                    self.read_braced_number(start, 16)?
                } else {
                    self.read_radix(16, 2)
                };
                self.code_point(start, value)?
            }
            'c' => {
                let Some(x) = self.next() else {
                    return Err(self.error(start, CompileErrorKind::TrailingBackslash));
                };
                if !(' '..='~').contains(&x) {
                    return Err(self.error(start, CompileErrorKind::InvalidEscape));
                }
                let value = (x.to_ascii_uppercase() as u32) ^ 0x40;
                self.code_point(start, value)?
            }
            // Unknown letters and all punctuation stand for themselves
            other => other,
        };
        Ok(ch)
    }

    /// Read up to `max` digits in `radix`; zero digits reads as 0.
    fn read_radix(&mut self, radix: u32, max: usize) -> u32 {
        let mut value = 0u32;
        for _ in 0..max {
            match self.peek().and_then(|c| c.to_digit(radix)) {
                Some(d) => {
                    value = value * radix + d;
                    self.pos += 1;
                }
                None => break,
            }
        }
        value
    }

    /// Digits up to `}`; the opening brace is already consumed.
    fn read_braced_number(&mut self, start: usize, radix: u32) -> Result<u32, CompileError> {
        let mut value = 0u64;
        let mut count = 0;
        loop {
            match self.next() {
                Some('}') if count > 0 => break,
                Some(c) => match c.to_digit(radix) {
                    Some(d) => {
                        value = (value * radix as u64 + d as u64).min(u32::MAX as u64);
                        count += 1;
                    }
                    None => return Err(self.error(start, CompileErrorKind::InvalidEscape)),
                },
                None => return Err(self.error(start, CompileErrorKind::InvalidEscape)),
            }
        }
        Ok(value as u32)
    }

    fn code_point(&self, start: usize, value: u32) -> Result<char, CompileError> {
        char::from_u32(value).ok_or_else(|| self.error(start, CompileErrorKind::InvalidCodePoint))
    }

    /// `\1`..`\9`, `\nn` backreferences, or an octal escape when the number
    /// exceeds the groups opened so far.
    fn parse_digit_escape(&mut self, start: usize, first: char) -> Result<Node, CompileError> {
        let num_start = self.pos - 1;
        let mut end = num_start;
        let mut value = 0u64;
        while let Some(d) = self.chars.get(end).and_then(|c| c.to_digit(10)) {
            value = value.saturating_mul(10).saturating_add(d as u64);
            end += 1;
        }
        if value < 10 || value <= self.group_count as u64 {
            self.pos = end;
            return Ok(Node::Backref {
                target: BackrefTarget::Number(value.min(u32::MAX as u64) as u32),
                caseless: self.flag(CompileFlags::CASELESS),
                offset: start,
            });
        }
        self.pos = num_start;
        if first >= '8' {
            self.pos += 1;
            return Ok(self.literal(first));
        }
        let value = self.read_radix(8, 3);
        let ch = self.code_point(start, value)?;
        Ok(self.literal(ch))
    }

    /// `\g{n}`, `\g{-n}`, `\g{name}`, `\gn`, `\g-n`.
    fn parse_g_reference(&mut self, start: usize) -> Result<Node, CompileError> {
        let text: String = if self.eat('{') {
            let from = self.pos;
            loop {
                match self.next() {
                    Some('}') => break,
                    Some(_) => {}
                    None => return Err(self.error(start, CompileErrorKind::InvalidEscape)),
                }
            }
            self.chars[from..self.pos - 1].iter().collect()
        } else if matches!(self.peek(), Some('<') | Some('\'')) {
            return Err(self.error(start, CompileErrorKind::Unsupported("subroutine call")));
        } else {
            let from = self.pos;
            self.eat('-');
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.pos += 1;
            }
            self.chars[from..self.pos].iter().collect()
        };

        let caseless = self.flag(CompileFlags::CASELESS);
        let number = text
            .strip_prefix('-')
            .map(|digits| (true, digits))
            .unwrap_or((false, text.as_str()));
        let is_number = !number.1.is_empty() && number.1.chars().all(|c| c.is_ascii_digit());
        if !is_number {
            if number.0 || text.is_empty() {
                return Err(self.error(start, CompileErrorKind::InvalidEscape));
            }
            return Ok(Node::Backref {
                target: BackrefTarget::Name(SmolStr::new(&text)),
                caseless,
                offset: start,
            });
        }
        let n: u64 = number.1.parse().unwrap_or(u64::MAX);
        let group = if number.0 {
            if n == 0 || n > self.group_count as u64 {
                return Err(self.error(start, CompileErrorKind::UnknownGroup));
            }
            self.group_count - n as u32 + 1
        } else {
            if n == 0 {
                return Err(self.error(start, CompileErrorKind::UnknownGroup));
            }
            n.min(u32::MAX as u64) as u32
        };
        Ok(Node::Backref {
            target: BackrefTarget::Number(group),
            caseless,
            offset: start,
        })
    }

    /// `\k<name>`, `\k'name'`, `\k{name}`.
    fn parse_k_reference(&mut self, start: usize) -> Result<Node, CompileError> {
        let term = match self.next() {
            Some('<') => '>',
            Some('\'') => '\'',
            Some('{') => '}',
            _ => return Err(self.error(start, CompileErrorKind::InvalidEscape)),
        };
        let (name, _) = self.read_name(term)?;
        if name.is_empty() {
            return Err(self.error(start, CompileErrorKind::EmptyGroupName));
        }
        Ok(Node::Backref {
            target: BackrefTarget::Name(name),
            caseless: self.flag(CompileFlags::CASELESS),
            offset: start,
        })
    }

    /// `\p{..}`, `\P{..}`, `\pL`, `\p{^..}`; the letter is consumed.
    fn parse_property(&mut self, start: usize, negated: bool) -> Result<ClassUnicode, CompileError> {
        let name: String = if self.eat('{') {
            let from = self.pos;
            loop {
                match self.next() {
                    Some('}') => break,
                    Some(_) => {}
                    None => return Err(self.error(start, CompileErrorKind::MalformedProperty)),
                }
            }
            self.chars[from..self.pos - 1].iter().collect()
        } else {
            match self.next() {
                Some(c) => c.to_string(),
                None => return Err(self.error(start, CompileErrorKind::MalformedProperty)),
            }
        };
        let (negate, name) = match name.strip_prefix('^') {
            Some(rest) => (!negated, rest),
            None => (negated, name.as_str()),
        };
        if name.is_empty() {
            return Err(self.error(start, CompileErrorKind::MalformedProperty));
        }
        let mut cls = unicode::property_class(name)
            .ok_or_else(|| self.error(start, CompileErrorKind::UnknownProperty))?;
        if negate {
            cls.negate();
        }
        Ok(cls)
    }

    // ===== Character classes =====

    fn parse_class(&mut self) -> Result<Node, CompileError> {
        let open = self.pos;
        self.pos += 1;
        let negate = self.eat('^');
        // Explicit characters, ranges and POSIX classes fold under (?i);
        // escapes such as \d and \p do not.
        let mut plain = ClassUnicode::empty();
        let mut folded = ClassUnicode::empty();
        let mut first = true;
        loop {
            let Some(c) = self.peek() else {
                return Err(self.error(open, CompileErrorKind::UnclosedClass));
            };
            let item_start = self.pos;
            if !self.quoting {
                if c == ']' && !first {
                    self.pos += 1;
                    break;
                }
                if c == '[' {
                    if let Some(cls) = self.try_posix()? {
                        first = false;
                        folded.union(&cls);
                        continue;
                    }
                }
            }
            let lo = match self.class_atom(open)? {
                ClassAtom::Char(ch) => ch,
                ClassAtom::Set(cls) => {
                    first = false;
                    plain.union(&cls);
                    continue;
                }
                ClassAtom::Skip => continue,
            };
            first = false;

            let is_range = !self.quoting
                && self.peek() == Some('-')
                && self.peek_at(1).is_some_and(|n| n != ']');
            if is_range {
                let dash = self.pos;
                self.pos += 1;
                match self.class_atom(open)? {
                    ClassAtom::Char(hi) => {
                        if hi < lo {
                            return Err(self.error(item_start, CompileErrorKind::RangeOrder));
                        }
                        folded.push(ClassUnicodeRange::new(lo, hi));
                        continue;
                    }
                    ClassAtom::Set(cls) => {
                        folded.push(single(lo));
                        folded.push(single('-'));
                        plain.union(&cls);
                        continue;
                    }
                    ClassAtom::Skip => {
                        self.quoting = false;
                        self.pos = dash;
                    }
                }
            }
            folded.push(single(lo));
        }
        if self.flag(CompileFlags::CASELESS) {
            folded.case_fold_simple();
        }
        plain.union(&folded);
        if negate {
            plain.negate();
        }
        Ok(Node::Class(CharSet::from_class(&plain)))
    }

    fn class_atom(&mut self, open: usize) -> Result<ClassAtom, CompileError> {
        let Some(c) = self.next() else {
            return Err(self.error(open, CompileErrorKind::UnclosedClass));
        };
        if self.quoting {
            if c == '\\' && self.peek() == Some('E') {
                self.pos += 1;
                self.quoting = false;
                return Ok(ClassAtom::Skip);
            }
            return Ok(ClassAtom::Char(c));
        }
        if c != '\\' {
            return Ok(ClassAtom::Char(c));
        }
        let start = self.pos - 1;
        let Some(e) = self.next() else {
            return Err(self.error(open, CompileErrorKind::UnclosedClass));
        };
        let atom = match e {
            'd' | 'D' | 'w' | 'W' | 's' | 'S' | 'h' | 'H' | 'v' | 'V' => {
                ClassAtom::Set(self.perl_class(e))
            }
            'p' | 'P' => ClassAtom::Set(self.parse_property(start, e == 'P')?),
            'b' => ClassAtom::Char('\x08'),
            'Q' => {
                self.quoting = true;
                ClassAtom::Skip
            }
            'E' => ClassAtom::Skip,
            '1'..='7' => {
                self.pos -= 1;
                let value = self.read_radix(8, 3);
                ClassAtom::Char(self.code_point(start, value)?)
            }
            'A' | 'B' | 'C' | 'G' | 'K' | 'N' | 'R' | 'X' | 'Z' | 'z' | 'g' | 'k' => {
                return Err(self.error(start, CompileErrorKind::InvalidEscape));
            }
            'L' | 'l' | 'U' | 'u' => {
                return Err(self.error(start, CompileErrorKind::Unsupported("case-changing escape")));
            }
            _ => ClassAtom::Char(self.char_escape(start, e)?),
        };
        Ok(atom)
    }

    /// `[:name:]` or `[:^name:]` at the current `[`, if it is one.
    fn try_posix(&mut self) -> Result<Option<ClassUnicode>, CompileError> {
        let start = self.pos;
        let Some(delim) = self.peek_at(1) else {
            return Ok(None);
        };
        if !matches!(delim, ':' | '.' | '=') {
            return Ok(None);
        }
        let mut end = start + 2;
        loop {
            match self.chars.get(end) {
                Some(&c) if c == delim && self.chars.get(end + 1) == Some(&']') => break,
                Some('[') | Some(']') | None => return Ok(None),
                Some(_) => end += 1,
            }
        }
        if delim != ':' {
            return Err(self.error(
                start,
                CompileErrorKind::Unsupported("POSIX collating element"),
            ));
        }
        let text: String = self.chars[start + 2..end].iter().collect();
        let (negate, name) = match text.strip_prefix('^') {
            Some(rest) => (true, rest),
            None => (false, text.as_str()),
        };
        let mut cls = unicode::posix_class(name, self.ucp)
            .ok_or_else(|| self.error(start, CompileErrorKind::UnknownPosixClass))?;
        if negate {
            cls.negate();
        }
        self.pos = end + 2;
        Ok(Some(cls))
    }
}

/// `\R`: `(?>\r\n|[\n\x0b\f\r\x85\x{2028}\x{2029}])`.
fn newline_sequence() -> Node {
    let crlf = Node::Concat(vec![Node::Literal('\r'), Node::Literal('\n')]);
    let vspace = unicode::perl_class(PerlClass::VSpace, false);
    Node::group(
        GroupKind::Atomic,
        Node::Alternate(vec![crlf, Node::Class(CharSet::from_class(&vspace))]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(pattern: &str) -> Result<ParsedPattern, CompileError> {
        Parser::new(pattern, CompileFlags::empty()).parse()
    }

    fn kind_at(pattern: &str) -> (CompileErrorKind, usize) {
        let err = parse(pattern).err().unwrap();
        (err.kind, err.offset)
    }

    #[test]
    fn test_literal_brace() {
        let parsed = parse("a{,3}").unwrap();
        assert_eq!(
            parsed.node,
            Node::Concat(vec![
                Node::Literal('a'),
                Node::Literal('{'),
                Node::Literal(','),
                Node::Literal('3'),
                Node::Literal('}'),
            ])
        );
    }

    #[test]
    fn test_counted_repeat() {
        let parsed = parse("a{2,4}").unwrap();
        assert!(matches!(
            parsed.node,
            Node::Repeat {
                min: 2,
                max: Some(4),
                mode: RepeatMode::Greedy,
                ..
            }
        ));
    }

    #[test]
    fn test_quantifier_errors() {
        assert_eq!(kind_at("a{70000}"), (CompileErrorKind::QuantifierOverflow, 2));
        assert_eq!(kind_at("a{3,2}"), (CompileErrorKind::QuantifierOrder, 4));
        assert_eq!(kind_at("*a"), (CompileErrorKind::NothingToRepeat, 0));
        assert_eq!(kind_at("a**"), (CompileErrorKind::NothingToRepeat, 2));
    }

    #[test]
    fn test_group_numbering() {
        let parsed = parse("(a)(?:b)(?<n>c)(?'m'd)(?P<o>e)").unwrap();
        assert_eq!(parsed.group_count, 4);
        let names: Vec<_> = parsed.names.iter().map(|d| (d.name.as_str(), d.group)).collect();
        assert_eq!(names, vec![("n", 2), ("m", 3), ("o", 4)]);
    }

    #[test]
    fn test_unclosed_offsets() {
        assert_eq!(kind_at("a(b"), (CompileErrorKind::UnclosedGroup, 1));
        assert_eq!(kind_at("xy[abc"), (CompileErrorKind::UnclosedClass, 2));
        assert_eq!(kind_at("ab)"), (CompileErrorKind::UnmatchedParen, 2));
        assert_eq!(kind_at("ab\\"), (CompileErrorKind::TrailingBackslash, 2));
    }

    #[test]
    fn test_name_errors() {
        assert_eq!(kind_at("(?<>a)").0, CompileErrorKind::EmptyGroupName);
        assert_eq!(kind_at("(?<1a>a)").0, CompileErrorKind::InvalidGroupName);
        assert_eq!(kind_at("(?<a>x)(?<a>y)").0, CompileErrorKind::DuplicateGroupName);
        let long = format!("(?<{}>x)", "n".repeat(40));
        assert_eq!(kind_at(&long).0, CompileErrorKind::GroupNameTooLong);
        assert!(parse("(?J)(?<a>x)|(?<a>y)").is_ok());
        assert!(Parser::new("(?<a>x)|(?<a>y)", CompileFlags::DUPNAMES).parse().is_ok());
    }

    #[test]
    fn test_leading_options() {
        let parsed = parse("(?i)abc").unwrap();
        assert!(parsed.leading_mode.contains(CompileFlags::CASELESS));
        let parsed = parse("a(?i)bc").unwrap();
        assert!(!parsed.leading_mode.contains(CompileFlags::CASELESS));
    }

    #[test]
    fn test_unsupported_constructs() {
        for pattern in ["(?R)", "(?1)", "(?(1)a|b)", "(*FAIL)", "(?|a)", "a\\K", "\\X", "(?C1)"] {
            let err = parse(pattern).err().unwrap();
            assert!(
                matches!(err.kind, CompileErrorKind::Unsupported(_)),
                "{pattern}: {err}"
            );
        }
    }

    #[test]
    fn test_class_contents() {
        let parsed = parse("[]a-c\\d]").unwrap();
        let Node::Class(set) = parsed.node else {
            panic!("expected class");
        };
        assert!(set.contains(']'));
        assert!(set.contains('b'));
        assert!(set.contains('7'));
        assert!(!set.contains('d'));
        assert_eq!(kind_at("[z-a]"), (CompileErrorKind::RangeOrder, 1));
        assert_eq!(kind_at("[[:bogus:]]").0, CompileErrorKind::UnknownPosixClass);
    }

    #[test]
    fn test_escapes() {
        let parsed = parse("\\x41\\x{263A}\\101\\cA\\e").unwrap();
        assert_eq!(
            parsed.node,
            Node::Concat(vec![
                Node::Literal('A'),
                Node::Literal('\u{263A}'),
                Node::Literal('A'),
                Node::Literal('\x01'),
                Node::Literal('\x1B'),
            ])
        );
        assert_eq!(kind_at("\\x{110000}").0, CompileErrorKind::InvalidCodePoint);
        assert_eq!(kind_at("\\p{Klingon}").0, CompileErrorKind::UnknownProperty);
    }

    #[test]
    fn test_extended_mode() {
        let parsed = Parser::new("a b # comment\n c", CompileFlags::EXTENDED)
            .parse()
            .unwrap();
        assert_eq!(
            parsed.node,
            Node::Concat(vec![Node::Literal('a'), Node::Literal('b'), Node::Literal('c')])
        );
    }
}
