// Compiled regex handle and the search/replace conveniences built on exec.

use crate::error::{CompileError, Error, ExecError, FormatError};
use crate::flags::{CompileFlags, ExecFlags};
use crate::program::{Program, serializer};
use crate::regex_limits::MatchLimits;
use crate::replace::Replacer;
use crate::study::{self, StudyInfo};
use crate::vm::{self, MatchResult, Scratch};
use std::fmt;
use std::sync::Arc;

/// A compiled pattern ready for matching.
///
/// Cloning is cheap; the program is shared. A `Regex` may be used from any
/// number of threads at once since every exec call owns its scratch state.
#[derive(Debug, Clone)]
pub struct Regex {
    program: Arc<Program>,
    study: Option<Arc<StudyInfo>>,
    limits: MatchLimits,
}

impl Regex {
    pub fn new(pattern: &str) -> Result<Regex, CompileError> {
        Self::with_flags(pattern, CompileFlags::empty())
    }

    pub fn with_flags(pattern: &str, flags: CompileFlags) -> Result<Regex, CompileError> {
        Ok(Self::from_program(Program::compile(pattern, flags)?))
    }

    pub fn from_program(program: Program) -> Regex {
        Regex {
            program: Arc::new(program),
            study: None,
            limits: MatchLimits::default(),
        }
    }

    /// Rebuild a regex from `serialize` output.
    pub fn deserialize(bytes: &[u8]) -> Result<Regex, FormatError> {
        Ok(Self::from_program(serializer::deserialize_program(bytes)?))
    }

    pub fn serialize(&self) -> Vec<u8> {
        serializer::serialize_program(&self.program)
    }

    /// Analyse the program and use the result to skip hopeless start
    /// positions. Matching results are unchanged.
    pub fn study(mut self) -> Regex {
        self.study = Some(Arc::new(study::study(&self.program)));
        self
    }

    pub fn study_info(&self) -> Option<&StudyInfo> {
        self.study.as_deref()
    }

    pub fn with_limits(mut self, limits: MatchLimits) -> Regex {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> MatchLimits {
        self.limits
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn as_str(&self) -> &str {
        self.program.source()
    }

    pub fn group_count(&self) -> u32 {
        self.program.group_count()
    }

    // ===== Exec =====

    /// Search `subject[start..end]`. See `exec_with`.
    pub fn exec<'s>(
        &self,
        subject: &'s str,
        start: usize,
        end: usize,
        flags: ExecFlags,
    ) -> Result<Option<MatchResult<'s>>, ExecError> {
        // A `&str` is valid UTF-8 already
        self.exec_bytes(subject.as_bytes(), start, end, flags | ExecFlags::NO_UTF_CHECK)
    }

    pub fn exec_bytes<'s>(
        &self,
        subject: &'s [u8],
        start: usize,
        end: usize,
        flags: ExecFlags,
    ) -> Result<Option<MatchResult<'s>>, ExecError> {
        let mut scratch = Scratch::new();
        self.exec_with(&mut scratch, subject, start, end, flags)
    }

    /// Search `subject[start..end]` reusing `scratch` for match state.
    ///
    /// `start > end` or `end > subject.len()` is no match rather than an
    /// error. Lookbehind and `\b` may inspect bytes before `start`; nothing
    /// at or after `end` is read.
    pub fn exec_with<'s>(
        &self,
        scratch: &mut Scratch,
        subject: &'s [u8],
        start: usize,
        end: usize,
        flags: ExecFlags,
    ) -> Result<Option<MatchResult<'s>>, ExecError> {
        let spans = vm::search(
            &self.program,
            self.study.as_deref(),
            subject,
            start,
            end,
            flags,
            self.limits,
            scratch,
        )?;
        Ok(spans.map(|spans| MatchResult::new(self.program.clone(), subject, spans, start, end)))
    }

    // ===== Conveniences =====

    pub fn search<'s>(&self, text: &'s str) -> Result<Option<MatchResult<'s>>, ExecError> {
        self.exec(text, 0, text.len(), ExecFlags::empty())
    }

    /// Search `text[pos..endpos]`, `endpos` defaulting to the end of `text`.
    pub fn search_at<'s>(
        &self,
        text: &'s str,
        pos: usize,
        endpos: Option<usize>,
    ) -> Result<Option<MatchResult<'s>>, ExecError> {
        self.exec(text, pos, endpos.unwrap_or(text.len()), ExecFlags::empty())
    }

    /// Match anchored at `pos`.
    pub fn match_at<'s>(
        &self,
        text: &'s str,
        pos: usize,
        endpos: Option<usize>,
    ) -> Result<Option<MatchResult<'s>>, ExecError> {
        self.exec(text, pos, endpos.unwrap_or(text.len()), ExecFlags::ANCHORED)
    }

    pub fn is_match(&self, text: &str) -> Result<bool, ExecError> {
        Ok(self.search(text)?.is_some())
    }

    /// Successive non-overlapping matches from left to right.
    pub fn find_iter<'r, 's>(&'r self, text: &'s str) -> FindIter<'r, 's> {
        FindIter {
            regex: self,
            text,
            pos: 0,
            endpos: text.len(),
            retry_empty: false,
            done: false,
            scratch: Scratch::new(),
        }
    }

    /// Text of every match.
    pub fn findall<'s>(&self, text: &'s str) -> Result<Vec<&'s str>, ExecError> {
        let mut out = Vec::new();
        for m in self.find_iter(text) {
            let m = m?;
            if let Some((s, e)) = m.span(0).ok().flatten() {
                out.push(&text[s..e]);
            }
        }
        Ok(out)
    }

    /// Split `text` at matches. Captured groups are placed between the
    /// pieces, `None` for groups that did not take part. `maxsplit` of 0
    /// means no limit.
    pub fn split<'s>(&self, text: &'s str, maxsplit: usize) -> Result<Vec<Option<&'s str>>, ExecError> {
        let mut out = Vec::new();
        let mut last = 0;
        let mut n = 0;
        for m in self.find_iter(text) {
            let m = m?;
            let Some((start, end)) = m.span(0).ok().flatten() else {
                continue;
            };
            out.push(text.get(last..start));
            for group in 1..=self.group_count() as usize {
                out.push(m.span(group).ok().flatten().and_then(|(s, e)| text.get(s..e)));
            }
            last = end;
            n += 1;
            if maxsplit > 0 && n >= maxsplit {
                break;
            }
        }
        out.push(text.get(last..));
        Ok(out)
    }

    /// Replace the first `count` matches (all when 0).
    pub fn sub<R: Replacer>(&self, repl: R, text: &str, count: usize) -> Result<String, Error> {
        Ok(self.subn(repl, text, count)?.0)
    }

    /// Like `sub`, also returning the number of replacements made.
    pub fn subn<R: Replacer>(&self, mut repl: R, text: &str, count: usize) -> Result<(String, usize), Error> {
        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        let mut n = 0;
        for m in self.find_iter(text) {
            let m = m?;
            let Some((start, end)) = m.span(0)? else {
                continue;
            };
            out.push_str(&text[last..start]);
            repl.replace_append(&m, &mut out)?;
            last = end;
            n += 1;
            if count > 0 && n >= count {
                break;
            }
        }
        out.push_str(&text[last..]);
        Ok((out, n))
    }
}

impl fmt::Display for Regex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Iterator returned by `Regex::find_iter`.
///
/// After an empty match the same offset is retried for a non-empty
/// anchored match before moving on by one character, so the iterator
/// always terminates. It stops after the first exec error.
pub struct FindIter<'r, 's> {
    regex: &'r Regex,
    text: &'s str,
    pos: usize,
    endpos: usize,
    retry_empty: bool,
    done: bool,
    scratch: Scratch,
}

impl<'s> Iterator for FindIter<'_, 's> {
    type Item = Result<MatchResult<'s>, ExecError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            // The subject is a `&str`, so it never needs UTF-8 validation
            let flags = if self.retry_empty {
                ExecFlags::NOTEMPTY_ATSTART | ExecFlags::ANCHORED | ExecFlags::NO_UTF_CHECK
            } else {
                ExecFlags::NO_UTF_CHECK
            };
            let result = self.regex.exec_with(
                &mut self.scratch,
                self.text.as_bytes(),
                self.pos,
                self.endpos,
                flags,
            );
            match result {
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
                Ok(Some(m)) => {
                    let (start, end) = m.span(0).ok().flatten().unwrap_or((self.pos, self.pos));
                    self.retry_empty = start == end;
                    self.pos = end;
                    return Some(Ok(m));
                }
                Ok(None) if self.retry_empty => {
                    self.retry_empty = false;
                    match self.text[self.pos..self.endpos].chars().next() {
                        Some(c) => self.pos += c.len_utf8(),
                        None => self.done = true,
                    }
                }
                Ok(None) => self.done = true,
            }
        }
        None
    }
}
