use crate::error::{IndexError, TemplateError};
use crate::program::Program;
use std::borrow::Cow;
use std::sync::Arc;

/// A group addressed by number or by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupId<'a> {
    Index(usize),
    Name(&'a str),
}

impl From<usize> for GroupId<'_> {
    fn from(index: usize) -> Self {
        GroupId::Index(index)
    }
}

impl<'a> From<&'a str> for GroupId<'a> {
    fn from(name: &'a str) -> Self {
        GroupId::Name(name)
    }
}

impl std::fmt::Display for GroupId<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GroupId::Index(i) => write!(f, "{}", i),
            GroupId::Name(n) => write!(f, "{}", n),
        }
    }
}

/// A successful match: group spans over the subject it was found in.
///
/// Spans are byte offsets into the whole subject, not the search window.
/// The result keeps the program alive, so it stays valid if the `Regex` it
/// came from is dropped.
#[derive(Debug, Clone)]
pub struct MatchResult<'s> {
    program: Arc<Program>,
    subject: &'s [u8],
    spans: Vec<Option<(usize, usize)>>,
    pos: usize,
    endpos: usize,
}

impl<'s> MatchResult<'s> {
    pub(crate) fn new(
        program: Arc<Program>,
        subject: &'s [u8],
        spans: Vec<Option<(usize, usize)>>,
        pos: usize,
        endpos: usize,
    ) -> Self {
        Self {
            program,
            subject,
            spans,
            pos,
            endpos,
        }
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    fn index(&self, id: GroupId<'_>) -> Result<usize, IndexError> {
        let not_found = || IndexError {
            group: id.to_string(),
        };
        match id {
            GroupId::Index(i) if i < self.spans.len() => Ok(i),
            GroupId::Index(_) => Err(not_found()),
            GroupId::Name(name) => {
                let groups = self.program.names().indices(name);
                if groups.is_empty() {
                    return Err(not_found());
                }
                // With duplicate names the first group that took part wins
                let chosen = groups
                    .iter()
                    .copied()
                    .find(|&g| self.spans.get(g as usize).is_some_and(|s| s.is_some()))
                    .unwrap_or(groups[0]);
                Ok(chosen as usize)
            }
        }
    }

    /// Byte span of a group, `None` when it did not participate.
    pub fn span<'a>(&self, id: impl Into<GroupId<'a>>) -> Result<Option<(usize, usize)>, IndexError> {
        let i = self.index(id.into())?;
        Ok(self.spans[i])
    }

    pub fn start<'a>(&self, id: impl Into<GroupId<'a>>) -> Result<Option<usize>, IndexError> {
        Ok(self.span(id)?.map(|(s, _)| s))
    }

    pub fn end<'a>(&self, id: impl Into<GroupId<'a>>) -> Result<Option<usize>, IndexError> {
        Ok(self.span(id)?.map(|(_, e)| e))
    }

    /// Text of a group. Invalid UTF-8 in a byte subject is replaced.
    pub fn group<'a>(&self, id: impl Into<GroupId<'a>>) -> Result<Option<Cow<'s, str>>, IndexError> {
        Ok(self
            .group_bytes(id)?
            .map(String::from_utf8_lossy))
    }

    pub fn group_bytes<'a>(&self, id: impl Into<GroupId<'a>>) -> Result<Option<&'s [u8]>, IndexError> {
        Ok(self.span(id)?.map(|(s, e)| &self.subject[s..e]))
    }

    /// Text of the whole match.
    pub fn as_str(&self) -> Cow<'s, str> {
        match self.spans[0] {
            Some((s, e)) => String::from_utf8_lossy(&self.subject[s..e]),
            None => Cow::Borrowed(""),
        }
    }

    /// Every capturing group from 1 upward.
    pub fn groups(&self) -> Vec<Option<Cow<'s, str>>> {
        self.spans[1..]
            .iter()
            .map(|span| span.map(|(s, e)| String::from_utf8_lossy(&self.subject[s..e])))
            .collect()
    }

    /// Named groups in definition order. Duplicate names appear once.
    pub fn groupdict(&self) -> Vec<(&str, Option<Cow<'s, str>>)> {
        let mut out: Vec<(&str, Option<Cow<'s, str>>)> = Vec::new();
        for (name, _) in self.program.names().iter() {
            if out.iter().any(|(n, _)| *n == name) {
                continue;
            }
            let text = self.group(name).ok().flatten();
            out.push((name, text));
        }
        out
    }

    /// Highest-numbered group that participated, if any.
    pub fn last_index(&self) -> Option<usize> {
        self.spans
            .iter()
            .rposition(|s| s.is_some())
            .filter(|&i| i > 0)
    }

    /// Name of the group reported by `last_index`.
    pub fn last_group(&self) -> Option<&str> {
        let index = self.last_index()?;
        self.program.names().name_of(index as u32)
    }

    /// Spans in the flat `(start, end)` layout with `-1` for unset groups.
    pub fn raw_spans(&self) -> Vec<(isize, isize)> {
        self.spans
            .iter()
            .map(|span| match span {
                Some((s, e)) => (*s as isize, *e as isize),
                None => (-1, -1),
            })
            .collect()
    }

    /// Start of the search window this match was found in.
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn endpos(&self) -> usize {
        self.endpos
    }

    pub fn subject(&self) -> &'s [u8] {
        self.subject
    }

    /// Fill a brace template: `{0}` is the whole match, `{n}` group n,
    /// `{name}` a named group, `{}` the next group in sequence, `{{` and `}}`
    /// literal braces. Groups that did not participate expand to nothing.
    pub fn expand(&self, template: &str) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(template.len());
        let mut auto = 0usize;
        let mut chars = template.char_indices().peekable();
        while let Some((at, c)) = chars.next() {
            match c {
                '{' => {
                    if chars.next_if(|&(_, c)| c == '{').is_some() {
                        out.push('{');
                        continue;
                    }
                    let mut key = String::new();
                    let mut closed = false;
                    for (_, c) in chars.by_ref() {
                        if c == '}' {
                            closed = true;
                            break;
                        }
                        key.push(c);
                    }
                    if !closed {
                        return Err(TemplateError::UnbalancedBrace(at));
                    }
                    let id = if key.is_empty() {
                        auto += 1;
                        GroupId::Index(auto - 1)
                    } else if key.bytes().all(|b| b.is_ascii_digit()) {
                        match key.parse::<usize>() {
                            Ok(i) => GroupId::Index(i),
                            Err(_) => return Err(IndexError { group: key }.into()),
                        }
                    } else {
                        GroupId::Name(&key)
                    };
                    if let Some(text) = self.group(id)? {
                        out.push_str(&text);
                    }
                }
                '}' => {
                    if chars.next_if(|&(_, c)| c == '}').is_none() {
                        return Err(TemplateError::UnbalancedBrace(at));
                    }
                    out.push('}');
                }
                _ => out.push(c),
            }
        }
        Ok(out)
    }
}
