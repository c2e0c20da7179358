// Matching engine
// Search loop, offset checking and capture extraction around the
// backtracking executor.
pub mod backtrack;
pub(crate) mod input;
pub mod match_result;

use crate::error::ExecError;
use crate::flags::{CompileFlags, ExecFlags};
use crate::program::{NONE, Program};
use crate::regex_limits::MatchLimits;
use crate::study::StudyInfo;
use backtrack::Matcher;
use input::{Input, is_char_boundary};

pub use backtrack::Scratch;
pub use match_result::{GroupId, MatchResult};

/// Group spans of one match, index 0 being the whole match.
pub(crate) type Spans = Vec<Option<(usize, usize)>>;

/// Search `subject[start..end]` for the leftmost match of `prog`.
///
/// `start > end` or `end` past the subject is no match. When the program was
/// compiled with `UTF` and the caller did not pass `NO_UTF_CHECK`, the
/// subject must be valid UTF-8. Offsets inside a well-formed multibyte
/// character are rejected; any offset a previous match reported is accepted.
#[allow(clippy::too_many_arguments)]
pub(crate) fn search(
    prog: &Program,
    study: Option<&StudyInfo>,
    subject: &[u8],
    start: usize,
    end: usize,
    flags: ExecFlags,
    limits: MatchLimits,
    scratch: &mut Scratch,
) -> Result<Option<Spans>, ExecError> {
    if start > end || end > subject.len() {
        return Ok(None);
    }
    if prog.flags().contains(CompileFlags::UTF) && !flags.contains(ExecFlags::NO_UTF_CHECK) {
        if let Err(err) = std::str::from_utf8(subject) {
            return Err(ExecError::BadUtf {
                offset: err.valid_up_to(),
            });
        }
    }
    for offset in [start, end] {
        if !is_char_boundary(subject, offset) {
            return Err(ExecError::BadOffset { offset });
        }
    }

    let anchored = flags.contains(ExecFlags::ANCHORED) || prog.flags().contains(CompileFlags::ANCHORED);
    let input = Input::new(subject, start, end);
    let mut matcher = Matcher::new(prog, input, flags, limits, scratch)?;
    let mut pos = start;
    loop {
        let mut viable = true;
        if let Some(info) = study {
            if end - pos < info.min_length {
                break;
            }
            if let Some(first) = &info.first_set {
                viable = input.next_char(pos).is_some_and(|(c, _)| first.contains(c));
            }
        }
        if viable {
            log::trace!("trying start position {}", pos);
            match matcher.try_at(pos) {
                Ok(true) => return Ok(Some(spans(prog, matcher.regs()))),
                Ok(false) => {}
                Err(err) => {
                    log::debug!("exec of {:?} aborted at {}: {}", prog.source(), pos, err);
                    return Err(err);
                }
            }
        }
        if anchored {
            break;
        }
        match input.next_char(pos) {
            Some((_, len)) => pos += len,
            None => break,
        }
    }
    Ok(None)
}

fn spans(prog: &Program, regs: &[usize]) -> Spans {
    regs[..prog.capture_slots()]
        .chunks_exact(2)
        .map(|pair| match (pair[0], pair[1]) {
            (s, e) if s != NONE && e != NONE && s <= e => Some((s, e)),
            _ => None,
        })
        .collect()
}
