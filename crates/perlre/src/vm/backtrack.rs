// Backtracking executor
//
// Alternatives are explored depth first with an explicit frame stack, never
// with native recursion. Register writes made while any frame is live are
// recorded in an undo log; backtracking to a frame replays the log down to
// the length it had when the frame was pushed, so abandoned branches never
// leak captures.

use super::input::Input;
use crate::error::{ExecError, LimitKind};
use crate::flags::ExecFlags;
use crate::program::{CharSet, Inst, Item, Look, NONE, Program, RepeatMode};
use crate::regex_limits::MatchLimits;
use crate::unicode;
use std::mem::size_of;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BarrierKind {
    Atomic,
    Look { negate: bool, behind: bool },
}

#[derive(Debug, Clone, Copy)]
enum Frame {
    /// Resume at `pc` with `pos`.
    Retry { pc: usize, pos: usize, undo: usize },
    /// Greedy single-item repeat: give back one character at a time down
    /// to `floor`, resuming at `pc` each time.
    Greedy {
        pc: usize,
        floor: usize,
        pos: usize,
        undo: usize,
    },
    /// Lazy single-item repeat at `pc`: take one more character on backtrack.
    Lazy {
        pc: usize,
        pos: usize,
        count: u32,
        undo: usize,
    },
    /// Start of an atomic group or lookaround body. `pc` is where a
    /// lookaround continues once decided.
    Barrier {
        kind: BarrierKind,
        pos: usize,
        pc: usize,
        undo: usize,
    },
}

type UndoEntry = (usize, usize);

/// Per-call match state.
///
/// `exec` allocates a fresh one; callers running many searches may keep one
/// and pass it to `Regex::exec_with` to reuse its allocations. A scratch is
/// never shared between concurrent calls.
#[derive(Debug, Default)]
pub struct Scratch {
    frames: Vec<Frame>,
    undo: Vec<UndoEntry>,
    regs: Vec<usize>,
}

impl Scratch {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn regs(&self) -> &[usize] {
        &self.regs
    }
}

pub(crate) struct Matcher<'a, 's> {
    prog: &'a Program,
    input: Input<'s>,
    flags: ExecFlags,
    limits: MatchLimits,
    scratch: &'a mut Scratch,
    steps: u64,
    open_base: usize,
    loop_base: usize,
}

impl<'a, 's> Matcher<'a, 's> {
    pub fn new(
        prog: &'a Program,
        input: Input<'s>,
        flags: ExecFlags,
        limits: MatchLimits,
        scratch: &'a mut Scratch,
    ) -> Result<Self, ExecError> {
        let nregs = prog.register_count();
        if nregs.saturating_mul(size_of::<usize>()) > limits.heap_limit {
            return Err(ExecError::ResourceLimitExceeded(LimitKind::Heap));
        }
        scratch.frames.clear();
        scratch.undo.clear();
        scratch.regs.clear();
        scratch
            .regs
            .try_reserve(nregs)
            .map_err(|_| ExecError::OutOfMemory)?;
        scratch.regs.resize(nregs, NONE);
        Ok(Self {
            prog,
            input,
            flags,
            limits,
            scratch,
            steps: 0,
            open_base: prog.open_base(),
            loop_base: prog.loop_base(),
        })
    }

    pub fn regs(&self) -> &[usize] {
        self.scratch.regs()
    }

    /// Try to match with the match starting exactly at `start`.
    pub fn try_at(&mut self, start: usize) -> Result<bool, ExecError> {
        self.scratch.frames.clear();
        self.scratch.undo.clear();
        self.scratch.regs.fill(NONE);

        let prog = self.prog;
        let mut pc = 0usize;
        let mut pos = start;
        loop {
            self.tick(1)?;
            let Some(&inst) = prog.insts.get(pc) else {
                return Err(ExecError::Internal("program counter out of range"));
            };
            let ok = match inst {
                Inst::Match => {
                    let empty_rejected = pos == start
                        && (self.flags.contains(ExecFlags::NOTEMPTY)
                            || (self.flags.contains(ExecFlags::NOTEMPTY_ATSTART)
                                && start == self.input.start()));
                    if !empty_rejected {
                        self.scratch.regs[0] = start;
                        self.scratch.regs[1] = pos;
                        return Ok(true);
                    }
                    false
                }
                Inst::Char(c) => self.consume(&mut pos, |ch| ch == c),
                Inst::Set(s) => {
                    let set = self.set(s)?;
                    self.consume(&mut pos, |ch| set.contains(ch))
                }
                Inst::Any => self.consume(&mut pos, |_| true),
                Inst::AnyNl => self.consume(&mut pos, |ch| ch != '\n'),
                Inst::Repeat {
                    item,
                    min,
                    max,
                    mode,
                } => self.repeat(pc, &mut pos, item, min, max, mode)?,
                Inst::Assert(look) => self.assert(look, pos),
                Inst::Open(g) => {
                    self.set_reg(self.open_base + g as usize, pos)?;
                    true
                }
                Inst::Close(g) => {
                    let g = g as usize;
                    let open = self.reg(self.open_base + g)?;
                    self.set_reg(2 * g, open)?;
                    self.set_reg(2 * g + 1, pos)?;
                    true
                }
                Inst::Split { primary, secondary } => {
                    let undo = self.scratch.undo.len();
                    self.push(Frame::Retry {
                        pc: secondary as usize,
                        pos,
                        undo,
                    })?;
                    pc = primary as usize;
                    continue;
                }
                Inst::Jmp(target) => {
                    pc = target as usize;
                    continue;
                }
                Inst::JmpUnset { group, target } => {
                    let g = group as usize;
                    if self.reg(2 * g)? == NONE || self.reg(2 * g + 1)? == NONE {
                        pc = target as usize;
                        continue;
                    }
                    true
                }
                Inst::Mark(r) => {
                    self.set_reg(self.loop_base + r as usize, pos)?;
                    true
                }
                Inst::LoopCheck { reg, exit } => {
                    if self.reg(self.loop_base + reg as usize)? == pos {
                        pc = exit as usize;
                        continue;
                    }
                    true
                }
                Inst::Backref { group, caseless } => self.backref(&mut pos, group as usize, caseless)?,
                Inst::AtomicStart => {
                    let undo = self.scratch.undo.len();
                    self.push(Frame::Barrier {
                        kind: BarrierKind::Atomic,
                        pos,
                        pc: 0,
                        undo,
                    })?;
                    true
                }
                Inst::AtomicEnd => {
                    let (idx, frame) = self.top_barrier()?;
                    let Frame::Barrier {
                        kind: BarrierKind::Atomic,
                        ..
                    } = frame
                    else {
                        return Err(ExecError::Internal("atomic end inside lookaround"));
                    };
                    self.cut(idx);
                    true
                }
                Inst::LookStart {
                    behind,
                    negate,
                    next,
                } => {
                    let undo = self.scratch.undo.len();
                    self.push(Frame::Barrier {
                        kind: BarrierKind::Look {
                            negate,
                            behind: behind.is_some(),
                        },
                        pos,
                        pc: next as usize,
                        undo,
                    })?;
                    match behind {
                        Some(n) => match self.input.step_back(pos, n) {
                            Some(p) => {
                                pos = p;
                                true
                            }
                            None => false,
                        },
                        None => true,
                    }
                }
                Inst::LookEnd => {
                    let (idx, frame) = self.top_barrier()?;
                    let Frame::Barrier {
                        kind: BarrierKind::Look { negate, behind },
                        pos: look_pos,
                        pc: look_pc,
                        undo,
                    } = frame
                    else {
                        return Err(ExecError::Internal("lookaround end inside atomic group"));
                    };
                    if behind && pos != look_pos {
                        false
                    } else if negate {
                        // Body matched, so the negative assertion fails
                        self.rewind(undo);
                        self.cut(idx);
                        false
                    } else {
                        self.cut(idx);
                        pos = look_pos;
                        pc = look_pc;
                        continue;
                    }
                }
            };

            if ok {
                pc += 1;
            } else {
                match self.backtrack()? {
                    Some((next_pc, next_pos)) => {
                        pc = next_pc;
                        pos = next_pos;
                    }
                    None => return Ok(false),
                }
            }
        }
    }

    fn backtrack(&mut self) -> Result<Option<(usize, usize)>, ExecError> {
        loop {
            self.tick(1)?;
            let Some(frame) = self.scratch.frames.pop() else {
                return Ok(None);
            };
            match frame {
                Frame::Retry { pc, pos, undo } => {
                    self.rewind(undo);
                    return Ok(Some((pc, pos)));
                }
                Frame::Greedy {
                    pc,
                    floor,
                    pos,
                    undo,
                } => {
                    self.rewind(undo);
                    let back = self.input.prev_char(pos).map(|(_, len)| pos - len);
                    let Some(new_pos) = back.filter(|&p| p >= floor) else {
                        return Err(ExecError::Internal("greedy repeat stepped below its floor"));
                    };
                    if new_pos > floor {
                        self.scratch.frames.push(Frame::Greedy {
                            pc,
                            floor,
                            pos: new_pos,
                            undo,
                        });
                    }
                    return Ok(Some((pc, new_pos)));
                }
                Frame::Lazy {
                    pc,
                    pos,
                    count,
                    undo,
                } => {
                    self.rewind(undo);
                    let Some(&Inst::Repeat { item, max, .. }) = self.prog.insts.get(pc) else {
                        return Err(ExecError::Internal("lazy frame without repeat"));
                    };
                    if count < max {
                        if let Some((c, len)) = self.input.next_char(pos) {
                            if self.item_matches(item, c)? {
                                let pos = pos + len;
                                let count = count + 1;
                                if count < max {
                                    self.scratch.frames.push(Frame::Lazy {
                                        pc,
                                        pos,
                                        count,
                                        undo,
                                    });
                                }
                                return Ok(Some((pc + 1, pos)));
                            }
                        }
                    }
                }
                Frame::Barrier {
                    kind, pos, pc, undo, ..
                } => {
                    if let BarrierKind::Look { negate: true, .. } = kind {
                        // Body failed everywhere, so the negative assertion holds
                        self.rewind(undo);
                        return Ok(Some((pc, pos)));
                    }
                }
            }
        }
    }

    // ===== Instructions =====

    #[inline]
    fn consume(&self, pos: &mut usize, pred: impl Fn(char) -> bool) -> bool {
        match self.input.next_char(*pos) {
            Some((c, len)) if pred(c) => {
                *pos += len;
                true
            }
            _ => false,
        }
    }

    #[inline]
    fn set(&self, s: u32) -> Result<&'a CharSet, ExecError> {
        self.prog
            .sets
            .get(s as usize)
            .ok_or(ExecError::Internal("character set index out of range"))
    }

    fn item_matches(&self, item: Item, c: char) -> Result<bool, ExecError> {
        Ok(match item {
            Item::Char(x) => c == x,
            Item::Set(s) => self.set(s)?.contains(c),
            Item::Any => true,
            Item::AnyNl => c != '\n',
        })
    }

    fn repeat(
        &mut self,
        pc: usize,
        pos: &mut usize,
        item: Item,
        min: u32,
        max: u32,
        mode: RepeatMode,
    ) -> Result<bool, ExecError> {
        let set = match item {
            Item::Set(s) => Some(self.set(s)?),
            _ => None,
        };
        let matches = |c: char| match item {
            Item::Char(x) => c == x,
            Item::Set(_) => set.is_some_and(|s| s.contains(c)),
            Item::Any => true,
            Item::AnyNl => c != '\n',
        };

        let mut count = 0u32;
        let mut p = *pos;
        while count < min {
            match self.input.next_char(p) {
                Some((c, len)) if matches(c) => {
                    p += len;
                    count += 1;
                }
                _ => {
                    self.tick(count as u64)?;
                    return Ok(false);
                }
            }
        }
        let floor = p;
        let undo = self.scratch.undo.len();
        if mode == RepeatMode::Lazy {
            if count < max {
                self.push(Frame::Lazy {
                    pc,
                    pos: p,
                    count,
                    undo,
                })?;
            }
        } else {
            while count < max {
                match self.input.next_char(p) {
                    Some((c, len)) if matches(c) => {
                        p += len;
                        count += 1;
                    }
                    _ => break,
                }
            }
            if mode == RepeatMode::Greedy && p > floor {
                self.push(Frame::Greedy {
                    pc: pc + 1,
                    floor,
                    pos: p,
                    undo,
                })?;
            }
        }
        self.tick(count as u64)?;
        *pos = p;
        Ok(true)
    }

    fn assert(&self, look: Look, pos: usize) -> bool {
        let end = self.input.end();
        let bytes = self.input.bytes();
        let newline_at = |p: usize| self.input.byte(p) == Some(b'\n');
        match look {
            Look::StartLine { multiline } => {
                if pos == 0 {
                    !self.flags.contains(ExecFlags::NOTBOL)
                } else {
                    multiline && pos < end && bytes.get(pos - 1) == Some(&b'\n')
                }
            }
            Look::EndLine {
                multiline,
                dollar_endonly,
            } => {
                let noteol = self.flags.contains(ExecFlags::NOTEOL);
                if multiline {
                    if pos < end { newline_at(pos) } else { !noteol }
                } else if noteol {
                    false
                } else {
                    pos == end || (!dollar_endonly && pos + 1 == end && newline_at(pos))
                }
            }
            Look::StartText => pos == 0,
            Look::EndText => pos == end,
            Look::EndTextOptNl => pos == end || (pos + 1 == end && newline_at(pos)),
            Look::StartOffset => pos == self.input.start(),
            Look::WordBoundary { ucp } => self.at_word_boundary(pos, ucp),
            Look::NotWordBoundary { ucp } => !self.at_word_boundary(pos, ucp),
        }
    }

    fn at_word_boundary(&self, pos: usize, ucp: bool) -> bool {
        let before = self
            .input
            .prev_char(pos)
            .is_some_and(|(c, _)| unicode::is_word_char(c, ucp));
        let after = self
            .input
            .next_char(pos)
            .is_some_and(|(c, _)| unicode::is_word_char(c, ucp));
        before != after
    }

    fn backref(&mut self, pos: &mut usize, group: usize, caseless: bool) -> Result<bool, ExecError> {
        let start = self.reg(2 * group)?;
        let end = self.reg(2 * group + 1)?;
        if start == NONE || end == NONE || start > end {
            return Ok(false);
        }
        let bytes = self.input.bytes();
        if !caseless {
            let len = end - start;
            if *pos + len > self.input.end() {
                return Ok(false);
            }
            if bytes.get(start..end) != bytes.get(*pos..*pos + len) {
                return Ok(false);
            }
            self.tick(len as u64)?;
            *pos += len;
            return Ok(true);
        }
        let mut p = *pos;
        let mut q = start;
        while q < end {
            let Some((a, la)) = self.input.next_char(q) else {
                return Ok(false);
            };
            let Some((b, lb)) = self.input.next_char(p) else {
                return Ok(false);
            };
            if a != b && unicode::simple_fold(a) != unicode::simple_fold(b) {
                return Ok(false);
            }
            q += la;
            p += lb;
        }
        self.tick((p - *pos) as u64)?;
        *pos = p;
        Ok(true)
    }

    // ===== State =====

    #[inline]
    fn tick(&mut self, n: u64) -> Result<(), ExecError> {
        self.steps += n;
        if self.steps > self.limits.match_limit {
            return Err(ExecError::ResourceLimitExceeded(LimitKind::Match));
        }
        Ok(())
    }

    fn heap_bytes(&self) -> usize {
        self.scratch.frames.len() * size_of::<Frame>()
            + self.scratch.undo.len() * size_of::<UndoEntry>()
            + self.scratch.regs.len() * size_of::<usize>()
    }

    fn push(&mut self, frame: Frame) -> Result<(), ExecError> {
        if self.scratch.frames.len() >= self.limits.depth_limit {
            return Err(ExecError::ResourceLimitExceeded(LimitKind::Depth));
        }
        if self.heap_bytes() + size_of::<Frame>() > self.limits.heap_limit {
            return Err(ExecError::ResourceLimitExceeded(LimitKind::Heap));
        }
        self.scratch
            .frames
            .try_reserve(1)
            .map_err(|_| ExecError::OutOfMemory)?;
        self.scratch.frames.push(frame);
        Ok(())
    }

    #[inline]
    fn reg(&self, reg: usize) -> Result<usize, ExecError> {
        self.scratch
            .regs
            .get(reg)
            .copied()
            .ok_or(ExecError::Internal("register index out of range"))
    }

    fn set_reg(&mut self, reg: usize, value: usize) -> Result<(), ExecError> {
        let old = self.reg(reg)?;
        if !self.scratch.frames.is_empty() {
            if self.heap_bytes() + size_of::<UndoEntry>() > self.limits.heap_limit {
                return Err(ExecError::ResourceLimitExceeded(LimitKind::Heap));
            }
            self.scratch
                .undo
                .try_reserve(1)
                .map_err(|_| ExecError::OutOfMemory)?;
            self.scratch.undo.push((reg, old));
        }
        self.scratch.regs[reg] = value;
        Ok(())
    }

    fn rewind(&mut self, mark: usize) {
        let scratch = &mut *self.scratch;
        while scratch.undo.len() > mark {
            if let Some((reg, old)) = scratch.undo.pop() {
                if let Some(slot) = scratch.regs.get_mut(reg) {
                    *slot = old;
                }
            }
        }
    }

    fn top_barrier(&self) -> Result<(usize, Frame), ExecError> {
        self.scratch
            .frames
            .iter()
            .rposition(|f| matches!(f, Frame::Barrier { .. }))
            .map(|idx| (idx, self.scratch.frames[idx]))
            .ok_or(ExecError::Internal("unbalanced barrier instruction"))
    }

    /// Drop the barrier at `idx` and every frame above it.
    fn cut(&mut self, idx: usize) {
        self.scratch.frames.truncate(idx);
        if self.scratch.frames.is_empty() {
            self.scratch.undo.clear();
        }
    }
}
