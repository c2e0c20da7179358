// Code generator: syntax tree -> instruction sequence
use super::ast::{BackrefTarget, GroupKind, Node};
use crate::error::{CompileError, CompileErrorKind};
use crate::program::{CharSet, Inst, Item, NameTable, RepeatMode, UNBOUNDED};
use crate::regex_limits::MAX_PROGRAM_LEN;
use ahash::RandomState;
use std::collections::HashMap;

pub struct Generated {
    pub insts: Vec<Inst>,
    pub sets: Vec<CharSet>,
    pub loop_regs: u32,
}

pub struct Codegen<'a> {
    insts: Vec<Inst>,
    sets: Vec<CharSet>,
    set_index: HashMap<CharSet, u32, RandomState>,
    loop_regs: u32,
    names: &'a NameTable,
    group_count: u32,
    /// Offset reported if the program grows too large.
    offset: usize,
}

impl<'a> Codegen<'a> {
    pub fn new(names: &'a NameTable, group_count: u32) -> Self {
        Self {
            insts: Vec::new(),
            sets: Vec::new(),
            set_index: HashMap::default(),
            loop_regs: 0,
            names,
            group_count,
            offset: 0,
        }
    }

    pub fn generate(mut self, node: &Node) -> Result<Generated, CompileError> {
        self.emit(node)?;
        self.push(Inst::Match)?;
        Ok(Generated {
            insts: self.insts,
            sets: self.sets,
            loop_regs: self.loop_regs,
        })
    }

    #[inline]
    fn pc(&self) -> u32 {
        self.insts.len() as u32
    }

    fn push(&mut self, inst: Inst) -> Result<u32, CompileError> {
        if self.insts.len() >= MAX_PROGRAM_LEN {
            return Err(CompileError::new(self.offset, CompileErrorKind::PatternTooLarge));
        }
        let pc = self.pc();
        self.insts.push(inst);
        Ok(pc)
    }

    fn set_id(&mut self, set: &CharSet) -> u32 {
        if let Some(&id) = self.set_index.get(set) {
            return id;
        }
        let id = self.sets.len() as u32;
        self.sets.push(set.clone());
        self.set_index.insert(set.clone(), id);
        id
    }

    /// Single-character item usable by the `Repeat` fast path.
    fn single_item(&mut self, node: &Node) -> Option<Item> {
        match node {
            Node::Literal(c) => Some(Item::Char(*c)),
            Node::Any { dotall: true } => Some(Item::Any),
            Node::Any { dotall: false } => Some(Item::AnyNl),
            Node::Class(set) => Some(Item::Set(self.set_id(set))),
            Node::Group {
                kind: GroupKind::NonCapture,
                node,
            } => self.single_item(node),
            _ => None,
        }
    }

    fn emit(&mut self, node: &Node) -> Result<(), CompileError> {
        match node {
            Node::Empty => {}
            Node::Literal(c) => {
                self.push(Inst::Char(*c))?;
            }
            Node::Any { dotall } => {
                self.push(if *dotall { Inst::Any } else { Inst::AnyNl })?;
            }
            Node::Class(set) => {
                let id = self.set_id(set);
                self.push(Inst::Set(id))?;
            }
            Node::Assert(look) => {
                self.push(Inst::Assert(*look))?;
            }
            Node::Concat(nodes) => {
                for n in nodes {
                    self.emit(n)?;
                }
            }
            Node::Alternate(branches) => {
                let branches: Vec<&Node> = branches.iter().collect();
                self.emit_alternation(&branches, |cg, n| cg.emit(n))?;
            }
            Node::Group { kind, node } => self.emit_group(kind, node)?,
            Node::Repeat {
                node,
                min,
                max,
                mode,
                offset,
            } => {
                self.offset = *offset;
                if let Some(item) = self.single_item(node) {
                    self.push(Inst::Repeat {
                        item,
                        min: *min,
                        max: max.unwrap_or(UNBOUNDED),
                        mode: *mode,
                    })?;
                } else if *mode == RepeatMode::Possessive {
                    self.push(Inst::AtomicStart)?;
                    self.emit_repeat(node, *min, *max, true)?;
                    self.push(Inst::AtomicEnd)?;
                } else {
                    self.emit_repeat(node, *min, *max, *mode == RepeatMode::Greedy)?;
                }
            }
            Node::Backref {
                target,
                caseless,
                offset,
            } => {
                let unknown = || CompileError::new(*offset, CompileErrorKind::UnknownGroup);
                let groups: Vec<u32> = match target {
                    BackrefTarget::Number(n) => {
                        if *n == 0 || *n > self.group_count {
                            return Err(unknown());
                        }
                        vec![*n]
                    }
                    BackrefTarget::Name(name) => {
                        let groups = self.names.indices(name);
                        if groups.is_empty() {
                            return Err(unknown());
                        }
                        groups.to_vec()
                    }
                };
                self.emit_backref(&groups, *caseless)?;
            }
        }
        Ok(())
    }

    /// Backreference to the first of `groups` that is set. Only that group
    /// is compared; an unset last group fails like any unset reference.
    fn emit_backref(&mut self, groups: &[u32], caseless: bool) -> Result<(), CompileError> {
        let Some((&last, rest)) = groups.split_last() else {
            return Ok(());
        };
        let mut jumps = Vec::with_capacity(rest.len());
        for &group in rest {
            let check = self.push(Inst::JmpUnset { group, target: 0 })?;
            self.push(Inst::Backref { group, caseless })?;
            jumps.push(self.push(Inst::Jmp(0))?);
            let next = self.pc();
            self.insts[check as usize] = Inst::JmpUnset { group, target: next };
        }
        self.push(Inst::Backref {
            group: last,
            caseless,
        })?;
        let end = self.pc();
        for j in jumps {
            self.insts[j as usize] = Inst::Jmp(end);
        }
        Ok(())
    }

    /// `Split`/`Jmp` chain trying each branch in order.
    fn emit_alternation<T>(
        &mut self,
        branches: &[T],
        mut emit: impl FnMut(&mut Self, &T) -> Result<(), CompileError>,
    ) -> Result<(), CompileError> {
        let Some((last, rest)) = branches.split_last() else {
            return Ok(());
        };
        let mut jumps = Vec::with_capacity(rest.len());
        for branch in rest {
            let split = self.push(Inst::Split {
                primary: 0,
                secondary: 0,
            })?;
            emit(self, branch)?;
            jumps.push(self.push(Inst::Jmp(0))?);
            let next = self.pc();
            self.insts[split as usize] = Inst::Split {
                primary: split + 1,
                secondary: next,
            };
        }
        emit(self, last)?;
        let end = self.pc();
        for j in jumps {
            self.insts[j as usize] = Inst::Jmp(end);
        }
        Ok(())
    }

    fn emit_group(&mut self, kind: &GroupKind, node: &Node) -> Result<(), CompileError> {
        match kind {
            GroupKind::Capture(g) => {
                self.push(Inst::Open(*g))?;
                self.emit(node)?;
                self.push(Inst::Close(*g))?;
            }
            GroupKind::NonCapture => self.emit(node)?,
            GroupKind::Atomic => {
                self.push(Inst::AtomicStart)?;
                self.emit(node)?;
                self.push(Inst::AtomicEnd)?;
            }
            GroupKind::LookAhead { negate } => self.emit_look(node, None, *negate)?,
            GroupKind::LookBehind { negate, offset } => {
                let branches: Vec<&Node> = match node {
                    Node::Alternate(branches) => branches.iter().collect(),
                    other => vec![other],
                };
                let mut lens = Vec::with_capacity(branches.len());
                for branch in &branches {
                    let len = branch.fixed_len().ok_or_else(|| {
                        CompileError::new(*offset, CompileErrorKind::VariableLookbehind)
                    })?;
                    lens.push(len);
                }
                let negate = *negate;
                if lens.iter().all(|&l| l == lens[0]) {
                    self.emit_look(node, Some(lens[0]), negate)?;
                } else if negate {
                    // None of the branches may match
                    for (branch, len) in branches.iter().zip(&lens) {
                        self.emit_look(branch, Some(*len), true)?;
                    }
                } else {
                    // Any one branch may match
                    let pairs: Vec<(&Node, u32)> =
                        branches.iter().copied().zip(lens.iter().copied()).collect();
                    self.emit_alternation(&pairs, |cg, &(branch, len)| {
                        cg.emit_look(branch, Some(len), false)
                    })?;
                }
            }
        }
        Ok(())
    }

    fn emit_look(&mut self, node: &Node, behind: Option<u32>, negate: bool) -> Result<(), CompileError> {
        let start = self.push(Inst::LookStart {
            behind,
            negate,
            next: 0,
        })?;
        self.emit(node)?;
        self.push(Inst::LookEnd)?;
        let next = self.pc();
        self.insts[start as usize] = Inst::LookStart {
            behind,
            negate,
            next,
        };
        Ok(())
    }

    /// General repeat: `min` mandatory copies, then either a loop or
    /// `max - min` optional copies.
    fn emit_repeat(
        &mut self,
        node: &Node,
        min: u32,
        max: Option<u32>,
        greedy: bool,
    ) -> Result<(), CompileError> {
        for _ in 0..min {
            self.emit(node)?;
        }
        let split = |body: u32, exit: u32| {
            if greedy {
                Inst::Split {
                    primary: body,
                    secondary: exit,
                }
            } else {
                Inst::Split {
                    primary: exit,
                    secondary: body,
                }
            }
        };
        match max {
            None => {
                // Bodies that can match empty need a progress check
                let reg = node.can_be_empty().then(|| {
                    self.loop_regs += 1;
                    self.loop_regs - 1
                });
                let head = self.push(split(0, 0))?;
                if let Some(r) = reg {
                    self.push(Inst::Mark(r))?;
                }
                self.emit(node)?;
                let check = match reg {
                    Some(r) => Some((self.push(Inst::LoopCheck { reg: r, exit: 0 })?, r)),
                    None => None,
                };
                self.push(Inst::Jmp(head))?;
                let exit = self.pc();
                self.insts[head as usize] = split(head + 1, exit);
                if let Some((at, r)) = check {
                    self.insts[at as usize] = Inst::LoopCheck { reg: r, exit };
                }
            }
            Some(max) => {
                let mut splits = Vec::with_capacity(max.saturating_sub(min) as usize);
                for _ in min..max {
                    splits.push(self.push(split(0, 0))?);
                    self.emit(node)?;
                }
                let end = self.pc();
                for at in splits {
                    self.insts[at as usize] = split(at + 1, end);
                }
            }
        }
        Ok(())
    }
}
