// Pattern compiler
// Pattern text -> syntax tree -> instruction sequence.
pub mod ast;
pub mod codegen;
pub mod parser;

use crate::error::CompileError;
use crate::flags::CompileFlags;
use crate::program::{NameTable, Program};
use codegen::Codegen;
use parser::{MODE_FLAGS, Parser};

/// Compile a pattern into a program.
pub fn compile(source: &str, flags: CompileFlags) -> Result<Program, CompileError> {
    let parsed = Parser::new(source, flags).parse()?;

    let mut names = NameTable::new();
    for def in &parsed.names {
        names.insert(def.name.clone(), def.group);
    }

    let mut effective_flags = (flags - MODE_FLAGS) | parsed.leading_mode;
    if parsed.node.is_anchored() {
        effective_flags |= CompileFlags::ANCHORED;
    }

    let generated = Codegen::new(&names, parsed.group_count).generate(&parsed.node)?;
    log::debug!(
        "compiled {:?}: {} instructions, {} sets, {} groups",
        source,
        generated.insts.len(),
        generated.sets.len(),
        parsed.group_count
    );

    Ok(Program {
        source: source.to_owned(),
        insts: generated.insts,
        sets: generated.sets,
        group_count: parsed.group_count,
        names,
        requested_flags: flags,
        effective_flags,
        loop_regs: generated.loop_regs,
    })
}
