// Program serializer/deserializer
// Flat little-endian binary format; every index is validated on load.
//
// Layout: magic, version byte, then u32 fields: requested flags, effective
// flags, group count, name table, source, character sets, loop register
// count and instructions (one tag byte plus operands each).
//
// Serialized programs may come from untrusted storage. Loading checks every
// declared count against the bytes that remain before allocating, and the
// decoded program passes `Program::validate` before it can be executed.

use super::{CharSet, Inst, Item, Look, NameTable, Program, RepeatMode};
use crate::error::FormatError;
use crate::flags::CompileFlags;
use smol_str::SmolStr;
use std::io::{Cursor, Read};

const PERLRE_MAGIC: &[u8] = b"\x1bPRE";
/// Version byte written after the magic.
pub const FORMAT_VERSION: u8 = 1;

const TAG_MATCH: u8 = 0;
const TAG_CHAR: u8 = 1;
const TAG_SET: u8 = 2;
const TAG_ANY: u8 = 3;
const TAG_ANY_NL: u8 = 4;
const TAG_REPEAT: u8 = 5;
const TAG_ASSERT: u8 = 6;
const TAG_OPEN: u8 = 7;
const TAG_CLOSE: u8 = 8;
const TAG_SPLIT: u8 = 9;
const TAG_JMP: u8 = 10;
const TAG_MARK: u8 = 11;
const TAG_LOOP_CHECK: u8 = 12;
const TAG_BACKREF: u8 = 13;
const TAG_ATOMIC_START: u8 = 14;
const TAG_ATOMIC_END: u8 = 15;
const TAG_LOOK_START: u8 = 16;
const TAG_LOOK_END: u8 = 17;
const TAG_JMP_UNSET: u8 = 18;

/// Serialize a program to the binary format.
pub fn serialize_program(program: &Program) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + program.insts.len() * 6 + program.source.len());

    // Write header
    buf.extend_from_slice(PERLRE_MAGIC);
    buf.push(FORMAT_VERSION);

    write_u32(&mut buf, program.requested_flags.bits());
    write_u32(&mut buf, program.effective_flags.bits());
    write_u32(&mut buf, program.group_count);

    write_u32(&mut buf, program.names.len() as u32);
    for (name, group) in program.names.iter() {
        write_str(&mut buf, name);
        write_u32(&mut buf, group);
    }

    write_str(&mut buf, &program.source);

    write_u32(&mut buf, program.sets.len() as u32);
    for set in &program.sets {
        write_u32(&mut buf, set.ranges().len() as u32);
        for &(lo, hi) in set.ranges() {
            write_u32(&mut buf, lo as u32);
            write_u32(&mut buf, hi as u32);
        }
    }

    write_u32(&mut buf, program.loop_regs);

    write_u32(&mut buf, program.insts.len() as u32);
    for inst in &program.insts {
        write_inst(&mut buf, inst);
    }

    buf
}

/// Deserialize and validate a program.
pub fn deserialize_program(data: &[u8]) -> Result<Program, FormatError> {
    read_program(data).inspect_err(|e| log::warn!("rejected serialized program: {}", e))
}

fn read_program(data: &[u8]) -> Result<Program, FormatError> {
    let mut cursor = Cursor::new(data);

    // Verify magic number
    let mut magic = [0u8; 4];
    cursor.read_exact(&mut magic).map_err(|_| FormatError::BadMagic)?;
    if magic != PERLRE_MAGIC {
        return Err(FormatError::BadMagic);
    }

    let version = read_u8(&mut cursor)?;
    if version != FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }

    let requested_flags = read_flags(&mut cursor)?;
    let effective_flags = read_flags(&mut cursor)?;
    let group_count = read_u32(&mut cursor)?;

    // Each name costs at least its length prefix and group index
    let name_count = read_count(&mut cursor, 8)?;
    let mut names = NameTable::new();
    for _ in 0..name_count {
        let name = read_string(&mut cursor)?;
        let group = read_u32(&mut cursor)?;
        names.insert(SmolStr::new(name), group);
    }

    let source = read_string(&mut cursor)?;

    let set_count = read_count(&mut cursor, 4)?;
    let mut sets = Vec::with_capacity(set_count);
    for _ in 0..set_count {
        let range_count = read_count(&mut cursor, 8)?;
        let mut ranges = Vec::with_capacity(range_count);
        for _ in 0..range_count {
            let lo = read_char(&mut cursor)?;
            let hi = read_char(&mut cursor)?;
            ranges.push((lo, hi));
        }
        let set = CharSet::from_ranges(ranges)
            .ok_or(FormatError::Invalid("character set ranges out of order"))?;
        sets.push(set);
    }

    let loop_regs = read_u32(&mut cursor)?;

    let inst_count = read_count(&mut cursor, 1)?;
    let mut insts = Vec::with_capacity(inst_count);
    for _ in 0..inst_count {
        insts.push(read_inst(&mut cursor)?);
    }

    if remaining(&cursor) != 0 {
        return Err(FormatError::TrailingBytes);
    }

    let program = Program {
        source,
        insts,
        sets,
        group_count,
        names,
        requested_flags,
        effective_flags,
        loop_regs,
    };
    program.validate()?;
    Ok(program)
}

// ===== Instructions =====

fn write_inst(buf: &mut Vec<u8>, inst: &Inst) {
    match *inst {
        Inst::Match => buf.push(TAG_MATCH),
        Inst::Char(c) => {
            buf.push(TAG_CHAR);
            write_u32(buf, c as u32);
        }
        Inst::Set(s) => {
            buf.push(TAG_SET);
            write_u32(buf, s);
        }
        Inst::Any => buf.push(TAG_ANY),
        Inst::AnyNl => buf.push(TAG_ANY_NL),
        Inst::Repeat {
            item,
            min,
            max,
            mode,
        } => {
            buf.push(TAG_REPEAT);
            let (kind, payload) = match item {
                Item::Char(c) => (0u8, c as u32),
                Item::Set(s) => (1, s),
                Item::Any => (2, 0),
                Item::AnyNl => (3, 0),
            };
            buf.push(kind);
            write_u32(buf, payload);
            write_u32(buf, min);
            write_u32(buf, max);
            buf.push(match mode {
                RepeatMode::Greedy => 0,
                RepeatMode::Lazy => 1,
                RepeatMode::Possessive => 2,
            });
        }
        Inst::Assert(look) => {
            buf.push(TAG_ASSERT);
            let (kind, bits) = match look {
                Look::StartLine { multiline } => (0u8, multiline as u8),
                Look::EndLine {
                    multiline,
                    dollar_endonly,
                } => (1, multiline as u8 | (dollar_endonly as u8) << 1),
                Look::StartText => (2, 0),
                Look::EndText => (3, 0),
                Look::EndTextOptNl => (4, 0),
                Look::StartOffset => (5, 0),
                Look::WordBoundary { ucp } => (6, ucp as u8),
                Look::NotWordBoundary { ucp } => (7, ucp as u8),
            };
            buf.push(kind);
            buf.push(bits);
        }
        Inst::Open(g) => {
            buf.push(TAG_OPEN);
            write_u32(buf, g);
        }
        Inst::Close(g) => {
            buf.push(TAG_CLOSE);
            write_u32(buf, g);
        }
        Inst::Split { primary, secondary } => {
            buf.push(TAG_SPLIT);
            write_u32(buf, primary);
            write_u32(buf, secondary);
        }
        Inst::Jmp(t) => {
            buf.push(TAG_JMP);
            write_u32(buf, t);
        }
        Inst::Mark(r) => {
            buf.push(TAG_MARK);
            write_u32(buf, r);
        }
        Inst::LoopCheck { reg, exit } => {
            buf.push(TAG_LOOP_CHECK);
            write_u32(buf, reg);
            write_u32(buf, exit);
        }
        Inst::Backref { group, caseless } => {
            buf.push(TAG_BACKREF);
            write_u32(buf, group);
            buf.push(caseless as u8);
        }
        Inst::JmpUnset { group, target } => {
            buf.push(TAG_JMP_UNSET);
            write_u32(buf, group);
            write_u32(buf, target);
        }
        Inst::AtomicStart => buf.push(TAG_ATOMIC_START),
        Inst::AtomicEnd => buf.push(TAG_ATOMIC_END),
        Inst::LookStart {
            behind,
            negate,
            next,
        } => {
            buf.push(TAG_LOOK_START);
            buf.push(negate as u8 | (behind.is_some() as u8) << 1);
            write_u32(buf, behind.unwrap_or(0));
            write_u32(buf, next);
        }
        Inst::LookEnd => buf.push(TAG_LOOK_END),
    }
}

fn read_inst(cursor: &mut Cursor<&[u8]>) -> Result<Inst, FormatError> {
    let tag = read_u8(cursor)?;
    let inst = match tag {
        TAG_MATCH => Inst::Match,
        TAG_CHAR => Inst::Char(read_char(cursor)?),
        TAG_SET => Inst::Set(read_u32(cursor)?),
        TAG_ANY => Inst::Any,
        TAG_ANY_NL => Inst::AnyNl,
        TAG_REPEAT => {
            let kind = read_u8(cursor)?;
            let payload = read_u32(cursor)?;
            let item = match kind {
                0 => Item::Char(
                    char::from_u32(payload).ok_or(FormatError::Invalid("invalid code point"))?,
                ),
                1 => Item::Set(payload),
                2 => Item::Any,
                3 => Item::AnyNl,
                _ => return Err(FormatError::Invalid("unknown repeat item")),
            };
            let min = read_u32(cursor)?;
            let max = read_u32(cursor)?;
            let mode = match read_u8(cursor)? {
                0 => RepeatMode::Greedy,
                1 => RepeatMode::Lazy,
                2 => RepeatMode::Possessive,
                _ => return Err(FormatError::Invalid("unknown repeat mode")),
            };
            Inst::Repeat {
                item,
                min,
                max,
                mode,
            }
        }
        TAG_ASSERT => {
            let kind = read_u8(cursor)?;
            let bits = read_u8(cursor)?;
            if bits > 3 {
                return Err(FormatError::Invalid("unknown assertion bits"));
            }
            let first = bits & 1 != 0;
            let look = match kind {
                0 => Look::StartLine { multiline: first },
                1 => Look::EndLine {
                    multiline: first,
                    dollar_endonly: bits & 2 != 0,
                },
                2 => Look::StartText,
                3 => Look::EndText,
                4 => Look::EndTextOptNl,
                5 => Look::StartOffset,
                6 => Look::WordBoundary { ucp: first },
                7 => Look::NotWordBoundary { ucp: first },
                _ => return Err(FormatError::Invalid("unknown assertion")),
            };
            Inst::Assert(look)
        }
        TAG_OPEN => Inst::Open(read_u32(cursor)?),
        TAG_CLOSE => Inst::Close(read_u32(cursor)?),
        TAG_SPLIT => Inst::Split {
            primary: read_u32(cursor)?,
            secondary: read_u32(cursor)?,
        },
        TAG_JMP => Inst::Jmp(read_u32(cursor)?),
        TAG_MARK => Inst::Mark(read_u32(cursor)?),
        TAG_LOOP_CHECK => Inst::LoopCheck {
            reg: read_u32(cursor)?,
            exit: read_u32(cursor)?,
        },
        TAG_BACKREF => Inst::Backref {
            group: read_u32(cursor)?,
            caseless: read_bool(cursor)?,
        },
        TAG_JMP_UNSET => Inst::JmpUnset {
            group: read_u32(cursor)?,
            target: read_u32(cursor)?,
        },
        TAG_ATOMIC_START => Inst::AtomicStart,
        TAG_ATOMIC_END => Inst::AtomicEnd,
        TAG_LOOK_START => {
            let bits = read_u8(cursor)?;
            if bits > 3 {
                return Err(FormatError::Invalid("unknown lookaround bits"));
            }
            let len = read_u32(cursor)?;
            let next = read_u32(cursor)?;
            Inst::LookStart {
                behind: (bits & 2 != 0).then_some(len),
                negate: bits & 1 != 0,
                next,
            }
        }
        TAG_LOOK_END => Inst::LookEnd,
        _ => return Err(FormatError::Invalid("unknown instruction tag")),
    };
    Ok(inst)
}

// ===== Primitives =====

fn write_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    write_u32(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

fn remaining(cursor: &Cursor<&[u8]>) -> usize {
    let len = cursor.get_ref().len() as u64;
    len.saturating_sub(cursor.position()) as usize
}

fn read_u8(cursor: &mut Cursor<&[u8]>) -> Result<u8, FormatError> {
    let mut b = [0u8; 1];
    cursor.read_exact(&mut b).map_err(|_| FormatError::Truncated)?;
    Ok(b[0])
}

fn read_u32(cursor: &mut Cursor<&[u8]>) -> Result<u32, FormatError> {
    let mut b = [0u8; 4];
    cursor.read_exact(&mut b).map_err(|_| FormatError::Truncated)?;
    Ok(u32::from_le_bytes(b))
}

fn read_bool(cursor: &mut Cursor<&[u8]>) -> Result<bool, FormatError> {
    match read_u8(cursor)? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(FormatError::Invalid("bad boolean")),
    }
}

fn read_char(cursor: &mut Cursor<&[u8]>) -> Result<char, FormatError> {
    char::from_u32(read_u32(cursor)?).ok_or(FormatError::Invalid("invalid code point"))
}

fn read_flags(cursor: &mut Cursor<&[u8]>) -> Result<CompileFlags, FormatError> {
    CompileFlags::from_bits(read_u32(cursor)?).ok_or(FormatError::Invalid("unknown flag bits"))
}

/// Read an element count and make sure the remaining input could hold that
/// many elements of at least `min_size` bytes each.
fn read_count(cursor: &mut Cursor<&[u8]>, min_size: usize) -> Result<usize, FormatError> {
    let count = read_u32(cursor)? as usize;
    if count.saturating_mul(min_size) > remaining(cursor) {
        return Err(FormatError::Truncated);
    }
    Ok(count)
}

fn read_string(cursor: &mut Cursor<&[u8]>) -> Result<String, FormatError> {
    let len = read_count(cursor, 1)?;
    let mut bytes = vec![0u8; len];
    cursor
        .read_exact(&mut bytes)
        .map_err(|_| FormatError::Truncated)?;
    String::from_utf8(bytes).map_err(|_| FormatError::Invalid("string is not UTF-8"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(pattern: &str) -> Program {
        Program::compile(pattern, CompileFlags::empty()).unwrap()
    }

    #[test]
    fn test_header() {
        let bytes = serialize_program(&program("a+"));
        assert_eq!(&bytes[..4], PERLRE_MAGIC);
        assert_eq!(bytes[4], FORMAT_VERSION);
    }

    #[test]
    fn test_roundtrip_structure() {
        let p = program(r"(?P<word>\w+)(?=x)|[^a-c]{2,5}?\1(?<!q)");
        let back = deserialize_program(&serialize_program(&p)).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_rejects_bad_version() {
        let mut bytes = serialize_program(&program("a"));
        bytes[4] = 99;
        assert_eq!(
            deserialize_program(&bytes),
            Err(FormatError::UnsupportedVersion(99))
        );
    }

    #[test]
    fn test_rejects_huge_counts() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(PERLRE_MAGIC);
        bytes.push(FORMAT_VERSION);
        write_u32(&mut bytes, 0);
        write_u32(&mut bytes, 0);
        write_u32(&mut bytes, 0);
        write_u32(&mut bytes, u32::MAX);
        assert_eq!(deserialize_program(&bytes), Err(FormatError::Truncated));
    }
}
