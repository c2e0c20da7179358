use perlre::program::inst::{Item, Look, RepeatMode, UNBOUNDED};
use perlre::{CompileFlags, Inst, Program, Regex};
use std::env;
use std::fs;

fn main() {
    env_logger::init();
    let args: Vec<String> = env::args().collect();

    let mut pattern = None;
    let mut load = None;
    let mut save = None;
    let mut flags = CompileFlags::empty();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--load" if i + 1 < args.len() => {
                load = Some(args[i + 1].clone());
                i += 1;
            }
            "--save" if i + 1 < args.len() => {
                save = Some(args[i + 1].clone());
                i += 1;
            }
            "-i" => flags |= CompileFlags::CASELESS,
            "-m" => flags |= CompileFlags::MULTILINE,
            "-s" => flags |= CompileFlags::DOTALL,
            "-x" => flags |= CompileFlags::EXTENDED,
            other => pattern = Some(other.to_string()),
        }
        i += 1;
    }

    let regex = match (load, pattern) {
        (Some(path), _) => {
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    eprintln!("Error reading file '{}': {}", path, e);
                    std::process::exit(1);
                }
            };
            println!("=== File: {} ({} bytes) ===\n", path, bytes.len());
            match Regex::deserialize(&bytes) {
                Ok(regex) => regex,
                Err(e) => {
                    eprintln!("Invalid program: {}", e);
                    std::process::exit(1);
                }
            }
        }
        (None, Some(pattern)) => match Regex::with_flags(&pattern, flags) {
            Ok(regex) => regex,
            Err(e) => {
                eprintln!("Compilation error at offset {}: {}", e.offset, e.message());
                std::process::exit(1);
            }
        },
        (None, None) => {
            println!("Usage: program_dump [-i] [-m] [-s] [-x] [--save FILE] <pattern>");
            println!("       program_dump --load FILE");
            std::process::exit(0);
        }
    };

    dump_program(regex.program());
    println!();
    println!("study: {}", perlre::study(&regex));

    if let Some(path) = save {
        let bytes = regex.serialize();
        if let Err(e) = fs::write(&path, &bytes) {
            eprintln!("Error writing file '{}': {}", path, e);
            std::process::exit(1);
        }
        println!("saved {} bytes to {}", bytes.len(), path);
    }
}

fn dump_program(program: &Program) {
    println!("=== /{}/ ===", program.source());
    println!(
        "groups: {}, loop registers: {}, flags: {:#x} (effective {:#x})",
        program.group_count(),
        program.loop_regs(),
        program.requested_flags().bits(),
        program.flags().bits()
    );
    println!();

    for (pc, inst) in program.instructions().iter().enumerate() {
        let detail = match *inst {
            Inst::Match => "MATCH".to_string(),
            Inst::Char(c) => format!("CHAR {:?}", c),
            Inst::Set(s) => format!("SET {}", s),
            Inst::Any => "ANY".to_string(),
            Inst::AnyNl => "ANYNL".to_string(),
            Inst::Repeat { item, min, max, mode } => {
                let max = if max == UNBOUNDED {
                    "inf".to_string()
                } else {
                    max.to_string()
                };
                let mode = match mode {
                    RepeatMode::Greedy => "",
                    RepeatMode::Lazy => "?",
                    RepeatMode::Possessive => "+",
                };
                format!("REPEAT {} {{{},{}}}{}", item_name(item), min, max, mode)
            }
            Inst::Assert(look) => format!("ASSERT {}", look_name(look)),
            Inst::Open(n) => format!("OPEN {}", n),
            Inst::Close(n) => format!("CLOSE {}", n),
            Inst::Split { primary, secondary } => format!("SPLIT {} {}", primary, secondary),
            Inst::Jmp(to) => format!("JMP {}", to),
            Inst::Mark(reg) => format!("MARK {}", reg),
            Inst::LoopCheck { reg, exit } => format!("LOOPCHECK {} {}", reg, exit),
            Inst::Backref { group, caseless } => {
                let i_str = if caseless { "i" } else { "" };
                format!("BACKREF {}{}", group, i_str)
            }
            Inst::JmpUnset { group, target } => format!("JMPUNSET {} {}", group, target),
            Inst::AtomicStart => "ATOMIC".to_string(),
            Inst::AtomicEnd => "ATOMICEND".to_string(),
            Inst::LookStart { behind, negate, next } => {
                let kind = match (behind.is_some(), negate) {
                    (false, false) => "AHEAD",
                    (false, true) => "NAHEAD",
                    (true, false) => "BEHIND",
                    (true, true) => "NBEHIND",
                };
                match behind {
                    Some(len) => format!("LOOK{} {} {}", kind, len, next),
                    None => format!("LOOK{} {}", kind, next),
                }
            }
            Inst::LookEnd => "LOOKEND".to_string(),
        };
        println!("  {:4}  {}", pc, detail);
    }

    if !program.sets().is_empty() {
        println!();
        println!("sets ({}):", program.sets().len());
        for (idx, set) in program.sets().iter().enumerate() {
            println!("  {:4}  {}", idx, set);
        }
    }

    if !program.names().is_empty() {
        println!();
        println!("names ({}):", program.names().len());
        for (name, group) in program.names().iter() {
            println!("  {:>4}  {}", group, name);
        }
    }
}

fn item_name(item: Item) -> String {
    match item {
        Item::Char(c) => format!("{:?}", c),
        Item::Set(s) => format!("set {}", s),
        Item::Any => "any".to_string(),
        Item::AnyNl => "anynl".to_string(),
    }
}

fn look_name(look: Look) -> &'static str {
    match look {
        Look::StartLine { multiline: true } => "^ (multiline)",
        Look::StartLine { multiline: false } => "^",
        Look::EndLine { multiline: true, .. } => "$ (multiline)",
        Look::EndLine { dollar_endonly: true, .. } => "$ (endonly)",
        Look::EndLine { .. } => "$",
        Look::StartText => "\\A",
        Look::EndText => "\\z",
        Look::EndTextOptNl => "\\Z",
        Look::StartOffset => "\\G",
        Look::WordBoundary { .. } => "\\b",
        Look::NotWordBoundary { .. } => "\\B",
    }
}
