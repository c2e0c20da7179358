use mimalloc::MiMalloc;
use perlre::{CompileFlags, MatchLimits, MatchResult, Regex};
use std::env;
use std::fs;
use std::io::{self, BufRead, BufWriter, Write};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const VERSION: &str = perlre::VERSION;

fn print_usage() {
    eprintln!("usage: perlre [options] PATTERN [file ...]");
    eprintln!("Available options are:");
    eprintln!("  -i              caseless matching");
    eprintln!("  -m              multiline mode");
    eprintln!("  -s              dot matches newline");
    eprintln!("  -x              extended mode (ignore whitespace and comments)");
    eprintln!("  -u              Unicode classes (UCP)");
    eprintln!("  -U              ungreedy quantifiers");
    eprintln!("  -o              print only the matched parts");
    eprintln!("  -c              print only a count of matching lines");
    eprintln!("  -n              prefix output with line numbers");
    eprintln!("  --json          print every match as a JSON record");
    eprintln!("  --study         study the pattern before matching");
    eprintln!("  --match-limit N stop a search after N steps");
    eprintln!("  --load FILE     read a serialized program instead of PATTERN");
    eprintln!("  -v              show version information");
    eprintln!("  --              stop handling options");
}

fn print_version() {
    let features = perlre::features();
    println!(
        "perlre {} (program format {}, study: {})",
        VERSION, features.format_version, features.study
    );
}

#[derive(Default)]
struct Options {
    flags: CompileFlags,
    only_matching: bool,
    count: bool,
    line_numbers: bool,
    json: bool,
    study: bool,
    match_limit: Option<u64>,
    load: Option<String>,
    show_version: bool,
    pattern: Option<String>,
    files: Vec<String>,
}

fn parse_args() -> Result<Options, String> {
    let mut opts = Options::default();
    let mut args = env::args().skip(1);
    let mut options_done = false;
    let mut positional = Vec::new();

    while let Some(arg) = args.next() {
        if options_done || !arg.starts_with('-') || arg == "-" {
            positional.push(arg);
            continue;
        }
        match arg.as_str() {
            "--" => options_done = true,
            "-i" => opts.flags |= CompileFlags::CASELESS,
            "-m" => opts.flags |= CompileFlags::MULTILINE,
            "-s" => opts.flags |= CompileFlags::DOTALL,
            "-x" => opts.flags |= CompileFlags::EXTENDED,
            "-u" => opts.flags |= CompileFlags::UCP,
            "-U" => opts.flags |= CompileFlags::UNGREEDY,
            "-o" => opts.only_matching = true,
            "-c" => opts.count = true,
            "-n" => opts.line_numbers = true,
            "-v" => opts.show_version = true,
            "--json" => opts.json = true,
            "--study" => opts.study = true,
            "--match-limit" => {
                let value = args.next().ok_or("'--match-limit' needs argument")?;
                let limit = value
                    .parse::<u64>()
                    .map_err(|_| format!("invalid match limit '{}'", value))?;
                opts.match_limit = Some(limit);
            }
            "--load" => {
                opts.load = Some(args.next().ok_or("'--load' needs argument")?);
            }
            _ => return Err(format!("unrecognized option '{}'", arg)),
        }
    }

    let mut positional = positional.into_iter();
    if opts.load.is_none() {
        opts.pattern = positional.next();
    }
    opts.files = positional.collect();
    Ok(opts)
}

fn build_regex(opts: &Options) -> Result<Regex, String> {
    let regex = match (&opts.load, &opts.pattern) {
        (Some(path), _) => {
            let bytes = fs::read(path).map_err(|e| format!("cannot read {}: {}", path, e))?;
            Regex::deserialize(&bytes).map_err(|e| format!("{}: {}", path, e))?
        }
        (None, Some(pattern)) => Regex::with_flags(pattern, opts.flags).map_err(|e| {
            format!("compilation failed at offset {}: {}", e.offset, e.message())
        })?,
        (None, None) => return Err("no pattern given".to_string()),
    };
    let regex = match opts.match_limit {
        Some(limit) => regex.with_limits(MatchLimits::default().with_match_limit(limit)),
        None => regex,
    };
    Ok(if opts.study { regex.study() } else { regex })
}

struct Grep<'a, W: Write> {
    regex: &'a Regex,
    opts: &'a Options,
    out: W,
    matched_lines: u64,
}

impl<W: Write> Grep<'_, W> {
    fn write_prefix(&mut self, name: Option<&str>, line_no: u64) -> io::Result<()> {
        if let Some(name) = name {
            self.out.write_all(name.as_bytes())?;
            self.out.write_all(b":")?;
        }
        if self.opts.line_numbers {
            let mut buf = itoa::Buffer::new();
            self.out.write_all(buf.format(line_no).as_bytes())?;
            self.out.write_all(b":")?;
        }
        Ok(())
    }

    fn write_json(&mut self, m: &MatchResult<'_>) -> Result<(), String> {
        let json = perlre::serde::match_to_json_string(m, false)?;
        writeln!(self.out, "{}", json).map_err(|e| e.to_string())
    }

    fn process_line(&mut self, name: Option<&str>, line_no: u64, line: &str) -> Result<(), String> {
        if self.opts.only_matching || self.opts.json {
            let mut any = false;
            for m in self.regex.find_iter(line) {
                let m = m.map_err(|e| e.to_string())?;
                any = true;
                if self.opts.count {
                    break;
                }
                if self.opts.json {
                    self.write_json(&m)?;
                } else {
                    self.write_prefix(name, line_no).map_err(|e| e.to_string())?;
                    writeln!(self.out, "{}", m.as_str()).map_err(|e| e.to_string())?;
                }
            }
            if any {
                self.matched_lines += 1;
            }
            return Ok(());
        }

        if self.regex.is_match(line).map_err(|e| e.to_string())? {
            self.matched_lines += 1;
            if !self.opts.count {
                self.write_prefix(name, line_no).map_err(|e| e.to_string())?;
                writeln!(self.out, "{}", line).map_err(|e| e.to_string())?;
            }
        }
        Ok(())
    }

    fn process_reader(&mut self, name: Option<&str>, reader: impl BufRead) -> Result<(), String> {
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| e.to_string())?;
            self.process_line(name, idx as u64 + 1, &line)?;
        }
        Ok(())
    }
}

fn run(opts: &Options) -> Result<bool, String> {
    let regex = build_regex(opts)?;
    log::debug!(
        "running /{}/ with {} groups over {} input(s)",
        regex.as_str(),
        regex.group_count(),
        opts.files.len().max(1)
    );

    let stdout = io::stdout();
    let mut grep = Grep {
        regex: &regex,
        opts,
        out: BufWriter::new(stdout.lock()),
        matched_lines: 0,
    };

    if opts.files.is_empty() {
        let stdin = io::stdin();
        grep.process_reader(None, stdin.lock())?;
    } else {
        let show_names = opts.files.len() > 1;
        for path in &opts.files {
            let content = fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path, e))?;
            let name = show_names.then_some(path.as_str());
            grep.process_reader(name, content.as_bytes())?;
        }
    }

    if opts.count {
        let mut buf = itoa::Buffer::new();
        writeln!(grep.out, "{}", buf.format(grep.matched_lines)).map_err(|e| e.to_string())?;
    }
    grep.out.flush().map_err(|e| e.to_string())?;
    Ok(grep.matched_lines > 0)
}

fn main() {
    env_logger::init();

    let opts = match parse_args() {
        Ok(opts) => opts,
        Err(e) => {
            eprintln!("perlre: {}", e);
            print_usage();
            std::process::exit(2);
        }
    };

    if opts.show_version {
        print_version();
        if opts.pattern.is_none() && opts.load.is_none() {
            std::process::exit(0);
        }
    }

    match run(&opts) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("perlre: {}", e);
            if opts.pattern.is_none() && opts.load.is_none() {
                print_usage();
            }
            std::process::exit(2);
        }
    }
}
