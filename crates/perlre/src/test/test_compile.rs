// Tests for pattern compilation and compile errors
use crate::*;

fn error(pattern: &str) -> CompileError {
    match Regex::new(pattern) {
        Ok(_) => panic!("{pattern} compiled"),
        Err(e) => e,
    }
}

#[test]
fn test_unclosed_group_scenario() {
    let err = error("a(b");
    assert_eq!(err.offset, 1);
    assert_eq!(err.kind, CompileErrorKind::UnclosedGroup);
    assert_eq!(err.message(), "missing )");
}

#[test]
fn test_error_offsets_count_characters() {
    assert_eq!(error("éé(").offset, 2);
    assert_eq!(error("日本[a").offset, 2);
    assert_eq!(error("ü{3,2}").kind, CompileErrorKind::QuantifierOrder);
}

#[test]
fn test_quantifier_overflow() {
    let err = error("a{65536}");
    assert!(err.is_quantifier_overflow());
    assert!(Regex::new("a{65535}").is_ok());
    assert!(!error("a{2,1}").is_quantifier_overflow());
}

#[test]
fn test_structural_limits() {
    let deep = format!("{}a{}", "(".repeat(251), ")".repeat(251));
    assert_eq!(error(&deep).kind, CompileErrorKind::NestingTooDeep);
    let ok = format!("{}a{}", "(?:".repeat(250), ")".repeat(250));
    assert!(Regex::new(&ok).is_ok());

    let many = "()".repeat(65536);
    assert_eq!(error(&many).kind, CompileErrorKind::TooManyGroups);

    assert_eq!(
        error("(?:(?:ab){1000}){1100}").kind,
        CompileErrorKind::PatternTooLarge
    );
}

#[test]
fn test_group_reference_errors() {
    assert_eq!(error(r"(a)\2").kind, CompileErrorKind::UnknownGroup);
    assert_eq!(error(r"(?P=nope)").kind, CompileErrorKind::UnknownGroup);
    assert!(Regex::new(r"\1(a)").is_ok());
}

#[test]
fn test_name_table() {
    let re = Regex::new("(?P<year>\\d{4})-(?P<month>\\d\\d)").unwrap();
    let names = re.program().names();
    assert_eq!(names.len(), 2);
    assert_eq!(names.first("month"), Some(2));
    assert_eq!(names.name_of(1), Some("year"));
    assert_eq!(names.iter().collect::<Vec<_>>(), vec![("year", 1), ("month", 2)]);

    let re = Regex::with_flags("(?<x>a)|(?<x>b)", CompileFlags::DUPNAMES).unwrap();
    assert_eq!(re.program().names().indices("x"), &[1, 2]);
}

#[test]
fn test_flags_recorded() {
    let re = Regex::with_flags("(?s)a", CompileFlags::MULTILINE).unwrap();
    let program = re.program();
    assert_eq!(program.requested_flags(), CompileFlags::MULTILINE);
    assert!(program.flags().contains(CompileFlags::DOTALL | CompileFlags::MULTILINE));
    assert_eq!(program.source(), "(?s)a");
}

#[test]
fn test_unsupported_constructs_are_errors() {
    for pattern in ["(?R)", "(?(1)a|b)", "(*SKIP)", "\\X", "a\\K"] {
        let err = error(pattern);
        assert!(matches!(err.kind, CompileErrorKind::Unsupported(_)), "{pattern}");
    }
}

#[test]
fn test_compile_is_deterministic() {
    for pattern in [r"(\w+)@(\w+)\.com", "(?i)[a-zé]+", "(?<=x)y|z{2,5}?"] {
        let a = Regex::new(pattern).unwrap();
        let b = Regex::new(pattern).unwrap();
        assert_eq!(a.program(), b.program());
        assert_eq!(a.serialize(), b.serialize());
    }
}
