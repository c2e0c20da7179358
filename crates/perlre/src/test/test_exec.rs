// Tests for matching semantics
use super::{find, find_with, spans};
use crate::*;

#[test]
fn test_named_groups_scenario() {
    let s = spans(r"(?P<word>\w+)\s+(?P<num>\d+)", "hello 123").unwrap();
    assert_eq!(s, vec![Some((0, 9)), Some((0, 5)), Some((6, 9))]);

    let re = Regex::new(r"(?P<word>\w+)\s+(?P<num>\d+)").unwrap();
    let m = re.search("hello 123").unwrap().unwrap();
    assert_eq!(m.group("word").unwrap().as_deref(), Some("hello"));
    assert_eq!(m.span("num").unwrap(), Some((6, 9)));
}

#[test]
fn test_counted_repeat_scenario() {
    assert_eq!(find("a{2,4}", "aaaaa"), Some((0, 4)));
    assert_eq!(find("a{2}", "a"), None);
    assert_eq!(find("a{2,}", "baaaa"), Some((1, 5)));
    assert_eq!(find("a{0}b", "ab"), Some((1, 2)));
}

#[test]
fn test_caseless_scenario() {
    assert_eq!(find("(?i)ABC", "xxabcxx"), Some((2, 5)));
    assert_eq!(find_with("abc", CompileFlags::CASELESS, "xABC"), Some((1, 4)));
    assert_eq!(find("(?i)é", "É"), Some((0, 2)));
    assert_eq!(find("a(?i)b", "aB"), Some((0, 2)));
    assert_eq!(find("a(?i)b", "AB"), None);
    assert_eq!(find("(?i:a)b", "Ab"), Some((0, 2)));
    assert_eq!(find("(?i:a)b", "AB"), None);
}

#[test]
fn test_leftmost_first() {
    let s = spans("(a|ab)(c|bcd)(d*)", "abcd").unwrap();
    assert_eq!(s, vec![Some((0, 4)), Some((0, 1)), Some((1, 4)), Some((4, 4))]);
    assert_eq!(find("b|ab", "ab"), Some((0, 2)));
    assert_eq!(find("x*", "ab"), Some((0, 0)));
}

#[test]
fn test_greedy_lazy_possessive() {
    assert_eq!(find("a+", "aaa"), Some((0, 3)));
    assert_eq!(find("a+?", "aaa"), Some((0, 1)));
    assert_eq!(find("a*?b", "aaab"), Some((0, 4)));
    assert_eq!(find("a++a", "aaa"), None);
    assert_eq!(find("a?+a", "a"), None);
    assert_eq!(find("(?:ab)++ab", "ababab"), None);
    assert_eq!(find("<.+>", "<a><b>"), Some((0, 6)));
    assert_eq!(find("<.+?>", "<a><b>"), Some((0, 3)));
    assert_eq!(find_with("a+", CompileFlags::UNGREEDY, "aaa"), Some((0, 1)));
    assert_eq!(find_with("a+?", CompileFlags::UNGREEDY, "aaa"), Some((0, 3)));
}

#[test]
fn test_group_repeats() {
    let s = spans("(ab){2}", "ababab").unwrap();
    assert_eq!(s, vec![Some((0, 4)), Some((2, 4))]);
    let s = spans("(a|b)*c", "abac").unwrap();
    assert_eq!(s, vec![Some((0, 4)), Some((2, 3))]);
    let s = spans("(a|b)*?b", "aab").unwrap();
    assert_eq!(s, vec![Some((0, 3)), Some((1, 2))]);
    assert_eq!(find("(?:a|bc){2,3}d", "abcbcad"), Some((1, 7)));
}

#[test]
fn test_empty_loops_terminate() {
    assert_eq!(find("(a*)*", "aaa"), Some((0, 3)));
    assert_eq!(find("(a*)+b", "aab"), Some((0, 3)));
    assert_eq!(find("(?:a?)*?b", "aab"), Some((0, 3)));
    assert_eq!(find("(?:|a)*b", "aab"), Some((0, 3)));
    assert_eq!(find("(a*?)*x", "aax"), Some((0, 3)));
}

#[test]
fn test_capture_rollback() {
    let s = spans("(?:(a)x|ay)", "ay").unwrap();
    assert_eq!(s, vec![Some((0, 2)), None]);
    let s = spans("(a)?b", "b").unwrap();
    assert_eq!(s, vec![Some((0, 1)), None]);
    let s = spans("(?:(a)|b)+", "ab").unwrap();
    assert_eq!(s, vec![Some((0, 2)), Some((0, 1))]);
}

#[test]
fn test_atomic_groups() {
    assert_eq!(find("(?>a+)a", "aaa"), None);
    assert_eq!(find("(?>a|ab)c", "abc"), None);
    assert_eq!(find("(?>ab|a)c", "abc"), Some((0, 3)));
    let s = spans("(?>(a+))b", "aab").unwrap();
    assert_eq!(s, vec![Some((0, 3)), Some((0, 2))]);
}

#[test]
fn test_backreferences() {
    assert_eq!(find(r"(\w)\1", "abccd"), Some((2, 4)));
    assert_eq!(find(r"(?i)(a)\1", "aA"), Some((0, 2)));
    assert_eq!(find(r"(a)\1", "aA"), None);
    assert_eq!(find(r"(?P<x>a)(?P=x)", "aa"), Some((0, 2)));
    assert_eq!(find(r"(?<x>b)\k<x>", "abb"), Some((1, 3)));
    assert_eq!(find(r"(a)\g{-1}", "aa"), Some((0, 2)));
    assert_eq!(find(r"(a)?\1", "b"), None);
    assert_eq!(find(r"(a|b)\1+", "abbb"), Some((1, 4)));
}

#[test]
fn test_duplicate_name_backreference() {
    let re = Regex::with_flags(r"(?:(?<c>a)|(?<c>b))\k<c>", CompileFlags::DUPNAMES).unwrap();
    assert_eq!(re.search("bb").unwrap().unwrap().span(0).unwrap(), Some((0, 2)));
    assert_eq!(re.search("aa").unwrap().unwrap().span(0).unwrap(), Some((0, 2)));
    assert!(re.search("ab").unwrap().is_none());
}

#[test]
fn test_duplicate_name_uses_first_set_group() {
    // Group 1 is set at offset 0, so the reference must match "a" there
    let re = Regex::with_flags(r"(?<n>a)?(?<n>b)?\k<n>", CompileFlags::DUPNAMES).unwrap();
    assert_eq!(re.search("abb").unwrap().unwrap().span(0).unwrap(), Some((1, 3)));
    assert_eq!(re.search("aba").unwrap().unwrap().span(0).unwrap(), Some((0, 3)));
    assert!(re.search("ab").unwrap().is_none());

    let insts = re.program().instructions();
    assert!(insts.iter().any(|i| matches!(i, Inst::JmpUnset { group: 1, .. })));
}

#[test]
fn test_anchors() {
    assert_eq!(find("^b", "ab"), None);
    assert_eq!(find("(?m)^b", "a\nb"), Some((2, 3)));
    assert_eq!(find("(?m)^", "a\n"), Some((0, 0)));
    assert_eq!(find("(?m)a$", "a\nb"), Some((0, 1)));
    assert_eq!(find("a$", "a\n"), Some((0, 1)));
    assert_eq!(find("a$", "a\nb"), None);
    assert_eq!(find_with("a$", CompileFlags::DOLLAR_ENDONLY, "a\n"), None);
    assert_eq!(find(r"a\z", "a\n"), None);
    assert_eq!(find(r"a\Z", "a\n"), Some((0, 1)));
    assert_eq!(find(r"\Ab", "ab"), None);
}

#[test]
fn test_ucp_word_boundary_agrees_with_word_class() {
    // U+0345 is alphabetic but not a letter or number, so it is not \w
    let text = "a\u{345}";
    assert_eq!(find_with(r"\w+", CompileFlags::UCP, text), Some((0, 1)));
    assert_eq!(find_with(r"a\b", CompileFlags::UCP, text), Some((0, 1)));
    assert_eq!(find_with(r"a\B", CompileFlags::UCP, text), None);
    assert_eq!(find_with(r"\bé\b", CompileFlags::UCP, "x é y"), Some((2, 4)));
}

#[test]
fn test_dot_and_newlines() {
    assert_eq!(find("a.b", "a\nb"), None);
    assert_eq!(find("(?s)a.b", "a\nb"), Some((0, 3)));
    assert_eq!(find_with("a.b", CompileFlags::DOTALL, "a\nb"), Some((0, 3)));
    assert_eq!(find(r"a\Nb", "a\nb"), None);
    assert_eq!(find(r"\R", "a\r\nb"), Some((1, 3)));
}

#[test]
fn test_word_boundaries() {
    assert_eq!(find(r"\bfoo\b", "a foo."), Some((2, 5)));
    assert_eq!(find(r"\bfoo\b", "afoo"), None);
    assert_eq!(find(r"\Bo", "foo"), Some((1, 2)));
    assert_eq!(find(r"\b", ""), None);
}

#[test]
fn test_classes() {
    assert_eq!(find("[^a-c]", "abcd"), Some((3, 4)));
    assert_eq!(find("[[:digit:]]+", "ab123"), Some((2, 5)));
    assert_eq!(find("[[:^alpha:]]", "ab1"), Some((2, 3)));
    assert_eq!(find(r"\d+", "x42"), Some((1, 3)));
    assert_eq!(find(r"\s", "a\tb"), Some((1, 2)));
    assert_eq!(find(r"\h+", "a \t\nb"), Some((1, 3)));
    assert_eq!(find(r"\QA.B\E+", "AxB A.BBB"), Some((4, 9)));
}

#[test]
fn test_unicode() {
    assert_eq!(find(r"\w+", "héllo"), Some((0, 1)));
    assert_eq!(find_with(r"\w+", CompileFlags::UCP, "héllo"), Some((0, 6)));
    assert_eq!(find(r"\p{Greek}+", "abc αβγ"), Some((4, 10)));
    assert_eq!(find(r"\P{L}", "aé1"), Some((3, 4)));
    assert_eq!(find("...", "a😀b"), Some((0, 6)));
    assert_eq!(find(r"\x{1F600}", "a😀b"), Some((1, 5)));
}

#[test]
fn test_extended_and_no_auto_capture() {
    assert_eq!(find("(?x) a b # comment\n c", "abc"), Some((0, 3)));
    assert_eq!(find_with("a[ ]b", CompileFlags::EXTENDED, "a b"), Some((0, 3)));
    let re = Regex::with_flags("(a)(?<n>b)", CompileFlags::NO_AUTO_CAPTURE).unwrap();
    assert_eq!(re.group_count(), 1);
    assert_eq!(re.search("ab").unwrap().unwrap().span("n").unwrap(), Some((1, 2)));
}

#[test]
fn test_exec_flags() {
    let re = Regex::new("^a").unwrap();
    assert!(re.exec("a", 0, 1, ExecFlags::NOTBOL).unwrap().is_none());
    let re = Regex::new("a$").unwrap();
    assert!(re.exec("a", 0, 1, ExecFlags::NOTEOL).unwrap().is_none());

    let re = Regex::new("a*").unwrap();
    assert!(re.exec("bbb", 0, 3, ExecFlags::NOTEMPTY).unwrap().is_none());
    let m = re.exec("baa", 0, 3, ExecFlags::NOTEMPTY).unwrap().unwrap();
    assert_eq!(m.span(0).unwrap(), Some((1, 3)));
    let m = re.exec("baa", 0, 3, ExecFlags::NOTEMPTY_ATSTART).unwrap().unwrap();
    assert_eq!(m.span(0).unwrap(), Some((1, 3)));

    let re = Regex::new("b").unwrap();
    assert!(re.exec("ab", 0, 2, ExecFlags::ANCHORED).unwrap().is_none());
    assert_eq!(
        re.exec_bytes(b"ab", 1, 2, ExecFlags::ANCHORED).unwrap().unwrap().span(0).unwrap(),
        Some((1, 2))
    );
}

#[test]
fn test_start_offset_context() {
    let re = Regex::new(r"\Gb").unwrap();
    assert!(re.search("ab").unwrap().is_none());
    assert!(re.exec("ab", 1, 2, ExecFlags::empty()).unwrap().is_some());

    let re = Regex::new(r"\bb").unwrap();
    assert!(re.exec("ab", 1, 2, ExecFlags::empty()).unwrap().is_none());

    let re = Regex::new("^b").unwrap();
    assert!(re.exec("ab", 1, 2, ExecFlags::empty()).unwrap().is_none());

    // Nothing past the window end is visible
    let re = Regex::new("a$").unwrap();
    assert!(re.exec("ab", 0, 1, ExecFlags::empty()).unwrap().is_some());
    let re = Regex::new("ab").unwrap();
    assert!(re.exec("ab", 0, 1, ExecFlags::empty()).unwrap().is_none());
    let re = Regex::new(r"a\b").unwrap();
    assert!(re.exec("ab", 0, 1, ExecFlags::empty()).unwrap().is_some());
}

#[test]
fn test_utf_checking() {
    let re = Regex::with_flags("a", CompileFlags::UTF).unwrap();
    assert_eq!(
        re.exec_bytes(b"a\xffa", 0, 3, ExecFlags::empty()).unwrap_err(),
        ExecError::BadUtf { offset: 1 }
    );
    let m = re.exec_bytes(b"a\xffa", 0, 3, ExecFlags::NO_UTF_CHECK).unwrap().unwrap();
    assert_eq!(m.span(0).unwrap(), Some((0, 1)));

    let re = Regex::new("b").unwrap();
    let m = re.exec_bytes(b"\xffb", 0, 2, ExecFlags::empty()).unwrap().unwrap();
    assert_eq!(m.span(0).unwrap(), Some((1, 2)));
    assert_eq!(
        re.exec_bytes("éb".as_bytes(), 1, 3, ExecFlags::empty()).unwrap_err(),
        ExecError::BadOffset { offset: 1 }
    );
}

#[test]
fn test_resume_after_stray_bytes() {
    let re = Regex::new(".").unwrap();
    let subject = b"\xe2\x80";
    let mut pos = 0;
    let mut found = Vec::new();
    while let Some(m) = re.exec_bytes(subject, pos, subject.len(), ExecFlags::empty()).unwrap() {
        let (start, end) = m.span(0).unwrap().unwrap();
        found.push((start, end));
        pos = end;
    }
    assert_eq!(found, vec![(0, 1), (1, 2)]);

    // A well-formed character still cannot be split
    assert_eq!(
        re.exec_bytes("é".as_bytes(), 1, 2, ExecFlags::empty()).unwrap_err(),
        ExecError::BadOffset { offset: 1 }
    );
}

#[test]
fn test_implicitly_anchored_pattern() {
    let re = Regex::new("^abc|^x").unwrap();
    assert!(re.program().flags().contains(CompileFlags::ANCHORED));
    assert!(re.search("zabc").unwrap().is_none());
    assert!(re.search("x").unwrap().is_some());
}

#[test]
fn test_empty_window_at_subject_end() {
    let text = "abc";
    let re = Regex::new("x*").unwrap();
    let m = re.exec(text, 3, 3, ExecFlags::empty()).unwrap().unwrap();
    assert_eq!(m.span(0).unwrap(), Some((3, 3)));

    let re = Regex::new("x+|c").unwrap();
    assert!(re.exec(text, 3, 3, ExecFlags::empty()).unwrap().is_none());
    assert!(re.exec(text, 2, 1, ExecFlags::empty()).unwrap().is_none());
}
