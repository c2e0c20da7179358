// Tests for study: results never change, only the work done
use super::test_serialize::{CORPUS, random_subject};
use crate::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn matches(re: &Regex, text: &str) -> Vec<Vec<(isize, isize)>> {
    re.find_iter(text).map(|m| m.unwrap().raw_spans()).collect()
}

#[test]
fn test_study_invariance() {
    let mut rng = StdRng::seed_from_u64(7);
    let extra = ["xy+", "(?i)ÉA", "[0-9]{2}", "a|b|c", "(?=a)ab", r"\bcat\b", "é.α"];
    for pattern in CORPUS.iter().chain(extra.iter()) {
        let plain = Regex::new(pattern).unwrap();
        let studied = plain.clone().study();
        assert!(studied.study_info().is_some());
        for _ in 0..80 {
            let text = random_subject(&mut rng, 20);
            assert_eq!(matches(&plain, &text), matches(&studied, &text), "{pattern} on {text:?}");
        }
    }
}

#[test]
fn test_study_after_deserialize() {
    let re = Regex::new("(foo|bar)+baz").unwrap();
    let restored = Regex::deserialize(&re.serialize()).unwrap().study();
    let info = restored.study_info().unwrap();
    assert_eq!(info.min_length, 6);
    assert!(info.first_set.is_some_and(|f| f.contains('f') && f.contains('b') && !f.contains('z')));
    assert_eq!(study(&re), *info);
    assert!(restored.is_match("xxbarfoobaz").unwrap());
}

#[test]
fn test_study_respects_window() {
    let re = Regex::new("abc").unwrap().study();
    assert!(re.exec("xxabc", 0, 4, ExecFlags::empty()).unwrap().is_none());
    assert!(re.exec("xxabc", 2, 5, ExecFlags::empty()).unwrap().is_some());
}
