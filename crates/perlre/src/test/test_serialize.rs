// Tests for the binary program format
use crate::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub(crate) const CORPUS: &[&str] = &[
    r"(?P<word>\w+)\s+(?P<num>\d+)",
    r"a{2,4}",
    r"(?i)abc|é+",
    r"^(a|b)*?c$",
    r"(?m)^\s*#.*$",
    r"(?<=ab|c)x(?!y)",
    r"(?>a+)b|(a)\1",
    r"[^\W\d]+\b",
    r"(?s).+?(?=\n|$)",
    r"(?:a*)*b",
    r"\p{Greek}+|[[:punct:]]",
    r"x(?:yz){2,}+",
];

pub(crate) fn random_subject(rng: &mut StdRng, max_len: usize) -> String {
    const ALPHABET: &[char] = &['a', 'b', 'c', 'x', 'y', '1', ' ', '\n', '#', 'é', 'α', '.'];
    let len = rng.gen_range(0..=max_len);
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())])
        .collect()
}

fn all_spans(re: &Regex, text: &str) -> Vec<Vec<(isize, isize)>> {
    re.find_iter(text).map(|m| m.unwrap().raw_spans()).collect()
}

#[test]
fn test_round_trip_matches_identically() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for pattern in CORPUS {
        let original = Regex::new(pattern).unwrap();
        let bytes = original.serialize();
        let restored = Regex::deserialize(&bytes).unwrap();
        assert_eq!(original.program(), restored.program(), "{pattern}");
        assert_eq!(restored.serialize(), bytes);
        for _ in 0..50 {
            let text = random_subject(&mut rng, 24);
            assert_eq!(all_spans(&original, &text), all_spans(&restored, &text), "{pattern} on {text:?}");
        }
    }
}

#[test]
fn test_free_function_round_trip() {
    let re = compile("(?P<k>a+)", CompileFlags::CASELESS).unwrap();
    let restored = deserialize(&serialize(&re)).unwrap();
    assert_eq!(restored.program().names().first("k"), Some(1));
    assert!(restored.program().requested_flags().contains(CompileFlags::CASELESS));
    assert!(restored.is_match("AA").unwrap());
}

#[test]
fn test_header_errors() {
    let bytes = Regex::new("abc").unwrap().serialize();
    assert_eq!(Regex::deserialize(b"").unwrap_err(), FormatError::BadMagic);
    assert_eq!(Regex::deserialize(b"\x1bPRE").unwrap_err(), FormatError::Truncated);
    assert_eq!(Regex::deserialize(b"PCRE\x01").unwrap_err(), FormatError::BadMagic);

    let mut newer = bytes.clone();
    newer[4] = 99;
    assert_eq!(Regex::deserialize(&newer).unwrap_err(), FormatError::UnsupportedVersion(99));

    let mut trailing = bytes.clone();
    trailing.push(0);
    assert_eq!(Regex::deserialize(&trailing).unwrap_err(), FormatError::TrailingBytes);
}

#[test]
fn test_truncated_input_never_panics() {
    for pattern in CORPUS {
        let bytes = Regex::new(pattern).unwrap().serialize();
        for len in 0..bytes.len() {
            assert!(Regex::deserialize(&bytes[..len]).is_err(), "{pattern} cut at {len}");
        }
    }
}

#[test]
fn test_corrupted_input_never_panics() {
    let mut rng = StdRng::seed_from_u64(42);
    let limits = MatchLimits::default().with_match_limit(20_000);
    for pattern in CORPUS {
        let bytes = Regex::new(pattern).unwrap().serialize();
        for _ in 0..200 {
            let mut corrupted = bytes.clone();
            for _ in 0..rng.gen_range(1..4) {
                let at = rng.gen_range(0..corrupted.len());
                corrupted[at] = rng.gen_range(0..=255u8);
            }
            // Anything that validates must also run without panicking
            if let Ok(re) = Regex::deserialize(&corrupted) {
                let re = re.with_limits(limits);
                let text = random_subject(&mut rng, 16);
                let _ = re.search(&text);
                let _ = re.exec_bytes(b"\xffab\xc3", 0, 4, ExecFlags::NO_UTF_CHECK);
            }
        }
    }

    for _ in 0..500 {
        let len = rng.gen_range(0..64);
        let mut noise: Vec<u8> = (0..len).map(|_| rng.gen_range(0..=255u8)).collect();
        if rng.gen_bool(0.5) && noise.len() >= 5 {
            noise[..5].copy_from_slice(b"\x1bPRE\x01");
        }
        let _ = Regex::deserialize(&noise);
    }
}
