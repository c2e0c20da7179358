// Subject access for the matcher
//
// The subject is read as UTF-8. A byte that does not start a valid sequence
// decodes as U+FFFD of length 1, so unchecked subjects never panic and
// forward and backward stepping agree on character boundaries.

#[derive(Clone, Copy)]
pub(crate) struct Input<'s> {
    bytes: &'s [u8],
    /// Window end; nothing at or after it is read.
    end: usize,
    /// Start offset of the exec call (`\G`).
    start: usize,
}

#[inline]
fn utf8_len(lead: u8) -> usize {
    match lead {
        0x00..=0x7F => 1,
        0xC2..=0xDF => 2,
        0xE0..=0xEF => 3,
        0xF0..=0xF4 => 4,
        _ => 0,
    }
}

#[inline]
fn decode(bytes: &[u8]) -> Option<char> {
    std::str::from_utf8(bytes).ok()?.chars().next()
}

/// Whether `offset` starts a character the way the matcher steps through
/// `bytes`. Only an offset inside a well-formed multibyte sequence is not a
/// boundary; a stray continuation byte counts as a character of its own.
pub(crate) fn is_char_boundary(bytes: &[u8], offset: usize) -> bool {
    match bytes.get(offset) {
        None => offset == bytes.len(),
        Some(&b) if b & 0xC0 != 0x80 => true,
        Some(_) => {
            let floor = offset.saturating_sub(3);
            (floor..offset).rev().find(|&at| bytes[at] & 0xC0 != 0x80).is_none_or(|at| {
                let len = utf8_len(bytes[at]);
                at + len <= offset || bytes.get(at..at + len).and_then(decode).is_none()
            })
        }
    }
}

impl<'s> Input<'s> {
    pub fn new(bytes: &'s [u8], start: usize, end: usize) -> Self {
        Self { bytes, end, start }
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    #[inline]
    pub fn byte(&self, pos: usize) -> Option<u8> {
        if pos < self.end {
            self.bytes.get(pos).copied()
        } else {
            None
        }
    }

    pub fn bytes(&self) -> &'s [u8] {
        self.bytes
    }

    /// Character starting at `pos` and its length, if it ends inside the window.
    #[inline]
    pub fn next_char(&self, pos: usize) -> Option<(char, usize)> {
        let lead = self.byte(pos)?;
        if lead < 0x80 {
            return Some((lead as char, 1));
        }
        let len = utf8_len(lead);
        if len > 1 && pos + len <= self.end {
            if let Some(c) = decode(&self.bytes[pos..pos + len]) {
                return Some((c, len));
            }
        }
        Some((char::REPLACEMENT_CHARACTER, 1))
    }

    /// Character ending at `pos`. May look before the exec start offset.
    #[inline]
    pub fn prev_char(&self, pos: usize) -> Option<(char, usize)> {
        if pos == 0 || pos > self.bytes.len() {
            return None;
        }
        let last = self.bytes[pos - 1];
        if last < 0x80 {
            return Some((last as char, 1));
        }
        let floor = pos.saturating_sub(4);
        let mut at = pos - 1;
        loop {
            let b = self.bytes[at];
            if b & 0xC0 != 0x80 {
                if utf8_len(b) == pos - at {
                    if let Some(c) = decode(&self.bytes[at..pos]) {
                        return Some((c, pos - at));
                    }
                }
                break;
            }
            if at == floor {
                break;
            }
            at -= 1;
        }
        Some((char::REPLACEMENT_CHARACTER, 1))
    }

    /// Position `n` characters before `pos`, or `None` at the subject start.
    pub fn step_back(&self, mut pos: usize, n: u32) -> Option<usize> {
        for _ in 0..n {
            let (_, len) = self.prev_char(pos)?;
            pos -= len;
        }
        Some(pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_and_backward_agree() {
        let text = "aé€😀b".as_bytes();
        let input = Input::new(text, 0, text.len());
        let mut forward = vec![0];
        let mut pos = 0;
        while let Some((_, len)) = input.next_char(pos) {
            pos += len;
            forward.push(pos);
        }
        let mut backward = vec![text.len()];
        let mut pos = text.len();
        while let Some((_, len)) = input.prev_char(pos) {
            pos -= len;
            backward.push(pos);
        }
        backward.reverse();
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_invalid_bytes() {
        let bytes = b"a\xE2\x82b\xFF";
        let input = Input::new(bytes, 0, bytes.len());
        assert_eq!(input.next_char(1), Some((char::REPLACEMENT_CHARACTER, 1)));
        assert_eq!(input.next_char(2), Some((char::REPLACEMENT_CHARACTER, 1)));
        assert_eq!(input.prev_char(3), Some((char::REPLACEMENT_CHARACTER, 1)));
        assert_eq!(input.prev_char(5), Some((char::REPLACEMENT_CHARACTER, 1)));
    }

    #[test]
    fn test_char_boundaries() {
        let text = "aé".as_bytes();
        assert!(is_char_boundary(text, 0));
        assert!(is_char_boundary(text, 1));
        assert!(!is_char_boundary(text, 2));
        assert!(is_char_boundary(text, 3));
        assert!(!is_char_boundary(text, 4));

        // Truncated sequences decode one byte at a time
        let bytes = b"\xe2\x80";
        assert!(is_char_boundary(bytes, 1));
        assert!(is_char_boundary(bytes, 2));
        assert!(is_char_boundary(b"\x80\x80a", 1));
    }

    #[test]
    fn test_window_end() {
        let text = "héllo".as_bytes();
        let input = Input::new(text, 0, 2);
        // The two-byte 'é' straddles the window end
        assert_eq!(input.next_char(1), Some((char::REPLACEMENT_CHARACTER, 1)));
        assert_eq!(input.next_char(2), None);
        assert_eq!(input.step_back(3, 2), Some(0));
        assert_eq!(input.step_back(1, 2), None);
    }
}
