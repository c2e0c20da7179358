use crate::error::CompileError;
use crate::flags::CompileFlags;
use crate::regex::Regex;
use ahash::RandomState;
use std::collections::HashMap;

/// Compiled-pattern cache keyed by pattern text and flags.
///
/// Lookups hand out clones sharing one program. When the cache is full it is
/// emptied wholesale before the next insert.
pub struct RegexCache {
    map: HashMap<(String, CompileFlags), Regex, RandomState>,
    capacity: usize,
}

impl RegexCache {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity_and_hasher(capacity.min(256), RandomState::new()),
            capacity: capacity.max(1),
        }
    }

    /// Return the cached regex for `pattern`, compiling it on a miss.
    /// Compile errors are not cached.
    pub fn get(&mut self, pattern: &str, flags: CompileFlags) -> Result<Regex, CompileError> {
        let key = (pattern.to_owned(), flags);
        if let Some(re) = self.map.get(&key) {
            return Ok(re.clone());
        }
        let re = Regex::with_flags(pattern, flags)?;
        if self.map.len() >= self.capacity {
            log::debug!("regex cache full ({} entries), clearing", self.map.len());
            self.map.clear();
        }
        self.map.insert(key, re.clone());
        Ok(re)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

impl Default for RegexCache {
    fn default() -> Self {
        Self::new()
    }
}
