use crate::error::TemplateError;
use crate::vm::MatchResult;

/// Produces the replacement text for one match in `Regex::sub`.
///
/// String replacements are brace templates expanded with
/// `MatchResult::expand`; closures receive the match and return the text.
pub trait Replacer {
    fn replace_append(&mut self, m: &MatchResult<'_>, dst: &mut String) -> Result<(), TemplateError>;
}

impl Replacer for &str {
    fn replace_append(&mut self, m: &MatchResult<'_>, dst: &mut String) -> Result<(), TemplateError> {
        dst.push_str(&m.expand(self)?);
        Ok(())
    }
}

impl Replacer for String {
    fn replace_append(&mut self, m: &MatchResult<'_>, dst: &mut String) -> Result<(), TemplateError> {
        self.as_str().replace_append(m, dst)
    }
}

impl Replacer for &String {
    fn replace_append(&mut self, m: &MatchResult<'_>, dst: &mut String) -> Result<(), TemplateError> {
        self.as_str().replace_append(m, dst)
    }
}

impl<F, T> Replacer for F
where
    F: FnMut(&MatchResult<'_>) -> T,
    T: AsRef<str>,
{
    fn replace_append(&mut self, m: &MatchResult<'_>, dst: &mut String) -> Result<(), TemplateError> {
        dst.push_str((*self)(m).as_ref());
        Ok(())
    }
}
