/// Serde support for match results
///
/// Matches borrow their subject, so they are converted to owned records
/// before serialization instead of implementing `Serialize` on
/// `MatchResult` directly.

#[cfg(feature = "serde")]
use crate::vm::MatchResult;

/// One capturing group of a serialized match.
#[cfg(feature = "serde")]
#[derive(Debug, Clone, PartialEq, Eq, ::serde::Serialize, ::serde::Deserialize)]
pub struct GroupRecord {
    pub index: usize,
    pub name: Option<String>,
    pub span: Option<(usize, usize)>,
    pub text: Option<String>,
}

/// Owned form of a `MatchResult`.
#[cfg(feature = "serde")]
#[derive(Debug, Clone, PartialEq, Eq, ::serde::Serialize, ::serde::Deserialize)]
pub struct MatchRecord {
    pub start: usize,
    pub end: usize,
    pub text: String,
    pub groups: Vec<GroupRecord>,
}

#[cfg(feature = "serde")]
impl MatchRecord {
    pub fn from_match(m: &MatchResult<'_>) -> Self {
        let (start, end) = m.span(0).ok().flatten().unwrap_or((0, 0));
        let groups = (1..=m.program().group_count() as usize)
            .map(|index| GroupRecord {
                index,
                name: m.program().names().name_of(index as u32).map(str::to_owned),
                span: m.span(index).ok().flatten(),
                text: m.group(index).ok().flatten().map(|t| t.into_owned()),
            })
            .collect();
        Self {
            start,
            end,
            text: m.as_str().into_owned(),
            groups,
        }
    }
}

/// Convert a match to a serde_json::Value
#[cfg(feature = "serde")]
pub fn match_to_json(m: &MatchResult<'_>) -> Result<serde_json::Value, String> {
    serde_json::to_value(MatchRecord::from_match(m)).map_err(|e| e.to_string())
}

/// Convert a match to a JSON string
#[cfg(feature = "serde")]
pub fn match_to_json_string(m: &MatchResult<'_>, pretty: bool) -> Result<String, String> {
    let record = MatchRecord::from_match(m);
    let json = if pretty {
        serde_json::to_string_pretty(&record)
    } else {
        serde_json::to_string(&record)
    };
    json.map_err(|e| e.to_string())
}
