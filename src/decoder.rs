use super::error::Rejection;
use super::types::Value;
use std::collections::HashMap;

/// Separates the header section from the movetext.
pub const BLOCK_DELIM: &str = "\n\n";
pub const LINESEP: char = '\n';
/// Reserved key holding the movetext.
pub const MOVES_KEY: &str = "moves";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Raw header text, still to be coerced.
    Raw(String),
    /// Already in its native type.
    Native(Value),
}

/// Lowercased header names mapped to their values, plus the movetext.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap(HashMap<String, FieldValue>);

impl FieldMap {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.0.get(name)
    }

    pub fn insert_raw(&mut self, name: &str, value: &str) {
        self.0
            .insert(name.to_lowercase(), FieldValue::Raw(value.to_string()));
    }

    pub fn insert_native(&mut self, name: &str, value: Value) {
        self.0.insert(name.to_lowercase(), FieldValue::Native(value));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Splits `[Name "Value"]` into its name and value.
fn parse_header(line: &str) -> Result<(&str, &str), Rejection> {
    let malformed = || Rejection::MalformedHeader(line.to_string());

    let inner = line
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .ok_or_else(malformed)?;

    let mut parts = inner.split(" \"");
    match (parts.next(), parts.next(), parts.next()) {
        (Some(name), Some(value), None) => Ok((name, value.trim_end_matches('"'))),
        _ => Err(malformed()),
    }
}

/// Turns one matched block into a [`FieldMap`].
///
/// The block must hold exactly one blank-line delimiter. Duplicate headers
/// keep the last value, and the movetext always wins over a `Moves` header.
pub fn decode(block: &str) -> Result<FieldMap, Rejection> {
    let parts: Vec<&str> = block.split(BLOCK_DELIM).collect();
    let [headers, moves] = parts.as_slice() else {
        return Err(Rejection::WrongPartCount { found: parts.len() });
    };

    let mut fields = FieldMap::default();
    for line in headers.split(LINESEP) {
        let (name, value) = parse_header(line)?;
        fields.insert_raw(name, value);
    }
    fields.insert_native(MOVES_KEY, Value::Text((*moves).to_string()));

    Ok(fields)
}
