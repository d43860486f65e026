use chrono::{NaiveDate, NaiveTime};
use std::fmt;

/// A validated game. Every field is present and typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    pub event: String,
    pub site: String,
    pub white: String,
    pub black: String,
    pub result: String,
    pub eco: String,
    pub opening: String,
    pub time_control: String,
    pub termination: String,
    pub moves: String,
    pub utc_date: NaiveDate,
    pub utc_time: NaiveTime,
    pub white_elo: i32,
    pub black_elo: i32,
}

/// Semantic type of a schema field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    Text,
    Integer,
    Date,
    Time,
}

impl FieldKind {
    pub fn name(self) -> &'static str {
        match self {
            Self::Text => "string",
            Self::Integer => "integer",
            Self::Date => "date",
            Self::Time => "time",
        }
    }
}

/// A field value in its native type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Integer(i32),
    Date(NaiveDate),
    Time(NaiveTime),
}

impl Value {
    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Text(_) => FieldKind::Text,
            Self::Integer(_) => FieldKind::Integer,
            Self::Date(_) => FieldKind::Date,
            Self::Time(_) => FieldKind::Time,
        }
    }
}

/// Running counters for one extraction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    pub chunks: usize,
    pub valid: usize,
    pub rejected: usize,
}

const MAX_DISPLAY_LEN: usize = 15;

fn write_text(f: &mut fmt::Formatter<'_>, name: &str, value: &str) -> fmt::Result {
    match value.char_indices().nth(MAX_DISPLAY_LEN) {
        Some((cut, _)) => write!(f, "{name}=\"{}...\"", &value[..cut]),
        None => write!(f, "{name}=\"{value}\""),
    }
}

impl fmt::Display for Game {
    /// Short form: long strings are cut after 15 characters.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Game(")?;
        for (name, value) in [
            ("event", &self.event),
            ("site", &self.site),
            ("white", &self.white),
            ("black", &self.black),
            ("result", &self.result),
            ("eco", &self.eco),
            ("opening", &self.opening),
            ("timecontrol", &self.time_control),
            ("termination", &self.termination),
            ("moves", &self.moves),
        ] {
            write_text(f, name, value)?;
            f.write_str(", ")?;
        }
        write!(
            f,
            "utcdate={}, utctime={}, whiteelo={}, blackelo={})",
            self.utc_date, self.utc_time, self.white_elo, self.black_elo
        )
    }
}
