use super::decoder::{FieldMap, FieldValue};
use super::error::Rejection;
use super::types::{FieldKind, Game, Value};
use chrono::{NaiveDate, NaiveTime};

pub const GAME_FIELD_COUNT: usize = 14;
/// Text fields lead the schema.
const TEXT_FIELD_COUNT: usize = 10;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GameField {
    Event = 0,
    Site = 1,
    White = 2,
    Black = 3,
    Result = 4,
    Eco = 5,
    Opening = 6,
    TimeControl = 7,
    Termination = 8,
    Moves = 9,
    UtcDate = 10,
    UtcTime = 11,
    WhiteElo = 12,
    BlackElo = 13,
}

impl GameField {
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        GAME_SCHEMA[self.index()].name
    }
}

type Coerce = fn(&str) -> Result<Value, Option<String>>;

pub struct FieldDef {
    pub field: GameField,
    /// Lowercased header name.
    pub name: &'static str,
    /// Header name as written in PGN.
    pub label: &'static str,
    pub kind: FieldKind,
    coerce: Coerce,
}

const fn text(field: GameField, name: &'static str, label: &'static str) -> FieldDef {
    FieldDef {
        field,
        name,
        label,
        kind: FieldKind::Text,
        coerce: coerce_text,
    }
}

pub const GAME_SCHEMA: [FieldDef; GAME_FIELD_COUNT] = [
    text(GameField::Event, "event", "Event"),
    text(GameField::Site, "site", "Site"),
    text(GameField::White, "white", "White"),
    text(GameField::Black, "black", "Black"),
    text(GameField::Result, "result", "Result"),
    text(GameField::Eco, "eco", "ECO"),
    text(GameField::Opening, "opening", "Opening"),
    text(GameField::TimeControl, "timecontrol", "TimeControl"),
    text(GameField::Termination, "termination", "Termination"),
    text(GameField::Moves, "moves", "movetext"),
    FieldDef {
        field: GameField::UtcDate,
        name: "utcdate",
        label: "UTCDate",
        kind: FieldKind::Date,
        coerce: coerce_date,
    },
    FieldDef {
        field: GameField::UtcTime,
        name: "utctime",
        label: "UTCTime",
        kind: FieldKind::Time,
        coerce: coerce_time,
    },
    FieldDef {
        field: GameField::WhiteElo,
        name: "whiteelo",
        label: "WhiteElo",
        kind: FieldKind::Integer,
        coerce: coerce_integer,
    },
    FieldDef {
        field: GameField::BlackElo,
        name: "blackelo",
        label: "BlackElo",
        kind: FieldKind::Integer,
        coerce: coerce_integer,
    },
];

fn coerce_text(raw: &str) -> Result<Value, Option<String>> {
    Ok(Value::Text(raw.to_string()))
}

fn coerce_integer(raw: &str) -> Result<Value, Option<String>> {
    raw.trim()
        .parse::<i32>()
        .map(Value::Integer)
        .map_err(|e| Some(e.to_string()))
}

/// Splits `raw` on `sep` into exactly three numbers.
fn split_three(raw: &str, sep: char, format: &str) -> Result<[i64; 3], Option<String>> {
    let parts = raw
        .split(sep)
        .map(|part| part.trim().parse::<i64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| Some(e.to_string()))?;

    <[i64; 3]>::try_from(parts).map_err(|_| Some(format!("expected {format}")))
}

fn coerce_date(raw: &str) -> Result<Value, Option<String>> {
    let [year, month, day] = split_three(raw, '.', "YYYY.MM.DD")?;
    if !(1..=9999).contains(&year) {
        return Err(Some("year out of range".to_string()));
    }

    let date = i32::try_from(year)
        .ok()
        .zip(u32::try_from(month).ok())
        .zip(u32::try_from(day).ok())
        .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d))
        .ok_or_else(|| Some("invalid calendar date".to_string()))?;

    Ok(Value::Date(date))
}

fn coerce_time(raw: &str) -> Result<Value, Option<String>> {
    let [hour, min, sec] = split_three(raw, ':', "HH:MM:SS")?;

    let time = u32::try_from(hour)
        .ok()
        .zip(u32::try_from(min).ok())
        .zip(u32::try_from(sec).ok())
        .and_then(|((h, m), s)| NaiveTime::from_hms_opt(h, m, s))
        .ok_or_else(|| Some("time out of range".to_string()))?;

    Ok(Value::Time(time))
}

impl FieldDef {
    fn resolve(&self, fields: &FieldMap) -> Result<Value, Rejection> {
        let cast_failure = |value: String, detail: Option<String>| Rejection::CastFailure {
            field: self.name,
            kind: self.kind.name(),
            value,
            detail,
        };

        match fields.get(self.name) {
            None => Err(Rejection::FieldNotFound(self.name)),
            Some(FieldValue::Native(value)) if value.kind() == self.kind => Ok(value.clone()),
            Some(FieldValue::Native(value)) => Err(cast_failure(
                format!("{value:?}"),
                Some(format!("native {} value", value.kind().name())),
            )),
            Some(FieldValue::Raw(raw)) => {
                (self.coerce)(raw).map_err(|detail| cast_failure(raw.clone(), detail))
            }
        }
    }
}

#[derive(Default)]
struct GameSlots {
    text: [Option<String>; TEXT_FIELD_COUNT],
    utc_date: Option<NaiveDate>,
    utc_time: Option<NaiveTime>,
    white_elo: Option<i32>,
    black_elo: Option<i32>,
}

impl GameSlots {
    fn set(&mut self, def: &FieldDef, value: Value) -> Result<(), Rejection> {
        match (def.field, value) {
            (GameField::UtcDate, Value::Date(date)) => self.utc_date = Some(date),
            (GameField::UtcTime, Value::Time(time)) => self.utc_time = Some(time),
            (GameField::WhiteElo, Value::Integer(elo)) => self.white_elo = Some(elo),
            (GameField::BlackElo, Value::Integer(elo)) => self.black_elo = Some(elo),
            (field, Value::Text(text)) if def.kind == FieldKind::Text => {
                self.text[field.index()] = Some(text)
            }
            (_, value) => {
                return Err(Rejection::CastFailure {
                    field: def.name,
                    kind: def.kind.name(),
                    value: format!("{value:?}"),
                    detail: Some(format!("{} value", value.kind().name())),
                });
            }
        }
        Ok(())
    }

    fn take_text(&mut self, field: GameField) -> Result<String, Rejection> {
        self.text[field.index()]
            .take()
            .ok_or(Rejection::FieldNotFound(field.name()))
    }

    fn finish(mut self) -> Result<Game, Rejection> {
        let missing = |field: GameField| Rejection::FieldNotFound(field.name());
        Ok(Game {
            event: self.take_text(GameField::Event)?,
            site: self.take_text(GameField::Site)?,
            white: self.take_text(GameField::White)?,
            black: self.take_text(GameField::Black)?,
            result: self.take_text(GameField::Result)?,
            eco: self.take_text(GameField::Eco)?,
            opening: self.take_text(GameField::Opening)?,
            time_control: self.take_text(GameField::TimeControl)?,
            termination: self.take_text(GameField::Termination)?,
            moves: self.take_text(GameField::Moves)?,
            utc_date: self.utc_date.ok_or_else(|| missing(GameField::UtcDate))?,
            utc_time: self.utc_time.ok_or_else(|| missing(GameField::UtcTime))?,
            white_elo: self.white_elo.ok_or_else(|| missing(GameField::WhiteElo))?,
            black_elo: self.black_elo.ok_or_else(|| missing(GameField::BlackElo))?,
        })
    }
}

/// Maps decoded fields onto the game schema.
///
/// Fields are resolved in schema order and the first failure rejects the
/// whole game. Headers outside the schema are ignored.
pub fn build(fields: &FieldMap) -> Result<Game, Rejection> {
    let mut slots = GameSlots::default();
    for def in GAME_SCHEMA.iter() {
        slots.set(def, def.resolve(fields)?)?;
    }
    slots.finish()
}
