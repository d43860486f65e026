use super::bind_params::{get_named_parameter_bigint, get_named_parameter_varchar};
use super::config::{Compression, ExtractorConfig};
use super::extractor::{GameExtractor, PgnInput};
use super::log::{DiagnosticSink, Severity, StderrSink, Verbosity};
use super::schema::{GAME_SCHEMA, GameField};
use super::types::{FieldKind, Game};
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use duckdb::{
    core::{DataChunkHandle, Inserter, LogicalTypeHandle, LogicalTypeId},
    vtab::{BindInfo, InitInfo, TableFunctionInfo, VTab},
};
use libduckdb_sys::{duckdb_date, duckdb_time};
use std::borrow::Cow;
use std::error::Error;
use std::ffi::CString;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[repr(C)]
pub struct ReadPgnGamesBindData {
    paths: Vec<PathBuf>,
    config: ExtractorConfig,
}

#[repr(C)]
pub struct ReadPgnGamesInitData {
    state: Mutex<ScanState>,
}

/// Files are read one after another; only one extractor is open at a time.
#[derive(Default)]
struct ScanState {
    next_path_idx: usize,
    current: Option<GameExtractor<PgnInput>>,
}

pub struct ReadPgnGamesVTab;

const PATH_PATTERN_PARAM_INDEX: u64 = 0;
const ROWS_PER_CHUNK: usize = 2048;
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ReadPgnLogicalType {
    Varchar,
    Integer,
    Date,
    Time,
}

impl ReadPgnLogicalType {
    fn for_kind(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Text => Self::Varchar,
            FieldKind::Integer => Self::Integer,
            FieldKind::Date => Self::Date,
            FieldKind::Time => Self::Time,
        }
    }

    fn to_handle(self) -> LogicalTypeHandle {
        match self {
            Self::Varchar => LogicalTypeHandle::from(LogicalTypeId::Varchar),
            Self::Integer => LogicalTypeHandle::from(LogicalTypeId::Integer),
            Self::Date => LogicalTypeHandle::from(LogicalTypeId::Date),
            Self::Time => LogicalTypeHandle::from(LogicalTypeId::Time),
        }
    }
}

fn parse_buffer_size(raw: i64) -> Result<usize, String> {
    usize::try_from(raw)
        .ok()
        .filter(|&size| size > 0)
        .ok_or_else(|| format!("Invalid buffer_size {raw}. Must be a positive number of bytes."))
}

fn resolve_config(bind: &BindInfo) -> Result<ExtractorConfig, Box<dyn Error>> {
    let mut config = ExtractorConfig::default();

    if let Some(raw) = get_named_parameter_bigint(bind, "buffer_size")?.into_option() {
        config = config.with_buffer_size(parse_buffer_size(raw)?);
    }

    if let Some(raw) = get_named_parameter_varchar(bind, "compression")?.into_option() {
        config = config.with_compression(Compression::parse(&raw)?);
    }

    if let Some(raw) = get_named_parameter_varchar(bind, "verbosity")?.into_option() {
        config = config.with_verbosity(Verbosity::from_str(&raw));
    }

    Ok(config)
}

fn sanitize_for_cstring(value: &str) -> Cow<'_, str> {
    if value.contains('\0') {
        Cow::Owned(value.replace('\0', " "))
    } else {
        Cow::Borrowed(value)
    }
}

fn to_duckdb_date(date: NaiveDate) -> duckdb_date {
    duckdb_date {
        days: date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE,
    }
}

fn to_duckdb_time(time: NaiveTime) -> duckdb_time {
    duckdb_time {
        micros: i64::from(time.num_seconds_from_midnight()) * 1_000_000
            + i64::from(time.nanosecond()) / 1_000,
    }
}

struct ChunkWriter<'a> {
    output: &'a mut DataChunkHandle,
    row_count: usize,
}

impl<'a> ChunkWriter<'a> {
    fn new(output: &'a mut DataChunkHandle) -> Self {
        Self {
            output,
            row_count: 0,
        }
    }

    fn is_full(&self) -> bool {
        self.row_count >= ROWS_PER_CHUNK
    }

    fn write_row(&mut self, game: &Game) -> Result<(), Box<dyn Error>> {
        let row_idx = self.row_count;

        for (field, value) in [
            (GameField::Event, &game.event),
            (GameField::Site, &game.site),
            (GameField::White, &game.white),
            (GameField::Black, &game.black),
            (GameField::Result, &game.result),
            (GameField::Eco, &game.eco),
            (GameField::Opening, &game.opening),
            (GameField::TimeControl, &game.time_control),
            (GameField::Termination, &game.termination),
            (GameField::Moves, &game.moves),
        ] {
            self.write_varchar(field, row_idx, value)?;
        }
        self.write_value(GameField::UtcDate, row_idx, to_duckdb_date(game.utc_date));
        self.write_value(GameField::UtcTime, row_idx, to_duckdb_time(game.utc_time));
        self.write_value(GameField::WhiteElo, row_idx, game.white_elo);
        self.write_value(GameField::BlackElo, row_idx, game.black_elo);

        self.row_count += 1;
        Ok(())
    }

    fn set_output_len(&mut self) {
        self.output.set_len(self.row_count);
    }

    fn write_varchar(
        &mut self,
        field: GameField,
        row_idx: usize,
        value: &str,
    ) -> Result<(), Box<dyn Error>> {
        let vector = self.output.flat_vector(field.index());
        vector.insert(row_idx, CString::new(sanitize_for_cstring(value).as_ref())?);
        Ok(())
    }

    fn write_value<T: Copy>(&mut self, field: GameField, row_idx: usize, value: T) {
        let mut vector = self.output.flat_vector(field.index());
        vector.as_mut_slice::<T>()[row_idx] = value;
    }
}

/// Opens the next readable file. A single unreadable path fails the query;
/// with several paths it is reported and skipped.
fn open_next_extractor(
    state: &mut ScanState,
    bind_data: &ReadPgnGamesBindData,
) -> Result<Option<GameExtractor<PgnInput>>, Box<dyn Error>> {
    let sink: Arc<dyn DiagnosticSink> = Arc::new(StderrSink::new(bind_data.config.verbosity));

    while state.next_path_idx < bind_data.paths.len() {
        let path = &bind_data.paths[state.next_path_idx];
        state.next_path_idx += 1;

        match GameExtractor::open_with_sink(path, &bind_data.config, sink.clone()) {
            Ok(extractor) => return Ok(Some(extractor)),
            Err(err) if bind_data.paths.len() == 1 => return Err(err.into()),
            Err(err) => sink.report(Severity::Warn, &err.to_string()),
        }
    }

    Ok(None)
}

impl VTab for ReadPgnGamesVTab {
    type InitData = ReadPgnGamesInitData;
    type BindData = ReadPgnGamesBindData;

    fn bind(bind: &BindInfo) -> Result<Self::BindData, Box<dyn Error>> {
        let pattern = bind.get_parameter(PATH_PATTERN_PARAM_INDEX).to_string();
        let config = resolve_config(bind)?;

        let paths: Vec<PathBuf> = if pattern.contains('*') || pattern.contains('?') {
            glob::glob(&pattern)?
                .filter_map(|entry| entry.ok())
                .collect()
        } else {
            vec![PathBuf::from(pattern)]
        };

        for def in GAME_SCHEMA.iter() {
            bind.add_result_column(
                def.label,
                ReadPgnLogicalType::for_kind(def.kind).to_handle(),
            );
        }

        Ok(ReadPgnGamesBindData { paths, config })
    }

    fn init(_: &InitInfo) -> Result<Self::InitData, Box<dyn Error>> {
        Ok(ReadPgnGamesInitData {
            state: Mutex::new(ScanState::default()),
        })
    }

    fn func(
        func: &TableFunctionInfo<Self>,
        output: &mut DataChunkHandle,
    ) -> Result<(), Box<dyn Error>> {
        let init_data = func.get_init_data();
        let bind_data = func.get_bind_data();
        let mut state = init_data
            .state
            .lock()
            .map_err(|_| "read_pgn_games state lock poisoned")?;
        let mut chunk_writer = ChunkWriter::new(output);

        while !chunk_writer.is_full() {
            if state.current.is_none() {
                state.current = open_next_extractor(&mut state, bind_data)?;
                if state.current.is_none() {
                    break;
                }
            }

            let Some(games) = state.current.as_mut() else {
                break;
            };
            match games.next() {
                Some(Ok(game)) => chunk_writer.write_row(&game)?,
                Some(Err(err)) => {
                    state.current = None;
                    return Err(err.into());
                }
                None => state.current = None,
            }
        }

        chunk_writer.set_output_len();
        Ok(())
    }

    fn parameters() -> Option<Vec<LogicalTypeHandle>> {
        Some(vec![
            LogicalTypeHandle::from(LogicalTypeId::Varchar), // path pattern (required)
        ])
    }

    fn named_parameters() -> Option<Vec<(String, LogicalTypeHandle)>> {
        Some(vec![
            (
                "buffer_size".to_string(),
                LogicalTypeHandle::from(LogicalTypeId::Bigint),
            ),
            (
                "compression".to_string(),
                LogicalTypeHandle::from(LogicalTypeId::Varchar),
            ),
            (
                "verbosity".to_string(),
                LogicalTypeHandle::from(LogicalTypeId::Varchar),
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::GAME_FIELD_COUNT;

    #[test]
    fn test_read_pgn_games_columns_match_contract() {
        let expected: [(&str, ReadPgnLogicalType); GAME_FIELD_COUNT] = [
            ("Event", ReadPgnLogicalType::Varchar),
            ("Site", ReadPgnLogicalType::Varchar),
            ("White", ReadPgnLogicalType::Varchar),
            ("Black", ReadPgnLogicalType::Varchar),
            ("Result", ReadPgnLogicalType::Varchar),
            ("ECO", ReadPgnLogicalType::Varchar),
            ("Opening", ReadPgnLogicalType::Varchar),
            ("TimeControl", ReadPgnLogicalType::Varchar),
            ("Termination", ReadPgnLogicalType::Varchar),
            ("movetext", ReadPgnLogicalType::Varchar),
            ("UTCDate", ReadPgnLogicalType::Date),
            ("UTCTime", ReadPgnLogicalType::Time),
            ("WhiteElo", ReadPgnLogicalType::Integer),
            ("BlackElo", ReadPgnLogicalType::Integer),
        ];

        for (idx, def) in GAME_SCHEMA.iter().enumerate() {
            assert_eq!(def.label, expected[idx].0);
            assert_eq!(ReadPgnLogicalType::for_kind(def.kind), expected[idx].1);
        }
    }

    #[test]
    fn test_parse_buffer_size() {
        assert_eq!(parse_buffer_size(200_000), Ok(200_000));
        assert_eq!(parse_buffer_size(1), Ok(1));
        assert!(parse_buffer_size(0).unwrap_err().contains("Invalid buffer_size 0"));
        assert!(parse_buffer_size(-64).unwrap_err().contains("Invalid buffer_size -64"));
    }

    #[test]
    fn test_sanitize_for_cstring() {
        assert_eq!(sanitize_for_cstring("normal text").as_ref(), "normal text");
        assert_eq!(sanitize_for_cstring("A\0B").as_ref(), "A B");
    }

    #[test]
    fn test_to_duckdb_date_counts_days_from_unix_epoch() {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(to_duckdb_date(epoch).days, 0);

        let date = NaiveDate::from_ymd_opt(2013, 1, 1).unwrap();
        assert_eq!(to_duckdb_date(date).days, 15706);

        let before = NaiveDate::from_ymd_opt(1969, 12, 31).unwrap();
        assert_eq!(to_duckdb_date(before).days, -1);
    }

    #[test]
    fn test_to_duckdb_time_in_micros() {
        let time = NaiveTime::from_hms_opt(12, 0, 1).unwrap();
        assert_eq!(to_duckdb_time(time).micros, (12 * 3600 + 1) * 1_000_000);
    }

    #[test]
    fn test_missing_path_fails_alone_but_is_skipped_among_several() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("games.pgn");
        std::fs::write(&present, "").unwrap();
        let missing = dir.path().join("missing.pgn");
        let config = ExtractorConfig::default().with_verbosity(Verbosity::Silent);

        let alone = ReadPgnGamesBindData {
            paths: vec![missing.clone()],
            config: config.clone(),
        };
        let mut state = ScanState::default();
        let err = open_next_extractor(&mut state, &alone).err().unwrap();
        assert!(err.to_string().contains("doesn't exist"));

        let several = ReadPgnGamesBindData {
            paths: vec![missing, present],
            config,
        };
        let mut state = ScanState::default();
        assert!(open_next_extractor(&mut state, &several).unwrap().is_some());
        assert_eq!(state.next_path_idx, 2);
        assert!(open_next_extractor(&mut state, &several).unwrap().is_none());
    }
}
