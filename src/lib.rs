//! Streaming extraction of chess games from large PGN files.
//!
//! [`GameExtractor`] reads the source in fixed-size chunks, carries partial
//! games across chunk boundaries and yields one validated [`Game`] per call.
//! Malformed games are reported through a [`DiagnosticSink`] and skipped.
//!
//! ```no_run
//! use pgn_extract::{ExtractorConfig, GameExtractor};
//!
//! let config = ExtractorConfig::default().with_buffer_size(200_000);
//! for game in GameExtractor::open("lichess_db_standard_rated_2013-01.pgn", &config)? {
//!     println!("{}", game?);
//! }
//! # Ok::<(), pgn_extract::ExtractError>(())
//! ```
//!
//! Built as a DuckDB extension the same pipeline backs the `read_pgn_games`
//! table function.

mod bind_params;
mod buffer;
mod config;
mod decoder;
mod error;
mod extractor;
mod log;
mod reader;
mod schema;
mod types;

use duckdb::{Connection, Result};
use duckdb_ext_macros::duckdb_extension;
use reader::ReadPgnGamesVTab;
use std::error::Error;

pub use buffer::LineCursor;
pub use config::{Compression, DEFAULT_BUFFER_SIZE, ExtractorConfig, WINDOW_FACTOR};
pub use decoder::{FieldMap, FieldValue, decode};
pub use error::{ExtractError, Rejection};
pub use extractor::{BlockScan, GameExtractor, PgnInput, scan_block};
pub use log::{DiagnosticSink, Severity, StderrSink, Verbosity};
pub use schema::{FieldDef, GAME_SCHEMA, GameField, build};
pub use types::{ExtractionStats, FieldKind, Game, Value};

#[duckdb_extension(name = "pgn_extract", api_version = "v1.0.0")]
pub unsafe fn extension_entrypoint(con: Connection) -> Result<(), Box<dyn Error>> {
    con.register_table_function::<ReadPgnGamesVTab>("read_pgn_games")?;
    Ok(())
}
