use super::buffer::{LineCursor, WindowBuffer};
use super::config::{Compression, ExtractorConfig};
use super::decoder;
use super::error::{ExtractError, Rejection};
use super::log::{DiagnosticSink, Severity, StderrSink};
use super::schema;
use super::types::{ExtractionStats, Game};
use regex::bytes::Regex;
use std::fs::File;
use std::io::Read;
use std::iter::FusedIterator;
use std::ops::Range;
use std::path::Path;
use std::sync::{Arc, LazyLock};
use zstd::stream::read::Decoder as ZstdDecoder;

pub type PgnInput = Box<dyn Read + Send>;

/// Header lines, a blank line, then the movetext up to the last result token
/// on its line. `.` never crosses a newline.
static GAME_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?-u)(\[[^\]]+\s"[^"]+"\]\n?)+\n{2}.*(1-0|0-1|1/2-1/2)"#)
        .expect("valid game block regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockScan {
    /// A complete block at this range of the window.
    Found(Range<usize>),
    /// A block whose movetext line may continue past the window end.
    Incomplete,
    /// Nothing left to match in this window.
    Exhausted,
}

/// Looks for the next game block in `window` starting at `from`.
///
/// Unless `at_eof`, a match is only complete once a newline follows it:
/// the greedy movetext could otherwise grow after the next read.
pub fn scan_block(window: &[u8], from: usize, at_eof: bool) -> BlockScan {
    let Some(found) = GAME_BLOCK_RE.find_at(window, from) else {
        return BlockScan::Exhausted;
    };

    if at_eof || window[found.end()..].contains(&b'\n') {
        BlockScan::Found(found.range())
    } else {
        BlockScan::Incomplete
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Scanning,
    Finished,
}

/// Pull-based game reader over a PGN stream.
///
/// Each call to `next` scans the current window and reads more chunks only
/// when the window holds no further complete block. Rejected blocks are
/// reported to the sink and skipped. A fatal error is yielded once, after
/// which the iterator stays exhausted. The source is dropped as soon as the
/// stream ends, fails, or the extractor itself is dropped.
pub struct GameExtractor<R> {
    buffer: WindowBuffer<R>,
    sink: Arc<dyn DiagnosticSink>,
    source: String,
    scan_pos: usize,
    last_match_end: Option<usize>,
    /// The last scan stopped at a block still waiting for its line end.
    block_pending: bool,
    stats: ExtractionStats,
    state: State,
}

impl GameExtractor<PgnInput> {
    /// Opens `path` and reports to stderr according to the configured verbosity.
    pub fn open(path: impl AsRef<Path>, config: &ExtractorConfig) -> Result<Self, ExtractError> {
        let sink = Arc::new(StderrSink::new(config.verbosity));
        Self::open_with_sink(path, config, sink)
    }

    pub fn open_with_sink(
        path: impl AsRef<Path>,
        config: &ExtractorConfig,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, ExtractError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ExtractError::NotFound(path.to_path_buf()));
        }
        if config.buffer_size == 0 {
            return Err(ExtractError::InvalidBufferSize);
        }

        let file = File::open(path)?;
        let input: PgnInput = match config.compression {
            Compression::Plain => Box::new(file),
            Compression::Zstd => {
                Box::new(
                    ZstdDecoder::new(file).map_err(|source| ExtractError::Decoder {
                        path: path.to_path_buf(),
                        source,
                    })?,
                )
            }
        };

        sink.report(
            Severity::Info,
            &format!(
                "Opening the file {} read-only. Chunk size={}",
                path.display(),
                config.buffer_size
            ),
        );
        Self::from_reader(input, path.display().to_string(), config, sink)
    }
}

impl<R: Read> GameExtractor<R> {
    pub fn from_reader(
        input: R,
        source: impl Into<String>,
        config: &ExtractorConfig,
        sink: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, ExtractError> {
        if config.buffer_size == 0 {
            return Err(ExtractError::InvalidBufferSize);
        }

        Ok(Self {
            buffer: WindowBuffer::new(input, config.buffer_size, config.max_window()),
            sink,
            source: source.into(),
            scan_pos: 0,
            last_match_end: None,
            block_pending: false,
            stats: ExtractionStats::default(),
            state: State::Scanning,
        })
    }

    pub fn stats(&self) -> ExtractionStats {
        self.stats
    }

    pub fn cursor(&self) -> LineCursor {
        self.buffer.cursor()
    }

    fn next_block(&mut self) -> Option<Range<usize>> {
        let scan = scan_block(
            self.buffer.window(),
            self.scan_pos,
            self.buffer.is_exhausted(),
        );
        self.block_pending = scan == BlockScan::Incomplete;

        match scan {
            BlockScan::Found(range) => {
                self.report_unmatched(self.scan_pos..range.start, "unmatched text");
                self.scan_pos = range.end;
                self.last_match_end = Some(range.end);
                Some(range)
            }
            BlockScan::Incomplete | BlockScan::Exhausted => None,
        }
    }

    fn parse_block(&self, range: Range<usize>) -> Result<Game, Rejection> {
        let block = std::str::from_utf8(&self.buffer.window()[range])
            .map_err(|e| Rejection::InvalidUtf8(e.to_string()))?;
        let fields = decoder::decode(block)?;
        schema::build(&fields)
    }

    fn reject(&mut self, range: Range<usize>, rejection: Rejection) {
        let line = self.buffer.line_at(range.start);
        self.sink.report(
            Severity::Error,
            &format!("Discarding game: {} | PGN @line {}", rejection, line),
        );
        self.stats.rejected += 1;
    }

    /// Hands the unconsumed window back to the buffer and reads the next chunk.
    fn advance(&mut self) -> Result<(), ExtractError> {
        match self.last_match_end.take() {
            Some(end) => self.buffer.consume(end),
            None if self.buffer.overflows(self.block_pending) => {
                return Err(ExtractError::BufferTooSmall {
                    buffer_size: self.buffer.buffer_size(),
                    window_len: self.buffer.window().len(),
                });
            }
            None => {}
        }
        self.scan_pos = 0;

        if self.buffer.is_exhausted() {
            let leftover = 0..self.buffer.window().len();
            self.report_unmatched(leftover, "trailing text without a complete game");
            self.finish();
            return Ok(());
        }

        let chunk_idx = self.stats.chunks;
        if self.buffer.next_window()? > 0 {
            self.stats.chunks += 1;
            self.sink.report(
                Severity::Debug,
                &format!(
                    "reading chunk #{} | line {} | {} KiB parsed",
                    chunk_idx,
                    self.buffer.cursor().chunk_end_line(),
                    chunk_idx * self.buffer.buffer_size() / 1024
                ),
            );
        }
        Ok(())
    }

    /// Warns about non-blank text the pattern skipped over.
    fn report_unmatched(&self, range: Range<usize>, what: &str) {
        let text = &self.buffer.window()[range.clone()];
        let trimmed = text.trim_ascii_start();
        if trimmed.trim_ascii_end().is_empty() {
            return;
        }

        let start = range.start + (text.len() - trimmed.len());
        self.sink.report(
            Severity::Warn,
            &format!(
                "Discarding {} bytes of {} @line {}",
                trimmed.trim_ascii_end().len(),
                what,
                self.buffer.line_at(start)
            ),
        );
    }

    fn finish(&mut self) {
        self.state = State::Finished;
        self.buffer.release();
        self.sink.report(
            Severity::Info,
            &format!(
                "Closing {}. Valid games count: {} | Invalid games count: {}",
                self.source, self.stats.valid, self.stats.rejected
            ),
        );
    }

    fn fail(&mut self, err: ExtractError) -> ExtractError {
        self.state = State::Finished;
        self.buffer.release();
        err
    }
}

impl<R: Read> Iterator for GameExtractor<R> {
    type Item = Result<Game, ExtractError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.state == State::Scanning {
            let Some(range) = self.next_block() else {
                if let Err(err) = self.advance() {
                    return Some(Err(self.fail(err)));
                }
                continue;
            };

            match self.parse_block(range.clone()) {
                Ok(game) => {
                    self.stats.valid += 1;
                    return Some(Ok(game));
                }
                Err(rejection) => self.reject(range, rejection),
            }
        }
        None
    }
}

impl<R: Read> FusedIterator for GameExtractor<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::testing::CollectingSink;
    use crate::log::Verbosity;
    use chrono::NaiveDate;
    use std::io::Cursor;

    const GAME: &str = "[Event \"Rated Blitz game\"]\n\
[Site \"https://lichess.org/abcd1234\"]\n\
[White \"alice\"]\n\
[Black \"bob\"]\n\
[Result \"1-0\"]\n\
[ECO \"B01\"]\n\
[Opening \"Scandinavian\"]\n\
[TimeControl \"300+0\"]\n\
[Termination \"Normal\"]\n\
[UTCDate \"2013.01.01\"]\n\
[UTCTime \"12:00:00\"]\n\
[WhiteElo \"1500\"]\n\
[BlackElo \"1490\"]\n\
\n\
1. e4 d5 2. exd5 Qxd5 1-0\n\
\n";

    fn extractor(
        input: &str,
        buffer_size: usize,
        sink: Arc<CollectingSink>,
    ) -> GameExtractor<Cursor<Vec<u8>>> {
        let config = ExtractorConfig::default()
            .with_buffer_size(buffer_size)
            .with_max_window(input.len() + 1)
            .with_verbosity(Verbosity::Debug);
        GameExtractor::from_reader(Cursor::new(input.as_bytes().to_vec()), "test", &config, sink)
            .unwrap()
    }

    #[test]
    fn test_scan_block_defers_unterminated_movetext() {
        let window = GAME.trim_end().as_bytes();
        assert_eq!(scan_block(window, 0, false), BlockScan::Incomplete);
        assert_eq!(scan_block(window, 0, true), BlockScan::Found(0..window.len()));
        assert_eq!(scan_block(GAME.as_bytes(), 0, false), BlockScan::Found(0..window.len()));
    }

    #[test]
    fn test_scan_block_movetext_greedy_on_its_line() {
        let window = b"[A \"b\"]\n\n1. e4 1-0 {odd} 0-1\n[A \"b\"]\n\n1. d4 1/2-1/2\n";
        let BlockScan::Found(first) = scan_block(window, 0, false) else {
            panic!("expected a block");
        };
        assert!(window[..first.end].ends_with(b"0-1"));
        let BlockScan::Found(second) = scan_block(window, first.end, false) else {
            panic!("expected a second block");
        };
        assert!(window[second].ends_with(b"1/2-1/2"));
    }

    #[test]
    fn test_scan_block_ignores_unknown_result() {
        let window = b"[A \"b\"]\n\n1. e4 *\n\n";
        assert_eq!(scan_block(window, 0, true), BlockScan::Exhausted);
    }

    #[test]
    fn test_single_game_end_to_end() {
        let sink = Arc::new(CollectingSink::default());
        let mut games = extractor(GAME, 64, sink.clone());

        let game = games.next().unwrap().unwrap();
        assert_eq!(game.white, "alice");
        assert_eq!(game.result, "1-0");
        assert_eq!(game.utc_date, NaiveDate::from_ymd_opt(2013, 1, 1).unwrap());
        assert_eq!(game.white_elo, 1500);
        assert_eq!(game.moves, "1. e4 d5 2. exd5 Qxd5 1-0");
        assert!(games.next().is_none());
        assert!(games.next().is_none());

        let stats = games.stats();
        assert_eq!((stats.valid, stats.rejected), (1, 0));
        assert!(sink.at(Severity::Warn).is_empty());
        assert!(
            sink.at(Severity::Info)
                .iter()
                .any(|msg| msg.contains("Valid games count: 1 | Invalid games count: 0"))
        );
    }

    #[test]
    fn test_rejection_is_reported_with_line_and_skipped() {
        let broken = GAME.replace("[WhiteElo \"1500\"]", "[WhiteElo \"abc\"]");
        let input = format!("{GAME}{broken}{GAME}");
        let sink = Arc::new(CollectingSink::default());
        let mut games = extractor(&input, 50, sink.clone());

        assert_eq!(games.by_ref().filter_map(Result::ok).count(), 2);
        assert_eq!(games.stats().rejected, 1);

        let errors = sink.at(Severity::Error);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("whiteelo"));
        assert!(errors[0].ends_with("@line 17"));
    }

    #[test]
    fn test_overflow_is_fatal_once() {
        let config = ExtractorConfig::default().with_buffer_size(8);
        let sink: Arc<dyn DiagnosticSink> = Arc::new(CollectingSink::default());
        let input = Cursor::new(vec![b'x'; 64]);
        let mut games = GameExtractor::from_reader(input, "garbage", &config, sink).unwrap();

        let err = games.next().unwrap().unwrap_err();
        assert!(matches!(
            err,
            ExtractError::BufferTooSmall {
                buffer_size: 8,
                window_len: 24
            }
        ));
        assert!(games.next().is_none());
    }

    #[test]
    fn test_block_ending_on_chunk_boundary_is_not_an_overflow() {
        let headers = GAME.split("\n\n").next().unwrap();
        let buffer_size = GAME.len() + 40;
        // Second block ends right at the end of the third chunk.
        let target = 3 * buffer_size - GAME.len();
        let bare = format!("{headers}\n\n1. e4 1-0").len();
        let second = format!("{headers}\n\n1. e4 {}1-0", " ".repeat(target - bare));
        assert_eq!(GAME.len() + second.len(), 3 * buffer_size);
        let input = format!("{GAME}{second}\n\n");

        let config = ExtractorConfig::default().with_buffer_size(buffer_size);
        let sink: Arc<dyn DiagnosticSink> = Arc::new(CollectingSink::default());
        let games =
            GameExtractor::from_reader(Cursor::new(input.into_bytes()), "boundary", &config, sink)
                .unwrap()
                .collect::<Result<Vec<_>, _>>()
                .unwrap();

        assert_eq!(games.len(), 2);
        assert!(games[1].moves.starts_with("1. e4  "));
        assert!(games[1].moves.ends_with("1-0"));
    }

    #[test]
    fn test_pending_block_still_bounded_by_ceiling() {
        let headers = GAME.split("\n\n").next().unwrap();
        let input = format!("{headers}\n\n1. e4 1-0{}", " 1-0".repeat(250));
        let config = ExtractorConfig::default().with_buffer_size(256);
        let sink: Arc<dyn DiagnosticSink> = Arc::new(CollectingSink::default());
        let mut games =
            GameExtractor::from_reader(Cursor::new(input.into_bytes()), "long", &config, sink)
                .unwrap();

        assert!(matches!(
            games.next(),
            Some(Err(ExtractError::BufferTooSmall { window_len, .. })) if window_len > 3 * 256
        ));
    }

    #[test]
    fn test_trailing_garbage_is_warned() {
        let input = format!("{GAME}[Event \"cut");
        let sink = Arc::new(CollectingSink::default());
        let games = extractor(&input, 32, sink.clone());

        assert_eq!(games.count(), 1);
        let warnings = sink.at(Severity::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("@line 17"));
    }

    #[test]
    fn test_unknown_result_game_is_skipped_with_warning() {
        let unfinished = "[Event \"Abandoned\"]\n[Result \"*\"]\n\n1. e4 *\n\n";
        let input = format!("{GAME}{unfinished}{GAME}");
        let sink = Arc::new(CollectingSink::default());
        let games = extractor(&input, 40, sink.clone());

        assert_eq!(games.filter_map(Result::ok).count(), 2);
        let warnings = sink.at(Severity::Warn);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("unmatched text @line 17"));
        assert!(sink.at(Severity::Error).is_empty());
    }

    #[test]
    fn test_zero_buffer_size_is_rejected() {
        let config = ExtractorConfig::default().with_buffer_size(0);
        let sink: Arc<dyn DiagnosticSink> = Arc::new(CollectingSink::default());
        let result = GameExtractor::from_reader(Cursor::new(Vec::new()), "empty", &config, sink);
        assert!(matches!(result, Err(ExtractError::InvalidBufferSize)));
    }

    #[test]
    fn test_chunks_are_counted_and_logged() {
        let sink = Arc::new(CollectingSink::default());
        let mut games = extractor(GAME, 100, sink.clone());
        games.by_ref().for_each(drop);

        let expected_chunks = GAME.len().div_ceil(100);
        assert_eq!(games.stats().chunks, expected_chunks);
        let debug = sink.at(Severity::Debug);
        assert_eq!(debug.len(), expected_chunks);
        assert!(debug[0].starts_with("reading chunk #0 | line 5 |"), "{}", debug[0]);
        assert!(debug[expected_chunks - 1].contains("| line 17 |"));
    }
}
