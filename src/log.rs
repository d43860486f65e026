use std::env;
use std::sync::LazyLock;

/// Severity of a diagnostic report. Ordered from most to least important.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Severity {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

impl Severity {
    fn prefix(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
        }
    }
}

/// How chatty the default sink is. Has no effect on extraction itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Verbosity {
    #[default]
    Silent,
    Verbose,
    Debug,
}

impl Verbosity {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "verbose" | "info" => Self::Verbose,
            "debug" => Self::Debug,
            _ => Self::Silent,
        }
    }

    /// Reads `PGN_EXTRACT_LOG` once per process.
    pub fn from_env() -> Self {
        *PGN_EXTRACT_LOG
    }

    pub fn max_severity(self) -> Severity {
        match self {
            Self::Silent => Severity::Error,
            Self::Verbose => Severity::Info,
            Self::Debug => Severity::Debug,
        }
    }
}

static PGN_EXTRACT_LOG: LazyLock<Verbosity> = LazyLock::new(|| {
    env::var("PGN_EXTRACT_LOG")
        .map(|s| Verbosity::from_str(&s))
        .unwrap_or_default()
});

/// Receiver of extraction diagnostics.
///
/// The extractor only decides *that* something is reported; where the message
/// ends up is the sink's business.
pub trait DiagnosticSink: Send + Sync {
    fn report(&self, severity: Severity, message: &str);
}

/// Writes reports within the verbosity threshold to stderr.
#[derive(Clone, Copy, Debug)]
pub struct StderrSink {
    max: Severity,
}

impl StderrSink {
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            max: verbosity.max_severity(),
        }
    }

    pub fn enabled(&self, severity: Severity) -> bool {
        severity <= self.max
    }
}

impl Default for StderrSink {
    fn default() -> Self {
        Self::new(Verbosity::from_env())
    }
}

macro_rules! log {
    ($sink:expr, $level:expr, $msg:expr) => {
        if $sink.enabled($level) {
            eprintln!("{}: {}", $level.prefix(), $msg);
        }
    };
}

impl DiagnosticSink for StderrSink {
    fn report(&self, severity: Severity, message: &str) {
        log!(self, severity, message);
    }
}
