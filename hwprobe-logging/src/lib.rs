use std::{
    env,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt::MakeWriter, prelude::*, registry, EnvFilter};

// --- Custom "Tee" Writer ---
struct Tee<A, B> {
    a: A,
    b: B,
}

impl<A, B> Write for Tee<A, B>
where
    A: Write,
    B: Write,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let res_a = self.a.write(buf);
        let res_b = self.b.write(buf);
        res_a.or(res_b)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.a.flush()?;
        self.b.flush()
    }
}

#[derive(Clone)]
struct MakeTee<A, B> {
    make_a: A,
    make_b: B,
}

impl<'a, A, B, W1, W2> MakeWriter<'a> for MakeTee<A, B>
where
    A: MakeWriter<'a, Writer = W1>,
    B: MakeWriter<'a, Writer = W2>,
    W1: Write + 'a,
    W2: Write + 'a,
{
    type Writer = Tee<W1, W2>;
    fn make_writer(&'a self) -> Self::Writer {
        Tee {
            a: self.make_a.make_writer(),
            b: self.make_b.make_writer(),
        }
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Logging settings resolved from the environment.
///
/// - `HWPROBE_LOG` (falls back to `RUST_LOG`): filter directives, default `warn`
/// - `HWPROBE_LOG_FORMAT`: `pretty` (default), `compact` or `json`
/// - `HWPROBE_LOG_FILE`: also append to this file, rotated daily
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub filter: String,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
}

impl LogSettings {
    pub fn from_env() -> Self {
        let filter = env::var("HWPROBE_LOG")
            .or_else(|_| env::var("RUST_LOG"))
            .unwrap_or_else(|_| "warn".to_string());
        let format = env::var("HWPROBE_LOG_FORMAT")
            .map(|f| LogFormat::parse(&f))
            .unwrap_or(LogFormat::Pretty);
        let file = env::var("HWPROBE_LOG_FILE")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        Self {
            filter,
            format,
            file,
        }
    }
}

/// Initializes the global tracing subscriber based on environment variables.
///
/// Console output goes to stderr so command output on stdout stays clean.
/// Returns the file writer guard when file output is active; keep it alive
/// for the lifetime of the program. Calling this twice is harmless, the
/// second call leaves the first subscriber in place.
pub fn init_subscriber() -> Option<WorkerGuard> {
    init_with(&LogSettings::from_env())
}

pub fn init_with(settings: &LogSettings) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_new(&settings.filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = registry().with(env_filter);
    let is_json = settings.format == LogFormat::Json;
    let is_compact = settings.format == LogFormat::Compact;

    match &settings.file {
        Some(log_path) => {
            let log_dir = log_path.parent().unwrap_or_else(|| Path::new("."));
            let log_filename = log_path
                .file_name()
                .unwrap_or_else(|| "hwprobe.log".as_ref());
            let file_appender = tracing_appender::rolling::daily(log_dir, log_filename);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            let tee_writer = MakeTee {
                make_a: io::stderr,
                make_b: non_blocking,
            };

            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(tee_writer);
            let installed = if is_json {
                subscriber.with(fmt_layer.json()).try_init()
            } else if is_compact {
                subscriber.with(fmt_layer.compact()).try_init()
            } else {
                subscriber.with(fmt_layer.pretty()).try_init()
            };
            installed.ok().map(|_| guard)
        }
        None => {
            let fmt_layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);
            let _ = if is_json {
                subscriber.with(fmt_layer.json()).try_init()
            } else if is_compact {
                subscriber.with(fmt_layer.compact()).try_init()
            } else {
                subscriber.with(fmt_layer.pretty()).try_init()
            };
            None
        }
    }
}

/// Install a debug-level subscriber that writes through the test harness.
pub fn init_for_tests() {
    let _ = registry()
        .with(EnvFilter::new("debug"))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
