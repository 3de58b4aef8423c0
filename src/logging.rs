use std::io;
use std::path::Path;

use tracing::Subscriber;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::format::{DefaultFields, Format, Full};
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::reload::{self, Handle};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::error::{GuardError, Result};

/// rsnapshot's own log timestamp format.
const TIMESTAMP_FORMAT: &str = "[%d/%b/%Y:%H:%M:%S]";

type OutputLayer = fmt::Layer<Registry, DefaultFields, Format<Full, ChronoLocal>, BoxMakeWriter>;

/// Log destination: always stdout, plus the rsnapshot logfile once it is known.
#[derive(Clone)]
pub struct LogSink {
    handle: Handle<OutputLayer, Registry>,
}

impl LogSink {
    /// Appends every following event to `path` as well as stdout.
    pub fn attach(&self, path: &Path) -> Result<()> {
        let appender = open_appender(path)?;
        self.handle
            .reload(output_layer(BoxMakeWriter::new(io::stdout.and(appender))))
            .map_err(|e| GuardError::message(format!("attach logfile {}: {}", path.display(), e)))
    }
}

fn open_appender(path: &Path) -> Result<RollingFileAppender> {
    let (Some(dir), Some(name)) = (path.parent(), path.file_name()) else {
        return Err(GuardError::message(format!(
            "logfile {} is not a file path",
            path.display()
        )));
    };
    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name.to_string_lossy())
        .build(dir)
        .map_err(|e| GuardError::message(format!("open logfile {}: {}", path.display(), e)))
}

fn output_layer(writer: BoxMakeWriter) -> OutputLayer {
    fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_timer(ChronoLocal::new(TIMESTAMP_FORMAT.to_string()))
        .with_writer(writer)
}

fn build(filter: EnvFilter) -> (impl Subscriber + Send + Sync + 'static, LogSink) {
    let (output, handle) = reload::Layer::new(output_layer(BoxMakeWriter::new(io::stdout)));
    let subscriber = tracing_subscriber::registry().with(output).with(filter);
    (subscriber, LogSink { handle })
}

/// Installs the global subscriber. `RUST_LOG` overrides the level.
pub fn init(verbose: bool) -> LogSink {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let (subscriber, sink) = build(filter);
    let _ = subscriber.try_init();
    sink
}
