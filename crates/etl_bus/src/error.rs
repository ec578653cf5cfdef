//! Errors raised by sinks and the multi-exporter (§4.8).

/// A sink failure. Per §4.8/§7, any sink failure is fatal to the partition;
/// there is no partial-success contract, so this has no retry semantics of
/// its own.
///
/// `Open`/`Write`/`Close` carry a boxed `std::error::Error` rather than
/// `anyhow::Error`: this is a library crate, and `anyhow` is reserved for the
/// CLI boundary (§10.2). The box is shared across sink implementations with
/// unrelated concrete source types (`std::io::Error`/`csv::Error` for
/// `CsvSink`, `sqlx::Error` for `PgUpsertSink`) since `SinkError` is defined
/// once for every `Sink` impl.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// The sink's backing file or connection could not be opened.
    #[error("failed to open sink '{sink}': {source}")]
    Open {
        /// The sink's name, for logging.
        sink: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A write to the sink failed.
    #[error("failed to write to sink '{sink}': {source}")]
    Write {
        /// The sink's name, for logging.
        sink: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// The sink could not be closed cleanly (e.g. a flush failed).
    #[error("failed to close sink '{sink}': {source}")]
    Close {
        /// The sink's name, for logging.
        sink: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A sink method ran before `open()`, which is always a caller bug.
    #[error("sink '{sink}' was used before open()")]
    NotOpened {
        /// The sink's name, for logging.
        sink: &'static str,
    },
}
