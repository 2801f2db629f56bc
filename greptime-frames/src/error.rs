use backtraced_error::SerdeJsonError;

#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    #[error("Span events of row {row} are not valid JSON")]
    SpanEvents {
        row: usize,
        #[source]
        source: SerdeJsonError,
    },
}
