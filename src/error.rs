use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("sample rate must be greater than zero")]
    InvalidSampleRate,
    #[error("speed multiplier must be greater than zero, got {0}")]
    InvalidSpeed(f64),
    #[error("window length must be greater than zero")]
    InvalidWindow,
    #[error("row width mismatch: expected {expected}, got {actual}")]
    ChannelMismatch { expected: usize, actual: usize },
    #[error("window not initialized yet; feed at least one batch first")]
    WindowUninitialized,
    #[error("unknown board id {0}")]
    UnknownBoard(i32),
    #[error("recording has no board identity row")]
    MissingBoardIdentity,
    #[error("this data source cannot be rewound")]
    RewindUnsupported,
    #[error("recording is not open")]
    RecorderClosed,
    #[error("failed to render plot: {0}")]
    Plot(String),
    #[error("board driver error: {0}")]
    Driver(#[from] anyhow::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Config(#[from] serde_json::Error),
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for StreamError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        StreamError::Plot(format!("{value:?}"))
    }
}

impl From<image::ImageError> for StreamError {
    fn from(value: image::ImageError) -> Self {
        StreamError::Plot(value.to_string())
    }
}
