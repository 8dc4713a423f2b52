use thiserror::Error;

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Failures of the forecasting engine.
///
/// The engine either returns a complete fit + forecast or one of these; there
/// are no partial results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    /// The series is too short to estimate the smooth term.
    #[error("Insufficient data: need at least {required} daily observations, got {actual}.")]
    InsufficientData { required: usize, actual: usize },

    /// Forecast horizon must be a positive number of days.
    #[error("Invalid forecast horizon: {0} (must be at least 1 day).")]
    InvalidHorizon(i64),

    /// Days out of order or non-finite values.
    #[error("Invalid series: {0}")]
    InvalidSeries(String),

    #[error("Invalid smoothing configuration: {0}")]
    InvalidConfig(String),

    /// No smoothing candidate produced a finite fit.
    #[error("Model fitting failed: {0}")]
    FitFailed(String),
}

impl From<ForecastError> for AppError {
    fn from(err: ForecastError) -> Self {
        let exit_code = match err {
            ForecastError::InvalidHorizon(_) | ForecastError::InvalidConfig(_) => 2,
            ForecastError::InsufficientData { .. } => 3,
            ForecastError::InvalidSeries(_) | ForecastError::FitFailed(_) => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}
