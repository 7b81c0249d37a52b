pub type RechromaResult<T> = Result<T, RechromaError>;

#[derive(thiserror::Error, Debug)]
pub enum RechromaError {
    #[error("io error: {0}")]
    Io(String),

    #[error("format error: {0}")]
    Format(String),

    #[error("consistency error: {0}")]
    Consistency(String),

    #[error("colorizer error: {0}")]
    Colorizer(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RechromaError {
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    pub fn consistency(msg: impl Into<String>) -> Self {
        Self::Consistency(msg.into())
    }

    pub fn colorizer(msg: impl Into<String>) -> Self {
        Self::Colorizer(msg.into())
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }
}
