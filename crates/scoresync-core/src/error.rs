use scoresync_ports::{ClockError, ConfigError, ConverterError, RendererError, TransformError};
use scoresync_timeline::TimemapError;

#[derive(thiserror::Error, Debug)]
pub enum PlayerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid score: {0}")]
    InvalidScore(String),
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),
    #[error("converter error: {0}")]
    Converter(#[from] ConverterError),
    #[error("renderer error: {0}")]
    Renderer(#[from] RendererError),
    #[error("clock error: {0}")]
    Clock(#[from] ClockError),
    #[error("timemap error: {0}")]
    Timemap(#[from] TimemapError),
    #[error("player has been destroyed")]
    Destroyed,
}
