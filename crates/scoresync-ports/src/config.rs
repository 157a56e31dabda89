use crate::types::*;
use serde::{Deserialize, Serialize};

fn default_unroll_xsl_uri() -> String {
    "unroll.sef.json".to_string()
}

fn default_timemap_xsl_uri() -> String {
    "timemap.sef.json".to_string()
}

fn default_velocity() -> f32 {
    1.0
}

fn default_follow_cursor() -> bool {
    true
}

fn default_cursor_interval_ms() -> u64 {
    16
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("invalid option: {0}")]
    Invalid(String),
    #[error("missing option: {0}")]
    Missing(&'static str),
    #[error("Failed to find container element: {0}")]
    ContainerNotFound(String),
}

/// Scalar player options. Collaborator instances travel separately.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PlayerConfig {
    pub soundfont_uri: String,
    #[serde(default = "default_unroll_xsl_uri")]
    pub unroll_xsl_uri: String,
    #[serde(default = "default_timemap_xsl_uri")]
    pub timemap_xsl_uri: String,
    pub unroll: bool,
    pub mute: bool,
    pub repeat: Repeat,
    #[serde(default = "default_velocity")]
    pub velocity: f32,
    pub horizontal: bool,
    #[serde(default = "default_follow_cursor")]
    pub follow_cursor: bool,
    pub output: Option<DeviceId>,
    #[serde(default = "default_cursor_interval_ms")]
    pub cursor_interval_ms: u64,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            soundfont_uri: String::new(),
            unroll_xsl_uri: default_unroll_xsl_uri(),
            timemap_xsl_uri: default_timemap_xsl_uri(),
            unroll: false,
            mute: false,
            repeat: Repeat::default(),
            velocity: default_velocity(),
            horizontal: false,
            follow_cursor: default_follow_cursor(),
            output: None,
            cursor_interval_ms: default_cursor_interval_ms(),
        }
    }
}

impl PlayerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Serde(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_velocity(self.velocity)?;
        if self.cursor_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "cursorIntervalMs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

pub fn validate_velocity(velocity: f32) -> Result<(), ConfigError> {
    if !velocity.is_finite() || velocity < 0.0 {
        return Err(ConfigError::Invalid(format!(
            "velocity must be a non-negative number, got {velocity}"
        )));
    }
    Ok(())
}
