use serde::{Deserialize, Serialize};

use crate::authority::AuthorityMode;
use crate::net::EntityConfigPayload;
use crate::snapshot::{DEFAULT_SMOOTHING_BUFFER_SIZE, MAX_SMOOTHING_BUFFER_SIZE};

pub const PRIMARY_PUBLISH_INTERVAL_SECS: f64 = 0.008;
pub const SECONDARY_PUBLISH_INTERVAL_SECS: f64 = 0.1;
pub const DEFAULT_INTERPOLATION_RATE: f32 = 25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntityClass {
    #[default]
    Primary = 0,
    Secondary = 1,
}

impl EntityClass {
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Primary),
            1 => Some(Self::Secondary),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("publish interval must be a positive number of seconds, got {0}")]
    PublishInterval(f64),
    #[error("smoothing buffer must hold at least one snapshot")]
    EmptySmoothingBuffer,
    #[error("smoothing buffer of {0} snapshots exceeds the limit of {max}", max = MAX_SMOOTHING_BUFFER_SIZE)]
    SmoothingBufferTooLarge(usize),
    #[error("interpolation rate must be positive, got {0}")]
    InterpolationRate(f32),
    #[error("unknown entity class {0}")]
    UnknownClass(u8),
    #[error("unknown authority mode {0}")]
    UnknownAuthorityMode(u8),
}

/// Replication settings fixed when an entity is spawned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    pub class: EntityClass,
    pub authority_mode: AuthorityMode,
    pub publish_interval_seconds: f64,
    pub smoothing_buffer_size: usize,
    pub interpolation_rate: f32,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self::primary()
    }
}

impl EntityConfig {
    pub fn primary() -> Self {
        Self {
            class: EntityClass::Primary,
            authority_mode: AuthorityMode::HostWrite,
            publish_interval_seconds: PRIMARY_PUBLISH_INTERVAL_SECS,
            smoothing_buffer_size: DEFAULT_SMOOTHING_BUFFER_SIZE,
            interpolation_rate: DEFAULT_INTERPOLATION_RATE,
        }
    }

    pub fn secondary() -> Self {
        Self {
            class: EntityClass::Secondary,
            authority_mode: AuthorityMode::OwnerWrite,
            publish_interval_seconds: SECONDARY_PUBLISH_INTERVAL_SECS,
            smoothing_buffer_size: DEFAULT_SMOOTHING_BUFFER_SIZE,
            interpolation_rate: 15.0,
        }
    }

    pub fn for_class(class: EntityClass) -> Self {
        match class {
            EntityClass::Primary => Self::primary(),
            EntityClass::Secondary => Self::secondary(),
        }
    }

    pub fn with_authority(mut self, mode: AuthorityMode) -> Self {
        self.authority_mode = mode;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.publish_interval_seconds.is_finite() && self.publish_interval_seconds > 0.0) {
            return Err(ConfigError::PublishInterval(self.publish_interval_seconds));
        }
        if self.smoothing_buffer_size == 0 {
            return Err(ConfigError::EmptySmoothingBuffer);
        }
        if self.smoothing_buffer_size > MAX_SMOOTHING_BUFFER_SIZE {
            return Err(ConfigError::SmoothingBufferTooLarge(self.smoothing_buffer_size));
        }
        if !(self.interpolation_rate.is_finite() && self.interpolation_rate > 0.0) {
            return Err(ConfigError::InterpolationRate(self.interpolation_rate));
        }
        Ok(())
    }

    pub fn to_wire(&self) -> EntityConfigPayload {
        EntityConfigPayload {
            class: self.class as u8,
            mode: self.authority_mode as u8,
            publish_interval_seconds: self.publish_interval_seconds,
            smoothing_buffer_size: self.smoothing_buffer_size.min(u32::MAX as usize) as u32,
            interpolation_rate: self.interpolation_rate,
        }
    }

    pub fn from_wire(payload: &EntityConfigPayload) -> Result<Self, ConfigError> {
        let config = Self {
            class: EntityClass::from_wire(payload.class)
                .ok_or(ConfigError::UnknownClass(payload.class))?,
            authority_mode: AuthorityMode::from_wire(payload.mode)
                .ok_or(ConfigError::UnknownAuthorityMode(payload.mode))?,
            publish_interval_seconds: payload.publish_interval_seconds,
            smoothing_buffer_size: payload.smoothing_buffer_size as usize,
            interpolation_rate: payload.interpolation_rate,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_defaults() {
        let primary = EntityConfig::primary();
        assert_eq!(primary.publish_interval_seconds, 0.008);
        assert_eq!(primary.authority_mode, AuthorityMode::HostWrite);
        assert_eq!(primary.smoothing_buffer_size, 4);

        let secondary = EntityConfig::for_class(EntityClass::Secondary);
        assert_eq!(secondary.publish_interval_seconds, 0.1);
        assert_eq!(secondary.authority_mode, AuthorityMode::OwnerWrite);

        assert!(primary.validate().is_ok());
        assert!(secondary.validate().is_ok());
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = EntityConfig::primary();
        config.publish_interval_seconds = 0.0;
        assert_eq!(config.validate(), Err(ConfigError::PublishInterval(0.0)));

        let mut config = EntityConfig::primary();
        config.smoothing_buffer_size = 0;
        assert_eq!(config.validate(), Err(ConfigError::EmptySmoothingBuffer));

        let mut config = EntityConfig::primary();
        config.smoothing_buffer_size = usize::MAX;
        assert_eq!(
            config.validate(),
            Err(ConfigError::SmoothingBufferTooLarge(usize::MAX))
        );
        config.smoothing_buffer_size = MAX_SMOOTHING_BUFFER_SIZE;
        assert!(config.validate().is_ok());

        let mut config = EntityConfig::primary();
        config.interpolation_rate = f32::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn wire_conversion() {
        let config = EntityConfig::secondary().with_authority(AuthorityMode::HostWrite);
        assert_eq!(EntityConfig::from_wire(&config.to_wire()), Ok(config));

        let mut payload = EntityConfig::primary().to_wire();
        payload.mode = 9;
        assert_eq!(
            EntityConfig::from_wire(&payload),
            Err(ConfigError::UnknownAuthorityMode(9))
        );

        let mut payload = EntityConfig::primary().to_wire();
        payload.smoothing_buffer_size = u32::MAX;
        assert_eq!(
            EntityConfig::from_wire(&payload),
            Err(ConfigError::SmoothingBufferTooLarge(u32::MAX as usize))
        );
    }
}
