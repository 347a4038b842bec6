//! Frame-loop and gameplay tuning, loaded from JSON.
//!
//! Both structs implement `Default` and use `#[serde(default)]`, so a config
//! file only needs the fields it overrides. [`GameplayConfig`] lives in the
//! world's resource table; systems read it when they schedule their jobs.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::EngineError;

// ---------------------------------------------------------------------------
// FrameConfig
// ---------------------------------------------------------------------------

/// Timing parameters for [`FrameLoop`](crate::tick::FrameLoop).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Step of the fixed lane in seconds. Must be positive and finite.
    pub fixed_dt: f64,
    /// Most fixed steps run in one frame. Leftover time is dropped.
    pub max_fixed_steps: u32,
    /// Initial multiplier applied to every frame delta.
    pub time_scale: f64,
}

impl Default for FrameConfig {
    /// 60 Hz fixed lane, at most 5 catch-up steps, real time.
    fn default() -> Self {
        Self {
            fixed_dt: 1.0 / 60.0,
            max_fixed_steps: 5,
            time_scale: 1.0,
        }
    }
}

impl FrameConfig {
    /// Check the invariants the frame loop relies on.
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.fixed_dt > 0.0 && self.fixed_dt.is_finite()) {
            return Err(EngineError::Config(format!(
                "fixed_dt must be positive and finite, got {}",
                self.fixed_dt
            )));
        }
        if self.max_fixed_steps == 0 {
            return Err(EngineError::Config(
                "max_fixed_steps must be at least 1".to_owned(),
            ));
        }
        if !(self.time_scale >= 0.0 && self.time_scale.is_finite()) {
            return Err(EngineError::Config(format!(
                "time_scale must be non-negative and finite, got {}",
                self.time_scale
            )));
        }
        Ok(())
    }

    /// Parse and validate.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON file and parse it.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading frame config {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("parsing frame config {}", path.display()))
    }
}

// ---------------------------------------------------------------------------
// GameplayConfig
// ---------------------------------------------------------------------------

/// Gameplay tuning shared by the systems.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameplayConfig {
    /// Scales how strongly `CharacterTraits::ability_power` boosts ability
    /// parameters: `param * (1 + power * trait_coefficient)`.
    pub trait_coefficient: f32,
    /// Seconds a combo survives without a pickup.
    pub combo_window: f32,
    /// A `ComboMilestone` is emitted every time the combo reaches a multiple
    /// of this.
    pub combo_milestone: u32,
    /// Levels per world; completing the last level of a world unlocks the
    /// next world.
    pub levels_per_world: u32,
    /// Pull radius of the magnet powerup.
    pub magnet_radius: f32,
    /// Units per second a magnet pulls collectibles.
    pub magnet_pull_speed: f32,
    /// Speed multiplier while the speed-boost powerup is active.
    pub speed_boost_multiplier: f32,
    /// Score multiplier while the score-multiplier powerup is active.
    pub score_multiplier: u32,
    /// Multiplier on every hazard's damage per second.
    pub hazard_damage_scale: f32,
    /// Lateral distance kept by the barrier teleport target search.
    pub glitch_max_lateral: f32,
    /// How far past the barrier a teleport lands.
    pub glitch_exit_offset: f32,
}

impl Default for GameplayConfig {
    fn default() -> Self {
        Self {
            trait_coefficient: 0.5,
            combo_window: 2.0,
            combo_milestone: 5,
            levels_per_world: 5,
            magnet_radius: 6.0,
            magnet_pull_speed: 12.0,
            speed_boost_multiplier: 1.5,
            score_multiplier: 2,
            hazard_damage_scale: 1.0,
            glitch_max_lateral: 2.0,
            glitch_exit_offset: 1.5,
        }
    }
}

impl GameplayConfig {
    /// Check value ranges.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.levels_per_world == 0 {
            return Err(EngineError::Config(
                "levels_per_world must be at least 1".to_owned(),
            ));
        }
        if self.combo_milestone == 0 {
            return Err(EngineError::Config(
                "combo_milestone must be at least 1".to_owned(),
            ));
        }
        for (name, value) in [
            ("trait_coefficient", self.trait_coefficient),
            ("combo_window", self.combo_window),
            ("magnet_radius", self.magnet_radius),
            ("magnet_pull_speed", self.magnet_pull_speed),
            ("speed_boost_multiplier", self.speed_boost_multiplier),
            ("hazard_damage_scale", self.hazard_damage_scale),
            ("glitch_max_lateral", self.glitch_max_lateral),
            ("glitch_exit_offset", self.glitch_exit_offset),
        ] {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(EngineError::Config(format!(
                    "{name} must be non-negative and finite, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Parse and validate.
    pub fn from_json_str(json: &str) -> Result<Self, EngineError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON file and parse it.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading gameplay config {}", path.display()))?;
        Self::from_json_str(&json)
            .with_context(|| format!("parsing gameplay config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_frame_config_is_60hz() {
        let config = FrameConfig::default();
        assert!((config.fixed_dt - 1.0 / 60.0).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = FrameConfig::from_json_str(r#"{ "fixed_dt": 0.01 }"#).unwrap();
        assert_eq!(config.fixed_dt, 0.01);
        assert_eq!(config.max_fixed_steps, 5);

        let gameplay = GameplayConfig::from_json_str(r#"{ "combo_window": 3.5 }"#).unwrap();
        assert_eq!(gameplay.combo_window, 3.5);
        assert_eq!(gameplay.levels_per_world, 5);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            FrameConfig::from_json_str(r#"{ "fixed_dt": 0.0 }"#),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            FrameConfig::from_json_str(r#"{ "max_fixed_steps": 0 }"#),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            GameplayConfig::from_json_str(r#"{ "levels_per_world": 0 }"#),
            Err(EngineError::Config(_))
        ));
        assert!(matches!(
            GameplayConfig::from_json_str("not json"),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn load_reports_missing_file() {
        let err = GameplayConfig::load("/nonexistent/runfall.json").unwrap_err();
        assert!(err.to_string().contains("reading gameplay config"));
    }
}
