//! Game configuration
//!
//! Loaded from JSON; every field has a default so partial files work.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::ConfigError;
use crate::games::crash::CrashConfig;
use crate::games::mines::MinesConfig;
use crate::multiplier::{MultiplierCurve, MultiplierTable, RiskLevel, validate_target_return};
use crate::sim::board::{Board, BoardLayout};
use crate::sim::tick::PhysicsParams;

/// Multiplier curve per risk level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskCurves {
    pub low: MultiplierCurve,
    pub medium: MultiplierCurve,
    pub high: MultiplierCurve,
}

impl Default for RiskCurves {
    fn default() -> Self {
        Self {
            low: MultiplierCurve::for_risk(RiskLevel::Low),
            medium: MultiplierCurve::for_risk(RiskLevel::Medium),
            high: MultiplierCurve::for_risk(RiskLevel::High),
        }
    }
}

impl RiskCurves {
    pub fn get(&self, risk: RiskLevel) -> &MultiplierCurve {
        match risk {
            RiskLevel::Low => &self.low,
            RiskLevel::Medium => &self.medium,
            RiskLevel::High => &self.high,
        }
    }
}

/// Full game configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    // === Plinko board ===
    /// Ball physics tuning
    pub physics: PhysicsParams,
    /// Peg lattice geometry
    pub board: BoardLayout,
    /// Initial risk level
    pub risk: RiskLevel,
    /// Initial pocket count
    pub pockets: usize,
    /// Payout curve per risk level
    pub curves: RiskCurves,
    /// Return-to-player target; `None` uses the raw curve
    pub target_return: Option<f64>,

    // === Loop ===
    /// Ticks a settled ball stays on the board
    pub retention_ticks: u32,
    /// Max ticks per host frame
    pub max_substeps: u32,
    /// Recent results kept in history
    pub history_len: usize,
    /// Ledger entries kept in the audit journal
    pub journal_len: usize,

    // === Other games ===
    pub mines: MinesConfig,
    pub crash: CrashConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            physics: PhysicsParams::default(),
            board: BoardLayout::default(),
            risk: RiskLevel::Low,
            pockets: DEFAULT_POCKETS,
            curves: RiskCurves::default(),
            target_return: Some(DEFAULT_TARGET_RETURN),
            retention_ticks: RETENTION_TICKS,
            max_substeps: MAX_SUBSTEPS,
            history_len: crate::history::DEFAULT_HISTORY_LEN,
            journal_len: JOURNAL_LEN,
            mines: MinesConfig::default(),
            crash: CrashConfig::default(),
        }
    }
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.board.validate()?;
        self.physics.validate(self.board.ball_radius)?;
        for risk in RiskLevel::ALL {
            self.curves.get(risk).validate()?;
        }
        if !(MIN_POCKETS..=MAX_POCKETS).contains(&self.pockets) {
            return Err(ConfigError::PocketCount {
                count: self.pockets,
                min: MIN_POCKETS,
                max: MAX_POCKETS,
            });
        }
        if let Some(target) = self.target_return {
            validate_target_return(target)?;
        }
        if self.journal_len == 0 {
            return Err(ConfigError::InvalidValue {
                field: "journal_len",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_substeps == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_substeps",
                reason: "must be at least 1".to_string(),
            });
        }
        self.mines.validate()?;
        self.crash.validate()?;
        Ok(())
    }

    /// Board for a pocket count under this layout
    pub fn board_for(&self, pockets: usize) -> Result<Board, ConfigError> {
        Board::new(self.board, pockets)
    }

    /// Payout table for (risk, pockets), calibrated when a target is set
    pub fn table_for(&self, risk: RiskLevel, pockets: usize) -> Result<MultiplierTable, ConfigError> {
        let table = MultiplierTable::generate(risk, pockets, self.curves.get(risk))?;
        match self.target_return {
            Some(target) => table.calibrate(target),
            None => Ok(table),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)?;
        log::info!("Config saved to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        GameConfig::default().validate().unwrap();
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = GameConfig::from_json(r#"{ "risk": "high", "pockets": 9 }"#).unwrap();
        assert_eq!(config.risk, RiskLevel::High);
        assert_eq!(config.pockets, 9);
        assert_eq!(config.physics, PhysicsParams::default());
    }

    #[test]
    fn test_json_roundtrip() {
        let config = GameConfig {
            target_return: None,
            pockets: 11,
            ..Default::default()
        };
        let parsed = GameConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            GameConfig::from_json(r#"{ "pockets": 40 }"#),
            Err(ConfigError::PocketCount { count: 40, .. })
        ));
        assert!(matches!(
            GameConfig::from_json(r#"{ "target_return": 1.5 }"#),
            Err(ConfigError::InvalidValue { field: "target_return", .. })
        ));
        assert!(matches!(
            GameConfig::from_json(r#"{ "target_return": 0.1 }"#),
            Err(ConfigError::InvalidValue { field: "target_return", .. })
        ));
        assert!(matches!(
            GameConfig::from_json(
                r#"{ "curves": { "low": { "min": 0.5, "mid": 1.0, "max": 1e9, "inner_threshold": 0.3, "exponent": 1.4 } } }"#
            ),
            Err(ConfigError::InvalidValue { field: "multiplier_curve", .. })
        ));
        assert!(matches!(
            GameConfig::from_json(r#"{ "journal_len": 0 }"#),
            Err(ConfigError::InvalidValue { field: "journal_len", .. })
        ));
        assert!(matches!(
            GameConfig::from_json(r#"{ "risk": "extreme" }"#),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_table_for_calibrates() {
        let config = GameConfig::default();
        let table = config.table_for(RiskLevel::High, 13).unwrap();
        assert!(table.expected_return() <= DEFAULT_TARGET_RETURN + 1e-9);

        let raw = GameConfig {
            target_return: None,
            ..Default::default()
        };
        assert_eq!(
            raw.table_for(RiskLevel::Low, 10).unwrap(),
            MultiplierTable::standard(RiskLevel::Low, 10).unwrap()
        );
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("peg-casino-config-{}.json", std::process::id()));
        let config = GameConfig {
            pockets: 7,
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = GameConfig::load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            GameConfig::load("/definitely/not/here.json"),
            Err(ConfigError::Io(_))
        ));
    }
}
