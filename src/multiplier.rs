//! Risk-dependent payout tables
//!
//! One parameterized curve generator for every board: each risk level is a
//! `MultiplierCurve` (configuration data), and a table is the curve sampled
//! at `count` pockets.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_CURVE_MULTIPLIER, MAX_POCKETS, MIN_POCKETS, MIN_TARGET_RETURN};
use crate::error::ConfigError;

/// Risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    #[default]
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" | "med" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            _ => Err(ConfigError::UnknownRisk(s.to_string())),
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payout multiplier in hundredths (`250` = 2.5x)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Multiplier(pub u32);

impl Multiplier {
    pub const ONE: Multiplier = Multiplier(100);

    /// Saturates at `u32::MAX` hundredths
    pub fn from_tenths(tenths: u32) -> Self {
        Multiplier(tenths.saturating_mul(10))
    }

    pub fn hundredths(self) -> u32 {
        self.0
    }

    pub fn as_f64(self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// `floor(wager * self)` in minor units
    pub fn apply(self, wager: u64) -> u64 {
        let payout = wager as u128 * self.0 as u128 / 100;
        payout.min(u64::MAX as u128) as u64
    }
}

impl fmt::Display for Multiplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / 100;
        let frac = self.0 % 100;
        if frac % 10 == 0 {
            write!(f, "{}.{}x", whole, frac / 10)
        } else {
            write!(f, "{}.{:02}x", whole, frac)
        }
    }
}

/// Shape of a multiplier table.
///
/// Linear from `min` (center) to `mid` inside `inner_threshold`, then
/// `mid → max` along `t^exponent` out to the edges.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MultiplierCurve {
    pub min: f64,
    pub mid: f64,
    pub max: f64,
    pub inner_threshold: f64,
    pub exponent: f64,
}

impl MultiplierCurve {
    /// Default curve for a risk level; higher risk concentrates more value
    /// at the edges
    pub fn for_risk(risk: RiskLevel) -> Self {
        match risk {
            RiskLevel::Low => Self {
                min: 0.5,
                mid: 1.0,
                max: 5.6,
                inner_threshold: 0.3,
                exponent: 1.4,
            },
            RiskLevel::Medium => Self {
                min: 0.4,
                mid: 1.1,
                max: 13.0,
                inner_threshold: 0.25,
                exponent: 2.0,
            },
            RiskLevel::High => Self {
                min: 0.2,
                mid: 1.2,
                max: 29.0,
                inner_threshold: 0.2,
                exponent: 2.6,
            },
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let finite = [self.min, self.mid, self.max, self.inner_threshold, self.exponent]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            return Err(ConfigError::InvalidValue {
                field: "multiplier_curve",
                reason: "values must be finite".to_string(),
            });
        }
        if !(self.min > 0.0 && self.min <= self.mid && self.mid <= self.max) {
            return Err(ConfigError::InvalidValue {
                field: "multiplier_curve",
                reason: format!(
                    "need 0 < min <= mid <= max, got {} / {} / {}",
                    self.min, self.mid, self.max
                ),
            });
        }
        if self.max > MAX_CURVE_MULTIPLIER {
            return Err(ConfigError::InvalidValue {
                field: "multiplier_curve",
                reason: format!("max must be at most {MAX_CURVE_MULTIPLIER}, got {}", self.max),
            });
        }
        if !(self.inner_threshold > 0.0 && self.inner_threshold < 1.0) {
            return Err(ConfigError::InvalidValue {
                field: "inner_threshold",
                reason: format!("must be within (0, 1), got {}", self.inner_threshold),
            });
        }
        if self.exponent <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "exponent",
                reason: format!("must be positive, got {}", self.exponent),
            });
        }
        Ok(())
    }

    /// Curve value at `position` (0 = center, 1 = edge)
    pub fn sample(&self, position: f64) -> f64 {
        if position < self.inner_threshold {
            let t = position / self.inner_threshold;
            self.min + (self.mid - self.min) * t
        } else {
            let t = ((position - self.inner_threshold) / (1.0 - self.inner_threshold))
                .clamp(0.0, 1.0)
                .powf(self.exponent);
            self.mid + (self.max - self.mid) * t
        }
    }
}

/// Return-to-player targets must lie in `[MIN_TARGET_RETURN, 1]`
pub fn validate_target_return(target: f64) -> Result<(), ConfigError> {
    if !(target.is_finite() && (MIN_TARGET_RETURN..=1.0).contains(&target)) {
        return Err(ConfigError::InvalidValue {
            field: "target_return",
            reason: format!("must be within [{MIN_TARGET_RETURN}, 1], got {target}"),
        });
    }
    Ok(())
}

/// Ordered pocket multipliers for one (risk, pocket count) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiplierTable {
    pub risk: RiskLevel,
    multipliers: Vec<Multiplier>,
}

impl MultiplierTable {
    /// Sample `curve` at `count` pockets, rounded to one decimal
    pub fn generate(
        risk: RiskLevel,
        count: usize,
        curve: &MultiplierCurve,
    ) -> Result<Self, ConfigError> {
        if !(MIN_POCKETS..=MAX_POCKETS).contains(&count) {
            return Err(ConfigError::PocketCount {
                count,
                min: MIN_POCKETS,
                max: MAX_POCKETS,
            });
        }
        curve.validate()?;

        let center = (count - 1) as f64 / 2.0;
        let multipliers = (0..count)
            .map(|i| {
                let position = (i as f64 - center).abs() / center;
                let tenths = (curve.sample(position) * 10.0).round().max(1.0);
                Multiplier::from_tenths(tenths as u32)
            })
            .collect();

        Ok(Self { risk, multipliers })
    }

    /// Generate with the built-in curve for `risk`
    pub fn standard(risk: RiskLevel, count: usize) -> Result<Self, ConfigError> {
        Self::generate(risk, count, &MultiplierCurve::for_risk(risk))
    }

    /// Rescale so the binomial expected return is at most `target`.
    ///
    /// Each value is floored to one decimal (minimum 0.1x), which keeps the
    /// table symmetric and monotonic. The scale shrinks until the floored
    /// table is under the target.
    pub fn calibrate(&self, target: f64) -> Result<Self, ConfigError> {
        validate_target_return(target)?;
        let mut scale = target / self.expected_return();
        loop {
            let table = self.scaled(scale);
            if table.expected_return() <= target {
                return Ok(table);
            }
            scale *= 0.99;
        }
    }

    fn scaled(&self, scale: f64) -> Self {
        let multipliers = self
            .multipliers
            .iter()
            .map(|m| {
                let tenths = m.hundredths() as f64 / 10.0;
                Multiplier::from_tenths((tenths * scale).floor().clamp(1.0, u32::MAX as f64) as u32)
            })
            .collect();
        Self {
            risk: self.risk,
            multipliers,
        }
    }

    pub fn len(&self) -> usize {
        self.multipliers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.multipliers.is_empty()
    }

    pub fn get(&self, pocket: usize) -> Option<Multiplier> {
        self.multipliers.get(pocket).copied()
    }

    pub fn as_slice(&self) -> &[Multiplier] {
        &self.multipliers
    }

    /// Probability of landing in each pocket for an ideal Galton lattice of
    /// `len - 1` rows: `C(n, k) / 2^n`
    pub fn landing_probabilities(&self) -> Vec<f64> {
        let n = self.multipliers.len().saturating_sub(1);
        let total = 2f64.powi(n as i32);
        let mut coeff = 1.0f64;
        (0..=n)
            .map(|k| {
                let p = coeff / total;
                coeff = coeff * (n - k) as f64 / (k + 1) as f64;
                p
            })
            .collect()
    }

    /// Expected payout per unit wager under the binomial landing model
    pub fn expected_return(&self) -> f64 {
        self.landing_probabilities()
            .iter()
            .zip(&self.multipliers)
            .map(|(p, m)| p * m.as_f64())
            .sum()
    }

    /// `1 - expected_return()`
    pub fn house_edge(&self) -> f64 {
        1.0 - self.expected_return()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::DEFAULT_TARGET_RETURN;
    use proptest::prelude::*;

    fn tenths(table: &MultiplierTable) -> Vec<u32> {
        table.as_slice().iter().map(|m| m.hundredths() / 10).collect()
    }

    #[test]
    fn test_low_ten_pockets() {
        let table = MultiplierTable::standard(RiskLevel::Low, 10).unwrap();
        assert_eq!(tenths(&table), vec![56, 37, 21, 11, 7, 7, 11, 21, 37, 56]);
    }

    #[test]
    fn test_center_is_min_edges_are_max() {
        let table = MultiplierTable::standard(RiskLevel::High, 9).unwrap();
        assert_eq!(table.get(4), Some(Multiplier::from_tenths(2)));
        assert_eq!(table.get(0), Some(Multiplier::from_tenths(290)));
        assert_eq!(table.get(8), Some(Multiplier::from_tenths(290)));
    }

    #[test]
    fn test_invalid_count() {
        assert!(matches!(
            MultiplierTable::standard(RiskLevel::Low, 3),
            Err(ConfigError::PocketCount { count: 3, .. })
        ));
        assert!(MultiplierTable::standard(RiskLevel::Low, 18).is_err());
    }

    #[test]
    fn test_invalid_curve() {
        let curve = MultiplierCurve {
            min: 2.0,
            ..MultiplierCurve::for_risk(RiskLevel::Low)
        };
        assert!(MultiplierTable::generate(RiskLevel::Low, 9, &curve).is_err());
    }

    #[test]
    fn test_huge_curve_max_rejected() {
        let curve = MultiplierCurve {
            max: 1.0e9,
            ..MultiplierCurve::for_risk(RiskLevel::Low)
        };
        assert!(matches!(
            MultiplierTable::generate(RiskLevel::Low, 9, &curve),
            Err(ConfigError::InvalidValue { field: "multiplier_curve", .. })
        ));

        let edge = MultiplierCurve {
            max: MAX_CURVE_MULTIPLIER,
            ..MultiplierCurve::for_risk(RiskLevel::Low)
        };
        let table = MultiplierTable::generate(RiskLevel::Low, 9, &edge).unwrap();
        assert_eq!(table.get(0), Some(Multiplier(1_000_000)));
        assert_eq!(Multiplier::from_tenths(u32::MAX), Multiplier(u32::MAX));
    }

    #[test]
    fn test_low_targets_rejected() {
        let table = MultiplierTable::standard(RiskLevel::High, 17).unwrap();
        assert!(table.calibrate(0.1).is_err());
        assert!(table.calibrate(MIN_TARGET_RETURN - 0.01).is_err());
        assert!(table.calibrate(1.01).is_err());
        assert!(table.calibrate(f64::NAN).is_err());
        let floor = table.calibrate(MIN_TARGET_RETURN).unwrap();
        assert!(floor.expected_return() <= MIN_TARGET_RETURN);
    }

    #[test]
    fn test_risk_from_str() {
        assert_eq!("MED".parse::<RiskLevel>().unwrap(), RiskLevel::Medium);
        assert_eq!("high".parse::<RiskLevel>().unwrap(), RiskLevel::High);
        assert!("extreme".parse::<RiskLevel>().is_err());
    }

    #[test]
    fn test_multiplier_apply_and_display() {
        let m = Multiplier::from_tenths(56);
        assert_eq!(m.apply(1000), 5600);
        assert_eq!(m.apply(3), 16);
        assert_eq!(m.to_string(), "5.6x");
        assert_eq!(Multiplier(125).to_string(), "1.25x");
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let table = MultiplierTable::standard(RiskLevel::Medium, 17).unwrap();
        let sum: f64 = table.landing_probabilities().iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_calibrated_tables_have_house_edge() {
        for risk in RiskLevel::ALL {
            for count in MIN_POCKETS..=MAX_POCKETS {
                let table = MultiplierTable::standard(risk, count)
                    .unwrap()
                    .calibrate(DEFAULT_TARGET_RETURN)
                    .unwrap();
                assert!(
                    table.expected_return() < 1.0,
                    "{risk} x {count}: return {}",
                    table.expected_return()
                );
                assert!(table.house_edge() > 0.0);
            }
        }
    }

    fn assert_shape(table: &MultiplierTable) {
        let n = table.len();
        let values = table.as_slice();
        for i in 0..n {
            assert_eq!(values[i], values[n - 1 - i], "asymmetric at {i}");
            assert!(values[i].hundredths() > 0);
        }
        // Non-decreasing walking outward from the center
        let center = (n - 1) / 2;
        for i in 0..center {
            assert!(values[i] >= values[i + 1], "not monotonic at {i}");
        }
    }

    proptest! {
        #[test]
        fn prop_tables_symmetric_and_monotonic(count in MIN_POCKETS..=MAX_POCKETS, risk_idx in 0usize..3) {
            let risk = RiskLevel::ALL[risk_idx];
            let table = MultiplierTable::standard(risk, count).unwrap();
            assert_shape(&table);
            assert_shape(&table.calibrate(DEFAULT_TARGET_RETURN).unwrap());
        }

        #[test]
        fn prop_calibrated_return_within_target(
            target in MIN_TARGET_RETURN..=1.0,
            count in MIN_POCKETS..=MAX_POCKETS,
            risk_idx in 0usize..3,
        ) {
            let risk = RiskLevel::ALL[risk_idx];
            let table = MultiplierTable::standard(risk, count).unwrap().calibrate(target).unwrap();
            prop_assert!(table.expected_return() <= target, "{} > {}", table.expected_return(), target);
            assert_shape(&table);
        }

        #[test]
        fn prop_custom_curves_keep_shape(
            min in 0.1f64..1.0,
            mid_extra in 0.0f64..2.0,
            max_extra in 0.0f64..50.0,
            inner in 0.05f64..0.95,
            exponent in 0.2f64..4.0,
            count in MIN_POCKETS..=MAX_POCKETS,
        ) {
            let curve = MultiplierCurve {
                min,
                mid: min + mid_extra,
                max: min + mid_extra + max_extra,
                inner_threshold: inner,
                exponent,
            };
            let table = MultiplierTable::generate(RiskLevel::Medium, count, &curve).unwrap();
            assert_shape(&table);
        }
    }
}
