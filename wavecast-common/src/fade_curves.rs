//! Fade curve implementations for crossfade assembly
//!
//! Provides the curve shapes used when rejoining background bed zones
//! (intro/body/outro) with sample-accurate crossfades.

use serde::{Deserialize, Serialize};
use std::f32::consts::FRAC_PI_2;

/// Fade curve types for crossfading
///
/// - Linear: constant rate of change (precise, predictable)
/// - SCurve: smooth acceleration and deceleration (gentle, musical)
/// - EqualPower: constant perceived loudness during crossfade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// Linear: v(t) = t
    Linear,

    /// S-Curve: v(t) = 0.5 × (1 - cos(π × t))
    SCurve,

    /// Equal-Power: v(t) = sin(t × π/2)
    /// Maintains constant perceived loudness, the default for bed zone joins
    EqualPower,
}

impl FadeCurve {
    /// Fade-in multiplier at the given normalized position
    ///
    /// # Arguments
    /// * `position` - Normalized position through fade (0.0 to 1.0)
    ///
    /// # Returns
    /// Volume multiplier (0.0 = silence, 1.0 = full volume)
    pub fn fade_in_gain(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => t,
            FadeCurve::SCurve => 0.5 * (1.0 - (std::f32::consts::PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Fade-out multiplier at the given normalized position
    ///
    /// # Arguments
    /// * `position` - Normalized position through fade (0.0 to 1.0)
    ///
    /// # Returns
    /// Volume multiplier (1.0 = full volume, 0.0 = silence)
    pub fn fade_out_gain(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::SCurve => 0.5 * (1.0 + (std::f32::consts::PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
        }
    }

    /// Parse curve from a configuration string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Some(FadeCurve::Linear),
            "cosine" | "scurve" | "s-curve" | "s_curve" => Some(FadeCurve::SCurve),
            "equal_power" | "equalpower" => Some(FadeCurve::EqualPower),
            _ => None,
        }
    }

    /// All available fade curve variants
    pub fn all_variants() -> &'static [FadeCurve] {
        &[FadeCurve::Linear, FadeCurve::SCurve, FadeCurve::EqualPower]
    }
}

impl Default for FadeCurve {
    /// Equal-power keeps the bed at constant perceived loudness across joins
    fn default() -> Self {
        FadeCurve::EqualPower
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fade_in_bounds() {
        for curve in FadeCurve::all_variants() {
            let start_val = curve.fade_in_gain(0.0);
            let end_val = curve.fade_in_gain(1.0);
            assert!(
                (start_val - 0.0).abs() < 0.01,
                "{:?} fade-in at 0.0 should be ~0.0, got {}",
                curve,
                start_val
            );
            assert!(
                (end_val - 1.0).abs() < 0.01,
                "{:?} fade-in at 1.0 should be ~1.0, got {}",
                curve,
                end_val
            );
        }
    }

    #[test]
    fn test_fade_out_bounds() {
        for curve in FadeCurve::all_variants() {
            let start_val = curve.fade_out_gain(0.0);
            let end_val = curve.fade_out_gain(1.0);
            assert!(
                (start_val - 1.0).abs() < 0.01,
                "{:?} fade-out at 0.0 should be ~1.0, got {}",
                curve,
                start_val
            );
            assert!(
                (end_val - 0.0).abs() < 0.01,
                "{:?} fade-out at 1.0 should be ~0.0, got {}",
                curve,
                end_val
            );
        }
    }

    #[test]
    fn test_equal_power_constant_energy() {
        // Summed energy of fade-in and fade-out stays ~1.0 across the window
        let curve = FadeCurve::EqualPower;
        for i in 0..=10 {
            let t = i as f32 / 10.0;
            let energy = curve.fade_in_gain(t).powi(2) + curve.fade_out_gain(t).powi(2);
            assert!((energy - 1.0).abs() < 0.001, "energy {} at t={}", energy, t);
        }
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(FadeCurve::parse("cosine"), Some(FadeCurve::SCurve));
        assert_eq!(FadeCurve::parse("s_curve"), Some(FadeCurve::SCurve));
        assert_eq!(FadeCurve::parse("equal_power"), Some(FadeCurve::EqualPower));
        assert_eq!(FadeCurve::parse("LINEAR"), Some(FadeCurve::Linear));
        assert_eq!(FadeCurve::parse("invalid"), None);
    }

    #[test]
    fn test_default() {
        assert_eq!(FadeCurve::default(), FadeCurve::EqualPower);
    }
}
