//! Animated light styles
//!
//! Each style is a string of levels `a`..`z` played at 10 Hz; `m` is
//! normal brightness (1.0), `a` is dark and `z` is roughly double.

use crate::constants::{LIGHT_STYLE_HZ, LIGHT_STYLE_NORMAL, MAX_LIGHT_STYLES, REFERENCE_TICK_HZ};
use crate::error::{RenderError, RenderResult};

/// Classic patterns for the first styles; the rest stay steady
const DEFAULT_PATTERNS: [&str; 12] = [
    // 0 normal
    "m",
    // 1 flicker
    "mmnmmommommnonmmonqnmmo",
    // 2 slow strong pulse
    "abcdefghijklmnopqrstuvwxyzyxwvutsrqponmlkjihgfedcba",
    // 3 candle
    "mmmmmaaaaammmmmaaaaaabcdefgabcdefg",
    // 4 fast strobe
    "mamamamamama",
    // 5 gentle pulse
    "jklmnopqrstuvwxyzyxwvutsrqponmlkj",
    // 6 flicker
    "nmonqnmomnmomomno",
    // 7 candle
    "mmmaaaabcdefgmmmmaaaammmaamm",
    // 8 candle
    "mmmaaammmaaammmabcdefaaaammmmabcdefmmmaaaa",
    // 9 slow strobe
    "aaaaaaaazzzzzzzz",
    // 10 fluorescent flicker
    "mmamammmmammamamaaamammma",
    // 11 slow pulse, not fading to black
    "abcdefghijklmnopqrrqponmlkjihgfedcba",
];

/// Style patterns plus the animation clock
#[derive(Debug, Clone)]
pub struct LightStyles {
    patterns: Vec<Vec<u8>>,
    elapsed_seconds: f64,
    values: [f32; MAX_LIGHT_STYLES],
}

impl Default for LightStyles {
    fn default() -> Self {
        Self::new()
    }
}

impl LightStyles {
    pub fn new() -> Self {
        let mut patterns = vec![vec![LIGHT_STYLE_NORMAL]; MAX_LIGHT_STYLES];
        for (slot, pattern) in patterns.iter_mut().zip(DEFAULT_PATTERNS) {
            *slot = pattern.as_bytes().to_vec();
        }

        let mut styles = Self {
            patterns,
            elapsed_seconds: 0.0,
            values: [1.0; MAX_LIGHT_STYLES],
        };
        styles.refresh();
        styles
    }

    /// Replace one style's pattern. An empty pattern means steady normal.
    pub fn set_pattern(&mut self, index: usize, pattern: &str) -> RenderResult<()> {
        if index >= MAX_LIGHT_STYLES {
            return Err(RenderError::InvalidConfig {
                field: "light_style".to_string(),
                value: index.to_string(),
                reason: format!("index must be below {}", MAX_LIGHT_STYLES),
            });
        }
        if let Some(bad) = pattern.chars().find(|c| !c.is_ascii_lowercase()) {
            return Err(RenderError::InvalidConfig {
                field: format!("light_style[{}]", index),
                value: pattern.to_string(),
                reason: format!("'{}' is not a level between 'a' and 'z'", bad),
            });
        }

        self.patterns[index] = if pattern.is_empty() {
            vec![LIGHT_STYLE_NORMAL]
        } else {
            pattern.as_bytes().to_vec()
        };
        self.refresh();
        Ok(())
    }

    /// Advance the animation clock by a frame step in reference ticks
    pub fn advance(&mut self, ticks: f64) {
        self.elapsed_seconds += ticks / REFERENCE_TICK_HZ as f64;
        self.refresh();
    }

    /// Current scale of every style, ready for upload
    pub fn values(&self) -> &[f32; MAX_LIGHT_STYLES] {
        &self.values
    }

    fn refresh(&mut self) {
        let frame = (self.elapsed_seconds * LIGHT_STYLE_HZ).floor() as usize;
        for (value, pattern) in self.values.iter_mut().zip(&self.patterns) {
            *value = level_scale(pattern[frame % pattern.len()]);
        }
    }
}

/// Scale of a single pattern level; `m` is 1.0
fn level_scale(level: u8) -> f32 {
    (level - b'a') as f32 / (LIGHT_STYLE_NORMAL - b'a') as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let styles = LightStyles::new();
        assert_eq!(styles.values()[0], 1.0);
        assert_eq!(styles.values()[63], 1.0);
        // Style 2 starts on 'a'
        assert_eq!(styles.values()[2], 0.0);
    }

    #[test]
    fn test_animation_advances_at_ten_hz() {
        let mut styles = LightStyles::new();
        // Style 4 alternates m/a every tenth of a second (6 ticks)
        assert_eq!(styles.values()[4], 1.0);
        styles.advance(6.0);
        assert_eq!(styles.values()[4], 0.0);
        styles.advance(6.0);
        assert_eq!(styles.values()[4], 1.0);
        // Steady styles never change
        assert_eq!(styles.values()[0], 1.0);
    }

    #[test]
    fn test_level_scale() {
        assert_eq!(level_scale(b'a'), 0.0);
        assert_eq!(level_scale(b'm'), 1.0);
        assert!((level_scale(b'z') - 25.0 / 12.0).abs() < 1e-6);
    }

    #[test]
    fn test_set_pattern() {
        let mut styles = LightStyles::new();
        styles.set_pattern(32, "z").unwrap();
        assert!(styles.values()[32] > 2.0);

        styles.set_pattern(32, "").unwrap();
        assert_eq!(styles.values()[32], 1.0);

        assert!(styles.set_pattern(64, "m").is_err());
        assert!(matches!(
            styles.set_pattern(5, "mM"),
            Err(RenderError::InvalidConfig { .. })
        ));
    }
}
