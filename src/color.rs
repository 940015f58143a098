//! Colors and the item color encoding.

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::PlacedItem;

/// Scene background.
pub const BACKGROUND: u32 = 0x1a1a1a;
/// Container wireframe and open-face tint.
pub const CONTAINER_EDGES: u32 = 0x4080ff;
/// Outline drawn around every item box.
pub const ITEM_EDGES: u32 = 0x000000;
/// Hover tint for the item under the pointer.
pub const HOVER: u32 = 0xffff00;
/// Target color of the selection pulse.
pub const WHITE: u32 = 0xffffff;

pub const WASTE: u32 = 0xff0000;
pub const EXPIRED: u32 = 0xff9900;
pub const PRIORITY_HIGH: u32 = 0x00ff00;
pub const PRIORITY_MEDIUM: u32 = 0xffff00;
pub const PRIORITY_LOW: u32 = 0x0099ff;

pub const PRIORITY_HIGH_THRESHOLD: i64 = 80;
pub const PRIORITY_MEDIUM_THRESHOLD: i64 = 50;

/// An RGB color with channels in `0.0..=1.0`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Color {
    /// Creates a color from a `0xRRGGBB` value.
    pub fn from_hex(hex: u32) -> Self {
        Self {
            r: f64::from((hex >> 16) & 0xff) / 255.0,
            g: f64::from((hex >> 8) & 0xff) / 255.0,
            b: f64::from(hex & 0xff) / 255.0,
        }
    }

    /// Packs the color back into `0xRRGGBB`, rounding each channel.
    pub fn to_hex(&self) -> u32 {
        let channel = |v: f64| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
        (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }

    /// Linear interpolation towards `other`; `alpha` is clamped to `0.0..=1.0`.
    pub fn lerp(&self, other: &Self, alpha: f64) -> Self {
        let alpha = alpha.clamp(0.0, 1.0);
        Self {
            r: self.r + (other.r - self.r) * alpha,
            g: self.g + (other.g - self.g) * alpha,
            b: self.b + (other.b - self.b) * alpha,
        }
    }
}

/// Base color of an item box.
///
/// Evaluated in order, first match wins: waste, expired, then the
/// priority thresholds.
pub fn item_color(item: &PlacedItem) -> u32 {
    if item.is_waste {
        WASTE
    } else if item.is_expired {
        EXPIRED
    } else if item.priority >= PRIORITY_HIGH_THRESHOLD {
        PRIORITY_HIGH
    } else if item.priority >= PRIORITY_MEDIUM_THRESHOLD {
        PRIORITY_MEDIUM
    } else {
        PRIORITY_LOW
    }
}

/// Formats a color value the way the frame description carries it.
pub fn hex_string(hex: u32) -> String {
    format!("#{:06x}", hex & 0xffffff)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::item;

    fn with_flags(priority: i64, is_waste: bool, is_expired: bool) -> PlacedItem {
        let mut it = item("x", Some((0.0, 0.0, 0.0)), (1.0, 1.0, 1.0));
        it.priority = priority;
        it.is_waste = is_waste;
        it.is_expired = is_expired;
        it
    }

    #[test]
    fn waste_wins_over_priority() {
        assert_eq!(item_color(&with_flags(95, true, false)), WASTE);
        assert_eq!(item_color(&with_flags(95, true, true)), WASTE);
    }

    #[test]
    fn expired_wins_over_priority() {
        assert_eq!(item_color(&with_flags(95, false, true)), EXPIRED);
    }

    #[test]
    fn priority_thresholds_are_inclusive() {
        assert_eq!(item_color(&with_flags(80, false, false)), PRIORITY_HIGH);
        assert_eq!(item_color(&with_flags(79, false, false)), PRIORITY_MEDIUM);
        assert_eq!(item_color(&with_flags(50, false, false)), PRIORITY_MEDIUM);
        assert_eq!(item_color(&with_flags(49, false, false)), PRIORITY_LOW);
        assert_eq!(item_color(&with_flags(0, false, false)), PRIORITY_LOW);
    }

    #[test]
    fn hex_roundtrip_and_lerp_endpoints() {
        let orange = Color::from_hex(EXPIRED);
        assert_eq!(orange.to_hex(), EXPIRED);

        let white = Color::from_hex(WHITE);
        assert_eq!(orange.lerp(&white, 0.0).to_hex(), EXPIRED);
        assert_eq!(orange.lerp(&white, 1.0).to_hex(), WHITE);
        assert_eq!(orange.lerp(&white, 7.0).to_hex(), WHITE);
    }

    #[test]
    fn lerp_halfway_between_black_and_white() {
        let mid = Color::from_hex(0x000000).lerp(&Color::from_hex(WHITE), 0.5);
        assert_eq!(mid.to_hex(), 0x808080);
        assert_eq!(hex_string(mid.to_hex()), "#808080");
    }
}
