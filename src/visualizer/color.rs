// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use image::Rgb;

/// Color type for visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    /// Blue color.
    pub const BLUE: Self = Self(0, 0, 255);
    /// White color.
    pub const WHITE: Self = Self(255, 255, 255);

    /// Get a color from the pose palette by index.
    #[must_use]
    pub const fn from_pose_index(index: usize) -> Self {
        let color = POSE_COLORS[index % POSE_COLORS.len()];
        Self(color[0], color[1], color[2])
    }

    /// Get a color from the `OpenPose` body palette by limb or joint index.
    #[must_use]
    pub const fn from_openpose_index(index: usize) -> Self {
        let color = OPENPOSE_COLORS[index % OPENPOSE_COLORS.len()];
        Self(color[0], color[1], color[2])
    }

    /// Fully saturated, full-value color at `hue` in [0, 1).
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn from_hue(hue: f32) -> Self {
        let h = hue.rem_euclid(1.0) * 6.0;
        let sector = h.floor() as u8;
        let f = h - h.floor();
        let rise = (f * 255.0).round() as u8;
        let fall = ((1.0 - f) * 255.0).round() as u8;
        match sector {
            0 => Self(255, rise, 0),
            1 => Self(fall, 255, 0),
            2 => Self(0, 255, rise),
            3 => Self(0, fall, 255),
            4 => Self(rise, 0, 255),
            _ => Self(255, 0, fall),
        }
    }

    /// Each channel multiplied by `factor` and truncated.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    #[must_use]
    pub fn scaled(self, factor: f32) -> Self {
        let s = |c: u8| (f32::from(c) * factor).clamp(0.0, 255.0) as u8;
        Self(s(self.0), s(self.1), s(self.2))
    }
}

impl From<Color> for Rgb<u8> {
    fn from(c: Color) -> Self {
        Self([c.0, c.1, c.2])
    }
}

/// Ultralytics Pose Color Palette
pub const POSE_COLORS: [[u8; 3]; 20] = [
    [255, 128, 0],   // #ff8000
    [255, 153, 51],  // #ff9933
    [255, 178, 102], // #ffb266
    [230, 230, 0],   // #e6e600
    [255, 153, 255], // #ff99ff
    [153, 204, 255], // #99ccff
    [255, 102, 255], // #ff66ff
    [255, 51, 255],  // #ff33ff
    [102, 178, 255], // #66b2ff
    [51, 153, 255],  // #3399ff
    [255, 153, 153], // #ff9999
    [255, 102, 102], // #ff6666
    [255, 51, 51],   // #ff3333
    [153, 255, 153], // #99ff99
    [102, 255, 102], // #66ff66
    [51, 255, 51],   // #33ff33
    [0, 255, 0],     // #00ff00
    [0, 0, 255],     // #0000ff
    [255, 0, 0],     // #ff0000
    [255, 255, 255], // #ffffff
];

/// `OpenPose` body palette, one color per limb and joint.
pub const OPENPOSE_COLORS: [[u8; 3]; 18] = [
    [255, 0, 0],
    [255, 85, 0],
    [255, 170, 0],
    [255, 255, 0],
    [170, 255, 0],
    [85, 255, 0],
    [0, 255, 0],
    [0, 255, 85],
    [0, 255, 170],
    [0, 255, 255],
    [0, 170, 255],
    [0, 85, 255],
    [0, 0, 255],
    [85, 0, 255],
    [170, 0, 255],
    [255, 0, 255],
    [255, 0, 170],
    [255, 0, 85],
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_hue() {
        assert_eq!(Color::from_hue(0.0), Color(255, 0, 0));
        assert_eq!(Color::from_hue(1.0 / 3.0), Color(0, 255, 0));
        assert_eq!(Color::from_hue(2.0 / 3.0), Color(0, 0, 255));
        assert_eq!(Color::from_hue(1.0), Color(255, 0, 0));
    }

    #[test]
    fn test_scaled() {
        assert_eq!(Color(255, 85, 0).scaled(0.6), Color(153, 51, 0));
    }

    #[test]
    fn test_palette_wraps() {
        assert_eq!(Color::from_pose_index(20), Color::from_pose_index(0));
        assert_eq!(Color::from_openpose_index(18), Color(255, 0, 0));
    }
}
