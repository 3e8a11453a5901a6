use crate::error::{TensorError, TensorResult};
use crate::shape::Shape;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of the channel axis in a per-sample image shape.
///
/// Shapes here never include the batch axis, so a channels-last image is
/// `[H, W, C]` and a channels-first image is `[C, H, W]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    #[default]
    ChannelsLast,
    ChannelsFirst,
}

impl DataFormat {
    /// Index of the channel axis in a rank-3 image shape.
    pub fn channel_axis(self) -> usize {
        match self {
            DataFormat::ChannelsLast => 2,
            DataFormat::ChannelsFirst => 0,
        }
    }

    /// Indices of the (height, width) axes in a rank-3 image shape.
    pub fn spatial_axes(self) -> (usize, usize) {
        match self {
            DataFormat::ChannelsLast => (0, 1),
            DataFormat::ChannelsFirst => (1, 2),
        }
    }

    /// Split a rank-3 image shape into `(height, width, channels)`.
    pub fn split(self, shape: &Shape) -> TensorResult<(usize, usize, usize)> {
        if shape.ndim() != 3 {
            return Err(TensorError::InvalidAxis {
                axis: 2,
                ndim: shape.ndim(),
            });
        }
        let (ha, wa) = self.spatial_axes();
        Ok((shape.dim(ha)?, shape.dim(wa)?, shape.dim(self.channel_axis())?))
    }

    /// Build a rank-3 image shape from `(height, width, channels)`.
    pub fn image_shape(self, h: usize, w: usize, c: usize) -> Shape {
        match self {
            DataFormat::ChannelsLast => Shape::new(vec![h, w, c]),
            DataFormat::ChannelsFirst => Shape::new(vec![c, h, w]),
        }
    }

    /// Multi-index of pixel `(y, x)` in channel `ch`.
    pub fn index(self, y: usize, x: usize, ch: usize) -> [usize; 3] {
        match self {
            DataFormat::ChannelsLast => [y, x, ch],
            DataFormat::ChannelsFirst => [ch, y, x],
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::ChannelsLast => write!(f, "channels_last"),
            DataFormat::ChannelsFirst => write!(f, "channels_first"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_channels_last() {
        let s = Shape::new(vec![32, 28, 3]);
        assert_eq!(DataFormat::ChannelsLast.split(&s).unwrap(), (32, 28, 3));
        assert_eq!(DataFormat::ChannelsLast.channel_axis(), 2);
    }

    #[test]
    fn test_split_channels_first() {
        let s = Shape::new(vec![3, 32, 28]);
        assert_eq!(DataFormat::ChannelsFirst.split(&s).unwrap(), (32, 28, 3));
        assert_eq!(
            DataFormat::ChannelsFirst.image_shape(32, 28, 3).dims(),
            &[3, 32, 28]
        );
    }

    #[test]
    fn test_split_rejects_wrong_rank() {
        let s = Shape::new(vec![32, 32]);
        assert!(DataFormat::ChannelsLast.split(&s).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(DataFormat::ChannelsFirst.to_string(), "channels_first");
        assert_eq!(DataFormat::default().to_string(), "channels_last");
    }
}
