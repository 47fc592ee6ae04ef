//! Configuration for the contour extraction stage

use crate::contour::ContourBuildFlags;
use navgen_common::{Error, Result};

/// Parameters controlling contour simplification
#[derive(Debug, Clone)]
pub struct ContourBuildConfig {
    /// The maximum distance a simplified contour's border edges should
    /// deviate from the original raw contour, in world units
    pub max_simplification_error: f32,
    /// The maximum allowed length for contour edges along the border of the
    /// mesh, in cells. Zero disables edge splitting.
    pub max_edge_len: i32,
    /// Which edge classes get tessellated by the length-split pass
    pub flags: ContourBuildFlags,
}

impl Default for ContourBuildConfig {
    fn default() -> Self {
        Self {
            max_simplification_error: 1.3,
            max_edge_len: 12,
            flags: ContourBuildFlags::default(),
        }
    }
}

impl ContourBuildConfig {
    /// Validates the configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.max_simplification_error < 0.0 {
            return Err(Error::InvalidInput(
                "negative simplification error".to_string(),
            ));
        }
        if self.max_edge_len < 0 {
            return Err(Error::InvalidInput("negative max edge length".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(ContourBuildConfig::default().validate().is_ok());

        let bad = ContourBuildConfig {
            max_simplification_error: -1.0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = ContourBuildConfig {
            max_edge_len: -4,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
