// File: transform.rs
// License: Apache v2.0

use super::error::{Result, SceneError};
use na::{Matrix3, Matrix3xX, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
struct Normalize {
    center: Vector3<f64>,
    extent: f64,
}

/// Per-object affine transform.
///
/// Applied in a fixed order: normalize, rotate, scale, translate.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Transform {
    normalize: Option<Normalize>,
    rotation: Matrix3<f64>,
    scale: f64,
    translate: Vector3<f64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            normalize: None,
            rotation: Matrix3::identity(),
            scale: 1.0,
            translate: Vector3::zeros(),
        }
    }
}

impl Transform {
    pub fn rotation(&self) -> &Matrix3<f64> {
        &self.rotation
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn translate(&self) -> &Vector3<f64> {
        &self.translate
    }

    pub fn is_normalized(&self) -> bool {
        self.normalize.is_some()
    }

    /// Recenters at `center` and divides by the largest component of `size`.
    pub fn set_normalize(&mut self, size: &Vector3<f64>, center: &Vector3<f64>) -> Result<()> {
        if self.normalize.is_some() {
            return Err(SceneError::AlreadyNormalized);
        }
        self.normalize = Some(Normalize {
            center: *center,
            extent: size.max(),
        });
        Ok(())
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.scale = scale;
    }

    pub fn set_translate(&mut self, translate: Vector3<f64>) {
        self.translate = translate;
    }

    /// Left-multiplies an axis rotation given in degrees.
    pub fn rotate(&mut self, angle: f64, axis: &str) -> Result<()> {
        let theta = angle.to_radians();
        let (c, s) = (theta.cos(), theta.sin());
        let rot = match axis.to_lowercase().as_str() {
            "x" => Matrix3::new(1.0, 0.0, 0.0, 0.0, c, -s, 0.0, s, c),
            "y" => Matrix3::new(c, 0.0, s, 0.0, 1.0, 0.0, -s, 0.0, c),
            "z" => Matrix3::new(c, -s, 0.0, s, c, 0.0, 0.0, 0.0, 1.0),
            _ => return Err(SceneError::InvalidAxis(axis.to_string())),
        };
        self.rotation = rot * self.rotation;
        Ok(())
    }

    pub fn apply(&self, x: &Matrix3xX<f64>) -> Matrix3xX<f64> {
        let mut x = x.clone();
        if let Some(normalize) = self.normalize {
            for mut col in x.column_iter_mut() {
                col -= normalize.center;
                col /= normalize.extent;
            }
        }
        let mut x = self.rotation * x;
        for mut col in x.column_iter_mut() {
            col *= self.scale;
            col += self.translate;
        }
        x
    }
}
