// File: plot.rs
// License: Apache v2.0

use super::fixed::FixedScene;
use na::{Matrix2xX, Matrix3xX};

/// Receives preview geometry. Rendering lives entirely on the other side.
pub trait PlotSink {
    fn tri(&mut self, vert: &Matrix3xX<f64>, tri: &Matrix3xX<usize>, color: &Matrix3xX<f64>);
    fn edge(&mut self, vert: &Matrix3xX<f64>, edge: &Matrix2xX<usize>);
    fn point(&mut self, vert: &Matrix3xX<f64>, size: f64);
    /// Replaces the dynamic vertex positions drawn so far.
    fn update(&mut self, vert: &Matrix3xX<f64>);
}

#[derive(Clone, Copy, Debug)]
pub struct PreviewOptions {
    pub show_stitch: bool,
    pub show_pin: bool,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            show_stitch: true,
            show_pin: true,
        }
    }
}

/// A live preview: owns the sink and redraws it from [`FixedScene::time`].
pub struct Preview<'a, P: PlotSink> {
    scene: &'a FixedScene,
    sink: P,
    max_time: f64,
    time: f64,
}

impl<'a, P: PlotSink> Preview<'a, P> {
    pub(crate) fn new(scene: &'a FixedScene, sink: P, max_time: f64) -> Self {
        Self {
            scene,
            sink,
            max_time,
            time: 0.0,
        }
    }

    /// Upper bound of the time slider. Zero when nothing moves.
    pub fn max_time(&self) -> f64 {
        self.max_time
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn update(&mut self, time: f64) {
        self.time = time.clamp(0.0, self.max_time);
        let vert = self.scene.time(self.time);
        self.sink.update(&vert);
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    pub fn into_sink(self) -> P {
        self.sink
    }
}
