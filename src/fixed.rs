// File: fixed.rs
// License: Apache v2.0

use super::error::{Result, SceneError};
use super::invisible::{Sphere, Wall};
use super::pin::PinData;
use super::plot::{PlotSink, Preview, PreviewOptions};
use super::triutils;
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use na::{Matrix2xX, Matrix3xX, Matrix4xX, Vector3};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;

/// Delegated triangle-mesh intersection tests.
pub trait IntersectionCheck {
    fn is_self_intersecting(&self, vert: &Matrix3xX<f64>, tri: &Matrix3xX<usize>) -> bool;
    fn is_intersecting(
        &self,
        a: (&Matrix3xX<f64>, &Matrix3xX<usize>),
        b: (&Matrix3xX<f64>, &Matrix3xX<usize>),
    ) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intersection {
    SelfDynamic,
    SelfStatic,
    DynamicStatic,
}

/// A scene compiled into one global vertex index space.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FixedScene {
    pub(crate) name: String,
    pub(crate) vert: Matrix3xX<f64>,
    pub(crate) color: Matrix3xX<f64>,
    pub(crate) vel: Matrix3xX<f64>,
    pub(crate) uv: Matrix2xX<f64>,
    pub(crate) rod: Matrix2xX<usize>,
    pub(crate) tri: Matrix3xX<usize>,
    pub(crate) tet: Matrix4xX<usize>,
    pub(crate) pin: Vec<PinData>,
    pub(crate) static_vert: Matrix3xX<f64>,
    pub(crate) static_tri: Matrix3xX<usize>,
    pub(crate) static_color: Matrix3xX<f64>,
    pub(crate) stitch_ind: Matrix3xX<usize>,
    pub(crate) stitch_w: Matrix2xX<f64>,
    pub(crate) wall: Vec<Wall>,
    pub(crate) sphere: Vec<Sphere>,
    pub(crate) rod_vert_range: (usize, usize),
    pub(crate) shell_vert_range: (usize, usize),
    pub(crate) rod_count: usize,
    pub(crate) shell_count: usize,
}

impl FixedScene {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vert(&self) -> &Matrix3xX<f64> {
        &self.vert
    }

    pub fn color(&self) -> &Matrix3xX<f64> {
        &self.color
    }

    pub fn vel(&self) -> &Matrix3xX<f64> {
        &self.vel
    }

    pub fn uv(&self) -> &Matrix2xX<f64> {
        &self.uv
    }

    pub fn rod(&self) -> &Matrix2xX<usize> {
        &self.rod
    }

    /// Pure-shell triangles first, then the surfaces of solids.
    pub fn tri(&self) -> &Matrix3xX<usize> {
        &self.tri
    }

    pub fn tet(&self) -> &Matrix4xX<usize> {
        &self.tet
    }

    pub fn pin(&self) -> &[PinData] {
        &self.pin
    }

    pub fn static_vert(&self) -> &Matrix3xX<f64> {
        &self.static_vert
    }

    pub fn static_tri(&self) -> &Matrix3xX<usize> {
        &self.static_tri
    }

    pub fn static_color(&self) -> &Matrix3xX<f64> {
        &self.static_color
    }

    pub fn stitch_ind(&self) -> &Matrix3xX<usize> {
        &self.stitch_ind
    }

    pub fn stitch_w(&self) -> &Matrix2xX<f64> {
        &self.stitch_w
    }

    pub fn wall(&self) -> &[Wall] {
        &self.wall
    }

    pub fn sphere(&self) -> &[Sphere] {
        &self.sphere
    }

    pub fn rod_vert_range(&self) -> (usize, usize) {
        self.rod_vert_range
    }

    pub fn shell_vert_range(&self) -> (usize, usize) {
        self.shell_vert_range
    }

    pub fn rod_count(&self) -> usize {
        self.rod_count
    }

    pub fn shell_count(&self) -> usize {
        self.shell_count
    }

    pub fn has_stitch(&self) -> bool {
        self.stitch_ind.ncols() > 0 && self.stitch_w.ncols() > 0
    }

    /// Vertex positions at `time`.
    ///
    /// Each pin first follows its keyframes, then its spins in order. The
    /// constant velocity drift is added last, to every vertex.
    pub fn time(&self, time: f64) -> Matrix3xX<f64> {
        let mut vert = self.vert.clone();
        for pin in self.pin.iter() {
            if let Some(position) = pin.keyframe_position(time) {
                for (k, &vi) in pin.index.iter().enumerate() {
                    vert.set_column(vi, &position.column(k));
                }
            }
            if !pin.spin.is_empty() {
                let mut points = vert.select_columns(pin.index.iter());
                for spin in pin.spin.iter() {
                    spin.rotate(&mut points, time);
                }
                for (k, &vi) in pin.index.iter().enumerate() {
                    vert.set_column(vi, &points.column(k));
                }
            }
        }
        vert += &self.vel * time;
        vert
    }

    /// Largest and smallest coordinates of the dynamic vertices.
    pub fn bbox(&self) -> Result<(Vector3<f64>, Vector3<f64>)> {
        if self.vert.ncols() == 0 {
            return Err(SceneError::EmptyGeometry("vertex"));
        }
        let max = Vector3::from_fn(|i, _| self.vert.row(i).max());
        let min = Vector3::from_fn(|i, _| self.vert.row(i).min());
        Ok((max, min))
    }

    /// Area-weighted center of the triangles.
    pub fn center(&self) -> Result<Vector3<f64>> {
        let mut center = Vector3::zeros();
        let mut area_sum = 0.0;
        for i in 0..self.tri.ncols() {
            let area = triutils::area(&self.vert, &self.tri, i);
            center += area * triutils::centroid(&self.vert, &self.tri, i);
            area_sum += area;
        }
        if area_sum == 0.0 {
            Err(SceneError::NoArea)
        } else {
            Ok(center / area_sum)
        }
    }

    pub fn average_tri_area(&self) -> f64 {
        if self.tri.ncols() == 0 {
            return 0.0;
        }
        let areas = triutils::face_areas(&self.vert, &self.tri);
        areas.iter().sum::<f64>() / areas.len() as f64
    }

    /// Latest time at which anything still moves, for preview sliders.
    /// Open-ended spins and velocities count as one time unit.
    pub fn max_time(&self) -> f64 {
        let mut max_time: f64 = 0.0;
        for pin in self.pin.iter() {
            max_time = max_time.max(pin.last_time().unwrap_or(0.0));
            for spin in pin.spin.iter() {
                if spin.t_end.is_infinite() {
                    max_time = max_time.max(1.0);
                } else {
                    max_time = max_time.max(spin.t_end);
                }
            }
        }
        if self.vel.norm() > 0.0 {
            max_time = max_time.max(1.0);
        }
        max_time
    }

    /// Element counts as (label, count), skipping empty groups.
    pub fn summary(&self) -> Vec<(&'static str, usize)> {
        let mut data = vec![("#vert", self.vert.ncols())];
        if self.rod.ncols() > 0 {
            data.push(("#rod", self.rod.ncols()));
        }
        if self.tri.ncols() > 0 {
            data.push(("#tri", self.tri.ncols()));
        }
        if self.tet.ncols() > 0 {
            data.push(("#tet", self.tet.ncols()));
        }
        if !self.pin.is_empty() {
            data.push(("#pin", self.pin.iter().map(|p| p.index.len()).sum()));
        }
        if self.static_vert.ncols() > 0 && self.static_tri.ncols() > 0 {
            data.push(("#static_vert", self.static_vert.ncols()));
            data.push(("#static_tri", self.static_tri.ncols()));
        }
        if self.has_stitch() {
            data.push(("#stitch_ind", self.stitch_ind.ncols()));
        }
        data
    }

    pub fn report(&self) -> &Self {
        log::info!("scene: {}", self.name);
        for (key, value) in self.summary() {
            log::info!("{:>14}: {}", key, value);
        }
        self
    }

    /// Runs `checker` on the dynamic triangles and the static block and
    /// returns every intersection it found.
    pub fn check_intersection(&self, checker: &dyn IntersectionCheck) -> Vec<Intersection> {
        let mut result = Vec::new();
        if self.vert.ncols() == 0 || self.tri.ncols() == 0 {
            return result;
        }
        if checker.is_self_intersecting(&self.vert, &self.tri) {
            log::warn!("mesh is self-intersecting");
            result.push(Intersection::SelfDynamic);
        }
        if self.static_vert.ncols() > 0 && self.static_tri.ncols() > 0 {
            if checker.is_self_intersecting(&self.static_vert, &self.static_tri) {
                log::warn!("static mesh is self-intersecting");
                result.push(Intersection::SelfStatic);
            }
            if checker.is_intersecting(
                (&self.static_vert, &self.static_tri),
                (&self.vert, &self.tri),
            ) {
                log::warn!("mesh is intersecting with static mesh");
                result.push(Intersection::DynamicStatic);
            }
        }
        result
    }

    /// Hands the compiled geometry to `sink` and returns a preview whose
    /// `update(time)` redraws through [`FixedScene::time`].
    pub fn preview<P: PlotSink>(
        &self,
        mut sink: P,
        vert: Option<&Matrix3xX<f64>>,
        options: PreviewOptions,
    ) -> Result<Preview<'_, P>> {
        let vert = vert.unwrap_or(&self.vert);
        let mut drawn = false;
        if self.tri.ncols() > 0 {
            sink.tri(vert, &self.tri, &self.color);
            drawn = true;
        }
        if self.static_vert.ncols() > 0 {
            sink.tri(&self.static_vert, &self.static_tri, &self.static_color);
            drawn = true;
        }
        if self.rod.ncols() > 0 {
            sink.edge(vert, &self.rod);
            drawn = true;
        }
        if !drawn {
            return Err(SceneError::NoPlot);
        }
        if options.show_stitch && self.has_stitch() {
            let n = self.stitch_ind.ncols();
            let mut stitch_vert = Matrix3xX::zeros(2 * n);
            let mut stitch_edge = Matrix2xX::zeros(n);
            for (i, (ind, w)) in self
                .stitch_ind
                .column_iter()
                .zip(self.stitch_w.column_iter())
                .enumerate()
            {
                let target = vert.column(ind[1]) * w[0] + vert.column(ind[2]) * w[1];
                stitch_vert.set_column(2 * i, &vert.column(ind[0]));
                stitch_vert.set_column(2 * i + 1, &target);
                stitch_edge[(0, i)] = 2 * i;
                stitch_edge[(1, i)] = 2 * i + 1;
            }
            sink.edge(&stitch_vert, &stitch_edge);
        }
        let has_vel = self.vel.norm() > 0.0;
        let mut max_time = 0.0;
        if options.show_pin && (!self.pin.is_empty() || has_vel) {
            if !self.pin.is_empty() {
                let index: Vec<usize> = self
                    .pin
                    .iter()
                    .flat_map(|p| p.index.iter().copied())
                    .collect();
                let size = 5.0 * self.average_tri_area().sqrt();
                sink.point(&vert.select_columns(index.iter()), size);
            }
            max_time = self.max_time();
        }
        Ok(Preview::new(self, sink, max_time))
    }

    /// Writes a gzip'd bincode snapshot.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = bincode::serialize(self)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&data)
            .map_err(|e| SceneError::io(path, e))?;
        let compressed = encoder.finish().map_err(|e| SceneError::io(path, e))?;
        std::fs::write(path, compressed).map_err(|e| SceneError::io(path, e))?;
        log::info!("saved snapshot of {} to {}", self.name, path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let compressed = std::fs::read(path).map_err(|e| SceneError::io(path, e))?;
        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut data = Vec::new();
        decoder
            .read_to_end(&mut data)
            .map_err(|e| SceneError::io(path, e))?;
        Ok(bincode::deserialize(&data)?)
    }
}
