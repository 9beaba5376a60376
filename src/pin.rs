// File: pin.rs
// License: Apache v2.0

use super::error::{Result, SceneError};
use super::object::Object;
use na::{Matrix3xX, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Interpolation between two keyframes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    #[default]
    Smooth,
    Linear,
}

impl Transition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Smooth => "smooth",
            Transition::Linear => "linear",
        }
    }

    /// Remaps the interval parameter `r` in `[0, 1]`.
    pub fn apply(&self, r: f64) -> f64 {
        match self {
            Transition::Smooth => r * r * (3.0 - 2.0 * r),
            Transition::Linear => r,
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transition {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "smooth" => Ok(Transition::Smooth),
            "linear" => Ok(Transition::Linear),
            _ => Err(format!("unknown transition '{}'", s)),
        }
    }
}

/// Returns the keyframe pair bracketing `time` and the blend weight of the
/// second one. Holds the first keyframe before it and the last one after it.
pub fn calc_coefficient(time: f64, timing: &[f64], transition: Transition) -> ([usize; 2], f64) {
    let Some(&last_time) = timing.last() else {
        return ([0, 0], 1.0);
    };
    if time >= last_time {
        let last = timing.len() - 1;
        return ([last, last], 1.0);
    }
    if time < timing[0] {
        return ([0, 0], 0.0);
    }
    for i in 0..timing.len() - 1 {
        let (t0, t1) = (timing[i], timing[i + 1]);
        if time >= t0 && time < t1 {
            let w = (time - t0) / (t1 - t0);
            return ([i, i + 1], transition.apply(w));
        }
    }
    // unreachable for strictly increasing timing
    let last = timing.len() - 1;
    ([last, last], 1.0)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpinData {
    pub center: Vector3<f64>,
    pub axis: Vector3<f64>,
    /// Degrees per unit time.
    pub angular_velocity: f64,
    pub t_start: f64,
    pub t_end: f64,
}

impl Default for SpinData {
    fn default() -> Self {
        Self {
            center: Vector3::zeros(),
            axis: Vector3::y(),
            angular_velocity: 360.0,
            t_start: 0.0,
            t_end: f64::INFINITY,
        }
    }
}

impl SpinData {
    /// Rotation angle in radians accumulated at `time`.
    pub fn angle(&self, time: f64) -> f64 {
        let t = time.min(self.t_end);
        if t > self.t_start {
            self.angular_velocity.to_radians() * (t - self.t_start)
        } else {
            0.0
        }
    }

    /// Rotates every column of `points` about `center` and `axis` (Rodrigues).
    pub fn rotate(&self, points: &mut Matrix3xX<f64>, time: f64) {
        let angle = self.angle(time);
        if angle == 0.0 {
            return;
        }
        let axis = self.axis / self.axis.norm();
        let (sin_theta, cos_theta) = angle.sin_cos();
        for mut x in points.column_iter_mut() {
            let p: Vector3<f64> = x.clone_owned() - self.center;
            let rotated = p * cos_theta
                + axis.cross(&p) * sin_theta
                + axis * axis.dot(&p) * (1.0 - cos_theta);
            x.copy_from(&(rotated + self.center));
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PinKeyframe {
    pub position: Matrix3xX<f64>,
    pub time: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PinData {
    pub index: Vec<usize>,
    pub keyframe: Vec<PinKeyframe>,
    pub spin: Vec<SpinData>,
    pub should_unpin: bool,
    pub transition: Transition,
    pub pull_strength: f64,
}

impl PinData {
    pub fn new(index: Vec<usize>) -> Self {
        Self {
            index,
            ..Default::default()
        }
    }

    /// True when the pin prescribes any motion or force.
    pub fn is_active(&self) -> bool {
        !self.keyframe.is_empty() || !self.spin.is_empty() || self.pull_strength != 0.0
    }

    pub fn last_time(&self) -> Option<f64> {
        self.keyframe.last().map(|k| k.time)
    }

    pub fn timing(&self) -> Vec<f64> {
        self.keyframe.iter().map(|k| k.time).collect()
    }

    /// Keyframed positions of the pinned vertices at `time`, or `None` when
    /// there are no keyframes.
    pub fn keyframe_position(&self, time: f64) -> Option<Matrix3xX<f64>> {
        if self.keyframe.is_empty() {
            return None;
        }
        let ([j, k], w) = calc_coefficient(time, &self.timing(), self.transition);
        let (q0, q1) = (&self.keyframe[j].position, &self.keyframe[k].position);
        Some(q0 * (1.0 - w) + q1 * w)
    }

    /// Same pin with every index sent through `map`.
    pub fn remap(&self, map: &[usize]) -> PinData {
        PinData {
            index: self.index.iter().map(|&vi| map[vi]).collect(),
            ..self.clone()
        }
    }
}

/// Edits one pin of an object.
///
/// The holder borrows its object so that the first movement can read the
/// object's current vertex positions as the implicit keyframe at time 0.
pub struct PinHolder<'a> {
    object: &'a mut Object,
    slot: usize,
}

impl<'a> PinHolder<'a> {
    pub(crate) fn new(object: &'a mut Object, slot: usize) -> Self {
        Self { object, slot }
    }

    fn data_mut(&mut self) -> &mut PinData {
        &mut self.object.pins_mut()[self.slot]
    }

    pub fn data(&self) -> &PinData {
        &self.object.pins()[self.slot]
    }

    pub fn index(&self) -> &[usize] {
        &self.data().index
    }

    pub fn keyframe(&self) -> &[PinKeyframe] {
        &self.data().keyframe
    }

    pub fn spinner(&self) -> &[SpinData] {
        &self.data().spin
    }

    pub fn should_unpin(&self) -> bool {
        self.data().should_unpin
    }

    pub fn pull_strength(&self) -> f64 {
        self.data().pull_strength
    }

    pub fn transition(&self) -> Transition {
        self.data().transition
    }

    pub fn set_pull(mut self, strength: f64) -> Self {
        self.data_mut().pull_strength = strength;
        self
    }

    pub fn interp(mut self, transition: Transition) -> Self {
        self.data_mut().transition = transition;
        self
    }

    /// Marks the pin for release once its motion ends. Interpreted by the
    /// solver only.
    pub fn unpin(mut self) -> Self {
        self.data_mut().should_unpin = true;
        self
    }

    fn current_position(&self) -> Result<Matrix3xX<f64>> {
        let vert = self.object.vertex()?;
        Ok(vert.select_columns(self.index().iter()))
    }

    fn last_position(&self) -> Result<Matrix3xX<f64>> {
        match self.keyframe().last() {
            Some(last) => Ok(last.position.clone()),
            None => self.current_position(),
        }
    }

    /// Moves the pinned vertices to `target` (one column per pinned vertex)
    /// at absolute `time`.
    pub fn move_to(mut self, target: &Matrix3xX<f64>, time: f64) -> Result<Self> {
        let expected = self.index().len();
        if target.ncols() != expected {
            return Err(SceneError::TargetLength {
                expected,
                actual: target.ncols(),
            });
        }
        if time == 0.0 {
            return Err(SceneError::ZeroTime);
        }
        let last = self.data().last_time().unwrap_or(0.0);
        if !(time > last) {
            return Err(SceneError::TimeOrder { last, time });
        }
        if self.keyframe().is_empty() {
            let position = self.current_position()?;
            self.data_mut().keyframe.push(PinKeyframe {
                position,
                time: 0.0,
            });
        }
        self.data_mut().keyframe.push(PinKeyframe {
            position: target.clone(),
            time,
        });
        Ok(self)
    }

    /// Moves every pinned vertex by the same `delta`, relative to the last
    /// keyframe (or the current positions when there is none).
    pub fn move_by(self, delta: [f64; 3], time: f64) -> Result<Self> {
        let mut target = self.last_position()?;
        let delta = Vector3::from(delta);
        for mut x in target.column_iter_mut() {
            x += delta;
        }
        self.move_to(&target, time)
    }

    /// Per-vertex variant of [`PinHolder::move_by`].
    pub fn move_each_by(self, delta: &Matrix3xX<f64>, time: f64) -> Result<Self> {
        let base = self.last_position()?;
        if delta.ncols() != base.ncols() {
            return Err(SceneError::TargetLength {
                expected: base.ncols(),
                actual: delta.ncols(),
            });
        }
        self.move_to(&(base + delta), time)
    }

    pub fn hold(self, time: f64) -> Result<Self> {
        self.move_by([0.0, 0.0, 0.0], time)
    }

    pub fn spin(
        mut self,
        center: [f64; 3],
        axis: [f64; 3],
        angular_velocity: f64,
        t_start: f64,
        t_end: f64,
    ) -> Result<Self> {
        if Vector3::from(axis).norm() == 0.0 {
            return Err(SceneError::ZeroVector {
                name: "axis",
                value: axis,
            });
        }
        if !(t_end >= t_start) {
            return Err(SceneError::TimeOrder {
                last: t_start,
                time: t_end,
            });
        }
        self.data_mut().spin.push(SpinData {
            center: Vector3::from(center),
            axis: Vector3::from(axis),
            angular_velocity,
            t_start,
            t_end,
        });
        Ok(self)
    }
}
