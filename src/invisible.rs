// File: invisible.rs
// License: Apache v2.0

use super::error::{Result, SceneError};
use super::pin::{calc_coefficient, Transition};
use na::Vector3;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WallEntry {
    pub position: Vector3<f64>,
    pub time: f64,
}

/// Invisible half-space obstacle with an outward normal.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Wall {
    normal: Vector3<f64>,
    entry: Vec<WallEntry>,
    transition: Transition,
}

impl Wall {
    pub fn new(position: [f64; 3], normal: [f64; 3]) -> Self {
        Self {
            normal: Vector3::from(normal),
            entry: vec![WallEntry {
                position: Vector3::from(position),
                time: 0.0,
            }],
            transition: Transition::default(),
        }
    }

    pub fn normal(&self) -> &Vector3<f64> {
        &self.normal
    }

    pub fn entry(&self) -> &[WallEntry] {
        &self.entry
    }

    pub fn transition(&self) -> Transition {
        self.transition
    }

    fn last(&self) -> &WallEntry {
        // never empty, the constructor seeds the entry at t=0
        &self.entry[self.entry.len() - 1]
    }

    fn check_time(&self, time: f64) -> Result<()> {
        let last = self.last().time;
        if !(time > last) {
            return Err(SceneError::TimeOrder { last, time });
        }
        Ok(())
    }

    pub fn move_to(&mut self, position: [f64; 3], time: f64) -> Result<&mut Self> {
        self.check_time(time)?;
        self.entry.push(WallEntry {
            position: Vector3::from(position),
            time,
        });
        Ok(self)
    }

    pub fn move_by(&mut self, delta: [f64; 3], time: f64) -> Result<&mut Self> {
        self.check_time(time)?;
        let position = self.last().position + Vector3::from(delta);
        self.entry.push(WallEntry { position, time });
        Ok(self)
    }

    pub fn interp(&mut self, transition: Transition) -> &mut Self {
        self.transition = transition;
        self
    }

    pub fn timing(&self) -> Vec<f64> {
        self.entry.iter().map(|e| e.time).collect()
    }

    pub fn position_at(&self, time: f64) -> Vector3<f64> {
        let ([j, k], w) = calc_coefficient(time, &self.timing(), self.transition);
        self.entry[j].position * (1.0 - w) + self.entry[k].position * w
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SphereEntry {
    pub position: Vector3<f64>,
    pub radius: f64,
    pub time: f64,
}

/// Invisible spherical obstacle. `hemisphere` opens the top half like a
/// bowl; `invert` makes the outside solid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sphere {
    entry: Vec<SphereEntry>,
    hemisphere: bool,
    invert: bool,
    transition: Transition,
}

impl Sphere {
    pub fn new(position: [f64; 3], radius: f64) -> Self {
        Self {
            entry: vec![SphereEntry {
                position: Vector3::from(position),
                radius,
                time: 0.0,
            }],
            hemisphere: false,
            invert: false,
            transition: Transition::default(),
        }
    }

    pub fn entry(&self) -> &[SphereEntry] {
        &self.entry
    }

    pub fn is_hemisphere(&self) -> bool {
        self.hemisphere
    }

    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    pub fn transition(&self) -> Transition {
        self.transition
    }

    fn last(&self) -> &SphereEntry {
        &self.entry[self.entry.len() - 1]
    }

    fn check_time(&self, time: f64) -> Result<()> {
        let last = self.last().time;
        if !(time > last) {
            return Err(SceneError::TimeOrder { last, time });
        }
        Ok(())
    }

    pub fn hemisphere(&mut self) -> &mut Self {
        self.hemisphere = true;
        self
    }

    pub fn invert(&mut self) -> &mut Self {
        self.invert = true;
        self
    }

    pub fn interp(&mut self, transition: Transition) -> &mut Self {
        self.transition = transition;
        self
    }

    pub fn transform_to(&mut self, position: [f64; 3], radius: f64, time: f64) -> Result<&mut Self> {
        self.check_time(time)?;
        self.entry.push(SphereEntry {
            position: Vector3::from(position),
            radius,
            time,
        });
        Ok(self)
    }

    pub fn move_to(&mut self, position: [f64; 3], time: f64) -> Result<&mut Self> {
        let radius = self.last().radius;
        self.transform_to(position, radius, time)
    }

    pub fn move_by(&mut self, delta: [f64; 3], time: f64) -> Result<&mut Self> {
        self.check_time(time)?;
        let last = self.last();
        let entry = SphereEntry {
            position: last.position + Vector3::from(delta),
            radius: last.radius,
            time,
        };
        self.entry.push(entry);
        Ok(self)
    }

    pub fn radius(&mut self, radius: f64, time: f64) -> Result<&mut Self> {
        self.check_time(time)?;
        let position = self.last().position;
        self.entry.push(SphereEntry {
            position,
            radius,
            time,
        });
        Ok(self)
    }

    pub fn timing(&self) -> Vec<f64> {
        self.entry.iter().map(|e| e.time).collect()
    }

    /// Center and radius at `time`.
    pub fn state_at(&self, time: f64) -> (Vector3<f64>, f64) {
        let ([j, k], w) = calc_coefficient(time, &self.timing(), self.transition);
        let (e0, e1) = (&self.entry[j], &self.entry[k]);
        (
            e0.position * (1.0 - w) + e1.position * w,
            e0.radius * (1.0 - w) + e1.radius * w,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn wall_rejects_non_increasing_time() {
        let mut wall = Wall::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        wall.move_by([0.0, 1.0, 0.0], 1.0).unwrap();
        assert!(matches!(
            wall.move_to([0.0, 0.0, 0.0], 1.0),
            Err(SceneError::TimeOrder { .. })
        ));
        assert_eq!(wall.entry().len(), 2);
        assert_relative_eq!(wall.entry()[1].position, Vector3::new(0.0, 1.0, 0.0));
        assert!(matches!(
            wall.move_to([0.0, 0.0, 0.0], f64::NAN),
            Err(SceneError::TimeOrder { .. })
        ));
        let mut sphere = Sphere::new([0.0, 0.0, 0.0], 1.0);
        assert!(matches!(
            sphere.radius(2.0, f64::NAN),
            Err(SceneError::TimeOrder { .. })
        ));
        assert_eq!(wall.entry().len(), 2);
        assert_eq!(sphere.entry().len(), 1);
    }

    #[test]
    fn wall_interpolates_between_entries() {
        let mut wall = Wall::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0]);
        wall.move_to([0.0, 2.0, 0.0], 2.0)
            .unwrap()
            .interp(Transition::Linear);
        assert_relative_eq!(wall.position_at(1.0), Vector3::new(0.0, 1.0, 0.0));
        assert_relative_eq!(wall.position_at(5.0), Vector3::new(0.0, 2.0, 0.0));
    }

    #[test]
    fn sphere_keeps_radius_when_moving() {
        let mut sphere = Sphere::new([0.0, 0.0, 0.0], 0.5);
        sphere
            .radius(1.0, 1.0)
            .unwrap()
            .move_by([1.0, 0.0, 0.0], 2.0)
            .unwrap()
            .hemisphere();
        let last = &sphere.entry()[2];
        assert_eq!(last.radius, 1.0);
        assert_relative_eq!(last.position, Vector3::new(1.0, 0.0, 0.0));
        assert!(sphere.is_hemisphere());
        assert!(!sphere.is_inverted());
        let (_, radius) = sphere.state_at(0.5);
        assert_relative_eq!(radius, 0.75);
    }
}
