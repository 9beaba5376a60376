// File: object.rs
// License: Apache v2.0

use super::args::SceneArgs;
use super::asset::MeshResolver;
use super::error::{Result, SceneError};
use super::mesh::{MeshAsset, StitchMesh};
use super::pin::{PinData, PinHolder};
use super::transform::Transform;
use na::{Matrix2xX, Matrix3xX, Vector3};
use rand::Rng;
use std::collections::HashSet;
use std::sync::Arc;

/// A named placement of a registered mesh inside a scene.
#[derive(Clone)]
pub struct Object {
    name: String,
    mesh_name: String,
    mesh: Arc<MeshAsset>,
    resolver: Arc<dyn MeshResolver>,
    transform: Transform,
    color: Option<Vector3<f64>>,
    static_color: Vector3<f64>,
    default_color: Vector3<f64>,
    velocity: Vector3<f64>,
    pins: Vec<PinData>,
    is_static: bool,
    stitch: Option<StitchMesh>,
    uv: Option<Matrix2xX<f64>>,
    orthogonal_eps: f64,
    grab_eps: f64,
}

impl Object {
    pub fn new(
        name: &str,
        mesh_name: &str,
        resolver: Arc<dyn MeshResolver>,
        args: &SceneArgs,
    ) -> Result<Self> {
        let mesh = resolver.resolve(mesh_name)?;
        Ok(Self {
            name: name.to_string(),
            mesh_name: mesh_name.to_string(),
            mesh,
            resolver,
            transform: Transform::default(),
            color: None,
            static_color: Vector3::from(args.static_color),
            default_color: Vector3::from(args.default_color),
            velocity: Vector3::zeros(),
            pins: Vec::new(),
            is_static: false,
            stitch: None,
            uv: None,
            orthogonal_eps: args.orthogonal_eps,
            grab_eps: args.grab_eps,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mesh_name(&self) -> &str {
        &self.mesh_name
    }

    pub fn mesh(&self) -> &MeshAsset {
        &self.mesh
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Classification from the last call to [`Object::update_static`].
    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn pins(&self) -> &[PinData] {
        &self.pins
    }

    pub(crate) fn pins_mut(&mut self) -> &mut [PinData] {
        &mut self.pins
    }

    pub fn stitch_data(&self) -> Option<&StitchMesh> {
        self.stitch.as_ref()
    }

    pub fn uv(&self) -> Option<&Matrix2xX<f64>> {
        self.uv.as_ref()
    }

    pub fn get_velocity(&self) -> &Vector3<f64> {
        &self.velocity
    }

    pub fn has_color(&self) -> bool {
        self.color.is_some()
    }

    /// Explicit color, else the static color when static, else the default.
    pub fn get_color(&self) -> Vector3<f64> {
        match self.color {
            Some(color) => color,
            None if self.is_static => self.static_color,
            None => self.default_color,
        }
    }

    /// Resets placement, colors and annotations. The mesh stays.
    pub fn clear(&mut self, args: &SceneArgs) {
        self.transform = Transform::default();
        self.color = None;
        self.static_color = Vector3::from(args.static_color);
        self.default_color = Vector3::from(args.default_color);
        self.velocity = Vector3::zeros();
        self.pins.clear();
        self.is_static = false;
        self.stitch = None;
        self.uv = None;
    }

    fn rest_vertex(&self) -> Result<&Matrix3xX<f64>> {
        self.mesh
            .vertices()
            .ok_or_else(|| SceneError::NoVertices(self.name.clone()))
    }

    pub fn apply_transform(&self, x: &Matrix3xX<f64>) -> Matrix3xX<f64> {
        self.transform.apply(x)
    }

    /// Transformed vertices.
    pub fn vertex(&self) -> Result<Matrix3xX<f64>> {
        Ok(self.apply_transform(self.rest_vertex()?))
    }

    pub fn vertex_count(&self) -> usize {
        self.mesh.vertex_count()
    }

    /// Extent and center of the transformed vertices.
    pub fn bbox(&self) -> Result<(Vector3<f64>, Vector3<f64>)> {
        let vert = self.vertex()?;
        if vert.ncols() == 0 {
            return Err(SceneError::NoVertices(self.name.clone()));
        }
        let max = Vector3::from_fn(|i, _| vert.row(i).max());
        let min = Vector3::from_fn(|i, _| vert.row(i).min());
        Ok((max - min, (max + min) / 2.0))
    }

    /// Fits the object into a unit cube about the origin.
    pub fn normalize(&mut self) -> Result<&mut Self> {
        if self.transform.is_normalized() {
            return Err(SceneError::AlreadyNormalized);
        }
        let (size, center) = self.bbox()?;
        self.transform.set_normalize(&size, &center)?;
        Ok(self)
    }

    /// Vertices farthest along `direction`.
    pub fn grab(&self, direction: [f64; 3]) -> Result<Vec<usize>> {
        self.grab_within(direction, self.grab_eps)
    }

    /// Indices whose projection onto `direction` is within `eps` of the
    /// largest projection.
    pub fn grab_within(&self, direction: [f64; 3], eps: f64) -> Result<Vec<usize>> {
        let vert = self.vertex()?;
        let direction = Vector3::from(direction);
        let proj: Vec<f64> = vert.column_iter().map(|x| x.dot(&direction)).collect();
        let val = proj.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Ok(proj
            .iter()
            .enumerate()
            .filter(|(_, &p)| p > val - eps)
            .map(|(i, _)| i)
            .collect())
    }

    pub fn at(&mut self, x: f64, y: f64, z: f64) -> &mut Self {
        self.transform.set_translate(Vector3::new(x, y, z));
        self
    }

    /// Offsets the position by a random amount in `[0, r)` per axis.
    pub fn jitter(&mut self, r: f64) -> &mut Self {
        let mut rng = rand::thread_rng();
        let delta = Vector3::from_fn(|_, _| r * rng.gen::<f64>());
        let translate = self.transform.translate() + delta;
        self.transform.set_translate(translate);
        self
    }

    /// Places this object on top of `other` along y.
    pub fn atop(&mut self, other: &Object, margin: f64) -> Result<&mut Self> {
        let base = other.bbox()?;
        self.atop_bbox(base, margin)
    }

    pub(crate) fn atop_bbox(
        &mut self,
        (b_size, b_center): (Vector3<f64>, Vector3<f64>),
        margin: f64,
    ) -> Result<&mut Self> {
        let (a_size, a_center) = self.bbox()?;
        let mut center = b_center - a_center;
        center[1] += (a_size[1] + b_size[1]) / 2.0 + margin;
        Ok(self.at(center[0], center[1], center[2]))
    }

    pub fn scale(&mut self, scale: f64) -> &mut Self {
        self.transform.set_scale(scale);
        self
    }

    pub fn rotate(&mut self, angle: f64, axis: &str) -> Result<&mut Self> {
        self.transform.rotate(angle, axis)?;
        Ok(self)
    }

    fn check_dim(dim: usize) -> Result<()> {
        if dim >= 3 {
            return Err(SceneError::InvalidAxis(dim.to_string()));
        }
        Ok(())
    }

    pub fn max(&self, dim: usize) -> Result<f64> {
        Self::check_dim(dim)?;
        let vert = self.vertex()?;
        Ok(vert.row(dim).iter().copied().fold(f64::NEG_INFINITY, f64::max))
    }

    pub fn min(&self, dim: usize) -> Result<f64> {
        Self::check_dim(dim)?;
        let vert = self.vertex()?;
        Ok(vert.row(dim).iter().copied().fold(f64::INFINITY, f64::min))
    }

    pub fn static_color(&mut self, red: f64, green: f64, blue: f64) -> &mut Self {
        self.static_color = Vector3::new(red, green, blue);
        self
    }

    pub fn default_color(&mut self, red: f64, green: f64, blue: f64) -> &mut Self {
        self.default_color = Vector3::new(red, green, blue);
        self
    }

    pub fn color(&mut self, red: f64, green: f64, blue: f64) -> &mut Self {
        self.color = Some(Vector3::new(red, green, blue));
        self
    }

    pub fn velocity(&mut self, u: f64, v: f64, w: f64) -> Result<&mut Self> {
        if self.compute_static() {
            return Err(SceneError::ObjectIsStatic(self.name.clone()));
        }
        self.velocity = Vector3::new(u, v, w);
        Ok(self)
    }

    fn compute_static(&self) -> bool {
        if self.pins.is_empty() {
            return false;
        }
        // motion on any pin vetoes staticness, whatever the coverage
        if self.pins.iter().any(|p| p.is_active()) {
            return false;
        }
        let n_vert = self.vertex_count();
        if n_vert == 0 {
            return false;
        }
        let mut flag = vec![false; n_vert];
        for pin in self.pins.iter() {
            for &i in pin.index.iter() {
                flag[i] = true;
            }
        }
        flag.iter().all(|&f| f)
    }

    /// An object is static when every vertex is pinned and no pin moves,
    /// spins or pulls.
    pub fn update_static(&mut self) -> bool {
        self.is_static = self.compute_static();
        self.is_static
    }

    /// Pins `ind`, or every vertex when `None`.
    pub fn pin(&mut self, ind: Option<&[usize]>) -> Result<PinHolder<'_>> {
        let n_vert = self.vertex_count();
        let index: Vec<usize> = match ind {
            Some(ind) => ind.to_vec(),
            None => (0..n_vert).collect(),
        };
        let mut seen = HashSet::new();
        let repeated: Vec<usize> = index.iter().copied().filter(|i| !seen.insert(*i)).collect();
        if !repeated.is_empty() {
            return Err(SceneError::DuplicatePin(repeated));
        }
        if let Some(&i) = index.iter().find(|&&i| i >= n_vert) {
            return Err(SceneError::Topology {
                name: self.name.clone(),
                reason: format!("pin index {} out of bounds ({})", i, n_vert),
            });
        }
        let taken: HashSet<usize> = self
            .pins
            .iter()
            .flat_map(|p| p.index.iter().copied())
            .collect();
        let overlap: Vec<usize> = index.iter().copied().filter(|i| taken.contains(i)).collect();
        if !overlap.is_empty() {
            return Err(SceneError::DuplicatePin(overlap));
        }
        self.pins.push(PinData::new(index));
        let slot = self.pins.len() - 1;
        Ok(PinHolder::new(self, slot))
    }

    pub fn pull_pin(&mut self, strength: f64, ind: Option<&[usize]>) -> Result<PinHolder<'_>> {
        Ok(self.pin(ind)?.set_pull(strength))
    }

    /// Attaches the stitch asset registered as `name`.
    pub fn stitch(&mut self, name: &str) -> Result<&mut Self> {
        if self.compute_static() {
            return Err(SceneError::ObjectIsStatic(self.name.clone()));
        }
        let asset = self.resolver.resolve(name)?;
        let stitch = asset
            .stitch()
            .ok_or_else(|| SceneError::NotAStitch(name.to_string()))?;
        self.stitch = Some(stitch.clone());
        Ok(self)
    }

    /// Sets the in-plane material directions of a flat shell and stores
    /// per-vertex UV coordinates.
    pub fn direction(&mut self, ex: [f64; 3], ey: [f64; 3]) -> Result<&mut Self> {
        let eps = self.orthogonal_eps;
        for (name, value) in [("ex", ex), ("ey", ey)] {
            if !(Vector3::from(value).norm() > 0.0) {
                return Err(SceneError::ZeroVector { name, value });
            }
        }
        let ex = Vector3::from(ex).normalize();
        let ey = Vector3::from(ey).normalize();
        if ex.dot(&ey).abs() > eps {
            return Err(SceneError::NotOrthogonal {
                ex: ex.into(),
                ey: ey.into(),
            });
        }
        let vert = self.vertex()?;
        let tri = self
            .mesh
            .triangles()
            .ok_or_else(|| SceneError::NoFaces(self.name.clone()))?;
        for f in tri.column_iter() {
            let (a, b, c) = (vert.column(f[0]), vert.column(f[1]), vert.column(f[2]));
            let n = (b - a).cross(&(c - a)).normalize();
            if n.dot(&ex).abs() > eps {
                return Err(SceneError::NotTangent {
                    axis: "ex",
                    normal: n.into(),
                });
            }
            if n.dot(&ey).abs() > eps {
                return Err(SceneError::NotTangent {
                    axis: "ey",
                    normal: n.into(),
                });
            }
        }
        let mut uv = Matrix2xX::zeros(vert.ncols());
        for (i, x) in vert.column_iter().enumerate() {
            uv[(0, i)] = x.dot(&ex);
            uv[(1, i)] = x.dot(&ey);
        }
        self.uv = Some(uv);
        Ok(self)
    }

    pub fn report(&self) {
        log::info!("object: {} (mesh {})", self.name, self.mesh_name);
        log::info!("at: {:?}", self.transform.translate().as_slice());
        log::info!("scale: {}", self.transform.scale());
        log::info!("rotation: {:?}", self.transform.rotation().as_slice());
        log::info!("color: {:?}", self.color.map(|c| [c[0], c[1], c[2]]));
        log::info!("velocity: {:?}", self.velocity.as_slice());
        log::info!("normalize: {}", self.transform.is_normalized());
        if self.compute_static() {
            log::info!("pin: static");
        } else {
            let count: usize = self.pins.iter().map(|p| p.index.len()).sum();
            log::info!("pin: {}", count);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::asset::AssetManager;
    use crate::mesh::{LineMesh, SurfaceMesh};
    use crate::pin::Transition;
    use approx::assert_relative_eq;

    pub(crate) fn square() -> SurfaceMesh {
        SurfaceMesh::from_rows(
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 0.0, 1.0],
                [0.0, 0.0, 1.0],
            ],
            &[[0, 1, 2], [0, 2, 3]],
        )
    }

    fn make(mesh: &str) -> Object {
        let mut asset = AssetManager::new();
        asset.add_tri("square", square()).unwrap();
        asset
            .add_rod(
                "rope",
                LineMesh::from_rows(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]], &[[0, 1]]),
            )
            .unwrap();
        Object::new("obj", mesh, Arc::new(asset), &SceneArgs::default()).unwrap()
    }

    #[test]
    fn unknown_mesh_fails() {
        let asset: Arc<dyn MeshResolver> = Arc::new(AssetManager::new());
        assert!(matches!(
            Object::new("obj", "missing", asset, &SceneArgs::default()),
            Err(SceneError::UnknownMesh(_))
        ));
    }

    #[test]
    fn overlapping_pins_are_rejected() {
        let mut obj = make("square");
        obj.pin(Some(&[0, 1])).unwrap();
        match obj.pin(Some(&[1, 2])) {
            Err(SceneError::DuplicatePin(ind)) => assert_eq!(ind, vec![1]),
            Err(e) => panic!("unexpected error {}", e),
            Ok(_) => panic!("overlap accepted"),
        }
        assert_eq!(obj.pins().len(), 1);
    }

    #[test]
    fn move_to_requires_increasing_time() {
        let mut obj = make("square");
        let target = Matrix3xX::from_column_slice(&[0.0, 1.0, 0.0]);
        let holder = obj.pin(Some(&[0])).unwrap().move_to(&target, 1.0).unwrap();
        assert_eq!(holder.keyframe().len(), 2);
        assert_eq!(holder.keyframe()[0].time, 0.0);
        assert!(matches!(
            holder.move_to(&target, 0.5),
            Err(SceneError::TimeOrder { .. })
        ));
        assert_eq!(obj.pins()[0].keyframe.len(), 2);
    }

    #[test]
    fn nan_times_are_rejected() {
        let mut obj = make("square");
        assert!(matches!(
            obj.pin(Some(&[0])).unwrap().move_by([0.0, 1.0, 0.0], f64::NAN),
            Err(SceneError::TimeOrder { .. })
        ));
        assert!(obj.pins()[0].keyframe.is_empty());
        assert!(matches!(
            obj.pin(Some(&[1]))
                .unwrap()
                .spin([0.0; 3], [0.0, 1.0, 0.0], 90.0, 0.0, f64::NAN),
            Err(SceneError::TimeOrder { .. })
        ));
        assert!(obj.pins()[1].spin.is_empty());
    }

    #[test]
    fn spin_needs_an_axis() {
        let mut obj = make("square");
        assert!(matches!(
            obj.pin(Some(&[0]))
                .unwrap()
                .spin([0.0; 3], [0.0; 3], 90.0, 0.0, 1.0),
            Err(SceneError::ZeroVector { name: "axis", .. })
        ));
        assert!(obj.pins()[0].spin.is_empty());
    }

    #[test]
    fn zero_time_and_wrong_length_fail() {
        let mut obj = make("square");
        let one = Matrix3xX::from_column_slice(&[0.0, 1.0, 0.0]);
        assert!(matches!(
            obj.pin(Some(&[0, 1])).unwrap().move_to(&one, 1.0),
            Err(SceneError::TargetLength {
                expected: 2,
                actual: 1
            })
        ));
        assert!(matches!(
            obj.pin(Some(&[2])).unwrap().move_to(&one, 0.0),
            Err(SceneError::ZeroTime)
        ));
        assert!(obj.pins().iter().all(|p| p.keyframe.is_empty()));
    }

    #[test]
    fn implicit_keyframe_uses_transformed_positions() {
        let mut obj = make("square");
        obj.at(0.0, 2.0, 0.0);
        let holder = obj
            .pin(Some(&[1, 3]))
            .unwrap()
            .interp(Transition::Linear)
            .move_by([0.0, 1.0, 0.0], 2.0)
            .unwrap()
            .hold(3.0)
            .unwrap();
        let first = &holder.keyframe()[0].position;
        assert_relative_eq!(first.column(0).into_owned(), Vector3::new(1.0, 2.0, 0.0));
        assert_relative_eq!(first.column(1).into_owned(), Vector3::new(0.0, 2.0, 1.0));
        let last = &holder.keyframe()[2].position;
        assert_relative_eq!(last.column(1).into_owned(), Vector3::new(0.0, 3.0, 1.0));
        assert_eq!(holder.transition(), Transition::Linear);
    }

    #[test]
    fn full_still_pin_makes_object_static() {
        let mut obj = make("square");
        obj.pin(Some(&[0, 1])).unwrap();
        assert!(!obj.update_static());
        obj.pin(Some(&[2, 3])).unwrap();
        assert!(obj.update_static());
        assert!(matches!(
            obj.velocity(1.0, 0.0, 0.0),
            Err(SceneError::ObjectIsStatic(_))
        ));
        assert_relative_eq!(obj.get_color(), Vector3::new(0.75, 0.75, 0.75));
    }

    #[test]
    fn motion_on_another_pin_vetoes_static() {
        let mut obj = make("square");
        obj.pin(Some(&[0, 1, 2, 3])).unwrap();
        assert!(obj.update_static());

        let mut other = make("square");
        other.pin(Some(&[0, 1, 2])).unwrap();
        other
            .pin(Some(&[3]))
            .unwrap()
            .spin([0.0; 3], [0.0, 1.0, 0.0], 90.0, 0.0, f64::INFINITY)
            .unwrap();
        assert!(!other.update_static());
        assert!(other.velocity(0.0, 1.0, 0.0).is_ok());
    }

    #[test]
    fn bbox_and_normalize() {
        let mut obj = make("square");
        obj.scale(2.0).at(1.0, 0.0, 0.0);
        let (size, center) = obj.bbox().unwrap();
        assert_relative_eq!(size, Vector3::new(2.0, 0.0, 2.0));
        assert_relative_eq!(center, Vector3::new(2.0, 0.0, 1.0));
        obj.normalize().unwrap();
        assert!(matches!(obj.normalize(), Err(SceneError::AlreadyNormalized)));
        assert_relative_eq!(obj.max(0).unwrap(), 0.0);
        assert_relative_eq!(obj.min(0).unwrap(), -1.0);
        assert!(obj.max(3).is_err());
    }

    #[test]
    fn grab_picks_the_far_side() {
        let obj = make("square");
        let mut ind = obj.grab([1.0, 0.0, 0.0]).unwrap();
        ind.sort();
        assert_eq!(ind, vec![1, 2]);
        assert_eq!(obj.grab_within([1.0, 0.0, 0.0], 2.0).unwrap().len(), 4);
    }

    #[test]
    fn atop_stacks_along_y() {
        let base = make("square");
        let mut obj = make("square");
        obj.rotate(90.0, "x").unwrap();
        obj.atop(&base, 0.5).unwrap();
        let (_, center) = obj.bbox().unwrap();
        let (b_size, b_center) = base.bbox().unwrap();
        assert_relative_eq!(center[1] - b_center[1], 0.5 + 0.5 + b_size[1] / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn direction_stores_uv() {
        let mut obj = make("square");
        obj.direction([1.0, 0.0, 0.0], [0.0, 0.0, 2.0]).unwrap();
        let uv = obj.uv().unwrap();
        assert_relative_eq!(uv[(0, 2)], 1.0);
        assert_relative_eq!(uv[(1, 2)], 1.0);
        assert!(matches!(
            obj.direction([1.0, 0.0, 0.0], [1.0, 1.0, 0.0]),
            Err(SceneError::NotOrthogonal { .. })
        ));
        assert!(matches!(
            obj.direction([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            Err(SceneError::NotTangent { axis: "ey", .. })
        ));
        assert!(matches!(
            obj.direction([0.0; 3], [0.0, 0.0, 1.0]),
            Err(SceneError::ZeroVector { name: "ex", .. })
        ));
        assert_relative_eq!(obj.uv().unwrap()[(0, 2)], 1.0);
        let mut rope = make("rope");
        assert!(matches!(
            rope.direction([1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            Err(SceneError::NoFaces(_))
        ));
    }

    #[test]
    fn stitch_requires_a_stitch_asset() {
        let mut obj = make("square");
        assert!(matches!(obj.stitch("rope"), Err(SceneError::NotAStitch(_))));
        assert!(matches!(obj.stitch("seam"), Err(SceneError::UnknownMesh(_))));
    }
}
