// File: scene.rs
// License: Apache v2.0

use super::args::SceneArgs;
use super::asset::MeshResolver;
use super::error::{Result, SceneError};
use super::fixed::FixedScene;
use super::invisible::{Sphere, Wall};
use super::mesh::check_bounds;
use super::object::Object;
use super::pin::PinData;
use indexmap::IndexMap;
use na::{Matrix2xX, Matrix3xX, Matrix4xX, Vector3};
use std::sync::Arc;

type Element<D> = na::Matrix<usize, D, na::Dyn, na::VecStorage<usize, D, na::Dyn>>;

/// A mutable collection of named objects and invisible obstacles.
pub struct Scene {
    name: String,
    resolver: Arc<dyn MeshResolver>,
    args: SceneArgs,
    object: IndexMap<String, Object>,
    wall: Vec<Wall>,
    sphere: Vec<Sphere>,
}

/// Running state of [`Scene::build`]: the next free global index.
#[derive(Default)]
struct BuildContext {
    count: usize,
}

impl BuildContext {
    /// Numbers every unmapped endpoint of `element`, column by column.
    fn add_entry<D: na::Dim>(&mut self, map: &mut [Option<usize>], element: &Element<D>)
    where
        na::VecStorage<usize, D, na::Dyn>: na::RawStorage<usize, D, na::Dyn>,
    {
        for e in element.column_iter() {
            for &vi in e.iter() {
                if map[vi].is_none() {
                    map[vi] = Some(self.count);
                    self.count += 1;
                }
            }
        }
    }

    /// Numbers every remaining vertex in ascending local order.
    fn fill(&mut self, map: &mut [Option<usize>]) {
        for slot in map.iter_mut().filter(|slot| slot.is_none()) {
            *slot = Some(self.count);
            self.count += 1;
        }
    }
}

fn vec_map<D: na::Dim>(map: &[usize], element: &Element<D>, out: &mut Vec<usize>)
where
    na::VecStorage<usize, D, na::Dyn>: na::RawStorage<usize, D, na::Dyn>,
{
    out.extend(element.iter().map(|&vi| map[vi]));
}

/// HSV to RGB with every channel in [0, 1].
fn hsv_to_rgb(h: f64, s: f64, v: f64) -> Vector3<f64> {
    if s == 0.0 {
        return Vector3::new(v, v, v);
    }
    let i = (h * 6.0).floor();
    let f = h * 6.0 - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match (i as i64).rem_euclid(6) {
        0 => Vector3::new(v, t, p),
        1 => Vector3::new(q, v, p),
        2 => Vector3::new(p, v, t),
        3 => Vector3::new(p, q, v),
        4 => Vector3::new(t, p, v),
        _ => Vector3::new(v, p, q),
    }
}

impl Scene {
    pub fn new(name: &str, resolver: Arc<dyn MeshResolver>, args: SceneArgs) -> Self {
        Self {
            name: name.to_string(),
            resolver,
            args,
            object: IndexMap::new(),
            wall: Vec::new(),
            sphere: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &SceneArgs {
        &self.args
    }

    pub fn object_names(&self) -> Vec<String> {
        self.object.keys().cloned().collect()
    }

    pub fn wall(&self) -> &[Wall] {
        &self.wall
    }

    pub fn sphere(&self) -> &[Sphere] {
        &self.sphere
    }

    /// Adds an object referencing `mesh_name`. An empty `ref_name` picks
    /// `mesh_name`, or the first free `{mesh_name}_{k}` when taken.
    pub fn add(&mut self, mesh_name: &str, ref_name: &str) -> Result<&mut Object> {
        let ref_name = if ref_name.is_empty() {
            let mut candidate = mesh_name.to_string();
            let mut k = 0;
            while self.object.contains_key(&candidate) {
                k += 1;
                candidate = format!("{}_{}", mesh_name, k);
            }
            candidate
        } else {
            ref_name.to_string()
        };
        if self.object.contains_key(&ref_name) {
            return Err(SceneError::DuplicateObject(ref_name));
        }
        let obj = Object::new(&ref_name, mesh_name, self.resolver.clone(), &self.args)?;
        let entry = self.object.entry(ref_name).or_insert(obj);
        Ok(entry)
    }

    pub fn pick(&self, name: &str) -> Result<&Object> {
        self.object
            .get(name)
            .ok_or_else(|| SceneError::UnknownObject(name.to_string()))
    }

    pub fn pick_mut(&mut self, name: &str) -> Result<&mut Object> {
        self.object
            .get_mut(name)
            .ok_or_else(|| SceneError::UnknownObject(name.to_string()))
    }

    /// Places object `name` on top of object `base`.
    pub fn atop(&mut self, name: &str, base: &str, margin: f64) -> Result<&mut Object> {
        let bbox = self.pick(base)?.bbox()?;
        self.pick_mut(name)?.atop_bbox(bbox, margin)
    }

    /// Removes every object. Obstacles stay.
    pub fn clear(&mut self) -> &mut Self {
        self.object.clear();
        self
    }

    pub fn add_invisible_wall(&mut self, position: [f64; 3], normal: [f64; 3]) -> &mut Wall {
        self.wall.push(Wall::new(position, normal));
        let last = self.wall.len() - 1;
        &mut self.wall[last]
    }

    pub fn add_invisible_sphere(&mut self, position: [f64; 3], radius: f64) -> &mut Sphere {
        self.sphere.push(Sphere::new(position, radius));
        let last = self.sphere.len() - 1;
        &mut self.sphere[last]
    }

    /// Compiles the scene into one global vertex index space.
    ///
    /// Dynamic vertices are numbered in three passes: rod edges, then shell
    /// triangles, then everything left (solids included). Static objects go
    /// to a separate block with its own indexing.
    pub fn build(&mut self) -> Result<FixedScene> {
        for obj in self.object.values_mut() {
            obj.update_static();
        }
        log::info!("build: {} objects", self.object.len());

        let dynamic: Vec<&Object> = self.object.values().filter(|o| !o.is_static()).collect();
        for obj in dynamic.iter() {
            let name = obj.name();
            let n_vert = obj.vertex_count();
            let mesh = obj.mesh();
            if let Some(edge) = mesh.edges() {
                check_bounds(name, "E", n_vert, edge)?;
            }
            if let Some(tri) = mesh.triangles() {
                check_bounds(name, "F", n_vert, tri)?;
            }
            if let Some(tet) = mesh.tets() {
                check_bounds(name, "T", n_vert, tet)?;
            }
            if let Some(stitch) = obj.stitch_data() {
                check_bounds(name, "Ind", n_vert, &stitch.index)?;
            }
        }

        let uncolored: Vec<&str> = dynamic
            .iter()
            .filter(|o| !o.has_color())
            .map(|o| o.name())
            .collect();
        let n_uncolored = uncolored.len();
        let hue_color = |name: &str| -> Option<Vector3<f64>> {
            uncolored.iter().position(|&n| n == name).map(|i| {
                hsv_to_rgb(
                    i as f64 / n_uncolored as f64,
                    self.args.color_saturation,
                    self.args.color_value,
                )
            })
        };

        let mut ctx = BuildContext::default();
        let mut tag: Vec<Vec<Option<usize>>> =
            dynamic.iter().map(|o| vec![None; o.vertex_count()]).collect();

        for (obj, map) in dynamic.iter().zip(tag.iter_mut()) {
            let mesh = obj.mesh();
            if mesh.tets().is_none() {
                if let Some(edge) = mesh.edges() {
                    ctx.add_entry(map, edge);
                }
            }
        }
        let rod_vert_range = (0, ctx.count);
        log::info!("build: rod vertices {:?}", rod_vert_range);

        for (obj, map) in dynamic.iter().zip(tag.iter_mut()) {
            let mesh = obj.mesh();
            if mesh.tets().is_none() {
                if let Some(tri) = mesh.triangles() {
                    ctx.add_entry(map, tri);
                }
            }
        }
        let shell_vert_range = (rod_vert_range.1, ctx.count);
        log::info!("build: shell vertices {:?}", shell_vert_range);

        for map in tag.iter_mut() {
            ctx.fill(map);
        }
        let n_vert = ctx.count;
        log::info!("build: {} dynamic vertices", n_vert);

        let tag: Vec<Vec<usize>> = tag
            .into_iter()
            .map(|map| map.into_iter().flatten().collect())
            .collect();

        let mut vert = Matrix3xX::zeros(n_vert);
        let mut color = Matrix3xX::zeros(n_vert);
        let mut vel = Matrix3xX::zeros(n_vert);
        let mut uv = Matrix2xX::zeros(n_vert);
        for (obj, map) in dynamic.iter().zip(tag.iter()) {
            let x = obj.vertex()?;
            let c = hue_color(obj.name()).unwrap_or_else(|| obj.get_color());
            for (local, &global) in map.iter().enumerate() {
                vert.set_column(global, &x.column(local));
                color.set_column(global, &c);
                vel.set_column(global, obj.get_velocity());
            }
            if let Some(obj_uv) = obj.uv() {
                for (local, &global) in map.iter().enumerate() {
                    uv.set_column(global, &obj_uv.column(local));
                }
            }
        }

        let mut rod = Vec::new();
        for (obj, map) in dynamic.iter().zip(tag.iter()) {
            let mesh = obj.mesh();
            if let (Some(edge), None) = (mesh.edges(), mesh.tets()) {
                vec_map(map, edge, &mut rod);
            }
        }
        let rod = Matrix2xX::from_vec(rod);
        let rod_count = rod.ncols();

        let mut tri = Vec::new();
        for (obj, map) in dynamic.iter().zip(tag.iter()) {
            let mesh = obj.mesh();
            if let (Some(f), None) = (mesh.triangles(), mesh.tets()) {
                vec_map(map, f, &mut tri);
            }
        }
        let shell_count = tri.len() / 3;

        let mut tet = Vec::new();
        for (obj, map) in dynamic.iter().zip(tag.iter()) {
            let mesh = obj.mesh();
            if let (Some(f), Some(t)) = (mesh.triangles(), mesh.tets()) {
                vec_map(map, f, &mut tri);
                vec_map(map, t, &mut tet);
            }
        }
        let tri = Matrix3xX::from_vec(tri);
        let tet = Matrix4xX::from_vec(tet);
        log::info!(
            "build: {} rods, {} triangles ({} shell), {} tets",
            rod_count,
            tri.ncols(),
            shell_count,
            tet.ncols()
        );

        let mut pin: Vec<PinData> = Vec::new();
        let mut stitch_ind = Vec::new();
        let mut stitch_w = Vec::new();
        for (obj, map) in dynamic.iter().zip(tag.iter()) {
            pin.extend(obj.pins().iter().map(|p| p.remap(map)));
            if let Some(stitch) = obj.stitch_data() {
                vec_map(map, &stitch.index, &mut stitch_ind);
                stitch_w.extend(stitch.weight.iter().copied());
            }
        }
        log::info!("build: {} pins", pin.len());

        let mut static_vert = Vec::new();
        let mut static_tri = Vec::new();
        let mut static_color = Vec::new();
        for obj in self.object.values().filter(|o| o.is_static()) {
            let offset = static_vert.len() / 3;
            let c = obj.get_color();
            if let Some(f) = obj.mesh().triangles() {
                static_tri.extend(f.iter().map(|&vi| vi + offset));
            }
            let x = obj.vertex()?;
            static_vert.extend(x.iter().copied());
            for _ in 0..x.ncols() {
                static_color.extend(c.iter().copied());
            }
        }
        log::info!("build: {} static vertices", static_vert.len() / 3);

        Ok(FixedScene {
            name: self.name.clone(),
            vert,
            color,
            vel,
            uv,
            rod,
            tri,
            tet,
            pin,
            static_vert: Matrix3xX::from_vec(static_vert),
            static_tri: Matrix3xX::from_vec(static_tri),
            static_color: Matrix3xX::from_vec(static_color),
            stitch_ind: Matrix3xX::from_vec(stitch_ind),
            stitch_w: Matrix2xX::from_vec(stitch_w),
            wall: self.wall.clone(),
            sphere: self.sphere.clone(),
            rod_vert_range,
            shell_vert_range,
            rod_count,
            shell_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetManager;
    use crate::mesh::{LineMesh, StitchMesh, SurfaceMesh, VolumeMesh};
    use crate::object::tests::square;
    use approx::assert_relative_eq;
    use more_asserts::*;

    fn assets() -> Arc<dyn MeshResolver> {
        let mut asset = AssetManager::new();
        asset.add_tri("square", square()).unwrap();
        asset
            .add_rod(
                "rope",
                LineMesh::from_rows(
                    &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]],
                    &[[2, 1], [1, 0]],
                ),
            )
            .unwrap();
        asset
            .add_tet(
                "tet",
                VolumeMesh::from_rows(
                    &[
                        [0.0, 0.0, 0.0],
                        [1.0, 0.0, 0.0],
                        [0.0, 1.0, 0.0],
                        [0.0, 0.0, 1.0],
                    ],
                    &[[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
                    &[[0, 1, 2, 3]],
                ),
            )
            .unwrap();
        asset
            .add_tri(
                "point",
                SurfaceMesh::from_rows(&[[0.0, -1.0, 0.0]], &[]),
            )
            .unwrap();
        asset
            .add_stitch("seam", StitchMesh::from_rows(&[[0, 1, 2]], &[[0.5, 0.5]]))
            .unwrap();
        Arc::new(asset)
    }

    fn scene() -> Scene {
        Scene::new("test", assets(), SceneArgs::default())
    }

    #[test]
    fn auto_names_and_duplicates() {
        let mut scene = scene();
        assert_eq!(scene.add("square", "").unwrap().name(), "square");
        assert_eq!(scene.add("square", "").unwrap().name(), "square_1");
        scene.add("rope", "a").unwrap();
        assert!(matches!(
            scene.add("square", "a"),
            Err(SceneError::DuplicateObject(_))
        ));
        assert!(matches!(
            scene.add("missing", "b"),
            Err(SceneError::UnknownMesh(_))
        ));
        assert!(matches!(scene.pick("b"), Err(SceneError::UnknownObject(_))));
        assert_eq!(scene.object_names(), vec!["square", "square_1", "a"]);
    }

    #[test]
    fn static_point_and_dynamic_square() {
        let mut scene = scene();
        scene.add("point", "a").unwrap().pin(None).unwrap();
        scene.add("square", "b").unwrap();
        let fixed = scene.build().unwrap();
        assert_eq!(fixed.vert().ncols(), 4);
        assert_eq!(fixed.static_vert().ncols(), 1);
        let (rod_start, rod_end) = fixed.rod_vert_range();
        let (_, shell_end) = fixed.shell_vert_range();
        assert_eq!(rod_end, rod_start);
        assert_eq!(shell_end - rod_start, 4);
        assert!(fixed.pin().is_empty());
        assert_relative_eq!(
            fixed.static_color().column(0).into_owned(),
            Vector3::new(0.75, 0.75, 0.75)
        );
    }

    #[test]
    fn global_index_is_a_bijection_with_ordered_ranges() {
        let mut scene = scene();
        scene.add("tet", "solid").unwrap();
        scene.add("square", "cloth").unwrap();
        scene.add("rope", "rope").unwrap().at(0.0, 5.0, 0.0);
        let fixed = scene.build().unwrap();

        assert_eq!(fixed.vert().ncols(), 4 + 4 + 3);
        assert_eq!(fixed.rod_vert_range(), (0, 3));
        assert_eq!(fixed.shell_vert_range(), (3, 7));
        assert_eq!(fixed.rod_count(), 2);
        assert_eq!(fixed.shell_count(), 2);
        assert_eq!(fixed.tri().ncols(), 2 + 4);
        assert_eq!(fixed.tet().ncols(), 1);

        for e in fixed.rod().iter() {
            assert_lt!(*e, 3);
        }
        for f in fixed.tri().columns(0, fixed.shell_count()).iter() {
            assert_ge!(*f, 3);
            assert_lt!(*f, 7);
        }
        // solid surfaces stay in the remainder range
        for f in fixed.tri().columns(2, 4).iter() {
            assert_ge!(*f, 7);
        }
        let mut seen = vec![false; fixed.vert().ncols()];
        for &vi in fixed
            .rod()
            .iter()
            .chain(fixed.tri().iter())
            .chain(fixed.tet().iter())
        {
            seen[vi] = true;
        }
        assert!(seen.iter().all(|&s| s));

        // rod vertices follow edge order: 2, 1, 0
        assert_relative_eq!(
            fixed.vert().column(0).into_owned(),
            Vector3::new(2.0, 5.0, 0.0)
        );
        assert_relative_eq!(
            fixed.vert().column(2).into_owned(),
            Vector3::new(0.0, 5.0, 0.0)
        );
    }

    #[test]
    fn pins_and_stitches_are_remapped() {
        let mut scene = scene();
        scene.add("square", "cloth").unwrap();
        let rope = scene.add("rope", "rope").unwrap();
        rope.pin(Some(&[0])).unwrap().hold(1.0).unwrap();
        rope.stitch("seam").unwrap();
        let fixed = scene.build().unwrap();
        assert_eq!(fixed.pin().len(), 1);
        // local 0 is the last endpoint of the rope walk
        assert_eq!(fixed.pin()[0].index, vec![2]);
        assert_eq!(fixed.pin()[0].keyframe.len(), 2);
        assert_eq!(fixed.stitch_ind().column(0).iter().copied().collect::<Vec<_>>(), vec![2, 1, 0]);
        assert_relative_eq!(fixed.stitch_w()[(0, 0)], 0.5);
    }

    #[test]
    fn uncolored_dynamic_objects_get_distinct_hues() {
        let mut scene = scene();
        scene.add("square", "a").unwrap();
        scene.add("square", "b").unwrap().color(0.1, 0.2, 0.3);
        scene.add("square", "c").unwrap();
        let fixed = scene.build().unwrap();
        let color = fixed.color();
        assert_relative_eq!(color.column(0).into_owned(), Vector3::new(1.0, 0.25, 0.25));
        assert_relative_eq!(color.column(4).into_owned(), Vector3::new(0.1, 0.2, 0.3));
        assert_relative_eq!(color.column(8).into_owned(), Vector3::new(0.25, 1.0, 1.0));
    }

    #[test]
    fn hsv_matches_primary_hues() {
        assert_relative_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Vector3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(hsv_to_rgb(1.0 / 3.0, 1.0, 1.0), Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(hsv_to_rgb(0.5, 0.0, 0.4), Vector3::new(0.4, 0.4, 0.4));
    }

    #[test]
    fn obstacles_pass_through() {
        let mut scene = scene();
        scene.add("square", "cloth").unwrap();
        scene
            .add_invisible_wall([0.0, 0.0, 0.0], [0.0, 1.0, 0.0])
            .move_by([0.0, 1.0, 0.0], 1.0)
            .unwrap();
        scene.add_invisible_sphere([0.0, 0.0, 0.0], 1.0).invert();
        let fixed = scene.build().unwrap();
        assert_eq!(fixed.wall().len(), 1);
        assert_eq!(fixed.wall()[0].entry().len(), 2);
        assert!(fixed.sphere()[0].is_inverted());
    }

    #[test]
    fn atop_by_name() {
        let mut scene = scene();
        scene.add("square", "floor").unwrap();
        scene.add("square", "top").unwrap();
        scene.atop("top", "floor", 1.0).unwrap();
        assert_relative_eq!(scene.pick("top").unwrap().min(1).unwrap(), 1.0);
        assert!(scene.atop("top", "nothing", 0.0).is_err());
    }
}
