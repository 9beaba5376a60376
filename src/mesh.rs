// File: mesh.rs
// License: Apache v2.0

use super::error::{Result, SceneError};
use na::{Matrix2xX, Matrix3xX, Matrix4xX};
use serde::{Deserialize, Serialize};

/// Rod mesh: one column per vertex, one column per edge.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LineMesh {
    pub vertices: Matrix3xX<f64>,
    pub edges: Matrix2xX<usize>,
}

/// Shell mesh.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SurfaceMesh {
    pub vertices: Matrix3xX<f64>,
    pub triangles: Matrix3xX<usize>,
}

/// Solid mesh. `surface` holds the boundary triangles of `tets`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VolumeMesh {
    pub vertices: Matrix3xX<f64>,
    pub surface: Matrix3xX<usize>,
    pub tets: Matrix4xX<usize>,
}

/// Stitch pairs: column `i` binds vertex `index[0]` to
/// `weight[0] * x[index[1]] + weight[1] * x[index[2]]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StitchMesh {
    pub index: Matrix3xX<usize>,
    pub weight: Matrix2xX<f64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum MeshAsset {
    Rod(LineMesh),
    Tri(SurfaceMesh),
    Tet(VolumeMesh),
    Stitch(StitchMesh),
}

impl LineMesh {
    pub fn from_rows(vertices: &[[f64; 3]], edges: &[[usize; 2]]) -> Self {
        Self {
            vertices: Matrix3xX::from_iterator(vertices.len(), vertices.iter().flatten().copied()),
            edges: Matrix2xX::from_iterator(edges.len(), edges.iter().flatten().copied()),
        }
    }
}

impl SurfaceMesh {
    pub fn from_rows(vertices: &[[f64; 3]], triangles: &[[usize; 3]]) -> Self {
        Self {
            vertices: Matrix3xX::from_iterator(vertices.len(), vertices.iter().flatten().copied()),
            triangles: Matrix3xX::from_iterator(
                triangles.len(),
                triangles.iter().flatten().copied(),
            ),
        }
    }
}

impl VolumeMesh {
    pub fn from_rows(
        vertices: &[[f64; 3]],
        surface: &[[usize; 3]],
        tets: &[[usize; 4]],
    ) -> Self {
        Self {
            vertices: Matrix3xX::from_iterator(vertices.len(), vertices.iter().flatten().copied()),
            surface: Matrix3xX::from_iterator(surface.len(), surface.iter().flatten().copied()),
            tets: Matrix4xX::from_iterator(tets.len(), tets.iter().flatten().copied()),
        }
    }
}

impl StitchMesh {
    pub fn from_rows(index: &[[usize; 3]], weight: &[[f64; 2]]) -> Self {
        Self {
            index: Matrix3xX::from_iterator(index.len(), index.iter().flatten().copied()),
            weight: Matrix2xX::from_iterator(weight.len(), weight.iter().flatten().copied()),
        }
    }
}

impl MeshAsset {
    pub fn kind(&self) -> &'static str {
        match self {
            MeshAsset::Rod(_) => "rod",
            MeshAsset::Tri(_) => "tri",
            MeshAsset::Tet(_) => "tet",
            MeshAsset::Stitch(_) => "stitch",
        }
    }

    pub fn vertices(&self) -> Option<&Matrix3xX<f64>> {
        match self {
            MeshAsset::Rod(mesh) => Some(&mesh.vertices),
            MeshAsset::Tri(mesh) => Some(&mesh.vertices),
            MeshAsset::Tet(mesh) => Some(&mesh.vertices),
            MeshAsset::Stitch(_) => None,
        }
    }

    pub fn edges(&self) -> Option<&Matrix2xX<usize>> {
        match self {
            MeshAsset::Rod(mesh) => Some(&mesh.edges),
            _ => None,
        }
    }

    /// Triangles of a shell, or the boundary of a solid.
    pub fn triangles(&self) -> Option<&Matrix3xX<usize>> {
        match self {
            MeshAsset::Tri(mesh) => Some(&mesh.triangles),
            MeshAsset::Tet(mesh) => Some(&mesh.surface),
            _ => None,
        }
    }

    pub fn tets(&self) -> Option<&Matrix4xX<usize>> {
        match self {
            MeshAsset::Tet(mesh) => Some(&mesh.tets),
            _ => None,
        }
    }

    pub fn stitch(&self) -> Option<&StitchMesh> {
        match self {
            MeshAsset::Stitch(stitch) => Some(stitch),
            _ => None,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices().map_or(0, |v| v.ncols())
    }

    /// Checks that every element references an existing vertex.
    pub fn validate(&self, name: &str) -> Result<()> {
        let n_vert = self.vertex_count();
        match self {
            MeshAsset::Rod(mesh) => check_bounds(name, "E", n_vert, &mesh.edges),
            MeshAsset::Tri(mesh) => check_bounds(name, "F", n_vert, &mesh.triangles),
            MeshAsset::Tet(mesh) => {
                check_bounds(name, "F", n_vert, &mesh.surface)?;
                check_bounds(name, "T", n_vert, &mesh.tets)
            }
            MeshAsset::Stitch(stitch) => {
                if stitch.index.ncols() != stitch.weight.ncols() {
                    return Err(SceneError::Topology {
                        name: name.to_string(),
                        reason: format!(
                            "Ind has {} rows but W has {}",
                            stitch.index.ncols(),
                            stitch.weight.ncols()
                        ),
                    });
                }
                for (row, w) in stitch.weight.column_iter().enumerate() {
                    let sum = w.sum();
                    if (sum - 1.0).abs() > 1e-3 {
                        return Err(SceneError::StitchWeight { row, sum });
                    }
                }
                Ok(())
            }
        }
    }
}

pub(crate) fn check_bounds<D: na::Dim>(
    name: &str,
    label: &str,
    vertex_count: usize,
    element: &na::Matrix<usize, D, na::Dyn, na::VecStorage<usize, D, na::Dyn>>,
) -> Result<()>
where
    na::VecStorage<usize, D, na::Dyn>: na::RawStorage<usize, D, na::Dyn>,
{
    match element.iter().max() {
        Some(&max_ind) if max_ind >= vertex_count => Err(SceneError::Topology {
            name: name.to_string(),
            reason: format!(
                "{} contains index {} out of bounds ({})",
                label, max_ind, vertex_count
            ),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_become_columns() {
        let mesh = SurfaceMesh::from_rows(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            &[[0, 1, 2]],
        );
        assert_eq!(mesh.vertices.ncols(), 3);
        assert_eq!(mesh.vertices.column(1)[0], 1.0);
        assert_eq!(mesh.triangles.column(0)[2], 2);
    }

    #[test]
    fn tet_surface_is_exposed_as_triangles() {
        let asset = MeshAsset::Tet(VolumeMesh::from_rows(
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [0.0, 0.0, 1.0],
            ],
            &[[0, 2, 1], [0, 1, 3], [0, 3, 2], [1, 2, 3]],
            &[[0, 1, 2, 3]],
        ));
        assert_eq!(asset.triangles().map(|f| f.ncols()), Some(4));
        assert_eq!(asset.tets().map(|t| t.ncols()), Some(1));
        assert!(asset.edges().is_none());
        assert!(asset.validate("tet").is_ok());
    }

    #[test]
    fn out_of_range_edge_is_rejected() {
        let asset = MeshAsset::Rod(LineMesh::from_rows(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]],
            &[[0, 1], [1, 2]],
        ));
        match asset.validate("rope") {
            Err(SceneError::Topology { name, .. }) => assert_eq!(name, "rope"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn stitch_weights_must_sum_to_one() {
        let asset = MeshAsset::Stitch(StitchMesh::from_rows(&[[0, 1, 2]], &[[0.5, 0.4]]));
        assert!(matches!(
            asset.validate("seam"),
            Err(SceneError::StitchWeight { row: 0, .. })
        ));
    }
}
