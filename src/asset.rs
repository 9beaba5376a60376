// File: asset.rs
// License: Apache v2.0

use super::error::{Result, SceneError};
use super::mesh::{LineMesh, MeshAsset, StitchMesh, SurfaceMesh, VolumeMesh};
use indexmap::IndexMap;
use std::sync::Arc;

/// Resolves a mesh reference name to its registered geometry.
pub trait MeshResolver {
    fn resolve(&self, name: &str) -> Result<Arc<MeshAsset>>;

    fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_ok()
    }
}

/// In-memory asset registry.
#[derive(Default)]
pub struct AssetManager {
    mesh: IndexMap<String, Arc<MeshAsset>>,
}

impl AssetManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self) -> Vec<String> {
        self.mesh.keys().cloned().collect()
    }

    pub fn remove(&mut self, name: &str) -> bool {
        self.mesh.shift_remove(name).is_some()
    }

    pub fn clear(&mut self) {
        self.mesh.clear();
    }

    pub fn add_rod(&mut self, name: &str, mesh: LineMesh) -> Result<()> {
        self.insert(name, MeshAsset::Rod(mesh))
    }

    pub fn add_tri(&mut self, name: &str, mesh: SurfaceMesh) -> Result<()> {
        self.insert(name, MeshAsset::Tri(mesh))
    }

    pub fn add_tet(&mut self, name: &str, mesh: VolumeMesh) -> Result<()> {
        self.insert(name, MeshAsset::Tet(mesh))
    }

    pub fn add_stitch(&mut self, name: &str, stitch: StitchMesh) -> Result<()> {
        self.insert(name, MeshAsset::Stitch(stitch))
    }

    fn insert(&mut self, name: &str, asset: MeshAsset) -> Result<()> {
        if self.mesh.contains_key(name) {
            return Err(SceneError::DuplicateAsset(name.to_string()));
        }
        asset.validate(name)?;
        log::info!("registered {} asset '{}'", asset.kind(), name);
        self.mesh.insert(name.to_string(), Arc::new(asset));
        Ok(())
    }
}

impl MeshResolver for AssetManager {
    fn resolve(&self, name: &str) -> Result<Arc<MeshAsset>> {
        self.mesh
            .get(name)
            .cloned()
            .ok_or_else(|| SceneError::UnknownMesh(name.to_string()))
    }

    fn contains(&self, name: &str) -> bool {
        self.mesh.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sheet() -> SurfaceMesh {
        SurfaceMesh::from_rows(
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            &[[0, 1, 2]],
        )
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut asset = AssetManager::new();
        asset.add_tri("sheet", sheet()).unwrap();
        assert!(matches!(
            asset.add_tri("sheet", sheet()),
            Err(SceneError::DuplicateAsset(_))
        ));
        assert_eq!(asset.list(), vec!["sheet".to_string()]);
    }

    #[test]
    fn unknown_names_fail_to_resolve() {
        let asset = AssetManager::new();
        assert!(matches!(
            asset.resolve("missing"),
            Err(SceneError::UnknownMesh(_))
        ));
        assert!(!asset.contains("missing"));
    }

    #[test]
    fn remove_forgets_the_asset() {
        let mut asset = AssetManager::new();
        asset.add_tri("sheet", sheet()).unwrap();
        assert!(asset.remove("sheet"));
        assert!(!asset.remove("sheet"));
        assert!(asset.list().is_empty());
    }
}
