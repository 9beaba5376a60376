// File: manager.rs
// License: Apache v2.0

use super::args::SceneArgs;
use super::asset::MeshResolver;
use super::error::{Result, SceneError};
use super::scene::Scene;
use indexmap::IndexMap;
use std::sync::Arc;

/// Registry of named scenes sharing one mesh resolver.
pub struct SceneManager {
    resolver: Arc<dyn MeshResolver>,
    args: SceneArgs,
    scene: IndexMap<String, Scene>,
}

impl SceneManager {
    pub fn new(resolver: Arc<dyn MeshResolver>, args: SceneArgs) -> Self {
        Self {
            resolver,
            args,
            scene: IndexMap::new(),
        }
    }

    pub fn create(&mut self, name: &str) -> Result<&mut Scene> {
        if self.scene.contains_key(name) {
            return Err(SceneError::DuplicateScene(name.to_string()));
        }
        log::info!("created scene {}", name);
        let scene = Scene::new(name, self.resolver.clone(), self.args.clone());
        Ok(self.scene.entry(name.to_string()).or_insert(scene))
    }

    /// Returns scene `name`, creating it first when missing and `create` is
    /// set.
    pub fn select(&mut self, name: &str, create: bool) -> Result<&mut Scene> {
        if create && !self.scene.contains_key(name) {
            return self.create(name);
        }
        self.scene
            .get_mut(name)
            .ok_or_else(|| SceneError::UnknownScene(name.to_string()))
    }

    /// Removing an unknown scene is a no-op.
    pub fn remove(&mut self, name: &str) {
        self.scene.shift_remove(name);
    }

    pub fn clear(&mut self) {
        self.scene.clear();
    }

    pub fn list(&self) -> Vec<String> {
        self.scene.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetManager;

    fn manager() -> SceneManager {
        SceneManager::new(Arc::new(AssetManager::new()), SceneArgs::default())
    }

    #[test]
    fn create_select_remove() {
        let mut manager = manager();
        manager.create("a").unwrap();
        assert!(matches!(
            manager.create("a"),
            Err(SceneError::DuplicateScene(_))
        ));
        assert_eq!(manager.select("b", true).unwrap().name(), "b");
        assert!(matches!(
            manager.select("c", false),
            Err(SceneError::UnknownScene(_))
        ));
        manager.create("c").unwrap();
        manager.remove("b");
        manager.remove("nothing");
        assert_eq!(manager.list(), vec!["a", "c"]);
        manager.clear();
        assert!(manager.list().is_empty());
    }
}
