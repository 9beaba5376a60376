// File: lib.rs
// License: Apache v2.0

// Scene authoring for the contact solver: objects are assembled from
// registered meshes, compiled into one indexed scene and exported in the
// layout the solver reads.

mod args;
mod asset;
mod error;
mod export;
mod fixed;
mod invisible;
mod loader;
mod manager;
mod mesh;
mod object;
mod pin;
mod plot;
mod scene;
mod transform;
mod triutils;

extern crate nalgebra as na;

pub use args::{ProgramArgs, SceneArgs};
pub use asset::{AssetManager, MeshResolver};
pub use error::{Result, SceneError};
pub use fixed::{FixedScene, Intersection, IntersectionCheck};
pub use invisible::{Sphere, SphereEntry, Wall, WallEntry};
pub use loader::{Counts, ExportedPin, ExportedScene, ExportedSphere, ExportedWall};
pub use manager::SceneManager;
pub use mesh::{LineMesh, MeshAsset, StitchMesh, SurfaceMesh, VolumeMesh};
pub use object::Object;
pub use pin::{calc_coefficient, PinData, PinHolder, PinKeyframe, SpinData, Transition};
pub use plot::{PlotSink, Preview, PreviewOptions};
pub use scene::Scene;
pub use transform::Transform;
