// File: loader.rs
// License: Apache v2.0

use super::error::{Result, SceneError};
use super::pin::{SpinData, Transition};
use bytemuck::Pod;
use na::{Const, Dyn, Matrix2xX, Matrix3xX, Matrix4xX, OMatrix, Vector3};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use toml::Value;

/// The `[count]` table of `info.toml`.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct Counts {
    pub vert: usize,
    pub rod: usize,
    pub tri: usize,
    pub tet: usize,
    pub static_vert: usize,
    pub static_tri: usize,
    pub pin_block: usize,
    pub wall: usize,
    pub sphere: usize,
    pub stitch: usize,
    pub rod_vert_start: usize,
    pub rod_vert_end: usize,
    pub shell_vert_start: usize,
    pub shell_vert_end: usize,
    pub rod_count: usize,
    pub shell_count: usize,
}

#[derive(Deserialize)]
struct PinSection {
    keyframe: usize,
    spin: usize,
    pin: usize,
    pull: f64,
    unpin: bool,
    transition: Transition,
}

#[derive(Deserialize)]
struct WallSection {
    keyframe: usize,
    nx: f64,
    ny: f64,
    nz: f64,
    transition: Transition,
}

#[derive(Deserialize)]
struct SphereSection {
    keyframe: usize,
    hemisphere: bool,
    invert: bool,
    transition: Transition,
}

#[derive(Deserialize)]
struct SpinSection {
    center_x: f64,
    center_y: f64,
    center_z: f64,
    axis_x: f64,
    axis_y: f64,
    axis_z: f64,
    angular_velocity: f64,
    t_start: f64,
    t_end: f64,
}

pub struct ExportedPin {
    pub index: Vec<usize>,
    pub timing: Vec<f32>,
    pub keyframe: Vec<Matrix3xX<f32>>,
    pub spin: Vec<SpinData>,
    pub unpin: bool,
    pub pull: f64,
    pub transition: Transition,
}

pub struct ExportedWall {
    pub normal: Vector3<f64>,
    pub position: Matrix3xX<f32>,
    pub timing: Vec<f32>,
    pub transition: Transition,
}

pub struct ExportedSphere {
    pub center: Matrix3xX<f32>,
    pub radius: Vec<f32>,
    pub timing: Vec<f32>,
    pub hemisphere: bool,
    pub invert: bool,
    pub transition: Transition,
}

/// A scene directory as written by `FixedScene::export_fixed`.
pub struct ExportedScene {
    pub count: Counts,
    pub vert: Matrix3xX<f32>,
    pub color: Matrix3xX<f32>,
    pub vel: Matrix3xX<f32>,
    pub uv: Option<Matrix2xX<f32>>,
    pub rod: Matrix2xX<usize>,
    pub tri: Matrix3xX<usize>,
    pub tet: Matrix4xX<usize>,
    pub static_vert: Matrix3xX<f32>,
    pub static_tri: Matrix3xX<usize>,
    pub static_color: Matrix3xX<f32>,
    pub stitch_ind: Matrix3xX<usize>,
    pub stitch_w: Matrix2xX<f32>,
    pub pin: Vec<ExportedPin>,
    pub wall: Vec<ExportedWall>,
    pub sphere: Vec<ExportedSphere>,
}

fn read_words<T: Pod>(path: &Path) -> Result<Vec<T>> {
    let buff = fs::read(path).map_err(|e| SceneError::io(path, e))?;
    let size = std::mem::size_of::<T>();
    if buff.len() % size != 0 {
        return Err(SceneError::format(
            path,
            "data length is not a multiple of the element size",
        ));
    }
    Ok(buff
        .chunks_exact(size)
        .map(bytemuck::pod_read_unaligned)
        .collect())
}

fn read_f32(path: &Path) -> Result<Vec<f32>> {
    Ok(read_words::<u32>(path)?
        .into_iter()
        .map(|w| f32::from_bits(u32::from_le(w)))
        .collect())
}

fn read_u64(path: &Path) -> Result<Vec<usize>> {
    read_words::<u64>(path)?
        .into_iter()
        .map(|w| usize::try_from(u64::from_le(w)))
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| SceneError::format(path, "index does not fit in usize"))
}

/// Reshapes `data` into `ncols` columns of `C` rows.
fn to_mat<T: na::Scalar, const C: usize>(
    path: &Path,
    data: Vec<T>,
    ncols: usize,
) -> Result<OMatrix<T, Const<C>, Dyn>> {
    let expected = C
        .checked_mul(ncols)
        .ok_or_else(|| SceneError::format(path, format!("count {} overflows", ncols)))?;
    if data.len() != expected {
        return Err(SceneError::format(
            path,
            format!("expected {} values, found {}", expected, data.len()),
        ));
    }
    Ok(OMatrix::<T, Const<C>, Dyn>::from_vec(data))
}

fn check_len(path: &Path, label: &str, expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(SceneError::format(
            path,
            format!("{}: expected {} entries, found {}", label, expected, actual),
        ));
    }
    Ok(())
}

fn section<T: for<'de> Deserialize<'de>>(path: &Path, parsed: &Value, title: &str) -> Result<T> {
    let value = parsed
        .get(title)
        .ok_or_else(|| SceneError::format(path, format!("missing [{}]", title)))?;
    value
        .clone()
        .try_into()
        .map_err(|e: toml::de::Error| SceneError::format(path, format!("[{}]: {}", title, e)))
}

fn parse_toml(path: &Path) -> Result<Value> {
    let content = fs::read_to_string(path).map_err(|e| SceneError::io(path, e))?;
    content
        .parse::<Value>()
        .map_err(|e| SceneError::format(path, e.to_string()))
}

struct Layout {
    root: PathBuf,
}

impl Layout {
    fn bin(&self, name: &str) -> PathBuf {
        self.root.join("bin").join(name)
    }

    fn f32_mat<const C: usize>(&self, name: &str, ncols: usize) -> Result<OMatrix<f32, Const<C>, Dyn>> {
        let path = self.bin(name);
        to_mat::<f32, C>(&path, read_f32(&path)?, ncols)
    }

    fn u64_mat<const C: usize>(&self, name: &str, ncols: usize) -> Result<OMatrix<usize, Const<C>, Dyn>> {
        let path = self.bin(name);
        to_mat::<usize, C>(&path, read_u64(&path)?, ncols)
    }

    fn optional_u64_mat<const C: usize>(
        &self,
        name: &str,
        ncols: usize,
    ) -> Result<OMatrix<usize, Const<C>, Dyn>> {
        if ncols > 0 {
            self.u64_mat::<C>(name, ncols)
        } else {
            Ok(OMatrix::<usize, Const<C>, Dyn>::zeros(0))
        }
    }
}

impl ExportedScene {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        let info_path = root.join("info.toml");
        let parsed = parse_toml(&info_path)?;
        let count: Counts = section(&info_path, &parsed, "count")?;
        let layout = Layout { root };

        let vert = layout.f32_mat::<3>("vert.bin", count.vert)?;
        let color = layout.f32_mat::<3>("color.bin", count.vert)?;
        let vel = layout.f32_mat::<3>("vel.bin", count.vert)?;
        let uv = if layout.bin("uv.bin").exists() {
            Some(layout.f32_mat::<2>("uv.bin", count.vert)?)
        } else {
            None
        };
        let rod = layout.optional_u64_mat::<2>("rod.bin", count.rod)?;
        let tri = layout.optional_u64_mat::<3>("tri.bin", count.tri)?;
        let tet = layout.optional_u64_mat::<4>("tet.bin", count.tet)?;

        let (static_vert, static_tri, static_color) = if count.static_vert > 0 {
            (
                layout.f32_mat::<3>("static_vert.bin", count.static_vert)?,
                layout.u64_mat::<3>("static_tri.bin", count.static_tri)?,
                layout.f32_mat::<3>("static_color.bin", count.static_vert)?,
            )
        } else {
            (
                Matrix3xX::zeros(0),
                Matrix3xX::zeros(0),
                Matrix3xX::zeros(0),
            )
        };
        let (stitch_ind, stitch_w) = if count.stitch > 0 {
            (
                layout.u64_mat::<3>("stitch_ind.bin", count.stitch)?,
                layout.f32_mat::<2>("stitch_w.bin", count.stitch)?,
            )
        } else {
            (Matrix3xX::zeros(0), Matrix2xX::zeros(0))
        };

        let mut pin = Vec::new();
        for i in 0..count.pin_block {
            let entry: PinSection = section(&info_path, &parsed, &format!("pin-{}", i))?;
            let ind_path = layout.bin(&format!("pin-ind-{}.bin", i));
            let index = read_u64(&ind_path)?;
            check_len(&ind_path, "pin", entry.pin, index.len())?;

            let mut timing = Vec::new();
            let mut keyframe = Vec::new();
            if entry.keyframe > 0 {
                let timing_path = layout.bin(&format!("pin-timing-{}.bin", i));
                timing = read_f32(&timing_path)?;
                check_len(&timing_path, "keyframe", entry.keyframe, timing.len())?;
                for j in 0..entry.keyframe {
                    let name = format!("pin-{}/{}.bin", i, j);
                    keyframe.push(layout.f32_mat::<3>(&name, entry.pin)?);
                }
            }

            let mut spin = Vec::new();
            if entry.spin > 0 {
                let spin_path = layout.root.join("spin").join(format!("spin-{}.toml", i));
                let spin_toml = parse_toml(&spin_path)?;
                for j in 0..entry.spin {
                    let s: SpinSection = section(&spin_path, &spin_toml, &format!("spin-{}", j))?;
                    spin.push(SpinData {
                        center: Vector3::new(s.center_x, s.center_y, s.center_z),
                        axis: Vector3::new(s.axis_x, s.axis_y, s.axis_z),
                        angular_velocity: s.angular_velocity,
                        t_start: s.t_start,
                        t_end: s.t_end,
                    });
                }
            }
            pin.push(ExportedPin {
                index,
                timing,
                keyframe,
                spin,
                unpin: entry.unpin,
                pull: entry.pull,
                transition: entry.transition,
            });
        }

        let mut wall = Vec::new();
        for i in 0..count.wall {
            let entry: WallSection = section(&info_path, &parsed, &format!("wall-{}", i))?;
            let position = layout.f32_mat::<3>(&format!("wall-pos-{}.bin", i), entry.keyframe)?;
            let timing_path = layout.bin(&format!("wall-timing-{}.bin", i));
            let timing = read_f32(&timing_path)?;
            check_len(&timing_path, "keyframe", entry.keyframe, timing.len())?;
            wall.push(ExportedWall {
                normal: Vector3::new(entry.nx, entry.ny, entry.nz),
                position,
                timing,
                transition: entry.transition,
            });
        }

        let mut sphere = Vec::new();
        for i in 0..count.sphere {
            let entry: SphereSection = section(&info_path, &parsed, &format!("sphere-{}", i))?;
            let center = layout.f32_mat::<3>(&format!("sphere-pos-{}.bin", i), entry.keyframe)?;
            let radius_path = layout.bin(&format!("sphere-radius-{}.bin", i));
            let radius = read_f32(&radius_path)?;
            check_len(&radius_path, "keyframe", entry.keyframe, radius.len())?;
            let timing_path = layout.bin(&format!("sphere-timing-{}.bin", i));
            let timing = read_f32(&timing_path)?;
            check_len(&timing_path, "keyframe", entry.keyframe, timing.len())?;
            sphere.push(ExportedSphere {
                center,
                radius,
                timing,
                hemisphere: entry.hemisphere,
                invert: entry.invert,
                transition: entry.transition,
            });
        }

        Ok(Self {
            count,
            vert,
            color,
            vel,
            uv,
            rod,
            tri,
            tet,
            static_vert,
            static_tri,
            static_color,
            stitch_ind,
            stitch_w,
            pin,
            wall,
            sphere,
        })
    }

    pub fn report(&self) {
        let c = &self.count;
        log::info!("vert: {}", c.vert);
        log::info!("rod: {} (rod vertices {}..{})", c.rod, c.rod_vert_start, c.rod_vert_end);
        log::info!(
            "tri: {} ({} shell, shell vertices {}..{})",
            c.tri,
            c.shell_count,
            c.shell_vert_start,
            c.shell_vert_end
        );
        log::info!("tet: {}", c.tet);
        log::info!("static: {} vertices, {} triangles", c.static_vert, c.static_tri);
        log::info!("stitch: {}", c.stitch);
        for (i, pin) in self.pin.iter().enumerate() {
            log::info!(
                "pin-{}: {} vertices, {} keyframes, {} spins, pull {}, transition {}",
                i,
                pin.index.len(),
                pin.keyframe.len(),
                pin.spin.len(),
                pin.pull,
                pin.transition
            );
        }
        log::info!("wall: {}, sphere: {}", c.wall, c.sphere);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncated_binary_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vert.bin");
        fs::write(&path, [0u8; 7]).unwrap();
        assert!(matches!(read_f32(&path), Err(SceneError::Format { .. })));
        fs::write(&path, [0u8; 8]).unwrap();
        assert!(matches!(
            to_mat::<f32, 3>(&path, read_f32(&path).unwrap(), 1),
            Err(SceneError::Format { .. })
        ));
        assert!(matches!(
            to_mat::<f32, 3>(&path, Vec::new(), usize::MAX),
            Err(SceneError::Format { .. })
        ));
    }

    #[test]
    fn missing_manifest_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ExportedScene::load(dir.path()),
            Err(SceneError::Io { .. })
        ));
    }
}
