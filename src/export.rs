// File: export.rs
// License: Apache v2.0

use super::error::{Result, SceneError};
use super::fixed::FixedScene;
use bytemuck::cast_slice;
use std::fs;
use std::path::Path;

/// Little-endian f32 words.
fn f32_words<'a>(data: impl Iterator<Item = &'a f64>) -> Vec<u32> {
    data.map(|&x| (x as f32).to_bits().to_le()).collect()
}

/// Little-endian u64 words.
fn u64_words<'a>(data: impl Iterator<Item = &'a usize>) -> Vec<u64> {
    data.map(|&x| (x as u64).to_le()).collect()
}

fn write_bin(path: &Path, bytes: &[u8]) -> Result<()> {
    fs::write(path, bytes).map_err(|e| SceneError::io(path, e))
}

fn write_f32<'a>(path: &Path, data: impl Iterator<Item = &'a f64>) -> Result<()> {
    write_bin(path, cast_slice(&f32_words(data)))
}

fn write_u64<'a>(path: &Path, data: impl Iterator<Item = &'a usize>) -> Result<()> {
    write_bin(path, cast_slice(&u64_words(data)))
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| SceneError::io(path, e))
}

/// Empties `path` without removing it.
fn clear_dir(path: &Path) -> Result<()> {
    for entry in fs::read_dir(path).map_err(|e| SceneError::io(path, e))? {
        let item = entry.map_err(|e| SceneError::io(path, e))?.path();
        if item.is_dir() {
            fs::remove_dir_all(&item).map_err(|e| SceneError::io(&item, e))?;
        } else {
            fs::remove_file(&item).map_err(|e| SceneError::io(&item, e))?;
        }
    }
    Ok(())
}

fn flag(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

impl FixedScene {
    /// The `info.toml` manifest.
    pub fn manifest(&self) -> String {
        let mut s = String::new();
        s.push_str("[count]\n");
        s.push_str(&format!("vert = {}\n", self.vert.ncols()));
        s.push_str(&format!("rod = {}\n", self.rod.ncols()));
        s.push_str(&format!("tri = {}\n", self.tri.ncols()));
        s.push_str(&format!("tet = {}\n", self.tet.ncols()));
        s.push_str(&format!("static_vert = {}\n", self.static_vert.ncols()));
        s.push_str(&format!("static_tri = {}\n", self.static_tri.ncols()));
        s.push_str(&format!("pin_block = {}\n", self.pin.len()));
        s.push_str(&format!("wall = {}\n", self.wall.len()));
        s.push_str(&format!("sphere = {}\n", self.sphere.len()));
        s.push_str(&format!("stitch = {}\n", self.stitch_ind.ncols()));
        s.push_str(&format!("rod_vert_start = {}\n", self.rod_vert_range.0));
        s.push_str(&format!("rod_vert_end = {}\n", self.rod_vert_range.1));
        s.push_str(&format!("shell_vert_start = {}\n", self.shell_vert_range.0));
        s.push_str(&format!("shell_vert_end = {}\n", self.shell_vert_range.1));
        s.push_str(&format!("rod_count = {}\n", self.rod_count));
        s.push_str(&format!("shell_count = {}\n", self.shell_count));
        s.push('\n');

        for (i, pin) in self.pin.iter().enumerate() {
            s.push_str(&format!("[pin-{}]\n", i));
            s.push_str(&format!("keyframe = {}\n", pin.keyframe.len()));
            s.push_str(&format!("spin = {}\n", pin.spin.len()));
            s.push_str(&format!("pin = {}\n", pin.index.len()));
            s.push_str(&format!("pull = {:?}\n", pin.pull_strength));
            s.push_str(&format!("unpin = {}\n", flag(pin.should_unpin)));
            s.push_str(&format!("transition = \"{}\"\n", pin.transition));
        }

        for (i, wall) in self.wall.iter().enumerate() {
            let normal = wall.normal();
            s.push_str(&format!("[wall-{}]\n", i));
            s.push_str(&format!("keyframe = {}\n", wall.entry().len()));
            s.push_str(&format!("nx = {:?}\n", normal[0]));
            s.push_str(&format!("ny = {:?}\n", normal[1]));
            s.push_str(&format!("nz = {:?}\n", normal[2]));
            s.push_str(&format!("transition = \"{}\"\n", wall.transition()));
            s.push('\n');
        }

        for (i, sphere) in self.sphere.iter().enumerate() {
            s.push_str(&format!("[sphere-{}]\n", i));
            s.push_str(&format!("keyframe = {}\n", sphere.entry().len()));
            s.push_str(&format!("hemisphere = {}\n", flag(sphere.is_hemisphere())));
            s.push_str(&format!("invert = {}\n", flag(sphere.is_inverted())));
            s.push_str(&format!("transition = \"{}\"\n", sphere.transition()));
            s.push('\n');
        }
        s
    }

    /// `[spin-j]` tables of pin `i`, or `None` when it does not spin.
    fn spin_table(&self, i: usize) -> Option<String> {
        let pin = &self.pin[i];
        if pin.spin.is_empty() {
            return None;
        }
        let mut s = String::new();
        for (j, spin) in pin.spin.iter().enumerate() {
            s.push_str(&format!("[spin-{}]\n", j));
            s.push_str(&format!("center_x = {:?}\n", spin.center[0]));
            s.push_str(&format!("center_y = {:?}\n", spin.center[1]));
            s.push_str(&format!("center_z = {:?}\n", spin.center[2]));
            s.push_str(&format!("axis_x = {:?}\n", spin.axis[0]));
            s.push_str(&format!("axis_y = {:?}\n", spin.axis[1]));
            s.push_str(&format!("axis_z = {:?}\n", spin.axis[2]));
            s.push_str(&format!("angular_velocity = {:?}\n", spin.angular_velocity));
            s.push_str(&format!("t_start = {:?}\n", spin.t_start));
            s.push_str(&format!("t_end = {:?}\n", spin.t_end));
        }
        Some(s)
    }

    /// Writes the simulator input layout under `path`.
    ///
    /// An existing `path` is emptied when `delete_exist` is set and is an
    /// error otherwise.
    pub fn export_fixed(&self, path: impl AsRef<Path>, delete_exist: bool) -> Result<&Self> {
        let path = path.as_ref();
        if path.exists() {
            if delete_exist {
                clear_dir(path)?;
            } else {
                return Err(SceneError::AlreadyExists(path.display().to_string()));
            }
        } else {
            create_dir(path)?;
        }
        log::info!("exporting {} to {}", self.name, path.display());

        let info_path = path.join("info.toml");
        fs::write(&info_path, self.manifest()).map_err(|e| SceneError::io(&info_path, e))?;

        let bin = path.join("bin");
        create_dir(&bin)?;

        write_f32(&bin.join("vert.bin"), self.vert.iter())?;
        write_f32(&bin.join("color.bin"), self.color.iter())?;
        write_f32(&bin.join("vel.bin"), self.vel.iter())?;
        if self.uv.norm() > 0.0 {
            write_f32(&bin.join("uv.bin"), self.uv.iter())?;
        }

        if self.rod.ncols() > 0 {
            write_u64(&bin.join("rod.bin"), self.rod.iter())?;
        }
        if self.tri.ncols() > 0 {
            write_u64(&bin.join("tri.bin"), self.tri.iter())?;
        }
        if self.tet.ncols() > 0 {
            write_u64(&bin.join("tet.bin"), self.tet.iter())?;
        }
        if self.static_vert.ncols() > 0 {
            write_f32(&bin.join("static_vert.bin"), self.static_vert.iter())?;
            write_u64(&bin.join("static_tri.bin"), self.static_tri.iter())?;
            write_f32(&bin.join("static_color.bin"), self.static_color.iter())?;
        }
        if self.has_stitch() {
            write_u64(&bin.join("stitch_ind.bin"), self.stitch_ind.iter())?;
            write_f32(&bin.join("stitch_w.bin"), self.stitch_w.iter())?;
        }

        for (i, pin) in self.pin.iter().enumerate() {
            write_u64(&bin.join(format!("pin-ind-{}.bin", i)), pin.index.iter())?;
            if !pin.keyframe.is_empty() {
                let target_dir = bin.join(format!("pin-{}", i));
                create_dir(&target_dir)?;
                let timing = pin.timing();
                write_f32(&bin.join(format!("pin-timing-{}.bin", i)), timing.iter())?;
                for (j, entry) in pin.keyframe.iter().enumerate() {
                    write_f32(&target_dir.join(format!("{}.bin", j)), entry.position.iter())?;
                }
            }
            if let Some(table) = self.spin_table(i) {
                let spin_dir = path.join("spin");
                create_dir(&spin_dir)?;
                let spin_path = spin_dir.join(format!("spin-{}.toml", i));
                fs::write(&spin_path, table).map_err(|e| SceneError::io(&spin_path, e))?;
            }
        }

        for (i, wall) in self.wall.iter().enumerate() {
            let pos: Vec<f64> = wall.entry().iter().flat_map(|e| e.position.iter().copied()).collect();
            write_f32(&bin.join(format!("wall-pos-{}.bin", i)), pos.iter())?;
            write_f32(&bin.join(format!("wall-timing-{}.bin", i)), wall.timing().iter())?;
        }

        for (i, sphere) in self.sphere.iter().enumerate() {
            let entry = sphere.entry();
            let pos: Vec<f64> = entry.iter().flat_map(|e| e.position.iter().copied()).collect();
            let radius: Vec<f64> = entry.iter().map(|e| e.radius).collect();
            write_f32(&bin.join(format!("sphere-pos-{}.bin", i)), pos.iter())?;
            write_f32(&bin.join(format!("sphere-radius-{}.bin", i)), radius.iter())?;
            write_f32(&bin.join(format!("sphere-timing-{}.bin", i)), sphere.timing().iter())?;
        }

        log::info!(
            "exported {} vertices, {} pins, {} walls, {} spheres",
            self.vert.ncols(),
            self.pin.len(),
            self.wall.len(),
            self.sphere.len()
        );
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixed::tests::empty;
    use na::Matrix3xX;

    #[test]
    fn floats_are_little_endian_f32() {
        let words = f32_words([1.0f64, -2.5].iter());
        let bytes: &[u8] = cast_slice(&words);
        assert_eq!(&bytes[0..4], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[4..8], &(-2.5f32).to_le_bytes());
        let ind = u64_words([7usize].iter());
        assert_eq!(cast_slice::<u64, u8>(&ind), &7u64.to_le_bytes());
    }

    #[test]
    fn existing_directory_is_refused_or_emptied() {
        let dir = tempfile::tempdir().unwrap();
        let scene = empty(Matrix3xX::from_column_slice(&[0.0, 1.0, 2.0]));
        assert!(matches!(
            scene.export_fixed(dir.path(), false),
            Err(SceneError::AlreadyExists(_))
        ));
        fs::write(dir.path().join("stale.txt"), "old").unwrap();
        scene.export_fixed(dir.path(), true).unwrap();
        assert!(!dir.path().join("stale.txt").exists());
        let vert = fs::read(dir.path().join("bin/vert.bin")).unwrap();
        assert_eq!(vert.len(), 3 * 4);
        assert_eq!(&vert[4..8], &1.0f32.to_le_bytes());
        assert!(!dir.path().join("bin/uv.bin").exists());
        assert!(!dir.path().join("bin/tri.bin").exists());
    }

    #[test]
    fn manifest_lists_counts_in_order() {
        let scene = empty(Matrix3xX::zeros(5));
        let manifest = scene.manifest();
        let keys: Vec<&str> = manifest
            .lines()
            .skip(1)
            .take_while(|l| !l.is_empty())
            .filter_map(|l| l.split(" = ").next())
            .collect();
        assert_eq!(
            keys,
            vec![
                "vert",
                "rod",
                "tri",
                "tet",
                "static_vert",
                "static_tri",
                "pin_block",
                "wall",
                "sphere",
                "stitch",
                "rod_vert_start",
                "rod_vert_end",
                "shell_vert_start",
                "shell_vert_end",
                "rod_count",
                "shell_count",
            ]
        );
        assert!(manifest.starts_with("[count]\nvert = 5\n"));
    }
}
