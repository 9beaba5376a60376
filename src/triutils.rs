// File: triutils.rs
// License: Apache v2.0

use na::{Matrix3xX, Vector3};

pub fn area(x: &Matrix3xX<f64>, faces: &Matrix3xX<usize>, index: usize) -> f64 {
    let f = faces.column(index);
    let x0 = x.column(f[0]);
    let x1 = x.column(f[1]);
    let x2 = x.column(f[2]);
    let e0 = x1 - x0;
    let e1 = x2 - x0;
    0.5 * e0.cross(&e1).norm()
}

pub fn centroid(x: &Matrix3xX<f64>, faces: &Matrix3xX<usize>, index: usize) -> Vector3<f64> {
    let f = faces.column(index);
    (x.column(f[0]) + x.column(f[1]) + x.column(f[2])) / 3.0
}

pub fn face_areas(x: &Matrix3xX<f64>, faces: &Matrix3xX<usize>) -> Vec<f64> {
    (0..faces.ncols()).map(|i| area(x, faces, i)).collect()
}
