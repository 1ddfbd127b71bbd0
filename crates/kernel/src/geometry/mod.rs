//! Minimal 3D geometry for the polyhedral kernel.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Neg, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Point3) -> f64 {
        (*self - *other).norm()
    }

    pub fn lerp(&self, other: &Point3, t: f64) -> Point3 {
        *self + (*other - *self) * t
    }
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn dot(&self, other: &Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Vec3) -> Vec3 {
        Vec3 {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    pub fn norm(&self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn normalized(&self) -> Option<Vec3> {
        let n = self.norm();
        (n > 1e-12).then(|| *self * (1.0 / n))
    }

    /// Any unit vector perpendicular to this one.
    pub fn any_perpendicular(&self) -> Vec3 {
        let axis = if self.x.abs() < 0.9 {
            Vec3::new(1.0, 0.0, 0.0)
        } else {
            Vec3::new(0.0, 1.0, 0.0)
        };
        self.cross(&axis)
            .normalized()
            .unwrap_or(Vec3::new(0.0, 0.0, 1.0))
    }
}

impl Add<Vec3> for Point3 {
    type Output = Point3;
    fn add(self, v: Vec3) -> Point3 {
        Point3::new(self.x + v.x, self.y + v.y, self.z + v.z)
    }
}

impl Sub for Point3 {
    type Output = Vec3;
    fn sub(self, other: Point3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Add for Vec3 {
    type Output = Vec3;
    fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;
    fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Vec3;
    fn mul(self, s: f64) -> Vec3 {
        Vec3::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Neg for Vec3 {
    type Output = Vec3;
    fn neg(self) -> Vec3 {
        Vec3::new(-self.x, -self.y, -self.z)
    }
}

/// Oriented plane `normal . p = offset`, unit normal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    pub normal: Vec3,
    pub offset: f64,
}

impl Plane {
    pub fn new(normal: Vec3, point: Point3) -> Option<Self> {
        let normal = normal.normalized()?;
        Some(Self {
            normal,
            offset: normal.dot(&(point - Point3::default())),
        })
    }

    /// Best-effort plane through the first non-collinear triple of a loop.
    pub fn from_points(points: &[Point3]) -> Option<Self> {
        let a = *points.first()?;
        for i in 1..points.len() {
            for j in (i + 1)..points.len() {
                let n = (points[i] - a).cross(&(points[j] - a));
                if n.norm() > 1e-12 {
                    return Plane::new(n, a);
                }
            }
        }
        None
    }

    pub fn signed_distance(&self, p: &Point3) -> f64 {
        self.normal.dot(&(*p - Point3::default())) - self.offset
    }

    pub fn flipped(&self) -> Plane {
        Plane {
            normal: -self.normal,
            offset: -self.offset,
        }
    }
}

/// Right-handed coordinate frame lifting work-plane (u, v) pairs to 3D.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub origin: Point3,
    pub u: Vec3,
    pub v: Vec3,
    pub normal: Vec3,
}

impl Frame {
    /// Frame from an origin and a normal; u is chosen deterministically.
    pub fn from_normal(origin: Point3, normal: Vec3) -> Option<Self> {
        let normal = normal.normalized()?;
        let u = normal.any_perpendicular();
        let v = normal.cross(&u);
        Some(Self { origin, u, v, normal })
    }

    pub fn xy(offset: f64) -> Self {
        Self {
            origin: Point3::new(0.0, 0.0, offset),
            u: Vec3::new(1.0, 0.0, 0.0),
            v: Vec3::new(0.0, 1.0, 0.0),
            normal: Vec3::new(0.0, 0.0, 1.0),
        }
    }

    pub fn yz(offset: f64) -> Self {
        Self {
            origin: Point3::new(offset, 0.0, 0.0),
            u: Vec3::new(0.0, 1.0, 0.0),
            v: Vec3::new(0.0, 0.0, 1.0),
            normal: Vec3::new(1.0, 0.0, 0.0),
        }
    }

    pub fn zx(offset: f64) -> Self {
        Self {
            origin: Point3::new(0.0, offset, 0.0),
            u: Vec3::new(0.0, 0.0, 1.0),
            v: Vec3::new(1.0, 0.0, 0.0),
            normal: Vec3::new(0.0, 1.0, 0.0),
        }
    }

    pub fn to_world(&self, uv: [f64; 2]) -> Point3 {
        self.origin + self.u * uv[0] + self.v * uv[1]
    }

    pub fn to_local(&self, p: &Point3) -> [f64; 2] {
        let d = *p - self.origin;
        [d.dot(&self.u), d.dot(&self.v)]
    }

    pub fn plane(&self) -> Plane {
        Plane {
            normal: self.normal,
            offset: self.normal.dot(&(self.origin - Point3::default())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point3,
    pub max: Point3,
}

impl BoundingBox {
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn insert(&mut self, p: &Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    pub fn contains(&self, p: &Point3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    pub fn diagonal(&self) -> f64 {
        self.min.distance(&self.max)
    }
}

/// Möller-Trumbore ray/triangle intersection. Returns the ray parameter for
/// hits strictly in front of the origin.
pub fn ray_triangle(
    origin: &Point3,
    dir: &Vec3,
    a: &Point3,
    b: &Point3,
    c: &Point3,
) -> Option<f64> {
    let e1 = *b - *a;
    let e2 = *c - *a;
    let p = dir.cross(&e2);
    let det = e1.dot(&p);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv = 1.0 / det;
    let s = *origin - *a;
    let u = s.dot(&p) * inv;
    if !(-1e-9..=1.0 + 1e-9).contains(&u) {
        return None;
    }
    let q = s.cross(&e1);
    let v = dir.dot(&q) * inv;
    if v < -1e-9 || u + v > 1.0 + 1e-9 {
        return None;
    }
    let t = e2.dot(&q) * inv;
    (t > 1e-9).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn plane_signed_distance_has_orientation() {
        let plane = Plane::new(Vec3::new(0.0, 0.0, 1.0), Point3::new(0.0, 0.0, 2.0)).unwrap();
        assert_relative_eq!(plane.signed_distance(&Point3::new(5.0, 5.0, 3.0)), 1.0);
        assert_relative_eq!(plane.signed_distance(&Point3::new(0.0, 0.0, 0.0)), -2.0);
    }

    #[test]
    fn frame_round_trips_local_coordinates() {
        let frame = Frame::from_normal(Point3::new(1.0, 2.0, 3.0), Vec3::new(0.0, 1.0, 1.0))
            .unwrap();
        let p = frame.to_world([0.7, -1.3]);
        let uv = frame.to_local(&p);
        assert_relative_eq!(uv[0], 0.7, epsilon = 1e-12);
        assert_relative_eq!(uv[1], -1.3, epsilon = 1e-12);
    }

    #[test]
    fn ray_hits_triangle_interior_only() {
        let a = Point3::new(0.0, 0.0, 1.0);
        let b = Point3::new(1.0, 0.0, 1.0);
        let c = Point3::new(0.0, 1.0, 1.0);
        let dir = Vec3::new(0.0, 0.0, 1.0);
        let hit = ray_triangle(&Point3::new(0.2, 0.2, 0.0), &dir, &a, &b, &c);
        assert!(hit.is_some());
        let miss = ray_triangle(&Point3::new(0.9, 0.9, 0.0), &dir, &a, &b, &c);
        assert!(miss.is_none());
    }
}
