//! # Camera
//!
//! A fixed look-at camera for offscreen frames. Camera movement and input are
//! not part of the engine; the camera is placed once from configuration.
//!
//! ## Key Components
//! - `Camera`: eye and target in world space
//! - `Projection`: perspective projection settings
//! - `CameraUniform`: packed view-projection matrix for the vertex shader

use cgmath::*;

/// Transformation matrix to convert from OpenGL's coordinate system to WGPU's.
///
/// cgmath produces clip-space depth in [-1, 1]; wgpu expects [0, 1].
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// A camera looking from `eye` towards `target`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    /// The camera's position in world space
    pub eye: Point3<f32>,
    /// The point the camera looks at
    pub target: Point3<f32>,
}

impl Camera {
    /// Creates a camera at `eye` looking at `target`.
    pub fn new<E: Into<Point3<f32>>, T: Into<Point3<f32>>>(eye: E, target: T) -> Self {
        Self {
            eye: eye.into(),
            target: target.into(),
        }
    }

    /// Calculates the view matrix for this camera.
    pub fn calc_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye, self.target, Vector3::unit_y())
    }
}

/// Perspective projection settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Projection {
    /// Aspect ratio (width / height)
    aspect: f32,
    /// Vertical field of view in radians
    fovy: Rad<f32>,
    /// Near clipping plane distance
    znear: f32,
    /// Far clipping plane distance
    zfar: f32,
}

impl Projection {
    /// Creates a new projection with the given parameters.
    ///
    /// # Arguments
    /// * `width` - Viewport width in pixels
    /// * `height` - Viewport height in pixels
    /// * `fovy` - Vertical field of view (can be any type convertible to `Rad<f32>`)
    /// * `znear` - Near clipping plane distance
    /// * `zfar` - Far clipping plane distance
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        Self {
            aspect: width as f32 / height.max(1) as f32,
            fovy: fovy.into(),
            znear,
            zfar,
        }
    }

    /// Updates the aspect ratio for a new viewport size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    /// Combines the perspective projection with the OpenGL to WGPU transform.
    pub fn calc_matrix(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

/// View-projection matrix as uploaded to the camera uniform buffer (group 0).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    // cgmath matrices are not Pod, so the matrix is stored as plain arrays
    view_proj: [[f32; 4]; 4],
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self {
            view_proj: Matrix4::identity().into(),
        }
    }
}

impl CameraUniform {
    /// Builds the uniform for a camera and projection.
    pub fn from_camera(camera: &Camera, projection: &Projection) -> Self {
        Self {
            view_proj: (projection.calc_matrix() * camera.calc_matrix()).into(),
        }
    }

    /// The packed matrix.
    pub fn view_proj(&self) -> Matrix4<f32> {
        self.view_proj.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_projects_to_the_centre_of_the_screen() {
        let camera = Camera::new(Point3::new(-10.0f32, 20.0, -10.0), Point3::new(4.0f32, 2.0, 4.0));
        let projection = Projection::new(800, 600, Deg(60.0f32), 0.1, 500.0);
        let uniform = CameraUniform::from_camera(&camera, &projection);

        let clip = uniform.view_proj() * Vector4::new(4.0, 2.0, 4.0, 1.0);
        let ndc = clip.truncate() / clip.w;

        assert!(ndc.x.abs() < 1e-4);
        assert!(ndc.y.abs() < 1e-4);
        assert!((0.0..=1.0).contains(&ndc.z));
    }

    #[test]
    fn points_behind_the_camera_are_clipped() {
        let camera = Camera::new(Point3::new(0.0f32, 0.0, 0.0), Point3::new(0.0f32, 0.0, -1.0));
        let projection = Projection::new(1, 1, Deg(90.0f32), 0.1, 100.0);
        let uniform = CameraUniform::from_camera(&camera, &projection);

        let clip = uniform.view_proj() * Vector4::new(0.0, 0.0, 5.0, 1.0);
        assert!(clip.w < 0.0);
    }
}
