//! Camera scene object

use std::sync::Arc;

use glam::{Mat4, Vec3, Vec4};

use super::{RenderSettings, RenderTarget, SceneObjectId};
use crate::backend::{ClearFlags, ViewportRect};

/// Camera projection type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        width: f32,
        height: f32,
        near: f32,
        far: f32,
    },
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Perspective {
            fov_y: std::f32::consts::FRAC_PI_4,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Projection {
    pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Projection::Perspective {
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near,
            far,
        }
    }

    pub fn orthographic(width: f32, height: f32, near: f32, far: f32) -> Self {
        Projection::Orthographic {
            width,
            height,
            near,
            far,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        match *self {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(fov_y, aspect, near, far),
            Projection::Orthographic {
                width,
                height,
                near,
                far,
            } => {
                let (hw, hh) = (width / 2.0, height / 2.0);
                Mat4::orthographic_rh(-hw, hw, -hh, hh, near, far)
            }
        }
    }

    pub fn near(&self) -> f32 {
        match self {
            Projection::Perspective { near, .. } | Projection::Orthographic { near, .. } => *near,
        }
    }

    pub fn far(&self) -> f32 {
        match self {
            Projection::Perspective { far, .. } | Projection::Orthographic { far, .. } => *far,
        }
    }
}

/// Where on which target a camera draws, and how it clears
#[derive(Debug, Clone)]
pub struct Viewport {
    /// `None` means the camera draws nothing
    pub target: Option<Arc<RenderTarget>>,
    /// Normalized x, y, width, height inside the target
    pub area: Vec4,
    pub clear_flags: ClearFlags,
    pub clear_color: Vec4,
    pub clear_depth: f32,
    pub clear_stencil: u8,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            target: None,
            area: Vec4::new(0.0, 0.0, 1.0, 1.0),
            clear_flags: ClearFlags::default(),
            clear_color: Vec4::new(0.1, 0.1, 0.1, 1.0),
            clear_depth: 1.0,
            clear_stencil: 0,
        }
    }
}

impl Viewport {
    /// Pixel rectangle on the current target
    pub fn pixel_rect(&self) -> Option<ViewportRect> {
        let target = self.target.as_ref()?;
        let (w, h) = (target.width as f32, target.height as f32);
        Some(ViewportRect {
            x: self.area.x * w,
            y: self.area.y * h,
            width: self.area.z * w,
            height: self.area.w * h,
        })
    }
}

/// Camera for viewing the scene
#[derive(Debug, Clone)]
pub struct Camera {
    id: SceneObjectId,
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
    pub viewport: Viewport,
    pub settings: Arc<RenderSettings>,
    /// Renderables whose layer shares no bit with this mask are culled
    pub layers: u64,
    /// Lower renders first among cameras on the same target
    pub priority: i32,
    pub main: bool,
    pub active: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO)
    }
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self {
            id: SceneObjectId::next(),
            position,
            target,
            up: Vec3::Y,
            projection: Projection::default(),
            viewport: Viewport::default(),
            settings: Arc::new(RenderSettings::default()),
            layers: u64::MAX,
            priority: 0,
            main: false,
            active: true,
        }
    }

    pub fn id(&self) -> SceneObjectId {
        self.id
    }

    pub fn with_target(mut self, target: Arc<RenderTarget>) -> Self {
        self.viewport.target = Some(target);
        self
    }

    pub fn with_settings(mut self, settings: RenderSettings) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Get the projection matrix
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix()
    }

    /// Get combined view-projection matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Get the forward direction
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }
}
