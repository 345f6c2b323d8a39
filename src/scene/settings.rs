//! Per-camera render settings

use glam::Vec4;

/// Bloom quality, controls the number of blur passes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BloomQuality {
    Low,
    #[default]
    Medium,
    High,
}

impl BloomQuality {
    pub fn blur_passes(&self) -> u32 {
        match self {
            BloomQuality::Low => 1,
            BloomQuality::Medium => 2,
            BloomQuality::High => 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BloomSettings {
    pub enabled: bool,
    pub intensity: f32,
    pub quality: BloomQuality,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            intensity: 1.0,
            quality: BloomQuality::Medium,
        }
    }
}

/// Tonemapping operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TonemapOperator {
    Reinhard,
    #[default]
    Aces,
    Uncharted2,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TonemappingSettings {
    pub enabled: bool,
    pub operator: TonemapOperator,
}

impl Default for TonemappingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            operator: TonemapOperator::Aces,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AmbientOcclusionSettings {
    pub enabled: bool,
    pub radius: f32,
    pub bias: f32,
    pub fade_distance: f32,
    pub fade_range: f32,
    pub intensity: f32,
    pub power: f32,
}

impl Default for AmbientOcclusionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            radius: 1.5,
            bias: 1.0,
            fade_distance: 500.0,
            fade_range: 50.0,
            intensity: 1.0,
            power: 4.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemporalAaSettings {
    pub jittered_position_count: u32,
    pub sharpness: f32,
}

impl Default for TemporalAaSettings {
    fn default() -> Self {
        Self {
            jittered_position_count: 8,
            sharpness: 1.0,
        }
    }
}

/// What moves the motion blur follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionBlurDomain {
    /// Reconstructed from depth and the camera's previous transform
    #[default]
    CameraOnly,
    /// From the velocity buffer
    ObjectOnly,
    CameraAndObject,
}

impl MotionBlurDomain {
    pub fn needs_velocity(&self) -> bool {
        !matches!(self, MotionBlurDomain::CameraOnly)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionBlurQuality {
    VeryLow,
    Low,
    Medium,
    High,
    #[default]
    Ultra,
}

impl MotionBlurQuality {
    /// Samples taken per pixel
    pub fn sample_count(&self) -> u32 {
        match self {
            MotionBlurQuality::VeryLow => 4,
            MotionBlurQuality::Low => 6,
            MotionBlurQuality::Medium => 8,
            MotionBlurQuality::High => 12,
            MotionBlurQuality::Ultra => 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MotionBlurSettings {
    pub enabled: bool,
    pub domain: MotionBlurDomain,
    pub quality: MotionBlurQuality,
}

impl Default for MotionBlurSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            domain: MotionBlurDomain::CameraOnly,
            quality: MotionBlurQuality::Ultra,
        }
    }
}

/// Gaussian depth of field. Distances are in world units.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthOfFieldSettings {
    pub enabled: bool,
    /// Distance of the fully focused plane
    pub focal_distance: f32,
    /// Width of the near focused-to-blurred transition
    pub near_transition_range: f32,
    /// Width of the far focused-to-blurred transition
    pub far_transition_range: f32,
}

impl Default for DepthOfFieldSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            focal_distance: 0.75,
            near_transition_range: 0.25,
            far_transition_range: 0.25,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AntiAliasing {
    None,
    #[default]
    Fxaa,
    Taa,
}

/// Which intermediate the final resolve presents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputType {
    #[default]
    Final,
    Color,
    Velocity,
    Depth,
    Ssao,
}

/// Settings controlling how a camera renders the scene
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub enable_hdr: bool,
    pub enable_lighting: bool,
    pub enable_skybox: bool,
    /// Skip 3D work and draw only the overlay queue
    pub overlay_only: bool,
    pub bloom: BloomSettings,
    pub tonemapping: TonemappingSettings,
    pub ambient_occlusion: AmbientOcclusionSettings,
    pub motion_blur: MotionBlurSettings,
    pub depth_of_field: DepthOfFieldSettings,
    pub temporal_aa: TemporalAaSettings,
    pub anti_aliasing: AntiAliasing,
    pub exposure_scale: f32,
    pub gamma: f32,
    pub contrast: f32,
    pub brightness: f32,
    /// Distance past which renderables are culled, scaled per renderable
    pub cull_distance: f32,
    pub scene_light_color: Vec4,
    pub output_type: OutputType,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            enable_hdr: true,
            enable_lighting: true,
            enable_skybox: true,
            overlay_only: false,
            bloom: BloomSettings::default(),
            tonemapping: TonemappingSettings::default(),
            ambient_occlusion: AmbientOcclusionSettings::default(),
            motion_blur: MotionBlurSettings::default(),
            depth_of_field: DepthOfFieldSettings::default(),
            temporal_aa: TemporalAaSettings::default(),
            anti_aliasing: AntiAliasing::Fxaa,
            exposure_scale: 0.85,
            gamma: 1.0,
            contrast: 2.0,
            brightness: 0.1,
            cull_distance: 5000.0,
            scene_light_color: Vec4::ONE,
            output_type: OutputType::Final,
        }
    }
}
