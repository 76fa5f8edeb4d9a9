/// Initialization parameters for the GPU layer.
///
/// One `GpuInit` configures both the shared device and every display surface
/// created from it. Add configuration flags only when a concrete platform or
/// backend requirement exists.
#[derive(Debug, Clone)]
pub struct GpuInit {
    /// Backends the instance may choose from.
    pub backends: wgpu::Backends,

    pub power_preference: wgpu::PowerPreference,

    /// Restricts adapter selection to a software implementation.
    ///
    /// Useful on CI machines without a hardware GPU.
    pub force_fallback_adapter: bool,

    /// Prefer an sRGB surface format when available.
    pub prefer_srgb: bool,

    /// Present mode (swap behavior).
    ///
    /// FIFO is broadly supported and caps the frame rate to the display refresh.
    pub present_mode: wgpu::PresentMode,

    /// Optional alpha mode preference for surfaces.
    ///
    /// If provided but unsupported on a surface, a supported mode is selected.
    pub alpha_mode: Option<wgpu::CompositeAlphaMode>,

    /// Required wgpu features.
    ///
    /// Favor an empty set for portability unless a feature is strictly necessary.
    pub required_features: wgpu::Features,

    /// Features enabled only when the adapter offers them.
    ///
    /// By default these let 16-bit and float textures keep their precision.
    pub optional_features: wgpu::Features,

    /// Limits requested from the adapter/device.
    pub required_limits: wgpu::Limits,

    /// Desired maximum frame latency for surfaces.
    ///
    /// This value is a hint; support depends on platform/backend.
    pub desired_maximum_frame_latency: u32,
}

impl Default for GpuInit {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            prefer_srgb: true,
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: None,
            required_features: wgpu::Features::empty(),
            optional_features: wgpu::Features::TEXTURE_FORMAT_16BIT_NORM
                | wgpu::Features::FLOAT32_FILTERABLE,
            required_limits: wgpu::Limits::default(),
            desired_maximum_frame_latency: 2,
        }
    }
}
