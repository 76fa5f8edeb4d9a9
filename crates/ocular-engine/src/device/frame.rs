/// A single acquired surface texture.
///
/// This object is short-lived and must be presented promptly. Holding the
/// surface texture prevents acquisition of subsequent frames.
pub struct SurfaceFrame {
    pub surface_texture: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
}

impl SurfaceFrame {
    /// Presents the frame. Commands targeting it must already be submitted.
    pub fn present(self) {
        drop(self.view);
        self.surface_texture.present();
    }
}
