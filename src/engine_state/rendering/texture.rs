//! Render target textures.
//!
//! Offscreen frames need two attachments: a colour texture that can be copied
//! back to the host, and a depth texture.

/// A GPU texture and its default view.
pub struct Texture {
    /// The underlying WebGPU texture resource.
    pub texture: wgpu::Texture,
    /// The view bound as a render attachment.
    pub view: wgpu::TextureView,
}

impl Texture {
    /// The texture format used for depth buffers.
    pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

    /// The texture format used for captured colour frames.
    pub const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

    fn create(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
        usage: wgpu::TextureUsages,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self { texture, view }
    }

    /// Creates a depth texture of the given size.
    ///
    /// # Arguments
    /// * `device` - The WebGPU device
    /// * `width` - Width in pixels
    /// * `height` - Height in pixels
    /// * `label` - Debug label for the texture
    pub fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32, label: &str) -> Self {
        Self::create(
            device,
            width,
            height,
            Self::DEPTH_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT,
            label,
        )
    }

    /// Creates a colour attachment that can be copied out after rendering.
    pub fn create_color_target(device: &wgpu::Device, width: u32, height: u32, label: &str) -> Self {
        Self::create(
            device,
            width,
            height,
            Self::COLOR_FORMAT,
            wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            label,
        )
    }
}
