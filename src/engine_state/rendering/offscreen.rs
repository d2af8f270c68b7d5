//! Offscreen frame capture.
//!
//! Frames are rendered into an [`OffscreenTarget`] instead of a window
//! surface, then copied back to the host and encoded with the `image` crate.

use std::path::Path;

use wgpu::{Device, Queue};

use super::renderer::RenderError;
use super::texture::Texture;

/// Bytes per pixel of [`Texture::COLOR_FORMAT`].
const BYTES_PER_PIXEL: u32 = 4;

/// Row pitch of a `width` pixel row in a texture-to-buffer copy.
///
/// wgpu requires each copied row to start on a
/// [`wgpu::COPY_BYTES_PER_ROW_ALIGNMENT`] boundary.
pub fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * BYTES_PER_PIXEL;
    unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
}

/// Colour and depth attachments for one frame size.
pub struct OffscreenTarget {
    pub color: Texture,
    pub depth: Texture,
    width: u32,
    height: u32,
}

impl OffscreenTarget {
    /// Creates attachments of the given size. Zero sizes are clamped to one.
    pub fn new(device: &Device, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            color: Texture::create_color_target(device, width, height, "Offscreen Color Target"),
            depth: Texture::create_depth_texture(device, width, height, "Offscreen Depth Target"),
            width,
            height,
        }
    }

    /// Frame width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Frame height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Copies the colour attachment back to the host.
    ///
    /// Blocks until the GPU has finished every submitted frame.
    pub fn capture(&self, device: &Device, queue: &Queue) -> Result<image::RgbaImage, RenderError> {
        let padded = padded_bytes_per_row(self.width);
        let unpadded = (self.width * BYTES_PER_PIXEL) as usize;

        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame Readback Buffer"),
            size: u64::from(padded) * u64::from(self.height),
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Frame Capture Encoder"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: &self.color.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &readback,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        device
            .poll(wgpu::PollType::Wait)
            .map_err(|e| RenderError::Capture(e.to_string()))?;
        receiver
            .recv()
            .map_err(|e| RenderError::Capture(e.to_string()))?
            .map_err(|e| RenderError::Capture(e.to_string()))?;

        let mut pixels = Vec::with_capacity(unpadded * self.height as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks_exact(padded as usize) {
                pixels.extend_from_slice(&row[..unpadded]);
            }
        }
        readback.unmap();

        image::RgbaImage::from_raw(self.width, self.height, pixels)
            .ok_or_else(|| RenderError::Capture("captured frame has the wrong size".to_string()))
    }
}

/// Encodes a captured frame as PNG.
pub fn save_png(frame: &image::RgbaImage, path: impl AsRef<Path>) -> Result<(), RenderError> {
    frame.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_the_copy_alignment() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(1280), 5120);
    }

    #[test]
    fn png_round_trips_through_disk() {
        let mut frame = image::RgbaImage::new(3, 2);
        frame.put_pixel(2, 1, image::Rgba([10, 20, 30, 255]));

        let path = std::env::temp_dir().join(format!("offscreen-{}.png", std::process::id()));
        save_png(&frame, &path).unwrap();
        let loaded = image::open(&path).unwrap().to_rgba8();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded, frame);
    }
}
