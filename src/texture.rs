// Texture management
// Owns the single GPU texture holding the current image

use crate::error::ViewerError;
use crate::image_loader::DecodedBitmap;
use log::{debug, info, warn};

/// A single mipmap level
#[derive(Debug, Clone, PartialEq)]
pub struct MipmapLevel {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Creates and releases the GPU objects behind a texture
pub trait TextureBackend {
    type Handle;

    /// Upload `levels` (base level first) and make them bindable
    fn create(&mut self, levels: &[MipmapLevel]) -> Result<Self::Handle, ViewerError>;

    fn destroy(&mut self, handle: Self::Handle);
}

/// Borrowed GPU handles, valid for the duration of one texture operation
pub struct GpuContext<'a> {
    pub device: &'a wgpu::Device,
    pub queue: &'a wgpu::Queue,
    pub bind_group_layout: &'a wgpu::BindGroupLayout,
    pub sampler: &'a wgpu::Sampler,
}

/// A wgpu texture and its bind group
pub struct GpuTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

impl GpuTexture {
    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }
}

impl TextureBackend for GpuContext<'_> {
    type Handle = GpuTexture;

    fn create(&mut self, levels: &[MipmapLevel]) -> Result<GpuTexture, ViewerError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let texture = upload_levels(self, levels);

        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        if let Some(err) = validation.or(out_of_memory) {
            warn!("Texture creation error: {}", err);
            texture.destroy();
            return Err(ViewerError::TextureCreationFailure(err.to_string()));
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(self.sampler),
                },
            ],
            label: Some("texture_bind_group"),
        });

        Ok(GpuTexture {
            texture,
            bind_group,
        })
    }

    fn destroy(&mut self, handle: GpuTexture) {
        handle.texture.destroy();
    }
}

/// The texture currently held, with the size of the image it came from
pub struct LoadedTexture<H> {
    handle: H,
    /// Dimensions of the decoded image, before any level was skipped
    image_width: u32,
    image_height: u32,
}

impl<H> LoadedTexture<H> {
    pub fn handle(&self) -> &H {
        &self.handle
    }

    pub fn image_size(&self) -> (u32, u32) {
        (self.image_width, self.image_height)
    }
}

/// Holds at most one texture; each upload replaces the previous one
pub struct TextureManager<H> {
    current: Option<LoadedTexture<H>>,
    max_dimension: u32,
}

impl<H> TextureManager<H> {
    pub fn new(max_dimension: u32) -> Self {
        Self {
            current: None,
            max_dimension,
        }
    }

    pub fn current(&self) -> Option<&LoadedTexture<H>> {
        self.current.as_ref()
    }

    pub fn is_created(&self) -> bool {
        self.current.is_some()
    }

    /// Release the current texture, if any
    pub fn destroy<B>(&mut self, backend: &mut B)
    where
        B: TextureBackend<Handle = H>,
    {
        if let Some(old) = self.current.take() {
            backend.destroy(old.handle);
            debug!("Texture destroyed");
        }
    }

    /// Destroy the current texture and upload `bitmap` with a full mip chain.
    ///
    /// On failure the manager holds no texture.
    pub fn replace<B>(&mut self, backend: &mut B, bitmap: DecodedBitmap) -> Result<(), ViewerError>
    where
        B: TextureBackend<Handle = H>,
    {
        self.destroy(backend);

        let (image_width, image_height) = (bitmap.width, bitmap.height);
        let expected_len = image_width as usize * image_height as usize * 4;
        if bitmap.is_empty() || bitmap.rgba_data.len() != expected_len {
            return Err(ViewerError::TextureCreationFailure(format!(
                "bitmap {}x{} does not hold RGBA8 data",
                image_width, image_height
            )));
        }
        let levels = generate_mipmaps(bitmap);
        let base = base_level(&levels, self.max_dimension);
        let levels = &levels[base..];
        if base > 0 {
            info!(
                "Image {}x{} exceeds max texture size {}, using mip level {} ({}x{})",
                image_width,
                image_height,
                self.max_dimension,
                base,
                levels[0].width,
                levels[0].height
            );
        }

        let handle = backend.create(levels)?;

        debug!(
            "Texture updated: {}x{} with {} mip levels",
            levels[0].width,
            levels[0].height,
            levels.len()
        );

        self.current = Some(LoadedTexture {
            handle,
            image_width,
            image_height,
        });
        Ok(())
    }
}

fn upload_levels(ctx: &GpuContext<'_>, levels: &[MipmapLevel]) -> wgpu::Texture {
    let base = &levels[0];
    let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
        size: wgpu::Extent3d {
            width: base.width,
            height: base.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: levels.len() as u32,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        label: Some("image_texture"),
        view_formats: &[],
    });

    for (mip_level, level) in levels.iter().enumerate() {
        ctx.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: mip_level as u32,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &level.data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * level.width),
                rows_per_image: Some(level.height),
            },
            wgpu::Extent3d {
                width: level.width,
                height: level.height,
                depth_or_array_layers: 1,
            },
        );
    }

    texture
}

/// Index of the first level that fits within `max_dimension`
pub fn base_level(levels: &[MipmapLevel], max_dimension: u32) -> usize {
    levels
        .iter()
        .position(|level| level.width <= max_dimension && level.height <= max_dimension)
        .unwrap_or(levels.len().saturating_sub(1))
}

/// Build the full mip chain down to 1x1, level 0 being the bitmap itself
pub fn generate_mipmaps(bitmap: DecodedBitmap) -> Vec<MipmapLevel> {
    let mut mipmaps = vec![MipmapLevel {
        width: bitmap.width,
        height: bitmap.height,
        data: bitmap.rgba_data,
    }];

    loop {
        let current = &mipmaps[mipmaps.len() - 1];
        if current.width == 1 && current.height == 1 {
            break;
        }
        let next = downsample(current);
        mipmaps.push(next);
    }

    mipmaps
}

/// Halve a level with a 2x2 box filter, clamping at odd edges
fn downsample(current: &MipmapLevel) -> MipmapLevel {
    let next_width = (current.width / 2).max(1);
    let next_height = (current.height / 2).max(1);
    let mut next_data = vec![0u8; (next_width * next_height * 4) as usize];

    for y in 0..next_height {
        for x in 0..next_width {
            let mut sum = [0u32; 4];

            for dy in 0..2 {
                for dx in 0..2 {
                    let sx = (x * 2 + dx).min(current.width - 1);
                    let sy = (y * 2 + dy).min(current.height - 1);
                    let idx = ((sy * current.width + sx) * 4) as usize;
                    for (channel, total) in sum.iter_mut().enumerate() {
                        *total += current.data[idx + channel] as u32;
                    }
                }
            }

            let dst_idx = ((y * next_width + x) * 4) as usize;
            for (channel, total) in sum.iter().enumerate() {
                next_data[dst_idx + channel] = (total / 4) as u8;
            }
        }
    }

    MipmapLevel {
        width: next_width,
        height: next_height,
        data: next_data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, pixel: [u8; 4]) -> DecodedBitmap {
        DecodedBitmap {
            width,
            height,
            rgba_data: pixel.repeat((width * height) as usize),
        }
    }

    #[derive(Debug, PartialEq)]
    enum Call {
        Create(u32, (u32, u32), usize),
        Destroy(u32),
    }

    /// Hands out numbered handles and records every call
    #[derive(Default)]
    struct FakeBackend {
        calls: Vec<Call>,
        next_id: u32,
        fail_next: bool,
    }

    impl TextureBackend for FakeBackend {
        type Handle = u32;

        fn create(&mut self, levels: &[MipmapLevel]) -> Result<u32, ViewerError> {
            let id = self.next_id;
            self.next_id += 1;
            self.calls.push(Call::Create(
                id,
                (levels[0].width, levels[0].height),
                levels.len(),
            ));
            if std::mem::take(&mut self.fail_next) {
                return Err(ViewerError::TextureCreationFailure("out of memory".into()));
            }
            Ok(id)
        }

        fn destroy(&mut self, handle: u32) {
            self.calls.push(Call::Destroy(handle));
        }
    }

    #[test]
    fn test_replace_destroys_before_create() {
        let mut backend = FakeBackend::default();
        let mut textures = TextureManager::new(8192);

        textures.replace(&mut backend, solid(4, 2, [1, 1, 1, 1])).unwrap();
        textures.replace(&mut backend, solid(2, 2, [2, 2, 2, 2])).unwrap();

        assert_eq!(
            backend.calls,
            vec![
                Call::Create(0, (4, 2), 3),
                Call::Destroy(0),
                Call::Create(1, (2, 2), 2),
            ]
        );
        let current = textures.current().unwrap();
        assert_eq!(*current.handle(), 1);
        assert_eq!(current.image_size(), (2, 2));
    }

    #[test]
    fn test_failed_create_leaves_no_texture() {
        let mut backend = FakeBackend::default();
        let mut textures = TextureManager::new(8192);
        textures.replace(&mut backend, solid(2, 2, [0, 0, 0, 255])).unwrap();

        backend.fail_next = true;
        let result = textures.replace(&mut backend, solid(3, 3, [0, 0, 0, 255]));
        assert!(matches!(result, Err(ViewerError::TextureCreationFailure(_))));
        assert!(!textures.is_created());
        assert_eq!(backend.calls[1], Call::Destroy(0));

        // The next upload starts from an empty slot and succeeds
        textures.replace(&mut backend, solid(5, 1, [0, 0, 0, 255])).unwrap();
        assert!(textures.is_created());
        assert_eq!(textures.current().unwrap().image_size(), (5, 1));
        assert_eq!(backend.calls.len(), 4);
        assert_eq!(backend.calls[3], Call::Create(2, (5, 1), 3));
    }

    #[test]
    fn test_invalid_bitmap_rejected_without_upload() {
        let mut backend = FakeBackend::default();
        let mut textures = TextureManager::new(8192);
        textures.replace(&mut backend, solid(1, 1, [0, 0, 0, 0])).unwrap();

        let short = DecodedBitmap {
            width: 2,
            height: 2,
            rgba_data: vec![0; 4],
        };
        assert!(textures.replace(&mut backend, short).is_err());
        assert!(!textures.is_created());
        assert_eq!(backend.calls, vec![Call::Create(0, (1, 1), 1), Call::Destroy(0)]);
    }

    #[test]
    fn test_oversized_image_uses_smaller_base_level() {
        let mut backend = FakeBackend::default();
        let mut textures = TextureManager::new(16);
        textures.replace(&mut backend, solid(64, 16, [0, 0, 0, 255])).unwrap();

        // 64x16 -> 32x8 -> 16x4 fits; 16x4, 8x2, 4x1, 2x1, 1x1 remain
        assert_eq!(backend.calls, vec![Call::Create(0, (16, 4), 5)]);
        assert_eq!(textures.current().unwrap().image_size(), (64, 16));
    }

    #[test]
    fn test_mip_chain_reaches_one_pixel() {
        let levels = generate_mipmaps(solid(8, 3, [1, 2, 3, 4]));
        let sizes: Vec<(u32, u32)> = levels.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(sizes, vec![(8, 3), (4, 1), (2, 1), (1, 1)]);

        for level in &levels {
            assert_eq!(level.data.len(), (level.width * level.height * 4) as usize);
            // A solid image stays solid at every level
            assert!(level.data.chunks_exact(4).all(|p| p == [1u8, 2, 3, 4].as_slice()));
        }
    }

    #[test]
    fn test_single_pixel_has_one_level() {
        let levels = generate_mipmaps(solid(1, 1, [9, 9, 9, 9]));
        assert_eq!(levels.len(), 1);
    }

    #[test]
    fn test_box_filter_averages() {
        let bitmap = DecodedBitmap {
            width: 2,
            height: 2,
            rgba_data: vec![
                0, 0, 0, 0, 100, 100, 100, 100, //
                200, 200, 200, 200, 100, 100, 100, 100,
            ],
        };
        let levels = generate_mipmaps(bitmap);
        assert_eq!(levels[1].data, vec![100, 100, 100, 100]);
    }

    #[test]
    fn test_base_level_selection() {
        let levels = generate_mipmaps(solid(64, 16, [0, 0, 0, 255]));
        assert_eq!(base_level(&levels, 8192), 0);
        assert_eq!(base_level(&levels, 32), 1);
        assert_eq!(base_level(&levels, 16), 2);
        assert_eq!(base_level(&levels, 0), levels.len() - 1);
    }
}
