//! Packed vertex format for chunk meshes.
//!
//! Every chunk vertex is a single 32-bit word, most significant bit first:
//!
//! | Bits    | Field        | Width |
//! |---------|--------------|-------|
//! | 31..=22 | y            | 10    |
//! | 21..=17 | x            | 5     |
//! | 16..=12 | z            | 5     |
//! | 11..=10 | uv corner    | 2     |
//! | 9..=2   | texture id   | 8     |
//! | 1..=0   | shading      | 2     |
//!
//! Positions are chunk-local: a block's local position plus the in-cube offset
//! of the corner, so x and z reach `dim` and y reaches `height`. The chunk's
//! world origin is supplied separately through a uniform.

/// Bit offset of the y field.
pub const Y_SHIFT: u32 = 22;
/// Width of the y field.
pub const Y_BITS: u32 = 10;
/// Bit offset of the x field.
pub const X_SHIFT: u32 = 17;
/// Width of the x field.
pub const X_BITS: u32 = 5;
/// Bit offset of the z field.
pub const Z_SHIFT: u32 = 12;
/// Width of the z field.
pub const Z_BITS: u32 = 5;
/// Bit offset of the uv corner field.
pub const UV_SHIFT: u32 = 10;
/// Width of the uv corner field.
pub const UV_BITS: u32 = 2;
/// Bit offset of the texture id field.
pub const TEXTURE_SHIFT: u32 = 2;
/// Width of the texture id field.
pub const TEXTURE_BITS: u32 = 8;
/// Bit offset of the shading field.
pub const SHADING_SHIFT: u32 = 0;
/// Width of the shading field.
pub const SHADING_BITS: u32 = 2;

const fn mask(bits: u32) -> u32 {
    (1 << bits) - 1
}

/// Largest encodable y.
pub const MAX_Y: u32 = mask(Y_BITS);
/// Largest encodable x.
pub const MAX_X: u32 = mask(X_BITS);
/// Largest encodable z.
pub const MAX_Z: u32 = mask(Z_BITS);
/// Largest encodable uv corner.
pub const MAX_UV: u32 = mask(UV_BITS);
/// Largest encodable texture id.
pub const MAX_TEXTURE: u32 = mask(TEXTURE_BITS);
/// Largest encodable shading level.
pub const MAX_SHADING: u32 = mask(SHADING_BITS);

/// The unpacked fields of a [`PackedVertex`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct VertexFields {
    /// Chunk-local x, `0..=31`
    pub x: u32,
    /// Chunk-local y, `0..=1023`
    pub y: u32,
    /// Chunk-local z, `0..=31`
    pub z: u32,
    /// Texture corner, `0..=3`
    pub tex_uv: u32,
    /// Atlas index, `0..=255`
    pub texture_id: u32,
    /// Light level, `0..=3`
    pub shading: u32,
}

impl VertexFields {
    /// Returns `true` if every field fits its bit range.
    pub fn fits(&self) -> bool {
        self.x <= MAX_X
            && self.y <= MAX_Y
            && self.z <= MAX_Z
            && self.tex_uv <= MAX_UV
            && self.texture_id <= MAX_TEXTURE
            && self.shading <= MAX_SHADING
    }

    /// Packs the fields into one word.
    ///
    /// Out-of-range fields are a bug in the caller: they trip a debug
    /// assertion, and in release builds are truncated to their field width.
    pub fn pack(&self) -> PackedVertex {
        debug_assert!(self.fits(), "vertex fields out of range: {self:?}");
        PackedVertex(
            ((self.y & MAX_Y) << Y_SHIFT)
                | ((self.x & MAX_X) << X_SHIFT)
                | ((self.z & MAX_Z) << Z_SHIFT)
                | ((self.tex_uv & MAX_UV) << UV_SHIFT)
                | ((self.texture_id & MAX_TEXTURE) << TEXTURE_SHIFT)
                | ((self.shading & MAX_SHADING) << SHADING_SHIFT),
        )
    }
}

/// A chunk vertex packed into 32 bits.
///
/// # Memory Layout
/// A single `u32`, read in the vertex shader as `@location(0) data: u32`.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PackedVertex(pub u32);

impl PackedVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Uint32];

    /// The raw word.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Splits the word back into its fields.
    pub fn unpack(self) -> VertexFields {
        let word = self.0;
        VertexFields {
            y: (word >> Y_SHIFT) & MAX_Y,
            x: (word >> X_SHIFT) & MAX_X,
            z: (word >> Z_SHIFT) & MAX_Z,
            tex_uv: (word >> UV_SHIFT) & MAX_UV,
            texture_id: (word >> TEXTURE_SHIFT) & MAX_TEXTURE,
            shading: (word >> SHADING_SHIFT) & MAX_SHADING,
        }
    }

    /// Returns the vertex buffer layout description for the chunk pipeline.
    ///
    /// # Shader Attributes
    /// - `location = 0`: packed vertex (u32)
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PackedVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}
