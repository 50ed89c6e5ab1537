/// Image, image view and sampler traits with their descriptors
///
/// A GPU image is split into three device objects so that owners can release
/// them in dependency order: sampler, then view, then the image and its memory.

use crate::error::Result;
use crate::graphics_device::{CompareOp, SampleCount};
use crate::memory::MemoryFlags;

/// Pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum ImageFormat {
    R8_UNORM,
    R8G8B8A8_UNORM,
    R8G8B8A8_SRGB,
    B8G8R8A8_UNORM,
    B8G8R8A8_SRGB,
    R16_SFLOAT,
    R16G16B16A16_SFLOAT,
    R32_SFLOAT,
    D32_SFLOAT,
    D24_UNORM_S8_UINT,
    D32_SFLOAT_S8_UINT,
}

impl ImageFormat {
    /// Whether the format carries depth (and possibly stencil)
    pub fn is_depth(&self) -> bool {
        matches!(
            self,
            ImageFormat::D32_SFLOAT | ImageFormat::D24_UNORM_S8_UINT | ImageFormat::D32_SFLOAT_S8_UINT
        )
    }

    /// Whether the format carries stencil
    pub fn has_stencil(&self) -> bool {
        matches!(self, ImageFormat::D24_UNORM_S8_UINT | ImageFormat::D32_SFLOAT_S8_UINT)
    }

    /// Size of one texel in bytes
    pub fn bytes_per_pixel(&self) -> u32 {
        match self {
            ImageFormat::R8_UNORM => 1,
            ImageFormat::R16_SFLOAT => 2,
            ImageFormat::R8G8B8A8_UNORM
            | ImageFormat::R8G8B8A8_SRGB
            | ImageFormat::B8G8R8A8_UNORM
            | ImageFormat::B8G8R8A8_SRGB
            | ImageFormat::R32_SFLOAT
            | ImageFormat::D32_SFLOAT
            | ImageFormat::D24_UNORM_S8_UINT => 4,
            ImageFormat::D32_SFLOAT_S8_UINT => 5,
            ImageFormat::R16G16B16A16_SFLOAT => 8,
        }
    }
}

bitflags::bitflags! {
    /// How an image is going to be used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        const SAMPLED = 1 << 0;
        const COLOR_ATTACHMENT = 1 << 1;
        const DEPTH_STENCIL_ATTACHMENT = 1 << 2;
        const TRANSFER_DST = 1 << 3;
    }
}

/// Descriptor for creating an image
#[derive(Debug, Clone)]
pub struct ImageDesc {
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
    /// 6 layers produce a cube view
    pub array_layers: u32,
    pub format: ImageFormat,
    pub usage: ImageUsage,
    pub samples: SampleCount,
    pub memory: MemoryFlags,
    /// Initial contents of mip 0 (uploaded through a staging buffer)
    pub data: Option<Vec<u8>>,
}

impl ImageDesc {
    /// Single-sampled, single-mip 2D render attachment
    pub fn attachment(width: u32, height: u32, format: ImageFormat, usage: ImageUsage) -> Self {
        Self {
            width,
            height,
            mip_levels: 1,
            array_layers: 1,
            format,
            usage,
            samples: SampleCount::S1,
            memory: MemoryFlags::DEVICE_LOCAL,
            data: None,
        }
    }

    /// 1x1 sampled texture initialized with one texel
    pub fn solid(format: ImageFormat, texel: Vec<u8>) -> Self {
        Self {
            width: 1,
            height: 1,
            mip_levels: 1,
            array_layers: 1,
            format,
            usage: ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
            samples: SampleCount::S1,
            memory: MemoryFlags::DEVICE_LOCAL,
            data: Some(texel),
        }
    }

    /// Estimated size of the image memory (all mips and layers)
    pub fn byte_size(&self) -> u64 {
        let mut total = 0u64;
        for mip in 0..self.mip_levels.max(1) {
            let w = (self.width >> mip).max(1) as u64;
            let h = (self.height >> mip).max(1) as u64;
            total += w * h * self.format.bytes_per_pixel() as u64;
        }
        total * self.array_layers.max(1) as u64 * self.samples.count() as u64
    }
}

/// GPU image (native image + memory)
pub trait Image: Send + Sync {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
    fn format(&self) -> ImageFormat;
    fn mip_levels(&self) -> u32;
}

/// View over a whole image (all mips, all layers)
///
/// Keeps its image alive.
pub trait ImageView: Send + Sync {
    fn format(&self) -> ImageFormat;
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

/// Texel filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Texture coordinate addressing outside [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    Repeat,
    ClampToEdge,
    ClampToBorder,
}

/// Border color used by `AddressMode::ClampToBorder`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorderColor {
    OpaqueBlack,
    OpaqueWhite,
}

/// Descriptor for creating a sampler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub filter: Filter,
    pub address_mode: AddressMode,
    pub border_color: BorderColor,
    pub mip_levels: u32,
    /// Depth comparison (shadow samplers)
    pub compare: Option<CompareOp>,
}

impl SamplerDesc {
    pub fn linear_repeat(mip_levels: u32) -> Self {
        Self {
            filter: Filter::Linear,
            address_mode: AddressMode::Repeat,
            border_color: BorderColor::OpaqueBlack,
            mip_levels,
            compare: None,
        }
    }

    pub fn linear_clamp() -> Self {
        Self {
            filter: Filter::Linear,
            address_mode: AddressMode::ClampToEdge,
            border_color: BorderColor::OpaqueBlack,
            mip_levels: 1,
            compare: None,
        }
    }

    pub fn nearest_clamp() -> Self {
        Self {
            filter: Filter::Nearest,
            address_mode: AddressMode::ClampToEdge,
            border_color: BorderColor::OpaqueBlack,
            mip_levels: 1,
            compare: None,
        }
    }

    /// Border-clamped sampler for shadow maps (outside the map = lit)
    pub fn shadow() -> Self {
        Self {
            filter: Filter::Linear,
            address_mode: AddressMode::ClampToBorder,
            border_color: BorderColor::OpaqueWhite,
            mip_levels: 1,
            compare: None,
        }
    }
}

/// Texture sampler
pub trait Sampler: Send + Sync {
    fn desc(&self) -> SamplerDesc;
}

/// Check the parts of an image descriptor every backend rejects
pub fn validate_image_desc(desc: &ImageDesc) -> Result<()> {
    if desc.width == 0 || desc.height == 0 {
        return Err(crate::error::Error::InvalidResource(format!(
            "image extent {}x{} has zero area",
            desc.width, desc.height
        )));
    }
    if let Some(data) = &desc.data {
        let expected = (desc.width * desc.height * desc.format.bytes_per_pixel()) as usize
            * desc.array_layers.max(1) as usize;
        if data.len() != expected {
            return Err(crate::error::Error::InvalidResource(format!(
                "image data is {} bytes, expected {}",
                data.len(),
                expected
            )));
        }
    }
    Ok(())
}
