/// Pixel formats understood by the renderer.
///
/// This is the fixed vocabulary the declarative pipeline layer maps its
/// format strings onto; a backend translates these to its native format
/// identifiers.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum PixelFormat {
    R8,
    R32Float,
    Rgba8,
    Bgra8,
    Rgba16Float,
    Rgba32Float,
    Depth32Float,
    Depth16,
}

impl PixelFormat {
    /// Parse one of the named format strings used in pipeline assets.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "R8" => Some(Self::R8),
            "R32Float" => Some(Self::R32Float),
            "RGBA8" => Some(Self::Rgba8),
            "BGRA8" => Some(Self::Bgra8),
            "RGBA16Float" => Some(Self::Rgba16Float),
            "RGBA32Float" => Some(Self::Rgba32Float),
            "Depth32Float" => Some(Self::Depth32Float),
            "Depth16" => Some(Self::Depth16),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::R8 => "R8",
            Self::R32Float => "R32Float",
            Self::Rgba8 => "RGBA8",
            Self::Bgra8 => "BGRA8",
            Self::Rgba16Float => "RGBA16Float",
            Self::Rgba32Float => "RGBA32Float",
            Self::Depth32Float => "Depth32Float",
            Self::Depth16 => "Depth16",
        }
    }

    pub fn is_depth(self) -> bool {
        matches!(self, Self::Depth32Float | Self::Depth16)
    }

    /// Size of one pixel in bytes.
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::R8 => 1,
            Self::Depth16 => 2,
            Self::R32Float | Self::Rgba8 | Self::Bgra8 | Self::Depth32Float => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }
}
