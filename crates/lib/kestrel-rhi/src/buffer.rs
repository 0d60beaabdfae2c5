use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
    pub struct BufferUsage: u32 {
        const VERTEX   = 1 << 0;
        const INDEX    = 1 << 1;
        const UNIFORM  = 1 << 2;
        const STORAGE  = 1 << 3;
        const INDIRECT = 1 << 4;
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct BufferDesc {
    pub size: u64,
    pub usage: BufferUsage,
}

impl BufferDesc {
    pub fn new(size: u64, usage: BufferUsage) -> Self {
        Self { size, usage }
    }
}

/// Backend buffer identifier, opaque above the RHI.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RawBuffer(pub u64);

#[derive(Debug)]
pub struct Buffer {
    pub desc: BufferDesc,
    pub raw: RawBuffer,
}
