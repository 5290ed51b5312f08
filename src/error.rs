use thiserror::Error;

/// Failures reported by a [`Device`](crate::device::Device) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError
{
    #[error("out of device memory: requested {requested} bytes, {available} available")]
    OutOfMemory
    {
        requested: u64, available: u64
    },

    #[error("no device resource at address {0:#x}")]
    UnknownAddress(u64),

    #[error("access of {size} bytes at offset {offset} exceeds buffer of {capacity} bytes")]
    OutOfBounds
    {
        offset: u64, size: u64, capacity: u64
    },

    #[error("buffer at {0:#x} is not host visible")]
    NotHostVisible(u64),

    #[error("mip level {level} out of range ({levels} levels)")]
    InvalidMipLevel
    {
        level: u32, levels: u32
    },

    #[error("unsupported vertex layout: stride {stride} bytes")]
    UnsupportedVertexLayout
    {
        stride: u64
    },

    #[error("build rejected: {0}")]
    BuildRejected(String),
}

/// Error type for every fallible operation of the crate.
#[derive(Error, Debug)]
pub enum Error
{
    #[error("image has no pixels ({width}x{height}x{channels})")]
    EmptyImage
    {
        width: u32, height: u32, channels: u32
    },

    #[error("pixel data holds {actual} floats, expected {expected}")]
    PixelCount
    {
        expected: usize, actual: usize
    },

    #[error("image dimensions {width}x{height} are not multiples of {side}")]
    NonMultipleDimensions
    {
        width: u32, height: u32, side: u32
    },

    #[error("mesh has no vertices")]
    EmptyMesh,

    #[error("mesh has {normals} normals for {vertices} vertices")]
    NormalCount
    {
        vertices: usize, normals: usize
    },

    #[error("index count {0} is not a multiple of 3")]
    IndexCount(usize),

    #[error("index {index} at position {position} is out of range ({vertices} vertices)")]
    IndexOutOfRange
    {
        position: usize, index: u32, vertices: usize
    },

    #[error("malformed OBJ at line {line}: {reason}")]
    Obj
    {
        line: usize, reason: String
    },

    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
