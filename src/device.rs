//! Narrow interface to the graphics device the core builds its resources on.
//!
//! Everything the sampler and the acceleration index need from a backend is expressed by
//! [`Device`]: linear buffers with stable device addresses, images with mip chains, one-shot
//! command submission, and bottom/top-level acceleration structure builds. Every call is
//! synchronous from the caller's point of view.

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

use crate::error::DeviceError;

pub mod cpu;

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32
    {
        const VERTEX_BUFFER = 1 << 0;
        const INDEX_BUFFER = 1 << 1;
        const STORAGE_BUFFER = 1 << 2;
        const SHADER_DEVICE_ADDRESS = 1 << 3;
        const ACCELERATION_STRUCTURE_BUILD_INPUT = 1 << 4;
        const TRANSFER_SRC = 1 << 5;
        const TRANSFER_DST = 1 << 6;
    }
}

/// Usage shared by every buffer an acceleration structure build reads from
pub const GEOMETRY_BUFFER_USAGE: BufferUsage = BufferUsage::ACCELERATION_STRUCTURE_BUILD_INPUT
    .union(BufferUsage::SHADER_DEVICE_ADDRESS)
    .union(BufferUsage::STORAGE_BUFFER);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImageFormat
{
    R32Float,
    Rgba32Float,
}

impl ImageFormat
{
    pub fn channels(&self) -> u32
    {
        match self
        {
            ImageFormat::R32Float => 1,
            ImageFormat::Rgba32Float => 4,
        }
    }
}

/// Indexed triangle list an acceleration structure is built over.
/// Positions are three `f32` at the start of every vertex.
pub struct TriangleGeometry<'a, B>
{
    pub vertex_buffer: &'a B,
    pub vertex_stride: u64,
    pub vertex_count: u32,
    pub index_buffer: &'a B,
    pub index_count: u32,
}

/// Instance record consumed by top-level builds, laid out like `VkAccelerationStructureInstanceKHR`
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct InstanceRecord
{
    /// Row-major 3x4 affine transform
    pub transform: [f32; 12],
    /// Custom index in the low 24 bits, visibility mask in the high 8 bits
    pub custom_index_and_mask: u32,
    /// Shader binding table offset in the low 24 bits, instance flags in the high 8 bits
    pub sbt_offset_and_flags: u32,
    /// Device address of the bottom-level structure, 0 for a null instance
    pub acceleration_structure_reference: u64,
}

impl InstanceRecord
{
    pub const IDENTITY_TRANSFORM: [f32; 12] = [1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0];

    pub fn new(transform: [f32; 12], custom_index: u32, mask: u8, sbt_offset: u32, flags: u8, reference: u64) -> Self
    {
        debug_assert!(custom_index < (1 << 24));
        debug_assert!(sbt_offset < (1 << 24));

        Self {
            transform,
            custom_index_and_mask: (custom_index & 0x00ff_ffff) | ((mask as u32) << 24),
            sbt_offset_and_flags: (sbt_offset & 0x00ff_ffff) | ((flags as u32) << 24),
            acceleration_structure_reference: reference,
        }
    }

    pub fn custom_index(&self) -> u32 { self.custom_index_and_mask & 0x00ff_ffff }

    pub fn mask(&self) -> u8 { (self.custom_index_and_mask >> 24) as u8 }

    pub fn sbt_offset(&self) -> u32 { self.sbt_offset_and_flags & 0x00ff_ffff }

    pub fn flags(&self) -> u8 { (self.sbt_offset_and_flags >> 24) as u8 }

    /// Object-to-world transform
    pub fn affine(&self) -> glam::Affine3A
    {
        let t: &[f32; 12] = &self.transform;
        glam::Affine3A::from_cols_array(&[t[0], t[4], t[8], t[1], t[5], t[9], t[2], t[6], t[10], t[3], t[7], t[11]])
    }
}

/// Commands that can be recorded into a one-shot submission
pub trait CommandRecorder<B, I>
{
    fn copy_buffer(&mut self, source: &B, destination: &B, size: u64);
    fn copy_buffer_to_image(&mut self, source: &B, destination: &I, level: u32);
}

pub trait Device: Send + Sync
{
    type Buffer: Clone + Send + Sync;
    type Image: Clone + Send + Sync;
    type AccelerationStructure: Clone + Send + Sync;
    type Commands: CommandRecorder<Self::Buffer, Self::Image>;

    fn create_buffer(&self, size_bytes: u64, usage: BufferUsage, host_visible: bool) -> Result<Self::Buffer, DeviceError>;

    /// Writes into a host visible buffer
    fn write_buffer(&self, buffer: &Self::Buffer, offset: u64, data: &[u8]) -> Result<(), DeviceError>;

    fn read_buffer(&self, buffer: &Self::Buffer, offset: u64, size: u64) -> Result<Vec<u8>, DeviceError>;

    fn buffer_size(&self, buffer: &Self::Buffer) -> u64;

    fn buffer_address(&self, buffer: &Self::Buffer) -> u64;

    fn create_image(&self, width: u32, height: u32, mip_levels: u32, format: ImageFormat) -> Result<Self::Image, DeviceError>;

    /// Records commands, submits them and blocks until the queue is idle
    fn one_shot<F>(&self, record: F) -> Result<(), DeviceError>
    where
        F: FnOnce(&mut Self::Commands) -> Result<(), DeviceError>;

    fn build_bottom_level_index(&self, geometry: &TriangleGeometry<'_, Self::Buffer>) -> Result<Self::AccelerationStructure, DeviceError>;

    fn build_top_level_index(&self, instances: &Self::Buffer, instance_count: u32) -> Result<Self::AccelerationStructure, DeviceError>;

    fn acceleration_structure_address(&self, structure: &Self::AccelerationStructure) -> u64;

    /// Creates a host visible buffer holding `data`
    fn create_buffer_with_data<T: Pod>(&self, data: &[T], usage: BufferUsage) -> Result<Self::Buffer, DeviceError>
    {
        let bytes: &[u8] = bytemuck::cast_slice(data);

        let buffer: Self::Buffer = self.create_buffer(bytes.len() as u64, usage | BufferUsage::TRANSFER_DST, true)?;
        self.write_buffer(&buffer, 0, bytes)?;

        Ok(buffer)
    }

    /// Uploads every level of a mip chain through a staging buffer.
    /// `levels[0]` is the full resolution image.
    fn create_image_with_levels(&self, width: u32, height: u32, format: ImageFormat, levels: &[Vec<f32>]) -> Result<Self::Image, DeviceError>
    {
        let image: Self::Image = self.create_image(width, height, levels.len() as u32, format)?;

        let staging: Vec<Self::Buffer> = levels
            .iter()
            .map(|level| self.create_buffer_with_data(level, BufferUsage::TRANSFER_SRC))
            .collect::<Result<_, _>>()?;

        self.one_shot(|commands: &mut Self::Commands| {
            for (level, buffer) in staging.iter().enumerate()
            {
                commands.copy_buffer_to_image(buffer, &image, level as u32);
            }
            Ok(())
        })?;

        Ok(image)
    }

    /// Creates a device local buffer and fills it through a staging copy
    fn create_device_local_buffer<T: Pod>(&self, data: &[T], usage: BufferUsage) -> Result<Self::Buffer, DeviceError>
    {
        let staging: Self::Buffer = self.create_buffer_with_data(data, BufferUsage::TRANSFER_SRC)?;
        let size: u64 = self.buffer_size(&staging);

        let buffer: Self::Buffer = self.create_buffer(size, usage | BufferUsage::TRANSFER_DST, false)?;
        self.one_shot(|commands: &mut Self::Commands| {
            commands.copy_buffer(&staging, &buffer, size);
            Ok(())
        })?;

        Ok(buffer)
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn instance_record_matches_vulkan_layout()
    {
        assert_eq!(std::mem::size_of::<InstanceRecord>(), 64);

        let record: InstanceRecord = InstanceRecord::new(InstanceRecord::IDENTITY_TRANSFORM, 7, 0xff, 3, 0, 0x1000);
        assert_eq!(record.custom_index(), 7);
        assert_eq!(record.mask(), 0xff);
        assert_eq!(record.sbt_offset(), 3);
        assert_eq!(record.flags(), 0);
        assert_eq!(record.affine(), glam::Affine3A::IDENTITY);
    }

    #[test]
    fn affine_reads_row_major_translation()
    {
        let mut transform: [f32; 12] = InstanceRecord::IDENTITY_TRANSFORM;
        transform[3] = 1.0;
        transform[7] = 2.0;
        transform[11] = 3.0;

        let record: InstanceRecord = InstanceRecord::new(transform, 0, 0xff, 0, 0, 0);
        assert_eq!(record.affine().translation, glam::Vec3A::new(1.0, 2.0, 3.0));
    }
}
