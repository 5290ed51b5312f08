//! Software implementation of [`Device`] backed by host memory.
//!
//! Buffers receive stable, non-zero, 256-byte aligned device addresses. Acceleration structures are
//! BVHs built on the CPU and can be traversed through [`AccelerationStructure::trace`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use bumpalo::Bump;
use log::{debug, trace};
use nohash_hasher::IntMap;
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;

use blas::primitive::Triangle;
use blas::BottomLevel;
use tlas::{TlasInstance, TopLevel, TraceHit};

use crate::device::{BufferUsage, CommandRecorder, Device, ImageFormat, InstanceRecord, TriangleGeometry};
use crate::error::DeviceError;
use crate::ray::Ray;

#[macro_use]
pub mod blas;
pub mod tlas;

const ADDRESS_BASE: u64 = 0x1000_0000;
const ADDRESS_ALIGNMENT: u64 = 256;

//Rough host footprint used for budget accounting
const BYTES_PER_TRIANGLE: u64 = 128;
const BYTES_PER_INSTANCE: u64 = 128;

/// Bytes charged against the device budget, released on drop
struct Allocation
{
    bytes: u64,
    counter: Arc<AtomicU64>,
}

impl Drop for Allocation
{
    fn drop(&mut self) { self.counter.fetch_sub(self.bytes, Ordering::SeqCst); }
}

struct BufferStorage
{
    address: u64,
    size: u64,
    usage: BufferUsage,
    host_visible: bool,
    data: RwLock<Vec<u8>>,
    _allocation: Allocation,
}

#[derive(Clone)]
pub struct Buffer(Arc<BufferStorage>);

impl Buffer
{
    pub fn usage(&self) -> BufferUsage { self.0.usage }

    pub fn is_host_visible(&self) -> bool { self.0.host_visible }
}

struct ImageStorage
{
    width: u32,
    height: u32,
    format: ImageFormat,
    levels: RwLock<Vec<Vec<f32>>>,
    _allocation: Allocation,
}

#[derive(Clone)]
pub struct Image(Arc<ImageStorage>);

impl Image
{
    pub fn width(&self) -> u32 { self.0.width }

    pub fn height(&self) -> u32 { self.0.height }

    pub fn format(&self) -> ImageFormat { self.0.format }

    pub fn mip_levels(&self) -> u32 { self.0.levels.read().len() as u32 }

    /// Texels of one mip level, `None` if the level does not exist
    pub fn level(&self, level: u32) -> Option<Vec<f32>> { self.0.levels.read().get(level as usize).cloned() }
}

fn level_extent(width: u32, height: u32, level: u32) -> (u32, u32) { ((width >> level).max(1), (height >> level).max(1)) }

enum AccelerationData
{
    Bottom(Arc<BottomLevel>),
    Top(TopLevel),
}

struct AccelerationStorage
{
    address: u64,
    data: AccelerationData,
    _allocation: Allocation,
}

#[derive(Clone)]
pub struct AccelerationStructure(Arc<AccelerationStorage>);

impl AccelerationStructure
{
    pub fn is_top_level(&self) -> bool { matches!(self.0.data, AccelerationData::Top(_)) }

    /// Number of triangles of a bottom-level structure
    pub fn primitive_count(&self) -> Option<usize>
    {
        match &self.0.data
        {
            AccelerationData::Bottom(blas) => Some(blas.primitive_count()),
            AccelerationData::Top(_) => None,
        }
    }

    /// Number of instance records of a top-level structure
    pub fn instance_count(&self) -> Option<usize>
    {
        match &self.0.data
        {
            AccelerationData::Bottom(_) => None,
            AccelerationData::Top(tlas) => Some(tlas.instance_count()),
        }
    }

    /// Closest hit of a world-space ray against a top-level structure. Bottom-level structures are
    /// traced in object space and report instance 0.
    pub fn trace(&self, bump: &Bump, ray: &Ray, t_max: f32, cull_mask: u8) -> Option<TraceHit>
    {
        match &self.0.data
        {
            AccelerationData::Top(tlas) => tlas.trace(bump, ray, t_max, cull_mask),
            AccelerationData::Bottom(blas) => blas.intersect(bump, ray, t_max).map(|(hit, primitive_index)| TraceHit {
                t: hit.t,
                barycentrics: hit.local,
                instance_index: 0,
                instance_custom_index: 0,
                primitive_index,
            }),
        }
    }
}

enum Command
{
    CopyBuffer
    {
        source: Buffer, destination: Buffer, size: u64
    },
    CopyBufferToImage
    {
        source: Buffer, destination: Image, level: u32
    },
}

/// Commands recorded for one submission, executed in order
#[derive(Default)]
pub struct CommandBuffer
{
    commands: Vec<Command>,
}

impl CommandRecorder<Buffer, Image> for CommandBuffer
{
    fn copy_buffer(&mut self, source: &Buffer, destination: &Buffer, size: u64)
    {
        self.commands.push(Command::CopyBuffer {
            source: source.clone(),
            destination: destination.clone(),
            size,
        });
    }

    fn copy_buffer_to_image(&mut self, source: &Buffer, destination: &Image, level: u32)
    {
        self.commands.push(Command::CopyBufferToImage {
            source: source.clone(),
            destination: destination.clone(),
            level,
        });
    }
}

impl Command
{
    fn execute(self) -> Result<(), DeviceError>
    {
        match self
        {
            Command::CopyBuffer { source, destination, size } =>
            {
                if size > source.0.size || size > destination.0.size
                {
                    return Err(DeviceError::OutOfBounds {
                        offset: 0,
                        size,
                        capacity: source.0.size.min(destination.0.size),
                    });
                }

                //Copy out first, source and destination may alias
                let bytes: Vec<u8> = source.0.data.read()[..size as usize].to_vec();
                destination.0.data.write()[..size as usize].copy_from_slice(&bytes);
                Ok(())
            }
            Command::CopyBufferToImage { source, destination, level } =>
            {
                let mut levels = destination.0.levels.write();
                let level_count: u32 = levels.len() as u32;

                let texels: &mut Vec<f32> = levels
                    .get_mut(level as usize)
                    .ok_or(DeviceError::InvalidMipLevel { level, levels: level_count })?;

                let expected: u64 = texels.len() as u64 * 4;
                if source.0.size != expected
                {
                    return Err(DeviceError::OutOfBounds {
                        offset: 0,
                        size: expected,
                        capacity: source.0.size,
                    });
                }

                let bytes = source.0.data.read();
                texels
                    .iter_mut()
                    .zip(bytes.chunks_exact(4))
                    .for_each(|(texel, chunk)| *texel = bytemuck::pod_read_unaligned(chunk));
                Ok(())
            }
        }
    }
}

pub struct CpuDevice
{
    memory_budget: Option<u64>,
    allocated: Arc<AtomicU64>,
    next_address: AtomicU64,
    structures: Mutex<IntMap<u64, Weak<AccelerationStorage>>>,
}

impl Default for CpuDevice
{
    fn default() -> Self { Self::new() }
}

impl CpuDevice
{
    pub fn new() -> Self
    {
        Self {
            memory_budget: None,
            allocated: Arc::new(AtomicU64::new(0)),
            next_address: AtomicU64::new(ADDRESS_BASE),
            structures: Mutex::new(IntMap::default()),
        }
    }

    /// Device that fails allocations once `bytes` are in use
    pub fn with_memory_budget(bytes: u64) -> Self
    {
        Self {
            memory_budget: Some(bytes),
            ..Self::new()
        }
    }

    pub fn memory_budget(&self) -> Option<u64> { self.memory_budget }

    /// Bytes held by live buffers, images and acceleration structures
    pub fn allocated_bytes(&self) -> u64 { self.allocated.load(Ordering::SeqCst) }

    fn reserve(&self, bytes: u64) -> Result<Allocation, DeviceError>
    {
        match self.memory_budget
        {
            Some(budget) =>
            {
                self.allocated
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| {
                        used.checked_add(bytes).filter(|&total| total <= budget)
                    })
                    .map_err(|used| DeviceError::OutOfMemory {
                        requested: bytes,
                        available: budget.saturating_sub(used),
                    })?;
            }
            None =>
            {
                self.allocated.fetch_add(bytes, Ordering::SeqCst);
            }
        }

        Ok(Allocation {
            bytes,
            counter: self.allocated.clone(),
        })
    }

    fn allocate_address(&self, size: u64) -> u64
    {
        let span: u64 = size.max(1).div_ceil(ADDRESS_ALIGNMENT) * ADDRESS_ALIGNMENT;
        self.next_address.fetch_add(span, Ordering::SeqCst)
    }

    fn register(&self, data: AccelerationData, allocation: Allocation) -> AccelerationStructure
    {
        let storage: Arc<AccelerationStorage> = Arc::new(AccelerationStorage {
            address: self.allocate_address(allocation.bytes),
            data,
            _allocation: allocation,
        });

        let mut structures = self.structures.lock();
        structures.retain(|_, structure| structure.strong_count() > 0);
        structures.insert(storage.address, Arc::downgrade(&storage));

        AccelerationStructure(storage)
    }

    fn resolve_bottom_level(&self, address: u64) -> Result<Arc<BottomLevel>, DeviceError>
    {
        let storage: Arc<AccelerationStorage> = self
            .structures
            .lock()
            .get(&address)
            .and_then(Weak::upgrade)
            .ok_or(DeviceError::UnknownAddress(address))?;

        match &storage.data
        {
            AccelerationData::Bottom(blas) => Ok(blas.clone()),
            AccelerationData::Top(_) => Err(DeviceError::BuildRejected(format!(
                "instance references top-level structure {address:#x}"
            ))),
        }
    }

    fn check_range(buffer: &Buffer, offset: u64, size: u64) -> Result<(), DeviceError>
    {
        match offset.checked_add(size)
        {
            Some(end) if end <= buffer.0.size => Ok(()),
            _ => Err(DeviceError::OutOfBounds {
                offset,
                size,
                capacity: buffer.0.size,
            }),
        }
    }
}

impl Device for CpuDevice
{
    type Buffer = Buffer;
    type Image = Image;
    type AccelerationStructure = AccelerationStructure;
    type Commands = CommandBuffer;

    fn create_buffer(&self, size_bytes: u64, usage: BufferUsage, host_visible: bool) -> Result<Buffer, DeviceError>
    {
        let allocation: Allocation = self.reserve(size_bytes)?;

        trace!("Buffer - {} bytes, {:?}", size_bytes, usage);

        Ok(Buffer(Arc::new(BufferStorage {
            address: self.allocate_address(size_bytes),
            size: size_bytes,
            usage,
            host_visible,
            data: RwLock::new(vec![0; size_bytes as usize]),
            _allocation: allocation,
        })))
    }

    fn write_buffer(&self, buffer: &Buffer, offset: u64, data: &[u8]) -> Result<(), DeviceError>
    {
        if !buffer.0.host_visible
        {
            return Err(DeviceError::NotHostVisible(buffer.0.address));
        }
        Self::check_range(buffer, offset, data.len() as u64)?;

        buffer.0.data.write()[offset as usize..offset as usize + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Device local buffers are readable too on this backend
    fn read_buffer(&self, buffer: &Buffer, offset: u64, size: u64) -> Result<Vec<u8>, DeviceError>
    {
        Self::check_range(buffer, offset, size)?;
        Ok(buffer.0.data.read()[offset as usize..(offset + size) as usize].to_vec())
    }

    fn buffer_size(&self, buffer: &Buffer) -> u64 { buffer.0.size }

    fn buffer_address(&self, buffer: &Buffer) -> u64 { buffer.0.address }

    fn create_image(&self, width: u32, height: u32, mip_levels: u32, format: ImageFormat) -> Result<Image, DeviceError>
    {
        let max_levels: u32 = u32::BITS - width.max(height).max(1).leading_zeros();
        if mip_levels == 0 || mip_levels > max_levels
        {
            return Err(DeviceError::InvalidMipLevel {
                level: mip_levels,
                levels: max_levels,
            });
        }

        let levels: Vec<Vec<f32>> = (0..mip_levels)
            .map(|level: u32| {
                let (w, h): (u32, u32) = level_extent(width, height, level);
                vec![0.0; (w * h * format.channels()) as usize]
            })
            .collect();

        let bytes: u64 = levels.iter().map(|level| level.len() as u64 * 4).sum();
        let allocation: Allocation = self.reserve(bytes)?;

        Ok(Image(Arc::new(ImageStorage {
            width,
            height,
            format,
            levels: RwLock::new(levels),
            _allocation: allocation,
        })))
    }

    fn one_shot<F>(&self, record: F) -> Result<(), DeviceError>
    where
        F: FnOnce(&mut CommandBuffer) -> Result<(), DeviceError>,
    {
        let mut commands: CommandBuffer = CommandBuffer::default();
        record(&mut commands)?;

        commands.commands.into_iter().try_for_each(Command::execute)
    }

    fn build_bottom_level_index(&self, geometry: &TriangleGeometry<'_, Buffer>) -> Result<AccelerationStructure, DeviceError>
    {
        let timer: Instant = Instant::now();

        let stride: u64 = geometry.vertex_stride;
        if stride < 12 || stride % 4 != 0
        {
            return Err(DeviceError::UnsupportedVertexLayout { stride });
        }
        if geometry.index_count % 3 != 0
        {
            return Err(DeviceError::BuildRejected(format!(
                "index count {} is not a multiple of 3",
                geometry.index_count
            )));
        }

        Self::check_range(geometry.vertex_buffer, 0, geometry.vertex_count as u64 * stride)?;
        Self::check_range(geometry.index_buffer, 0, geometry.index_count as u64 * 4)?;

        let allocation: Allocation = self.reserve((geometry.index_count / 3) as u64 * BYTES_PER_TRIANGLE)?;

        let positions: Vec<glam::Vec3A> = {
            let vertex_bytes = geometry.vertex_buffer.0.data.read();
            vertex_bytes
                .chunks_exact(stride as usize)
                .take(geometry.vertex_count as usize)
                .map(|vertex: &[u8]| glam::Vec3A::from(bytemuck::pod_read_unaligned::<[f32; 3]>(&vertex[..12])))
                .collect()
        };

        let indices: Vec<u32> = {
            let index_bytes = geometry.index_buffer.0.data.read();
            index_bytes
                .chunks_exact(4)
                .take(geometry.index_count as usize)
                .map(bytemuck::pod_read_unaligned::<u32>)
                .collect()
        };

        if let Some(position) = indices.iter().position(|&index| index >= geometry.vertex_count)
        {
            return Err(DeviceError::BuildRejected(format!(
                "index {} at position {position} exceeds vertex count {}",
                indices[position], geometry.vertex_count
            )));
        }

        let triangles: Vec<Triangle> = indices
            .par_chunks_exact(3)
            .map(|face: &[u32]| Triangle::new([positions[face[0] as usize], positions[face[1] as usize], positions[face[2] as usize]]))
            .collect();

        let structure: AccelerationStructure = self.register(AccelerationData::Bottom(Arc::new(BottomLevel::new(triangles))), allocation);

        debug!("Bottom-level build at {:#x}: \t{:?}", structure.0.address, timer.elapsed());
        Ok(structure)
    }

    fn build_top_level_index(&self, instances: &Buffer, instance_count: u32) -> Result<AccelerationStructure, DeviceError>
    {
        let timer: Instant = Instant::now();
        let record_size: u64 = std::mem::size_of::<InstanceRecord>() as u64;

        Self::check_range(instances, 0, instance_count as u64 * record_size)?;

        let records: Vec<InstanceRecord> = {
            let bytes = instances.0.data.read();
            bytes
                .chunks_exact(record_size as usize)
                .take(instance_count as usize)
                .map(bytemuck::pod_read_unaligned::<InstanceRecord>)
                .collect()
        };

        let resolved: Vec<TlasInstance> = records
            .into_iter()
            .map(|record: InstanceRecord| -> Result<TlasInstance, DeviceError> {
                let blas: Option<Arc<BottomLevel>> = match record.acceleration_structure_reference
                {
                    0 => None,
                    address => Some(self.resolve_bottom_level(address)?),
                };
                Ok(TlasInstance { record, blas })
            })
            .collect::<Result<_, _>>()?;

        let allocation: Allocation = self.reserve(instance_count as u64 * BYTES_PER_INSTANCE)?;
        let structure: AccelerationStructure = self.register(AccelerationData::Top(TopLevel::new(resolved)), allocation);

        debug!("Top-level build at {:#x}: \t{:?}", structure.0.address, timer.elapsed());
        Ok(structure)
    }

    fn acceleration_structure_address(&self, structure: &AccelerationStructure) -> u64 { structure.0.address }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::device::GEOMETRY_BUFFER_USAGE;

    fn triangle_buffers(device: &CpuDevice) -> (Buffer, Buffer)
    {
        let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        let vertices: Buffer = device.create_buffer_with_data(&positions, GEOMETRY_BUFFER_USAGE).unwrap();
        let indices: Buffer = device.create_buffer_with_data(&[0u32, 1, 2], GEOMETRY_BUFFER_USAGE).unwrap();
        (vertices, indices)
    }

    fn build_triangle(device: &CpuDevice, vertices: &Buffer, indices: &Buffer) -> AccelerationStructure
    {
        device
            .build_bottom_level_index(&TriangleGeometry {
                vertex_buffer: vertices,
                vertex_stride: 12,
                vertex_count: 3,
                index_buffer: indices,
                index_count: 3,
            })
            .unwrap()
    }

    #[test]
    fn buffers_get_distinct_aligned_addresses()
    {
        let device: CpuDevice = CpuDevice::new();
        let a: Buffer = device.create_buffer(10, BufferUsage::STORAGE_BUFFER, true).unwrap();
        let b: Buffer = device.create_buffer(0, BufferUsage::STORAGE_BUFFER, true).unwrap();
        let c: Buffer = device.create_buffer(300, BufferUsage::STORAGE_BUFFER, true).unwrap();

        let addresses: [u64; 3] = [device.buffer_address(&a), device.buffer_address(&b), device.buffer_address(&c)];
        assert!(addresses.iter().all(|&address| address != 0 && address % ADDRESS_ALIGNMENT == 0));
        assert!(addresses[0] < addresses[1] && addresses[1] < addresses[2]);
    }

    #[test]
    fn write_and_read_back()
    {
        let device: CpuDevice = CpuDevice::new();
        let buffer: Buffer = device.create_buffer(8, BufferUsage::STORAGE_BUFFER, true).unwrap();

        device.write_buffer(&buffer, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(device.read_buffer(&buffer, 0, 8).unwrap(), vec![0, 0, 0, 0, 1, 2, 3, 4]);

        assert!(matches!(device.write_buffer(&buffer, 6, &[0; 4]), Err(DeviceError::OutOfBounds { .. })));
        assert!(matches!(device.read_buffer(&buffer, 9, 0), Err(DeviceError::OutOfBounds { .. })));
    }

    #[test]
    fn device_local_buffers_are_filled_through_staging()
    {
        let device: CpuDevice = CpuDevice::new();
        let buffer: Buffer = device.create_device_local_buffer(&[1.5f32, 2.5], BufferUsage::STORAGE_BUFFER).unwrap();

        assert!(!buffer.is_host_visible());
        assert!(matches!(device.write_buffer(&buffer, 0, &[0]), Err(DeviceError::NotHostVisible(_))));

        let bytes: Vec<u8> = device.read_buffer(&buffer, 0, 8).unwrap();
        assert_eq!(bytemuck::cast_slice::<u8, f32>(&bytes), &[1.5, 2.5]);
    }

    #[test]
    fn budget_is_enforced_and_released()
    {
        let device: CpuDevice = CpuDevice::with_memory_budget(100);

        let first: Buffer = device.create_buffer(60, BufferUsage::STORAGE_BUFFER, true).unwrap();
        assert_eq!(device.allocated_bytes(), 60);

        let failure: Result<Buffer, DeviceError> = device.create_buffer(60, BufferUsage::STORAGE_BUFFER, true);
        assert_eq!(failure.err(), Some(DeviceError::OutOfMemory { requested: 60, available: 40 }));

        drop(first);
        assert_eq!(device.allocated_bytes(), 0);
        assert!(device.create_buffer(60, BufferUsage::STORAGE_BUFFER, true).is_ok());
    }

    #[test]
    fn image_levels_are_uploaded()
    {
        let device: CpuDevice = CpuDevice::new();
        let levels: Vec<Vec<f32>> = vec![vec![1.0, 2.0, 3.0, 4.0], vec![10.0]];

        let image: Image = device.create_image_with_levels(2, 2, ImageFormat::R32Float, &levels).unwrap();
        assert_eq!(image.mip_levels(), 2);
        assert_eq!(image.level(0).unwrap(), levels[0]);
        assert_eq!(image.level(1).unwrap(), levels[1]);
        assert!(image.level(2).is_none());

        assert!(matches!(
            device.create_image(2, 2, 3, ImageFormat::R32Float),
            Err(DeviceError::InvalidMipLevel { .. })
        ));
    }

    #[test]
    fn bottom_level_rejects_bad_input()
    {
        let device: CpuDevice = CpuDevice::new();
        let (vertices, _) = triangle_buffers(&device);
        let bad_indices: Buffer = device.create_buffer_with_data(&[0u32, 1, 3], GEOMETRY_BUFFER_USAGE).unwrap();

        let out_of_range = device.build_bottom_level_index(&TriangleGeometry {
            vertex_buffer: &vertices,
            vertex_stride: 12,
            vertex_count: 3,
            index_buffer: &bad_indices,
            index_count: 3,
        });
        assert!(matches!(out_of_range, Err(DeviceError::BuildRejected(_))));

        let bad_stride = device.build_bottom_level_index(&TriangleGeometry {
            vertex_buffer: &vertices,
            vertex_stride: 8,
            vertex_count: 3,
            index_buffer: &bad_indices,
            index_count: 3,
        });
        assert_eq!(bad_stride.err(), Some(DeviceError::UnsupportedVertexLayout { stride: 8 }));
    }

    #[test]
    fn top_level_traces_translated_instances()
    {
        let device: CpuDevice = CpuDevice::new();
        let (vertices, indices) = triangle_buffers(&device);
        let blas: AccelerationStructure = build_triangle(&device, &vertices, &indices);
        assert_eq!(blas.primitive_count(), Some(1));

        let reference: u64 = device.acceleration_structure_address(&blas);
        let mut shifted: [f32; 12] = InstanceRecord::IDENTITY_TRANSFORM;
        shifted[3] = 5.0;

        let records: [InstanceRecord; 3] = [
            InstanceRecord::new(InstanceRecord::IDENTITY_TRANSFORM, 0, 0xff, 0, 0, reference),
            InstanceRecord::new(shifted, 1, 0xff, 0, 0, reference),
            InstanceRecord::new(InstanceRecord::IDENTITY_TRANSFORM, 2, 0xff, 0, 0, 0),
        ];
        let instances: Buffer = device.create_buffer_with_data(&records, BufferUsage::STORAGE_BUFFER).unwrap();
        let tlas: AccelerationStructure = device.build_top_level_index(&instances, 3).unwrap();

        assert!(tlas.is_top_level());
        assert_eq!(tlas.instance_count(), Some(3));

        let bump: Bump = Bump::new();
        let ray: Ray = Ray::new(glam::Vec3A::new(5.25, 0.25, 1.0), -glam::Vec3A::Z);
        let hit: TraceHit = tlas.trace(&bump, &ray, f32::INFINITY, 0xff).unwrap();

        assert_eq!(hit.instance_index, 1);
        assert_eq!(hit.instance_custom_index, 1);
        assert_eq!(hit.primitive_index, 0);
        assert!((hit.t - 1.0).abs() < 1e-5);

        assert!(tlas.trace(&bump, &ray, f32::INFINITY, 0x00).is_none());
    }

    #[test]
    fn top_level_rejects_unknown_references()
    {
        let device: CpuDevice = CpuDevice::new();
        let record: InstanceRecord = InstanceRecord::new(InstanceRecord::IDENTITY_TRANSFORM, 0, 0xff, 0, 0, 0xdead_0000);
        let instances: Buffer = device.create_buffer_with_data(&[record], BufferUsage::STORAGE_BUFFER).unwrap();

        assert_eq!(
            device.build_top_level_index(&instances, 1).err(),
            Some(DeviceError::UnknownAddress(0xdead_0000))
        );
    }

    #[test]
    fn null_instance_builds_a_queryable_structure()
    {
        let device: CpuDevice = CpuDevice::new();
        let record: InstanceRecord = InstanceRecord::new(InstanceRecord::IDENTITY_TRANSFORM, 0, 0xff, 0, 0, 0);
        let instances: Buffer = device.create_buffer_with_data(&[record], BufferUsage::STORAGE_BUFFER).unwrap();

        let tlas: AccelerationStructure = device.build_top_level_index(&instances, 1).unwrap();
        let ray: Ray = Ray::new(glam::Vec3A::ZERO, glam::Vec3A::Z);

        assert_eq!(tlas.instance_count(), Some(1));
        assert!(tlas.trace(&Bump::new(), &ray, f32::INFINITY, 0xff).is_none());
    }
}
