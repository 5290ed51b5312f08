use std::time::Instant;

use bytemuck::{Pod, Zeroable};
use log::debug;

use crate::device::{BufferUsage, Device, TriangleGeometry, GEOMETRY_BUFFER_USAGE};
use crate::error::{Error, Result};

/// Indexed triangle mesh as handed over by a loader
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh
{
    pub vertices: Vec<glam::Vec3>,
    pub normals: Vec<glam::Vec3>,
    pub indices: Vec<u32>,
}

impl Mesh
{
    pub fn new(vertices: Vec<glam::Vec3>, normals: Vec<glam::Vec3>, indices: Vec<u32>) -> Self { Self { vertices, normals, indices } }

    pub fn triangle_count(&self) -> usize { self.indices.len() / 3 }

    pub fn validate(&self) -> Result<()>
    {
        if self.vertices.is_empty()
        {
            return Err(Error::EmptyMesh);
        }
        if self.normals.len() != self.vertices.len()
        {
            return Err(Error::NormalCount {
                vertices: self.vertices.len(),
                normals: self.normals.len(),
            });
        }
        if self.indices.len() % 3 != 0
        {
            return Err(Error::IndexCount(self.indices.len()));
        }

        match self.indices.iter().position(|&index| index as usize >= self.vertices.len())
        {
            Some(position) => Err(Error::IndexOutOfRange {
                position,
                index: self.indices[position],
                vertices: self.vertices.len(),
            }),
            None => Ok(()),
        }
    }
}

/// Device vertex layout: position and normal padded to 32 bytes
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct VertexInput
{
    pub position: glam::Vec3,
    pub normal: glam::Vec3,
    _pad: glam::Vec2,
}

impl VertexInput
{
    pub fn new(position: glam::Vec3, normal: glam::Vec3) -> Self
    {
        Self {
            position,
            normal,
            _pad: glam::Vec2::ZERO,
        }
    }
}

/// Device addresses of the buffers of one instance, as read by the shading step
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct ObjectDescription
{
    pub vertex_buffer: u64,
    pub index_buffer: u64,
}

/// Immutable mesh uploaded to the device together with its bottom-level index
pub struct GeometryRecord<D: Device>
{
    vertices: Vec<VertexInput>,
    indices: Vec<u32>,

    vertex_buffer: D::Buffer,
    index_buffer: D::Buffer,
    bounds_index: D::AccelerationStructure,

    description: ObjectDescription,
    bounds_index_address: u64,
}

impl<D: Device> GeometryRecord<D>
{
    /// Interleaves the mesh, uploads it and builds its bottom-level index. Blocks until the build is done
    pub fn new(device: &D, mesh: &Mesh) -> Result<Self>
    {
        mesh.validate()?;
        let timer: Instant = Instant::now();

        let vertices: Vec<VertexInput> = mesh
            .vertices
            .iter()
            .zip(&mesh.normals)
            .map(|(&position, &normal)| VertexInput::new(position, normal))
            .collect();
        let indices: Vec<u32> = mesh.indices.clone();

        let vertex_buffer: D::Buffer = device.create_buffer_with_data(&vertices, BufferUsage::VERTEX_BUFFER | GEOMETRY_BUFFER_USAGE)?;
        let index_buffer: D::Buffer = device.create_buffer_with_data(&indices, BufferUsage::INDEX_BUFFER | GEOMETRY_BUFFER_USAGE)?;

        let bounds_index: D::AccelerationStructure = device.build_bottom_level_index(&TriangleGeometry {
            vertex_buffer: &vertex_buffer,
            vertex_stride: std::mem::size_of::<VertexInput>() as u64,
            vertex_count: vertices.len() as u32,
            index_buffer: &index_buffer,
            index_count: indices.len() as u32,
        })?;

        let description: ObjectDescription = ObjectDescription {
            vertex_buffer: device.buffer_address(&vertex_buffer),
            index_buffer: device.buffer_address(&index_buffer),
        };
        let bounds_index_address: u64 = device.acceleration_structure_address(&bounds_index);

        debug!(
            "Geometry - {} vertices, {} triangles: \t{:?}",
            vertices.len(),
            indices.len() / 3,
            timer.elapsed()
        );

        Ok(Self {
            vertices,
            indices,
            vertex_buffer,
            index_buffer,
            bounds_index,
            description,
            bounds_index_address,
        })
    }

    pub fn vertices(&self) -> &[VertexInput] { &self.vertices }

    pub fn indices(&self) -> &[u32] { &self.indices }

    pub fn vertex_count(&self) -> usize { self.vertices.len() }

    pub fn index_count(&self) -> usize { self.indices.len() }

    pub fn vertex_buffer(&self) -> &D::Buffer { &self.vertex_buffer }

    pub fn index_buffer(&self) -> &D::Buffer { &self.index_buffer }

    pub fn bounds_index(&self) -> &D::AccelerationStructure { &self.bounds_index }

    pub fn bounds_index_address(&self) -> u64 { self.bounds_index_address }

    pub fn description(&self) -> ObjectDescription { self.description }
}

#[cfg(test)]
pub(crate) mod tests
{
    use super::*;
    use crate::device::cpu::CpuDevice;

    pub(crate) fn triangle() -> Mesh
    {
        Mesh::new(
            vec![glam::Vec3::ZERO, glam::Vec3::X, glam::Vec3::Y],
            vec![glam::Vec3::Z; 3],
            vec![0, 1, 2],
        )
    }

    /// Two triangles forming the unit square in the XY plane
    pub(crate) fn quad() -> Mesh
    {
        Mesh::new(
            vec![glam::Vec3::ZERO, glam::Vec3::X, glam::Vec3::new(1.0, 1.0, 0.0), glam::Vec3::Y],
            vec![glam::Vec3::Z; 4],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    #[test]
    fn vertex_layout_is_32_bytes()
    {
        assert_eq!(std::mem::size_of::<VertexInput>(), 32);
        assert_eq!(std::mem::size_of::<ObjectDescription>(), 16);
    }

    #[test]
    fn rejects_malformed_meshes()
    {
        let mut empty: Mesh = triangle();
        empty.vertices.clear();
        assert!(matches!(empty.validate(), Err(Error::EmptyMesh)));

        let mut normals: Mesh = triangle();
        normals.normals.pop();
        assert!(matches!(normals.validate(), Err(Error::NormalCount { vertices: 3, normals: 2 })));

        let mut count: Mesh = triangle();
        count.indices.push(0);
        assert!(matches!(count.validate(), Err(Error::IndexCount(4))));

        let mut range: Mesh = triangle();
        range.indices[1] = 3;
        assert!(matches!(range.validate(), Err(Error::IndexOutOfRange { position: 1, index: 3, vertices: 3 })));
    }

    #[test]
    fn malformed_mesh_allocates_nothing()
    {
        let device: CpuDevice = CpuDevice::new();
        let mut mesh: Mesh = quad();
        mesh.indices[5] = 9;

        assert!(GeometryRecord::new(&device, &mesh).is_err());
        assert_eq!(device.allocated_bytes(), 0);
    }

    #[test]
    fn buffers_hold_every_vertex_and_index()
    {
        let device: CpuDevice = CpuDevice::new();
        let record: GeometryRecord<CpuDevice> = GeometryRecord::new(&device, &quad()).unwrap();

        assert_eq!(record.vertex_count(), 4);
        assert_eq!(record.index_count(), 6);
        assert_eq!(device.buffer_size(record.vertex_buffer()), 4 * 32);
        assert_eq!(device.buffer_size(record.index_buffer()), 6 * 4);
        assert_eq!(record.bounds_index().primitive_count(), Some(2));

        assert_eq!(record.description().vertex_buffer, device.buffer_address(record.vertex_buffer()));
        assert_eq!(record.description().index_buffer, device.buffer_address(record.index_buffer()));
        assert_ne!(record.bounds_index_address(), 0);
    }

    #[test]
    fn out_of_memory_surfaces_as_device_error()
    {
        let device: CpuDevice = CpuDevice::with_memory_budget(64);
        assert!(matches!(GeometryRecord::new(&device, &quad()), Err(Error::Device(_))));
    }
}
