//! Scene-wide instance index.
//!
//! The live set of instances is only a list of edits until [`SceneAccelerationIndex::update`] runs: every
//! update rebuilds the top-level structure and the two parallel tables (object descriptions and
//! materials) from scratch and publishes them together as one [`SceneSnapshot`]. Readers holding an older
//! snapshot keep it alive through its `Arc`.

use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use log::{debug, info, warn};
use nohash_hasher::IntMap;

use crate::device::{BufferUsage, Device, InstanceRecord, GEOMETRY_BUFFER_USAGE};
use crate::error::{DeviceError, Result};
use crate::scene::geometry::{GeometryRecord, ObjectDescription};
use crate::scene::material::Material;
use crate::scene::transform::Transform;

pub const INSTANCE_MASK: u8 = 0xff;
const MAX_INSTANCES: usize = 1 << 24;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u64);

impl nohash_hasher::IsEnabled for InstanceId {}

/// Placement of a geometry record in the scene
pub struct Instance<D: Device>
{
    pub geometry: Arc<GeometryRecord<D>>,
    pub transform: Transform,
    pub material: Material,
}

impl<D: Device> Clone for Instance<D>
{
    fn clone(&self) -> Self
    {
        Self {
            geometry: self.geometry.clone(),
            transform: self.transform,
            material: self.material,
        }
    }
}

impl<D: Device> Instance<D>
{
    pub fn new(geometry: Arc<GeometryRecord<D>>, transform: Transform, material: Material) -> Self
    {
        Self {
            geometry,
            transform,
            material,
        }
    }

    fn record(&self, custom_index: u32) -> InstanceRecord
    {
        InstanceRecord::new(
            self.transform.row_major_3x4(),
            custom_index,
            INSTANCE_MASK,
            0,
            0,
            self.geometry.bounds_index_address(),
        )
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SceneState
{
    /// Only the placeholder instance is present
    Empty,
    Populated,
}

/// One consistent build of the top-level structure and its parallel tables.
/// Entry `i` of every table describes the instance with custom index `i`.
pub struct SceneSnapshot<D: Device>
{
    top_level: D::AccelerationStructure,
    instance_buffer: D::Buffer,
    descriptions_buffer: D::Buffer,
    materials_buffer: D::Buffer,

    records: Vec<InstanceRecord>,
    descriptions: Vec<ObjectDescription>,
    materials: Vec<Material>,

    ids: Vec<Option<InstanceId>>,
    geometries: Vec<Option<Arc<GeometryRecord<D>>>>,
}

impl<D: Device> SceneSnapshot<D>
{
    fn build<'a, I>(device: &D, instances: I) -> Result<Self>
    where
        I: IntoIterator<Item = (Option<InstanceId>, &'a Instance<D>)>,
        D: 'a,
    {
        let mut records: Vec<InstanceRecord> = Vec::new();
        let mut descriptions: Vec<ObjectDescription> = Vec::new();
        let mut materials: Vec<Material> = Vec::new();
        let mut ids: Vec<Option<InstanceId>> = Vec::new();
        let mut geometries: Vec<Option<Arc<GeometryRecord<D>>>> = Vec::new();

        for (custom_index, (id, instance)) in instances.into_iter().enumerate()
        {
            if custom_index >= MAX_INSTANCES
            {
                return Err(DeviceError::BuildRejected(format!("more than {MAX_INSTANCES} instances")).into());
            }

            records.push(instance.record(custom_index as u32));
            descriptions.push(instance.geometry.description());
            materials.push(instance.material);
            ids.push(id);
            geometries.push(Some(instance.geometry.clone()));
        }

        //Placeholder so the shaders always see a valid structure
        if records.is_empty()
        {
            records.push(InstanceRecord::new(InstanceRecord::IDENTITY_TRANSFORM, 0, INSTANCE_MASK, 0, 0, 0));
            descriptions.push(ObjectDescription::default());
            materials.push(Material::default());
            ids.push(None);
            geometries.push(None);
        }

        assert_eq!(records.len(), descriptions.len(), "instance and description tables diverged");
        assert_eq!(records.len(), materials.len(), "instance and material tables diverged");

        let instance_buffer: D::Buffer = device.create_buffer_with_data(&records, GEOMETRY_BUFFER_USAGE)?;
        let top_level: D::AccelerationStructure = device.build_top_level_index(&instance_buffer, records.len() as u32)?;

        let table_usage: BufferUsage = BufferUsage::STORAGE_BUFFER | BufferUsage::SHADER_DEVICE_ADDRESS;
        let descriptions_buffer: D::Buffer = device.create_buffer_with_data(&descriptions, table_usage)?;
        let materials_buffer: D::Buffer = device.create_buffer_with_data(&materials, table_usage)?;

        Ok(Self {
            top_level,
            instance_buffer,
            descriptions_buffer,
            materials_buffer,
            records,
            descriptions,
            materials,
            ids,
            geometries,
        })
    }

    pub fn state(&self) -> SceneState
    {
        match self.ids.as_slice()
        {
            [None] => SceneState::Empty,
            _ => SceneState::Populated,
        }
    }

    pub fn top_level(&self) -> &D::AccelerationStructure { &self.top_level }

    pub fn instance_buffer(&self) -> &D::Buffer { &self.instance_buffer }

    pub fn descriptions_buffer(&self) -> &D::Buffer { &self.descriptions_buffer }

    pub fn materials_buffer(&self) -> &D::Buffer { &self.materials_buffer }

    /// Number of records in the top-level structure, including the placeholder of an empty scene
    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.state() == SceneState::Empty }

    pub fn records(&self) -> &[InstanceRecord] { &self.records }

    pub fn descriptions(&self) -> &[ObjectDescription] { &self.descriptions }

    pub fn materials(&self) -> &[Material] { &self.materials }

    /// Live instance the record at `custom_index` was built from, `None` for the placeholder
    pub fn instance_id(&self, custom_index: usize) -> Option<InstanceId> { self.ids.get(custom_index).copied().flatten() }

    pub fn geometry(&self, custom_index: usize) -> Option<&Arc<GeometryRecord<D>>> { self.geometries.get(custom_index)?.as_ref() }
}

/// Owner of the live instances and publisher of their acceleration structures
pub struct SceneAccelerationIndex<D: Device>
{
    device: Arc<D>,

    live: Vec<(InstanceId, Instance<D>)>,
    positions: IntMap<InstanceId, usize>,
    next_id: u64,

    published: ArcSwap<SceneSnapshot<D>>,
}

impl<D: Device> SceneAccelerationIndex<D>
{
    /// Creates an empty index. The placeholder snapshot is built immediately
    pub fn new(device: Arc<D>) -> Result<Self>
    {
        let snapshot: SceneSnapshot<D> = SceneSnapshot::build(device.as_ref(), std::iter::empty())?;

        Ok(Self {
            device,
            live: Vec::new(),
            positions: IntMap::default(),
            next_id: 0,
            published: ArcSwap::from_pointee(snapshot),
        })
    }

    pub fn device(&self) -> &Arc<D> { &self.device }

    pub fn add(&mut self, geometry: Arc<GeometryRecord<D>>, transform: Transform, material: Material) -> InstanceId
    {
        self.insert(Instance::new(geometry, transform, material))
    }

    pub fn insert(&mut self, instance: Instance<D>) -> InstanceId
    {
        let id: InstanceId = InstanceId(self.next_id);
        self.next_id += 1;

        self.positions.insert(id, self.live.len());
        self.live.push((id, instance));
        id
    }

    /// Drops an instance from the live set, keeping the order of the others
    pub fn remove(&mut self, id: InstanceId) -> Option<Instance<D>>
    {
        let position: usize = self.positions.remove(&id)?;
        let (_, instance) = self.live.remove(position);

        for (index, (live_id, _)) in self.live.iter().enumerate().skip(position)
        {
            self.positions.insert(*live_id, index);
        }

        Some(instance)
    }

    pub fn instance(&self, id: InstanceId) -> Option<&Instance<D>> { self.positions.get(&id).map(|&position| &self.live[position].1) }

    /// Edits become visible to readers after the next [`Self::update`]
    pub fn instance_mut(&mut self, id: InstanceId) -> Option<&mut Instance<D>>
    {
        let position: usize = *self.positions.get(&id)?;
        Some(&mut self.live[position].1)
    }

    pub fn instances(&self) -> impl Iterator<Item = (InstanceId, &Instance<D>)> { self.live.iter().map(|(id, instance)| (*id, instance)) }

    pub fn len(&self) -> usize { self.live.len() }

    pub fn is_empty(&self) -> bool { self.live.is_empty() }

    /// Rebuilds from the live set and publishes the result. On failure the previous snapshot stays published
    pub fn update(&mut self) -> Result<()>
    {
        let timer: Instant = Instant::now();

        let snapshot: SceneSnapshot<D> = SceneSnapshot::build(self.device.as_ref(), self.live.iter().map(|(id, instance)| (Some(*id), instance)))
            .inspect_err(|error| warn!("Scene update failed, keeping previous snapshot: {error}"))?;

        info!("Scene update - {} instances: \t{:?}", self.live.len(), timer.elapsed());
        self.publish(snapshot);
        Ok(())
    }

    /// Replaces the live set with `instances` and publishes their snapshot.
    /// On failure neither the live set nor the published snapshot change
    pub fn rebuild(&mut self, instances: Vec<Instance<D>>) -> Result<Vec<InstanceId>>
    {
        let timer: Instant = Instant::now();

        let ids: Vec<InstanceId> = (0..instances.len() as u64).map(|offset| InstanceId(self.next_id + offset)).collect();
        let snapshot: SceneSnapshot<D> = SceneSnapshot::build(self.device.as_ref(), ids.iter().map(|&id| Some(id)).zip(&instances))
            .inspect_err(|error| warn!("Scene rebuild failed, keeping previous snapshot: {error}"))?;

        self.next_id += instances.len() as u64;
        self.live = ids.iter().copied().zip(instances).collect();
        self.positions = ids.iter().enumerate().map(|(position, &id)| (id, position)).collect();

        info!("Scene rebuild - {} instances: \t{:?}", self.live.len(), timer.elapsed());
        self.publish(snapshot);
        Ok(ids)
    }

    fn publish(&self, snapshot: SceneSnapshot<D>)
    {
        debug!("Publishing scene snapshot ({:?}, {} records)", snapshot.state(), snapshot.len());
        self.published.store(Arc::new(snapshot));
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<SceneSnapshot<D>> { self.published.load_full() }

    pub fn state(&self) -> SceneState { self.published.load().state() }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::device::cpu::CpuDevice;
    use crate::error::Error;
    use crate::scene::geometry::tests::quad;

    fn index_with_geometry(device: CpuDevice) -> (SceneAccelerationIndex<CpuDevice>, Arc<GeometryRecord<CpuDevice>>)
    {
        let device: Arc<CpuDevice> = Arc::new(device);
        let geometry: Arc<GeometryRecord<CpuDevice>> = Arc::new(GeometryRecord::new(device.as_ref(), &quad()).unwrap());

        (SceneAccelerationIndex::new(device).unwrap(), geometry)
    }

    #[test]
    fn new_index_publishes_placeholder()
    {
        let (index, _) = index_with_geometry(CpuDevice::new());
        let snapshot: Arc<SceneSnapshot<CpuDevice>> = index.snapshot();

        assert_eq!(index.state(), SceneState::Empty);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.records()[0].acceleration_structure_reference, 0);
        assert_eq!(snapshot.records()[0].transform, InstanceRecord::IDENTITY_TRANSFORM);
        assert_eq!(snapshot.descriptions()[0], ObjectDescription::default());
        assert_eq!(snapshot.materials()[0], Material::default());
        assert_eq!(snapshot.instance_id(0), None);
        assert!(snapshot.geometry(0).is_none());
    }

    #[test]
    fn tables_stay_parallel()
    {
        let (mut index, geometry) = index_with_geometry(CpuDevice::new());

        let red: Material = Material::diffuse(glam::Vec3::X);
        let first: InstanceId = index.add(geometry.clone(), Transform::default(), Material::default());
        let second: InstanceId = index.add(geometry.clone(), Transform::new(glam::Vec3::new(0.0, 0.0, -5.0)), red);
        index.update().unwrap();

        let snapshot: Arc<SceneSnapshot<CpuDevice>> = index.snapshot();
        assert_eq!(snapshot.state(), SceneState::Populated);
        assert_eq!(snapshot.len(), 2);

        for (i, record) in snapshot.records().iter().enumerate()
        {
            assert_eq!(record.custom_index(), i as u32);
            assert_eq!(record.mask(), INSTANCE_MASK);
            assert_eq!(record.acceleration_structure_reference, geometry.bounds_index_address());
            assert_eq!(snapshot.descriptions()[i], geometry.description());
        }

        assert_eq!(snapshot.instance_id(0), Some(first));
        assert_eq!(snapshot.instance_id(1), Some(second));
        assert_eq!(snapshot.materials()[1], red);
        assert_eq!(snapshot.records()[1].transform[11], -5.0);
        assert_eq!(snapshot.top_level().instance_count(), Some(2));
    }

    #[test]
    fn edits_are_invisible_until_update()
    {
        let (mut index, geometry) = index_with_geometry(CpuDevice::new());
        let id: InstanceId = index.add(geometry, Transform::default(), Material::default());
        index.update().unwrap();

        let before: Arc<SceneSnapshot<CpuDevice>> = index.snapshot();
        index.instance_mut(id).unwrap().transform.translate(glam::Vec3::X);
        assert_eq!(index.snapshot().records()[0].transform[3], 0.0);

        index.update().unwrap();
        assert_eq!(index.snapshot().records()[0].transform[3], 1.0);
        assert_eq!(before.records()[0].transform[3], 0.0);
    }

    #[test]
    fn remove_keeps_order_of_remaining_instances()
    {
        let (mut index, geometry) = index_with_geometry(CpuDevice::new());
        let ids: Vec<InstanceId> = (0..4)
            .map(|i| index.add(geometry.clone(), Transform::new(glam::Vec3::splat(i as f32)), Material::default()))
            .collect();

        assert!(index.remove(ids[1]).is_some());
        assert!(index.remove(ids[1]).is_none());
        assert_eq!(index.len(), 3);
        assert_eq!(index.instance(ids[3]).unwrap().transform.position, glam::Vec3::splat(3.0));

        index.update().unwrap();
        let snapshot: Arc<SceneSnapshot<CpuDevice>> = index.snapshot();
        let order: Vec<Option<InstanceId>> = (0..snapshot.len()).map(|i| snapshot.instance_id(i)).collect();
        assert_eq!(order, vec![Some(ids[0]), Some(ids[2]), Some(ids[3])]);

        for id in [ids[0], ids[2], ids[3]]
        {
            index.remove(id);
        }
        index.update().unwrap();
        assert_eq!(index.state(), SceneState::Empty);
    }

    #[test]
    fn rebuild_replaces_live_set()
    {
        let (mut index, geometry) = index_with_geometry(CpuDevice::new());
        let old: InstanceId = index.add(geometry.clone(), Transform::default(), Material::default());

        let instance: Instance<CpuDevice> = Instance::new(geometry, Transform::default(), Material::default());
        let ids: Vec<InstanceId> = index.rebuild(vec![instance.clone(), instance]).unwrap();

        assert_eq!(ids.len(), 2);
        assert!(index.instance(old).is_none());
        assert!(ids.iter().all(|&id| id != old));
        assert_eq!(index.snapshot().len(), 2);

        index.rebuild(Vec::new()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.state(), SceneState::Empty);
    }

    #[test]
    fn failed_update_keeps_previous_snapshot()
    {
        let (mut index, geometry) = index_with_geometry(CpuDevice::with_memory_budget(2000));
        index.add(geometry.clone(), Transform::default(), Material::default());
        index.update().unwrap();

        for _ in 0..100
        {
            index.add(geometry.clone(), Transform::default(), Material::default());
        }

        assert!(matches!(index.update(), Err(Error::Device(DeviceError::OutOfMemory { .. }))));
        assert_eq!(index.snapshot().len(), 1);
        assert_eq!(index.state(), SceneState::Populated);
    }
}
