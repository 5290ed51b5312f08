use std::sync::Arc;
use std::time::Instant;

use bumpalo::Bump;
use id_arena::{Arena, Id};
use log::debug;

use tlas_bvh::{TLASNode, TLASNodeType};

use crate::device::cpu::blas::blas_bvh::boundingbox::AABB;
use crate::device::cpu::blas::primitive::HitInfo;
use crate::device::cpu::blas::{push_to_stack, BottomLevel, TraversalStack};
use crate::device::InstanceRecord;
use crate::ray::Ray;

mod tlas_bvh;

/// Instance of a bottom-level structure as resolved at build time
pub(crate) struct TlasInstance
{
    pub record: InstanceRecord,
    pub blas: Option<Arc<BottomLevel>>,
}

/// Closest intersection reported by a top-level traversal
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TraceHit
{
    pub t: f32,
    /// Barycentric coordinates of the hit on the triangle
    pub barycentrics: glam::Vec2,
    /// Position of the instance in the instance buffer
    pub instance_index: usize,
    /// Custom index stored in the instance record
    pub instance_custom_index: u32,
    pub primitive_index: usize,
}

struct Placement
{
    record: InstanceRecord,
    blas: Arc<BottomLevel>,
    inv_matrix: glam::Affine3A,
}

/// Top-level structure: a BVH over world-space instance bounds.
/// Null instances and instances of empty bottom-level structures are kept in the instance list but never hit.
pub struct TopLevel
{
    instance_count: usize,
    placements: Vec<Option<Placement>>,
    root_id: Option<Id<TLASNode>>,
    tlas_arena: Arena<TLASNode>,
}

impl TopLevel
{
    pub(crate) fn new(instances: Vec<TlasInstance>) -> Self
    {
        let timer: Instant = Instant::now();
        let instance_count: usize = instances.len();

        let placements: Vec<Option<Placement>> = instances
            .into_iter()
            .map(|instance: TlasInstance| {
                let blas: Arc<BottomLevel> = instance.blas.filter(|blas| blas.primitive_count() > 0)?;
                let matrix: glam::Affine3A = instance.record.affine();

                (matrix.matrix3.determinant().abs() > f32::EPSILON).then(|| Placement {
                    record: instance.record,
                    inv_matrix: matrix.inverse(),
                    blas,
                })
            })
            .collect();

        let leaves: Vec<(AABB, usize)> = placements
            .iter()
            .enumerate()
            .filter_map(|(index, placement)| {
                let placement: &Placement = placement.as_ref()?;
                Some((placement.blas.bounding_box().transform(&placement.record.affine()), index))
            })
            .collect();

        let mut tlas_arena: Arena<TLASNode> = Arena::new();
        let root_id: Option<Id<TLASNode>> = TLASNode::generate_tlas(&mut tlas_arena, &leaves);

        debug!("TLAS - {} instances ({} traceable): \t{:?}", instance_count, leaves.len(), timer.elapsed());

        Self {
            instance_count,
            placements,
            root_id,
            tlas_arena,
        }
    }

    /// Number of instance records the structure was built from, null instances included
    pub fn instance_count(&self) -> usize { self.instance_count }

    /// Closest hit among instances whose visibility mask shares a bit with `cull_mask`
    pub fn trace(&self, bump: &Bump, r: &Ray, mut t_max: f32, cull_mask: u8) -> Option<TraceHit>
    {
        let root: Id<TLASNode> = self.root_id?;
        let t_root: f32 = self.tlas_arena[root].bounding_box.intersect_t(r, t_max)?;

        let mut stack: TraversalStack<TLASNode> = bumpalo::collections::Vec::new_in(bump);
        stack.push((root, t_root));

        let mut closest: Option<TraceHit> = None;

        while let Some((current, t_enter)) = stack.pop()
        {
            if t_enter > t_max
            {
                continue;
            }

            match &self.tlas_arena[current].node_type
            {
                TLASNodeType::Branch { left, right } => push_to_stack(r, t_max, &mut stack, &self.tlas_arena, *left, *right),
                TLASNodeType::Leaf { instance_index } =>
                {
                    let Some(placement) = &self.placements[*instance_index] else { continue };

                    if placement.record.mask() & cull_mask == 0
                    {
                        continue;
                    }

                    let object_ray: Ray = r.transform(&placement.inv_matrix);
                    if let Some((hit_info, primitive_index)) = placement.blas.intersect(bump, &object_ray, t_max)
                    {
                        let HitInfo { local, t } = hit_info;
                        t_max = t;
                        closest = Some(TraceHit {
                            t,
                            barycentrics: local,
                            instance_index: *instance_index,
                            instance_custom_index: placement.record.custom_index(),
                            primitive_index,
                        });
                    }
                }
            }
        }

        closest
    }
}
