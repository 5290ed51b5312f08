use std::time::Instant;

use bumpalo::Bump;
use id_arena::{Arena, Id};
use log::debug;
use rayon::prelude::*;

use primitive::{HitInfo, Triangle};

use crate::device::cpu::blas::blas_bvh::boundingbox::{HasBox, AABB};
use crate::device::cpu::blas::blas_bvh::{BLASBuild, BLASNode, BLASNodeType, TriangleBounds};
use crate::ray::Ray;
use crate::utility::EPSILON;

#[macro_use]
pub mod blas_bvh;
pub mod primitive;

pub(crate) type TraversalStack<'b, N> = bumpalo::collections::Vec<'b, (Id<N>, f32)>;

/// Pushes the children hit by the ray so that the nearest one is popped first
pub(crate) fn push_to_stack<N>(r: &Ray, t_max: f32, stack: &mut TraversalStack<'_, N>, arena: &Arena<N>, left: Id<N>, right: Id<N>)
where
    N: HasBox,
{
    let intersect_left = arena[left].get_box().intersect_t(r, t_max);
    let intersect_right = arena[right].get_box().intersect_t(r, t_max);

    if let (Some(t_enter_left), Some(t_enter_right)) = (intersect_left, intersect_right)
    {
        stack.reserve(2);
        if t_enter_left < t_enter_right
        {
            stack.push((right, t_enter_right));
            stack.push((left, t_enter_left));
        }
        else
        {
            stack.push((left, t_enter_left));
            stack.push((right, t_enter_right));
        }
    }
    else if let Some(t_enter_left) = intersect_left
    {
        stack.push((left, t_enter_left));
    }
    else if let Some(t_enter_right) = intersect_right
    {
        stack.push((right, t_enter_right));
    }
}

/// Bottom-level structure: a BVH over the triangles of one mesh, in object space
pub struct BottomLevel
{
    triangles: Vec<Triangle>,
    //Leaves reference contiguous ranges of this list
    primitive_order: Vec<u32>,
    root_id: Option<Id<BLASNode>>,
    blas_node_arena: Arena<BLASNode>,
    bounding_box: AABB,
}

impl BottomLevel
{
    /// Builds over `triangles`, hit results report positions in this list
    pub fn new(triangles: Vec<Triangle>) -> Self
    {
        let timer: Instant = Instant::now();

        let mut bounds: Vec<TriangleBounds> = triangles
            .par_iter()
            .enumerate()
            .map(|(i, t): (usize, &Triangle)| TriangleBounds::new(t.create_bounding_box(), i as u32))
            .collect();

        let BLASBuild {
            nodes,
            root,
            primitive_order,
        } = BLASBuild::new(&mut bounds);

        let bounding_box: AABB = root.map_or_else(AABB::identity, |id| nodes[id].bounding_box);

        debug!(
            "BLAS - {} triangles, {} nodes: \t{:?}",
            triangles.len(),
            nodes.len(),
            timer.elapsed()
        );

        Self {
            triangles,
            primitive_order,
            root_id: root,
            blas_node_arena: nodes,
            bounding_box,
        }
    }

    pub fn primitive_count(&self) -> usize { self.triangles.len() }

    pub fn node_count(&self) -> usize { self.blas_node_arena.len() }

    pub fn bounding_box(&self) -> AABB { self.bounding_box }

    /// Closest hit in object space, with the index of the intersected triangle
    pub fn intersect(&self, bump: &Bump, r: &Ray, mut t_max: f32) -> Option<(HitInfo, usize)>
    {
        let root: Id<BLASNode> = self.root_id?;
        let t_root: f32 = self.blas_node_arena[root].bounding_box.intersect_t(r, t_max)?;

        let mut stack: TraversalStack<BLASNode> = bumpalo::collections::Vec::new_in(bump);
        stack.push((root, t_root));
        let mut closest: Option<(HitInfo, usize)> = None;

        while let Some((current, t_enter)) = stack.pop()
        {
            if t_enter > t_max
            {
                continue;
            }

            match &self.blas_node_arena[current].node_type
            {
                BLASNodeType::Branch { left, right } => push_to_stack(r, t_max, &mut stack, &self.blas_node_arena, *left, *right),
                BLASNodeType::Leaf { first, count } =>
                {
                    for &primitive in &self.primitive_order[*first as usize..(*first + *count) as usize]
                    {
                        if let Some(intersection) = self.triangles[primitive as usize].intersect(r, EPSILON, t_max)
                        {
                            t_max = intersection.t;
                            closest = Some((intersection, primitive as usize));
                        }
                    }
                }
            }
        }

        closest
    }
}
