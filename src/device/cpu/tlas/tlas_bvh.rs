use ambassador::Delegate;
use id_arena::{Arena, Id};

use crate::device::cpu::blas::blas_bvh::boundingbox::{surrounding_box, HasBox, AABB};
use crate::utility::INFINITY;

pub(crate) enum TLASNodeType
{
    Leaf
    {
        instance_index: usize
    },
    Branch
    {
        left: Id<TLASNode>, right: Id<TLASNode>
    },
}

#[derive(Delegate)]
#[delegate(HasBox, target = "bounding_box")]
pub(crate) struct TLASNode
{
    pub bounding_box: AABB,
    pub node_type: TLASNodeType,
}

impl TLASNode
{
    fn find_best_match(tlas_arena: &Arena<Self>, nodes: &[Id<Self>], a_index: usize) -> usize
    {
        let a: &AABB = &tlas_arena[nodes[a_index]].bounding_box;

        let mut best_sa: f32 = INFINITY;
        let mut best_index: usize = usize::MAX;

        for (i, &node) in nodes.iter().enumerate()
        {
            if i == a_index
            {
                continue;
            }

            let bounding_box: AABB = surrounding_box(a, &tlas_arena[node].bounding_box);
            let sa: f32 = bounding_box.surface_area();

            if sa < best_sa || best_index == usize::MAX
            {
                best_index = i;
                best_sa = sa;
            }
        }

        best_index
    }

    /// Agglomerative clustering of instance bounds (Walter et al.), pairing mutual nearest neighbours
    /// until a single root remains. `leaves` holds world-space bounds and instance indices.
    pub fn generate_tlas(tlas_arena: &mut Arena<Self>, leaves: &[(AABB, usize)]) -> Option<Id<Self>>
    {
        let mut nodes: Vec<Id<Self>> = leaves
            .iter()
            .map(|&(bounding_box, instance_index)| {
                tlas_arena.alloc(Self {
                    bounding_box,
                    node_type: TLASNodeType::Leaf { instance_index },
                })
            })
            .collect();

        if nodes.len() <= 1
        {
            return nodes.pop();
        }

        let mut a: usize = 0;
        let mut b: usize = Self::find_best_match(tlas_arena, &nodes, a);

        while nodes.len() > 1
        {
            let c: usize = Self::find_best_match(tlas_arena, &nodes, b);
            if a == c
            {
                let (node_1, node_2): (Id<Self>, Id<Self>) = if a > b
                {
                    (nodes.swap_remove(a), nodes.swap_remove(b))
                }
                else
                {
                    (nodes.swap_remove(b), nodes.swap_remove(a))
                };

                a = nodes.len();
                nodes.push(tlas_arena.alloc(Self {
                    bounding_box: surrounding_box(&tlas_arena[node_1].bounding_box, &tlas_arena[node_2].bounding_box),
                    node_type: TLASNodeType::Branch { left: node_1, right: node_2 },
                }));

                if nodes.len() > 1
                {
                    b = Self::find_best_match(tlas_arena, &nodes, a);
                }
            }
            else
            {
                a = b;
                b = c;
            }
        }

        nodes.pop()
    }
}
