use ambassador::Delegate;
use id_arena::{Arena, Id};

use crate::device::cpu::blas::blas_bvh::boundingbox::{surrounding_box, HasBox, AABB};

#[macro_use]
pub mod boundingbox;

const BUCKET_COUNT: usize = 12;
const MAX_LEAF_SIZE: usize = 4;

//Relative to the cost of one triangle test
const TRAVERSAL_COST: f32 = 0.125;

/// Bounds of one triangle of the index buffer, with the triangle's position in that buffer
#[derive(Copy, Clone, Debug)]
pub(crate) struct TriangleBounds
{
    bounding_box: AABB,
    centroid: glam::Vec3A,
    primitive: u32,
}

impl TriangleBounds
{
    pub fn new(bounding_box: AABB, primitive: u32) -> Self
    {
        Self {
            bounding_box,
            centroid: 0.5 * (bounding_box.minimum() + bounding_box.maximum()),
            primitive,
        }
    }
}

fn bounds_of(triangles: &[TriangleBounds]) -> AABB
{
    triangles
        .iter()
        .fold(AABB::identity(), |a: AABB, b: &TriangleBounds| surrounding_box(&a, &b.bounding_box))
}

fn centroid_bounds_of(triangles: &[TriangleBounds]) -> AABB
{
    triangles
        .iter()
        .fold(AABB::identity(), |a: AABB, b: &TriangleBounds| surrounding_box(&a, &AABB::new(b.centroid, b.centroid)))
}

#[derive(Copy, Clone)]
struct Bucket
{
    count: usize,
    bounding_box: AABB,
}

impl Bucket
{
    fn empty() -> Self
    {
        Self {
            count: 0,
            bounding_box: AABB::identity(),
        }
    }

    fn merge(self, other: &Bucket) -> Self
    {
        Self {
            count: self.count + other.count,
            bounding_box: surrounding_box(&self.bounding_box, &other.bounding_box),
        }
    }

    //Empty buckets contribute nothing, their identity box has infinite area
    fn weighted_area(&self) -> f32
    {
        if self.count == 0
        {
            0.0
        }
        else
        {
            self.count as f32 * self.bounding_box.surface_area()
        }
    }
}

pub(crate) enum BLASNodeType
{
    /// Range into the ordered primitive list of the structure
    Leaf
    {
        first: u32, count: u32
    },
    Branch
    {
        left: Id<BLASNode>, right: Id<BLASNode>
    },
}

#[derive(Delegate)]
#[delegate(HasBox, target = "bounding_box")]
pub(crate) struct BLASNode
{
    pub(crate) bounding_box: AABB,
    pub(crate) node_type: BLASNodeType,
}

/// Output of a build: node arena, root and the primitive indices in leaf order
pub(crate) struct BLASBuild
{
    pub(crate) nodes: Arena<BLASNode>,
    pub(crate) root: Option<Id<BLASNode>>,
    pub(crate) primitive_order: Vec<u32>,
}

impl BLASBuild
{
    pub(crate) fn new(triangles: &mut [TriangleBounds]) -> Self
    {
        let mut build: BLASBuild = Self {
            nodes: Arena::new(),
            root: None,
            primitive_order: Vec::with_capacity(triangles.len()),
        };

        if !triangles.is_empty()
        {
            build.root = Some(build.node(triangles));
        }
        build
    }

    fn leaf(&mut self, bounding_box: AABB, triangles: &[TriangleBounds]) -> Id<BLASNode>
    {
        let first: u32 = self.primitive_order.len() as u32;
        self.primitive_order.extend(triangles.iter().map(|t| t.primitive));

        self.nodes.alloc(BLASNode {
            bounding_box,
            node_type: BLASNodeType::Leaf {
                first,
                count: triangles.len() as u32,
            },
        })
    }

    /// Splits on the centroid extent, with SAH over fixed buckets once the node is large enough
    fn node(&mut self, triangles: &mut [TriangleBounds]) -> Id<BLASNode>
    {
        let bounding_box: AABB = bounds_of(triangles);
        let centroid_bounds: AABB = centroid_bounds_of(triangles);

        let axis: usize = centroid_bounds.longest_axis() as usize;
        let low: f32 = centroid_bounds.minimum()[axis];
        let extent: f32 = centroid_bounds.length()[axis];

        //Coincident centroids cannot be separated
        if triangles.len() == 1 || extent <= 0.0
        {
            return self.leaf(bounding_box, triangles);
        }

        let split: usize = if triangles.len() <= 2
        {
            glidesort::sort_by(triangles, |a, b| a.centroid[axis].total_cmp(&b.centroid[axis]));
            triangles.len() / 2
        }
        else
        {
            let bucket_of = |t: &TriangleBounds| -> usize { (((t.centroid[axis] - low) / extent * BUCKET_COUNT as f32) as usize).min(BUCKET_COUNT - 1) };

            let mut buckets: [Bucket; BUCKET_COUNT] = [Bucket::empty(); BUCKET_COUNT];
            for t in triangles.iter()
            {
                let bucket: &mut Bucket = &mut buckets[bucket_of(t)];
                bucket.count += 1;
                bucket.bounding_box = surrounding_box(&bucket.bounding_box, &t.bounding_box);
            }

            let inv_area: f32 = 1.0 / bounding_box.surface_area().max(f32::MIN_POSITIVE);
            let (best_bucket, best_cost): (usize, f32) = (0..BUCKET_COUNT - 1)
                .map(|i: usize| {
                    let below: Bucket = buckets[..=i].iter().fold(Bucket::empty(), Bucket::merge);
                    let above: Bucket = buckets[i + 1..].iter().fold(Bucket::empty(), Bucket::merge);

                    (i, TRAVERSAL_COST + (below.weighted_area() + above.weighted_area()) * inv_area)
                })
                .min_by(|a, b| a.1.total_cmp(&b.1))
                .unwrap_or((BUCKET_COUNT / 2, f32::INFINITY));

            let leaf_cost: f32 = triangles.len() as f32;
            if triangles.len() <= MAX_LEAF_SIZE && leaf_cost <= best_cost
            {
                return self.leaf(bounding_box, triangles);
            }

            //The lowest and highest centroids land in the first and last bucket, both sides are non-empty
            glidesort::sort_by(triangles, |a, b| bucket_of(a).cmp(&bucket_of(b)));
            triangles.partition_point(|t| bucket_of(t) <= best_bucket)
        };

        let (below, above): (&mut [TriangleBounds], &mut [TriangleBounds]) = triangles.split_at_mut(split);
        let left: Id<BLASNode> = self.node(below);
        let right: Id<BLASNode> = self.node(above);

        self.nodes.alloc(BLASNode {
            bounding_box,
            node_type: BLASNodeType::Branch { left, right },
        })
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn point_bounds(points: &[f32]) -> Vec<TriangleBounds>
    {
        points
            .iter()
            .enumerate()
            .map(|(i, &x)| {
                let p: glam::Vec3A = glam::Vec3A::new(x, 0.0, 0.0);
                TriangleBounds::new(AABB::new(p, p + glam::Vec3A::splat(0.1)), i as u32)
            })
            .collect()
    }

    #[test]
    fn every_primitive_lands_in_exactly_one_leaf()
    {
        let mut triangles: Vec<TriangleBounds> = point_bounds(&(0..97).map(|i| ((i * 37) % 97) as f32).collect::<Vec<f32>>());
        let build: BLASBuild = BLASBuild::new(&mut triangles);

        let mut order: Vec<u32> = build.primitive_order.clone();
        order.sort_unstable();
        assert_eq!(order, (0..97).collect::<Vec<u32>>());

        let leaf_total: u32 = build
            .nodes
            .iter()
            .filter_map(|(_, node)| match node.node_type
            {
                BLASNodeType::Leaf { count, .. } => Some(count),
                BLASNodeType::Branch { .. } => None,
            })
            .sum();
        assert_eq!(leaf_total, 97);
    }

    #[test]
    fn coincident_centroids_make_one_leaf()
    {
        let mut triangles: Vec<TriangleBounds> = point_bounds(&[2.0; 9]);
        let build: BLASBuild = BLASBuild::new(&mut triangles);

        assert_eq!(build.nodes.len(), 1);
        assert!(matches!(build.nodes[build.root.unwrap()].node_type, BLASNodeType::Leaf { first: 0, count: 9 }));
    }

    #[test]
    fn spread_primitives_are_split()
    {
        let mut triangles: Vec<TriangleBounds> = point_bounds(&[0.0, 10.0]);
        let build: BLASBuild = BLASBuild::new(&mut triangles);

        assert_eq!(build.nodes.len(), 3);
        assert!(matches!(build.nodes[build.root.unwrap()].node_type, BLASNodeType::Branch { .. }));
    }

    #[test]
    fn nothing_to_build()
    {
        let build: BLASBuild = BLASBuild::new(&mut []);

        assert!(build.root.is_none());
        assert!(build.primitive_order.is_empty());
    }
}
