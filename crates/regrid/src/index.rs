//! Nearest-within-box queries over scattered sample positions.

use glam::Vec3;
use rstar::primitives::GeomWithData;
use rstar::{RTree, AABB};

/// Axis-aligned query box, inclusive on all faces.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchBox {
    pub center: Vec3,
    pub half_extent: Vec3,
}

impl SearchBox {
    pub fn new(center: Vec3, half_extent: Vec3) -> Self {
        Self {
            center,
            half_extent,
        }
    }

    #[inline]
    pub fn contains(&self, p: Vec3) -> bool {
        (p - self.center).abs().cmple(self.half_extent).all()
    }

    /// Envelope for the tree query, padded so faces survive rounding.
    /// Candidates are re-checked with [`contains`](Self::contains).
    fn envelope(&self) -> AABB<[f32; 3]> {
        let slack = (self.center.abs() + self.half_extent) * (4.0 * f32::EPSILON);
        let reach = self.half_extent + slack;
        AABB::from_corners(
            (self.center - reach).to_array(),
            (self.center + reach).to_array(),
        )
    }
}

/// Tree entry: position plus the slot it came from.
type Entry = GeomWithData<[f32; 3], usize>;

/// Immutable spatial index over sample positions.
///
/// Bulk-loaded once into a packed R-tree; each entry keeps the caller's
/// sample id so lookups can be mapped back to the physical variable arrays.
/// Coincident and coplanar positions (2-D data, lattices, duplicates) are
/// fine. Empty indices are allowed and answer every query with `None`.
pub struct SpatialIndex {
    tree: RTree<Entry>,
    positions: Vec<Vec3>,
    ids: Vec<usize>,
}

impl SpatialIndex {
    /// Build from `(position, sample id)` pairs.
    pub fn build(points: &[(Vec3, usize)]) -> Self {
        let entries: Vec<Entry> = points
            .iter()
            .enumerate()
            .map(|(slot, (p, _))| GeomWithData::new(p.to_array(), slot))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
            positions: points.iter().map(|(p, _)| *p).collect(),
            ids: points.iter().map(|(_, id)| *id).collect(),
        }
    }

    /// Build with sample ids equal to slice positions.
    pub fn from_positions(positions: &[Vec3]) -> Self {
        let pairs: Vec<(Vec3, usize)> = positions.iter().copied().zip(0..).collect();
        Self::build(&pairs)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Largest sample id stored, if any.
    pub fn max_id(&self) -> Option<usize> {
        self.ids.iter().copied().max()
    }

    /// Nearest sample whose position also lies inside `search`.
    ///
    /// Returns the sample id. Among equidistant candidates the winner is
    /// whichever the tree reports first.
    pub fn nearest_within(&self, target: Vec3, search: &SearchBox) -> Option<usize> {
        // Fast path: the global nearest is usually inside the box.
        let nearest = self.tree.nearest_neighbor(&target.to_array())?;
        if search.contains(self.positions[nearest.data]) {
            return Some(self.ids[nearest.data]);
        }

        self.tree
            .locate_in_envelope(&search.envelope())
            .map(|entry| entry.data)
            .filter(|&slot| search.contains(self.positions[slot]))
            .map(|slot| (slot, self.positions[slot].distance_squared(target)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(slot, _)| self.ids[slot])
    }
}
