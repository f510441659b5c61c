//! The broad-phase sort key.
//!
//! A [`DistanceIndex`] pairs an entity index with its squared distance
//! from the origin. Sorting a group by this key and sliding a window over
//! it is the next best thing to space partitioning: two entities whose
//! keys differ by more than `radius²` cannot be within `radius` of each
//! other *along the radial direction*, but entities on opposite sides of
//! the origin share keys without being close. The key can therefore both
//! over- and under-admit candidate pairs compared to a real spatial index.

use std::cmp::Ordering;

use glam::Vec3;

/// Squared distance from the origin together with the entity it belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DistanceIndex {
    /// Squared length of the entity's position.
    pub distance: f32,
    /// Index of the entity within its group.
    pub index: u32,
}

impl DistanceIndex {
    /// Key for the entity at `index` located at `position`.
    pub fn new(position: Vec3, index: u32) -> Self {
        Self {
            distance: position.length_squared(),
            index,
        }
    }

    /// Ascending order by distance. NaN keys sort last.
    pub fn ascending(a: &Self, b: &Self) -> Ordering {
        a.distance.total_cmp(&b.distance)
    }

    /// Descending order by distance.
    pub fn descending(a: &Self, b: &Self) -> Ordering {
        b.distance.total_cmp(&a.distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_squared_length() {
        let d = DistanceIndex::new(Vec3::new(3.0, 4.0, 0.0), 7);
        assert_eq!(d.distance, 25.0);
        assert_eq!(d.index, 7);
    }

    #[test]
    fn ascending_and_descending_are_mirrors() {
        let near = DistanceIndex::new(Vec3::X, 0);
        let far = DistanceIndex::new(Vec3::X * 2.0, 1);
        assert_eq!(DistanceIndex::ascending(&near, &far), Ordering::Less);
        assert_eq!(DistanceIndex::descending(&near, &far), Ordering::Greater);
    }
}
