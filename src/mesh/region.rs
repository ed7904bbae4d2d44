//! Named vertex subsets that survive destructive mesh edits.
//!
//! A [`RegionTracker`] maps tags to vertex sets. Ids are never assumed to
//! survive an edit: every operation that rebuilds or renumbers vertices
//! hands back a map (or provenance) and the tracker is carried forward
//! through it, or the tags are re-derived geometrically from a
//! [`TagPositions`] snapshot.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

use super::{FaceId, Mesh, VertexId};
use crate::error::{Result, SelectionError};
use crate::math::spatial::PointGrid;
use crate::math::Point3;

/// An explicit set of vertices passed to an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection(BTreeSet<VertexId>);

impl Selection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every vertex of `mesh`.
    #[must_use]
    pub fn all(mesh: &Mesh) -> Self {
        mesh.vertex_ids().into_iter().collect()
    }

    pub fn insert(&mut self, v: VertexId) -> bool {
        self.0.insert(v)
    }

    pub fn remove(&mut self, v: VertexId) -> bool {
        self.0.remove(&v)
    }

    #[must_use]
    pub fn contains(&self, v: VertexId) -> bool {
        self.0.contains(&v)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.0.iter().copied()
    }

    #[must_use]
    pub fn union(&self, other: &Selection) -> Selection {
        Selection(self.0.union(&other.0).copied().collect())
    }

    #[must_use]
    pub fn intersection(&self, other: &Selection) -> Selection {
        Selection(self.0.intersection(&other.0).copied().collect())
    }

    #[must_use]
    pub fn difference(&self, other: &Selection) -> Selection {
        Selection(self.0.difference(&other.0).copied().collect())
    }

    /// Adds every vertex sharing a face with the selection.
    #[must_use]
    pub fn grow(&self, mesh: &Mesh) -> Selection {
        let mut out = self.clone();
        for (_, verts) in mesh.faces() {
            if verts.iter().any(|v| self.contains(*v)) {
                out.0.extend(verts.iter().copied());
            }
        }
        out
    }

    /// Faces whose vertices are all selected.
    #[must_use]
    pub fn faces(&self, mesh: &Mesh) -> Vec<FaceId> {
        mesh.faces()
            .filter(|(_, verts)| verts.iter().all(|v| self.contains(*v)))
            .map(|(f, _)| f)
            .collect()
    }

    /// Drops ids that no longer exist in `mesh`.
    pub fn retain_existing(&mut self, mesh: &Mesh) {
        self.0.retain(|v| mesh.contains_vertex(*v));
    }

    /// Positions of the selected vertices that still exist.
    #[must_use]
    pub fn points(&self, mesh: &Mesh) -> Vec<Point3> {
        self.iter().filter_map(|v| mesh.point(v).ok()).collect()
    }
}

impl FromIterator<VertexId> for Selection {
    fn from_iter<I: IntoIterator<Item = VertexId>>(iter: I) -> Self {
        Selection(iter.into_iter().collect())
    }
}

impl Extend<VertexId> for Selection {
    fn extend<I: IntoIterator<Item = VertexId>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

/// Tag member positions captured before an edit that renumbers vertices.
#[derive(Debug, Clone)]
pub struct TagPositions<T> {
    entries: BTreeMap<T, Vec<Point3>>,
}

/// Tag → vertex-set registry.
#[derive(Debug, Clone)]
pub struct RegionTracker<T> {
    tags: BTreeMap<T, Selection>,
}

impl<T> Default for RegionTracker<T> {
    fn default() -> Self {
        Self {
            tags: BTreeMap::new(),
        }
    }
}

impl<T: Ord + Copy + Display> RegionTracker<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tag with no members; existing members are kept.
    pub fn create(&mut self, tag: T) {
        self.tags.entry(tag).or_default();
    }

    /// Adds the selection to the tag's members.
    pub fn assign(&mut self, tag: T, selection: &Selection) {
        self.tags.entry(tag).or_default().extend(selection.iter());
    }

    /// Adds one vertex to the tag.
    pub fn assign_vertex(&mut self, tag: T, v: VertexId) {
        self.tags.entry(tag).or_default().insert(v);
    }

    /// Replaces the tag's members.
    pub fn set(&mut self, tag: T, selection: Selection) {
        self.tags.insert(tag, selection);
    }

    /// Current members of the tag. A missing or emptied tag yields an empty
    /// selection, so operations driven by it become no-ops.
    #[must_use]
    pub fn select(&self, tag: T) -> Selection {
        self.tags.get(&tag).cloned().unwrap_or_default()
    }

    /// Members of the tag, which must not be empty.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::EmptyTag` if the tag is missing or empty.
    pub fn require(&self, tag: T) -> Result<Selection> {
        match self.tags.get(&tag) {
            Some(sel) if !sel.is_empty() => Ok(sel.clone()),
            _ => Err(SelectionError::EmptyTag(tag.to_string()).into()),
        }
    }

    #[must_use]
    pub fn contains(&self, tag: T) -> bool {
        self.tags.contains_key(&tag)
    }

    #[must_use]
    pub fn has(&self, tag: T, v: VertexId) -> bool {
        self.tags.get(&tag).is_some_and(|s| s.contains(v))
    }

    /// Removes the selected vertices from the tag.
    pub fn remove_from(&mut self, tag: T, selection: &Selection) {
        if let Some(sel) = self.tags.get_mut(&tag) {
            *sel = sel.difference(selection);
        }
    }

    #[must_use]
    pub fn union(&self, a: T, b: T) -> Selection {
        self.select(a).union(&self.select(b))
    }

    #[must_use]
    pub fn intersect(&self, a: T, b: T) -> Selection {
        self.select(a).intersection(&self.select(b))
    }

    #[must_use]
    pub fn subtract(&self, a: T, b: T) -> Selection {
        self.select(a).difference(&self.select(b))
    }

    /// Forgets a tag entirely.
    pub fn delete(&mut self, tag: T) {
        self.tags.remove(&tag);
    }

    /// Every tag, in order.
    pub fn tags(&self) -> impl Iterator<Item = T> + '_ {
        self.tags.keys().copied()
    }

    /// Tags a vertex belongs to.
    #[must_use]
    pub fn tags_of(&self, v: VertexId) -> Vec<T> {
        self.tags
            .iter()
            .filter(|(_, sel)| sel.contains(v))
            .map(|(t, _)| *t)
            .collect()
    }

    /// Drops members that were deleted from `mesh`.
    pub fn prune(&mut self, mesh: &Mesh) {
        for sel in self.tags.values_mut() {
            sel.retain_existing(mesh);
        }
    }

    /// Renumbers members through `map`; unmapped members are dropped.
    pub fn carry_forward(&mut self, map: &BTreeMap<VertexId, VertexId>) {
        for sel in self.tags.values_mut() {
            *sel = sel.iter().filter_map(|v| map.get(&v).copied()).collect();
        }
    }

    /// Adds the image of every member under `map`, keeping the originals.
    pub fn mirror(&mut self, map: &BTreeMap<VertexId, VertexId>) {
        for sel in self.tags.values_mut() {
            let images: Vec<VertexId> = sel.iter().filter_map(|v| map.get(&v).copied()).collect();
            sel.extend(images);
        }
    }

    /// Rebuilds every tag from vertex provenance: a new vertex belongs to a
    /// tag when all of its parent vertices did.
    pub fn carry_provenance(&mut self, provenance: &BTreeMap<VertexId, Vec<VertexId>>) {
        for sel in self.tags.values_mut() {
            *sel = provenance
                .iter()
                .filter(|(_, parents)| !parents.is_empty() && parents.iter().all(|p| sel.contains(*p)))
                .map(|(v, _)| *v)
                .collect();
        }
    }

    /// Captures member positions ahead of an edit that renumbers vertices.
    #[must_use]
    pub fn snapshot(&self, mesh: &Mesh) -> TagPositions<T> {
        TagPositions {
            entries: self
                .tags
                .iter()
                .map(|(t, sel)| (*t, sel.points(mesh)))
                .collect(),
        }
    }

    /// Re-derives every snapshotted tag as the vertices of `mesh` lying
    /// within `tolerance` of one of the tag's old positions.
    pub fn reassert_by_position(&mut self, mesh: &Mesh, snapshot: &TagPositions<T>, tolerance: f64) {
        let mut grid = PointGrid::new(tolerance * 4.0);
        for (v, p) in mesh.vertices() {
            grid.insert(*p, v);
        }
        for (tag, points) in &snapshot.entries {
            let sel: Selection = points
                .iter()
                .flat_map(|p| grid.within(p, tolerance))
                .map(|(_, v)| v)
                .collect();
            self.tags.insert(*tag, sel);
        }
    }

    /// Re-derives every snapshotted tag by giving each vertex of `mesh` the
    /// tags of the nearest snapshotted position.
    pub fn reassert_nearest(&mut self, mesh: &Mesh, snapshot: &TagPositions<T>, cell: f64) {
        let mut grid = PointGrid::new(cell);
        let mut owners: Vec<Vec<T>> = Vec::new();
        let mut index: BTreeMap<[u64; 3], usize> = BTreeMap::new();
        for (tag, points) in &snapshot.entries {
            for p in points {
                let key = [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()];
                let slot = *index.entry(key).or_insert_with(|| {
                    owners.push(Vec::new());
                    grid.insert(*p, owners.len() - 1);
                    owners.len() - 1
                });
                owners[slot].push(*tag);
            }
        }
        for tag in snapshot.entries.keys() {
            self.tags.insert(*tag, Selection::new());
        }
        for (v, p) in mesh.vertices() {
            if let Some((_, slot)) = grid.nearest(p) {
                for tag in &owners[slot] {
                    self.tags.entry(*tag).or_default().insert(v);
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operations::creation::MakeGrid;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
    enum T {
        A,
        B,
    }

    impl Display for T {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    fn grid() -> crate::operations::creation::Grid {
        MakeGrid::new(2, 2, 1.0, 1.0).execute().unwrap()
    }

    #[test]
    fn set_algebra() {
        let g = grid();
        let mut tracker = RegionTracker::new();
        let row0: Selection = (0..3).map(|i| g.vertex(i, 0).unwrap()).collect();
        let col0: Selection = (0..3).map(|j| g.vertex(0, j).unwrap()).collect();
        tracker.assign(T::A, &row0);
        tracker.assign(T::B, &col0);
        assert_eq!(tracker.union(T::A, T::B).len(), 5);
        assert_eq!(tracker.intersect(T::A, T::B).len(), 1);
        assert_eq!(tracker.subtract(T::A, T::B).len(), 2);
        assert_eq!(tracker.tags_of(g.vertex(0, 0).unwrap()), vec![T::A, T::B]);
    }

    #[test]
    fn empty_tag_selects_nothing_but_require_fails() {
        let mut tracker: RegionTracker<T> = RegionTracker::new();
        tracker.create(T::A);
        assert!(tracker.select(T::A).is_empty());
        assert!(tracker.select(T::B).is_empty());
        assert!(tracker.require(T::A).is_err());
    }

    #[test]
    fn prune_after_deletion() {
        let mut g = grid();
        let mut tracker = RegionTracker::new();
        let corner = g.vertex(0, 0).unwrap();
        tracker.assign_vertex(T::A, corner);
        g.mesh.remove_vertex(corner);
        tracker.prune(&g.mesh);
        assert!(tracker.select(T::A).is_empty());
    }

    #[test]
    fn provenance_requires_all_parents() {
        let g = grid();
        let a = g.vertex(0, 0).unwrap();
        let b = g.vertex(1, 0).unwrap();
        let c = g.vertex(2, 0).unwrap();
        let mut tracker = RegionTracker::new();
        tracker.assign(T::A, &[a, b].into_iter().collect());
        let mut provenance = BTreeMap::new();
        provenance.insert(a, vec![a]);
        provenance.insert(b, vec![a, b]);
        provenance.insert(c, vec![b, c]);
        tracker.carry_provenance(&provenance);
        let sel = tracker.select(T::A);
        assert!(sel.contains(a) && sel.contains(b) && !sel.contains(c));
    }

    #[test]
    fn reassert_by_position_follows_moved_ids() {
        let g = grid();
        let mut tracker = RegionTracker::new();
        tracker.assign_vertex(T::A, g.vertex(1, 1).unwrap());
        let snap = tracker.snapshot(&g.mesh);

        let mut copy = Mesh::new();
        copy.merge(&g.mesh).unwrap();
        tracker.reassert_by_position(&copy, &snap, 1e-6);
        let sel = tracker.require(T::A).unwrap();
        assert_eq!(sel.len(), 1);
        let v = sel.iter().next().unwrap();
        assert!(copy.contains_vertex(v));
    }

    #[test]
    fn grow_adds_face_neighbors() {
        let g = grid();
        let center: Selection = std::iter::once(g.vertex(1, 1).unwrap()).collect();
        assert_eq!(center.grow(&g.mesh).len(), 9);
        let corner: Selection = std::iter::once(g.vertex(0, 0).unwrap()).collect();
        assert_eq!(corner.grow(&g.mesh).len(), 4);
        assert_eq!(center.grow(&g.mesh).faces(&g.mesh).len(), 4);
    }
}
