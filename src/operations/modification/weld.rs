use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::Result;
use crate::math::spatial::PointGrid;
use crate::mesh::loops::vertex_faces;
use crate::mesh::{EdgeKey, FaceId, Mesh, Selection, VertexId};

/// Merges vertices closer than `distance`.
///
/// Faces are rewritten onto the surviving vertices; faces collapsing below
/// three vertices are dropped, and pairs of faces over the same vertex set
/// (internal double walls left by the merge) are removed.
///
/// With [`Weld::along_edges`] only the two ends of a short edge are merged,
/// and a merge is refused when it would leave an edge shared by more than
/// two faces or two faces over the same vertices.
pub struct Weld {
    distance: f64,
    region: Option<Selection>,
    along_edges: bool,
}

impl Weld {
    #[must_use]
    pub fn new(distance: f64) -> Self {
        Self {
            distance,
            region: None,
            along_edges: false,
        }
    }

    /// Only merges vertices inside `region`.
    #[must_use]
    pub fn restricted_to(mut self, region: Selection) -> Self {
        self.region = Some(region);
        self
    }

    /// Collapses short edges instead of merging by position.
    #[must_use]
    pub fn along_edges(mut self) -> Self {
        self.along_edges = true;
        self
    }

    fn in_region(&self, v: VertexId) -> bool {
        self.region.as_ref().is_none_or(|r| r.contains(v))
    }

    /// Executes the weld, returning the map from each removed vertex to the
    /// vertex that replaced it.
    ///
    /// # Errors
    ///
    /// Returns an error if a face cannot be rewritten.
    pub fn execute(&self, mesh: &mut Mesh) -> Result<BTreeMap<VertexId, VertexId>> {
        if self.along_edges {
            return self.collapse_edges(mesh);
        }
        let mut grid: PointGrid<VertexId> = PointGrid::new(self.distance.max(1e-9) * 4.0);
        let mut merged: BTreeMap<VertexId, VertexId> = BTreeMap::new();
        let mut ids = mesh.vertex_ids();
        ids.sort();
        for v in ids {
            if !self.in_region(v) {
                continue;
            }
            let p = mesh.point(v)?;
            match grid.within(&p, self.distance).first() {
                Some((_, keep)) => {
                    merged.insert(v, *keep);
                }
                None => grid.insert(p, v),
            }
        }
        if merged.is_empty() {
            return Ok(merged);
        }

        let mut dropped = 0;
        let mut seen: BTreeMap<Vec<VertexId>, FaceId> = BTreeMap::new();
        let mut doubled: BTreeSet<FaceId> = BTreeSet::new();
        for fid in mesh.face_ids() {
            let verts = mesh.face_vertices(fid)?;
            let mut loop_: Vec<VertexId> = Vec::with_capacity(verts.len());
            for v in verts {
                let w = merged.get(v).copied().unwrap_or(*v);
                if loop_.last() != Some(&w) {
                    loop_.push(w);
                }
            }
            while loop_.len() > 1 && loop_.first() == loop_.last() {
                loop_.pop();
            }
            let distinct: BTreeSet<VertexId> = loop_.iter().copied().collect();
            if loop_.len() < 3 || distinct.len() != loop_.len() {
                mesh.remove_face(fid);
                dropped += 1;
                continue;
            }
            let key: Vec<VertexId> = distinct.into_iter().collect();
            if let Some(other) = seen.get(&key) {
                doubled.insert(*other);
                doubled.insert(fid);
            } else {
                seen.insert(key, fid);
            }
            mesh.replace_face(fid, loop_)?;
        }
        for f in &doubled {
            mesh.remove_face(*f);
        }
        for v in merged.keys() {
            mesh.remove_vertex(*v);
        }
        debug!(
            merged = merged.len(),
            dropped_faces = dropped + doubled.len(),
            "welded vertices"
        );
        Ok(merged)
    }

    fn collapse_edges(&self, mesh: &mut Mesh) -> Result<BTreeMap<VertexId, VertexId>> {
        let mut star: BTreeMap<VertexId, BTreeSet<FaceId>> = vertex_faces(mesh)
            .into_iter()
            .map(|(v, faces)| (v, faces.into_iter().collect()))
            .collect();
        let mut merged: BTreeMap<VertexId, VertexId> = BTreeMap::new();
        let mut refused = 0;
        loop {
            let mut candidates: Vec<(VertexId, VertexId)> = Vec::new();
            for (_, verts) in mesh.faces() {
                let n = verts.len();
                for i in 0..n {
                    let (a, b) = (verts[i], verts[(i + 1) % n]);
                    if self.in_region(a) && self.in_region(b) {
                        candidates.push((a.min(b), a.max(b)));
                    }
                }
            }
            candidates.sort();
            candidates.dedup();

            let mut collapsed = 0;
            refused = 0;
            for (keep, gone) in candidates {
                if !star.contains_key(&keep) || !star.contains_key(&gone) {
                    continue;
                }
                if (mesh.point(keep)? - mesh.point(gone)?).norm() >= self.distance {
                    continue;
                }
                if collapse(mesh, &mut star, keep, gone)? {
                    merged.insert(gone, keep);
                    collapsed += 1;
                } else {
                    refused += 1;
                }
            }
            if collapsed == 0 {
                break;
            }
        }
        if merged.is_empty() {
            return Ok(merged);
        }

        // Point every removed vertex at its final survivor.
        let removed: Vec<VertexId> = merged.keys().copied().collect();
        for v in removed {
            let mut target = merged[&v];
            while let Some(next) = merged.get(&target) {
                target = *next;
            }
            merged.insert(v, target);
        }
        mesh.remove_unused_vertices();
        merged.retain(|_, keep| mesh.contains_vertex(*keep));
        debug!(merged = merged.len(), refused, "collapsed short edges");
        Ok(merged)
    }
}

/// Collapses the edge `keep`-`gone` onto `keep`, or leaves the mesh as it
/// was and returns `false` when the result would not stay manifold.
fn collapse(
    mesh: &mut Mesh,
    star: &mut BTreeMap<VertexId, BTreeSet<FaceId>>,
    keep: VertexId,
    gone: VertexId,
) -> Result<bool> {
    let edge = EdgeKey::new(keep, gone);
    let around_gone: Vec<FaceId> = star
        .get(&gone)
        .map(|s| s.iter().copied().collect())
        .unwrap_or_default();
    let mut shares_edge = false;
    let mut rewritten: Vec<(FaceId, Vec<VertexId>)> = Vec::new();
    let mut dropped: Vec<FaceId> = Vec::new();
    for f in &around_gone {
        let verts = mesh.face_vertices(*f)?;
        let n = verts.len();
        shares_edge |= (0..n).any(|i| EdgeKey::new(verts[i], verts[(i + 1) % n]) == edge);
        let mut out: Vec<VertexId> = Vec::with_capacity(n);
        for v in verts {
            let w = if *v == gone { keep } else { *v };
            if out.last() != Some(&w) {
                out.push(w);
            }
        }
        while out.len() > 1 && out.first() == out.last() {
            out.pop();
        }
        if out.len() < 3 {
            dropped.push(*f);
        } else if out.iter().filter(|v| **v == keep).count() > 1 {
            return Ok(false);
        } else {
            rewritten.push((*f, out));
        }
    }
    if !shares_edge {
        return Ok(false);
    }

    // Faces around `keep` once the collapse is done.
    let mut new_star: Vec<Vec<VertexId>> = rewritten.iter().map(|(_, l)| l.clone()).collect();
    if let Some(faces) = star.get(&keep) {
        for f in faces.iter().filter(|f| !around_gone.contains(f)) {
            new_star.push(mesh.face_vertices(*f)?.to_vec());
        }
    }
    let mut uses: BTreeMap<VertexId, usize> = BTreeMap::new();
    let mut shapes: BTreeSet<Vec<VertexId>> = BTreeSet::new();
    for loop_ in &new_star {
        let n = loop_.len();
        for i in 0..n {
            let (a, b) = (loop_[i], loop_[(i + 1) % n]);
            if a == keep {
                *uses.entry(b).or_default() += 1;
            } else if b == keep {
                *uses.entry(a).or_default() += 1;
            }
        }
        let mut shape = loop_.clone();
        shape.sort();
        if !shapes.insert(shape) {
            return Ok(false);
        }
    }
    if uses.values().any(|n| *n > 2) {
        return Ok(false);
    }

    for (f, loop_) in rewritten {
        mesh.replace_face(f, loop_)?;
    }
    for f in &dropped {
        let verts = mesh.face_vertices(*f)?.to_vec();
        for v in verts {
            if let Some(s) = star.get_mut(&v) {
                s.remove(f);
            }
        }
        mesh.remove_face(*f);
    }
    let moved = star.remove(&gone).unwrap_or_default();
    star.entry(keep).or_default().extend(moved);
    Ok(true)
}
