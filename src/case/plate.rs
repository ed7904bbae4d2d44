//! Plate Builder.
//!
//! Both plates start as lattice grids whose vertex `(i, j)` sits at
//! `(i, -j)` in lattice space. Key faces keep their lattice cell, every
//! vertex is moved onto the key face corner it belongs to, and the cells in
//! between become the webs joining neighbouring keys. Boundary regions are
//! classified by walking the actual boundary loop; the finger lattice's
//! closed-form indices serve as a cross-check in the tests.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info, instrument};

use crate::error::{Result, TopologyError};
use crate::math::polygon_2d::{signed_area, triangulate};
use crate::math::{Point2, Point3};
use crate::mesh::loops::boundary_loops;
use crate::mesh::{Mesh, RegionTracker, Selection, VertexId};
use crate::operations::creation::{Grid, MakeGrid};
use crate::operations::modification::BridgeLoops;

use super::params::{CaseParams, THUMB_KEYS};
use super::placement::{KeyId, KeyPlacement, Layout};
use super::tags::{Corner, Plate, Seam, Side, Tag};

/// Clearance added around every key face.
const FACE_MARGIN: f64 = 0.25;

/// Lattice cell of each thumb key, in thumb order.
const THUMB_CELLS: [(usize, usize); THUMB_KEYS] = [(0, 0), (0, 2), (2, 0), (2, 2), (4, 0), (6, 0)];

/// Web cell replaced by the first correction polygon.
const THUMB_GAP_CELL: (usize, usize) = (2, 1);

/// Polygons filling the irregular gap below the two long thumb keys.
const THUMB_CORRECTIONS: [&[(usize, usize)]; 4] = [
    &[(2, 1), (3, 1), (4, 1), (3, 2), (2, 2)],
    &[(3, 2), (4, 1), (5, 1)],
    &[(3, 2), (5, 1), (6, 1), (3, 3)],
    &[(3, 3), (6, 1), (7, 1)],
];

/// A surface mesh with its region tags.
#[derive(Debug, Clone)]
pub struct PlateMesh {
    pub mesh: Mesh,
    pub tags: RegionTracker<Tag>,
    /// Lattice position of every vertex that came from a grid.
    pub lattice: BTreeMap<VertexId, (usize, usize)>,
    /// Boundary paths along which the plates are joined, in the direction
    /// the plate's faces traverse them.
    pub seams: BTreeMap<Seam, Vec<VertexId>>,
}

impl PlateMesh {
    /// Vertices carrying `tag`, ordered by lattice position.
    #[must_use]
    pub fn lattice_positions(&self, tag: Tag) -> Vec<(usize, usize)> {
        let mut out: Vec<(usize, usize)> = self
            .tags
            .select(tag)
            .iter()
            .filter_map(|v| self.lattice.get(&v).copied())
            .collect();
        out.sort_unstable();
        out
    }
}

/// Builds the finger plate.
pub struct BuildFingerPlate<'a> {
    params: &'a CaseParams,
    layout: &'a Layout,
}

impl<'a> BuildFingerPlate<'a> {
    #[must_use]
    pub fn new(params: &'a CaseParams, layout: &'a Layout) -> Self {
        Self { params, layout }
    }

    /// Executes the build.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::MissingObject` if a lattice vertex maps to a
    /// key missing from the layout, or `TopologyError` if the boundary does
    /// not form the expected single counter-clockwise loop.
    #[instrument(skip_all)]
    pub fn execute(&self) -> Result<PlateMesh> {
        let lp = &self.params.layout;
        let cells_x = 2 * lp.ncols - 1;
        let cells_y = 2 * lp.nrows - 1;
        let mut grid = MakeGrid::new(cells_x, cells_y, 1.0, 1.0).execute()?;
        let included = |i: usize, j: usize| lp.includes(i / 2, j / 2);

        let mut removed = 0;
        for i in 0..cells_x {
            for j in 0..cells_y {
                let keep = included(i, j)
                    && included(i + 1, j)
                    && included(i, j + 1)
                    && included(i + 1, j + 1);
                if !keep {
                    if let Some(f) = grid.face(i, j) {
                        grid.mesh.remove_face(f);
                        removed += 1;
                    }
                }
            }
        }

        // The short last row leaves a half-cell notch on each side of it.
        let last = lp.last_row();
        let (first_col, last_col) = lp.last_row_span();
        let mut notches: Vec<[(usize, usize); 3]> = Vec::new();
        if first_col > 0 {
            let i = 2 * first_col;
            notches.push([(i - 1, 2 * last - 1), (i, 2 * last - 1), (i, 2 * last)]);
        }
        if last_col < lp.last_col() {
            let i = 2 * last_col + 1;
            notches.push([(i, 2 * last), (i, 2 * last - 1), (i + 1, 2 * last - 1)]);
        }
        for tri in &notches {
            add_lattice_polygon(&mut grid, tri)?;
        }
        grid.mesh.remove_unused_vertices();
        let lattice = lattice_map(&grid);

        let mut tags = RegionTracker::new();
        for key in self.layout.finger_keys() {
            let KeyId::Finger { column, row } = key.id else {
                continue;
            };
            let cell: Selection = [(0, 0), (0, 1), (1, 0), (1, 1)]
                .iter()
                .filter_map(|(di, dj)| grid.vertex(2 * column + di, 2 * row + dj))
                .collect();
            tags.assign(Tag::Key(key.id), &cell);
            tags.assign(Tag::Keys(Plate::Finger), &cell);
        }

        let sw = &self.params.switch;
        let inset = sw.mount_thickness + lp.key_well_offset;
        for (v, (i, j)) in &lattice {
            let (column, row) = (i / 2, j / 2);
            let key = self.layout.require(KeyId::Finger { column, row })?;
            let size = key.size.factor();
            let corner = face_corner(
                i - 2 * column,
                j - 2 * row,
                sw.mount_height * size + FACE_MARGIN,
                sw.mount_width + FACE_MARGIN,
                inset,
            );
            grid.mesh.set_point(*v, key.to_world(&corner))?;
        }

        let seams = classify_finger_boundary(&grid.mesh, &lattice, &mut tags, self.params)?;
        info!(
            faces = grid.mesh.face_count(),
            vertices = grid.mesh.vertex_count(),
            removed_cells = removed,
            notches = notches.len(),
            "built finger plate"
        );
        Ok(PlateMesh {
            mesh: grid.mesh,
            tags,
            lattice,
            seams,
        })
    }
}

/// Tags the finger boundary by walking its loop.
///
/// The loop runs counter-clockwise in lattice space: down the left side,
/// along the bottom (where the seam runs), up the right side and back along
/// the top.
fn classify_finger_boundary(
    mesh: &Mesh,
    lattice: &BTreeMap<VertexId, (usize, usize)>,
    tags: &mut RegionTracker<Tag>,
    params: &CaseParams,
) -> Result<BTreeMap<Seam, Vec<VertexId>>> {
    let loops = boundary_loops(mesh);
    let [lp] = loops.as_slice() else {
        return Err(TopologyError::BoundaryLoops {
            context: "finger plate".into(),
            expected: 1,
            found: loops.len(),
        }
        .into());
    };
    let mut walk: Vec<(VertexId, (usize, usize))> = lp
        .iter()
        .map(|v| {
            lattice.get(v).map(|ij| (*v, *ij)).ok_or_else(|| {
                TopologyError::EntityNotFound("finger boundary vertex off the lattice".into())
            })
        })
        .collect::<std::result::Result<_, _>>()?;

    let i_max = 2 * params.layout.ncols - 1;
    let deepest = |i: usize| {
        walk.iter()
            .filter(|(_, (vi, _))| *vi == i)
            .map(|(_, (_, j))| *j)
            .max()
    };
    let corner_at = |walk: &[(VertexId, (usize, usize))], ij: (usize, usize)| {
        walk.iter().position(|(_, p)| *p == ij).ok_or_else(|| {
            TopologyError::InvalidTopology(format!("finger corner {ij:?} is not on the boundary"))
        })
    };
    let (Some(bl_j), Some(br_j)) = (deepest(0), deepest(i_max)) else {
        return Err(TopologyError::InvalidTopology("finger boundary misses a side".into()).into());
    };

    let tl = corner_at(&walk, (0, 0))?;
    walk.rotate_left(tl);
    let bl = corner_at(&walk, (0, bl_j))?;
    let br = corner_at(&walk, (i_max, br_j))?;
    let tr = corner_at(&walk, (i_max, 0))?;
    if !(bl < br && br < tr) {
        return Err(
            TopologyError::InvalidTopology("finger boundary is not counter-clockwise".into()).into(),
        );
    }

    // The seam runs along the bottom from the left corner, past the notch
    // and the near half of the short last row.
    let (first_col, _) = params.layout.last_row_span();
    let last_j = 2 * params.layout.last_row() + 1;
    let bottom = &walk[bl..=br];
    let find = |pred: &dyn Fn(usize, usize) -> bool, what: &str| {
        bottom
            .iter()
            .position(|(_, (i, j))| pred(*i, *j))
            .map(|k| bl + k)
            .ok_or_else(|| TopologyError::InvalidTopology(format!("finger seam has no {what}")))
    };
    let left_end = find(&|i, _| i == 2, "left end")?;
    let mid_end = find(&|i, j| i == 2 * first_col && j == last_j, "middle end")?;
    let right_end = find(&|i, _| i == 2 * first_col + 2, "right end")?;
    if !(left_end < mid_end && mid_end < right_end) {
        return Err(TopologyError::InvalidTopology("finger seam is out of order".into()).into());
    }

    let ids = |range: std::ops::RangeInclusive<usize>| -> Vec<VertexId> {
        walk[range].iter().map(|(v, _)| *v).collect()
    };
    let mut top = ids(tr..=walk.len() - 1);
    top.push(walk[0].0);

    let finger = Plate::Finger;
    let sides = [
        (Tag::Side(finger, Side::Left), ids(0..=bl)),
        (Tag::Side(finger, Side::Bottom), ids(right_end..=br)),
        (Tag::Side(finger, Side::Right), ids(br..=tr)),
        (Tag::Side(finger, Side::Top), top),
        (Tag::Bridge(finger, Seam::Left), ids(bl..=left_end)),
        (Tag::Bridge(finger, Seam::Mid), ids(left_end..=mid_end)),
        (Tag::Bridge(finger, Seam::Right), ids(mid_end..=right_end)),
    ];
    for (tag, path) in &sides {
        tags.assign(*tag, &path.iter().copied().collect());
    }
    for (corner, k) in [
        (Corner::TopLeft, 0),
        (Corner::BottomLeft, bl),
        (Corner::BottomRight, br),
        (Corner::TopRight, tr),
    ] {
        tags.assign_vertex(Tag::Corner(finger, corner), walk[k].0);
    }
    tags.assign_vertex(Tag::SeamEnd(Seam::Left), walk[bl].0);
    tags.assign_vertex(Tag::SeamEnd(Seam::Right), walk[right_end].0);
    debug!(
        boundary = walk.len(),
        left = bl,
        bottom = br - bl,
        right = tr - br,
        "classified finger boundary"
    );

    Ok(BTreeMap::from([
        (Seam::Left, ids(bl..=left_end)),
        (Seam::Mid, ids(left_end..=mid_end)),
        (Seam::Right, ids(mid_end..=right_end)),
    ]))
}

/// Builds the thumb plate over its fixed 7 × 3 lattice.
pub struct BuildThumbPlate<'a> {
    params: &'a CaseParams,
    layout: &'a Layout,
}

impl<'a> BuildThumbPlate<'a> {
    #[must_use]
    pub fn new(params: &'a CaseParams, layout: &'a Layout) -> Self {
        Self { params, layout }
    }

    /// Executes the build.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::MissingObject` if a thumb key is missing, or
    /// `TopologyError::BoundaryLoops` if the plate is not a single patch.
    #[instrument(skip_all)]
    pub fn execute(&self) -> Result<PlateMesh> {
        let mut grid = MakeGrid::new(7, 3, 1.0, 1.0).execute()?;
        let mut owner: BTreeMap<(usize, usize), &KeyPlacement> = BTreeMap::new();
        for (k, (ci, cj)) in THUMB_CELLS.iter().enumerate() {
            let key = self.layout.require(KeyId::Thumb(k))?;
            for (di, dj) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
                owner.insert((ci + di, cj + dj), key);
            }
        }

        for i in 0..7 {
            for j in 0..3 {
                let corners = [(i, j), (i + 1, j), (i, j + 1), (i + 1, j + 1)];
                let keep = (i, j) != THUMB_GAP_CELL && corners.iter().all(|c| owner.contains_key(c));
                if !keep {
                    if let Some(f) = grid.face(i, j) {
                        grid.mesh.remove_face(f);
                    }
                }
            }
        }
        for polygon in THUMB_CORRECTIONS {
            add_lattice_polygon(&mut grid, polygon)?;
        }
        grid.mesh.remove_unused_vertices();
        let lattice = lattice_map(&grid);

        let mut tags = RegionTracker::new();
        for (k, (ci, cj)) in THUMB_CELLS.iter().enumerate() {
            let cell: Selection = [(0, 0), (0, 1), (1, 0), (1, 1)]
                .iter()
                .filter_map(|(di, dj)| grid.vertex(ci + di, cj + dj))
                .collect();
            tags.assign(Tag::Key(KeyId::Thumb(k)), &cell);
            tags.assign(Tag::Keys(Plate::Thumb), &cell);
        }

        let sw = &self.params.switch;
        let inset = sw.mount_thickness + 2.0 * self.params.layout.key_well_offset;
        for (v, ij) in &lattice {
            let Some(key) = owner.get(ij) else {
                continue;
            };
            let (ci, cj) = THUMB_CELLS[thumb_index(key.id)];
            let corner = face_corner(
                ij.0 - ci,
                ij.1 - cj,
                sw.mount_height + FACE_MARGIN,
                sw.mount_height * key.size.factor() + FACE_MARGIN,
                inset,
            );
            grid.mesh.set_point(*v, key.to_world(&corner))?;
        }

        let at = |ij: (usize, usize)| {
            grid.vertex(ij.0, ij.1)
                .ok_or_else(|| TopologyError::EntityNotFound(format!("thumb lattice vertex {ij:?}")))
        };
        let path = |points: &[(usize, usize)]| -> Result<Vec<VertexId>> {
            points.iter().map(|ij| at(*ij).map_err(Into::into)).collect()
        };
        let thumb = Plate::Thumb;
        let regions: [(Tag, &[(usize, usize)]); 13] = [
            (Tag::Side(thumb, Side::Left), &[(0, 0), (1, 0), (2, 0), (3, 0)]),
            (Tag::Side(thumb, Side::Bottom), &[(0, 0), (0, 1), (0, 2), (0, 3)]),
            (Tag::Side(thumb, Side::Right), &[(0, 3), (1, 3), (2, 3), (3, 3), (7, 1)]),
            (Tag::Corner(thumb, Corner::TopLeft), &[(4, 0)]),
            (Tag::Corner(thumb, Corner::TopLowerLeft), &[(3, 0)]),
            (Tag::Corner(thumb, Corner::MiddleLeft), &[(2, 0)]),
            (Tag::Corner(thumb, Corner::BottomLeft), &[(0, 0)]),
            (Tag::Corner(thumb, Corner::BottomRight), &[(0, 3)]),
            (Tag::Bridge(thumb, Seam::Left), &[(4, 0), (5, 0), (6, 0)]),
            (Tag::Bridge(thumb, Seam::Mid), &[(6, 0), (7, 0), (7, 1)]),
            (Tag::Bridge(thumb, Seam::Right), &[(7, 1)]),
            (Tag::SeamEnd(Seam::Left), &[(3, 0), (4, 0)]),
            (Tag::SeamEnd(Seam::Right), &[(7, 1)]),
        ];
        for (tag, points) in regions {
            tags.assign(tag, &path(points)?.into_iter().collect());
        }

        let loops = boundary_loops(&grid.mesh);
        if loops.len() != 1 {
            return Err(TopologyError::BoundaryLoops {
                context: "thumb plate".into(),
                expected: 1,
                found: loops.len(),
            }
            .into());
        }
        // The last correction triangle buries (6, 1), so the right side
        // runs straight from (3, 3) to (7, 1).
        let rim: BTreeSet<VertexId> = loops[0].iter().copied().collect();
        for (tag, points) in regions {
            if let Some(ij) = points.iter().find(|ij| at(**ij).is_ok_and(|v| !rim.contains(&v))) {
                return Err(TopologyError::InvalidTopology(format!(
                    "thumb tag {tag:?} names interior lattice vertex {ij:?}"
                ))
                .into());
            }
        }
        // Seam paths run against the thumb faces so they bridge onto the
        // finger seam, which runs with its own faces.
        let seams = BTreeMap::from([
            (Seam::Left, path(&[(4, 0), (5, 0), (6, 0)])?),
            (Seam::Mid, path(&[(6, 0), (7, 0), (7, 1)])?),
            (Seam::Right, path(&[(7, 1)])?),
        ]);
        info!(
            faces = grid.mesh.face_count(),
            vertices = grid.mesh.vertex_count(),
            "built thumb plate"
        );
        Ok(PlateMesh {
            mesh: grid.mesh,
            tags,
            lattice,
            seams,
        })
    }
}

fn thumb_index(id: KeyId) -> usize {
    match id {
        KeyId::Thumb(k) => k,
        KeyId::Finger { .. } => 0,
    }
}

/// Merges both plates and closes the seam between them.
pub struct JoinPlates;

impl JoinPlates {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Executes the join, returning one body with a single boundary loop.
    ///
    /// The left and middle seams are bridged path to path; the right seam
    /// closes onto the single thumb vertex at its end with a fan.
    ///
    /// # Errors
    ///
    /// Returns `TopologyError::BoundaryLoops` if the joined body is not a
    /// single patch, or an error if a seam path is missing.
    #[instrument(skip_all)]
    pub fn execute(&self, finger: &PlateMesh, thumb: &PlateMesh) -> Result<PlateMesh> {
        let mut out = PlateMesh {
            mesh: Mesh::new(),
            tags: RegionTracker::new(),
            lattice: BTreeMap::new(),
            seams: BTreeMap::new(),
        };
        let mut seams: Vec<BTreeMap<Seam, Vec<VertexId>>> = Vec::with_capacity(2);
        for part in [finger, thumb] {
            let map = out.mesh.merge(&part.mesh)?;
            let mut tags = part.tags.clone();
            tags.carry_forward(&map);
            for tag in tags.tags() {
                out.tags.assign(tag, &tags.select(tag));
            }
            seams.push(
                part.seams
                    .iter()
                    .map(|(s, path)| (*s, path.iter().filter_map(|v| map.get(v).copied()).collect()))
                    .collect(),
            );
        }
        let seam = |side: usize, s: Seam| -> Result<&Vec<VertexId>> {
            seams[side]
                .get(&s)
                .ok_or_else(|| TopologyError::EntityNotFound(format!("{s:?} seam")).into())
        };

        let bridge = BridgeLoops::new().open();
        let mut faces = bridge.execute(&mut out.mesh, seam(0, Seam::Left)?, seam(1, Seam::Left)?)?.len();
        faces += bridge
            .execute(&mut out.mesh, seam(0, Seam::Mid)?, seam(1, Seam::Mid)?)?
            .len();
        let right = seam(0, Seam::Right)?.clone();
        let Some(apex) = seam(1, Seam::Right)?.first().copied() else {
            return Err(TopologyError::EntityNotFound("thumb right seam vertex".into()).into());
        };
        for w in right.windows(2) {
            out.mesh.add_face(&[w[1], w[0], apex])?;
            faces += 1;
        }

        let loops = boundary_loops(&out.mesh).len();
        if loops != 1 {
            return Err(TopologyError::BoundaryLoops {
                context: "joined plates".into(),
                expected: 1,
                found: loops,
            }
            .into());
        }
        info!(seam_faces = faces, vertices = out.mesh.vertex_count(), "joined plates");
        Ok(out)
    }
}

impl Default for JoinPlates {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds both plates and joins them into the plate body.
pub struct BuildBody<'a> {
    params: &'a CaseParams,
    layout: &'a Layout,
}

impl<'a> BuildBody<'a> {
    #[must_use]
    pub fn new(params: &'a CaseParams, layout: &'a Layout) -> Self {
        Self { params, layout }
    }

    /// Executes the build.
    ///
    /// # Errors
    ///
    /// See [`BuildFingerPlate`], [`BuildThumbPlate`] and [`JoinPlates`].
    pub fn execute(&self) -> Result<PlateMesh> {
        let finger = BuildFingerPlate::new(self.params, self.layout).execute()?;
        let thumb = BuildThumbPlate::new(self.params, self.layout).execute()?;
        JoinPlates::new().execute(&finger, &thumb)
    }
}

/// Key-local corner `(di, dj)` of a key face of `width × height`.
#[allow(clippy::cast_precision_loss)]
fn face_corner(di: usize, dj: usize, width: f64, height: f64, inset: f64) -> Point3 {
    Point3::new(
        (di as f64 - 0.5) * width,
        -(dj as f64 - 0.5) * height,
        inset,
    )
}

fn lattice_map(grid: &Grid) -> BTreeMap<VertexId, (usize, usize)> {
    let (cx, cy) = grid.cells();
    let mut out = BTreeMap::new();
    for i in 0..=cx {
        for j in 0..=cy {
            if let Some(v) = grid.vertex(i, j) {
                if grid.mesh.contains_vertex(v) {
                    out.insert(v, (i, j));
                }
            }
        }
    }
    out
}

/// Adds a polygon given by lattice positions, wound counter-clockwise in
/// lattice space and split into triangles.
#[allow(clippy::cast_precision_loss)]
fn add_lattice_polygon(grid: &mut Grid, points: &[(usize, usize)]) -> Result<()> {
    let mut ids = Vec::with_capacity(points.len());
    let mut flat = Vec::with_capacity(points.len());
    for &(i, j) in points {
        let v = grid
            .vertex(i, j)
            .ok_or_else(|| TopologyError::EntityNotFound(format!("lattice vertex ({i}, {j})")))?;
        ids.push(v);
        flat.push(Point2::new(i as f64, -(j as f64)));
    }
    if signed_area(&flat) < 0.0 {
        ids.reverse();
        flat.reverse();
    }
    for [a, b, c] in triangulate(&flat) {
        grid.mesh.add_face(&[ids[a], ids[b], ids[c]])?;
    }
    Ok(())
}

/// Every vertex carrying one of `tags`.
#[must_use]
pub fn select_any(tracker: &RegionTracker<Tag>, tags: &[Tag]) -> Selection {
    let mut out = BTreeSet::new();
    for tag in tags {
        out.extend(tracker.select(*tag).iter());
    }
    out.into_iter().collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::case::placement::PlaceKeys;
    use crate::mesh::EdgeMap;

    fn reference() -> (CaseParams, Layout) {
        let params = CaseParams::default();
        let layout = PlaceKeys::new(&params).execute().unwrap();
        (params, layout)
    }

    /// Index a vertex had in the full finger lattice.
    fn lattice_index(plate: &PlateMesh, v: VertexId, nrows: usize) -> usize {
        let (i, j) = plate.lattice[&v];
        i * 2 * nrows + j
    }

    #[test]
    fn finger_plate_tags_one_face_per_key() {
        let (params, layout) = reference();
        let plate = BuildFingerPlate::new(&params, &layout).execute().unwrap();
        let keys: Vec<Tag> = plate
            .tags
            .tags()
            .filter(|t| matches!(t, Tag::Key(KeyId::Finger { .. })))
            .collect();
        assert_eq!(keys.len(), params.layout.finger_key_count());
        for tag in keys {
            let sel = plate.tags.require(tag).unwrap();
            assert_eq!(sel.len(), 4);
            assert_eq!(sel.faces(&plate.mesh).len(), 1);
        }
        let edges = EdgeMap::build(&plate.mesh);
        assert!(edges.non_manifold_edges().is_empty());
        assert!(edges.inconsistent_edges().is_empty());
    }

    #[test]
    fn finger_boundary_matches_closed_form_indices() {
        let (params, layout) = reference();
        let plate = BuildFingerPlate::new(&params, &layout).execute().unwrap();
        let nrows = params.layout.nrows;
        let single = |tag: Tag| {
            let sel = plate.tags.require(tag).unwrap();
            assert_eq!(sel.len(), 1, "{tag}");
            let first = sel.iter().next().unwrap();
            lattice_index(&plate, first, nrows)
        };
        assert_eq!(single(Tag::Corner(Plate::Finger, Corner::TopLeft)), 0);
        assert_eq!(single(Tag::Corner(Plate::Finger, Corner::BottomLeft)), 7);
        assert_eq!(single(Tag::Corner(Plate::Finger, Corner::TopRight)), 110);
        assert_eq!(single(Tag::Corner(Plate::Finger, Corner::BottomRight)), 117);
        assert_eq!(single(Tag::SeamEnd(Seam::Left)), 7);
        assert_eq!(single(Tag::SeamEnd(Seam::Right)), 69);

        let path = |s: Seam| -> Vec<usize> {
            plate.seams[&s]
                .iter()
                .map(|v| lattice_index(&plate, *v, nrows))
                .collect()
        };
        assert_eq!(path(Seam::Left), vec![7, 17, 27]);
        assert_eq!(path(Seam::Mid), vec![27, 37, 48, 49]);
        assert_eq!(path(Seam::Right), vec![49, 59, 69]);
    }

    #[test]
    fn finger_sides_cover_every_boundary_edge_once() {
        let (params, layout) = reference();
        let plate = BuildFingerPlate::new(&params, &layout).execute().unwrap();
        let finger = Plate::Finger;
        let runs = [
            Tag::Side(finger, Side::Top),
            Tag::Side(finger, Side::Left),
            Tag::Side(finger, Side::Right),
            Tag::Side(finger, Side::Bottom),
            Tag::Bridge(finger, Seam::Left),
            Tag::Bridge(finger, Seam::Mid),
            Tag::Bridge(finger, Seam::Right),
        ];
        let lp = boundary_loops(&plate.mesh).remove(0);
        for k in 0..lp.len() {
            let (a, b) = (lp[k], lp[(k + 1) % lp.len()]);
            let owners = runs
                .iter()
                .filter(|t| plate.tags.has(**t, a) && plate.tags.has(**t, b))
                .count();
            assert_eq!(owners, 1);
        }
        for corner in [Corner::TopLeft, Corner::TopRight, Corner::BottomLeft, Corner::BottomRight] {
            let v = plate
                .tags
                .require(Tag::Corner(finger, corner))
                .unwrap()
                .iter()
                .next()
                .unwrap();
            let owners = runs.iter().filter(|t| plate.tags.has(**t, v)).count();
            assert_eq!(owners, 2, "{corner:?}");
        }
    }

    #[test]
    fn thumb_boundary_follows_the_fixed_walk() {
        let (params, layout) = reference();
        let plate = BuildThumbPlate::new(&params, &layout).execute().unwrap();
        assert_eq!(plate.mesh.vertex_count(), 24);
        // Renumbering of the kept lattice vertices.
        let index = |v: VertexId| {
            let (i, j) = plate.lattice[&v];
            if i < 4 {
                4 * i + j
            } else {
                16 + 2 * (i - 4) + j
            }
        };
        let mut walk: Vec<usize> = boundary_loops(&plate.mesh)
            .remove(0)
            .into_iter()
            .map(index)
            .collect();
        let start = walk.iter().position(|n| *n == 23).unwrap();
        walk.rotate_left(start);
        assert_eq!(walk, vec![23, 22, 20, 18, 16, 12, 8, 4, 0, 1, 2, 3, 7, 11, 15]);
        let rim: BTreeSet<usize> = walk.iter().copied().collect();

        let indices = |tag: Tag| -> Vec<usize> {
            let mut out: Vec<usize> = plate.tags.select(tag).iter().map(index).collect();
            out.sort_unstable();
            out
        };
        assert_eq!(indices(Tag::Side(Plate::Thumb, Side::Left)), vec![0, 4, 8, 12]);
        assert_eq!(indices(Tag::Side(Plate::Thumb, Side::Right)), vec![3, 7, 11, 15, 23]);
        // (6, 1) sits under the last correction triangle.
        assert!(!rim.contains(&21));
        for tag in [
            Tag::Side(Plate::Thumb, Side::Left),
            Tag::Side(Plate::Thumb, Side::Bottom),
            Tag::Side(Plate::Thumb, Side::Right),
            Tag::Bridge(Plate::Thumb, Seam::Left),
            Tag::Bridge(Plate::Thumb, Seam::Mid),
            Tag::SeamEnd(Seam::Right),
        ] {
            assert!(indices(tag).iter().all(|n| rim.contains(n)), "{tag:?}");
        }
        let seam: Vec<usize> = plate.seams.values().flatten().map(|v| index(*v)).collect();
        assert!(seam.iter().all(|n| rim.contains(n)));
        assert_eq!(indices(Tag::Corner(Plate::Thumb, Corner::TopLeft)), vec![16]);
        assert_eq!(indices(Tag::SeamEnd(Seam::Left)), vec![12, 16]);
        assert_eq!(indices(Tag::Bridge(Plate::Thumb, Seam::Mid)), vec![20, 22, 23]);
    }

    #[test]
    fn thumb_plate_keeps_a_face_per_key() {
        let (params, layout) = reference();
        let plate = BuildThumbPlate::new(&params, &layout).execute().unwrap();
        for k in 0..THUMB_KEYS {
            let sel = plate.tags.require(Tag::Key(KeyId::Thumb(k))).unwrap();
            assert_eq!(sel.faces(&plate.mesh).len(), 1);
        }
        assert!(plate.lattice_positions(Tag::Keys(Plate::Thumb)).contains(&(7, 1)));
        let edges = EdgeMap::build(&plate.mesh);
        assert!(edges.non_manifold_edges().is_empty());
        assert!(edges.inconsistent_edges().is_empty());
    }

    #[test]
    fn joined_body_has_one_consistent_boundary() {
        let (params, layout) = reference();
        let body = BuildBody::new(&params, &layout).execute().unwrap();
        assert_eq!(boundary_loops(&body.mesh).len(), 1);
        let edges = EdgeMap::build(&body.mesh);
        assert!(edges.non_manifold_edges().is_empty());
        assert!(edges.inconsistent_edges().is_empty());
        let keys = body.tags.tags().filter(|t| matches!(t, Tag::Key(_))).count();
        assert_eq!(keys, params.layout.finger_key_count() + THUMB_KEYS);
        assert_eq!(body.tags.select(Tag::SeamEnd(Seam::Left)).len(), 3);
    }
}
