//! Tool geometry for carving: per-key conform boxes, switch holes and
//! support ribs, connector port blocks and magnet wells.
//!
//! Key tools are built in key-local coordinates (Z along the key normal,
//! origin at the bottom of the mount) and placed with
//! [`KeyPlacement::tool_transform`].

use std::f64::consts::{FRAC_PI_2, TAU};

use crate::error::{GeometryError, Result};
use crate::math::polygon_2d::convex_hull;
use crate::math::{Isometry3, Point2, Point3, Vector3, TOLERANCE};
use crate::mesh::Mesh;
use crate::operations::boolean::{Boolean, BooleanOp, Solver};
use crate::operations::creation::{circle_profile, MakeBox, MakeCylinder, MakePrism};
use crate::operations::transform::Mirror;

use super::params::CaseParams;
use super::placement::KeyPlacement;
use super::tags::Tag;

/// Keycap footprint of a 1u key.
const KEYCAP: f64 = 19.0;
/// Extra margin of the inner keycap footprint.
const KEYCAP_INNER_MARGIN: f64 = 2.0;
/// Extra margin of the inner switch footprint.
const SWITCH_INNER_MARGIN: f64 = 3.6;
/// Height above the key at which every conform box ends.
const TOOL_CEILING: f64 = 40.0;
/// Half the thickness of a support rib.
const RIB_HALF_DEPTH: f64 = 1.375;
const CURVE_SEGMENTS: usize = 24;
const MAGNET_RIBS: usize = 5;

/// A box in its own frame whose content gets flattened onto the plane
/// `z = plane_z` of that frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConformBox {
    pub frame: Isometry3,
    pub half_x: f64,
    pub half_y: f64,
    pub z_min: f64,
    pub z_max: f64,
    pub plane_z: f64,
}

impl ConformBox {
    /// Whether a world point lies in the box grown by `margin`.
    #[must_use]
    pub fn contains(&self, world: &Point3, margin: f64) -> bool {
        let p = self.frame.inverse_transform_point(world);
        p.x.abs() <= self.half_x + margin
            && p.y.abs() <= self.half_y + margin
            && p.z >= self.z_min - margin
            && p.z <= self.z_max + margin
    }

    /// The six box faces as world planes with outward normals.
    #[must_use]
    pub fn cut_planes(&self) -> [(Point3, Vector3); 6] {
        let local = [
            (Point3::new(self.half_x, 0.0, 0.0), Vector3::x()),
            (Point3::new(-self.half_x, 0.0, 0.0), -Vector3::x()),
            (Point3::new(0.0, self.half_y, 0.0), Vector3::y()),
            (Point3::new(0.0, -self.half_y, 0.0), -Vector3::y()),
            (Point3::new(0.0, 0.0, self.z_max), Vector3::z()),
            (Point3::new(0.0, 0.0, self.z_min), -Vector3::z()),
        ];
        local.map(|(p, n)| (self.frame * p, self.frame * n))
    }

    /// The flattening plane in world space.
    #[must_use]
    pub fn plane(&self) -> (Point3, Vector3) {
        (
            self.frame * Point3::new(0.0, 0.0, self.plane_z),
            self.frame * Vector3::z(),
        )
    }
}

/// The four per-key projection shapes that level the key wells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKind {
    KeycapOuter,
    SwitchOuter,
    KeycapInner,
    SwitchInner,
}

impl WellKind {
    pub const ALL: [WellKind; 4] = [
        WellKind::KeycapOuter,
        WellKind::SwitchOuter,
        WellKind::KeycapInner,
        WellKind::SwitchInner,
    ];

    /// The sheet this shape acts on.
    #[must_use]
    pub fn shell(self) -> Tag {
        match self {
            WellKind::KeycapOuter | WellKind::SwitchOuter => Tag::Outer,
            WellKind::KeycapInner | WellKind::SwitchInner => Tag::Inner,
        }
    }
}

/// Conform box of one key well shape.
#[must_use]
pub fn key_well(kind: WellKind, key: &KeyPlacement, params: &CaseParams) -> ConformBox {
    let sw = &params.switch;
    let size = key.size.factor();
    let mt = sw.mount_thickness;
    let (width, height, z_min, plane_z) = match kind {
        WellKind::KeycapOuter => (KEYCAP, KEYCAP * size, mt + 2.0, mt + 2.0),
        WellKind::SwitchOuter => (sw.mount_width, sw.mount_height * size, -1.0, mt),
        WellKind::KeycapInner => (
            KEYCAP + KEYCAP_INNER_MARGIN,
            KEYCAP * size + KEYCAP_INNER_MARGIN,
            mt,
            mt,
        ),
        WellKind::SwitchInner => (
            sw.mount_width + SWITCH_INNER_MARGIN,
            sw.mount_height * size + SWITCH_INNER_MARGIN,
            -1.0,
            0.0,
        ),
    };
    ConformBox {
        frame: key.tool_transform(),
        half_x: width / 2.0,
        half_y: height / 2.0,
        z_min,
        z_max: TOOL_CEILING,
        plane_z,
    }
}

/// The switch aperture of one key.
///
/// # Errors
///
/// Returns an error if the switch dimensions are degenerate.
pub fn switch_hole(key: &KeyPlacement, params: &CaseParams) -> Result<Mesh> {
    let sw = &params.switch;
    let mut hole = MakeBox::centered(
        Point3::origin(),
        Vector3::new(sw.keyswitch_width, sw.keyswitch_height, 2.1 * sw.mount_thickness),
    )
    .execute()?;
    hole.transform(&key.tool_transform());
    Ok(hole)
}

/// The pair of clip ribs under one switch hole.
///
/// Each rib is a nub along the hole edge rounded off by a cylinder, mirrored
/// to the opposite edge.
///
/// # Errors
///
/// Returns an error if the profile is degenerate.
pub fn support_ribs(key: &KeyPlacement, params: &CaseParams) -> Result<Mesh> {
    let sw = &params.switch;
    let edge = sw.keyswitch_width / 2.0;
    let top = sw.mount_thickness - 0.005;
    let mut outline = vec![
        Point2::new(edge - 0.005, 0.005),
        Point2::new(edge + 1.495, 0.005),
        Point2::new(edge + 1.495, top),
        Point2::new(edge - 0.005, top),
    ];
    outline.extend(circle_profile(Point2::new(edge, 1.0), 0.995, CURVE_SEGMENTS));
    let mut rib = MakePrism::new(convex_hull(&outline), -RIB_HALF_DEPTH, RIB_HALF_DEPTH).execute()?;
    // Profile Y becomes key Z.
    rib.transform(&Isometry3::rotation(Vector3::x() * FRAC_PI_2));
    let other = Mirror::new(Point3::origin(), Vector3::x()).execute(&rib)?;
    rib.merge(&other)?;
    rib.transform(&key.tool_transform());
    Ok(rib)
}

/// Connector port geometry around the anchor on the back wall.
#[derive(Debug, Clone)]
pub struct PortTools {
    /// Outer sheet flattened onto the anchor plane.
    pub outer: ConformBox,
    /// Inner sheet flattened onto the holder wall behind it.
    pub inner: ConformBox,
    pub through_hole: Mesh,
    pub relief: Mesh,
    /// Blocks added to the bottom plate under the holder.
    pub bottom_reliefs: Vec<Mesh>,
}

/// Builds the connector port tools.
///
/// # Errors
///
/// Returns an error if a block is degenerate.
pub fn port_tools(anchor: &Point3, params: &CaseParams) -> Result<PortTools> {
    let hw = params.port.holder_width;
    let hh = params.port.holder_height;
    let bt = params.bottom.thickness;
    let body = params.body.thickness;
    let a = anchor.coords;
    let block = |center: Vector3, size: Vector3| MakeBox::centered(Point3::from(a + center), size).execute();

    // Local Z points out of the back wall (+Y), local Y points down.
    let facing = |center: Vector3| {
        Isometry3::new(a + center, Vector3::zeros()) * Isometry3::rotation(Vector3::x() * -FRAC_PI_2)
    };
    let depth = 22.25 / 2.0;
    let outer = ConformBox {
        frame: facing(Vector3::new(hw / 2.0, 0.0, (hh - bt - 20.0) / 2.0)),
        half_x: hw / 2.0,
        half_y: (hh + bt + 20.0) / 2.0,
        z_min: -depth,
        z_max: depth,
        plane_z: 0.0,
    };
    let widen = 1.5 + 2.0 * body;
    let inner = ConformBox {
        half_x: outer.half_x + widen,
        half_y: outer.half_y + widen,
        plane_z: -6.0,
        ..outer
    };

    let relief_z = -(bt - 0.5) / 2.0 - 0.5;
    let relief_h = bt - 0.51;
    Ok(PortTools {
        outer,
        inner,
        through_hole: block(
            Vector3::new(29.5 / 2.0 + 1.15, 0.0, 0.0),
            Vector3::new(29.5, 10.0, 24.5),
        )?,
        relief: block(
            Vector3::new(33.6 / 2.0 - 0.5, -8.5, 0.0),
            Vector3::new(33.6, 10.0, 25.5),
        )?,
        bottom_reliefs: vec![
            block(
                Vector3::new(33.2 / 2.0 - 0.5 + 0.2, -13.7, relief_z),
                Vector3::new(33.2, 20.0, relief_h),
            )?,
            block(
                Vector3::new(29.1 / 2.0 + 1.15 + 0.2, -10.0, relief_z),
                Vector3::new(29.1, 20.0, relief_h),
            )?,
        ],
    })
}

/// Magnet well geometry at one wall anchor.
#[derive(Debug, Clone)]
pub struct MagnetTools {
    /// Bore axis at the anchor height.
    pub center: Point3,
    /// Horizontal direction from the wall into the cavity.
    pub normal: Vector3,
    /// D-shaped boss fused to the inner wall.
    pub boss: Mesh,
    /// Magnet pocket with press-fit ribs left standing.
    pub pocket: Mesh,
    /// Enlarged boss subtracted from the bottom plate.
    pub clearance: Mesh,
}

/// Builds a magnet well. `normal` points from the wall into the cavity and
/// is flattened to the horizontal.
///
/// # Errors
///
/// Returns an error if the normal is vertical or a solid is degenerate.
pub fn magnet_tools(anchor: &Point3, normal: &Vector3, params: &CaseParams) -> Result<MagnetTools> {
    let n = Vector3::new(normal.x, normal.y, 0.0)
        .try_normalize(TOLERANCE)
        .ok_or(GeometryError::ZeroVector)?;
    let t = n.cross(&Vector3::z());
    let r = params.magnet.diameter / 2.0;
    let h = params.magnet.height;
    let center = anchor + n * (r + 3.5);
    let flat = |p: Point3| Point2::new(p.x, p.y);
    let c = flat(center);

    let d_shape = |radius: f64| {
        let mut pts = circle_profile(c, radius, CURVE_SEGMENTS);
        pts.push(flat(anchor + t * radius));
        pts.push(flat(anchor - t * radius));
        convex_hull(&pts)
    };
    let boss = MakePrism::new(d_shape(r + 1.0), 0.0, h + 2.0).execute()?;
    let clearance = MakePrism::new(d_shape(r + 2.0), -1.0, h + 3.0).execute()?;

    let z_lo = -(h + 0.3);
    let z_hi = h - 0.1;
    let bore = MakePrism::new(circle_profile(c, r + 0.4, CURVE_SEGMENTS), z_lo, z_hi).execute()?;
    let mut ribs = Mesh::new();
    for k in 0..MAGNET_RIBS {
        #[allow(clippy::cast_precision_loss)]
        let angle = TAU * k as f64 / MAGNET_RIBS as f64;
        // Measured from the normal so the well mirrors across its own axis.
        let at = center + (n * angle.cos() + t * angle.sin()) * (r + 0.7);
        let rib = MakeCylinder::new(
            Point3::new(at.x, at.y, z_lo - 0.1),
            0.8,
            Vector3::z(),
            z_hi - z_lo + 0.2,
            12,
        )
        .execute()?;
        ribs.merge(&rib)?;
    }
    let pocket = Boolean::new(BooleanOp::Difference)
        .solver(Solver::Exact)
        .execute(&bore, &ribs)?;
    Ok(MagnetTools {
        center,
        normal: n,
        boss,
        pocket,
        clearance,
    })
}
