//! Key placement on the curved well.
//!
//! Each finger key starts at the origin, is swung along the row arc about
//! X, arranged along the column arc according to the column style, shifted
//! by its column offset, tented about Y and lifted. Thumb keys take an
//! explicit rotation and offset relative to the thumb origin, a corner of
//! the column-1 corner-row key.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, info, instrument};

use crate::error::{Result, SelectionError};
use crate::math::frame::{euler_xyz, rotation_x_about, rotation_y_about, translation};
use crate::math::{Isometry3, Point3, UnitQuaternion, Vector3};

use super::params::{CaseParams, ColumnStyle};

/// Identity of a key position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyId {
    Finger { column: usize, row: usize },
    Thumb(usize),
}

impl KeyId {
    #[must_use]
    pub fn is_thumb(self) -> bool {
        matches!(self, KeyId::Thumb(_))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Finger { column, row } => write!(f, "c{column}r{row}"),
            KeyId::Thumb(i) => write!(f, "t{i}"),
        }
    }
}

/// Keycap width class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeClass {
    One,
    OneAndHalf,
}

impl SizeClass {
    /// Width multiplier along the long side.
    #[must_use]
    pub fn factor(self) -> f64 {
        match self {
            SizeClass::One => 1.0,
            SizeClass::OneAndHalf => 1.5,
        }
    }
}

/// Where one key sits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeyPlacement {
    pub id: KeyId,
    pub size: SizeClass,
    /// Tools for this key are turned a quarter about its Z axis.
    pub rotated_tools: bool,
    pub transform: Isometry3,
}

impl KeyPlacement {
    /// Key centre at the bottom of the mount.
    #[must_use]
    pub fn origin(&self) -> Point3 {
        self.transform * Point3::origin()
    }

    /// Key Z axis.
    #[must_use]
    pub fn normal(&self) -> Vector3 {
        self.transform * Vector3::z()
    }

    #[must_use]
    pub fn to_world(&self, local: &Point3) -> Point3 {
        self.transform * local
    }

    /// Transform for tool geometry built in key-local coordinates.
    #[must_use]
    pub fn tool_transform(&self) -> Isometry3 {
        if self.rotated_tools {
            self.transform
                * Isometry3::from_parts(
                    nalgebra::Translation3::identity(),
                    UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2),
                )
        } else {
            self.transform
        }
    }
}

/// Placements of every key, ordered finger keys first (column-major) then
/// thumb keys.
#[derive(Debug, Clone)]
pub struct Layout {
    keys: BTreeMap<KeyId, KeyPlacement>,
    thumb_origin: Point3,
}

impl Layout {
    #[must_use]
    pub fn get(&self, id: KeyId) -> Option<&KeyPlacement> {
        self.keys.get(&id)
    }

    /// The placement of a key that must exist.
    ///
    /// # Errors
    ///
    /// Returns `SelectionError::MissingObject` if the key is not placed.
    pub fn require(&self, id: KeyId) -> Result<&KeyPlacement> {
        self.keys
            .get(&id)
            .ok_or_else(|| SelectionError::MissingObject(format!("key {id}")).into())
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyPlacement> {
        self.keys.values()
    }

    pub fn finger_keys(&self) -> impl Iterator<Item = &KeyPlacement> {
        self.keys.values().filter(|k| !k.id.is_thumb())
    }

    pub fn thumb_keys(&self) -> impl Iterator<Item = &KeyPlacement> {
        self.keys.values().filter(|k| k.id.is_thumb())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[must_use]
    pub fn thumb_origin(&self) -> Point3 {
        self.thumb_origin
    }
}

/// Computes the [`Layout`] of a parameter set.
pub struct PlaceKeys<'a> {
    params: &'a CaseParams,
}

impl<'a> PlaceKeys<'a> {
    #[must_use]
    pub fn new(params: &'a CaseParams) -> Self {
        Self { params }
    }

    /// Executes the placement.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the parameters are invalid, or
    /// `SelectionError::MissingObject` if the thumb anchor key is excluded.
    #[instrument(skip_all)]
    pub fn execute(&self) -> Result<Layout> {
        self.params.validate()?;
        let layout = &self.params.layout;
        let mut keys = BTreeMap::new();
        for column in 0..layout.ncols {
            for row in 0..layout.nrows {
                if !layout.includes(column, row) {
                    continue;
                }
                let wide = layout.wide_last_column && column == layout.last_col();
                let id = KeyId::Finger { column, row };
                let transform = self.finger_transform(column, row);
                debug!(key = %id, origin = ?(transform * Point3::origin()), "placed finger key");
                keys.insert(
                    id,
                    KeyPlacement {
                        id,
                        size: if wide { SizeClass::OneAndHalf } else { SizeClass::One },
                        rotated_tools: wide,
                        transform,
                    },
                );
            }
        }

        let anchor_id = KeyId::Finger {
            column: 1,
            row: layout.corner_row(),
        };
        let anchor = keys
            .get(&anchor_id)
            .ok_or_else(|| SelectionError::MissingObject(format!("thumb anchor key {anchor_id}")))?;
        let sw = &self.params.switch;
        let thumb_origin =
            anchor.to_world(&Point3::new(sw.mount_height / 2.0, -sw.mount_width / 2.0, 0.0));

        let cluster = Vector3::from(self.params.thumb.cluster_offset);
        for (i, key) in self.params.thumb.keys.iter().enumerate() {
            let [rx, ry, rz] = key.rotation_deg.map(f64::to_radians);
            let shift = thumb_origin.coords + cluster + Vector3::from(key.offset);
            let transform = Isometry3::from_parts(shift.into(), euler_xyz(rx, ry, rz));
            let id = KeyId::Thumb(i);
            keys.insert(
                id,
                KeyPlacement {
                    id,
                    size: if key.wide { SizeClass::OneAndHalf } else { SizeClass::One },
                    rotated_tools: false,
                    transform,
                },
            );
        }
        info!(
            keys = keys.len(),
            finger = layout.finger_key_count(),
            "placed keys"
        );
        Ok(Layout { keys, thumb_origin })
    }

    /// Rigid transform of finger key `(column, row)`.
    #[allow(clippy::cast_precision_loss)]
    fn finger_transform(&self, column: usize, row: usize) -> Isometry3 {
        let layout = &self.params.layout;
        let sw = &self.params.switch;
        let alpha = layout.alpha_deg.to_radians();
        let beta = layout.beta_deg.to_radians();

        let cap_top = sw.mount_thickness + sw.sa_key_height;
        let row_radius = ((sw.mount_height + layout.extra_height) / 2.0) / (alpha / 2.0).sin() + cap_top;
        let column_radius =
            ((sw.mount_width + layout.extra_width) / 2.0) / (beta / 2.0).sin() + cap_top;

        let bias = if layout.wide_last_column && column == layout.last_col() {
            0.25
        } else {
            0.0
        };
        let from_center = column as f64 - layout.center_col as f64 + bias;
        let column_angle = -beta * from_center;

        let row_swing = rotation_x_about(
            alpha * (layout.center_row as f64 - row as f64),
            &Point3::new(0.0, 0.0, row_radius),
        );
        let spread = translation(Vector3::new(
            from_center * (1.0 + column_radius * beta.sin()),
            0.0,
            column_radius * (1.0 - column_angle.cos()),
        ));
        let arc = match layout.column_style {
            ColumnStyle::Standard => {
                rotation_y_about(column_angle, &Point3::new(0.0, 0.0, column_radius))
            }
            ColumnStyle::Orthographic => spread * rotation_y_about(column_angle, &Point3::origin()),
            ColumnStyle::Cylindrical => spread,
        };
        let offset = translation(Vector3::from(layout.column_offsets[column]));
        let tent = rotation_y_about(layout.tenting_deg.to_radians(), &Point3::origin());
        let lift = translation(Vector3::new(0.0, 0.0, layout.z_offset));
        lift * tent * offset * arc * row_swing
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::case::params::THUMB_KEYS;
    use approx::assert_relative_eq;

    fn layout(params: &CaseParams) -> Layout {
        PlaceKeys::new(params).execute().unwrap()
    }

    #[test]
    fn reference_matrix_follows_the_inclusion_policy() {
        let params = CaseParams::default();
        let layout = layout(&params);
        let fingers = params.layout.finger_key_count();
        assert_eq!(fingers, 26);
        assert_eq!(layout.finger_keys().count(), fingers);
        assert_eq!(layout.thumb_keys().count(), THUMB_KEYS);
        assert_eq!(layout.len(), fingers + THUMB_KEYS);
        assert!(layout.get(KeyId::Finger { column: 0, row: 4 }).is_none());
        assert!(layout.get(KeyId::Finger { column: 3, row: 4 }).is_some());
    }

    #[test]
    fn transforms_are_rigid_and_bounded() {
        let layout = layout(&CaseParams::default());
        for key in layout.iter() {
            let m = key.transform.rotation.to_rotation_matrix();
            let m = m.matrix();
            assert_relative_eq!(m.determinant(), 1.0, epsilon = 1e-9);
            assert_relative_eq!(m.transpose() * m, crate::math::Matrix3::identity(), epsilon = 1e-9);
            let o = key.origin();
            assert!(o.x.abs() < 150.0 && o.y.abs() < 150.0 && o.z.abs() < 150.0, "{o:?}");
        }
    }

    #[test]
    fn rows_run_toward_the_user() {
        let layout = layout(&CaseParams::default());
        let top = layout.require(KeyId::Finger { column: 3, row: 0 }).unwrap();
        let bottom = layout.require(KeyId::Finger { column: 3, row: 4 }).unwrap();
        assert!(top.origin().y > bottom.origin().y);
        // Far keys tilt back toward the typist.
        assert!(top.normal().y < 0.0);
    }

    #[test]
    fn tenting_raises_the_inner_columns() {
        let layout = layout(&CaseParams::default());
        let inner = layout.require(KeyId::Finger { column: 0, row: 2 }).unwrap();
        let outer = layout.require(KeyId::Finger { column: 5, row: 2 }).unwrap();
        assert!(inner.origin().x < outer.origin().x);
        assert!(inner.origin().z > outer.origin().z);
    }

    #[test]
    fn center_key_sits_under_the_pivots() {
        let mut params = CaseParams::default();
        params.layout.tenting_deg = 0.0;
        let layout = layout(&params);
        let center = layout.require(KeyId::Finger { column: 3, row: 2 }).unwrap();
        assert_relative_eq!(center.origin(), Point3::new(0.0, 0.0, 9.0), epsilon = 1e-9);
    }

    #[test]
    fn column_styles_agree_at_the_center_column() {
        let mut params = CaseParams::default();
        let standard = layout(&params);
        params.layout.column_style = ColumnStyle::Orthographic;
        let ortho = layout(&params);
        params.layout.column_style = ColumnStyle::Cylindrical;
        let cyl = layout(&params);
        let id = KeyId::Finger { column: 3, row: 1 };
        let a = standard.require(id).unwrap().origin();
        assert_relative_eq!(a, ortho.require(id).unwrap().origin(), epsilon = 1e-9);
        assert_relative_eq!(a, cyl.require(id).unwrap().origin(), epsilon = 1e-9);
        let off = KeyId::Finger { column: 0, row: 1 };
        assert!((standard.require(off).unwrap().origin() - cyl.require(off).unwrap().origin()).norm() > 0.1);
    }

    #[test]
    fn wide_last_column_uses_rotated_long_tools() {
        let layout = layout(&CaseParams::default());
        let pinky = layout.require(KeyId::Finger { column: 5, row: 1 }).unwrap();
        assert_eq!(pinky.size, SizeClass::OneAndHalf);
        assert!(pinky.rotated_tools);
        let x = pinky.tool_transform() * Vector3::x();
        let y = pinky.transform * Vector3::y();
        assert_relative_eq!(x, y, epsilon = 1e-9);
        assert_eq!(layout.require(KeyId::Thumb(4)).unwrap().size, SizeClass::OneAndHalf);
        assert_eq!(layout.require(KeyId::Thumb(0)).unwrap().size, SizeClass::One);
    }

    #[test]
    fn thumb_origin_is_anchor_corner() {
        let params = CaseParams::default();
        let layout = layout(&params);
        let anchor = layout.require(KeyId::Finger { column: 1, row: 3 }).unwrap();
        let expected = anchor.to_world(&Point3::new(8.7, -8.7, 0.0));
        assert_relative_eq!(layout.thumb_origin(), expected, epsilon = 1e-9);
        let t4 = layout.require(KeyId::Thumb(4)).unwrap();
        let shift = expected.coords + Vector3::new(6.0, -3.0, 7.0) + Vector3::new(-32.0, -15.0, -2.0);
        assert_relative_eq!(t4.origin().coords, shift, epsilon = 1e-9);
    }
}
