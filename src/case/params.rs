//! Design parameters of a case.
//!
//! Every field has a default reproducing the reference design, so a TOML
//! file only needs to name the values it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// How columns are arranged around the column arc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnStyle {
    /// Columns rotate about a shared pivot above the well.
    #[default]
    Standard,
    /// Columns rotate about the origin and are spread by the arc chord.
    Orthographic,
    /// Columns are spread by the arc chord without tilting.
    Cylindrical,
}

/// Key matrix and curvature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutParams {
    pub nrows: usize,
    pub ncols: usize,
    /// Row curvature, degrees.
    pub alpha_deg: f64,
    /// Column curvature, degrees.
    pub beta_deg: f64,
    pub tenting_deg: f64,
    pub center_row: usize,
    pub center_col: usize,
    pub column_style: ColumnStyle,
    /// Static XYZ offset per column.
    pub column_offsets: Vec<[f64; 3]>,
    /// Columns that keep their last-row key.
    pub last_row_columns: Vec<usize>,
    /// Makes the last column 1.5u wide.
    pub wide_last_column: bool,
    pub z_offset: f64,
    pub extra_width: f64,
    pub extra_height: f64,
    /// Depth of each key well below the body surface.
    pub key_well_offset: f64,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            nrows: 5,
            ncols: 6,
            alpha_deg: 15.0,
            beta_deg: 5.0,
            tenting_deg: 15.0,
            center_row: 2,
            center_col: 3,
            column_style: ColumnStyle::Standard,
            column_offsets: vec![
                [0.0, 0.0, 0.0],
                [0.0, 0.0, 0.0],
                [0.0, 2.82, -4.5],
                [0.0, 0.0, 0.0],
                [0.0, -12.0, 5.64],
                [0.0, -12.0, 5.64],
            ],
            last_row_columns: vec![2, 3],
            wide_last_column: true,
            z_offset: 9.0,
            extra_width: 2.5,
            extra_height: 1.0,
            key_well_offset: 0.5,
        }
    }
}

impl LayoutParams {
    #[must_use]
    pub fn last_row(&self) -> usize {
        self.nrows - 1
    }

    #[must_use]
    pub fn corner_row(&self) -> usize {
        self.nrows - 2
    }

    #[must_use]
    pub fn last_col(&self) -> usize {
        self.ncols - 1
    }

    /// Whether the matrix has a key at `(column, row)`.
    #[must_use]
    pub fn includes(&self, column: usize, row: usize) -> bool {
        column < self.ncols
            && row < self.nrows
            && (row != self.last_row() || self.last_row_columns.contains(&column))
    }

    /// Number of finger keys the matrix keeps.
    #[must_use]
    pub fn finger_key_count(&self) -> usize {
        (0..self.ncols)
            .flat_map(|column| (0..self.nrows).map(move |row| (column, row)))
            .filter(|(column, row)| self.includes(*column, *row))
            .count()
    }

    /// First and last column keeping the last row.
    #[must_use]
    pub fn last_row_span(&self) -> (usize, usize) {
        let first = self.last_row_columns.iter().copied().min().unwrap_or(0);
        let last = self.last_row_columns.iter().copied().max().unwrap_or(0);
        (first, last)
    }
}

/// Switch and mount dimensions, millimetres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchParams {
    pub keyswitch_width: f64,
    pub keyswitch_height: f64,
    pub mount_width: f64,
    pub mount_height: f64,
    pub mount_thickness: f64,
    pub sa_key_height: f64,
}

impl Default for SwitchParams {
    fn default() -> Self {
        Self {
            keyswitch_width: 14.4,
            keyswitch_height: 14.4,
            mount_width: 17.4,
            mount_height: 17.4,
            mount_thickness: 4.0,
            sa_key_height: 12.7,
        }
    }
}

/// One thumb key: extrinsic XYZ rotation in degrees and a translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbKey {
    pub rotation_deg: [f64; 3],
    pub offset: [f64; 3],
    #[serde(default)]
    pub wide: bool,
}

impl ThumbKey {
    fn new(rotation_deg: [f64; 3], offset: [f64; 3], wide: bool) -> Self {
        Self {
            rotation_deg,
            offset,
            wide,
        }
    }
}

/// Thumb cluster layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbParams {
    pub cluster_offset: [f64; 3],
    pub keys: Vec<ThumbKey>,
}

impl Default for ThumbParams {
    fn default() -> Self {
        Self {
            cluster_offset: [6.0, -3.0, 7.0],
            keys: vec![
                ThumbKey::new([-4.0, -35.0, 52.0], [-56.3, -43.3, -23.5], false),
                ThumbKey::new([-16.0, -33.0, 54.0], [-37.8, -55.3, -25.3], false),
                ThumbKey::new([6.0, -34.0, 40.0], [-51.0, -25.0, -12.0], false),
                ThumbKey::new([-6.0, -34.0, 48.0], [-29.0, -40.0, -13.0], false),
                ThumbKey::new([10.0, -23.0, 10.0], [-32.0, -15.0, -2.0], true),
                ThumbKey::new([10.0, -23.0, 10.0], [-12.0, -16.0, 3.0], true),
            ],
        }
    }
}

/// Wall ring profiles: one `(width, depth)` pair per ring, measured from
/// the plate edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallParams {
    pub profile: Vec<[f64; 2]>,
    pub left_profile: Vec<[f64; 2]>,
    pub right_profile: Vec<[f64; 2]>,
    /// Smooths and relaxes the skirt below the key wells.
    pub relaxed: bool,
    pub relax_iterations: usize,
    /// Minimum height of any ring above the floor.
    pub floor_clearance: f64,
}

impl Default for WallParams {
    fn default() -> Self {
        Self {
            profile: vec![[2.0, -1.0], [7.0, -15.0], [7.0, -18.5]],
            left_profile: vec![[2.0, -1.0], [10.5, -9.5], [7.5, -23.5]],
            right_profile: vec![[2.0, -1.0], [7.0, -15.0], [8.0, -25.0]],
            relaxed: true,
            relax_iterations: 1,
            floor_clearance: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyParams {
    pub thickness: f64,
    pub subdivisions: usize,
    /// Sculpted "geode" surface instead of plain subdivision.
    pub organic: bool,
}

impl Default for BodyParams {
    fn default() -> Self {
        Self {
            thickness: 2.0,
            subdivisions: 1,
            organic: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureFlags {
    pub switch_supports: bool,
    pub connector_port: bool,
    pub magnets: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            switch_supports: true,
            connector_port: true,
            magnets: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagnetParams {
    pub diameter: f64,
    pub height: f64,
}

impl Default for MagnetParams {
    fn default() -> Self {
        Self {
            diameter: 6.2,
            height: 2.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BottomParams {
    pub thickness: f64,
    /// Gap between the plate outline and the inner wall.
    pub clearance: f64,
}

impl Default for BottomParams {
    fn default() -> Self {
        Self {
            thickness: 3.0,
            clearance: 0.2,
        }
    }
}

/// Connector holder dimensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortParams {
    pub holder_width: f64,
    pub holder_height: f64,
}

impl Default for PortParams {
    fn default() -> Self {
        Self {
            holder_width: 31.74,
            holder_height: 15.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CarvingParams {
    /// Treats residual non-manifold edges after a boolean as fatal.
    pub strict_manifold: bool,
    pub weld_distance: f64,
}

impl Default for CarvingParams {
    fn default() -> Self {
        Self {
            strict_manifold: false,
            weld_distance: 0.05,
        }
    }
}

/// Every input of the generator.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseParams {
    pub layout: LayoutParams,
    pub switch: SwitchParams,
    pub thumb: ThumbParams,
    pub walls: WallParams,
    pub body: BodyParams,
    pub features: FeatureFlags,
    pub magnet: MagnetParams,
    pub bottom: BottomParams,
    pub port: PortParams,
    pub carving: CarvingParams,
}

/// Number of keys in the thumb cluster; the thumb plate is built for it.
pub const THUMB_KEYS: usize = 6;

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn positive(field: &'static str, value: f64) -> std::result::Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be positive, got {value}")))
    }
}

impl CaseParams {
    /// Parses and validates parameters from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` for malformed TOML and
    /// `ConfigError::Invalid` for an inconsistent parameter set.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let params: Self = toml::from_str(text).map_err(ConfigError::from)?;
        params.validate()?;
        Ok(params)
    }

    /// Reads and validates a TOML parameter file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, otherwise as
    /// [`CaseParams::from_toml_str`].
    pub fn from_path(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::from)?;
        Self::from_toml_str(&text)
    }

    /// Dumps the parameters as TOML.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Serialize` if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self).map_err(ConfigError::from)?)
    }

    /// Checks the parameter set for consistency.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        self.validate_layout()?;
        self.validate_dimensions()?;
        self.validate_walls()?;
        Ok(())
    }

    fn validate_layout(&self) -> std::result::Result<(), ConfigError> {
        let l = &self.layout;
        if l.nrows < 3 {
            return Err(invalid("layout.nrows", "needs at least 3 rows"));
        }
        if l.ncols < 4 {
            return Err(invalid("layout.ncols", "needs at least 4 columns"));
        }
        if l.center_row >= l.nrows {
            return Err(invalid("layout.center_row", "outside the key matrix"));
        }
        if l.center_col >= l.ncols {
            return Err(invalid("layout.center_col", "outside the key matrix"));
        }
        if l.column_offsets.len() != l.ncols {
            return Err(invalid(
                "layout.column_offsets",
                format!("{} entries for {} columns", l.column_offsets.len(), l.ncols),
            ));
        }
        for (name, value) in [
            ("layout.alpha_deg", l.alpha_deg),
            ("layout.beta_deg", l.beta_deg),
        ] {
            if !(value.is_finite() && value > 0.0 && value < 90.0) {
                return Err(invalid(name, format!("must lie in (0, 90), got {value}")));
            }
        }
        if !l.tenting_deg.is_finite() || l.tenting_deg.abs() >= 90.0 {
            return Err(invalid("layout.tenting_deg", "must lie in (-90, 90)"));
        }

        let mut cols = l.last_row_columns.clone();
        cols.sort_unstable();
        cols.dedup();
        let (Some(first), Some(last)) = (cols.first().copied(), cols.last().copied()) else {
            return Err(invalid("layout.last_row_columns", "must name at least one column"));
        };
        if last - first + 1 != cols.len() {
            return Err(invalid("layout.last_row_columns", "columns must be contiguous"));
        }
        if first < 2 || first + 2 > l.ncols {
            return Err(invalid(
                "layout.last_row_columns",
                format!("must start between column 2 and column {}", l.ncols - 2),
            ));
        }
        if last >= l.ncols {
            return Err(invalid("layout.last_row_columns", "outside the key matrix"));
        }
        if self.thumb.keys.len() != THUMB_KEYS {
            return Err(invalid(
                "thumb.keys",
                format!("expected {THUMB_KEYS} entries, got {}", self.thumb.keys.len()),
            ));
        }
        Ok(())
    }

    fn validate_dimensions(&self) -> std::result::Result<(), ConfigError> {
        let s = &self.switch;
        positive("switch.keyswitch_width", s.keyswitch_width)?;
        positive("switch.keyswitch_height", s.keyswitch_height)?;
        positive("switch.mount_thickness", s.mount_thickness)?;
        if s.mount_width <= s.keyswitch_width || s.mount_height <= s.keyswitch_height {
            return Err(invalid("switch.mount_width", "mount must be larger than the switch"));
        }
        positive("body.thickness", self.body.thickness)?;
        positive("magnet.diameter", self.magnet.diameter)?;
        positive("magnet.height", self.magnet.height)?;
        positive("port.holder_width", self.port.holder_width)?;
        positive("port.holder_height", self.port.holder_height)?;
        positive("carving.weld_distance", self.carving.weld_distance)?;
        if !(self.bottom.thickness.is_finite() && self.bottom.thickness > 1.0) {
            return Err(invalid("bottom.thickness", "must be thicker than 1 mm"));
        }
        if !(self.bottom.clearance.is_finite() && self.bottom.clearance >= 0.0) {
            return Err(invalid("bottom.clearance", "must not be negative"));
        }
        Ok(())
    }

    fn validate_walls(&self) -> std::result::Result<(), ConfigError> {
        let w = &self.walls;
        let n = w.profile.len();
        if n == 0 || n > 8 {
            return Err(invalid("walls.profile", "needs between 1 and 8 rings"));
        }
        if w.left_profile.len() != n || w.right_profile.len() != n {
            return Err(invalid("walls.left_profile", "all ring profiles need the same length"));
        }
        let all = w.profile.iter().chain(&w.left_profile).chain(&w.right_profile);
        if all.clone().any(|[width, depth]| !width.is_finite() || !depth.is_finite()) {
            return Err(invalid("walls.profile", "values must be finite"));
        }
        if all.clone().any(|[width, _]| *width <= 0.0) {
            return Err(invalid("walls.profile", "ring widths must be positive"));
        }
        if !(w.floor_clearance.is_finite() && w.floor_clearance >= 0.0) {
            return Err(invalid("walls.floor_clearance", "must not be negative"));
        }
        Ok(())
    }

    /// Number of wall rings beyond the plate edge.
    #[must_use]
    pub fn ring_count(&self) -> usize {
        self.walls.profile.len()
    }

    /// Floor plane height.
    #[must_use]
    pub fn floor_z(&self) -> f64 {
        -self.bottom.thickness
    }
}
