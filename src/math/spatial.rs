use std::collections::HashMap;

use super::Point3;

/// Uniform bucket grid over points for radius and nearest queries.
///
/// Items are stored with an arbitrary payload; cells are cubes of side
/// `cell`. Queries scan the neighboring cells only.
#[derive(Debug, Clone)]
pub struct PointGrid<T> {
    cell: f64,
    buckets: HashMap<(i64, i64, i64), Vec<(Point3, T)>>,
    len: usize,
}

impl<T: Copy> PointGrid<T> {
    #[must_use]
    pub fn new(cell: f64) -> Self {
        Self {
            cell: cell.max(1e-9),
            buckets: HashMap::new(),
            len: 0,
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn key(&self, p: &Point3) -> (i64, i64, i64) {
        (
            (p.x / self.cell).floor() as i64,
            (p.y / self.cell).floor() as i64,
            (p.z / self.cell).floor() as i64,
        )
    }

    pub fn insert(&mut self, p: Point3, item: T) {
        let key = self.key(&p);
        self.buckets.entry(key).or_default().push((p, item));
        self.len += 1;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All items within `radius` of `p`, in insertion order per cell.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn within(&self, p: &Point3, radius: f64) -> Vec<(Point3, T)> {
        let (cx, cy, cz) = self.key(p);
        let reach = (radius / self.cell).ceil() as i64;
        let r2 = radius * radius;
        let mut out = Vec::new();
        for dx in -reach..=reach {
            for dy in -reach..=reach {
                for dz in -reach..=reach {
                    if let Some(bucket) = self.buckets.get(&(cx + dx, cy + dy, cz + dz)) {
                        out.extend(
                            bucket
                                .iter()
                                .filter(|(q, _)| (q - p).norm_squared() <= r2)
                                .copied(),
                        );
                    }
                }
            }
        }
        out
    }

    /// Nearest item to `p`, growing the search shell until one is found.
    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    pub fn nearest(&self, p: &Point3) -> Option<(Point3, T)> {
        if self.len == 0 {
            return None;
        }
        let (cx, cy, cz) = self.key(p);
        let mut best: Option<(f64, Point3, T)> = None;
        let mut reach = 0i64;
        loop {
            for dx in -reach..=reach {
                for dy in -reach..=reach {
                    for dz in -reach..=reach {
                        if dx.abs().max(dy.abs()).max(dz.abs()) != reach {
                            continue;
                        }
                        let Some(bucket) = self.buckets.get(&(cx + dx, cy + dy, cz + dz)) else {
                            continue;
                        };
                        for (q, item) in bucket {
                            let d = (q - p).norm_squared();
                            if best.as_ref().is_none_or(|(bd, _, _)| d < *bd) {
                                best = Some((d, *q, *item));
                            }
                        }
                    }
                }
            }
            // Anything outside the scanned shell is at least `reach * cell` away.
            if let Some((d, q, item)) = best {
                #[allow(clippy::cast_precision_loss)]
                let covered = reach as f64 * self.cell;
                if d.sqrt() <= covered {
                    return Some((q, item));
                }
            }
            reach += 1;
            if reach > 1 << 20 {
                return best.map(|(_, q, item)| (q, item));
            }
        }
    }
}
