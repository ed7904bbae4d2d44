//! Names of the vertex regions tracked through the pipeline.

use std::fmt;

use super::placement::KeyId;

/// Which plate a boundary feature belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Plate {
    Finger,
    Thumb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    Top,
    Left,
    Right,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Corner {
    TopLeft,
    /// Thumb plate: where the left side meets the seam.
    TopLowerLeft,
    /// Thumb plate: between the lower thumb pair and the upper keys.
    MiddleLeft,
    BottomLeft,
    TopRight,
    BottomRight,
}

/// The three boundary runs along which the finger and thumb plates meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Seam {
    Left,
    Mid,
    Right,
}

/// A tracked vertex region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Tag {
    /// The well face of one key.
    Key(KeyId),
    /// Every key face of a plate.
    Keys(Plate),
    Side(Plate, Side),
    Corner(Plate, Corner),
    /// One plate's half of a seam.
    Bridge(Plate, Seam),
    /// Outer-boundary vertices at the ends of the seam.
    SeamEnd(Seam),
    /// Plate edge (0) and successive wall rings.
    Ring(u8),
    /// The wall's bottom loop on the floor plane.
    Floor,
    Outer,
    Inner,
    /// The strip joining outer and inner shells along the floor.
    Bottom,
}

impl Tag {
    /// Every key face of either plate.
    pub const ALL_KEYS: [Tag; 2] = [Tag::Keys(Plate::Finger), Tag::Keys(Plate::Thumb)];
}

impl fmt::Display for Plate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Plate::Finger => "finger",
            Plate::Thumb => "thumb",
        })
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tag::Key(id) => write!(f, "key@{id}"),
            Tag::Keys(plate) => write!(f, "key_{plate}"),
            Tag::Side(plate, side) => {
                let side = match side {
                    Side::Top => "TOP",
                    Side::Left => "LEFT",
                    Side::Right => "RIGHT",
                    Side::Bottom => "BOTTOM",
                };
                write!(f, "{plate}_{side}")
            }
            Tag::Corner(plate, corner) => {
                let corner = match corner {
                    Corner::TopLeft => "TL",
                    Corner::TopLowerLeft => "TLL",
                    Corner::MiddleLeft => "ML",
                    Corner::BottomLeft => "BL",
                    Corner::TopRight => "TR",
                    Corner::BottomRight => "BR",
                };
                write!(f, "{plate}_corner_{corner}")
            }
            Tag::Bridge(plate, seam) => write!(f, "BRIDGE_{}({plate})", seam_name(*seam)),
            Tag::SeamEnd(seam) => write!(f, "BRIDGE_{}_RING_0", seam_name(*seam)),
            Tag::Ring(k) => write!(f, "RING_{k}"),
            Tag::Floor => f.write_str("FLOOR"),
            Tag::Outer => f.write_str("OUTER"),
            Tag::Inner => f.write_str("INNER"),
            Tag::Bottom => f.write_str("BOTTOM"),
        }
    }
}

fn seam_name(seam: Seam) -> &'static str {
    match seam {
        Seam::Left => "LEFT",
        Seam::Mid => "MID",
        Seam::Right => "RIGHT",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_follow_the_plate_conventions() {
        assert_eq!(Tag::Key(KeyId::Finger { column: 2, row: 4 }).to_string(), "key@c2r4");
        assert_eq!(Tag::Key(KeyId::Thumb(5)).to_string(), "key@t5");
        assert_eq!(Tag::Side(Plate::Finger, Side::Top).to_string(), "finger_TOP");
        assert_eq!(
            Tag::Corner(Plate::Thumb, Corner::TopLowerLeft).to_string(),
            "thumb_corner_TLL"
        );
        assert_eq!(Tag::SeamEnd(Seam::Right).to_string(), "BRIDGE_RIGHT_RING_0");
        assert_eq!(Tag::Ring(3).to_string(), "RING_3");
    }

    #[test]
    fn tags_order_keys_first() {
        let mut tags = vec![Tag::Ring(0), Tag::Outer, Tag::Key(KeyId::Thumb(0))];
        tags.sort();
        assert_eq!(tags[0], Tag::Key(KeyId::Thumb(0)));
    }
}
