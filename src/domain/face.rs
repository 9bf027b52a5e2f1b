//! Faces of a subdomain block.

use std::fmt;

use bitflags::bitflags;

/// One of the six faces of a block, ordered −x, +x, −y, +y, −z, +z.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Face {
    XMinus = 0,
    XPlus = 1,
    YMinus = 2,
    YPlus = 3,
    ZMinus = 4,
    ZPlus = 5,
}

impl Face {
    /// Fixed traversal order used for halo exchange on every rank.
    pub const ALL: [Face; 6] = [
        Face::XMinus,
        Face::XPlus,
        Face::YMinus,
        Face::YPlus,
        Face::ZMinus,
        Face::ZPlus,
    ];

    pub fn opposite(self) -> Face {
        match self {
            Face::XMinus => Face::XPlus,
            Face::XPlus => Face::XMinus,
            Face::YMinus => Face::YPlus,
            Face::YPlus => Face::YMinus,
            Face::ZMinus => Face::ZPlus,
            Face::ZPlus => Face::ZMinus,
        }
    }

    /// Axis normal to the face: 0 = x, 1 = y, 2 = z.
    pub fn axis(self) -> usize {
        self as usize / 2
    }

    /// True for the face on the high side of its axis.
    pub fn is_upper(self) -> bool {
        self as usize % 2 == 1
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(idx: usize) -> Option<Face> {
        Face::ALL.get(idx).copied()
    }

    pub fn flag(self) -> FaceSet {
        FaceSet::from_bits_truncate(1 << self as u8)
    }
}

impl fmt::Display for Face {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Face::XMinus => "-x",
            Face::XPlus => "+x",
            Face::YMinus => "-y",
            Face::YPlus => "+y",
            Face::ZMinus => "-z",
            Face::ZPlus => "+z",
        };
        f.write_str(s)
    }
}

bitflags! {
    /// A subset of the six faces of a block.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct FaceSet: u8 {
        const X_MINUS = 0b00_0001;
        const X_PLUS  = 0b00_0010;
        const Y_MINUS = 0b00_0100;
        const Y_PLUS  = 0b00_1000;
        const Z_MINUS = 0b01_0000;
        const Z_PLUS  = 0b10_0000;
        const X_AXIS  = Self::X_MINUS.bits() | Self::X_PLUS.bits();
        const Y_AXIS  = Self::Y_MINUS.bits() | Self::Y_PLUS.bits();
        const Z_AXIS  = Self::Z_MINUS.bits() | Self::Z_PLUS.bits();
    }
}

impl FaceSet {
    pub fn contains_face(&self, face: Face) -> bool {
        self.contains(face.flag())
    }

    /// Faces of the set in `Face::ALL` order.
    pub fn faces(&self) -> impl Iterator<Item = Face> + '_ {
        Face::ALL.into_iter().filter(move |f| self.contains_face(*f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_is_an_involution_on_the_same_axis() {
        for f in Face::ALL {
            assert_ne!(f, f.opposite());
            assert_eq!(f.opposite().opposite(), f);
            assert_eq!(f.axis(), f.opposite().axis());
            assert_ne!(f.is_upper(), f.opposite().is_upper());
            assert_eq!(Face::from_index(f.index()), Some(f));
        }
        assert_eq!(Face::from_index(6), None);
    }

    #[test]
    fn flags_line_up_with_faces() {
        assert_eq!(Face::ZMinus.flag(), FaceSet::Z_MINUS);
        let set = FaceSet::X_AXIS | FaceSet::Z_PLUS;
        let faces: Vec<Face> = set.faces().collect();
        assert_eq!(faces, vec![Face::XMinus, Face::XPlus, Face::ZPlus]);
        assert!(FaceSet::all().faces().eq(Face::ALL));
    }
}
