use serde::{Deserialize, Serialize};

/// Particle-type code stored in each voxel cell.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParticleType {
    Air = 0,
    Sand = 1,
    Dirt = 2,
    Water = 3,
    Sun = 4,
    Fog = 5,
}

impl ParticleType {
    pub const ALL: [ParticleType; 6] = [
        ParticleType::Air,
        ParticleType::Sand,
        ParticleType::Dirt,
        ParticleType::Water,
        ParticleType::Sun,
        ParticleType::Fog,
    ];

    /// Decode a cell byte. Unknown codes return `None`.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|p| *p as u8 == code)
    }

    pub fn code(self) -> u8 {
        self as u8
    }
}

/// Size of a presentation surface in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Minimized windows report a zero-area extent; no surface can be built for it.
    pub fn is_zero_area(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_particle_codes_roundtrip() {
        for p in ParticleType::ALL {
            assert_eq!(ParticleType::from_code(p.code()), Some(p));
        }
        assert_eq!(ParticleType::from_code(6), None);
        assert_eq!(ParticleType::Sand.code(), 1);
        assert_eq!(ParticleType::Fog.code(), 5);
    }

    #[test]
    fn test_zero_area_extent() {
        assert!(Extent::new(0, 720).is_zero_area());
        assert!(Extent::new(1280, 0).is_zero_area());
        assert!(!Extent::new(1, 1).is_zero_area());
    }
}
