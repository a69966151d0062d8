use cascade_core::constants::PHYSICS_SUBPASSES;
use cascade_core::push::PhysicsConstants;
use glam::IVec3;

use crate::jitter::SeamJitter;

/// One of the eight octants of a chunk, as a 3-bit corner code.
///
/// Written `xyz`: bit 2 selects x, bit 1 selects y, bit 0 selects z.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Octant(pub u8);

impl Octant {
    /// Corner vector with each component 0 or 1.
    pub fn location(self) -> IVec3 {
        IVec3::new(
            ((self.0 >> 2) & 1) as i32,
            ((self.0 >> 1) & 1) as i32,
            (self.0 & 1) as i32,
        )
    }
}

/// Fixed sub-pass order. The same every tick.
pub const OCTANT_ORDER: [Octant; PHYSICS_SUBPASSES] = [
    Octant(0b000),
    Octant(0b100),
    Octant(0b001),
    Octant(0b101),
    Octant(0b010),
    Octant(0b110),
    Octant(0b011),
    Octant(0b111),
];

/// A single physics dispatch within a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubPass {
    pub octant: Octant,
    /// Jitter subtracted from the octant origin on every axis.
    pub jitter: i32,
    pub offset: IVec3,
}

impl SubPass {
    pub fn constants(&self) -> PhysicsConstants {
        PhysicsConstants::new(self.offset, self.octant.location())
    }
}

/// Plan the eight sub-passes of one tick.
///
/// Each sub-pass draws its own jitter in `[0, chunk_size - 1]` so dispatch
/// seams land in different places from tick to tick.
pub fn plan_tick(chunk_size: u32, jitter: &mut SeamJitter) -> [SubPass; PHYSICS_SUBPASSES] {
    let half = (chunk_size / 2) as i32;
    OCTANT_ORDER.map(|octant| {
        let j = jitter.next_below(chunk_size) as i32;
        SubPass {
            octant,
            jitter: j,
            offset: octant.location() * half - IVec3::splat(j),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_octant_order() {
        let codes: Vec<u8> = OCTANT_ORDER.iter().map(|o| o.0).collect();
        assert_eq!(
            codes,
            vec![0b000, 0b100, 0b001, 0b101, 0b010, 0b110, 0b011, 0b111]
        );
    }

    #[test]
    fn test_octant_locations() {
        let locations: Vec<IVec3> = OCTANT_ORDER.iter().map(|o| o.location()).collect();
        assert_eq!(
            locations,
            vec![
                IVec3::new(0, 0, 0),
                IVec3::new(1, 0, 0),
                IVec3::new(0, 0, 1),
                IVec3::new(1, 0, 1),
                IVec3::new(0, 1, 0),
                IVec3::new(1, 1, 0),
                IVec3::new(0, 1, 1),
                IVec3::new(1, 1, 1),
            ]
        );
    }

    #[test]
    fn test_every_octant_visited_once() {
        let mut seen = std::collections::HashSet::new();
        for o in OCTANT_ORDER {
            assert!(seen.insert(o.location()), "octant {:03b} repeated", o.0);
        }
        assert_eq!(seen.len(), 8);
    }

    #[test]
    fn test_plan_offsets() {
        let mut jitter = SeamJitter::new(11);
        for _ in 0..100 {
            let plan = plan_tick(16, &mut jitter);
            for (sp, octant) in plan.iter().zip(OCTANT_ORDER) {
                assert_eq!(sp.octant, octant);
                assert!((0..16).contains(&sp.jitter), "jitter {} out of range", sp.jitter);
                let expected = octant.location() * 8 - IVec3::splat(sp.jitter);
                assert_eq!(sp.offset, expected);
            }
        }
    }

    #[test]
    fn test_jitter_drawn_per_subpass() {
        let mut jitter = SeamJitter::new(3);
        let plan = plan_tick(16, &mut jitter);
        let distinct: std::collections::HashSet<i32> = plan.iter().map(|sp| sp.jitter).collect();
        assert!(distinct.len() > 1, "all eight sub-passes drew the same jitter");
    }

    #[test]
    fn test_subpass_constants() {
        let sp = SubPass {
            octant: Octant(0b101),
            jitter: 3,
            offset: IVec3::new(5, -3, 5),
        };
        let pc = sp.constants();
        assert_eq!(pc.location, [1, 0, 1]);
        assert_eq!(pc.offset, [5, -3, 5]);
    }
}
