use crate::error::FormatError;
use crate::types::ParticleType;

/// Grid dimensions in cells. Fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDims {
    pub x: u16,
    pub y: u16,
    pub z: u16,
}

impl GridDims {
    pub fn new(x: u16, y: u16, z: u16) -> Self {
        Self { x, y, z }
    }

    pub fn cube(size: u16) -> Self {
        Self::new(size, size, size)
    }

    /// Total cell count. Cannot overflow: 65535^3 fits in 64 bits.
    pub fn volume(self) -> usize {
        self.x as usize * self.y as usize * self.z as usize
    }

    pub fn is_cube(self) -> bool {
        self.x == self.y && self.y == self.z
    }

    /// Linear index, z-major then y then x.
    pub fn index(self, x: u16, y: u16, z: u16) -> usize {
        let (sx, sy) = (self.x as usize, self.y as usize);
        z as usize * sy * sx + y as usize * sx + x as usize
    }

    pub fn as_ivec3(self) -> glam::IVec3 {
        glam::IVec3::new(self.x as i32, self.y as i32, self.z as i32)
    }
}

/// Fixed-size 3D lattice of particle-type codes.
///
/// The byte buffer always holds exactly `dims.volume()` cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoxelGrid {
    dims: GridDims,
    data: Vec<u8>,
}

impl VoxelGrid {
    /// Create an all-air grid. Fails if any dimension is zero.
    pub fn new(dims: GridDims) -> Result<Self, FormatError> {
        if dims.volume() == 0 {
            return Err(FormatError::EmptyVolume {
                x: dims.x,
                y: dims.y,
                z: dims.z,
            });
        }
        Ok(Self {
            dims,
            data: vec![ParticleType::Air.code(); dims.volume()],
        })
    }

    /// Wrap an existing cell buffer, checking it against the declared volume.
    pub fn from_bytes(dims: GridDims, data: Vec<u8>) -> Result<Self, FormatError> {
        if dims.volume() == 0 {
            return Err(FormatError::EmptyVolume {
                x: dims.x,
                y: dims.y,
                z: dims.z,
            });
        }
        if data.len() != dims.volume() {
            return Err(FormatError::SizeMismatch {
                expected: dims.volume(),
                actual: data.len(),
            });
        }
        Ok(Self { dims, data })
    }

    pub fn dims(&self) -> GridDims {
        self.dims
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    /// # Panics
    /// Panics if the coordinate lies outside the grid.
    pub fn read(&self, x: u16, y: u16, z: u16) -> u8 {
        self.data[self.checked_index(x, y, z)]
    }

    /// # Panics
    /// Panics if the coordinate lies outside the grid.
    pub fn write(&mut self, x: u16, y: u16, z: u16, value: u8) {
        let idx = self.checked_index(x, y, z);
        self.data[idx] = value;
    }

    fn checked_index(&self, x: u16, y: u16, z: u16) -> usize {
        assert!(
            x < self.dims.x && y < self.dims.y && z < self.dims.z,
            "cell ({x}, {y}, {z}) outside grid {:?}",
            self.dims
        );
        self.dims.index(x, y, z)
    }

    /// Reject worlds the renderer cannot traverse.
    pub fn require_cube(&self) -> Result<(), FormatError> {
        if self.dims.is_cube() {
            Ok(())
        } else {
            Err(FormatError::NonCubicWorld {
                x: self.dims.x,
                y: self.dims.y,
                z: self.dims.z,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_is_z_major() {
        let dims = GridDims::new(4, 3, 2);
        assert_eq!(dims.index(0, 0, 0), 0);
        assert_eq!(dims.index(1, 0, 0), 1);
        assert_eq!(dims.index(0, 1, 0), 4);
        assert_eq!(dims.index(0, 0, 1), 12);
        assert_eq!(dims.index(3, 2, 1), 23);
        assert_eq!(dims.volume(), 24);
    }

    #[test]
    fn test_new_grid_is_air() {
        let grid = VoxelGrid::new(GridDims::new(2, 3, 4)).expect("non-empty grid");
        assert_eq!(grid.byte_size(), 24);
        assert!(grid.bytes().iter().all(|&b| b == ParticleType::Air.code()));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let err = VoxelGrid::new(GridDims::new(4, 0, 4)).unwrap_err();
        assert!(matches!(err, FormatError::EmptyVolume { y: 0, .. }));
    }

    #[test]
    fn test_read_write() {
        let mut grid = VoxelGrid::new(GridDims::cube(8)).expect("grid");
        grid.write(1, 2, 3, ParticleType::Water.code());
        assert_eq!(grid.read(1, 2, 3), ParticleType::Water.code());
        assert_eq!(grid.bytes()[GridDims::cube(8).index(1, 2, 3)], 3);
        assert_eq!(grid.read(3, 2, 1), 0);
    }

    #[test]
    #[should_panic(expected = "outside grid")]
    fn test_read_out_of_bounds_panics() {
        let grid = VoxelGrid::new(GridDims::cube(4)).expect("grid");
        grid.read(4, 0, 0);
    }

    #[test]
    fn test_from_bytes_length_checked() {
        let err = VoxelGrid::from_bytes(GridDims::cube(2), vec![0; 7]).unwrap_err();
        assert!(matches!(
            err,
            FormatError::SizeMismatch {
                expected: 8,
                actual: 7
            }
        ));
    }

    #[test]
    fn test_cube_requirement() {
        let cube = VoxelGrid::new(GridDims::cube(4)).expect("grid");
        assert!(cube.require_cube().is_ok());
        let slab = VoxelGrid::new(GridDims::new(4, 2, 4)).expect("grid");
        assert!(matches!(
            slab.require_cube(),
            Err(FormatError::NonCubicWorld { x: 4, y: 2, z: 4 })
        ));
    }
}
