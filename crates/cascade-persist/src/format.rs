use cascade_core::grid::GridDims;

/// Magic bytes identifying a voxel state file.
pub const MAGIC: [u8; 4] = *b"CCST";

/// Size of the file header in bytes.
pub const HEADER_SIZE: usize = 10;

/// State file header: magic then three little-endian u16 dimensions.
///
/// Cell bytes follow immediately, z-major then y then x.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StateHeader {
    pub magic: [u8; 4],
    pub x_size: u16,
    pub y_size: u16,
    pub z_size: u16,
}

impl StateHeader {
    pub fn new(dims: GridDims) -> Self {
        Self {
            magic: MAGIC,
            x_size: dims.x.to_le(),
            y_size: dims.y.to_le(),
            z_size: dims.z.to_le(),
        }
    }

    pub fn dims(&self) -> GridDims {
        GridDims::new(
            u16::from_le(self.x_size),
            u16::from_le(self.y_size),
            u16::from_le(self.z_size),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        assert_eq!(std::mem::size_of::<StateHeader>(), HEADER_SIZE);
    }

    #[test]
    fn test_header_bytes_are_little_endian() {
        let header = StateHeader::new(GridDims::new(0x0102, 3, 4));
        let bytes = bytemuck::bytes_of(&header);
        assert_eq!(&bytes[..4], b"CCST");
        assert_eq!(&bytes[4..6], &[0x02, 0x01]);
        assert_eq!(&bytes[6..10], &[3, 0, 4, 0]);
    }
}
