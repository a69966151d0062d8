use std::path::Path;

use cascade_core::error::FormatError;
use cascade_core::grid::VoxelGrid;

use crate::format::{StateHeader, HEADER_SIZE, MAGIC};

/// Parse a state file from raw bytes.
pub fn decode(bytes: &[u8]) -> Result<VoxelGrid, FormatError> {
    if bytes.len() < HEADER_SIZE {
        return Err(FormatError::Truncated {
            expected: HEADER_SIZE,
            actual: bytes.len(),
        });
    }

    let header: StateHeader = bytemuck::pod_read_unaligned(&bytes[..HEADER_SIZE]);
    if header.magic != MAGIC {
        return Err(FormatError::InvalidMagic(header.magic));
    }

    let dims = header.dims();
    let volume = dims.volume();
    if volume == 0 {
        return Err(FormatError::EmptyVolume {
            x: dims.x,
            y: dims.y,
            z: dims.z,
        });
    }

    let body = &bytes[HEADER_SIZE..];
    if body.len() < volume {
        return Err(FormatError::Truncated {
            expected: HEADER_SIZE + volume,
            actual: bytes.len(),
        });
    }
    if body.len() > volume {
        log::warn!(
            "Ignoring {} trailing bytes after {}x{}x{} voxel data",
            body.len() - volume,
            dims.x,
            dims.y,
            dims.z
        );
    }

    VoxelGrid::from_bytes(dims, body[..volume].to_vec())
}

/// Read a state file from disk.
pub fn load(path: &Path) -> Result<VoxelGrid, FormatError> {
    let bytes = std::fs::read(path)?;
    let grid = decode(&bytes)?;
    let dims = grid.dims();
    log::info!(
        "Loaded {}x{}x{} world ({} bytes) from {}",
        dims.x,
        dims.y,
        dims.z,
        grid.byte_size(),
        path.display()
    );
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save::{encode, save};
    use cascade_core::grid::GridDims;
    use cascade_core::types::ParticleType;

    fn patterned(dims: GridDims) -> VoxelGrid {
        let data = (0..dims.volume()).map(|i| ((i * 7 + 13) % 6) as u8).collect();
        VoxelGrid::from_bytes(dims, data).expect("valid grid")
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        for dims in [
            GridDims::new(1, 1, 1),
            GridDims::new(3, 5, 7),
            GridDims::new(300, 1, 2),
        ] {
            let grid = patterned(dims);
            let bytes = encode(&grid).expect("encode");
            assert_eq!(bytes.len(), HEADER_SIZE + dims.volume());
            let loaded = decode(&bytes).expect("decode");
            assert_eq!(loaded, grid, "roundtrip mismatch for {dims:?}");
        }
    }

    #[test]
    fn test_roundtrip_dimension_sweep() {
        let sides = [1u16, 2, 17, 64];
        let mut cases: Vec<GridDims> = Vec::new();
        for &x in &sides {
            for &y in &sides {
                for &z in &sides {
                    cases.push(GridDims::new(x, y, z));
                }
            }
        }
        cases.extend([
            GridDims::new(1, 255, 1),
            GridDims::new(1, 1, u16::MAX),
            GridDims::new(u16::MAX, 1, 1),
        ]);

        for dims in cases {
            let grid = patterned(dims);
            let mut bytes = encode(&grid).expect("encode");
            assert_eq!(decode(&bytes).expect("decode"), grid, "roundtrip mismatch for {dims:?}");

            bytes.extend_from_slice(&[0xAB; 3]);
            let with_tail = decode(&bytes).expect("decode with trailing bytes");
            assert_eq!(with_tail, grid, "trailing bytes leaked into {dims:?}");
        }
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = encode(&patterned(GridDims::cube(2))).expect("encode");
        bytes[..4].copy_from_slice(b"ALKA");
        match decode(&bytes) {
            Err(FormatError::InvalidMagic(magic)) => assert_eq!(&magic, b"ALKA"),
            other => panic!("expected InvalidMagic, got {other:?}"),
        }
    }

    #[test]
    fn test_zero_dimension_rejected() {
        for dims in [
            GridDims::new(0, 4, 4),
            GridDims::new(4, 0, 4),
            GridDims::new(4, 4, 0),
        ] {
            let header = StateHeader::new(dims);
            let bytes = bytemuck::bytes_of(&header).to_vec();
            assert!(
                matches!(decode(&bytes), Err(FormatError::EmptyVolume { .. })),
                "zero dimension in {dims:?} must be rejected"
            );
        }
    }

    #[test]
    fn test_truncated_body() {
        let mut bytes = encode(&patterned(GridDims::cube(4))).expect("encode");
        bytes.truncate(HEADER_SIZE + 10);
        assert!(matches!(
            decode(&bytes),
            Err(FormatError::Truncated {
                expected: 74,
                actual: 20
            })
        ));
    }

    #[test]
    fn test_file_smaller_than_header() {
        assert!(matches!(
            decode(b"CCS"),
            Err(FormatError::Truncated { expected: 10, .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let grid = patterned(GridDims::cube(2));
        let mut bytes = encode(&grid).expect("encode");
        bytes.extend_from_slice(&[9, 9, 9]);
        assert_eq!(decode(&bytes).expect("decode"), grid);
    }

    #[test]
    fn test_save_load_file() {
        let path = std::env::temp_dir().join(format!("cascade-load-{}.ccst", std::process::id()));
        let mut grid = VoxelGrid::new(GridDims::new(4, 2, 3)).expect("grid");
        grid.write(3, 1, 2, ParticleType::Sand.code());
        save(&path, &grid).expect("save");
        let loaded = load(&path).expect("load");
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.dims(), GridDims::new(4, 2, 3));
        assert_eq!(loaded.read(3, 1, 2), ParticleType::Sand.code());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("cascade-load-missing.ccst");
        assert!(matches!(load(&path), Err(FormatError::Io(_))));
    }
}
