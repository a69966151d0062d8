use std::path::Path;

use cascade_core::error::FormatError;
use cascade_core::grid::VoxelGrid;

use crate::format::{StateHeader, HEADER_SIZE};

/// Serialize a grid to state file bytes.
///
/// Fails if the cell buffer disagrees with the declared volume.
pub fn encode(grid: &VoxelGrid) -> Result<Vec<u8>, FormatError> {
    let dims = grid.dims();
    if grid.byte_size() != dims.volume() {
        return Err(FormatError::SizeMismatch {
            expected: dims.volume(),
            actual: grid.byte_size(),
        });
    }

    let header = StateHeader::new(dims);
    let mut out = Vec::with_capacity(HEADER_SIZE + grid.byte_size());
    out.extend_from_slice(bytemuck::bytes_of(&header));
    out.extend_from_slice(grid.bytes());
    Ok(out)
}

/// Write a grid to disk, replacing any existing file.
pub fn save(path: &Path, grid: &VoxelGrid) -> Result<(), FormatError> {
    let bytes = encode(grid)?;
    std::fs::write(path, &bytes)?;
    log::info!("Saved {} bytes to {}", bytes.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::load;
    use cascade_core::grid::GridDims;
    use cascade_world::TerrainGenerator;

    #[test]
    fn test_encode_layout() {
        let mut grid = VoxelGrid::new(GridDims::new(2, 1, 1)).expect("grid");
        grid.write(1, 0, 0, 5);
        let bytes = encode(&grid).expect("encode");
        assert_eq!(bytes, vec![b'C', b'C', b'S', b'T', 2, 0, 1, 0, 1, 0, 0, 5]);
    }

    #[test]
    fn test_generated_world_survives_file_roundtrip() {
        let size = 64u16;
        let grid = TerrainGenerator::new(1234).generate(size).expect("terrain");
        let center = size / 2;
        let before = grid.read(center, center, center);

        let path = std::env::temp_dir().join(format!("cascade-scenario-{}.ccst", std::process::id()));
        save(&path, &grid).expect("save");
        let loaded = load(&path).expect("load");
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.dims(), GridDims::cube(size));
        assert_eq!(loaded.read(center, center, center), before);
        assert_eq!(loaded.bytes(), grid.bytes());
    }
}
