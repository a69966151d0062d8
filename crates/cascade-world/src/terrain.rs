use cascade_core::error::FormatError;
use cascade_core::grid::{GridDims, VoxelGrid};
use cascade_core::types::ParticleType;

const FREQUENCY: f64 = 0.02;
const OCTAVES: u32 = 6;
const LACUNARITY: f64 = 2.0;
const GAIN: f64 = 0.5;

/// Heightmap terrain from fractal 2D Perlin noise.
///
/// Each column is sand below its height and air from the height up.
/// Heights fall in `[y/4, 3y/4)`.
pub struct TerrainGenerator {
    /// Shuffled 0..=255, repeated once so lattice hashes never wrap.
    perm: [u8; 512],
}

impl TerrainGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            perm: shuffled_table(seed),
        }
    }

    /// Build a cube world of side `size`.
    pub fn generate(&self, size: u16) -> Result<VoxelGrid, FormatError> {
        let mut grid = VoxelGrid::new(GridDims::cube(size))?;
        self.fill(&mut grid);
        Ok(grid)
    }

    /// Overwrite every cell of `grid` with terrain.
    pub fn fill(&self, grid: &mut VoxelGrid) {
        let dims = grid.dims();
        let mut solid = 0usize;

        for z in 0..dims.z {
            for x in 0..dims.x {
                let height = self.column_height(x, z, dims.y);
                for y in 0..dims.y {
                    let particle = if (y as u32) < height {
                        ParticleType::Sand
                    } else {
                        ParticleType::Air
                    };
                    grid.write(x, y, z, particle.code());
                }
                solid += height.min(dims.y as u32) as usize;
            }
        }

        log::info!(
            "Generated {}x{}x{} terrain, {} solid cells",
            dims.x,
            dims.y,
            dims.z,
            solid
        );
    }

    /// Sand cells in column `(x, z)` of a grid `y_extent` tall.
    pub fn column_height(&self, x: u16, z: u16, y_extent: u16) -> u32 {
        HeightBand::for_extent(y_extent).place(self.fbm(x as f64, z as f64))
    }

    /// Fractal sum of Perlin octaves, normalized to roughly [-1, 1].
    fn fbm(&self, x: f64, z: f64) -> f64 {
        let mut sum = 0.0;
        let mut amplitude = 1.0;
        let mut total = 0.0;
        let mut frequency = FREQUENCY;
        for _ in 0..OCTAVES {
            sum += self.perlin(x * frequency, z * frequency) * amplitude;
            total += amplitude;
            amplitude *= GAIN;
            frequency *= LACUNARITY;
        }
        sum / total
    }

    fn perlin(&self, x: f64, z: f64) -> f64 {
        let (x0, z0) = (x.floor(), z.floor());
        let (fx, fz) = (x - x0, z - z0);
        let xi = (x0 as i64 & 255) as usize;
        let zi = (z0 as i64 & 255) as usize;

        let lattice = |dx: usize, dz: usize| self.perm[self.perm[xi + dx] as usize + zi + dz];
        let n00 = gradient(lattice(0, 0), fx, fz);
        let n10 = gradient(lattice(1, 0), fx - 1.0, fz);
        let n01 = gradient(lattice(0, 1), fx, fz - 1.0);
        let n11 = gradient(lattice(1, 1), fx - 1.0, fz - 1.0);

        let (u, v) = (fade(fx), fade(fz));
        let near = n00 + u * (n10 - n00);
        let far = n01 + u * (n11 - n01);
        // unit gradients peak at sqrt(1/2)
        (near + v * (far - near)) * std::f64::consts::SQRT_2
    }
}

/// Range of column heights for one grid height.
#[derive(Debug, Clone, Copy)]
struct HeightBand {
    min: u32,
    max: u32,
}

impl HeightBand {
    fn for_extent(y: u16) -> Self {
        let y = y as u32;
        Self {
            min: y / 4,
            max: (3 * y / 4).max(y / 4 + 1),
        }
    }

    /// Map a noise value onto `[min, max)`.
    fn place(self, noise: f64) -> u32 {
        let unit = ((noise + 1.0) * 0.5).clamp(0.0, 1.0);
        let height = self.min + (unit * (self.max - self.min) as f64) as u32;
        height.min(self.max - 1)
    }
}

fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

/// Dot product with one of eight unit directions picked by `hash`.
fn gradient(hash: u8, x: f64, z: f64) -> f64 {
    let d = std::f64::consts::FRAC_1_SQRT_2;
    match hash & 7 {
        0 => x,
        1 => -x,
        2 => z,
        3 => -z,
        4 => d * (x + z),
        5 => d * (x - z),
        6 => d * (z - x),
        _ => -d * (x + z),
    }
}

/// Seeded Fisher-Yates shuffle of 0..=255 driven by SplitMix64.
fn shuffled_table(seed: u64) -> [u8; 512] {
    let mut state = seed;
    let mut next = || {
        state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    };

    let mut base: [u8; 256] = std::array::from_fn(|i| i as u8);
    for i in (1..base.len()).rev() {
        let j = (next() % (i as u64 + 1)) as usize;
        base.swap(i, j);
    }
    std::array::from_fn(|i| base[i & 255])
}
