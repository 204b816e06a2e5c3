use std::collections::VecDeque;

use noise::{NoiseFn, Perlin};
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use tracing::info;
use voronoice::{BoundingBox, Point, VoronoiBuilder};

use crate::errors::{WayfarerError, WayfarerResult};
use crate::mesh::{default_habitability, CellId, Feature, Settlement, WorldMesh};

/// Configuration for procedural world generation.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    pub seed: u64,
    /// World extent in map units, centered on the origin.
    pub width: f64,
    pub height: f64,
    pub cell_count: usize,
    pub settlement_count: usize,
    pub capital_count: usize,
    /// Base frequency of the elevation noise field.
    pub noise_frequency: f64,
    pub noise_octaves: u32,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            seed: 12345,
            width: 400.0,
            height: 300.0,
            cell_count: 2000,
            settlement_count: 24,
            capital_count: 4,
            noise_frequency: 0.012,
            noise_octaves: 4,
        }
    }
}

/// Elevation at or above this value is land. Matches the route builders'
/// default land threshold so generated meshes and default route parameters
/// agree on the coastline.
const LAND_LEVEL: u8 = 20;

/// Minimum water-body size (in cells) for a coastal settlement to count as
/// a port on that body.
const MIN_HARBOR_CELLS: usize = 8;

/// Placement attempts per settlement before giving up on spacing.
const PLACEMENT_ATTEMPTS: usize = 50;

/// Procedural generator producing a complete `WorldMesh` ready for route
/// synthesis: an irregular Voronoi cell graph with terrain, climate,
/// features and settlements filled in.
pub struct WorldGenerator {
    config: WorldConfig,
    rng: Pcg64,
}

impl WorldGenerator {
    pub fn new(config: WorldConfig) -> WayfarerResult<Self> {
        if config.cell_count < 4 {
            return Err(WayfarerError::InvalidParams {
                reason: format!("cell_count {} is below the minimum of 4", config.cell_count),
            });
        }
        if config.capital_count > config.settlement_count {
            return Err(WayfarerError::InvalidParams {
                reason: format!(
                    "capital_count {} exceeds settlement_count {}",
                    config.capital_count, config.settlement_count
                ),
            });
        }
        if config.width <= 0.0 || config.height <= 0.0 {
            return Err(WayfarerError::InvalidParams {
                reason: "world extent must be positive".to_string(),
            });
        }
        let rng = Pcg64::seed_from_u64(config.seed);
        Ok(Self { config, rng })
    }

    /// Generate the full mesh. Stages run in dependency order: cell graph,
    /// elevation, temperature, features, shore ranks, biomes, settlements,
    /// states. The result always passes `WorldMesh::validate`.
    pub fn generate(&mut self) -> WayfarerResult<WorldMesh> {
        info!(
            seed = self.config.seed,
            cells = self.config.cell_count,
            "generating world mesh"
        );

        let (neighbors, centers) = self.build_cell_graph()?;
        let n = neighbors.len();

        let elevation = self.sample_elevation(&centers);
        let temperature = self.sample_temperature(&centers, &elevation);
        let (feature, features) = trace_features(&neighbors, &elevation);
        let shore = rank_shores(&neighbors, &elevation);
        let biome = self.classify_biomes(&centers, &elevation, &temperature, &shore);

        let habitability = default_habitability();
        let suitability: Vec<i16> = biome
            .iter()
            .map(|&b| habitability[b as usize] as i16)
            .collect();

        let mut mesh = WorldMesh {
            neighbors,
            centers,
            elevation,
            biome,
            state: vec![0; n],
            temperature,
            feature,
            shore,
            settlement: vec![None; n],
            road_usage: vec![0; n],
            junction_usage: vec![0; n],
            suitability,
            habitability,
            settlements: Vec::new(),
            features,
        };

        self.place_settlements(&mut mesh);
        assign_states(&mut mesh);

        mesh.validate()?;
        info!(
            cells = mesh.len(),
            settlements = mesh.settlements.len(),
            features = mesh.features.len(),
            "world mesh ready"
        );
        Ok(mesh)
    }

    /// Build the irregular cell graph from a jittered-grid Voronoi diagram.
    /// Jitter keeps cells roughly uniform in size while breaking up the
    /// straight lattice lines a plain grid would show.
    fn build_cell_graph(&mut self) -> WayfarerResult<(Vec<Vec<CellId>>, Vec<(f32, f32)>)> {
        let per_side = (self.config.cell_count as f64).sqrt().ceil() as usize;
        let cell_w = self.config.width / per_side as f64;
        let cell_h = self.config.height / per_side as f64;
        let half_w = self.config.width / 2.0;
        let half_h = self.config.height / 2.0;

        let mut sites = Vec::with_capacity(self.config.cell_count);
        for i in 0..per_side {
            for j in 0..per_side {
                if sites.len() >= self.config.cell_count {
                    break;
                }
                let base_x = (i as f64 + 0.5) * cell_w - half_w;
                let base_y = (j as f64 + 0.5) * cell_h - half_h;
                let jitter_x = self.rng.gen_range(-cell_w * 0.4..cell_w * 0.4);
                let jitter_y = self.rng.gen_range(-cell_h * 0.4..cell_h * 0.4);
                sites.push(Point {
                    x: base_x + jitter_x,
                    y: base_y + jitter_y,
                });
            }
        }

        let bbox = BoundingBox::new(
            Point { x: 0.0, y: 0.0 },
            self.config.width,
            self.config.height,
        );
        let voronoi = VoronoiBuilder::default()
            .set_sites(sites)
            .set_bounding_box(bbox)
            .build()
            .ok_or_else(|| WayfarerError::InvalidMesh {
                reason: "failed to build Voronoi diagram from generated sites".to_string(),
            })?;

        let mut neighbors = Vec::with_capacity(voronoi.sites().len());
        let mut centers = Vec::with_capacity(voronoi.sites().len());
        for cell in voronoi.iter_cells() {
            neighbors.push(cell.iter_neighbors().collect::<Vec<CellId>>());
            let site = cell.site_position();
            centers.push((site.x as f32, site.y as f32));
        }

        Ok((neighbors, centers))
    }

    /// Fractal elevation on a 0..100 scale, with a radial falloff so the
    /// map edges sink into ocean.
    fn sample_elevation(&self, centers: &[(f32, f32)]) -> Vec<u8> {
        let perlin = Perlin::new(self.config.seed as u32);
        let half_w = self.config.width / 2.0;
        let half_h = self.config.height / 2.0;

        centers
            .iter()
            .map(|&(x, y)| {
                let wx = x as f64 * self.config.noise_frequency;
                let wy = y as f64 * self.config.noise_frequency;

                let mut value = 0.0;
                let mut amplitude = 1.0;
                let mut frequency = 1.0;
                let mut span = 0.0;
                for _ in 0..self.config.noise_octaves {
                    value += perlin.get([wx * frequency, wy * frequency]) * amplitude;
                    span += amplitude;
                    amplitude *= 0.5; // Persistence
                    frequency *= 2.0; // Lacunarity
                }
                let normalized = (value / span + 1.0) / 2.0;

                let edge = (x as f64 / half_w).abs().max((y as f64 / half_h).abs());
                let falloff = (1.0 - edge * edge).max(0.0);

                (normalized * falloff * 100.0).round().clamp(0.0, 100.0) as u8
            })
            .collect()
    }

    /// Latitude gradient with an elevation lapse: warm at the southern
    /// edge, polar at the northern, colder on high ground.
    fn sample_temperature(&self, centers: &[(f32, f32)], elevation: &[u8]) -> Vec<f32> {
        let half_h = self.config.height as f32 / 2.0;
        centers
            .iter()
            .zip(elevation.iter())
            .map(|(&(_, y), &elev)| {
                let latitude = (y + half_h) / (half_h * 2.0); // 0 south, 1 north
                let base = 28.0 - latitude * 45.0;
                let lapse = (elev.saturating_sub(LAND_LEVEL)) as f32 * 0.2;
                base - lapse
            })
            .collect()
    }

    /// Discrete biome per cell, indexing the default habitability table.
    fn classify_biomes(
        &self,
        centers: &[(f32, f32)],
        elevation: &[u8],
        temperature: &[f32],
        shore: &[i8],
    ) -> Vec<u8> {
        // Independent moisture field so deserts and forests do not simply
        // trace the coastline.
        let moisture_noise = Perlin::new(self.config.seed.wrapping_add(1) as u32);
        let freq = self.config.noise_frequency * 2.0;

        centers
            .iter()
            .enumerate()
            .map(|(cell, &(x, y))| {
                if elevation[cell] < LAND_LEVEL {
                    return 0; // marine
                }
                let temp = temperature[cell];
                let moisture =
                    (moisture_noise.get([x as f64 * freq, y as f64 * freq]) + 1.0) / 2.0;

                if temp <= -5.0 {
                    11 // glacier
                } else if temp < 0.0 {
                    10 // tundra
                } else if temp < 8.0 {
                    if moisture < 0.3 {
                        2 // cold desert
                    } else {
                        9 // taiga
                    }
                } else if moisture > 0.8 && shore[cell] == 1 {
                    12 // wetland
                } else if temp > 22.0 {
                    if moisture < 0.35 {
                        1 // hot desert
                    } else if moisture < 0.6 {
                        3 // savanna
                    } else if moisture < 0.8 {
                        5 // tropical seasonal forest
                    } else {
                        7 // tropical rainforest
                    }
                } else if moisture < 0.3 {
                    4 // grassland
                } else if moisture < 0.75 {
                    6 // temperate deciduous forest
                } else {
                    8 // temperate rainforest
                }
            })
            .collect()
    }

    /// Place capitals first, then towns, preferring habitable cells and
    /// keeping a minimum spacing. Spacing halves when a pass runs out of
    /// attempts, so crowded maps still get their full settlement count
    /// whenever enough habitable cells exist.
    fn place_settlements(&mut self, mesh: &mut WorldMesh) {
        let candidates: Vec<CellId> = (0..mesh.len())
            .filter(|&c| {
                mesh.elevation[c] >= LAND_LEVEL && mesh.habitability[mesh.biome[c] as usize] > 0
            })
            .collect();
        if candidates.is_empty() {
            return;
        }

        let area = self.config.width * self.config.height;
        let mut spacing2 =
            (area / (self.config.settlement_count.max(1) as f64) / 4.0) as f32;
        let mut placed: Vec<CellId> = Vec::new();
        let mut next_id: u16 = 1;

        while placed.len() < self.config.settlement_count {
            let mut found = None;
            for _ in 0..PLACEMENT_ATTEMPTS {
                let cell = candidates[self.rng.gen_range(0..candidates.len())];
                if mesh.settlement[cell].is_some() {
                    continue;
                }
                let spaced = placed.iter().all(|&p| mesh.distance2(p, cell) >= spacing2);
                if spaced {
                    found = Some(cell);
                    break;
                }
            }
            let Some(cell) = found else {
                spacing2 /= 2.0;
                if spacing2 < 1.0 {
                    break;
                }
                continue;
            };

            let is_capital = (placed.len()) < self.config.capital_count;
            let port = harbor_feature(mesh, cell);
            mesh.settlement[cell] = Some(next_id);
            mesh.settlements.push(Settlement {
                id: next_id,
                cell,
                is_capital,
                port,
                removed: false,
                feature: mesh.feature[cell],
            });
            placed.push(cell);
            next_id += 1;
        }

        info!(
            placed = placed.len(),
            requested = self.config.settlement_count,
            "placed settlements"
        );
    }
}

/// Flood-fill connected same-type regions into features. Feature ids start
/// at 1; every cell belongs to exactly one feature.
fn trace_features(neighbors: &[Vec<CellId>], elevation: &[u8]) -> (Vec<u16>, Vec<Feature>) {
    let n = neighbors.len();
    let mut feature = vec![0u16; n];
    let mut features = Vec::new();
    let mut next_id: u16 = 1;

    for start in 0..n {
        if feature[start] != 0 {
            continue;
        }
        let land = elevation[start] >= LAND_LEVEL;
        feature[start] = next_id;
        let mut queue = VecDeque::from([start]);
        while let Some(cell) = queue.pop_front() {
            for &adjacent in &neighbors[cell] {
                if feature[adjacent] == 0 && (elevation[adjacent] >= LAND_LEVEL) == land {
                    feature[adjacent] = next_id;
                    queue.push_back(adjacent);
                }
            }
        }
        features.push(Feature { id: next_id, land });
        next_id += 1;
    }

    (feature, features)
}

/// Signed coast-distance ranks out to two rings: +1/+2 on land, -1/-2 on
/// water, 0 on anything farther out. Sea routing only distinguishes marked
/// coastal water from open ocean.
fn rank_shores(neighbors: &[Vec<CellId>], elevation: &[u8]) -> Vec<i8> {
    let n = neighbors.len();
    let mut shore = vec![0i8; n];
    let mut queue = VecDeque::new();

    for cell in 0..n {
        let land = elevation[cell] >= LAND_LEVEL;
        let coastal = neighbors[cell]
            .iter()
            .any(|&adj| (elevation[adj] >= LAND_LEVEL) != land);
        if coastal {
            shore[cell] = if land { 1 } else { -1 };
            queue.push_back(cell);
        }
    }

    while let Some(cell) = queue.pop_front() {
        let rank = shore[cell];
        if rank.abs() >= 2 {
            continue;
        }
        for &adjacent in &neighbors[cell] {
            let same_side =
                (elevation[adjacent] >= LAND_LEVEL) == (elevation[cell] >= LAND_LEVEL);
            if same_side && shore[adjacent] == 0 {
                shore[adjacent] = if rank > 0 { rank + 1 } else { rank - 1 };
                queue.push_back(adjacent);
            }
        }
    }

    shore
}

/// Water feature id the cell can harbor on, or 0. Small ponds do not make
/// a settlement a port.
fn harbor_feature(mesh: &WorldMesh, cell: CellId) -> u16 {
    for &adjacent in &mesh.neighbors[cell] {
        if mesh.elevation[adjacent] >= LAND_LEVEL {
            continue;
        }
        let body = mesh.feature[adjacent];
        let size = mesh.feature.iter().filter(|&&f| f == body).count();
        if size >= MIN_HARBOR_CELLS {
            return body;
        }
    }
    0
}

/// Claim every land cell for its nearest capital. Water and capital-less
/// worlds stay unclaimed (state 0).
fn assign_states(mesh: &mut WorldMesh) {
    let capitals: Vec<(u16, CellId)> = mesh
        .settlements
        .iter()
        .filter(|s| s.is_capital && !s.removed)
        .map(|s| (s.id, s.cell))
        .collect();
    if capitals.is_empty() {
        return;
    }

    for cell in 0..mesh.len() {
        if mesh.elevation[cell] < LAND_LEVEL {
            continue;
        }
        let nearest = capitals
            .iter()
            .min_by(|a, b| {
                mesh.distance2(cell, a.1).total_cmp(&mesh.distance2(cell, b.1))
            })
            .map(|&(id, _)| id);
        if let Some(state) = nearest {
            mesh.state[cell] = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(seed: u64) -> WorldConfig {
        WorldConfig {
            seed,
            width: 120.0,
            height: 90.0,
            cell_count: 300,
            settlement_count: 8,
            capital_count: 2,
            ..Default::default()
        }
    }

    #[test]
    fn test_generated_mesh_is_valid() {
        let mut generator = WorldGenerator::new(small_config(7)).unwrap();
        let mesh = generator.generate().unwrap();

        assert_eq!(mesh.len(), 300);
        assert!(mesh.validate().is_ok());
        // edge falloff guarantees open water; the interior carries land
        assert!(mesh.elevation.iter().any(|&e| e < LAND_LEVEL));
        assert!(mesh.elevation.iter().any(|&e| e >= LAND_LEVEL));
    }

    #[test]
    fn test_generation_is_deterministic() {
        let mesh_a = WorldGenerator::new(small_config(42)).unwrap().generate().unwrap();
        let mesh_b = WorldGenerator::new(small_config(42)).unwrap().generate().unwrap();

        assert_eq!(mesh_a.centers, mesh_b.centers);
        assert_eq!(mesh_a.elevation, mesh_b.elevation);
        assert_eq!(mesh_a.biome, mesh_b.biome);
        assert_eq!(mesh_a.settlements, mesh_b.settlements);
        assert_eq!(mesh_a.state, mesh_b.state);
    }

    #[test]
    fn test_different_seeds_differ() {
        let mesh_a = WorldGenerator::new(small_config(1)).unwrap().generate().unwrap();
        let mesh_b = WorldGenerator::new(small_config(2)).unwrap().generate().unwrap();
        assert_ne!(mesh_a.elevation, mesh_b.elevation);
    }

    #[test]
    fn test_settlements_on_habitable_land() {
        let mut generator = WorldGenerator::new(small_config(11)).unwrap();
        let mesh = generator.generate().unwrap();

        assert!(!mesh.settlements.is_empty());
        let capitals = mesh.settlements.iter().filter(|s| s.is_capital).count();
        assert!(capitals <= 2);
        for settlement in &mesh.settlements {
            assert!(mesh.elevation[settlement.cell] >= LAND_LEVEL);
            assert!(mesh.habitability[mesh.biome[settlement.cell] as usize] > 0);
            assert_eq!(mesh.feature[settlement.cell], settlement.feature);
            assert_eq!(mesh.settlement[settlement.cell], Some(settlement.id));
        }
    }

    #[test]
    fn test_features_partition_the_mesh() {
        let mut generator = WorldGenerator::new(small_config(3)).unwrap();
        let mesh = generator.generate().unwrap();

        for cell in 0..mesh.len() {
            let id = mesh.feature[cell];
            let feature = mesh
                .features
                .iter()
                .find(|f| f.id == id)
                .expect("cell references a registered feature");
            assert_eq!(feature.land, mesh.elevation[cell] >= LAND_LEVEL);
        }
    }

    #[test]
    fn test_shore_ranks_sign_convention() {
        let mut generator = WorldGenerator::new(small_config(5)).unwrap();
        let mesh = generator.generate().unwrap();

        for cell in 0..mesh.len() {
            let rank = mesh.shore[cell];
            if mesh.elevation[cell] >= LAND_LEVEL {
                assert!(rank >= 0, "land cell {cell} has negative shore rank");
            } else {
                assert!(rank <= 0, "water cell {cell} has positive shore rank");
            }
        }
    }

    #[test]
    fn test_states_follow_capitals() {
        let mut generator = WorldGenerator::new(small_config(13)).unwrap();
        let mesh = generator.generate().unwrap();

        let capital_ids: Vec<u16> = mesh
            .settlements
            .iter()
            .filter(|s| s.is_capital)
            .map(|s| s.id)
            .collect();
        for capital in mesh.settlements.iter().filter(|s| s.is_capital) {
            assert_eq!(mesh.state[capital.cell], capital.id);
        }
        for cell in 0..mesh.len() {
            if mesh.elevation[cell] >= LAND_LEVEL && !capital_ids.is_empty() {
                assert!(capital_ids.contains(&mesh.state[cell]));
            }
        }
    }

    #[test]
    fn test_config_validation() {
        let mut config = small_config(1);
        config.cell_count = 2;
        assert!(WorldGenerator::new(config).is_err());

        let mut config = small_config(1);
        config.capital_count = 20;
        assert!(WorldGenerator::new(config).is_err());

        let mut config = small_config(1);
        config.width = -5.0;
        assert!(WorldGenerator::new(config).is_err());
    }
}
