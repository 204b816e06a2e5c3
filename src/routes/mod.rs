use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::RouteParams;
use crate::errors::{WayfarerError, WayfarerResult};
use crate::mesh::{CellId, Settlement, WorldMesh};

pub mod cost;
pub mod restore;
pub mod search;

use search::SearchMode;

/// Route classes, in decreasing order of traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RouteKind {
    Main,
    Small,
    Oceanic,
}

/// A contiguous run of cells forming one renderable polyline.
/// Immutable once produced; consecutive cells are mesh neighbors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSegment {
    pub kind: RouteKind,
    pub cells: Vec<CellId>,
}

/// The three segment lists a full network build produces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteNetwork {
    pub main: Vec<RouteSegment>,
    pub small: Vec<RouteSegment>,
    pub oceanic: Vec<RouteSegment>,
}

impl RouteNetwork {
    pub fn segment_count(&self) -> usize {
        self.main.len() + self.small.len() + self.oceanic.len()
    }

    /// Every segment must hold at least two cells.
    pub fn check(&self) -> WayfarerResult<()> {
        for segment in self
            .main
            .iter()
            .chain(self.small.iter())
            .chain(self.oceanic.iter())
        {
            if segment.cells.len() < 2 {
                return Err(WayfarerError::InvalidNetwork {
                    reason: format!("{:?} segment with {} cells", segment.kind, segment.cells.len()),
                });
            }
        }
        Ok(())
    }

    /// Persist the network in binary form.
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> WayfarerResult<()> {
        self.check()?;

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let data = bincode::serde::encode_to_vec(self, bincode::config::standard()).map_err(
            |e| WayfarerError::InvalidNetwork {
                reason: format!("Failed to serialize network: {e}"),
            },
        )?;
        std::fs::write(path, data)?;
        Ok(())
    }

    /// Load a previously saved network.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> WayfarerResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(WayfarerError::NetworkFileNotFound {
                path: path.to_path_buf(),
            });
        }

        let data = std::fs::read(path)?;
        let (network, _): (RouteNetwork, usize) =
            bincode::serde::decode_from_slice(&data, bincode::config::standard()).map_err(
                |e| WayfarerError::CorruptedNetworkFile {
                    reason: format!("Failed to deserialize network data: {e}"),
                },
            )?;

        network.check().map_err(|e| WayfarerError::CorruptedNetworkFile {
            reason: e.to_string(),
        })?;
        Ok(network)
    }
}

/// Orchestrates the three network builders over one mesh.
///
/// Holds the mesh by exclusive reference for the whole build: every search
/// reads the usage counters written by earlier reconstructions, so builds
/// are strictly sequential and the roads → trails → sea routes order is
/// part of the contract. Parallelizing searches that share cells would
/// change route shapes.
pub struct NetworkBuilder<'a> {
    mesh: &'a mut WorldMesh,
    params: &'a RouteParams,
}

impl<'a> NetworkBuilder<'a> {
    /// Validate the mesh contract and parameter ranges up front; malformed
    /// input fails here, not per-cell during the build.
    pub fn new(mesh: &'a mut WorldMesh, params: &'a RouteParams) -> WayfarerResult<Self> {
        params.check()?;
        mesh.validate()?;
        Ok(Self { mesh, params })
    }

    /// Connect each capital to the farthest capital with a higher id on the
    /// same landmass, then fold accumulated road usage into cell suitability.
    pub fn build_roads(&mut self) -> WayfarerResult<Vec<RouteSegment>> {
        let capitals: Vec<Settlement> = self
            .mesh
            .settlements
            .iter()
            .filter(|s| s.is_capital && !s.removed)
            .cloned()
            .collect();
        if capitals.len() < 2 {
            return Ok(Vec::new());
        }

        let mut segments = Vec::new();
        for capital in &capitals {
            let Some(farthest) = capitals
                .iter()
                .filter(|c| c.id > capital.id && c.feature == capital.feature)
                .max_by(|a, b| {
                    self.mesh
                        .distance2(capital.cell, a.cell)
                        .total_cmp(&self.mesh.distance2(capital.cell, b.cell))
                })
            else {
                continue;
            };

            let result = search::find_land_path(
                self.mesh,
                self.params,
                capital.cell,
                SearchMode::Target(farthest.cell),
            );
            if !result.reachable {
                debug!(
                    from = capital.id,
                    to = farthest.id,
                    "no land route between capitals, skipping"
                );
                continue;
            }
            let Some(terminus) = result.terminus else {
                continue;
            };
            segments.extend(restore::restore_path(
                self.mesh,
                self.params,
                capital.cell,
                terminus,
                RouteKind::Main,
                &result.predecessor,
            )?);
        }

        // Built roads make their cells more desirable in general.
        for cell in 0..self.mesh.len() {
            let bonus = (self.mesh.road_usage[cell] / 2) as i16;
            self.mesh.suitability[cell] = self.mesh.suitability[cell].saturating_add(bonus);
        }

        info!(segments = segments.len(), "built main roads");
        Ok(segments)
    }

    /// Build trails on every landmass: the first settlement reaches out to
    /// the farthest one on the same landmass, every other settlement links
    /// up with the nearest existing infrastructure.
    pub fn build_trails(&mut self) -> WayfarerResult<Vec<RouteSegment>> {
        let settlements: Vec<Settlement> = self
            .mesh
            .settlements
            .iter()
            .filter(|s| !s.removed)
            .cloned()
            .collect();
        if settlements.len() < 2 {
            return Ok(Vec::new());
        }

        let land_features: Vec<u16> = self
            .mesh
            .features
            .iter()
            .filter(|f| f.land)
            .map(|f| f.id)
            .collect();

        let mut segments = Vec::new();
        for feature in land_features {
            let isle: Vec<&Settlement> = settlements
                .iter()
                .filter(|s| s.feature == feature)
                .collect();
            if isle.len() < 2 {
                continue;
            }

            for (index, settlement) in isle.iter().enumerate() {
                if index == 0 {
                    // Farthest settlement on the landmass; ties and the
                    // settlement itself (distance 0) are harmless.
                    let Some(farthest) = isle.iter().max_by(|a, b| {
                        self.mesh
                            .distance2(settlement.cell, a.cell)
                            .total_cmp(&self.mesh.distance2(settlement.cell, b.cell))
                    }) else {
                        continue;
                    };
                    if self.mesh.on_network(farthest.cell) {
                        continue;
                    }
                    let result = search::find_land_path(
                        self.mesh,
                        self.params,
                        settlement.cell,
                        SearchMode::Target(farthest.cell),
                    );
                    if !result.reachable {
                        continue;
                    }
                    let Some(terminus) = result.terminus else {
                        continue;
                    };
                    segments.extend(restore::restore_path(
                        self.mesh,
                        self.params,
                        settlement.cell,
                        terminus,
                        RouteKind::Small,
                        &result.predecessor,
                    )?);
                } else {
                    if self.mesh.on_network(settlement.cell) {
                        continue;
                    }
                    let result = search::find_land_path(
                        self.mesh,
                        self.params,
                        settlement.cell,
                        SearchMode::NearestInfrastructure,
                    );
                    let Some(terminus) = result.terminus else {
                        // no infrastructure reachable from here
                        continue;
                    };
                    segments.extend(restore::restore_path(
                        self.mesh,
                        self.params,
                        settlement.cell,
                        terminus,
                        RouteKind::Small,
                        &result.predecessor,
                    )?);
                }
            }
        }

        info!(segments = segments.len(), "built trails");
        Ok(segments)
    }

    /// Connect ports pairwise within each body of water. A port joins at
    /// most one new lane per pass; the connected flags stop duplicate work.
    pub fn build_sea_routes(&mut self) -> WayfarerResult<Vec<RouteSegment>> {
        let ports: Vec<Settlement> = self
            .mesh
            .settlements
            .iter()
            .filter(|s| s.port > 0 && !s.removed)
            .cloned()
            .collect();
        if ports.len() < 2 {
            return Ok(Vec::new());
        }

        let mut bodies: Vec<u16> = ports.iter().map(|p| p.port).collect();
        bodies.sort_unstable();
        bodies.dedup();

        let mut connected: HashSet<CellId> = HashSet::new();
        let mut segments = Vec::new();

        for body in bodies {
            let group: Vec<&Settlement> = ports.iter().filter(|p| p.port == body).collect();
            if group.len() < 2 {
                continue;
            }

            for s in 0..group.len() {
                let source = group[s].cell;
                if connected.contains(&source) {
                    continue;
                }

                for target_port in &group[s + 1..] {
                    let target = target_port.cell;
                    if connected.contains(&target) {
                        continue;
                    }

                    let result =
                        search::find_sea_path(self.mesh, self.params, target, source);
                    if !result.reachable {
                        continue;
                    }
                    let Some(terminus) = result.terminus else {
                        continue;
                    };
                    segments.extend(restore::restore_path(
                        self.mesh,
                        self.params,
                        target,
                        terminus,
                        RouteKind::Oceanic,
                        &result.predecessor,
                    )?);

                    connected.insert(source);
                    connected.insert(target);
                }
            }
        }

        info!(segments = segments.len(), "built sea routes");
        Ok(segments)
    }

    /// Reset usage counters and rebuild the whole network in the fixed
    /// roads → trails → sea routes order, so each builder benefits from the
    /// infrastructure laid down by the previous ones.
    pub fn regenerate(&mut self) -> WayfarerResult<RouteNetwork> {
        self.mesh.reset_usage();
        let main = self.build_roads()?;
        let small = self.build_trails()?;
        let oceanic = self.build_sea_routes()?;
        Ok(RouteNetwork {
            main,
            small,
            oceanic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::test_support::{grid, place_settlement};
    use crate::mesh::Feature;

    /// Two landmasses separated by a 3-cell-wide strait, one row high
    /// enough to host ports on both shores. Land feature ids 1 and 3,
    /// water feature 2.
    fn strait_world(frozen: bool) -> WorldMesh {
        let width = 9;
        let height = 3;
        let mut mesh = grid(width, height);
        for y in 0..height {
            for x in 3..6 {
                let cell = y * width + x;
                mesh.elevation[cell] = 5;
                mesh.feature[cell] = 2;
                mesh.shore[cell] = -1;
                if frozen {
                    mesh.temperature[cell] = -10.0;
                }
            }
            for x in 6..9 {
                mesh.feature[y * width + x] = 3;
            }
        }
        mesh.features = vec![
            Feature { id: 1, land: true },
            Feature { id: 2, land: false },
            Feature { id: 3, land: true },
        ];
        // ports on the facing coasts, middle row
        place_settlement(&mut mesh, 1, width + 2, false, 2);
        place_settlement(&mut mesh, 2, width + 6, false, 2);
        mesh
    }

    #[test]
    fn test_roads_three_capitals_on_one_landmass() {
        let mut mesh = grid(10, 10);
        place_settlement(&mut mesh, 1, 0, true, 0); // (0,0)
        place_settlement(&mut mesh, 2, 9, true, 0); // (9,0)
        place_settlement(&mut mesh, 3, 90, true, 0); // (0,9)
        let params = RouteParams::default();

        let mut builder = NetworkBuilder::new(&mut mesh, &params).unwrap();
        let segments = builder.build_roads().unwrap();

        // capital 1 connects to its farthest higher-id peer, capital 2
        // connects to capital 3, capital 3 has no higher-id peer
        assert!(segments.len() >= 2);
        for segment in &segments {
            assert_eq!(segment.kind, RouteKind::Main);
            assert!(segment.cells.len() >= 2);
        }
        assert!(mesh.road_usage[0] > 0);
        assert!(mesh.road_usage[9] > 0);
        assert!(mesh.road_usage[90] > 0);
    }

    #[test]
    fn test_roads_tie_in_farthest_does_not_crash() {
        // capitals 2 and 3 are equidistant from capital 1
        let mut mesh = grid(9, 9);
        place_settlement(&mut mesh, 1, 4 * 9 + 4, true, 0); // center
        place_settlement(&mut mesh, 2, 4 * 9, true, 0); // west
        place_settlement(&mut mesh, 3, 4 * 9 + 8, true, 0); // east
        let params = RouteParams::default();

        let mut builder = NetworkBuilder::new(&mut mesh, &params).unwrap();
        let segments = builder.build_roads().unwrap();
        assert!(!segments.is_empty());
    }

    #[test]
    fn test_roads_fewer_than_two_capitals() {
        let mut mesh = grid(5, 5);
        place_settlement(&mut mesh, 1, 12, true, 0);
        place_settlement(&mut mesh, 2, 3, false, 0);
        let params = RouteParams::default();

        let mut builder = NetworkBuilder::new(&mut mesh, &params).unwrap();
        assert!(builder.build_roads().unwrap().is_empty());
    }

    #[test]
    fn test_roads_removed_capitals_excluded() {
        let mut mesh = grid(5, 5);
        place_settlement(&mut mesh, 1, 0, true, 0);
        place_settlement(&mut mesh, 2, 24, true, 0);
        mesh.settlements[1].removed = true;
        let params = RouteParams::default();

        let mut builder = NetworkBuilder::new(&mut mesh, &params).unwrap();
        assert!(builder.build_roads().unwrap().is_empty());
    }

    #[test]
    fn test_roads_fold_usage_into_suitability() {
        let mut mesh = grid(6, 1);
        place_settlement(&mut mesh, 1, 0, true, 0);
        place_settlement(&mut mesh, 2, 5, true, 0);
        let params = RouteParams::default();

        let mut builder = NetworkBuilder::new(&mut mesh, &params).unwrap();
        builder.build_roads().unwrap();

        // main score 5 along the path, folded in as usage / 2
        assert!(mesh.suitability[2] >= 2);
    }

    #[test]
    fn test_trails_two_settlements() {
        let mut mesh = grid(8, 1);
        place_settlement(&mut mesh, 1, 0, false, 0);
        place_settlement(&mut mesh, 2, 7, false, 0);
        let params = RouteParams::default();

        let mut builder = NetworkBuilder::new(&mut mesh, &params).unwrap();
        let segments = builder.build_trails().unwrap();

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].kind, RouteKind::Small);
        assert!(mesh.road_usage[3] > 0);
    }

    #[test]
    fn test_trails_single_settlement_is_empty() {
        let mut mesh = grid(5, 5);
        place_settlement(&mut mesh, 1, 12, false, 0);
        let params = RouteParams::default();

        let mut builder = NetworkBuilder::new(&mut mesh, &params).unwrap();
        assert!(builder.build_trails().unwrap().is_empty());
    }

    #[test]
    fn test_trails_join_existing_road() {
        // a road spans the top row; settlements below hook into it
        let mut mesh = grid(5, 4);
        for x in 0..5 {
            mesh.road_usage[x] = 5;
        }
        place_settlement(&mut mesh, 1, 3 * 5, false, 0); // (0,3)
        place_settlement(&mut mesh, 2, 3 * 5 + 4, false, 0); // (4,3)
        let params = RouteParams::default();

        let mut builder = NetworkBuilder::new(&mut mesh, &params).unwrap();
        let segments = builder.build_trails().unwrap();

        assert!(!segments.is_empty());
        // both settlements end up on the network
        assert!(mesh.on_network(3 * 5));
        assert!(mesh.on_network(3 * 5 + 4));
    }

    #[test]
    fn test_sea_routes_connect_ports_across_strait() {
        let mut mesh = strait_world(false);
        let params = RouteParams::default();

        let mut builder = NetworkBuilder::new(&mut mesh, &params).unwrap();
        let segments = builder.build_sea_routes().unwrap();

        assert_eq!(segments.len(), 1);
        let cells = &segments[0].cells;
        assert_eq!(segments[0].kind, RouteKind::Oceanic);
        // the lane runs port to port
        assert!(cells.contains(&(9 + 2)));
        assert!(cells.contains(&(9 + 6)));
        for pair in cells.windows(2) {
            assert!(mesh.neighbors[pair[0]].contains(&pair[1]));
        }
    }

    #[test]
    fn test_sea_routes_frozen_strait_builds_nothing() {
        let mut mesh = strait_world(true);
        let params = RouteParams::default();

        let mut builder = NetworkBuilder::new(&mut mesh, &params).unwrap();
        let segments = builder.build_sea_routes().unwrap();

        assert!(segments.is_empty());
        // no usage leaked onto the frozen water
        for y in 0..3 {
            for x in 3..6 {
                assert_eq!(mesh.road_usage[y * 9 + x], 0);
            }
        }
    }

    #[test]
    fn test_sea_routes_fewer_than_two_ports() {
        let mut mesh = strait_world(false);
        mesh.settlements[1].removed = true;
        let params = RouteParams::default();

        let mut builder = NetworkBuilder::new(&mut mesh, &params).unwrap();
        assert!(builder.build_sea_routes().unwrap().is_empty());
    }

    #[test]
    fn test_regenerate_order_and_reset() {
        let mut mesh = grid(8, 8);
        place_settlement(&mut mesh, 1, 0, true, 0);
        place_settlement(&mut mesh, 2, 63, true, 0);
        place_settlement(&mut mesh, 3, 7, false, 0);
        // stale usage from an earlier pass must be wiped
        mesh.road_usage[30] = 9;
        mesh.junction_usage[30] = 9;
        let params = RouteParams::default();

        let mut builder = NetworkBuilder::new(&mut mesh, &params).unwrap();
        let network = builder.regenerate().unwrap();

        assert!(!network.main.is_empty());
        assert!(network.check().is_ok());
        // cell 30 only carries usage if a fresh route crossed it
        assert!(mesh.junction_usage[30] == 0 || mesh.road_usage[30] > 0);
    }

    #[test]
    fn test_regenerate_is_deterministic() {
        let params = RouteParams::default();

        let build = || {
            let mut mesh = grid(10, 6);
            place_settlement(&mut mesh, 1, 0, true, 0);
            place_settlement(&mut mesh, 2, 59, true, 0);
            place_settlement(&mut mesh, 3, 9, false, 0);
            place_settlement(&mut mesh, 4, 50, false, 0);
            let mut builder = NetworkBuilder::new(&mut mesh, &params).unwrap();
            let network = builder.regenerate().unwrap();
            (network, mesh.road_usage.clone(), mesh.junction_usage.clone())
        };

        let (network_a, roads_a, junctions_a) = build();
        let (network_b, roads_b, junctions_b) = build();
        assert_eq!(network_a, network_b);
        assert_eq!(roads_a, roads_b);
        assert_eq!(junctions_a, junctions_b);
    }

    #[test]
    fn test_regenerate_twice_from_reset_state_matches() {
        let mut mesh = grid(10, 6);
        place_settlement(&mut mesh, 1, 0, true, 0);
        place_settlement(&mut mesh, 2, 59, true, 0);
        place_settlement(&mut mesh, 3, 9, false, 0);
        let params = RouteParams::default();

        let mut builder = NetworkBuilder::new(&mut mesh, &params).unwrap();
        let first = builder.regenerate().unwrap();
        let roads_first = builder.mesh.road_usage.clone();

        let second = builder.regenerate().unwrap();
        assert_eq!(first, second);
        assert_eq!(roads_first, builder.mesh.road_usage);
    }

    #[test]
    fn test_junction_implies_road_usage() {
        let mut mesh = grid(10, 10);
        place_settlement(&mut mesh, 1, 0, true, 0);
        place_settlement(&mut mesh, 2, 99, true, 0);
        place_settlement(&mut mesh, 3, 9, false, 0);
        place_settlement(&mut mesh, 4, 90, false, 0);
        let params = RouteParams::default();

        let mut builder = NetworkBuilder::new(&mut mesh, &params).unwrap();
        builder.regenerate().unwrap();

        for cell in 0..mesh.len() {
            if mesh.junction_usage[cell] > 0 {
                assert!(mesh.road_usage[cell] > 0, "junction off network at {cell}");
            }
        }
    }

    #[test]
    fn test_builder_rejects_malformed_mesh() {
        let mut mesh = grid(3, 3);
        mesh.neighbors[0].push(50);
        let params = RouteParams::default();
        assert!(NetworkBuilder::new(&mut mesh, &params).is_err());
    }

    #[test]
    fn test_network_round_trip() {
        let network = RouteNetwork {
            main: vec![RouteSegment {
                kind: RouteKind::Main,
                cells: vec![0, 1, 2],
            }],
            small: Vec::new(),
            oceanic: vec![RouteSegment {
                kind: RouteKind::Oceanic,
                cells: vec![5, 6],
            }],
        };
        let dir = std::env::temp_dir().join("wayfarer_test_network");
        let path = dir.join("network.bin");
        network.save_to_file(&path).unwrap();
        let loaded = RouteNetwork::load_from_file(&path).unwrap();
        assert_eq!(loaded, network);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_network_check_rejects_short_segment() {
        let network = RouteNetwork {
            main: Vec::new(),
            small: vec![RouteSegment {
                kind: RouteKind::Small,
                cells: vec![4],
            }],
            oceanic: Vec::new(),
        };
        assert!(network.check().is_err());
    }
}
