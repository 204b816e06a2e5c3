use crate::errors::{WayfarerError, WayfarerResult};

/// Index of a cell in the mesh.
pub type CellId = usize;

/// A settlement placed on a mesh cell.
///
/// `port` is the feature id of the navigable water body the settlement sits
/// on, or 0 if it has no harbor. Removed settlements are logically deleted
/// and excluded from every builder query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub id: u16,
    pub cell: CellId,
    pub is_capital: bool,
    pub port: u16,
    pub removed: bool,
    /// Landmass feature the settlement stands on.
    pub feature: u16,
}

/// A connected region of same-type cells (a landmass or a water body).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feature {
    pub id: u16,
    pub land: bool,
}

/// Column-oriented world mesh: one entry per cell in every column.
///
/// Terrain attributes are produced by an external generator and read-only
/// here; the usage counters (`road_usage`, `junction_usage`) are the only
/// columns the route builders mutate, and they feed back into subsequent
/// path costs. All mutation goes through a single `&mut WorldMesh` handle,
/// sequentially; the desire-path feedback makes concurrent builds unsound.
#[derive(Debug, Clone)]
pub struct WorldMesh {
    /// Adjacent cell ids, in mesh order.
    pub neighbors: Vec<Vec<CellId>>,
    /// Cell center coordinates.
    pub centers: Vec<(f32, f32)>,
    /// Elevation on a 0..100 scale; land iff at or above the land threshold.
    pub elevation: Vec<u8>,
    /// Biome id, an index into `habitability`.
    pub biome: Vec<u8>,
    /// Political state id, 0 = unclaimed.
    pub state: Vec<u16>,
    /// Mean temperature in degrees Celsius.
    pub temperature: Vec<f32>,
    /// Landmass or water-body feature id.
    pub feature: Vec<u16>,
    /// Signed distance-to-coast rank: positive on land, negative on
    /// near-coast water, 0 on unmarked open ocean.
    pub shore: Vec<i8>,
    /// Settlement id hosted by the cell, if any.
    pub settlement: Vec<Option<u16>>,
    /// Infrastructure intensity; 0 = not on the network.
    pub road_usage: Vec<u16>,
    /// How many route segments terminate or meet at the cell.
    pub junction_usage: Vec<u16>,
    /// General desirability score; road usage is folded into it.
    pub suitability: Vec<i16>,

    /// Habitability score per biome id, 0..100.
    pub habitability: Vec<u8>,
    pub settlements: Vec<Settlement>,
    pub features: Vec<Feature>,
}

impl WorldMesh {
    /// Number of cells in the mesh.
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Squared Euclidean distance between two cell centers.
    pub fn distance2(&self, a: CellId, b: CellId) -> f32 {
        let (ax, ay) = self.centers[a];
        let (bx, by) = self.centers[b];
        (bx - ax) * (bx - ax) + (by - ay) * (by - ay)
    }

    /// Whether the cell hosts a settlement.
    pub fn is_settlement(&self, cell: CellId) -> bool {
        self.settlement[cell].is_some()
    }

    /// Whether the cell is part of the built network.
    pub fn on_network(&self, cell: CellId) -> bool {
        self.road_usage[cell] > 0
    }

    pub fn bump_road(&mut self, cell: CellId, score: u16) {
        self.road_usage[cell] = self.road_usage[cell].saturating_add(score);
    }

    pub fn bump_junction(&mut self, cell: CellId, score: u16) {
        self.junction_usage[cell] = self.junction_usage[cell].saturating_add(score);
    }

    /// Zero both usage counter columns ahead of a full rebuild.
    pub fn reset_usage(&mut self) {
        self.road_usage.fill(0);
        self.junction_usage.fill(0);
    }

    /// Check the mesh provider contract: consistent column lengths and
    /// in-range cross references. Malformed input is a configuration error
    /// reported here once, not handled per-cell during the build.
    pub fn validate(&self) -> WayfarerResult<()> {
        let n = self.len();

        let columns = [
            ("centers", self.centers.len()),
            ("elevation", self.elevation.len()),
            ("biome", self.biome.len()),
            ("state", self.state.len()),
            ("temperature", self.temperature.len()),
            ("feature", self.feature.len()),
            ("shore", self.shore.len()),
            ("settlement", self.settlement.len()),
            ("road_usage", self.road_usage.len()),
            ("junction_usage", self.junction_usage.len()),
            ("suitability", self.suitability.len()),
        ];
        for (name, len) in columns {
            if len != n {
                return Err(WayfarerError::InvalidMesh {
                    reason: format!("column {name} has {len} entries, expected {n}"),
                });
            }
        }

        for (cell, adjacent) in self.neighbors.iter().enumerate() {
            for &neighbor in adjacent {
                if neighbor >= n {
                    return Err(WayfarerError::InvalidMesh {
                        reason: format!("cell {cell} cites missing neighbor {neighbor}"),
                    });
                }
                if neighbor == cell {
                    return Err(WayfarerError::InvalidMesh {
                        reason: format!("cell {cell} lists itself as a neighbor"),
                    });
                }
            }
        }

        for (cell, &biome) in self.biome.iter().enumerate() {
            if biome as usize >= self.habitability.len() {
                return Err(WayfarerError::InvalidMesh {
                    reason: format!("cell {cell} has biome {biome} outside the habitability table"),
                });
            }
        }

        for settlement in &self.settlements {
            if settlement.cell >= n {
                return Err(WayfarerError::InvalidMesh {
                    reason: format!(
                        "settlement {} sits on missing cell {}",
                        settlement.id, settlement.cell
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Habitability scores for the default biome set, indexed by biome id.
/// Biome 0 is marine; deserts, glaciers and wetlands score low, temperate
/// forest and grassland score high.
pub fn default_habitability() -> Vec<u8> {
    vec![0, 4, 10, 22, 30, 50, 100, 80, 90, 12, 35, 15, 20]
}
