use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::config::RouteParams;
use crate::mesh::{CellId, WorldMesh};
use crate::routes::cost;

/// Predecessor map: for each cell, the cell that first relaxed it.
pub type Predecessor = Vec<Option<CellId>>;

/// Goal condition for a single-source least-cost search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Stop as soon as an edge relaxes the given cell.
    Target(CellId),
    /// Stop at the first dequeued cell (other than the source) that already
    /// carries infrastructure.
    NearestInfrastructure,
    /// Sea variant: stop at infrastructure like `NearestInfrastructure`, but
    /// also short-circuit whenever any edge reaches `exit` directly, before
    /// passability filtering. Ports are land cells, so the exit is only ever
    /// reachable through this short circuit.
    SeaLane { exit: CellId },
    /// No goal; exhaust the reachable set and return the full map.
    Exhaustive,
}

/// Outcome of one search: the predecessor map built so far, the cell the
/// search terminated on (if any), and whether the goal condition was met.
/// An exhausted frontier is "no route", never an error.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub predecessor: Predecessor,
    pub terminus: Option<CellId>,
    pub reachable: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct FrontierEntry {
    cost: f32,
    cell: CellId,
}

impl Eq for FrontierEntry {}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Cell id as secondary key for deterministic tie-breaking.
        self.cost
            .total_cmp(&other.cost)
            .then_with(|| self.cell.cmp(&other.cell))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Least-cost search over land cells. Water cells have no edges at all, so
/// they can never appear in the returned predecessor map.
pub fn find_land_path(
    mesh: &WorldMesh,
    params: &RouteParams,
    source: CellId,
    mode: SearchMode,
) -> SearchResult {
    search(mesh, source, mode, |from, to| {
        cost::land_cost(mesh, params, from, to)
    })
}

/// Least-cost search over water cells, from `source` toward the port cell
/// `exit`, stopping early on existing sea lanes.
pub fn find_sea_path(
    mesh: &WorldMesh,
    params: &RouteParams,
    source: CellId,
    exit: CellId,
) -> SearchResult {
    search(mesh, source, SearchMode::SeaLane { exit }, |from, to| {
        cost::sea_cost(mesh, params, from, to)
    })
}

/// Dijkstra variant shared by both domains.
///
/// Two deliberate deviations from the textbook algorithm, both load-bearing
/// for downstream route shapes:
/// - a cell is relaxed at most once: a recorded predecessor is never
///   replaced by a later, cheaper discovery;
/// - in `Target` mode the search returns the moment an edge relaxes the
///   target, rather than when the target is dequeued.
/// Do not "fix" either into classical Dijkstra.
///
/// Nothing seeds `best[source]`, so the source itself is relaxed when the
/// first neighbor reaches back to it. The resulting two-cycle through the
/// source is never walked: reconstruction stops on reaching the source.
fn search<F>(mesh: &WorldMesh, source: CellId, mode: SearchMode, edge_cost: F) -> SearchResult
where
    F: Fn(CellId, CellId) -> Option<f32>,
{
    let n = mesh.len();
    let mut predecessor: Predecessor = vec![None; n];
    let mut best: Vec<Option<f32>> = vec![None; n];
    let mut frontier = BinaryHeap::new();
    frontier.push(Reverse(FrontierEntry {
        cost: 0.0,
        cell: source,
    }));

    while let Some(Reverse(FrontierEntry { cost: cumulative, cell: current })) = frontier.pop() {
        let stop_on_infrastructure = matches!(
            mode,
            SearchMode::NearestInfrastructure | SearchMode::SeaLane { .. }
        );
        if stop_on_infrastructure && current != source && mesh.on_network(current) {
            return SearchResult {
                predecessor,
                terminus: Some(current),
                reachable: true,
            };
        }

        for &next in &mesh.neighbors[current] {
            if let SearchMode::SeaLane { exit } = mode {
                if next == exit {
                    if predecessor[next].is_none() {
                        predecessor[next] = Some(current);
                    }
                    return SearchResult {
                        predecessor,
                        terminus: Some(exit),
                        reachable: true,
                    };
                }
            }

            let Some(edge) = edge_cost(current, next) else {
                continue;
            };
            let total = cumulative + edge;

            // Single-assignment predecessor: first relaxation wins.
            if predecessor[next].is_some() || best[next].is_some_and(|b| total >= b) {
                continue;
            }
            predecessor[next] = Some(current);

            if mode == SearchMode::Target(next) {
                return SearchResult {
                    predecessor,
                    terminus: Some(next),
                    reachable: true,
                };
            }

            best[next] = Some(total);
            frontier.push(Reverse(FrontierEntry {
                cost: total,
                cell: next,
            }));
        }
    }

    // Frontier exhausted before the goal condition was met.
    let terminus = match mode {
        SearchMode::Target(target) => Some(target),
        _ => None,
    };
    SearchResult {
        predecessor,
        terminus,
        reachable: false,
    }
}
