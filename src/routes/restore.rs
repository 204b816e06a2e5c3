use crate::config::RouteParams;
use crate::errors::{WayfarerError, WayfarerResult};
use crate::mesh::{CellId, WorldMesh};
use crate::routes::search::Predecessor;
use crate::routes::{RouteKind, RouteSegment};

/// Walk a predecessor map backward from `terminus` to `source`, splitting
/// the walk into renderable segments and accumulating usage counters.
///
/// A segment closes whenever the walk lands on a cell that already carries
/// infrastructure; that cell ends the closed segment and starts the next
/// one, and both endpoints of the closed segment are marked as junctions
/// unless they are the absolute source or terminus. Every visited cell gets
/// a flat usage increment. Oceanic routes always open a fresh segment at
/// the terminus, even when it is already on the network.
///
/// The walk is bounded by `params.max_restore_steps`; a predecessor map
/// produced by the search engine is acyclic, so hitting the bound is a
/// fatal invariant violation.
pub fn restore_path(
    mesh: &mut WorldMesh,
    params: &RouteParams,
    source: CellId,
    terminus: CellId,
    kind: RouteKind,
    predecessor: &Predecessor,
) -> WayfarerResult<Vec<RouteSegment>> {
    let score = match kind {
        RouteKind::Main => params.main_usage_score,
        RouteKind::Small | RouteKind::Oceanic => params.trail_usage_score,
    };

    let mut segments = Vec::new();
    let mut segment: Vec<CellId> = Vec::new();
    let mut current = terminus;

    if kind == RouteKind::Oceanic || !mesh.on_network(terminus) {
        segment.push(terminus);
    }
    if !mesh.on_network(terminus) {
        mesh.road_usage[terminus] = score;
    }
    // Pending splice point: when a segment has just closed on an
    // infrastructure cell, the next segment re-opens from that same cell.
    let mut splice: Option<CellId> = if segment.is_empty() {
        Some(terminus)
    } else {
        None
    };

    let limit = params.max_restore_steps as usize;
    let mut finished = false;
    for _ in 0..limit {
        let Some(prev) = predecessor[current] else {
            finished = true;
            break;
        };
        current = prev;

        if mesh.on_network(current) {
            if !segment.is_empty() {
                segment.push(current);
                let first = segment[0];
                if first != terminus {
                    mesh.bump_road(first, score);
                    mesh.bump_junction(first, score);
                }
                if current != source {
                    mesh.bump_road(current, score);
                    mesh.bump_junction(current, score);
                }
                segments.push(RouteSegment {
                    kind,
                    cells: std::mem::take(&mut segment),
                });
            }
            splice = Some(current);
        } else {
            if let Some(open_at) = splice.take() {
                segment.push(open_at);
            }
            segment.push(current);
        }

        mesh.bump_road(current, score);
        if current == source {
            finished = true;
            break;
        }
    }

    if !finished {
        return Err(WayfarerError::PredecessorCycle {
            terminus,
            limit,
        });
    }

    // Dangling single-cell segments are not renderable polylines.
    if segment.len() > 1 {
        segments.push(RouteSegment { kind, cells: segment });
    }
    Ok(segments)
}
