use crate::config::RouteParams;
use crate::mesh::{CellId, WorldMesh};

/// Cost of extending a land route from `from` onto neighboring cell `to`.
///
/// Returns `None` when no edge exists (the neighbor is water). Pure over a
/// snapshot of the mesh: reads usage counters, never writes them.
pub fn land_cost(mesh: &WorldMesh, params: &RouteParams, from: CellId, to: CellId) -> Option<f32> {
    if mesh.elevation[to] < params.land_threshold {
        return None;
    }

    // Routes prefer staying within one jurisdiction.
    let state_change = if mesh.state[to] != mesh.state[from] {
        params.state_change_penalty
    } else {
        0.0
    };

    // Routes prefer populated areas; uninhabitable biomes pay a flat penalty.
    let habitability = mesh.habitability[mesh.biome[to] as usize] as f32;
    let habited = if habitability > 0.0 {
        (params.habitability_ceiling - habitability).max(0.0)
    } else {
        params.uninhabited_penalty
    };

    // Routes avoid grade changes and high mountains.
    let grade = (mesh.elevation[to] as f32 - mesh.elevation[from] as f32).abs()
        * params.elevation_delta_penalty;
    let altitude = if mesh.elevation[to] > params.highland_threshold {
        mesh.elevation[to] as f32
    } else {
        0.0
    };

    let cell_cost = params.base_land_cost + state_change + habited + grade + altitude;

    // Existing infrastructure and settlements are cheaper to extend along.
    if mesh.on_network(to) || mesh.is_settlement(to) {
        Some(cell_cost / params.reuse_divisor)
    } else {
        Some(cell_cost)
    }
}

/// Cost of extending a sea route from `from` onto neighboring cell `to`.
///
/// Returns `None` when no edge exists: the neighbor is land, or frozen over.
pub fn sea_cost(mesh: &WorldMesh, params: &RouteParams, from: CellId, to: CellId) -> Option<f32> {
    if mesh.elevation[to] >= params.land_threshold {
        return None;
    }
    if mesh.temperature[to] <= params.freeze_threshold {
        return None;
    }

    // Squared distance favors straight, short hops between cell centers.
    let dist2 = mesh.distance2(from, to);

    if mesh.on_network(to) {
        Some(params.sea_reuse_base + dist2 * params.sea_reuse_distance_factor)
    } else if mesh.shore[to] != 0 {
        Some(dist2 + params.coastal_sea_penalty)
    } else {
        Some(dist2 + params.open_ocean_penalty)
    }
}
