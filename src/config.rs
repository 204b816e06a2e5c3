use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use validator::Validate;

use crate::errors::{WayfarerError, WayfarerResult};

/// Tunable parameters of the route cost model and reconstructor.
///
/// The defaults are the empirically tuned values the route shapes depend on;
/// they encode design intent rather than anything derivable from first
/// principles, which is why they live in a config struct instead of constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct RouteParams {
    /// Cells with elevation at or above this value are land.
    #[validate(range(min = 1, max = 100))]
    pub land_threshold: u8,
    /// Land cells above this elevation pay their own elevation as extra cost.
    #[validate(range(min = 1, max = 100))]
    pub highland_threshold: u8,

    // Land cost terms
    #[validate(range(min = 0.0))]
    pub base_land_cost: f32,
    #[validate(range(min = 0.0))]
    pub state_change_penalty: f32,
    #[validate(range(min = 0.0))]
    pub uninhabited_penalty: f32,
    #[validate(range(min = 0.0))]
    pub habitability_ceiling: f32,
    #[validate(range(min = 0.0))]
    pub elevation_delta_penalty: f32,
    /// Edge cost divisor for cells already on the network or hosting a
    /// settlement. Values below 1.0 would make reuse more expensive than
    /// fresh terrain, inverting the desire-path feedback.
    #[validate(range(min = 1.0))]
    pub reuse_divisor: f32,

    // Sea cost terms
    /// Water at or below this temperature is impassable ice.
    pub freeze_threshold: f32,
    #[validate(range(min = 0.0))]
    pub sea_reuse_base: f32,
    #[validate(range(min = 0.0, max = 1.0))]
    pub sea_reuse_distance_factor: f32,
    #[validate(range(min = 0.0))]
    pub coastal_sea_penalty: f32,
    #[validate(range(min = 0.0))]
    pub open_ocean_penalty: f32,

    // Reconstruction
    #[validate(range(min = 1))]
    pub main_usage_score: u16,
    #[validate(range(min = 1))]
    pub trail_usage_score: u16,
    /// Hard bound on the predecessor walk; exceeding it is a fatal
    /// invariant violation, not a truncation.
    #[validate(range(min = 1, max = 1000000))]
    pub max_restore_steps: u32,
}

impl Default for RouteParams {
    fn default() -> Self {
        Self {
            land_threshold: 20,
            highland_threshold: 80,

            base_land_cost: 10.0,
            state_change_penalty: 400.0,
            uninhabited_penalty: 400.0,
            habitability_ceiling: 100.0,
            elevation_delta_penalty: 10.0,
            reuse_divisor: 3.0,

            freeze_threshold: -5.0,
            sea_reuse_base: 1.0,
            sea_reuse_distance_factor: 0.5,
            coastal_sea_penalty: 1.0,
            open_ocean_penalty: 100.0,

            main_usage_score: 5,
            trail_usage_score: 1,
            max_restore_steps: 1000,
        }
    }
}

impl RouteParams {
    /// Run validator checks, mapping failures to a crate error with field details.
    pub fn check(&self) -> WayfarerResult<()> {
        self.validate().map_err(|validation_errors| {
            let details = validation_errors
                .field_errors()
                .iter()
                .map(|(field, errors)| {
                    let msgs: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                    format!("{field}: {}", msgs.join(", "))
                })
                .collect::<Vec<String>>()
                .join("; ");
            WayfarerError::InvalidParams { reason: details }
        })
    }
}

/// Load route parameters from a TOML file, falling back on defaults for
/// missing fields. Validation failures are errors, not silent fallbacks.
pub fn load_params<P: AsRef<Path>>(path: P) -> WayfarerResult<RouteParams> {
    let contents = fs::read_to_string(path)?;
    let params: RouteParams = toml::from_str(&contents)?;
    params.check()?;
    Ok(params)
}

/// Save route parameters as pretty TOML.
pub fn save_params<P: AsRef<Path>>(params: &RouteParams, path: P) -> WayfarerResult<()> {
    params.check()?;
    let contents = toml::to_string_pretty(params)?;
    fs::write(path, contents)?;
    Ok(())
}
