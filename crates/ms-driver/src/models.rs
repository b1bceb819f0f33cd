//! The shared, immutable model bundle every driver frame reads.

use ms_behavior::{CarFollowingModel, LaneChangeModel};
use ms_core::{CoreResult, ParameterManager};

/// Built once from the [`ParameterManager`] and shared (read-only) across
/// all drivers and worker threads.
pub struct DriverModels {
    pub cf: CarFollowingModel,
    pub lc: LaneChangeModel,
    /// Comfortable lateral acceleration used for the turn-speed cap, m/s².
    pub comfort_lat_acc: f64,
}

impl DriverModels {
    pub fn from_manager(pm: &ParameterManager) -> CoreResult<Self> {
        Ok(Self {
            cf: CarFollowingModel::from_manager(pm)?,
            lc: LaneChangeModel::from_manager(pm)?,
            comfort_lat_acc: pm.param_f64("int_comfort_lat_acc")?,
        })
    }
}
