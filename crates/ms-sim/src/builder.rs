//! Fluent builder for constructing a [`Scheduler`].

use std::collections::BTreeMap;

use ms_core::{NodeId, ParameterManager, SimConfig, Tick};
use ms_driver::DriverModels;
use ms_intersection::IntersectionManager;
use ms_network::RoadNetwork;

use crate::demand::Trip;
use crate::error::SimResult;
use crate::neighbors::VisibilityEnvelope;
use crate::scheduler::Scheduler;

/// Fluent builder for [`Scheduler`].
///
/// # Required inputs
///
/// - [`SimConfig`] — tick length, total ticks, seed, granularities.
/// - [`RoadNetwork`] — the frozen network.
///
/// # Optional inputs (have defaults)
///
/// | Method        | Default                                 |
/// |---------------|-----------------------------------------|
/// | `.params(pm)` | `ParameterManager::with_defaults()`     |
/// | `.trips(v)`   | no demand (an empty simulation)         |
/// | `.envelope(e)`| 30 m forward / 5 m back visibility      |
///
/// # Example
///
/// ```rust,ignore
/// let mut sim = SimBuilder::new(config, network)
///     .trips(load_trips_csv(&path)?)
///     .build()?;
/// sim.run(&mut NoopObserver)?;
/// ```
pub struct SimBuilder {
    config: SimConfig,
    network: RoadNetwork,
    params: Option<ParameterManager>,
    trips: Vec<Trip>,
    envelope: VisibilityEnvelope,
}

impl SimBuilder {
    pub fn new(config: SimConfig, network: RoadNetwork) -> Self {
        Self {
            config,
            network,
            params: None,
            trips: Vec::new(),
            envelope: VisibilityEnvelope::default(),
        }
    }

    /// Supply a parameter manager with model overrides.
    pub fn params(mut self, pm: ParameterManager) -> Self {
        self.params = Some(pm);
        self
    }

    /// Supply the demand (trips ordered or unordered; the builder buckets
    /// them by dispatch tick).
    pub fn trips(mut self, trips: Vec<Trip>) -> Self {
        self.trips = trips;
        self
    }

    /// Override the neighbor-query visibility envelope.
    pub fn envelope(mut self, envelope: VisibilityEnvelope) -> Self {
        self.envelope = envelope;
        self
    }

    /// Validate the configuration, build the models and intersection
    /// managers, and return a ready-to-run [`Scheduler`].
    pub fn build(self) -> SimResult<Scheduler> {
        self.config.validate()?;
        let pm = self.params.unwrap_or_else(ParameterManager::with_defaults);
        let models = DriverModels::from_manager(&pm)?;

        // One manager per node that actually hosts turning movements.
        let mut managers: BTreeMap<NodeId, IntersectionManager> = BTreeMap::new();
        for node in &self.network.nodes {
            if !node.turning_groups.is_empty() && !node.node_type.is_merge() {
                managers.insert(node.id, IntersectionManager::new(node.id, &pm)?);
            }
        }

        // Bucket trips by dispatch tick.
        let clock = self.config.make_clock();
        let mut pending: BTreeMap<Tick, Vec<Trip>> = BTreeMap::new();
        for trip in self.trips {
            pending.entry(clock.tick_at(trip.start)).or_default().push(trip);
        }

        // Perception buffers retain mean + 4σ of reaction time, with a small
        // floor so that zero-delay configurations still round-trip cleanly.
        let rt = &self.config.reaction_time;
        let max_reaction_ms = (rt.mean_ms + 4.0 * rt.stddev_ms).ceil().max(0.0) as u64;

        Ok(Scheduler::new(
            self.config,
            self.network,
            models,
            managers,
            pending,
            self.envelope,
            max_reaction_ms,
        ))
    }
}
