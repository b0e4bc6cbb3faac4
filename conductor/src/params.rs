use pnr_common::util::config::{ConfigError, ConfigStore};

pub const STOP_LEVEL: &str = "conductor.stopLevel";
pub const MAX_PLACE_ITERATIONS: &str = "conductor.maxPlaceIterations";
pub const USE_FIXED_AB_HEIGHT: &str = "conductor.useFixedAbHeight";
/// Effort budget read by the global router; also the slot the escalation
/// writes into.
pub const GLOBAL_ITERATIONS: &str = "anabatic.globalIterations";
pub const GLOBAL_ITERATIONS_ESTIMATE: &str = "anabatic.globalIterationsEstimate";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunParameters {
    pub stop_level: u32,
    pub max_place_iterations: usize,
    pub global_iterations_final: i64,
    pub global_iterations_estimate: i64,
    pub use_fixed_ab_height: bool,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            stop_level: 1,
            max_place_iterations: 2,
            global_iterations_final: 10,
            global_iterations_estimate: 7,
            use_fixed_ab_height: false,
        }
    }
}

impl RunParameters {
    /// Reads the run parameters, keeping the default of every absent key.
    pub fn load(config: &ConfigStore) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let stop_level = config.get_int_or(STOP_LEVEL, defaults.stop_level as i64)?;
        let stop_level = u32::try_from(stop_level).map_err(|_| ConfigError::OutOfRange {
            key: STOP_LEVEL.to_string(),
            value: stop_level,
            reason: "must not be negative",
        })?;

        let max_place_iterations =
            config.get_int_or(MAX_PLACE_ITERATIONS, defaults.max_place_iterations as i64)?;
        if max_place_iterations < 1 {
            return Err(ConfigError::OutOfRange {
                key: MAX_PLACE_ITERATIONS.to_string(),
                value: max_place_iterations,
                reason: "at least one placement is required",
            });
        }

        Ok(Self {
            stop_level,
            max_place_iterations: max_place_iterations as usize,
            global_iterations_final: config
                .get_int_or(GLOBAL_ITERATIONS, defaults.global_iterations_final)?,
            global_iterations_estimate: config
                .get_int_or(GLOBAL_ITERATIONS_ESTIMATE, defaults.global_iterations_estimate)?,
            use_fixed_ab_height: config
                .get_bool_or(USE_FIXED_AB_HEIGHT, defaults.use_fixed_ab_height)?,
        })
    }

    pub fn is_last_iteration(&self, index: usize) -> bool {
        index + 1 == self.max_place_iterations
    }
}
