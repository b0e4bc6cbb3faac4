use pnr_common::engine::EngineError;
use pnr_common::util::config::ConfigError;
use std::error::Error;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConductorError {
    #[error("Conductor: No cell loaded yet.")]
    NoCell,
    #[error("placement pass {pass} failed in `{stage}`")]
    Placement {
        pass: usize,
        stage: &'static str,
        #[source]
        source: EngineError,
    },
    #[error("routing pass {pass} failed in `{stage}`")]
    Routing {
        pass: usize,
        stage: &'static str,
        #[source]
        source: EngineError,
    },
    #[error("configuration access failed")]
    Config(#[from] ConfigError),
}

impl ConductorError {
    /// The error and its whole cause chain on one line.
    pub fn report(&self) -> String {
        let mut text = self.to_string();
        let mut cause = self.source();
        while let Some(e) = cause {
            text.push_str(": ");
            text.push_str(&e.to_string());
            cause = e.source();
        }
        text
    }
}
