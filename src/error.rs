/*!
Errors of the crop choice model.

There is no I/O inside the season loop, so every failure is deterministic given
the catalogs, the parameters and the seed. None of them is worth retrying; they
are reported with enough context to reproduce them.
*/
use crate::stochasticity::DrawPurpose;
use crate::{AgentId, Season};

/// Malformed or inconsistent catalogs or parameters.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigurationError {
    #[error("zone {zone} lists unknown crop {crop}")]
    UnknownCrop { zone: String, crop: String },

    #[error("zone {zone} has no viable crops")]
    EmptyViableCrops { zone: String },

    #[error("zone {zone} lists crop {crop} more than once")]
    RepeatedViableCrop { zone: String, crop: String },

    #[error("duplicate zone id {0}")]
    DuplicateZone(String),

    #[error("duplicate crop id {0}")]
    DuplicateCrop(String),

    #[error("crop {crop} has non-positive producer price {price}")]
    NonPositivePrice { crop: String, price: f64 },

    #[error("crop {crop} has non-positive base yield {base_yield}")]
    NonPositiveYield { crop: String, base_yield: f64 },

    #[error("crop {crop} has invalid {field}: {value}")]
    InvalidCropAttribute {
        crop: String,
        field: &'static str,
        value: f64,
    },

    #[error("zone {zone} has invalid {field}: {value}")]
    InvalidZoneAttribute {
        zone: String,
        field: &'static str,
        value: f64,
    },

    #[error("{which} weights sum to {sum}, expected 1")]
    WeightsDoNotSumToOne { which: &'static str, sum: f64 },

    #[error("{which} weight {value} is outside [0, 1]")]
    WeightOutOfRange { which: &'static str, value: f64 },

    #[error("{n_agents} agents cannot be split into matched pairs")]
    UnpairedAgents { n_agents: usize },

    #[error("{n_agents} agents requested, but the zone catalog is empty")]
    NoZones { n_agents: usize },

    #[error("parameter {name} = {value} is invalid: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("parameter {name}: {source}")]
    InvalidRange {
        name: &'static str,
        source: SamplingError,
    },
}

/// A random range that cannot be sampled from.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum SamplingError {
    #[error("inverted range [{min}, {max}]")]
    InvertedRange { min: f64, max: f64 },

    #[error("non-finite range [{min}, {max}]")]
    NonFiniteRange { min: f64, max: f64 },
}

/// Everything that can stop a simulation run.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error("agent {agent} in zone {zone} has no viable crop in season {season}")]
    NoViableCrop {
        agent: AgentId,
        season: Season,
        zone: String,
    },

    #[error(
        "sampling {purpose:?} failed for agent {agent} (zone {zone}, crop {crop}) in season {season}: {source}"
    )]
    Sampling {
        agent: AgentId,
        season: Season,
        zone: String,
        crop: String,
        purpose: DrawPurpose,
        source: SamplingError,
    },
}
