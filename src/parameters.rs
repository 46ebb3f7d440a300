use serde_derive::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::farmer::Strategy;
use crate::socialnetwork::Topology;
use crate::stochasticity::check_range;
use crate::suitability::SuitabilityWeights;
use crate::Season;

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Which parts of the knowledge store a SHARED farmer consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropagationMode {
    Zone,
    Neighbor,
    Both,
}

/// Which observed quantity the social signal is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialMetric {
    Yield,
    Profit,
}

/// How raw observations are mapped onto the [0, 1] scale of personal scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialNormalization {
    /// Observed value over the crop's value at full suitability, clipped to
    /// [0, 1]: yield over base yield, profit per ha over base yield × price
    Relative,
    /// Min-max over the crops present in the observation
    MinMax,
    /// Relative rank among the crops present in the observation
    Rank,
}

macro_rules! parse_lowercase {
    ($t:ty, $($name:literal => $variant:expr),+ $(,)?) => {
        impl std::str::FromStr for $t {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().replace('-', "_").as_str() {
                    $($name => Ok($variant),)+
                    other => Err(format!("unknown value {:?}", other)),
                }
            }
        }
    };
}

parse_lowercase!(PropagationMode,
    "zone" => PropagationMode::Zone,
    "neighbor" => PropagationMode::Neighbor,
    "neighbour" => PropagationMode::Neighbor,
    "both" => PropagationMode::Both);
parse_lowercase!(SocialMetric,
    "yield" => SocialMetric::Yield,
    "profit" => SocialMetric::Profit);
parse_lowercase!(SocialNormalization,
    "relative" => SocialNormalization::Relative,
    "min_max" => SocialNormalization::MinMax,
    "minmax" => SocialNormalization::MinMax,
    "rank" => SocialNormalization::Rank);

/// Economic multipliers that differ between the two strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyEconomics {
    /// Factor applied to all production costs
    pub cost_efficiency: f64,
    /// Share of the harvest lost before sale
    pub post_harvest_loss: f64,
    /// Factor applied to the producer price
    pub price_premium: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    pub seed: u64,
    pub n_agents: usize,
    pub n_seasons: Season,

    pub suitability_weights: SuitabilityWeights,
    /// Weight of the personal suitability score in a SHARED farmer's blend
    pub w_own: f64,
    /// Weight of the social score in a SHARED farmer's blend
    pub w_social: f64,
    pub propagation_mode: PropagationMode,
    pub social_metric: SocialMetric,
    pub social_normalization: SocialNormalization,
    /// Weight of the newest season in the zone aggregates' moving averages
    pub learning_speed_shared: f64,

    pub yield_variability: (f64, f64),
    /// Price volatility for crops that do not specify their own
    pub price_volatility: f64,
    pub individual: StrategyEconomics,
    pub shared: StrategyEconomics,
    /// Agricultural wage per labour day
    pub daily_wage: f64,
    /// Range land sizes (ha) are drawn from, once per matched pair
    pub land_size: (f64, f64),

    pub topology: Topology,
    pub average_degree: usize,
    /// Rewiring probability of the small-world topology
    pub rewiring_probability: f64,
    /// Matched twins share their random draws
    pub common_random_numbers: bool,
}

impl Default for Parameters {
    fn default() -> Parameters {
        Parameters {
            seed: 42,
            n_agents: 100,
            n_seasons: 10,

            suitability_weights: SuitabilityWeights::default(),
            w_own: 0.5,
            w_social: 0.5,
            propagation_mode: PropagationMode::Both,
            social_metric: SocialMetric::Yield,
            social_normalization: SocialNormalization::Relative,
            learning_speed_shared: 0.6,

            yield_variability: (0.8, 1.2),
            price_volatility: 0.15,
            individual: StrategyEconomics {
                cost_efficiency: 1.0,
                post_harvest_loss: 0.15,
                price_premium: 1.0,
            },
            shared: StrategyEconomics {
                cost_efficiency: 0.70,
                post_harvest_loss: 0.05,
                price_premium: 1.20,
            },
            // Moroccan agricultural minimum wage (SMAG), 2024
            daily_wage: 84.37,
            land_size: (2.0, 10.0),

            topology: Topology::SmallWorld,
            average_degree: 4,
            rewiring_probability: 0.1,
            common_random_numbers: true,
        }
    }
}

fn check_unit_weight(which: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigurationError::WeightOutOfRange { which, value })
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidParameter {
            name,
            value,
            reason: "must be positive",
        })
    }
}

fn check_strategy(
    prefix: [&'static str; 3],
    e: &StrategyEconomics,
) -> Result<(), ConfigurationError> {
    check_positive(prefix[0], e.cost_efficiency)?;
    if !(0.0..1.0).contains(&e.post_harvest_loss) {
        return Err(ConfigurationError::InvalidParameter {
            name: prefix[1],
            value: e.post_harvest_loss,
            reason: "must be in [0, 1)",
        });
    }
    check_positive(prefix[2], e.price_premium)
}

impl Parameters {
    pub fn economics(&self, strategy: Strategy) -> &StrategyEconomics {
        match strategy {
            Strategy::Individual => &self.individual,
            Strategy::Shared => &self.shared,
        }
    }

    /// Reject inconsistent parameter sets before the season loop starts.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.suitability_weights.validate()?;

        check_unit_weight("own", self.w_own)?;
        check_unit_weight("social", self.w_social)?;
        let sum = self.w_own + self.w_social;
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigurationError::WeightsDoNotSumToOne {
                which: "blend",
                sum,
            });
        }

        if !(self.learning_speed_shared > 0.0 && self.learning_speed_shared <= 1.0) {
            return Err(ConfigurationError::InvalidParameter {
                name: "learning_speed_shared",
                value: self.learning_speed_shared,
                reason: "must be in (0, 1]",
            });
        }

        if self.n_agents % 2 != 0 {
            return Err(ConfigurationError::UnpairedAgents {
                n_agents: self.n_agents,
            });
        }

        check_range(self.yield_variability.0, self.yield_variability.1).map_err(|source| {
            ConfigurationError::InvalidRange {
                name: "yield_variability",
                source,
            }
        })?;
        if self.yield_variability.0 < 0.0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "yield_variability",
                value: self.yield_variability.0,
                reason: "must not be negative",
            });
        }
        check_range(self.land_size.0, self.land_size.1).map_err(|source| {
            ConfigurationError::InvalidRange {
                name: "land_size",
                source,
            }
        })?;
        check_positive("land_size", self.land_size.0)?;
        if !(0.0..1.0).contains(&self.price_volatility) {
            return Err(ConfigurationError::InvalidParameter {
                name: "price_volatility",
                value: self.price_volatility,
                reason: "must be in [0, 1)",
            });
        }

        check_strategy(
            [
                "individual.cost_efficiency",
                "individual.post_harvest_loss",
                "individual.price_premium",
            ],
            &self.individual,
        )?;
        check_strategy(
            [
                "shared.cost_efficiency",
                "shared.post_harvest_loss",
                "shared.price_premium",
            ],
            &self.shared,
        )?;

        if !self.daily_wage.is_finite() || self.daily_wage < 0.0 {
            return Err(ConfigurationError::InvalidParameter {
                name: "daily_wage",
                value: self.daily_wage,
                reason: "must not be negative",
            });
        }
        if !(0.0..=1.0).contains(&self.rewiring_probability) {
            return Err(ConfigurationError::InvalidParameter {
                name: "rewiring_probability",
                value: self.rewiring_probability,
                reason: "must be in [0, 1]",
            });
        }
        Ok(())
    }
}
