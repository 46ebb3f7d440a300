/*!
What is collected from a run, and how it is summarized.

The raw output is the sequence of season records. From it, this module derives
the aggregates used to compare the strategies: one line per strategy, one per
agent, and a time series per zone, season and strategy.
*/
use std::collections::BTreeMap;

use itertools::Itertools;
use serde_derive::{Deserialize, Serialize};
use tracing::info;

use crate::economics::Money;
use crate::farmer::{SeasonRecord, Strategy};
use crate::{AgentId, Season};

pub struct Settings {
    /// Log a season summary every this many seasons, 0 for never
    pub log_every: Season,
}

impl Default for Settings {
    fn default() -> Self {
        Settings { log_every: 1 }
    }
}

fn mean<I: Iterator<Item = f64>>(values: I) -> f64 {
    let (sum, n) = values.fold((0.0, 0_usize), |(s, n), x| (s + x, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

/// The crop chosen most often, ties to the alphabetically first.
fn most_common<'a, I: Iterator<Item = &'a str>>(crops: I) -> Option<String> {
    let counts = crops.counts();
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    ranked.first().map(|(c, _)| c.to_string())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySummary {
    pub strategy: Strategy,
    pub agents: usize,
    pub mean_yield_per_ha: f64,
    /// Mean profit per agent and season
    pub mean_profit: Money,
    pub total_profit: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent: AgentId,
    pub pair: usize,
    pub zone: String,
    pub strategy: Strategy,
    pub mean_yield_per_ha: f64,
    pub mean_profit: Money,
    pub cumulative_profit: Money,
    pub most_chosen_crop: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSeasonSummary {
    pub zone: String,
    pub season: Season,
    pub strategy: Strategy,
    pub agents: usize,
    pub mean_yield_per_ha: f64,
    pub mean_cost: Money,
    pub mean_revenue: Money,
    pub mean_profit: Money,
    pub dominant_crop: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub strategies: Vec<StrategySummary>,
    /// Mean yield of SHARED minus that of INDIVIDUAL farmers, t/ha
    pub yield_advantage_shared: Option<f64>,
    /// Mean seasonal profit of SHARED minus that of INDIVIDUAL farmers
    pub profit_advantage_shared: Option<Money>,
    pub agents: Vec<AgentSummary>,
    pub zone_seasons: Vec<ZoneSeasonSummary>,
}

impl Summary {
    pub fn from_records(records: &[SeasonRecord]) -> Summary {
        let by_strategy: BTreeMap<Strategy, Vec<&SeasonRecord>> =
            records.iter().map(|r| (r.strategy, r)).into_group_map().into_iter().collect();
        let strategies: Vec<StrategySummary> = by_strategy
            .iter()
            .map(|(&strategy, rs)| StrategySummary {
                strategy,
                agents: rs.iter().map(|r| r.agent).unique().count(),
                mean_yield_per_ha: mean(rs.iter().map(|r| r.yield_per_ha)),
                mean_profit: Money::from(mean(rs.iter().map(|r| r.profit.value()))),
                total_profit: rs.iter().map(|r| r.profit).sum(),
            })
            .collect();

        let of = |strategy: Strategy| strategies.iter().find(|s| s.strategy == strategy);
        let (yield_advantage_shared, profit_advantage_shared) =
            match (of(Strategy::Shared), of(Strategy::Individual)) {
                (Some(shared), Some(individual)) => (
                    Some(shared.mean_yield_per_ha - individual.mean_yield_per_ha),
                    Some(shared.mean_profit - individual.mean_profit),
                ),
                _ => (None, None),
            };

        let by_agent: BTreeMap<AgentId, Vec<&SeasonRecord>> =
            records.iter().map(|r| (r.agent, r)).into_group_map().into_iter().collect();
        let agents = by_agent
            .iter()
            .filter_map(|(&agent, rs)| {
                let last = rs.iter().max_by_key(|r| r.season)?;
                Some(AgentSummary {
                    agent,
                    pair: last.pair,
                    zone: last.zone.clone(),
                    strategy: last.strategy,
                    mean_yield_per_ha: mean(rs.iter().map(|r| r.yield_per_ha)),
                    mean_profit: Money::from(mean(rs.iter().map(|r| r.profit.value()))),
                    cumulative_profit: last.cumulative_profit,
                    most_chosen_crop: most_common(rs.iter().map(|r| r.crop.as_str())),
                })
            })
            .collect();

        let by_zone_season: BTreeMap<(&str, Season, Strategy), Vec<&SeasonRecord>> = records
            .iter()
            .map(|r| ((r.zone.as_str(), r.season, r.strategy), r))
            .into_group_map()
            .into_iter()
            .collect();
        let zone_seasons = by_zone_season
            .into_iter()
            .map(|((zone, season, strategy), rs)| ZoneSeasonSummary {
                zone: zone.to_string(),
                season,
                strategy,
                agents: rs.len(),
                mean_yield_per_ha: mean(rs.iter().map(|r| r.yield_per_ha)),
                mean_cost: Money::from(mean(rs.iter().map(|r| r.cost.value()))),
                mean_revenue: Money::from(mean(rs.iter().map(|r| r.revenue.value()))),
                mean_profit: Money::from(mean(rs.iter().map(|r| r.profit.value()))),
                dominant_crop: most_common(rs.iter().map(|r| r.crop.as_str())),
            })
            .collect();

        Summary {
            strategies,
            yield_advantage_shared,
            profit_advantage_shared,
            agents,
            zone_seasons,
        }
    }
}

/// Log one line per strategy for the season just completed.
pub fn log_season(season: Season, records: &[SeasonRecord]) {
    for (strategy, rs) in &records.iter().sorted_by_key(|r| r.strategy).group_by(|r| r.strategy) {
        let rs: Vec<&SeasonRecord> = rs.collect();
        info!(
            season,
            strategy = %strategy,
            agents = rs.len(),
            mean_yield = mean(rs.iter().map(|r| r.yield_per_ha)),
            mean_profit = mean(rs.iter().map(|r| r.profit.value())),
            crops = rs.iter().map(|r| r.crop.as_str()).unique().count(),
            "Season"
        );
    }
}
