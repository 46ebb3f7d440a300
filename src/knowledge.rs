/*!
The knowledge store and knowledge propagation.

The store is the only channel through which information crosses agent
boundaries. It holds, for every zone, a running aggregate per crop of the
outcomes SHARED farmers obtained there, and for every farmer the ordered list
of their own outcomes.

The store is versioned by season. During the decision phase of season `t` it
is only ever borrowed immutably and reflects seasons `1..t-1`; the scheduler
then hands it all outcomes of season `t` at once through
[`KnowledgeStore::commit`], which is the only mutating operation. Nothing is
ever evicted.
*/
use std::collections::BTreeMap;

use rayon::prelude::*;
use serde_derive::{Deserialize, Serialize};

use crate::catalog::{Catalog, CropIndex, ZoneIndex};
use crate::farmer::Strategy;
use crate::parameters::{PropagationMode, SocialMetric, SocialNormalization};
use crate::socialnetwork::SocialNetwork;
use crate::{AgentId, Season};

/// One farmer's result in one season, per hectare.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub season: Season,
    pub crop: CropIndex,
    pub yield_per_ha: f64,
    pub profit_per_ha: f64,
}

impl Outcome {
    pub fn metric(&self, metric: SocialMetric) -> f64 {
        match metric {
            SocialMetric::Yield => self.yield_per_ha,
            SocialMetric::Profit => self.profit_per_ha,
        }
    }
}

/// The mean of the outcomes contributed in a single season.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeasonalMean {
    pub season: Season,
    pub count: u64,
    pub mean_yield: f64,
    pub mean_profit_per_ha: f64,
}

/**
Running aggregate of the SHARED outcomes for one (zone, crop) pair.

Besides the plain means over every outcome, the aggregate keeps an
exponential moving average over the per-season means. That is what SHARED
farmers learn from: the newest season enters with weight `learning_speed`.

```rust
use model::knowledge::{Aggregate, Outcome};
let mut a = Aggregate::default();
a.fold(&Outcome { season: 1, crop: 0, yield_per_ha: 2.0, profit_per_ha: 100. });
a.fold(&Outcome { season: 1, crop: 0, yield_per_ha: 4.0, profit_per_ha: 300. });
a.learn(1, 0.5);
assert_eq!(a.count, 2);
assert_eq!(a.mean_yield, 3.0);
assert_eq!(a.mean_profit_per_ha, 200.);
assert_eq!(a.learned_yield, 3.0);

a.fold(&Outcome { season: 2, crop: 0, yield_per_ha: 7.0, profit_per_ha: 600. });
a.learn(2, 0.5);
assert_eq!(a.seasonal.len(), 2);
assert_eq!(a.learned_yield, 5.0);
assert_eq!(a.learned_profit_per_ha, 400.);
```
*/
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub count: u64,
    pub mean_yield: f64,
    pub mean_profit_per_ha: f64,
    /// Moving average of the seasonal mean yields
    pub learned_yield: f64,
    /// Moving average of the seasonal mean profits per ha
    pub learned_profit_per_ha: f64,
    /// Per-season batch means, oldest first
    pub seasonal: Vec<SeasonalMean>,
}

fn incremental_mean(mean: f64, count: u64, x: f64) -> f64 {
    mean + (x - mean) / count as f64
}

impl Aggregate {
    pub fn fold(&mut self, outcome: &Outcome) {
        self.count += 1;
        self.mean_yield = incremental_mean(self.mean_yield, self.count, outcome.yield_per_ha);
        self.mean_profit_per_ha =
            incremental_mean(self.mean_profit_per_ha, self.count, outcome.profit_per_ha);

        match self.seasonal.last_mut() {
            Some(s) if s.season == outcome.season => {
                s.count += 1;
                s.mean_yield = incremental_mean(s.mean_yield, s.count, outcome.yield_per_ha);
                s.mean_profit_per_ha =
                    incremental_mean(s.mean_profit_per_ha, s.count, outcome.profit_per_ha);
            }
            _ => self.seasonal.push(SeasonalMean {
                season: outcome.season,
                count: 1,
                mean_yield: outcome.yield_per_ha,
                mean_profit_per_ha: outcome.profit_per_ha,
            }),
        }
    }

    /// Move the learned averages towards the batch of `season`, once all of
    /// its outcomes are folded. The first season is taken as is; seasons
    /// without outcomes for this crop leave the averages alone.
    pub fn learn(&mut self, season: Season, learning_speed: f64) {
        let latest = match self.seasonal.last() {
            Some(s) if s.season == season => *s,
            _ => return,
        };
        if self.seasonal.len() == 1 {
            self.learned_yield = latest.mean_yield;
            self.learned_profit_per_ha = latest.mean_profit_per_ha;
        } else {
            self.learned_yield += learning_speed * (latest.mean_yield - self.learned_yield);
            self.learned_profit_per_ha +=
                learning_speed * (latest.mean_profit_per_ha - self.learned_profit_per_ha);
        }
    }

    pub fn learned(&self, metric: SocialMetric) -> f64 {
        match metric {
            SocialMetric::Yield => self.learned_yield,
            SocialMetric::Profit => self.learned_profit_per_ha,
        }
    }
}

/// What the scheduler hands to the store for one farmer at the end of a season.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnowledgeUpdate {
    pub agent: AgentId,
    pub zone: ZoneIndex,
    pub strategy: Strategy,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeStore {
    /// The last season whose outcomes have been committed, 0 before the first.
    season: Season,
    /// Per zone, the aggregate of every crop SHARED farmers have grown there
    zones: Vec<BTreeMap<CropIndex, Aggregate>>,
    /// Per agent, their own outcomes in season order
    memories: Vec<Vec<Outcome>>,
    learning_speed: f64,
}

impl KnowledgeStore {
    pub fn new(n_zones: usize, n_agents: usize, learning_speed: f64) -> KnowledgeStore {
        KnowledgeStore {
            season: 0,
            zones: vec![BTreeMap::new(); n_zones],
            memories: vec![Vec::new(); n_agents],
            learning_speed,
        }
    }

    /// The season the store is current through.
    pub fn version(&self) -> Season {
        self.season
    }

    pub fn zone_aggregate(&self, zone: ZoneIndex, crop: CropIndex) -> Option<&Aggregate> {
        self.zones.get(zone).and_then(|crops| crops.get(&crop))
    }

    pub fn zone_aggregates(&self, zone: ZoneIndex) -> impl Iterator<Item = (CropIndex, &Aggregate)> {
        self.zones[zone].iter().map(|(c, a)| (*c, a))
    }

    pub fn memory(&self, agent: AgentId) -> &[Outcome] {
        &self.memories[agent]
    }

    /// The most recent outcome of `agent` committed strictly before `season`.
    pub fn latest_outcome_before(&self, agent: AgentId, season: Season) -> Option<&Outcome> {
        self.memories[agent].iter().rev().find(|o| o.season < season)
    }

    /**
    Apply all outcomes of one season.

    Every farmer's own memory grows by their outcome. SHARED outcomes are
    folded into their zone's aggregates. Zones are independent, so they are
    folded in parallel; within a zone outcomes are folded in ascending agent
    order, which keeps the floating point result independent of scheduling.
    The learned averages of every crop grown this season then move towards
    the season's batch mean.

    Panics if `season` is not the season right after the current version,
    which would mean the scheduler broke the season barrier.
     */
    pub fn commit(&mut self, season: Season, updates: &[KnowledgeUpdate]) {
        assert_eq!(
            season,
            self.season + 1,
            "knowledge for season {} committed out of order (store at {})",
            season,
            self.season
        );

        let mut batches: Vec<Vec<&Outcome>> = vec![Vec::new(); self.zones.len()];
        let mut ordered: Vec<&KnowledgeUpdate> = updates.iter().collect();
        ordered.sort_by_key(|u| u.agent);
        for update in ordered {
            self.memories[update.agent].push(update.outcome);
            if update.strategy == Strategy::Shared {
                batches[update.zone].push(&update.outcome);
            }
        }

        let learning_speed = self.learning_speed;
        self.zones
            .par_iter_mut()
            .zip(batches.par_iter())
            .for_each(|(crops, batch)| {
                for outcome in batch {
                    crops.entry(outcome.crop).or_default().fold(outcome);
                }
                for aggregate in crops.values_mut() {
                    aggregate.learn(season, learning_speed);
                }
            });

        self.season = season;
    }
}

/**
# Social signal

A SHARED farmer turns what the store shows them into one score per viable crop
on the same [0, 1] scale as personal suitability. `None` marks crops nobody in
view has grown yet.
*/
pub type SocialScores = Vec<Option<f64>>;

/// Raw zone-level observation: the learned average for each viable crop.
pub fn observe_zone(
    store: &KnowledgeStore,
    zone: ZoneIndex,
    viable: &[CropIndex],
    metric: SocialMetric,
) -> Vec<Option<f64>> {
    viable
        .iter()
        .map(|&c| store.zone_aggregate(zone, c).map(|a| a.learned(metric)))
        .collect()
}

/// Raw neighbour observation: for each viable crop, the mean over the latest
/// committed outcomes of the SHARED farmers in `agent`'s circle who grew it.
/// The circle is the agent itself and its neighbours.
pub fn observe_neighbors(
    store: &KnowledgeStore,
    network: &SocialNetwork,
    strategies: &[Strategy],
    agent: AgentId,
    season: Season,
    viable: &[CropIndex],
    metric: SocialMetric,
) -> Vec<Option<f64>> {
    let mut sums = vec![(0.0, 0_u32); viable.len()];
    let circle = std::iter::once(agent).chain(network.neighbors(agent).iter().copied());
    for n in circle {
        if strategies[n] != Strategy::Shared {
            continue;
        }
        if let Some(outcome) = store.latest_outcome_before(n, season) {
            if let Ok(i) = viable.binary_search(&outcome.crop) {
                sums[i].0 += outcome.metric(metric);
                sums[i].1 += 1;
            }
        }
    }
    sums.into_iter()
        .map(|(sum, count)| {
            if count == 0 {
                None
            } else {
                Some(sum / f64::from(count))
            }
        })
        .collect()
}

/**
Map raw observations onto [0, 1].

`reference` holds, per crop, the value the observed quantity would take at
full suitability; only `Relative` uses it.

```rust
use model::knowledge::normalize;
use model::parameters::SocialNormalization;

let raw = vec![Some(2.0), None, Some(4.0), Some(3.0)];
let reference = vec![4.0, 4.0, 8.0, 2.0];
assert_eq!(
    normalize(&raw, &reference, SocialNormalization::Relative),
    vec![Some(0.5), None, Some(0.5), Some(1.0)]
);
assert_eq!(
    normalize(&raw, &reference, SocialNormalization::MinMax),
    vec![Some(0.0), None, Some(1.0), Some(0.5)]
);
assert_eq!(
    normalize(&raw, &reference, SocialNormalization::Rank),
    vec![Some(0.0), None, Some(1.0), Some(0.5)]
);
// A single known crop is the best known one, except on the relative scale.
let single = [None, Some(1.0)];
assert_eq!(normalize(&single, &[2.0, 2.0], SocialNormalization::MinMax), vec![None, Some(1.0)]);
assert_eq!(normalize(&single, &[2.0, 2.0], SocialNormalization::Relative), vec![None, Some(0.5)]);
```
*/
pub fn normalize(
    raw: &[Option<f64>],
    reference: &[f64],
    policy: SocialNormalization,
) -> SocialScores {
    let known: Vec<f64> = raw.iter().filter_map(|x| *x).collect();
    if known.is_empty() {
        return vec![None; raw.len()];
    }
    match policy {
        SocialNormalization::Relative => raw
            .iter()
            .zip(reference.iter())
            .map(|(x, &r)| {
                x.map(|v| {
                    if r > 0.0 {
                        (v / r).max(0.0).min(1.0)
                    } else {
                        0.0
                    }
                })
            })
            .collect(),
        SocialNormalization::MinMax => {
            let min = known.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = known.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let span = max - min;
            raw.iter()
                .map(|x| {
                    x.map(|v| {
                        if span > 0.0 {
                            ((v - min) / span).max(0.0).min(1.0)
                        } else {
                            1.0
                        }
                    })
                })
                .collect()
        }
        SocialNormalization::Rank => {
            if known.len() == 1 {
                return raw.iter().map(|x| x.map(|_| 1.0)).collect();
            }
            let denominator = (known.len() - 1) as f64;
            raw.iter()
                .map(|x| {
                    x.map(|v| {
                        // Ties share the highest of their positions
                        let at_most = known.iter().filter(|&&k| k <= v).count();
                        (at_most - 1) as f64 / denominator
                    })
                })
                .collect()
        }
    }
}

/// Merge the normalised zone and neighbour scores crop by crop.
pub fn combine(zone: &[Option<f64>], neighbor: &[Option<f64>]) -> SocialScores {
    zone.iter()
        .zip(neighbor.iter())
        .map(|(z, n)| match (z, n) {
            (Some(z), Some(n)) => Some(0.5 * (z + n)),
            (Some(z), None) => Some(*z),
            (None, Some(n)) => Some(*n),
            (None, None) => None,
        })
        .collect()
}

/// Everything a SHARED farmer needs to know to compute its social scores.
pub struct SocialContext<'a> {
    pub catalog: &'a Catalog,
    pub store: &'a KnowledgeStore,
    pub network: &'a SocialNetwork,
    pub strategies: &'a [Strategy],
    pub mode: PropagationMode,
    pub metric: SocialMetric,
    pub normalization: SocialNormalization,
}

impl<'a> SocialContext<'a> {
    /// What the social metric of `crop` amounts to at full suitability.
    fn reference(&self, crop: CropIndex) -> f64 {
        let c = self.catalog.crop(crop);
        match self.metric {
            SocialMetric::Yield => c.base_yield,
            SocialMetric::Profit => c.base_yield * c.price,
        }
    }

    /// Social scores for `agent` in `zone` during the decision phase of `season`.
    pub fn social_scores(
        &self,
        agent: AgentId,
        zone: ZoneIndex,
        season: Season,
        viable: &[CropIndex],
    ) -> SocialScores {
        debug_assert!(self.store.version() < season);
        let reference: Vec<f64> = viable.iter().map(|&c| self.reference(c)).collect();
        let zone_scores = || {
            normalize(
                &observe_zone(self.store, zone, viable, self.metric),
                &reference,
                self.normalization,
            )
        };
        let neighbor_scores = || {
            normalize(
                &observe_neighbors(
                    self.store,
                    self.network,
                    self.strategies,
                    agent,
                    season,
                    viable,
                    self.metric,
                ),
                &reference,
                self.normalization,
            )
        };
        match self.mode {
            PropagationMode::Zone => zone_scores(),
            PropagationMode::Neighbor => neighbor_scores(),
            PropagationMode::Both => combine(&zone_scores(), &neighbor_scores()),
        }
    }
}
