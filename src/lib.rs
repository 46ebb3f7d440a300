/*!
Model Description
=================

This model description follows the ODD (Overview, Design concept, Details)
protocol (Grimm et al., 2006; Grimm et al., 2010). As far as useful in Rust
source code, the model is written as a literate program: the sections below
document the model, and the code right after each section implements it.

# 1. Purpose

The crop choice model compares two ways in which farmers decide what to plant.
INDIVIDUAL farmers rely on their own ecological assessment of the crops that
can grow in their agro-ecological zone. SHARED farmers, organized in a
cooperative, additionally consume the pooled yields (or profits) of other
cooperative members, both from their zone and from their acquaintances in a
social network, and profit from bulk purchasing, better storage and collective
marketing.

After a configured number of seasons, the model produces per-agent and
per-zone time series of the chosen crop, yield, cost, revenue and profit, from
which the two strategies can be compared statistically.

 */

use rayon::prelude::*;
use serde_derive::{Deserialize, Serialize};
use tracing::{debug, info};

pub mod argparse;
pub mod catalog;
pub mod economics;
pub mod error;
pub mod farmer;
pub mod knowledge;
pub mod observation;
pub mod parameters;
pub mod socialnetwork;
pub mod stochasticity;
pub mod suitability;

pub use catalog::Catalog;
pub use error::{ConfigurationError, ModelError};
pub use parameters::Parameters;

use economics::Money;
use farmer::{FarmerAgent, SeasonRecord, SeasonResult, Strategy};
use knowledge::{KnowledgeStore, KnowledgeUpdate, SocialContext};
use socialnetwork::SocialNetwork;
use stochasticity::{sample_uniform, substream, DrawPurpose};

/**

# 2. Entities, state variables, and scales

Time is counted in seasons. Season 0 is the state before the first harvest;
the first simulated season is season 1.

 */
pub type Season = u32;

/// Farmers are identified by their index in the agent list.
pub type AgentId = usize;

/**
## 2.1 Zones and crops

The landscape consists of a handful of agro-ecological zones, each with a
dominant soil, a climate summary, a soil-moisture statistic, a water tariff,
and a list of crops that can be grown there. Zones and crops are reference
data, loaded before the simulation and never changed; see [`catalog`].

## 2.2 Farmers

Farmers ([`farmer::FarmerAgent`]) have a zone, a strategy, and a fixed land
size. They come in matched pairs: every pair consists of one INDIVIDUAL and one
SHARED farmer in the same zone, with the same land size, so that neither zone
nor farm size confounds the comparison of strategies.

## 2.3 Knowledge and social network

What SHARED farmers know about each other lives in the [`knowledge`] store:
per-zone aggregates of the outcomes of cooperative members, and every farmer's
personal memory. Who can see whose outcomes is given by a static, undirected
[`socialnetwork`].

## 2.4 State

 */
#[derive(Debug, Clone)]
pub struct State {
    pub catalog: Catalog,
    /// The farmers, indexed by their id. The set of farmers is fixed.
    pub agents: Vec<FarmerAgent>,
    pub network: SocialNetwork,
    pub knowledge: KnowledgeStore,
    /// The last completed season
    pub t: Season,
    /// The parameters of the model
    pub p: Parameters,
}

/**
# 3. Process overview and scheduling

The model progresses in discrete seasons. Every season consists of two phases
separated by a barrier.

In the decision phase, every farmer runs the pipeline Observe, Score, Select,
Harvest, Settle, Record (see [`farmer`]). Farmers only read the catalogs, the
social network, and the knowledge store as committed at the end of the
previous season, and every random draw comes from a sub-stream keyed on the
season and the drawing farmer or pair (see [`stochasticity`]). The decision
phase therefore runs in parallel, and its results are collected in agent
order.

Once all farmers are done, all outcomes of the season are committed to the
knowledge store at once, and every farmer's cumulative profit is updated.

 */
pub fn step(s: &mut State, o: &observation::Settings) -> Result<Vec<SeasonRecord>, ModelError> {
    let season = s.t + 1;

    let results = decision_phase(s, season)?;

    // Barrier: nothing of this season has been visible until here.
    let updates: Vec<KnowledgeUpdate> = results.iter().map(|r| r.update).collect();
    s.knowledge.commit(season, &updates);
    for (agent, result) in s.agents.iter_mut().zip(results.iter()) {
        agent.cumulative_profit = result.record.cumulative_profit;
    }
    s.t = season;

    let records: Vec<SeasonRecord> = results.into_iter().map(|r| r.record).collect();
    if (o.log_every > 0) && (season % o.log_every == 0) {
        observation::log_season(season, &records);
    }
    Ok(records)
}

fn decision_phase(s: &State, season: Season) -> Result<Vec<SeasonResult>, ModelError> {
    let strategies: Vec<Strategy> = s.agents.iter().map(|a| a.strategy).collect();
    let context = SocialContext {
        catalog: &s.catalog,
        store: &s.knowledge,
        network: &s.network,
        strategies: &strategies,
        mode: s.p.propagation_mode,
        metric: s.p.social_metric,
        normalization: s.p.social_normalization,
    };

    let results: Vec<Result<SeasonResult, ModelError>> = s
        .agents
        .par_iter()
        .map(|agent| {
            let result = agent.run_season(season, &s.catalog, &context, &s.p);
            if let Ok(r) = &result {
                debug!(
                    season,
                    agent = agent.id,
                    strategy = %agent.strategy,
                    crop = %r.record.crop,
                    score = r.record.decision_score,
                    profit = r.record.profit.value(),
                    "Decided"
                );
            }
            result
        })
        .collect();
    // The first failure in agent order, whatever thread hit it first
    results.into_iter().collect()
}

/**
# 4. Design concepts

## 4.1 Basic principles

Farmers choose the crop with the best score among the crops viable in their
zone. The score of INDIVIDUAL farmers is the personal suitability of the crop
(see [`suitability`]), a convex combination of zone compatibility, soil match,
climate fit and soil-moisture fit. SHARED farmers blend it with a social score
derived from what their cooperative has observed so far.

## 4.2 Emergence

Whether, and how fast, cooperative farmers in a zone converge on a crop, and
whether the economic advantage of cooperation dominates the ecological
assessment, emerge from the feedback between choices and the knowledge store.

## 4.3 Adaptation

SHARED farmers adapt their choice to the knowledge store. INDIVIDUAL farmers
do not adapt: their score depends only on their zone.

## 4.4 Objectives

Farmers maximize their decision score. Profit is an outcome, not an objective,
unless the social metric is set to profit.

## 4.5 Learning and 4.6 Prediction

Farmers remember their own outcomes. SHARED farmers predict the outcome of a
crop from a moving average over past seasons, in which the newest season has
weight `learning_speed_shared`, and compare that prediction with what the
crop yields at full suitability.

## 4.7 Sensing

INDIVIDUAL farmers sense their own memory only, and it only tells them what
they grew last. SHARED farmers additionally sense the zone aggregates of their
zone, and the latest outcomes of themselves and their SHARED neighbours in the
social network, depending on the propagation mode.
They never sense outcomes of the current season.

## 4.8 Interaction

Interaction is indirect, through the knowledge store.

## 4.9 Stochasticity

Land sizes, the yield variability multiplier, the price noise and the social
network are random. All of them are drawn from sub-streams of the global seed;
see [`stochasticity`]. With common random numbers, the twins of a pair see the
same yield and price draws, so differences within a pair are entirely due to
the strategy.

## 4.10 Collectives

The cooperative is the set of all SHARED farmers. It is not represented as an
entity of its own; its memory is the zone aggregates of the knowledge store.

## 4.11 Observation

The season records of all farmers are collected, and summarized per strategy,
per agent and per (zone, season, strategy); see [`observation`].

# 5. Initialization

Agents are created pair by pair. Pair `k` lives in zone `k mod n_zones` and
consists of agent `2k` (INDIVIDUAL) and agent `2k+1` (SHARED). The land size
of a pair is drawn uniformly from the configured range. The social network is
built over all agents. The knowledge store starts empty.

All configuration is checked here, before any season is simulated.

 */
pub fn initialization(p: Parameters, catalog: Catalog) -> Result<State, ConfigurationError> {
    p.validate()?;
    let n_zones = catalog.zones.len();
    if p.n_agents > 0 && n_zones == 0 {
        return Err(ConfigurationError::NoZones {
            n_agents: p.n_agents,
        });
    }

    let mut agents: Vec<FarmerAgent> = Vec::with_capacity(p.n_agents);
    for pair in 0..p.n_agents / 2 {
        let land_size = sample_uniform(
            &mut substream(p.seed, pair as u64, 0, DrawPurpose::LandSize),
            p.land_size.0,
            p.land_size.1,
        )
        .map_err(|source| ConfigurationError::InvalidRange {
            name: "land_size",
            source,
        })?;
        for &strategy in &[Strategy::Individual, Strategy::Shared] {
            agents.push(FarmerAgent {
                id: agents.len(),
                pair,
                zone: pair % n_zones,
                strategy,
                land_size,
                cumulative_profit: Money::default(),
            });
        }
    }

    let network = SocialNetwork::build(
        p.n_agents,
        p.topology,
        p.average_degree,
        p.rewiring_probability,
        &mut substream(p.seed, u64::MAX, 0, DrawPurpose::Network),
    );
    let knowledge = KnowledgeStore::new(n_zones, p.n_agents, p.learning_speed_shared);

    info!(
        agents = agents.len(),
        zones = n_zones,
        crops = catalog.crops.len(),
        edges = network.edge_count(),
        mean_degree = network.mean_degree(),
        "Initialized"
    );

    Ok(State {
        catalog,
        agents,
        network,
        knowledge,
        t: 0,
        p,
    })
}

/**
# 6. Input Data

The model uses no input that changes over time. Zone and crop catalogs are
read once, before initialization, by the `simulation` binary.

# 7. Submodels

The submodels live in their own modules: [`suitability`] (7.1),
[`farmer`] (7.2, the decision pipeline), [`economics`] (7.3) and
[`knowledge`] (7.4, knowledge store and propagation).

 */

/// Everything a run hands to the outside world.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationOutput {
    /// One record per agent and season, ordered by season, then agent
    pub records: Vec<SeasonRecord>,
    pub agents: Vec<FarmerAgent>,
    pub knowledge: KnowledgeStore,
    pub summary: observation::Summary,
}

pub fn run(mut s: State, o: &observation::Settings) -> Result<SimulationOutput, ModelError> {
    let mut records = Vec::with_capacity(s.agents.len() * s.p.n_seasons as usize);
    while s.t < s.p.n_seasons {
        records.extend(step(&mut s, o)?);
    }
    let summary = observation::Summary::from_records(&records);
    info!(seasons = s.t, records = records.len(), "Ended");
    Ok(SimulationOutput {
        records,
        agents: s.agents,
        knowledge: s.knowledge,
        summary,
    })
}

/// Initialize and run in one go.
pub fn simulate(
    p: Parameters,
    catalog: Catalog,
    o: &observation::Settings,
) -> Result<SimulationOutput, ModelError> {
    let state = initialization(p, catalog)?;
    run(state, o)
}

#[cfg(test)]
mod tests;
