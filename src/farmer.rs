/*!
Farmers and their seasonal decision pipeline.

Every season a farmer runs through Observe, Score, Select, Harvest, Settle and
Record, in this order and without branching back. Only Observe and Score depend
on the strategy; they are dispatched through [`KnowledgeUse`]. The rest of the
pipeline is shared verbatim by both strategies.

A farmer's own memory reaches the decision only on the SHARED side: their
latest outcome counts among the neighbour outcomes they observe, and it is
part of their zone's aggregate. INDIVIDUAL farmers decide on personal
suitability alone; their memory only fills in the previous crop of the record.

The pipeline only borrows the knowledge store. Its result is a
[`SeasonResult`], which the scheduler keeps until every farmer of the season is
done and then commits in one go.
*/
use serde_derive::{Deserialize, Serialize};

use crate::catalog::{Catalog, CropIndex, ZoneIndex};
use crate::economics::{self, CostBreakdown, Money};
use crate::error::{ModelError, SamplingError};
use crate::knowledge::{KnowledgeUpdate, Outcome, SocialContext, SocialScores};
use crate::parameters::Parameters;
use crate::stochasticity::{sample_uniform, substream, DrawPurpose};
use crate::suitability;
use crate::{AgentId, Season};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// Decides on personal ecological assessment alone
    Individual,
    /// Also consumes pooled community knowledge
    Shared,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Individual => write!(f, "INDIVIDUAL"),
            Strategy::Shared => write!(f, "SHARED"),
        }
    }
}

/// What a farmer knows at the start of a season.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// The farmer's own most recent outcome, recorded but not scored
    pub previous: Option<Outcome>,
    /// One entry per viable crop of the farmer's zone, `None` for INDIVIDUAL farmers
    pub social: Option<SocialScores>,
    /// The season the knowledge store was current through
    pub knowledge_version: Season,
}

/**
The part of the pipeline in which the two strategies differ: what a farmer
looks at, and how that turns into a decision score.
*/
pub trait KnowledgeUse {
    fn observe(
        &self,
        farmer: &FarmerAgent,
        season: Season,
        viable: &[CropIndex],
        context: &SocialContext,
    ) -> Observation;

    fn blend_score(&self, personal: f64, social: Option<f64>, p: &Parameters) -> f64;
}

impl KnowledgeUse for Strategy {
    fn observe(
        &self,
        farmer: &FarmerAgent,
        season: Season,
        viable: &[CropIndex],
        context: &SocialContext,
    ) -> Observation {
        let previous = context
            .store
            .latest_outcome_before(farmer.id, season)
            .copied();
        let social = match self {
            Strategy::Individual => None,
            Strategy::Shared => {
                Some(context.social_scores(farmer.id, farmer.zone, season, viable))
            }
        };
        Observation {
            previous,
            social,
            knowledge_version: context.store.version(),
        }
    }

    /**
    INDIVIDUAL farmers decide on the personal score. SHARED farmers blend it
    with the social score; a crop nobody in view has grown yet lends its
    personal score to the social side.

    ```rust
    use model::farmer::{KnowledgeUse, Strategy};
    use model::parameters::Parameters;
    let p = Parameters { w_own: 0.5, w_social: 0.5, ..Parameters::default() };
    assert_eq!(Strategy::Individual.blend_score(0.5, Some(1.0), &p), 0.5);
    assert_eq!(Strategy::Shared.blend_score(0.5, Some(1.0), &p), 0.75);
    assert_eq!(Strategy::Shared.blend_score(0.5, None, &p), 0.5);
    ```
    */
    fn blend_score(&self, personal: f64, social: Option<f64>, p: &Parameters) -> f64 {
        match self {
            Strategy::Individual => personal,
            Strategy::Shared => {
                p.w_own * personal + p.w_social * social.unwrap_or(personal)
            }
        }
    }
}

/**
A farm household. Identity, zone, strategy and land size are fixed for the
whole run; only the cumulative profit changes, after each season's barrier.
*/
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FarmerAgent {
    pub id: AgentId,
    /// Index of the matched pair; both twins share zone and land size
    pub pair: usize,
    pub zone: ZoneIndex,
    pub strategy: Strategy,
    /// ha
    pub land_size: f64,
    pub cumulative_profit: Money,
}

/// Immutable snapshot of one farmer's season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonRecord {
    pub season: Season,
    pub agent: AgentId,
    pub pair: usize,
    pub zone: String,
    pub strategy: Strategy,
    pub crop: String,
    pub previous_crop: Option<String>,
    /// Personal suitability of the chosen crop
    pub suitability: f64,
    /// Social score of the chosen crop, if the farmer had one
    pub social_score: Option<f64>,
    /// The score the choice was made on
    pub decision_score: f64,
    pub knowledge_version: Season,
    pub land_size: f64,
    pub yield_multiplier: f64,
    /// t/ha
    pub yield_per_ha: f64,
    pub price_multiplier: f64,
    pub costs: CostBreakdown,
    pub cost: Money,
    pub revenue: Money,
    pub profit: Money,
    pub cumulative_profit: Money,
}

/// The output of one farmer's decision phase, waiting for the barrier.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonResult {
    pub record: SeasonRecord,
    pub update: KnowledgeUpdate,
}

impl FarmerAgent {
    /// Owner of this farmer's random streams; twins share one when
    /// common random numbers are on.
    fn stream_owner(&self, p: &Parameters) -> u64 {
        if p.common_random_numbers {
            self.pair as u64
        } else {
            self.id as u64
        }
    }

    /// Viable crops of the farmer's zone ordered by decreasing personal
    /// score, ties in catalog order.
    pub fn personal_ranking(&self, catalog: &Catalog, p: &Parameters) -> Vec<(CropIndex, f64)> {
        let mut ranking: Vec<(CropIndex, f64)> = catalog
            .viable_crops(self.zone)
            .iter()
            .map(|&c| (c, suitability::score(catalog, self.zone, c, &p.suitability_weights)))
            .collect();
        ranking.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        ranking
    }

    fn sampling_error(
        &self,
        season: Season,
        catalog: &Catalog,
        crop: CropIndex,
        purpose: DrawPurpose,
        source: SamplingError,
    ) -> ModelError {
        ModelError::Sampling {
            agent: self.id,
            season,
            zone: catalog.zone(self.zone).id.clone(),
            crop: catalog.crop(crop).id.clone(),
            purpose,
            source,
        }
    }

    /// Run the whole pipeline for `season` against the committed knowledge.
    pub fn run_season(
        &self,
        season: Season,
        catalog: &Catalog,
        context: &SocialContext,
        p: &Parameters,
    ) -> Result<SeasonResult, ModelError> {
        let viable = catalog.viable_crops(self.zone);

        // Observe
        let observation = self.strategy.observe(self, season, viable, context);

        // Score and Select. Strict comparison keeps the first of equal scores.
        let mut best: Option<(usize, f64, f64)> = None;
        for (i, &crop) in viable.iter().enumerate() {
            let personal = suitability::score(catalog, self.zone, crop, &p.suitability_weights);
            let social = observation.social.as_ref().and_then(|s| s[i]);
            let decision = self.strategy.blend_score(personal, social, p);
            match best {
                Some((_, _, best_score)) if decision <= best_score => {}
                _ => best = Some((i, personal, decision)),
            }
        }
        let (choice, personal, decision_score) = best.ok_or_else(|| ModelError::NoViableCrop {
            agent: self.id,
            season,
            zone: catalog.zone(self.zone).id.clone(),
        })?;
        let crop_index = viable[choice];
        let crop = catalog.crop(crop_index);
        let zone = catalog.zone(self.zone);

        // Harvest
        let owner = self.stream_owner(p);
        let (low, high) = p.yield_variability;
        let yield_multiplier = sample_uniform(
            &mut substream(p.seed, owner, season, DrawPurpose::YieldVariability),
            low,
            high,
        )
        .map_err(|e| {
            self.sampling_error(season, catalog, crop_index, DrawPurpose::YieldVariability, e)
        })?;
        let yield_per_ha = crop.base_yield * personal * yield_multiplier;

        // Settle
        let volatility = crop.price_volatility.unwrap_or(p.price_volatility);
        let price_multiplier = sample_uniform(
            &mut substream(p.seed, owner, season, DrawPurpose::PriceVolatility),
            1. - volatility,
            1. + volatility,
        )
        .map_err(|e| {
            self.sampling_error(season, catalog, crop_index, DrawPurpose::PriceVolatility, e)
        })?;
        let settlement = economics::settle(
            crop,
            zone,
            self.strategy,
            self.land_size,
            yield_per_ha,
            price_multiplier,
            p,
        );

        // Record
        let record = SeasonRecord {
            season,
            agent: self.id,
            pair: self.pair,
            zone: zone.id.clone(),
            strategy: self.strategy,
            crop: crop.id.clone(),
            previous_crop: observation
                .previous
                .map(|o| catalog.crop(o.crop).id.clone()),
            suitability: personal,
            social_score: observation.social.as_ref().and_then(|s| s[choice]),
            decision_score,
            knowledge_version: observation.knowledge_version,
            land_size: self.land_size,
            yield_multiplier,
            yield_per_ha,
            price_multiplier,
            costs: settlement.costs,
            cost: settlement.cost,
            revenue: settlement.revenue,
            profit: settlement.profit,
            cumulative_profit: self.cumulative_profit + settlement.profit,
        };
        let update = KnowledgeUpdate {
            agent: self.id,
            zone: self.zone,
            strategy: self.strategy,
            outcome: Outcome {
                season,
                crop: crop_index,
                yield_per_ha,
                profit_per_ha: (settlement.profit / self.land_size).value(),
            },
        };
        Ok(SeasonResult { record, update })
    }
}
