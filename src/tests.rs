use crate::*;

use approx::assert_abs_diff_eq;

use crate::catalog::*;
use crate::economics::settle;
use crate::knowledge::{observe_neighbors, Outcome};
use crate::parameters::{PropagationMode, SocialMetric, SocialNormalization};
use crate::socialnetwork::Topology;
use crate::stochasticity::DrawPurpose;

fn range(absolute_min: f64, optimal_min: f64, optimal_max: f64, absolute_max: f64) -> ToleranceRange {
    ToleranceRange {
        absolute_min,
        optimal_min,
        optimal_max,
        absolute_max,
    }
}

fn crop(id: &str, base_yield: f64, price: f64, ideal_soils: Vec<SoilType>) -> Crop {
    Crop {
        id: id.to_string(),
        category: CropCategory::Cereal,
        temperature: range(2., 12., 22., 32.),
        precipitation: range(150., 300., 700., 1200.),
        soil_moisture: range(0.05, 0.14, 0.28, 0.40),
        ideal_soils,
        base_yield,
        price,
        costs: CropCosts {
            labor_days_per_ha: 18.,
            fertilizer_per_ha: 1800.,
            seed_per_ha: 800.,
            mechanization_per_ha: 1200.,
            water_need_mm: 100.,
        },
        price_volatility: None,
    }
}

fn zone(id: &str, soil: SoilType, temperature: f64, precipitation: f64, viable: &[&str]) -> Zone {
    Zone {
        id: id.to_string(),
        name: String::new(),
        dominant_soil: soil,
        climate: ClimateSummary {
            annual_mean_temperature: temperature,
            annual_precipitation: precipitation,
            monthly_temperature: vec![],
            monthly_precipitation: vec![],
        },
        soil_moisture: 0.2,
        water_tariff: 0.4,
        viable_crops: viable.iter().map(|c| c.to_string()).collect(),
    }
}

fn sample_catalog() -> Catalog {
    let zones: Vec<Zone> =
        serde_json::from_str(include_str!("../data/zones.json")).expect("sample zones parse");
    let crops: Vec<Crop> =
        serde_json::from_str(include_str!("../data/crops.json")).expect("sample crops parse");
    Catalog::new(zones, crops).expect("sample catalogs are consistent")
}

fn quiet() -> observation::Settings {
    observation::Settings { log_every: 0 }
}

#[test]
pub fn test_sample_catalogs_are_valid() {
    let catalog = sample_catalog();
    assert_eq!(catalog.zones.len(), 4);
    for z in 0..catalog.zones.len() {
        let viable = catalog.viable_crops(z);
        assert!(!viable.is_empty());
        assert!(viable.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
pub fn test_catalog_rejects_inconsistent_references() {
    let barley = || crop("barley", 2., 4540., vec![]);

    assert_eq!(
        Catalog::new(
            vec![zone("A", SoilType::Loam, 17., 400., &["barley", "wheat"])],
            vec![barley()]
        )
        .err(),
        Some(ConfigurationError::UnknownCrop {
            zone: "A".into(),
            crop: "wheat".into()
        })
    );
    assert_eq!(
        Catalog::new(vec![zone("A", SoilType::Loam, 17., 400., &[])], vec![barley()]).err(),
        Some(ConfigurationError::EmptyViableCrops { zone: "A".into() })
    );
    assert_eq!(
        Catalog::new(
            vec![zone("A", SoilType::Loam, 17., 400., &["barley"])],
            vec![crop("barley", 2., 0., vec![])]
        )
        .err(),
        Some(ConfigurationError::NonPositivePrice {
            crop: "barley".into(),
            price: 0.
        })
    );
    assert_eq!(
        Catalog::new(
            vec![zone("A", SoilType::Loam, 17., 400., &["barley"])],
            vec![crop("barley", -1., 4540., vec![])]
        )
        .err(),
        Some(ConfigurationError::NonPositiveYield {
            crop: "barley".into(),
            base_yield: -1.
        })
    );
    assert_eq!(
        Catalog::new(
            vec![zone("A", SoilType::Loam, 17., 400., &["barley"])],
            vec![barley(), barley()]
        )
        .err(),
        Some(ConfigurationError::DuplicateCrop("barley".into()))
    );
}

#[test]
pub fn test_parameters_are_validated_before_the_first_season() {
    let catalog = sample_catalog();

    let p = Parameters {
        n_agents: 7,
        ..Parameters::default()
    };
    assert_eq!(
        initialization(p, catalog.clone()).err(),
        Some(ConfigurationError::UnpairedAgents { n_agents: 7 })
    );

    let p = Parameters {
        w_own: 0.6,
        w_social: 0.6,
        ..Parameters::default()
    };
    assert!(matches!(
        initialization(p, catalog.clone()).err(),
        Some(ConfigurationError::WeightsDoNotSumToOne { which: "blend", .. })
    ));

    let mut p = Parameters::default();
    p.suitability_weights.zone = 0.5;
    assert!(matches!(
        initialization(p, catalog.clone()).err(),
        Some(ConfigurationError::WeightsDoNotSumToOne {
            which: "suitability",
            ..
        })
    ));

    let p = Parameters {
        yield_variability: (1.2, 0.8),
        ..Parameters::default()
    };
    assert_eq!(
        initialization(p, catalog.clone()).err(),
        Some(ConfigurationError::InvalidRange {
            name: "yield_variability",
            source: error::SamplingError::InvertedRange { min: 1.2, max: 0.8 }
        })
    );

    for &speed in &[0.0, 1.5] {
        let p = Parameters {
            learning_speed_shared: speed,
            ..Parameters::default()
        };
        assert!(matches!(
            initialization(p, catalog.clone()).err(),
            Some(ConfigurationError::InvalidParameter {
                name: "learning_speed_shared",
                ..
            })
        ));
    }

    let empty = Catalog::new(vec![], vec![]).expect("empty catalogs are consistent");
    assert_eq!(
        initialization(Parameters::default(), empty).err(),
        Some(ConfigurationError::NoZones { n_agents: 100 })
    );
}

#[test]
pub fn test_zero_agents_or_zero_seasons_produce_no_records() {
    let p = Parameters {
        n_agents: 0,
        ..Parameters::default()
    };
    let output = simulate(p, sample_catalog(), &quiet()).expect("no agents is fine");
    assert!(output.records.is_empty());
    assert!(output.summary.strategies.is_empty());
    assert_eq!(output.summary.yield_advantage_shared, None);

    let p = Parameters {
        n_seasons: 0,
        ..Parameters::default()
    };
    let output = simulate(p, sample_catalog(), &quiet()).expect("no seasons is fine");
    assert!(output.records.is_empty());
    assert_eq!(output.agents.len(), 100);
    assert_eq!(output.knowledge.version(), 0);

    let empty = Catalog::new(vec![], vec![]).expect("empty catalogs are consistent");
    let p = Parameters {
        n_agents: 0,
        ..Parameters::default()
    };
    assert!(simulate(p, empty, &quiet())
        .expect("no agents need no zones")
        .records
        .is_empty());
}

#[test]
pub fn test_agents_come_in_matched_pairs() {
    let catalog = sample_catalog();
    let p = Parameters {
        n_agents: 20,
        ..Parameters::default()
    };
    let s = initialization(p.clone(), catalog).expect("valid configuration");
    assert_eq!(s.agents.len(), 20);
    for (pair, twins) in s.agents.chunks(2).enumerate() {
        assert_eq!(twins[0].id, 2 * pair);
        assert_eq!(twins[1].id, 2 * pair + 1);
        assert_eq!(twins[0].strategy, farmer::Strategy::Individual);
        assert_eq!(twins[1].strategy, farmer::Strategy::Shared);
        assert_eq!(twins[0].zone, pair % 4);
        assert_eq!(twins[0].zone, twins[1].zone);
        assert_eq!(twins[0].land_size, twins[1].land_size);
        assert!(twins[0].land_size >= p.land_size.0 && twins[0].land_size <= p.land_size.1);
    }
}

#[test]
pub fn test_suitability_scores_are_bounded() {
    let catalog = sample_catalog();
    let weights = suitability::SuitabilityWeights::default();
    assert!(weights.validate().is_ok());
    for z in 0..catalog.zones.len() {
        for c in 0..catalog.crops.len() {
            let terms = suitability::terms(&catalog, z, c);
            for term in [terms.zone, terms.soil, terms.climate, terms.moisture].iter() {
                assert!((0.0..=1.0).contains(term));
            }
            let score = suitability::score(&catalog, z, c, &weights);
            assert!((0.0..=1.0).contains(&score));
            if !catalog.is_viable(z, c) {
                assert!(score <= 1.0 - weights.zone + 1e-12);
            }
        }
    }
}

#[test]
pub fn test_suitability_terms() {
    let catalog = Catalog::new(
        vec![zone("A", SoilType::SiltLoam, 27., 500., &["barley"])],
        vec![
            crop("barley", 2., 4540., vec![SoilType::Loam]),
            crop("wheat", 2., 4338., vec![]),
        ],
    )
    .expect("valid catalog");
    let terms = suitability::terms(&catalog, 0, 0);
    assert_eq!(terms.zone, 1.0);
    assert_eq!(terms.soil, 0.5);
    // 27°C is half way between the optimal maximum 22 and the absolute maximum 32
    assert_abs_diff_eq!(terms.climate, 0.5, epsilon = 1e-12);
    assert_eq!(terms.moisture, 1.0);
    assert_abs_diff_eq!(
        suitability::score(&catalog, 0, 0, &suitability::SuitabilityWeights::default()),
        0.40 + 0.25 * 0.5 + 0.25 * 0.5 + 0.10,
        epsilon = 1e-12
    );

    let terms = suitability::terms(&catalog, 0, 1);
    assert_eq!(terms.zone, 0.0);
    assert_eq!(terms.soil, 1.0);
}

#[test]
pub fn test_runs_are_reproducible() {
    let p = Parameters {
        n_agents: 40,
        n_seasons: 6,
        seed: 7,
        ..Parameters::default()
    };
    let a = simulate(p.clone(), sample_catalog(), &quiet()).expect("valid configuration");
    let b = simulate(p.clone(), sample_catalog(), &quiet()).expect("valid configuration");
    assert_eq!(a.records.len(), 40 * 6);
    assert_eq!(a.records, b.records);
    assert_eq!(a.knowledge, b.knowledge);

    let single_thread = rayon::ThreadPoolBuilder::new()
        .num_threads(1)
        .build()
        .expect("thread pool");
    let c = single_thread
        .install(|| simulate(p, sample_catalog(), &quiet()))
        .expect("valid configuration");
    assert_eq!(a.records, c.records);
}

#[test]
pub fn test_records_are_ordered_by_season_then_agent() {
    let p = Parameters {
        n_agents: 8,
        n_seasons: 3,
        ..Parameters::default()
    };
    let output = simulate(p, sample_catalog(), &quiet()).expect("valid configuration");
    let keys: Vec<(Season, AgentId)> = output.records.iter().map(|r| (r.season, r.agent)).collect();
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
    assert_eq!(keys.first(), Some(&(1, 0)));
    assert_eq!(keys.last(), Some(&(3, 7)));
}

#[test]
pub fn test_twins_agree_in_the_first_season() {
    let catalog = sample_catalog();
    let p = Parameters {
        n_agents: 16,
        ..Parameters::default()
    };
    let mut s = initialization(p.clone(), catalog).expect("valid configuration");
    for twins in s.agents.chunks(2) {
        assert_eq!(
            twins[0].personal_ranking(&s.catalog, &p),
            twins[1].personal_ranking(&s.catalog, &p)
        );
    }

    let records = step(&mut s, &quiet()).expect("first season");
    for twins in records.chunks(2) {
        assert_eq!(twins[1].social_score, None);
        assert_eq!(twins[0].crop, twins[1].crop);
        assert_eq!(twins[0].decision_score, twins[1].decision_score);
        assert_eq!(twins[0].yield_per_ha, twins[1].yield_per_ha);
        assert_eq!(twins[0].price_multiplier, twins[1].price_multiplier);
    }
}

#[test]
pub fn test_independent_draws_differ_between_twins() {
    let p = Parameters {
        n_agents: 16,
        common_random_numbers: false,
        ..Parameters::default()
    };
    let mut s = initialization(p, sample_catalog()).expect("valid configuration");
    let records = step(&mut s, &quiet()).expect("first season");
    assert!(records
        .chunks(2)
        .any(|twins| twins[0].yield_multiplier != twins[1].yield_multiplier));
}

#[test]
pub fn test_knowledge_is_only_visible_after_the_barrier() {
    let p = Parameters {
        n_agents: 24,
        n_seasons: 5,
        ..Parameters::default()
    };
    let output = simulate(p, sample_catalog(), &quiet()).expect("valid configuration");
    for r in output.records.iter() {
        assert_eq!(r.knowledge_version, r.season - 1);
        if r.season == 1 {
            assert_eq!(r.previous_crop, None);
            assert_eq!(r.social_score, None);
        } else {
            assert!(r.previous_crop.is_some());
        }
        if r.strategy == farmer::Strategy::Individual {
            assert_eq!(r.social_score, None);
        }
    }
    assert!(output
        .records
        .iter()
        .any(|r| r.season > 1 && r.social_score.is_some()));
}

#[test]
pub fn test_zone_aggregates_only_hold_shared_outcomes() {
    let catalog = Catalog::new(
        vec![zone("A", SoilType::Loam, 17., 450., &["barley", "wheat"])],
        vec![
            crop("barley", 4.0, 4540., vec![SoilType::Loam]),
            crop("wheat", 2.0, 4338., vec![SoilType::Loam]),
        ],
    )
    .expect("valid catalog");
    let mut store = knowledge::KnowledgeStore::new(1, 4, 0.6);
    let update = |agent, strategy, crop, yield_per_ha| knowledge::KnowledgeUpdate {
        agent,
        zone: 0,
        strategy,
        outcome: Outcome {
            season: 1,
            crop,
            yield_per_ha,
            profit_per_ha: 1000. * yield_per_ha,
        },
    };
    store.commit(
        1,
        &[
            update(3, farmer::Strategy::Shared, 0, 4.),
            update(0, farmer::Strategy::Individual, 1, 9.),
            update(1, farmer::Strategy::Shared, 0, 2.),
        ],
    );
    assert_eq!(store.version(), 1);
    let aggregate = store.zone_aggregate(0, 0).expect("barley was grown");
    assert_eq!(aggregate.count, 2);
    assert_abs_diff_eq!(aggregate.mean_yield, 3.0);
    assert_abs_diff_eq!(aggregate.mean_profit_per_ha, 3000.0);
    assert_abs_diff_eq!(aggregate.learned_yield, 3.0);
    assert_eq!(store.zone_aggregate(0, 1), None);
    assert_eq!(store.memory(0).len(), 1);
    assert_eq!(store.memory(2).len(), 0);

    let network = socialnetwork::SocialNetwork::build(
        4,
        Topology::SmallWorld,
        2,
        0.0,
        &mut stochasticity::substream(1, u64::MAX, 0, DrawPurpose::Network),
    );
    assert_eq!(network.neighbors(0), &[1, 3]);
    let strategies = [
        farmer::Strategy::Individual,
        farmer::Strategy::Shared,
        farmer::Strategy::Individual,
        farmer::Strategy::Shared,
    ];
    let mut context = knowledge::SocialContext {
        catalog: &catalog,
        store: &store,
        network: &network,
        strategies: &strategies,
        mode: PropagationMode::Zone,
        metric: SocialMetric::Yield,
        normalization: SocialNormalization::MinMax,
    };
    assert_eq!(context.social_scores(1, 0, 2, &[0, 1]), vec![Some(1.0), None]);
    // Barley yields 4 t/ha at full suitability
    context.normalization = SocialNormalization::Relative;
    assert_eq!(context.social_scores(1, 0, 2, &[0, 1]), vec![Some(0.75), None]);

    assert_eq!(
        observe_neighbors(&store, &network, &strategies, 2, 2, &[0, 1], SocialMetric::Yield),
        vec![Some(3.0), None]
    );
    // Agent 1 only has INDIVIDUAL neighbours, so it sees its own outcome alone
    assert_eq!(
        observe_neighbors(&store, &network, &strategies, 1, 2, &[0, 1], SocialMetric::Yield),
        vec![Some(2.0), None]
    );
}

#[test]
#[should_panic]
pub fn test_knowledge_cannot_skip_a_season() {
    let mut store = knowledge::KnowledgeStore::new(1, 1, 0.6);
    store.commit(2, &[]);
}

#[test]
pub fn test_zone_knowledge_never_shrinks() {
    let p = Parameters {
        n_agents: 32,
        ..Parameters::default()
    };
    let mut s = initialization(p, sample_catalog()).expect("valid configuration");
    let counts = |s: &State| -> Vec<Vec<(CropIndex, u64)>> {
        (0..s.catalog.zones.len())
            .map(|z| s.knowledge.zone_aggregates(z).map(|(c, a)| (c, a.count)).collect())
            .collect()
    };
    let mut before = counts(&s);
    for _ in 0..6 {
        step(&mut s, &quiet()).expect("season");
        let after = counts(&s);
        for (b, a) in before.iter().zip(after.iter()) {
            for (crop, count) in b {
                let now = a
                    .iter()
                    .find(|(c, _)| c == crop)
                    .map(|(_, n)| *n)
                    .unwrap_or(0);
                assert!(now >= *count);
            }
        }
        let total: u64 = after.iter().flatten().map(|(_, n)| n).sum();
        assert_eq!(total, 16 * u64::from(s.t));
        before = after;
    }
}

#[test]
pub fn test_cooperation_lowers_costs_and_losses() {
    let p = Parameters::default();
    assert!(p.shared.post_harvest_loss < p.individual.post_harvest_loss);

    let catalog = sample_catalog();
    for z in 0..catalog.zones.len() {
        for &c in catalog.viable_crops(z) {
            let args = (catalog.crop(c), catalog.zone(z), 5.0, 1.3, 1.0);
            let shared = settle(args.0, args.1, farmer::Strategy::Shared, args.2, args.3, args.4, &p);
            let individual =
                settle(args.0, args.1, farmer::Strategy::Individual, args.2, args.3, args.4, &p);
            assert!(shared.cost.value() >= 0. && individual.cost.value() >= 0.);
            assert!(shared.revenue.value() >= 0. && individual.revenue.value() >= 0.);
            assert!(shared.cost <= individual.cost);
            assert_abs_diff_eq!(
                shared.cost.value(),
                0.7 * individual.cost.value(),
                epsilon = 1e-6
            );
            assert_abs_diff_eq!(
                shared.profit.value(),
                shared.revenue.value() - shared.cost.value(),
                epsilon = 1e-9
            );
        }
    }
}

#[test]
pub fn test_land_is_scaled_once() {
    let p = Parameters::default();
    let catalog = sample_catalog();
    let barley = catalog.crop_index("barley").expect("barley is in the sample");
    let (c, z) = (catalog.crop(barley), catalog.zone(0));
    let one = settle(c, z, farmer::Strategy::Individual, 1.0, 2.0, 1.0, &p);
    let four = settle(c, z, farmer::Strategy::Individual, 4.0, 2.0, 1.0, &p);
    assert_abs_diff_eq!(four.cost.value(), 4. * one.cost.value(), epsilon = 1e-6);
    assert_abs_diff_eq!(four.revenue.value(), 4. * one.revenue.value(), epsilon = 1e-6);
    assert_abs_diff_eq!(four.profit.value(), 4. * one.profit.value(), epsilon = 1e-6);
    assert_abs_diff_eq!(one.revenue.value(), 2.0 * 0.85 * 4540., epsilon = 1e-6);
}

/// Two zones, one crop viable in both, one matched pair per zone.
#[test]
pub fn test_cooperation_pays_off_with_a_single_crop() {
    let catalog = Catalog::new(
        vec![
            zone("NORTH", SoilType::Loam, 17., 450., &["barley"]),
            zone("SOUTH", SoilType::Sandy, 21., 180., &["barley"]),
        ],
        vec![crop("barley", 2.0, 4540., vec![SoilType::Loam])],
    )
    .expect("valid catalog");
    let p = Parameters {
        seed: 42,
        n_agents: 4,
        n_seasons: 3,
        ..Parameters::default()
    };
    assert_eq!(p.shared.price_premium, 1.2);
    assert_eq!(p.shared.cost_efficiency, 0.7);

    let output = simulate(p, catalog, &quiet()).expect("valid configuration");
    assert_eq!(output.records.len(), 12);

    for season_records in output.records.chunks(4) {
        for twins in season_records.chunks(2) {
            assert_eq!(twins[0].crop, "barley");
            assert_eq!(twins[0].yield_per_ha, twins[1].yield_per_ha);
            assert!(twins[1].profit > twins[0].profit);
        }
    }
    for twins in output.agents.chunks(2) {
        assert!(twins[1].cumulative_profit >= twins[0].cumulative_profit);
    }
    for z in 0..2 {
        let aggregate = output.knowledge.zone_aggregate(z, 0).expect("barley was grown");
        assert_eq!(aggregate.count, 3);
        assert_eq!(aggregate.seasonal.len(), 3);
    }

    let summary = &output.summary;
    assert_eq!(summary.strategies.len(), 2);
    assert!(summary.profit_advantage_shared.expect("both strategies present").value() > 0.);
    assert_abs_diff_eq!(
        summary.yield_advantage_shared.expect("both strategies present"),
        0.0,
        epsilon = 1e-12
    );
    assert_eq!(summary.zone_seasons.len(), 2 * 3 * 2);
    assert!(summary
        .agents
        .iter()
        .all(|a| a.most_chosen_crop.as_deref() == Some("barley")));
}

/// One zone where barley fits best and wheat nearly as well, eight farmers
/// who all see each other, and a harvest that always comes in at half.
fn disappointing_harvest(mode: PropagationMode) -> (Catalog, Parameters) {
    let catalog = Catalog::new(
        vec![zone("A", SoilType::Loam, 17., 450., &["barley", "wheat"])],
        vec![
            crop("barley", 2.0, 4540., vec![SoilType::Loam]),
            crop("wheat", 2.0, 4338., vec![SoilType::SiltLoam]),
        ],
    )
    .expect("valid catalog");
    let p = Parameters {
        n_agents: 8,
        n_seasons: 3,
        propagation_mode: mode,
        yield_variability: (0.5, 0.5),
        topology: Topology::Random,
        average_degree: 7,
        ..Parameters::default()
    };
    (catalog, p)
}

#[test]
pub fn test_shared_farmers_leave_a_disappointing_crop() {
    for &mode in &[PropagationMode::Zone, PropagationMode::Neighbor, PropagationMode::Both] {
        let (catalog, p) = disappointing_harvest(mode);
        assert_eq!(p.social_normalization, SocialNormalization::Relative);
        let barley = suitability::score(&catalog, 0, 0, &p.suitability_weights);
        let wheat = suitability::score(&catalog, 0, 1, &p.suitability_weights);
        assert_abs_diff_eq!(wheat, 0.875, epsilon = 1e-12);
        assert!(barley > wheat);

        let output = simulate(p, catalog, &quiet()).expect("valid configuration");
        let season = |t: Season| output.records.iter().filter(move |r| r.season == t);

        for r in season(1) {
            assert_eq!(r.crop, "barley");
        }
        // Barley came in at half its potential, which drags its blended
        // score below the untried wheat.
        for r in season(2) {
            match r.strategy {
                farmer::Strategy::Individual => assert_eq!(r.crop, "barley"),
                farmer::Strategy::Shared => {
                    assert_eq!(r.crop, "wheat", "{:?} mode", mode);
                    assert_eq!(r.social_score, None);
                    assert_abs_diff_eq!(r.decision_score, wheat, epsilon = 1e-12);
                }
            }
        }
        for twins in season(2).collect::<Vec<_>>().chunks(2) {
            assert_ne!(twins[0].crop, twins[1].crop);
        }
    }
}

#[test]
pub fn test_twins_agree_without_social_weight() {
    for &mode in &[PropagationMode::Zone, PropagationMode::Neighbor, PropagationMode::Both] {
        let (catalog, p) = disappointing_harvest(mode);
        let p = Parameters {
            w_own: 1.0,
            w_social: 0.0,
            ..p
        };
        let output = simulate(p, catalog, &quiet()).expect("valid configuration");
        for twins in output.records.chunks(2) {
            assert_eq!(twins[0].crop, twins[1].crop);
        }
    }
}

#[test]
pub fn test_isolated_shared_farmers_learn_from_their_own_harvest() {
    let catalog = Catalog::new(
        vec![zone("A", SoilType::Loam, 17., 450., &["barley"])],
        vec![crop("barley", 2.0, 4540., vec![SoilType::Loam])],
    )
    .expect("valid catalog");
    let p = Parameters {
        n_agents: 2,
        n_seasons: 2,
        average_degree: 0,
        propagation_mode: PropagationMode::Neighbor,
        ..Parameters::default()
    };
    let mut s = initialization(p, catalog).expect("valid configuration");
    assert!(s.network.neighbors(1).is_empty());
    let first = step(&mut s, &quiet()).expect("first season");
    let second = step(&mut s, &quiet()).expect("second season");
    assert_eq!(second[0].social_score, None);
    let own = (first[1].yield_per_ha / 2.0).min(1.0);
    assert_abs_diff_eq!(
        second[1].social_score.expect("own harvest is known"),
        own,
        epsilon = 1e-12
    );
}

#[test]
pub fn test_community_averages_follow_the_learning_speed() {
    let harvest = |season, yield_per_ha| knowledge::KnowledgeUpdate {
        agent: 0,
        zone: 0,
        strategy: farmer::Strategy::Shared,
        outcome: Outcome {
            season,
            crop: 0,
            yield_per_ha,
            profit_per_ha: 100. * yield_per_ha,
        },
    };
    let learned = |speed: f64| {
        let mut store = knowledge::KnowledgeStore::new(1, 1, speed);
        for (t, y) in [(1, 2.0), (2, 4.0), (3, 1.0)].iter() {
            store.commit(*t, &[harvest(*t, *y)]);
        }
        store.zone_aggregate(0, 0).expect("grown").clone()
    };

    let slow = learned(0.25);
    // 2, then 2 + (4 - 2) / 4 = 2.5, then 2.5 + (1 - 2.5) / 4
    assert_abs_diff_eq!(slow.learned_yield, 2.125, epsilon = 1e-12);
    assert_abs_diff_eq!(slow.learned_profit_per_ha, 212.5, epsilon = 1e-9);
    assert_abs_diff_eq!(slow.mean_yield, 7.0 / 3.0, epsilon = 1e-12);

    // Full speed forgets everything but the newest season
    let fast = learned(1.0);
    assert_abs_diff_eq!(fast.learned_yield, 1.0, epsilon = 1e-12);
    assert_eq!(fast.count, 3);

    // A season without this crop leaves its averages alone
    let mut store = knowledge::KnowledgeStore::new(1, 1, 0.5);
    store.commit(1, &[harvest(1, 2.0)]);
    store.commit(2, &[]);
    assert_abs_diff_eq!(
        store.zone_aggregate(0, 0).expect("grown").learned_yield,
        2.0,
        epsilon = 1e-12
    );
}

#[test]
pub fn test_sampling_errors_carry_their_context() {
    let p = Parameters {
        n_agents: 4,
        ..Parameters::default()
    };
    let mut s = initialization(p, sample_catalog()).expect("valid configuration");
    s.p.yield_variability = (1.2, 0.8);
    match step(&mut s, &quiet()) {
        Err(ModelError::Sampling {
            agent,
            season,
            zone,
            purpose,
            ..
        }) => {
            assert_eq!(agent, 0);
            assert_eq!(season, 1);
            assert_eq!(zone, "GHARB");
            assert_eq!(purpose, DrawPurpose::YieldVariability);
        }
        other => panic!("expected a sampling error, got {:?}", other.map(|r| r.len())),
    }
    assert_eq!(s.t, 0);
    assert_eq!(s.knowledge.version(), 0);
}

#[test]
pub fn test_networks_are_simple_and_symmetric() {
    for &topology in &[Topology::SmallWorld, Topology::Random, Topology::ScaleFree] {
        let n = 50;
        let network = socialnetwork::SocialNetwork::build(
            n,
            topology,
            4,
            0.3,
            &mut stochasticity::substream(42, u64::MAX, 0, DrawPurpose::Network),
        );
        assert_eq!(network.len(), n);
        let mut degree_sum = 0;
        for a in 0..n {
            for &b in network.neighbors(a) {
                assert_ne!(a, b);
                assert!(network.neighbors(b).contains(&a));
            }
            degree_sum += network.neighbors(a).len();
        }
        assert_eq!(degree_sum, 2 * network.edge_count());
    }

    let complete = socialnetwork::SocialNetwork::build(
        6,
        Topology::Random,
        5,
        0.0,
        &mut stochasticity::substream(42, u64::MAX, 0, DrawPurpose::Network),
    );
    assert_eq!(complete.edge_count(), 15);
    assert_eq!(complete.neighbors(3), &[0, 1, 2, 4, 5]);

    let tiny = socialnetwork::SocialNetwork::build(
        3,
        Topology::SmallWorld,
        10,
        0.0,
        &mut stochasticity::substream(42, u64::MAX, 0, DrawPurpose::Network),
    );
    assert_eq!(tiny.neighbors(0), &[1, 2]);
    assert_eq!(tiny.edge_count(), 3);
}

#[test]
pub fn test_social_signal_normalization() {
    use knowledge::normalize;
    let unit = [1.0; 3];
    assert_eq!(
        normalize(&[Some(5.0), Some(5.0)], &unit, SocialNormalization::MinMax),
        vec![Some(1.0), Some(1.0)]
    );
    assert_eq!(
        normalize(&[Some(1.0), Some(3.0), Some(2.0)], &unit, SocialNormalization::Rank),
        vec![Some(0.0), Some(1.0), Some(0.5)]
    );
    // Crops tied for best all score 1
    assert_eq!(
        normalize(&[Some(5.0), Some(5.0), Some(3.0)], &unit, SocialNormalization::Rank),
        vec![Some(1.0), Some(1.0), Some(0.0)]
    );
    assert_eq!(
        normalize(&[Some(3.0), Some(5.0), Some(3.0)], &unit, SocialNormalization::Rank),
        vec![Some(0.5), Some(1.0), Some(0.5)]
    );
    assert_eq!(
        normalize(&[Some(4.0), Some(4.0), None], &unit, SocialNormalization::Rank),
        vec![Some(1.0), Some(1.0), None]
    );
    assert_eq!(
        normalize(&[None, None], &unit, SocialNormalization::Rank),
        vec![None, None]
    );
    // Losses and bumper harvests are clipped to the unit interval
    assert_eq!(
        normalize(&[Some(-3.0), Some(1.5), Some(6.0)], &[2.0, 2.0, 8.0], SocialNormalization::Relative),
        vec![Some(0.0), Some(0.75), Some(0.75)]
    );
    assert_eq!(
        normalize(&[Some(3.0)], &[2.0], SocialNormalization::Relative),
        vec![Some(1.0)]
    );
    assert_eq!(
        knowledge::combine(&[Some(1.0), None, None], &[Some(0.0), Some(0.5), None]),
        vec![Some(0.5), Some(0.5), None]
    );
}

#[test]
pub fn test_command_line_overrides_parameters() {
    let mut p = Parameters::default();
    let mut o = observation::Settings::default();
    let mut files = crate::argparse::Files::default();
    let args: Vec<String> = [
        "simulation",
        "--agents",
        "10",
        "--seasons",
        "3",
        "--propagation",
        "zone",
        "--social-normalization",
        "min-max",
        "--learning-speed-shared",
        "0.8",
        "--topology",
        "scale-free",
        "--independent-draws",
        "--output",
        "out.json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    assert_eq!(crate::argparse::parameter_file(&args), None);
    assert_eq!(crate::argparse::parse_args(args, &mut p, &mut o, &mut files), Ok(()));
    assert_eq!(p.n_agents, 10);
    assert_eq!(p.n_seasons, 3);
    assert_eq!(p.propagation_mode, PropagationMode::Zone);
    assert_eq!(p.social_normalization, SocialNormalization::MinMax);
    assert_eq!(p.learning_speed_shared, 0.8);
    assert_eq!(p.topology, Topology::ScaleFree);
    assert!(!p.common_random_numbers);
    assert_eq!(files.output.as_deref(), Some("out.json"));
    assert_eq!(files.zones, "data/zones.json");

    let args: Vec<String> = vec!["simulation".into(), "--parameters".into(), "p.json".into()];
    assert_eq!(crate::argparse::parameter_file(&args), Some("p.json".to_string()));
}

#[test]
pub fn test_parameters_round_trip_through_json() {
    let p: Parameters =
        serde_json::from_str(r#"{"n_agents": 6, "propagation_mode": "neighbor", "learning_speed_shared": 0.8}"#).expect("partial parameters");
    assert_eq!(p.n_agents, 6);
    assert_eq!(p.propagation_mode, PropagationMode::Neighbor);
    assert_eq!(p.learning_speed_shared, 0.8);
    assert_eq!(p.social_normalization, SocialNormalization::Relative);
    assert_eq!(p.w_own, Parameters::default().w_own);
}
