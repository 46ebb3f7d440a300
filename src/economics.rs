/*!
Economic model: cost, revenue and profit of one harvest.

All amounts are for the whole farm. Per-hectare quantities from the catalog are
scaled by the land size exactly once, in [`settle`]; profit is then the plain
difference of the two already-scaled totals.
*/
use std::ops::{Add, AddAssign, Div, Mul, Sub};

use serde_derive::{Deserialize, Serialize};

use crate::catalog::{Crop, Zone};
use crate::farmer::Strategy;
use crate::parameters::{Parameters, StrategyEconomics};

/// Cubic metres of water per hectare per millimetre of water need.
pub const M3_PER_HA_PER_MM: f64 = 10.;

/**
Money is a number with units (local currency).
*/
#[derive(Default, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    c: f64,
}

impl Money {
    pub fn value(self) -> f64 {
        self.c
    }
}

impl From<f64> for Money {
    fn from(c: f64) -> Self {
        Money { c }
    }
}
impl Mul<f64> for Money {
    type Output = Self;
    fn mul(self, f: f64) -> Self {
        Money { c: self.c * f }
    }
}
impl Div<f64> for Money {
    type Output = Self;
    fn div(self, f: f64) -> Self {
        Money { c: self.c / f }
    }
}
impl Add for Money {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Money {
            c: self.c + other.c,
        }
    }
}
impl Sub for Money {
    type Output = Self;
    fn sub(self, other: Self) -> Self {
        Money {
            c: self.c - other.c,
        }
    }
}
impl AddAssign for Money {
    fn add_assign(&mut self, other: Self) {
        self.c += other.c
    }
}
impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        Money {
            c: iter.map(|o| o.c).sum(),
        }
    }
}
impl std::fmt::Debug for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.c)
    }
}
impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.c)
    }
}

/// The itemized cost of one season on one farm.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub labor: Money,
    pub fertilizer: Money,
    pub seed: Money,
    pub mechanization: Money,
    pub water: Money,
}

impl CostBreakdown {
    pub fn total(&self) -> Money {
        self.labor + self.fertilizer + self.seed + self.mechanization + self.water
    }

    fn scaled(self, f: f64) -> CostBreakdown {
        CostBreakdown {
            labor: self.labor * f,
            fertilizer: self.fertilizer * f,
            seed: self.seed * f,
            mechanization: self.mechanization * f,
            water: self.water * f,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub costs: CostBreakdown,
    pub cost: Money,
    pub revenue: Money,
    pub profit: Money,
}

/**
The per-hectare cost of growing `crop` in `zone`, before any strategy discount.

```rust
# use model::catalog::*;
# use model::economics::per_hectare_costs;
let crop = Crop {
    id: "barley".into(),
    category: CropCategory::Cereal,
    temperature: ToleranceRange { absolute_min: 0., optimal_min: 10., optimal_max: 20., absolute_max: 30. },
    precipitation: ToleranceRange { absolute_min: 200., optimal_min: 300., optimal_max: 600., absolute_max: 900. },
    soil_moisture: ToleranceRange { absolute_min: 0.05, optimal_min: 0.15, optimal_max: 0.3, absolute_max: 0.4 },
    ideal_soils: vec![SoilType::Loam],
    base_yield: 2.0,
    price: 4540.,
    costs: CropCosts { labor_days_per_ha: 18., fertilizer_per_ha: 1800., seed_per_ha: 800.,
                       mechanization_per_ha: 1200., water_need_mm: 350. },
    price_volatility: None,
};
let zone = Zone {
    id: "ARID".into(),
    name: String::new(),
    dominant_soil: SoilType::Sandy,
    climate: ClimateSummary { annual_mean_temperature: 19., annual_precipitation: 200.,
                              monthly_temperature: vec![], monthly_precipitation: vec![] },
    soil_moisture: 0.1,
    water_tariff: 0.4,
    viable_crops: vec!["barley".into()],
};
let c = per_hectare_costs(&crop, &zone, 100.);
assert_eq!(c.labor.value(), 1800.);
assert_eq!(c.water.value(), 1400.);
assert_eq!(c.total().value(), 1800. + 1800. + 800. + 1200. + 1400.);
```
*/
pub fn per_hectare_costs(crop: &Crop, zone: &Zone, daily_wage: f64) -> CostBreakdown {
    CostBreakdown {
        labor: Money::from(crop.costs.labor_days_per_ha * daily_wage),
        fertilizer: Money::from(crop.costs.fertilizer_per_ha),
        seed: Money::from(crop.costs.seed_per_ha),
        mechanization: Money::from(crop.costs.mechanization_per_ha),
        water: Money::from(zone.water_tariff * crop.costs.water_need_mm * M3_PER_HA_PER_MM),
    }
}

/**
Settle a harvest.

`realized_yield` is in t/ha, `price_sample` the multiplicative price noise
already drawn for this agent and season. Costs are itemized per hectare,
discounted by the strategy's cost efficiency, and scaled by the land size.
Revenue is the marketable part of the yield (after post-harvest loss) sold at
the producer price, times the strategy's price premium and the price noise,
also scaled by the land size.
*/
pub fn settle(
    crop: &Crop,
    zone: &Zone,
    strategy: Strategy,
    land_size: f64,
    realized_yield: f64,
    price_sample: f64,
    p: &Parameters,
) -> Settlement {
    let economics: &StrategyEconomics = p.economics(strategy);

    let costs = per_hectare_costs(crop, zone, p.daily_wage).scaled(economics.cost_efficiency * land_size);
    let cost = costs.total();

    let marketable = realized_yield * (1. - economics.post_harvest_loss);
    let unit_price = crop.price * economics.price_premium * price_sample;
    let revenue = Money::from(marketable * unit_price * land_size);

    Settlement {
        costs,
        cost,
        revenue,
        profit: revenue - cost,
    }
}
