/*!
Reference catalogs: agro-ecological zones and crops.

The catalogs are loaded once (usually from JSON, see `data/`) and never change
during a run. [`Catalog::new`] checks every cross-reference and numeric
invariant up front, so the season loop can index into them freely.
*/
use rustc_hash::FxHashMap;
use serde_derive::{Deserialize, Serialize};

use crate::error::ConfigurationError;

pub type ZoneIndex = usize;
pub type CropIndex = usize;

/**
Soil classes. The texture classes are ordered from coarse to fine, and
neighbouring texture classes are considered half-similar. Calcareous and saline
soils only match themselves.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SoilType {
    Sandy,
    SandyLoam,
    Loam,
    SiltLoam,
    ClayLoam,
    Clay,
    Calcareous,
    Saline,
}

impl SoilType {
    fn texture_rank(self) -> Option<i32> {
        match self {
            SoilType::Sandy => Some(0),
            SoilType::SandyLoam => Some(1),
            SoilType::Loam => Some(2),
            SoilType::SiltLoam => Some(3),
            SoilType::ClayLoam => Some(4),
            SoilType::Clay => Some(5),
            SoilType::Calcareous | SoilType::Saline => None,
        }
    }

    /**
    Graded similarity of two soils.

    ```rust
    use model::catalog::SoilType;
    assert_eq!(SoilType::Loam.similarity(SoilType::Loam), 1.0);
    assert_eq!(SoilType::Loam.similarity(SoilType::SiltLoam), 0.5);
    assert_eq!(SoilType::Sandy.similarity(SoilType::Clay), 0.0);
    assert_eq!(SoilType::Saline.similarity(SoilType::Sandy), 0.0);
    ```
     */
    pub fn similarity(self, other: SoilType) -> f64 {
        if self == other {
            return 1.0;
        }
        match (self.texture_rank(), other.texture_rank()) {
            (Some(a), Some(b)) => f64::max(0.0, 1.0 - 0.5 * f64::from((a - b).abs())),
            _ => 0.0,
        }
    }
}

/**
An EcoCrop-style tolerance range: full suitability inside the optimal band,
falling linearly to zero at the absolute limits.
 */
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceRange {
    pub absolute_min: f64,
    pub optimal_min: f64,
    pub optimal_max: f64,
    pub absolute_max: f64,
}

impl ToleranceRange {
    pub fn is_ordered(&self) -> bool {
        self.absolute_min <= self.optimal_min
            && self.optimal_min <= self.optimal_max
            && self.optimal_max <= self.absolute_max
    }

    /**
    How well `value` fits this range, in [0, 1].

    ```rust
    use model::catalog::ToleranceRange;
    let r = ToleranceRange { absolute_min: 0., optimal_min: 10., optimal_max: 20., absolute_max: 40. };
    assert_eq!(r.fit(15.), 1.0);
    assert_eq!(r.fit(5.), 0.5);
    assert_eq!(r.fit(30.), 0.5);
    assert_eq!(r.fit(-3.), 0.0);
    assert_eq!(r.fit(45.), 0.0);
    ```
     */
    pub fn fit(&self, value: f64) -> f64 {
        let fit = if value < self.optimal_min {
            let margin = self.optimal_min - self.absolute_min;
            if margin > 0.0 {
                1.0 - (self.optimal_min - value) / margin
            } else {
                0.0
            }
        } else if value > self.optimal_max {
            let margin = self.absolute_max - self.optimal_max;
            if margin > 0.0 {
                1.0 - (value - self.optimal_max) / margin
            } else {
                0.0
            }
        } else {
            1.0
        };
        fit.max(0.0).min(1.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClimateSummary {
    /// Annual mean temperature, °C
    pub annual_mean_temperature: f64,
    /// Annual precipitation, mm
    pub annual_precipitation: f64,
    /// Monthly mean temperatures, January first. Informational only.
    #[serde(default)]
    pub monthly_temperature: Vec<f64>,
    /// Monthly precipitation totals, January first. Informational only.
    #[serde(default)]
    pub monthly_precipitation: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub dominant_soil: SoilType,
    pub climate: ClimateSummary,
    /// Mean volumetric soil moisture, m³/m³
    pub soil_moisture: f64,
    /// Irrigation water tariff per m³
    pub water_tariff: f64,
    pub viable_crops: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CropCategory {
    Cereal,
    Legume,
    Vegetable,
    TreeCrop,
    Industrial,
}

/// Itemized production costs, all per hectare and season.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropCosts {
    pub labor_days_per_ha: f64,
    pub fertilizer_per_ha: f64,
    pub seed_per_ha: f64,
    pub mechanization_per_ha: f64,
    /// Irrigation water need, mm over the season (1 mm = 10 m³/ha)
    pub water_need_mm: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Crop {
    pub id: String,
    pub category: CropCategory,
    pub temperature: ToleranceRange,
    pub precipitation: ToleranceRange,
    pub soil_moisture: ToleranceRange,
    #[serde(default)]
    pub ideal_soils: Vec<SoilType>,
    /// t/ha under perfect conditions
    pub base_yield: f64,
    /// Producer price per tonne
    pub price: f64,
    pub costs: CropCosts,
    /// Relative half-width of the multiplicative price noise around 1.
    /// Falls back to the model-wide default when absent.
    #[serde(default)]
    pub price_volatility: Option<f64>,
}

/**
The validated pair of catalogs.

Besides the raw records, this keeps for every zone the catalog indices of its
viable crops in ascending catalog order, which is the order candidates are
scored in and therefore the tie-break order of every argmax in the model.
 */
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub zones: Vec<Zone>,
    pub crops: Vec<Crop>,
    #[serde(skip)]
    viable: Vec<Vec<CropIndex>>,
    #[serde(skip)]
    crop_index: FxHashMap<String, CropIndex>,
}

fn check_finite_non_negative(
    crop: &Crop,
    field: &'static str,
    value: f64,
) -> Result<(), ConfigurationError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidCropAttribute {
            crop: crop.id.clone(),
            field,
            value,
        })
    }
}

fn check_crop(crop: &Crop) -> Result<(), ConfigurationError> {
    if !(crop.price > 0.0) || !crop.price.is_finite() {
        return Err(ConfigurationError::NonPositivePrice {
            crop: crop.id.clone(),
            price: crop.price,
        });
    }
    if !(crop.base_yield > 0.0) || !crop.base_yield.is_finite() {
        return Err(ConfigurationError::NonPositiveYield {
            crop: crop.id.clone(),
            base_yield: crop.base_yield,
        });
    }
    check_finite_non_negative(crop, "labor_days_per_ha", crop.costs.labor_days_per_ha)?;
    check_finite_non_negative(crop, "fertilizer_per_ha", crop.costs.fertilizer_per_ha)?;
    check_finite_non_negative(crop, "seed_per_ha", crop.costs.seed_per_ha)?;
    check_finite_non_negative(crop, "mechanization_per_ha", crop.costs.mechanization_per_ha)?;
    check_finite_non_negative(crop, "water_need_mm", crop.costs.water_need_mm)?;
    if let Some(v) = crop.price_volatility {
        if !(0.0..1.0).contains(&v) {
            return Err(ConfigurationError::InvalidCropAttribute {
                crop: crop.id.clone(),
                field: "price_volatility",
                value: v,
            });
        }
    }
    for (field, range) in [
        ("temperature", &crop.temperature),
        ("precipitation", &crop.precipitation),
        ("soil_moisture", &crop.soil_moisture),
    ] {
        if !range.is_ordered() {
            return Err(ConfigurationError::InvalidCropAttribute {
                crop: crop.id.clone(),
                field,
                value: range.optimal_min,
            });
        }
    }
    Ok(())
}

fn check_zone(zone: &Zone) -> Result<(), ConfigurationError> {
    let invalid = |field: &'static str, value: f64| ConfigurationError::InvalidZoneAttribute {
        zone: zone.id.clone(),
        field,
        value,
    };
    if !zone.water_tariff.is_finite() || zone.water_tariff < 0.0 {
        return Err(invalid("water_tariff", zone.water_tariff));
    }
    if !zone.soil_moisture.is_finite() {
        return Err(invalid("soil_moisture", zone.soil_moisture));
    }
    if !zone.climate.annual_mean_temperature.is_finite() {
        return Err(invalid(
            "annual_mean_temperature",
            zone.climate.annual_mean_temperature,
        ));
    }
    if !zone.climate.annual_precipitation.is_finite() || zone.climate.annual_precipitation < 0.0 {
        return Err(invalid("annual_precipitation", zone.climate.annual_precipitation));
    }
    Ok(())
}

impl Catalog {
    pub fn new(zones: Vec<Zone>, crops: Vec<Crop>) -> Result<Catalog, ConfigurationError> {
        let mut crop_index = FxHashMap::default();
        for (i, crop) in crops.iter().enumerate() {
            check_crop(crop)?;
            if crop_index.insert(crop.id.clone(), i).is_some() {
                return Err(ConfigurationError::DuplicateCrop(crop.id.clone()));
            }
        }

        let mut seen_zones = FxHashMap::default();
        let mut viable = Vec::with_capacity(zones.len());
        for (z, zone) in zones.iter().enumerate() {
            check_zone(zone)?;
            if seen_zones.insert(zone.id.clone(), z).is_some() {
                return Err(ConfigurationError::DuplicateZone(zone.id.clone()));
            }
            if zone.viable_crops.is_empty() {
                return Err(ConfigurationError::EmptyViableCrops {
                    zone: zone.id.clone(),
                });
            }
            let mut indices: Vec<CropIndex> = Vec::with_capacity(zone.viable_crops.len());
            for crop in &zone.viable_crops {
                match crop_index.get(crop) {
                    None => {
                        return Err(ConfigurationError::UnknownCrop {
                            zone: zone.id.clone(),
                            crop: crop.clone(),
                        })
                    }
                    Some(&i) if indices.contains(&i) => {
                        return Err(ConfigurationError::RepeatedViableCrop {
                            zone: zone.id.clone(),
                            crop: crop.clone(),
                        })
                    }
                    Some(&i) => indices.push(i),
                }
            }
            indices.sort_unstable();
            viable.push(indices);
        }

        Ok(Catalog {
            zones,
            crops,
            viable,
            crop_index,
        })
    }

    /// Catalog indices of the crops viable in a zone, in catalog order.
    pub fn viable_crops(&self, zone: ZoneIndex) -> &[CropIndex] {
        &self.viable[zone]
    }

    pub fn is_viable(&self, zone: ZoneIndex, crop: CropIndex) -> bool {
        self.viable[zone].binary_search(&crop).is_ok()
    }

    pub fn crop_index(&self, id: &str) -> Option<CropIndex> {
        self.crop_index.get(id).copied()
    }

    pub fn zone(&self, zone: ZoneIndex) -> &Zone {
        &self.zones[zone]
    }

    pub fn crop(&self, crop: CropIndex) -> &Crop {
        &self.crops[crop]
    }
}
