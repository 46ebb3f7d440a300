/*!
Suitability engine.

A pure, deterministic function from a zone and a candidate crop to a score in
[0, 1]. Four terms, each in [0, 1], are combined with a convex weight vector:

- zone compatibility: whether the crop is in the zone's viable list,
- soil match: best graded similarity between the zone's dominant soil and the
  crop's ideal soils,
- climate fit: the limiting factor of temperature and precipitation fit,
- soil-moisture fit.
*/
use serde_derive::{Deserialize, Serialize};

use crate::catalog::{Catalog, Crop, CropIndex, Zone, ZoneIndex};
use crate::error::ConfigurationError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuitabilityWeights {
    pub zone: f64,
    pub soil: f64,
    pub climate: f64,
    pub moisture: f64,
}

impl Default for SuitabilityWeights {
    fn default() -> Self {
        SuitabilityWeights {
            zone: 0.40,
            soil: 0.25,
            climate: 0.25,
            moisture: 0.10,
        }
    }
}

impl SuitabilityWeights {
    fn as_array(&self) -> [f64; 4] {
        [self.zone, self.soil, self.climate, self.moisture]
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        for value in self.as_array().iter() {
            if !(0.0..=1.0).contains(value) {
                return Err(ConfigurationError::WeightOutOfRange {
                    which: "suitability",
                    value: *value,
                });
            }
        }
        let sum: f64 = self.as_array().iter().sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigurationError::WeightsDoNotSumToOne {
                which: "suitability",
                sum,
            });
        }
        Ok(())
    }
}

/// The four unweighted terms of a suitability score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SuitabilityTerms {
    pub zone: f64,
    pub soil: f64,
    pub climate: f64,
    pub moisture: f64,
}

impl SuitabilityTerms {
    pub fn weighted(&self, w: &SuitabilityWeights) -> f64 {
        let score = w.zone * self.zone
            + w.soil * self.soil
            + w.climate * self.climate
            + w.moisture * self.moisture;
        score.max(0.0).min(1.0)
    }
}

pub fn soil_match(zone: &Zone, crop: &Crop) -> f64 {
    if crop.ideal_soils.is_empty() {
        // No stated preference
        return 1.0;
    }
    crop.ideal_soils
        .iter()
        .map(|s| zone.dominant_soil.similarity(*s))
        .fold(0.0, f64::max)
}

pub fn climate_fit(zone: &Zone, crop: &Crop) -> f64 {
    f64::min(
        crop.temperature.fit(zone.climate.annual_mean_temperature),
        crop.precipitation.fit(zone.climate.annual_precipitation),
    )
}

pub fn moisture_fit(zone: &Zone, crop: &Crop) -> f64 {
    crop.soil_moisture.fit(zone.soil_moisture)
}

pub fn terms(catalog: &Catalog, zone: ZoneIndex, crop: CropIndex) -> SuitabilityTerms {
    let z = catalog.zone(zone);
    let c = catalog.crop(crop);
    SuitabilityTerms {
        zone: if catalog.is_viable(zone, crop) { 1.0 } else { 0.0 },
        soil: soil_match(z, c),
        climate: climate_fit(z, c),
        moisture: moisture_fit(z, c),
    }
}

/// The personal suitability score of `crop` for a farm in `zone`.
pub fn score(
    catalog: &Catalog,
    zone: ZoneIndex,
    crop: CropIndex,
    weights: &SuitabilityWeights,
) -> f64 {
    terms(catalog, zone, crop).weighted(weights)
}
