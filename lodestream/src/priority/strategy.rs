use std::collections::HashMap;

use crate::config::StrategyConfig;
use crate::error::Error;
use crate::priority::Metrics;

/// Scalar metrics the engine evaluates per pending task.
///
/// Solid angle and view alignment are sampled at now and the two predicted
/// horizons of the visibility snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    SolidAngleNow,
    SolidAngleNear,
    SolidAngleFar,
    ViewAlignmentNow,
    ViewAlignmentNear,
    ViewAlignmentFar,
    PerceptualError,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::SolidAngleNow,
        Metric::SolidAngleNear,
        Metric::SolidAngleFar,
        Metric::ViewAlignmentNow,
        Metric::ViewAlignmentNear,
        Metric::ViewAlignmentFar,
        Metric::PerceptualError,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Metric::SolidAngleNow => "solid_angle_now",
            Metric::SolidAngleNear => "solid_angle_near",
            Metric::SolidAngleFar => "solid_angle_far",
            Metric::ViewAlignmentNow => "view_alignment_now",
            Metric::ViewAlignmentNear => "view_alignment_near",
            Metric::ViewAlignmentFar => "view_alignment_far",
            Metric::PerceptualError => "perceptual_error",
        }
    }

    pub fn from_name(name: &str) -> Option<Metric> {
        Metric::ALL.into_iter().find(|m| m.name() == name)
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Weighted-sum coefficients covering every metric exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct Weights([f64; Metric::ALL.len()]);

impl Weights {
    pub fn uniform() -> Self {
        Self([1.0 / Metric::ALL.len() as f64; Metric::ALL.len()])
    }

    pub fn get(&self, metric: Metric) -> f64 {
        self.0[metric.index()]
    }

    /// Build weights from an external name-to-value map. The map must
    /// contain exactly the required metric keys, each finite.
    pub fn from_map(map: &HashMap<String, f64>) -> Result<Self, Error> {
        let mut values = [0.0; Metric::ALL.len()];
        for (name, &value) in map {
            let metric = Metric::from_name(name)
                .ok_or_else(|| Error::ConfigValidation(format!("unknown metric key '{name}'")))?;
            if !value.is_finite() {
                return Err(Error::ConfigValidation(format!(
                    "weight for '{name}' must be finite, got {value}"
                )));
            }
            values[metric.index()] = value;
        }
        for metric in Metric::ALL {
            if !map.contains_key(metric.name()) {
                return Err(Error::ConfigValidation(format!(
                    "missing weight for metric '{}'",
                    metric.name()
                )));
            }
        }
        Ok(Self(values))
    }

    fn from_pairs(pairs: [(Metric, f64); Metric::ALL.len()]) -> Self {
        let mut values = [0.0; Metric::ALL.len()];
        for (metric, value) in pairs {
            values[metric.index()] = value;
        }
        Self(values)
    }
}

/// Hand-tuned default emphasizing what fills the view right now, with some
/// look-ahead and a nudge toward entities with error left to resolve.
fn fixed_weights() -> Weights {
    Weights::from_pairs([
        (Metric::SolidAngleNow, 0.35),
        (Metric::SolidAngleNear, 0.15),
        (Metric::SolidAngleFar, 0.05),
        (Metric::ViewAlignmentNow, 0.20),
        (Metric::ViewAlignmentNear, 0.08),
        (Metric::ViewAlignmentFar, 0.02),
        (Metric::PerceptualError, 0.15),
    ])
}

/// How pending-task metrics collapse into one scalar score.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Score from one metric alone, for controlled experiments.
    Single(Metric),
    /// The hand-tuned weighted sum.
    Fixed,
    /// Weighted sum with externally supplied coefficients.
    Weighted(Weights),
    /// Uniform random choice. The engine skips metric evaluation entirely
    /// under this strategy.
    UniformRandom,
}

impl Strategy {
    /// Resolve a strategy by name from the configuration surface.
    pub fn from_config(config: &StrategyConfig) -> Result<Self, Error> {
        match config.name.as_str() {
            "fixed" => Ok(Strategy::Fixed),
            "random" => Ok(Strategy::UniformRandom),
            "weighted" => {
                let map = config.weights.as_ref().ok_or_else(|| {
                    Error::ConfigValidation(
                        "weighted strategy requires a weights table".to_owned(),
                    )
                })?;
                Ok(Strategy::Weighted(Weights::from_map(map)?))
            }
            name => Metric::from_name(name).map(Strategy::Single).ok_or_else(|| {
                Error::ConfigValidation(format!("unknown strategy '{name}'"))
            }),
        }
    }

    pub(crate) fn combine(&self, metrics: &Metrics) -> f64 {
        match self {
            Strategy::Single(metric) => metrics.get(*metric),
            Strategy::Fixed => fixed_weights().combine(metrics),
            Strategy::Weighted(weights) => weights.combine(metrics),
            Strategy::UniformRandom => 0.0,
        }
    }
}

impl Weights {
    fn combine(&self, metrics: &Metrics) -> f64 {
        Metric::ALL
            .into_iter()
            .map(|metric| self.get(metric) * metrics.get(metric))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_map() -> HashMap<String, f64> {
        Metric::ALL
            .into_iter()
            .map(|m| (m.name().to_owned(), 1.0))
            .collect()
    }

    #[test]
    fn weights_require_exact_key_set() {
        assert!(Weights::from_map(&full_map()).is_ok());

        let mut missing = full_map();
        missing.remove("perceptual_error");
        assert!(matches!(
            Weights::from_map(&missing),
            Err(Error::ConfigValidation(_))
        ));

        let mut extra = full_map();
        extra.insert("glow".to_owned(), 0.5);
        assert!(matches!(
            Weights::from_map(&extra),
            Err(Error::ConfigValidation(_))
        ));

        let mut non_finite = full_map();
        non_finite.insert("solid_angle_now".to_owned(), f64::NAN);
        assert!(matches!(
            Weights::from_map(&non_finite),
            Err(Error::ConfigValidation(_))
        ));
    }

    #[test]
    fn strategy_resolves_by_name() {
        let by_name = |name: &str, weights: Option<HashMap<String, f64>>| {
            Strategy::from_config(&StrategyConfig {
                name: name.to_owned(),
                weights,
            })
        };

        assert_eq!(by_name("fixed", None).unwrap(), Strategy::Fixed);
        assert_eq!(by_name("random", None).unwrap(), Strategy::UniformRandom);
        assert_eq!(
            by_name("solid_angle_now", None).unwrap(),
            Strategy::Single(Metric::SolidAngleNow)
        );
        assert!(by_name("weighted", Some(full_map())).is_ok());
        assert!(matches!(
            by_name("weighted", None),
            Err(Error::ConfigValidation(_))
        ));
        assert!(matches!(
            by_name("psychic", None),
            Err(Error::ConfigValidation(_))
        ));
    }

    #[test]
    fn fixed_weights_cover_every_metric() {
        let weights = fixed_weights();
        let total: f64 = Metric::ALL.into_iter().map(|m| weights.get(m)).sum();
        assert!((total - 1.0).abs() < 1e-9);
        for metric in Metric::ALL {
            assert!(weights.get(metric) > 0.0);
        }
    }
}
