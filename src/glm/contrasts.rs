use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::events::{Condition, ConditionSet};

/// Linear weights over the six conditions, in [`Condition::ALL`] order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Contrast {
    pub name: String,
    pub weights: [f64; 6],
}

/// Contrast as written in a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawContrast {
    pub name: String,
    pub weights: Vec<f64>,
}

impl TryFrom<RawContrast> for Contrast {
    type Error = PipelineError;

    fn try_from(raw: RawContrast) -> Result<Self, Self::Error> {
        let name = raw.name.trim().to_string();
        if name.is_empty() {
            return Err(PipelineError::ConfigurationInvalid(
                "contrast with empty name".to_string(),
            ));
        }
        let weights: [f64; 6] = raw.weights.as_slice().try_into().map_err(|_| {
            PipelineError::ConfigurationInvalid(format!(
                "contrast '{}' has {} weights, expected 6",
                name,
                raw.weights.len()
            ))
        })?;
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(PipelineError::ConfigurationInvalid(format!(
                "contrast '{}' has non-finite weights",
                name
            )));
        }
        Ok(Self { name, weights })
    }
}

impl Contrast {
    pub fn new(name: &str, weights: [f64; 6]) -> Self {
        Self {
            name: name.to_string(),
            weights,
        }
    }

    pub fn weight(&self, condition: Condition) -> f64 {
        self.weights[condition.index()]
    }

    /// Conditions the contrast actually depends on.
    pub fn conditions(&self) -> impl Iterator<Item = Condition> + '_ {
        Condition::ALL
            .into_iter()
            .filter(|c| self.weight(*c) != 0.0)
    }

    /// A contrast is estimable when every weighted condition has events.
    pub fn is_estimable(&self, events: &ConditionSet) -> bool {
        self.conditions().all(|c| !events.get(c).is_empty())
    }
}

pub fn default_contrasts() -> Vec<Contrast> {
    vec![
        Contrast::new("anticip-reward-vs-neutral", [1.0, -1.0, 0.0, 0.0, 0.0, 0.0]),
        Contrast::new("anticip-neutral-vs-reward", [-1.0, 1.0, 0.0, 0.0, 0.0, 0.0]),
        Contrast::new("feedback-reward-vs-neutral-correct", [0.0, 0.0, 1.0, 0.0, -1.0, 0.0]),
        Contrast::new("feedback-neutral-correct-vs-reward", [0.0, 0.0, -1.0, 0.0, 1.0, 0.0]),
        Contrast::new("feedback-reward-success-vs-failure", [0.0, 0.0, 1.0, -1.0, 0.0, 0.0]),
        Contrast::new("feedback-reward-failure-vs-success", [0.0, 0.0, -1.0, 1.0, 0.0, 0.0]),
        Contrast::new("feedback-neutral-success-vs-failure", [0.0, 0.0, 0.0, 0.0, 1.0, -1.0]),
        Contrast::new("feedback-neutral-failure-vs-success", [0.0, 0.0, 0.0, 0.0, -1.0, 1.0]),
        Contrast::new("anticip-reward", [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        Contrast::new("anticip-neutral", [0.0, 1.0, 0.0, 0.0, 0.0, 0.0]),
        Contrast::new("feedback-reward-success", [0.0, 0.0, 1.0, 0.0, 0.0, 0.0]),
        Contrast::new("feedback-neutral-success", [0.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
    ]
}
