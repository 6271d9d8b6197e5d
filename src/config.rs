//! Configurations, variants and feature models.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use num_bigint::BigUint;

use crate::bdd::BddOracle;
use crate::error::{Error, Result};
use crate::formula::{Feature, Formula};
use crate::sat::SatOracle;

/// Total assignment of features to truth values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    values: BTreeMap<Feature, bool>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, feature: impl Into<Feature>, value: bool) -> Self {
        self.set(feature, value);
        self
    }

    pub fn set(&mut self, feature: impl Into<Feature>, value: bool) {
        self.values.insert(feature.into(), value);
    }

    pub fn get(&self, feature: &Feature) -> Option<bool> {
        self.values.get(feature).copied()
    }

    pub fn features(&self) -> impl Iterator<Item = &Feature> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Evaluates `formula` under this configuration.
    ///
    /// Every referenced feature must be assigned, even those a short-circuit
    /// evaluation would never look at.
    pub fn satisfies(&self, formula: &Formula) -> Result<bool> {
        match formula {
            Formula::True => Ok(true),
            Formula::False => Ok(false),
            Formula::Var(feature) => self
                .get(feature)
                .ok_or_else(|| Error::UnassignedFeature(feature.clone())),
            Formula::Not(inner) => Ok(!self.satisfies(inner)?),
            Formula::And(operands) => operands
                .iter()
                .try_fold(true, |acc, op| Ok(self.satisfies(op)? & acc)),
            Formula::Or(operands) => operands
                .iter()
                .try_fold(false, |acc, op| Ok(self.satisfies(op)? | acc)),
        }
    }

    /// The configuration as a conjunction of literals.
    pub fn to_formula(&self) -> Formula {
        Formula::conjoin_all(self.values.iter().map(|(feature, &value)| {
            let var = Formula::Var(feature.clone());
            if value {
                var
            } else {
                Formula::negate(var)
            }
        }))
    }
}

impl<F: Into<Feature>> FromIterator<(F, bool)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (F, bool)>>(iter: I) -> Self {
        let mut config = Configuration::new();
        for (feature, value) in iter {
            config.set(feature, value);
        }
        config
    }
}

/// Parses comma-separated `FEATURE=VALUE` pairs, e.g. `"A=true,B=0"`.
impl FromStr for Configuration {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut config = Configuration::new();
        for pair in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let fail = |message: &str| Error::Parse {
                input: pair.to_string(),
                message: message.to_string(),
            };
            let (name, value) = pair.split_once('=').ok_or_else(|| fail("expected FEATURE=VALUE"))?;
            let value = match value.trim() {
                "1" | "true" => true,
                "0" | "false" => false,
                _ => return Err(fail("value must be one of true, false, 1, 0")),
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(fail("empty feature name"));
            }
            config.set(name, value);
        }
        Ok(config)
    }
}

impl Display for Configuration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, (feature, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}={}", feature, value)?;
        }
        Ok(())
    }
}

/// One fully resolved configuration, named after its output target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub name: String,
    pub configuration: Configuration,
}

impl Variant {
    pub fn new(name: impl Into<String>, configuration: Configuration) -> Self {
        Self {
            name: name.into(),
            configuration,
        }
    }
}

/// A feature model as handed over by an external loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureModel {
    pub features: BTreeSet<Feature>,
    pub constraint: Formula,
}

impl FeatureModel {
    pub fn new(features: impl IntoIterator<Item = Feature>, constraint: Formula) -> Self {
        let mut features: BTreeSet<Feature> = features.into_iter().collect();
        features.extend(constraint.features());
        Self {
            features,
            constraint,
        }
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn is_valid(&self, configuration: &Configuration) -> Result<bool> {
        configuration.satisfies(&self.constraint)
    }

    /// Whether at least one configuration satisfies the model.
    pub fn is_consistent(&self, oracle: &impl SatOracle) -> Result<bool> {
        Ok(oracle.is_satisfiable(&self.constraint)?)
    }

    pub fn count_configurations(&self, oracle: &BddOracle) -> Result<BigUint> {
        let over: Vec<Feature> = self.features.iter().cloned().collect();
        Ok(oracle.count_models(&self.constraint, &over)?)
    }
}
