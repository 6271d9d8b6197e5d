//! Presence conditions: propositional formulas over features.
//!
//! Formulas are immutable values. The smart constructors keep them in a
//! lightly simplified shape:
//!
//! - `True` is the identity of conjunction and `False` absorbs it
//!   (and dually for disjunction);
//! - nested conjunctions are flattened, so no `And` has an `And` child
//!   (and likewise for `Or`);
//! - negating a literal flips its polarity instead of stacking `Not`s.
//!
//! ```
//! use spl_sim::formula::Formula;
//!
//! let f = Formula::var("F");
//! let g = Formula::var("G");
//! let pc = Formula::conjoin(f.clone(), Formula::conjoin(g, Formula::True));
//! assert_eq!(pc.to_string(), "F && G");
//! assert_eq!(Formula::negate(Formula::negate(f.clone())), f);
//! ```

use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::ops::{BitAnd, BitOr, Not};
use std::sync::Arc;

/// Opaque name of a variability point.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Feature(Arc<str>);

impl Feature {
    pub fn new(name: impl AsRef<str>) -> Self {
        Feature(Arc::from(name.as_ref()))
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Display for Feature {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Feature {
    fn from(name: &str) -> Self {
        Feature::new(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Formula {
    True,
    False,
    Var(Feature),
    Not(Box<Formula>),
    And(Vec<Formula>),
    Or(Vec<Formula>),
}

impl Formula {
    pub fn var(name: impl AsRef<str>) -> Self {
        Formula::Var(Feature::new(name))
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Formula::True)
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Formula::False)
    }

    /// A literal is a feature or a negated feature.
    pub fn is_literal(&self) -> bool {
        match self {
            Formula::Var(_) => true,
            Formula::Not(inner) => matches!(**inner, Formula::Var(_)),
            _ => false,
        }
    }

    pub fn conjoin(a: Formula, b: Formula) -> Formula {
        match (a, b) {
            (Formula::True, b) => b,
            (a, Formula::True) => a,
            (Formula::False, _) | (_, Formula::False) => Formula::False,
            (a, b) => {
                let mut operands = Vec::new();
                push_flat(&mut operands, a, Junctor::And);
                push_flat(&mut operands, b, Junctor::And);
                Formula::And(operands)
            }
        }
    }

    pub fn conjoin_all(formulas: impl IntoIterator<Item = Formula>) -> Formula {
        formulas.into_iter().fold(Formula::True, Formula::conjoin)
    }

    pub fn disjoin(a: Formula, b: Formula) -> Formula {
        match (a, b) {
            (Formula::False, b) => b,
            (a, Formula::False) => a,
            (Formula::True, _) | (_, Formula::True) => Formula::True,
            (a, b) => {
                let mut operands = Vec::new();
                push_flat(&mut operands, a, Junctor::Or);
                push_flat(&mut operands, b, Junctor::Or);
                Formula::Or(operands)
            }
        }
    }

    pub fn disjoin_all(formulas: impl IntoIterator<Item = Formula>) -> Formula {
        formulas.into_iter().fold(Formula::False, Formula::disjoin)
    }

    pub fn negate(formula: Formula) -> Formula {
        match formula {
            Formula::True => Formula::False,
            Formula::False => Formula::True,
            Formula::Not(inner) => *inner,
            other => Formula::Not(Box::new(other)),
        }
    }

    /// `a ⇒ b`, encoded as `¬a ∨ b`.
    pub fn implies(a: Formula, b: Formula) -> Formula {
        Formula::disjoin(Formula::negate(a), b)
    }

    /// `a ⇔ b`, encoded as `(a ⇒ b) ∧ (b ⇒ a)`.
    pub fn equivalent(a: Formula, b: Formula) -> Formula {
        Formula::conjoin(
            Formula::implies(a.clone(), b.clone()),
            Formula::implies(b, a),
        )
    }

    /// Features referenced by the formula, in sorted order.
    pub fn features(&self) -> BTreeSet<Feature> {
        let mut out = BTreeSet::new();
        self.collect_features(&mut out);
        out
    }

    fn collect_features(&self, out: &mut BTreeSet<Feature>) {
        match self {
            Formula::True | Formula::False => {}
            Formula::Var(feature) => {
                out.insert(feature.clone());
            }
            Formula::Not(inner) => inner.collect_features(out),
            Formula::And(operands) | Formula::Or(operands) => {
                for operand in operands {
                    operand.collect_features(out);
                }
            }
        }
    }
}

#[derive(Copy, Clone)]
enum Junctor {
    And,
    Or,
}

fn push_flat(operands: &mut Vec<Formula>, formula: Formula, junctor: Junctor) {
    match (formula, junctor) {
        (Formula::And(inner), Junctor::And) | (Formula::Or(inner), Junctor::Or) => {
            operands.extend(inner)
        }
        (formula, _) => operands.push(formula),
    }
}

impl BitAnd for Formula {
    type Output = Formula;

    fn bitand(self, rhs: Self) -> Self::Output {
        Formula::conjoin(self, rhs)
    }
}

impl BitOr for Formula {
    type Output = Formula;

    fn bitor(self, rhs: Self) -> Self::Output {
        Formula::disjoin(self, rhs)
    }
}

impl Not for Formula {
    type Output = Formula;

    fn not(self) -> Self::Output {
        Formula::negate(self)
    }
}

impl From<Feature> for Formula {
    fn from(feature: Feature) -> Self {
        Formula::Var(feature)
    }
}

// Rendered in C preprocessor syntax. `&&` binds tighter than `||`.
impl Display for Formula {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Formula::True => f.write_str("1"),
            Formula::False => f.write_str("0"),
            Formula::Var(feature) => write!(f, "{}", feature),
            Formula::Not(inner) => match **inner {
                Formula::Var(_) | Formula::True | Formula::False => write!(f, "!{}", inner),
                _ => write!(f, "!({})", inner),
            },
            Formula::And(operands) => {
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" && ")?;
                    }
                    if matches!(operand, Formula::Or(_)) {
                        write!(f, "({})", operand)?;
                    } else {
                        write!(f, "{}", operand)?;
                    }
                }
                Ok(())
            }
            Formula::Or(operands) => {
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" || ")?;
                    }
                    write!(f, "{}", operand)?;
                }
                Ok(())
            }
        }
    }
}
