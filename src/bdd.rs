//! BDD-backed satisfiability oracle.
//!
//! Presence conditions are small, so a reduced ordered BDD answers every query
//! exactly: a formula is satisfiable iff its diagram is not the `0` terminal.
//!
//! The manager keeps one node table for its whole lifetime, so repeated queries
//! over the same features share structure. Features get 1-based variable
//! indices in the order they are first seen; smaller indices sit closer to the
//! root. The total number of allocated nodes is bounded by
//! [`OracleConfig::node_limit`]; exceeding it is reported as
//! [`SolverError::NodeLimitExceeded`].
//!
//! ```
//! use spl_sim::bdd::BddOracle;
//! use spl_sim::formula::Formula;
//! use spl_sim::sat::SatOracle;
//!
//! let oracle = BddOracle::default();
//! let f = Formula::parse("A && !A").unwrap();
//! assert!(!oracle.is_satisfiable(&f).unwrap());
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};

use log::debug;
use num_bigint::BigUint;

use crate::error::SolverError;
use crate::formula::{Feature, Formula};
use crate::sat::{OracleConfig, SatOracle};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct NodeId(u32);

impl NodeId {
    const ZERO: NodeId = NodeId(0);
    const ONE: NodeId = NodeId(1);

    fn is_terminal(self) -> bool {
        self.0 <= 1
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
struct Node {
    variable: u32,
    low: NodeId,
    high: NodeId,
}

// Terminals carry the largest variable index so they sort below every decision node.
const TERMINAL_VAR: u32 = u32::MAX;

struct Manager {
    nodes: Vec<Node>,
    unique: HashMap<Node, NodeId>,
    ite_cache: HashMap<(NodeId, NodeId, NodeId), NodeId>,
    variables: HashMap<Feature, u32>,
    node_limit: usize,
}

impl Manager {
    fn new(node_limit: usize) -> Self {
        let terminal = Node {
            variable: TERMINAL_VAR,
            low: NodeId::ZERO,
            high: NodeId::ZERO,
        };
        Self {
            nodes: vec![terminal, terminal],
            unique: HashMap::new(),
            ite_cache: HashMap::new(),
            variables: HashMap::new(),
            node_limit,
        }
    }

    fn variable(&self, node: NodeId) -> u32 {
        self.nodes[node.0 as usize].variable
    }

    fn variable_of(&mut self, feature: &Feature) -> u32 {
        let next = self.variables.len() as u32 + 1;
        *self.variables.entry(feature.clone()).or_insert(next)
    }

    fn mk_node(&mut self, variable: u32, low: NodeId, high: NodeId) -> Result<NodeId, SolverError> {
        if low == high {
            return Ok(low);
        }

        let node = Node { variable, low, high };
        if let Some(&id) = self.unique.get(&node) {
            return Ok(id);
        }

        // Two terminals are not counted against the budget.
        if self.nodes.len() - 2 >= self.node_limit {
            return Err(SolverError::NodeLimitExceeded {
                limit: self.node_limit,
            });
        }

        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        self.unique.insert(node, id);
        Ok(id)
    }

    fn mk_var(&mut self, feature: &Feature) -> Result<NodeId, SolverError> {
        let v = self.variable_of(feature);
        self.mk_node(v, NodeId::ZERO, NodeId::ONE)
    }

    fn top_cofactors(&self, node: NodeId, v: u32) -> (NodeId, NodeId) {
        if node.is_terminal() || self.variable(node) != v {
            return (node, node);
        }
        let n = self.nodes[node.0 as usize];
        (n.low, n.high)
    }

    /// `ITE(f, g, h) = (f ∧ g) ∨ (¬f ∧ h)`
    fn apply_ite(&mut self, f: NodeId, g: NodeId, h: NodeId) -> Result<NodeId, SolverError> {
        // Base cases:
        //   ite(1,G,H) => G
        //   ite(0,G,H) => H
        //   ite(F,G,G) => G
        //   ite(F,1,0) => F
        if f == NodeId::ONE {
            return Ok(g);
        }
        if f == NodeId::ZERO {
            return Ok(h);
        }
        if g == h {
            return Ok(g);
        }
        if g == NodeId::ONE && h == NodeId::ZERO {
            return Ok(f);
        }

        let key = (f, g, h);
        if let Some(&res) = self.ite_cache.get(&key) {
            return Ok(res);
        }

        let m = self
            .variable(f)
            .min(self.variable(g))
            .min(self.variable(h));

        let (f0, f1) = self.top_cofactors(f, m);
        let (g0, g1) = self.top_cofactors(g, m);
        let (h0, h1) = self.top_cofactors(h, m);

        let e = self.apply_ite(f0, g0, h0)?;
        let t = self.apply_ite(f1, g1, h1)?;
        let res = self.mk_node(m, e, t)?;

        self.ite_cache.insert(key, res);
        Ok(res)
    }

    fn apply_not(&mut self, f: NodeId) -> Result<NodeId, SolverError> {
        self.apply_ite(f, NodeId::ZERO, NodeId::ONE)
    }

    fn apply_and(&mut self, u: NodeId, v: NodeId) -> Result<NodeId, SolverError> {
        self.apply_ite(u, v, NodeId::ZERO)
    }

    fn apply_or(&mut self, u: NodeId, v: NodeId) -> Result<NodeId, SolverError> {
        self.apply_ite(u, NodeId::ONE, v)
    }

    fn build(&mut self, formula: &Formula) -> Result<NodeId, SolverError> {
        match formula {
            Formula::True => Ok(NodeId::ONE),
            Formula::False => Ok(NodeId::ZERO),
            Formula::Var(feature) => self.mk_var(feature),
            Formula::Not(inner) => {
                let f = self.build(inner)?;
                self.apply_not(f)
            }
            Formula::And(operands) => {
                let mut res = NodeId::ONE;
                for operand in operands {
                    let f = self.build(operand)?;
                    res = self.apply_and(res, f)?;
                    if res == NodeId::ZERO {
                        break;
                    }
                }
                Ok(res)
            }
            Formula::Or(operands) => {
                let mut res = NodeId::ZERO;
                for operand in operands {
                    let f = self.build(operand)?;
                    res = self.apply_or(res, f)?;
                    if res == NodeId::ONE {
                        break;
                    }
                }
                Ok(res)
            }
        }
    }

    /// Number of assignments to the variables ranked in `rank` that satisfy `node`.
    ///
    /// `rank` maps each counted variable to its position in the ordering,
    /// `level` is the rank of the first variable not yet decided on this path.
    fn sat_count(
        &self,
        node: NodeId,
        level: usize,
        rank: &HashMap<u32, usize>,
        cache: &mut HashMap<NodeId, BigUint>,
    ) -> BigUint {
        let total = rank.len();
        if node == NodeId::ZERO {
            return BigUint::ZERO;
        }
        if node == NodeId::ONE {
            return BigUint::from(1u32) << (total - level);
        }

        let r = rank[&self.variable(node)];
        let below = match cache.get(&node) {
            Some(count) => count.clone(),
            None => {
                let n = self.nodes[node.0 as usize];
                let count = self.sat_count(n.low, r + 1, rank, cache)
                    + self.sat_count(n.high, r + 1, rank, cache);
                cache.insert(node, count.clone());
                count
            }
        };
        below << (r - level)
    }
}

pub struct BddOracle {
    manager: RefCell<Manager>,
}

impl BddOracle {
    pub fn new(config: OracleConfig) -> Self {
        Self {
            manager: RefCell::new(Manager::new(config.node_limit)),
        }
    }

    /// Number of decision nodes currently allocated.
    pub fn size(&self) -> usize {
        self.manager.borrow().nodes.len() - 2
    }

    /// Counts the assignments over `over` that satisfy `formula`.
    ///
    /// Every feature of `formula` must be part of `over`.
    pub fn count_models(&self, formula: &Formula, over: &[Feature]) -> Result<BigUint, SolverError> {
        if let Some(stray) = formula.features().into_iter().find(|f| !over.contains(f)) {
            return Err(SolverError::Unsupported(format!(
                "feature `{}` is outside the counting domain",
                stray
            )));
        }

        let mut manager = self.manager.borrow_mut();
        let root = manager.build(formula)?;

        let mut variables: Vec<u32> = over.iter().map(|f| manager.variable_of(f)).collect();
        variables.sort_unstable();
        variables.dedup();
        let rank: HashMap<u32, usize> = variables.iter().enumerate().map(|(i, &v)| (v, i)).collect();

        let count = manager.sat_count(root, 0, &rank, &mut HashMap::new());
        debug!("count_models({}) over {} features = {}", formula, rank.len(), count);
        Ok(count)
    }
}

impl Default for BddOracle {
    fn default() -> Self {
        BddOracle::new(OracleConfig::default())
    }
}

impl Debug for BddOracle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let manager = self.manager.borrow();
        f.debug_struct("BddOracle")
            .field("size", &(manager.nodes.len() - 2))
            .field("variables", &manager.variables.len())
            .field("node_limit", &manager.node_limit)
            .finish()
    }
}

impl SatOracle for BddOracle {
    fn is_satisfiable(&self, formula: &Formula) -> Result<bool, SolverError> {
        let root = self.manager.borrow_mut().build(formula)?;
        debug!("is_satisfiable({}) -> root {}", formula, root);
        Ok(root != NodeId::ZERO)
    }
}
