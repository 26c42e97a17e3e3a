use std::fmt;
use std::ops::{Index, IndexMut};

use cellpop_core::errors::{CellPopError, ErrorInfo};
use cellpop_core::rng::RngHandle;
use cellpop_core::{DynamicalSystem, StateArray};
use cellpop_graph::{
    is_element_level, AttributeMap, EdgeSet, EdgeTable, EdgeType, ElementSet, InteractionSource,
    NodeSet, NodeTable, SetKey, SetRegistry, SetValue, StateArrays, Tensor, ELEMENT_AXIS,
};
use indexmap::IndexMap;
use ndarray::{Array2, ArrayView3, Axis, IxDyn};
use rand::Rng;
use rand_distr::Distribution;
use tracing::debug;

use crate::rate_model::{ConstantPrior, RateModel, StatePrior};

/// Prefix of population-level parameter paths.
const POPULATION_SCOPE: &str = "population";

/// A batch of cells sharing one interaction graph.
///
/// The population exclusively owns the `(n_cells, n_nodes, dim)` state,
/// production-rate and decay-rate arrays. Node sets and edge sets live in a
/// [`SetRegistry`] and only describe index ranges and parameters; the rate
/// model `M` reads and writes the arrays through them.
pub struct CellPopulation<M> {
    sets: SetRegistry,
    arrays: StateArrays,
    parameters: AttributeMap,
    model: M,
    prior: Box<dyn StatePrior>,
    graph_hash: Option<String>,
}

impl<M: RateModel> CellPopulation<M> {
    /// Builds a population of `n_cells` cells over the graph supplied by
    /// `source`, initializes the model parameters from `rng` and samples the
    /// initial state from the default constant prior.
    pub fn new(
        source: &dyn InteractionSource,
        model: M,
        n_cells: usize,
        rng: &mut RngHandle,
    ) -> Result<Self, CellPopError> {
        if n_cells == 0 {
            return Err(CellPopError::Config(ErrorInfo::new(
                "n-cells",
                "a population needs at least one cell",
            )));
        }
        let per_node_state_dim = model.per_node_state_dim();
        if per_node_state_dim == 0 {
            return Err(CellPopError::Strategy(ErrorInfo::new(
                "state-dim",
                "rate model reports a per-node state dimension of zero",
            )));
        }
        let mut sets = Self::initialize_from_interaction_graph(source)?;
        model.initialize_parameters(&mut sets, rng)?;
        let arrays = StateArrays::zeros(n_cells, sets.n_nodes(), per_node_state_dim);
        debug!(
            node_types = sets.node_types().len(),
            edge_types = sets.edge_types().len(),
            n_nodes = sets.n_nodes(),
            n_cells,
            per_node_state_dim,
            "built cell population"
        );
        let mut population = Self {
            sets,
            arrays,
            parameters: AttributeMap::new(),
            model,
            prior: Box::new(ConstantPrior::default()),
            graph_hash: source.graph_hash(),
        };
        population.reset_state()?;
        Ok(population)
    }

    /// Replaces the state prior and resamples the state from it.
    pub fn with_prior(mut self, prior: impl StatePrior + 'static) -> Result<Self, CellPopError> {
        self.prior = Box::new(prior);
        self.reset_state()?;
        Ok(self)
    }

    /// Builds the node and edge sets described by `source`.
    ///
    /// Node types get the `[min, max]` range of their global ids; edge
    /// endpoints are shifted to be local to their source and destination
    /// sets. Fails when node ranges do not tile `[0, n_nodes)` or when an
    /// endpoint lies outside its type's range.
    pub fn initialize_from_interaction_graph(
        source: &dyn InteractionSource,
    ) -> Result<SetRegistry, CellPopError> {
        let mut sets = SetRegistry::new();
        for (node_type, table) in source.node_data() {
            let set =
                node_set_from_table(table).map_err(|err| err.with_context("node_type", &node_type))?;
            sets.insert(node_type, set)?;
        }
        sets.validate_partition()?;

        for (edge_type, table) in source.edge_data() {
            let set = edge_set_from_table(&sets, &edge_type, table)
                .map_err(|err| err.with_context("edge_type", &edge_type))?;
            sets.insert(edge_type, set)?;
        }
        Ok(sets)
    }

    /// Resamples the state from the prior and clears both rate arrays.
    pub fn reset_state(&mut self) -> Result<(), CellPopError> {
        let (n_cells, n_nodes, dim) = self.arrays.dim();
        let state = self.prior.sample((n_cells, n_nodes, dim));
        if state.dim() != (n_cells, n_nodes, dim) {
            return Err(CellPopError::shape_mismatch(
                "prior sample",
                &[n_cells, n_nodes, dim],
                state.shape(),
            ));
        }
        self.arrays = StateArrays::zeros(n_cells, n_nodes, dim);
        self.arrays.state = state;
        Ok(())
    }

    /// Zeroes the production-rate view of every node set.
    pub fn set_production_rates_to_zero(&mut self) {
        self.sets.set_production_rates_to_zero(&mut self.arrays);
    }

    /// Runs the model's production hook against the current state.
    pub fn compute_production_rates(&mut self) -> Result<(), CellPopError> {
        self.model
            .compute_production_rates(&self.sets, &mut self.arrays)
    }

    /// Runs the model's decay hook against the current state.
    pub fn compute_decay_rates(&mut self) -> Result<(), CellPopError> {
        self.model.compute_decay_rates(&self.sets, &mut self.arrays)
    }

    /// Production rates as last computed.
    pub fn production_rates(&self) -> ArrayView3<'_, f64> {
        self.arrays.production_rates.view()
    }

    /// Decay rates as last computed.
    pub fn decay_rates(&self) -> ArrayView3<'_, f64> {
        self.arrays.decay_rates.view()
    }

    /// Backing arrays, for reading node-set views.
    pub fn arrays(&self) -> &StateArrays {
        &self.arrays
    }

    /// Mutable backing arrays, for writing through node-set views.
    ///
    /// The shape of the arrays is fixed; replace the state through
    /// [`DynamicalSystem::set_state`] instead of reassigning fields.
    pub fn arrays_mut(&mut self) -> &mut StateArrays {
        &mut self.arrays
    }

    /// Node and edge sets of this population.
    pub fn sets(&self) -> &SetRegistry {
        &self.sets
    }

    /// The rate model driving this population.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Looks up the node set of `node_type`.
    pub fn node_set(&self, node_type: &str) -> Result<&NodeSet, CellPopError> {
        self.sets.node_set(node_type)
    }

    /// Mutable lookup of the node set of `node_type`.
    pub fn node_set_mut(&mut self, node_type: &str) -> Result<&mut NodeSet, CellPopError> {
        self.sets.node_set_mut(node_type)
    }

    /// Looks up the edge set of `edge_type`.
    pub fn edge_set(&self, edge_type: &EdgeType) -> Result<&EdgeSet, CellPopError> {
        self.sets.edge_set(edge_type)
    }

    /// Mutable lookup of the edge set of `edge_type`.
    pub fn edge_set_mut(&mut self, edge_type: &EdgeType) -> Result<&mut EdgeSet, CellPopError> {
        self.sets.edge_set_mut(edge_type)
    }

    /// Registers an additional set.
    ///
    /// Node types are fixed once the arrays are allocated, so only edge sets
    /// between existing node types can be added; their endpoints must be
    /// local and inside the endpoint sets. Duplicate keys and node/edge
    /// confusion fail like they do on the registry.
    pub fn insert(
        &mut self,
        key: impl Into<SetKey>,
        value: impl Into<SetValue>,
    ) -> Result<(), CellPopError> {
        let key = key.into();
        let value = value.into();
        match (&key, &value) {
            (SetKey::Node(node_type), SetValue::Node(_)) => {
                if self.sets.node_set(node_type).is_err() {
                    return Err(CellPopError::Graph(
                        ErrorInfo::new(
                            "partition-fixed",
                            "node types cannot be added after the arrays are allocated",
                        )
                        .with_context("node_type", node_type.as_str()),
                    ));
                }
            }
            (SetKey::Edge(edge_type), SetValue::Edge(set)) => {
                if self.sets.edge_set(edge_type).is_err() {
                    check_local_endpoints(&self.sets, edge_type, set)?;
                }
            }
            _ => {}
        }
        self.sets.insert(key, value)
    }

    /// Registered node types in registration order.
    pub fn node_types(&self) -> Vec<String> {
        self.sets.node_types()
    }

    /// Registered edge types in registration order.
    pub fn edge_types(&self) -> Vec<EdgeType> {
        self.sets.edge_types()
    }

    /// Number of cells in the batch.
    pub fn n_cells(&self) -> usize {
        self.arrays.dim().0
    }

    /// Total number of nodes over all node types.
    pub fn n_nodes(&self) -> usize {
        self.arrays.dim().1
    }

    /// Number of tracked quantities per node.
    pub fn per_node_state_dim(&self) -> usize {
        self.arrays.dim().2
    }

    /// Canonical hash of the graph the population was built from, if known.
    pub fn graph_hash(&self) -> Option<&str> {
        self.graph_hash.as_deref()
    }

    /// Samples a population-level learnable parameter.
    pub fn init_param<D, R>(&mut self, name: &str, dist: &D, shape: &[usize], rng: &mut R)
    where
        D: Distribution<f64>,
        R: Rng + ?Sized,
    {
        let value = Tensor::from_shape_simple_fn(IxDyn(shape), || dist.sample(rng));
        self.parameters.insert_parameter(name, value);
    }

    /// Population-level attributes and parameters.
    pub fn attributes(&self) -> &AttributeMap {
        &self.parameters
    }

    /// Every learnable tensor: node sets, then edge sets, then the population.
    pub fn parameters(&self) -> Vec<&Tensor> {
        self.named_parameters()
            .into_iter()
            .map(|(_, value)| value)
            .collect()
    }

    /// Every learnable tensor with its dotted path, in [`Self::parameters`] order.
    pub fn named_parameters(&self) -> Vec<(String, &Tensor)> {
        let mut parameters = self.sets.named_parameters();
        for (name, value) in self.parameters.parameters() {
            parameters.push((format!("{POPULATION_SCOPE}.{name}"), value));
        }
        parameters
    }

    /// Mutable access to a learnable tensor by its dotted path.
    pub fn parameter_mut(&mut self, path: &str) -> Option<&mut Tensor> {
        if let Some(name) = path
            .strip_prefix(POPULATION_SCOPE)
            .and_then(|rest| rest.strip_prefix('.'))
        {
            if self.parameters.entry(name)?.learnable {
                return self.parameters.get_mut(name);
            }
            return None;
        }
        self.sets.parameter_mut(path)
    }

    fn check_state_shape(&self, what: &str, state: &ArrayView3<'_, f64>) -> Result<(), CellPopError> {
        let (n_cells, n_nodes, dim) = self.arrays.dim();
        if state.dim() != (n_cells, n_nodes, dim) {
            return Err(CellPopError::shape_mismatch(
                what,
                &[n_cells, n_nodes, dim],
                state.shape(),
            ));
        }
        Ok(())
    }
}

impl<M: RateModel> DynamicalSystem for CellPopulation<M> {
    fn state(&self) -> ArrayView3<'_, f64> {
        self.arrays.state.view()
    }

    fn set_state(&mut self, state: StateArray) -> Result<(), CellPopError> {
        self.check_state_shape("state", &state.view())?;
        self.arrays.state = state;
        Ok(())
    }

    fn get_derivatives(&mut self, state: ArrayView3<'_, f64>) -> Result<StateArray, CellPopError> {
        self.check_state_shape("state", &state)?;
        self.arrays.state.assign(&state);
        let production = self.get_production_rates()?;
        let decay = self.get_decay_rates()?;
        Ok(production - decay)
    }

    fn get_production_rates(&mut self) -> Result<StateArray, CellPopError> {
        self.compute_production_rates()?;
        Ok(self.arrays.production_rates.clone())
    }

    fn get_decay_rates(&mut self) -> Result<StateArray, CellPopError> {
        self.compute_decay_rates()?;
        Ok(self.arrays.decay_rates.clone())
    }
}

/// # Panics
///
/// Panics when `node_type` is not registered; use
/// [`CellPopulation::node_set`] for a fallible lookup.
impl<M> Index<&str> for CellPopulation<M> {
    type Output = NodeSet;

    fn index(&self, node_type: &str) -> &NodeSet {
        &self.sets[node_type]
    }
}

impl<M> IndexMut<&str> for CellPopulation<M> {
    fn index_mut(&mut self, node_type: &str) -> &mut NodeSet {
        &mut self.sets[node_type]
    }
}

/// # Panics
///
/// Panics when `edge_type` is not registered; use
/// [`CellPopulation::edge_set`] for a fallible lookup.
impl<M> Index<&EdgeType> for CellPopulation<M> {
    type Output = EdgeSet;

    fn index(&self, edge_type: &EdgeType) -> &EdgeSet {
        &self.sets[edge_type]
    }
}

impl<M> IndexMut<&EdgeType> for CellPopulation<M> {
    fn index_mut(&mut self, edge_type: &EdgeType) -> &mut EdgeSet {
        &mut self.sets[edge_type]
    }
}

impl<M> fmt::Display for CellPopulation<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (n_cells, n_nodes, _) = self.arrays.dim();
        writeln!(f, "CellPopulation. {n_nodes} nodes and {n_cells} cells.")?;
        writeln!(f, "\tNodeSets:")?;
        for (node_type, set) in self.sets.node_sets() {
            writeln!(f, "\t\t{node_type}: {set}")?;
        }
        write!(f, "\tEdgeSets:")?;
        for (edge_type, set) in self.sets.edge_sets() {
            write!(f, "\n\t\t{edge_type}: {set}")?;
        }
        Ok(())
    }
}

impl<M: fmt::Debug> fmt::Debug for CellPopulation<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellPopulation")
            .field("dim", &self.arrays.dim())
            .field("node_types", &self.sets.node_types())
            .field("edge_types", &self.sets.edge_types())
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// Builds the node set of one type from its table.
///
/// Rows are matched to nodes through `idx` and reordered by ascending id.
/// A bare column enumerates nodes along its first axis; a column that already
/// carries the leading batch axis enumerates them along [`ELEMENT_AXIS`].
/// Columns of any other shape are stored as given.
fn node_set_from_table(table: NodeTable) -> Result<NodeSet, CellPopError> {
    let NodeTable { idx, columns } = table;
    let (Some(&idx_low), Some(&idx_high)) = (idx.iter().min(), idx.iter().max()) else {
        return Err(CellPopError::Graph(ErrorInfo::new(
            "empty-node-type",
            "node type has no nodes",
        )));
    };
    if idx_high - idx_low + 1 != idx.len() {
        return Err(CellPopError::Graph(
            ErrorInfo::new(
                "non-contiguous-ids",
                "global ids of a node type must form one contiguous range",
            )
            .with_context("idx_low", idx_low.to_string())
            .with_context("idx_high", idx_high.to_string())
            .with_context("count", idx.len().to_string()),
        ));
    }

    // Row `i` of every column describes node `idx[i]`; sets are ordered by id.
    let mut order: Vec<usize> = (0..idx.len()).collect();
    order.sort_by_key(|row| idx[*row]);
    let sorted = order.iter().enumerate().all(|(pos, row)| pos == *row);
    if order.windows(2).any(|pair| idx[pair[0]] == idx[pair[1]]) {
        return Err(CellPopError::Graph(ErrorInfo::new(
            "duplicate-node-id",
            "a global id appears twice within one node type",
        )));
    }

    let mut attributes = IndexMap::new();
    for (name, column) in columns {
        let Some(value) = column.as_tensor() else {
            continue;
        };
        let value = if sorted {
            value.clone()
        } else if value.ndim() == 1 && value.len() == idx.len() {
            value.select(Axis(0), &order)
        } else if is_element_level(value, idx.len()) && value.shape()[0] == 1 {
            value.select(ELEMENT_AXIS, &order)
        } else {
            value.clone()
        };
        attributes.insert(name, value);
    }
    NodeSet::new(idx_low, idx_high, attributes)
}

fn edge_set_from_table(
    sets: &SetRegistry,
    edge_type: &EdgeType,
    table: EdgeTable,
) -> Result<EdgeSet, CellPopError> {
    let EdgeTable { idx, columns } = table;
    if idx.ncols() != 2 {
        return Err(CellPopError::Shape(
            ErrorInfo::new("edge-columns", "edge index must have exactly two columns")
                .with_context("columns", idx.ncols().to_string()),
        ));
    }
    let src = sets.node_set(&edge_type.src)?;
    let dst = sets.node_set(&edge_type.dst)?;

    let mut local = Array2::zeros(idx.raw_dim());
    for (row, pair) in idx.rows().into_iter().enumerate() {
        let (tail, head) = (pair[0], pair[1]);
        for (endpoint, set, role) in [(tail, src, "tail"), (head, dst, "head")] {
            if !set.range().contains(&endpoint) {
                return Err(CellPopError::Graph(
                    ErrorInfo::new(
                        "endpoint-out-of-range",
                        "edge endpoint lies outside its node type's global ids",
                    )
                    .with_context("row", row.to_string())
                    .with_context("endpoint", role)
                    .with_context("id", endpoint.to_string())
                    .with_context("idx_low", set.idx_low().to_string())
                    .with_context("idx_high", set.idx_high().to_string()),
                ));
            }
        }
        local[[row, 0]] = tail - src.idx_low();
        local[[row, 1]] = head - dst.idx_low();
    }

    let attributes = columns
        .into_iter()
        .filter_map(|(name, column)| column.as_tensor().cloned().map(|value| (name, value)))
        .collect();
    EdgeSet::new(Some(local), attributes)
}

fn check_local_endpoints(
    sets: &SetRegistry,
    edge_type: &EdgeType,
    set: &EdgeSet,
) -> Result<(), CellPopError> {
    let src = sets.node_set(&edge_type.src)?;
    let dst = sets.node_set(&edge_type.dst)?;
    let tails_ok = set.tails().iter().all(|tail| *tail < src.len());
    let heads_ok = set.heads().iter().all(|head| *head < dst.len());
    if tails_ok && heads_ok {
        return Ok(());
    }
    Err(CellPopError::Graph(
        ErrorInfo::new(
            "endpoint-out-of-range",
            "edge endpoint lies outside its node set",
        )
        .with_context("edge_type", edge_type.to_string()),
    ))
}
