use std::fmt;
use std::ops::Range;

use cellpop_core::errors::{CellPopError, ErrorInfo};
use indexmap::IndexMap;
use ndarray::{s, ArrayView3, ArrayViewMut3};

use crate::attributes::{AttributeMap, ElementSet};
use crate::state::{Field, StateArrays};
use crate::tensor::{promote, Tensor};

/// All nodes of one type, occupying the contiguous node-axis range
/// `[idx_low, idx_high]` of the population arrays.
///
/// A node set never stores state. [`NodeSet::view`] and friends project the
/// owner's [`StateArrays`] onto this range; writes go straight into the
/// owner's arrays and are visible through every other view of them.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSet {
    idx_low: usize,
    idx_high: usize,
    attributes: AttributeMap,
}

impl NodeSet {
    /// Creates a node set covering `[idx_low, idx_high]` (inclusive).
    ///
    /// Bare 1-D attributes whose length equals the number of nodes receive a
    /// leading batch axis of size one; everything else is stored verbatim.
    pub fn new(
        idx_low: usize,
        idx_high: usize,
        attribute_dict: IndexMap<String, Tensor>,
    ) -> Result<Self, CellPopError> {
        if idx_high < idx_low {
            return Err(CellPopError::Graph(
                ErrorInfo::new("inverted-range", "idx_high must not be below idx_low")
                    .with_context("idx_low", idx_low.to_string())
                    .with_context("idx_high", idx_high.to_string()),
            ));
        }
        let len = idx_high - idx_low + 1;
        let mut attributes = AttributeMap::new();
        for (name, value) in attribute_dict {
            attributes.insert(name, promote(value, len));
        }
        Ok(Self {
            idx_low,
            idx_high,
            attributes,
        })
    }

    /// First global node index of this set.
    pub fn idx_low(&self) -> usize {
        self.idx_low
    }

    /// Last global node index of this set (inclusive).
    pub fn idx_high(&self) -> usize {
        self.idx_high
    }

    /// Half-open node-axis range covered by this set.
    pub fn range(&self) -> Range<usize> {
        self.idx_low..self.idx_high + 1
    }

    /// Read-only view of `field` restricted to this set's nodes.
    ///
    /// # Panics
    ///
    /// Panics if `arrays` has fewer nodes than `idx_high + 1`, i.e. when the
    /// arrays do not belong to the population that built this set.
    pub fn view<'a>(&self, arrays: &'a StateArrays, field: Field) -> ArrayView3<'a, f64> {
        arrays.get(field).slice(s![.., self.range(), ..])
    }

    /// Mutable view of `field` restricted to this set's nodes.
    pub fn view_mut<'a>(
        &self,
        arrays: &'a mut StateArrays,
        field: Field,
    ) -> ArrayViewMut3<'a, f64> {
        arrays.get_mut(field).slice_mut(s![.., self.range(), ..])
    }

    /// Writes `value` through to the owner's `field`; shapes must match exactly.
    pub fn assign(
        &self,
        arrays: &mut StateArrays,
        field: Field,
        value: ArrayView3<'_, f64>,
    ) -> Result<(), CellPopError> {
        let mut view = self.view_mut(arrays, field);
        if view.shape() != value.shape() {
            return Err(
                CellPopError::shape_mismatch(field.as_str(), view.shape(), value.shape())
                    .with_context("idx_low", self.idx_low)
                    .with_context("idx_high", self.idx_high),
            );
        }
        view.assign(&value);
        Ok(())
    }

    /// State of the nodes in this set.
    pub fn state<'a>(&self, arrays: &'a StateArrays) -> ArrayView3<'a, f64> {
        self.view(arrays, Field::State)
    }

    /// Overwrites the state of the nodes in this set.
    pub fn set_state(
        &self,
        arrays: &mut StateArrays,
        value: ArrayView3<'_, f64>,
    ) -> Result<(), CellPopError> {
        self.assign(arrays, Field::State, value)
    }

    /// Production rates of the nodes in this set.
    pub fn production_rate<'a>(&self, arrays: &'a StateArrays) -> ArrayView3<'a, f64> {
        self.view(arrays, Field::ProductionRate)
    }

    /// Overwrites the production rates of the nodes in this set.
    pub fn set_production_rate(
        &self,
        arrays: &mut StateArrays,
        value: ArrayView3<'_, f64>,
    ) -> Result<(), CellPopError> {
        self.assign(arrays, Field::ProductionRate, value)
    }

    /// Decay rates of the nodes in this set.
    pub fn decay_rate<'a>(&self, arrays: &'a StateArrays) -> ArrayView3<'a, f64> {
        self.view(arrays, Field::DecayRate)
    }

    /// Overwrites the decay rates of the nodes in this set.
    pub fn set_decay_rate(
        &self,
        arrays: &mut StateArrays,
        value: ArrayView3<'_, f64>,
    ) -> Result<(), CellPopError> {
        self.assign(arrays, Field::DecayRate, value)
    }
}

impl ElementSet for NodeSet {
    fn len(&self) -> usize {
        self.idx_high - self.idx_low + 1
    }

    fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.attributes
    }
}

impl fmt::Display for NodeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "NodeSet(idx_low={}, idx_high={}, ",
            self.idx_low, self.idx_high
        )?;
        write_attribute_shapes(f, &self.element_level_attributes())?;
        write!(f, ")")
    }
}

pub(crate) fn write_attribute_shapes(
    f: &mut fmt::Formatter<'_>,
    attributes: &IndexMap<String, &Tensor>,
) -> fmt::Result {
    write!(f, "{{")?;
    for (idx, (name, value)) in attributes.iter().enumerate() {
        if idx > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{name}: {:?}", value.shape())?;
    }
    write!(f, "}}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array3};

    fn sample_set() -> NodeSet {
        let mut attrs = IndexMap::new();
        attrs.insert("basal".to_string(), arr1(&[0.1, 0.2, 0.3]).into_dyn());
        NodeSet::new(2, 4, attrs).unwrap()
    }

    #[test]
    fn promotes_node_attributes() {
        let set = sample_set();
        assert_eq!(set.len(), 3);
        assert_eq!(set.attribute("basal").unwrap().shape(), &[1, 3]);
        assert_eq!(set.element_level_attributes().len(), 1);
    }

    #[test]
    fn writes_are_visible_through_owner() {
        let set = sample_set();
        let mut arrays = StateArrays::zeros(2, 6, 1);
        let value = Array3::from_elem((2, 3, 1), 4.5);
        set.set_state(&mut arrays, value.view()).unwrap();
        assert_eq!(arrays.state[[0, 2, 0]], 4.5);
        assert_eq!(arrays.state[[1, 4, 0]], 4.5);
        assert_eq!(arrays.state[[0, 1, 0]], 0.0);
        assert_eq!(arrays.state[[0, 5, 0]], 0.0);
    }

    #[test]
    fn rejects_mismatched_writes() {
        let set = sample_set();
        let mut arrays = StateArrays::zeros(1, 6, 1);
        let value = Array3::zeros((1, 4, 1));
        let err = set
            .set_decay_rate(&mut arrays, value.view())
            .unwrap_err();
        assert_eq!(err.info().code, "shape-mismatch");
    }

    #[test]
    fn rejects_inverted_ranges() {
        let err = NodeSet::new(5, 4, IndexMap::new()).unwrap_err();
        assert_eq!(err.info().code, "inverted-range");
    }

    #[test]
    fn display_lists_element_level_attributes() {
        let rendered = sample_set().to_string();
        assert_eq!(rendered, "NodeSet(idx_low=2, idx_high=4, {basal: [1, 3]})");
    }
}
