use std::collections::BTreeSet;
use std::fmt;

use cellpop_core::errors::{CellPopError, ErrorInfo};
use indexmap::IndexMap;
use ndarray::{concatenate, Array2, ArrayView1, ArrayView2, Axis};

use crate::attributes::{AttributeMap, ElementSet};
use crate::node_set::write_attribute_shapes;
use crate::tensor::{concat_elements, promote, promote_any, select_elements, Tensor};

/// All edges of one `(source type, relation, target type)` triple.
///
/// Row `i` of the edge list is `(tail, head)` where the tail indexes into the
/// source node set and the head into the target node set; both are local to
/// their set, never global node ids. Element-level attributes stay in
/// lockstep with the rows through every mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeSet {
    edges: Array2<usize>,
    attributes: AttributeMap,
}

impl EdgeSet {
    /// Creates an edge set from an `(n_edges, 2)` list of local endpoints.
    ///
    /// `None` creates an empty set. Bare 1-D attributes of length `n_edges`
    /// receive a leading batch axis of size one.
    pub fn new(
        edges: Option<Array2<usize>>,
        attribute_dict: IndexMap<String, Tensor>,
    ) -> Result<Self, CellPopError> {
        let edges = edges.unwrap_or_else(|| Array2::zeros((0, 2)));
        ensure_two_columns(&edges.view())?;
        let len = edges.nrows();
        let mut attributes = AttributeMap::new();
        for (name, value) in attribute_dict {
            attributes.insert(name, promote(value, len));
        }
        Ok(Self { edges, attributes })
    }

    /// Edge list of shape `(n_edges, 2)`.
    pub fn edges(&self) -> ArrayView2<'_, usize> {
        self.edges.view()
    }

    /// Local source index of every edge.
    pub fn tails(&self) -> ArrayView1<'_, usize> {
        self.edges.column(0)
    }

    /// Local target index of every edge.
    pub fn heads(&self) -> ArrayView1<'_, usize> {
        self.edges.column(1)
    }

    /// Appends `edges` and their attribute values after the existing rows.
    ///
    /// The keys of `attribute_dict` must equal the keys of the current
    /// element-level attributes. Nothing is modified when validation fails.
    pub fn add_edges(
        &mut self,
        edges: ArrayView2<'_, usize>,
        attribute_dict: IndexMap<String, Tensor>,
    ) -> Result<(), CellPopError> {
        ensure_two_columns(&edges)?;
        let existing = self.element_level_attributes();
        let expected: BTreeSet<&str> = existing.keys().map(String::as_str).collect();
        let supplied: BTreeSet<&str> = attribute_dict.keys().map(String::as_str).collect();
        if expected != supplied {
            return Err(CellPopError::Key(
                ErrorInfo::new(
                    "attribute-keys",
                    "attribute keys must match the element-level attributes of the edge set",
                )
                .with_context("expected", format!("{expected:?}"))
                .with_context("supplied", format!("{supplied:?}")),
            ));
        }

        let added = edges.nrows();
        let mut updated = Vec::with_capacity(existing.len());
        for (name, current) in &existing {
            let Some(value) = attribute_dict.get(name) else {
                continue;
            };
            let value = promote_any(value.clone());
            if value.ndim() < 2 || value.shape()[1] != added {
                return Err(CellPopError::Shape(
                    ErrorInfo::new("attribute-length", "attribute does not cover the added edges")
                        .with_context("attribute", name.as_str())
                        .with_context("edges", added.to_string())
                        .with_context("shape", format!("{:?}", value.shape())),
                ));
            }
            updated.push((name.clone(), concat_elements(name, current, &value)?));
        }
        let edges = concatenate(Axis(0), &[self.edges.view(), edges.view()]).map_err(|err| {
            CellPopError::Shape(ErrorInfo::new("edge-concat", err.to_string()))
        })?;

        for (name, value) in updated {
            self.attributes.replace_value(&name, value);
        }
        self.edges = edges;
        Ok(())
    }

    /// Removes every edge flagged in `mask`, preserving the order of the rest.
    pub fn remove_edges(&mut self, mask: &[bool]) -> Result<(), CellPopError> {
        self.ensure_mask(mask)?;
        let kept: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter(|(_, removed)| !**removed)
            .map(|(idx, _)| idx)
            .collect();
        let updated: Vec<(String, Tensor)> = self
            .element_level_attributes()
            .into_iter()
            .map(|(name, value)| (name, select_elements(value, &kept)))
            .collect();
        for (name, value) in updated {
            self.attributes.replace_value(&name, value);
        }
        self.edges = self.edges.select(Axis(0), &kept);
        Ok(())
    }

    /// Returns the edges flagged in `mask` together with a copy of their
    /// element-level attributes. The set itself is left untouched.
    pub fn get_edges(
        &self,
        mask: &[bool],
    ) -> Result<(Array2<usize>, IndexMap<String, Tensor>), CellPopError> {
        self.ensure_mask(mask)?;
        let selected: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter(|(_, chosen)| **chosen)
            .map(|(idx, _)| idx)
            .collect();
        let attributes = self
            .element_level_attributes()
            .into_iter()
            .map(|(name, value)| (name, select_elements(value, &selected)))
            .collect();
        Ok((self.edges.select(Axis(0), &selected), attributes))
    }

    /// Mask of the edges leaving the source node `node_idx`.
    pub fn out_edges(&self, node_idx: usize) -> Vec<bool> {
        self.tails().iter().map(|&tail| tail == node_idx).collect()
    }

    /// Mask of the edges entering the target node `node_idx`.
    pub fn in_edges(&self, node_idx: usize) -> Vec<bool> {
        self.heads().iter().map(|&head| head == node_idx).collect()
    }

    fn ensure_mask(&self, mask: &[bool]) -> Result<(), CellPopError> {
        if mask.len() != self.len() {
            return Err(CellPopError::Shape(
                ErrorInfo::new("mask-length", "edge mask must have one entry per edge")
                    .with_context("edges", self.len().to_string())
                    .with_context("mask", mask.len().to_string()),
            ));
        }
        Ok(())
    }
}

impl ElementSet for EdgeSet {
    fn len(&self) -> usize {
        self.edges.nrows()
    }

    fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }

    fn attributes_mut(&mut self) -> &mut AttributeMap {
        &mut self.attributes
    }
}

impl fmt::Display for EdgeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EdgeSet({} edges, ", self.len())?;
        write_attribute_shapes(f, &self.element_level_attributes())?;
        write!(f, ")")
    }
}

fn ensure_two_columns(edges: &ArrayView2<'_, usize>) -> Result<(), CellPopError> {
    if edges.ncols() != 2 {
        return Err(CellPopError::Shape(
            ErrorInfo::new("edge-columns", "edge lists must have exactly two columns")
                .with_context("columns", edges.ncols().to_string()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    fn sample_set() -> EdgeSet {
        let mut attrs = IndexMap::new();
        attrs.insert("sign".to_string(), arr1(&[1.0, -1.0, 1.0]).into_dyn());
        EdgeSet::new(Some(arr2(&[[0, 1], [1, 2], [0, 2]])), attrs).unwrap()
    }

    #[test]
    fn empty_by_default() {
        let set = EdgeSet::new(None, IndexMap::new()).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.edges().dim(), (0, 2));
    }

    #[test]
    fn rejects_wrong_column_count() {
        let err = EdgeSet::new(Some(Array2::zeros((2, 3))), IndexMap::new()).unwrap_err();
        assert_eq!(err.info().code, "edge-columns");
    }

    #[test]
    fn adjacency_masks() {
        let set = sample_set();
        assert_eq!(set.out_edges(0), vec![true, false, true]);
        assert_eq!(set.in_edges(2), vec![false, true, true]);
        assert_eq!(set.tails().to_vec(), vec![0, 1, 0]);
        assert_eq!(set.heads().to_vec(), vec![1, 2, 2]);
    }

    #[test]
    fn remove_keeps_attributes_in_lockstep() {
        let mut set = sample_set();
        set.remove_edges(&[false, true, false]).unwrap();
        assert_eq!(set.edges(), arr2(&[[0, 1], [0, 2]]));
        let sign = set.attribute("sign").unwrap();
        assert_eq!(sign.iter().copied().collect::<Vec<_>>(), vec![1.0, 1.0]);
    }

    #[test]
    fn add_requires_matching_keys() {
        let mut set = sample_set();
        let err = set
            .add_edges(arr2(&[[1, 0]]).view(), IndexMap::new())
            .unwrap_err();
        assert_eq!(err.info().code, "attribute-keys");
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn add_appends_rows_and_values() {
        let mut set = sample_set();
        let mut attrs = IndexMap::new();
        attrs.insert("sign".to_string(), arr1(&[-1.0]).into_dyn());
        set.add_edges(arr2(&[[2, 0]]).view(), attrs).unwrap();
        assert_eq!(set.len(), 4);
        assert_eq!(set.edges().row(3).to_vec(), vec![2, 0]);
        let sign = set.attribute("sign").unwrap();
        assert_eq!(sign.shape(), &[1, 4]);
        assert_eq!(
            sign.iter().copied().collect::<Vec<_>>(),
            vec![1.0, -1.0, 1.0, -1.0]
        );
    }

    #[test]
    fn get_edges_does_not_mutate() {
        let set = sample_set();
        let (edges, attrs) = set.get_edges(&[true, false, true]).unwrap();
        assert_eq!(edges, arr2(&[[0, 1], [0, 2]]));
        assert_eq!(attrs["sign"].shape(), &[1, 2]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn mask_length_is_checked() {
        let mut set = sample_set();
        let err = set.remove_edges(&[true]).unwrap_err();
        assert_eq!(err.info().code, "mask-length");
    }
}
