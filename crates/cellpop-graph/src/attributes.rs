use cellpop_core::errors::{CellPopError, ErrorInfo};
use indexmap::IndexMap;
use ndarray::IxDyn;
use rand::Rng;
use rand_distr::Distribution;

use crate::tensor::{is_element_level, Tensor};

/// Named tensor stored on a set, optionally marked as a learnable parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Stored tensor value.
    pub value: Tensor,
    /// Whether the tensor is exposed through parameter enumeration.
    pub learnable: bool,
}

/// Insertion-ordered registry of named attributes and parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeMap {
    entries: IndexMap<String, Attribute>,
}

impl AttributeMap {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a plain (non-learnable) attribute, replacing any previous entry.
    pub fn insert(&mut self, name: impl Into<String>, value: Tensor) {
        self.entries.insert(
            name.into(),
            Attribute {
                value,
                learnable: false,
            },
        );
    }

    /// Stores a learnable parameter, replacing any previous entry.
    pub fn insert_parameter(&mut self, name: impl Into<String>, value: Tensor) {
        self.entries.insert(
            name.into(),
            Attribute {
                value,
                learnable: true,
            },
        );
    }

    /// Replaces the value of an existing entry while keeping its learnable flag.
    pub(crate) fn replace_value(&mut self, name: &str, value: Tensor) {
        if let Some(entry) = self.entries.get_mut(name) {
            entry.value = value;
        }
    }

    /// Returns the tensor registered under `name`.
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.entries.get(name).map(|entry| &entry.value)
    }

    /// Returns a mutable reference to the tensor registered under `name`.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Tensor> {
        self.entries.get_mut(name).map(|entry| &mut entry.value)
    }

    /// Returns the full entry (value and learnable flag) registered under `name`.
    pub fn entry(&self, name: &str) -> Option<&Attribute> {
        self.entries.get(name)
    }

    /// Removes the entry registered under `name`.
    pub fn remove(&mut self, name: &str) -> Option<Attribute> {
        self.entries.shift_remove(name)
    }

    /// Returns whether an entry exists under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterates over all entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Attribute)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Iterates over learnable parameters in insertion order.
    pub fn parameters(&self) -> impl Iterator<Item = (&str, &Tensor)> {
        self.iter()
            .filter(|(_, entry)| entry.learnable)
            .map(|(name, entry)| (name, &entry.value))
    }

    /// Number of registered entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Behaviour shared by node sets and edge sets.
///
/// An attribute is element-level when it has at least two axes and its
/// second axis enumerates the elements of the set. That predicate, not the
/// attribute name, decides which tensors follow the set through edge
/// mutation and which ones show up in introspection.
pub trait ElementSet {
    /// Number of elements (nodes or edges) in the set.
    fn len(&self) -> usize;

    /// Registry of attributes and parameters owned by the set.
    fn attributes(&self) -> &AttributeMap;

    /// Mutable registry of attributes and parameters owned by the set.
    fn attributes_mut(&mut self) -> &mut AttributeMap;

    /// Returns whether the set has no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns whether `value` is an element-level tensor for this set.
    fn is_element_level_attr(&self, value: &Tensor) -> bool {
        is_element_level(value, self.len())
    }

    /// Returns all element-level attributes in registration order.
    fn element_level_attributes(&self) -> IndexMap<String, &Tensor> {
        self.attributes()
            .iter()
            .filter(|(_, entry)| self.is_element_level_attr(&entry.value))
            .map(|(name, entry)| (name.to_string(), &entry.value))
            .collect()
    }

    /// Looks up an attribute, failing with a key error when it is missing.
    fn attribute(&self, name: &str) -> Result<&Tensor, CellPopError> {
        self.attributes().get(name).ok_or_else(|| {
            CellPopError::Key(
                ErrorInfo::new("unknown-attribute", "attribute is not registered on this set")
                    .with_context("attribute", name),
            )
        })
    }

    /// Samples a learnable parameter from `dist` and registers it under `name`.
    ///
    /// The default shape is `(1, len, 1)`.
    fn init_param<D, R>(
        &mut self,
        name: &str,
        dist: &D,
        shape: Option<&[usize]>,
        rng: &mut R,
    ) where
        D: Distribution<f64>,
        R: Rng + ?Sized,
        Self: Sized,
    {
        let shape = match shape {
            Some(shape) => shape.to_vec(),
            None => vec![1, self.len(), 1],
        };
        let value = Tensor::from_shape_simple_fn(IxDyn(&shape), || dist.sample(rng));
        self.attributes_mut().insert_parameter(name, value);
    }
}
