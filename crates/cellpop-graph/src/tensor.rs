use cellpop_core::errors::{CellPopError, ErrorInfo};
use ndarray::{concatenate, ArrayD, Axis};

/// Dense tensor of arbitrary rank used for attributes and parameters.
pub type Tensor = ArrayD<f64>;

/// Axis along which attributes enumerate the elements (nodes or edges) of a set.
pub const ELEMENT_AXIS: Axis = Axis(1);

/// Inserts a leading batch axis when `value` is a bare 1-D tensor of length `len`.
pub fn promote(value: Tensor, len: usize) -> Tensor {
    if value.ndim() == 1 && value.len() == len {
        value.insert_axis(Axis(0))
    } else {
        value
    }
}

/// Inserts a leading batch axis for any 1-D tensor.
pub(crate) fn promote_any(value: Tensor) -> Tensor {
    if value.ndim() == 1 {
        value.insert_axis(Axis(0))
    } else {
        value
    }
}

/// Returns whether `value` enumerates `len` elements along [`ELEMENT_AXIS`].
pub fn is_element_level(value: &Tensor, len: usize) -> bool {
    value.ndim() > 1 && value.shape()[1] == len
}

/// Keeps the entries of `value` at `indices` along the element axis, in order.
pub(crate) fn select_elements(value: &Tensor, indices: &[usize]) -> Tensor {
    value.select(ELEMENT_AXIS, indices)
}

/// Appends `tail` after `head` along the element axis.
pub(crate) fn concat_elements(
    name: &str,
    head: &Tensor,
    tail: &Tensor,
) -> Result<Tensor, CellPopError> {
    concatenate(ELEMENT_AXIS, &[head.view(), tail.view()]).map_err(|err| {
        CellPopError::Shape(
            ErrorInfo::new("attribute-concat", err.to_string())
                .with_context("attribute", name)
                .with_context("existing", format!("{:?}", head.shape()))
                .with_context("appended", format!("{:?}", tail.shape())),
        )
    })
}
