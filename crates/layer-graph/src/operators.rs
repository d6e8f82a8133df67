use crate::LayerGraphError;
use crate::tensor::{Activation, Layer, Regularizers, Shape, Tensor, TensorRef};

fn validate_rate(rate: f64) -> Result<(), LayerGraphError> {
    if !(0.0..1.0).contains(&rate) {
        return Err(LayerGraphError::InvalidArgument(format!("dropout rate {rate} outside [0, 1)")));
    }
    Ok(())
}

fn validate_spatial(input: &TensorRef, rank: usize, op: &str) -> Result<(), LayerGraphError> {
    if rank == 0 || rank > 3 {
        return Err(LayerGraphError::InvalidArgument(format!("{op} supports ranks 1 to 3, got {rank}")));
    }
    // Spatial axes plus one channel axis.
    if input.shape().rank() != rank + 1 {
        return Err(LayerGraphError::RankMismatch {
            op: op.to_string(),
            expected: rank + 1,
            actual: input.shape().rank(),
        });
    }
    Ok(())
}

fn same_padding(length: usize, stride: usize) -> usize {
    length.div_ceil(stride)
}

pub fn input(shape: impl Into<Shape>, name: Option<String>) -> Result<TensorRef, LayerGraphError> {
    let shape = shape.into();
    if shape.rank() == 0 || shape.dims.contains(&0) {
        return Err(LayerGraphError::InvalidArgument(format!("input shape {shape} must be non-empty")));
    }
    Ok(Tensor::new(name, shape, Layer::Input))
}

/// Fully connected layer acting on the last axis.
pub fn dense(input: &TensorRef, units: usize, regularizers: Regularizers) -> Result<TensorRef, LayerGraphError> {
    if units == 0 {
        return Err(LayerGraphError::InvalidArgument("dense layer needs at least one unit".to_string()));
    }
    let shape = input.shape().with_last(units);
    Ok(Tensor::new(None, shape, Layer::Dense {
        input: input.clone(),
        units,
        regularizers,
    }))
}

pub fn batch_normalization(input: &TensorRef) -> Result<TensorRef, LayerGraphError> {
    Ok(Tensor::new(None, input.shape().clone(), Layer::BatchNormalization {
        input: input.clone()
    }))
}

pub fn activation(input: &TensorRef, activation: Activation) -> Result<TensorRef, LayerGraphError> {
    Ok(Tensor::new(None, input.shape().clone(), Layer::Activation {
        input: input.clone(),
        activation,
    }))
}

/// Convolution with "same" padding; the rank is taken from `kernel_size`.
pub fn conv(
    input: &TensorRef,
    filters: usize,
    kernel_size: Vec<usize>,
    strides: Vec<usize>,
    regularizers: Regularizers,
) -> Result<TensorRef, LayerGraphError> {
    let rank = kernel_size.len();
    validate_spatial(input, rank, "Conv")?;
    if strides.len() != rank {
        return Err(LayerGraphError::InvalidArgument(format!(
            "conv strides {:?} do not match kernel rank {rank}", strides
        )));
    }
    if filters == 0 || kernel_size.contains(&0) || strides.contains(&0) {
        return Err(LayerGraphError::InvalidArgument(format!(
            "conv with filters={filters}, kernel_size={kernel_size:?}, strides={strides:?}"
        )));
    }
    let mut dims: Vec<usize> = input.shape().dims[..rank]
        .iter()
        .zip(&strides)
        .map(|(length, stride)| same_padding(*length, *stride))
        .collect();
    dims.push(filters);
    Ok(Tensor::new(None, Shape::new(dims), Layer::Conv {
        input: input.clone(),
        filters,
        kernel_size,
        strides,
        regularizers,
    }))
}

/// Max pooling with "same" padding and strides equal to the pool size.
pub fn max_pool(input: &TensorRef, pool_size: Vec<usize>) -> Result<TensorRef, LayerGraphError> {
    let rank = pool_size.len();
    validate_spatial(input, rank, "MaxPool")?;
    if pool_size.contains(&0) {
        return Err(LayerGraphError::InvalidArgument(format!("pool size {pool_size:?}")));
    }
    let mut dims: Vec<usize> = input.shape().dims[..rank]
        .iter()
        .zip(&pool_size)
        .map(|(length, pool)| same_padding(*length, *pool))
        .collect();
    dims.push(input.shape().dims[rank]);
    Ok(Tensor::new(None, Shape::new(dims), Layer::MaxPool {
        input: input.clone(),
        pool_size,
    }))
}

pub fn dropout(input: &TensorRef, rate: f64) -> Result<TensorRef, LayerGraphError> {
    validate_rate(rate)?;
    Ok(Tensor::new(None, input.shape().clone(), Layer::Dropout {
        input: input.clone(),
        rate,
    }))
}

/// Elementwise sum; every input must carry the same shape.
pub fn add(inputs: Vec<TensorRef>) -> Result<TensorRef, LayerGraphError> {
    let first = inputs.first().ok_or(LayerGraphError::EmptyInputs("Add".to_string()))?;
    for input in &inputs {
        if input.shape() != first.shape() {
            return Err(LayerGraphError::ShapeMismatch {
                op: "Add".to_string(),
                expected: first.shape().clone(),
                actual: input.shape().clone(),
            });
        }
    }
    let shape = first.shape().clone();
    Ok(Tensor::new(None, shape, Layer::Add { inputs }))
}

pub fn concatenate(inputs: Vec<TensorRef>, axis: isize) -> Result<TensorRef, LayerGraphError> {
    let first = inputs.first().ok_or(LayerGraphError::EmptyInputs("Concatenate".to_string()))?;
    let axis = first.shape().axis(axis)?;
    let mut dims = first.shape().dims.clone();
    dims[axis] = 0;
    for input in &inputs {
        let shape = input.shape();
        let compatible = shape.rank() == first.shape().rank()
            && shape.dims.iter().enumerate().all(|(i, d)| i == axis || *d == first.shape().dims[i]);
        if !compatible {
            return Err(LayerGraphError::ShapeMismatch {
                op: "Concatenate".to_string(),
                expected: first.shape().clone(),
                actual: shape.clone(),
            });
        }
        dims[axis] += shape.dims[axis];
    }
    Ok(Tensor::new(None, Shape::new(dims), Layer::Concatenate { inputs, axis }))
}

pub fn flatten(input: &TensorRef) -> Result<TensorRef, LayerGraphError> {
    let shape = Shape::from(input.shape().num_elements());
    Ok(Tensor::new(None, shape, Layer::Flatten { input: input.clone() }))
}

pub fn reshape(input: &TensorRef, target_shape: impl Into<Shape>) -> Result<TensorRef, LayerGraphError> {
    let target_shape = target_shape.into();
    if target_shape.num_elements() != input.shape().num_elements() {
        return Err(LayerGraphError::ShapeMismatch {
            op: "Reshape".to_string(),
            expected: input.shape().clone(),
            actual: target_shape,
        });
    }
    Ok(Tensor::new(None, target_shape.clone(), Layer::Reshape {
        input: input.clone(),
        target_shape,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conv_same_padding() {
        let x = input(vec![200, 5], None).unwrap();
        let y = conv(&x, 16, vec![3], vec![4], Regularizers::none()).unwrap();
        assert_eq!(y.shape().dims, vec![50, 16]);
        let z = conv(&y, 8, vec![5], vec![3], Regularizers::none()).unwrap();
        assert_eq!(z.shape().dims, vec![17, 8]);
    }

    #[test]
    fn test_conv_rank_mismatch() {
        let x = input(vec![10, 5, 2], None).unwrap();
        assert!(matches!(
            conv(&x, 4, vec![3], vec![1], Regularizers::none()),
            Err(LayerGraphError::RankMismatch { expected: 2, actual: 3, .. })
        ));
    }

    #[test]
    fn test_max_pool_keeps_channels() {
        let x = input(vec![10, 5, 2], None).unwrap();
        let y = max_pool(&x, vec![3, 2]).unwrap();
        assert_eq!(y.shape().dims, vec![4, 3, 2]);
    }

    #[test]
    fn test_add_requires_equal_shapes() {
        let a = input(vec![8], None).unwrap();
        let b = dense(&a, 4, Regularizers::none()).unwrap();
        assert!(add(vec![a.clone(), a.clone()]).is_ok());
        assert!(matches!(add(vec![a, b]), Err(LayerGraphError::ShapeMismatch { .. })));
        assert!(matches!(add(vec![]), Err(LayerGraphError::EmptyInputs(_))));
    }

    #[test]
    fn test_concatenate_feature_axis() {
        let a = input(vec![10], None).unwrap();
        let b = input(vec![6], None).unwrap();
        let c = concatenate(vec![a, b], -1).unwrap();
        assert_eq!(c.shape().dims, vec![16]);
    }

    #[test]
    fn test_reshape_preserves_elements() {
        let a = input(vec![12], None).unwrap();
        assert_eq!(reshape(&a, vec![3, 4]).unwrap().shape().dims, vec![3, 4]);
        assert!(reshape(&a, vec![5, 2]).is_err());
    }

    #[test]
    fn test_dropout_rate_bounds() {
        let a = input(vec![4], None).unwrap();
        assert!(dropout(&a, 0.3).is_ok());
        assert!(dropout(&a, 1.0).is_err());
    }
}
