use std::sync::Arc;
use layer_graph::{operators, TensorRef};
use crate::error::Result;

/// Chains `layers` applications of `op`, the last one flagged as final.
///
/// With three or more layers and `residual` set, the output of the first
/// application is added to the hidden state right before the final one. If
/// the first application collapses to identity the whole chain does.
pub(crate) fn rectangular_chain<F>(input: TensorRef, layers: usize, residual: bool, mut op: F) -> Result<TensorRef>
where
    F: FnMut(&TensorRef, bool) -> Result<TensorRef>,
{
    match layers {
        0 => Ok(input),
        1 => op(&input, true),
        _ => {
            let first = op(&input, false)?;
            if Arc::ptr_eq(&first, &input) {
                return Ok(input);
            }
            let mut hidden = first.clone();
            for _ in 0..layers - 2 {
                hidden = op(&hidden, false)?;
            }
            if residual && layers >= 3 {
                hidden = operators::add(vec![first, hidden])?;
            }
            op(&hidden, true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layer_graph::{Layer, Regularizers};

    fn dense_op(x: &TensorRef, _last: bool) -> Result<TensorRef> {
        Ok(operators::dense(x, 4, Regularizers::none())?)
    }

    #[test]
    fn test_chain_lengths() {
        for layers in 0..5 {
            let x = operators::input(vec![4], None).unwrap();
            let mut calls = 0;
            let y = rectangular_chain(x.clone(), layers, false, |x, last| {
                calls += 1;
                dense_op(x, last)
            })
            .unwrap();
            assert_eq!(calls, layers);
            if layers == 0 {
                assert!(Arc::ptr_eq(&x, &y));
            }
        }
    }

    #[test]
    fn test_residual_joins_first_and_penultimate() {
        let x = operators::input(vec![4], None).unwrap();
        let mut outputs = vec![];
        let y = rectangular_chain(x, 3, true, |x, last| {
            let out = dense_op(x, last)?;
            outputs.push(out.clone());
            Ok(out)
        })
        .unwrap();
        let Layer::Dense { input, .. } = y.layer() else { panic!("expected dense") };
        let Layer::Add { inputs } = input.layer() else { panic!("expected add") };
        assert!(Arc::ptr_eq(&inputs[0], &outputs[0]));
        assert!(Arc::ptr_eq(&inputs[1], &outputs[1]));
    }

    #[test]
    fn test_residual_needs_three_layers() {
        let x = operators::input(vec![4], None).unwrap();
        let y = rectangular_chain(x, 2, true, dense_op).unwrap();
        let Layer::Dense { input, .. } = y.layer() else { panic!("expected dense") };
        assert!(matches!(input.layer(), Layer::Dense { .. }));
    }

    #[test]
    fn test_collapsed_op_elides_chain() {
        let x = operators::input(vec![4], None).unwrap();
        let y = rectangular_chain(x.clone(), 3, true, |x, _| Ok(x.clone())).unwrap();
        assert!(Arc::ptr_eq(&x, &y));
    }
}
