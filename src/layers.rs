use crate::array::NdArray;
use crate::error::{HybridError, Result};

fn check_labels(scores: &NdArray, labels: &[usize]) -> Result<usize> {
    let &[n, c] = scores.shape() else {
        return Err(HybridError::InvalidParameter(format!(
            "scores must be (batch, classes), got {:?}",
            scores.shape()
        )));
    };
    if labels.len() != n {
        return Err(HybridError::InvalidParameter(format!(
            "{} labels for a batch of {n}",
            labels.len()
        )));
    }
    if let Some(&bad) = labels.iter().find(|&&l| l >= c) {
        return Err(HybridError::InvalidParameter(format!(
            "label {bad} out of range for {c} classes"
        )));
    }
    Ok(c)
}

/// Mean softmax cross-entropy of (batch, classes) scores against class labels
///
/// Computed as -mean(x[y] - max(x) - log(sum(exp(x - max(x))))) so large
/// scores do not overflow.
pub fn softmax_loss(scores: &NdArray, labels: &[usize]) -> Result<f32> {
    let c = check_labels(scores, labels)?;
    if labels.is_empty() {
        return Ok(0.0);
    }
    let total: f32 = scores
        .data()
        .chunks(c)
        .zip(labels)
        .map(|(row, &y)| {
            let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let log_sum: f32 = row.iter().map(|v| (v - max).exp()).sum::<f32>().ln();
            -(row[y] - max - log_sum)
        })
        .sum();
    Ok(total / labels.len() as f32)
}

/// Fraction of rows whose highest score is the labelled class
pub fn accuracy(scores: &NdArray, labels: &[usize]) -> Result<f32> {
    check_labels(scores, labels)?;
    if labels.is_empty() {
        return Ok(0.0);
    }
    let correct = scores
        .argmax_rows()?
        .iter()
        .zip(labels)
        .filter(|(p, y)| p == y)
        .count();
    Ok(correct as f32 / labels.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DType;
    use crate::registry::Registry;

    fn scores(data: Vec<f32>, shape: &[usize]) -> NdArray {
        Registry::standard()
            .unwrap()
            .factory("plain-array")
            .unwrap()
            .array(data, shape, DType::F32)
            .unwrap()
    }

    #[test]
    fn test_softmax_loss_uniform() {
        // equal scores -> loss = ln(num_classes)
        let s = scores(vec![0.0; 8], &[2, 4]);
        let loss = softmax_loss(&s, &[0, 3]).unwrap();
        assert!((loss - 4.0_f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn test_softmax_loss_large_scores_stay_finite() {
        let s = scores(vec![1000.0, 0.0], &[1, 2]);
        let loss = softmax_loss(&s, &[0]).unwrap();
        assert!(loss.is_finite());
        assert!(loss < 1e-6);
    }

    #[test]
    fn test_softmax_loss_rejects_bad_labels() {
        let s = scores(vec![0.0; 4], &[2, 2]);
        assert!(softmax_loss(&s, &[0, 2]).is_err());
        assert!(softmax_loss(&s, &[0]).is_err());
    }

    #[test]
    fn test_accuracy() {
        let s = scores(vec![0.9, 0.1, 0.2, 0.8, 0.7, 0.3], &[3, 2]);
        let acc = accuracy(&s, &[0, 1, 1]).unwrap();
        assert!((acc - 2.0 / 3.0).abs() < 1e-6);
    }
}
