use std::error::Error;

/// Boxed static error type
pub type Err = Box<dyn Error + 'static>;

/// Position of span `[begin, end)` in a triangular table over a sentence,
/// laid out by `end` then `begin`.
#[inline]
pub fn span_index(begin: usize, end: usize) -> usize {
  debug_assert!(begin < end, "empty span {}..{}", begin, end);
  end * (end - 1) / 2 + begin
}

/// Number of non-empty spans over a sentence of `length` tokens
pub fn num_spans(length: usize) -> usize {
  length * (length + 1) / 2
}

/// log(exp(a) + exp(b)), exact when either side is -inf.
///
/// ```
/// use chartwright::utils::log_sum;
///
/// assert_eq!(log_sum(f64::NEG_INFINITY, -2.0), -2.0);
/// assert!((log_sum(0.0, 0.0) - 2f64.ln()).abs() < 1e-12);
/// ```
pub fn log_sum(a: f64, b: f64) -> f64 {
  if a == f64::NEG_INFINITY {
    b
  } else if b == f64::NEG_INFINITY {
    a
  } else if a > b {
    a + (b - a).exp().ln_1p()
  } else {
    b + (a - b).exp().ln_1p()
  }
}

/// log-sum-exp over a slice, shifting by the max so large magnitudes don't overflow.
/// An empty slice sums to -inf.
pub fn log_sum_slice(scores: &[f64]) -> f64 {
  let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
  if max == f64::NEG_INFINITY || max == f64::INFINITY {
    return max;
  }

  let total: f64 = scores.iter().map(|s| (s - max).exp()).sum();
  max + total.ln()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn span_index_is_dense() {
    let n = 5;
    let mut seen = vec![false; num_spans(n)];
    for end in 1..=n {
      for begin in 0..end {
        let idx = span_index(begin, end);
        assert!(!seen[idx], "{}..{} collides", begin, end);
        seen[idx] = true;
      }
    }
    assert!(seen.into_iter().all(|s| s));
  }

  #[test]
  fn log_sum_matches_naive() {
    let (a, b) = (-1.3f64, -0.4f64);
    let naive = (a.exp() + b.exp()).ln();
    assert!((log_sum(a, b) - naive).abs() < 1e-12);
    assert!((log_sum(b, a) - naive).abs() < 1e-12);
  }

  #[test]
  fn log_sum_slice_handles_large_magnitudes() {
    let scores = [-1000.0, -1000.0];
    assert!((log_sum_slice(&scores) - (-1000.0 + 2f64.ln())).abs() < 1e-9);
    assert_eq!(log_sum_slice(&[]), f64::NEG_INFINITY);
    assert_eq!(
      log_sum_slice(&[f64::NEG_INFINITY, f64::NEG_INFINITY]),
      f64::NEG_INFINITY
    );
  }
}
