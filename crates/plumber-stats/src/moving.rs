use std::collections::VecDeque;

/// Mean over the last `window` pushed values.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    window: usize,
    values: VecDeque<f64>,
    sum: f64,
}

impl MovingAverage {
    /// Creates an empty moving average.
    ///
    /// A `window` of zero keeps nothing, so [`MovingAverage::mean`] stays `None`.
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            window,
            values: VecDeque::with_capacity(window),
            sum: 0.0,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.window == 0 {
            return;
        }
        if self.values.len() == self.window
            && let Some(oldest) = self.values.pop_front()
        {
            self.sum -= oldest;
        }
        self.values.push_back(value);
        self.sum += value;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.sum / self.values.len() as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_window() {
        let mut avg = MovingAverage::new(100);
        avg.push(1.0);
        avg.push(2.0);
        assert_eq!(avg.len(), 2);
        assert_eq!(avg.mean(), Some(1.5));
    }

    #[test]
    fn test_oldest_value_drops_out() {
        let mut avg = MovingAverage::new(3);
        for v in [10.0, 1.0, 2.0, 3.0] {
            avg.push(v);
        }
        assert_eq!(avg.len(), 3);
        assert_eq!(avg.mean(), Some(2.0));
    }

    #[test]
    fn test_zero_window_keeps_nothing() {
        let mut avg = MovingAverage::new(0);
        avg.push(1.0);
        assert!(avg.is_empty());
        assert_eq!(avg.mean(), None);
    }
}
