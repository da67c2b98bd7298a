use serde::{Deserialize, Serialize};

/// Sampled trajectory: `populations[i]` is P at `times[i]`.
///
/// Produced whole by the simulator and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    times: Vec<f64>,
    populations: Vec<f64>,
}

impl TimeSeries {
    pub(crate) fn from_parts(times: Vec<f64>, populations: Vec<f64>) -> Self {
        debug_assert_eq!(times.len(), populations.len());
        Self { times, populations }
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn populations(&self) -> &[f64] {
        &self.populations
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Iterates `(t, P)` pairs in time order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times.iter().copied().zip(self.populations.iter().copied())
    }

    pub fn last(&self) -> Option<(f64, f64)> {
        Some((*self.times.last()?, *self.populations.last()?))
    }

    /// Axis extent for plotting: the last sample time and the largest
    /// population. `None` for an empty series.
    pub fn extent(&self) -> Option<SeriesExtent> {
        let t_max = *self.times.last()?;
        let p_max = self
            .populations
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        Some(SeriesExtent { t_max, p_max })
    }

    pub fn into_parts(self) -> (Vec<f64>, Vec<f64>) {
        (self.times, self.populations)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesExtent {
    pub t_max: f64,
    pub p_max: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extent_reports_last_time_and_peak_population() {
        let series = TimeSeries::from_parts(vec![0.0, 1.0, 2.0], vec![5.0, 9.0, 7.0]);
        let extent = series.extent().expect("non-empty series");
        assert_eq!(extent.t_max, 2.0);
        assert_eq!(extent.p_max, 9.0);
        assert_eq!(series.last(), Some((2.0, 7.0)));
    }

    #[test]
    fn empty_series_has_no_extent() {
        let series = TimeSeries::from_parts(Vec::new(), Vec::new());
        assert!(series.is_empty());
        assert!(series.extent().is_none());
    }

    #[test]
    fn iter_pairs_samples() {
        let series = TimeSeries::from_parts(vec![0.0, 1.0], vec![3.0, 4.0]);
        let pairs: Vec<_> = series.iter().collect();
        assert_eq!(pairs, vec![(0.0, 3.0), (1.0, 4.0)]);
    }
}
