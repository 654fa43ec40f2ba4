//! Per-bucket statistics over clean trips.
//!
//! Percentiles use linear interpolation between closest ranks, the same
//! definition dataframe libraries use by default. Missing values (NaN) are
//! skipped by every statistic.

use super::granularity::StatColumn;
use crate::models::TripRecord;

/// Percentile `q` in `[0, 1]` of the non-missing values; NaN when empty
pub fn percentile(values: &[f64], q: f64) -> f64 {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(f64::total_cmp);
    percentile_of_sorted(&sorted, q)
}

fn percentile_of_sorted(sorted: &[f64], q: f64) -> f64 {
    let rank = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
}

/// Mean of the non-missing values; NaN when empty
pub fn mean(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 { f64::NAN } else { sum / count as f64 }
}

/// Sum of the non-missing values; 0 when empty
pub fn sum(values: &[f64]) -> f64 {
    values.iter().filter(|v| !v.is_nan()).sum()
}

/// Statistics of one KPI bucket.
///
/// `trips`, `total_money`, `passenger_sum` and `distance_sum` are additive
/// across batches. The percentile and mean fields are exact within one
/// batch only; after rollup they hold the mean of the batch values, with
/// the exception of `passenger_mean` and `distance_mean`, which are
/// re-derived from the sums.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketStats {
    pub trips: u64,
    pub duration_p50: f64,
    pub duration_p95: f64,
    pub duration_mean: f64,
    pub speed_p50: f64,
    pub speed_mean: f64,
    pub total_money: f64,
    pub passenger_p50: f64,
    pub passenger_mean: f64,
    pub passenger_sum: f64,
    pub distance_sum: f64,
    pub distance_p50: f64,
    pub distance_mean: f64,
}

impl BucketStats {
    pub fn get(&self, column: StatColumn) -> f64 {
        match column {
            StatColumn::Trips => self.trips as f64,
            StatColumn::DurationP50 => self.duration_p50,
            StatColumn::DurationP95 => self.duration_p95,
            StatColumn::DurationMean => self.duration_mean,
            StatColumn::SpeedP50 => self.speed_p50,
            StatColumn::SpeedMean => self.speed_mean,
            StatColumn::TotalMoney => self.total_money,
            StatColumn::PassengerP50 => self.passenger_p50,
            StatColumn::PassengerMean => self.passenger_mean,
            StatColumn::PassengerSum => self.passenger_sum,
            StatColumn::DistanceSum => self.distance_sum,
            StatColumn::DistanceP50 => self.distance_p50,
            StatColumn::DistanceMean => self.distance_mean,
        }
    }
}

/// Column-wise value buffers for one bucket, reduced by `finish`
#[derive(Debug, Default, Clone)]
pub struct BucketAccumulator {
    durations: Vec<f64>,
    speeds: Vec<f64>,
    totals: Vec<f64>,
    passengers: Vec<f64>,
    distances: Vec<f64>,
}

impl BucketAccumulator {
    pub fn push(&mut self, trip: &TripRecord) {
        self.durations.push(trip.trip_duration);
        self.speeds.push(trip.avg_speed);
        self.totals.push(trip.total_amount);
        self.passengers.push(trip.passenger_count);
        self.distances.push(trip.trip_distance);
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    pub fn finish(mut self) -> BucketStats {
        let trips = self.len() as u64;

        let (duration_p50, duration_p95) = {
            let sorted = sorted_non_missing(&mut self.durations);
            (
                sorted_percentile(sorted, 0.5),
                sorted_percentile(sorted, 0.95),
            )
        };
        let speed_p50 = sorted_percentile(sorted_non_missing(&mut self.speeds), 0.5);
        let passenger_p50 = sorted_percentile(sorted_non_missing(&mut self.passengers), 0.5);
        let distance_p50 = sorted_percentile(sorted_non_missing(&mut self.distances), 0.5);

        BucketStats {
            trips,
            duration_p50,
            duration_p95,
            duration_mean: mean(&self.durations),
            speed_p50,
            speed_mean: mean(&self.speeds),
            total_money: sum(&self.totals),
            passenger_p50,
            passenger_mean: mean(&self.passengers),
            passenger_sum: sum(&self.passengers),
            distance_sum: sum(&self.distances),
            distance_p50,
            distance_mean: mean(&self.distances),
        }
    }
}

/// Drop missing values and sort in place
fn sorted_non_missing(values: &mut Vec<f64>) -> &[f64] {
    values.retain(|v| !v.is_nan());
    values.sort_by(f64::total_cmp);
    values
}

fn sorted_percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        f64::NAN
    } else {
        percentile_of_sorted(sorted, q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trip(duration: f64, distance: f64, total: f64, passengers: f64) -> TripRecord {
        TripRecord {
            trip_duration: duration,
            trip_distance: distance,
            total_amount: total,
            passenger_count: passengers,
            avg_speed: distance / (duration / 60.0),
            ..TripRecord::empty()
        }
    }

    #[test]
    fn test_percentile_linear_interpolation() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&values, 0.5), 2.5);
        assert!((percentile(&values, 0.95) - 3.85).abs() < 1e-12);
        assert_eq!(percentile(&values, 0.0), 1.0);
        assert_eq!(percentile(&values, 1.0), 4.0);
    }

    #[test]
    fn test_percentile_skips_missing() {
        assert_eq!(percentile(&[f64::NAN, 5.0, 1.0], 0.5), 3.0);
        assert!(percentile(&[f64::NAN], 0.5).is_nan());
        assert!(percentile(&[], 0.5).is_nan());
    }

    #[test]
    fn test_mean_and_sum() {
        assert_eq!(mean(&[1.0, f64::NAN, 3.0]), 2.0);
        assert!(mean(&[]).is_nan());
        assert_eq!(sum(&[1.5, f64::NAN, 2.5]), 4.0);
        assert_eq!(sum(&[]), 0.0);
    }

    #[test]
    fn test_accumulator_finish() {
        let mut acc = BucketAccumulator::default();
        acc.push(&trip(10.0, 2.0, 12.0, 1.0));
        acc.push(&trip(20.0, 4.0, 20.0, 3.0));
        acc.push(&trip(30.0, 6.0, 28.0, 2.0));

        let stats = acc.finish();
        assert_eq!(stats.trips, 3);
        assert_eq!(stats.duration_p50, 20.0);
        assert!((stats.duration_p95 - 29.0).abs() < 1e-12);
        assert_eq!(stats.duration_mean, 20.0);
        assert_eq!(stats.total_money, 60.0);
        assert_eq!(stats.passenger_sum, 6.0);
        assert_eq!(stats.passenger_p50, 2.0);
        assert_eq!(stats.distance_sum, 12.0);
        assert_eq!(stats.distance_mean, 4.0);
        assert_eq!(stats.speed_p50, 12.0);
    }

    #[test]
    fn test_stat_column_lookup() {
        let mut acc = BucketAccumulator::default();
        acc.push(&trip(15.0, 3.0, 18.0, 2.0));
        let stats = acc.finish();
        assert_eq!(stats.get(StatColumn::Trips), 1.0);
        assert_eq!(stats.get(StatColumn::TotalMoney), 18.0);
        assert_eq!(stats.get(StatColumn::SpeedMean), 12.0);
    }
}
