use num_traits::ToPrimitive;

use super::StatisticsError;

fn as_f64s<T: ToPrimitive>(samples: &[T]) -> Result<Vec<f64>, StatisticsError> {
    if samples.is_empty() {
        return Err(StatisticsError::EmptySamples);
    }
    samples
        .iter()
        .enumerate()
        .map(|(idx, s)| {
            s.to_f64()
                .filter(|v| v.is_finite())
                .ok_or(StatisticsError::NonNumeric(idx))
        })
        .collect()
}

fn validate_fraction(fraction: f64) -> Result<(), StatisticsError> {
    if fraction.is_finite() && fraction > 0.0 && fraction <= 1.0 {
        Ok(())
    } else {
        Err(StatisticsError::InvalidFraction(fraction))
    }
}

fn mean_of(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev_of(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

/// mean of the values within `[fraction * center, center / fraction]`, or the mean
/// of all values when nothing falls inside the window.
fn windowed_mean(values: &[f64], center: f64, fraction: f64) -> f64 {
    let a = center * fraction;
    let b = center / fraction;
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let retained: Vec<f64> = values
        .iter()
        .copied()
        .filter(|v| lo <= *v && *v <= hi)
        .collect();
    if retained.is_empty() {
        mean_of(values)
    } else {
        mean_of(&retained)
    }
}

pub fn mean<T: ToPrimitive>(samples: &[T]) -> Result<f64, StatisticsError> {
    let values = as_f64s(samples)?;
    Ok(mean_of(&values))
}

/// sample (n - 1) standard deviation. zero when fewer than two samples exist.
pub fn sample_std_dev<T: ToPrimitive>(samples: &[T]) -> Result<f64, StatisticsError> {
    let values = as_f64s(samples)?;
    Ok(std_dev_of(&values, mean_of(&values)))
}

/// mean after discarding samples outside `[fraction * mean, mean / fraction]`. falls
/// back to the unfiltered mean if filtering would discard every sample.
pub fn filtered_mean<T: ToPrimitive>(samples: &[T], fraction: f64) -> Result<f64, StatisticsError> {
    validate_fraction(fraction)?;
    let values = as_f64s(samples)?;
    let m = mean_of(&values);
    Ok(windowed_mean(&values, m, fraction))
}

/// like [`filtered_mean`] but the acceptance window is centered `std_dev_bias`
/// sample standard deviations above the mean, favoring later values.
pub fn biased_filtered_mean<T: ToPrimitive>(
    samples: &[T],
    fraction: f64,
    std_dev_bias: f64,
) -> Result<f64, StatisticsError> {
    validate_fraction(fraction)?;
    let values = as_f64s(samples)?;
    let m = mean_of(&values);
    let center = m + std_dev_bias * std_dev_of(&values, m);
    Ok(windowed_mean(&values, center, fraction))
}

/// nearest-rank percentile of already sorted samples: `index = ceil(p / 100 * n)`
/// clamped to `[1, n]` and read 1-indexed.
pub fn percentile<T: Copy>(sorted_samples: &[T], p: f64) -> Result<T, StatisticsError> {
    if sorted_samples.is_empty() {
        return Err(StatisticsError::EmptySamples);
    }
    if !(0.0..=100.0).contains(&p) {
        return Err(StatisticsError::InvalidPercentile(p));
    }
    let n = sorted_samples.len();
    let rank = ((p / 100.0) * n as f64).ceil() as usize;
    let rank = rank.clamp(1, n);
    Ok(sorted_samples[rank - 1])
}

/// repeatedly removes samples further than `scale` standard deviations from the mean
/// until none remain to remove. two or fewer samples are returned unchanged.
pub fn eliminate_outliers<T: ToPrimitive + Copy>(
    samples: &[T],
    scale: f64,
) -> Result<Vec<T>, StatisticsError> {
    let mut current: Vec<T> = samples.to_vec();
    loop {
        if current.len() <= 2 {
            return Ok(current);
        }
        let values = as_f64s(&current)?;
        let m = mean_of(&values);
        let bound = scale * std_dev_of(&values, m);
        let retained: Vec<T> = current
            .iter()
            .zip(values.iter())
            .filter(|(_, v)| (*v - m).abs() <= bound)
            .map(|(s, _)| *s)
            .collect();
        if retained.len() == current.len() || retained.is_empty() {
            return Ok(current);
        }
        current = retained;
    }
}
