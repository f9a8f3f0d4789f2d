use anyhow::bail;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// The statistic applied to each x group. Named statistics and user
/// closures share one call shape.
#[derive(Clone)]
pub enum Estimator {
    Mean,
    Median,
    Sum,
    Min,
    Max,
    Std,
    Func(Arc<dyn Fn(&[f64]) -> f64 + Send + Sync>),
}

impl Estimator {
    pub fn custom<F>(f: F) -> Self
    where
        F: Fn(&[f64]) -> f64 + Send + Sync + 'static,
    {
        Estimator::Func(Arc::new(f))
    }

    pub fn apply(&self, values: &[f64]) -> f64 {
        match self {
            Estimator::Mean => mean(values),
            Estimator::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                percentile(&sorted, 50.0)
            }
            Estimator::Sum => values.iter().sum(),
            Estimator::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
            Estimator::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Estimator::Std => sample_sd(values),
            Estimator::Func(f) => f(values),
        }
    }
}

impl fmt::Debug for Estimator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Estimator::Mean => "mean",
            Estimator::Median => "median",
            Estimator::Sum => "sum",
            Estimator::Min => "min",
            Estimator::Max => "max",
            Estimator::Std => "std",
            Estimator::Func(_) => "custom",
        };
        f.write_str(name)
    }
}

impl FromStr for Estimator {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "mean" => Ok(Estimator::Mean),
            "median" => Ok(Estimator::Median),
            "sum" => Ok(Estimator::Sum),
            "min" => Ok(Estimator::Min),
            "max" => Ok(Estimator::Max),
            "std" => Ok(Estimator::Std),
            _ => bail!("unknown estimator '{}'", s),
        }
    }
}

/// Confidence interval specification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ci {
    /// No interval
    None,
    /// Estimate +/- one sample standard deviation
    Sd,
    /// Percentile bootstrap interval at this confidence level
    Percent(f64),
}

impl FromStr for Ci {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "none" => Ok(Ci::None),
            "sd" => Ok(Ci::Sd),
            _ => match s.parse::<f64>() {
                Ok(p) => Ok(Ci::Percent(p)),
                Err(_) => bail!("`ci` must be 'sd', 'none', or a confidence percentage"),
            },
        }
    }
}

/// Per-x aggregation result. `interval` is absent entirely when no group
/// produced one.
#[derive(Debug, Clone)]
pub struct Aggregated {
    pub x: Vec<f64>,
    pub estimate: Vec<f64>,
    pub interval: Option<Vec<Option<(f64, f64)>>>,
}

/// Group `values` by their x key and reduce each group to an estimate and
/// an optional confidence interval. Group order follows first appearance
/// unless `sort` is set.
pub fn aggregate(
    x: &[f64],
    values: &[f64],
    estimator: &Estimator,
    ci: &Ci,
    n_boot: usize,
    seed: Option<u64>,
    sort: bool,
) -> Aggregated {
    let groups = group_by_x(x, values, sort);

    let estimate: Vec<f64> = groups.iter().map(|(_, vals)| estimator.apply(vals)).collect();

    let interval: Option<Vec<Option<(f64, f64)>>> = match ci {
        Ci::None => None,
        Ci::Sd => Some(
            groups
                .iter()
                .zip(&estimate)
                .map(|((_, vals), &est)| {
                    if vals.len() < 2 {
                        // one observation has no defined spread
                        return None;
                    }
                    let sd = sample_sd(vals);
                    Some((est - sd, est + sd))
                })
                .collect(),
        ),
        Ci::Percent(level) => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            Some(
                groups
                    .iter()
                    .map(|(_, vals)| {
                        if vals.len() < 2 {
                            return None;
                        }
                        Some(bootstrap_ci(vals, estimator, *level, n_boot, &mut rng))
                    })
                    .collect(),
            )
        }
    };

    // A table of all-null intervals reports as no interval
    let interval = interval.filter(|iv| iv.iter().any(Option::is_some));

    Aggregated {
        x: groups.iter().map(|(x, _)| *x).collect(),
        estimate,
        interval,
    }
}

fn group_by_x(x: &[f64], values: &[f64], sort: bool) -> Vec<(f64, Vec<f64>)> {
    let mut index: HashMap<u64, usize> = HashMap::new();
    let mut groups: Vec<(f64, Vec<f64>)> = Vec::new();
    for (&key, &value) in x.iter().zip(values) {
        let slot = *index.entry(key.to_bits()).or_insert_with(|| {
            groups.push((key, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(value);
    }
    if sort {
        groups.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    }
    groups
}

/// Percentile interval from resampling with replacement.
fn bootstrap_ci(
    values: &[f64],
    estimator: &Estimator,
    level: f64,
    n_boot: usize,
    rng: &mut StdRng,
) -> (f64, f64) {
    let n = values.len();
    let mut boots = Vec::with_capacity(n_boot);
    let mut sample = vec![0.0; n];
    for _ in 0..n_boot {
        for slot in &mut sample {
            *slot = values[rng.gen_range(0..n)];
        }
        boots.push(estimator.apply(&sample));
    }
    boots.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let low = (100.0 - level) / 2.0;
    let high = 100.0 - low;
    (percentile(&boots, low), percentile(&boots, high))
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator); undefined below two
/// observations.
fn sample_sd(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (n - 1) as f64;
    var.sqrt()
}

/// Linear-interpolation percentile over pre-sorted data; `q` in [0, 100].
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }

    let rank = (q / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        sorted[lower]
    } else {
        let weight = rank - lower as f64;
        sorted[lower] * (1.0 - weight) + sorted[upper] * weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_observation_group() {
        let agg = aggregate(
            &[1.0],
            &[42.0],
            &Estimator::Mean,
            &Ci::Percent(95.0),
            100,
            Some(7),
            true,
        );
        assert_eq!(agg.x, vec![1.0]);
        assert_eq!(agg.estimate, vec![42.0]);
        // single-point groups everywhere means no interval at all
        assert!(agg.interval.is_none());
    }

    #[test]
    fn test_identical_values_sd_interval_is_zero_width() {
        let agg = aggregate(
            &[1.0, 1.0, 1.0],
            &[5.0, 5.0, 5.0],
            &Estimator::Mean,
            &Ci::Sd,
            0,
            None,
            true,
        );
        assert_eq!(agg.estimate, vec![5.0]);
        let interval = agg.interval.unwrap();
        assert_eq!(interval[0], Some((5.0, 5.0)));
    }

    #[test]
    fn test_sd_interval() {
        let agg = aggregate(
            &[1.0, 1.0, 2.0, 2.0],
            &[3.0, 5.0, 4.0, 6.0],
            &Estimator::Mean,
            &Ci::Sd,
            0,
            None,
            true,
        );
        assert_eq!(agg.x, vec![1.0, 2.0]);
        assert_eq!(agg.estimate, vec![4.0, 5.0]);
        let interval = agg.interval.unwrap();
        // sd of {3,5} and {4,6} is sqrt(2)
        let sd = 2.0_f64.sqrt();
        let (low, high) = interval[0].unwrap();
        assert!((low - (4.0 - sd)).abs() < 1e-12);
        assert!((high - (4.0 + sd)).abs() < 1e-12);
        let (low, high) = interval[1].unwrap();
        assert!((low - (5.0 - sd)).abs() < 1e-12);
        assert!((high - (5.0 + sd)).abs() < 1e-12);
    }

    #[test]
    fn test_group_order_first_appearance_vs_sorted() {
        let x = [2.0, 1.0, 2.0];
        let y = [1.0, 2.0, 3.0];
        let agg = aggregate(&x, &y, &Estimator::Mean, &Ci::None, 0, None, false);
        assert_eq!(agg.x, vec![2.0, 1.0]);
        let agg = aggregate(&x, &y, &Estimator::Mean, &Ci::None, 0, None, true);
        assert_eq!(agg.x, vec![1.0, 2.0]);
        assert_eq!(agg.estimate, vec![2.0, 2.0]);
    }

    #[test]
    fn test_bootstrap_is_reproducible_with_seed() {
        let x = [1.0; 8];
        let y = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        let a = aggregate(&x, &y, &Estimator::Mean, &Ci::Percent(95.0), 200, Some(3), true);
        let b = aggregate(&x, &y, &Estimator::Mean, &Ci::Percent(95.0), 200, Some(3), true);
        assert_eq!(a.interval.unwrap(), b.interval.unwrap());
    }

    #[test]
    fn test_bootstrap_interval_brackets_the_estimate() {
        let x = [1.0; 6];
        let y = [2.0, 4.0, 6.0, 8.0, 10.0, 12.0];
        let agg = aggregate(&x, &y, &Estimator::Mean, &Ci::Percent(95.0), 500, Some(1), true);
        let (low, high) = agg.interval.unwrap()[0].unwrap();
        assert!(low <= 7.0 && 7.0 <= high);
        assert!(low >= 2.0 && high <= 12.0);
    }

    #[test]
    fn test_custom_estimator() {
        let est = Estimator::custom(|vals: &[f64]| vals.iter().copied().fold(f64::NAN, f64::max));
        let agg = aggregate(
            &[1.0, 1.0],
            &[3.0, 9.0],
            &est,
            &Ci::None,
            0,
            None,
            true,
        );
        assert!(agg.interval.is_none());
        assert_eq!(agg.estimate, vec![9.0]);
    }

    #[test]
    fn test_named_estimators() {
        assert_eq!("median".parse::<Estimator>().unwrap().apply(&[1.0, 3.0, 9.0]), 3.0);
        assert_eq!("sum".parse::<Estimator>().unwrap().apply(&[1.0, 2.0]), 3.0);
        assert_eq!("min".parse::<Estimator>().unwrap().apply(&[4.0, 2.0]), 2.0);
        assert_eq!("max".parse::<Estimator>().unwrap().apply(&[4.0, 2.0]), 4.0);
        assert!("mode".parse::<Estimator>().is_err());
    }

    #[test]
    fn test_ci_parse() {
        assert_eq!("sd".parse::<Ci>().unwrap(), Ci::Sd);
        assert_eq!("none".parse::<Ci>().unwrap(), Ci::None);
        assert_eq!("95".parse::<Ci>().unwrap(), Ci::Percent(95.0));
        assert!("probably".parse::<Ci>().is_err());
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(percentile(&sorted, 0.0), 1.0);
        assert_eq!(percentile(&sorted, 100.0), 4.0);
        assert_eq!(percentile(&sorted, 50.0), 2.5);
    }
}
