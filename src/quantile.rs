//src/quantile.rs

/// Smallest observation `v` such that the observations `>= v` hold at least
/// `q` of the total mass.
///
/// Values are taken from the largest down until the running sum reaches
/// `q * total`; the last value taken is the cutoff. Equal values keep their
/// input order. Returns `None` for an empty distribution.
pub fn cutoff_by_quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| b.total_cmp(a));

    let total: f64 = sorted.iter().sum();
    let target = q * total;
    let mut running = 0.0;
    let mut cutoff = sorted[0];
    for v in sorted {
        running += v;
        cutoff = v;
        if running >= target {
            break;
        }
    }
    Some(cutoff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_of_mass_is_the_top_value() {
        let c = cutoff_by_quantile(&[1.0, 2.0, 3.0, 4.0, 10.0], 0.5).unwrap();
        assert_eq!(c, 10.0);
    }

    #[test]
    fn order_of_input_does_not_matter() {
        let c = cutoff_by_quantile(&[4.0, 10.0, 1.0, 3.0, 2.0], 0.75).unwrap();
        // 10 + 4 = 14 < 15, 10 + 4 + 3 = 17 >= 15
        assert_eq!(c, 3.0);
    }

    #[test]
    fn full_mass_is_the_minimum() {
        let c = cutoff_by_quantile(&[0.2, 0.9, 0.5], 1.0).unwrap();
        assert_eq!(c, 0.2);
    }

    #[test]
    fn all_zero_observations() {
        assert_eq!(cutoff_by_quantile(&[0.0, 0.0], 0.99), Some(0.0));
    }

    #[test]
    fn empty_is_none() {
        assert_eq!(cutoff_by_quantile(&[], 0.99), None);
    }
}
