use gwasqc::formatter::adjust_pvalue;
use gwasqc::stats::{chi_square_upper_quantile, chi_square_upper_tail, inflation_factor};

fn close(a: f64, b: f64, rel: f64) -> bool {
    (a - b).abs() <= rel * b.abs().max(1e-300)
}

#[test]
fn upper_quantile_matches_reference_values() {
    assert!(close(chi_square_upper_quantile(0.05), 3.841_458_820_694_124, 1e-9));
    assert!(close(chi_square_upper_quantile(0.5), 0.454_936_423_119_572_8, 1e-9));
    assert!(close(chi_square_upper_quantile(0.99), 1.570_878_337_99e-4, 1e-6));
    assert!(close(chi_square_upper_quantile(0.999), 1.570_796_601_85e-6, 1e-6));
    assert_eq!(chi_square_upper_quantile(1.0), 0.0);
    assert_eq!(chi_square_upper_quantile(0.0), f64::INFINITY);
    assert!(chi_square_upper_quantile(1.5).is_nan());
}

#[test]
fn upper_quantile_is_finite_near_one() {
    for p in [0.97, 0.98, 0.99, 0.995, 0.999, 0.999_999] {
        let statistic = chi_square_upper_quantile(p);
        assert!(statistic.is_finite() && statistic > 0.0, "{p}: {statistic}");
        assert!(close(chi_square_upper_tail(statistic), p, 1e-9), "{p}");
    }
}

#[test]
fn tail_and_quantile_invert_each_other() {
    for p in [1e-300, 1e-50, 5e-8, 0.001, 0.2, 0.5, 0.8] {
        let back = chi_square_upper_tail(chi_square_upper_quantile(p));
        assert!(close(back, p, 1e-7), "{p}: {back}");
    }
}

#[test]
fn uniform_p_values_give_unit_lambda() {
    let p: Vec<f64> = (1..=99).map(|i| i as f64 / 100.0).collect();
    let lambda = inflation_factor(&p);
    assert!((lambda - 1.0).abs() < 1e-9, "{lambda}");

    let mut with_missing = p.clone();
    with_missing.push(f64::NAN);
    assert!((inflation_factor(&with_missing) - 1.0).abs() < 1e-9);
}

#[test]
fn adjusted_large_p_value_stays_valid() {
    for p in [0.99, 0.999] {
        let adjusted = adjust_pvalue(p, 1.5);
        assert!(adjusted.is_finite() && adjusted > p && adjusted <= 1.0, "{p}: {adjusted}");
    }
}
