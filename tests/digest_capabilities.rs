use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use tdigest_tree::{DigestError, TDigest};

/// A digest seeded for reproducible compression replay, loaded with one heavy
/// point and a spread of random observations.
fn populated(seed: u64) -> TDigest {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut t = TDigest::builder().seed(seed).build();
    t.push_weighted(60.0, 100.0).expect("finite");
    for _ in 0..10 {
        t.push(rng.random::<f64>() * 100.0).expect("finite");
    }
    t
}

/* ============================
 * Byte serialization
 * ============================ */

#[test]
fn verbose_bytes_load_back_identically() {
    let mut t = populated(1);
    let bytes = t.as_bytes();

    let mut back = TDigest::from_bytes(&bytes).expect("decodable");
    assert_eq!(
        back.percentile(0.9).expect("valid"),
        t.percentile(0.9).expect("valid")
    );
    assert_eq!(back.as_bytes(), bytes, "re-encoding must be byte-stable");
}

#[test]
fn verbose_bytes_handle_zero_size() {
    let t = TDigest::default();
    let back = TDigest::from_bytes(&t.as_bytes()).expect("decodable");
    assert_eq!(back.total_weight(), 0.0);
    assert_eq!(back.centroid_count(), 0);
}

#[test]
fn verbose_bytes_preserve_compression() {
    let t = TDigest::new(0.001, 25.0, 1.1);
    let back = TDigest::from_bytes(&t.as_bytes()).expect("decodable");
    assert_eq!(back.compression(), t.compression());
    assert_eq!(back.delta(), t.delta());
}

#[test]
fn small_bytes_load_back_within_reduced_precision() {
    // Exactly f32-representable means keep the delta coding lossless, so the
    // compact format must round-trip byte-for-byte here.
    let mut t = TDigest::builder().seed(2).build();
    t.push_weighted(60.0, 1000.0).expect("finite");
    for v in [1.25, 2.5, 3.75, 5.0, 6.25, 7.5, 8.75] {
        t.push(v).expect("finite");
    }
    let bytes = t.as_small_bytes().expect("encodable");

    let mut back = TDigest::from_bytes(&bytes).expect("decodable");
    let expected = t.percentile(0.9).expect("valid").expect("non-empty");
    let got = back.percentile(0.9).expect("valid").expect("non-empty");
    assert!(
        (expected - got).abs() < 1e-4,
        "compact round trip drifted: {expected} vs {got}"
    );
    assert_eq!(
        back.as_small_bytes().expect("encodable"),
        bytes,
        "re-encoding must be byte-stable"
    );
}

#[test]
fn small_bytes_handle_zero_size() {
    let t = TDigest::default();
    let bytes = t.as_small_bytes().expect("encodable");
    let back = TDigest::from_bytes(&bytes).expect("decodable");
    assert_eq!(back.total_weight(), 0.0);
}

/* ============================
 * JSON serialization
 * ============================ */

#[test]
fn json_loads_serialized_data() {
    let mut t = TDigest::default();
    t.push_weighted(60.0, 100.0).expect("finite");

    let json = serde_json::to_string(&t).expect("serialize");
    let mut back: TDigest = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(
        back.percentile(0.9).expect("valid"),
        t.percentile(0.9).expect("valid")
    );
}

/* ============================
 * Percentile
 * ============================ */

#[test]
fn percentile_is_none_on_an_empty_digest() {
    let mut t = TDigest::default();
    assert_eq!(t.percentile(0.9).expect("valid"), None);
}

#[test]
fn percentile_rejects_probes_outside_the_unit_interval() {
    let mut t = TDigest::default();
    assert_eq!(
        t.percentile(1.1),
        Err(DigestError::InvalidPercentile { p: 1.1 })
    );
    assert_eq!(
        t.percentiles(&[0.5, -0.2]),
        Err(DigestError::InvalidPercentile { p: -0.2 })
    );
}

#[test]
fn percentile_of_a_single_heavy_value_is_that_value() {
    let mut t = TDigest::default();
    t.push_weighted(60.0, 100.0).expect("finite");
    assert_eq!(t.percentile(0.9).expect("valid"), Some(60.0));
}

#[test]
fn percentile_of_all_zeros_is_zero_everywhere() {
    let mut t = TDigest::default();
    t.push(0.0).expect("finite");
    assert_eq!(
        t.percentiles(&[0.0, 0.5, 1.0]).expect("valid"),
        vec![Some(0.0), Some(0.0), Some(0.0)]
    );
}

#[test]
fn percentile_error_stays_small_on_uniform_data() {
    let mut rng = StdRng::seed_from_u64(1234);
    let mut t = TDigest::builder().seed(1234).build();
    for _ in 0..100_000 {
        t.push(rng.random::<f64>()).expect("finite");
    }
    t.compress();

    let mut maxerr = 0.0f64;
    for i in 0..=10 {
        let p = f64::from(i) / 10.0;
        let q = t.percentile(p).expect("valid").expect("non-empty");
        maxerr = maxerr.max((p - q).abs());
    }
    assert!(maxerr < 0.01, "max percentile error {maxerr} exceeds 0.01");
}

#[test]
fn percentiles_stay_inside_the_observed_range() {
    let mut rng = StdRng::seed_from_u64(77);
    let mut t = TDigest::builder().seed(77).build();
    let values: Vec<f64> = (0..5_000).map(|_| rng.random::<f64>() * 1e6 - 5e5).collect();
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    t.push_all(values).expect("finite");

    for i in 0..=20 {
        let p = f64::from(i) / 20.0;
        let q = t.percentile(p).expect("valid").expect("non-empty");
        assert!(
            q >= min && q <= max,
            "percentile({p}) = {q} escaped [{min}, {max}]"
        );
    }
}

/* ============================
 * Push
 * ============================ */

#[test]
fn push_survives_replayed_aggregation_samples() {
    // Regression fixture: repeated near-identical batches once tripped an
    // uninitialized midpoint cumulative weight during the capacity check.
    let mut t = TDigest::default();
    t.push_all([
        125_000_000.0,
        104_166_666.66666666,
        135_416_666.66666666,
        104_166_666.66666666,
        104_166_666.66666666,
        93_750_000.0,
        125_000_000.0,
        62_500_000.0,
        114_583_333.33333333,
        156_250_000.0,
        124_909_090.90909092,
        104_090_909.0909091,
        135_318_181.81818184,
        104_090_909.0909091,
        104_090_909.0909091,
        93_681_818.18181819,
        124_909_090.90909092,
        62_454_545.45454546,
        114_500_000.00000001,
        156_136_363.63636366,
        123_567_567.56756756,
        102_972_972.97297296,
        133_864_864.86486486,
        102_972_972.97297296,
        102_972_972.97297296,
        92_675_675.67567568,
        123_567_567.56756756,
        61_783_783.78378378,
        113_270_270.27027026,
        154_459_459.45945945,
        123_829_787.23404256,
        103_191_489.36170213,
    ])
    .expect("finite");
    assert_eq!(t.total_weight(), 32.0);
}

#[test]
fn sorted_input_does_not_blow_up_the_centroid_count() {
    let mut t = TDigest::builder().seed(3).build();
    t.push_all((0..=10_000).map(f64::from)).expect("finite");
    assert!(t.centroid_count() < 5_000);
    t.compress();
    assert!(t.centroid_count() < 1_000);
}

#[test]
fn total_weight_reports_the_number_of_observations() {
    let mut rng = StdRng::seed_from_u64(4);
    let mut t = TDigest::builder().seed(4).build();
    let n = 10_000;
    for _ in 0..n {
        t.push(rng.random::<f64>()).expect("finite");
    }
    t.compress();
    assert_eq!(t.total_weight(), f64::from(n));
}

/* ============================
 * Rank
 * ============================ */

#[test]
fn p_rank_brackets_the_distribution() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut t = TDigest::builder().seed(5).build();
    for _ in 0..10_000 {
        t.push(rng.random::<f64>()).expect("finite");
    }

    assert_eq!(t.p_rank(-1.0), Some(0.0));
    assert_eq!(t.p_rank(2.0), Some(1.0));
    let median_rank = t.p_rank(0.5).expect("non-empty");
    assert!(
        (median_rank - 0.5).abs() < 0.02,
        "rank of the median drifted: {median_rank}"
    );

    let ranks = t.p_ranks(&[0.1, 0.5, 0.9]);
    let r: Vec<f64> = ranks.into_iter().map(|r| r.expect("non-empty")).collect();
    assert!(r[0] < r[1] && r[1] < r[2]);
}

/* ============================
 * Merge
 * ============================ */

#[test]
fn addition_works_with_empty_digests() {
    let a = TDigest::default();
    let b = TDigest::new(0.001, 50.0, 1.2);
    assert_eq!((&a + &b).centroid_count(), 0);
}

#[test]
fn addition_keeps_the_left_operand_parameters() {
    let a = populated(6);
    let mut b = TDigest::new(0.001, 50.0, 1.2);
    b.push_weighted(60.0, 100.0).expect("finite");

    let m = &a + &b;
    assert_eq!(m.delta(), a.delta());
    assert_eq!(m.k(), a.k());
    assert_eq!(m.cx(), a.cx());
}

#[test]
fn addition_is_weight_additive_and_count_subadditive() {
    let a = populated(7);
    let b = populated(8);

    let m = &a + &b;
    assert_eq!(m.total_weight(), a.total_weight() + b.total_weight());
    assert!(m.centroid_count() <= a.centroid_count() + b.centroid_count());
}

#[test]
fn merge_in_place_works_with_empty_digests() {
    let mut a = TDigest::default();
    let b = TDigest::new(0.001, 50.0, 1.2);
    a.merge(&b);
    assert_eq!(a.centroid_count(), 0);
}

#[test]
fn merge_in_place_keeps_parameters_and_combines_weight() {
    let mut a = populated(9);
    let b = populated(10);
    let (delta, k, cx) = (a.delta(), a.k(), a.cx());
    let combined_weight = a.total_weight() + b.total_weight();
    let combined_count = a.centroid_count() + b.centroid_count();

    a.merge(&b);
    assert_eq!(a.delta(), delta);
    assert_eq!(a.k(), k);
    assert_eq!(a.cx(), cx);
    assert_eq!(a.total_weight(), combined_weight);
    assert!(a.centroid_count() <= combined_count);
}
