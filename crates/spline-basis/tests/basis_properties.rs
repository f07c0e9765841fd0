use std::sync::Arc;
use std::thread;

use approx::assert_relative_eq;
use nalgebra::Point3;
use spline_basis::{
    BSplineEngine, BSplineSpace, BasisCache, CacheKey, Closure, ControlPolygon, DerivativeMethod,
    EngineConfig, Interval, Knotvector, SplineError,
};

fn sample(lower: f64, upper: f64, n: usize) -> Vec<f64> {
    (0..=n)
        .map(|i| lower + (upper - lower) * i as f64 / n as f64)
        .collect()
}

fn irregular_cubic() -> Knotvector {
    Knotvector::new(
        3,
        vec![0.0, 0.0, 0.0, 0.0, 0.15, 0.4, 0.4, 0.8, 1.0, 1.0, 1.0, 1.0],
    )
    .unwrap()
}

#[test]
fn test_partition_of_unity_and_non_negativity() {
    let engine = BSplineEngine::default();
    let kv = irregular_cubic();
    let space = BSplineSpace::new(&engine, &kv).unwrap();

    for x in sample(0.0, 1.0, 200) {
        let values = space.evaluate(x);
        for v in &values {
            assert!(*v >= -1e-14, "negative basis value {v} at x={x}");
        }
        assert_relative_eq!(values.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }
}

#[test]
fn test_compact_support() {
    let engine = BSplineEngine::default();
    let kv = irregular_cubic();
    let t = kv.knots().to_vec();
    for i in 0..kv.basis_count() {
        let n = engine.non_uniform(&kv, 3, i).unwrap();
        for x in sample(-0.5, 1.5, 80) {
            if x < t[i] || x > t[i + 4] {
                assert_eq!(n.evaluate(x), 0.0, "N_{i} non-zero at {x}");
            }
        }
    }
}

#[test]
fn test_matches_de_boor_triangle() {
    let engine = BSplineEngine::default();
    let kv = irregular_cubic();
    let space = BSplineSpace::new(&engine, &kv).unwrap();

    for x in sample(0.0, 1.0, 97) {
        let (span, local) = kv.nonzero_basis(x).unwrap();
        let values = space.evaluate(x);
        for (j, expected) in local.iter().enumerate() {
            assert_relative_eq!(values[span - 3 + j], *expected, epsilon = 1e-12);
        }
    }
}

#[test]
fn test_cardinal_quadratic_values() {
    let b2 = BSplineEngine::default().cardinal(2).unwrap();
    assert_relative_eq!(b2.evaluate(1.5), 0.75, epsilon = 1e-15);
    assert_eq!(b2.evaluate(0.0), 0.0);
    assert_eq!(b2.evaluate(3.0), 0.0);
}

#[test]
fn test_cardinal_matches_uniform_knots() {
    let engine = BSplineEngine::default();
    let kv = Knotvector::new(3, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]).unwrap();
    let cardinal = engine.cardinal(3).unwrap();
    let n0 = engine.non_uniform(&kv, 3, 0).unwrap();
    for x in sample(-1.0, 5.0, 120) {
        assert_relative_eq!(cardinal.evaluate(x), n0.evaluate(x), epsilon = 1e-12);
    }
}

#[test]
fn test_continuity_at_simple_knots() {
    let engine = BSplineEngine::default();
    let kv = Knotvector::new(2, vec![0.0, 0.0, 0.0, 0.3, 0.7, 1.0, 1.0, 1.0]).unwrap();
    let n1 = engine.non_uniform(&kv, 2, 1).unwrap();
    let d1 = n1.diff(1).unwrap();
    let eps = 1e-9;
    for knot in [0.3, 0.7] {
        assert_relative_eq!(n1.evaluate(knot - eps), n1.evaluate(knot), epsilon = 1e-7);
        assert_relative_eq!(n1.evaluate(knot + eps), n1.evaluate(knot), epsilon = 1e-7);
        // degree 2 with simple knots is C1
        assert_relative_eq!(d1.evaluate(knot - eps), d1.evaluate(knot + eps), epsilon = 1e-6);
    }
}

#[test]
fn test_derivative_recurrence_matches_direct() {
    let recurrence = BSplineEngine::default();
    let direct = BSplineEngine::new(EngineConfig {
        derivative_method: DerivativeMethod::Direct,
        ..EngineConfig::default()
    });
    let kv = irregular_cubic();
    let xs: Vec<f64> = sample(0.0, 1.0, 53)
        .into_iter()
        .filter(|x| !kv.knots().contains(x))
        .collect();

    for i in 0..kv.basis_count() {
        for k in 1..=4 {
            let a = recurrence.non_uniform_derivative(&kv, 3, i, k).unwrap();
            let b = direct.non_uniform_derivative(&kv, 3, i, k).unwrap();
            for &x in &xs {
                assert_relative_eq!(a.evaluate(x), b.evaluate(x), epsilon = 1e-8, max_relative = 1e-10);
            }
        }
    }
}

#[test]
fn test_derivative_matches_finite_difference() {
    let engine = BSplineEngine::default();
    let kv = irregular_cubic();
    let h = 1e-6;
    for i in 0..kv.basis_count() {
        let n = engine.non_uniform(&kv, 3, i).unwrap();
        let dn = n.diff(1).unwrap();
        for x in [0.07, 0.3, 0.55, 0.9] {
            let fd = (n.evaluate(x + h) - n.evaluate(x - h)) / (2.0 * h);
            assert_relative_eq!(dn.evaluate(x), fd, epsilon = 1e-5);
        }
    }
}

#[test]
fn test_cache_idempotence() {
    let engine = BSplineEngine::default();
    let kv = irregular_cubic();
    let first = engine.non_uniform(&kv, 3, 2).unwrap();
    let built = engine.cache().constructions();
    let second = engine.non_uniform(&kv, 3, 2).unwrap();
    assert_eq!(engine.cache().constructions(), built);
    assert!(Arc::ptr_eq(&first.shared(), &second.shared()));

    // A different knot vector object with equal values shares entries
    let copy = Knotvector::new(3, kv.knots().to_vec()).unwrap();
    engine.non_uniform(&copy, 3, 2).unwrap();
    assert_eq!(engine.cache().constructions(), built);
}

#[test]
fn test_knot_mutation_changes_identity() {
    let engine = BSplineEngine::default();
    let mut kv = Knotvector::new(2, vec![0.0, 0.0, 0.0, 0.3, 0.7, 1.0, 1.0, 1.0]).unwrap();
    let before = engine.non_uniform(&kv, 2, 1).unwrap();
    let key_before = CacheKey::non_uniform(&kv, 2, 1, 0);

    kv.set_knot(3, 0.5).unwrap();
    let key_after = CacheKey::non_uniform(&kv, 2, 1, 0);
    assert_ne!(key_before, key_after);

    let after = engine.non_uniform(&kv, 2, 1).unwrap();
    assert_ne!(before.evaluate(0.4), after.evaluate(0.4));
    // the old entry is untouched
    assert_eq!(engine.cache().get(&key_before).as_deref(), Some(before.piecewise()));
}

#[test]
fn test_domain_closure_controls_upper_end() {
    let engine = BSplineEngine::default();
    let closed = Knotvector::clamped(2, (0.0, 1.0)).unwrap();
    let half_open = Knotvector::with_domain(
        2,
        closed.knots().to_vec(),
        Interval::new(0.0, 1.0, Closure::ClosedOpen).unwrap(),
    )
    .unwrap();
    assert_relative_eq!(engine.non_uniform(&closed, 2, 2).unwrap().evaluate(1.0), 1.0, epsilon = 1e-15);
    assert_eq!(engine.non_uniform(&half_open, 2, 2).unwrap().evaluate(1.0), 0.0);
    assert_ne!(
        CacheKey::non_uniform(&closed, 2, 2, 0),
        CacheKey::non_uniform(&half_open, 2, 2, 0)
    );
}

#[test]
fn test_clamped_end_multiplicities() {
    let kv = Knotvector::clamped(4, (-2.0, 3.0)).unwrap();
    assert_eq!(kv.left_multiplicity(4), 5);
    assert_eq!(kv.right_multiplicity(5), 5);
    assert_eq!(kv.basis_count(), 5);
}

#[test]
fn test_nurbs_with_unit_weights_is_bspline() {
    let engine = BSplineEngine::default();
    let kv = irregular_cubic();
    let weights = vec![1.0; kv.basis_count()];
    for i in 0..kv.basis_count() {
        let r = engine.rational(&kv, &weights, i).unwrap();
        let n = engine.non_uniform(&kv, 3, i).unwrap();
        for x in sample(0.0, 1.0, 40) {
            assert_relative_eq!(r.evaluate(x), n.evaluate(x), epsilon = 1e-12);
        }
    }
}

#[test]
fn test_nurbs_partition_of_unity() {
    let engine = BSplineEngine::default();
    let kv = irregular_cubic();
    let weights = [1.0, 2.0, 0.5, 3.0, 1.5, 0.8, 1.0, 2.5];
    assert_eq!(weights.len(), kv.basis_count());
    let bases: Vec<_> = (0..kv.basis_count())
        .map(|i| engine.rational(&kv, &weights, i).unwrap())
        .collect();
    for x in sample(0.0, 1.0, 60) {
        let sum: f64 = bases.iter().map(|r| r.evaluate(x)).sum();
        assert_relative_eq!(sum, 1.0, epsilon = 1e-12);
    }
    // outside the domain every rational basis vanishes
    assert_eq!(bases[0].evaluate(-0.1), 0.0);

    let derivative_sum: f64 = bases
        .iter()
        .map(|r| r.diff(1).unwrap().evaluate(0.33))
        .sum();
    assert_relative_eq!(derivative_sum, 0.0, epsilon = 1e-9);
}

#[test]
fn test_invalid_requests() {
    let engine = BSplineEngine::default();
    let kv = Knotvector::clamped(2, (0.0, 1.0)).unwrap();
    assert!(matches!(
        engine.non_uniform(&kv, 2, 3),
        Err(SplineError::InvalidArgument(_))
    ));
    assert!(matches!(
        Knotvector::new(2, vec![0.0, 0.5, 0.2, 1.0]),
        Err(SplineError::InvalidKnotSequence(_))
    ));
}

#[test]
fn test_concurrent_requests_construct_once() {
    let cache = Arc::new(BasisCache::new());
    let kv = irregular_cubic();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = BSplineEngine::with_cache(Arc::clone(&cache), EngineConfig::default());
            let kv = kv.clone();
            thread::spawn(move || {
                (0..kv.basis_count())
                    .map(|i| engine.non_uniform(&kv, 3, i).unwrap().shared())
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for other in &results[1..] {
        for (a, b) in results[0].iter().zip(other) {
            assert!(Arc::ptr_eq(a, b));
        }
    }
    assert_eq!(cache.constructions(), cache.len());
}

#[test]
fn test_refined_polygon_traces_same_curve() {
    let engine = BSplineEngine::default();
    let coarse = Knotvector::new(2, vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0]).unwrap();
    let mut fine = coarse.clone();
    fine.insert_knots(&[0.25, 0.75, 0.75]).unwrap();

    let points = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 2.0, 0.0),
        Point3::new(3.0, 2.0, 1.0),
        Point3::new(4.0, 0.0, 0.0),
    ];
    let polygon = ControlPolygon::new(&points, &[1.0, 0.5, 2.0, 1.0]).unwrap();
    let refined = polygon.refine(&coarse, &fine).unwrap();
    assert_eq!(refined.len(), fine.basis_count());

    // end points are interpolated and kept
    let projected = refined.project();
    assert_relative_eq!(projected[0], points[0], epsilon = 1e-15);
    assert_relative_eq!(projected[6], points[3], epsilon = 1e-15);

    let xs = sample(0.0, 1.0, 40);
    let before = polygon
        .evaluate(&BSplineSpace::new(&engine, &coarse).unwrap(), &xs)
        .unwrap();
    let after = refined
        .evaluate(&BSplineSpace::new(&engine, &fine).unwrap(), &xs)
        .unwrap();
    for (a, b) in before.iter().zip(&after) {
        assert_relative_eq!(*a, *b, epsilon = 1e-12);
    }

    // refining along the chain matches refining in one step
    let mut middle = coarse.clone();
    middle.insert_knots(&[0.75]).unwrap();
    let stepwise = polygon
        .refine(&coarse, &middle)
        .and_then(|p| p.refine(&middle, &fine))
        .unwrap();
    for (a, b) in stepwise.homogeneous().iter().zip(refined.homogeneous()) {
        assert_relative_eq!(*a, *b, epsilon = 1e-12);
    }
}
