use crate::geom::{
    ArcLengthTable, CurveError, NurbsCurve3, Point3, Polyline3, Tolerance, curve_arc_length, sample_even_arc_length,
};

#[test]
fn samples_cover_both_endpoints() {
    let line = Polyline3::new(vec![Point3::new(0.0, 0.0, 0.0), Point3::new(0.0, 0.0, 3.0)]).expect("line");
    let samples = sample_even_arc_length(&line, 3).expect("samples");
    assert_eq!(samples.len(), 3);
    assert_eq!(samples[0].point, Point3::new(0.0, 0.0, 0.0));
    assert_eq!(samples[2].point, Point3::new(0.0, 0.0, 3.0));
    assert!(Tolerance::LOOSE.approx_eq_point3(samples[1].point, Point3::new(0.0, 0.0, 1.5)));
}

#[test]
fn samples_follow_length_not_parameter() {
    // Short first leg, long second leg: the parameter midpoint is not the length midpoint.
    let polyline = Polyline3::new(vec![
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 0.0, 0.0),
        Point3::new(1.0, 9.0, 0.0),
    ])
    .expect("polyline");
    let samples = sample_even_arc_length(&polyline, 3).expect("samples");
    assert!(Tolerance::new(1e-2).approx_eq_point3(samples[1].point, Point3::new(1.0, 4.0, 0.0)));
    assert!(samples[1].parameter > 1.0);
}

#[test]
fn spacing_is_even_on_a_curved_spline() {
    let points = [
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(0.5, 0.0, 2.0),
        Point3::new(3.0, 0.0, 2.5),
        Point3::new(4.0, 1.0, 6.0),
    ];
    let curve = NurbsCurve3::interpolate_through_points(&points, 3).expect("spline");
    let samples = sample_even_arc_length(&curve, 7).expect("samples");

    let table = ArcLengthTable::build(&curve, 8192);
    let total = curve_arc_length(&curve);
    let stride = total / 6.0;
    let mut previous = -1.0;
    for (i, sample) in samples.iter().enumerate() {
        assert!(sample.parameter > previous, "parameters moeten stijgen");
        previous = sample.parameter;
        let measured = table.length_at_parameter(sample.parameter);
        assert!(
            (measured - stride * i as f64).abs() < 1e-3 * total,
            "sample {i}: {measured} vs {}",
            stride * i as f64
        );
    }
    assert_eq!(samples[0].point, points[0]);
    assert!(Tolerance::new(1e-9).approx_eq_point3(samples[6].point, points[3]));
}

#[test]
fn fewer_than_two_samples_is_rejected() {
    let line = Polyline3::new(vec![Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0)]).expect("line");
    assert_eq!(sample_even_arc_length(&line, 1), Err(CurveError::TooFewSamples(1)));
}

#[test]
fn zero_length_curve_does_not_divide_by_zero() {
    let p = Point3::new(2.0, 2.0, 2.0);
    let line = Polyline3::new(vec![p, p]).expect("line");
    let samples = sample_even_arc_length(&line, 4).expect("samples");
    assert_eq!(samples.len(), 4);
    assert!(samples.iter().all(|s| s.point == p && s.arc_length == 0.0));
}
