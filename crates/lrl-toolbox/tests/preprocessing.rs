//! CSV in, transformed CSV out.

use lrl_toolbox::{CircularTransformer, Error, Matrix, NanPolicy, Transformer, Winsorizer};

const HOURS: &str = "hour,weekday\n0,0\n6,1\n12,3\n18,5\n24,7\n";

fn read(csv: &str) -> Matrix {
    Matrix::from_csv_reader(csv.as_bytes()).unwrap()
}

fn write(matrix: &Matrix) -> String {
    let mut out = Vec::new();
    matrix.to_csv_writer(&mut out).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_winsorize_csv_pipeline() {
    let input = read("a,b\n1,10\n2,20\n3,30\n4,40\n100,50\n");
    let mut winsorizer = Winsorizer::new((0.25, 0.75), NanPolicy::Propagate);
    let output = winsorizer.fit_transform(&input).unwrap();

    assert_eq!(output.columns().unwrap(), ["a", "b"]);
    assert_eq!(output.column(0), vec![2.0, 2.0, 3.0, 4.0, 4.0]);
    assert_eq!(output.column(1), vec![20.0, 20.0, 30.0, 40.0, 40.0]);
    assert!(write(&output).starts_with("a,b\n2,20\n"));
}

#[test]
fn test_winsorize_keeps_missing_cells() {
    let input = read("a,b\n1,1\n,2\n3,3\n5,4\n");
    let output = Winsorizer::default().fit_transform(&input).unwrap();
    assert!(output.get(1, 0).is_nan());
    assert!(!output.get(1, 1).is_nan());
    assert!(write(&output).lines().nth(2).unwrap().starts_with(','));
}

#[test]
fn test_winsorize_raise_on_missing_cells() {
    let input = read("a,b\n1,1\n,2\n3,3\n");
    let err = Winsorizer::new((0.1, 0.9), NanPolicy::Raise)
        .fit(&input)
        .unwrap_err();
    assert!(matches!(err, Error::NanEncountered { column: 0 }));
}

#[test]
fn test_circular_csv_pipeline() {
    let input = read(HOURS);
    let mut transformer = CircularTransformer::new(Some(vec![24.0, 7.0]), NanPolicy::Propagate);
    let output = transformer.fit_transform(&input).unwrap();

    assert_eq!(
        output.columns().unwrap(),
        ["cos_hour", "cos_weekday", "sin_hour", "sin_weekday"]
    );
    assert_eq!(output.n_rows(), 5);
    // 6h is a quarter turn.
    assert!(output.get(1, 0).abs() < 1e-12);
    assert!((output.get(1, 2) - 1.0).abs() < 1e-12);
    // 24h is a full turn.
    assert!((output.get(4, 0) - 1.0).abs() < 1e-12);

    let csv = write(&output);
    assert!(csv.starts_with("cos_hour,cos_weekday,sin_hour,sin_weekday\n"));
}

#[test]
fn test_circular_learned_period() {
    let input = read(HOURS);
    let mut transformer = CircularTransformer::default();
    transformer.fit(&input).unwrap();
    assert_eq!(transformer.fitted_period(), Some(&[24.0, 7.0][..]));
    assert_eq!(transformer.n_features_out(), Some(4));
}

#[test]
fn test_transform_width_must_match_fit() {
    let mut transformer = CircularTransformer::default();
    transformer.fit(&read(HOURS)).unwrap();
    let err = transformer.transform(&read("hour\n3\n")).unwrap_err();
    assert!(matches!(err, Error::ShapeMismatch { got: 1, expected: 2, .. }));
}

#[test]
fn test_rejects_non_numeric_csv() {
    let err = Matrix::from_csv_reader("a\nmonday\n".as_bytes()).unwrap_err();
    assert!(matches!(err, Error::InvalidParameter(_)));
}
