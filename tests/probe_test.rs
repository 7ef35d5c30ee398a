mod common;

use probealign::align::Resolution;
use probealign::metrics::{Sample, resample};
use probealign::probe::{ProbeSide, extract_file, extract_samples_with_fallback, split_documents};

use common::{fixture_path, load_fixture, server_report};

#[test]
fn test_anchor_plus_offsets_land_on_grid() {
    // Anchor 1000 and offsets 0, 1, 2 at resolution 1 give keys 1000..=1002
    let text = server_report(1000, &[1.0, 2.0, 3.0]);
    let samples = extract_samples_with_fallback(&text, ProbeSide::Server, 0.0);
    let series = resample(&samples, Resolution::new(1).unwrap());

    assert_eq!(series.timestamps().collect::<Vec<_>>(), vec![1000, 1001, 1002]);
    assert_eq!(series.get(1001), Some(2.0));
}

#[test]
fn test_back_to_back_documents() {
    let text = format!(
        "{}{}",
        server_report(1000, &[1.0]),
        server_report(2000, &[2.0])
    );
    assert_eq!(split_documents(&text).len(), 2);

    let samples = extract_samples_with_fallback(&text, ProbeSide::Server, 0.0);
    assert_eq!(
        samples,
        vec![Sample::new(1000.0, 1.0), Sample::new(2000.0, 2.0)]
    );
}

#[test]
fn test_server_fixture_with_envelope_and_braces_in_strings() {
    // Purpose: a realistic two-run server log
    // Tests:
    // - envelope unwrapping on the first document only
    // - `{` inside a string value does not open a document
    // - intervals without a rate are skipped
    let samples =
        extract_samples_with_fallback(&load_fixture("server_in.json"), ProbeSide::Server, 0.0);
    let timestamps: Vec<f64> = samples.iter().map(|s| s.timestamp).collect();
    assert_eq!(timestamps, vec![1000.0, 1001.0, 1002.0, 1060.0, 1062.0]);

    let series = resample(&samples, Resolution::new(30).unwrap());
    assert_eq!(series.get(990), Some(9_000_000.0));
    assert_eq!(series.get(1050), Some(5_000_000.0));
    assert_eq!(series.len(), 2);
}

#[test]
fn test_client_side_ignores_embedded_server_report() {
    let text = load_fixture("client.json");

    let client = extract_samples_with_fallback(&text, ProbeSide::Client, 0.0);
    assert_eq!(
        client,
        vec![Sample::new(2000.0, 1000.0), Sample::new(2001.0, 3000.0)]
    );

    let server = extract_samples_with_fallback(&text, ProbeSide::Server, 0.0);
    assert_eq!(server, vec![Sample::new(5000.0, 99.0)]);
}

#[test]
fn test_missing_anchor_uses_fallback() {
    let text = r#"{"intervals":[{"sum":{"start":5.0,"bits_per_second":7.0}}]}"#;
    let samples = extract_samples_with_fallback(text, ProbeSide::Server, 3000.0);
    assert_eq!(samples, vec![Sample::new(3005.0, 7.0)]);
}

#[test]
fn test_garbage_between_documents_is_skipped() {
    let text = format!(
        "iperf3: interrupt - the server has terminated\n{}\n{{\"intervals\": [1,,]}}\n{}",
        server_report(100, &[1.0]),
        server_report(200, &[2.0])
    );
    let samples = extract_samples_with_fallback(&text, ProbeSide::Server, 0.0);
    assert_eq!(samples.len(), 2);
}

#[test]
fn test_extract_file_reports_missing_file() {
    let result = extract_file(&fixture_path("does_not_exist.json"), ProbeSide::Server);
    assert!(result.is_err());

    let samples = extract_file(&fixture_path("server_in.json"), ProbeSide::Server).unwrap();
    assert_eq!(samples.len(), 5);
}
