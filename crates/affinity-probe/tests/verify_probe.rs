//! Runs the verifier against the reference probe binary

use affinity_core::{encode_forest, DeviceForest, MaskString};
use affinity_verify::{build_scenarios, run_scenarios, ChildVerifier, ProbeCommand, ScenarioOptions, Verdict};
use std::path::Path;
use tempfile::TempDir;

const TOPOLOGY: &str = r#"
driver = "reference-driver"

[[device]]
id = "gpu0"

  [[device.sub_device]]
  id = "gpu0.tile0"

  [[device.sub_device]]
  id = "gpu0.tile1"

[[device]]
id = "gpu1"

[[device]]
id = "gpu2"

  [[device.sub_device]]
  id = "gpu2.tile0"

  [[device.sub_device]]
  id = "gpu2.tile1"
"#;

fn setup() -> (TempDir, DeviceForest, ChildVerifier) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("topology.toml");
    std::fs::write(&path, TOPOLOGY).unwrap();

    let forest = DeviceForest::from_file(&path).unwrap();
    let verifier = ChildVerifier::new(probe_command(&path));
    (temp_dir, forest, verifier)
}

fn probe_command(topology: &Path) -> ProbeCommand {
    ProbeCommand::new(env!("CARGO_BIN_EXE_affinity-probe"))
        .with_args(["--topology".to_string(), topology.display().to_string()])
}

#[tokio::test]
async fn every_scenario_passes_against_reference_probe() {
    let (_dir, forest, verifier) = setup();
    let scenarios = build_scenarios(&forest, &ScenarioOptions::default()).unwrap();
    // 2^5 masks, 3 literals, 3 hierarchy modes
    assert_eq!(scenarios.len(), 38);

    let report = run_scenarios(&verifier, scenarios, "reference-driver").await;
    let failures: Vec<_> = report
        .failures()
        .map(|o| format!("{}: {}", o.scenario.name, o.verdict))
        .collect();
    assert!(failures.is_empty(), "failures: {:#?}", failures);
}

#[tokio::test]
async fn second_sub_device_alone() {
    let (_dir, forest, verifier) = setup();
    let mask = encode_forest(&forest, 0b00010);
    assert_eq!(mask.as_str(), "0.1");
    assert_eq!(
        verifier.verify(&mask, 1, "reference-driver").await,
        Verdict::Pass { count: 1 }
    );
}

#[tokio::test]
async fn wrong_expectation_is_count_mismatch() {
    let (_dir, _forest, verifier) = setup();
    let verdict = verifier.verify(&MaskString::from("0,2.1"), 4, "reference-driver").await;
    assert_eq!(
        verdict,
        Verdict::CountMismatch {
            expected: 4,
            observed: 3
        }
    );
}

#[tokio::test]
async fn unknown_driver_is_reported_by_child() {
    let (_dir, _forest, verifier) = setup();
    let verdict = verifier.verify(&MaskString::default(), 5, "other-driver").await;
    match verdict {
        Verdict::ChildReported { diagnostic } => {
            assert!(diagnostic.contains("other-driver"), "{}", diagnostic);
        }
        other => panic!("unexpected verdict {:?}", other),
    }
}

#[tokio::test]
async fn malformed_mask_is_reported_by_child() {
    let (_dir, _forest, verifier) = setup();
    let verdict = verifier.verify(&MaskString::from("0.a"), 1, "reference-driver").await;
    assert_eq!(verdict.kind(), "child_reported");
}
