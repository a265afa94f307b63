//! Scenario construction and sequential execution
//!
//! Every scenario is independent: a failed verification is recorded in the
//! report and the run moves on to the next one.

use affinity_core::{
    literal_cases, DeviceForest, DeviceHierarchy, EnumerateError, MaskCase, MaskEnumerator,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::child::ChildVerifier;
use crate::verdict::Verdict;

/// One environment to run the probe under, with the device count it should report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub env: Vec<(String, String)>,
    pub expected: usize,
}

impl Scenario {
    /// Scenario for an enumerated mask over `leaf_count` leaves
    pub fn from_mask_case(mask_env: &str, case: &MaskCase, leaf_count: usize) -> Self {
        Self {
            name: format!("mask-{:0width$b}", case.mask, width = leaf_count),
            env: vec![(mask_env.to_string(), case.mask_string.as_str().to_string())],
            expected: case.expected,
        }
    }

    /// Scenario selecting a device hierarchy mode
    pub fn from_hierarchy(hierarchy_env: &str, mode: DeviceHierarchy, forest: &DeviceForest) -> Self {
        Self {
            name: format!("hierarchy-{}", mode.as_str().to_lowercase()),
            env: vec![(hierarchy_env.to_string(), mode.as_str().to_string())],
            expected: mode.expected_count(forest),
        }
    }
}

/// Which scenario families to build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOptions {
    pub mask_env: String,
    pub hierarchy_env: String,
    /// Enumerate every leaf selection
    pub enumerate: bool,
    /// Refuse to enumerate forests with more leaves than this
    pub max_leaves: usize,
    /// Include hand-picked literal masks
    pub literals: bool,
    /// Hierarchy modes to check
    pub hierarchies: Vec<DeviceHierarchy>,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            mask_env: affinity_core::AFFINITY_MASK_ENV.to_string(),
            hierarchy_env: affinity_core::HIERARCHY_ENV.to_string(),
            enumerate: true,
            max_leaves: affinity_core::enumerate::DEFAULT_MAX_LEAVES,
            literals: true,
            hierarchies: DeviceHierarchy::ALL.to_vec(),
        }
    }
}

/// Build the scenario list for a forest
pub fn build_scenarios(
    forest: &DeviceForest,
    options: &ScenarioOptions,
) -> Result<Vec<Scenario>, EnumerateError> {
    let mut scenarios = Vec::new();

    if options.enumerate {
        let enumerator = MaskEnumerator::new(forest, options.max_leaves)?;
        let leaf_count = enumerator.leaf_count();
        scenarios.extend(
            enumerator.map(|case| Scenario::from_mask_case(&options.mask_env, &case, leaf_count)),
        );
    }

    if options.literals {
        scenarios.extend(literal_cases(forest).into_iter().map(|(literal, expected)| {
            Scenario {
                name: format!("literal-{}", literal.name),
                env: vec![(options.mask_env.clone(), literal.mask.to_string())],
                expected,
            }
        }));
    }

    scenarios.extend(
        options
            .hierarchies
            .iter()
            .map(|&mode| Scenario::from_hierarchy(&options.hierarchy_env, mode, forest)),
    );

    debug!(count = scenarios.len(), "Built scenarios");
    Ok(scenarios)
}

/// Outcome of one scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    #[serde(flatten)]
    pub verdict: Verdict,
    pub elapsed_ms: u64,
}

/// Results of a whole run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub driver: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcomes: Vec<ScenarioOutcome>,
}

impl RunReport {
    pub fn passed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.verdict.is_pass()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.passed()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioOutcome> {
        self.outcomes.iter().filter(|o| !o.verdict.is_pass())
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Run scenarios one after another against `driver`
pub async fn run_scenarios(
    verifier: &ChildVerifier,
    scenarios: Vec<Scenario>,
    driver: &str,
) -> RunReport {
    let started_at = Utc::now();
    let total = scenarios.len();
    let mut outcomes = Vec::with_capacity(total);

    info!(driver = %driver, scenarios = total, "Starting verification run");

    for (i, scenario) in scenarios.into_iter().enumerate() {
        let start = Instant::now();
        let verdict = verifier
            .verify_env(&scenario.env, scenario.expected, driver)
            .await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        if verdict.is_pass() {
            debug!(
                scenario = %scenario.name,
                index = i + 1,
                total,
                elapsed_ms,
                "Scenario passed"
            );
        } else {
            warn!(
                scenario = %scenario.name,
                env = ?scenario.env,
                kind = verdict.kind(),
                "Scenario failed: {}",
                verdict
            );
        }

        outcomes.push(ScenarioOutcome {
            scenario,
            verdict,
            elapsed_ms,
        });
    }

    let report = RunReport {
        driver: driver.to_string(),
        started_at,
        finished_at: Utc::now(),
        outcomes,
    };
    info!(
        passed = report.passed(),
        failed = report.failed(),
        "Verification run finished"
    );
    report
}
