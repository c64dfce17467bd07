//! Integration tests for the escalation engine
//!
//! Exercises the rule table through the public API with the default
//! thresholds, the way a governance pass would see it.

use hitl_gateway::{
    Authorization, Decision, EscalationEngine, EscalationRule, EscalationThresholds,
    PolicyDecision, Project,
};

fn project(id: &str) -> Project {
    Project::new(id, "Test project", "roads")
}

fn approve(project: &Project, confidence: u8) -> PolicyDecision {
    PolicyDecision::new(&project.id, Decision::Approve, confidence, "test")
}

fn reject(project: &Project, confidence: u8) -> PolicyDecision {
    PolicyDecision::new(&project.id, Decision::Reject, confidence, "test")
}

/// Test: a $15M project exceeds the cost threshold
#[test]
fn test_expensive_project_requires_human() {
    let engine = EscalationEngine::new();
    let p = project("PRJ-COST").with_cost(15_000_000).with_risk(4.0);

    let outcome = engine.evaluate(&p, &approve(&p, 90));

    assert_eq!(outcome.authorization, Authorization::RequiresHuman);
    assert_eq!(outcome.rule_names(), vec!["COST_THRESHOLD"]);
    assert!(outcome.triggered_rules[0]
        .explanation
        .contains("$15,000,000"));
}

/// Test: low confidence escalates even a cheap project
#[test]
fn test_low_confidence_requires_human() {
    let engine = EscalationEngine::new();
    let p = project("PRJ-CONF").with_cost(2_000_000).with_risk(4.0);

    let outcome = engine.evaluate(&p, &approve(&p, 40));

    assert!(outcome.requires_human());
    assert!(outcome.has_rule(EscalationRule::LowConfidence));
    assert_eq!(outcome.triggered_rules.len(), 1);
}

/// Test: high risk combined with a large population escalates
#[test]
fn test_high_risk_population_requires_human() {
    let engine = EscalationEngine::new();
    let p = project("PRJ-POP")
        .with_cost(3_000_000)
        .with_risk(7.0)
        .with_population(300_000);

    let outcome = engine.evaluate(&p, &approve(&p, 85));

    assert!(outcome.requires_human());
    assert_eq!(outcome.rule_names(), vec!["HIGH_RISK_POPULATION"]);
}

/// Test: high risk alone, or a large population alone, does not escalate
#[test]
fn test_high_risk_population_needs_both() {
    let engine = EscalationEngine::new();

    let risky = project("PRJ-A").with_risk(7.0).with_population(50_000);
    assert!(!engine.evaluate(&risky, &approve(&risky, 85)).requires_human());

    let crowded = project("PRJ-B").with_risk(4.0).with_population(900_000);
    assert!(!engine.evaluate(&crowded, &approve(&crowded, 85)).requires_human());
}

/// Test: a clean project is applied automatically with no rules
#[test]
fn test_clean_project_auto_applies() {
    let engine = EscalationEngine::new();
    let p = project("PRJ-CLEAN").with_cost(1_000_000).with_risk(5.5);

    let outcome = engine.evaluate(&p, &approve(&p, 85));

    assert_eq!(outcome.authorization, Authorization::AutoApply);
    assert!(outcome.triggered_rules.is_empty());
    assert!(outcome.reason_codes().is_empty());
}

/// Test: every matching rule is reported, not only the first
#[test]
fn test_all_matching_rules_are_reported() {
    let engine = EscalationEngine::new();
    let p = project("PRJ-ALL")
        .with_cost(25_000_000)
        .with_risk(7.5)
        .with_population(400_000)
        .with_legal_mandate(true);

    let outcome = engine.evaluate(&p, &reject(&p, 30));

    assert_eq!(
        outcome.rule_names(),
        vec![
            "COST_THRESHOLD",
            "MANDATE_REJECT_BLOCK",
            "LOW_CONFIDENCE",
            "HIGH_RISK_POPULATION"
        ]
    );
}

/// Test: a mandated project recommended for rejection is never auto-applied
#[test]
fn test_mandated_project_never_auto_rejected() {
    let engine = EscalationEngine::new();
    for confidence in [0u8, 50, 65, 99, 100] {
        for cost in [0u64, 500_000, 9_999_999] {
            let p = project("PRJ-LAW")
                .with_cost(cost)
                .with_risk(1.0)
                .with_legal_mandate(true);
            let outcome = engine.evaluate(&p, &reject(&p, confidence));
            assert!(
                outcome.requires_human(),
                "mandated reject at confidence {confidence}, cost {cost} was auto-applied"
            );
            assert!(outcome.has_rule(EscalationRule::MandateRejectBlock));
        }
    }
}

/// Test: a mandated approval is not blocked by the mandate rule
#[test]
fn test_mandated_approval_can_auto_apply() {
    let engine = EscalationEngine::new();
    let p = project("PRJ-LAW")
        .with_cost(4_000_000)
        .with_risk(4.0)
        .with_legal_mandate(true);

    let outcome = engine.evaluate(&p, &approve(&p, 90));

    assert_eq!(outcome.authorization, Authorization::AutoApply);
}

/// Test: evaluation is pure; repeating it gives the same outcome
#[test]
fn test_evaluation_is_idempotent() {
    let engine = EscalationEngine::new();
    let p = project("PRJ-IDEM")
        .with_cost(12_000_000)
        .with_risk(6.5)
        .with_population(250_000);
    let d = approve(&p, 50);

    let first = engine.evaluate(&p, &d);
    for _ in 0..5 {
        assert_eq!(engine.evaluate(&p, &d), first);
    }
}

/// Test: thresholds are boundaries; confidence equal to the threshold passes
#[test]
fn test_threshold_boundaries() {
    let engine = EscalationEngine::new();
    let p = project("PRJ-EDGE")
        .with_cost(10_000_000)
        .with_risk(6.0)
        .with_population(199_999);

    let outcome = engine.evaluate(&p, &approve(&p, 65));
    assert!(outcome.triggered_rules.is_empty(), "{:?}", outcome.rule_names());

    let p = p.with_population(200_000);
    let outcome = engine.evaluate(&p, &approve(&p, 64));
    assert_eq!(
        outcome.rule_names(),
        vec!["LOW_CONFIDENCE", "HIGH_RISK_POPULATION"]
    );
}

/// Test: custom thresholds change which rules fire
#[test]
fn test_custom_thresholds() {
    let engine = EscalationEngine::with_thresholds(EscalationThresholds {
        cost_threshold: 1_000_000,
        confidence_threshold: 90,
        ..EscalationThresholds::default()
    });
    let p = project("PRJ-TIGHT").with_cost(2_000_000).with_risk(4.0);

    let outcome = engine.evaluate(&p, &approve(&p, 85));

    assert_eq!(outcome.rule_names(), vec!["COST_THRESHOLD", "LOW_CONFIDENCE"]);
}
