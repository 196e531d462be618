use super::*;

#[test]
fn active_goal_response_accepts_null_goal_without_steps() {
    let parsed: ActiveGoalResponse = serde_json::from_str(r#"{"goal":null}"#).expect("json");
    assert_eq!(parsed, ActiveGoalResponse::none());
}

#[test]
fn steps_use_backend_field_names() {
    let parsed: ActiveGoalResponse = serde_json::from_str(
        r#"{
            "goal": {"id": "g1", "user_id": "u1", "description": "Ship it", "is_active": true},
            "steps": [{"id": "s1", "goal_id": "g1", "step_order": 1, "title": "Plan", "status": "completed"}]
        }"#,
    )
    .expect("json");

    let goal = parsed.goal.expect("goal");
    assert!(goal.is_active);
    assert_eq!(parsed.steps[0].id, StepId::from("s1"));
    assert_eq!(parsed.steps[0].status, StepStatus::Completed);
}

#[test]
fn reorder_request_serializes_ids_as_plain_strings() {
    let request = ReorderRequest {
        step_ids: vec![StepId::from("2"), StepId::from("1")],
    };
    assert_eq!(
        serde_json::to_value(&request).expect("json"),
        serde_json::json!({ "step_ids": ["2", "1"] })
    );
}

#[test]
fn review_response_accepts_both_feedback_spellings() {
    let canonical: ReviewResponse =
        serde_json::from_str(r#"{"summary":[{"status":"completed","count":3}],"ai_feedback":"Nice"}"#)
            .expect("json");
    let legacy: ReviewResponse =
        serde_json::from_str(r#"{"summary":[],"aiFeedback":"Nice"}"#).expect("json");

    assert_eq!(canonical.ai_feedback, "Nice");
    assert_eq!(canonical.summary[0].count, 3);
    assert_eq!(legacy.ai_feedback, "Nice");
}

#[test]
fn routes_embed_ids() {
    assert_eq!(
        step_status_route(&StepId::from("abc")),
        "/api/roadmap-steps/abc/status"
    );
    assert_eq!(goal_steps_route(&GoalId::from("g9")), "/api/goals/g9/steps");
}
