use super::*;

fn ctx() -> ApiContext {
    ApiContext::new(FixtureStore::default())
}

#[tokio::test]
async fn team_tasks_filter_by_team_shift_and_limit() {
    let ctx = ctx();
    let team = TeamName::new("Mechanic Team 1");

    let all = team_tasks(&ctx, &team, TeamTaskQuery::default())
        .await
        .expect("tasks");
    let all = all["tasks"].as_array().expect("array").clone();
    assert!(all.iter().all(|task| task["team"] == "Mechanic Team 1"));
    assert_eq!(all.len(), 6);

    let query = TeamTaskQuery {
        scenario: Some(ScenarioId::new("scenario2")),
        shift: Some("2nd".into()),
        limit: Some(2),
    };
    let filtered = team_tasks(&ctx, &team, query).await.expect("filtered");
    assert_eq!(filtered["scenario"], "scenario2");
    let tasks = filtered["tasks"].as_array().expect("array");
    assert_eq!(tasks.len(), 2);
    assert!(tasks.iter().all(|task| task["shift"] == "2nd"));
}

#[tokio::test]
async fn assignment_is_reflected_in_scenario_document() {
    let ctx = ctx();
    let request = AssignTaskRequest {
        task_id: TaskId::new("E_15"),
        mechanic_id: MechanicId::new("M_7"),
        scenario: ScenarioId::new("scenario1"),
    };

    let reply = assign_task(&ctx, request).await.expect("assign");
    assert_eq!(reply["status"], "assigned");

    let document = scenario_document(&ctx, &ScenarioId::new("scenario1"))
        .await
        .expect("document");
    assert_eq!(document["tasks"][1]["taskId"], "E_15");
    assert_eq!(document["tasks"][1]["mechanic"], "M_7");

    let baseline = scenario_document(&ctx, &ScenarioId::default())
        .await
        .expect("baseline");
    assert!(baseline["tasks"][1].get("mechanic").is_none());
}

#[tokio::test]
async fn assigning_unknown_task_is_not_found() {
    let error = assign_task(
        &ctx(),
        AssignTaskRequest {
            task_id: TaskId::new("Z_1"),
            mechanic_id: MechanicId::new("M_7"),
            scenario: ScenarioId::default(),
        },
    )
    .await
    .expect_err("unknown task");
    assert_eq!(error.code, Some(ErrorCode::NotFound));
}

#[tokio::test]
async fn generated_assignments_rotate_through_present_mechanics() {
    let request = GenerateAssignmentsRequest {
        scenario: ScenarioId::default(),
        date: Some("2025-08-25".into()),
        present_mechanics: vec![MechanicId::new("M_1"), MechanicId::new("M_2")],
    };

    let reply = generate_assignments(&ctx(), &TeamName::new("Quality Team 1"), request)
        .await
        .expect("generate");

    assert_eq!(
        reply["assignments"],
        json!([
            { "taskId": "E_19", "mechanicId": "M_1" },
            { "taskId": "E_35", "mechanicId": "M_2" },
        ])
    );
    assert_eq!(reply["date"], "2025-08-25");
}

#[tokio::test]
async fn generating_without_mechanics_is_rejected() {
    let request = GenerateAssignmentsRequest {
        scenario: ScenarioId::default(),
        date: None,
        present_mechanics: Vec::new(),
    };
    let error = generate_assignments(&ctx(), &TeamName::new("Quality Team 1"), request)
        .await
        .expect_err("no mechanics");
    assert_eq!(error.code, Some(ErrorCode::Validation));
}

#[tokio::test]
async fn late_parts_impact_lists_late_part_tasks() {
    let impact = late_parts_impact(&ctx(), &ScenarioId::default())
        .await
        .expect("impact");
    assert_eq!(impact["late_parts"], 1);
    assert_eq!(impact["tasks"][0]["taskId"], "E_23");
}

#[tokio::test]
async fn export_renders_one_row_per_task() {
    let csv = export_csv(&ctx(), &ScenarioId::new("scenario3"))
        .await
        .expect("csv");
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("taskId,type,team,mechanic,shift,product,startTime,endTime")
    );
    let first = lines.next().expect("first row");
    assert!(first.starts_with("E_11,Production,Mechanic Team 1,,1st,Product A,"));
    assert_eq!(csv.lines().count(), 9);
}

#[test]
fn csv_fields_with_separators_are_quoted() {
    assert_eq!(csv_field("plain"), "plain");
    assert_eq!(csv_field("a,b"), "\"a,b\"");
    assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
}
