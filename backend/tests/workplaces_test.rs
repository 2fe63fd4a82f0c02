mod common;

use placement_backend::auth::Role;
use uuid::Uuid;

struct Fixture {
    app: common::TestApp,
    org_id: Uuid,
    admin_token: String,
    desk: Uuid,
}

async fn fixture(suffix: &str) -> Fixture {
    let app = common::setup_test_app().await;
    let org_id = common::create_test_org(&app.store, suffix).await;
    let admin_email = common::unique_email(&format!("{}-admin", suffix));
    common::create_test_user(&app.store, org_id, Role::OrgAdmin, &admin_email).await;
    let desk = common::create_test_workplace(&app.store, org_id, "DESK-1").await;
    let admin_token = common::get_auth_token(&app, &admin_email).await;

    Fixture {
        app,
        org_id,
        admin_token,
        desk,
    }
}

async fn patch_workplace(f: &Fixture, token: &str, id: Uuid, body: serde_json::Value) -> reqwest::Response {
    common::http_client()
        .patch(f.app.url(&format!("/api/workplaces/{}", id)))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await
        .unwrap()
}

async fn count_workplaces(f: &Fixture, is_active: bool) -> i64 {
    let resp = common::http_client()
        .get(f.app.url("/api/workplaces"))
        .query(&[("is_active", is_active.to_string())])
        .bearer_auth(&f.admin_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    body["meta"]["total"].as_i64().unwrap()
}

#[tokio::test]
async fn org_admin_can_deactivate_and_edit_workplace() {
    let f = fixture("wp-edit").await;
    assert_eq!(count_workplaces(&f, true).await, 1);

    let resp = patch_workplace(
        &f,
        &f.admin_token,
        f.desk,
        serde_json::json!({
            "name": "Quiet corner",
            "location": null,
            "is_active": false,
        }),
    )
    .await;
    assert_eq!(resp.status(), 200);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["code"], "DESK-1");
    assert_eq!(body["name"], "Quiet corner");
    assert!(body["location"].is_null());
    assert_eq!(body["capacity"], 10);
    assert_eq!(body["is_active"], false);

    assert_eq!(count_workplaces(&f, true).await, 0);
    assert_eq!(count_workplaces(&f, false).await, 1);

    // Omitted fields stay as they are
    let resp = patch_workplace(&f, &f.admin_token, f.desk, serde_json::json!({ "is_active": true })).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["name"], "Quiet corner");
    assert_eq!(body["is_active"], true);
}

#[tokio::test]
async fn manager_and_member_cannot_update_workplace() {
    let f = fixture("wp-rbac").await;

    for role in [Role::Manager, Role::Member] {
        let email = common::unique_email("wp-rbac-user");
        common::create_test_user(&f.app.store, f.org_id, role, &email).await;
        let token = common::get_auth_token(&f.app, &email).await;

        let resp = patch_workplace(&f, &token, f.desk, serde_json::json!({ "is_active": false })).await;
        assert_eq!(resp.status(), 403, "{:?} must not edit workplaces", role);
    }

    assert_eq!(count_workplaces(&f, true).await, 1);
}

#[tokio::test]
async fn update_rejects_duplicate_code_and_invalid_fields() {
    let f = fixture("wp-invalid").await;
    let office = common::create_test_workplace(&f.app.store, f.org_id, "OFFICE-2").await;

    let resp = patch_workplace(&f, &f.admin_token, office, serde_json::json!({ "code": "DESK-1" })).await;
    assert_eq!(resp.status(), 409);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "conflict");

    let resp = patch_workplace(&f, &f.admin_token, office, serde_json::json!({ "name": "" })).await;
    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "validation");

    let resp = patch_workplace(&f, &f.admin_token, office, serde_json::json!({ "capacity": 0 })).await;
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn workplace_of_other_org_is_not_found() {
    let f = fixture("wp-iso-a").await;
    let other_org = common::create_test_org(&f.app.store, "wp-iso-b").await;
    let foreign = common::create_test_workplace(&f.app.store, other_org, "DESK-1").await;

    let resp = patch_workplace(&f, &f.admin_token, foreign, serde_json::json!({ "is_active": false })).await;
    assert_eq!(resp.status(), 404);

    let resp = patch_workplace(&f, &f.admin_token, Uuid::new_v4(), serde_json::json!({ "name": "x" })).await;
    assert_eq!(resp.status(), 404);
}
