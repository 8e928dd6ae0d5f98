mod support;

use axum::http::{Method, StatusCode};
use chrono::Duration;
use serde_json::{json, Value};

use support::{gradebook, pin_for, TestApp};

async fn share_class(app: &TestApp, token: &str, body: Value) -> support::TestResponse {
    app.send(Method::POST, "/api/share/class", Some(token), Some(body))
        .await
}

async fn shared_gradebook(app: &TestApp) -> (String, Value) {
    let token = app.teacher("berger").await;
    assert_eq!(app.save(&token, gradebook("1")).await.status, StatusCode::OK);
    let created = share_class(app, &token, json!({"class_id": "c1", "expires_hours": 24})).await;
    assert_eq!(created.status, StatusCode::OK, "{:?}", created.body);
    (token, created.body)
}

#[tokio::test]
async fn pin_reveals_only_its_own_student() {
    let app = TestApp::new();
    let (_, share) = shared_gradebook(&app).await;
    let share_token = share["share_token"].as_str().unwrap();

    assert_eq!(share["success"], true);
    assert_eq!(share["pins"].as_array().unwrap().len(), 2);
    assert_eq!(share_token.len(), 43);

    let anna = app.verify_pin(share_token, &pin_for(&share, "s1")).await;
    assert_eq!(anna.status, StatusCode::OK);
    assert_eq!(anna.body["student_name"], "Anna");
    assert_eq!(anna.body["class_name"], "4A");
    assert_eq!(anna.body["teacher_name"], "Frau Berger");
    assert_eq!(anna.body["grades"], json!([{"value": "1", "categoryId": "cat1"}]));
    assert!(!anna.body.to_string().contains("Ben"));

    let ben = app.verify_pin(share_token, &pin_for(&share, "s2")).await;
    assert_eq!(ben.body["student_name"], "Ben");
    assert_eq!(ben.body["grades"][0]["value"], "3");
}

#[tokio::test]
async fn malformed_and_unknown_pins_are_told_apart() {
    let app = TestApp::new();
    let (_, share) = shared_gradebook(&app).await;
    let share_token = share["share_token"].as_str().unwrap();

    let short = app.verify_pin(share_token, "12345").await;
    assert_eq!(short.status, StatusCode::BAD_REQUEST);
    assert_eq!(short.body["error"], "PIN must be exactly 6 digits");

    let issued = [pin_for(&share, "s1"), pin_for(&share, "s2")];
    let unused = (0..1_000_000)
        .map(|n| format!("{:06}", n))
        .find(|candidate| !issued.contains(candidate))
        .unwrap();
    let wrong = app.verify_pin(share_token, &unused).await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong.body["error"], "Wrong PIN");

    let unknown = app.verify_pin("not-a-share", &issued[0]).await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
    assert_eq!(unknown.body["error"], "Invalid access link");
}

#[tokio::test]
async fn revoked_share_reports_revocation_until_swept() {
    let app = TestApp::new();
    let (token, share) = shared_gradebook(&app).await;
    let share_token = share["share_token"].as_str().unwrap();
    let pin = pin_for(&share, "s1");

    let revoked = app
        .send(Method::DELETE, &format!("/api/share/class/{}", share_token), Some(&token), None)
        .await;
    assert_eq!(revoked.status, StatusCode::OK);

    let denied = app.verify_pin(share_token, &pin).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    assert_eq!(denied.body["error"], "Access has been revoked");

    let status = app
        .send(Method::GET, "/api/share/class/status/c1", Some(&token), None)
        .await;
    assert_eq!(status.body["has_share"], false);

    edugrade::sweeper::run_sweep(&app.state).await;
    assert!(app.state.db.read().await.unwrap().class_shares.is_empty());
    assert_eq!(app.verify_pin(share_token, &pin).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn zero_hour_share_is_never_live() {
    let app = TestApp::new();
    let token = app.teacher("berger").await;
    app.save(&token, gradebook("1")).await;

    let created = share_class(&app, &token, json!({"class_id": "c1", "expires_hours": 0})).await;
    assert_eq!(created.status, StatusCode::OK);
    let share_token = created.body["share_token"].as_str().unwrap();

    let verify = app.verify_pin(share_token, &pin_for(&created.body, "s1")).await;
    assert_eq!(verify.status, StatusCode::FORBIDDEN);
    assert_eq!(verify.body["error"], "Access has expired");

    let status = app
        .send(Method::GET, "/api/share/class/status/c1", Some(&token), None)
        .await;
    assert_eq!(status.status, StatusCode::OK);
    assert_eq!(status.body["has_share"], false);

    edugrade::sweeper::run_sweep(&app.state).await;
    assert!(app.state.db.read().await.unwrap().class_shares.is_empty());
}

#[tokio::test]
async fn expiry_outside_the_allowed_range_is_rejected() {
    let app = TestApp::new();
    let token = app.teacher("berger").await;
    app.save(&token, gradebook("1")).await;

    for hours in [-1, 8761] {
        let response = share_class(&app, &token, json!({"class_id": "c1", "expires_hours": hours})).await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "{}", hours);
    }

    let missing = share_class(&app, &token, json!({"class_id": "nope"})).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn writes_flow_through_to_existing_pins() {
    let app = TestApp::new();
    let (token, share) = shared_gradebook(&app).await;
    let share_token = share["share_token"].as_str().unwrap();
    let anna_pin = pin_for(&share, "s1");
    let ben_pin = pin_for(&share, "s2");

    app.clock.advance(Duration::minutes(5));
    assert_eq!(app.save(&token, gradebook("5")).await.status, StatusCode::OK);

    let anna = app.verify_pin(share_token, &anna_pin).await;
    assert_eq!(anna.body["grades"][0]["value"], "5");

    let mut without_ben = gradebook("5");
    without_ben["classes"][0]["students"]
        .as_array_mut()
        .unwrap()
        .retain(|student| student["id"] != "s2");
    app.save(&token, without_ben).await;

    assert_eq!(app.verify_pin(share_token, &ben_pin).await.status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.verify_pin(share_token, &anna_pin).await.status, StatusCode::OK);
}

#[tokio::test]
async fn deleting_the_class_deactivates_its_share() {
    let app = TestApp::new();
    let (token, share) = shared_gradebook(&app).await;
    let share_token = share["share_token"].as_str().unwrap();

    let mut without_c1 = gradebook("1");
    without_c1["classes"]
        .as_array_mut()
        .unwrap()
        .retain(|class| class["id"] != "c1");
    app.save(&token, without_c1).await;

    let verify = app.verify_pin(share_token, &pin_for(&share, "s1")).await;
    assert_eq!(verify.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn share_of_a_deleted_class_cannot_be_revived() {
    let app = TestApp::new();
    let (token, share) = shared_gradebook(&app).await;
    let share_token = share["share_token"].as_str().unwrap();
    let pin = pin_for(&share, "s1");

    app.save(&token, json!({"teacherName": "Frau Berger", "classes": []}))
        .await;
    assert_eq!(app.verify_pin(share_token, &pin).await.status, StatusCode::FORBIDDEN);

    let uri = format!("/api/share/class/{}", share_token);
    let extend = app
        .send(Method::PUT, &uri, Some(&token), Some(json!({"expires_hours": 24})))
        .await;
    assert_eq!(extend.status, StatusCode::NOT_FOUND);

    let hide = app
        .send(
            Method::PUT,
            &uri,
            Some(&token),
            Some(json!({"visibility": {"show_grades": false}})),
        )
        .await;
    assert_eq!(hide.status, StatusCode::NOT_FOUND);

    let verify = app.verify_pin(share_token, &pin).await;
    assert_eq!(verify.status, StatusCode::FORBIDDEN);
    let stored = app.state.db.read().await.unwrap().class_shares;
    assert!(!stored[share_token].active);
}

#[tokio::test]
async fn reactivating_a_lapsed_share_whose_class_is_gone_fails() {
    let app = TestApp::new();
    let (_, share) = shared_gradebook(&app).await;
    let share_token = share["share_token"].as_str().unwrap();

    app.clock.advance(Duration::hours(25));
    edugrade::sweeper::run_sweep(&app.state).await;
    let token = app.relogin("berger").await;
    app.save(&token, json!({"teacherName": "Frau Berger", "classes": []}))
        .await;

    let extend = app
        .send(
            Method::PUT,
            &format!("/api/share/class/{}", share_token),
            Some(&token),
            Some(json!({"expires_hours": 24})),
        )
        .await;
    assert_eq!(extend.status, StatusCode::NOT_FOUND);
    let verify = app.verify_pin(share_token, &pin_for(&share, "s1")).await;
    assert_eq!(verify.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn regenerating_pins_invalidates_the_old_ones() {
    let app = TestApp::new();
    let (token, share) = shared_gradebook(&app).await;
    let share_token = share["share_token"].as_str().unwrap();
    let old_pin = pin_for(&share, "s1");

    let regenerated = app
        .send(
            Method::POST,
            &format!("/api/share/class/{}/regenerate-pins", share_token),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(regenerated.status, StatusCode::OK);
    let new_pin = pin_for(&regenerated.body, "s1");

    if new_pin != old_pin {
        let stale = app.verify_pin(share_token, &old_pin).await;
        assert_eq!(stale.status, StatusCode::UNAUTHORIZED);
    }
    let fresh = app.verify_pin(share_token, &new_pin).await;
    assert_eq!(fresh.status, StatusCode::OK);
    assert_eq!(fresh.body["student_id"], "s1");
}

#[tokio::test]
async fn regenerating_pins_requires_a_live_share() {
    let app = TestApp::new();
    let (_, share) = shared_gradebook(&app).await;
    let share_token = share["share_token"].as_str().unwrap();

    app.clock.advance(Duration::hours(25));
    let token = app.relogin("berger").await;
    let response = app
        .send(
            Method::POST,
            &format!("/api/share/class/{}/regenerate-pins", share_token),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(response.body["error"], "Share is not active");
}

#[tokio::test]
async fn only_the_owner_can_manage_a_share() {
    let app = TestApp::new();
    let (_, share) = shared_gradebook(&app).await;
    let share_token = share["share_token"].as_str().unwrap();
    let intruder = app.teacher("huber").await;

    let uri = format!("/api/share/class/{}", share_token);
    let update = app
        .send(Method::PUT, &uri, Some(&intruder), Some(json!({"expires_hours": 1})))
        .await;
    assert_eq!(update.status, StatusCode::NOT_FOUND);

    let revoke = app.send(Method::DELETE, &uri, Some(&intruder), None).await;
    assert_eq!(revoke.status, StatusCode::NOT_FOUND);

    let regenerate = app
        .send(Method::POST, &format!("{}/regenerate-pins", uri), Some(&intruder), None)
        .await;
    assert_eq!(regenerate.status, StatusCode::NOT_FOUND);

    let status = app
        .send(Method::GET, "/api/share/class/status/c1", Some(&intruder), None)
        .await;
    assert_eq!(status.body["has_share"], false);
}

#[tokio::test]
async fn second_live_share_for_a_class_conflicts() {
    let app = TestApp::new();
    let (token, _) = shared_gradebook(&app).await;

    let again = share_class(&app, &token, json!({"class_id": "c1"})).await;
    assert_eq!(again.status, StatusCode::CONFLICT);

    let other_class = share_class(&app, &token, json!({"class_id": "c2"})).await;
    assert_eq!(other_class.status, StatusCode::OK);
}

#[tokio::test]
async fn expired_share_can_be_replaced() {
    let app = TestApp::new();
    let (_, first) = shared_gradebook(&app).await;

    app.clock.advance(Duration::hours(24));
    let token = app.relogin("berger").await;
    let second = share_class(&app, &token, json!({"class_id": "c1"})).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_ne!(second.body["share_token"], first["share_token"]);

    let shares = app.state.db.read().await.unwrap().class_shares;
    assert_eq!(shares.len(), 1);
}

#[tokio::test]
async fn visibility_update_hides_grades() {
    let app = TestApp::new();
    let (token, share) = shared_gradebook(&app).await;
    let share_token = share["share_token"].as_str().unwrap();

    let updated = app
        .send(
            Method::PUT,
            &format!("/api/share/class/{}", share_token),
            Some(&token),
            Some(json!({"visibility": {"show_grades": false, "show_categories": true, "show_grading_config": false}})),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["share"]["visibility"]["show_grades"], false);

    let view = app.verify_pin(share_token, &pin_for(&share, "s1")).await;
    assert_eq!(view.status, StatusCode::OK);
    assert!(view.body.get("grades").is_none());
    assert!(view.body.get("grading").is_none());
    assert_eq!(view.body["categories"][0]["name"], "Schularbeit");
}

#[tokio::test]
async fn new_lifetime_reactivates_an_expired_share() {
    let app = TestApp::new();
    let (_, share) = shared_gradebook(&app).await;
    let share_token = share["share_token"].as_str().unwrap();
    let pin = pin_for(&share, "s1");

    app.clock.advance(Duration::hours(25));
    edugrade::sweeper::run_sweep(&app.state).await;
    let token = app.relogin("berger").await;
    let expired = app.verify_pin(share_token, &pin).await;
    assert_eq!(expired.status, StatusCode::FORBIDDEN);
    assert_eq!(expired.body["error"], "Access has expired");

    let updated = app
        .send(
            Method::PUT,
            &format!("/api/share/class/{}", share_token),
            Some(&token),
            Some(json!({"expires_hours": 48})),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["share"]["has_share"], true);

    assert_eq!(app.verify_pin(share_token, &pin).await.status, StatusCode::OK);
}

#[tokio::test]
async fn pin_checks_are_throttled_per_client() {
    let mut config = support::test_config();
    config.rate_limits.pin_verify = edugrade::config::RateLimitPolicy::new(3, 60);
    let app = TestApp::with_config(config);
    let (_, share) = shared_gradebook(&app).await;
    let share_token = share["share_token"].as_str().unwrap();

    for _ in 0..3 {
        app.verify_pin(share_token, "12345").await;
    }
    let throttled = app.verify_pin(share_token, &pin_for(&share, "s1")).await;
    assert_eq!(throttled.status, StatusCode::TOO_MANY_REQUESTS);
}
