//! メール配信 API の統合テスト
//!
//! モックリポジトリで組み立てたルーターに HTTP リクエストを送り、
//! 権限チェックとレスポンス形状を検証する。

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode},
};
use mailflow_domain::{mailing::MailingStatus, user::UserRole};
use mailflow_infra::repository::{MailingStats, UserRepository};
use mailflow_mailing_service::{
    app_builder::build_router,
    test_utils::{MailingTestBuilder, MailingTestSetup},
    usecase::MANUAL_STOP_REASON,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

fn app(setup: &MailingTestSetup) -> Router {
    build_router(setup.app_state())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_healthは200を返す() {
    let setup = MailingTestBuilder::new().build().await;

    let (status, body) = send(app(&setup), get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_所有者の送信で配信結果が返る() {
    let setup = MailingTestBuilder::new().build().await;
    let mailing = setup.mailing_with_recipients(&["a@x.io", "b@x.io"]).await;

    let (status, body) = send(
        app(&setup),
        post_json(
            &format!("/internal/mailings/{}/send", mailing.id()),
            json!({ "user_id": setup.owner.id().as_uuid() }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "data": { "outcome": "ok", "success_count": 2, "failure_count": 0 } })
    );
}

#[tokio::test]
async fn test_二回目の送信はalready_launchedになる() {
    let setup = MailingTestBuilder::new().build().await;
    let mailing = setup.mailing_with_recipients(&["a@x.io"]).await;
    let uri = format!("/internal/mailings/{}/send", mailing.id());
    let actor = json!({ "user_id": setup.owner.id().as_uuid() });

    send(app(&setup), post_json(&uri, actor.clone())).await;
    let (status, body) = send(app(&setup), post_json(&uri, actor)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "already_launched");
    assert_eq!(setup.transport.sent().len(), 1);
}

#[tokio::test]
async fn test_他人の送信は403になる() {
    let setup = MailingTestBuilder::new().build().await;
    let other = setup.add_user("other@x.io", UserRole::Member).await;
    let mailing = setup.mailing_with_recipients(&["a@x.io"]).await;

    let (status, body) = send(
        app(&setup),
        post_json(
            &format!("/internal/mailings/{}/send", mailing.id()),
            json!({ "user_id": other.id().as_uuid() }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], 403);
    assert!(setup.transport.sent().is_empty());
}

#[tokio::test]
async fn test_存在しないメール配信は404になる() {
    let setup = MailingTestBuilder::new().build().await;

    let (status, _) = send(
        app(&setup),
        post_json(
            &format!("/internal/mailings/{}/send", Uuid::now_v7()),
            json!({ "user_id": setup.owner.id().as_uuid() }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_停止すると未送信の受信者が失敗として記録される() {
    let setup = MailingTestBuilder::new().build().await;
    let mailing = setup.mailing_with_recipients(&["a@x.io", "b@x.io"]).await;
    setup.launch(&mailing).await;
    setup.record_success(&mailing, "a@x.io").await;

    let (status, body) = send(
        app(&setup),
        post_json(
            &format!("/internal/mailings/{}/stop", mailing.id()),
            json!({ "user_id": setup.owner.id().as_uuid() }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "data": { "stopped": true, "backfilled": 1 } }));

    let (_, attempts) = send(
        app(&setup),
        get(&format!(
            "/internal/mailings/{}/attempts?user_id={}",
            mailing.id(),
            setup.owner.id()
        )),
    )
    .await;
    let attempts = attempts["data"].as_array().unwrap();
    assert_eq!(attempts.len(), 2);
    let failed = attempts
        .iter()
        .find(|a| a["recipient_email"] == "b@x.io")
        .unwrap();
    assert_eq!(failed["status"], "failed");
    assert_eq!(failed["server_response"], MANUAL_STOP_REASON);
}

#[tokio::test]
async fn test_サービスマネージャーによる他人のメール配信の停止は403になる() {
    let setup = MailingTestBuilder::new().build().await;
    let manager = setup
        .add_user("manager@x.io", UserRole::ServiceManager)
        .await;
    let mailing = setup.mailing_with_recipients(&["a@x.io", "b@x.io"]).await;
    setup.launch(&mailing).await;

    let (status, body) = send(
        app(&setup),
        post_json(
            &format!("/internal/mailings/{}/stop", mailing.id()),
            json!({ "user_id": manager.id().as_uuid() }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], 403);
    assert_eq!(
        setup.mailings.get(mailing.id()).unwrap().status(),
        MailingStatus::Launched
    );
    assert!(setup.attempts.all().is_empty());
}

#[tokio::test]
async fn test_予約すると配信予定日時が返る() {
    let setup = MailingTestBuilder::new().build().await;
    let mailing = setup.mailing_with_recipients(&["a@x.io"]).await;

    let (status, body) = send(
        app(&setup),
        post_json(
            &format!("/internal/mailings/{}/schedule", mailing.id()),
            json!({
                "user_id": setup.owner.id().as_uuid(),
                "scheduled_at": "2030-01-01T09:00:00Z",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "created");
    assert_eq!(body["data"]["scheduled_at"], "2030-01-01T09:00:00+00:00");
}

#[tokio::test]
async fn test_配信開始後の予約は409になる() {
    let setup = MailingTestBuilder::new().build().await;
    let mailing = setup.mailing_with_recipients(&["a@x.io"]).await;
    setup.launch(&mailing).await;

    let (status, _) = send(
        app(&setup),
        post_json(
            &format!("/internal/mailings/{}/schedule", mailing.id()),
            json!({
                "user_id": setup.owner.id().as_uuid(),
                "scheduled_at": "2030-01-01T09:00:00Z",
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_ダッシュボード統計が返る() {
    let setup = MailingTestBuilder::new().build().await;
    setup.stats.set_stats(
        setup.owner.id().clone(),
        MailingStats {
            total_mailings: 3,
            successful_attempts: 5,
            failed_attempts: 2,
            ..Default::default()
        },
    );

    let (status, body) = send(
        app(&setup),
        get(&format!("/internal/dashboard/stats?user_id={}", setup.owner.id())),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_mailings"], 3);
    assert_eq!(body["data"]["total_sent"], 7);
}

#[tokio::test]
async fn test_サービスマネージャーがブロックすると配信中のメール配信が停止する() {
    let setup = MailingTestBuilder::new().build().await;
    let manager = setup
        .add_user("manager@x.io", UserRole::ServiceManager)
        .await;
    let mailing = setup.mailing_with_recipients(&["a@x.io"]).await;
    setup.launch(&mailing).await;

    let (status, body) = send(
        app(&setup),
        post_json(
            &format!("/internal/users/{}/block", setup.owner.id()),
            json!({ "user_id": manager.id().as_uuid() }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["stopped_mailings"], 1);
    assert_eq!(
        setup.mailings.get(mailing.id()).unwrap().status(),
        MailingStatus::Accomplished
    );
}

#[tokio::test]
async fn test_メンバーによるブロックは403になる() {
    let setup = MailingTestBuilder::new().build().await;
    let member = setup.add_user("member@x.io", UserRole::Member).await;

    let (status, _) = send(
        app(&setup),
        post_json(
            &format!("/internal/users/{}/block", setup.owner.id()),
            json!({ "user_id": member.id().as_uuid() }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_ブロック解除するとブロック状態が解除される() {
    let setup = MailingTestBuilder::new().build().await;
    let manager = setup
        .add_user("manager@x.io", UserRole::ServiceManager)
        .await;
    setup.users.update_blocked(setup.owner.id(), true).await.unwrap();

    let (status, body) = send(
        app(&setup),
        post_json(
            &format!("/internal/users/{}/unblock", setup.owner.id()),
            json!({ "user_id": manager.id().as_uuid() }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "data": { "user_id": setup.owner.id().as_uuid(), "is_blocked": false } })
    );
}
