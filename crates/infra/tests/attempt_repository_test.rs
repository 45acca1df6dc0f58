//! AttemptRepository 統合テスト
//!
//! 実行方法:
//! ```bash
//! cargo test -p mailflow-infra --test attempt_repository_test
//! ```

mod common;

use chrono::Duration;
use common::{insert_mailing, insert_message, insert_recipient, insert_user, test_now};
use mailflow_domain::{attempt::Attempt, user::UserRole};
use mailflow_infra::{
    db::{PgTransactionManager, TransactionManager},
    repository::{
        AttemptRepository,
        PostgresAttemptRepository,
        PostgresRecipientRepository,
        RecipientRepository,
    },
};
use pretty_assertions::assert_eq;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../migrations")]
async fn test_同じ受信者の試行は一件だけ記録される(pool: PgPool) {
    let owner = insert_user(&pool, "owner@example.com", UserRole::Member).await;
    let message = insert_message(&pool, owner.id()).await;
    let r = insert_recipient(&pool, owner.id(), "a@example.com").await;
    let mailing = insert_mailing(&pool, owner.id(), message.id(), &[&r], None).await;
    let sut = PostgresAttemptRepository::new(pool);

    let first = sut
        .record(&Attempt::success(&mailing, &r, test_now()))
        .await
        .unwrap();
    let second = sut
        .record(&Attempt::failed(&mailing, &r, "停止", test_now()))
        .await
        .unwrap();

    assert!(first);
    assert!(!second);
    let attempts = sut.find_by_mailing(mailing.id()).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert!(attempts[0].is_success());
    assert_eq!(attempts[0].server_response(), "OK");
    assert_eq!(attempts[0].owner_id(), owner.id());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_試行履歴は試行日時順で返る(pool: PgPool) {
    let owner = insert_user(&pool, "owner@example.com", UserRole::Member).await;
    let message = insert_message(&pool, owner.id()).await;
    let a = insert_recipient(&pool, owner.id(), "a@example.com").await;
    let b = insert_recipient(&pool, owner.id(), "b@example.com").await;
    let mailing = insert_mailing(&pool, owner.id(), message.id(), &[&a, &b], None).await;
    let sut = PostgresAttemptRepository::new(pool);
    let later = test_now() + Duration::seconds(3);

    sut.record(&Attempt::failed(&mailing, &b, "SMTP timeout", later))
        .await
        .unwrap();
    sut.record(&Attempt::success(&mailing, &a, test_now()))
        .await
        .unwrap();

    let attempts = sut.find_by_mailing(mailing.id()).await.unwrap();

    assert_eq!(
        attempts
            .iter()
            .map(|a| a.recipient_email().as_str())
            .collect::<Vec<_>>(),
        vec!["a@example.com", "b@example.com"]
    );
    assert_eq!(attempts[1].server_response(), "SMTP timeout");
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_受信者を削除しても試行履歴はスナップショットで残る(pool: PgPool) {
    let owner = insert_user(&pool, "owner@example.com", UserRole::Member).await;
    let message = insert_message(&pool, owner.id()).await;
    let r = insert_recipient(&pool, owner.id(), "gone@example.com").await;
    let mailing = insert_mailing(&pool, owner.id(), message.id(), &[&r], None).await;
    let sut = PostgresAttemptRepository::new(pool.clone());
    sut.record(&Attempt::success(&mailing, &r, test_now()))
        .await
        .unwrap();

    PostgresRecipientRepository::new(pool)
        .delete(r.id())
        .await
        .unwrap();

    let attempts = sut.find_by_mailing(mailing.id()).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].recipient_id(), None);
    assert_eq!(attempts[0].recipient_email().as_str(), "gone@example.com");
    assert_eq!(
        attempts[0].recipient_full_name().map(|n| n.as_str()),
        Some("山田 太郎")
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_トランザクション内で試行済みの受信者を取得できる(pool: PgPool) {
    let owner = insert_user(&pool, "owner@example.com", UserRole::Member).await;
    let message = insert_message(&pool, owner.id()).await;
    let a = insert_recipient(&pool, owner.id(), "a@example.com").await;
    let b = insert_recipient(&pool, owner.id(), "b@example.com").await;
    let mailing = insert_mailing(&pool, owner.id(), message.id(), &[&a, &b], None).await;
    let sut = PostgresAttemptRepository::new(pool.clone());
    sut.record(&Attempt::success(&mailing, &a, test_now()))
        .await
        .unwrap();
    let tx_manager = PgTransactionManager::new(pool);

    let mut tx = tx_manager.begin().await.unwrap();
    let inserted = sut
        .record_in_tx(&mut tx, &Attempt::failed(&mailing, &b, "停止", test_now()))
        .await
        .unwrap();
    let attempted = sut
        .find_attempted_recipient_ids_in_tx(&mut tx, mailing.id())
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert!(inserted);
    assert_eq!(attempted.len(), 2);
    assert!(attempted.contains(a.id()));
    assert!(attempted.contains(b.id()));
    assert_eq!(sut.find_by_mailing(mailing.id()).await.unwrap().len(), 2);
}
