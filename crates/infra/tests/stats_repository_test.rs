//! StatsRepository 統合テスト
//!
//! 実行方法:
//! ```bash
//! cargo test -p mailflow-infra --test stats_repository_test
//! ```

mod common;

use common::{insert_mailing, insert_message, insert_recipient, insert_user, test_now};
use mailflow_domain::{attempt::Attempt, user::UserRole};
use mailflow_infra::repository::{
    AttemptRepository,
    MailingRepository,
    MailingStats,
    PostgresAttemptRepository,
    PostgresMailingRepository,
    PostgresStatsRepository,
    StatsRepository,
};
use pretty_assertions::assert_eq;
use sqlx::PgPool;

#[sqlx::test(migrations = "../../migrations")]
async fn test_所有者の配信統計を集計できる(pool: PgPool) {
    let owner = insert_user(&pool, "owner@example.com", UserRole::Member).await;
    let message = insert_message(&pool, owner.id()).await;
    let a = insert_recipient(&pool, owner.id(), "a@example.com").await;
    let b = insert_recipient(&pool, owner.id(), "b@example.com").await;
    let active = insert_mailing(&pool, owner.id(), message.id(), &[&a, &b], None).await;
    let _idle = insert_mailing(&pool, owner.id(), message.id(), &[&a], None).await;
    PostgresMailingRepository::new(pool.clone())
        .try_claim(active.id(), test_now())
        .await
        .unwrap();
    let attempts = PostgresAttemptRepository::new(pool.clone());
    attempts
        .record(&Attempt::success(&active, &a, test_now()))
        .await
        .unwrap();
    attempts
        .record(&Attempt::failed(&active, &b, "SMTP timeout", test_now()))
        .await
        .unwrap();
    let sut = PostgresStatsRepository::new(pool);

    let stats = sut.mailing_stats(owner.id()).await.unwrap();

    assert_eq!(
        stats,
        MailingStats {
            total_mailings:       2,
            active_mailings:      1,
            active_recipients:    2,
            recipients:           2,
            successful_attempts:  1,
            failed_attempts:      1,
            unique_sent_mailings: 1,
        }
    );
    assert_eq!(stats.total_sent(), 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_メール配信のない所有者の統計はすべて0(pool: PgPool) {
    let owner = insert_user(&pool, "owner@example.com", UserRole::Member).await;
    let sut = PostgresStatsRepository::new(pool);

    let stats = sut.mailing_stats(owner.id()).await.unwrap();

    assert_eq!(stats, MailingStats::default());
}
