//! # UserRepository
//!
//! メール配信リソースの所有者の永続化を担当する。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailflow_domain::user::{Email, User, UserId, UserRole};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{InfraError, is_unique_violation};

/// ユーザーリポジトリトレイト
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// ユーザーを挿入する
    ///
    /// メールアドレスが重複する場合は Conflict を返す。
    async fn insert(&self, user: &User) -> Result<(), InfraError>;

    /// ID でユーザーを取得する
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, InfraError>;

    /// ブロック状態を更新する
    async fn update_blocked(&self, id: &UserId, is_blocked: bool) -> Result<(), InfraError>;
}

/// DB の users テーブルの行
#[derive(sqlx::FromRow)]
struct UserRow {
    id:         Uuid,
    email:      String,
    role:       String,
    is_blocked: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = InfraError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<UserRole>()
            .map_err(|e| InfraError::unexpected(format!("不正なロール {}: {e}", row.role)))?;
        Ok(User::from_db(
            UserId::from_uuid(row.id),
            Email::new(row.email)?,
            role,
            row.is_blocked,
            row.created_at,
        ))
    }
}

/// PostgreSQL 実装の UserRepository
#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(user_id = %user.id()))]
    async fn insert(&self, user: &User) -> Result<(), InfraError> {
        let role: &str = user.role().into();
        sqlx::query(
            r#"
            INSERT INTO users (id, email, role, is_blocked, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(user.id().as_uuid())
        .bind(user.email().as_str())
        .bind(role)
        .bind(user.is_blocked())
        .bind(user.created_at())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                InfraError::conflict("User", user.email().as_str())
            } else {
                e.into()
            }
        })?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, InfraError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, email, role, is_blocked, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id, is_blocked))]
    async fn update_blocked(&self, id: &UserId, is_blocked: bool) -> Result<(), InfraError> {
        sqlx::query("UPDATE users SET is_blocked = $1 WHERE id = $2")
            .bind(is_blocked)
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
