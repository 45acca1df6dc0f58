//! ユースケース層の共通ヘルパー
//!
//! リポジトリ呼び出し結果の変換と、HTTP 経由の操作に対する権限チェックを共通化する。
//! 配信エンジンと停止エンジンは権限を確認しないため、チェックはここに集約する。

use mailflow_domain::{mailing::Mailing, user::User};
use mailflow_infra::InfraError;

use crate::error::ServiceError;

/// リポジトリの `Result<Option<T>, InfraError>` を `Result<T, ServiceError>` に変換する
///
/// ```ignore
/// let mailing = self.mailing_repo.find_by_id(&id).await.or_not_found("メール配信")?;
/// ```
pub(crate) trait FindResultExt<T> {
    /// `None` の場合は `ServiceError::NotFound`、`InfraError` の場合は `ServiceError::Database` を返す
    fn or_not_found(self, entity_name: &str) -> Result<T, ServiceError>;
}

impl<T> FindResultExt<T> for Result<Option<T>, InfraError> {
    fn or_not_found(self, entity_name: &str) -> Result<T, ServiceError> {
        self?
            .ok_or_else(|| ServiceError::NotFound(format!("{entity_name}が見つかりません")))
    }
}

/// 操作者がブロックされていないことを確認する
pub(crate) fn ensure_active(actor: &User) -> Result<(), ServiceError> {
    if actor.is_blocked() {
        return Err(ServiceError::Forbidden(
            "ブロックされたユーザーは操作できません".to_string(),
        ));
    }
    Ok(())
}

/// 操作者がメール配信の所有者であることを確認する
pub(crate) fn ensure_owner(actor: &User, mailing: &Mailing, action: &str) -> Result<(), ServiceError> {
    if mailing.owner_id() != actor.id() {
        return Err(ServiceError::Forbidden(format!(
            "このメール配信を{action}する権限がありません"
        )));
    }
    Ok(())
}

/// 操作者が所有者またはサービスマネージャーであることを確認する
pub(crate) fn ensure_owner_or_manager(
    actor: &User,
    mailing: &Mailing,
    action: &str,
) -> Result<(), ServiceError> {
    if !actor.can_view_owned_by(mailing.owner_id()) {
        return Err(ServiceError::Forbidden(format!(
            "このメール配信を{action}する権限がありません"
        )));
    }
    Ok(())
}

/// 操作者がサービスマネージャーであることを確認する
pub(crate) fn ensure_service_manager(actor: &User) -> Result<(), ServiceError> {
    if !actor.is_service_manager() {
        return Err(ServiceError::Forbidden(
            "サービスマネージャーのみ実行できます".to_string(),
        ));
    }
    Ok(())
}
