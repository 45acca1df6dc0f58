//! # メール配信（Mailing）
//!
//! 1 つのメッセージを受信者の集合に配信する単位。
//! ステータスは `created → launched → accomplished` の一方向にのみ遷移し、
//! `accomplished` は終端状態となる。
//!
//! 状態遷移は ADT で表現し、各状態で意味を持つ時刻だけを保持させる。
//!
//! | 状態 | scheduled_at | first_sent_at | completed_at |
//! |------|--------------|---------------|--------------|
//! | Created | 任意 | なし | なし |
//! | Launched | - | あり | なし |
//! | Accomplished | - | あり | あり |
//!
//! 並行実行される複数のトリガー（HTTP、CLI、スケジューラ）の排他は
//! 永続化層の条件付き更新で行う。ここでの遷移メソッドは遷移規則の
//! 単一の定義であり、インメモリ実装もこれを用いる。

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{DomainError, message::MessageId, recipient::RecipientId, user::UserId};

define_uuid_id! {
    /// メール配信 ID
    pub struct MailingId;
}

/// メール配信ステータス
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MailingStatus {
    /// 作成済み（未配信）
    Created,
    /// 配信中（配信権を獲得済み）
    Launched,
    /// 完了（終端）
    Accomplished,
}

/// メール配信の状態（ADT ベースステートマシン）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailingState {
    Created(CreatedState),
    Launched(LaunchedState),
    Accomplished(AccomplishedState),
}

/// Created 状態の固有フィールド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedState {
    /// 配信予定日時（スケジューラが参照する）
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Launched 状態の固有フィールド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedState {
    /// 初回送信日時
    pub first_sent_at: DateTime<Utc>,
}

/// Accomplished 状態の固有フィールド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccomplishedState {
    /// 初回送信日時
    pub first_sent_at: DateTime<Utc>,
    /// 完了日時
    pub completed_at:  DateTime<Utc>,
}

/// メール配信エンティティ
///
/// 共通フィールドを外側に、状態固有フィールドを `state` に分離する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mailing {
    id:            MailingId,
    owner_id:      UserId,
    message_id:    MessageId,
    recipient_ids: Vec<RecipientId>,
    created_at:    DateTime<Utc>,
    state:         MailingState,
}

/// メール配信の新規作成パラメータ
pub struct NewMailing {
    pub id:            MailingId,
    pub owner_id:      UserId,
    pub message_id:    MessageId,
    pub recipient_ids: Vec<RecipientId>,
    pub scheduled_at:  Option<DateTime<Utc>>,
    pub now:           DateTime<Utc>,
}

/// メール配信の DB 復元パラメータ
///
/// DB スキーマのフラット構造を表現する。`from_db()` で不変条件を検証して ADT に変換する。
pub struct MailingRecord {
    pub id:            MailingId,
    pub owner_id:      UserId,
    pub message_id:    MessageId,
    pub recipient_ids: Vec<RecipientId>,
    pub status:        MailingStatus,
    pub scheduled_at:  Option<DateTime<Utc>>,
    pub first_sent_at: Option<DateTime<Utc>>,
    pub completed_at:  Option<DateTime<Utc>>,
    pub created_at:    DateTime<Utc>,
}

impl Mailing {
    /// 新しいメール配信を作成する（Created 状態）
    ///
    /// 受信者は集合として扱い、重複は最初の出現のみを残す。
    pub fn new(params: NewMailing) -> Self {
        Self {
            id:            params.id,
            owner_id:      params.owner_id,
            message_id:    params.message_id,
            recipient_ids: dedup_recipients(params.recipient_ids),
            created_at:    params.now,
            state:         MailingState::Created(CreatedState {
                scheduled_at: params.scheduled_at,
            }),
        }
    }

    /// 既存のデータから復元する
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: ステータスと時刻の組み合わせが不変条件に違反する場合
    pub fn from_db(record: MailingRecord) -> Result<Self, DomainError> {
        let state = match record.status {
            MailingStatus::Created => {
                if record.first_sent_at.is_some() || record.completed_at.is_some() {
                    return Err(DomainError::Validation(
                        "Created メール配信は first_sent_at と completed_at を持てません"
                            .to_string(),
                    ));
                }
                MailingState::Created(CreatedState {
                    scheduled_at: record.scheduled_at,
                })
            }
            MailingStatus::Launched => {
                let first_sent_at = record.first_sent_at.ok_or_else(|| {
                    DomainError::Validation(
                        "Launched メール配信には first_sent_at が必要です".to_string(),
                    )
                })?;
                if record.completed_at.is_some() {
                    return Err(DomainError::Validation(
                        "Launched メール配信は completed_at を持てません".to_string(),
                    ));
                }
                MailingState::Launched(LaunchedState { first_sent_at })
            }
            MailingStatus::Accomplished => {
                let first_sent_at = record.first_sent_at.ok_or_else(|| {
                    DomainError::Validation(
                        "Accomplished メール配信には first_sent_at が必要です".to_string(),
                    )
                })?;
                let completed_at = record.completed_at.ok_or_else(|| {
                    DomainError::Validation(
                        "Accomplished メール配信には completed_at が必要です".to_string(),
                    )
                })?;
                MailingState::Accomplished(AccomplishedState {
                    first_sent_at,
                    completed_at,
                })
            }
        };

        Ok(Self {
            id: record.id,
            owner_id: record.owner_id,
            message_id: record.message_id,
            recipient_ids: dedup_recipients(record.recipient_ids),
            created_at: record.created_at,
            state,
        })
    }

    // Getter メソッド

    pub fn id(&self) -> &MailingId {
        &self.id
    }

    pub fn owner_id(&self) -> &UserId {
        &self.owner_id
    }

    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    pub fn recipient_ids(&self) -> &[RecipientId] {
        &self.recipient_ids
    }

    pub fn has_recipients(&self) -> bool {
        !self.recipient_ids.is_empty()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> &MailingState {
        &self.state
    }

    pub fn status(&self) -> MailingStatus {
        match &self.state {
            MailingState::Created(_) => MailingStatus::Created,
            MailingState::Launched(_) => MailingStatus::Launched,
            MailingState::Accomplished(_) => MailingStatus::Accomplished,
        }
    }

    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            MailingState::Created(s) => s.scheduled_at,
            _ => None,
        }
    }

    pub fn first_sent_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            MailingState::Created(_) => None,
            MailingState::Launched(s) => Some(s.first_sent_at),
            MailingState::Accomplished(s) => Some(s.first_sent_at),
        }
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            MailingState::Accomplished(s) => Some(s.completed_at),
            _ => None,
        }
    }

    /// スケジューラによる配信対象か（Created かつ予定日時が現在以前）
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        matches!(
            &self.state,
            MailingState::Created(CreatedState {
                scheduled_at: Some(at),
            }) if *at <= now
        )
    }

    /// 試行記録のない受信者を抽出する
    ///
    /// 停止時の失敗記録の補完対象を求めるために使う。
    pub fn recipients_without_attempt<'a>(
        &'a self,
        attempted: &HashSet<RecipientId>,
    ) -> Vec<&'a RecipientId> {
        self.recipient_ids
            .iter()
            .filter(|id| !attempted.contains(id))
            .collect()
    }

    // 状態遷移メソッド

    /// 配信権を獲得して Launched に遷移する
    ///
    /// # Errors
    ///
    /// Created 以外の場合は `DomainError::Conflict` を返す。
    pub fn launched(self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            MailingState::Created(_) => Ok(Self {
                state: MailingState::Launched(LaunchedState { first_sent_at: now }),
                ..self
            }),
            _ => Err(DomainError::Conflict(format!(
                "メール配信は既に開始されています（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 配信を完了して Accomplished に遷移する
    ///
    /// 全受信者への送信完了時と、停止時の両方で使われる。
    ///
    /// # Errors
    ///
    /// Launched 以外の場合は `DomainError::Conflict` を返す。
    pub fn accomplished(self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            MailingState::Launched(LaunchedState { first_sent_at }) => Ok(Self {
                state: MailingState::Accomplished(AccomplishedState {
                    first_sent_at,
                    completed_at: now,
                }),
                ..self
            }),
            _ => Err(DomainError::Conflict(format!(
                "配信中ではないメール配信は完了できません（現在: {}）",
                self.status()
            ))),
        }
    }

    /// 配信予定日時を設定する
    ///
    /// # Errors
    ///
    /// Created 以外の場合は `DomainError::Conflict` を返す。
    pub fn scheduled(self, at: DateTime<Utc>) -> Result<Self, DomainError> {
        match self.state {
            MailingState::Created(_) => Ok(Self {
                state: MailingState::Created(CreatedState {
                    scheduled_at: Some(at),
                }),
                ..self
            }),
            _ => Err(DomainError::Conflict(format!(
                "開始済みのメール配信は予約できません（現在: {}）",
                self.status()
            ))),
        }
    }
}

fn dedup_recipients(ids: Vec<RecipientId>) -> Vec<RecipientId> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[fixture]
    fn mailing(now: DateTime<Utc>) -> Mailing {
        Mailing::new(NewMailing {
            id: MailingId::new(),
            owner_id: UserId::new(),
            message_id: MessageId::new(),
            recipient_ids: vec![RecipientId::new(), RecipientId::new()],
            scheduled_at: None,
            now,
        })
    }

    fn ts() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn record(
        status: MailingStatus,
        first_sent_at: Option<DateTime<Utc>>,
        completed_at: Option<DateTime<Utc>>,
    ) -> MailingRecord {
        MailingRecord {
            id: MailingId::new(),
            owner_id: UserId::new(),
            message_id: MessageId::new(),
            recipient_ids: vec![],
            status,
            scheduled_at: None,
            first_sent_at,
            completed_at,
            created_at: ts(),
        }
    }

    #[rstest]
    fn test_新規作成時はcreatedで時刻を持たない(mailing: Mailing) {
        assert_eq!(mailing.status(), MailingStatus::Created);
        assert_eq!(mailing.first_sent_at(), None);
        assert_eq!(mailing.completed_at(), None);
    }

    #[rstest]
    fn test_受信者の重複は除去される(now: DateTime<Utc>) {
        let r = RecipientId::new();
        let mailing = Mailing::new(NewMailing {
            id: MailingId::new(),
            owner_id: UserId::new(),
            message_id: MessageId::new(),
            recipient_ids: vec![r.clone(), r.clone(), RecipientId::new()],
            scheduled_at: None,
            now,
        });

        assert_eq!(mailing.recipient_ids().len(), 2);
        assert_eq!(mailing.recipient_ids()[0], r);
    }

    #[rstest]
    fn test_launchedへの遷移で初回送信日時が設定される(mailing: Mailing, now: DateTime<Utc>) {
        let sent_at = now + Duration::minutes(5);

        let launched = mailing.launched(sent_at).unwrap();

        assert_eq!(launched.status(), MailingStatus::Launched);
        assert_eq!(launched.first_sent_at(), Some(sent_at));
        assert_eq!(launched.completed_at(), None);
    }

    #[rstest]
    fn test_launchedから再度launchedにはできない(mailing: Mailing, now: DateTime<Utc>) {
        let launched = mailing.launched(now).unwrap();

        let result = launched.launched(now);

        assert!(matches!(result, Err(DomainError::Conflict(_))));
    }

    #[rstest]
    fn test_accomplishedへの遷移で初回送信日時を保持したまま完了日時が設定される(
        mailing: Mailing,
        now: DateTime<Utc>,
    ) {
        let done_at = now + Duration::minutes(3);

        let done = mailing
            .launched(now)
            .unwrap()
            .accomplished(done_at)
            .unwrap();

        assert_eq!(done.status(), MailingStatus::Accomplished);
        assert_eq!(done.first_sent_at(), Some(now));
        assert_eq!(done.completed_at(), Some(done_at));
    }

    #[rstest]
    fn test_createdから直接accomplishedにはできない(mailing: Mailing, now: DateTime<Utc>) {
        let result = mailing.accomplished(now);

        assert!(matches!(result, Err(DomainError::Conflict(_))));
    }

    #[rstest]
    fn test_accomplishedは終端で再配信できない(mailing: Mailing, now: DateTime<Utc>) {
        let done = mailing.launched(now).unwrap().accomplished(now).unwrap();

        assert!(done.clone().launched(now).is_err());
        assert!(done.clone().accomplished(now).is_err());
        assert!(done.scheduled(now).is_err());
    }

    #[rstest]
    fn test_予約日時を過ぎたcreatedのみ配信対象になる(mailing: Mailing, now: DateTime<Utc>) {
        assert!(!mailing.is_due(now));

        let scheduled = mailing.scheduled(now).unwrap();
        assert!(scheduled.is_due(now));
        assert!(!scheduled.is_due(now - Duration::seconds(1)));

        let launched = scheduled.launched(now).unwrap();
        assert!(!launched.is_due(now + Duration::days(1)));
    }

    #[rstest]
    fn test_試行記録のない受信者のみ抽出される(mailing: Mailing) {
        let attempted: HashSet<RecipientId> = [mailing.recipient_ids()[0].clone()].into();

        let remaining = mailing.recipients_without_attempt(&attempted);

        assert_eq!(remaining, vec![&mailing.recipient_ids()[1]]);
    }

    #[rstest]
    #[case(MailingStatus::Created, None, None, true)]
    #[case(MailingStatus::Created, Some(ts()), None, false)]
    #[case(MailingStatus::Launched, Some(ts()), None, true)]
    #[case(MailingStatus::Launched, None, None, false)]
    #[case(MailingStatus::Launched, Some(ts()), Some(ts()), false)]
    #[case(MailingStatus::Accomplished, Some(ts()), Some(ts()), true)]
    #[case(MailingStatus::Accomplished, Some(ts()), None, false)]
    #[case(MailingStatus::Accomplished, None, Some(ts()), false)]
    fn test_from_dbは状態ごとの時刻の不変条件を検証する(
        #[case] status: MailingStatus,
        #[case] first_sent_at: Option<DateTime<Utc>>,
        #[case] completed_at: Option<DateTime<Utc>>,
        #[case] valid: bool,
    ) {
        let result = Mailing::from_db(record(status, first_sent_at, completed_at));

        assert_eq!(result.is_ok(), valid);
    }

    #[test]
    fn test_ステータスは文字列と相互変換できる() {
        assert_eq!(MailingStatus::Accomplished.to_string(), "accomplished");
        assert_eq!(
            "launched".parse::<MailingStatus>().unwrap(),
            MailingStatus::Launched
        );
        assert!("unknown".parse::<MailingStatus>().is_err());
    }
}
