//! # 値オブジェクト
//!
//! 複数のエンティティから参照される検証済みの文字列型を定義する。

define_validated_string! {
    /// メッセージの件名（最大 250 文字）
    pub struct MessageSubject {
        label: "件名",
        max_length: 250,
    }
}

define_validated_string! {
    /// 受信者の氏名（最大 200 文字）
    pub struct RecipientName {
        label: "受信者名",
        max_length: 200,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::DomainError;

    #[test]
    fn test_件名は前後の空白が除去される() {
        let subject = MessageSubject::new("  お知らせ  ").unwrap();

        assert_eq!(subject.as_str(), "お知らせ");
    }

    #[test]
    fn test_空の件名はエラーになる() {
        let result = MessageSubject::new("   ");

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_件名は250文字ちょうどまで許容される() {
        assert!(MessageSubject::new("あ".repeat(250)).is_ok());
        assert!(MessageSubject::new("あ".repeat(251)).is_err());
    }

    #[test]
    fn test_受信者名は200文字を超えるとエラーになる() {
        let result = RecipientName::new("a".repeat(201));

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }
}
