//! 명령 코드와 엔티티 종류
//!
//! 브로커 메시지의 `command_code` 문자열은 닫힌 열거형 [`CommandKind`]로 해석됩니다.
//! 새 명령을 추가하면 `match`가 모두 컴파일 에러를 내므로 핸들러 누락을 놓칠 수 없습니다.

use std::fmt;

use serde::{Deserialize, Serialize};

/// 수집기를 선택하는 엔티티 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Client,
    Authorization,
    Consent,
    Audit,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Client,
        EntityKind::Authorization,
        EntityKind::Consent,
        EntityKind::Audit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Client => "client",
            EntityKind::Authorization => "authorization",
            EntityKind::Consent => "consent",
            EntityKind::Audit => "audit",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 영속화 명령 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    SaveClient,
    SaveAuthorization,
    RemoveAuthorization,
    SaveConsent,
    RemoveConsent,
    RecordAuditEvent,
}

impl CommandKind {
    pub const ALL: [CommandKind; 6] = [
        CommandKind::SaveClient,
        CommandKind::SaveAuthorization,
        CommandKind::RemoveAuthorization,
        CommandKind::SaveConsent,
        CommandKind::RemoveConsent,
        CommandKind::RecordAuditEvent,
    ];

    /// 메시지에 실리는 명령 코드
    pub fn code(self) -> &'static str {
        match self {
            CommandKind::SaveClient => "client.save",
            CommandKind::SaveAuthorization => "authorization.save",
            CommandKind::RemoveAuthorization => "authorization.remove",
            CommandKind::SaveConsent => "consent.save",
            CommandKind::RemoveConsent => "consent.remove",
            CommandKind::RecordAuditEvent => "audit.record",
        }
    }

    /// 알 수 없는 코드는 `None`
    pub fn from_code(code: &str) -> Option<Self> {
        CommandKind::ALL.into_iter().find(|kind| kind.code() == code)
    }

    pub fn entity(self) -> EntityKind {
        match self {
            CommandKind::SaveClient => EntityKind::Client,
            CommandKind::SaveAuthorization | CommandKind::RemoveAuthorization => {
                EntityKind::Authorization
            }
            CommandKind::SaveConsent | CommandKind::RemoveConsent => EntityKind::Consent,
            CommandKind::RecordAuditEvent => EntityKind::Audit,
        }
    }

    /// 커밋 성공 시 발행할 이벤트 타입
    pub fn created_event(self) -> Option<&'static str> {
        match self {
            CommandKind::SaveClient => Some("client.created"),
            _ => None,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_parsing_is_exhaustive() {
        for kind in CommandKind::ALL {
            assert_eq!(CommandKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(CommandKind::from_code("client.delete"), None);
        assert_eq!(CommandKind::from_code(""), None);
    }

    #[test]
    fn test_command_entity_mapping() {
        assert_eq!(CommandKind::SaveClient.entity(), EntityKind::Client);
        assert_eq!(CommandKind::RemoveAuthorization.entity(), EntityKind::Authorization);
        assert_eq!(CommandKind::RemoveConsent.entity(), EntityKind::Consent);
        assert_eq!(CommandKind::RecordAuditEvent.entity(), EntityKind::Audit);
    }

    #[test]
    fn test_only_client_save_emits_created_event() {
        let emitting: Vec<_> = CommandKind::ALL
            .into_iter()
            .filter(|kind| kind.created_event().is_some())
            .collect();

        assert_eq!(emitting, vec![CommandKind::SaveClient]);
    }
}
