//! 명령 레지스트리와 디스패처
//!
//! 기동 시 [`CommandRegistryBuilder::build`]가 모든 [`CommandKind`]에 핸들러가 있는지 확인합니다.
//! 디스패치는 배치를 명령 코드별로 나눠 각 핸들러에 자기 몫만 넘깁니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use log::{debug, error};

use super::handlers::{CommandHandler, RemoveRecordsHandler, SaveRecordsHandler, seal_client_secret};
use crate::domain::entities::{AuditEventRecord, AuthorizationRecord, ClientRecord, ConsentRecord};
use crate::domain::{CommandKind, EntityKind, MessageEnvelope, Settlement};
use crate::errors::RegistryError;
use crate::repositories::PersistencePort;
use crate::security::cipher::SecretCipher;

/// 엔티티별 영속화 포트 묶음
#[derive(Clone)]
pub struct PersistencePorts {
    pub clients: Arc<dyn PersistencePort<ClientRecord>>,
    pub authorizations: Arc<dyn PersistencePort<AuthorizationRecord>>,
    pub consents: Arc<dyn PersistencePort<ConsentRecord>>,
    pub audit_events: Arc<dyn PersistencePort<AuditEventRecord>>,
}

pub struct CommandRegistry {
    handlers: HashMap<CommandKind, Arc<dyn CommandHandler>>,
}

#[derive(Default)]
pub struct CommandRegistryBuilder {
    handlers: HashMap<CommandKind, Arc<dyn CommandHandler>>,
}

impl CommandRegistryBuilder {
    pub fn register(mut self, kind: CommandKind, handler: Arc<dyn CommandHandler>) -> Self {
        self.handlers.insert(kind, handler);
        self
    }

    /// 모든 명령에 기본 핸들러를 등록합니다. `client.save`는 저장 전에 비밀값을 봉인합니다.
    pub fn with_standard_handlers(self, ports: &PersistencePorts, cipher: Arc<dyn SecretCipher>) -> Self {
        self.register(
            CommandKind::SaveClient,
            Arc::new(
                SaveRecordsHandler::new(CommandKind::SaveClient, ports.clients.clone())
                    .with_prepare(seal_client_secret(cipher)),
            ),
        )
        .register(
            CommandKind::SaveAuthorization,
            Arc::new(SaveRecordsHandler::new(
                CommandKind::SaveAuthorization,
                ports.authorizations.clone(),
            )),
        )
        .register(
            CommandKind::RemoveAuthorization,
            Arc::new(RemoveRecordsHandler::new(
                CommandKind::RemoveAuthorization,
                ports.authorizations.clone(),
            )),
        )
        .register(
            CommandKind::SaveConsent,
            Arc::new(SaveRecordsHandler::new(CommandKind::SaveConsent, ports.consents.clone())),
        )
        .register(
            CommandKind::RemoveConsent,
            Arc::new(RemoveRecordsHandler::new(CommandKind::RemoveConsent, ports.consents.clone())),
        )
        .register(
            CommandKind::RecordAuditEvent,
            Arc::new(SaveRecordsHandler::new(
                CommandKind::RecordAuditEvent,
                ports.audit_events.clone(),
            )),
        )
    }

    /// # Errors
    ///
    /// * `RegistryError::MissingHandler` - 핸들러 없는 명령이 있음
    /// * `RegistryError::MismatchedHandler` - 다른 명령의 핸들러가 등록됨
    pub fn build(self) -> Result<CommandRegistry, RegistryError> {
        for kind in CommandKind::ALL {
            let handler = self
                .handlers
                .get(&kind)
                .ok_or(RegistryError::MissingHandler(kind))?;
            if handler.kind() != kind {
                return Err(RegistryError::MismatchedHandler {
                    registered: kind,
                    reported: handler.kind(),
                });
            }
        }

        Ok(CommandRegistry {
            handlers: self.handlers,
        })
    }
}

impl CommandRegistry {
    pub fn builder() -> CommandRegistryBuilder {
        CommandRegistryBuilder::default()
    }

    /// 배치를 명령 코드별로 나눠 해당 핸들러로 보냅니다.
    ///
    /// 알 수 없는 코드의 봉투와 `entity`가 아닌 다른 엔티티의 명령은
    /// 에러 로그와 함께 재큐잉 없이 nack 됩니다.
    /// 반환되는 결정 수는 입력 봉투 수와 같습니다.
    pub async fn dispatch(
        &self,
        entity: EntityKind,
        batch: Vec<MessageEnvelope>,
        timeout: Duration,
    ) -> Vec<Settlement> {
        let mut groups: Vec<(String, Vec<MessageEnvelope>)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for envelope in batch {
            match positions.get(&envelope.command_code) {
                Some(&index) => groups[index].1.push(envelope),
                None => {
                    positions.insert(envelope.command_code.clone(), groups.len());
                    groups.push((envelope.command_code.clone(), vec![envelope]));
                }
            }
        }

        let mut settlements = Vec::new();
        let mut commits = Vec::new();

        for (code, envelopes) in groups {
            let kind = CommandKind::from_code(&code);
            if let Some(kind) = kind.filter(|kind| kind.entity() != entity) {
                error!(
                    "다른 엔티티의 명령, 데드레터 처리 - entity: {}, command: {}, count: {}",
                    entity,
                    code,
                    envelopes.len()
                );
                settlements.extend(
                    envelopes
                        .into_iter()
                        .map(|envelope| Settlement::reject(envelope, Some(kind))),
                );
                continue;
            }

            match kind.and_then(|kind| self.handlers.get(&kind)) {
                Some(handler) => {
                    debug!("디스패치 - command: {}, batch: {}", code, envelopes.len());
                    commits.push(handler.commit(envelopes, timeout));
                }
                None => {
                    error!(
                        "알 수 없는 명령 코드, 데드레터 처리 - command: {}, count: {}",
                        code,
                        envelopes.len()
                    );
                    settlements.extend(
                        envelopes
                            .into_iter()
                            .map(|envelope| Settlement::reject(envelope, None)),
                    );
                }
            }
        }

        for committed in join_all(commits).await {
            settlements.extend(committed);
        }
        settlements
    }
}
