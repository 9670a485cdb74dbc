//! # Domain Layer Module
//!
//! 파이프라인과 자격증명 저장소가 공유하는 도메인 타입입니다.
//!
//! ```text
//! domain
//! ├── command     - 명령 코드(CommandKind)와 엔티티 종류(EntityKind)
//! ├── envelope    - 브로커 메시지 봉투와 ack/nack 정산
//! ├── entities    - MongoDB에 저장되는 레코드 (client, authorization, consent, audit)
//! └── credential  - 복호화된 등록 클라이언트와 공개용 요약
//! ```
//!
//! ## 레코드 흐름
//!
//! ```text
//! broker payload (JSON) ──serde──▶ ClientRecord ──seal_secret──▶ MongoDB
//!                                                                   │
//! ClientSummary ◀──summary── RegisteredClient ◀──decrypt── ClientRecord
//! ```
//!
//! 비밀값이 들어 있는 타입은 모두 `Debug` 출력에서 비밀값을 가립니다.

pub mod command;
pub mod credential;
pub mod entities;
pub mod envelope;

pub use command::{CommandKind, EntityKind};
pub use credential::{ClientSummary, RegisteredClient};
pub use entities::*;
pub use envelope::{Decision, MessageEnvelope, Settlement};
