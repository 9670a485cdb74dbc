//! # MongoDB 레코드 저장소
//!
//! 레코드는 `_id = record_id()` 인 문서로 저장됩니다.
//!
//! ## 멱등성
//!
//! - 저장은 `replace_one(upsert=true)` 이므로 재전달된 메시지가 같은 문서를 덮어씁니다.
//! - 삭제 대상 문서가 없으면 성공으로 봅니다.
//!
//! 배치 안의 레코드는 동시에 기록되며, 실패한 레코드 id만 모아 돌려줍니다.

use std::collections::HashSet;
use std::marker::PhantomData;

use async_trait::async_trait;
use futures_util::future::join_all;
use log::warn;
use mongodb::Collection;
use mongodb::bson::{Document, doc, from_document, to_document};

use super::{CredentialStore, PersistencePort};
use crate::db::Database;
use crate::domain::entities::{BatchRecord, ClientRecord};
use crate::errors::PersistenceError;

pub struct MongoRecordStore<R: BatchRecord> {
    collection: Collection<Document>,
    _record: PhantomData<fn() -> R>,
}

impl<R: BatchRecord> MongoRecordStore<R> {
    pub fn new(database: &Database) -> Self {
        Self {
            collection: database.get_database().collection::<Document>(R::COLLECTION),
            _record: PhantomData,
        }
    }

    async fn upsert(&self, record: &R) -> Result<(), PersistenceError> {
        let mut document =
            to_document(record).map_err(|e| PersistenceError::Serialization(e.to_string()))?;
        let id = record.record_id();
        document.insert("_id", id.clone());

        self.collection
            .replace_one(doc! { "_id": id }, document)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn find_one(&self, filter: Document) -> Result<Option<R>, PersistenceError> {
        let Some(document) = self.collection.find_one(filter).await? else {
            return Ok(None);
        };
        from_document::<R>(document)
            .map(Some)
            .map_err(|e| PersistenceError::Serialization(e.to_string()))
    }
}

#[async_trait]
impl<R: BatchRecord> PersistencePort<R> for MongoRecordStore<R> {
    async fn save_batch(&self, records: Vec<R>) -> Result<HashSet<String>, PersistenceError> {
        let results = join_all(records.iter().map(|record| self.upsert(record))).await;

        let mut failed = HashSet::new();
        for (record, result) in records.iter().zip(results) {
            if let Err(e) = result {
                let id = record.record_id();
                warn!(
                    "문서 저장 실패 - collection: {}, id: {}, reason: {}",
                    R::COLLECTION,
                    id,
                    e
                );
                failed.insert(id);
            }
        }
        Ok(failed)
    }

    async fn remove_batch(&self, ids: Vec<String>) -> Result<HashSet<String>, PersistenceError> {
        let deletes = ids.iter().map(|id| async move {
            self.collection.delete_one(doc! { "_id": id.as_str() }).await
        });
        let results = join_all(deletes).await;

        let mut failed = HashSet::new();
        for (id, result) in ids.into_iter().zip(results) {
            if let Err(e) = result {
                warn!(
                    "문서 삭제 실패 - collection: {}, id: {}, reason: {}",
                    R::COLLECTION,
                    id,
                    e
                );
                failed.insert(id);
            }
        }
        Ok(failed)
    }
}

#[async_trait]
impl CredentialStore for MongoRecordStore<ClientRecord> {
    async fn find_by_id(&self, id: &str) -> Result<Option<ClientRecord>, PersistenceError> {
        self.find_one(doc! { "_id": id }).await
    }

    async fn find_by_client_id(&self, client_id: &str) -> Result<Option<ClientRecord>, PersistenceError> {
        self.find_one(doc! { "client_id": client_id }).await
    }
}
