//! Client-side document replica.
//!
//! Committed state lives in [`DocumentStorage`]. Local edits are applied
//! optimistically as pending transactions layered on top of it until the
//! relay acks (commit) or nacks (rollback) them.
//!
//! ```text
//!  read ──► pending txs (newest first) ──► committed storage ──► default
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::core::CoreError;
use crate::message::{
    DocumentCommand, DocumentMaterial, DocumentMutation, DocumentSnapshot, ObjectId, ObjectKind,
    PropKey, PropKind, PropValue, Transaction, TransactionId,
};

const UNTITLED: &str = "Untitled";

/// Committed key-value document state.
#[derive(Debug, Clone)]
pub struct DocumentStorage {
    document_id: ObjectId,
    objects: HashMap<ObjectId, ObjectKind>,
    string_props: BTreeMap<PropKey, String>,
    float_props: BTreeMap<PropKey, f32>,
}

impl DocumentStorage {
    pub fn new() -> Self {
        Self::from_snapshot(DocumentSnapshot::default())
    }

    pub fn from_snapshot(snapshot: DocumentSnapshot) -> Self {
        let document_id = snapshot.document_id.unwrap_or_else(ObjectId::generate);
        let mut objects = HashMap::new();
        objects.insert(document_id.clone(), ObjectKind::Document);
        Self {
            document_id,
            objects,
            string_props: snapshot.string_props.into_iter().collect(),
            float_props: snapshot.float_props.into_iter().collect(),
        }
    }

    pub fn document_id(&self) -> &ObjectId {
        &self.document_id
    }

    pub fn snapshot(&self) -> DocumentSnapshot {
        DocumentSnapshot {
            document_id: Some(self.document_id.clone()),
            string_props: self
                .string_props
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            float_props: self.float_props.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        }
    }

    pub fn process(&mut self, tx: &Transaction) {
        for mutation in &tx.items {
            self.mutate(mutation);
        }
    }

    fn mutate(&mut self, mutation: &DocumentMutation) {
        match mutation {
            DocumentMutation::CreateObject(id, kind) => {
                self.objects.insert(id.clone(), *kind);
            }
            DocumentMutation::UpdateObject(key, PropValue::String(v)) => {
                self.string_props.insert(key.clone(), v.clone());
            }
            DocumentMutation::UpdateObject(key, PropValue::Float(v)) => {
                self.float_props.insert(key.clone(), *v);
            }
            DocumentMutation::DeleteObject(id) => {
                self.objects.remove(id);
                self.string_props.retain(|PropKey(owner, _), _| owner != id);
                self.float_props.retain(|PropKey(owner, _), _| owner != id);
            }
        }
    }

    pub fn get_string_prop(&self, key: &PropKey) -> Option<&str> {
        self.string_props.get(key).map(String::as_str)
    }

    pub fn has_object(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }
}

impl Default for DocumentStorage {
    fn default() -> Self {
        Self::new()
    }
}

/// Committed storage plus optimistic local transactions.
#[derive(Debug, Clone)]
pub struct ReplicaDocument {
    storage: DocumentStorage,
    pending: Vec<Transaction>,
}

impl ReplicaDocument {
    pub fn new(snapshot: DocumentSnapshot) -> Self {
        Self {
            storage: DocumentStorage::from_snapshot(snapshot),
            pending: Vec::new(),
        }
    }

    pub fn document_id(&self) -> &ObjectId {
        self.storage.document_id()
    }

    /// Translate a local command into a transaction against this document.
    pub fn transaction_for(&self, command: DocumentCommand) -> Transaction {
        match command {
            DocumentCommand::UpdateDocumentTitle { title } => {
                Transaction::new(vec![DocumentMutation::UpdateObject(
                    PropKey(self.document_id().clone(), PropKind::Title),
                    PropValue::String(title),
                )])
            }
        }
    }

    /// Apply a local transaction optimistically.
    pub fn begin(&mut self, tx: Transaction) -> BTreeSet<ObjectId> {
        log::debug!("Begin local transaction {}", tx.id);
        let invalidated = touched_objects(&tx);
        self.pending.push(tx);
        invalidated
    }

    /// Commit a transaction that originated elsewhere.
    pub fn apply_remote(&mut self, tx: &Transaction) -> BTreeSet<ObjectId> {
        log::debug!("Apply remote transaction {}", tx.id);
        self.storage.process(tx);
        touched_objects(tx)
    }

    pub fn ack(&mut self, tx_id: &TransactionId) -> Result<BTreeSet<ObjectId>, CoreError> {
        let tx = self.take_pending(tx_id)?;
        self.storage.process(&tx);
        Ok(touched_objects(&tx))
    }

    pub fn nack(&mut self, tx_id: &TransactionId) -> Result<BTreeSet<ObjectId>, CoreError> {
        let tx = self.take_pending(tx_id)?;
        log::info!("Rolled back local transaction {}", tx.id);
        Ok(touched_objects(&tx))
    }

    fn take_pending(&mut self, tx_id: &TransactionId) -> Result<Transaction, CoreError> {
        let pos = self
            .pending
            .iter()
            .position(|tx| tx.id == *tx_id)
            .ok_or(CoreError::UnknownTransaction(*tx_id))?;
        Ok(self.pending.remove(pos))
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn get_string_prop(&self, key: &PropKey) -> Option<&str> {
        for tx in self.pending.iter().rev() {
            for mutation in tx.items.iter().rev() {
                match mutation {
                    DocumentMutation::UpdateObject(k, PropValue::String(v)) if k == key => {
                        return Some(v.as_str());
                    }
                    DocumentMutation::DeleteObject(id) if *id == key.0 => return None,
                    _ => {}
                }
            }
        }
        self.storage.get_string_prop(key)
    }

    pub fn materialize(&self) -> DocumentMaterial {
        let id = self.document_id().clone();
        let title = self
            .get_string_prop(&PropKey(id.clone(), PropKind::Title))
            .unwrap_or(UNTITLED)
            .to_string();
        DocumentMaterial { id, title }
    }

    pub fn committed(&self) -> &DocumentStorage {
        &self.storage
    }
}

impl Default for ReplicaDocument {
    fn default() -> Self {
        Self::new(DocumentSnapshot::default())
    }
}

fn touched_objects(tx: &Transaction) -> BTreeSet<ObjectId> {
    tx.items.iter().map(|m| m.object_id().clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn title_command(title: &str) -> DocumentCommand {
        DocumentCommand::UpdateDocumentTitle {
            title: title.to_string(),
        }
    }

    #[test]
    fn test_default_title() {
        let doc = ReplicaDocument::default();
        assert_eq!(doc.materialize().title, "Untitled");
    }

    #[test]
    fn test_snapshot_seeds_document() {
        let id = ObjectId::new("doc-1");
        let doc = ReplicaDocument::new(DocumentSnapshot {
            document_id: Some(id.clone()),
            string_props: vec![(PropKey(id.clone(), PropKind::Title), "Board".into())],
            float_props: Vec::new(),
        });
        let material = doc.materialize();
        assert_eq!(material.id, id);
        assert_eq!(material.title, "Board");
        assert!(doc.committed().has_object(&id));
    }

    #[test]
    fn test_pending_overrides_committed_until_nack() {
        let mut doc = ReplicaDocument::default();
        let tx = doc.transaction_for(title_command("Draft"));
        let tx_id = tx.id;

        let invalidated = doc.begin(tx);
        assert!(invalidated.contains(doc.document_id()));
        assert_eq!(doc.materialize().title, "Draft");

        doc.nack(&tx_id).unwrap();
        assert_eq!(doc.materialize().title, "Untitled");
        assert_eq!(doc.pending_len(), 0);
    }

    #[test]
    fn test_ack_commits() {
        let mut doc = ReplicaDocument::default();
        let tx = doc.transaction_for(title_command("Final"));
        let tx_id = tx.id;
        doc.begin(tx);

        doc.ack(&tx_id).unwrap();
        assert_eq!(doc.pending_len(), 0);
        let key = PropKey(doc.document_id().clone(), PropKind::Title);
        assert_eq!(doc.committed().get_string_prop(&key), Some("Final"));
    }

    #[test]
    fn test_unknown_ack_is_error() {
        let mut doc = ReplicaDocument::default();
        let missing = uuid::Uuid::new_v4();
        assert!(matches!(
            doc.ack(&missing),
            Err(CoreError::UnknownTransaction(id)) if id == missing
        ));
    }

    #[test]
    fn test_latest_pending_wins() {
        let mut doc = ReplicaDocument::default();
        let first = doc.transaction_for(title_command("One"));
        let second = doc.transaction_for(title_command("Two"));
        doc.begin(first);
        doc.begin(second);
        assert_eq!(doc.materialize().title, "Two");
    }

    #[test]
    fn test_remote_transaction_commits_directly() {
        let mut doc = ReplicaDocument::default();
        let tx = doc.transaction_for(title_command("Theirs"));
        let invalidated = doc.apply_remote(&tx);
        assert_eq!(invalidated.len(), 1);
        assert_eq!(doc.materialize().title, "Theirs");
    }

    #[test]
    fn test_delete_object_drops_props() {
        let mut storage = DocumentStorage::new();
        let other = ObjectId::new("shape");
        let key = PropKey(other.clone(), PropKind::Title);
        storage.process(&Transaction::new(vec![
            DocumentMutation::CreateObject(other.clone(), ObjectKind::Document),
            DocumentMutation::UpdateObject(key.clone(), PropValue::String("x".into())),
        ]));
        assert_eq!(storage.get_string_prop(&key), Some("x"));

        storage.process(&Transaction::new(vec![DocumentMutation::DeleteObject(other.clone())]));
        assert!(!storage.has_object(&other));
        assert_eq!(storage.get_string_prop(&key), None);
    }

    #[test]
    fn test_storage_snapshot_roundtrip() {
        let mut storage = DocumentStorage::new();
        let key = PropKey(storage.document_id().clone(), PropKind::Title);
        storage.process(&Transaction::new(vec![DocumentMutation::UpdateObject(
            key.clone(),
            PropValue::String("Saved".into()),
        )]));
        let restored = DocumentStorage::from_snapshot(storage.snapshot());
        assert_eq!(restored.document_id(), storage.document_id());
        assert_eq!(restored.get_string_prop(&key), Some("Saved"));
    }
}
