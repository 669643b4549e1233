//! In-memory resource store for integration tests
//!
//! Behaves like a tiny API server: objects get a uid and a resourceVersion,
//! every write bumps the version, and a merge patch carrying a stale
//! `metadata.resourceVersion` is rejected with a conflict.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Service;
use kube::ResourceExt;
use serde_json::{json, Value};

use minio_operator::assets::BaselineTemplate;
use minio_operator::controller::{Context, ObjectKey, OperandKind, ResourceStore};
use minio_operator::crd::{Minio, MinioSpec, MinioStatus};
use minio_operator::Error;

/// A write observed by the store
#[derive(Clone, Debug, PartialEq)]
pub enum Write {
    Create(OperandKind, String),
    Patch(OperandKind, String, Value),
    Status(String, MinioStatus),
}

#[derive(Default)]
struct State {
    minios: HashMap<(String, String), Minio>,
    operands: HashMap<(OperandKind, String, String), Value>,
    writes: Vec<Write>,
    version: u64,
    fail_operand_writes: bool,
    fail_status_writes: bool,
    race_next_patch: bool,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

pub fn api_error(code: u16, reason: &str, message: &str) -> Error {
    Error::Kube(kube::Error::Api(kube::error::ErrorResponse {
        status: "Failure".to_string(),
        message: message.to_string(),
        reason: reason.to_string(),
        code,
    }))
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store a Minio as if a user had created it, returning the stored copy
    pub fn create_minio(&self, namespace: &str, name: &str, spec: MinioSpec) -> Minio {
        let mut state = self.state.lock().unwrap();
        let mut minio = Minio::new(name, spec);
        minio.metadata.namespace = Some(namespace.to_string());
        minio.metadata.uid = Some(format!("uid-{namespace}-{name}"));
        minio.metadata.generation = Some(1);
        minio.metadata.resource_version = Some(state.next_version());
        state
            .minios
            .insert((namespace.to_string(), name.to_string()), minio.clone());
        minio
    }

    /// Replace the spec of a stored Minio, bumping its generation
    pub fn update_minio_spec(&self, namespace: &str, name: &str, spec: MinioSpec) {
        let mut state = self.state.lock().unwrap();
        let version = state.next_version();
        let minio = state
            .minios
            .get_mut(&(namespace.to_string(), name.to_string()))
            .expect("minio exists");
        minio.spec = spec;
        minio.metadata.generation = minio.metadata.generation.map(|g| g + 1);
        minio.metadata.resource_version = Some(version);
    }

    pub fn delete_minio(&self, namespace: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .minios
            .remove(&(namespace.to_string(), name.to_string()));
    }

    pub fn minio(&self, namespace: &str, name: &str) -> Option<Minio> {
        let state = self.state.lock().unwrap();
        state
            .minios
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn deployment(&self, namespace: &str, name: &str) -> Option<Deployment> {
        self.operand(OperandKind::Deployment, namespace, name)
            .map(|v| serde_json::from_value(v).expect("stored deployment parses"))
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<Service> {
        self.operand(OperandKind::Service, namespace, name)
            .map(|v| serde_json::from_value(v).expect("stored service parses"))
    }

    pub fn operand(&self, kind: OperandKind, namespace: &str, name: &str) -> Option<Value> {
        let state = self.state.lock().unwrap();
        state
            .operands
            .get(&(kind, namespace.to_string(), name.to_string()))
            .cloned()
    }

    /// Modify an operand as another actor would, bumping its version
    pub fn foreign_patch(&self, kind: OperandKind, namespace: &str, name: &str, patch: Value) {
        let mut state = self.state.lock().unwrap();
        let version = state.next_version();
        let object = state
            .operands
            .get_mut(&(kind, namespace.to_string(), name.to_string()))
            .expect("operand exists");
        json_patch::merge(object, &patch);
        object["metadata"]["resourceVersion"] = json!(version);
    }

    pub fn writes(&self) -> Vec<Write> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn clear_writes(&self) {
        self.state.lock().unwrap().writes.clear();
    }

    pub fn operand_writes(&self) -> Vec<Write> {
        self.writes()
            .into_iter()
            .filter(|w| !matches!(w, Write::Status(..)))
            .collect()
    }

    pub fn fail_operand_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_operand_writes = fail;
    }

    pub fn fail_status_writes(&self, fail: bool) {
        self.state.lock().unwrap().fail_status_writes = fail;
    }

    /// Let another writer update the object right before the next patch lands
    pub fn race_next_patch(&self) {
        self.state.lock().unwrap().race_next_patch = true;
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get_minio(&self, namespace: &str, name: &str) -> Result<Option<Minio>, Error> {
        Ok(self.minio(namespace, name))
    }

    async fn list_minios(&self, namespace: Option<String>) -> Result<Vec<Minio>, Error> {
        let state = self.state.lock().unwrap();
        Ok(state
            .minios
            .values()
            .filter(|m| namespace.is_none() || m.namespace() == namespace)
            .cloned()
            .collect())
    }

    async fn update_minio_status(
        &self,
        namespace: &str,
        name: &str,
        status: &MinioStatus,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_status_writes {
            return Err(api_error(500, "InternalError", "status write rejected"));
        }
        let version = state.next_version();
        let minio = state
            .minios
            .get_mut(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| api_error(404, "NotFound", "minio not found"))?;
        minio.status = Some(status.clone());
        minio.metadata.resource_version = Some(version);
        state
            .writes
            .push(Write::Status(name.to_string(), status.clone()));
        Ok(())
    }

    async fn get_operand(
        &self,
        kind: OperandKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Value>, Error> {
        Ok(self.operand(kind, namespace, name))
    }

    async fn create_operand(
        &self,
        kind: OperandKind,
        namespace: &str,
        object: &Value,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_operand_writes {
            return Err(api_error(500, "InternalError", "operand write rejected"));
        }
        let name = object["metadata"]["name"]
            .as_str()
            .ok_or_else(|| Error::validation("object has no name"))?
            .to_string();
        let key = (kind, namespace.to_string(), name.clone());
        if state.operands.contains_key(&key) {
            return Err(api_error(409, "AlreadyExists", "object already exists"));
        }

        let version = state.next_version();
        let mut stored = object.clone();
        stored["metadata"]["resourceVersion"] = json!(version);
        stored["metadata"]["uid"] = json!(format!("{kind}-{namespace}-{name}"));
        state.operands.insert(key, stored);
        state.writes.push(Write::Create(kind, name));
        Ok(())
    }

    async fn patch_operand(
        &self,
        kind: OperandKind,
        namespace: &str,
        name: &str,
        patch: &Value,
    ) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_operand_writes {
            return Err(api_error(500, "InternalError", "operand write rejected"));
        }
        let key = (kind, namespace.to_string(), name.to_string());
        if std::mem::take(&mut state.race_next_patch) {
            let version = state.next_version();
            if let Some(object) = state.operands.get_mut(&key) {
                object["metadata"]["resourceVersion"] = json!(version);
            }
        }

        let version = state.next_version();
        let object = state
            .operands
            .get_mut(&key)
            .ok_or_else(|| api_error(404, "NotFound", "object not found"))?;
        if let Some(expected) = patch["metadata"]["resourceVersion"].as_str() {
            if object["metadata"]["resourceVersion"].as_str() != Some(expected) {
                return Err(api_error(
                    409,
                    "Conflict",
                    "the object has been modified; please apply your changes to the latest version and try again",
                ));
            }
        }
        json_patch::merge(object, patch);
        object["metadata"]["resourceVersion"] = json!(version);
        state
            .writes
            .push(Write::Patch(kind, name.to_string(), patch.clone()));
        Ok(())
    }
}

pub fn spec(user: &str, password: &str) -> MinioSpec {
    MinioSpec {
        user: user.to_string(),
        password: password.to_string(),
        force_redeploy: None,
    }
}

pub fn context(store: &Arc<InMemoryStore>) -> Context {
    let template = BaselineTemplate::embedded().expect("embedded manifests are valid");
    context_with(store, template)
}

pub fn context_with(store: &Arc<InMemoryStore>, template: BaselineTemplate) -> Context {
    let store: Arc<dyn ResourceStore> = store.clone();
    Context::new(store, Arc::new(template))
}

pub fn key(namespace: &str, name: &str) -> ObjectKey {
    ObjectKey::new(namespace, name)
}

/// Env values of the first container, in order
pub fn env_values(deployment: &Deployment) -> Vec<String> {
    deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.spec.as_ref())
        .and_then(|pod| pod.containers.first())
        .and_then(|c| c.env.clone())
        .unwrap_or_default()
        .into_iter()
        .map(|e| e.value.unwrap_or_default())
        .collect()
}
