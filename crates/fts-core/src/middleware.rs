//! Record-store middleware.
//!
//! [`FtsMiddleware`] wraps a record-store call: read-like actions get their
//! `where` filter rewritten before the call, write-like actions push the
//! returned record to the search providers after it.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Display;
use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use fts_types::{Filter, FtsError, MutationKind, PkSpec, Record};

use crate::consolidate::{sync_delete, sync_upsert};
use crate::provider::ProviderBinding;
use crate::rewrite::rewrite_filter;

/// Record-store operation being intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    FindMany,
    FindFirst,
    FindUnique,
    GroupBy,
    Count,
    Aggregate,
    Create,
    Update,
    Upsert,
    Delete,
    CreateMany,
    UpdateMany,
    DeleteMany,
}

impl Action {
    /// Actions whose `where` filter may carry markers.
    pub fn is_read(&self) -> bool {
        matches!(
            self,
            Action::FindMany | Action::FindFirst | Action::GroupBy | Action::Count | Action::Aggregate
        )
    }

    /// Mutation kind synced after this action, if any.
    pub fn mutation(&self) -> Option<MutationKind> {
        match self {
            Action::Create => Some(MutationKind::Create),
            Action::Update => Some(MutationKind::Update),
            Action::Upsert => Some(MutationKind::Upsert),
            Action::Delete => Some(MutationKind::Delete),
            _ => None,
        }
    }
}

/// Parameters of one record-store call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    pub model: Option<String>,
    pub action: Action,
    #[serde(default)]
    pub args: Value,
}

impl QueryParams {
    pub fn new(model: impl Into<String>, action: Action, args: Value) -> Self {
        Self {
            model: Some(model.into()),
            action,
            args,
        }
    }
}

/// Full-text configuration of one entity.
#[derive(Debug, Clone)]
pub struct EntityBinding {
    pub pk: PkSpec,
    pub columns: ProviderBinding,
    pub sync_on: BTreeSet<MutationKind>,
}

impl EntityBinding {
    pub fn new(pk: PkSpec, columns: ProviderBinding) -> Self {
        Self {
            pk,
            columns,
            sync_on: BTreeSet::new(),
        }
    }

    /// Sync documents on the given mutations (builder style).
    pub fn with_sync_on(mut self, kinds: impl IntoIterator<Item = MutationKind>) -> Self {
        self.sync_on.extend(kinds);
        self
    }
}

/// Middleware applying filter rewrite and document sync per entity.
#[derive(Debug, Clone, Default)]
pub struct FtsMiddleware {
    entities: HashMap<String, EntityBinding>,
}

impl FtsMiddleware {
    pub fn new(entities: HashMap<String, EntityBinding>) -> Self {
        Self { entities }
    }

    pub fn entity(&self, model: &str) -> Option<&EntityBinding> {
        self.entities.get(model)
    }

    fn binding_for(&self, params: &QueryParams) -> Option<&EntityBinding> {
        params.model.as_deref().and_then(|model| self.entity(model))
    }

    /// Rewrite `args.where` of a read-like call on a bound entity.
    pub async fn before(&self, params: &mut QueryParams) -> Result<(), FtsError> {
        if !params.action.is_read() {
            return Ok(());
        }
        let Some(entity) = self.binding_for(params) else {
            return Ok(());
        };
        let Some(raw) = params.args.get("where").filter(|w| w.is_object()) else {
            return Ok(());
        };

        let filter = Filter::from_json(raw)?;
        let rewritten = rewrite_filter(&entity.columns, &entity.pk, &filter).await?;

        debug!(
            model = ?params.model,
            action = ?params.action,
            "Rewrote where filter"
        );
        params.args["where"] = rewritten.to_json();
        Ok(())
    }

    /// Sync the record returned by a write-like call on a bound entity.
    pub async fn after(&self, params: &QueryParams, result: &Value) -> Result<(), FtsError> {
        let Some(kind) = params.action.mutation() else {
            return Ok(());
        };
        let Some(entity) = self.binding_for(params) else {
            return Ok(());
        };
        if !entity.sync_on.contains(&kind) {
            return Ok(());
        }

        let record: Record = match result {
            Value::Object(map) => map.clone(),
            _ => {
                return Err(FtsError::MissingPrimaryKey {
                    primary_key: entity.pk.field.clone(),
                })
            }
        };

        debug!(model = ?params.model, kind = kind.as_str(), "Syncing documents");
        match kind {
            MutationKind::Delete => sync_delete(&entity.columns, &record, &entity.pk).await,
            _ => sync_upsert(&entity.columns, &record, &entity.pk).await,
        }
    }

    /// Run a record-store call through the middleware.
    ///
    /// Store errors are surfaced as [`FtsError::Store`]; the returned record
    /// is passed back untouched.
    pub async fn handle<F, Fut, E>(&self, mut params: QueryParams, next: F) -> Result<Value, FtsError>
    where
        F: FnOnce(QueryParams) -> Fut,
        Fut: Future<Output = Result<Value, E>>,
        E: Display,
    {
        self.before(&mut params).await?;
        let snapshot = params.clone();
        let result = next(params).await.map_err(|e| FtsError::Store(e.to_string()))?;
        self.after(&snapshot, &result).await?;
        Ok(result)
    }
}
