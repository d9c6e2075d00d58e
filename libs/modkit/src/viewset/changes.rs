use async_trait::async_trait;
use sea_orm::{ConnectionTrait, DatabaseTransaction};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{represent, ModelViewSet, QueryPlan, SerializerContext};
use crate::api::ApiResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Update,
    Delete,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

/// One change log entry, written in the same transaction as the change.
#[derive(Debug, Clone)]
pub struct ObjectChange {
    pub action: ChangeAction,
    pub object_type: String,
    pub object_id: i64,
    pub object_repr: String,
    pub user_name: String,
    pub request_id: Option<String>,
    pub prechange_data: Option<Value>,
    pub postchange_data: Option<Value>,
}

#[async_trait]
pub trait ChangeRecorder: Send + Sync {
    async fn record(&self, txn: &DatabaseTransaction, change: ObjectChange) -> ApiResult<()>;
}

/// Full representation of `model` for the change log, or `None` when the
/// resource is not change-logged.
pub async fn snapshot<V, C>(
    vs: &V,
    conn: &C,
    model: &V::Model,
    ctx: &SerializerContext,
) -> ApiResult<Option<Value>>
where
    V: ModelViewSet,
    C: ConnectionTrait,
{
    if !vs.change_logged() {
        return Ok(None);
    }
    let ctx = ctx.with_plan(QueryPlan::full(vs));
    Ok(represent(vs, conn, vec![model.clone()], &ctx)
        .await?
        .into_iter()
        .next())
}

/// Build and record a change entry for a change-logged resource.
pub async fn record_change<V: ModelViewSet>(
    vs: &V,
    recorder: &dyn ChangeRecorder,
    txn: &DatabaseTransaction,
    action: ChangeAction,
    model: &V::Model,
    prechange: Option<Value>,
    ctx: &SerializerContext,
) -> ApiResult<()> {
    if !vs.change_logged() {
        return Ok(());
    }
    let postchange = match action {
        ChangeAction::Delete => None,
        ChangeAction::Create | ChangeAction::Update => snapshot(vs, txn, model, ctx).await?,
    };
    let change = ObjectChange {
        action,
        object_type: vs.content_type().label(),
        object_id: V::id_of(model),
        object_repr: vs.display(model),
        user_name: ctx.identity.username().to_string(),
        request_id: ctx.request_id.clone(),
        prechange_data: prechange,
        postchange_data: postchange,
    };
    tracing::debug!(
        action = action.as_str(),
        object_type = %change.object_type,
        object_id = change.object_id,
        "recording object change"
    );
    recorder.record(txn, change).await
}
