use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    EntityTrait, QueryFilter, QueryOrder, Select,
};
use serde_json::{Map, Value};

use extras::{clear_tags, resolve_tags, set_tags, tags_for};
use modkit::api::ApiResult;
use modkit::viewset::custom_fields::{clean_custom_fields, render_custom_fields};
use modkit::viewset::query::{filter_by_fk, filter_by_name};
use modkit::viewset::validators::taken;
use modkit::viewset::{ContentType, FieldErrors, ModelViewSet, ObjectFilter, SerializerContext};

use super::dto::{
    NestedTenantGroup, TenantCreate, TenantDto, TenantGroupCreate, TenantGroupDto,
    TenantGroupUpdate, TenantUpdate,
};
use crate::domain::groups::{
    check_parent, cumulative_tenant_counts, delete_subtree, resolve_group, resync_depths,
};
use crate::domain::relations::{TenantRelations, RELATED_COUNT_FIELDS};
use crate::infra::storage::entity::{tenant, tenant_group};

pub const TENANTS_PATH: &str = "/api/tenancy/tenants/";
pub const TENANT_GROUPS_PATH: &str = "/api/tenancy/tenant-groups/";

pub const TENANT: ContentType = ContentType::new("tenancy", "tenant");
pub const TENANT_GROUP: ContentType = ContentType::new("tenancy", "tenantgroup");

fn check_named(errors: &mut FieldErrors, name: &str, slug: &str, description: &str) {
    errors.required("name", name);
    errors.max_len("name", name, 100);
    errors.required("slug", slug);
    errors.max_len("slug", slug, 100);
    errors.slug("slug", slug);
    errors.max_len("description", description, 200);
}

fn nested_group(m: &tenant_group::Model, ctx: &SerializerContext) -> NestedTenantGroup {
    NestedTenantGroup {
        id: m.id,
        url: ctx.url(TENANT_GROUPS_PATH, m.id),
        name: m.name.clone(),
        slug: m.slug.clone(),
        depth: m.depth,
    }
}

async fn groups_by_id<C: ConnectionTrait>(
    conn: &C,
    ids: impl IntoIterator<Item = i64>,
) -> ApiResult<HashMap<i64, tenant_group::Model>> {
    let mut ids: Vec<i64> = ids.into_iter().collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    ids.sort_unstable();
    ids.dedup();
    Ok(tenant_group::Entity::find()
        .filter(tenant_group::Column::Id.is_in(ids))
        .all(conn)
        .await?
        .into_iter()
        .map(|g| (g.id, g))
        .collect())
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}

// ------------------------------------------------------------- tenants

pub struct TenantViewSet {
    relations: Arc<dyn TenantRelations>,
}

impl TenantViewSet {
    pub fn new(relations: Arc<dyn TenantRelations>) -> Self {
        Self { relations }
    }

    async fn check_unique(
        &self,
        txn: &DatabaseTransaction,
        m: &tenant::Model,
        exclude: Option<i64>,
        errors: &mut FieldErrors,
    ) -> ApiResult<()> {
        if !errors.has("name")
            && taken::<tenant::Entity, _, _>(
                txn,
                tenant::Column::Name,
                m.name.clone(),
                tenant::Column::Id,
                exclude,
            )
            .await?
        {
            errors.push("name", "tenant with this name already exists.");
        }
        if !errors.has("slug")
            && taken::<tenant::Entity, _, _>(
                txn,
                tenant::Column::Slug,
                m.slug.clone(),
                tenant::Column::Id,
                exclude,
            )
            .await?
        {
            errors.push("slug", "tenant with this slug already exists.");
        }
        Ok(())
    }
}

#[async_trait]
impl ModelViewSet for TenantViewSet {
    type Entity = tenant::Entity;
    type Model = tenant::Model;
    type Full = TenantDto;
    type Create = TenantCreate;
    type Update = TenantUpdate;

    fn content_type(&self) -> ContentType {
        TENANT
    }

    fn base_path(&self) -> &'static str {
        TENANTS_PATH
    }

    fn verbose_name_plural(&self) -> &'static str {
        "tenants"
    }

    fn id_of(m: &tenant::Model) -> i64 {
        m.id
    }

    fn id_column() -> tenant::Column {
        tenant::Column::Id
    }

    fn constraint_column(&self, attr: &str) -> Option<tenant::Column> {
        match attr {
            "id" => Some(tenant::Column::Id),
            "name" => Some(tenant::Column::Name),
            "slug" => Some(tenant::Column::Slug),
            "group_id" => Some(tenant::Column::GroupId),
            _ => None,
        }
    }

    fn annotations(&self) -> &'static [&'static str] {
        &RELATED_COUNT_FIELDS
    }

    fn prefetch_fields(&self) -> &'static [&'static str] {
        &["group", "tags"]
    }

    fn brief_fields(&self) -> Option<&'static [&'static str]> {
        Some(&["id", "url", "name", "slug"])
    }

    fn supports_custom_fields(&self) -> bool {
        true
    }

    fn change_logged(&self) -> bool {
        true
    }

    fn queryset(&self, filter: &ObjectFilter) -> ApiResult<Select<tenant::Entity>> {
        let mut select = filter_by_name(
            tenant::Entity::find(),
            filter,
            tenant::Column::Name,
            Some(tenant::Column::Slug),
        );
        select = filter_by_fk(select, filter, "group_id", tenant::Column::GroupId)?;
        let group_slugs = filter.values("group");
        if !group_slugs.is_empty() {
            select = select.filter(
                tenant::Column::GroupId.in_subquery(
                    Query::select()
                        .column(tenant_group::Column::Id)
                        .from(tenant_group::Entity)
                        .and_where(tenant_group::Column::Slug.is_in(group_slugs.iter().cloned()))
                        .to_owned(),
                ),
            );
        }
        Ok(select.order_by_asc(tenant::Column::Name))
    }

    async fn serialize<C: ConnectionTrait>(
        &self,
        conn: &C,
        rows: Vec<tenant::Model>,
        ctx: &SerializerContext,
    ) -> ApiResult<Vec<TenantDto>> {
        let ids: Vec<i64> = rows.iter().map(|m| m.id).collect();

        let groups = if ctx.plan.prefetches("group") {
            groups_by_id(conn, rows.iter().filter_map(|m| m.group_id)).await?
        } else {
            HashMap::new()
        };
        let mut tags = if ctx.plan.prefetches("tags") {
            tags_for(conn, &TENANT, &ids, ctx).await?
        } else {
            HashMap::new()
        };
        let counts = if RELATED_COUNT_FIELDS.iter().any(|f| ctx.plan.annotates(f)) {
            self.relations.counts(&ids).await?
        } else {
            HashMap::new()
        };

        Ok(rows
            .into_iter()
            .map(|m| {
                let c = counts.get(&m.id).copied().unwrap_or_default();
                TenantDto {
                    url: ctx.url(TENANTS_PATH, m.id),
                    group: m.group_id.and_then(|g| groups.get(&g)).map(|g| nested_group(g, ctx)),
                    tags: tags.remove(&m.id).unwrap_or_default(),
                    custom_fields: render_custom_fields(&ctx.custom_fields, &m.custom_field_data),
                    id: m.id,
                    name: m.name,
                    slug: m.slug,
                    description: m.description,
                    comments: m.comments,
                    created: m.created,
                    last_updated: m.last_updated,
                    circuit_count: c.circuit_count,
                    device_count: c.device_count,
                    ipaddress_count: c.ipaddress_count,
                    prefix_count: c.prefix_count,
                    rack_count: c.rack_count,
                    site_count: c.site_count,
                    virtualmachine_count: c.virtualmachine_count,
                    vlan_count: c.vlan_count,
                    vrf_count: c.vrf_count,
                    cluster_count: c.cluster_count,
                }
            })
            .collect())
    }

    async fn perform_create(
        &self,
        txn: &DatabaseTransaction,
        data: TenantCreate,
        ctx: &SerializerContext,
    ) -> ApiResult<tenant::Model> {
        let mut errors = FieldErrors::new();
        let group = match &data.group {
            Some(r) => errors.absorb(resolve_group(txn, "group", r).await)?,
            None => None,
        };
        let tags = match &data.tags {
            Some(refs) => errors.absorb(resolve_tags(txn, refs).await)?,
            None => None,
        };
        let custom_field_data = errors
            .absorb(clean_custom_fields(
                &ctx.custom_fields,
                data.custom_fields.as_ref(),
                None,
                true,
            ))?
            .unwrap_or_else(empty_object);

        let now = Utc::now();
        let m = tenant::Model {
            id: 0,
            name: data.name,
            slug: data.slug,
            group_id: group.map(|g| g.id),
            description: data.description.unwrap_or_default(),
            comments: data.comments.unwrap_or_default(),
            custom_field_data,
            created: now,
            last_updated: now,
        };
        check_named(&mut errors, &m.name, &m.slug, &m.description);
        self.check_unique(txn, &m, None, &mut errors).await?;
        errors.finish()?;

        let mut am = tenant::ActiveModel::from(m).reset_all();
        am.id = NotSet;
        let created = am.insert(txn).await?;
        if let Some(tags) = tags {
            set_tags(txn, &TENANT, created.id, &tags).await?;
        }
        Ok(created)
    }

    async fn perform_update(
        &self,
        txn: &DatabaseTransaction,
        current: tenant::Model,
        data: TenantUpdate,
        ctx: &SerializerContext,
    ) -> ApiResult<tenant::Model> {
        let mut errors = FieldErrors::new();
        let mut m = current;
        match &data.group {
            Some(Some(r)) => {
                if let Some(g) = errors.absorb(resolve_group(txn, "group", r).await)? {
                    m.group_id = Some(g.id);
                }
            }
            Some(None) => m.group_id = None,
            None => {}
        }
        let tags = match &data.tags {
            Some(refs) => errors.absorb(resolve_tags(txn, refs).await)?,
            None => None,
        };
        if let Some(incoming) = data.custom_fields.as_ref() {
            if let Some(cleaned) = errors.absorb(clean_custom_fields(
                &ctx.custom_fields,
                Some(incoming),
                Some(&m.custom_field_data),
                false,
            ))? {
                m.custom_field_data = cleaned;
            }
        }
        if let Some(v) = data.name {
            m.name = v;
        }
        if let Some(v) = data.slug {
            m.slug = v;
        }
        if let Some(v) = data.description {
            m.description = v;
        }
        if let Some(v) = data.comments {
            m.comments = v;
        }
        m.last_updated = Utc::now();

        check_named(&mut errors, &m.name, &m.slug, &m.description);
        self.check_unique(txn, &m, Some(m.id), &mut errors).await?;
        errors.finish()?;

        let updated = tenant::ActiveModel::from(m).reset_all().update(txn).await?;
        if let Some(tags) = tags {
            set_tags(txn, &TENANT, updated.id, &tags).await?;
        }
        Ok(updated)
    }

    async fn perform_destroy(
        &self,
        txn: &DatabaseTransaction,
        current: tenant::Model,
        _ctx: &SerializerContext,
    ) -> ApiResult<()> {
        clear_tags(txn, &TENANT, &[current.id]).await?;
        tenant::Entity::delete_by_id(current.id).exec(txn).await?;
        Ok(())
    }

    fn display(&self, m: &tenant::Model) -> String {
        m.name.clone()
    }
}

// ------------------------------------------------------- tenant groups

pub struct TenantGroupViewSet;

impl TenantGroupViewSet {
    async fn check_unique(
        &self,
        txn: &DatabaseTransaction,
        m: &tenant_group::Model,
        exclude: Option<i64>,
        errors: &mut FieldErrors,
    ) -> ApiResult<()> {
        if !errors.has("name")
            && taken::<tenant_group::Entity, _, _>(
                txn,
                tenant_group::Column::Name,
                m.name.clone(),
                tenant_group::Column::Id,
                exclude,
            )
            .await?
        {
            errors.push("name", "tenant group with this name already exists.");
        }
        if !errors.has("slug")
            && taken::<tenant_group::Entity, _, _>(
                txn,
                tenant_group::Column::Slug,
                m.slug.clone(),
                tenant_group::Column::Id,
                exclude,
            )
            .await?
        {
            errors.push("slug", "tenant group with this slug already exists.");
        }
        Ok(())
    }
}

#[async_trait]
impl ModelViewSet for TenantGroupViewSet {
    type Entity = tenant_group::Entity;
    type Model = tenant_group::Model;
    type Full = TenantGroupDto;
    type Create = TenantGroupCreate;
    type Update = TenantGroupUpdate;

    fn content_type(&self) -> ContentType {
        TENANT_GROUP
    }

    fn base_path(&self) -> &'static str {
        TENANT_GROUPS_PATH
    }

    fn verbose_name_plural(&self) -> &'static str {
        "tenant groups"
    }

    fn id_of(m: &tenant_group::Model) -> i64 {
        m.id
    }

    fn id_column() -> tenant_group::Column {
        tenant_group::Column::Id
    }

    fn constraint_column(&self, attr: &str) -> Option<tenant_group::Column> {
        match attr {
            "id" => Some(tenant_group::Column::Id),
            "name" => Some(tenant_group::Column::Name),
            "slug" => Some(tenant_group::Column::Slug),
            "parent_id" => Some(tenant_group::Column::ParentId),
            _ => None,
        }
    }

    fn annotations(&self) -> &'static [&'static str] {
        &["tenant_count"]
    }

    fn prefetch_fields(&self) -> &'static [&'static str] {
        &["parent"]
    }

    fn brief_fields(&self) -> Option<&'static [&'static str]> {
        Some(&["id", "url", "name", "slug", "tenant_count", "_depth"])
    }

    fn supports_custom_fields(&self) -> bool {
        true
    }

    fn change_logged(&self) -> bool {
        true
    }

    fn queryset(&self, filter: &ObjectFilter) -> ApiResult<Select<tenant_group::Entity>> {
        let mut select = filter_by_name(
            tenant_group::Entity::find(),
            filter,
            tenant_group::Column::Name,
            Some(tenant_group::Column::Slug),
        );
        select = filter_by_fk(select, filter, "parent_id", tenant_group::Column::ParentId)?;
        let parent_slugs = filter.values("parent");
        if !parent_slugs.is_empty() {
            select = select.filter(
                tenant_group::Column::ParentId.in_subquery(
                    Query::select()
                        .column(tenant_group::Column::Id)
                        .from(tenant_group::Entity)
                        .and_where(tenant_group::Column::Slug.is_in(parent_slugs.iter().cloned()))
                        .to_owned(),
                ),
            );
        }
        Ok(select.order_by_asc(tenant_group::Column::Name))
    }

    async fn serialize<C: ConnectionTrait>(
        &self,
        conn: &C,
        rows: Vec<tenant_group::Model>,
        ctx: &SerializerContext,
    ) -> ApiResult<Vec<TenantGroupDto>> {
        let parents = if ctx.plan.prefetches("parent") {
            groups_by_id(conn, rows.iter().filter_map(|m| m.parent_id)).await?
        } else {
            HashMap::new()
        };
        let counts = if ctx.plan.annotates("tenant_count") {
            let ids: Vec<i64> = rows.iter().map(|m| m.id).collect();
            cumulative_tenant_counts(conn, &ids).await?
        } else {
            HashMap::new()
        };

        Ok(rows
            .into_iter()
            .map(|m| TenantGroupDto {
                url: ctx.url(TENANT_GROUPS_PATH, m.id),
                parent: m
                    .parent_id
                    .and_then(|p| parents.get(&p))
                    .map(|p| nested_group(p, ctx)),
                tenant_count: counts.get(&m.id).copied().unwrap_or_default(),
                custom_fields: render_custom_fields(&ctx.custom_fields, &m.custom_field_data),
                id: m.id,
                name: m.name,
                slug: m.slug,
                description: m.description,
                created: m.created,
                last_updated: m.last_updated,
                depth: m.depth,
            })
            .collect())
    }

    async fn perform_create(
        &self,
        txn: &DatabaseTransaction,
        data: TenantGroupCreate,
        ctx: &SerializerContext,
    ) -> ApiResult<tenant_group::Model> {
        let mut errors = FieldErrors::new();
        let parent = match &data.parent {
            Some(r) => errors.absorb(resolve_group(txn, "parent", r).await)?,
            None => None,
        };
        let custom_field_data = errors
            .absorb(clean_custom_fields(
                &ctx.custom_fields,
                data.custom_fields.as_ref(),
                None,
                true,
            ))?
            .unwrap_or_else(empty_object);

        let now = Utc::now();
        let m = tenant_group::Model {
            id: 0,
            name: data.name,
            slug: data.slug,
            parent_id: parent.as_ref().map(|p| p.id),
            depth: parent.as_ref().map_or(0, |p| p.depth + 1),
            description: data.description.unwrap_or_default(),
            custom_field_data,
            created: now,
            last_updated: now,
        };
        check_named(&mut errors, &m.name, &m.slug, &m.description);
        self.check_unique(txn, &m, None, &mut errors).await?;
        errors.finish()?;

        let mut am = tenant_group::ActiveModel::from(m).reset_all();
        am.id = NotSet;
        Ok(am.insert(txn).await?)
    }

    async fn perform_update(
        &self,
        txn: &DatabaseTransaction,
        current: tenant_group::Model,
        data: TenantGroupUpdate,
        ctx: &SerializerContext,
    ) -> ApiResult<tenant_group::Model> {
        let mut errors = FieldErrors::new();
        let mut m = current;
        let old_parent = m.parent_id;
        match &data.parent {
            Some(Some(r)) => {
                if let Some(p) = errors.absorb(resolve_group(txn, "parent", r).await)? {
                    if errors.absorb(check_parent(txn, m.id, p.id).await)?.is_some() {
                        m.parent_id = Some(p.id);
                        m.depth = p.depth + 1;
                    }
                }
            }
            Some(None) => {
                m.parent_id = None;
                m.depth = 0;
            }
            None => {}
        }
        if let Some(incoming) = data.custom_fields.as_ref() {
            if let Some(cleaned) = errors.absorb(clean_custom_fields(
                &ctx.custom_fields,
                Some(incoming),
                Some(&m.custom_field_data),
                false,
            ))? {
                m.custom_field_data = cleaned;
            }
        }
        if let Some(v) = data.name {
            m.name = v;
        }
        if let Some(v) = data.slug {
            m.slug = v;
        }
        if let Some(v) = data.description {
            m.description = v;
        }
        m.last_updated = Utc::now();

        check_named(&mut errors, &m.name, &m.slug, &m.description);
        self.check_unique(txn, &m, Some(m.id), &mut errors).await?;
        errors.finish()?;

        let moved = m.parent_id != old_parent;
        let updated = tenant_group::ActiveModel::from(m)
            .reset_all()
            .update(txn)
            .await?;
        if moved {
            tracing::debug!(group = updated.id, depth = updated.depth, "group moved");
            resync_depths(txn, updated.id, updated.depth).await?;
        }
        Ok(updated)
    }

    async fn perform_destroy(
        &self,
        txn: &DatabaseTransaction,
        current: tenant_group::Model,
        _ctx: &SerializerContext,
    ) -> ApiResult<()> {
        let removed = delete_subtree(txn, current.id).await?;
        if !removed.is_empty() {
            tracing::debug!(group = current.id, descendants = removed.len(), "deleted subtree");
        }
        Ok(())
    }

    fn display(&self, m: &tenant_group::Model) -> String {
        m.name.clone()
    }
}
