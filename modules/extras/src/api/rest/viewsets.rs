use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Select,
};
use serde_json::Value;

use modkit::api::ApiResult;
use modkit::viewset::export::check_syntax;
use modkit::viewset::query::{count_by, filter_by_name};
use modkit::viewset::validators::taken;
use modkit::viewset::{
    ContentType, CustomFieldDefinition, CustomFieldType, FieldErrors, ModelViewSet,
    ObjectFilter, SerializerContext,
};

use super::dto::{
    CustomFieldCreate, CustomFieldDto, CustomFieldUpdate, ExportTemplateCreate, ExportTemplateDto,
    ExportTemplateUpdate, TagCreate, TagDto, TagUpdate,
};
use crate::domain::stores::parse_field_type;
use crate::infra::storage::entity::{custom_field, export_template, tag, tagged_item};

pub const TAGS_PATH: &str = "/api/extras/tags/";
pub const CUSTOM_FIELDS_PATH: &str = "/api/extras/custom-fields/";
pub const EXPORT_TEMPLATES_PATH: &str = "/api/extras/export-templates/";

pub const TAG: ContentType = ContentType::new("extras", "tag");
pub const CUSTOM_FIELD: ContentType = ContentType::new("extras", "customfield");
pub const EXPORT_TEMPLATE: ContentType = ContentType::new("extras", "exporttemplate");

pub const DEFAULT_TAG_COLOR: &str = "9e9e9e";

static COLOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-f]{6}$").expect("valid regex"));
static FIELD_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9_]+$").expect("valid regex"));
static OBJECT_TYPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_]*\.[a-z][a-z0-9_]*$").expect("valid regex"));

fn check_object_type(errors: &mut FieldErrors, field: &str, label: &str) {
    if !OBJECT_TYPE.is_match(label) {
        errors.push(field, format!("Invalid object type \"{label}\"."));
    }
}

// ---------------------------------------------------------------- tags

pub struct TagViewSet;

impl TagViewSet {
    async fn validate(
        &self,
        txn: &DatabaseTransaction,
        m: &tag::Model,
        exclude: Option<i64>,
    ) -> ApiResult<()> {
        let mut errors = FieldErrors::new();
        errors.required("name", &m.name);
        errors.max_len("name", &m.name, 100);
        errors.required("slug", &m.slug);
        errors.max_len("slug", &m.slug, 100);
        errors.slug("slug", &m.slug);
        if !COLOR.is_match(&m.color) {
            errors.push("color", "Enter a valid hexadecimal RGB color code.");
        }
        errors.max_len("description", &m.description, 200);

        if !errors.has("name")
            && taken::<tag::Entity, _, _>(txn, tag::Column::Name, m.name.clone(), tag::Column::Id, exclude)
                .await?
        {
            errors.push("name", "tag with this name already exists.");
        }
        if !errors.has("slug")
            && taken::<tag::Entity, _, _>(txn, tag::Column::Slug, m.slug.clone(), tag::Column::Id, exclude)
                .await?
        {
            errors.push("slug", "tag with this slug already exists.");
        }
        errors.finish()
    }
}

#[async_trait]
impl ModelViewSet for TagViewSet {
    type Entity = tag::Entity;
    type Model = tag::Model;
    type Full = TagDto;
    type Create = TagCreate;
    type Update = TagUpdate;

    fn content_type(&self) -> ContentType {
        TAG
    }

    fn base_path(&self) -> &'static str {
        TAGS_PATH
    }

    fn verbose_name_plural(&self) -> &'static str {
        "tags"
    }

    fn id_of(m: &tag::Model) -> i64 {
        m.id
    }

    fn id_column() -> tag::Column {
        tag::Column::Id
    }

    fn constraint_column(&self, attr: &str) -> Option<tag::Column> {
        match attr {
            "id" => Some(tag::Column::Id),
            "name" => Some(tag::Column::Name),
            "slug" => Some(tag::Column::Slug),
            _ => None,
        }
    }

    fn annotations(&self) -> &'static [&'static str] {
        &["tagged_items"]
    }

    fn brief_fields(&self) -> Option<&'static [&'static str]> {
        Some(&["id", "url", "name", "slug", "color"])
    }

    fn change_logged(&self) -> bool {
        true
    }

    fn queryset(&self, filter: &ObjectFilter) -> ApiResult<Select<tag::Entity>> {
        let mut select =
            filter_by_name(tag::Entity::find(), filter, tag::Column::Name, Some(tag::Column::Slug));
        let colors = filter.values("color");
        if !colors.is_empty() {
            select = select.filter(tag::Column::Color.is_in(colors.iter().cloned()));
        }
        Ok(select.order_by_asc(tag::Column::Name))
    }

    async fn serialize<C: ConnectionTrait>(
        &self,
        conn: &C,
        rows: Vec<tag::Model>,
        ctx: &SerializerContext,
    ) -> ApiResult<Vec<TagDto>> {
        let counts = if ctx.plan.annotates("tagged_items") {
            let ids: Vec<i64> = rows.iter().map(|m| m.id).collect();
            count_by::<tagged_item::Entity, _>(conn, tagged_item::Column::TagId, &ids).await?
        } else {
            HashMap::new()
        };
        Ok(rows
            .into_iter()
            .map(|m| TagDto {
                url: ctx.url(TAGS_PATH, m.id),
                tagged_items: counts.get(&m.id).copied().unwrap_or_default(),
                id: m.id,
                name: m.name,
                slug: m.slug,
                color: m.color,
                description: m.description,
                created: m.created,
                last_updated: m.last_updated,
            })
            .collect())
    }

    async fn perform_create(
        &self,
        txn: &DatabaseTransaction,
        data: TagCreate,
        _ctx: &SerializerContext,
    ) -> ApiResult<tag::Model> {
        let now = Utc::now();
        let m = tag::Model {
            id: 0,
            name: data.name,
            slug: data.slug,
            color: data.color.unwrap_or_else(|| DEFAULT_TAG_COLOR.to_string()),
            description: data.description.unwrap_or_default(),
            created: now,
            last_updated: now,
        };
        self.validate(txn, &m, None).await?;
        let mut am = tag::ActiveModel::from(m).reset_all();
        am.id = NotSet;
        Ok(am.insert(txn).await?)
    }

    async fn perform_update(
        &self,
        txn: &DatabaseTransaction,
        current: tag::Model,
        data: TagUpdate,
        _ctx: &SerializerContext,
    ) -> ApiResult<tag::Model> {
        let mut m = current;
        if let Some(v) = data.name {
            m.name = v;
        }
        if let Some(v) = data.slug {
            m.slug = v;
        }
        if let Some(v) = data.color {
            m.color = v;
        }
        if let Some(v) = data.description {
            m.description = v;
        }
        m.last_updated = Utc::now();
        self.validate(txn, &m, Some(m.id)).await?;
        Ok(tag::ActiveModel::from(m).reset_all().update(txn).await?)
    }

    async fn perform_destroy(
        &self,
        txn: &DatabaseTransaction,
        current: tag::Model,
        _ctx: &SerializerContext,
    ) -> ApiResult<()> {
        tagged_item::Entity::delete_many()
            .filter(tagged_item::Column::TagId.eq(current.id))
            .exec(txn)
            .await?;
        tag::Entity::delete_by_id(current.id).exec(txn).await?;
        Ok(())
    }

    fn display(&self, m: &tag::Model) -> String {
        m.name.clone()
    }
}

// ------------------------------------------------------- custom fields

pub struct CustomFieldViewSet;

fn definition_of(m: &custom_field::Model, field_type: CustomFieldType) -> CustomFieldDefinition {
    CustomFieldDefinition {
        name: m.name.clone(),
        field_type,
        required: m.required,
        default: m.default.clone().filter(|d| !d.is_null()),
        choices: serde_json::from_value(m.choices.clone()).unwrap_or_default(),
        weight: m.weight,
    }
}

impl CustomFieldViewSet {
    async fn validate(
        &self,
        txn: &DatabaseTransaction,
        m: &custom_field::Model,
        exclude: Option<i64>,
    ) -> ApiResult<()> {
        let mut errors = FieldErrors::new();
        errors.required("name", &m.name);
        errors.max_len("name", &m.name, 50);
        if !m.name.is_empty() && !FIELD_NAME.is_match(&m.name) {
            errors.push(
                "name",
                "Only lowercase alphanumeric characters and underscores are allowed.",
            );
        }
        errors.max_len("label", &m.label, 50);
        errors.max_len("description", &m.description, 200);

        let labels = m.object_type_list();
        if labels.is_empty() {
            errors.push("content_types", "This list may not be empty.");
        }
        for label in &labels {
            check_object_type(&mut errors, "content_types", label);
        }

        match parse_field_type(&m.field_type) {
            None => errors.push("type", format!("\"{}\" is not a valid choice.", m.field_type)),
            Some(field_type) => {
                let def = definition_of(m, field_type);
                match field_type {
                    CustomFieldType::Select if def.choices.is_empty() => {
                        errors.push("choices", "Selection fields must specify a set of choices.")
                    }
                    CustomFieldType::Select => {}
                    _ if !def.choices.is_empty() => {
                        errors.push("choices", "Choices may be set only for selection fields.")
                    }
                    _ => {}
                }
                if let Some(default) = &def.default {
                    if let Err(detail) = def.check(default) {
                        errors.push("default", format!("Invalid default value: {detail}"));
                    }
                }
            }
        }

        if !errors.has("name")
            && taken::<custom_field::Entity, _, _>(
                txn,
                custom_field::Column::Name,
                m.name.clone(),
                custom_field::Column::Id,
                exclude,
            )
            .await?
        {
            errors.push("name", "custom field with this name already exists.");
        }
        errors.finish()
    }
}

#[async_trait]
impl ModelViewSet for CustomFieldViewSet {
    type Entity = custom_field::Entity;
    type Model = custom_field::Model;
    type Full = CustomFieldDto;
    type Create = CustomFieldCreate;
    type Update = CustomFieldUpdate;

    fn content_type(&self) -> ContentType {
        CUSTOM_FIELD
    }

    fn base_path(&self) -> &'static str {
        CUSTOM_FIELDS_PATH
    }

    fn verbose_name_plural(&self) -> &'static str {
        "custom fields"
    }

    fn id_of(m: &custom_field::Model) -> i64 {
        m.id
    }

    fn id_column() -> custom_field::Column {
        custom_field::Column::Id
    }

    fn brief_fields(&self) -> Option<&'static [&'static str]> {
        Some(&["id", "url", "name"])
    }

    fn change_logged(&self) -> bool {
        true
    }

    fn queryset(&self, filter: &ObjectFilter) -> ApiResult<Select<custom_field::Entity>> {
        let mut select = filter_by_name(
            custom_field::Entity::find(),
            filter,
            custom_field::Column::Name,
            None,
        );
        for label in filter.values("content_type") {
            select = select.filter(
                custom_field::Column::ObjectTypes.like(custom_field::object_type_pattern(label)),
            );
        }
        Ok(select
            .order_by_asc(custom_field::Column::Weight)
            .order_by_asc(custom_field::Column::Name))
    }

    async fn serialize<C: ConnectionTrait>(
        &self,
        _conn: &C,
        rows: Vec<custom_field::Model>,
        ctx: &SerializerContext,
    ) -> ApiResult<Vec<CustomFieldDto>> {
        Ok(rows
            .into_iter()
            .map(|m| CustomFieldDto {
                url: ctx.url(CUSTOM_FIELDS_PATH, m.id),
                content_types: m.object_type_list(),
                choices: serde_json::from_value(m.choices).unwrap_or_default(),
                id: m.id,
                field_type: m.field_type,
                name: m.name,
                label: m.label,
                description: m.description,
                required: m.required,
                default: m.default.filter(|d| !d.is_null()),
                weight: m.weight,
                created: m.created,
                last_updated: m.last_updated,
            })
            .collect())
    }

    async fn perform_create(
        &self,
        txn: &DatabaseTransaction,
        data: CustomFieldCreate,
        _ctx: &SerializerContext,
    ) -> ApiResult<custom_field::Model> {
        let now = Utc::now();
        let m = custom_field::Model {
            id: 0,
            name: data.name,
            label: data.label.unwrap_or_default(),
            object_types: custom_field::join_object_types(&data.content_types),
            field_type: data.field_type.as_str().to_string(),
            required: data.required.unwrap_or_default(),
            default: data.default.filter(|d| !d.is_null()),
            choices: Value::from(data.choices.unwrap_or_default()),
            description: data.description.unwrap_or_default(),
            weight: data.weight.unwrap_or(100),
            created: now,
            last_updated: now,
        };
        self.validate(txn, &m, None).await?;
        let mut am = custom_field::ActiveModel::from(m).reset_all();
        am.id = NotSet;
        Ok(am.insert(txn).await?)
    }

    async fn perform_update(
        &self,
        txn: &DatabaseTransaction,
        current: custom_field::Model,
        data: CustomFieldUpdate,
        _ctx: &SerializerContext,
    ) -> ApiResult<custom_field::Model> {
        let mut m = current;
        if let Some(v) = data.content_types {
            m.object_types = custom_field::join_object_types(&v);
        }
        if let Some(v) = data.field_type {
            m.field_type = v.as_str().to_string();
        }
        if let Some(v) = data.name {
            m.name = v;
        }
        if let Some(v) = data.label {
            m.label = v;
        }
        if let Some(v) = data.description {
            m.description = v;
        }
        if let Some(v) = data.required {
            m.required = v;
        }
        if let Some(v) = data.default {
            m.default = v.filter(|d| !d.is_null());
        }
        if let Some(v) = data.choices {
            m.choices = Value::from(v);
        }
        if let Some(v) = data.weight {
            m.weight = v;
        }
        m.last_updated = Utc::now();
        self.validate(txn, &m, Some(m.id)).await?;
        Ok(custom_field::ActiveModel::from(m).reset_all().update(txn).await?)
    }

    async fn perform_destroy(
        &self,
        txn: &DatabaseTransaction,
        current: custom_field::Model,
        _ctx: &SerializerContext,
    ) -> ApiResult<()> {
        custom_field::Entity::delete_by_id(current.id).exec(txn).await?;
        Ok(())
    }

    fn display(&self, m: &custom_field::Model) -> String {
        if m.label.is_empty() {
            m.name.clone()
        } else {
            m.label.clone()
        }
    }
}

// ---------------------------------------------------- export templates

pub struct ExportTemplateViewSet;

impl ExportTemplateViewSet {
    async fn validate(
        &self,
        txn: &DatabaseTransaction,
        m: &export_template::Model,
        exclude: Option<i64>,
    ) -> ApiResult<()> {
        let mut errors = FieldErrors::new();
        check_object_type(&mut errors, "content_type", &m.object_type);
        errors.required("name", &m.name);
        errors.max_len("name", &m.name, 100);
        errors.max_len("description", &m.description, 200);
        errors.max_len("mime_type", &m.mime_type, 50);
        errors.max_len("file_extension", &m.file_extension, 15);
        errors.required("template_code", &m.template_code);
        if let Err(detail) = check_syntax(&m.template_code) {
            errors.push("template_code", format!("Invalid template: {detail}"));
        }

        if !errors.has("name") && !errors.has("content_type") {
            let mut dup = export_template::Entity::find()
                .filter(export_template::Column::ObjectType.eq(m.object_type.as_str()))
                .filter(export_template::Column::Name.eq(m.name.as_str()));
            if let Some(id) = exclude {
                dup = dup.filter(export_template::Column::Id.ne(id));
            }
            if dup.count(txn).await? > 0 {
                errors.push(
                    "name",
                    "An export template with this name already exists for this object type.",
                );
            }
        }
        errors.finish()
    }
}

#[async_trait]
impl ModelViewSet for ExportTemplateViewSet {
    type Entity = export_template::Entity;
    type Model = export_template::Model;
    type Full = ExportTemplateDto;
    type Create = ExportTemplateCreate;
    type Update = ExportTemplateUpdate;

    fn content_type(&self) -> ContentType {
        EXPORT_TEMPLATE
    }

    fn base_path(&self) -> &'static str {
        EXPORT_TEMPLATES_PATH
    }

    fn verbose_name_plural(&self) -> &'static str {
        "export templates"
    }

    fn id_of(m: &export_template::Model) -> i64 {
        m.id
    }

    fn id_column() -> export_template::Column {
        export_template::Column::Id
    }

    fn constraint_column(&self, attr: &str) -> Option<export_template::Column> {
        match attr {
            "id" => Some(export_template::Column::Id),
            "content_type" => Some(export_template::Column::ObjectType),
            _ => None,
        }
    }

    fn brief_fields(&self) -> Option<&'static [&'static str]> {
        Some(&["id", "url", "name"])
    }

    fn change_logged(&self) -> bool {
        true
    }

    fn queryset(&self, filter: &ObjectFilter) -> ApiResult<Select<export_template::Entity>> {
        let mut select = filter_by_name(
            export_template::Entity::find(),
            filter,
            export_template::Column::Name,
            None,
        );
        let types = filter.values("content_type");
        if !types.is_empty() {
            select = select.filter(export_template::Column::ObjectType.is_in(types.iter().cloned()));
        }
        Ok(select
            .order_by_asc(export_template::Column::ObjectType)
            .order_by_asc(export_template::Column::Name))
    }

    async fn serialize<C: ConnectionTrait>(
        &self,
        _conn: &C,
        rows: Vec<export_template::Model>,
        ctx: &SerializerContext,
    ) -> ApiResult<Vec<ExportTemplateDto>> {
        Ok(rows
            .into_iter()
            .map(|m| ExportTemplateDto {
                url: ctx.url(EXPORT_TEMPLATES_PATH, m.id),
                id: m.id,
                content_type: m.object_type,
                name: m.name,
                description: m.description,
                template_code: m.template_code,
                mime_type: m.mime_type,
                file_extension: m.file_extension,
                as_attachment: m.as_attachment,
                created: m.created,
                last_updated: m.last_updated,
            })
            .collect())
    }

    async fn perform_create(
        &self,
        txn: &DatabaseTransaction,
        data: ExportTemplateCreate,
        _ctx: &SerializerContext,
    ) -> ApiResult<export_template::Model> {
        let now = Utc::now();
        let m = export_template::Model {
            id: 0,
            object_type: data.content_type,
            name: data.name,
            description: data.description.unwrap_or_default(),
            template_code: data.template_code,
            mime_type: data.mime_type.unwrap_or_default(),
            file_extension: data.file_extension.unwrap_or_default(),
            as_attachment: data.as_attachment.unwrap_or(true),
            created: now,
            last_updated: now,
        };
        self.validate(txn, &m, None).await?;
        let mut am = export_template::ActiveModel::from(m).reset_all();
        am.id = NotSet;
        Ok(am.insert(txn).await?)
    }

    async fn perform_update(
        &self,
        txn: &DatabaseTransaction,
        current: export_template::Model,
        data: ExportTemplateUpdate,
        _ctx: &SerializerContext,
    ) -> ApiResult<export_template::Model> {
        let mut m = current;
        if let Some(v) = data.content_type {
            m.object_type = v;
        }
        if let Some(v) = data.name {
            m.name = v;
        }
        if let Some(v) = data.template_code {
            m.template_code = v;
        }
        if let Some(v) = data.description {
            m.description = v;
        }
        if let Some(v) = data.mime_type {
            m.mime_type = v;
        }
        if let Some(v) = data.file_extension {
            m.file_extension = v;
        }
        if let Some(v) = data.as_attachment {
            m.as_attachment = v;
        }
        m.last_updated = Utc::now();
        self.validate(txn, &m, Some(m.id)).await?;
        Ok(export_template::ActiveModel::from(m)
            .reset_all()
            .update(txn)
            .await?)
    }

    async fn perform_destroy(
        &self,
        txn: &DatabaseTransaction,
        current: export_template::Model,
        _ctx: &SerializerContext,
    ) -> ApiResult<()> {
        export_template::Entity::delete_by_id(current.id)
            .exec(txn)
            .await?;
        Ok(())
    }

    fn display(&self, m: &export_template::Model) -> String {
        format!("{} ({})", m.name, m.object_type)
    }
}
