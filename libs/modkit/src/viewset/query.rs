use std::collections::{BTreeMap, HashMap};

use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect, Select,
};
use serde_json::Value;

use super::ModelViewSet;
use crate::api::{ApiError, ApiResult, Identity};

/// Query string of a list request, split into control parameters and
/// filters.
#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub brief: Option<String>,
    pub export: Option<String>,
    pub limit: Option<u64>,
    pub offset: u64,
    pub filter: ObjectFilter,
}

impl ListParams {
    pub fn parse(pairs: Vec<(String, String)>) -> ApiResult<Self> {
        let mut out = Self::default();
        let mut ids = Vec::new();
        for (key, value) in pairs {
            match key.as_str() {
                "brief" => out.brief = Some(value),
                "export" => out.export = Some(value),
                "limit" => out.limit = Some(parse_u64("limit", &value)?),
                "offset" => out.offset = parse_u64("offset", &value)?,
                "id" => {
                    for part in value.split(',').filter(|p| !p.is_empty()) {
                        ids.push(parse_i64("id", part)?);
                    }
                }
                _ => out.filter.params.entry(key).or_default().push(value),
            }
        }
        if !ids.is_empty() {
            out.filter.ids = Some(ids);
        }
        Ok(out)
    }
}

fn parse_u64(name: &str, raw: &str) -> ApiResult<u64> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::field(name, "A valid integer is required."))
}

fn parse_i64(name: &str, raw: &str) -> ApiResult<i64> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::field(name, "A valid integer is required."))
}

/// Id restriction plus free-form resource filters.
#[derive(Debug, Clone, Default)]
pub struct ObjectFilter {
    pub ids: Option<Vec<i64>>,
    pub params: BTreeMap<String, Vec<String>>,
}

impl ObjectFilter {
    pub fn by_ids(ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            ids: Some(ids.into_iter().collect()),
            params: BTreeMap::new(),
        }
    }

    pub fn values(&self, name: &str) -> &[String] {
        self.params.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }

    /// Integer filter values. The literal `null` is reported separately.
    pub fn ids_or_null(&self, name: &str) -> ApiResult<(Vec<i64>, bool)> {
        let mut ids = Vec::new();
        let mut null = false;
        for v in self.values(name) {
            if v.eq_ignore_ascii_case("null") {
                null = true;
            } else {
                ids.push(parse_i64(name, v)?);
            }
        }
        Ok((ids, null))
    }
}

/// `name`, `slug` and `q` filters shared by every named resource.
pub fn filter_by_name<E, C>(
    mut select: Select<E>,
    filter: &ObjectFilter,
    name: C,
    slug: Option<C>,
) -> Select<E>
where
    E: EntityTrait,
    C: ColumnTrait,
{
    let names = filter.values("name");
    if !names.is_empty() {
        select = select.filter(name.is_in(names.iter().cloned()));
    }
    if let Some(slug) = slug {
        let slugs = filter.values("slug");
        if !slugs.is_empty() {
            select = select.filter(slug.is_in(slugs.iter().cloned()));
        }
    }
    if let Some(q) = filter.first("q").filter(|q| !q.trim().is_empty()) {
        select = select.filter(name.contains(q.trim()));
    }
    select
}

/// Integer foreign key filter, `null` matching rows without a reference.
pub fn filter_by_fk<E, C>(
    select: Select<E>,
    filter: &ObjectFilter,
    param: &str,
    column: C,
) -> ApiResult<Select<E>>
where
    E: EntityTrait,
    C: ColumnTrait,
{
    let (ids, null) = filter.ids_or_null(param)?;
    if ids.is_empty() && !null {
        return Ok(select);
    }
    let mut cond = Condition::any();
    if !ids.is_empty() {
        cond = cond.add(column.is_in(ids));
    }
    if null {
        cond = cond.add(column.is_null());
    }
    Ok(select.filter(cond))
}

/// Rows of `E` per value of the integer column `fk`, for the given values.
pub async fn count_by<E, C>(
    conn: &C,
    fk: E::Column,
    values: &[i64],
) -> ApiResult<HashMap<i64, u64>>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    if values.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(i64, i64)> = E::find()
        .select_only()
        .column(fk)
        .column_as(Expr::col(fk).count(), "n")
        .filter(fk.is_in(values.iter().copied()))
        .group_by(fk)
        .into_tuple()
        .all(conn)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(k, n)| (k, u64::try_from(n).unwrap_or_default()))
        .collect())
}

/// The caller's view of a resource: base queryset, id restriction and the
/// identity's attribute constraints.
pub fn scoped_queryset<V: ModelViewSet>(
    vs: &V,
    identity: &Identity,
    filter: &ObjectFilter,
) -> ApiResult<Select<V::Entity>> {
    let mut select = vs.queryset(filter)?;
    if let Some(ids) = &filter.ids {
        select = select.filter(V::id_column().is_in(ids.iter().copied()));
    }
    if let Some(constraint) = identity.constraint_for(&vs.content_type()) {
        let mut all = Condition::all();
        for (attr, allowed) in constraint {
            all = all.add(match vs.constraint_column(attr) {
                Some(column) => allowed_values(column, allowed),
                None => {
                    tracing::debug!(attr = %attr, "constraint on unknown attribute");
                    Condition::all().add(V::id_column().is_in(Vec::<i64>::new()))
                }
            });
        }
        select = select.filter(all);
    }
    Ok(select)
}

fn allowed_values<C: ColumnTrait>(column: C, allowed: &[Value]) -> Condition {
    let mut any = Condition::any();
    let mut matched_any = false;
    for value in allowed {
        let expr = match value {
            Value::Null => column.is_null(),
            Value::Bool(b) => column.eq(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => column.eq(i),
                None => column.eq(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => column.eq(s.as_str()),
            Value::Array(_) | Value::Object(_) => continue,
        };
        any = any.add(expr);
        matched_any = true;
    }
    if !matched_any {
        // Empty allow-list: nothing conforms.
        return Condition::all().add(column.is_in(Vec::<i64>::new()));
    }
    any
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn control_params_are_split_from_filters() {
        let p = ListParams::parse(pairs(&[
            ("brief", "1"),
            ("limit", "10"),
            ("offset", "20"),
            ("id", "3,4"),
            ("id", "5"),
            ("group_id", "7"),
            ("group_id", "null"),
        ]))
        .unwrap();
        assert_eq!(p.brief.as_deref(), Some("1"));
        assert_eq!(p.limit, Some(10));
        assert_eq!(p.offset, 20);
        assert_eq!(p.filter.ids, Some(vec![3, 4, 5]));
        assert_eq!(p.filter.ids_or_null("group_id").unwrap(), (vec![7], true));
    }

    #[test]
    fn bad_integers_are_field_errors() {
        let err = ListParams::parse(pairs(&[("limit", "ten")])).unwrap_err();
        match err {
            ApiError::Validation(errs) => assert_eq!(errs[0].pointer, "/limit"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(ListParams::parse(pairs(&[("id", "x")])).is_err());
    }
}
