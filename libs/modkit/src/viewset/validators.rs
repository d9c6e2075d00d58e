use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};

use crate::api::{ApiError, ApiResult, ValidationError};

static SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid regex"));

/// Field error accumulator for one object.
#[derive(Debug, Default)]
pub struct FieldErrors(Vec<ValidationError>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &str, detail: impl Into<String>) {
        self.0.push(ValidationError::field(field, detail));
    }

    pub fn extend(&mut self, err: ApiError) -> ApiResult<()> {
        match err {
            ApiError::Validation(errors) => {
                self.0.extend(errors);
                Ok(())
            }
            other => Err(other),
        }
    }

    /// Keep going after a validation failure so every field error is
    /// reported at once. Other errors still abort.
    pub fn absorb<T>(&mut self, result: ApiResult<T>) -> ApiResult<Option<T>> {
        match result {
            Ok(v) => Ok(Some(v)),
            Err(e) => self.extend(e).map(|()| None),
        }
    }

    pub fn has(&self, field: &str) -> bool {
        let pointer = format!("/{field}");
        self.0.iter().any(|e| e.pointer == pointer)
    }

    pub fn required(&mut self, field: &str, value: &str) {
        if value.trim().is_empty() {
            self.push(field, "This field may not be blank.");
        }
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) {
        if value.chars().count() > max {
            self.push(
                field,
                format!("Ensure this field has no more than {max} characters."),
            );
        }
    }

    pub fn slug(&mut self, field: &str, value: &str) {
        if !value.is_empty() && !SLUG.is_match(value) {
            self.push(
                field,
                "Enter a valid \"slug\" consisting of letters, numbers, underscores or hyphens.",
            );
        }
    }

    pub fn finish(self) -> ApiResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.0))
        }
    }
}

/// Whether another row already holds `value` in `column`.
pub async fn taken<E, C, V>(
    conn: &C,
    column: E::Column,
    value: V,
    id_column: E::Column,
    exclude: Option<i64>,
) -> ApiResult<bool>
where
    E: EntityTrait,
    E::Model: Sync,
    C: ConnectionTrait,
    V: Into<sea_orm::Value> + Send,
{
    let mut select = E::find().filter(column.eq(value));
    if let Some(id) = exclude {
        select = select.filter(id_column.ne(id));
    }
    Ok(select.count(conn).await? > 0)
}
