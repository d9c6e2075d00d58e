use async_trait::async_trait;
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;

use super::ContentType;
use crate::api::{ApiError, ApiResult};

pub const DEFAULT_MIME_TYPE: &str = "text/plain; charset=utf-8";

/// A named template rendering a whole queryset.
#[derive(Debug, Clone)]
pub struct ExportTemplate {
    pub name: String,
    pub template_code: String,
    pub mime_type: String,
    pub file_extension: String,
    pub as_attachment: bool,
}

#[async_trait]
pub trait ExportTemplateStore: Send + Sync {
    async fn find(&self, content_type: &ContentType, name: &str)
        -> ApiResult<Option<ExportTemplate>>;
}

/// Reject template code that does not parse.
pub fn check_syntax(code: &str) -> Result<(), String> {
    let mut tera = tera::Tera::default();
    tera.add_raw_template("export", code)
        .map(|_| ())
        .map_err(|e| describe(&e))
}

fn describe(err: &tera::Error) -> String {
    use std::error::Error as _;
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

impl ExportTemplate {
    /// Render with `queryset` bound to the full representations.
    pub fn render(&self, queryset: &[Value]) -> ApiResult<String> {
        let mut context = tera::Context::new();
        context.insert("queryset", queryset);
        tera::Tera::one_off(&self.template_code, &context, false)
            .map_err(|e| ApiError::Template(describe(&e)))
    }

    /// `<plural>.<ext>`, or just `<plural>` without an extension.
    pub fn filename(&self, plural: &str) -> String {
        let plural = plural.replace(' ', "_");
        if self.file_extension.is_empty() {
            plural
        } else {
            format!("{plural}.{}", self.file_extension)
        }
    }

    pub fn response(&self, plural: &str, body: String) -> Response {
        let mime = if self.mime_type.is_empty() {
            DEFAULT_MIME_TYPE
        } else {
            self.mime_type.as_str()
        };
        let mut resp = (StatusCode::OK, body).into_response();
        let headers = resp.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_str(mime).unwrap_or(HeaderValue::from_static(DEFAULT_MIME_TYPE)),
        );
        if self.as_attachment {
            let disposition = format!("attachment; filename=\"{}\"", self.filename(plural));
            if let Ok(v) = HeaderValue::from_str(&disposition) {
                headers.insert(header::CONTENT_DISPOSITION, v);
            }
        }
        resp
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template(code: &str) -> ExportTemplate {
        ExportTemplate {
            name: "csv".into(),
            template_code: code.into(),
            mime_type: "text/csv".into(),
            file_extension: "csv".into(),
            as_attachment: true,
        }
    }

    #[test]
    fn renders_queryset() {
        let t = template("{% for t in queryset %}{{ t.name }},{{ t.slug }}\n{% endfor %}");
        let out = t
            .render(&[json!({"name": "A", "slug": "a"}), json!({"name": "B", "slug": "b"})])
            .unwrap();
        assert_eq!(out, "A,a\nB,b\n");
    }

    #[test]
    fn attachment_headers() {
        let resp = template("x").response("tenant groups", "x".into());
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/csv");
        assert_eq!(
            resp.headers()[header::CONTENT_DISPOSITION],
            "attachment; filename=\"tenant_groups.csv\""
        );
    }

    #[test]
    fn syntax_check() {
        assert!(check_syntax("{{ queryset | length }}").is_ok());
        assert!(check_syntax("{% for %}").is_err());
    }
}
