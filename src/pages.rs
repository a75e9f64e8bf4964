use axum::response::Html;
use serde::Serialize;
use serde_json::Value;

use crate::auth::main_role;
use crate::config::AppConfig;
use crate::models::AdbUser;

/// PageData
///
/// Everything a page needs to boot the frontend bundle. Serialized into the shell as
/// JSON; `template` tells the bundle which view to mount.
#[derive(Debug, Clone, Serialize, Default)]
pub struct PageData {
    pub template: String,
    pub page_name: String,
    pub data: Value,
    pub main_role: String,
    pub user_name: String,
    pub user_email: String,
    pub static_resources_hash: String,
}

impl PageData {
    pub fn new(template: &str, page_name: &str) -> Self {
        Self {
            template: template.to_string(),
            page_name: page_name.to_string(),
            data: Value::Null,
            ..Self::default()
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn for_user(mut self, user: &AdbUser) -> Self {
        self.main_role = main_role(user).to_string();
        self.user_name = user.name.clone();
        self.user_email = user.email.clone();
        self
    }
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// render_page
///
/// Renders the HTML shell. The page data is embedded as a JSON script element with
/// `<` escaped so no value can close the element early.
pub fn render_page(config: &AppConfig, mut page: PageData) -> Html<String> {
    page.static_resources_hash = config.static_resources_hash.clone();

    let json = serde_json::to_string(&page)
        .unwrap_or_else(|_| "{}".to_string())
        .replace('<', "\\u003c");
    let hash = escape_html(&page.static_resources_hash);

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title} | ADB</title>
<link rel="stylesheet" href="/static/css/adb.css?v={hash}">
</head>
<body data-template="{template}">
<div id="app"></div>
<script id="page-data" type="application/json">{json}</script>
<script src="/dist/flash_message.js?v={hash}"></script>
<script src="/dist/adb.js?v={hash}"></script>
</body>
</html>
"#,
        title = escape_html(&page.page_name),
        template = escape_html(&page.template),
        hash = hash,
        json = json,
    ))
}
