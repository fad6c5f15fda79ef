//! Browser pages: home, privacy and the error page.

use axum::Router;
use axum::extract::{Query, State};
use axum::response::{Html, Response};
use axum::routing::get;
use http::StatusCode;
use problem_details::Raised;
use serde::Deserialize;
use web_core::page::{error_page_response, escape_html};
use web_core::{CorrelationId, HandlerResult, SettingsGroup};

use super::AppState;
use super::settings::settings_groups;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/privacy", get(privacy))
        .route("/error", get(error))
}

fn layout(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\n\
         <html lang=\"en\">\n\
         <head><meta charset=\"utf-8\"><title>{} - Acme</title></head>\n\
         <body>\n{body}</body>\n\
         </html>\n",
        escape_html(title)
    ))
}

fn render_group(group: &SettingsGroup) -> String {
    let items: String = group
        .values
        .iter()
        .map(|value| format!("<li>{}</li>\n", escape_html(value)))
        .collect();
    format!("<h2>{}</h2>\n<ul>\n{items}</ul>\n", escape_html(&group.name))
}

async fn home(State(state): State<AppState>) -> Html<String> {
    let settings = state.validator.settings();
    let groups: String = settings_groups(&state).iter().map(render_group).collect();
    let body = format!(
        "<h1 style=\"color: {}; background-color: {}; font-size: {}px\">{}</h1>\n{groups}",
        escape_html(&settings.font_color),
        escape_html(&settings.background_color),
        settings.font_size,
        escape_html(&settings.message)
    );
    layout("Home", &body)
}

#[derive(Debug, Default, Deserialize)]
struct PrivacyQuery {
    #[serde(default)]
    t: i32,
}

async fn privacy(Query(query): Query<PrivacyQuery>) -> HandlerResult<Html<String>> {
    if query.t != 0 {
        return Err(Raised::new("Exception", "some stupid programmer exception!").into());
    }
    Ok(layout(
        "Privacy Policy",
        "<h1>Privacy Policy</h1>\n<p>Use this page to detail your site's privacy policy.</p>\n",
    ))
}

async fn error(id: CorrelationId) -> Response {
    error_page_response(StatusCode::OK, Some(id.as_str()))
}
