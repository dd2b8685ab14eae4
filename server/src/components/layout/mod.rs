use chrono::Datelike;
use maud::{html, Markup, Render, DOCTYPE};

/// Full HTML document: header, alert banners, content, footer, and the
/// static stylesheet/script includes.
pub struct Page {
    pub title: String,
    pub content: Box<dyn Render>,
    pub error: Option<String>,
    pub success: Option<String>,
}

impl Page {
    pub fn new(title: impl Into<String>, content: impl Render + 'static) -> Self {
        Self {
            title: title.into(),
            content: Box::new(content),
            error: None,
            success: None,
        }
    }

    /// Show a red alert banner above the content.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }

    /// Show a green alert banner above the content.
    pub fn with_success(mut self, message: impl Into<String>) -> Self {
        self.success = Some(message.into());
        self
    }
}

impl Render for Page {
    fn render(&self) -> Markup {
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="UTF-8";
                    meta name="viewport" content="width=device-width, initial-scale=1.0";
                    title { (self.title) " - Fyers OAuth" }
                    link rel="stylesheet" href="/static/css/styles.css";
                }
                body {
                    header {
                        div class="container" {
                            div class="logo" { "Fyers OAuth Integration" }
                        }
                    }

                    main {
                        div class="container" {
                            @if let Some(error) = &self.error {
                                div class="alert alert-error" { p { (error) } }
                            }
                            @if let Some(success) = &self.success {
                                div class="alert alert-success" { p { (success) } }
                            }
                            (self.content.render())
                        }
                    }

                    footer {
                        div class="container" {
                            p { "© " (chrono::Utc::now().year()) " Fyers OAuth Integration" }
                        }
                    }

                    script src="/static/js/scripts.js" {}
                }
            }
        }
    }
}

impl axum::response::IntoResponse for Page {
    fn into_response(self) -> axum::response::Response {
        self.render().into_response()
    }
}

/// White panel with an optional underlined title.
pub struct Card {
    pub title: Option<String>,
    pub content: Box<dyn Render>,
}

impl Card {
    pub fn new(content: impl Render + 'static) -> Self {
        Self {
            title: None,
            content: Box::new(content),
        }
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }
}

impl Render for Card {
    fn render(&self) -> Markup {
        html! {
            div class="card" {
                @if let Some(title) = &self.title {
                    h2 class="card-title" { (title) }
                }
                (self.content.render())
            }
        }
    }
}
