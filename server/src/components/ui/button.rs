use maud::{html, Markup, Render};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ButtonVariant {
    Primary,
    Secondary,
}

/// Behavior hook consumed by scripts.js via a `data-target` attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ButtonAction {
    /// Copy the target element's text to the clipboard.
    Copy,
    /// Show/hide the target element.
    Toggle,
}

/// Either a link styled as a button (when `href` is set) or a real
/// `<button>` wired to the clipboard/toggle script.
pub struct Button {
    text: String,
    href: Option<String>,
    variant: ButtonVariant,
    action: Option<(ButtonAction, String)>,
}

impl Button {
    pub fn primary(text: &str) -> Self {
        Self {
            text: text.to_string(),
            href: None,
            variant: ButtonVariant::Primary,
            action: None,
        }
    }

    pub fn secondary(text: &str) -> Self {
        Self {
            variant: ButtonVariant::Secondary,
            ..Self::primary(text)
        }
    }

    pub fn href(mut self, href: &str) -> Self {
        self.href = Some(href.to_string());
        self
    }

    /// Render as a copy-to-clipboard button for the element with this id.
    pub fn copy_target(mut self, target_id: &str) -> Self {
        self.action = Some((ButtonAction::Copy, target_id.to_string()));
        self
    }

    /// Render as a show/hide button for the element with this id.
    pub fn toggle_target(mut self, target_id: &str) -> Self {
        self.action = Some((ButtonAction::Toggle, target_id.to_string()));
        self
    }

    fn classes(&self) -> String {
        let mut classes = vec!["btn"];
        if self.variant == ButtonVariant::Secondary {
            classes.push("btn-secondary");
        }
        match self.action {
            Some((ButtonAction::Copy, _)) => classes.push("copy-btn"),
            Some((ButtonAction::Toggle, _)) => classes.push("toggle-btn"),
            None => {}
        }
        classes.join(" ")
    }
}

impl Render for Button {
    fn render(&self) -> Markup {
        let classes = self.classes();

        if let Some(href) = &self.href {
            html! {
                a href=(href) class=(classes) { (self.text) }
            }
        } else {
            html! {
                button type="button" class=(classes)
                    data-target=[self.action.as_ref().map(|(_, id)| id)] {
                    (self.text)
                }
            }
        }
    }
}
