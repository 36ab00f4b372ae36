//! Email bodies rendered with Tera.

use once_cell::sync::Lazy;
use tera::{Context, Tera};

use super::MailError;

const NOTIFICATION: &str = "\
Hi {{ recipient_name }},

{{ message }}
{% if link %}
Open it here: {{ link }}
{% endif %}
You are receiving this because of your activity on {{ site_name }}.
";

static TEMPLATES: Lazy<Tera> = Lazy::new(|| {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![("notification.txt", NOTIFICATION)])
        .unwrap();
    tera
});

/// Plain-text body for a notification email.
pub fn render_notification(
    site_name: &str,
    recipient_name: &str,
    message: &str,
    link: Option<&str>,
) -> Result<String, MailError> {
    let mut context = Context::new();
    context.insert("site_name", site_name);
    context.insert("recipient_name", recipient_name);
    context.insert("message", message);
    context.insert("link", &link);
    Ok(TEMPLATES.render("notification.txt", &context)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_link() {
        let body = render_notification(
            "TutorHub",
            "Ada",
            "Tia replied to \"Big-O of mergesort\".",
            Some("http://localhost:8080/topics/t1"),
        )
        .unwrap();
        assert!(body.starts_with("Hi Ada,"));
        assert!(body.contains("Tia replied to \"Big-O of mergesort\"."));
        assert!(body.contains("Open it here: http://localhost:8080/topics/t1"));
        assert!(body.contains("activity on TutorHub"));
    }

    #[test]
    fn test_render_without_link() {
        let body = render_notification("TutorHub", "Ada", "Hello", None).unwrap();
        assert!(!body.contains("Open it here"));
    }
}
