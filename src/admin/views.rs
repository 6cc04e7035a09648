//! HTML rendering for the admin pages.

use std::fmt::Write;

use super::ADMIN_BASE;
use crate::models::{FieldErrors, MemberForm, TeamMember};

/// Which form is being rendered.
#[derive(Debug, Clone)]
pub enum FormTarget {
    Create,
    Edit {
        id: String,
        /// Absolute URL of the current image, if any.
        current_image: Option<String>,
    },
}

impl FormTarget {
    fn heading(&self) -> &'static str {
        match self {
            FormTarget::Create => "Add Team Member",
            FormTarget::Edit { .. } => "Edit Team Member",
        }
    }

    fn action(&self) -> String {
        match self {
            FormTarget::Create => ADMIN_BASE.to_string(),
            FormTarget::Edit { id, .. } => format!("{ADMIN_BASE}/{}", escape(id)),
        }
    }

    fn submit_label(&self) -> &'static str {
        match self {
            FormTarget::Create => "Create Team Member",
            FormTarget::Edit { .. } => "Update Team Member",
        }
    }
}

pub fn index_page(members: &[TeamMember], flash: Option<&str>, public_url: &str) -> String {
    let mut body = String::new();

    if let Some(flash) = flash {
        let _ = write!(body, r#"<p class="flash">{}</p>"#, escape(flash));
    }

    let _ = write!(
        body,
        r#"<p><a href="{ADMIN_BASE}/create">Add Team Member</a></p>"#
    );

    if members.is_empty() {
        body.push_str("<p>No team members yet.</p>");
        return layout("Team Members", &body);
    }

    body.push_str(
        "<table><thead><tr><th>Image</th><th>Name</th><th>Title</th><th>Phone</th><th></th></tr></thead><tbody>",
    );
    for member in members {
        let image = member
            .clone()
            .with_public_image_url(public_url)
            .profile_image
            .map(|url| format!(r#"<img src="{}" alt="" width="48">"#, escape(&url)))
            .unwrap_or_default();
        let id = escape(&member.id);

        let _ = write!(
            body,
            r#"<tr><td>{image}</td><td>{}</td><td>{}</td><td>{}</td><td><a href="{ADMIN_BASE}/{id}/edit">Edit</a> <form method="post" action="{ADMIN_BASE}/{id}/delete" style="display:inline"><button type="submit">Delete</button></form></td></tr>"#,
            escape(&member.name),
            escape(&member.title),
            escape(member.phone_number.as_deref().unwrap_or("")),
        );
    }
    body.push_str("</tbody></table>");

    layout("Team Members", &body)
}

pub fn member_form(target: &FormTarget, values: &MemberForm, errors: Option<&FieldErrors>) -> String {
    let mut body = String::new();

    let _ = write!(
        body,
        r#"<p><a href="{ADMIN_BASE}">Back to List</a></p><form method="post" action="{}" enctype="multipart/form-data">"#,
        target.action()
    );

    if let FormTarget::Edit {
        current_image: Some(url),
        ..
    } = target
    {
        let _ = write!(
            body,
            r#"<p><img src="{}" alt="Current image" width="96"></p>"#,
            escape(url)
        );
    }

    body.push_str(r#"<label for="profile_image">Profile Image</label><input type="file" name="profile_image" id="profile_image" accept="image/*">"#);
    field_errors(&mut body, errors, "profile_image");

    text_input(&mut body, errors, "name", "Name *", values.name.as_deref(), true);
    text_input(&mut body, errors, "title", "Title *", values.title.as_deref(), true);

    let _ = write!(
        body,
        r#"<label for="description">Description *</label><textarea name="description" id="description" rows="5" required>{}</textarea>"#,
        escape(values.description.as_deref().unwrap_or(""))
    );
    field_errors(&mut body, errors, "description");

    text_input(&mut body, errors, "telegram_link", "Telegram Link", values.telegram_link.as_deref(), false);
    text_input(&mut body, errors, "facebook_link", "Facebook Link", values.facebook_link.as_deref(), false);
    text_input(&mut body, errors, "phone_number", "Phone Number", values.phone_number.as_deref(), false);

    let _ = write!(
        body,
        r#"<button type="submit">{}</button></form>"#,
        target.submit_label()
    );

    layout(target.heading(), &body)
}

pub fn message_page(heading: &str, message: &str) -> String {
    layout(heading, &format!("<p>{}</p>", escape(message)))
}

fn text_input(
    body: &mut String,
    errors: Option<&FieldErrors>,
    name: &str,
    label: &str,
    value: Option<&str>,
    required: bool,
) {
    let _ = write!(
        body,
        r#"<label for="{name}">{label}</label><input type="text" name="{name}" id="{name}" value="{}"{}>"#,
        escape(value.unwrap_or("")),
        if required { " required" } else { "" }
    );
    field_errors(body, errors, name);
}

fn field_errors(body: &mut String, errors: Option<&FieldErrors>, field: &str) {
    let Some(messages) = errors.and_then(|e| e.get(field)) else {
        return;
    };
    for message in messages {
        let _ = write!(body, r#"<p class="error">{}</p>"#, escape(message));
    }
}

fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html><html lang="en"><head><meta charset="utf-8"><meta name="viewport" content="width=device-width, initial-scale=1"><title>{title} - Admin Dashboard</title></head><body><h1>{title}</h1>{body}</body></html>"#,
        title = escape(title),
    )
}

/// Escape text for HTML element content and attribute values.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<a href="x">Tom & 'Jerry'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; &#x27;Jerry&#x27;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_form_keeps_submitted_values_and_errors() {
        let values = MemberForm {
            name: Some("Ada <3".to_string()),
            description: Some("Writes programs".to_string()),
            ..Default::default()
        };
        let errors = FieldErrors::single("title", "The title field is required.");

        let html = member_form(&FormTarget::Create, &values, Some(&errors));
        assert!(html.contains(r#"value="Ada &lt;3""#));
        assert!(html.contains(">Writes programs</textarea>"));
        assert!(html.contains("The title field is required."));
        assert!(html.contains(r#"action="/admin/team-members""#));
    }

    #[test]
    fn test_edit_form_posts_to_member() {
        let target = FormTarget::Edit {
            id: "abc".to_string(),
            current_image: Some("http://localhost/storage/team-members/a.png".to_string()),
        };
        let html = member_form(&target, &MemberForm::default(), None);
        assert!(html.contains(r#"action="/admin/team-members/abc""#));
        assert!(html.contains("team-members/a.png"));
        assert!(html.contains("Update Team Member"));
    }

    #[test]
    fn test_index_page_lists_members_and_flash() {
        let now = chrono::Utc::now();
        let member = TeamMember {
            id: "m1".to_string(),
            name: "Grace".to_string(),
            title: "Admiral".to_string(),
            description: "x".to_string(),
            profile_image: None,
            telegram_link: None,
            facebook_link: None,
            phone_number: Some("555".to_string()),
            created_at: now,
            updated_at: now,
        };

        let html = index_page(&[member], Some("Team member created successfully."), "http://h");
        assert!(html.contains("Team member created successfully."));
        assert!(html.contains("<td>Grace</td>"));
        assert!(html.contains("/admin/team-members/m1/edit"));
        assert!(html.contains("/admin/team-members/m1/delete"));
    }
}
