//! crates/review_core/src/notify.rs
//!
//! Builds the two messages the workflow sends: one to the approver when a
//! request is created and one to the requester once it has been reviewed.

use crate::domain::ReviewRequest;
use crate::ports::Notification;

pub fn request_created(request: &ReviewRequest, link: &str) -> Notification {
    let link = escape_html(link);
    Notification {
        to: request.approver_email.clone(),
        subject: format!("New request pending review (Request ID: {})", request.id),
        html: format!(
            "<p>A new request is waiting for your review.</p>\n\
             <p>{}</p>\n\
             <a href=\"{link}\" target=\"_blank\">{link}</a>",
            escape_html(&request.subject),
        ),
    }
}

pub fn request_reviewed(request: &ReviewRequest, link: &str) -> Notification {
    let link = escape_html(link);
    Notification {
        to: request.requester_email.clone(),
        subject: format!("Your request has been reviewed (Request ID: {})", request.id),
        html: format!(
            "<p>Your request has been reviewed. The decisions are available at the link below.</p>\n\
             <a href=\"{link}\" target=\"_blank\">{link}</a>"
        ),
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
