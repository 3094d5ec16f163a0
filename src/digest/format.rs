//! Renders a list of emails into the text of one webhook embed.
//!
//! Embed descriptions are capped at [`MAX_DESCRIPTION_LEN`] characters. The list
//! stops growing once it passes [`SOFT_LIMIT`], which leaves room for the
//! "more emails" notice and the count line; anything still too long after
//! composition is cut hard.

use crate::domain::email::Email;
use crate::mail::decoders::strip_nul;

pub const MAX_DESCRIPTION_LEN: usize = 4096;
pub const SOFT_LIMIT: usize = 3500;
const HARD_TRUNCATE_AT: usize = 4090;

pub const SUBJECT_MAX: usize = 150;
pub const SNIPPET_MAX: usize = 200;

pub const NO_DETAILS: &str = "No email details available";
const UNKNOWN_SENDER: &str = "Unknown sender";
const NO_SUBJECT: &str = "(No subject)";
const NO_PREVIEW: &str = "(No preview available)";

const ELLIPSIS: &str = "...";
const DATE_FORMAT: &str = "%b %d, %-I:%M %p";

/// Count line followed by the rendered list, never longer than [`MAX_DESCRIPTION_LEN`].
pub fn compose_description(emails: &[Email]) -> String {
    let description = format!(
        "**Number of emails: {}**\n\n{}",
        emails.len(),
        render_email_list(emails)
    );

    if description.chars().count() > MAX_DESCRIPTION_LEN {
        let mut cut: String = description.chars().take(HARD_TRUNCATE_AT).collect();
        cut.push_str(ELLIPSIS);
        return cut;
    }
    description
}

/// One block per email, in the given order, stopping early past [`SOFT_LIMIT`].
pub fn render_email_list(emails: &[Email]) -> String {
    let mut out = String::new();
    let mut len = 0;

    for (i, email) in emails.iter().enumerate() {
        let block = render_block(i + 1, email);
        len += block.chars().count();
        out.push_str(&block);

        if len > SOFT_LIMIT {
            let remaining = emails.len() - i - 1;
            if remaining > 0 {
                out.push_str(&format!(
                    "*...and {remaining} more emails (list truncated)*\n"
                ));
            }
            break;
        }
    }

    if out.is_empty() {
        return NO_DETAILS.to_string();
    }
    out
}

fn render_block(index: usize, email: &Email) -> String {
    let from = non_empty_or(&email.from, UNKNOWN_SENDER);
    let subject = non_empty_or(&email.subject, NO_SUBJECT);
    let snippet = non_empty_or(&email.snippet, NO_PREVIEW);

    let mut block = format!(
        "**{index}.**\n**From:** {}\n**Subject:** {}\n**Summary:** {}\n",
        clean_email_address(from),
        truncate(subject, SUBJECT_MAX),
        truncate(snippet, SNIPPET_MAX),
    );
    if let Some(date) = email.date {
        block.push_str(&format!("**Date:** {}\n", date.format(DATE_FORMAT)));
    }
    block.push('\n');
    block
}

fn non_empty_or<'a>(value: &'a str, placeholder: &'a str) -> &'a str {
    if value.is_empty() { placeholder } else { value }
}

/// Strips NULs and cuts to `max_chars`, ending with `...` when something was cut.
pub fn truncate(s: &str, max_chars: usize) -> String {
    let s = strip_nul(s);
    if s.chars().count() <= max_chars {
        return s;
    }
    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let mut out: String = s.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

/// `"  Jane Doe   <jane@x.com>"` becomes `"Jane Doe <jane@x.com>"`; values without
/// an angle-bracket address are only stripped of NULs.
pub fn clean_email_address(raw: &str) -> String {
    let s = strip_nul(raw);
    if let (Some(start), Some(end)) = (s.find('<'), s.find('>'))
        && start < end
    {
        let name = s[..start].trim();
        let addr = &s[start..=end];
        if name.is_empty() {
            return addr.to_string();
        }
        return format!("{name} {addr}");
    }
    s
}
