//! Built-in tool catalog
//!
//! Static description of the tools a plan may reference: the planner lists
//! them, the request validator checks their required arguments, and the
//! projector copies their well-known outputs onto the blackboard.

/// Static contract for one catalog tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub required_args: &'static [&'static str],
    /// (output field, blackboard key)
    pub projections: &'static [(&'static str, &'static str)],
}

pub const EXTRACT_WEBPAGE: &str = "extract_webpage";
pub const EXTRACT_PDF: &str = "extract_pdf";
pub const CAPTION_IMAGE: &str = "caption_image";
pub const SHEETS_UPSERT: &str = "google_sheets_upsert";
pub const DRIVE_SHARE: &str = "google_drive_share";
pub const GMAIL_SEND: &str = "gmail_send";
pub const TELEGRAM_SEND: &str = "telegram_send";

pub const BUILTIN_TOOLS: &[ToolSpec] = &[
    ToolSpec {
        name: EXTRACT_WEBPAGE,
        description: "Fetch and convert a web page to Markdown, including table rows",
        required_args: &["url"],
        projections: &[("markdown", "extracted_content"), ("rows", "data_rows")],
    },
    ToolSpec {
        name: EXTRACT_PDF,
        description: "Convert a PDF document to Markdown",
        required_args: &["path"],
        projections: &[],
    },
    ToolSpec {
        name: CAPTION_IMAGE,
        description: "Generate an alt-text caption for an image",
        required_args: &["image_url_or_path"],
        projections: &[],
    },
    ToolSpec {
        name: SHEETS_UPSERT,
        description: "Create or update a spreadsheet with tabular rows",
        required_args: &["spreadsheet_title", "sheet_name", "rows"],
        projections: &[("spreadsheet_id", "spreadsheet_id"), ("sheet_url", "sheet_url")],
    },
    ToolSpec {
        name: DRIVE_SHARE,
        description: "Share a stored file and return a link",
        required_args: &["file_id"],
        projections: &[("link", "share_link")],
    },
    ToolSpec {
        name: GMAIL_SEND,
        description: "Send an email with optional HTML body and attachments",
        required_args: &["to", "subject"],
        projections: &[("message_id", "email_message_id")],
    },
    ToolSpec {
        name: TELEGRAM_SEND,
        description: "Send a message to a chat",
        required_args: &["chat_id", "text"],
        projections: &[],
    },
];

/// Look up a catalog entry by tool name
pub fn lookup(name: &str) -> Option<&'static ToolSpec> {
    BUILTIN_TOOLS.iter().find(|spec| spec.name == name)
}

pub fn is_known_tool(name: &str) -> bool {
    lookup(name).is_some()
}

pub fn tool_names() -> impl Iterator<Item = &'static str> {
    BUILTIN_TOOLS.iter().map(|spec| spec.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names_are_unique() {
        let mut names: Vec<_> = tool_names().collect();
        let total = names.len();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), total);
    }

    #[test]
    fn test_lookup_known_and_unknown() {
        assert_eq!(
            lookup(SHEETS_UPSERT).map(|s| s.required_args),
            Some(&["spreadsheet_title", "sheet_name", "rows"][..])
        );
        assert!(!is_known_tool("python"));
    }
}
