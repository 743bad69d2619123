pub mod constants;
pub mod string_utils;
pub mod url_utils;

pub use constants::*;
pub use string_utils::{collapse_whitespace, escape_markdown_label, sanitize_component};
pub use url_utils::{is_data_uri, parse_page_url, path_extension, resolve_url};
