//! HTML widget for multi-file uploads.

use htmlescape::encode_minimal as escape_html;

use crate::defaults::MULTIPLE_TIP;
use crate::error::Result;
use crate::handle::FileHandle;
use crate::upload::{Upload, UploadedFiles};

const RESERVED_ATTRS: [&str; 3] = ["multiple", "type", "name"];

/// `<input type="file" multiple>` plus a list of the files already stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipleFileInput {
    attrs: Vec<(String, String)>,
}

impl MultipleFileInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extra attribute on the input. `multiple`, `type` and `name` are
    /// always set by the widget.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        if !RESERVED_ATTRS.contains(&key.as_str()) {
            self.attrs.push((key, value.into()));
        }
        self
    }

    /// Render the control. Existing files are listed only when every entry
    /// of `value` is committed; otherwise just the input is rendered.
    pub fn render(&self, name: &str, value: Option<&[FileHandle]>) -> Result<String> {
        let input = self.input_tag(name);
        let handles = match value {
            Some(handles) if !handles.is_empty() && handles.iter().all(FileHandle::is_committed) => {
                handles
            }
            _ => return Ok(format!("{}{}", input, MULTIPLE_TIP)),
        };

        let mut items = String::from("<ol>");
        for handle in handles {
            items.push_str(&format!(
                "<li> <a href=\"{}\">{}</a> </li>",
                escape_html(&handle.url()?),
                escape_html(&handle.to_string())
            ));
        }
        items.push_str("</ol>");

        Ok(format!(
            "{} {}<br/> Count : {}{}",
            input,
            MULTIPLE_TIP,
            handles.len(),
            items
        ))
    }

    /// Every upload submitted under `name`, or `None` when nothing was
    /// submitted at all.
    pub fn value_from_datadict(&self, files: &UploadedFiles, name: &str) -> Option<Vec<Upload>> {
        if files.is_empty() {
            return None;
        }
        files.get_list(name).map(<[Upload]>::to_vec)
    }

    fn input_tag(&self, name: &str) -> String {
        let mut tag = String::from("<input");
        for (key, value) in &self.attrs {
            tag.push_str(&format!(" {}=\"{}\"", key, escape_html(value)));
        }
        tag.push_str(&format!(
            " multiple type=\"file\" name=\"{}\" />",
            escape_html(name)
        ));
        tag
    }
}
