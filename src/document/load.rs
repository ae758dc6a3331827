use crate::document::model::SlideDocument;
use crate::document::validate::{lint_document, validate_document};
use crate::foundation::error::{SlideError, SlideResult};
use crate::foundation::warning::AuthoringWarning;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

impl SlideDocument {
    /// Parse a slide document from a JSON reader. Does not validate.
    pub fn from_reader<R: std::io::Read>(r: R) -> SlideResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| SlideError::serde(format!("parse slide document JSON: {e}")))
    }

    /// Parse a slide document from a JSON string. Does not validate.
    pub fn from_json_str(s: &str) -> SlideResult<Self> {
        serde_json::from_str(s)
            .map_err(|e| SlideError::serde(format!("parse slide document JSON: {e}")))
    }

    /// Parse a slide document from a JSON file on disk. Does not validate.
    pub fn from_path(path: impl AsRef<Path>) -> SlideResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            SlideError::validation(format!("open slide document '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Parse and validate in one go.
    pub fn load(path: impl AsRef<Path>) -> SlideResult<Self> {
        let doc = Self::from_path(path)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Check the structural invariants the runtime relies on.
    pub fn validate(&self) -> SlideResult<()> {
        validate_document(self)
            .map_err(|e| SlideError::validation(format!("slide document is invalid:\n{e}")))
    }

    /// Authoring problems that do not prevent mounting.
    pub fn lint(&self) -> Vec<AuthoringWarning> {
        lint_document(self)
    }
}
