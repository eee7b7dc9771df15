//! Body formats.
//!
//! Records travel as XML (the default, following the Rails `to_xml`
//! conventions) or JSON. Both codecs are driven by the [`ResourceModel`] so
//! that values decode to the declared [`FieldKind`](crate::types::FieldKind).
//!
//! | Format | MIME type | Path extension |
//! |--------|-----------|----------------|
//! | XML | `application/xml` | `.xml` |
//! | JSON | `application/json` | `.json` |

mod json;
mod xml;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FormatError;
use crate::types::{Payload, Record, ResourceModel};

/// Supported body formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// XML format (application/xml).
    #[default]
    Xml,
    /// JSON format (application/json).
    Json,
}

impl Format {
    /// Returns the MIME type string for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Format::Xml => "application/xml",
            Format::Json => "application/json",
        }
    }

    /// Returns the path extension appended to resource URLs.
    pub fn extension(&self) -> &'static str {
        match self {
            Format::Xml => "xml",
            Format::Json => "json",
        }
    }

    /// Detects the format of a `Content-Type` header value.
    ///
    /// Structured syntax suffixes are honored, so `application/atom+xml`
    /// is XML and `application/vnd.api+json` is JSON.
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let mime: mime::Mime = content_type.parse().ok()?;
        let subtype = mime.subtype();
        let suffix = mime.suffix();

        if subtype == mime::JSON || suffix == Some(mime::JSON) {
            Some(Format::Json)
        } else if subtype == mime::XML || suffix == Some(mime::XML) {
            Some(Format::Xml)
        } else {
            None
        }
    }

    /// Encodes a record as a request body.
    pub fn encode_record(
        &self,
        model: &ResourceModel,
        record: &Record,
    ) -> Result<Vec<u8>, FormatError> {
        match self {
            Format::Xml => xml::encode_record(model, record),
            Format::Json => json::encode_record(model, record),
        }
    }

    /// Encodes a collection of records, as a server would return it.
    pub fn encode_collection(
        &self,
        model: &ResourceModel,
        records: &[Record],
    ) -> Result<Vec<u8>, FormatError> {
        match self {
            Format::Xml => xml::encode_collection(model, records),
            Format::Json => json::encode_collection(model, records),
        }
    }

    /// Decodes a response body.
    ///
    /// An empty (or whitespace-only) body decodes to [`Payload::Empty`].
    pub fn decode(&self, model: &ResourceModel, body: &[u8]) -> Result<Payload, FormatError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Payload::Empty);
        }
        match self {
            Format::Xml => xml::decode(model, body),
            Format::Json => json::decode(model, body),
        }
    }

    /// Extracts validation messages from an error body.
    ///
    /// Unrecognized bodies yield no messages.
    pub fn decode_errors(&self, body: &[u8]) -> Vec<String> {
        match self {
            Format::Xml => xml::decode_errors(body),
            Format::Json => json::decode_errors(body),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xml" | "application/xml" | "text/xml" => Ok(Format::Xml),
            "json" | "application/json" => Ok(Format::Json),
            _ => Err(format!("unsupported format: {}", s)),
        }
    }
}
