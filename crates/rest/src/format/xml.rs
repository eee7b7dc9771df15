//! XML codec.
//!
//! Documents follow the Rails `to_xml` conventions:
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <books type="array">
//!   <book>
//!     <id type="integer">1</id>
//!     <title>Dune</title>
//!     <published_on type="date">1965-08-01</published_on>
//!     <author nil="true"/>
//!   </book>
//! </books>
//! ```
//!
//! Strings carry no `type` attribute. Decoding is driven by the model's
//! declared kinds; the `type` attribute is informational only.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use tracing::debug;

use crate::error::FormatError;
use crate::types::{FieldKind, Payload, Record, ResourceModel, Value};

/// A parsed element. Values are small, so the whole document is materialized.
#[derive(Debug, Default)]
struct Element {
    name: String,
    attributes: Vec<(String, String)>,
    children: Vec<Element>,
    text: String,
}

impl Element {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

pub(super) fn encode_record(
    model: &ResourceModel,
    record: &Record,
) -> Result<Vec<u8>, FormatError> {
    let mut writer = Writer::new(Vec::new());
    write_declaration(&mut writer)?;
    write_record(&mut writer, model, record)?;
    Ok(writer.into_inner())
}

pub(super) fn encode_collection(
    model: &ResourceModel,
    records: &[Record],
) -> Result<Vec<u8>, FormatError> {
    let mut writer = Writer::new(Vec::new());
    write_declaration(&mut writer)?;

    let mut start = BytesStart::new(model.storage_name());
    start.push_attribute(("type", "array"));
    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    for record in records {
        write_record(&mut writer, model, record)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(model.storage_name())))
        .map_err(xml_error)?;

    Ok(writer.into_inner())
}

pub(super) fn decode(model: &ResourceModel, body: &[u8]) -> Result<Payload, FormatError> {
    let root = parse_document(body)?;

    let is_collection = root.attr("type") == Some("array")
        || (root.name == model.storage_name() && root.name != model.name());

    if is_collection {
        root.children
            .iter()
            .map(|child| element_to_record(model, child))
            .collect::<Result<Vec<_>, _>>()
            .map(Payload::Many)
    } else if root.name == model.name() {
        element_to_record(model, &root).map(Payload::One)
    } else {
        Err(FormatError::UnexpectedShape(format!(
            "expected <{}> or <{}>, found <{}>",
            model.name(),
            model.storage_name(),
            root.name
        )))
    }
}

pub(super) fn decode_errors(body: &[u8]) -> Vec<String> {
    let Ok(root) = parse_document(body) else {
        return Vec::new();
    };
    let mut errors = Vec::new();
    collect_errors(&root, &mut errors);
    errors
}

fn collect_errors(element: &Element, errors: &mut Vec<String>) {
    if element.name == "error" {
        let text = element.text.trim();
        if !text.is_empty() {
            errors.push(text.to_string());
        }
    }
    for child in &element.children {
        collect_errors(child, errors);
    }
}

fn write_declaration(writer: &mut Writer<Vec<u8>>) -> Result<(), FormatError> {
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
        .map_err(xml_error)?;
    Ok(())
}

fn write_record(
    writer: &mut Writer<Vec<u8>>,
    model: &ResourceModel,
    record: &Record,
) -> Result<(), FormatError> {
    writer
        .write_event(Event::Start(BytesStart::new(model.name())))
        .map_err(xml_error)?;

    for (name, value) in record.iter() {
        if model.field(name).is_none() {
            continue;
        }

        let mut element = BytesStart::new(name.as_str());
        if let Some(kind) = value.kind().filter(|k| *k != FieldKind::String) {
            element.push_attribute(("type", kind.to_string().as_str()));
        }

        if value.is_null() {
            element.push_attribute(("nil", "true"));
            writer.write_event(Event::Empty(element)).map_err(xml_error)?;
            continue;
        }

        let text = value.to_text();
        writer.write_event(Event::Start(element)).map_err(xml_error)?;
        writer
            .write_event(Event::Text(BytesText::new(&text)))
            .map_err(xml_error)?;
        writer
            .write_event(Event::End(BytesEnd::new(name.as_str())))
            .map_err(xml_error)?;
    }

    writer
        .write_event(Event::End(BytesEnd::new(model.name())))
        .map_err(xml_error)?;
    Ok(())
}

fn parse_document(body: &[u8]) -> Result<Element, FormatError> {
    let mut reader = Reader::from_reader(body);
    // Whitespace inside string values is significant.
    reader.config_mut().trim_text(false);

    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(start) => stack.push(element_from_start(&start)?),
            Event::Empty(start) => {
                let element = element_from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| FormatError::Xml("unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(text.as_ref()));
                }
            }
            Event::CData(data) => {
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&String::from_utf8_lossy(data.as_ref()));
                }
            }
            Event::GeneralRef(reference) => {
                let resolved = match reference.resolve_char_ref().map_err(xml_error)? {
                    Some(ch) => ch.to_string(),
                    None => {
                        let name = String::from_utf8_lossy(reference.as_ref()).into_owned();
                        quick_xml::escape::resolve_predefined_entity(&name)
                            .ok_or_else(|| {
                                FormatError::Xml(format!("unknown entity &{};", name))
                            })?
                            .to_string()
                    }
                };
                if let Some(current) = stack.last_mut() {
                    current.text.push_str(&resolved);
                }
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctypes.
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(FormatError::Xml("unexpected end of document".to_string()));
    }
    root.ok_or_else(|| FormatError::UnexpectedShape("document has no root element".to_string()))
}

fn element_from_start(start: &BytesStart<'_>) -> Result<Element, FormatError> {
    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        attributes,
        ..Default::default()
    })
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<(), FormatError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => {
            return Err(FormatError::Xml(
                "document has more than one root element".to_string(),
            ));
        }
    }
    Ok(())
}

fn element_to_record(model: &ResourceModel, element: &Element) -> Result<Record, FormatError> {
    let mut record = Record::new();

    for child in &element.children {
        let Some(kind) = model.kind_of(&child.name) else {
            debug!(resource = model.name(), field = %child.name, "Ignoring undeclared field");
            continue;
        };
        if !child.children.is_empty() {
            return Err(FormatError::InvalidValue {
                field: child.name.clone(),
                message: "nested elements are not supported".to_string(),
            });
        }

        let value = if child.attr("nil") == Some("true") {
            Value::Null
        } else if kind != FieldKind::String && child.text.trim().is_empty() {
            Value::Null
        } else {
            kind.parse_text(&child.text).map_err(|message| FormatError::InvalidValue {
                field: child.name.clone(),
                message,
            })?
        };
        record.set(child.name.clone(), value);
    }

    Ok(record)
}

fn xml_error(err: impl std::fmt::Display) -> FormatError {
    FormatError::Xml(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> ResourceModel {
        ResourceModel::builder("book")
            .field("id", FieldKind::Integer)
            .field("title", FieldKind::String)
            .field("author", FieldKind::String)
            .field("available", FieldKind::Boolean)
            .build()
            .unwrap()
    }

    #[test]
    fn test_encode_record_layout() {
        let record = Record::new()
            .with("id", 1)
            .with("title", "Dune")
            .with("author", Value::Null);
        let body = String::from_utf8(encode_record(&book(), &record).unwrap()).unwrap();
        assert_eq!(
            body,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <book><author nil=\"true\"/><id type=\"integer\">1</id><title>Dune</title></book>"
        );
    }

    #[test]
    fn test_encode_escapes_text() {
        let record = Record::new().with("title", "Dungeons & <Dragons>");
        let body = String::from_utf8(encode_record(&book(), &record).unwrap()).unwrap();
        assert!(body.contains("<title>Dungeons &amp; &lt;Dragons&gt;</title>"));
    }

    #[test]
    fn test_decode_single_record() {
        let body = br#"<?xml version="1.0" encoding="UTF-8"?>
<book>
  <id type="integer">7</id>
  <title>  The &quot;Hobbit&quot; &#38; more </title>
  <author nil="true"/>
  <available type="boolean">true</available>
  <isbn>0-395</isbn>
</book>"#;
        let record = decode(&book(), body).unwrap().into_one().unwrap();
        assert_eq!(record.get("id"), Some(&Value::Integer(7)));
        assert_eq!(
            record.get("title"),
            Some(&Value::from("  The \"Hobbit\" & more "))
        );
        assert_eq!(record.get("author"), Some(&Value::Null));
        assert_eq!(record.get("available"), Some(&Value::Boolean(true)));
        assert!(!record.contains("isbn"));
    }

    #[test]
    fn test_decode_collection() {
        let body = br#"<books type="array">
  <book><id type="integer">1</id></book>
  <book><id type="integer">2</id></book>
</books>"#;
        let records = match decode(&book(), body).unwrap() {
            Payload::Many(records) => records,
            other => panic!("expected a collection, got {:?}", other),
        };
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].get("id"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_decode_empty_collection() {
        let payload = decode(&book(), br#"<books type="array"/>"#).unwrap();
        assert_eq!(payload, Payload::Many(Vec::new()));
    }

    #[test]
    fn test_decode_malformed() {
        assert!(matches!(
            decode(&book(), b"<book><id>1</id>"),
            Err(FormatError::Xml(_))
        ));
        assert!(matches!(
            decode(&book(), b"<book><id>1</title></book>"),
            Err(FormatError::Xml(_))
        ));
        assert!(matches!(
            decode(&book(), b"<book><id type=\"integer\">one</id></book>"),
            Err(FormatError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_foreign_root() {
        let page = b"<html><head><title>Bad Gateway</title></head><body/></html>";
        assert!(matches!(
            decode(&book(), page),
            Err(FormatError::UnexpectedShape(_))
        ));

        let plural = decode(&book(), b"<books><book><id>1</id></book></books>").unwrap();
        assert_eq!(plural.into_records().len(), 1);
    }

    #[test]
    fn test_decode_errors() {
        let body = br#"<?xml version="1.0" encoding="UTF-8"?>
<errors>
  <error>Title can't be blank</error>
  <error>Author is too short</error>
</errors>"#;
        assert_eq!(
            decode_errors(body),
            vec![
                "Title can't be blank".to_string(),
                "Author is too short".to_string()
            ]
        );
        assert!(decode_errors(b"<<<").is_empty());
    }
}
