//! Rewriting the project's `config.xml`.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

const ROOT_ELEMENT: &[u8] = b"widget";
const NAME_ELEMENT: &str = "name";

#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("malformed config.xml: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("cannot write config.xml: {0}")]
    Io(#[from] std::io::Error),

    #[error("config.xml has no <widget> root element")]
    MissingWidget,

    #[error("config.xml is not valid UTF-8")]
    Encoding,
}

/// Set the text of `<widget><name>` to `app_name`.
///
/// Inserts the element before `</widget>` when it is missing. Everything
/// else, including whitespace, comments and attributes, is written back
/// unchanged.
pub fn set_app_name(xml: &str, app_name: &str) -> Result<String, ManifestError> {
    let mut reader = Reader::from_str(xml);
    let mut writer = Writer::new(Vec::new());

    let mut depth = 0usize;
    let mut in_widget = false;
    let mut saw_widget = false;
    let mut name_written = false;
    let mut skipping_name = false;

    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Start(e) => {
                depth += 1;
                if skipping_name {
                    continue;
                }
                if depth == 1 && e.local_name().as_ref() == ROOT_ELEMENT {
                    in_widget = true;
                    saw_widget = true;
                }
                let is_name = in_widget
                    && depth == 2
                    && !name_written
                    && e.local_name().as_ref() == NAME_ELEMENT.as_bytes();
                writer.write_event(Event::Start(e))?;
                if is_name {
                    writer.write_event(Event::Text(BytesText::new(app_name)))?;
                    name_written = true;
                    skipping_name = true;
                }
            }
            Event::End(e) => {
                if skipping_name {
                    if depth == 2 {
                        skipping_name = false;
                        writer.write_event(Event::End(e))?;
                    }
                    depth -= 1;
                    continue;
                }
                if in_widget && depth == 1 {
                    if !name_written {
                        write_name_element(&mut writer, app_name)?;
                        name_written = true;
                    }
                    in_widget = false;
                }
                depth = depth.saturating_sub(1);
                writer.write_event(Event::End(e))?;
            }
            Event::Empty(e) => {
                if skipping_name {
                    continue;
                }
                if in_widget
                    && depth == 1
                    && !name_written
                    && e.local_name().as_ref() == NAME_ELEMENT.as_bytes()
                {
                    let end = e.to_end().into_owned();
                    writer.write_event(Event::Start(e))?;
                    writer.write_event(Event::Text(BytesText::new(app_name)))?;
                    writer.write_event(Event::End(end))?;
                    name_written = true;
                } else {
                    writer.write_event(Event::Empty(e))?;
                }
            }
            other => {
                if !skipping_name {
                    writer.write_event(other)?;
                }
            }
        }
    }

    if !saw_widget {
        return Err(ManifestError::MissingWidget);
    }
    String::from_utf8(writer.into_inner()).map_err(|_| ManifestError::Encoding)
}

fn write_name_element(writer: &mut Writer<Vec<u8>>, app_name: &str) -> Result<(), ManifestError> {
    writer.write_event(Event::Start(BytesStart::new(NAME_ELEMENT)))?;
    writer.write_event(Event::Text(BytesText::new(app_name)))?;
    writer.write_event(Event::End(BytesEnd::new(NAME_ELEMENT)))?;
    Ok(())
}
