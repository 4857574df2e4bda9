//! SVG fragment measurement and vertical stacking.
//!
//! Fragments are read with a streaming XML parser. The root `<svg>` element
//! supplies the fragment's size and is re-emitted with `x`/`y` attributes so
//! the fragment nests inside a composite document. XML declarations and
//! doctypes are dropped because they are only valid at the top of a file.

use std::io::Write;

use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::reader::Reader;
use quick_xml::writer::Writer;
use tracing::{debug, warn};

use crate::consts::{
    FALLBACK_HEIGHT, FALLBACK_WIDTH, FRAGMENT_GAP, HORIZONTAL_PADDING, TOP_MARGIN,
};
use crate::error::ComposeError;

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// Declared size of a fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

/// Top-left corner of a placed fragment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Offset {
    pub x: f64,
    pub y: f64,
}

/// Canvas size and per-fragment offsets of a vertical stack.
#[derive(Debug, Clone, PartialEq)]
pub struct StackLayout {
    pub width: f64,
    pub height: f64,
    /// One offset per fragment, in input order.
    pub offsets: Vec<Offset>,
}

/// Parse the leading number of an SVG length (`"12.5pt"` -> `12.5`).
///
/// Returns `None` for values without a positive leading number.
fn parse_length(value: &str) -> Option<f64> {
    let value = value.trim();
    let end = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    value[..end]
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite() && *n > 0.0)
}

/// Read `width`/`height` from a root element, using fallbacks when either
/// is missing or unparseable.
fn dimensions_of(root: &BytesStart<'_>) -> Result<Dimensions, ComposeError> {
    let mut width = None;
    let mut height = None;
    for attr in root.attributes() {
        let attr = attr?;
        let value = std::str::from_utf8(&attr.value)?;
        match attr.key.as_ref() {
            b"width" => width = parse_length(value),
            b"height" => height = parse_length(value),
            _ => {}
        }
    }
    Ok(Dimensions {
        width: width.unwrap_or(FALLBACK_WIDTH),
        height: height.unwrap_or(FALLBACK_HEIGHT),
    })
}

/// Measure a fragment, reading it to the end so malformed markup is
/// rejected before any composition starts.
///
/// # Errors
///
/// Returns [`ComposeError::MissingRoot`] if the first element is not
/// `<svg>`, or an XML error if the document is malformed.
pub fn root_dimensions(svg: &str) -> Result<Dimensions, ComposeError> {
    let mut reader = Reader::from_str(svg);
    reader.config_mut().trim_text(false);

    let mut dimensions = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if dimensions.is_none() => {
                if e.local_name().as_ref() != b"svg" {
                    return Err(ComposeError::MissingRoot);
                }
                dimensions = Some(dimensions_of(&e)?);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    dimensions.ok_or(ComposeError::MissingRoot)
}

/// Compute a vertical stack: fragments are placed top to bottom in input
/// order, separated by a fixed gap, and the canvas is padded horizontally
/// around the widest fragment.
#[must_use]
pub fn stack_vertically(fragments: &[Dimensions]) -> StackLayout {
    let x = HORIZONTAL_PADDING / 2.0;
    let mut y = TOP_MARGIN;
    let mut max_width: f64 = 0.0;
    let mut offsets = Vec::with_capacity(fragments.len());

    for fragment in fragments {
        offsets.push(Offset { x, y });
        y += fragment.height + FRAGMENT_GAP;
        max_width = max_width.max(fragment.width);
    }

    StackLayout {
        width: max_width + HORIZONTAL_PADDING,
        height: y,
        offsets,
    }
}

/// Copy of `root` with `x`/`y` replaced by `offset`.
fn positioned(root: &BytesStart<'_>, offset: Offset) -> Result<BytesStart<'static>, ComposeError> {
    let name = std::str::from_utf8(root.name().as_ref())?.to_owned();
    let mut element = BytesStart::new(name);
    for attr in root.attributes() {
        let attr = attr?;
        if matches!(attr.key.as_ref(), b"x" | b"y") {
            continue;
        }
        element.push_attribute(attr);
    }
    element.push_attribute(("x", offset.x.to_string().as_str()));
    element.push_attribute(("y", offset.y.to_string().as_str()));
    Ok(element)
}

/// Stream `svg` into `writer` with its root element moved to `offset`.
fn write_translated<W: Write>(
    writer: &mut Writer<W>,
    svg: &str,
    offset: Offset,
) -> Result<(), ComposeError> {
    let mut reader = Reader::from_str(svg);
    reader.config_mut().trim_text(false);

    let mut seen_root = false;
    loop {
        match reader.read_event()? {
            Event::Eof => break,
            Event::Decl(_) | Event::DocType(_) => {}
            Event::Start(e) if !seen_root => {
                if e.local_name().as_ref() != b"svg" {
                    return Err(ComposeError::MissingRoot);
                }
                writer.write_event(Event::Start(positioned(&e, offset)?))?;
                seen_root = true;
            }
            Event::Empty(e) if !seen_root => {
                if e.local_name().as_ref() != b"svg" {
                    return Err(ComposeError::MissingRoot);
                }
                writer.write_event(Event::Empty(positioned(&e, offset)?))?;
                seen_root = true;
            }
            // Prolog whitespace, comments and processing instructions.
            _ if !seen_root => {}
            event => writer.write_event(event)?,
        }
    }

    if seen_root {
        Ok(())
    } else {
        Err(ComposeError::MissingRoot)
    }
}

/// Merge fragments into one SVG document stacked top to bottom.
///
/// The result has a white background rectangle followed by every fragment
/// in input order. Fragments that cannot be parsed are logged and left out.
///
/// # Errors
///
/// Returns an error only if serialization of an already validated fragment
/// fails.
pub fn compose_stack(fragments: &[&str]) -> Result<String, ComposeError> {
    let mut accepted = Vec::with_capacity(fragments.len());
    let mut dimensions = Vec::with_capacity(fragments.len());
    for (position, fragment) in fragments.iter().enumerate() {
        match root_dimensions(fragment) {
            Ok(d) => {
                accepted.push(*fragment);
                dimensions.push(d);
            }
            Err(e) => warn!(position, error = %e, "Skipping unparseable SVG fragment"),
        }
    }

    let layout = stack_vertically(&dimensions);
    debug!(
        fragments = accepted.len(),
        width = layout.width,
        height = layout.height,
        "Composing stacked SVG"
    );

    let width = layout.width.to_string();
    let height = layout.height.to_string();
    let view_box = format!("0 0 {width} {height}");

    let mut writer = Writer::new(Vec::new());
    let root = BytesStart::new("svg").with_attributes([
        ("xmlns", SVG_NAMESPACE),
        ("width", width.as_str()),
        ("height", height.as_str()),
        ("viewBox", view_box.as_str()),
    ]);
    writer.write_event(Event::Start(root))?;

    let background = BytesStart::new("rect").with_attributes([
        ("width", "100%"),
        ("height", "100%"),
        ("fill", "white"),
    ]);
    writer.write_event(Event::Empty(background))?;

    for (fragment, offset) in accepted.iter().zip(&layout.offsets) {
        write_translated(&mut writer, fragment, *offset)?;
    }

    writer.write_event(Event::End(BytesEnd::new("svg")))?;
    Ok(String::from_utf8(writer.into_inner())?)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn translate_root(svg: &str, offset: Offset) -> Result<String, ComposeError> {
        let mut writer = Writer::new(Vec::new());
        write_translated(&mut writer, svg, offset)?;
        Ok(String::from_utf8(writer.into_inner())?)
    }

    fn fragment(width: &str, height: &str, body: &str) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
             <!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \"http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd\">\n\
             <svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\">{body}</svg>"
        )
    }

    #[test]
    fn test_parse_length() {
        assert_eq!(parse_length("120"), Some(120.0));
        assert_eq!(parse_length("12.5pt"), Some(12.5));
        assert_eq!(parse_length(" 33px "), Some(33.0));
        assert_eq!(parse_length("100%"), Some(100.0));
        assert_eq!(parse_length("auto"), None);
        assert_eq!(parse_length(""), None);
        assert_eq!(parse_length("0"), None);
    }

    #[test]
    fn test_root_dimensions_declared() {
        let svg = fragment("180.5pt", "32pt", "<path d=\"M0 0\"/>");
        assert_eq!(
            root_dimensions(&svg).unwrap(),
            Dimensions {
                width: 180.5,
                height: 32.0
            }
        );
    }

    #[test]
    fn test_root_dimensions_fallbacks() {
        let svg = "<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"0 0 10 10\"><g/></svg>";
        assert_eq!(
            root_dimensions(svg).unwrap(),
            Dimensions {
                width: FALLBACK_WIDTH,
                height: FALLBACK_HEIGHT
            }
        );

        let svg = "<svg width=\"wide\" height=\"7\"/>";
        assert_eq!(
            root_dimensions(svg).unwrap(),
            Dimensions {
                width: FALLBACK_WIDTH,
                height: 7.0
            }
        );
    }

    #[test]
    fn test_root_dimensions_rejects_non_svg_root() {
        let err = root_dimensions("<html><svg/></html>").unwrap_err();
        assert!(matches!(err, ComposeError::MissingRoot));
    }

    #[test]
    fn test_root_dimensions_rejects_malformed() {
        assert!(root_dimensions("<svg width=\"1\"><g></svg>").is_err());
    }

    #[test]
    fn test_stack_layout_arithmetic() {
        let layout = stack_vertically(&[
            Dimensions {
                width: 100.0,
                height: 30.0,
            },
            Dimensions {
                width: 250.0,
                height: 45.0,
            },
            Dimensions {
                width: 80.0,
                height: 10.0,
            },
        ]);

        // 20 + (30 + 20) + (45 + 20) + (10 + 20)
        assert_eq!(layout.height, 165.0);
        assert_eq!(layout.width, 290.0);
        assert_eq!(
            layout.offsets,
            vec![
                Offset { x: 20.0, y: 20.0 },
                Offset { x: 20.0, y: 70.0 },
                Offset { x: 20.0, y: 135.0 },
            ]
        );
    }

    #[test]
    fn test_stack_layout_empty() {
        let layout = stack_vertically(&[]);
        assert_eq!(layout.width, HORIZONTAL_PADDING);
        assert_eq!(layout.height, TOP_MARGIN);
        assert!(layout.offsets.is_empty());
    }

    #[test]
    fn test_translate_root_strips_prolog_and_sets_offset() {
        let svg = fragment("10", "20", "<path d=\"M0 0L1 1\"/>");

        let translated = translate_root(&svg, Offset { x: 20.0, y: 70.0 }).unwrap();

        assert_eq!(
            translated,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"10\" height=\"20\" x=\"20\" y=\"70\">\
             <path d=\"M0 0L1 1\"/></svg>"
        );
    }

    #[test]
    fn test_translate_root_replaces_existing_position() {
        let svg = "<svg x=\"5\" y=\"6\" width=\"1\"><g/></svg>";

        let translated = translate_root(svg, Offset { x: 20.0, y: 40.5 }).unwrap();

        assert_eq!(
            translated,
            "<svg width=\"1\" x=\"20\" y=\"40.5\"><g/></svg>"
        );
    }

    #[test]
    fn test_translate_root_keeps_entities() {
        let svg = "<svg><text>a &lt; b</text></svg>";

        let translated = translate_root(svg, Offset { x: 1.0, y: 2.0 }).unwrap();

        assert_eq!(
            translated,
            "<svg x=\"1\" y=\"2\"><text>a &lt; b</text></svg>"
        );
    }

    #[test]
    fn test_compose_stack_two_fragments() {
        let first = fragment("100", "30", "<g id=\"first\"/>");
        let second = fragment("250", "45", "<g id=\"second\"/>");

        let composed = compose_stack(&[&first, &second]).unwrap();

        assert!(composed.starts_with(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"290\" height=\"135\" viewBox=\"0 0 290 135\">\
             <rect width=\"100%\" height=\"100%\" fill=\"white\"/>"
        ));
        assert!(composed.ends_with("</svg>"));
        assert!(!composed.contains("<?xml"));
        assert!(!composed.contains("DOCTYPE"));
        assert_eq!(composed.matches("<svg").count(), 3);

        let first_at = composed.find("id=\"first\"").unwrap();
        let second_at = composed.find("id=\"second\"").unwrap();
        assert!(first_at < second_at);
        assert!(composed.contains("width=\"100\" height=\"30\" x=\"20\" y=\"20\""));
        assert!(composed.contains("width=\"250\" height=\"45\" x=\"20\" y=\"70\""));
    }

    #[test]
    fn test_compose_stack_skips_malformed_fragment() {
        let good = fragment("100", "30", "<g/>");

        let composed = compose_stack(&["<svg><g></svg>", &good]).unwrap();

        // Only the valid fragment is placed, at the top margin.
        assert_eq!(composed.matches("<svg").count(), 2);
        assert!(composed.contains("x=\"20\" y=\"20\""));
        assert!(composed.contains("height=\"70\""));
    }

    #[test]
    fn test_compose_stack_empty_is_background_only() {
        let composed = compose_stack(&[]).unwrap();
        assert_eq!(
            composed,
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"40\" height=\"20\" viewBox=\"0 0 40 20\">\
             <rect width=\"100%\" height=\"100%\" fill=\"white\"/></svg>"
        );
    }
}
