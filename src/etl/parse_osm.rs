use std::fs;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use xz::bufread::XzDecoder;

use crate::data::osm::{Element, ElementType, Tag};
use crate::errors::{Error, Result};

/// Element stream over an .osm file on disk.
pub type OsmElements = ElementReader<Box<dyn BufRead>>;

/// Streams the top-level nodes, ways and relations of an OSM XML document.
///
/// Only the element currently being read is held in memory: its `tag` and `nd`
/// children are collected until the closing tag, then the finished element is
/// handed out and forgotten. Anything else in the document (bounds, relation
/// members, notes) is skipped. The first error ends the stream.
pub struct ElementReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    open: Option<Element>,
    open_depth: usize,
    depth: usize,
    seen_root: bool,
    finished: bool,
}

impl<R: BufRead> ElementReader<R> {
    pub fn new(source: R) -> ElementReader<R> {
        let mut reader = Reader::from_reader(source);
        reader.trim_text(true);

        ElementReader {
            reader,
            buf: Vec::new(),
            open: None,
            open_depth: 0,
            depth: 0,
            seen_root: false,
            finished: false,
        }
    }

    fn parse_element(element_type: ElementType, el: &BytesStart) -> Result<Element> {
        let mut element = Element::new(element_type);

        for attribute_res in el.attributes() {
            let attribute = attribute_res?;
            let slot = match attribute.key.as_ref() {
                b"id" => &mut element.id,
                b"lat" => &mut element.lat,
                b"lon" => &mut element.lon,
                b"visible" => &mut element.visible,
                b"changeset" => &mut element.created.changeset,
                b"uid" => &mut element.created.uid,
                b"user" => &mut element.created.user,
                b"version" => &mut element.created.version,
                b"timestamp" => &mut element.created.timestamp,
                _ => continue,
            };
            *slot = Some(attribute.unescape_value()?.into_owned());
        }

        Ok(element)
    }

    fn parse_tag(el: &BytesStart) -> Result<Tag> {
        let mut key: Option<String> = None;
        let mut value: Option<String> = None;

        for attribute_res in el.attributes() {
            let attribute = attribute_res?;
            match attribute.key.as_ref() {
                b"k" => key = Some(attribute.unescape_value()?.into_owned()),
                b"v" => value = Some(attribute.unescape_value()?.into_owned()),
                _ => (),
            }
        }

        match (key, value) {
            (Some(key), Some(value)) => Ok(Tag::new(key, value)),
            (None, _) => Err(Error::malformed("<tag> without a 'k' attribute")),
            (Some(key), None) => Err(Error::malformed(format!("<tag k=\"{}\"> without a 'v' attribute", key))),
        }
    }

    fn parse_node_ref(el: &BytesStart) -> Result<Option<String>> {
        for attribute_res in el.attributes() {
            let attribute = attribute_res?;
            if attribute.key.as_ref() == b"ref" {
                return Ok(Some(attribute.unescape_value()?.into_owned()));
            }
        }
        Ok(None)
    }

    fn parse_child(parent: &mut Element, el: &BytesStart) -> Result<()> {
        match el.name().as_ref() {
            b"tag" => parent.tags.push(Self::parse_tag(el)?),
            b"nd" if parent.element_type == ElementType::Way => {
                if let Some(node_ref) = Self::parse_node_ref(el)? {
                    parent.node_refs.push(node_ref);
                }
            },
            _ => (),
        }
        Ok(())
    }

    fn read_next(&mut self) -> Result<Option<Element>> {
        loop {
            self.buf.clear();
            let position = self.reader.buffer_position();
            let event = self.reader
                .read_event_into(&mut self.buf)
                .map_err(|err| Error::from(err).context(format_args!("byte {}", position)))?;

            match event {
                Event::Start(e) => {
                    self.depth += 1;
                    self.seen_root = true;
                    if self.open.is_none() {
                        if let Some(element_type) = ElementType::from_tag_name(e.name().as_ref()) {
                            self.open = Some(Self::parse_element(element_type, &e)?);
                            self.open_depth = self.depth;
                        }
                    } else if self.depth == self.open_depth + 1 {
                        // <tag k=".." v=".."></tag> is legal, if unusual.
                        if let Some(open) = self.open.as_mut() {
                            Self::parse_child(open, &e)?;
                        }
                    }
                },
                Event::Empty(e) => {
                    self.seen_root = true;
                    let depth = self.depth;
                    let open_depth = self.open_depth;
                    match self.open.as_mut() {
                        None => {
                            if let Some(element_type) = ElementType::from_tag_name(e.name().as_ref()) {
                                return Ok(Some(Self::parse_element(element_type, &e)?));
                            }
                        },
                        Some(open) if depth == open_depth => Self::parse_child(open, &e)?,
                        Some(_) => (),
                    }
                },
                Event::End(_e) => {
                    let closing_depth = self.depth;
                    self.depth = self.depth.saturating_sub(1);
                    if self.open.is_some() && closing_depth == self.open_depth {
                        return Ok(self.open.take());
                    }
                },
                Event::Eof => {
                    if self.depth > 0 || self.open.is_some() {
                        return Err(Error::malformed(format!(
                            "unexpected end of document at byte {}, {} element(s) still open",
                            self.reader.buffer_position(),
                            self.depth,
                        )));
                    }
                    if !self.seen_root {
                        return Err(Error::malformed("document has no root element"));
                    }
                    return Ok(None);
                },
                // Declarations, comments, text and the like carry nothing we keep.
                _ => (),
            }
        }
    }
}

impl<R: BufRead> Iterator for ElementReader<R> {
    type Item = Result<Element>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.read_next() {
            Ok(Some(element)) => Some(Ok(element)),
            Ok(None) => {
                self.finished = true;
                None
            },
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            },
        }
    }
}

/// Opens an .osm file for streaming. Files ending in `.xz` are decompressed on
/// the fly. The file handle lives inside the returned reader and is closed
/// when the reader is dropped.
pub fn open_osm(path: &Path) -> Result<OsmElements> {
    let file = fs::File::open(path)
        .map_err(|err| Error::from(err).context(path.display()))?;
    let file_reader = BufReader::new(file);
    let source: Box<dyn BufRead> = if path.extension().is_some_and(|ext| ext == "xz") {
        Box::new(BufReader::new(XzDecoder::new(file_reader)))
    } else {
        Box::new(file_reader)
    };

    Ok(ElementReader::new(source))
}
