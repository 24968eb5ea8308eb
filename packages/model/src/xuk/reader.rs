use super::{Progress, ProgressObserver, XUK_NAMESPACE};
use crate::error::{ModelError, ModelResult};
use crate::factory::NodeKind;
use crate::ids::{ChannelId, DataProviderId, MediaDataId, NodeId};
use crate::media::{Clip, Media, Size, Time};
use crate::media_data::{MediaData, PcmFormat};
use crate::metadata::Metadata;
use crate::presentation::Presentation;
use crate::property::{ChannelsProperty, Property, XmlProperty};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use std::collections::HashMap;
use std::io::BufRead;
use std::str::FromStr;
use tracing::{debug, instrument, warn};
use url::Url;

/// Owned copy of a start tag with its namespace resolved.
#[derive(Debug, Clone)]
struct Element {
    local_name: String,
    namespace: Option<String>,
    attributes: Vec<(String, String)>,
    empty: bool,
}

impl Element {
    fn is(&self, local_name: &str) -> bool {
        self.local_name == local_name && self.namespace.as_deref() == Some(XUK_NAMESPACE)
    }

    fn namespace_uri(&self) -> &str {
        self.namespace.as_deref().unwrap_or("")
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn required(&self, name: &str) -> ModelResult<&str> {
        self.attr(name).ok_or_else(|| {
            ModelError::deserialization(format!(
                "missing attribute {name:?} on <{}>",
                self.local_name
            ))
        })
    }

    /// Numeric attribute; absent or empty means `default`.
    fn number<T: FromStr>(&self, name: &str, default: T) -> ModelResult<T> {
        match self.attr(name).map(str::trim) {
            None | Some("") => Ok(default),
            Some(value) => value.parse().map_err(|_| {
                ModelError::deserialization(format!(
                    "invalid number {value:?} for {name:?} on <{}>",
                    self.local_name
                ))
            }),
        }
    }

    fn flag(&self, name: &str) -> ModelResult<bool> {
        match self.attr(name).map(str::trim) {
            None | Some("") | Some("false") | Some("0") => Ok(false),
            Some("true") | Some("1") => Ok(true),
            Some(value) => Err(ModelError::deserialization(format!(
                "invalid boolean {value:?} for {name:?}"
            ))),
        }
    }

    fn time(&self, name: &str) -> ModelResult<Time> {
        Time::parse_or_zero(self.attr(name).unwrap_or(""))
    }

    fn language(&self) -> Option<String> {
        self.attr("language")
            .filter(|l| !l.is_empty())
            .map(str::to_string)
    }

    /// `src` attribute; "." stands for an empty location.
    fn src(&self) -> String {
        match self.attr("src") {
            None | Some(".") => String::new(),
            Some(src) => src.to_string(),
        }
    }
}

fn to_element(namespace: &ResolveResult<'_>, start: &BytesStart<'_>, empty: bool) -> ModelResult<Element> {
    let namespace = match namespace {
        ResolveResult::Bound(ns) => Some(String::from_utf8_lossy(ns.as_ref()).into_owned()),
        ResolveResult::Unbound => None,
        ResolveResult::Unknown(prefix) => {
            return Err(ModelError::deserialization(format!(
                "unknown namespace prefix {:?}",
                String::from_utf8_lossy(prefix)
            )))
        }
    };

    let mut attributes = Vec::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(ModelError::deserialization)?;
        if attribute.key.as_namespace_binding().is_some() {
            continue;
        }
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        let value = attribute
            .unescape_value()
            .map_err(ModelError::deserialization)?
            .into_owned();
        attributes.push((key, value));
    }

    Ok(Element {
        local_name: String::from_utf8_lossy(start.local_name().as_ref()).into_owned(),
        namespace,
        attributes,
        empty,
    })
}

#[derive(Debug)]
enum Token {
    Start(Element),
    Text(String),
    End,
    Eof,
}

/// Uid table of one manager. A uid may be referenced before it is declared;
/// the handle is reserved on first sight.
#[derive(Debug)]
struct Uids<Id> {
    entries: HashMap<String, (Id, bool)>,
}

impl<Id: Copy> Uids<Id> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    fn reference(&mut self, uid: &str, reserve: impl FnOnce() -> Id) -> Id {
        if let Some((id, _)) = self.entries.get(uid) {
            return *id;
        }
        let id = reserve();
        self.entries.insert(uid.to_string(), (id, false));
        id
    }

    fn declare(&mut self, uid: &str, reserve: impl FnOnce() -> Id) -> ModelResult<Id> {
        match self.entries.get_mut(uid) {
            Some((_, true)) => Err(ModelError::DuplicateUid(uid.to_string())),
            Some((id, declared)) => {
                *declared = true;
                Ok(*id)
            }
            None => {
                let id = reserve();
                self.entries.insert(uid.to_string(), (id, true));
                Ok(id)
            }
        }
    }

    fn undeclared(&self) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, (_, declared))| !declared)
            .map(|(uid, _)| uid.as_str())
    }
}

struct XukReader<'p, R: BufRead> {
    reader: NsReader<R>,
    buf: Vec<u8>,
    progress: &'p mut dyn ProgressObserver,
    count: usize,
}

impl<'p, R: BufRead> XukReader<'p, R> {
    fn new(input: R, progress: &'p mut dyn ProgressObserver) -> Self {
        Self {
            reader: NsReader::from_reader(input),
            buf: Vec::new(),
            progress,
            count: 0,
        }
    }

    fn next_token(&mut self) -> ModelResult<Token> {
        loop {
            self.buf.clear();
            let (namespace, event) = self
                .reader
                .read_resolved_event_into(&mut self.buf)
                .map_err(ModelError::deserialization)?;
            let token = match event {
                Event::Start(start) => Token::Start(to_element(&namespace, &start, false)?),
                Event::Empty(start) => Token::Start(to_element(&namespace, &start, true)?),
                Event::Text(text) => Token::Text(
                    text.unescape()
                        .map_err(ModelError::deserialization)?
                        .into_owned(),
                ),
                Event::CData(data) => Token::Text(String::from_utf8_lossy(&data.into_inner()).into_owned()),
                Event::End(_) => Token::End,
                Event::Eof => Token::Eof,
                _ => continue,
            };
            return Ok(token);
        }
    }

    fn tick(&mut self, element: &Element) -> ModelResult<()> {
        self.count += 1;
        match self.progress.element(&element.local_name, self.count) {
            Progress::Continue => Ok(()),
            Progress::Cancel => Err(ModelError::Cancelled),
        }
    }

    /// Hand every child element of `parent` to `visit`, which must consume it.
    fn children<F>(&mut self, parent: &Element, mut visit: F) -> ModelResult<()>
    where
        F: FnMut(&mut Self, Element) -> ModelResult<()>,
    {
        if parent.empty {
            return Ok(());
        }
        loop {
            match self.next_token()? {
                Token::Start(element) => {
                    self.tick(&element)?;
                    visit(self, element)?;
                }
                Token::Text(_) => {}
                Token::End => return Ok(()),
                Token::Eof => return Err(unexpected_eof(&parent.local_name)),
            }
        }
    }

    /// Consume an element and everything below it.
    fn skip(&mut self, element: &Element) -> ModelResult<()> {
        if element.empty {
            return Ok(());
        }
        let mut depth = 1usize;
        while depth > 0 {
            match self.next_token()? {
                Token::Start(child) if !child.empty => depth += 1,
                Token::End => depth -= 1,
                Token::Eof => return Err(unexpected_eof(&element.local_name)),
                _ => {}
            }
        }
        Ok(())
    }

    fn skip_unknown(&mut self, element: &Element) -> ModelResult<()> {
        warn!(
            element = %element.local_name,
            namespace = element.namespace_uri(),
            "skipping unknown element"
        );
        self.skip(element)
    }

    /// Text content of an element; nested elements are ignored.
    fn text(&mut self, element: &Element) -> ModelResult<String> {
        let mut out = String::new();
        if element.empty {
            return Ok(out);
        }
        loop {
            match self.next_token()? {
                Token::Text(text) => out.push_str(&text),
                Token::Start(child) => self.skip(&child)?,
                Token::End => return Ok(out),
                Token::Eof => return Err(unexpected_eof(&element.local_name)),
            }
        }
    }
}

fn unexpected_eof(inside: &str) -> ModelError {
    ModelError::deserialization(format!("unexpected end of document inside <{inside}>"))
}

/// Presentation under construction plus the uid tables of its managers.
struct PresentationBuilder {
    presentation: Presentation,
    channels: Uids<ChannelId>,
    data_providers: Uids<DataProviderId>,
    media_data: Uids<MediaDataId>,
    root_read: bool,
}

impl PresentationBuilder {
    fn new(presentation: Presentation) -> Self {
        Self {
            presentation,
            channels: Uids::new(),
            data_providers: Uids::new(),
            media_data: Uids::new(),
            root_read: false,
        }
    }

    fn channel_ref(&mut self, uid: &str) -> ChannelId {
        let p = &mut self.presentation;
        self.channels.reference(uid, || p.channels_mut().reserve())
    }

    fn data_provider_ref(&mut self, uid: &str) -> DataProviderId {
        let p = &mut self.presentation;
        self.data_providers
            .reference(uid, || p.data_providers_mut().reserve())
    }

    fn media_data_ref(&mut self, uid: &str) -> MediaDataId {
        let p = &mut self.presentation;
        self.media_data.reference(uid, || p.media_data_mut().reserve())
    }

    fn finish(self) -> ModelResult<Presentation> {
        let dangling = self
            .channels
            .undeclared()
            .or_else(|| self.data_providers.undeclared())
            .or_else(|| self.media_data.undeclared());
        if let Some(uid) = dangling {
            return Err(ModelError::deserialization(format!(
                "reference to undeclared uid {uid:?}"
            )));
        }
        self.presentation.validate()?;
        Ok(self.presentation)
    }
}

#[instrument(skip_all, fields(base = %base_uri))]
pub(crate) fn read_project<R: BufRead>(
    input: R,
    base_uri: &Url,
    progress: &mut dyn ProgressObserver,
) -> ModelResult<Vec<Presentation>> {
    let mut r = XukReader::new(input, progress);

    let root = loop {
        match r.next_token()? {
            Token::Start(element) => break element,
            Token::Text(_) => {}
            Token::End | Token::Eof => {
                return Err(ModelError::deserialization("document has no root element"))
            }
        }
    };
    if !root.is("Xuk") {
        return Err(ModelError::deserialization(format!(
            "expected <Xuk> in {XUK_NAMESPACE}, found <{}>",
            root.local_name
        )));
    }
    r.tick(&root)?;

    let mut presentations = Vec::new();
    r.children(&root, |r, project| {
        if !project.is("Project") {
            return r.skip_unknown(&project);
        }
        r.children(&project, |r, list| {
            if !list.is("mPresentations") {
                return r.skip_unknown(&list);
            }
            r.children(&list, |r, element| {
                if !element.is("Presentation") {
                    return r.skip_unknown(&element);
                }
                presentations.push(read_presentation(r, &element, base_uri)?);
                Ok(())
            })
        })
    })?;

    debug!(
        elements = r.count,
        presentations = presentations.len(),
        "read xuk document"
    );
    Ok(presentations)
}

fn read_presentation<R: BufRead>(
    r: &mut XukReader<'_, R>,
    element: &Element,
    base_uri: &Url,
) -> ModelResult<Presentation> {
    let root_uri = match element.attr("rootUri") {
        Some(uri) if !uri.is_empty() => base_uri.join(uri),
        _ => base_uri.join("."),
    }
    .map_err(|e| ModelError::deserialization(format!("invalid rootUri: {e}")))?;

    let presentation = Presentation::new(root_uri);
    presentation.install_default_factories();
    let mut b = PresentationBuilder::new(presentation);
    b.presentation.set_language(element.language())?;

    r.children(element, |r, child| match child.local_name.as_str() {
        _ if child.namespace.as_deref() != Some(XUK_NAMESPACE) => r.skip_unknown(&child),
        "mChannelsManager" => read_channels(r, &mut b, &child),
        "mDataProviderManager" => read_data_providers(r, &mut b, &child),
        "mMediaDataManager" => read_media_data(r, &mut b, &child),
        "mUndoRedoManager" => r.skip(&child),
        "mMetadata" => read_metadata(r, &mut b, &child),
        "mRootNode" => read_root(r, &mut b, &child),
        _ => r.skip_unknown(&child),
    })?;

    b.finish()
}

fn read_channels<R: BufRead>(
    r: &mut XukReader<'_, R>,
    b: &mut PresentationBuilder,
    element: &Element,
) -> ModelResult<()> {
    r.children(element, |r, child| {
        let kind = b
            .presentation
            .channel_factory()?
            .create(&child.local_name, child.namespace_uri());
        let Some(kind) = kind else {
            return r.skip_unknown(&child);
        };
        let uid = child.required("uid")?;
        let p = &mut b.presentation;
        let id = b.channels.declare(uid, || p.channels_mut().reserve())?;
        p.channels_mut().insert_reserved(
            id,
            child.attr("name").unwrap_or_default().to_string(),
            kind,
            child.language(),
        )?;
        r.skip(&child)
    })
}

fn read_data_providers<R: BufRead>(
    r: &mut XukReader<'_, R>,
    b: &mut PresentationBuilder,
    element: &Element,
) -> ModelResult<()> {
    if let Some(directory) = element.attr("dataFileDirectoryPath").filter(|d| !d.is_empty()) {
        b.presentation.data_providers_mut().set_data_directory(directory)?;
    }
    r.children(element, |r, child| {
        let kind = b
            .presentation
            .data_provider_factory()?
            .create(&child.local_name, child.namespace_uri());
        if kind.is_none() {
            return r.skip_unknown(&child);
        }
        let uid = child.required("uid")?;
        let p = &mut b.presentation;
        let id = b
            .data_providers
            .declare(uid, || p.data_providers_mut().reserve())?;
        p.data_providers_mut().insert_reserved(
            id,
            child.required("dataFileRelativePath")?.to_string(),
            child.attr("mimeType").unwrap_or_default().to_string(),
        )?;
        r.skip(&child)
    })
}

fn read_media_data<R: BufRead>(
    r: &mut XukReader<'_, R>,
    b: &mut PresentationBuilder,
    element: &Element,
) -> ModelResult<()> {
    r.children(element, |r, child| {
        let data = b
            .presentation
            .media_data_factory()?
            .create(&child.local_name, child.namespace_uri());
        let Some(mut data) = data else {
            return r.skip_unknown(&child);
        };
        let uid = child.required("uid")?.to_string();

        match &mut data {
            MediaData::WavAudio(wav) => {
                let neutral = PcmFormat::default();
                wav.pcm = PcmFormat {
                    number_of_channels: child.number("numberOfChannels", neutral.number_of_channels)?,
                    sample_rate: child.number("sampleRate", neutral.sample_rate)?,
                    bit_depth: child.number("bitDepth", neutral.bit_depth)?,
                };
                r.children(&child, |r, clips| {
                    if !clips.is("mWavClips") {
                        return r.skip_unknown(&clips);
                    }
                    r.children(&clips, |r, clip| {
                        if !clip.is("WavClip") {
                            return r.skip_unknown(&clip);
                        }
                        let provider = b.data_provider_ref(clip.required("dataProvider")?);
                        wav.append_clip(provider, Clip::new(clip.time("clipBegin")?, clip.time("clipEnd")?)?);
                        r.skip(&clip)
                    })
                })?;
            }
        }

        let p = &mut b.presentation;
        let id = b.media_data.declare(&uid, || p.media_data_mut().reserve())?;
        p.media_data_mut().insert_reserved(id, data);
        Ok(())
    })
}

fn read_metadata<R: BufRead>(
    r: &mut XukReader<'_, R>,
    b: &mut PresentationBuilder,
    element: &Element,
) -> ModelResult<()> {
    r.children(element, |r, child| {
        if !child.is("Metadata") {
            return r.skip_unknown(&child);
        }
        let metadata = Metadata::new(
            child.required("name")?,
            child.attr("content").unwrap_or_default(),
        )?;
        b.presentation.add_metadata(metadata)?;
        r.skip(&child)
    })
}

fn read_root<R: BufRead>(
    r: &mut XukReader<'_, R>,
    b: &mut PresentationBuilder,
    element: &Element,
) -> ModelResult<()> {
    if element.empty {
        b.presentation.set_root_node(None)?;
        return Ok(());
    }
    r.children(element, |r, child| {
        if !is_tree_node(b, &child)? {
            return r.skip_unknown(&child);
        }
        if b.root_read {
            return Err(ModelError::deserialization("more than one root node"));
        }
        b.root_read = true;
        let root = match b.presentation.root_node() {
            Some(root) => root,
            None => {
                let root = b.presentation.create_node();
                b.presentation.set_root_node(Some(root))?;
                root
            }
        };
        read_node(r, b, root, &child)
    })?;
    if !b.root_read {
        b.presentation.set_root_node(None)?;
    }
    Ok(())
}

fn is_tree_node(b: &PresentationBuilder, element: &Element) -> ModelResult<bool> {
    let kind = b
        .presentation
        .node_factory()?
        .create(&element.local_name, element.namespace_uri());
    Ok(kind == Some(NodeKind::TreeNode))
}

fn read_node<R: BufRead>(
    r: &mut XukReader<'_, R>,
    b: &mut PresentationBuilder,
    node: NodeId,
    element: &Element,
) -> ModelResult<()> {
    r.children(element, |r, child| {
        if child.is("mProperties") {
            r.children(&child, |r, property| read_property(r, b, node, &property))
        } else if child.is("mChildren") {
            r.children(&child, |r, grandchild| {
                if !is_tree_node(b, &grandchild)? {
                    return r.skip_unknown(&grandchild);
                }
                let created = b.presentation.create_node();
                b.presentation.tree_mut().append_child(node, created)?;
                read_node(r, b, created, &grandchild)
            })
        } else {
            r.skip_unknown(&child)
        }
    })
}

fn read_property<R: BufRead>(
    r: &mut XukReader<'_, R>,
    b: &mut PresentationBuilder,
    node: NodeId,
    element: &Element,
) -> ModelResult<()> {
    let property = if element.is("XmlProperty") {
        Property::Xml(read_xml_property(r, element)?)
    } else {
        let created = b
            .presentation
            .property_factory()?
            .create(&element.local_name, element.namespace_uri());
        match created {
            Some(Property::Channels(mut channels)) => {
                read_channel_mappings(r, b, &mut channels, element)?;
                Property::Channels(channels)
            }
            Some(Property::Xml(xml)) => {
                r.skip(element)?;
                Property::Xml(xml)
            }
            None => return r.skip_unknown(element),
        }
    };
    b.presentation.tree_mut().add_property(node, property)
}

fn read_xml_property<R: BufRead>(r: &mut XukReader<'_, R>, element: &Element) -> ModelResult<XmlProperty> {
    let mut xml = XmlProperty::new(
        element.required("localName")?,
        element.attr("namespaceUri").unwrap_or_default(),
    )?;
    r.children(element, |r, child| {
        if !child.is("mXmlAttributes") {
            return r.skip_unknown(&child);
        }
        r.children(&child, |r, attribute| {
            if !attribute.is("XmlAttribute") {
                return r.skip_unknown(&attribute);
            }
            xml.set_attribute(
                attribute.required("localName")?,
                attribute.attr("namespaceUri").unwrap_or_default(),
                attribute.attr("value").unwrap_or_default(),
            )?;
            r.skip(&attribute)
        })
    })?;
    Ok(xml)
}

fn read_channel_mappings<R: BufRead>(
    r: &mut XukReader<'_, R>,
    b: &mut PresentationBuilder,
    property: &mut ChannelsProperty,
    element: &Element,
) -> ModelResult<()> {
    r.children(element, |r, child| {
        if !child.is("mChannelMappings") {
            return r.skip_unknown(&child);
        }
        r.children(&child, |r, mapping| {
            if !mapping.is("ChannelMapping") {
                return r.skip_unknown(&mapping);
            }
            let channel = b.channel_ref(mapping.required("channel")?);
            let mut media = None;
            r.children(&mapping, |r, item| {
                if media.is_some() {
                    warn!(element = %item.local_name, "ignoring extra media in channel mapping");
                    return r.skip(&item);
                }
                media = read_media(r, b, &item)?;
                Ok(())
            })?;
            if let Some(media) = media {
                property.set_media(channel, media);
            }
            Ok(())
        })
    })
}

/// Reads one media element. Returns `None` for unknown elements, which are
/// skipped.
fn read_media<R: BufRead>(
    r: &mut XukReader<'_, R>,
    b: &mut PresentationBuilder,
    element: &Element,
) -> ModelResult<Option<Media>> {
    let created = b
        .presentation
        .media_factory()?
        .create(&element.local_name, element.namespace_uri());
    let Some(mut media) = created else {
        r.skip_unknown(element)?;
        return Ok(None);
    };

    match &mut media {
        Media::Text(text) => {
            r.children(element, |r, child| {
                if child.is("mText") {
                    text.text = r.text(&child)?;
                    Ok(())
                } else {
                    r.skip_unknown(&child)
                }
            })?;
        }
        Media::Sequence(seq) => {
            seq.set_allow_multiple_types(element.flag("allowMultipleMediaTypes")?)?;
            r.children(element, |r, child| {
                if !child.is("mSequence") {
                    return r.skip_unknown(&child);
                }
                r.children(&child, |r, item| {
                    if let Some(item) = read_media(r, b, &item)? {
                        seq.append(item)?;
                    }
                    Ok(())
                })
            })?;
        }
        Media::ExternalText(m) => {
            m.src = element.src();
            r.skip(element)?;
        }
        Media::ExternalAudio(m) => {
            m.src = element.src();
            m.clip = Clip::new(element.time("clipBegin")?, element.time("clipEnd")?)?;
            r.skip(element)?;
        }
        Media::ExternalVideo(m) => {
            m.src = element.src();
            m.clip = Clip::new(element.time("clipBegin")?, element.time("clipEnd")?)?;
            m.size = Size::new(element.number("width", 0)?, element.number("height", 0)?);
            r.skip(element)?;
        }
        Media::ExternalImage(m) => {
            m.src = element.src();
            m.size = Size::new(element.number("width", 0)?, element.number("height", 0)?);
            r.skip(element)?;
        }
        Media::ManagedAudio(m) => {
            m.media_data = b.media_data_ref(element.required("mediaData")?);
            r.skip(element)?;
        }
    }

    media.set_language(element.language());
    Ok(Some(media))
}
