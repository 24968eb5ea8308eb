use super::{Progress, ProgressObserver, XUK_NAMESPACE};
use crate::error::{ModelError, ModelResult};
use crate::ids::NodeId;
use crate::media::{Clip, Media, Size};
use crate::media_data::MediaData;
use crate::options::XukOptions;
use crate::presentation::Presentation;
use crate::project::Project;
use crate::property::{ChannelsProperty, Property, XmlProperty};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;
use tracing::{debug, instrument};
use url::Url;

type Attributes<'a> = Vec<(&'a str, String)>;

/// Emits XUK elements, polling the progress observer once per element.
struct XukWriter<'p, W: Write> {
    writer: Writer<W>,
    progress: &'p mut dyn ProgressObserver,
    count: usize,
}

impl<'p, W: Write> XukWriter<'p, W> {
    fn new(inner: W, options: &XukOptions, progress: &'p mut dyn ProgressObserver) -> Self {
        let writer = if options.pretty {
            Writer::new_with_indent(inner, b' ', options.indent)
        } else {
            Writer::new(inner)
        };
        Self {
            writer,
            progress,
            count: 0,
        }
    }

    fn tick(&mut self, name: &str) -> ModelResult<()> {
        self.count += 1;
        match self.progress.element(name, self.count) {
            Progress::Continue => Ok(()),
            Progress::Cancel => Err(ModelError::Cancelled),
        }
    }

    fn event(&mut self, event: Event<'_>) -> ModelResult<()> {
        self.writer
            .write_event(event)
            .map_err(ModelError::serialization)
    }

    fn element(name: &str, attributes: &Attributes<'_>) -> BytesStart<'static> {
        let mut start = BytesStart::new(name.to_string());
        for (key, value) in attributes {
            start.push_attribute((*key, value.as_str()));
        }
        start
    }

    fn start(&mut self, name: &str, attributes: Attributes<'_>) -> ModelResult<()> {
        self.tick(name)?;
        self.event(Event::Start(Self::element(name, &attributes)))
    }

    fn empty(&mut self, name: &str, attributes: Attributes<'_>) -> ModelResult<()> {
        self.tick(name)?;
        self.event(Event::Empty(Self::element(name, &attributes)))
    }

    fn end(&mut self, name: &str) -> ModelResult<()> {
        self.event(Event::End(BytesEnd::new(name.to_string())))
    }

    /// Element holding only text. Empty text is written as an empty element
    /// so indentation never leaks into the value.
    fn text_element(&mut self, name: &str, text: &str) -> ModelResult<()> {
        if text.is_empty() {
            return self.empty(name, Vec::new());
        }
        self.start(name, Vec::new())?;
        self.event(Event::Text(BytesText::new(text)))?;
        self.end(name)
    }

    /// Container element whose children are written by `body`; written empty
    /// when `has_children` is false.
    fn container(
        &mut self,
        name: &str,
        attributes: Attributes<'_>,
        has_children: bool,
        body: impl FnOnce(&mut Self) -> ModelResult<()>,
    ) -> ModelResult<()> {
        if !has_children {
            return self.empty(name, attributes);
        }
        self.start(name, attributes)?;
        body(self)?;
        self.end(name)
    }
}

#[instrument(skip_all, fields(base = %base_uri, presentations = project.presentations().len()))]
pub(crate) fn write_project<W: Write>(
    project: &Project,
    output: W,
    base_uri: &Url,
    options: &XukOptions,
    progress: &mut dyn ProgressObserver,
) -> ModelResult<()> {
    let mut w = XukWriter::new(output, options, progress);
    w.event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    w.start("Xuk", vec![("xmlns", XUK_NAMESPACE.to_string())])?;
    w.start("Project", Vec::new())?;
    w.container(
        "mPresentations",
        Vec::new(),
        !project.presentations().is_empty(),
        |w| {
            for presentation in project.presentations() {
                write_presentation(w, presentation, base_uri, options)?;
            }
            Ok(())
        },
    )?;
    w.end("Project")?;
    w.end("Xuk")?;

    debug!(elements = w.count, "wrote xuk document");
    Ok(())
}

fn write_presentation<W: Write>(
    w: &mut XukWriter<'_, W>,
    p: &Presentation,
    base_uri: &Url,
    options: &XukOptions,
) -> ModelResult<()> {
    let mut attributes = vec![("rootUri", relative_uri(base_uri, p.root_uri()))];
    if let Some(language) = p.language() {
        attributes.push(("language", language.to_string()));
    }
    w.start("Presentation", attributes)?;

    let channels = p.channels();
    w.container("mChannelsManager", Vec::new(), !channels.is_empty(), |w| {
        for channel in channels.channels() {
            let mut attributes = vec![
                ("uid", channel_uid(p, channel.id())?),
                ("name", channel.name().to_string()),
            ];
            if let Some(language) = channel.language() {
                attributes.push(("language", language.to_string()));
            }
            w.empty(channel.kind().xuk_local_name(), attributes)?;
        }
        Ok(())
    })?;

    let providers = p.data_providers();
    w.container(
        "mDataProviderManager",
        vec![("dataFileDirectoryPath", providers.data_directory().to_string())],
        !providers.is_empty(),
        |w| {
            for provider in providers.data_providers() {
                w.empty(
                    "FileDataProvider",
                    vec![
                        ("uid", data_provider_uid(p, provider.id())?),
                        ("dataFileRelativePath", provider.relative_path().to_string()),
                        ("mimeType", provider.mime_type().to_string()),
                    ],
                )?;
            }
            Ok(())
        },
    )?;

    let media_data = p.media_data();
    w.container("mMediaDataManager", Vec::new(), !media_data.is_empty(), |w| {
        for (id, data) in media_data.media_data() {
            let uid = media_data_uid(p, id)?;
            write_media_data(w, p, uid, data)?;
        }
        Ok(())
    })?;

    if options.write_undo_redo_manager {
        w.empty("mUndoRedoManager", Vec::new())?;
    }

    w.container("mMetadata", Vec::new(), !p.metadata().is_empty(), |w| {
        for metadata in p.metadata() {
            w.empty(
                "Metadata",
                vec![
                    ("name", metadata.name().to_string()),
                    ("content", metadata.content().to_string()),
                ],
            )?;
        }
        Ok(())
    })?;

    match p.root_node() {
        Some(root) => w.container("mRootNode", Vec::new(), true, |w| write_node(w, p, root))?,
        None => w.empty("mRootNode", Vec::new())?,
    }

    w.end("Presentation")
}

fn write_media_data<W: Write>(
    w: &mut XukWriter<'_, W>,
    p: &Presentation,
    uid: String,
    data: &MediaData,
) -> ModelResult<()> {
    match data {
        MediaData::WavAudio(wav) => {
            let attributes = vec![
                ("uid", uid),
                ("numberOfChannels", wav.pcm.number_of_channels.to_string()),
                ("sampleRate", wav.pcm.sample_rate.to_string()),
                ("bitDepth", wav.pcm.bit_depth.to_string()),
            ];
            w.container(data.xuk_local_name(), attributes, !wav.clips().is_empty(), |w| {
                w.container("mWavClips", Vec::new(), true, |w| {
                    for clip in wav.clips() {
                        let mut attributes = vec![("dataProvider", data_provider_uid(p, clip.data_provider)?)];
                        push_clip(&mut attributes, &clip.clip);
                        w.empty("WavClip", attributes)?;
                    }
                    Ok(())
                })
            })
        }
    }
}

fn write_node<W: Write>(w: &mut XukWriter<'_, W>, p: &Presentation, node: NodeId) -> ModelResult<()> {
    let tree = p.tree();
    let properties = tree.properties(node)?;
    let children = tree.children(node)?;

    w.container(
        "TreeNode",
        Vec::new(),
        !properties.is_empty() || !children.is_empty(),
        |w| {
            if !properties.is_empty() {
                w.container("mProperties", Vec::new(), true, |w| {
                    for property in properties {
                        match property {
                            Property::Channels(channels) => write_channels_property(w, p, channels)?,
                            Property::Xml(xml) => write_xml_property(w, xml)?,
                        }
                    }
                    Ok(())
                })?;
            }
            if !children.is_empty() {
                w.container("mChildren", Vec::new(), true, |w| {
                    for child in children {
                        write_node(w, p, *child)?;
                    }
                    Ok(())
                })?;
            }
            Ok(())
        },
    )
}

fn write_channels_property<W: Write>(
    w: &mut XukWriter<'_, W>,
    p: &Presentation,
    property: &ChannelsProperty,
) -> ModelResult<()> {
    w.container("ChannelsProperty", Vec::new(), !property.is_empty(), |w| {
        w.container("mChannelMappings", Vec::new(), true, |w| {
            for (channel, media) in property.mappings() {
                w.start("ChannelMapping", vec![("channel", channel_uid(p, channel)?)])?;
                write_media(w, p, media)?;
                w.end("ChannelMapping")?;
            }
            Ok(())
        })
    })
}

fn write_xml_property<W: Write>(w: &mut XukWriter<'_, W>, xml: &XmlProperty) -> ModelResult<()> {
    let attributes = vec![
        ("localName", xml.local_name().to_string()),
        ("namespaceUri", xml.namespace_uri().to_string()),
    ];
    w.container("XmlProperty", attributes, !xml.attributes().is_empty(), |w| {
        w.container("mXmlAttributes", Vec::new(), true, |w| {
            for attribute in xml.attributes() {
                w.empty(
                    "XmlAttribute",
                    vec![
                        ("localName", attribute.local_name.clone()),
                        ("namespaceUri", attribute.namespace_uri.clone()),
                        ("value", attribute.value.clone()),
                    ],
                )?;
            }
            Ok(())
        })
    })
}

fn write_media<W: Write>(w: &mut XukWriter<'_, W>, p: &Presentation, media: &Media) -> ModelResult<()> {
    let name = media.xuk_local_name();
    let mut attributes: Attributes<'_> = Vec::new();

    match media {
        Media::Text(text) => {
            push_language(&mut attributes, media);
            w.start(name, attributes)?;
            w.text_element("mText", &text.text)?;
            return w.end(name);
        }
        Media::Sequence(seq) => {
            attributes.push(("allowMultipleMediaTypes", seq.allows_multiple_types().to_string()));
            push_language(&mut attributes, media);
            return w.container(name, attributes, !seq.is_empty(), |w| {
                w.container("mSequence", Vec::new(), true, |w| {
                    for item in seq.items() {
                        write_media(w, p, item)?;
                    }
                    Ok(())
                })
            });
        }
        Media::ExternalText(m) => attributes.push(("src", src_value(&m.src))),
        Media::ExternalAudio(m) => {
            attributes.push(("src", src_value(&m.src)));
            push_clip(&mut attributes, &m.clip);
        }
        Media::ExternalVideo(m) => {
            attributes.push(("src", src_value(&m.src)));
            push_clip(&mut attributes, &m.clip);
            push_size(&mut attributes, &m.size);
        }
        Media::ExternalImage(m) => {
            attributes.push(("src", src_value(&m.src)));
            push_size(&mut attributes, &m.size);
        }
        Media::ManagedAudio(m) => attributes.push(("mediaData", media_data_uid(p, m.media_data)?)),
    }

    push_language(&mut attributes, media);
    w.empty(name, attributes)
}

fn push_language(attributes: &mut Attributes<'_>, media: &Media) {
    if let Some(language) = media.language() {
        attributes.push(("language", language.to_string()));
    }
}

fn push_clip(attributes: &mut Attributes<'_>, clip: &Clip) {
    attributes.push(("clipBegin", clip.begin().to_string()));
    attributes.push(("clipEnd", clip.end().to_string()));
}

fn push_size(attributes: &mut Attributes<'_>, size: &Size) {
    attributes.push(("width", size.width.to_string()));
    attributes.push(("height", size.height.to_string()));
}

fn src_value(src: &str) -> String {
    if src.is_empty() {
        ".".to_string()
    } else {
        src.to_string()
    }
}

/// Root URI as written: "." for the document's own directory, a relative
/// reference when it resolves back to `target`, the absolute URI otherwise.
fn relative_uri(base: &Url, target: &Url) -> String {
    if base.join(".").ok().as_ref() == Some(target) {
        return ".".to_string();
    }
    match base.make_relative(target) {
        Some(relative)
            if !relative.is_empty() && base.join(&relative).ok().as_ref() == Some(target) =>
        {
            relative
        }
        _ => target.to_string(),
    }
}

fn channel_uid(p: &Presentation, id: crate::ids::ChannelId) -> ModelResult<String> {
    p.channels()
        .position(id)
        .map(|i| format!("CH{i}"))
        .ok_or_else(|| ModelError::serialization(format!("unregistered channel {id}")))
}

fn data_provider_uid(p: &Presentation, id: crate::ids::DataProviderId) -> ModelResult<String> {
    p.data_providers()
        .position(id)
        .map(|i| format!("DP{i}"))
        .ok_or_else(|| ModelError::serialization(format!("unregistered data provider {id}")))
}

fn media_data_uid(p: &Presentation, id: crate::ids::MediaDataId) -> ModelResult<String> {
    p.media_data()
        .position(id)
        .map(|i| format!("MD{i}"))
        .ok_or_else(|| ModelError::serialization(format!("unregistered media data {id}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_root_uri() {
        let base = Url::parse("file:///books/moby/book.xuk").unwrap();
        let root = Url::parse("file:///books/moby/").unwrap();
        assert_eq!(relative_uri(&base, &root), ".");

        for target in ["file:///books/moby/content/", "file:///books/", "file:///other/place/"] {
            let target = Url::parse(target).unwrap();
            let written = relative_uri(&base, &target);
            assert_ne!(written, "/");
            assert_eq!(base.join(&written).unwrap(), target);
        }

        let elsewhere = Url::parse("http://example.com/content/").unwrap();
        assert_eq!(relative_uri(&base, &elsewhere), "http://example.com/content/");
    }

    #[test]
    fn test_empty_src_written_as_dot() {
        assert_eq!(src_value(""), ".");
        assert_eq!(src_value("audio/a.mp3"), "audio/a.mp3");
    }
}
