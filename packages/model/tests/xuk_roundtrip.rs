//! XUK persistence
//!
//! This tests:
//! - Read after write yields an equal presentation (memory, files, foreign root)
//! - Attribute values are written in their documented literal form
//! - Truncated and malformed documents fail without touching the project
//! - Unknown elements are skipped with their subtree
//! - Progress observers can cancel reads and writes

use std::io::{Read, Write};
use url::Url;
use xuk_model::xuk::{NoProgress, Progress, XUK_NAMESPACE};
use xuk_model::{
    ChannelKind, Clip, ExternalVideoMedia, Media, Metadata, ModelError, PcmFormat, Presentation,
    Project, SequenceMedia, Size, Time, ValueEquals, WavAudioMediaData, XmlProperty,
};

fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

/// Fills a presentation with every media kind, metadata, xml properties and
/// managed audio backed by a data provider.
fn populate(p: &mut Presentation) {
    p.set_language(Some("en".into())).unwrap();
    p.add_metadata(Metadata::new("dc:title", "Moby Dick").unwrap()).unwrap();
    p.add_metadata(Metadata::new("dc:creator", "Herman Melville").unwrap()).unwrap();

    let channels = p.channels_mut();
    let text = channels.add_channel("text", ChannelKind::Text).unwrap();
    let audio = channels.add_channel("audio", ChannelKind::Audio).unwrap();
    let video = channels.add_channel("video", ChannelKind::Video).unwrap();
    let image = channels.add_channel("image", ChannelKind::Image).unwrap();
    let any = channels.add_channel("notes", ChannelKind::Generic).unwrap();
    channels.set_channel_language(text, Some("en-GB".into())).unwrap();

    let provider = p.data_providers_mut().create_file_data_provider("audio/x-wav").unwrap();
    let mut wav = WavAudioMediaData::new(PcmFormat {
        number_of_channels: 2,
        sample_rate: 22050,
        bit_depth: 16,
    });
    wav.append_clip(provider, Clip::new(Time::zero(), Time::from_millis(1500)).unwrap());
    wav.append_clip(provider, Clip::new(Time::from_secs(2), Time::from_secs(3)).unwrap());
    let data = p.media_data_mut().add(wav);

    let root = p.root_node().unwrap();
    let mut book = XmlProperty::new("book", "http://www.daisy.org/z3986/2005/dtbook/").unwrap();
    book.set_attribute("lang", "http://www.w3.org/XML/1998/namespace", "en").unwrap();
    p.tree_mut().add_property(root, book.into()).unwrap();

    let chapter = p.create_node();
    p.tree_mut().append_child(root, chapter).unwrap();
    let mut heading = Media::text("Chapter 1. Loomings.");
    heading.set_language(Some("en".into()));
    p.set_media(chapter, text, heading).unwrap();
    p.set_media(chapter, audio, Media::managed_audio(data)).unwrap();

    let paragraph = p.create_node();
    p.tree_mut().append_child(chapter, paragraph).unwrap();
    p.set_media(paragraph, text, Media::text("  Call me Ishmael. <Some> years ago & more  ")).unwrap();
    let mut narration = SequenceMedia::new(false);
    narration
        .append(Media::external_audio(
            "audio/ch1.mp3",
            Clip::new(Time::zero(), Time::from_millis(250)).unwrap(),
        ))
        .unwrap();
    narration
        .append(Media::external_audio(
            "audio/ch1.mp3",
            Clip::new(Time::from_secs(1), Time::from_micros(1_234_567)).unwrap(),
        ))
        .unwrap();
    p.set_media(paragraph, audio, Media::Sequence(narration)).unwrap();

    let figure = p.create_node();
    p.tree_mut().append_child(root, figure).unwrap();
    p.set_media(figure, image, Media::external_image("img/whale.png", Size::new(640, 480)))
        .unwrap();
    p.set_media(
        figure,
        video,
        ExternalVideoMedia {
            src: "video/whale.mp4".into(),
            clip: Clip::new(Time::zero(), Time::from_secs(12)).unwrap(),
            size: Size::new(1920, 1080),
            language: None,
        }
        .into(),
    )
    .unwrap();
    let mut mixed = SequenceMedia::new(true);
    mixed.append(Media::text("caption")).unwrap();
    mixed.append(Media::external_image("", Size::new(1, 1))).unwrap();
    p.set_media(figure, any, Media::Sequence(mixed)).unwrap();

    // Empty text and an empty leaf node.
    let blank = p.create_node();
    p.tree_mut().append_child(root, blank).unwrap();
    p.set_media(blank, text, Media::text("")).unwrap();
    let leaf = p.create_node();
    p.tree_mut().append_child(root, leaf).unwrap();
}

fn write(project: &Project, base: &Url) -> Vec<u8> {
    let mut out = Vec::new();
    project.write_xuk(&mut out, base, &mut NoProgress).unwrap();
    out
}

fn read(bytes: &[u8], base: &Url) -> Project {
    let mut project = Project::new();
    project.read_xuk(bytes, base, &mut NoProgress).unwrap();
    project
}

#[test]
fn test_round_trip_in_memory() {
    let base = url("file:///tmp/moby/book.xuk");
    let mut project = Project::new();
    populate(project.add_new_presentation(url("file:///tmp/moby/")).unwrap());

    let bytes = write(&project, &base);
    assert!(String::from_utf8(bytes.clone()).unwrap().contains(r#"rootUri=".""#));
    let reread = read(&bytes, &base);

    assert_eq!(reread.len(), 1);
    assert!(project.value_equals(&reread));
    let (a, b) = (project.presentation(0).unwrap(), reread.presentation(0).unwrap());
    assert_eq!(a.root_uri(), b.root_uri());
    assert_eq!(a.summary().to_json().unwrap(), b.summary().to_json().unwrap());

    // Writing the re-read project reproduces the document byte for byte.
    assert_eq!(write(&reread, &base), bytes);
}

#[test]
fn test_round_trip_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let root = Url::from_directory_path(dir.path()).unwrap();
    let file = root.join("book.xuk").unwrap();

    let mut project = Project::new();
    let p = project.add_new_presentation(root.clone()).unwrap();
    populate(p);
    let provider = p.data_providers().data_providers().next().unwrap().id();
    p.data_providers()
        .open_output_stream(provider)
        .unwrap()
        .write_all(b"RIFF....WAVE")
        .unwrap();
    project.save_xuk(&file).unwrap();

    let mut reopened = Project::new();
    reopened.open_xuk(&file).unwrap();
    assert!(project.value_equals(&reopened));

    let p = reopened.presentation(0).unwrap();
    assert_eq!(p.root_uri(), &root);
    let provider = p.data_providers().data_providers().next().unwrap().id();
    let mut bytes = Vec::new();
    p.data_providers()
        .open_input_stream(provider)
        .unwrap()
        .read_to_end(&mut bytes)
        .unwrap();
    assert_eq!(bytes, b"RIFF....WAVE");
}

#[test]
fn test_foreign_root_uri_is_kept_absolute() {
    let base = url("file:///tmp/moby/book.xuk");
    let mut project = Project::new();
    project
        .add_new_presentation(url("http://example.com/content/"))
        .unwrap();

    let bytes = write(&project, &base);
    let text = String::from_utf8(bytes.clone()).unwrap();
    assert!(text.contains(r#"rootUri="http://example.com/content/""#));

    let reread = read(&bytes, &base);
    assert_eq!(
        reread.presentation(0).unwrap().root_uri().as_str(),
        "http://example.com/content/"
    );
}

#[test]
fn test_relative_root_uri_is_rebased_on_read() {
    let mut project = Project::new();
    populate(project.add_new_presentation(url("file:///tmp/moby/")).unwrap());
    let bytes = write(&project, &url("file:///tmp/moby/book.xuk"));

    let moved = read(&bytes, &url("file:///srv/archive/book.xuk"));
    assert_eq!(
        moved.presentation(0).unwrap().root_uri().as_str(),
        "file:///srv/archive/"
    );
    assert!(project.value_equals(&moved));
}

#[test]
fn test_truncated_document_fails_and_keeps_project() {
    let base = url("file:///tmp/moby/book.xuk");
    let mut project = Project::new();
    populate(project.add_new_presentation(url("file:///tmp/moby/")).unwrap());
    let bytes = write(&project, &base);

    let mut target = Project::new();
    target.add_new_presentation(url("file:///tmp/other/")).unwrap();
    let err = target
        .read_xuk(&bytes[..bytes.len() / 2], &base, &mut NoProgress)
        .unwrap_err();
    assert!(matches!(err, ModelError::Deserialization(_)));
    assert_eq!(target.len(), 1);
    assert_eq!(target.presentation(0).unwrap().root_uri().as_str(), "file:///tmp/other/");
}

#[test]
fn test_unknown_elements_are_skipped() {
    let xml = format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<Xuk xmlns="{XUK_NAMESPACE}" xmlns:ext="urn:example:ext">
  <ext:Annotation><ext:Note>ignored</ext:Note></ext:Annotation>
  <Project>
    <mPresentations>
      <Presentation rootUri="." language="fr">
        <mFutureManager><Whatever deep="yes"><Deeper/></Whatever></mFutureManager>
        <mMetadata><Metadata name="dc:title" content="Titre"/><ext:Metadata name="x"/></mMetadata>
        <mChannelsManager><TextChannel uid="CH0" name="texte"/><HologramChannel uid="CH1" name="h"/></mChannelsManager>
        <mRootNode>
          <TreeNode>
            <mProperties>
              <ext:CustomProperty/>
              <ChannelsProperty><mChannelMappings>
                <ChannelMapping channel="CH0"><TextMedia><mText>Bonjour</mText><ext:Extra/></TextMedia></ChannelMapping>
              </mChannelMappings></ChannelsProperty>
            </mProperties>
            <mChildren><ext:Node/><TreeNode/></mChildren>
          </TreeNode>
        </mRootNode>
      </Presentation>
    </mPresentations>
  </Project>
</Xuk>"#
    );
    let project = read(xml.as_bytes(), &url("file:///tmp/fr/book.xuk"));
    let p = project.presentation(0).unwrap();

    assert_eq!(p.language(), Some("fr"));
    assert_eq!(p.metadata().len(), 1);
    assert_eq!(p.channels().len(), 1);
    let root = p.root_node().unwrap();
    assert_eq!(p.tree().child_count(root).unwrap(), 1);
    let texte = p.channels().channel_by_name("texte").unwrap().id();
    assert_eq!(p.media(root, texte).unwrap(), &Media::text("Bonjour"));
}

#[test]
fn test_empty_presentation_keeps_default_root() {
    let base = url("file:///tmp/empty/book.xuk");
    let mut project = Project::new();
    project.add_new_presentation(url("file:///tmp/empty/")).unwrap();

    let bytes = write(&project, &base);
    assert!(!String::from_utf8(bytes.clone()).unwrap().contains("<mRootNode/>"));

    let reread = read(&bytes, &base);
    let p = reread.presentation(0).unwrap();
    let root = p.root_node().unwrap();
    assert_eq!(p.tree().child_count(root).unwrap(), 0);
    assert_eq!(p.tree().parent(root).unwrap(), None);
    assert!(p.metadata().is_empty());
    assert!(project.value_equals(&reread));
}

#[test]
fn test_external_audio_attributes_are_written_literally() {
    let base = url("file:///tmp/clip/book.xuk");
    let mut project = Project::new();
    let p = project.add_new_presentation(url("file:///tmp/clip/")).unwrap();
    let audio = p.channels_mut().add_channel("audio", ChannelKind::Audio).unwrap();
    let root = p.root_node().unwrap();
    let clip = Clip::new(Time::zero(), Time::from_secs(10)).unwrap();
    p.set_media(root, audio, Media::external_audio("audio/a.mp3", clip))
        .unwrap();

    let bytes = write(&project, &base);
    let text = String::from_utf8(bytes.clone()).unwrap();
    assert!(text.contains(r#"src="audio/a.mp3""#));
    assert!(text.contains(r#"clipBegin="0s""#));
    assert!(text.contains(r#"clipEnd="10s""#));

    let reread = read(&bytes, &base);
    assert!(project.value_equals(&reread));
    let p = reread.presentation(0).unwrap();
    let audio = p.channels().channel_by_name("audio").unwrap().id();
    assert_eq!(
        p.media(p.root_node().unwrap(), audio).unwrap(),
        &Media::external_audio("audio/a.mp3", clip)
    );
}

#[test]
fn test_empty_root_node_element_means_no_root() {
    let xml = format!(
        r#"<Xuk xmlns="{XUK_NAMESPACE}"><Project><mPresentations>
<Presentation rootUri="."><mRootNode/></Presentation>
</mPresentations></Project></Xuk>"#
    );
    let project = read(xml.as_bytes(), &url("file:///tmp/empty/book.xuk"));
    assert_eq!(project.presentation(0).unwrap().root_node(), None);

    let written = String::from_utf8(write(&project, &url("file:///tmp/empty/book.xuk"))).unwrap();
    assert!(written.contains("<mRootNode/>"));
}

#[test]
fn test_invalid_time_is_a_deserialization_error() {
    let xml = format!(
        r#"<Xuk xmlns="{XUK_NAMESPACE}"><Project><mPresentations><Presentation>
<mChannelsManager><AudioChannel uid="CH0" name="audio"/></mChannelsManager>
<mRootNode><TreeNode><mProperties><ChannelsProperty><mChannelMappings>
<ChannelMapping channel="CH0"><ExternalAudioMedia src="a.mp3" clipBegin="soon" clipEnd="1s"/></ChannelMapping>
</mChannelMappings></ChannelsProperty></mProperties></TreeNode></mRootNode>
</Presentation></mPresentations></Project></Xuk>"#
    );
    let mut project = Project::new();
    let err = project
        .read_xuk(xml.as_bytes(), &url("file:///tmp/t/book.xuk"), &mut NoProgress)
        .unwrap_err();
    assert!(matches!(err, ModelError::Deserialization(_)));
    assert!(err.to_string().contains("soon"));
}

#[test]
fn test_reversed_clip_is_rejected() {
    let xml = format!(
        r#"<Xuk xmlns="{XUK_NAMESPACE}"><Project><mPresentations><Presentation>
<mChannelsManager><AudioChannel uid="CH0" name="audio"/></mChannelsManager>
<mRootNode><TreeNode><mProperties><ChannelsProperty><mChannelMappings>
<ChannelMapping channel="CH0"><ExternalAudioMedia src="a.mp3" clipBegin="5s" clipEnd="1s"/></ChannelMapping>
</mChannelMappings></ChannelsProperty></mProperties></TreeNode></mRootNode>
</Presentation></mPresentations></Project></Xuk>"#
    );
    let mut project = Project::new();
    assert!(project
        .read_xuk(xml.as_bytes(), &url("file:///tmp/t/book.xuk"), &mut NoProgress)
        .is_err());
}

#[test]
fn test_progress_can_cancel() {
    let base = url("file:///tmp/moby/book.xuk");
    let mut project = Project::new();
    populate(project.add_new_presentation(url("file:///tmp/moby/")).unwrap());

    let mut seen = 0;
    let mut cancel_after_ten = |_: &str, count: usize| {
        seen = count;
        if count >= 10 {
            Progress::Cancel
        } else {
            Progress::Continue
        }
    };
    let err = project
        .write_xuk(Vec::new(), &base, &mut cancel_after_ten)
        .unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(seen, 10);

    let bytes = write(&project, &base);
    let mut target = Project::new();
    let err = target
        .read_xuk(bytes.as_slice(), &base, &mut |name: &str, _: usize| {
            if name == "TreeNode" {
                Progress::Cancel
            } else {
                Progress::Continue
            }
        })
        .unwrap_err();
    assert!(matches!(err, ModelError::Cancelled));
    assert!(target.is_empty());
}

#[test]
fn test_undo_history_is_not_persisted() {
    let base = url("file:///tmp/h/book.xuk");
    let mut project = Project::new();
    let p = project.add_new_presentation(url("file:///tmp/h/")).unwrap();
    p.execute(xuk_model::Command::SetLanguage { language: Some("de".into()) })
        .unwrap();
    assert!(p.can_undo());

    let bytes = write(&project, &base);
    assert!(String::from_utf8(bytes.clone()).unwrap().contains("<mUndoRedoManager/>"));
    let reread = read(&bytes, &base);
    let p = reread.presentation(0).unwrap();
    assert_eq!(p.language(), Some("de"));
    assert!(!p.can_undo());
}
