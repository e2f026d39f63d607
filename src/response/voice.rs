//! Voice augmentation
//!
//! Pairs every text segment with a spoken rendition of the same text.

use super::reference::ContentReference;
use super::segment::Segment;
use crate::agent::provider::{Tool, ToolError, ToolInput};
use std::sync::Arc;
use tracing::debug;

/// Interleaves synthesized speech after each text segment
#[derive(Clone)]
pub struct VoiceAugmenter {
    speech: Arc<dyn Tool>,
}

impl VoiceAugmenter {
    /// Create an augmenter backed by a speech tool
    #[must_use]
    pub fn new(speech: Arc<dyn Tool>) -> Self {
        Self { speech }
    }

    /// Returns `segments` with a `MediaRef` to the audio of each `Text`
    /// inserted right after it. Media segments pass through unchanged.
    ///
    /// # Errors
    ///
    /// Fails on the first speech error, or if the speech tool returns
    /// anything other than a content reference.
    pub async fn augment(&self, segments: Vec<Segment>) -> Result<Vec<Segment>, ToolError> {
        let mut out = Vec::with_capacity(segments.len() * 2);
        for segment in segments {
            match segment {
                Segment::Text(text) => {
                    let output = self.speech.run(ToolInput::Text(text.clone())).await?;
                    let audio = ContentReference::parse(output.trim()).ok_or_else(|| {
                        ToolError::InvalidOutput {
                            tool: self.speech.name(),
                            output: output.clone(),
                        }
                    })?;
                    debug!(audio = %audio, chars = text.chars().count(), "Voiced text segment");
                    out.push(Segment::Text(text));
                    out.push(Segment::MediaRef(audio));
                }
                media @ Segment::MediaRef(_) => out.push(media),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::provider::MockTool;

    const IMG: &str = "3fa85f64-5717-4562-b3fc-2c963f66afa6";
    const AUDIO: &str = "9b2d1f0e-46a1-4c55-8f2e-0d6f3c9a7b11";

    fn media(id: &str) -> Segment {
        Segment::MediaRef(ContentReference::parse(id).expect("valid id"))
    }

    #[tokio::test]
    async fn test_audio_follows_each_text() {
        let mut speech = MockTool::new();
        speech.expect_name().return_const("GenerateSpokenAudio");
        speech
            .expect_run()
            .withf(|input| *input == ToolInput::Text("Hi".to_string()))
            .times(1)
            .returning(|_| Ok(AUDIO.to_string()));

        let augmenter = VoiceAugmenter::new(Arc::new(speech));
        let out = augmenter
            .augment(vec![Segment::Text("Hi".to_string()), media(IMG)])
            .await
            .expect("augmented");

        assert_eq!(out, vec![Segment::Text("Hi".to_string()), media(AUDIO), media(IMG)]);
    }

    #[tokio::test]
    async fn test_media_only_needs_no_speech() {
        let mut speech = MockTool::new();
        speech.expect_run().never();

        let augmenter = VoiceAugmenter::new(Arc::new(speech));
        let out = augmenter.augment(vec![media(IMG)]).await.expect("augmented");
        assert_eq!(out, vec![media(IMG)]);
    }

    #[tokio::test]
    async fn test_second_pass_does_not_voice_media() {
        let mut speech = MockTool::new();
        speech.expect_name().return_const("GenerateSpokenAudio");
        // One call per pass: only the text segment is voiced
        speech
            .expect_run()
            .times(2)
            .returning(|_| Ok(AUDIO.to_string()));

        let augmenter = VoiceAugmenter::new(Arc::new(speech));
        let once = augmenter
            .augment(vec![Segment::Text("Hi".to_string())])
            .await
            .expect("first pass");
        let twice = augmenter.augment(once).await.expect("second pass");

        assert_eq!(
            twice,
            vec![Segment::Text("Hi".to_string()), media(AUDIO), media(AUDIO)]
        );
    }

    #[tokio::test]
    async fn test_speech_failure_aborts() {
        let mut speech = MockTool::new();
        speech.expect_name().return_const("GenerateSpokenAudio");
        speech.expect_run().returning(|_| {
            Err(ToolError::NoArtifacts {
                tool: "GenerateSpokenAudio",
                kind: "audio",
            })
        });

        let augmenter = VoiceAugmenter::new(Arc::new(speech));
        let err = augmenter
            .augment(vec![Segment::Text("Hi".to_string())])
            .await
            .expect_err("must fail");
        assert!(matches!(err, ToolError::NoArtifacts { .. }));
    }

    #[tokio::test]
    async fn test_non_reference_output_is_rejected() {
        let mut speech = MockTool::new();
        speech.expect_name().return_const("GenerateSpokenAudio");
        speech.expect_run().returning(|_| Ok("sorry, no audio".to_string()));

        let augmenter = VoiceAugmenter::new(Arc::new(speech));
        let err = augmenter
            .augment(vec![Segment::Text("Hi".to_string())])
            .await
            .expect_err("must fail");
        assert!(matches!(err, ToolError::InvalidOutput { .. }));
    }
}
