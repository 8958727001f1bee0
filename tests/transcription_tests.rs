use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;
use redub::audio::AudioTrack;
use redub::config::TranscriptionConfig;
use redub::transcription::{
    ChunkedTranscriber, DecodeParams, EngineKind, LanguageModel, Seq2SeqModel, StreamingRecognizer,
    StreamingTranscriber, Transcriber, Transcript,
};

const RATE: u32 = 16_000;

/// Decodes each window to a marker derived from its first sample.
#[derive(Default)]
struct MarkerModel {
    windows: Mutex<Vec<usize>>,
    params: Mutex<Option<DecodeParams>>,
}

#[async_trait]
impl Seq2SeqModel for MarkerModel {
    async fn decode(&self, window: &[f32], _rate: u32, params: &DecodeParams) -> anyhow::Result<String> {
        self.windows.lock().unwrap().push(window.len());
        *self.params.lock().unwrap() = Some(*params);
        Ok(format!("chunk{}", (window[0] * 100.0).round() as i32))
    }

    fn name(&self) -> &str {
        "marker"
    }
}

struct ScriptedModel(Vec<anyhow::Result<String>>, Mutex<usize>);

#[async_trait]
impl Seq2SeqModel for ScriptedModel {
    async fn decode(&self, _window: &[f32], _rate: u32, _params: &DecodeParams) -> anyhow::Result<String> {
        let mut next = self.1.lock().unwrap();
        let reply = match &self.0[*next] {
            Ok(text) => Ok(text.clone()),
            Err(e) => Err(anyhow!("{}", e)),
        };
        *next += 1;
        reply
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Track whose 30 s windows carry the sample value `index / 100`.
fn marked_track(seconds_per_window: &[usize]) -> AudioTrack {
    let mut samples = Vec::new();
    for (index, secs) in seconds_per_window.iter().enumerate() {
        samples.extend(std::iter::repeat(index as f32 / 100.0).take(secs * RATE as usize));
    }
    AudioTrack::mono(samples, RATE)
}

#[tokio::test]
async fn test_chunked_keeps_window_order() {
    let model = Arc::new(MarkerModel::default());
    let transcriber = ChunkedTranscriber::new(model.clone(), &TranscriptionConfig::default());

    let transcript = transcriber.transcribe(&marked_track(&[30, 30, 30, 12])).await;

    assert_eq!(
        transcript,
        Transcript::Recognized {
            engine: EngineKind::Chunked,
            text: "chunk0 chunk1 chunk2 chunk3".to_string(),
        }
    );
    let windows = model.windows.lock().unwrap().clone();
    assert_eq!(windows, vec![480_000, 480_000, 480_000, 192_000]);
    assert_eq!(*model.params.lock().unwrap(), Some(DecodeParams { beam_width: 5, max_tokens: 500 }));
}

#[tokio::test]
async fn test_chunked_blank_or_failed_windows() {
    let config = TranscriptionConfig::default();
    let track = marked_track(&[30, 5]);

    let blank = ScriptedModel(vec![Ok("  ".into()), Ok("".into())], Mutex::new(0));
    let transcript = ChunkedTranscriber::new(Arc::new(blank), &config).transcribe(&track).await;
    assert!(transcript.is_empty());

    let partial = ScriptedModel(vec![Ok(" hello ".into()), Ok("".into())], Mutex::new(0));
    let transcript = ChunkedTranscriber::new(Arc::new(partial), &config).transcribe(&track).await;
    assert_eq!(transcript.text(), "hello");

    let failing = ScriptedModel(vec![Ok("hello".into()), Err(anyhow!("model crashed"))], Mutex::new(0));
    let transcript = ChunkedTranscriber::new(Arc::new(failing), &config).transcribe(&track).await;
    match transcript {
        Transcript::Unavailable { engine, reason } => {
            assert_eq!(engine, EngineKind::Chunked);
            assert!(reason.contains("model crashed"), "{}", reason);
        }
        other => panic!("expected Unavailable, got {:?}", other),
    }
}

#[tokio::test]
async fn test_streaming_without_model_fails_closed() {
    let transcriber = StreamingTranscriber::new(None, &TranscriptionConfig::default());
    let transcript = transcriber.transcribe(&marked_track(&[1])).await;

    assert_eq!(transcriber.kind(), EngineKind::Streaming);
    let err = transcript.into_text().unwrap_err();
    assert_eq!(err.kind(), "transcription_failure");
    assert!(err.to_string().contains("no language model loaded"));
}

/// Closes an utterance every second block.
struct EveryOtherBlock {
    blocks: Arc<Mutex<Vec<usize>>>,
    utterances: usize,
}

#[async_trait]
impl StreamingRecognizer for EveryOtherBlock {
    async fn accept_waveform(&mut self, block: &[i16]) -> anyhow::Result<bool> {
        let mut blocks = self.blocks.lock().unwrap();
        blocks.push(block.len());
        Ok(blocks.len() % 2 == 0)
    }

    async fn result(&mut self) -> anyhow::Result<String> {
        self.utterances += 1;
        Ok(format!("utterance{}", self.utterances))
    }

    async fn final_result(&mut self) -> anyhow::Result<String> {
        Ok("tail".to_string())
    }
}

#[derive(Default)]
struct FakeLanguageModel {
    blocks: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl LanguageModel for FakeLanguageModel {
    async fn recognizer(&self, sample_rate: u32) -> anyhow::Result<Box<dyn StreamingRecognizer>> {
        assert_eq!(sample_rate, RATE);
        Ok(Box::new(EveryOtherBlock {
            blocks: self.blocks.clone(),
            utterances: 0,
        }))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[tokio::test]
async fn test_streaming_appends_utterances_then_tail() {
    let model = Arc::new(FakeLanguageModel::default());
    let blocks = model.blocks.clone();
    let transcriber = StreamingTranscriber::new(Some(model as Arc<dyn LanguageModel>), &TranscriptionConfig::default());

    let track = AudioTrack::mono(vec![0.1; 4_000 * 4 + 1_500], RATE);
    let transcript = transcriber.transcribe(&track).await;

    assert_eq!(transcript.text(), "utterance1 utterance2 tail");
    assert_eq!(*blocks.lock().unwrap(), vec![4_000, 4_000, 4_000, 4_000, 1_500]);
}
