//! Shared test doubles for the platform adapters

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use foodlens::adapters::{
    CameraError, FrameSource, InferenceBackend, InferenceOutput, LookupError, NutritionSource,
    SpeechEngine,
};
use foodlens::core::{
    CapturePipeline, Classifier, ModelAssets, Screen, SpeechNarrator, VoiceDirectory,
};
use foodlens::domain::{Frame, NutrientReport, NutritionInfo, Utterance, Voice};

pub const TEST_MODEL_URL: &str = "https://example.com/models/test/";

// ============================================================================
// Speech
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    Cancel,
    Speak(Utterance),
}

/// Records every cancel/speak and flags overlapping utterances
pub struct FakeSpeech {
    voices: Mutex<Vec<Voice>>,
    voice_list_calls: AtomicUsize,
    events: Mutex<Vec<SpeechEvent>>,
    active: Mutex<Option<String>>,
    overlaps: AtomicUsize,
    fail_playback: AtomicBool,
    changed: broadcast::Sender<()>,
}

impl FakeSpeech {
    pub fn new(voices: Vec<Voice>) -> Self {
        let (changed, _) = broadcast::channel(8);
        Self {
            voices: Mutex::new(voices),
            voice_list_calls: AtomicUsize::new(0),
            events: Mutex::new(Vec::new()),
            active: Mutex::new(None),
            overlaps: AtomicUsize::new(0),
            fail_playback: AtomicBool::new(false),
            changed,
        }
    }

    pub fn korean() -> Self {
        Self::new(vec![
            Voice::new("en-US", "Samantha"),
            Voice::new("ko-KR", "Yuna"),
        ])
    }

    pub fn set_voices(&self, voices: Vec<Voice>) {
        *self.voices.lock().unwrap() = voices;
    }

    /// Simulate the platform's "voices changed" signal
    pub fn notify(&self) {
        let _ = self.changed.send(());
    }

    pub fn fail_playback(&self) {
        self.fail_playback.store(true, Ordering::SeqCst);
    }

    pub fn voice_list_calls(&self) -> usize {
        self.voice_list_calls.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<SpeechEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn spoken(&self) -> Vec<Utterance> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                SpeechEvent::Speak(u) => Some(u),
                SpeechEvent::Cancel => None,
            })
            .collect()
    }

    pub fn spoken_texts(&self) -> Vec<String> {
        self.spoken().into_iter().map(|u| u.text).collect()
    }

    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechEngine for FakeSpeech {
    fn name(&self) -> &str {
        "fake"
    }

    async fn voices(&self) -> anyhow::Result<Vec<Voice>> {
        self.voice_list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.voices.lock().unwrap().clone())
    }

    fn voices_changed(&self) -> broadcast::Receiver<()> {
        self.changed.subscribe()
    }

    async fn cancel(&self) {
        self.events.lock().unwrap().push(SpeechEvent::Cancel);
        *self.active.lock().unwrap() = None;
    }

    async fn speak(&self, utterance: Utterance) -> anyhow::Result<()> {
        // Yield so concurrent callers get a chance to interleave
        tokio::task::yield_now().await;

        if self.fail_playback.load(Ordering::SeqCst) {
            anyhow::bail!("audio device busy");
        }

        let mut active = self.active.lock().unwrap();
        if active.is_some() {
            self.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        *active = Some(utterance.text.clone());
        self.events.lock().unwrap().push(SpeechEvent::Speak(utterance));
        Ok(())
    }
}

// ============================================================================
// Camera
// ============================================================================

pub struct FakeCamera {
    deny: bool,
    opens: AtomicUsize,
    grabs: AtomicUsize,
}

impl FakeCamera {
    pub fn working() -> Self {
        Self {
            deny: false,
            opens: AtomicUsize::new(0),
            grabs: AtomicUsize::new(0),
        }
    }

    pub fn denied() -> Self {
        Self {
            deny: true,
            ..Self::working()
        }
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn grabs(&self) -> usize {
        self.grabs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSource for FakeCamera {
    fn name(&self) -> &str {
        "fake"
    }

    async fn open(&self) -> Result<(), CameraError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.deny {
            return Err(CameraError::PermissionDenied("NotAllowedError".to_string()));
        }
        Ok(())
    }

    async fn grab(&self) -> Result<Frame, CameraError> {
        self.grabs.fetch_add(1, Ordering::SeqCst);
        Ok(Frame::png(vec![0x89, b'P', b'N', b'G', 0, 1, 2, 3]))
    }
}

// ============================================================================
// Inference
// ============================================================================

pub struct FakeInference {
    scores: Vec<f32>,
    delay: Duration,
    calls: AtomicUsize,
}

impl FakeInference {
    pub fn new(scores: Vec<f32>) -> Self {
        Self {
            scores,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn slow(scores: Vec<f32>, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new(scores)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceBackend for FakeInference {
    fn name(&self) -> &str {
        "fake"
    }

    async fn infer(&self, _model_url: &str, _frame: &Frame) -> anyhow::Result<InferenceOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(InferenceOutput::Scores(self.scores.clone()))
    }
}

// ============================================================================
// Nutrition
// ============================================================================

#[derive(Debug, Clone)]
pub enum FakeLookup {
    Found(NutrientReport),
    NotFound,
    BadResponse,
}

/// Scripted lookups: each call pops the next (delay, response)
pub struct FakeNutrition {
    script: Mutex<VecDeque<(Duration, FakeLookup)>>,
    queries: Mutex<Vec<String>>,
}

impl FakeNutrition {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(self, delay: Duration, response: FakeLookup) -> Self {
        self.script.lock().unwrap().push_back((delay, response));
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl NutritionSource for FakeNutrition {
    async fn fetch_nutrition_info(&self, food_name: &str) -> Result<NutritionInfo, LookupError> {
        self.queries.lock().unwrap().push(food_name.to_string());

        let (delay, response) = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or((Duration::ZERO, FakeLookup::NotFound));

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match response {
            FakeLookup::Found(report) => Ok(NutritionInfo::Found(report)),
            FakeLookup::NotFound => Ok(NutritionInfo::NotFound),
            FakeLookup::BadResponse => {
                let error = serde_json::from_str::<serde_json::Value>("<html>").unwrap_err();
                Err(LookupError::Parse(error))
            }
        }
    }
}

// ============================================================================
// Pipeline harness
// ============================================================================

pub struct Harness {
    pub camera: Arc<FakeCamera>,
    pub inference: Arc<FakeInference>,
    pub nutrition: Arc<FakeNutrition>,
    pub speech: Arc<FakeSpeech>,
    pub classifier: Arc<Classifier>,
    pub screen: Arc<Screen>,
    pub pipeline: CapturePipeline,
}

pub struct HarnessBuilder {
    camera: FakeCamera,
    inference: FakeInference,
    nutrition: FakeNutrition,
    speech: FakeSpeech,
    labels: Option<Vec<String>>,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            camera: FakeCamera::working(),
            inference: FakeInference::new(vec![0.923, 0.077]),
            nutrition: FakeNutrition::new(),
            speech: FakeSpeech::korean(),
            labels: Some(vec!["apple".to_string(), "banana".to_string()]),
        }
    }

    pub fn camera(mut self, camera: FakeCamera) -> Self {
        self.camera = camera;
        self
    }

    pub fn inference(mut self, inference: FakeInference) -> Self {
        self.inference = inference;
        self
    }

    pub fn nutrition(mut self, nutrition: FakeNutrition) -> Self {
        self.nutrition = nutrition;
        self
    }

    pub fn speech(mut self, speech: FakeSpeech) -> Self {
        self.speech = speech;
        self
    }

    /// Leave the model unloaded
    pub fn unloaded(mut self) -> Self {
        self.labels = None;
        self
    }

    pub async fn build(self) -> Harness {
        let camera = Arc::new(self.camera);
        let inference = Arc::new(self.inference);
        let nutrition = Arc::new(self.nutrition);
        let speech = Arc::new(self.speech);

        let classifier = Arc::new(match self.labels {
            Some(labels) => Classifier::with_assets(
                inference.clone(),
                ModelAssets::from_labels(TEST_MODEL_URL, labels),
            ),
            None => Classifier::new(inference.clone()),
        });

        let directory = Arc::new(VoiceDirectory::new(speech.clone(), "ko-KR"));
        directory.refresh().await;
        let narrator = Arc::new(SpeechNarrator::new(
            directory,
            speech.clone(),
            Duration::from_millis(200),
            None,
        ));

        let screen = Arc::new(Screen::new());
        let pipeline = CapturePipeline::new(
            camera.clone(),
            classifier.clone(),
            nutrition.clone(),
            narrator,
            screen.clone(),
        );

        Harness {
            camera,
            inference,
            nutrition,
            speech,
            classifier,
            screen,
            pipeline,
        }
    }
}
