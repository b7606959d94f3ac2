//! Speech synthesis through an espeak-ng compatible command.
//!
//! Each utterance runs as one child process fed through stdin. Cancelling
//! kills the running child, so at most one process is ever audible.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::SpeechEngine;
use crate::domain::{Utterance, Voice};

/// How often `wait_until_done` checks the child process
const DONE_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Region espeak means when it lists a bare language code
const DEFAULT_REGIONS: &[(&str, &str)] = &[
    ("af", "ZA"),
    ("cs", "CZ"),
    ("da", "DK"),
    ("de", "DE"),
    ("el", "GR"),
    ("es", "ES"),
    ("fi", "FI"),
    ("fr", "FR"),
    ("hi", "IN"),
    ("hu", "HU"),
    ("id", "ID"),
    ("it", "IT"),
    ("ja", "JP"),
    ("ko", "KR"),
    ("nb", "NO"),
    ("nl", "NL"),
    ("pl", "PL"),
    ("pt", "PT"),
    ("ro", "RO"),
    ("ru", "RU"),
    ("sv", "SE"),
    ("th", "TH"),
    ("tr", "TR"),
    ("uk", "UA"),
    ("vi", "VN"),
];

fn default_region(language: &str) -> Option<&'static str> {
    DEFAULT_REGIONS
        .iter()
        .find(|(code, _)| *code == language)
        .map(|(_, region)| *region)
}

/// Normalize an espeak language code into a locale tag.
///
/// "en-us" becomes "en-US", and a bare "ko" becomes "ko-KR".
fn normalize_locale(code: &str) -> String {
    let mut parts = code.split('-');
    let language = parts.next().unwrap_or_default().to_lowercase();
    match parts.next() {
        Some(region) if region.len() == 2 => format!("{}-{}", language, region.to_uppercase()),
        Some(variant) => format!("{}-{}", language, variant),
        None => match default_region(&language) {
            Some(region) => format!("{}-{}", language, region),
            None => language,
        },
    }
}

/// espeak `-v` code for a locale tag, inverse of `normalize_locale`
fn espeak_code(locale: &str) -> String {
    let locale = locale.to_lowercase();
    match locale.split_once('-') {
        Some((language, region))
            if default_region(language).is_some_and(|r| r.eq_ignore_ascii_case(region)) =>
        {
            language.to_string()
        }
        _ => locale,
    }
}

/// Parse `espeak-ng --voices` output.
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  ko              --/M      Korean             sit/ko
/// ```
pub fn parse_voice_list(stdout: &str) -> Vec<Voice> {
    stdout
        .lines()
        .skip(1)
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            match columns.as_slice() {
                [_, language, _, name, ..] => Some(Voice::new(normalize_locale(language), *name)),
                _ => None,
            }
        })
        .collect()
}

/// Speech engine driving an external synthesizer
pub struct CommandSpeech {
    program: String,
    current: Mutex<Option<Child>>,
    voices_changed: broadcast::Sender<()>,
}

impl CommandSpeech {
    pub fn new(program: impl Into<String>) -> Self {
        let (voices_changed, _) = broadcast::channel(8);
        Self {
            program: program.into(),
            current: Mutex::new(None),
            voices_changed,
        }
    }

    /// Tell subscribers the installed voices changed
    fn notify_voices_changed(&self) {
        // No subscribers is fine
        let _ = self.voices_changed.send(());
    }

    /// Re-list voices every `interval` and notify subscribers when the
    /// listing changes.
    ///
    /// The task ends once the engine is dropped.
    pub fn monitor_voices(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let engine = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            let mut listing = VoiceListing::default();

            loop {
                ticker.tick().await;
                let Some(engine) = engine.upgrade() else {
                    break;
                };

                let voices = match engine.voices().await {
                    Ok(voices) => voices,
                    Err(e) => {
                        debug!(error = %e, "Voice listing unavailable");
                        Vec::new()
                    }
                };

                if listing.observe(voices) {
                    info!(program = %engine.program, "Installed voices changed");
                    engine.notify_voices_changed();
                }
            }
        })
    }

    /// Voice argument for `-v`: the voice's own code, else the utterance language
    fn voice_arg(utterance: &Utterance) -> String {
        match &utterance.voice {
            Some(voice) => espeak_code(&voice.locale),
            None => utterance
                .locale
                .split('-')
                .next()
                .unwrap_or(utterance.locale.as_str())
                .to_lowercase(),
        }
    }
}

/// Last voice listing seen by the monitor
#[derive(Debug, Default)]
struct VoiceListing {
    known: Option<Vec<Voice>>,
}

impl VoiceListing {
    /// Record `voices`; true when they differ from the previous listing
    fn observe(&mut self, voices: Vec<Voice>) -> bool {
        let changed = self.known.as_ref().is_some_and(|known| *known != voices);
        self.known = Some(voices);
        changed
    }
}

#[async_trait]
impl SpeechEngine for CommandSpeech {
    fn name(&self) -> &str {
        &self.program
    }

    async fn voices(&self) -> Result<Vec<Voice>> {
        let output = Command::new(&self.program)
            .arg("--voices")
            .output()
            .await
            .with_context(|| format!("Failed to list voices with '{}'", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Voice listing failed: {}", stderr.trim());
        }

        Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
    }

    fn voices_changed(&self) -> broadcast::Receiver<()> {
        self.voices_changed.subscribe()
    }

    async fn cancel(&self) {
        let mut current = self.current.lock().await;
        if let Some(mut child) = current.take() {
            if let Err(e) = child.kill().await {
                // Already exited on its own
                debug!(error = %e, "Speech process was not running");
            }
        }
    }

    async fn speak(&self, utterance: Utterance) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(["-v", &Self::voice_arg(&utterance), "--stdin"])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn speech process '{}'", self.program))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(utterance.text.as_bytes())
                .await
                .context("Failed to write utterance to speech process")?;
        }

        let mut current = self.current.lock().await;
        if current.replace(child).is_some() {
            // Dropping the old child kills it
            warn!("Previous utterance was still registered; replaced it");
        }
        Ok(())
    }

    async fn wait_until_done(&self) {
        loop {
            {
                let mut current = self.current.lock().await;
                let finished = match current.as_mut() {
                    Some(child) => !matches!(child.try_wait(), Ok(None)),
                    None => true,
                };
                if finished {
                    current.take();
                    return;
                }
            }
            tokio::time::sleep(DONE_POLL_INTERVAL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VOICES: &str = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 2  en-us           --/M      English_(America)  gmw/en-US            (en 3)
 5  ko              --/M      Korean             sit/ko
";

    #[test]
    fn test_parse_voice_list() {
        let voices = parse_voice_list(VOICES);

        assert_eq!(voices.len(), 3);
        assert_eq!(voices[0], Voice::new("af-ZA", "Afrikaans"));
        assert_eq!(voices[1], Voice::new("en-US", "English_(America)"));
        assert_eq!(voices[2], Voice::new("ko-KR", "Korean"));
    }

    #[test]
    fn test_normalize_locale() {
        assert_eq!(normalize_locale("ko"), "ko-KR");
        assert_eq!(normalize_locale("pt-br"), "pt-BR");
        assert_eq!(normalize_locale("en-gb-x-rp"), "en-GB");
        assert_eq!(normalize_locale("es-419"), "es-419");
        assert_eq!(normalize_locale("eo"), "eo");
    }

    #[test]
    fn test_espeak_code() {
        assert_eq!(espeak_code("ko-KR"), "ko");
        assert_eq!(espeak_code("pt-PT"), "pt");
        assert_eq!(espeak_code("pt-BR"), "pt-br");
        assert_eq!(espeak_code("en-US"), "en-us");
        assert_eq!(espeak_code("eo"), "eo");
    }

    #[tokio::test]
    async fn test_voice_monitor_stops_with_engine() {
        let engine = Arc::new(CommandSpeech::new("foodlens-no-such-synth"));
        let mut changes = engine.voices_changed();

        let monitor = engine.monitor_voices(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(engine);

        tokio::time::timeout(Duration::from_secs(5), monitor)
            .await
            .expect("monitor should stop once the engine is gone")
            .unwrap();

        // A missing synthesizer lists no voices every time, so nothing changed
        assert!(matches!(
            changes.try_recv(),
            Err(broadcast::error::TryRecvError::Closed)
        ));
    }

    #[test]
    fn test_voice_listing_changes() {
        let mut listing = VoiceListing::default();

        // First listing is the baseline
        assert!(!listing.observe(vec![]));
        assert!(!listing.observe(vec![]));

        assert!(listing.observe(vec![Voice::new("ko-KR", "Korean")]));
        assert!(!listing.observe(vec![Voice::new("ko-KR", "Korean")]));
        assert!(listing.observe(vec![]));
    }

    #[test]
    fn test_parse_empty_listing() {
        assert!(parse_voice_list("").is_empty());
        assert!(parse_voice_list("Pty Language Age/Gender VoiceName File\n").is_empty());
    }

    #[test]
    fn test_voice_arg() {
        let plain = Utterance::new("안녕", "ko-KR");
        assert_eq!(CommandSpeech::voice_arg(&plain), "ko");

        let voiced = plain.with_voice(Some(Voice::new("en-US", "English_(America)")));
        assert_eq!(CommandSpeech::voice_arg(&voiced), "en-us");

        let korean = Utterance::new("안녕", "ko-KR").with_voice(Some(Voice::new("ko-KR", "Korean")));
        assert_eq!(CommandSpeech::voice_arg(&korean), "ko");
    }
}
