use anyhow::{anyhow, Result};
use std::process::{Child, Command, Stdio};

use crate::config::SpeechConfig;

/// Bengali block, U+0980 through U+09FF.
pub fn contains_bengali(text: &str) -> bool {
    text.chars().any(|c| ('\u{0980}'..='\u{09FF}').contains(&c))
}

/// Any Bengali-script character anywhere in the text selects the Bengali
/// voice; otherwise the default voice is used.
pub fn detect_voice<'a>(text: &str, config: &'a SpeechConfig) -> &'a str {
    if contains_bengali(text) {
        &config.bengali_voice
    } else {
        &config.default_voice
    }
}

/// Text-to-speech through whichever platform synthesizer is installed.
/// Starting a new utterance cancels the previous one instead of queuing.
pub struct Speaker {
    current: Option<Child>,
}

impl Speaker {
    pub fn new() -> Self {
        Speaker { current: None }
    }

    pub fn speak(&mut self, text: &str, voice: &str) -> Result<()> {
        self.stop();

        // Try espeak-ng first (Linux), then speech-dispatcher, then the
        // macOS `say` command
        let lang = voice.split('-').next().unwrap_or(voice);

        let espeak = Command::new("espeak-ng")
            .arg("-v")
            .arg(lang)
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if let Ok(child) = espeak {
            log::debug!("Speaking with espeak-ng, voice {}", voice);
            self.current = Some(child);
            return Ok(());
        }

        let spd = Command::new("spd-say")
            .arg("-l")
            .arg(lang)
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if let Ok(child) = spd {
            log::debug!("Speaking with spd-say, voice {}", voice);
            self.current = Some(child);
            return Ok(());
        }

        let say = Command::new("say")
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if let Ok(child) = say {
            log::debug!("Speaking with say");
            self.current = Some(child);
            return Ok(());
        }

        Err(anyhow!(
            "No speech synthesizer found. Install one of: espeak-ng, speech-dispatcher (spd-say), or say"
        ))
    }

    /// Cancels the in-flight utterance, if any.
    pub fn stop(&mut self) {
        if let Some(mut child) = self.current.take() {
            match child.try_wait() {
                Ok(Some(_)) => {}
                _ => {
                    let _ = child.kill();
                    let _ = child.wait();
                }
            }
        }
    }
}

impl Drop for Speaker {
    fn drop(&mut self) {
        self.stop();
    }
}
