//! SSML document construction.

use std::fmt::Write;

const SPEAK_OPEN: &str = "<speak version='1.0' xmlns='http://www.w3.org/2001/10/synthesis' \
                          xmlns:mstts='https://www.w3.org/2001/mstts'";
const SPEAK_CLOSE: &str = "</speak>";

/// Voice controls sent with plain-text requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prosody {
    /// Engine speaking rate in percent; 100 is the voice's natural rate
    pub rate_percent: i32,
    /// Pitch offset in Hz
    pub pitch_hz: i32,
    /// Pause the engine inserts at sentence boundaries
    pub sentence_silence_ms: u32,
}

impl Default for Prosody {
    fn default() -> Self {
        Self {
            rate_percent: 100,
            pitch_hz: 0,
            sentence_silence_ms: 100,
        }
    }
}

impl Prosody {
    /// Prosody for a playback-speed multiplier.
    ///
    /// The rate is `round(100 / speed)` percent: the engine's rate is the
    /// inverse of the requested speed.
    #[must_use]
    pub fn for_speed(speed: f32, sentence_silence_ms: u32) -> Self {
        Self {
            rate_percent: rate_percent_for_speed(speed),
            pitch_hz: 0,
            sentence_silence_ms,
        }
    }

    /// Relative rate attribute, e.g. `+100%` for a 200% rate
    #[must_use]
    pub fn rate_attribute(&self) -> String {
        format!("{:+}%", self.rate_percent - 100)
    }

    /// Relative pitch attribute, e.g. `+0Hz`
    #[must_use]
    pub fn pitch_attribute(&self) -> String {
        format!("{:+}Hz", self.pitch_hz)
    }
}

/// `round(100 / speed)`
#[must_use]
pub fn rate_percent_for_speed(speed: f32) -> i32 {
    (100.0 / speed).round() as i32
}

/// Escape XML special characters in text content
#[must_use]
pub fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Locale prefix of a voice id: `en-GB-RyanNeural` gives `en-GB`
#[must_use]
pub fn language_of(voice_id: &str) -> &str {
    let mut dashes = voice_id.match_indices('-').map(|(i, _)| i);
    match (dashes.next(), dashes.next()) {
        (Some(_), Some(second)) => &voice_id[..second],
        _ => "en-US",
    }
}

/// Full SSML document for plain text
#[must_use]
pub fn build_document(text: &str, voice_id: &str, prosody: &Prosody) -> String {
    let mut doc = String::with_capacity(text.len() + 320);
    let _ = write!(
        doc,
        "{SPEAK_OPEN} xml:lang='{}'><voice name='{}'>\
         <mstts:silence type='Sentenceboundary' value='{}ms'/>\
         <prosody rate='{}' pitch='{}'>{}</prosody></voice>{SPEAK_CLOSE}",
        language_of(voice_id),
        escape_text(voice_id),
        prosody.sentence_silence_ms,
        prosody.rate_attribute(),
        prosody.pitch_attribute(),
        escape_text(text),
    );
    doc
}

/// Whether `markup` already is a `<speak>` document
#[must_use]
pub fn has_speak_root(markup: &str) -> bool {
    let trimmed = markup.trim();
    trimmed.starts_with("<speak") && trimmed.ends_with(SPEAK_CLOSE)
}

/// Make caller-supplied markup a complete document.
///
/// Fragments are wrapped in a `<speak>` root. A root without a `<voice>`
/// element gets one naming `voice_id`. Everything else is left untouched.
#[must_use]
pub fn prepare_markup(markup: &str, voice_id: &str) -> String {
    let trimmed = markup.trim();
    if !has_speak_root(trimmed) {
        return format!(
            "{SPEAK_OPEN} xml:lang='{}'><voice name='{}'>{trimmed}</voice>{SPEAK_CLOSE}",
            language_of(voice_id),
            escape_text(voice_id),
        );
    }
    if trimmed.contains("<voice") {
        return trimmed.to_string();
    }

    match trimmed.find('>') {
        Some(open_end) if open_end < trimmed.len() - SPEAK_CLOSE.len() => {
            let body_end = trimmed.len() - SPEAK_CLOSE.len();
            format!(
                "{}<voice name='{}'>{}</voice>{SPEAK_CLOSE}",
                &trimmed[..=open_end],
                escape_text(voice_id),
                &trimmed[open_end + 1..body_end],
            )
        }
        _ => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_mapping() {
        assert_eq!(rate_percent_for_speed(1.0), 100);
        assert_eq!(rate_percent_for_speed(0.5), 200);
        assert_eq!(rate_percent_for_speed(2.0), 50);
        assert_eq!(rate_percent_for_speed(1.5), 67);
    }

    #[test]
    fn test_prosody_attributes() {
        let slow = Prosody::for_speed(0.5, 100);
        assert_eq!(slow.rate_attribute(), "+100%");
        assert_eq!(slow.pitch_attribute(), "+0Hz");

        let fast = Prosody::for_speed(2.0, 100);
        assert_eq!(fast.rate_attribute(), "-50%");

        assert_eq!(Prosody::default().rate_attribute(), "+0%");
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("Fish & chips <b>"), "Fish &amp; chips &lt;b&gt;");
        assert_eq!(escape_text("it's \"fine\""), "it&apos;s &quot;fine&quot;");
    }

    #[test]
    fn test_language_of() {
        assert_eq!(language_of("en-GB-RyanNeural"), "en-GB");
        assert_eq!(language_of("zh-CN-XiaoxiaoNeural"), "zh-CN");
        assert_eq!(language_of("custom"), "en-US");
    }

    #[test]
    fn test_build_document() {
        let doc = build_document("Salt & pepper", "en-US-JennyNeural", &Prosody::for_speed(0.5, 100));
        assert!(doc.starts_with("<speak version='1.0'"));
        assert!(doc.contains("xml:lang='en-US'"));
        assert!(doc.contains("<voice name='en-US-JennyNeural'>"));
        assert!(doc.contains("<mstts:silence type='Sentenceboundary' value='100ms'/>"));
        assert!(doc.contains("<prosody rate='+100%' pitch='+0Hz'>Salt &amp; pepper</prosody>"));
        assert!(doc.ends_with("</speak>"));
    }

    #[test]
    fn test_prepare_markup_wraps_fragment() {
        let doc = prepare_markup("  Hello <break time='1s'/> there ", "en-GB-SoniaNeural");
        assert!(has_speak_root(&doc));
        assert!(doc.contains("<voice name='en-GB-SoniaNeural'>Hello <break time='1s'/> there</voice>"));
    }

    #[test]
    fn test_prepare_markup_adds_voice() {
        let doc = prepare_markup("<speak>Hi</speak>", "en-US-GuyNeural");
        assert_eq!(doc, "<speak><voice name='en-US-GuyNeural'>Hi</voice></speak>");
    }

    #[test]
    fn test_prepare_markup_keeps_complete_document() {
        let markup = "<speak version='1.0'><voice name='en-US-AriaNeural'>Hi</voice></speak>";
        assert_eq!(prepare_markup(markup, "en-US-GuyNeural"), markup);
    }
}
