//! Voice catalog.
//!
//! The built-in catalog lists the neural voices offered to end users. A
//! catalog can also be built from what an engine reports.

use crate::engine::EngineVoice;
use crate::error::{NarrateError, NarrateResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Gender classification for voices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// Male voice
    Male,
    /// Female voice
    Female,
    /// Non-binary or neutral voice
    Neutral,
}

impl Gender {
    fn parse(text: &str) -> Self {
        if text.eq_ignore_ascii_case("male") {
            Self::Male
        } else if text.eq_ignore_ascii_case("female") {
            Self::Female
        } else {
            Self::Neutral
        }
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Male => write!(f, "Male"),
            Self::Female => write!(f, "Female"),
            Self::Neutral => write!(f, "Neutral"),
        }
    }
}

/// A selectable voice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voice {
    /// Engine voice id, e.g. `en-GB-RyanNeural`
    pub id: String,
    /// Display name, e.g. `Ryan (Male, UK)`
    pub name: String,
    /// Language family, e.g. `English`
    pub language: String,
    /// Locale taken from the id, e.g. `en-GB`
    pub locale: String,
    /// Voice gender
    pub gender: Gender,
}

impl Voice {
    /// Describe a voice; locale and gender are derived from the id and name
    #[must_use]
    pub fn new(id: &str, name: &str, language: &str) -> Self {
        let gender = name
            .split_once('(')
            .and_then(|(_, rest)| rest.split([',', ')']).next())
            .map_or(Gender::Neutral, |g| Gender::parse(g.trim()));
        Self {
            id: id.to_string(),
            name: name.to_string(),
            language: language.to_string(),
            locale: crate::ssml::language_of(id).to_string(),
            gender,
        }
    }

    /// Check if voice supports the given language or locale
    #[must_use]
    pub fn supports_language(&self, language: &str) -> bool {
        self.language.eq_ignore_ascii_case(language)
            || self.locale.eq_ignore_ascii_case(language)
            || self
                .locale
                .split('-')
                .next()
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(language))
    }
}

impl From<EngineVoice> for Voice {
    fn from(voice: EngineVoice) -> Self {
        let name = if voice.display_name.is_empty() {
            voice.short_name.clone()
        } else {
            voice.display_name
        };
        Self {
            locale: if voice.locale.is_empty() {
                crate::ssml::language_of(&voice.short_name).to_string()
            } else {
                voice.locale.clone()
            },
            language: voice.locale,
            gender: Gender::parse(&voice.gender),
            id: voice.short_name,
            name,
        }
    }
}

const BUILTIN_VOICES: [(&str, &str, &str); 23] = [
    ("en-US-GuyNeural", "Guy (Male, US)", "English"),
    ("en-US-ChristopherNeural", "Christopher (Male, US)", "English"),
    ("en-US-EricNeural", "Eric (Male, US)", "English"),
    ("en-GB-RyanNeural", "Ryan (Male, UK)", "English"),
    ("en-GB-ThomasNeural", "Thomas (Male, UK)", "English"),
    ("en-AU-WilliamNeural", "William (Male, Australian)", "English"),
    ("en-CA-LiamNeural", "Liam (Male, Canadian)", "English"),
    ("en-US-JennyNeural", "Jenny (Female, US)", "English"),
    ("en-GB-SoniaNeural", "Sonia (Female, UK)", "English"),
    ("en-AU-NatashaNeural", "Natasha (Female, Australian)", "English"),
    ("ar-MA-JamalNeural", "Jamal (Male, Moroccan)", "Arabic"),
    ("ar-EG-ShakirNeural", "Shakir (Male, Egyptian)", "Arabic"),
    ("ar-SA-FahdNeural", "Fahd (Male, Saudi)", "Arabic"),
    ("fr-FR-HenriNeural", "Henri (Male)", "French"),
    ("fr-FR-DeniseNeural", "Denise (Female)", "French"),
    ("de-DE-ConradNeural", "Conrad (Male)", "German"),
    ("de-DE-KatjaNeural", "Katja (Female)", "German"),
    ("es-ES-AlvaroNeural", "Álvaro (Male)", "Spanish"),
    ("es-ES-ElviraNeural", "Elvira (Female)", "Spanish"),
    ("it-IT-DiegoNeural", "Diego (Male)", "Italian"),
    ("it-IT-ElsaNeural", "Elsa (Female)", "Italian"),
    ("pt-BR-AntonioNeural", "Antonio (Male, Brazilian)", "Portuguese"),
    ("pt-BR-FranciscaNeural", "Francisca (Female, Brazilian)", "Portuguese"),
];

/// Lookup table of voices by id
#[derive(Debug, Clone)]
pub struct VoiceCatalog {
    voices: Arc<HashMap<String, Voice>>,
}

impl VoiceCatalog {
    /// Catalog of the built-in voices
    #[must_use]
    pub fn new() -> Self {
        Self::with_voices(
            BUILTIN_VOICES
                .iter()
                .map(|(id, name, language)| Voice::new(id, name, language))
                .collect(),
        )
    }

    /// Catalog with custom voices
    #[must_use]
    pub fn with_voices(voices: Vec<Voice>) -> Self {
        let voice_map = voices
            .into_iter()
            .map(|voice| (voice.id.clone(), voice))
            .collect();

        Self {
            voices: Arc::new(voice_map),
        }
    }

    /// Catalog of what an engine reports
    #[must_use]
    pub fn from_engine_voices(voices: Vec<EngineVoice>) -> Self {
        Self::with_voices(voices.into_iter().map(Voice::from).collect())
    }

    /// All voices sorted by language then id
    #[must_use]
    pub fn voices(&self) -> Vec<Voice> {
        let mut voices: Vec<Voice> = self.voices.values().cloned().collect();
        voices.sort_by(|a, b| a.language.cmp(&b.language).then_with(|| a.id.cmp(&b.id)));
        voices
    }

    /// Get a specific voice by ID
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::VoiceNotFound`] for unknown ids.
    pub fn get_voice(&self, voice_id: &str) -> NarrateResult<Voice> {
        self.voices
            .get(voice_id)
            .cloned()
            .ok_or_else(|| NarrateError::voice_not_found(voice_id))
    }

    /// Whether `voice_id` is in the catalog
    #[must_use]
    pub fn contains(&self, voice_id: &str) -> bool {
        self.voices.contains_key(voice_id)
    }

    /// Get voices filtered by language
    #[must_use]
    pub fn voices_by_language(&self, language: &str) -> Vec<Voice> {
        self.voices()
            .into_iter()
            .filter(|voice| voice.supports_language(language))
            .collect()
    }

    /// Get voices filtered by gender
    #[must_use]
    pub fn voices_by_gender(&self, gender: Gender) -> Vec<Voice> {
        self.voices()
            .into_iter()
            .filter(|voice| voice.gender == gender)
            .collect()
    }

    /// The default voice, falling back to any voice when it is missing
    #[must_use]
    pub fn default_voice(&self) -> Option<Voice> {
        self.get_voice(crate::DEFAULT_VOICE)
            .ok()
            .or_else(|| self.voices().into_iter().next())
    }

    /// Get voice count
    #[must_use]
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Sorted, de-duplicated language names
    #[must_use]
    pub fn languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = self
            .voices
            .values()
            .map(|voice| voice.language.clone())
            .collect();
        languages.sort();
        languages.dedup();
        languages
    }
}

impl Default for VoiceCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gender_display() {
        assert_eq!(Gender::Male.to_string(), "Male");
        assert_eq!(Gender::Female.to_string(), "Female");
        assert_eq!(Gender::Neutral.to_string(), "Neutral");
    }

    #[test]
    fn test_voice_parsing() {
        let voice = Voice::new("en-AU-NatashaNeural", "Natasha (Female, Australian)", "English");
        assert_eq!(voice.gender, Gender::Female);
        assert_eq!(voice.locale, "en-AU");
        assert!(voice.supports_language("English"));
        assert!(voice.supports_language("en"));
        assert!(voice.supports_language("en-au"));
        assert!(!voice.supports_language("fr"));

        let voice = Voice::new("fr-FR-HenriNeural", "Henri (Male)", "French");
        assert_eq!(voice.gender, Gender::Male);
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = VoiceCatalog::new();
        assert_eq!(catalog.voice_count(), 23);
        assert_eq!(
            catalog.languages(),
            vec!["Arabic", "English", "French", "German", "Italian", "Portuguese", "Spanish"]
        );
        assert_eq!(catalog.voices_by_language("English").len(), 10);
        assert_eq!(catalog.voices_by_gender(Gender::Female).len(), 8);
        assert!(catalog.contains("ar-SA-FahdNeural"));
    }

    #[test]
    fn test_default_voice() {
        let catalog = VoiceCatalog::new();
        assert_eq!(catalog.default_voice().unwrap().id, "en-US-JennyNeural");
        assert!(VoiceCatalog::with_voices(vec![]).default_voice().is_none());
    }

    #[test]
    fn test_get_voice_not_found() {
        let err = VoiceCatalog::new().get_voice("xx-XX-NobodyNeural").unwrap_err();
        assert!(matches!(err, NarrateError::VoiceNotFound { .. }));
    }

    #[test]
    fn test_from_engine_voices() {
        let catalog = VoiceCatalog::from_engine_voices(vec![EngineVoice {
            short_name: "en-IE-ConnorNeural".to_string(),
            display_name: "Connor".to_string(),
            gender: "Male".to_string(),
            locale: "en-IE".to_string(),
        }]);
        let voice = catalog.get_voice("en-IE-ConnorNeural").unwrap();
        assert_eq!(voice.gender, Gender::Male);
        assert_eq!(voice.locale, "en-IE");
        assert!(voice.supports_language("en"));
    }
}
