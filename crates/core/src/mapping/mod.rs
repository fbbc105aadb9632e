use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use crate::{LooperError, Result};

/// Routes gesture labels (`<hand>:<fingers>`, e.g. `L:I+M`) to sound files.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GestureMapping {
    sounds: BTreeMap<String, PathBuf>,
}

impl GestureMapping {
    /// Reads `mapping_file` and checks that every referenced sound exists
    /// under `sounds_dir`.
    pub fn load(mapping_file: &Path, sounds_dir: &Path) -> Result<Self> {
        if !mapping_file.exists() {
            return Err(LooperError::Mapping(format!(
                "mapping file not found: {}",
                mapping_file.display()
            )));
        }
        let raw = fs::read_to_string(mapping_file)?;
        let mapping = Self::parse(&raw, sounds_dir)?;

        for (label, path) in mapping.iter() {
            if !path.exists() {
                return Err(LooperError::Mapping(format!(
                    "sound file not found for gesture {label}: {}",
                    path.display()
                )));
            }
        }

        tracing::debug!(gestures = mapping.len(), "mapping loaded");
        Ok(mapping)
    }

    /// Parses a JSON object of `label -> file name` entries, resolving file
    /// names against `sounds_dir`. Does not touch the file system.
    pub fn parse(json: &str, sounds_dir: impl AsRef<Path>) -> Result<Self> {
        let raw: BTreeMap<String, String> = serde_json::from_str(json)?;
        if raw.is_empty() {
            return Err(LooperError::Mapping("mapping is empty".to_string()));
        }

        let sounds_dir = sounds_dir.as_ref();
        let mut sounds = BTreeMap::new();
        for (label, file) in raw {
            if !is_valid_label(&label) {
                return Err(LooperError::Mapping(format!(
                    "invalid gesture key format: {label}"
                )));
            }
            sounds.insert(label, sounds_dir.join(file));
        }
        Ok(Self { sounds })
    }

    /// Returns the number of mapped gestures.
    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    /// Returns the sound file for `label`, if mapped.
    pub fn sound_for(&self, label: &str) -> Option<&Path> {
        self.sounds.get(label).map(PathBuf::as_path)
    }

    /// Iterates over `(label, sound file)` pairs in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.sounds
            .iter()
            .map(|(label, path)| (label.as_str(), path.as_path()))
    }

    /// Labels that have a configured sound.
    pub fn known_labels(&self) -> HashSet<String> {
        self.sounds.keys().cloned().collect()
    }
}

fn is_valid_label(label: &str) -> bool {
    label.split(':').count() == 2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_files_against_sounds_dir() {
        let mapping =
            GestureMapping::parse(r#"{"L:I": "kick.wav", "R:I+M": "hat.wav"}"#, "sounds")
                .unwrap();

        assert_eq!(mapping.len(), 2);
        assert_eq!(
            mapping.sound_for("R:I+M"),
            Some(Path::new("sounds/hat.wav"))
        );
        assert_eq!(mapping.sound_for("STOP"), None);
        assert!(mapping.known_labels().contains("L:I"));
    }

    #[test]
    fn rejects_empty_and_malformed_mappings() {
        let err = GestureMapping::parse("{}", "sounds").unwrap_err();
        assert!(format!("{err}").contains("empty"));

        let err = GestureMapping::parse(r#"{"LI": "kick.wav"}"#, "sounds").unwrap_err();
        assert!(format!("{err}").contains("LI"));

        let err = GestureMapping::parse(r#"{"L:I:M": "kick.wav"}"#, "sounds").unwrap_err();
        assert!(matches!(err, LooperError::Mapping(_)));

        assert!(matches!(
            GestureMapping::parse("[1, 2]", "sounds"),
            Err(LooperError::Json(_))
        ));
    }

    #[test]
    fn load_checks_sound_files_exist() {
        let dir = std::env::temp_dir().join(format!(
            "gesture-looper-mapping-{}",
            std::process::id()
        ));
        let sounds = dir.join("sounds");
        fs::create_dir_all(&sounds).unwrap();
        fs::write(sounds.join("kick.wav"), b"").unwrap();

        let mapping_file = dir.join("mapping.json");
        fs::write(&mapping_file, r#"{"L:I": "kick.wav"}"#).unwrap();
        assert_eq!(GestureMapping::load(&mapping_file, &sounds).unwrap().len(), 1);

        fs::write(&mapping_file, r#"{"L:I": "kick.wav", "R:I": "gone.wav"}"#).unwrap();
        let err = GestureMapping::load(&mapping_file, &sounds).unwrap_err();
        assert!(format!("{err}").contains("R:I"));

        let err = GestureMapping::load(&dir.join("missing.json"), &sounds).unwrap_err();
        assert!(format!("{err}").contains("not found"));

        let _ = fs::remove_dir_all(&dir);
    }
}
