use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use regex::Regex;
use tracing::{debug, warn};

use crate::error::NmfeError;

/// Inventory of what a set of scripts references, gathered with a textual
/// scan so that scripts which do not parse still contribute.
#[derive(Debug)]
pub struct ScriptAnalysis {
    pub files: usize,
    pub speakers: BTreeSet<String>,
    pub flags: BTreeSet<String>,
    pub scenes: BTreeSet<String>,
    pub assets: BTreeSet<String>,
    speaker_pattern: Regex,
    flag_pattern: Regex,
    scene_pattern: Regex,
    asset_pattern: Regex,
}

impl ScriptAnalysis {
    pub fn new() -> Result<Self, NmfeError> {
        Ok(Self {
            files: 0,
            speakers: BTreeSet::new(),
            flags: BTreeSet::new(),
            scenes: BTreeSet::new(),
            assets: BTreeSet::new(),
            speaker_pattern: Regex::new(r#"(?m)^[\t ]*(\w+|"[^"\n]+")[\t ]*:[\t ]*""#)?,
            flag_pattern: Regex::new(r"(?m)^[\t ]*(?:set|if)[\t ]+(\w+)")?,
            scene_pattern: Regex::new(r"(?m)^[\t ]*scene[\t ]+(\w+)")?,
            asset_pattern: Regex::new(r#"(?m)^[\t ]*(?:bg|audio|avatar[\t ]+\w+)[\t ]+"([^"\n]+)""#)?,
        })
    }

    /// Scans every script with `extension` below `dir`.
    pub fn analyze_directory(&mut self, dir: &Path, extension: &str) -> Result<(), NmfeError> {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                self.analyze_directory(&path, extension)?;
            } else if path.extension().and_then(|ext| ext.to_str()) == Some(extension) {
                match fs::read_to_string(&path) {
                    Ok(contents) => {
                        debug!(path = %path.display(), "Analyzing script");
                        self.analyze_script(&contents);
                    }
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable script"),
                }
            }
        }
        Ok(())
    }

    pub fn analyze_script(&mut self, contents: &str) {
        self.files += 1;

        for cap in self.speaker_pattern.captures_iter(contents) {
            if let Some(speaker) = cap.get(1) {
                self.speakers.insert(speaker.as_str().trim_matches('"').to_string());
            }
        }

        for cap in self.flag_pattern.captures_iter(contents) {
            if let Some(flag) = cap.get(1) {
                self.flags.insert(flag.as_str().to_string());
            }
        }

        for cap in self.scene_pattern.captures_iter(contents) {
            if let Some(scene) = cap.get(1) {
                self.scenes.insert(scene.as_str().to_string());
            }
        }

        for cap in self.asset_pattern.captures_iter(contents) {
            if let Some(asset) = cap.get(1) {
                self.assets.insert(asset.as_str().to_string());
            }
        }
    }

    pub fn print_analysis(&self) {
        println!("Analyzed {} script(s)", self.files);

        for (title, items) in [
            ("Speakers", &self.speakers),
            ("Flags", &self.flags),
            ("Scenes", &self.scenes),
            ("Assets", &self.assets),
        ] {
            println!("\n{} ({}):", title, items.len());
            for item in items {
                println!("  {}", item);
            }
        }
    }
}
