/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    aggregate::IDEAL,
    distribution::{CategoryBucket, CategoryBuckets},
};
use anyhow::{anyhow, Context};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

static EXAMPLE_CONFIG: &str = include_str!("templates/tailscope.toml");

pub const DEFAULT_CONFIG_PATH: &str = "tailscope.toml";

// ******** ******** ********
// **    CONFIGURATION     **
// ******** ******** ********
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub schedulers: Vec<String>,
    pub inputs: Inputs,
    pub output: Option<Output>,
    #[serde(default)]
    pub display: Display,
    #[serde(default)]
    pub palette: Palette,
    #[serde(default, rename(serialize = "category", deserialize = "category"))]
    pub categories: Vec<CategoryBucket>,
}
impl Config {
    pub fn write_example_to_file(path: &Path) -> anyhow::Result<File> {
        let mut file = File::create_new(path)
            .with_context(|| format!("Unable to create {}", path.display()))?;
        file.write_all(EXAMPLE_CONFIG.as_bytes())?;
        Ok(file)
    }

    /// Loads and validates a config file. Relative input and output paths are taken relative to
    /// the directory holding the config file.
    pub fn try_from_path(path: &Path) -> anyhow::Result<Config> {
        let config_str = fs::read_to_string(path)
            .with_context(|| format!("Unable to read config {}", path.display()))?;
        let config = Config::parse(&config_str)?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let config = config.relative_to(base);
        config.validate()?;
        Ok(config)
    }

    pub fn try_from_str(conf_str: &str) -> anyhow::Result<Config> {
        let config = Config::parse(conf_str)?;
        config.validate()?;
        Ok(config)
    }

    fn parse(conf_str: &str) -> anyhow::Result<Config> {
        toml::from_str::<Config>(conf_str).map_err(|e| anyhow!("TOML parsing error: {}", e))
    }

    fn relative_to(self, base: &Path) -> Config {
        let join = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };

        Config {
            inputs: Inputs {
                slo: join(self.inputs.slo),
                identity: join(self.inputs.identity),
                logs: self.inputs.logs.into_iter().map(join).collect(),
            },
            output: self.output.map(|out| Output { dir: join(out.dir) }),
            ..self
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.schedulers.is_empty() {
            return Err(anyhow!("At least one scheduler must be configured"));
        }

        for name in self.schedulers.iter() {
            if name.trim().is_empty() {
                return Err(anyhow!("Scheduler names cannot be empty"));
            }
            if name == IDEAL {
                return Err(anyhow!(
                    "\"{}\" is reserved for the synthetic baseline and cannot be a scheduler",
                    IDEAL
                ));
            }
            if name.contains(|c| c == '/' || c == '\\') {
                return Err(anyhow!("Scheduler name {} cannot contain a path separator", name));
            }
        }

        if let Some(name) = self.schedulers.iter().duplicates().next() {
            return Err(anyhow!("Scheduler {} is listed more than once", name));
        }

        if self.inputs.logs.is_empty() {
            return Err(anyhow!("At least one log directory must be configured"));
        }

        self.display.validate()?;
        self.category_buckets()?;

        Ok(())
    }

    pub fn category_buckets(&self) -> anyhow::Result<CategoryBuckets> {
        CategoryBuckets::try_new(self.categories.clone())
    }

    pub fn find_category(&self, name: &str) -> Option<&CategoryBucket> {
        self.categories.iter().find(|category| category.name == name)
    }

    /// Where artifacts are written. Falls back to the first log directory.
    pub fn output_dir(&self) -> PathBuf {
        self.output
            .as_ref()
            .map(|out| out.dir.clone())
            .or_else(|| self.inputs.logs.first().cloned())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[derive(Debug, Deserialize, PartialEq, Serialize, Clone)]
pub struct Inputs {
    pub slo: PathBuf,
    pub identity: PathBuf,
    pub logs: Vec<PathBuf>,
}

#[derive(Debug, Deserialize, PartialEq, Serialize, Clone)]
pub struct Output {
    pub dir: PathBuf,
}

fn default_epsilon() -> f64 {
    1e-3
}

fn default_grid_points() -> usize {
    400
}

#[derive(Debug, Deserialize, PartialEq, Serialize, Clone)]
pub struct Display {
    /// Stand-in for non-positive values on log axes.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
    #[serde(default = "default_grid_points")]
    pub grid_points: usize,
    #[serde(default)]
    pub dashed: Vec<String>,
}
impl Default for Display {
    fn default() -> Self {
        Display {
            epsilon: default_epsilon(),
            grid_points: default_grid_points(),
            dashed: vec![],
        }
    }
}
impl Display {
    pub fn is_dashed(&self, scheduler: &str) -> bool {
        self.dashed.iter().any(|s| s.eq_ignore_ascii_case(scheduler))
    }

    fn validate(&self) -> anyhow::Result<()> {
        if !(self.epsilon.is_finite() && self.epsilon > 0.0) {
            return Err(anyhow!("display.epsilon must be a positive number"));
        }
        if self.grid_points < 2 {
            return Err(anyhow!("display.grid_points must be at least 2"));
        }
        Ok(())
    }
}

/// Scheduler -> colour. Schedulers without an entry use the renderer's default.
#[derive(Debug, Deserialize, PartialEq, Serialize, Clone, Default)]
#[serde(transparent)]
pub struct Palette {
    colours: BTreeMap<String, String>,
}
impl Palette {
    pub fn new(colours: BTreeMap<String, String>) -> Self {
        Self { colours }
    }

    pub fn colour_for(&self, scheduler: &str) -> Option<&str> {
        self.colours.get(scheduler).map(String::as_str)
    }

    /// Parses a `#rrggbb` entry into its components.
    pub fn rgb_for(&self, scheduler: &str) -> Option<(u8, u8, u8)> {
        let hex = self.colour_for(scheduler)?.strip_prefix('#')?;
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some((channel(0)?, channel(2)?, channel(4)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn can_load_config_file() -> anyhow::Result<()> {
        let cfg = Config::try_from_path(Path::new("./fixtures/tailscope.success.toml"))?;
        assert_eq!(cfg.schedulers, vec!["sfs", "tla", "cfs"]);
        assert_eq!(cfg.inputs.slo, Path::new("./fixtures/optimal.txt"));
        assert_eq!(cfg.inputs.logs, vec![Path::new("./fixtures/result").to_path_buf()]);
        assert_eq!(cfg.display.grid_points, 400);
        assert!(cfg.display.is_dashed("tla"));
        assert!(!cfg.display.is_dashed("sfs"));
        Ok(())
    }

    #[test]
    fn example_config_is_valid() -> anyhow::Result<()> {
        let cfg = Config::try_from_str(EXAMPLE_CONFIG)?;
        assert_eq!(cfg.category_buckets()?.iter().count(), 3);
        assert_eq!(cfg.palette.colour_for("ideal"), Some("#076AEB"));
        Ok(())
    }

    #[test]
    fn defaults_apply_when_sections_are_missing() -> anyhow::Result<()> {
        let cfg = Config::try_from_str(
            r#"
            schedulers = ["sfs"]

            [inputs]
            slo = "optimal.txt"
            identity = "workload.txt"
            logs = ["result"]
            "#,
        )?;
        assert_eq!(cfg.display, Display::default());
        assert_eq!(cfg.palette, Palette::default());
        assert!(cfg.categories.is_empty());
        assert_eq!(cfg.output_dir(), PathBuf::from("result"));
        Ok(())
    }

    #[test]
    fn overlapping_categories_fail_validation() {
        let res = Config::try_from_path(Path::new("./fixtures/tailscope.overlapping.toml"));
        assert!(res.is_err());
    }

    #[test]
    fn ideal_is_a_reserved_scheduler_name() {
        let res = Config::try_from_str(
            r#"
            schedulers = ["sfs", "ideal"]

            [inputs]
            slo = "optimal.txt"
            identity = "workload.txt"
            logs = ["result"]
            "#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn duplicate_schedulers_fail_validation() {
        let res = Config::try_from_str(
            r#"
            schedulers = ["sfs", "sfs"]

            [inputs]
            slo = "optimal.txt"
            identity = "workload.txt"
            logs = ["result"]
            "#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn bad_display_settings_fail_validation() {
        let res = Config::try_from_str(
            r#"
            schedulers = ["sfs"]

            [inputs]
            slo = "optimal.txt"
            identity = "workload.txt"
            logs = ["result"]

            [display]
            epsilon = 0.0
            "#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn can_find_category_by_name() -> anyhow::Result<()> {
        let cfg = Config::try_from_path(Path::new("./fixtures/tailscope.success.toml"))?;
        let category = cfg.find_category("middle");
        assert_eq!(category.map(|c| (c.start, c.end)), Some((26, 32)));

        assert!(cfg.find_category("nope").is_none());
        Ok(())
    }

    #[test]
    fn palette_resolves_hex_colours() {
        let palette = Palette::new(BTreeMap::from([
            ("sfs".to_string(), "#3498DB".to_string()),
            ("odd".to_string(), "blue".to_string()),
        ]));
        assert_eq!(palette.rgb_for("sfs"), Some((0x34, 0x98, 0xDB)));
        assert_eq!(palette.rgb_for("odd"), None);
        assert_eq!(palette.colour_for("tla"), None);
    }

    #[test]
    fn example_config_is_not_overwritten() -> anyhow::Result<()> {
        let dir = std::env::temp_dir().join(format!("tailscope-{}", nanoid::nanoid!(8)));
        fs::create_dir_all(&dir)?;
        let path = dir.join(DEFAULT_CONFIG_PATH);

        Config::write_example_to_file(&path)?;
        assert!(Config::try_from_path(&path).is_ok());
        assert!(Config::write_example_to_file(&path).is_err());

        fs::remove_dir_all(&dir)?;
        Ok(())
    }
}
