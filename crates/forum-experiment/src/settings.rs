//! Simulation configuration sources: presets and TOML files.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use contagion_kernel::SimConfig;

/// Named parameter sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Fixed baselines, uniform shocks, no satiation
    Cyberemotions,
    /// Sampled baselines, satiation and opinion dynamics
    OpinionPolarization,
}

impl Preset {
    pub fn all() -> Vec<Self> {
        vec![Self::Cyberemotions, Self::OpinionPolarization]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Cyberemotions => "cyberemotions",
            Self::OpinionPolarization => "opinion",
        }
    }

    pub fn config(self) -> SimConfig {
        match self {
            Self::Cyberemotions => SimConfig::default(),
            Self::OpinionPolarization => SimConfig::opinion_polarization(),
        }
    }
}

pub fn parse_preset(s: &str) -> Result<Preset> {
    match s.to_lowercase().as_str() {
        "cyberemotions" | "cyber" | "default" => Ok(Preset::Cyberemotions),
        "opinion" | "opinion_polarization" | "opinion-polarization" => {
            Ok(Preset::OpinionPolarization)
        }
        _ => anyhow::bail!("Unknown preset: {}. Valid: cyberemotions, opinion", s),
    }
}

/// Parse and validate a TOML configuration.
pub fn parse_config(toml_str: &str) -> Result<SimConfig> {
    let config: SimConfig = toml::from_str(toml_str).context("Failed to parse config")?;
    config.validate()?;
    Ok(config)
}

/// Load and validate a TOML configuration file.
pub fn load_config(path: impl AsRef<Path>) -> Result<SimConfig> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&text).with_context(|| format!("Invalid config file {}", path.display()))
}

/// Render a configuration as TOML.
pub fn render_config(config: &SimConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to render config")
}

/// Generate a timestamped output path from the given path.
/// e.g., "runs.json" -> "runs-20260108-010530.json"
pub fn timestamped_path(path: &Path) -> PathBuf {
    let timestamp = Local::now().format("%Y%m%d-%H%M%S");
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("results");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("json");
    let parent = path.parent().unwrap_or(Path::new("."));
    parent.join(format!("{}-{}.{}", stem, timestamp, ext))
}

#[cfg(test)]
mod tests {
    use super::*;
    use contagion_kernel::{FieldImpact, ThresholdSource};

    #[test]
    fn test_parse_preset_aliases() {
        assert_eq!(parse_preset("cyber").unwrap(), Preset::Cyberemotions);
        assert_eq!(parse_preset("Opinion").unwrap(), Preset::OpinionPolarization);
        assert!(parse_preset("nope").is_err());
        for preset in Preset::all() {
            assert_eq!(parse_preset(preset.name()).unwrap(), preset);
        }
    }

    #[test]
    fn test_presets_render_and_parse_back() {
        for preset in Preset::all() {
            let config = preset.config();
            let text = render_config(&config).unwrap();
            assert_eq!(parse_config(&text).unwrap(), config);
        }
    }

    #[test]
    fn test_parse_hand_written_config() {
        let text = r#"
            agents = 50
            max_steps = 100
            seed = 7
            down_regulation = 0.4

            [baseline.valence]
            kind = "normal"
            mean = 0.0
            std_dev = 0.1

            [baseline.arousal]
            kind = "fixed"
            value = 0.0

            [threshold]
            kind = "uniform"
            min = 0.1
            max = 1.1

            [decay]
            valence = 0.5
            arousal = 0.9

            [amplitude]
            valence = 0.3
            arousal = 0.3

            [shock]
            kind = "uniform"

            [response]
            valence = [0.0, 1.0, 0.0, -1.0]
            arousal = [0.05, 0.5, 0.0, 0.0]
            routing = "absolute_valence"

            [field]
            initial_charge = 0.0
            decay = 0.7

            [field.impact]
            kind = "per_capita"
            k = 5.0

            [satiation]
            constant = 0.5
        "#;
        let config = parse_config(text).unwrap();
        assert_eq!(config.agents, 50);
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.dt, 1.0);
        assert_eq!(config.field.impact, FieldImpact::PerCapita { k: 5.0 });
        assert!((config.effective_impact() - 0.1).abs() < 1e-12);
        assert_eq!(config.threshold, ThresholdSource::Uniform { min: 0.1, max: 1.1 });
        assert!(config.satiation.is_some());
        assert!(config.opinion.is_none());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = SimConfig::default();
        config.threshold = ThresholdSource::Uniform { min: 2.0, max: 1.0 };
        let text = render_config(&config).unwrap();
        let err = parse_config(&text).unwrap_err();
        assert!(err.to_string().contains("inverted"));
    }

    #[test]
    fn test_timestamped_path_keeps_stem_and_extension() {
        let path = timestamped_path(Path::new("out/runs.json"));
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("runs-"));
        assert!(name.ends_with(".json"));
        assert_eq!(path.parent().unwrap(), Path::new("out"));
    }
}
