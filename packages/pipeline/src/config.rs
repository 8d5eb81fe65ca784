//! Pipeline configuration.
//!
//! Loaded from a TOML file; every option has a default so a partial (or
//! empty) file is valid. Relative paths are resolved against the directory
//! the file was loaded from.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use junction_danger_analytics_models::{
    DEFAULT_WEIGHT_FATAL, DEFAULT_WEIGHT_SERIOUS, DEFAULT_WEIGHT_SLIGHT, RankingFilter,
    SeverityWeights,
};
use junction_danger_collision::NormalizeOptions;
use junction_danger_collision::normalize::DEFAULT_VALID_JUNCTION_TYPES;
use junction_danger_collision::recency::DEFAULT_RECENCY_CONSTANT;
use junction_danger_collision_models::CasualtyType;
use serde::{Deserialize, Serialize};

use crate::PipelineError;

/// Default consolidation radius, in meters.
pub const DEFAULT_TOLERANCE: f64 = 15.0;

/// Default maximum collision-to-junction distance, in meters.
pub const DEFAULT_DISTANCE_THRESHOLD: f64 = 15.0;

/// Default number of ranked junctions.
pub const DEFAULT_N_JUNCTIONS: usize = 10;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Road network inputs.
    pub network: NetworkConfig,
    /// Collision feed inputs and normalization options.
    pub collisions: CollisionsConfig,
    /// Spatial matching.
    pub matching: MatchingConfig,
    /// Severity weights and recency.
    pub scoring: ScoringConfig,
    /// Ranking filter and size.
    pub ranking: RankingConfig,
    /// Output location and formats.
    pub output: OutputConfig,

    /// Directory relative paths are resolved against.
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// `[network]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Raw street graph JSON.
    pub raw_graph: PathBuf,
    /// Consolidated graph JSON produced at [`Self::tolerance`].
    pub consolidated_graph: PathBuf,
    /// Consolidation radius in meters.
    pub tolerance: f64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            raw_graph: PathBuf::from("data/network/raw_graph.json"),
            consolidated_graph: PathBuf::from("data/network/consolidated_graph.json"),
            tolerance: DEFAULT_TOLERANCE,
        }
    }
}

/// `[collisions]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionsConfig {
    /// Collision feed CSV.
    pub collisions: PathBuf,
    /// Casualty feed CSV.
    pub casualties: PathBuf,
    /// Junction classifications to keep.
    pub valid_junction_types: Vec<String>,
    /// Casualty types to count and rank.
    pub valid_casualty_types: Vec<CasualtyType>,
    /// Raw value to canonical value corrections.
    pub value_aliases: BTreeMap<String, String>,
}

impl Default for CollisionsConfig {
    fn default() -> Self {
        Self {
            collisions: PathBuf::from("data/collisions.csv"),
            casualties: PathBuf::from("data/casualties.csv"),
            valid_junction_types: DEFAULT_VALID_JUNCTION_TYPES
                .iter()
                .map(ToString::to_string)
                .collect(),
            valid_casualty_types: CasualtyType::all().to_vec(),
            value_aliases: BTreeMap::new(),
        }
    }
}

/// `[matching]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Collisions further than this from every junction are dropped.
    pub distance_to_junction_threshold: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            distance_to_junction_threshold: DEFAULT_DISTANCE_THRESHOLD,
        }
    }
}

/// `[scoring]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Weight of a fatal casualty.
    pub weight_fatal: f64,
    /// Weight of a serious casualty.
    pub weight_serious: f64,
    /// Weight of a slight casualty.
    pub weight_slight: f64,
    /// `C` in `log10(year - min_year + C)`.
    pub recency_constant: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weight_fatal: DEFAULT_WEIGHT_FATAL,
            weight_serious: DEFAULT_WEIGHT_SERIOUS,
            weight_slight: DEFAULT_WEIGHT_SLIGHT,
            recency_constant: DEFAULT_RECENCY_CONSTANT,
        }
    }
}

impl ScoringConfig {
    /// The configured severity weights.
    #[must_use]
    pub const fn weights(&self) -> SeverityWeights {
        SeverityWeights {
            fatal: self.weight_fatal,
            serious: self.weight_serious,
            slight: self.weight_slight,
        }
    }
}

/// `[ranking]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Rank only this casualty type; `None` ranks every valid type.
    pub casualty_type: Option<CasualtyType>,
    /// Top-N cutoff.
    pub n_junctions: usize,
    /// First year kept (inclusive).
    pub min_year: Option<i32>,
    /// Last year kept (inclusive).
    pub max_year: Option<i32>,
    /// Boroughs kept; `None` keeps all.
    pub boroughs: Option<Vec<String>>,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            casualty_type: None,
            n_junctions: DEFAULT_N_JUNCTIONS,
            min_year: None,
            max_year: None,
            boroughs: None,
        }
    }
}

/// `[output]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory every table is written to.
    pub dir: PathBuf,
    /// Also write Parquet copies of every table.
    pub parquet: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/generated"),
            parquet: false,
        }
    }
}

/// Per-run overrides from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RankingOverrides {
    /// `--casualty-type`
    pub casualty_type: Option<CasualtyType>,
    /// `--borough` (repeatable)
    pub boroughs: Vec<String>,
    /// `--n-junctions`
    pub n_junctions: Option<usize>,
    /// `--min-year`
    pub min_year: Option<i32>,
    /// `--max-year`
    pub max_year: Option<i32>,
}

impl PipelineConfig {
    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Io`] if the file cannot be read,
    /// [`PipelineError::Toml`] if it is not valid TOML for this schema, and
    /// [`PipelineError::Config`] if a value is out of range.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            log::error!("Cannot read config file {}: {e}", path.display());
            e
        })?;
        let mut config = Self::parse(&content)?;
        config.base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    ///
    /// # Errors
    ///
    /// Same as [`Self::load`] when the file exists.
    pub fn load_or_default(path: &Path) -> Result<Self, PipelineError> {
        if path.exists() {
            Self::load(path)
        } else {
            log::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Parses and validates configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Toml`] or [`PipelineError::Config`].
    pub fn parse(content: &str) -> Result<Self, PipelineError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value is in range.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] naming the first offending option.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let scoring = &self.scoring;

        if !is_positive(self.network.tolerance) {
            return Err(config_error("network.tolerance must be positive"));
        }
        if !is_positive(self.matching.distance_to_junction_threshold) {
            return Err(config_error(
                "matching.distance_to_junction_threshold must be positive",
            ));
        }
        for (name, weight) in [
            ("weight_fatal", scoring.weight_fatal),
            ("weight_serious", scoring.weight_serious),
            ("weight_slight", scoring.weight_slight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return Err(config_error(&format!(
                    "scoring.{name} must not be negative"
                )));
            }
        }
        if !scoring.recency_constant.is_finite() || scoring.recency_constant <= 1.0 {
            return Err(config_error("scoring.recency_constant must be greater than 1"));
        }
        if self.ranking.n_junctions == 0 {
            return Err(config_error("ranking.n_junctions must be at least 1"));
        }
        if let (Some(min), Some(max)) = (self.ranking.min_year, self.ranking.max_year)
            && min > max
        {
            return Err(config_error(&format!(
                "ranking.min_year ({min}) is after ranking.max_year ({max})"
            )));
        }
        if self.collisions.valid_casualty_types.is_empty() {
            return Err(config_error(
                "collisions.valid_casualty_types must not be empty",
            ));
        }
        Ok(())
    }

    /// Applies command-line overrides and re-validates.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Config`] if an override is out of range.
    pub fn apply_overrides(&mut self, overrides: &RankingOverrides) -> Result<(), PipelineError> {
        if let Some(casualty_type) = overrides.casualty_type {
            self.ranking.casualty_type = Some(casualty_type);
        }
        if !overrides.boroughs.is_empty() {
            self.ranking.boroughs = Some(overrides.boroughs.clone());
        }
        if let Some(n) = overrides.n_junctions {
            self.ranking.n_junctions = n;
        }
        if overrides.min_year.is_some() {
            self.ranking.min_year = overrides.min_year;
        }
        if overrides.max_year.is_some() {
            self.ranking.max_year = overrides.max_year;
        }
        self.validate()
    }

    /// Resolves a configured path against [`Self::base_dir`].
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// The resolved output directory.
    #[must_use]
    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.output.dir)
    }

    /// Normalizer options from `[collisions]` and `[scoring]`.
    #[must_use]
    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            valid_junction_types: self.collisions.valid_junction_types.clone(),
            valid_casualty_types: self.collisions.valid_casualty_types.clone(),
            recency_constant: self.scoring.recency_constant,
            value_aliases: self.collisions.value_aliases.clone(),
        }
    }

    /// Casualty types a ranking run covers.
    #[must_use]
    pub fn ranked_casualty_types(&self) -> Vec<CasualtyType> {
        self.ranking.casualty_type.map_or_else(
            || self.collisions.valid_casualty_types.clone(),
            |casualty_type| vec![casualty_type],
        )
    }

    /// The ranking filter for `casualty_type` under `[ranking]`.
    #[must_use]
    pub fn ranking_filter(&self, casualty_type: CasualtyType) -> RankingFilter {
        let filter = RankingFilter::new(casualty_type)
            .with_years(self.ranking.min_year, self.ranking.max_year);
        match &self.ranking.boroughs {
            Some(boroughs) => filter.with_boroughs(boroughs),
            None => filter,
        }
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn config_error(message: &str) -> PipelineError {
    PipelineError::Config {
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = PipelineConfig::parse("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert!((config.matching.distance_to_junction_threshold - 15.0).abs() < f64::EPSILON);
        assert_eq!(config.ranking.n_junctions, 10);
        assert_eq!(config.scoring.weights(), SeverityWeights::default());
        assert_eq!(config.output.dir, PathBuf::from("data/generated"));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = PipelineConfig::parse(
            r#"
            [scoring]
            weight_fatal = 5.0
            recency_constant = 6.0

            [collisions]
            valid_casualty_types = ["pedestrian"]

            [collisions.value_aliases]
            "KINGSTON" = "KINGSTON UPON THAMES"

            [ranking]
            boroughs = ["Camden", "Islington"]
            min_year = 2019
            "#,
        )
        .unwrap();

        assert!((config.scoring.weight_fatal - 5.0).abs() < f64::EPSILON);
        assert!((config.scoring.weight_serious - 1.0).abs() < f64::EPSILON);
        assert!((config.scoring.recency_constant - 6.0).abs() < f64::EPSILON);
        assert_eq!(
            config.collisions.valid_casualty_types,
            vec![CasualtyType::Pedestrian]
        );
        assert_eq!(
            config.collisions.value_aliases.get("KINGSTON").map(String::as_str),
            Some("KINGSTON UPON THAMES")
        );
        assert_eq!(config.ranked_casualty_types(), vec![CasualtyType::Pedestrian]);

        let filter = config.ranking_filter(CasualtyType::Pedestrian);
        assert!(filter.matches("CAMDEN", 2020));
        assert!(!filter.matches("CAMDEN", 2018));
        assert!(!filter.matches("HACKNEY", 2020));
    }

    #[test]
    fn rejects_out_of_range_values() {
        for text in [
            "[network]\ntolerance = 0.0",
            "[matching]\ndistance_to_junction_threshold = -1.0",
            "[scoring]\nweight_slight = -0.5",
            "[scoring]\nrecency_constant = 1.0",
            "[ranking]\nn_junctions = 0",
            "[ranking]\nmin_year = 2022\nmax_year = 2020",
            "[collisions]\nvalid_casualty_types = []",
        ] {
            let err = PipelineConfig::parse(text).unwrap_err();
            assert!(matches!(err, PipelineError::Config { .. }), "{text}: {err}");
        }
    }

    #[test]
    fn unknown_casualty_type_is_a_toml_error() {
        let err = PipelineConfig::parse("[ranking]\ncasualty_type = \"horse\"").unwrap_err();
        assert!(matches!(err, PipelineError::Toml(_)));
    }

    #[test]
    fn overrides_replace_ranking_options() {
        let mut config = PipelineConfig::default();
        config
            .apply_overrides(&RankingOverrides {
                casualty_type: Some(CasualtyType::Cyclist),
                boroughs: vec!["hackney".to_string()],
                n_junctions: Some(25),
                min_year: Some(2020),
                max_year: None,
            })
            .unwrap();

        assert_eq!(config.ranked_casualty_types(), vec![CasualtyType::Cyclist]);
        assert_eq!(config.ranking.n_junctions, 25);
        let filter = config.ranking_filter(CasualtyType::Cyclist);
        assert!(filter.matches("HACKNEY", 2021));
        assert!(!filter.matches("HACKNEY", 2019));

        let err = config
            .apply_overrides(&RankingOverrides {
                n_junctions: Some(0),
                ..RankingOverrides::default()
            })
            .unwrap_err();
        assert!(matches!(err, PipelineError::Config { .. }));
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let config = PipelineConfig {
            base_dir: PathBuf::from("/srv/junctions"),
            ..PipelineConfig::default()
        };
        assert_eq!(
            config.output_dir(),
            PathBuf::from("/srv/junctions/data/generated")
        );
        assert_eq!(
            config.resolve(Path::new("/abs/collisions.csv")),
            PathBuf::from("/abs/collisions.csv")
        );
    }
}
