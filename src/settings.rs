// settings.rs — viewer configuration
//
// - Settings live in a JSON file; every field is optional and falls back to its default
// - Search order: --config <file> -> <exe_dir>/assets/picviewer.json -> ./assets/picviewer.json
// - No file found: defaults
// - Overrides, last wins: env PICVIEWER_FOV, then CLI --fov <deg> / --terrain <dir> (clap)

use crate::camera::{MountAngles, VerticalFov};
use crate::error::SettingsError;
use crate::projection::TerrainSearch;
use clap::Parser;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "picviewer.json";
pub const FOV_ENV: &str = "PICVIEWER_FOV";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Horizontal field of view, degrees.
    pub fov_deg: f64,
    pub vertical_fov: VerticalFov,
    pub mount: MountAngles,
    pub terrain_source: String,
    /// Directory of `.hgt` tiles. Without it the terrain is flat at sea level.
    pub terrain_dir: Option<PathBuf>,
    pub search: TerrainSearch,
    pub mosaic_columns: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            fov_deg: 62.0,
            vertical_fov: VerticalFov::default(),
            mount: MountAngles::default(),
            terrain_source: "SRTM3".to_string(),
            terrain_dir: None,
            search: TerrainSearch::default(),
            mosaic_columns: 5,
        }
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid {
        name,
        reason: reason.into(),
    }
}

pub fn check_fov(fov_deg: f64) -> Result<f64, SettingsError> {
    if fov_deg.is_finite() && fov_deg > 0.0 && fov_deg < 180.0 {
        Ok(fov_deg)
    } else {
        Err(invalid("fov_deg", format!("{fov_deg} is not in (0, 180)")))
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        check_fov(self.fov_deg)?;
        if let VerticalFov::Explicit(v) = self.vertical_fov {
            if !(v.is_finite() && v > 0.0 && v < 180.0) {
                return Err(invalid("vertical_fov", format!("{v} is not in (0, 180)")));
            }
        }
        let MountAngles { roll, pitch, yaw } = self.mount;
        if !(roll.is_finite() && pitch.is_finite() && yaw.is_finite()) {
            return Err(invalid("mount", "angles must be finite"));
        }
        if self.mosaic_columns == 0 {
            return Err(invalid("mosaic_columns", "must be at least 1"));
        }
        self.search
            .validate()
            .map_err(|e| invalid("search", e.to_string()))
    }
}

/// Find assets/picviewer.json by searching:
/// 1) <exe_dir>/assets/picviewer.json
/// 2) ./assets/picviewer.json
fn find_settings_file() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let p = dir.join("assets").join(SETTINGS_FILE);
            if p.exists() {
                return Some(p);
            }
        }
    }

    let p = PathBuf::from("assets").join(SETTINGS_FILE);
    if p.exists() {
        return Some(p);
    }

    None
}

/// Headless viewer for geotagged aerial photos.
#[derive(Debug, Clone, Default, PartialEq, Parser)]
#[command(author, version, about = "Project geotagged photos onto terrain and mark POIs")]
pub struct CliArgs {
    /// Image file or directory of images. Defaults to the current directory.
    pub path: Option<PathBuf>,

    /// Settings file. Searched under assets/ if omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Horizontal field of view in degrees.
    #[arg(long, value_parser = parse_fov)]
    pub fov: Option<f64>,

    /// Directory of SRTM `.hgt` tiles.
    #[arg(long = "terrain")]
    pub terrain_dir: Option<PathBuf>,
}

fn parse_fov(s: &str) -> Result<f64, String> {
    let fov = s.parse::<f64>().map_err(|e| format!("{s}: {e}"))?;
    check_fov(fov).map_err(|e| e.to_string())
}

/// Build the effective settings: file (explicit, else searched, else defaults), then
/// the FOV environment variable, then command line overrides.
pub fn resolve_settings<F>(cli: &CliArgs, env: F) -> Result<Settings, SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    let file = match &cli.config {
        Some(p) => Some(p.clone()),
        None => find_settings_file(),
    };
    let mut settings = match file {
        Some(p) => {
            info!("loading settings from {}", p.display());
            Settings::load(&p)?
        }
        None => Settings::default(),
    };

    if let Some(v) = env(FOV_ENV) {
        if !v.trim().is_empty() {
            let fov = v
                .trim()
                .parse::<f64>()
                .map_err(|e| invalid("fov_deg", format!("{FOV_ENV}={v}: {e}")))?;
            settings.fov_deg = check_fov(fov)?;
        }
    }
    if let Some(fov) = cli.fov {
        settings.fov_deg = fov;
    }
    if let Some(dir) = &cli.terrain_dir {
        settings.terrain_dir = Some(dir.clone());
    }

    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<CliArgs, clap::Error> {
        CliArgs::try_parse_from(std::iter::once("picviewer").chain(s.split_whitespace()))
    }

    #[test]
    fn defaults_are_valid() {
        let s = Settings::default();
        assert!(s.validate().is_ok());
        assert_eq!(s.fov_deg, 62.0);
        assert_eq!(s.terrain_source, "SRTM3");
        assert_eq!(s.mount.pitch, -90.0);
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(
            &path,
            r#"{ "fov_deg": 36.9, "vertical_fov": { "policy": "explicit", "deg": 28.0 },
                 "search": { "step_m": 2.5 } }"#,
        )
        .unwrap();

        let s = Settings::load(&path).unwrap();
        assert_eq!(s.fov_deg, 36.9);
        assert_eq!(s.vertical_fov, VerticalFov::Explicit(28.0));
        assert_eq!(s.search.step_m, 2.5);
        assert_eq!(s.search.max_range_m, TerrainSearch::default().max_range_m);
        assert_eq!(s.mosaic_columns, 5);
    }

    #[test]
    fn bad_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");

        std::fs::write(&path, r#"{ "fov_deg": 200 }"#).unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(SettingsError::Invalid { name: "fov_deg", .. })
        ));

        std::fs::write(&path, r#"{ "mosaic_columns": 0 }"#).unwrap();
        assert!(Settings::load(&path).is_err());

        std::fs::write(&path, r#"{ "search": { "step_m": 1e-6 } }"#).unwrap();
        assert!(matches!(
            Settings::load(&path),
            Err(SettingsError::Invalid { name: "search", .. })
        ));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(Settings::load(&path), Err(SettingsError::Json(_))));

        assert!(matches!(
            Settings::load(&dir.path().join("missing.json")),
            Err(SettingsError::Io(_))
        ));
    }

    #[test]
    fn parses_cli() {
        let cli = parse("--fov 45 --terrain /data/srtm photos").unwrap();
        assert_eq!(cli.fov, Some(45.0));
        assert_eq!(cli.terrain_dir, Some(PathBuf::from("/data/srtm")));
        assert_eq!(cli.path, Some(PathBuf::from("photos")));
        assert_eq!(cli.config, None);

        assert_eq!(parse("").unwrap(), CliArgs::default());
        assert!(parse("--fov").is_err());
        assert!(parse("--fov 190").is_err());
        assert!(parse("--fov wide").is_err());
        assert!(parse("--zoom 2").is_err());
        assert!(parse("a b").is_err());
    }

    #[test]
    fn overrides_apply_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        std::fs::write(&path, r#"{ "fov_deg": 40 }"#).unwrap();

        let mut cli = CliArgs {
            config: Some(path.clone()),
            ..CliArgs::default()
        };
        let s = resolve_settings(&cli, |_| None).unwrap();
        assert_eq!(s.fov_deg, 40.0);

        let env = |k: &str| (k == FOV_ENV).then(|| "50".to_string());
        assert_eq!(resolve_settings(&cli, env).unwrap().fov_deg, 50.0);

        cli.fov = Some(70.0);
        assert_eq!(resolve_settings(&cli, env).unwrap().fov_deg, 70.0);

        let bad_env = |_: &str| Some("wide".to_string());
        assert!(resolve_settings(&cli, bad_env).is_err());
    }
}
