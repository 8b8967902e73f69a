use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Config;
use crate::decode::parse_format;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub server: Option<ServerConfig>,
    pub ocr: Option<OcrConfig>,
    pub images: Option<ImagesConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub max_upload_mb: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrConfig {
    pub tesseract_path: Option<String>,
    pub language: Option<String>,
    pub page_segmentation_mode: Option<u8>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImagesConfig {
    pub allowed_formats: Option<Vec<String>>,
    pub max_width: Option<u32>,
    pub max_height: Option<u32>,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("unknown image format in allowed_formats: {0}")]
    UnknownFormat(String),
    #[error("invalid value for {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: String,
    },
}

/// Platform config directory path: `<config_dir>/ocr-gateway/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("ocr-gateway").join("config.toml"))
}

/// Load config by cascading CWD `.ocr-gateway.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".ocr-gateway.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    match read_config(path) {
        Ok(config) => Some(config),
        Err(ConfigError::Read { .. }) => None,
        Err(e) => {
            tracing::warn!(error = %e, "ignoring config file");
            None
        }
    }
}

/// Read a config file the user asked for explicitly. Unlike
/// [`load_from_path`], a missing or malformed file is an error.
pub fn read_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        server: Some(ServerConfig {
            host: overlay
                .server
                .as_ref()
                .and_then(|s| s.host.clone())
                .or_else(|| base.server.as_ref().and_then(|s| s.host.clone())),
            port: overlay
                .server
                .as_ref()
                .and_then(|s| s.port)
                .or_else(|| base.server.as_ref().and_then(|s| s.port)),
            max_upload_mb: overlay
                .server
                .as_ref()
                .and_then(|s| s.max_upload_mb)
                .or_else(|| base.server.as_ref().and_then(|s| s.max_upload_mb)),
        }),
        ocr: Some(OcrConfig {
            tesseract_path: overlay
                .ocr
                .as_ref()
                .and_then(|o| o.tesseract_path.clone())
                .or_else(|| base.ocr.as_ref().and_then(|o| o.tesseract_path.clone())),
            language: overlay
                .ocr
                .as_ref()
                .and_then(|o| o.language.clone())
                .or_else(|| base.ocr.as_ref().and_then(|o| o.language.clone())),
            page_segmentation_mode: overlay
                .ocr
                .as_ref()
                .and_then(|o| o.page_segmentation_mode)
                .or_else(|| base.ocr.as_ref().and_then(|o| o.page_segmentation_mode)),
            timeout_secs: overlay
                .ocr
                .as_ref()
                .and_then(|o| o.timeout_secs)
                .or_else(|| base.ocr.as_ref().and_then(|o| o.timeout_secs)),
        }),
        images: Some(ImagesConfig {
            allowed_formats: overlay
                .images
                .as_ref()
                .and_then(|i| i.allowed_formats.clone())
                .or_else(|| {
                    base.images
                        .as_ref()
                        .and_then(|i| i.allowed_formats.clone())
                }),
            max_width: overlay
                .images
                .as_ref()
                .and_then(|i| i.max_width)
                .or_else(|| base.images.as_ref().and_then(|i| i.max_width)),
            max_height: overlay
                .images
                .as_ref()
                .and_then(|i| i.max_height)
                .or_else(|| base.images.as_ref().and_then(|i| i.max_height)),
        }),
    }
}

/// Turn a config file into a runtime [`Config`], filling gaps with defaults.
pub fn resolve(file: &ConfigFile) -> Result<Config, ConfigError> {
    let mut config = Config::default();

    if let Some(server) = &file.server {
        if let Some(host) = &server.host {
            config.host = host.clone();
        }
        if let Some(port) = server.port {
            config.port = port;
        }
        if let Some(mb) = server.max_upload_mb {
            if mb == 0 {
                return Err(ConfigError::Invalid {
                    field: "server.max_upload_mb",
                    reason: "must be at least 1".to_string(),
                });
            }
            config.max_upload_bytes =
                mb.checked_mul(1024 * 1024)
                    .ok_or_else(|| ConfigError::Invalid {
                        field: "server.max_upload_mb",
                        reason: format!("{mb} MB is too large"),
                    })?;
        }
    }

    if let Some(ocr) = &file.ocr {
        if let Some(path) = &ocr.tesseract_path {
            config.tesseract.binary = PathBuf::from(path);
        }
        if let Some(language) = &ocr.language {
            if language.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field: "ocr.language",
                    reason: "must not be empty".to_string(),
                });
            }
            config.tesseract.language = language.trim().to_string();
        }
        if let Some(psm) = ocr.page_segmentation_mode {
            if psm > 13 {
                return Err(ConfigError::Invalid {
                    field: "ocr.page_segmentation_mode",
                    reason: format!("{psm} is outside tesseract's 0-13 range"),
                });
            }
            config.tesseract.page_segmentation_mode = Some(psm);
        }
        if let Some(secs) = ocr.timeout_secs {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    field: "ocr.timeout_secs",
                    reason: "must be at least 1".to_string(),
                });
            }
            config.ocr_timeout = Duration::from_secs(secs);
        }
    }

    if let Some(images) = &file.images {
        if let Some(names) = &images.allowed_formats {
            config.images.allowed_formats = names
                .iter()
                .map(|n| parse_format(n).ok_or_else(|| ConfigError::UnknownFormat(n.clone())))
                .collect::<Result<_, _>>()?;
        }
        if let Some(w) = images.max_width {
            config.images.max_width = w;
        }
        if let Some(h) = images.max_height {
            config.images.max_height = h;
        }
    }

    Ok(config)
}
