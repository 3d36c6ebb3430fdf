//! Environment-driven service settings.
//!
//! Every variable is read through a lookup function so tests can feed a map
//! instead of mutating the process environment. All missing required
//! variables are collected and reported together.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

pub const DEFAULT_API_PREFIX: &str = "/api/v1";
pub const DEFAULT_RENDER_DPI: u32 = 300;
pub const DEFAULT_DETECTION_CONFIDENCE: f64 = 0.25;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Settings {
    pub app_name: String,
    pub api_prefix: String,
    pub server: ServerSettings,
    pub database_path: PathBuf,
    pub storage: StorageSettings,
    pub collaborators: CollaboratorSettings,
    pub processing: ProcessingSettings,
    pub logging: LogSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Empty means any origin is allowed.
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone)]
pub enum StorageSettings {
    S3(S3Settings),
    Filesystem { root: PathBuf, public_url: String },
}

#[derive(Debug, Clone)]
pub struct S3Settings {
    pub access_endpoint: String,
    pub response_endpoint: String,
    pub region: String,
    pub access_key: String,
    pub secret_key: SecretString,
    pub bucket: String,
    pub path_style: bool,
}

#[derive(Debug, Clone)]
pub struct CollaboratorSettings {
    pub use_stub: bool,
    pub llm_endpoint: Option<String>,
    pub ocr_endpoint: Option<String>,
    pub detector_endpoint: Option<String>,
    pub llm_timeout: Duration,
    pub ocr_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ProcessingSettings {
    pub render_dpi: u32,
    pub detection_confidence: f64,
    pub auto_analyze: bool,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            render_dpi: DEFAULT_RENDER_DPI,
            detection_confidence: DEFAULT_DETECTION_CONFIDENCE,
            auto_analyze: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl Settings {
    /// Loads settings from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut env = Env {
            lookup: &lookup,
            missing: Vec::new(),
        };

        let app_name = env.optional("APP_NAME").unwrap_or_else(|| "docverify".into());
        let api_prefix = normalize_prefix(
            &env.optional("API_PREFIX")
                .unwrap_or_else(|| DEFAULT_API_PREFIX.into()),
        );

        let host = env
            .optional("SERVER_HOST")
            .unwrap_or_else(|| "127.0.0.1".into());
        let port = env.required("SERVER_PORT");
        let cors_origins = env
            .optional("CORS_ORIGINS")
            .map(|v| split_list(&v))
            .unwrap_or_default();
        let max_upload_bytes = env.optional("MAX_UPLOAD_BYTES");

        let database_path = env.required("DATABASE_PATH");

        // A malformed flag counts as "not stubbed" until the missing report is out.
        let stub_flag = parse_bool_opt("USE_STUB_ADAPTER", env.optional("USE_STUB_ADAPTER"));
        let use_stub = matches!(stub_flag, Ok(Some(true)));

        let backend = env
            .optional("STORAGE_BACKEND")
            .map(|b| b.to_ascii_lowercase())
            .unwrap_or_else(|| if use_stub { "filesystem" } else { "s3" }.to_string());

        let storage = match backend.as_str() {
            "s3" => {
                let access_endpoint = env.required("S3_ACCESS_ENDPOINT");
                let response_endpoint = env.required("S3_RESPONSE_ENDPOINT");
                let region = env.required("S3_REGION");
                let access_key = env.required("S3_ACCESS_KEY");
                let secret_key = env.required("S3_SECRET_KEY");
                let bucket = env.required("S3_BUCKET");
                let path_style = env.optional("S3_PATH_STYLE");
                Some(StorageDraft::S3 {
                    access_endpoint,
                    response_endpoint,
                    region,
                    access_key,
                    secret_key,
                    bucket,
                    path_style,
                })
            }
            "filesystem" => {
                let root = env.required("STORAGE_ROOT");
                let public_url = env.optional("STORAGE_PUBLIC_URL");
                Some(StorageDraft::Filesystem { root, public_url })
            }
            _ => None,
        };

        let (llm_endpoint, ocr_endpoint, detector_endpoint) = if use_stub {
            (
                env.optional("LLM_ENDPOINT"),
                env.optional("OCR_ENDPOINT"),
                env.optional("DETECTOR_ENDPOINT"),
            )
        } else {
            (
                env.required("LLM_ENDPOINT"),
                env.required("OCR_ENDPOINT"),
                env.required("DETECTOR_ENDPOINT"),
            )
        };

        let llm_timeout = env.optional("LLM_TIMEOUT_SECS");
        let ocr_timeout = env.optional("OCR_TIMEOUT_SECS");
        let render_dpi = env.optional("RENDER_DPI");
        let detection_confidence = env.optional("DETECTION_CONFIDENCE");
        let auto_analyze = env.optional("AUTO_ANALYZE");
        let log_level = env.optional("LOG_LEVEL");
        let log_format = env.optional("LOG_FORMAT");

        if !env.missing.is_empty() {
            return Err(ConfigError::Missing {
                names: env.missing,
            });
        }
        stub_flag?;

        // Past this point every required value is present.
        let storage = match storage {
            Some(StorageDraft::S3 {
                access_endpoint,
                response_endpoint,
                region,
                access_key,
                secret_key,
                bucket,
                path_style,
            }) => StorageSettings::S3(S3Settings {
                access_endpoint: access_endpoint.unwrap_or_default(),
                response_endpoint: response_endpoint.unwrap_or_default(),
                region: region.unwrap_or_default(),
                access_key: access_key.unwrap_or_default(),
                secret_key: SecretString::from(secret_key.unwrap_or_default()),
                bucket: bucket.unwrap_or_default(),
                path_style: parse_bool_opt("S3_PATH_STYLE", path_style)?.unwrap_or(true),
            }),
            Some(StorageDraft::Filesystem { root, public_url }) => {
                let root = PathBuf::from(root.unwrap_or_default());
                let public_url =
                    public_url.unwrap_or_else(|| format!("file://{}", root.display()));
                StorageSettings::Filesystem { root, public_url }
            }
            None => {
                return Err(ConfigError::Invalid {
                    name: "STORAGE_BACKEND".into(),
                    value: backend,
                    reason: "expected 's3' or 'filesystem'".into(),
                })
            }
        };

        let log_format = match log_format.as_deref().map(str::to_ascii_lowercase) {
            None => LogFormat::Pretty,
            Some(f) if f == "pretty" || f == "text" => LogFormat::Pretty,
            Some(f) if f == "json" => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "LOG_FORMAT".into(),
                    value: other,
                    reason: "expected 'pretty' or 'json'".into(),
                })
            }
        };

        let detection_confidence =
            parse_opt::<f64>("DETECTION_CONFIDENCE", detection_confidence)?
                .unwrap_or(DEFAULT_DETECTION_CONFIDENCE);
        if !(0.0..=1.0).contains(&detection_confidence) {
            return Err(ConfigError::Invalid {
                name: "DETECTION_CONFIDENCE".into(),
                value: detection_confidence.to_string(),
                reason: "must be between 0 and 1".into(),
            });
        }

        Ok(Self {
            app_name,
            api_prefix,
            server: ServerSettings {
                host,
                port: parse_opt("SERVER_PORT", port)?.unwrap_or_default(),
                cors_origins,
                max_upload_bytes: parse_opt("MAX_UPLOAD_BYTES", max_upload_bytes)?
                    .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            },
            database_path: PathBuf::from(database_path.unwrap_or_default()),
            storage,
            collaborators: CollaboratorSettings {
                use_stub,
                llm_endpoint,
                ocr_endpoint,
                detector_endpoint,
                llm_timeout: Duration::from_secs(
                    parse_opt("LLM_TIMEOUT_SECS", llm_timeout)?.unwrap_or(120),
                ),
                ocr_timeout: Duration::from_secs(
                    parse_opt("OCR_TIMEOUT_SECS", ocr_timeout)?.unwrap_or(60),
                ),
            },
            processing: ProcessingSettings {
                render_dpi: parse_opt("RENDER_DPI", render_dpi)?.unwrap_or(DEFAULT_RENDER_DPI),
                detection_confidence,
                auto_analyze: parse_bool_opt("AUTO_ANALYZE", auto_analyze)?.unwrap_or(true),
            },
            logging: LogSettings {
                level: log_level.unwrap_or_else(|| "info".into()),
                format: log_format,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

enum StorageDraft {
    S3 {
        access_endpoint: Option<String>,
        response_endpoint: Option<String>,
        region: Option<String>,
        access_key: Option<String>,
        secret_key: Option<String>,
        bucket: Option<String>,
        path_style: Option<String>,
    },
    Filesystem {
        root: Option<String>,
        public_url: Option<String>,
    },
}

struct Env<'a, F> {
    lookup: &'a F,
    missing: Vec<String>,
}

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&mut self, name: &str) -> Option<String> {
        let value = self.optional(name);
        if value.is_none() {
            self.missing.push(name.to_string());
        }
        value
    }
}

fn parse_opt<T>(name: &str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|v| {
            v.parse::<T>().map_err(|e| ConfigError::Invalid {
                name: name.to_string(),
                value: v.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_bool_opt(name: &str, value: Option<String>) -> Result<Option<bool>, ConfigError> {
    value
        .map(|v| match v.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid {
                name: name.to_string(),
                value: v.clone(),
                reason: "expected a boolean".into(),
            }),
        })
        .transpose()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
