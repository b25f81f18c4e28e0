//! Configuration module
//!
//! All settings are read once from the environment (after loading `.env`) and
//! stay static for the lifetime of the process.

use std::env;
use std::path::PathBuf;

use crate::constants::DEFAULT_TARGET_KBPS;

const DEFAULT_LANGUAGE: &str = "pt-BR";
const DEFAULT_SERVICE: &str = "Standard";
const REFERENCE_PREFIX: &str = "dropbox";
const DESTINATION_DIR: &str = "/";
const WORK_DIR: &str = "./tmp";
const FFMPEG_PATH: &str = "ffmpeg";
const FFMPEG_TIMEOUT_SECS: u64 = 60 * 60;
const HTTP_TIMEOUT_SECS: u64 = 120;
const SERVER_PORT: u16 = 8000;
const MAX_UPLOAD_SIZE_MB: usize = 2048;
const DROPBOX_API_URL: &str = "https://api.dropboxapi.com";
const DROPBOX_CONTENT_URL: &str = "https://content.dropboxapi.com";
const TRANSKRIPTOR_API_URL: &str = "https://api.tor.app/developer/transcription/url";
const SUPABASE_TABLE: &str = "transcricoes";

/// Server-level settings
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub environment: String,
    pub max_upload_size_bytes: usize,
    pub http_timeout_secs: u64,
}

/// Blob store credentials and endpoints
#[derive(Clone)]
pub struct DropboxConfig {
    pub access_token: Option<String>,
    pub refresh_token: String,
    pub app_key: String,
    pub app_secret: String,
    pub api_url: String,
    pub content_url: String,
    pub oauth_url: String,
}

impl std::fmt::Debug for DropboxConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DropboxConfig")
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &"<redacted>")
            .field("app_key", &self.app_key)
            .field("app_secret", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("content_url", &self.content_url)
            .field("oauth_url", &self.oauth_url)
            .finish()
    }
}

/// Transcription provider settings and submission defaults
#[derive(Clone)]
pub struct TranscriptionConfig {
    pub api_url: String,
    pub api_key: String,
    pub default_language: String,
    pub default_service: String,
    pub callback_url: String,
    pub reference_prefix: String,
}

impl std::fmt::Debug for TranscriptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptionConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &"<redacted>")
            .field("default_language", &self.default_language)
            .field("default_service", &self.default_service)
            .field("callback_url", &self.callback_url)
            .field("reference_prefix", &self.reference_prefix)
            .finish()
    }
}

/// Persistence collaborator (PostgREST endpoint). Optional.
#[derive(Clone, Debug)]
pub struct PersistenceConfig {
    pub url: Option<String>,
    pub anon_key: Option<String>,
    pub table: String,
}

impl PersistenceConfig {
    pub fn is_configured(&self) -> bool {
        self.url.as_deref().is_some_and(|u| !u.is_empty())
            && self.anon_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// Application configuration
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub base: BaseConfig,
    pub target_kbps: u32,
    pub ffmpeg_path: String,
    /// Upper bound on a single ffmpeg run
    pub ffmpeg_timeout_secs: u64,
    pub work_dir: PathBuf,
    pub destination_dir: String,
    pub dropbox: DropboxConfig,
    pub transcription: TranscriptionConfig,
    pub persistence: PersistenceConfig,
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            environment: env::var("ENVIRONMENT")
                .or_else(|_| env::var("APP_ENV"))
                .unwrap_or_else(|_| "development".to_string()),
            max_upload_size_bytes: env::var("MAX_UPLOAD_SIZE_MB")
                .unwrap_or_else(|_| MAX_UPLOAD_SIZE_MB.to_string())
                .parse::<usize>()
                .unwrap_or(MAX_UPLOAD_SIZE_MB)
                * 1024
                * 1024,
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| HTTP_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(HTTP_TIMEOUT_SECS),
        };

        let target_kbps = env::var("TARGET_KBPS")
            .unwrap_or_else(|_| DEFAULT_TARGET_KBPS.to_string())
            .parse()
            .map_err(|_| anyhow::anyhow!("TARGET_KBPS must be a positive integer"))?;

        let api_url = env::var("DROPBOX_API_URL").unwrap_or_else(|_| DROPBOX_API_URL.to_string());
        let dropbox = DropboxConfig {
            access_token: non_empty("DROPBOX_ACCESS_TOKEN"),
            refresh_token: env::var("DROPBOX_REFRESH_TOKEN").unwrap_or_default(),
            app_key: env::var("DROPBOX_APP_KEY").unwrap_or_default(),
            app_secret: env::var("DROPBOX_APP_SECRET").unwrap_or_default(),
            content_url: env::var("DROPBOX_CONTENT_URL")
                .unwrap_or_else(|_| DROPBOX_CONTENT_URL.to_string()),
            oauth_url: env::var("DROPBOX_OAUTH_URL").unwrap_or_else(|_| api_url.clone()),
            api_url,
        };

        let transcription = TranscriptionConfig {
            api_url: env::var("TRANSKRIPTOR_API_URL")
                .unwrap_or_else(|_| TRANSKRIPTOR_API_URL.to_string()),
            api_key: env::var("TRANSKRIPTOR_API_KEY").unwrap_or_default(),
            default_language: env::var("DEFAULT_LANGUAGE")
                .unwrap_or_else(|_| DEFAULT_LANGUAGE.to_string()),
            default_service: env::var("DEFAULT_SERVICE")
                .unwrap_or_else(|_| DEFAULT_SERVICE.to_string()),
            callback_url: env::var("CALLBACK_URL").unwrap_or_default(),
            reference_prefix: env::var("REFERENCE_PREFIX")
                .unwrap_or_else(|_| REFERENCE_PREFIX.to_string()),
        };

        let persistence = PersistenceConfig {
            url: non_empty("SUPABASE_URL"),
            anon_key: non_empty("SUPABASE_ANON_KEY"),
            table: env::var("SUPABASE_TABLE").unwrap_or_else(|_| SUPABASE_TABLE.to_string()),
        };

        Ok(Self {
            base,
            target_kbps,
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| FFMPEG_PATH.to_string()),
            ffmpeg_timeout_secs: env::var("FFMPEG_TIMEOUT_SECS")
                .unwrap_or_else(|_| FFMPEG_TIMEOUT_SECS.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("FFMPEG_TIMEOUT_SECS must be a positive integer"))?,
            work_dir: PathBuf::from(env::var("WORK_DIR").unwrap_or_else(|_| WORK_DIR.to_string())),
            destination_dir: env::var("DESTINATION_DIR")
                .unwrap_or_else(|_| DESTINATION_DIR.to_string()),
            dropbox,
            transcription,
            persistence,
        })
    }

    /// Fail fast on missing secrets or impossible values.
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.target_kbps == 0 {
            anyhow::bail!("TARGET_KBPS must be greater than 0");
        }
        if self.dropbox.refresh_token.is_empty()
            || self.dropbox.app_key.is_empty()
            || self.dropbox.app_secret.is_empty()
        {
            anyhow::bail!(
                "DROPBOX_REFRESH_TOKEN, DROPBOX_APP_KEY and DROPBOX_APP_SECRET must be set"
            );
        }
        if self.transcription.api_key.is_empty() {
            anyhow::bail!("TRANSKRIPTOR_API_KEY must be set");
        }
        if self.persistence.url.is_some() != self.persistence.anon_key.is_some() {
            anyhow::bail!("SUPABASE_URL and SUPABASE_ANON_KEY must be set together");
        }
        if self.base.http_timeout_secs == 0 {
            anyhow::bail!("HTTP_TIMEOUT_SECS must be greater than 0");
        }
        if self.ffmpeg_path.trim().is_empty() {
            anyhow::bail!("FFMPEG_PATH must not be empty");
        }
        if self.ffmpeg_timeout_secs == 0 {
            anyhow::bail!("FFMPEG_TIMEOUT_SECS must be greater than 0");
        }
        Ok(())
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let env = self.base.environment.to_lowercase();
        env == "production" || env == "prod"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RelayConfig {
        RelayConfig {
            base: BaseConfig {
                server_port: 8000,
                environment: "development".to_string(),
                max_upload_size_bytes: 1024,
                http_timeout_secs: 120,
            },
            target_kbps: 64,
            ffmpeg_path: "ffmpeg".to_string(),
            ffmpeg_timeout_secs: FFMPEG_TIMEOUT_SECS,
            work_dir: PathBuf::from("./tmp"),
            destination_dir: "/".to_string(),
            dropbox: DropboxConfig {
                access_token: None,
                refresh_token: "refresh".to_string(),
                app_key: "key".to_string(),
                app_secret: "s3cr3t-value".to_string(),
                api_url: DROPBOX_API_URL.to_string(),
                content_url: DROPBOX_CONTENT_URL.to_string(),
                oauth_url: DROPBOX_API_URL.to_string(),
            },
            transcription: TranscriptionConfig {
                api_url: TRANSKRIPTOR_API_URL.to_string(),
                api_key: "tk".to_string(),
                default_language: "pt-BR".to_string(),
                default_service: "Standard".to_string(),
                callback_url: String::new(),
                reference_prefix: "dropbox".to_string(),
            },
            persistence: PersistenceConfig {
                url: None,
                anon_key: None,
                table: "transcricoes".to_string(),
            },
        }
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_bitrate() {
        let mut config = sample();
        config.target_kbps = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_ffmpeg_timeout() {
        let mut config = sample();
        config.ffmpeg_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_renewal_credentials() {
        let mut config = sample();
        config.dropbox.refresh_token.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_paired_persistence_settings() {
        let mut config = sample();
        config.persistence.url = Some("https://db.example.com".to_string());
        assert!(config.validate().is_err());
        config.persistence.anon_key = Some("anon".to_string());
        assert!(config.validate().is_ok());
        assert!(config.persistence.is_configured());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let rendered = format!("{:?}", sample());
        assert!(!rendered.contains("s3cr3t-value"));
        assert!(!rendered.contains("\"tk\""));
    }
}
