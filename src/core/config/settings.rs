use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_environment, parse_f64, parse_i64,
    parse_list, parse_u16, parse_u32, parse_u64, DEFAULT_CORS_ORIGINS, DEFAULT_GENERATION_MODELS,
};
use super::types::{
    ApiSettings, ConfigError, CorsSettings, DatabaseSettings, ExamSettings, GenerationSettings,
    RedisSettings, RuntimeSettings, SecuritySettings, ServerHost, ServerPort, ServerSettings,
    Settings, TelemetrySettings,
};

const DEFAULT_GENERATION_BASE_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai";

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let host = env_or_default("EXAMS_HOST", "0.0.0.0");
        let port = env_or_default("EXAMS_PORT", "8000");

        let environment =
            parse_environment(env_optional("EXAMS_ENV").or_else(|| env_optional("ENVIRONMENT")));
        let strict_config =
            env_optional("EXAMS_STRICT_CONFIG").map(|value| parse_bool(&value)).unwrap_or(false)
                || environment.is_production();

        let project_name = env_or_default("PROJECT_NAME", "Exam Engine API");
        let version = env_or_default("VERSION", env!("CARGO_PKG_VERSION"));
        let api_v1_str = env_or_default("API_V1_STR", "/api/v1");

        let secret_key_configured = env_optional("SECRET_KEY");
        let secret_missing = secret_key_configured.is_none();
        let secret_key = secret_key_configured.unwrap_or_else(generate_ephemeral_secret);
        let algorithm = env_or_default("ALGORITHM", "HS256");

        let cors_origins = parse_list(
            "BACKEND_CORS_ORIGINS",
            env_optional("BACKEND_CORS_ORIGINS"),
            DEFAULT_CORS_ORIGINS,
        )?;

        let postgres_server = env_or_default("POSTGRES_SERVER", "localhost");
        let postgres_port = parse_u16("POSTGRES_PORT", env_or_default("POSTGRES_PORT", "5432"))?;
        let postgres_user = env_or_default("POSTGRES_USER", "exams");
        let postgres_password = env_or_default("POSTGRES_PASSWORD", "");
        let postgres_db = env_or_default("POSTGRES_DB", "exams_db");
        let database_url = env_optional("DATABASE_URL");
        let max_connections =
            parse_u32("DATABASE_MAX_CONNECTIONS", env_or_default("DATABASE_MAX_CONNECTIONS", "20"))?;

        let redis_host = env_or_default("REDIS_HOST", "localhost");
        let redis_port = parse_u16("REDIS_PORT", env_or_default("REDIS_PORT", "6379"))?;
        let redis_db = parse_u16("REDIS_DB", env_or_default("REDIS_DB", "0"))?;
        let redis_password = env_or_default("REDIS_PASSWORD", "");

        let api_key = env_or_default("AI_API_KEY", "");
        let base_url = env_or_default("AI_BASE_URL", DEFAULT_GENERATION_BASE_URL);
        let models = parse_list("AI_MODELS", env_optional("AI_MODELS"), DEFAULT_GENERATION_MODELS)?;
        let max_tokens = parse_u32("AI_MAX_TOKENS", env_or_default("AI_MAX_TOKENS", "8192"))?;
        let temperature = parse_f64("AI_TEMPERATURE", env_or_default("AI_TEMPERATURE", "0.7"))?;
        let request_timeout_seconds =
            parse_u64("AI_REQUEST_TIMEOUT", env_or_default("AI_REQUEST_TIMEOUT", "60"))?;
        let rate_limit_per_minute =
            parse_u64("GENERATION_RATE_LIMIT", env_or_default("GENERATION_RATE_LIMIT", "5"))?;

        let submit_grace_seconds =
            parse_i64("SUBMIT_GRACE_SECONDS", env_or_default("SUBMIT_GRACE_SECONDS", "300"))?;
        let weak_topic_threshold =
            parse_f64("WEAK_TOPIC_THRESHOLD", env_or_default("WEAK_TOPIC_THRESHOLD", "65"))?;
        let weak_topic_limit =
            parse_u64("WEAK_TOPIC_LIMIT", env_or_default("WEAK_TOPIC_LIMIT", "3"))? as usize;

        let log_level = env_or_default("EXAMS_LOG_LEVEL", "info");
        let json = env_optional("EXAMS_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);
        let prometheus_enabled =
            env_optional("PROMETHEUS_ENABLED").map(|value| parse_bool(&value)).unwrap_or(false);

        let settings = Self {
            server: ServerSettings {
                host: ServerHost::parse(host)?,
                port: ServerPort::parse(port)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings { project_name, version, api_v1_str },
            security: SecuritySettings { secret_key, algorithm },
            cors: CorsSettings { origins: cors_origins },
            database: DatabaseSettings {
                postgres_server,
                postgres_port,
                postgres_user,
                postgres_password,
                postgres_db,
                database_url,
                max_connections,
            },
            redis: RedisSettings {
                host: redis_host,
                port: redis_port,
                db: redis_db,
                password: redis_password,
            },
            generation: GenerationSettings {
                api_key,
                base_url,
                models,
                max_tokens,
                temperature,
                request_timeout_seconds,
                rate_limit_per_minute,
            },
            exam: ExamSettings { submit_grace_seconds, weak_topic_threshold, weak_topic_limit },
            telemetry: TelemetrySettings { log_level, json, prometheus_enabled },
        };

        settings.validate(secret_missing)?;

        Ok(settings)
    }

    pub(crate) fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host.0, self.server.port.0)
    }

    pub(crate) fn server_host(&self) -> &str {
        &self.server.host.0
    }

    pub(crate) fn server_port(&self) -> u16 {
        self.server.port.0
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn security(&self) -> &SecuritySettings {
        &self.security
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn generation(&self) -> &GenerationSettings {
        &self.generation
    }

    pub(crate) fn exam(&self) -> &ExamSettings {
        &self.exam
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    fn validate(&self, secret_missing: bool) -> Result<(), ConfigError> {
        if self.generation.request_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "AI_REQUEST_TIMEOUT",
                value: String::from("0"),
            });
        }

        if !(0.0..=100.0).contains(&self.exam.weak_topic_threshold) {
            return Err(ConfigError::InvalidValue {
                field: "WEAK_TOPIC_THRESHOLD",
                value: self.exam.weak_topic_threshold.to_string(),
            });
        }

        if self.exam.weak_topic_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "WEAK_TOPIC_LIMIT",
                value: String::from("0"),
            });
        }

        if self.exam.submit_grace_seconds < 0 {
            return Err(ConfigError::InvalidValue {
                field: "SUBMIT_GRACE_SECONDS",
                value: self.exam.submit_grace_seconds.to_string(),
            });
        }

        if !self.runtime.strict_config {
            if secret_missing {
                tracing::warn!("SECRET_KEY is not set; using an ephemeral key for this process");
            }
            return Ok(());
        }

        if secret_missing {
            return Err(ConfigError::MissingSecret("SECRET_KEY"));
        }

        if self.database.database_url.is_none() && self.database.postgres_password.is_empty() {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }

        if self.generation.api_key.is_empty() {
            return Err(ConfigError::MissingSecret("AI_API_KEY"));
        }

        Ok(())
    }
}

fn generate_ephemeral_secret() -> String {
    let mut bytes = [0u8; 64];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
