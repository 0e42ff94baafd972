//! 环境变量 key 常量与别名定义
//!
//! 主变量使用 `PARLEY_*`，兼容旧部署中的裸变量名（`TYPE`、`DEEPSEEK_TOKEN` 等）。

/// LLM 厂商与凭证
pub mod llm {
    /// 厂商类型：deepseek / gemini / openrouter / vol / ollama / openai / aliyun
    pub const VENDOR: &str = "PARLEY_VENDOR";
    pub const VENDOR_ALIASES: &[&str] = &["TYPE"];

    /// 通用 API Key（未设置厂商专属 key 时使用）
    pub const API_KEY: &str = "PARLEY_API_KEY";
    pub const API_KEY_ALIASES: &[&str] = &["API_KEY"];

    /// 自定义 base url（代理或私有部署）
    pub const BASE_URL: &str = "PARLEY_BASE_URL";
    pub const BASE_URL_ALIASES: &[&str] = &["CUSTOM_URL"];

    pub const MODEL: &str = "PARLEY_MODEL";
    pub const MODEL_ALIASES: &[&str] = &["MODEL"];

    pub const DEEPSEEK_TOKEN: &str = "PARLEY_DEEPSEEK_TOKEN";
    pub const DEEPSEEK_TOKEN_ALIASES: &[&str] = &["DEEPSEEK_TOKEN"];
    pub const GEMINI_TOKEN: &str = "PARLEY_GEMINI_TOKEN";
    pub const GEMINI_TOKEN_ALIASES: &[&str] = &["GEMINI_TOKEN"];
    pub const OPENROUTER_TOKEN: &str = "PARLEY_OPENROUTER_TOKEN";
    pub const OPENROUTER_TOKEN_ALIASES: &[&str] = &["OPEN_ROUTER_TOKEN", "OPENROUTER_TOKEN"];
    pub const VOL_TOKEN: &str = "PARLEY_VOL_TOKEN";
    pub const VOL_TOKEN_ALIASES: &[&str] = &["VOL_TOKEN"];
    pub const OLLAMA_TOKEN: &str = "PARLEY_OLLAMA_TOKEN";
    pub const OLLAMA_TOKEN_ALIASES: &[&str] = &["OLLAMA_TOKEN"];
    pub const OPENAI_TOKEN: &str = "PARLEY_OPENAI_TOKEN";
    pub const OPENAI_TOKEN_ALIASES: &[&str] = &["OPENAI_TOKEN", "OPENAI_API_KEY"];
    pub const ALIYUN_TOKEN: &str = "PARLEY_ALIYUN_TOKEN";
    pub const ALIYUN_TOKEN_ALIASES: &[&str] = &["ALIYUN_TOKEN"];
}

/// 采样参数
pub mod sampling {
    pub const MAX_TOKENS: &str = "PARLEY_MAX_TOKENS";
    pub const MAX_TOKENS_ALIASES: &[&str] = &["MAX_TOKENS"];
    pub const TEMPERATURE: &str = "PARLEY_TEMPERATURE";
    pub const TEMPERATURE_ALIASES: &[&str] = &["TEMPERATURE"];
    pub const TOP_P: &str = "PARLEY_TOP_P";
    pub const TOP_P_ALIASES: &[&str] = &["TOP_P"];
    pub const FREQUENCY_PENALTY: &str = "PARLEY_FREQUENCY_PENALTY";
    pub const FREQUENCY_PENALTY_ALIASES: &[&str] = &["FREQUENCY_PENALTY"];
    pub const PRESENCE_PENALTY: &str = "PARLEY_PRESENCE_PENALTY";
    pub const PRESENCE_PENALTY_ALIASES: &[&str] = &["PRESENCE_PENALTY"];
    pub const STOP: &str = "PARLEY_STOP";
    pub const STOP_ALIASES: &[&str] = &["STOP"];
}

/// 会话引擎：循环上限、重试、分片发送
pub mod engine {
    pub const MOST_LOOP: &str = "PARLEY_MOST_LOOP";
    pub const RETRY_TIMES: &str = "PARLEY_RETRY_TIMES";
    pub const RETRY_TIMES_ALIASES: &[&str] = &["LLM_RETRY_TIMES"];
    pub const HISTORY_PAIRS: &str = "PARLEY_HISTORY_PAIRS";
    pub const CONTEXT_EXPIRE_TIME: &str = "PARLEY_CONTEXT_EXPIRE_TIME";
    pub const CONTEXT_EXPIRE_TIME_ALIASES: &[&str] = &["CONTEXT_EXPIRE_TIME"];
    pub const PER_MSG_LEN: &str = "PARLEY_PER_MSG_LEN";
    pub const SESSION_TIMEOUT: &str = "PARLEY_SESSION_TIMEOUT";
    pub const TASK_TIMEOUT: &str = "PARLEY_TASK_TIMEOUT";
    pub const HTTP_TIMEOUT: &str = "PARLEY_HTTP_TIMEOUT";
    pub const SEND_TOOL_INFO: &str = "PARLEY_SEND_TOOL_INFO";
    pub const SEND_TOOL_INFO_ALIASES: &[&str] = &["SEND_MCP_RES"];
    pub const POWERED: &str = "PARLEY_POWERED";
    pub const POWERED_ALIASES: &[&str] = &["POWERED"];
    pub const CHARACTER: &str = "PARLEY_CHARACTER";
    pub const CHARACTER_ALIASES: &[&str] = &["CHARACTER"];
}

/// 历史记录存储
pub mod store {
    pub const DB_PATH: &str = "PARLEY_DB_PATH";
    pub const DB_PATH_ALIASES: &[&str] = &["DB_CONF"];
}

/// 可观测性与日志
pub mod observability {
    pub const PARLEY_QUIET: &str = "PARLEY_QUIET";
    pub const PARLEY_LOG_LEVEL: &str = "PARLEY_LOG_LEVEL";
    pub const LOG_LEVEL_ALIASES: &[&str] = &["LOG_LEVEL"];
    pub const PARLEY_LOG_JSON: &str = "PARLEY_LOG_JSON";
}
