//! 按领域分组的配置结构体
//!
//! 从环境变量加载，统一 fallback 逻辑。

use std::path::PathBuf;

use super::env_keys::{engine, llm, observability as obv_keys, sampling, store};
use super::loader::{env_bool, env_list, env_optional, env_or, env_parse};

/// LLM 厂商与凭证配置
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// 厂商名（小写），由 agent 层解析为 `Vendor`
    pub vendor: String,
    /// 通用 key，厂商专属 key 优先
    pub api_key: Option<String>,
    /// 自定义 base url，未设置时使用厂商默认地址
    pub base_url: Option<String>,
    /// 用户指定模型，不在厂商已知列表中时回退到默认模型
    pub model: Option<String>,
}

impl LlmConfig {
    /// 从环境变量加载（会自动加载 .env）
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        Self {
            vendor: env_or(llm::VENDOR, llm::VENDOR_ALIASES, || "deepseek".to_string())
                .to_lowercase(),
            api_key: env_optional(llm::API_KEY, llm::API_KEY_ALIASES),
            base_url: env_optional(llm::BASE_URL, llm::BASE_URL_ALIASES),
            model: env_optional(llm::MODEL, llm::MODEL_ALIASES),
        }
    }

    /// 按厂商读取专属 token，未设置则回退到通用 key
    pub fn api_key_for(&self, vendor: &str) -> Option<String> {
        let specific = match vendor {
            "deepseek" => env_optional(llm::DEEPSEEK_TOKEN, llm::DEEPSEEK_TOKEN_ALIASES),
            "gemini" => env_optional(llm::GEMINI_TOKEN, llm::GEMINI_TOKEN_ALIASES),
            "openrouter" => env_optional(llm::OPENROUTER_TOKEN, llm::OPENROUTER_TOKEN_ALIASES),
            "vol" => env_optional(llm::VOL_TOKEN, llm::VOL_TOKEN_ALIASES),
            "ollama" => env_optional(llm::OLLAMA_TOKEN, llm::OLLAMA_TOKEN_ALIASES),
            "openai" => env_optional(llm::OPENAI_TOKEN, llm::OPENAI_TOKEN_ALIASES),
            "aliyun" => env_optional(llm::ALIYUN_TOKEN, llm::ALIYUN_TOKEN_ALIASES),
            _ => None,
        };
        specific.or_else(|| self.api_key.clone())
    }
}

/// 采样参数，原样透传给厂商
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingConfig {
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    pub stop: Vec<String>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 2048,
            temperature: 0.7,
            top_p: 0.9,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            stop: Vec::new(),
        }
    }
}

impl SamplingConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let d = Self::default();
        Self {
            max_tokens: env_parse(sampling::MAX_TOKENS, sampling::MAX_TOKENS_ALIASES, d.max_tokens),
            temperature: env_parse(
                sampling::TEMPERATURE,
                sampling::TEMPERATURE_ALIASES,
                d.temperature,
            ),
            top_p: env_parse(sampling::TOP_P, sampling::TOP_P_ALIASES, d.top_p),
            frequency_penalty: env_parse(
                sampling::FREQUENCY_PENALTY,
                sampling::FREQUENCY_PENALTY_ALIASES,
                d.frequency_penalty,
            ),
            presence_penalty: env_parse(
                sampling::PRESENCE_PENALTY,
                sampling::PRESENCE_PENALTY_ALIASES,
                d.presence_penalty,
            ),
            stop: env_list(sampling::STOP, sampling::STOP_ALIASES),
        }
    }
}

/// 会话引擎配置
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// 单个会话内流式轮次上限，任务规划的重规划轮次共用此上限
    pub most_loop: usize,
    /// 同步请求与工具调用的重试次数
    pub retry_times: usize,
    /// 回放的历史问答对数量
    pub history_pairs: usize,
    /// 历史记录过期时间（秒）
    pub context_expire_secs: u64,
    /// 单条平台消息的 UTF-16 长度上限
    pub per_msg_len: usize,
    /// 首个分片的发送阈值（字符）
    pub first_send_len: usize,
    /// 后续分片阈值增量（字符）
    pub send_len_step: usize,
    pub session_timeout_secs: u64,
    pub task_timeout_secs: u64,
    pub http_timeout_secs: u64,
    /// 工具调用结果是否单独推送给用户
    pub send_tool_info: bool,
    /// 回答末尾的 powered-by 附注
    pub powered_by: Option<String>,
    /// 角色设定模板（system prompt），支持 `{{key}}` 占位符
    pub character: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            most_loop: 5,
            retry_times: 3,
            history_pairs: 10,
            context_expire_secs: 86_400,
            per_msg_len: 3896,
            first_send_len: 30,
            send_len_step: 500,
            session_timeout_secs: 300,
            task_timeout_secs: 900,
            http_timeout_secs: 300,
            send_tool_info: false,
            powered_by: None,
            character: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let d = Self::default();
        Self {
            most_loop: env_parse(engine::MOST_LOOP, &[], d.most_loop),
            retry_times: env_parse(engine::RETRY_TIMES, engine::RETRY_TIMES_ALIASES, d.retry_times)
                .max(1),
            history_pairs: env_parse(engine::HISTORY_PAIRS, &[], d.history_pairs),
            context_expire_secs: env_parse(
                engine::CONTEXT_EXPIRE_TIME,
                engine::CONTEXT_EXPIRE_TIME_ALIASES,
                d.context_expire_secs,
            ),
            per_msg_len: env_parse(engine::PER_MSG_LEN, &[], d.per_msg_len),
            first_send_len: d.first_send_len,
            send_len_step: d.send_len_step,
            session_timeout_secs: env_parse(engine::SESSION_TIMEOUT, &[], d.session_timeout_secs),
            task_timeout_secs: env_parse(engine::TASK_TIMEOUT, &[], d.task_timeout_secs),
            http_timeout_secs: env_parse(engine::HTTP_TIMEOUT, &[], d.http_timeout_secs),
            send_tool_info: env_bool(
                engine::SEND_TOOL_INFO,
                engine::SEND_TOOL_INFO_ALIASES,
                d.send_tool_info,
            ),
            powered_by: env_optional(engine::POWERED, engine::POWERED_ALIASES),
            character: env_optional(engine::CHARACTER, engine::CHARACTER_ALIASES),
        }
    }
}

/// 历史记录存储配置
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
}

impl StoreConfig {
    pub fn from_env() -> Self {
        super::loader::load_dotenv();
        let db_path = env_optional(store::DB_PATH, store::DB_PATH_ALIASES)
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_db_path);
        Self { db_path }
    }

    /// `~/.parley/history.db`
    pub fn default_db_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".parley")
            .join("history.db")
    }
}

/// 可观测性配置（进程内缓存）
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            super::loader::load_dotenv();
            Self {
                quiet: env_bool(obv_keys::PARLEY_QUIET, &[], false),
                log_level: env_or(obv_keys::PARLEY_LOG_LEVEL, obv_keys::LOG_LEVEL_ALIASES, || {
                    "info".to_string()
                }),
                log_json: env_bool(obv_keys::PARLEY_LOG_JSON, &[], false),
            }
        })
    }
}
