//! Per-vendor model registry: default model, known models and default endpoint.

use std::collections::{BTreeSet, HashMap};

use super::Vendor;

/// Model facts for one vendor.
#[derive(Debug, Clone)]
pub struct VendorModels {
    pub default_model: String,
    pub known: BTreeSet<String>,
    pub base_url: String,
    /// Local runtimes serve whatever the user pulled, so any override is accepted.
    pub accepts_any: bool,
}

impl VendorModels {
    fn new(default_model: &str, known: &[&str], base_url: &str, accepts_any: bool) -> Self {
        let mut set: BTreeSet<String> = known.iter().map(|m| m.to_string()).collect();
        set.insert(default_model.to_string());
        Self {
            default_model: default_model.to_string(),
            known: set,
            base_url: base_url.to_string(),
            accepts_any,
        }
    }

    pub fn is_known(&self, model: &str) -> bool {
        self.accepts_any || self.known.contains(model)
    }
}

/// Explicit registry of vendor models, built once at startup and passed by reference.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    vendors: HashMap<Vendor, VendorModels>,
}

impl ModelRegistry {
    pub fn builtin() -> Self {
        let mut vendors = HashMap::new();
        vendors.insert(
            Vendor::DeepSeek,
            VendorModels::new(
                "deepseek-chat",
                &["deepseek-reasoner", "deepseek-coder"],
                "https://api.deepseek.com/v1",
                false,
            ),
        );
        vendors.insert(
            Vendor::Gemini,
            VendorModels::new(
                "gemini-2.0-flash",
                &[
                    "gemini-2.0-flash-lite",
                    "gemini-2.5-flash",
                    "gemini-2.5-pro",
                    "gemini-1.5-flash",
                    "gemini-1.5-pro",
                ],
                "https://generativelanguage.googleapis.com/v1beta",
                false,
            ),
        );
        vendors.insert(
            Vendor::OpenRouter,
            VendorModels::new(
                "deepseek/deepseek-r1-0528:free",
                &[
                    "deepseek/deepseek-chat-v3-0324:free",
                    "openai/gpt-4o",
                    "openai/gpt-4o-mini",
                    "anthropic/claude-3.5-sonnet",
                    "google/gemini-2.0-flash-001",
                    "meta-llama/llama-3.3-70b-instruct",
                    "qwen/qwen-2.5-72b-instruct",
                ],
                "https://openrouter.ai/api/v1",
                false,
            ),
        );
        vendors.insert(
            Vendor::Vol,
            VendorModels::new(
                "doubao-1-5-pro-32k-250115",
                &[
                    "doubao-1-5-lite-32k-250115",
                    "doubao-1-5-pro-256k-250115",
                    "doubao-seed-1-6-250615",
                    "deepseek-r1-250528",
                    "deepseek-v3-250324",
                ],
                "https://ark.cn-beijing.volces.com/api/v3",
                false,
            ),
        );
        vendors.insert(
            Vendor::Ollama,
            VendorModels::new("deepseek-r1", &[], "http://localhost:11434", true),
        );
        vendors.insert(
            Vendor::OpenAi,
            VendorModels::new(
                "gpt-3.5-turbo-0125",
                &[
                    "gpt-3.5-turbo",
                    "gpt-4",
                    "gpt-4-turbo",
                    "gpt-4o",
                    "gpt-4o-mini",
                    "gpt-4.1",
                    "gpt-4.1-mini",
                ],
                "https://api.openai.com/v1",
                false,
            ),
        );
        vendors.insert(
            Vendor::Aliyun,
            VendorModels::new(
                "qwen-max",
                &["qwen-plus", "qwen-turbo", "qwen-long", "qwen-vl-max", "qwen-vl-plus"],
                "https://dashscope.aliyuncs.com/compatible-mode/v1",
                false,
            ),
        );
        Self { vendors }
    }

    /// Register extra models for a vendor (deployments with private endpoints).
    pub fn with_models<I, S>(mut self, vendor: Vendor, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(entry) = self.vendors.get_mut(&vendor) {
            entry.known.extend(models.into_iter().map(Into::into));
        }
        self
    }

    pub fn get(&self, vendor: Vendor) -> Option<&VendorModels> {
        self.vendors.get(&vendor)
    }

    /// Resolve the model for a session: the override when the vendor knows it,
    /// otherwise the vendor default.
    pub fn select_model(&self, vendor: Vendor, override_model: Option<&str>) -> String {
        let requested = override_model.map(str::trim).filter(|m| !m.is_empty());
        match self.vendors.get(&vendor) {
            Some(models) => match requested {
                Some(m) if models.is_known(m) => m.to_string(),
                Some(m) => {
                    tracing::debug!(
                        vendor = %vendor,
                        model = m,
                        "model not known for vendor, using default"
                    );
                    models.default_model.clone()
                }
                None => models.default_model.clone(),
            },
            None => requested.unwrap_or_default().to_string(),
        }
    }

    pub fn default_base_url(&self, vendor: Vendor) -> Option<&str> {
        self.vendors.get(&vendor).map(|m| m.base_url.as_str())
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
