//! `models`: what the built-in registry knows per vendor.

use anyhow::Result;
use parley_agent::llm::{ModelRegistry, Vendor};

pub fn list_models(vendor: Option<&str>) -> Result<()> {
    let registry = ModelRegistry::builtin();
    let vendors = match vendor {
        Some(v) => vec![v.parse::<Vendor>()?],
        None => Vendor::ALL.to_vec(),
    };
    for vendor in vendors {
        print!("{}", render_vendor(&registry, vendor));
    }
    Ok(())
}

fn render_vendor(registry: &ModelRegistry, vendor: Vendor) -> String {
    let Some(models) = registry.get(vendor) else {
        return format!("{}: (no models registered)\n", vendor);
    };
    let mut out = format!("{}  ({})\n", vendor, models.base_url);
    out.push_str(&format!("  * {}\n", models.default_model));
    for m in models.known.iter().filter(|m| **m != models.default_model) {
        out.push_str(&format!("    {}\n", m));
    }
    if models.accepts_any {
        out.push_str("    (any locally pulled model)\n");
    }
    out
}
