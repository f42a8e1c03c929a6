use std::{fs, path::Path};

use anyhow::Context;
use cart_client::{ReconcilerConfig, Scope};
use cart_shared::domain::CartId;
use clap::ValueEnum;
use serde::Deserialize;
use tracing::{info, warn};

pub const DEFAULT_SETTINGS_FILE: &str = "cartctl.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// `/admin/api/save-cart-option/`, cookie token, reload after save.
    Admin,
    /// `/shop/cart/update-multiple/`, form token, total recomputed after save.
    Shop,
}

impl Preset {
    pub fn reconciler_config(self, cart_id: Option<CartId>) -> ReconcilerConfig {
        match (self, cart_id) {
            (Preset::Admin, Some(cart_id)) => ReconcilerConfig::per_container(cart_id),
            (Preset::Admin, None) => ReconcilerConfig::admin_cart_option(),
            (Preset::Shop, Some(cart_id)) => {
                ReconcilerConfig::shop_update_multiple().with_scope(Scope::Container(cart_id))
            }
            (Preset::Shop, None) => ReconcilerConfig::shop_update_multiple(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_url: String,
    pub page: String,
    pub preset: Preset,
    pub cart_id: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".into(),
            page: "cart_page.toml".into(),
            preset: Preset::Admin,
            cart_id: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    server_url: Option<String>,
    page: Option<String>,
    preset: Option<Preset>,
    cart_id: Option<String>,
}

/// Reads `path` if it exists, then lets the environment override it.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("invalid settings file '{}'", path.display()))?;
            apply_file(&mut settings, file_cfg);
            info!(path = %path.display(), "cartctl: settings file loaded");
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "cartctl: no settings file, using defaults");
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read settings file '{}'", path.display()));
        }
    }

    apply_env(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn apply_file(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.server_url {
        settings.server_url = v;
    }
    if let Some(v) = file_cfg.page {
        settings.page = v;
    }
    if let Some(v) = file_cfg.preset {
        settings.preset = v;
    }
    if file_cfg.cart_id.is_some() {
        settings.cart_id = file_cfg.cart_id;
    }
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    let pick = |plain: &str, app: &str| var(app).or_else(|| var(plain));

    if let Some(v) = pick("CART_SERVER_URL", "APP__SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = pick("CART_PAGE", "APP__PAGE") {
        settings.page = v;
    }
    if let Some(v) = pick("CART_PRESET", "APP__PRESET") {
        match Preset::from_str(&v, true) {
            Ok(preset) => settings.preset = preset,
            Err(_) => warn!(value = %v, "cartctl: unknown preset in environment, keeping {:?}", settings.preset),
        }
    }
    if let Some(v) = pick("CART_ID", "APP__CART_ID") {
        settings.cart_id = Some(v).filter(|id| !id.trim().is_empty());
    }
}
