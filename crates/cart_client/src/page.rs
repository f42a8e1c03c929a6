use std::{
    collections::BTreeMap,
    fs,
    path::Path,
    sync::{Mutex, MutexGuard, PoisonError},
};

use cart_shared::domain::CartId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::surface::{Border, CartSurface, InputKey, InputView, SaveButton, Scope};

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("failed to access page snapshot '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid TOML page snapshot: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("failed to encode TOML page snapshot: {0}")]
    TomlEncode(#[from] toml::ser::Error),
    #[error("invalid JSON page snapshot: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported page snapshot extension for '{0}', expected .toml or .json")]
    UnknownFormat(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputElement {
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub value: String,
    /// Text of every cell in the input's table row, in column order.
    #[serde(default)]
    pub row_cells: Vec<String>,
    #[serde(default)]
    pub container: Option<CartId>,
    #[serde(default)]
    pub border: Border,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerElement {
    pub cart_id: CartId,
    #[serde(default)]
    pub total: Option<String>,
    #[serde(default)]
    pub save_button: Option<SaveButton>,
}

/// Serializable state of a cart page, as rendered by the server.
///
/// `total_display` and `save_button` are the page-wide elements; `None`
/// means the page does not render them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSnapshot {
    #[serde(default)]
    pub cookie: Option<String>,
    #[serde(default)]
    pub hidden_fields: BTreeMap<String, String>,
    #[serde(default)]
    pub total_display: Option<String>,
    #[serde(default)]
    pub save_button: Option<SaveButton>,
    #[serde(default)]
    pub containers: Vec<ContainerElement>,
    #[serde(default)]
    pub inputs: Vec<InputElement>,
}

impl PageSnapshot {
    pub fn from_toml_str(raw: &str) -> Result<Self, SnapshotError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let raw = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
            path: path.display().to_string(),
            source,
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&raw),
            Some("json") => Self::from_json_str(&raw),
            _ => Err(SnapshotError::UnknownFormat(path.display().to_string())),
        }
    }

    pub fn to_toml_string(&self) -> Result<String, SnapshotError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_json_string(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Writes the snapshot in the format named by the file extension, so
    /// that [`PageSnapshot::load`] reads it back.
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let encoded = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => self.to_toml_string()?,
            Some("json") => self.to_json_string()?,
            _ => return Err(SnapshotError::UnknownFormat(path.display().to_string())),
        };
        fs::write(path, encoded).map_err(|source| SnapshotError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    fn container_mut(&mut self, cart_id: &CartId) -> Option<&mut ContainerElement> {
        self.containers.iter_mut().find(|c| &c.cart_id == cart_id)
    }

    fn container(&self, cart_id: &CartId) -> Option<&ContainerElement> {
        self.containers.iter().find(|c| &c.cart_id == cart_id)
    }
}

#[derive(Debug, Default)]
struct PageState {
    snapshot: PageSnapshot,
    alerts: Vec<String>,
    console: Vec<String>,
    focused: Option<InputKey>,
    reloads: usize,
}

/// In-process cart page that records everything the reconciler does to it.
#[derive(Debug, Default)]
pub struct MemoryPage {
    state: Mutex<PageState>,
}

impl MemoryPage {
    pub fn new(snapshot: PageSnapshot) -> Self {
        Self {
            state: Mutex::new(PageState {
                snapshot,
                ..PageState::default()
            }),
        }
    }

    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        PageSnapshot::load(path).map(Self::new)
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> PageSnapshot {
        self.state().snapshot.clone()
    }

    /// Simulates the person typing into an input.
    pub fn type_into(&self, key: InputKey, value: &str) {
        self.set_input_value(key, value);
    }

    /// Key of the first input whose attribute `name` equals `value`.
    pub fn find_input(&self, name: &str, value: &str) -> Option<InputKey> {
        self.state()
            .snapshot
            .inputs
            .iter()
            .position(|input| input.attributes.get(name).map(String::as_str) == Some(value))
            .map(InputKey)
    }

    pub fn input_value(&self, key: InputKey) -> Option<String> {
        self.state()
            .snapshot
            .inputs
            .get(key.0)
            .map(|input| input.value.clone())
    }

    pub fn border(&self, key: InputKey) -> Option<Border> {
        self.state().snapshot.inputs.get(key.0).map(|input| input.border)
    }

    pub fn total_text(&self, scope: &Scope) -> Option<String> {
        let state = self.state();
        match scope {
            Scope::Page => state.snapshot.total_display.clone(),
            Scope::Container(id) => state.snapshot.container(id).and_then(|c| c.total.clone()),
        }
    }

    pub fn save_button(&self, scope: &Scope) -> Option<SaveButton> {
        let state = self.state();
        match scope {
            Scope::Page => state.snapshot.save_button.clone(),
            Scope::Container(id) => state
                .snapshot
                .container(id)
                .and_then(|c| c.save_button.clone()),
        }
    }

    pub fn alerts(&self) -> Vec<String> {
        self.state().alerts.clone()
    }

    pub fn take_alerts(&self) -> Vec<String> {
        std::mem::take(&mut self.state().alerts)
    }

    pub fn console_lines(&self) -> Vec<String> {
        self.state().console.clone()
    }

    pub fn focused(&self) -> Option<InputKey> {
        self.state().focused
    }

    pub fn reload_count(&self) -> usize {
        self.state().reloads
    }
}

impl CartSurface for MemoryPage {
    fn quantity_inputs(&self, scope: &Scope) -> Vec<InputView> {
        self.state()
            .snapshot
            .inputs
            .iter()
            .enumerate()
            .filter(|(_, input)| scope.contains(input.container.as_ref()))
            .map(|(index, input)| InputView {
                key: InputKey(index),
                value: input.value.clone(),
                attributes: input.attributes.clone(),
                row_cells: input.row_cells.clone(),
            })
            .collect()
    }

    fn set_input_value(&self, key: InputKey, value: &str) {
        if let Some(input) = self.state().snapshot.inputs.get_mut(key.0) {
            input.value = value.to_string();
        }
    }

    fn focus_input(&self, key: InputKey) {
        let mut state = self.state();
        if key.0 < state.snapshot.inputs.len() {
            state.focused = Some(key);
        }
    }

    fn set_input_border(&self, key: InputKey, border: Border) {
        if let Some(input) = self.state().snapshot.inputs.get_mut(key.0) {
            input.border = border;
        }
    }

    fn alert(&self, message: &str) {
        self.state().alerts.push(message.to_string());
    }

    fn set_total_text(&self, scope: &Scope, text: &str) {
        let mut state = self.state();
        let slot = match scope {
            Scope::Page => state.snapshot.total_display.as_mut(),
            Scope::Container(id) => state
                .snapshot
                .container_mut(id)
                .and_then(|c| c.total.as_mut()),
        };
        if let Some(slot) = slot {
            *slot = text.to_string();
        }
    }

    fn set_save_button(&self, scope: &Scope, button: SaveButton) {
        let mut state = self.state();
        let slot = match scope {
            Scope::Page => state.snapshot.save_button.as_mut(),
            Scope::Container(id) => state
                .snapshot
                .container_mut(id)
                .and_then(|c| c.save_button.as_mut()),
        };
        if let Some(slot) = slot {
            *slot = button;
        }
    }

    fn reload(&self) {
        self.state().reloads += 1;
    }

    fn cookie_header(&self) -> Option<String> {
        self.state().snapshot.cookie.clone()
    }

    fn hidden_field(&self, name: &str) -> Option<String> {
        self.state().snapshot.hidden_fields.get(name).cloned()
    }

    fn console_error(&self, line: &str) {
        self.state().console.push(line.to_string());
    }
}
