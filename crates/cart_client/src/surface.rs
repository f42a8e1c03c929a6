use std::{collections::BTreeMap, fmt};

use cart_shared::domain::CartId;
use serde::{Deserialize, Serialize};

/// Part of the page a reconciler owns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Every quantity input on the page, with the global total display.
    Page,
    /// Inputs inside `cart-<id>`, with that container's `.cart-total`.
    Container(CartId),
}

impl Scope {
    pub fn contains(&self, container: Option<&CartId>) -> bool {
        match self {
            Scope::Page => true,
            Scope::Container(id) => container == Some(id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Page => f.write_str("page"),
            Scope::Container(id) => f.write_str(&id.container_element_id()),
        }
    }
}

/// Stable handle to one quantity input on a surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputKey(pub usize);

/// Visual indicator drawn around a quantity input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Border {
    #[default]
    Plain,
    Saved,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveButton {
    #[serde(default)]
    pub disabled: bool,
    pub label: String,
}

impl SaveButton {
    pub fn enabled(label: impl Into<String>) -> Self {
        Self {
            disabled: false,
            label: label.into(),
        }
    }

    pub fn busy(label: impl Into<String>) -> Self {
        Self {
            disabled: true,
            label: label.into(),
        }
    }
}

/// What the reconciler can see of one quantity input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputView {
    pub key: InputKey,
    pub value: String,
    pub attributes: BTreeMap<String, String>,
    pub row_cells: Vec<String>,
}

impl InputView {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// The page the reconciler reads from and writes back into.
///
/// Writes aimed at elements the page does not have are ignored, the same
/// way a missing total display is skipped in markup-driven pages.
pub trait CartSurface: Send + Sync {
    fn quantity_inputs(&self, scope: &Scope) -> Vec<InputView>;
    fn set_input_value(&self, key: InputKey, value: &str);
    fn focus_input(&self, key: InputKey);
    fn set_input_border(&self, key: InputKey, border: Border);
    /// Blocking notice shown to the person editing the cart.
    fn alert(&self, message: &str);
    fn set_total_text(&self, scope: &Scope, text: &str);
    fn set_save_button(&self, scope: &Scope, button: SaveButton);
    fn reload(&self);
    fn cookie_header(&self) -> Option<String>;
    fn hidden_field(&self, name: &str) -> Option<String>;
    fn console_error(&self, line: &str);
}
