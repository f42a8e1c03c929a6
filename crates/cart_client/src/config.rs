use cart_shared::{
    domain::CartId,
    protocol::{PayloadFormat, ADMIN_SAVE_CART_OPTION_PATH, SHOP_UPDATE_MULTIPLE_PATH},
};
use serde::{Deserialize, Serialize};

use crate::{csrf::CsrfSource, surface::Scope};

/// What an entry point does with a quantity outside `[0, max_stock]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsPolicy {
    /// Focus the input, alert, and send nothing.
    Reject,
    /// Write the nearest bound back into the input and carry on.
    Clamp,
}

/// What the page does after the server accepts a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuccessPolicy {
    Reload,
    Recompute,
}

/// Names of the data attributes and cells a quantity input is described by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputAttributes {
    pub option_id: String,
    pub max_stock: String,
    pub unit_price: Option<String>,
    /// Zero-based column of the row cell holding the unit price.
    pub price_cell: Option<usize>,
}

impl Default for InputAttributes {
    fn default() -> Self {
        Self {
            option_id: "data-option-id".into(),
            max_stock: "data-max-stock".into(),
            unit_price: Some("data-price-krw".into()),
            price_cell: Some(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiText {
    pub total_prefix: String,
    pub saved_notice: String,
    pub save_failed_prefix: String,
    pub button_idle: String,
    pub button_busy: String,
}

impl Default for UiText {
    fn default() -> Self {
        Self {
            total_prefix: "Total: ₩".into(),
            saved_notice: "Quantities saved.".into(),
            save_failed_prefix: "Save failed: ".into(),
            button_idle: "Save all".into(),
            button_busy: "Saving...".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    pub endpoint: String,
    pub payload: PayloadFormat,
    pub scope: Scope,
    pub csrf: CsrfSource,
    pub batch_policy: BoundsPolicy,
    pub single_policy: BoundsPolicy,
    pub live_policy: BoundsPolicy,
    pub success_policy: SuccessPolicy,
    pub attributes: InputAttributes,
    pub text: UiText,
}

impl ReconcilerConfig {
    /// Admin cart page: whole-page scope, cookie token, reload after a batch.
    pub fn admin_cart_option() -> Self {
        Self {
            endpoint: ADMIN_SAVE_CART_OPTION_PATH.into(),
            payload: PayloadFormat::cart_option(),
            scope: Scope::Page,
            csrf: CsrfSource::cookie(),
            batch_policy: BoundsPolicy::Reject,
            single_policy: BoundsPolicy::Reject,
            live_policy: BoundsPolicy::Clamp,
            success_policy: SuccessPolicy::Reload,
            attributes: InputAttributes::default(),
            text: UiText::default(),
        }
    }

    /// Shop cart page posting `{updates: [...]}` with the form token.
    pub fn shop_update_multiple() -> Self {
        Self {
            endpoint: SHOP_UPDATE_MULTIPLE_PATH.into(),
            payload: PayloadFormat::option_updates(),
            csrf: CsrfSource::hidden_field(),
            success_policy: SuccessPolicy::Recompute,
            ..Self::admin_cart_option()
        }
    }

    /// One cart widget among several on the same admin page.
    pub fn per_container(cart_id: CartId) -> Self {
        Self {
            scope: Scope::Container(cart_id),
            success_policy: SuccessPolicy::Recompute,
            ..Self::admin_cart_option()
        }
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self::admin_cart_option()
    }
}
