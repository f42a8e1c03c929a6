use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    domain::{CartLineItem, OptionId, Quantity},
    error::FailureKind,
};

pub const ADMIN_SAVE_CART_OPTION_PATH: &str = "/admin/api/save-cart-option/";
pub const SHOP_UPDATE_MULTIPLE_PATH: &str = "/shop/cart/update-multiple/";

/// Message carried by every transport-level failure.
pub const TRANSPORT_ERROR_MESSAGE: &str = "transport error";
/// Used when the server rejects a save without saying why.
pub const UNKNOWN_SERVER_ERROR: &str = "unknown error";

/// How a single-option save is shaped on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingleBody {
    /// `{id_field, quantity_field}` at the top level.
    Flat,
    /// A batch holding one entry.
    Batch,
}

/// Field names used when a quantity update is serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadFormat {
    pub batch_field: String,
    pub id_field: String,
    pub quantity_field: String,
    pub single_body: SingleBody,
}

impl PayloadFormat {
    /// `{items: [{cart_option_id, quantity}]}`, single saves flat.
    pub fn cart_option() -> Self {
        Self {
            batch_field: "items".into(),
            id_field: "cart_option_id".into(),
            quantity_field: "quantity".into(),
            single_body: SingleBody::Flat,
        }
    }

    /// `{updates: [{optionId, quantity}]}`.
    pub fn option_updates() -> Self {
        Self {
            batch_field: "updates".into(),
            id_field: "optionId".into(),
            quantity_field: "quantity".into(),
            single_body: SingleBody::Batch,
        }
    }

    fn entry(&self, option_id: &OptionId, quantity: Quantity) -> Map<String, Value> {
        let mut entry = Map::new();
        entry.insert(self.id_field.clone(), Value::String(option_id.0.clone()));
        entry.insert(self.quantity_field.clone(), Value::from(quantity));
        entry
    }

    pub fn batch_body(&self, items: &[CartLineItem]) -> Value {
        let entries = items
            .iter()
            .map(|item| Value::Object(self.entry(&item.option_id, item.quantity)))
            .collect();
        let mut body = Map::new();
        body.insert(self.batch_field.clone(), Value::Array(entries));
        Value::Object(body)
    }

    pub fn single_body(&self, item: &CartLineItem) -> Value {
        match self.single_body {
            SingleBody::Flat => Value::Object(self.entry(&item.option_id, item.quantity)),
            SingleBody::Batch => self.batch_body(std::slice::from_ref(item)),
        }
    }
}

impl Default for PayloadFormat {
    fn default() -> Self {
        Self::cart_option()
    }
}

/// Body returned by both save endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SaveResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }

    pub fn into_result(self) -> SaveResult {
        if self.success {
            return SaveResult::Success;
        }
        SaveResult::Failure {
            kind: FailureKind::ServerRejection,
            message: self
                .error
                .filter(|e| !e.trim().is_empty())
                .unwrap_or_else(|| UNKNOWN_SERVER_ERROR.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveResult {
    Success,
    Failure { kind: FailureKind, message: String },
}

impl SaveResult {
    pub fn transport_failure() -> Self {
        SaveResult::Failure {
            kind: FailureKind::Transport,
            message: TRANSPORT_ERROR_MESSAGE.to_string(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        SaveResult::Failure {
            kind: FailureKind::ServerRejection,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SaveResult::Success)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::Money;

    fn item(id: &str, quantity: Quantity) -> CartLineItem {
        CartLineItem {
            option_id: OptionId::new(id),
            quantity,
            max_stock: 10,
            unit_price: Money::from_major(1),
        }
    }

    #[test]
    fn cart_option_batch_uses_items_and_snake_case_ids() {
        let body = PayloadFormat::cart_option().batch_body(&[item("7", 2), item("9", 0)]);
        assert_eq!(
            body,
            json!({"items": [
                {"cart_option_id": "7", "quantity": 2},
                {"cart_option_id": "9", "quantity": 0}
            ]})
        );
    }

    #[test]
    fn cart_option_single_save_is_flat() {
        let body = PayloadFormat::cart_option().single_body(&item("7", 4));
        assert_eq!(body, json!({"cart_option_id": "7", "quantity": 4}));
    }

    #[test]
    fn option_updates_wrap_even_single_saves() {
        let body = PayloadFormat::option_updates().single_body(&item("a1", 1));
        assert_eq!(body, json!({"updates": [{"optionId": "a1", "quantity": 1}]}));
    }

    #[test]
    fn response_without_error_field_parses() {
        let response: SaveResponse = serde_json::from_str(r#"{"success": true}"#).expect("parse");
        assert_eq!(response.into_result(), SaveResult::Success);
    }

    #[test]
    fn rejection_keeps_server_message_or_falls_back() {
        assert_eq!(
            SaveResponse::rejected("stock exceeded").into_result(),
            SaveResult::rejected("stock exceeded")
        );
        let silent: SaveResponse = serde_json::from_str(r#"{"success": false}"#).expect("parse");
        assert_eq!(silent.into_result(), SaveResult::rejected(UNKNOWN_SERVER_ERROR));
    }
}
