use std::{
    collections::HashSet,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use cart_shared::{
    domain::{
        clamp, compute_total, parse_stock, validate, CartLineItem, ClampAdjustment, Money,
        OptionId, Quantity, RawLineItem,
    },
    error::{FailureKind, ValidationError},
    protocol::SaveResult,
};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{
    config::{BoundsPolicy, ReconcilerConfig, SuccessPolicy},
    surface::{Border, CartSurface, InputKey, InputView, SaveButton},
    transport::SaveTransport,
};

/// Where a batch save currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveState {
    Idle,
    Validating,
    Submitting,
}

/// One quantity input paired with what it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineInput {
    pub key: InputKey,
    pub item: RawLineItem,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    Failed { kind: FailureKind, message: String },
    Invalid(ValidationError),
    /// A save for the same inputs is still in flight; nothing was sent.
    Busy,
    NothingToSave,
    UnknownInput,
}

impl From<SaveResult> for SaveOutcome {
    fn from(result: SaveResult) -> Self {
        match result {
            SaveResult::Success => SaveOutcome::Saved,
            SaveResult::Failure { kind, message } => SaveOutcome::Failed { kind, message },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEdit {
    Accepted(Quantity),
    Clamped {
        quantity: Quantity,
        adjustment: ClampAdjustment,
    },
    Rejected(ValidationError),
    UnknownInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SaveTrigger {
    Batch,
    Single,
}

/// Resets the batch state to idle however the save ends.
struct BatchGuard<'a> {
    state: &'a Mutex<SaveState>,
}

impl<'a> BatchGuard<'a> {
    fn acquire(state: &'a Mutex<SaveState>) -> Option<Self> {
        let mut current = lock(state);
        if *current != SaveState::Idle {
            return None;
        }
        *current = SaveState::Validating;
        Some(Self { state })
    }

    fn advance(&self, next: SaveState) {
        *lock(self.state) = next;
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        *lock(self.state) = SaveState::Idle;
    }
}

/// Releases a single-input save slot when the save ends.
struct SingleGuard<'a> {
    pending: &'a Mutex<HashSet<InputKey>>,
    key: InputKey,
}

impl Drop for SingleGuard<'_> {
    fn drop(&mut self) {
        lock(self.pending).remove(&self.key);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Keeps one scope's total in step with its inputs and pushes accepted
/// quantities to the cart endpoint.
pub struct CartReconciler {
    surface: Arc<dyn CartSurface>,
    transport: Arc<dyn SaveTransport>,
    config: ReconcilerConfig,
    state: Mutex<SaveState>,
    pending_single: Mutex<HashSet<InputKey>>,
}

impl CartReconciler {
    pub fn new(
        surface: Arc<dyn CartSurface>,
        transport: Arc<dyn SaveTransport>,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            surface,
            transport,
            config,
            state: Mutex::new(SaveState::Idle),
            pending_single: Mutex::new(HashSet::new()),
        }
    }

    /// Builds a reconciler and paints the scope's initial total.
    pub fn attach(
        surface: Arc<dyn CartSurface>,
        transport: Arc<dyn SaveTransport>,
        config: ReconcilerConfig,
    ) -> Self {
        let reconciler = Self::new(surface, transport, config);
        let total = reconciler.refresh_total();
        info!(scope = %reconciler.config.scope, total = %total, "cart: reconciler attached");
        reconciler
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn state(&self) -> SaveState {
        *lock(&self.state)
    }

    pub fn collect_line_items(&self) -> Vec<LineInput> {
        self.surface
            .quantity_inputs(&self.config.scope)
            .into_iter()
            .filter_map(|view| self.line_input(view))
            .collect()
    }

    fn line_input(&self, view: InputView) -> Option<LineInput> {
        let attrs = &self.config.attributes;
        let Some(option_id) = view.attribute(&attrs.option_id) else {
            warn!(key = view.key.0, "cart: quantity input without option id skipped");
            return None;
        };
        let option_id = OptionId::new(option_id);

        let max_stock = parse_stock(view.attribute(&attrs.max_stock)).unwrap_or_else(|| {
            warn!(option_id = %option_id, "cart: missing or unreadable max stock, treating as 0");
            0
        });

        let unit_price = attrs
            .unit_price
            .as_deref()
            .and_then(|name| view.attribute(name))
            .and_then(Money::parse_loose)
            .or_else(|| {
                attrs
                    .price_cell
                    .and_then(|column| view.row_cells.get(column))
                    .and_then(|cell| Money::parse_loose(cell))
            })
            .unwrap_or(Money::ZERO);

        Some(LineInput {
            key: view.key,
            item: RawLineItem {
                option_id,
                raw_quantity: view.value,
                max_stock,
                unit_price,
            },
        })
    }

    fn find_input(&self, option_id: &OptionId) -> Option<LineInput> {
        self.collect_line_items()
            .into_iter()
            .find(|line| &line.item.option_id == option_id)
    }

    /// Validates one input; on failure focus returns to it and an alert is raised.
    pub fn validate(&self, line: &LineInput) -> Result<CartLineItem, ValidationError> {
        validate(&line.item).inspect_err(|err| self.report_invalid(line.key, err))
    }

    fn report_invalid(&self, key: InputKey, err: &ValidationError) {
        warn!(option_id = %err.option_id(), kind = ?err.kind(), "cart: quantity rejected");
        self.surface.focus_input(key);
        self.surface.alert(&err.to_string());
    }

    /// Applies `policy` to one input, writing clamped values back into the page.
    fn apply_policy(
        &self,
        policy: BoundsPolicy,
        line: &LineInput,
    ) -> Result<(CartLineItem, Option<ClampAdjustment>), ValidationError> {
        match policy {
            BoundsPolicy::Reject => self.validate(line).map(|item| (item, None)),
            BoundsPolicy::Clamp => {
                let clamped = clamp(&line.item.raw_quantity, line.item.max_stock);
                if let Some(adjustment) = clamped.adjustment {
                    info!(
                        option_id = %line.item.option_id,
                        quantity = clamped.quantity,
                        ?adjustment,
                        "cart: quantity clamped"
                    );
                    if adjustment == ClampAdjustment::LoweredToStock {
                        self.surface.alert(&format!(
                            "quantity cannot exceed stock ({})",
                            line.item.max_stock
                        ));
                    }
                    self.surface
                        .set_input_value(line.key, &clamped.quantity.to_string());
                }
                Ok((
                    CartLineItem {
                        option_id: line.item.option_id.clone(),
                        quantity: clamped.quantity,
                        max_stock: line.item.max_stock,
                        unit_price: line.item.unit_price,
                    },
                    clamped.adjustment,
                ))
            }
        }
    }

    /// Total of the scope as currently typed.
    pub fn current_total(&self) -> Money {
        let items: Vec<CartLineItem> = self
            .collect_line_items()
            .iter()
            .map(|line| line.item.as_displayed())
            .collect();
        compute_total(&items)
    }

    /// Recomputes the scope's total and writes it into its display.
    pub fn refresh_total(&self) -> Money {
        let total = self.current_total();
        let text = format!("{}{}", self.config.text.total_prefix, total.display_grouped());
        self.surface.set_total_text(&self.config.scope, &text);
        debug!(scope = %self.config.scope, total = %total, "cart: total refreshed");
        total
    }

    /// Posts `body` and folds every outcome into a [`SaveResult`].
    async fn post(&self, body: Value) -> SaveResult {
        let token = self
            .config
            .csrf
            .get_csrf_token(self.surface.as_ref())
            .unwrap_or_else(|| {
                warn!(source = ?self.config.csrf, "cart: csrf token not found on page");
                String::new()
            });

        match self
            .transport
            .post_json(&self.config.endpoint, &token, &body)
            .await
        {
            Ok(response) => {
                let result = response.into_result();
                if let SaveResult::Failure { message, .. } = &result {
                    warn!(endpoint = %self.config.endpoint, %message, "cart: save rejected by server");
                }
                result
            }
            Err(err) => {
                error!(endpoint = %self.config.endpoint, error = %err, "cart: save transport failed");
                self.surface.console_error(&format!("save failed: {err}"));
                SaveResult::transport_failure()
            }
        }
    }

    /// Sends a batch of validated items in one request.
    pub async fn submit(&self, items: &[CartLineItem]) -> SaveResult {
        info!(
            endpoint = %self.config.endpoint,
            items = items.len(),
            "cart: submitting quantities"
        );
        self.post(self.config.payload.batch_body(items)).await
    }

    /// Reflects a batch result back into the page.
    pub fn on_save_result(&self, result: &SaveResult, affected: &[InputKey]) {
        self.reflect(result, affected, SaveTrigger::Batch);
    }

    fn reflect(&self, result: &SaveResult, affected: &[InputKey], trigger: SaveTrigger) {
        if trigger == SaveTrigger::Batch {
            self.surface.set_save_button(
                &self.config.scope,
                SaveButton::enabled(&self.config.text.button_idle),
            );
        }

        match result {
            SaveResult::Success => {
                for key in affected {
                    self.surface.set_input_border(*key, Border::Saved);
                }
                if trigger == SaveTrigger::Single {
                    self.refresh_total();
                    return;
                }
                self.surface.alert(&self.config.text.saved_notice);
                match self.config.success_policy {
                    SuccessPolicy::Reload => self.surface.reload(),
                    SuccessPolicy::Recompute => {
                        self.refresh_total();
                    }
                }
            }
            SaveResult::Failure { message, .. } => {
                for key in affected {
                    self.surface.set_input_border(*key, Border::Error);
                }
                self.surface
                    .alert(&format!("{}{message}", self.config.text.save_failed_prefix));
            }
        }
    }

    /// Validates every input in scope and saves them together, or not at all.
    pub async fn save_all(&self) -> SaveOutcome {
        let Some(guard) = BatchGuard::acquire(&self.state) else {
            info!(scope = %self.config.scope, "cart: save already in flight");
            return SaveOutcome::Busy;
        };

        let lines = self.collect_line_items();
        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            match self.apply_policy(self.config.batch_policy, line) {
                Ok((item, _)) => items.push(item),
                Err(err) => return SaveOutcome::Invalid(err),
            }
        }

        if items.is_empty() {
            return SaveOutcome::NothingToSave;
        }

        guard.advance(SaveState::Submitting);
        self.surface.set_save_button(
            &self.config.scope,
            SaveButton::busy(&self.config.text.button_busy),
        );

        let result = self.submit(&items).await;
        let affected: Vec<InputKey> = lines.iter().map(|line| line.key).collect();
        self.on_save_result(&result, &affected);
        SaveOutcome::from(result)
    }

    /// Saves one input on its own, as when Enter is pressed in it.
    pub async fn save_single(&self, option_id: &OptionId) -> SaveOutcome {
        let Some(line) = self.find_input(option_id) else {
            warn!(option_id = %option_id, "cart: save requested for unknown input");
            return SaveOutcome::UnknownInput;
        };

        if !lock(&self.pending_single).insert(line.key) {
            return SaveOutcome::Busy;
        }
        let _slot = SingleGuard {
            pending: &self.pending_single,
            key: line.key,
        };

        let item = match self.apply_policy(self.config.single_policy, &line) {
            Ok((item, _)) => item,
            Err(err) => return SaveOutcome::Invalid(err),
        };

        info!(
            endpoint = %self.config.endpoint,
            option_id = %item.option_id,
            quantity = item.quantity,
            "cart: submitting single quantity"
        );
        let result = self.post(self.config.payload.single_body(&item)).await;
        self.reflect(&result, &[line.key], SaveTrigger::Single);
        SaveOutcome::from(result)
    }

    /// Reacts to an edit of one input and refreshes the total.
    pub fn on_input_change(&self, option_id: &OptionId) -> LiveEdit {
        let Some(line) = self.find_input(option_id) else {
            return LiveEdit::UnknownInput;
        };

        let edit = match self.apply_policy(self.config.live_policy, &line) {
            Ok((item, Some(adjustment))) => LiveEdit::Clamped {
                quantity: item.quantity,
                adjustment,
            },
            Ok((item, None)) => LiveEdit::Accepted(item.quantity),
            Err(err) => LiveEdit::Rejected(err),
        };
        self.refresh_total();
        edit
    }
}
