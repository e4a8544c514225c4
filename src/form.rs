//! The create-space form: submit events, page listener registration, and the submit handler.

use crate::config::FormConfig;
use crate::sender::RequestSender;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A form submission: which form, the field values by element id, and whether the
/// native submission (navigation) was suppressed.
#[derive(Debug, Clone)]
pub struct SubmitEvent {
    form_id: String,
    fields: HashMap<String, String>,
    default_prevented: bool,
}

impl SubmitEvent {
    pub fn new(form_id: impl Into<String>) -> Self {
        Self {
            form_id: form_id.into(),
            fields: HashMap::new(),
            default_prevented: false,
        }
    }

    pub fn with_field(mut self, id: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(id.into(), value.into());
        self
    }

    pub fn form_id(&self) -> &str {
        &self.form_id
    }

    pub fn field_value(&self, id: &str) -> Option<&str> {
        self.fields.get(id).map(String::as_str)
    }

    pub fn prevent_default(&mut self) {
        self.default_prevented = true;
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }
}

/// Submit listener for the create-space form.
#[derive(Clone)]
pub struct FormHandler {
    form: FormConfig,
    sender: Arc<RequestSender>,
}

impl FormHandler {
    pub fn new(form: FormConfig, sender: Arc<RequestSender>) -> Self {
        Self { form, sender }
    }

    pub fn form_id(&self) -> &str {
        &self.form.form_id
    }

    /// Suppress the native submission, read the name and owner fields, and spawn the request.
    /// Returns `None` when a field is missing (nothing is sent).
    pub fn handle_submit(&self, event: &mut SubmitEvent) -> Option<JoinHandle<()>> {
        event.prevent_default();

        let (Some(name), Some(owner)) = (
            event.field_value(&self.form.name_field),
            event.field_value(&self.form.owner_field),
        ) else {
            tracing::error!(
                form = %self.form.form_id,
                name_field = %self.form.name_field,
                owner_field = %self.form.owner_field,
                "form field missing, submission dropped"
            );
            return None;
        };

        let name = name.to_string();
        let owner = owner.to_string();
        let sender = self.sender.clone();
        Some(tokio::spawn(async move {
            sender.create_space(&name, &owner).await;
        }))
    }
}

/// Submit listeners by form id, registered on page load.
#[derive(Default)]
pub struct Page {
    listeners: HashMap<String, Vec<FormHandler>>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page load: attach the handler to its form.
    pub fn on_load(&mut self, handler: FormHandler) {
        self.listeners
            .entry(handler.form_id().to_string())
            .or_default()
            .push(handler);
    }

    /// Deliver a submit event to the listeners of its form, in registration order.
    pub fn submit(&self, event: &mut SubmitEvent) -> Vec<JoinHandle<()>> {
        let Some(handlers) = self.listeners.get(event.form_id()) else {
            tracing::debug!(form = %event.form_id(), "no submit listener for form");
            return Vec::new();
        };
        handlers
            .iter()
            .filter_map(|h| h.handle_submit(event))
            .collect()
    }
}
