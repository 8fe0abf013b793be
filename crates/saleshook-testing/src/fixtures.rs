//! Request body builders for tests.
//!
//! Bodies start from the valid sale 6010 example and are edited through
//! JSON pointers, so each test states only what it changes.

use serde_json::Value;

pub use saleshook_core::example_body;

/// Builder for sale-status request bodies.
///
/// # Example
///
/// ```
/// use saleshook_testing::PayloadBuilder;
/// use serde_json::json;
///
/// let body = PayloadBuilder::new()
///     .sale_id(42)
///     .set("/dados_cliente/email", json!("not-an-email"))
///     .build();
/// assert_eq!(body["id_venda"], 42);
/// ```
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    body: Value,
}

impl PayloadBuilder {
    /// Starts from the valid example body.
    pub fn new() -> Self {
        Self { body: example_body() }
    }

    /// Sets `id_venda`.
    #[must_use]
    pub fn sale_id(self, sale_id: i64) -> Self {
        self.set("/id_venda", Value::from(sale_id))
    }

    /// Sets `status`.
    #[must_use]
    pub fn status(self, status: &str) -> Self {
        self.set("/status", Value::from(status))
    }

    /// Removes the spouse descriptor entirely.
    #[must_use]
    pub fn without_spouse(self) -> Self {
        self.remove("/dados_cliente/conjuge")
    }

    /// Sets the value at a JSON pointer, creating the final key if needed.
    ///
    /// Has no effect if the parent does not exist or is not an object.
    #[must_use]
    pub fn set(mut self, pointer: &str, value: Value) -> Self {
        if let Some(slot) = self.body.pointer_mut(pointer) {
            *slot = value;
            return self;
        }

        if let Some((parent, key)) = pointer.rsplit_once('/') {
            if let Some(Value::Object(map)) = self.body.pointer_mut(parent) {
                map.insert(key.to_string(), value);
            }
        }
        self
    }

    /// Removes the key at a JSON pointer.
    #[must_use]
    pub fn remove(mut self, pointer: &str) -> Self {
        if let Some((parent, key)) = pointer.rsplit_once('/') {
            if let Some(Value::Object(map)) = self.body.pointer_mut(parent) {
                map.remove(key);
            }
        }
        self
    }

    /// Returns the body.
    pub fn build(self) -> Value {
        self.body
    }

    /// Returns the serialized body.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.body.to_string().into_bytes()
    }
}

impl Default for PayloadBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn set_replaces_and_inserts() {
        let body = PayloadBuilder::new()
            .set("/dados_cliente/email", json!("x@y.com"))
            .set("/dados_cliente/apelido", json!("H"))
            .build();

        assert_eq!(body["dados_cliente"]["email"], "x@y.com");
        assert_eq!(body["dados_cliente"]["apelido"], "H");
    }

    #[test]
    fn remove_drops_key() {
        let body = PayloadBuilder::new().without_spouse().build();
        assert!(body["dados_cliente"].get("conjuge").is_none());
    }

    #[test]
    fn root_level_insert() {
        let body = PayloadBuilder::new().set("/extra", json!(1)).build();
        assert_eq!(body["extra"], 1);
    }
}
