use crate::model::ResolvedParams;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Cache key for a request: a blake3 digest over the fields that change the
/// answer. Streaming sinks, timeouts and output limits are never folded in.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn derive(
        prompt: &str,
        model: &str,
        temperature: f32,
        extras: &BTreeMap<String, Value>,
    ) -> Self {
        // BTreeMap keys serialize sorted, so field order never leaks into the hash.
        let mut canonical: BTreeMap<&str, Value> = BTreeMap::new();
        canonical.insert("prompt", Value::from(prompt));
        canonical.insert("model", Value::from(model));
        canonical.insert("temperature", Value::from(temperature));
        if !extras.is_empty() {
            canonical.insert("extras", Value::Object(extras.clone().into_iter().collect()));
        }
        let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
        Self(*blake3::hash(&bytes).as_bytes())
    }

    pub fn for_request(prompt: &str, params: &ResolvedParams) -> Self {
        Self::derive(prompt, &params.model, params.temperature, &params.extras)
    }

    pub fn short(&self) -> String {
        self.to_string()[..8].to_string()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}
