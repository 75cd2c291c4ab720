//! Memory admission controller -- decides what deserves long-term memory.
//!
//! Pattern-based extraction over the lowercased message text. Each trigger
//! yields a [`MemoryProposal`] for the `"user"` entity with a fixed
//! dimension, delta, and confidence; the context hash ties the proposal to
//! the situation it was observed in.

use sha2::{Digest, Sha256};

use crate::types::{MemoryProposal, MessageContext, UserMessage};

/// Derives memory-update proposals from a user message.
pub struct MemoryAdmissionController;

impl MemoryAdmissionController {
    /// Evaluate a message against the trigger table.
    ///
    /// `analysis` is accepted for future signal extraction but the current
    /// triggers read only the message text.
    pub fn evaluate(&self, message: &UserMessage, _analysis: &str) -> Vec<MemoryProposal> {
        let text = message.text.to_lowercase();
        let hash = context_hash(&message.context);
        let mut proposals = Vec::new();

        if text.contains("i like") || text.contains("i prefer") {
            proposals.push(MemoryProposal::for_user(
                "preference_affinity",
                0.2,
                &hash,
                0.8,
            ));
        }

        if text.contains("stop") || text.contains("too much") {
            proposals.push(MemoryProposal::for_user("stress_buffer", -0.3, &hash, 0.9));
        }

        if text.contains("at night") {
            proposals.push(MemoryProposal::for_user(
                "night_mode_sensitivity",
                0.5,
                &hash,
                0.7,
            ));
        }

        proposals
    }
}

/// Deterministic hash of (mode, location, metadata).
///
/// Metadata iterates in key order, so the digest is stable across
/// processes and runs.
pub fn context_hash(context: &MessageContext) -> String {
    let mut hasher = Sha256::new();
    hasher.update(context.mode.as_bytes());
    hasher.update([0x1f]);
    hasher.update(context.location.as_bytes());
    for (key, value) in &context.metadata {
        hasher.update([0x1f]);
        hasher.update(key.as_bytes());
        hasher.update([0x1e]);
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn message(text: &str) -> UserMessage {
        UserMessage {
            session_id: "s1".to_owned(),
            text: text.to_owned(),
            context: MessageContext {
                mode: "text".to_owned(),
                location: "home".to_owned(),
                ..MessageContext::default()
            },
        }
    }

    #[test]
    fn test_preference_trigger() {
        let proposals = MemoryAdmissionController.evaluate(&message("I like jazz"), "");
        assert_eq!(proposals.len(), 1);
        assert_eq!(proposals[0].entity_id, "user");
        assert_eq!(proposals[0].dimension, "preference_affinity");
        assert!((proposals[0].delta - 0.2).abs() < f32::EPSILON);
        assert!((proposals[0].confidence - 0.8).abs() < f32::EPSILON);
    }

    #[test]
    fn test_stress_trigger() {
        let proposals =
            MemoryAdmissionController.evaluate(&message("stop, that is too much"), "");
        assert_eq!(proposals.len(), 1, "both phrases map to one stress proposal");
        assert_eq!(proposals[0].dimension, "stress_buffer");
        assert!((proposals[0].delta - (-0.3)).abs() < f32::EPSILON);
    }

    #[test]
    fn test_night_trigger() {
        let proposals =
            MemoryAdmissionController.evaluate(&message("ping me only at night"), "");
        assert_eq!(proposals[0].dimension, "night_mode_sensitivity");
        assert!((proposals[0].confidence - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn test_multiple_triggers_stack() {
        let proposals =
            MemoryAdmissionController.evaluate(&message("I prefer quiet at night"), "");
        let dims: Vec<&str> = proposals.iter().map(|p| p.dimension.as_str()).collect();
        assert_eq!(dims, vec!["preference_affinity", "night_mode_sensitivity"]);
    }

    #[test]
    fn test_case_insensitive_triggers() {
        let proposals = MemoryAdmissionController.evaluate(&message("I LIKE loud music"), "");
        assert_eq!(proposals.len(), 1);
    }

    #[test]
    fn test_no_trigger_no_proposals() {
        let proposals = MemoryAdmissionController.evaluate(&message("what is the weather"), "");
        assert!(proposals.is_empty());
    }

    #[test]
    fn test_confidences_always_in_range() {
        let proposals = MemoryAdmissionController
            .evaluate(&message("stop it, i like this too much at night"), "");
        assert!(!proposals.is_empty());
        for p in &proposals {
            assert!((0.0..=1.0).contains(&p.confidence));
        }
    }

    #[test]
    fn test_context_hash_deterministic() {
        let ctx = MessageContext {
            mode: "voice".to_owned(),
            location: "office".to_owned(),
            metadata: BTreeMap::from([("device".to_owned(), "phone".to_owned())]),
            ..MessageContext::default()
        };
        assert_eq!(context_hash(&ctx), context_hash(&ctx));
        assert_eq!(context_hash(&ctx).len(), 64, "hex-encoded SHA-256");
    }

    #[test]
    fn test_context_hash_sensitive_to_fields() {
        let base = MessageContext {
            mode: "voice".to_owned(),
            location: "office".to_owned(),
            ..MessageContext::default()
        };
        let mut moved = base.clone();
        moved.location = "home".to_owned();
        assert_ne!(context_hash(&base), context_hash(&moved));

        let mut tagged = base.clone();
        tagged
            .metadata
            .insert("device".to_owned(), "phone".to_owned());
        assert_ne!(context_hash(&base), context_hash(&tagged));
    }

    #[test]
    fn test_context_hash_ignores_timestamp() {
        let a = MessageContext {
            mode: "text".to_owned(),
            ..MessageContext::default()
        };
        let mut b = a.clone();
        b.timestamp = chrono::Utc::now();
        assert_eq!(context_hash(&a), context_hash(&b));
    }
}
