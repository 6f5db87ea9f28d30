use std::fmt::Write;

use cartwise_core::domain::conversation::Conversation;
use cartwise_core::domain::product::Product;
use cartwise_core::recommendations::TAG_MARKER;

const DEFAULT_HISTORY_TURNS: usize = 10;

/// Renders the assistant prompt from the bounded candidate set and the conversation.
#[derive(Clone, Debug)]
pub struct PromptBuilder {
    store_name: String,
    history_turns: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new("our store")
    }
}

impl PromptBuilder {
    pub fn new(store_name: impl Into<String>) -> Self {
        Self { store_name: store_name.into(), history_turns: DEFAULT_HISTORY_TURNS }
    }

    pub fn with_history_turns(mut self, history_turns: usize) -> Self {
        self.history_turns = history_turns;
        self
    }

    pub fn instructions(&self) -> String {
        format!(
            "You are the shopping assistant for {store}. Only recommend products listed under \
             PRODUCTS, and never invent prices.\n\
             For every product you recommend, add a line `{TAG_MARKER} {{\"id\":\"<id>\",\"name\":\"<name>\",\"price\":<price>,\"reason\":\"<short reason>\"}}`.\n\
             If you cannot resolve the customer's problem, ask: \"Would you like me to create a support ticket for our team?\"",
            store = self.store_name
        )
    }

    /// `context_blocks` are opaque texts (order lookups, store policies) appended verbatim.
    pub fn build(
        &self,
        candidates: &[Product],
        history: &Conversation,
        context_blocks: &[String],
        message: &str,
    ) -> String {
        let mut prompt = self.instructions();

        prompt.push_str("\n\nPRODUCTS:\n");
        if candidates.is_empty() {
            prompt.push_str("(no matching products)\n");
        }
        for product in candidates {
            let _ = write!(
                prompt,
                "- id={} | {} | {} / {} | color: {} | ${}",
                product.id,
                product.name,
                or_dash(&product.category),
                or_dash(&product.product_type),
                or_dash(&product.color),
                product.price.normalize()
            );
            if !product.sizes.is_empty() {
                let _ = write!(prompt, " | sizes: {}", product.sizes.join(", "));
            }
            prompt.push('\n');
        }

        for block in context_blocks.iter().filter(|block| !block.trim().is_empty()) {
            prompt.push_str("\nCONTEXT:\n");
            prompt.push_str(block.trim());
            prompt.push('\n');
        }

        if !history.is_empty() {
            prompt.push_str("\nCONVERSATION SO FAR:\n");
            prompt.push_str(&history.excerpt(self.history_turns));
            prompt.push('\n');
        }

        let _ = write!(prompt, "\nCustomer: {}\nAssistant:", message.trim());
        prompt
    }
}

fn or_dash(value: &str) -> &str {
    if value.trim().is_empty() {
        "-"
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use cartwise_core::domain::conversation::{Conversation, ConversationTurn};
    use cartwise_core::domain::product::Product;
    use cartwise_core::escalation::engine::is_offer;
    use cartwise_core::recommendations::TAG_MARKER;
    use rust_decimal::Decimal;

    use super::PromptBuilder;

    #[test]
    fn prompt_lists_candidates_context_and_history() {
        let builder = PromptBuilder::new("Northwind Outfitters").with_history_turns(1);
        let products = vec![Product::new("B", "Cap", Decimal::new(2000, 2))
            .with_category("Accessories")
            .with_sizes(["S", "M"])];
        let history = Conversation::from_turns(
            vec![
                ConversationTurn::user("hi"),
                ConversationTurn::assistant("Hello! How can I help?"),
            ],
            50,
        );

        let prompt = builder.build(
            &products,
            &history,
            &["Order #1001 shipped on Monday".to_string(), " ".to_string()],
            "anything under $30?",
        );

        assert!(prompt.contains("Northwind Outfitters"));
        assert!(prompt.contains(TAG_MARKER));
        assert!(prompt.contains("- id=B | Cap | Accessories / - | color: - | $20 | sizes: S, M"));
        assert!(prompt.contains("Order #1001 shipped"));
        assert_eq!(prompt.matches("CONTEXT:").count(), 1);
        assert!(prompt.contains("Assistant: Hello! How can I help?"));
        assert!(!prompt.contains("Customer: hi\n"));
        assert!(prompt.ends_with("Customer: anything under $30?\nAssistant:"));
    }

    #[test]
    fn instructed_offer_phrase_is_recognised_as_an_offer() {
        assert!(is_offer(&PromptBuilder::default().instructions()));
    }
}
