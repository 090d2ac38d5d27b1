//! # Model Pricing Table
//!
//! Static per-model token rates used for approximate cost accounting on
//! audit rows. Rates are USD per million tokens. Unknown models cost zero
//! rather than faulting — accounting must never break an execution.

use super::TokenUsage;

/// (model name prefix, input USD per 1M tokens, output USD per 1M tokens)
const PRICE_TABLE: &[(&str, f64, f64)] = &[
    // Anthropic
    ("claude-3-5-sonnet", 3.00, 15.00),
    ("claude-3-5-haiku", 0.80, 4.00),
    ("claude-3-opus", 15.00, 75.00),
    // OpenAI
    ("gpt-4o-mini", 0.15, 0.60),
    ("gpt-4o", 2.50, 10.00),
    ("o1", 15.00, 60.00),
    // Mistral
    ("mistral-large", 2.00, 6.00),
    ("mistral-medium", 0.40, 2.00),
    ("mistral-small", 0.20, 0.60),
    // Ollama runs locally; no per-token cost
];

/// Approximate cost in USD for a call's reported token usage.
///
/// Longest-prefix match so `gpt-4o-mini` does not fall into the `gpt-4o`
/// bucket; unknown models yield 0.0.
pub fn cost_for(model: &str, usage: &TokenUsage) -> f64 {
    let mut best: Option<(&str, f64, f64)> = None;
    for &(prefix, input_rate, output_rate) in PRICE_TABLE {
        if model.starts_with(prefix) {
            match best {
                Some((current, _, _)) if current.len() >= prefix.len() => {}
                _ => best = Some((prefix, input_rate, output_rate)),
            }
        }
    }

    match best {
        Some((_, input_rate, output_rate)) => {
            let input_cost = usage.prompt_tokens as f64 / 1_000_000.0 * input_rate;
            let output_cost = usage.completion_tokens as f64 / 1_000_000.0 * output_rate;
            input_cost + output_cost
        }
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_model_cost() {
        let usage = TokenUsage::new(1_000_000, 1_000_000);
        let cost = cost_for("claude-3-5-sonnet-latest", &usage);
        assert!((cost - 18.00).abs() < 1e-9);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let usage = TokenUsage::new(1_000_000, 0);
        let cost = cost_for("gpt-4o-mini-2024-07-18", &usage);
        assert!((cost - 0.15).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_model_costs_zero() {
        let usage = TokenUsage::new(500, 500);
        assert_eq!(cost_for("llama3.1:8b", &usage), 0.0);
        assert_eq!(cost_for("", &usage), 0.0);
    }

    #[test]
    fn test_zero_usage_costs_zero() {
        assert_eq!(cost_for("gpt-4o", &TokenUsage::default()), 0.0);
    }
}
