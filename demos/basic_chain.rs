//! A complete example showing how to build a processing chain with Grapnel.
//!
//! This example demonstrates:
//! - Writing custom hook logic
//! - Chaining hooks with `set_hook`
//! - Fanning out with an `Anchor`
//! - Gating a hook's execute phase from its pre-process phase
//! - Using post-process to act once everything downstream is done

use grapnel::prelude::*;
use std::sync::Arc;

// ============================================================================
// Step 1: Input Validation Hook
// ============================================================================

/// Makes sure there is a user name in the thing, falling back to "Guest".
#[derive(Clone)]
struct ValidateInput;

#[async_trait]
impl HookLogic for ValidateInput {
    async fn execute(&self, _settings: &Settings, thing: &mut Thing) -> Result<()> {
        let valid = thing
            .get("user_name")
            .and_then(HookValue::as_str)
            .is_some_and(|s| !s.is_empty());
        if !valid {
            thing.insert("user_name".to_string(), "Guest".into());
        }
        println!("[ValidateInput] Name validated and stored");
        Ok(())
    }

    async fn post_process(&self, _settings: &Settings, thing: &mut Thing) -> Result<()> {
        // Runs last: every other hook has finished by now
        println!("[ValidateInput] Done, {} key(s) in the thing", thing.len());
        Ok(())
    }
}

// ============================================================================
// Step 2: Greeting Generator Hook
// ============================================================================

/// Creates a personalized greeting. The greeting template comes from settings.
#[derive(Clone, Default)]
struct GenerateGreeting {
    site: String,
}

#[async_trait]
impl HookLogic for GenerateGreeting {
    fn defaults(&self) -> Settings {
        let mut defaults = Settings::new();
        defaults.insert("site".to_string(), "Grapnel".into());
        defaults
    }

    fn configure(&mut self, settings: &Settings) {
        self.site = settings
            .get("site")
            .and_then(HookValue::as_str)
            .unwrap_or("Grapnel")
            .to_string();
    }

    async fn execute(&self, _settings: &Settings, thing: &mut Thing) -> Result<()> {
        let name = thing
            .get("user_name")
            .and_then(HookValue::as_str)
            .unwrap_or("Unknown");
        let greeting = format!("Hello, {}! Welcome to {}.", name, self.site);
        println!("[GenerateGreeting] {}", greeting);
        thing.insert("greeting".to_string(), greeting.into());
        Ok(())
    }
}

// ============================================================================
// Step 3: Sentiment Analysis Anchor
// ============================================================================

/// Works out the sentiment; its children decide for themselves whether to answer.
#[derive(Clone)]
struct AnalyzeSentiment;

#[async_trait]
impl HookLogic for AnalyzeSentiment {
    async fn execute(&self, _settings: &Settings, thing: &mut Thing) -> Result<()> {
        let name = thing
            .get("user_name")
            .and_then(HookValue::as_str)
            .unwrap_or("Guest");
        let sentiment = if name == "Guest" { "neutral" } else { "positive" };
        println!("[AnalyzeSentiment] Sentiment: {}", sentiment);
        thing.insert("sentiment".to_string(), sentiment.into());
        Ok(())
    }
}

// ============================================================================
// Step 4: Response Hooks, gated on the sentiment
// ============================================================================

#[derive(Clone)]
struct Respond {
    sentiment: &'static str,
    message: &'static str,
}

#[async_trait]
impl HookLogic for Respond {
    async fn pre_process(&self, _settings: &Settings, thing: &mut Thing) -> Result<bool> {
        Ok(thing.get("sentiment").and_then(HookValue::as_str) == Some(self.sentiment))
    }

    async fn execute(&self, _settings: &Settings, thing: &mut Thing) -> Result<()> {
        println!("[Respond:{}] {}", self.sentiment, self.message);
        thing.insert("response".to_string(), self.message.into());
        Ok(())
    }
}

// ============================================================================
// Main: Build and Process the Chain
// ============================================================================

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    println!("=== Grapnel Basic Chain Example ===\n");

    let root = Hook::with_options(ValidateInput, HookOptions::new().name("validate"));
    let greeting = Hook::with_options(
        GenerateGreeting::default(),
        HookOptions::new().name("greeting").setting("site", "the chain"),
    );
    let sentiment = Anchor::with_options(AnalyzeSentiment, HookOptions::new().name("sentiment"));

    sentiment.push_hook(Arc::new(Hook::new(Respond {
        sentiment: "positive",
        message: "We're glad to have you here!",
    })))?;
    sentiment.push_hook(Arc::new(Hook::new(Respond {
        sentiment: "neutral",
        message: "Feel free to explore and let us know if you need anything!",
    })))?;

    // set_hook always appends at the tail: validate -> greeting -> sentiment
    root.set_hook(Arc::new(greeting))?;
    root.set_hook(Arc::new(sentiment))?;

    // --- Example 1: Process with a custom name ---
    println!("\n--- Example 1: With custom name ---");
    let mut thing1 = Thing::new();
    thing1.insert("user_name".to_string(), "Alice".into());
    root.process(&mut thing1).await?;

    println!("\nFinal thing:");
    for (key, value) in &thing1 {
        println!("  {}: {:?}", key, value);
    }

    // --- Example 2: Process with no name, tracing every phase ---
    println!("\n\n--- Example 2: With default name ---");
    let tracer = MemoryTracer::new();
    let mut thing2 = Thing::new();
    root.process_traced(&mut thing2, &tracer).await?;

    println!("\nTrace:");
    for entry in tracer.entries() {
        println!("  {:<10} {:<13} {:?}", entry.hook, entry.phase.to_string(), entry.outcome);
    }

    println!("\n=== Chain processed successfully! ===");
    Ok(())
}
