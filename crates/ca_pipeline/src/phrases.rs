use std::collections::HashMap;

use lazy_static::lazy_static;

use ca_core::{Infosheet, PlatformResearch, Vertical};

lazy_static! {
    /// Localized templates for pros synthesized from infosheet fields when
    /// both the model and the raw research produced none. `{}` is the field
    /// value, `{name}` the platform name.
    static ref PHRASES: HashMap<(&'static str, &'static str), &'static str> = {
        let mut map = HashMap::new();
        map.insert(("en", "licensed"), "Licensed by {}");
        map.insert(("en", "payments"), "Supports {} payments");
        map.insert(("en", "deposit"), "Minimum deposit of {}");
        map.insert(("en", "generic"), "{name} is an established name in its market");
        map.insert(("es", "licensed"), "Con licencia de {}");
        map.insert(("es", "payments"), "Acepta pagos con {}");
        map.insert(("es", "deposit"), "Depósito mínimo de {}");
        map.insert(("es", "generic"), "{name} es un nombre consolidado en su mercado");
        map.insert(("de", "licensed"), "Lizenziert durch {}");
        map.insert(("de", "payments"), "Unterstützt Zahlungen per {}");
        map.insert(("de", "deposit"), "Mindesteinzahlung von {}");
        map.insert(("de", "generic"), "{name} ist ein etablierter Name in seinem Markt");
        map
    };
}

fn phrase(language: &str, key: &'static str, value: &str, name: &str) -> String {
    let lang = if PHRASES.contains_key(&(language, "generic")) {
        language
    } else {
        "en"
    };
    let template = PHRASES
        .get(&(lang, key))
        .copied()
        .unwrap_or("{}");
    template.replacen("{name}", name, 1).replacen("{}", value, 1)
}

/// Pros synthesized from infosheet facts, localized per target language.
pub fn synthesized_pros(
    name: &str,
    infosheet: &Infosheet,
    vertical: Vertical,
    language: &str,
) -> Vec<String> {
    let mut pros = Vec::new();
    if infosheet.is_filled(vertical.license_field()) {
        if let Some(v) = infosheet.get(vertical.license_field()) {
            pros.push(phrase(language, "licensed", v, name));
        }
    }
    if infosheet.is_filled("payment_methods") {
        if let Some(v) = infosheet.get("payment_methods") {
            pros.push(phrase(language, "payments", v, name));
        }
    }
    if infosheet.is_filled(vertical.deposit_field()) {
        if let Some(v) = infosheet.get(vertical.deposit_field()) {
            pros.push(phrase(language, "deposit", v, name));
        }
    }
    if pros.is_empty() {
        pros.push(phrase(language, "generic", "", name));
    }
    pros
}

/// Fallback chain for review pros when the model omitted them: the raw
/// research pros, then the first 3 key features, then synthesized facts.
pub fn fallback_pros(research: &PlatformResearch, vertical: Vertical, language: &str) -> Vec<String> {
    let research_pros: Vec<String> = research
        .pros
        .iter()
        .filter(|p| !p.trim().is_empty())
        .cloned()
        .collect();
    if !research_pros.is_empty() {
        return research_pros;
    }
    let features: Vec<String> = research
        .key_features
        .iter()
        .filter(|f| !f.trim().is_empty())
        .take(3)
        .cloned()
        .collect();
    if !features.is_empty() {
        return features;
    }
    synthesized_pros(&research.name, &research.infosheet, vertical, language)
}

/// Cap cons at `len(pros) - 1` so a review never reads cons-heavy.
pub fn balance_cons(pros: &[String], cons: Vec<String>) -> Vec<String> {
    let max = pros.len().saturating_sub(1);
    cons.into_iter()
        .filter(|c| !c.trim().is_empty())
        .take(max)
        .collect()
}
