//! Message body rendering and destination normalization.

use std::collections::HashMap;

/// Render a template body by replacing `{key}` tokens with `vars[key]`.
///
/// Tokens without a matching variable are left literal. Substitution is
/// plain string replacement; templates are trusted tenant configuration,
/// not user input.
#[must_use]
pub fn render_template(body: &str, vars: &HashMap<String, String>) -> String {
    let mut out = body.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{key}}}"), value);
    }
    out
}

/// Normalize a destination phone number: trim and strip interior spaces.
///
/// TODO: swap in a proper E.164 parser (e.g. phonenumber) once tenant
/// onboarding validates country codes.
#[must_use]
pub fn normalize_destination(raw: &str) -> String {
    raw.trim().replace(' ', "")
}
