/// Static partition of model names into quota-sharing equivalence classes.
///
/// When several model names are billed against one underlying upstream
/// quota, a cooldown on any member is installed for the whole group. A
/// model absent from every group is its own singleton class.
pub static MODEL_GROUPS: &[&[&str]] = &[
    &[
        "gemini-3-pro-preview",
        "gemini-3-pro-high",
        "gemini-3-pro-low",
        "gemini-2.5-pro",
        "gemini-2.5-flash",
    ],
    &["gemini-3-flash"],
];

/// Returns the full equivalence class containing `model`, including `model`
/// itself. Unknown models form a singleton class of just themselves.
pub fn model_group_of(model: &str) -> Vec<&'static str> {
    for group in MODEL_GROUPS {
        if group.contains(&model) {
            return group.to_vec();
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_returns_its_group() {
        let group = model_group_of("gemini-2.5-pro");
        assert!(group.contains(&"gemini-3-pro-preview"));
        assert_eq!(group.len(), 5);
    }

    #[test]
    fn unknown_model_returns_empty() {
        assert!(model_group_of("made-up-model").is_empty());
    }
}
