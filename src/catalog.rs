//! Formatting of the installed model list.

use crate::llm::models::ModelInfo;

pub const NO_MODELS_HINT: &str = "No models found. Pull one with: ollama pull <model>";

/// Model name without its tag (`llama3:8b` -> `llama3`)
pub fn base_name(model: &str) -> &str {
    model.split(':').next().unwrap_or(model)
}

/// One display line per model, sorted by name
pub fn format_models(models: &[ModelInfo], default_model: &str) -> Vec<String> {
    if models.is_empty() {
        return vec![NO_MODELS_HINT.to_string()];
    }

    let mut sorted: Vec<&ModelInfo> = models.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    sorted
        .into_iter()
        .map(|m| {
            let modified = m
                .modified_at
                .as_deref()
                .map(|d| d.get(..10).unwrap_or(d))
                .unwrap_or("");
            let marker = if base_name(&m.name) == base_name(default_model) {
                " (default)"
            } else {
                ""
            };

            let line = format!("  {:<35} {:>5.1}GB  {}", m.name, m.size_gb(), modified);
            format!("{}{}", line.trim_end(), marker)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(name: &str, size: Option<u64>, modified: Option<&str>) -> ModelInfo {
        ModelInfo {
            name: name.to_string(),
            size,
            modified_at: modified.map(String::from),
        }
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("llama3:8b"), "llama3");
        assert_eq!(base_name("mistral"), "mistral");
        assert_eq!(base_name(""), "");
    }

    #[test]
    fn test_empty_catalogue_hint() {
        assert_eq!(format_models(&[], "llama3"), vec![NO_MODELS_HINT.to_string()]);
    }

    #[test]
    fn test_lines_are_sorted_and_formatted() {
        let models = vec![
            model("mistral:7b", Some(4 * 1024 * 1024 * 1024), Some("2024-03-09T08:00:00Z")),
            model("llama3:8b", Some(1024 * 1024 * 1024 / 2), Some("2024-05-01T10:00:00Z")),
        ];

        let lines = format_models(&models, "qwen3");

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], format!("  {:<35} {:>5.1}GB  2024-05-01", "llama3:8b", 0.5));
        assert_eq!(lines[1], format!("  {:<35} {:>5.1}GB  2024-03-09", "mistral:7b", 4.0));
        assert!(lines[1].ends_with("     4.0GB  2024-03-09"));
    }

    #[test]
    fn test_default_marker_matches_base_name() {
        let models = vec![model("llama3:70b", None, None), model("llama3.1:8b", None, None)];

        let lines = format_models(&models, "llama3:8b");

        assert!(lines[0].starts_with("  llama3:70b"));
        assert!(lines[0].ends_with(" (default)"));
        assert!(!lines[1].contains("(default)"));
    }

    #[test]
    fn test_missing_size_and_date() {
        let lines = format_models(&[model("tiny", None, None)], "other");
        assert_eq!(lines[0], format!("  {:<35} {:>5.1}GB", "tiny", 0.0));
    }
}
