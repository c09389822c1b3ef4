//! Keyword-based default executor selection.
//!
//! A lightweight heuristic over the free-text prompt, used only when a task
//! carries no explicit executor. Behind the `ExecutorSelector` seam it can
//! be swapped for anything smarter without touching the scheduler.

use serde_json::json;

use podium_core::{ExecutorSelector, Selection};

/// Keyword selector over a fixed rule table
pub struct KeywordSelector;

impl KeywordSelector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for KeywordSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorSelector for KeywordSelector {
    fn select(&self, prompt: &str) -> Option<Selection> {
        let lowered = prompt.to_lowercase();

        if let Some(app) = leading_keyword_arg(&lowered, prompt, &["open ", "launch ", "focus "]) {
            return Some(Selection {
                executor_id: "app_launch".to_string(),
                args: json!({"app": app}),
            });
        }

        if let Some(command) = leading_keyword_arg(&lowered, prompt, &["run ", "execute ", "shell "])
        {
            return Some(Selection {
                executor_id: "shell".to_string(),
                args: json!({"command": command}),
            });
        }

        if let Some(url) = prompt
            .split_whitespace()
            .find(|word| word.starts_with("http://") || word.starts_with("https://"))
        {
            if lowered.contains("fetch") || lowered.contains("get") || lowered.contains("call") {
                return Some(Selection {
                    executor_id: "http_request".to_string(),
                    args: json!({"url": url, "method": "GET"}),
                });
            }
        }

        Some(Selection {
            executor_id: "echo".to_string(),
            args: json!({"text": prompt}),
        })
    }
}

/// If the lowered prompt starts with one of the keywords, return the rest of
/// the original prompt.
fn leading_keyword_arg<'a>(
    lowered: &str,
    original: &'a str,
    keywords: &[&str],
) -> Option<&'a str> {
    for keyword in keywords {
        if lowered.starts_with(keyword) {
            let rest = original[keyword.len()..].trim();
            if !rest.is_empty() {
                return Some(rest);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_prompt_selects_app_launch() {
        let selection = KeywordSelector::new().select("open Notes").expect("selection");
        assert_eq!(selection.executor_id, "app_launch");
        assert_eq!(selection.args["app"], "Notes");
    }

    #[test]
    fn test_run_prompt_selects_shell() {
        let selection = KeywordSelector::new()
            .select("run git status")
            .expect("selection");
        assert_eq!(selection.executor_id, "shell");
        assert_eq!(selection.args["command"], "git status");
    }

    #[test]
    fn test_fetch_url_selects_http_request() {
        let selection = KeywordSelector::new()
            .select("fetch https://example.com/status")
            .expect("selection");
        assert_eq!(selection.executor_id, "http_request");
        assert_eq!(selection.args["url"], "https://example.com/status");
    }

    #[test]
    fn test_plain_prompt_falls_back_to_echo() {
        let selection = KeywordSelector::new()
            .select("summarize the day")
            .expect("selection");
        assert_eq!(selection.executor_id, "echo");
    }
}
