use console::style;

use crate::ai::ConfidenceLevel;

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    pub fn item(&self, message: &str) {
        println!("  {}", message);
    }

    /// Score with its level, colored by level
    pub fn confidence(&self, score: f64) -> String {
        let level = ConfidenceLevel::classify(score);
        let text = format!("{:.2} {}", score, level);
        match level {
            ConfidenceLevel::High => style(text).green().to_string(),
            ConfidenceLevel::Medium => style(text).yellow().to_string(),
            ConfidenceLevel::Low => style(text).red().to_string(),
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
