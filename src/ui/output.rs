use crate::diagnostic::{Diagnostic, Severity};
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    println!("{} {}", Icons::ROCKET, text.style(theme().header.clone()));
}

pub fn status(icon: &str, label: &str, value: &str) {
    println!("{} {}: {}", icon, label.style(theme().dim.clone()), value);
}

pub fn success(label: &str) {
    println!("{} {}", Icons::CHECK, label.style(theme().success.clone()));
}

pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().error.clone()));
}

pub fn warn(label: &str) {
    eprintln!("{} {}", Icons::WARN, label.style(theme().warn.clone()));
}

pub fn info(label: &str, value: &str) {
    println!(
        "{} {}: {}",
        Icons::INFO.style(theme().info.clone()),
        label.style(theme().dim.clone()),
        value
    );
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn dim(text: &str) -> String {
    text.style(theme().dim.clone()).to_string()
}

pub fn muted(text: &str) -> String {
    text.style(theme().muted.clone()).to_string()
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}

/// One diagnostic, `error[kind] Graph: message` plus its path and origins
pub fn diagnostic(diagnostic: &Diagnostic) {
    let (icon, style) = match diagnostic.severity {
        Severity::Fatal => (Icons::CROSS, theme().error.clone()),
        Severity::Warning => (Icons::WARN, theme().warn.clone()),
    };
    let label = format!("{}[{}]", diagnostic.severity, diagnostic.kind);
    match &diagnostic.graph {
        Some(graph) => eprintln!("{} {} {}: {}", icon, label.style(style), graph.bold(), diagnostic.message),
        None => eprintln!("{} {} {}", icon, label.style(style), diagnostic.message),
    }
    if !diagnostic.path.is_empty() {
        eprintln!("    {} {}", dim("path:"), diagnostic.render_path());
    }
    if !diagnostic.origins.is_empty() {
        let origins: Vec<&str> = diagnostic.origins.iter().map(|o| o.as_str()).collect();
        eprintln!("    {} {}", dim("declared by:"), muted(&origins.join(", ")));
    }
}
