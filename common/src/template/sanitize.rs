/// Replace any character not allowed in a CloudFormation logical ID
/// with its uppercase-alpha counterpart
pub fn logical_id(name: &str) -> String {
    name.replace('-', "DASH")
        .replace('.', "DOT")
        .replace('_', "USCORE")
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect()
}

/// Indent every non-empty line, used to nest rendered blocks into a template
pub fn indent(text: &str, spaces: usize) -> String {
    let padding = " ".repeat(spaces);

    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                String::new()
            } else {
                format!("{padding}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Quote a value for a YAML scalar
pub fn quoted(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| format!("\"{value}\""))
}
