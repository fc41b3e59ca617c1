//! Index and alias naming rules enforced by the engine

const MAX_NAME_BYTES: usize = 255;
const FORBIDDEN: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ' ', ',', '#', ':'];

/// Check an index or alias name against the engine's naming rules
pub fn validate_index_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("index name must not be empty".to_string());
    }
    if name.len() > MAX_NAME_BYTES {
        return Err(format!("index name exceeds {} bytes", MAX_NAME_BYTES));
    }
    if name == "." || name == ".." {
        return Err(format!("'{}' is not a valid index name", name));
    }
    if name.starts_with(['-', '_', '+']) {
        return Err(format!("index name '{}' must not start with '-', '_' or '+'", name));
    }
    if name.chars().any(|c| c.is_uppercase()) {
        return Err(format!("index name '{}' must be lowercase", name));
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN.contains(c)) {
        return Err(format!("index name '{}' contains forbidden character '{}'", name, c));
    }
    Ok(())
}
