use super::ResourceError;

/// SQL for every store operation, rendered once for a configured table.
///
/// Only the table name is formatted in; all values are bound as `$n`
/// parameters. sqlx prepares and caches each statement per connection.
#[derive(Debug, Clone)]
pub struct Queries {
    pub list: String,
    pub get: String,
    pub create: String,
    pub update: String,
    pub delete: String,
}

impl Queries {
    pub fn new(table: &str) -> Result<Self, ResourceError> {
        let table = quote_table(table)?;
        Ok(Self {
            list: format!(
                "SELECT id, label, created_at, updated_at FROM {table} \
                 ORDER BY created_at, id LIMIT $1 OFFSET $2"
            ),
            get: format!(
                "SELECT id, label, fields, created_at, updated_at FROM {table} WHERE id = $1"
            ),
            create: format!(
                "INSERT INTO {table} (label, fields, created_at) \
                 VALUES ($1, $2, current_timestamp) RETURNING id, created_at"
            ),
            update: format!(
                "UPDATE {table} SET label = $1, fields = $2, updated_at = current_timestamp \
                 WHERE id = $3 RETURNING id, label, fields, created_at, updated_at"
            ),
            delete: format!("DELETE FROM {table} WHERE id = $1"),
        })
    }
}

/// Quote a possibly schema-qualified table name. Each part must be a plain
/// identifier; anything else is refused rather than escaped.
fn quote_table(table: &str) -> Result<String, ResourceError> {
    let parts: Vec<&str> = table.split('.').collect();
    if parts.len() > 2 || !parts.iter().all(|part| is_identifier(part)) {
        return Err(ResourceError::InvalidTable(table.to_string()));
    }
    Ok(parts
        .iter()
        .map(|part| format!("\"{}\"", part))
        .collect::<Vec<_>>()
        .join("."))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 63 && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
