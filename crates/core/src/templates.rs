//! Campaign message rendering with `{{variable}}` placeholders.

use crate::types::Customer;
use std::collections::HashMap;

/// Placeholders understood by campaign templates.
pub const TEMPLATE_VARIABLES: [&str; 3] = ["firstName", "lastName", "points"];

/// Substitute every known placeholder. Unknown placeholders are left as-is.
pub fn render(template: &str, variables: &HashMap<&str, String>) -> String {
    let mut result = template.to_string();
    for name in TEMPLATE_VARIABLES {
        let placeholder = format!("{{{{{}}}}}", name);
        if let Some(value) = variables.get(name) {
            result = result.replace(&placeholder, value);
        }
    }
    result
}

pub fn customer_variables(customer: &Customer) -> HashMap<&'static str, String> {
    HashMap::from([
        ("firstName", customer.first_name.clone()),
        ("lastName", customer.last_name.clone()),
        ("points", customer.available_points.to_string()),
    ])
}

pub fn render_for(template: &str, customer: &Customer) -> String {
    render(template, &customer_variables(customer))
}

/// Preview shown in the campaign editor, filled with sample data.
pub fn preview(template: &str) -> String {
    let sample = HashMap::from([
        ("firstName", "John".to_string()),
        ("lastName", "Doe".to_string()),
        ("points", "120".to_string()),
    ]);
    render(template, &sample)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview() {
        let out = preview("Hi {{firstName}} {{lastName}}, you have {{points}} points!");
        assert_eq!(out, "Hi John Doe, you have 120 points!");
    }

    #[test]
    fn test_repeated_and_unknown_placeholders() {
        let out = preview("{{firstName}}/{{firstName}} {{unknown}}");
        assert_eq!(out, "John/John {{unknown}}");
    }
}
