use crate::core::persona::PersonaRegistry;

/// Render the registry as a table, marking `current` with `*`.
pub fn format_personas(registry: &PersonaRegistry, current: Option<&str>) -> String {
    let mut content = String::from("Available personas:\n\n");
    for persona in registry.list() {
        let marker = if current == Some(persona.id.as_str()) {
            "*"
        } else {
            " "
        };
        content.push_str(&format!(
            "{marker} {:<12} {:<20} {:<14} {}\n",
            persona.id,
            persona.label,
            persona.route,
            persona.capabilities.join(", ")
        ));
    }
    if current.is_some() {
        content.push_str("\n* = signed in\n");
    }
    content
}

pub fn list_personas(registry: &PersonaRegistry, current: Option<&str>) {
    print!("{}", format_personas(registry, current));
}
