use crate::Message;

/// Substitutes `{name}` placeholders; unknown braces are left untouched.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
	let mut out = template.to_string();

	for (name, value) in vars {
		out = out.replace(&format!("{{{name}}}"), value);
	}

	out
}

/// Prepends a system turn to the caller's conversation.
pub fn with_system(system: String, conversation: &[Message]) -> Vec<Message> {
	let mut messages = Vec::with_capacity(conversation.len() + 1);

	messages.push(Message::system(system));
	messages.extend(conversation.iter().cloned());

	messages
}
