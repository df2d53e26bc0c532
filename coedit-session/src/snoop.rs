//! The fixed set of worker replies a `SessionPair` intercepts on their way
//! to the client, so the broker can keep its tile cache and admin-visible
//! state in step without the client having to ask for it twice.

/// Side effects a [`crate::SessionPair`] applies to the owning broker as it
/// snoops worker-facing traffic. Implemented by the broker crate; kept as a
/// trait here so this crate never needs to depend on the broker or cache
/// crates directly.
pub trait BrokerEffects: Send + Sync {
	fn on_status(&self, message: &str);
	fn on_invalidate_tiles(&self, message: &str);
	fn on_tile(&self, message: &str);
	fn on_command_values(&self, message: &str);
	fn on_part_page_rectangles(&self, message: &str);
	fn on_render_font(&self, message: &str);
	fn on_save_as(&self, message: &str);
	fn on_state_changed(&self, message: &str);
	fn on_uno_command_result(&self, message: &str);
	fn on_error(&self, message: &str);
}

fn command_token(msg: &str) -> &str {
	msg.split(|c: char| c == ' ' || c == ':').next().unwrap_or(msg)
}

/// Dispatch `message` to whichever `BrokerEffects` hook its leading command
/// token names. Messages outside the snoop table pass through untouched.
pub fn snoop(effects: &dyn BrokerEffects, message: &str) {
	match command_token(message) {
		"status" => effects.on_status(message),
		"invalidatetiles" => effects.on_invalidate_tiles(message),
		"tile" => effects.on_tile(message),
		"commandvalues" => effects.on_command_values(message),
		"partpagerectangles" => effects.on_part_page_rectangles(message),
		"renderfont" => effects.on_render_font(message),
		"saveas" => effects.on_save_as(message),
		"statechanged" => effects.on_state_changed(message),
		"unocommandresult" => effects.on_uno_command_result(message),
		"error" => effects.on_error(message),
		_ => {}
	}
}
