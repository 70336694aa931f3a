//! List available audio input devices.

use crate::recorder::{device::InputDeviceInfo, list_input_devices};

/// Prints every input device with its index, name and native configuration.
///
/// # Errors
/// - If the audio host cannot enumerate devices
pub fn handle_list_devices() -> anyhow::Result<()> {
    let devices = list_input_devices()?;

    if devices.is_empty() {
        println!("No audio input devices found on this system.");
        return Ok(());
    }

    println!();
    println!("Available audio input devices:");
    println!();
    for device in &devices {
        print!("{}", describe(device));
    }
    println!("Set [audio] device in voicenote.toml to an ID or name to use it.");

    Ok(())
}

fn describe(device: &InputDeviceInfo) -> String {
    let default_indicator = if device.is_default { " [DEFAULT]" } else { "" };
    let config_info = match device.config {
        Some((sample_rate, channels)) => format!("{sample_rate}Hz, {channels} channels"),
        None => "configuration unavailable".to_string(),
    };
    format!(
        "  ID: {}\n    Name: {}{}\n    Config: {}\n\n",
        device.index, device.name, default_indicator, config_info
    )
}
