//! Text entry through ADB Keyboard.
//!
//! Requires ADB Keyboard to be installed on the device.
//! See: https://github.com/senzhk/ADBKeyBoard

use base64::{engine::general_purpose::STANDARD, Engine};
use std::time::Duration;
use tokio::time::sleep;

use super::connection::AdbConnection;
use crate::device::DeviceError;

pub const ADB_KEYBOARD_IME: &str = "com.android.adbkeyboard/.AdbIME";

/// Pause between IME switches and broadcasts so the keyboard can attach.
const IME_SETTLE: Duration = Duration::from_millis(500);

/// Broadcast arguments that type `text` (base64, so any script survives the shell).
pub fn type_text_args(text: &str) -> Vec<String> {
    [
        "am",
        "broadcast",
        "-a",
        "ADB_INPUT_B64",
        "--es",
        "msg",
    ]
    .iter()
    .map(|s| s.to_string())
    .chain(std::iter::once(STANDARD.encode(text.as_bytes())))
    .collect()
}

/// Whether ADB Keyboard is installed and enabled.
pub async fn is_keyboard_installed(conn: &AdbConnection) -> bool {
    match conn.shell(&["ime", "list", "-s"]).await {
        Ok(list) => list.lines().any(|line| line.trim() == ADB_KEYBOARD_IME),
        Err(e) => {
            tracing::warn!(error = %e, "Could not list input methods");
            false
        }
    }
}

/// Replace the content of the focused field with `text`.
///
/// Switches to ADB Keyboard for the duration of the call and restores the
/// previous IME afterwards, even when typing fails.
pub async fn replace_text(conn: &AdbConnection, text: &str) -> Result<(), DeviceError> {
    let original_ime = conn
        .shell(&["settings", "get", "secure", "default_input_method"])
        .await?
        .trim()
        .to_string();

    if original_ime != ADB_KEYBOARD_IME {
        conn.shell(&["ime", "set", ADB_KEYBOARD_IME]).await?;
        sleep(IME_SETTLE).await;
    }

    let typed = type_with_keyboard(conn, text).await;

    if !original_ime.is_empty() && original_ime != ADB_KEYBOARD_IME && original_ime != "null" {
        if let Err(e) = conn.shell(&["ime", "set", &original_ime]).await {
            tracing::warn!(ime = %original_ime, error = %e, "Failed to restore keyboard");
        }
    }

    typed
}

async fn type_with_keyboard(conn: &AdbConnection, text: &str) -> Result<(), DeviceError> {
    conn.shell(&["am", "broadcast", "-a", "ADB_CLEAR_TEXT"])
        .await?;
    sleep(IME_SETTLE).await;

    let args = type_text_args(text);
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    conn.shell(&args).await?;
    Ok(())
}
